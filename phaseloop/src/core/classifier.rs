//! Deterministic classification of working-tree hunks.
//!
//! Each hunk lands in exactly one [`ChangeKind`]. Per-kind patches keep the
//! original file headers, so every kind can be staged and committed on its own.

use std::collections::BTreeMap;
use std::path::{Component, Path};
use std::sync::LazyLock;

use regex::Regex;

use crate::core::diff::{FileDiff, Hunk, parse_diff, render_patch};
use crate::core::marker::Marker;

static HUMAN_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:TODO|FIXME|FIX|HACK|XXX):").expect("human marker regex")
});

/// Category of a hunk, declared in descending priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeKind {
    /// Creation of the plan file.
    Seed,
    /// Edits or blockquote annotations on the plan file.
    Feedback,
    /// Code carrying `TODO:`-style markers left for the agent.
    Human,
    /// Any other code change.
    Fix,
}

impl ChangeKind {
    /// Highest priority first.
    pub const PRIORITY: [ChangeKind; 4] = [
        ChangeKind::Seed,
        ChangeKind::Feedback,
        ChangeKind::Human,
        ChangeKind::Fix,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Seed => "seed",
            ChangeKind::Feedback => "feedback",
            ChangeKind::Human => "human",
            ChangeKind::Fix => "fix",
        }
    }

    pub fn marker(self) -> Marker {
        match self {
            ChangeKind::Seed => Marker::Seed,
            ChangeKind::Feedback => Marker::Feedback,
            ChangeKind::Human => Marker::Human,
            ChangeKind::Fix => Marker::Fix,
        }
    }
}

/// Classify one hunk of `file`.
pub fn classify_hunk(file: &FileDiff, hunk: &Hunk, plan_file: &Path) -> ChangeKind {
    let is_plan = same_path(Path::new(&file.path), plan_file);
    if is_plan && file.is_new() {
        return ChangeKind::Seed;
    }
    if is_plan {
        // Blockquote annotations and plain plan edits are both user feedback.
        return ChangeKind::Feedback;
    }
    if hunk.added_lines().any(|line| HUMAN_MARKER_RE.is_match(line)) {
        return ChangeKind::Human;
    }
    ChangeKind::Fix
}

/// A diff split by [`ChangeKind`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedDiff {
    buckets: BTreeMap<ChangeKind, Vec<FileDiff>>,
}

impl ClassifiedDiff {
    /// File sections (with only matching hunks) for `kind`.
    pub fn files(&self, kind: ChangeKind) -> &[FileDiff] {
        self.buckets.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Applicable patch text for `kind`, or `None` when empty.
    pub fn patch(&self, kind: ChangeKind) -> Option<String> {
        let files = self.files(kind);
        if files.is_empty() {
            return None;
        }
        Some(render_patch(files))
    }

    /// Non-empty kinds, highest priority first.
    pub fn kinds(&self) -> Vec<ChangeKind> {
        ChangeKind::PRIORITY
            .into_iter()
            .filter(|kind| !self.files(*kind).is_empty())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(Vec::is_empty)
    }

    /// Number of hunks classified as `kind`.
    pub fn hunk_count(&self, kind: ChangeKind) -> usize {
        self.files(kind).iter().map(|f| f.hunks.len()).sum()
    }
}

/// Split diff text into per-kind patches.
///
/// Files left without hunks for a kind are dropped from that kind. Never fails;
/// unparseable input yields an empty result.
pub fn classify_diff(diff: &str, plan_file: &Path) -> ClassifiedDiff {
    let mut buckets: BTreeMap<ChangeKind, Vec<FileDiff>> = BTreeMap::new();
    for file in parse_diff(diff) {
        for kind in ChangeKind::PRIORITY {
            let subset = file.with_hunks(|hunk| classify_hunk(&file, hunk, plan_file) == kind);
            if !subset.hunks.is_empty() {
                buckets.entry(kind).or_default().push(subset);
            }
        }
    }
    ClassifiedDiff { buckets }
}

/// Single marker for committing a whole diff as one unit.
///
/// Reduces to the highest-priority kind present; an empty diff is human work.
pub fn classify_prefix(diff: &str, plan_file: &Path) -> Marker {
    classify_diff(diff, plan_file)
        .kinds()
        .first()
        .map(|kind| kind.marker())
        .unwrap_or(Marker::Human)
}

fn same_path(a: &Path, b: &Path) -> bool {
    let normal = |p: &Path| -> Vec<std::ffi::OsString> {
        p.components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_os_string()),
                _ => None,
            })
            .collect()
    };
    normal(a) == normal(b)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    const PLAN: &str = "TODO.md";

    const MIXED: &str = "\
diff --git a/src/app.ts b/src/app.ts
index 1111111..2222222 100644
--- a/src/app.ts
+++ b/src/app.ts
@@ -1,2 +1,3 @@
 const a = 1;
+// TODO: fix me
 const b = 2;
@@ -20,2 +21,2 @@
-  return 1;
+  return 2;
 }
diff --git a/TODO.md b/TODO.md
index 4444444..5555555 100644
--- a/TODO.md
+++ b/TODO.md
@@ -3,2 +3,3 @@
 ## Package
+- [ ] new item
 - [x] done
";

    fn plan() -> &'static Path {
        Path::new(PLAN)
    }

    fn hunk_set(files: &[FileDiff]) -> BTreeSet<(String, Hunk)> {
        files
            .iter()
            .flat_map(|f| f.hunks.iter().map(|h| (f.path.clone(), h.clone())))
            .collect()
    }

    #[test]
    fn todo_marker_is_human_and_plan_edit_is_feedback() {
        let diff = "\
diff --git a/src/app.ts b/src/app.ts
index 1111111..2222222 100644
--- a/src/app.ts
+++ b/src/app.ts
@@ -1,2 +1,3 @@
 const a = 1;
+// TODO: fix me
 const b = 2;
diff --git a/TODO.md b/TODO.md
index 4444444..5555555 100644
--- a/TODO.md
+++ b/TODO.md
@@ -3,2 +3,3 @@
 ## Package
+- [ ] new item
 - [x] done
";
        let classified = classify_diff(diff, plan());
        assert_eq!(classified.hunk_count(ChangeKind::Human), 1);
        assert_eq!(classified.hunk_count(ChangeKind::Feedback), 1);
        assert_eq!(classified.hunk_count(ChangeKind::Fix), 0);
        assert!(classified.patch(ChangeKind::Fix).is_none());
    }

    #[test]
    fn new_plan_file_is_seed() {
        let diff = "\
diff --git a/TODO.md b/TODO.md
new file mode 100644
index 0000000..1111111
--- /dev/null
+++ b/TODO.md
@@ -0,0 +1,2 @@
+## First
+> please look at auth
";
        let classified = classify_diff(diff, plan());
        assert_eq!(classified.kinds(), vec![ChangeKind::Seed]);
        assert_eq!(classify_prefix(diff, plan()), Marker::Seed);
    }

    #[test]
    fn blockquote_on_plan_is_feedback() {
        let diff = "\
diff --git a/TODO.md b/TODO.md
index 1111111..2222222 100644
--- a/TODO.md
+++ b/TODO.md
@@ -1,1 +1,2 @@
 - [ ] item
+  > use the existing helper
";
        let files = parse_diff(diff);
        assert_eq!(
            classify_hunk(&files[0], &files[0].hunks[0], plan()),
            ChangeKind::Feedback
        );
    }

    #[test]
    fn marker_match_is_case_insensitive_and_needs_colon() {
        let hunk = |line: &str| Hunk {
            header: "@@ -1 +1 @@".to_string(),
            lines: vec![format!("+{line}")],
        };
        let file = FileDiff {
            path: "src/lib.rs".to_string(),
            headers: vec!["diff --git a/src/lib.rs b/src/lib.rs".to_string()],
            hunks: Vec::new(),
        };
        for line in ["// todo: later", "# FIXME: broken", "/* hack: */", "xxx: odd", "fix: it"] {
            assert_eq!(classify_hunk(&file, &hunk(line), plan()), ChangeKind::Human, "{line}");
        }
        for line in ["// todo later", "let todos = 1;", "prefix: none"] {
            assert_eq!(classify_hunk(&file, &hunk(line), plan()), ChangeKind::Fix, "{line}");
        }
    }

    #[test]
    fn removed_marker_lines_do_not_count() {
        let file = FileDiff {
            path: "src/lib.rs".to_string(),
            headers: Vec::new(),
            hunks: Vec::new(),
        };
        let hunk = Hunk {
            header: "@@ -1 +0,0 @@".to_string(),
            lines: vec!["-// TODO: done now".to_string()],
        };
        assert_eq!(classify_hunk(&file, &hunk, plan()), ChangeKind::Fix);
    }

    #[test]
    fn plan_path_matching_ignores_dot_prefix() {
        let diff = MIXED.replace("b/TODO.md", "b/./TODO.md");
        let classified = classify_diff(&diff, Path::new("./TODO.md"));
        assert_eq!(classified.hunk_count(ChangeKind::Feedback), 1);
    }

    #[test]
    fn categories_partition_the_hunks() {
        let classified = classify_diff(MIXED, plan());
        let mut union = BTreeSet::new();
        let mut total = 0;
        for kind in classified.kinds() {
            let files = classified.files(kind);
            total += files.iter().map(|f| f.hunks.len()).sum::<usize>();
            union.extend(hunk_set(files));
        }
        assert_eq!(union, hunk_set(&parse_diff(MIXED)));
        assert_eq!(total, 3, "no hunk duplicated");
    }

    #[test]
    fn reclassifying_a_category_patch_is_stable() {
        let classified = classify_diff(MIXED, plan());
        for kind in classified.kinds() {
            let patch = classified.patch(kind).expect("patch");
            assert_eq!(classify_diff(&patch, plan()).kinds(), vec![kind]);
        }
    }

    #[test]
    fn category_patch_keeps_file_headers() {
        let classified = classify_diff(MIXED, plan());
        let fix = classified.patch(ChangeKind::Fix).expect("fix patch");
        assert!(fix.starts_with(
            "diff --git a/src/app.ts b/src/app.ts\nindex 1111111..2222222 100644\n--- a/src/app.ts\n+++ b/src/app.ts\n@@ -20,2"
        ));
        assert!(!fix.contains("TODO.md"));
    }

    #[test]
    fn prefix_picks_highest_priority() {
        assert_eq!(classify_prefix(MIXED, plan()), Marker::Feedback);
        assert_eq!(classify_prefix("", plan()), Marker::Human);
    }

    #[test]
    fn garbage_classifies_to_nothing() {
        let classified = classify_diff("random text\n@@ nope", plan());
        assert!(classified.is_empty());
        assert!(classified.kinds().is_empty());
    }
}
