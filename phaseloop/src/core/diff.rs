//! Unified diff parsing and reconstruction.
//!
//! A parsed diff keeps each file's header block verbatim so that any subset of
//! its hunks can be rendered back into a patch `git apply --cached` accepts.

use std::sync::LazyLock;

use regex::Regex;

static HUNK_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("hunk header regex")
});

/// One file section of a unified diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// Repository-relative path (post-image side when available).
    pub path: String,
    /// `diff --git` line plus every header line before the first hunk.
    pub headers: Vec<String>,
    pub hunks: Vec<Hunk>,
}

/// One `@@` hunk and its body lines (prefix characters included).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hunk {
    pub header: String,
    pub lines: Vec<String>,
}

/// Old/new line ranges declared by a hunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkRange {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
}

impl FileDiff {
    /// True when the diff creates the file.
    pub fn is_new(&self) -> bool {
        self.headers
            .iter()
            .any(|line| line.starts_with("new file mode") || line == "--- /dev/null")
    }

    /// Copy of this file section keeping only the hunks accepted by `keep`.
    pub fn with_hunks<F: Fn(&Hunk) -> bool>(&self, keep: F) -> FileDiff {
        FileDiff {
            path: self.path.clone(),
            headers: self.headers.clone(),
            hunks: self.hunks.iter().filter(|h| keep(h)).cloned().collect(),
        }
    }
}

impl Hunk {
    /// Added lines with the leading `+` stripped.
    pub fn added_lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|line| line.strip_prefix('+'))
    }

    pub fn range(&self) -> Option<HunkRange> {
        parse_hunk_header(&self.header)
    }
}

/// Parse `@@ -a,b +c,d @@` (counts default to 1 when omitted).
pub fn parse_hunk_header(header: &str) -> Option<HunkRange> {
    let caps = HUNK_HEADER_RE.captures(header)?;
    let num = |idx: usize, default: usize| -> Option<usize> {
        match caps.get(idx) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(default),
        }
    };
    Some(HunkRange {
        old_start: num(1, 0)?,
        old_count: num(2, 1)?,
        new_start: num(3, 0)?,
        new_count: num(4, 1)?,
    })
}

/// Parse unified diff text into per-file sections.
///
/// Text before the first `diff --git` line is ignored. Never fails: malformed
/// input yields whatever file sections could be recognized.
pub fn parse_diff(text: &str) -> Vec<FileDiff> {
    let mut files = Vec::new();
    let mut current: Option<FileDiff> = None;

    for line in text.lines() {
        if line.starts_with("diff --git ") {
            if let Some(done) = current.take() {
                files.push(done);
            }
            current = Some(FileDiff {
                path: path_from_diff_git(line),
                headers: vec![line.to_string()],
                hunks: Vec::new(),
            });
            continue;
        }

        let Some(file) = current.as_mut() else {
            continue;
        };

        if line.starts_with("@@") {
            file.hunks.push(Hunk {
                header: line.to_string(),
                lines: Vec::new(),
            });
            continue;
        }

        if let Some(hunk) = file.hunks.last_mut() {
            hunk.lines.push(line.to_string());
            continue;
        }

        if let Some(target) = line.strip_prefix("+++ ")
            && target != "/dev/null"
        {
            file.path = strip_side_prefix(target).to_string();
        }
        file.headers.push(line.to_string());
    }

    if let Some(done) = current {
        files.push(done);
    }
    files
}

/// Render file sections back into patch text.
///
/// Files without hunks are skipped; each rendered line ends with `\n`.
pub fn render_patch(files: &[FileDiff]) -> String {
    let mut out = String::new();
    for file in files.iter().filter(|f| !f.hunks.is_empty()) {
        for header in &file.headers {
            out.push_str(header);
            out.push('\n');
        }
        for hunk in &file.hunks {
            out.push_str(&hunk.header);
            out.push('\n');
            for line in &hunk.lines {
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    out
}

fn path_from_diff_git(line: &str) -> String {
    let rest = line.trim_start_matches("diff --git ");
    match rest.rfind(" b/") {
        Some(idx) => rest[idx + 3..].to_string(),
        None => strip_side_prefix(rest).to_string(),
    }
}

fn strip_side_prefix(path: &str) -> &str {
    let path = path.trim();
    path.strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FILES: &str = "\
diff --git a/src/app.ts b/src/app.ts
index 1111111..2222222 100644
--- a/src/app.ts
+++ b/src/app.ts
@@ -1,3 +1,4 @@
 const a = 1;
+// TODO: fix me
 const b = 2;
 const c = 3;
@@ -10,2 +11,2 @@ function f() {
-  return 1;
+  return 2;
 }
diff --git a/notes.md b/notes.md
new file mode 100644
index 0000000..3333333
--- /dev/null
+++ b/notes.md
@@ -0,0 +1 @@
+hello
";

    #[test]
    fn parses_files_and_hunks() {
        let files = parse_diff(TWO_FILES);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "src/app.ts");
        assert_eq!(files[0].headers.len(), 4);
        assert_eq!(files[0].hunks.len(), 2);
        assert_eq!(files[0].hunks[1].lines, vec!["-  return 1;", "+  return 2;", " }"]);
        assert!(!files[0].is_new());

        assert_eq!(files[1].path, "notes.md");
        assert!(files[1].is_new());
        assert_eq!(files[1].hunks[0].added_lines().collect::<Vec<_>>(), vec!["hello"]);
    }

    #[test]
    fn render_reproduces_input() {
        let files = parse_diff(TWO_FILES);
        assert_eq!(render_patch(&files), TWO_FILES);
    }

    #[test]
    fn render_keeps_headers_for_hunk_subset() {
        let files = parse_diff(TWO_FILES);
        let first_only = files[0].with_hunks(|h| h.header.starts_with("@@ -1,3"));
        let patch = render_patch(&[first_only]);
        assert!(patch.starts_with("diff --git a/src/app.ts b/src/app.ts\nindex"));
        assert!(patch.contains("+// TODO: fix me"));
        assert!(!patch.contains("return 2"));
    }

    #[test]
    fn empty_and_garbage_input_parse_to_nothing() {
        assert!(parse_diff("").is_empty());
        assert!(parse_diff("not a diff\n+++ nope\n").is_empty());
    }

    #[test]
    fn deleted_file_keeps_path_from_diff_line() {
        let diff = "\
diff --git a/old.txt b/old.txt
deleted file mode 100644
index 1111111..0000000
--- a/old.txt
+++ /dev/null
@@ -1 +0,0 @@
-bye
";
        let files = parse_diff(diff);
        assert_eq!(files[0].path, "old.txt");
        assert!(!files[0].is_new());
    }

    #[test]
    fn hunk_header_counts_default_to_one() {
        let range = parse_hunk_header("@@ -7 +8,0 @@").expect("range");
        assert_eq!(
            range,
            HunkRange {
                old_start: 7,
                old_count: 1,
                new_start: 8,
                new_count: 0,
            }
        );
        assert!(parse_hunk_header("@@ bogus @@").is_none());
    }
}
