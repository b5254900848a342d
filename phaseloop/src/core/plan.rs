//! Plan file reader: `## ` packages holding checkbox items.
//!
//! ```markdown
//! ## Auth
//! - [ ] Add login route
//!   Use the existing session middleware.
//! - [x] Hash passwords
//!
//! ## Learnings
//! - sessions live in redis
//! ```
//!
//! The `## Learnings` section is free text, never a package.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Heading of the free-text section the learn phase maintains.
pub const LEARNINGS_HEADING: &str = "Learnings";

/// Package name for items that appear before any `## ` heading.
pub const DEFAULT_PACKAGE: &str = "Tasks";

static ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^( ?)[-*+] \[([ xX])\]\s*(.*)$").expect("plan item regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanItem {
    pub checked: bool,
    pub title: String,
    /// Indented continuation lines under the item, dedented and trimmed.
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    pub name: String,
    pub items: Vec<PlanItem>,
}

impl Package {
    pub fn has_unchecked(&self) -> bool {
        self.items.iter().any(|item| !item.checked)
    }
}

/// Heading text when `line` is an H2 heading.
pub fn h2_heading(line: &str) -> Option<&str> {
    line.strip_prefix("## ").map(str::trim)
}

pub fn is_learnings_heading(line: &str) -> bool {
    h2_heading(line).is_some_and(|name| name.eq_ignore_ascii_case(LEARNINGS_HEADING))
}

/// Parse packages in document order; item order is source order.
pub fn parse_packages(content: &str) -> Vec<Package> {
    let mut packages: Vec<Package> = Vec::new();
    // Index into `packages` of the section being read; `None` inside Learnings
    // or under an H1.
    let mut current: Option<usize> = None;
    let mut body: Vec<String> = Vec::new();
    let mut in_item = false;
    let mut seen_heading = false;

    let flush = |packages: &mut Vec<Package>, current: Option<usize>, body: &mut Vec<String>| {
        if let Some(item) = current
            .and_then(|idx| packages.get_mut(idx))
            .and_then(|pkg| pkg.items.last_mut())
        {
            item.body = body.join("\n").trim().to_string();
        }
        body.clear();
    };

    for line in content.lines() {
        if let Some(name) = h2_heading(line) {
            flush(&mut packages, current, &mut body);
            in_item = false;
            seen_heading = true;
            if name.eq_ignore_ascii_case(LEARNINGS_HEADING) {
                current = None;
            } else {
                packages.push(Package {
                    name: name.to_string(),
                    items: Vec::new(),
                });
                current = Some(packages.len() - 1);
            }
            continue;
        }
        if line.starts_with("# ") {
            flush(&mut packages, current, &mut body);
            in_item = false;
            current = None;
            continue;
        }

        if let Some(caps) = ITEM_RE.captures(line) {
            if current.is_none() && !seen_heading {
                packages.push(Package {
                    name: DEFAULT_PACKAGE.to_string(),
                    items: Vec::new(),
                });
                current = Some(packages.len() - 1);
                // Later top-level items before a heading share this package.
                seen_heading = true;
            }
            flush(&mut packages, current, &mut body);
            let Some(pkg) = current.and_then(|idx| packages.get_mut(idx)) else {
                in_item = false;
                continue;
            };
            pkg.items.push(PlanItem {
                checked: &caps[2] != " ",
                title: caps[3].trim().to_string(),
                body: String::new(),
            });
            in_item = true;
            continue;
        }

        if in_item {
            if line.trim().is_empty() || line.starts_with(char::is_whitespace) {
                body.push(line.trim().to_string());
            } else {
                flush(&mut packages, current, &mut body);
                in_item = false;
            }
        }
    }
    flush(&mut packages, current, &mut body);
    packages
}

/// True when any package holds an unchecked item.
pub fn has_unchecked_items(content: &str) -> bool {
    parse_packages(content).iter().any(Package::has_unchecked)
}

/// First package with unchecked work, narrowed to its unchecked items.
pub fn next_unchecked_package(packages: &[Package]) -> Option<Package> {
    packages.iter().find(|pkg| pkg.has_unchecked()).map(|pkg| Package {
        name: pkg.name.clone(),
        items: pkg.items.iter().filter(|i| !i.checked).cloned().collect(),
    })
}

/// True when the package named `name` exists and every item is checked.
pub fn package_is_complete(content: &str, name: &str) -> bool {
    parse_packages(content)
        .iter()
        .find(|pkg| pkg.name == name)
        .is_some_and(|pkg| !pkg.has_unchecked())
}
