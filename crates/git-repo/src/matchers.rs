//! Path matchers (H): ignore, attributes, and sparse-checkout (cone +
//! pattern modes) share one glob grammar.

use std::collections::BTreeMap;

use regex::Regex;

/// Compile a glob pattern into an anchored regex: `**` matches any
/// characters including `/`; `*` matches any character except `/`; `?`
/// matches a single non-`/` character; everything else is regex-escaped
/// and matched literally.
fn compile_glob(pattern: &str) -> Regex {
    let mut out = String::from("^");
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                out.push_str(".*");
                i += 2;
            }
            '*' => {
                out.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            c => {
                out.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }
    }
    out.push('$');
    Regex::new(&out).expect("compiled glob is always a valid regex")
}

/// Evaluate an ordered list of ignore patterns against `path`. `#` lines
/// and blank lines are skipped by the caller before reaching this
/// function (patterns here are already filtered). A `!`-prefixed pattern
/// un-ignores on match; the final matching rule wins.
#[must_use]
pub fn evaluate_ignore_patterns(path: &str, patterns: &[String]) -> bool {
    let mut ignored = false;
    for raw in patterns {
        if raw.is_empty() || raw.starts_with('#') {
            continue;
        }
        let (negate, glob) = match raw.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, raw.as_str()),
        };
        if compile_glob(glob).is_match(path) {
            ignored = !negate;
        }
    }
    ignored
}

/// One attribute assignment: `key` alone (`set`), `-key` (`unset`), or
/// `key=value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// `key` with no `=value` suffix.
    Set,
    /// `-key`.
    Unset,
    /// `key=value`.
    Value(String),
}

/// A `pattern -> [assignments]` rule, as parsed from a `.gitattributes`-
/// shaped file.
pub struct AttrRule {
    /// The glob pattern this rule applies to.
    pub pattern: String,
    /// The attribute assignments this rule carries.
    pub assignments: Vec<(String, AttrValue)>,
}

/// Parse one assignment token (`key`, `-key`, or `key=value`).
#[must_use]
pub fn parse_assignment(token: &str) -> (String, AttrValue) {
    if let Some(key) = token.strip_prefix('-') {
        (key.to_owned(), AttrValue::Unset)
    } else if let Some((key, value)) = token.split_once('=') {
        (key.to_owned(), AttrValue::Value(value.to_owned()))
    } else {
        (token.to_owned(), AttrValue::Set)
    }
}

/// Collect `{key: value}` from every rule whose pattern matches `path`.
/// Later rules overwrite earlier ones for the same key, matching the
/// ordered-evaluation semantics shared with ignore patterns.
#[must_use]
pub fn evaluate_attributes(path: &str, rules: &[AttrRule]) -> BTreeMap<String, AttrValue> {
    let mut out = BTreeMap::new();
    for rule in rules {
        if compile_glob(&rule.pattern).is_match(path) {
            for (key, value) in &rule.assignments {
                out.insert(key.clone(), value.clone());
            }
        }
    }
    out
}

/// Normalize a set of sparse-checkout (or ignore/attribute) rules: trim
/// whitespace, convert backslashes to forward slashes, strip leading and
/// trailing slashes (except the literal `.` rule), deduplicate, and sort
/// lexicographically.
#[must_use]
pub fn normalize_rules(rules: &[String]) -> Vec<String> {
    let mut out: Vec<String> = rules
        .iter()
        .map(|r| r.trim().replace('\\', "/"))
        .map(|r| {
            if r == "." {
                r
            } else {
                r.trim_matches('/').to_owned()
            }
        })
        .filter(|r| !r.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Sparse-checkout cone mode: a rule is either `.` (the root, matches
/// everything) or a slash-separated prefix; a path matches iff its
/// segment prefix equals the rule's segments.
#[must_use]
pub fn sparse_cone_matches(path: &str, rules: &[String]) -> bool {
    let segments: Vec<&str> = path.split('/').collect();
    rules.iter().any(|rule| {
        if rule == "." {
            return true;
        }
        let rule_segments: Vec<&str> = rule.split('/').collect();
        rule_segments.len() <= segments.len() && rule_segments == segments[..rule_segments.len()]
    })
}

/// Sparse-checkout pattern mode: each rule is a glob as defined above.
#[must_use]
pub fn sparse_pattern_matches(path: &str, rules: &[String]) -> bool {
    rules.iter().any(|rule| compile_glob(rule).is_match(path))
}

/// Select every path from `candidates` that matches the given sparse rule
/// set in cone mode, sorted.
#[must_use]
pub fn select_sparse_paths_cone(candidates: &[String], rules: &[String]) -> Vec<String> {
    let mut out: Vec<String> = candidates
        .iter()
        .filter(|p| sparse_cone_matches(p, rules))
        .cloned()
        .collect();
    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_last_match_wins() {
        let patterns = vec!["*.log".to_owned(), "!important.log".to_owned()];
        assert!(evaluate_ignore_patterns("debug.log", &patterns));
        assert!(!evaluate_ignore_patterns("important.log", &patterns));
    }

    #[test]
    fn ignore_skips_comments_and_blanks() {
        let patterns = vec!["# comment".to_owned(), "".to_owned(), "*.o".to_owned()];
        assert!(evaluate_ignore_patterns("a.o", &patterns));
        assert!(!evaluate_ignore_patterns("a.c", &patterns));
    }

    #[test]
    fn double_star_crosses_slashes() {
        let patterns = vec!["**/build".to_owned()];
        assert!(evaluate_ignore_patterns("a/b/build", &patterns));
    }

    #[test]
    fn single_star_does_not_cross_slash() {
        let patterns = vec!["*.rs".to_owned()];
        assert!(!evaluate_ignore_patterns("src/lib.rs", &patterns));
        assert!(evaluate_ignore_patterns("lib.rs", &patterns));
    }

    #[test]
    fn attribute_assignment_forms() {
        assert_eq!(parse_assignment("text"), ("text".to_owned(), AttrValue::Set));
        assert_eq!(parse_assignment("-text"), ("text".to_owned(), AttrValue::Unset));
        assert_eq!(
            parse_assignment("diff=rust"),
            ("diff".to_owned(), AttrValue::Value("rust".to_owned()))
        );
    }

    #[test]
    fn sparse_cone_root_matches_everything() {
        assert!(sparse_cone_matches("a/b.txt", &[".".to_owned()]));
    }

    #[test]
    fn sparse_cone_prefix_match() {
        let rules = vec!["src".to_owned(), "docs".to_owned()];
        let selected = select_sparse_paths_cone(
            &[
                "src/index.ts".to_owned(),
                "docs/g.md".to_owned(),
                "tests/x.txt".to_owned(),
            ],
            &rules,
        );
        assert_eq!(selected, vec!["docs/g.md".to_owned(), "src/index.ts".to_owned()]);
    }

    #[test]
    fn normalize_rules_trims_and_sorts() {
        let rules = vec!["/src/".to_owned(), " docs ".to_owned(), "src/".to_owned(), ".".to_owned()];
        assert_eq!(
            normalize_rules(&rules),
            vec![".".to_owned(), "docs".to_owned(), "src".to_owned()]
        );
    }
}
