//! GitHub-style path and branch filters
//!
//! Patterns follow the workflow filter syntax:
//! - `*` matches zero or more characters except `/`
//! - `**` matches zero or more of any character
//! - `?` and `+` quantify the preceding character
//! - `[...]` is a character class
//! - a leading `!` negates the pattern
//!
//! Patterns are evaluated in order and the last match wins, so a negated
//! pattern placed after a broad one re-includes the paths it matches.

use regex::Regex;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Errors raised while compiling filter patterns
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("filter pattern cannot be empty")]
    Empty,

    #[error("invalid filter pattern '{pattern}': {source}")]
    Invalid {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A single compiled pattern
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    negated: bool,
    regex: Regex,
}

impl PathPattern {
    /// Compiles a pattern, honouring a leading `!`
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let trimmed = raw.trim();
        let (negated, glob) = match trimmed.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        if glob.is_empty() {
            return Err(PatternError::Empty);
        }

        let regex = Regex::new(&glob_to_regex(glob)).map_err(|source| PatternError::Invalid {
            pattern: raw.to_string(),
            source,
        })?;

        Ok(Self {
            raw: trimmed.to_string(),
            negated,
            regex,
        })
    }

    /// Returns the pattern as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Checks the glob part of the pattern against a path, ignoring negation
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(normalize(path))
    }
}

/// Ordered list of patterns with last-match-wins semantics
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    patterns: Vec<PathPattern>,
}

impl PathFilter {
    /// Compiles every pattern in order
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PatternError> {
        let patterns = patterns
            .iter()
            .map(|p| PathPattern::parse(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Returns true when the last pattern matching `path` is not negated
    pub fn is_excluded(&self, path: &str) -> bool {
        self.patterns
            .iter()
            .rev()
            .find(|p| p.matches(path))
            .is_some_and(|p| !p.is_negated())
    }

    /// Returns true when every path is excluded
    ///
    /// An empty path list is never considered excluded.
    pub fn excludes_all<S: AsRef<str>>(&self, paths: &[S]) -> bool {
        !paths.is_empty() && paths.iter().all(|p| self.is_excluded(p.as_ref()))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(PathPattern::as_str)
    }
}

impl Serialize for PathFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.patterns())
    }
}

fn normalize(path: &str) -> &str {
    path.strip_prefix("./").unwrap_or(path)
}

fn glob_to_regex(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    out.push('^');

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    // `**/` may also match no directory at all
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' | '+' => out.push(chars[i]),
            '[' => match chars[i + 1..].iter().position(|c| *c == ']') {
                Some(offset) => {
                    let end = i + 1 + offset;
                    out.extend(&chars[i..=end]);
                    i = end + 1;
                    continue;
                }
                None => out.push_str(r"\["),
            },
            c => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
            }
        }
        i += 1;
    }

    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(patterns: &[&str]) -> PathFilter {
        PathFilter::new(patterns).unwrap()
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let f = filter(&[".github/workflows/*"]);
        assert!(f.is_excluded(".github/workflows/test.yml"));
        assert!(!f.is_excluded(".github/workflows/nested/test.yml"));
        assert!(!f.is_excluded(".github/dependabot.yml"));
    }

    #[test]
    fn test_double_star_crosses_segments() {
        let f = filter(&["docs/**", "**.md"]);
        assert!(f.is_excluded("docs/source/conf.py"));
        assert!(f.is_excluded("README.md"));
        assert!(f.is_excluded("share/templates/notes.md"));
        assert!(!f.is_excluded("jupyterhub/app.py"));
        assert!(!f.is_excluded("documentation.txt"));
    }

    #[test]
    fn test_double_star_slash_matches_root() {
        let f = filter(&["**/CHANGELOG.rst"]);
        assert!(f.is_excluded("CHANGELOG.rst"));
        assert!(f.is_excluded("docs/CHANGELOG.rst"));
    }

    #[test]
    fn test_negation_last_match_wins() {
        let f = filter(&[".github/workflows/*", "!.github/workflows/release.yml"]);
        assert!(f.is_excluded(".github/workflows/test.yml"));
        assert!(!f.is_excluded(".github/workflows/release.yml"));
    }

    #[test]
    fn test_dot_is_literal() {
        let f = filter(&["**.rst"]);
        assert!(!f.is_excluded("docs/frst"));
        assert!(f.is_excluded("docs/index.rst"));
    }

    #[test]
    fn test_leading_dot_slash_is_ignored() {
        let f = filter(&["docs/**"]);
        assert!(f.is_excluded("./docs/index.md"));
    }

    #[test]
    fn test_character_class() {
        let f = filter(&["requirements[-_]dev.txt"]);
        assert!(f.is_excluded("requirements-dev.txt"));
        assert!(f.is_excluded("requirements_dev.txt"));
        assert!(!f.is_excluded("requirements.txt"));
    }

    #[test]
    fn test_excludes_all() {
        let f = filter(&["docs/**", "**.md"]);
        assert!(f.excludes_all(&["docs/a.md", "README.md"]));
        assert!(!f.excludes_all(&["docs/a.md", "setup.py"]));
        assert!(!f.excludes_all::<&str>(&[]));
    }

    #[test]
    fn test_branch_patterns() {
        let f = filter(&["dependabot/**", "pre-commit-ci-update-config"]);
        assert!(f.is_excluded("dependabot/npm_and_yarn/foo-1.2"));
        assert!(f.is_excluded("pre-commit-ci-update-config"));
        assert!(!f.is_excluded("main"));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(matches!(PathPattern::parse("!"), Err(PatternError::Empty)));
        assert!(matches!(PathPattern::parse("  "), Err(PatternError::Empty)));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let err = PathPattern::parse("docs/[z-a].md").unwrap_err();
        assert!(err.to_string().contains("docs/[z-a].md"));
    }

    #[test]
    fn test_serializes_as_raw_patterns() {
        let f = filter(&["docs/**", "!docs/keep.md"]);
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json, serde_json::json!(["docs/**", "!docs/keep.md"]));
    }
}
