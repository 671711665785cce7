//! Image tag calculation
//!
//! Turns a git ref into the list of tags an image is pushed under. Floating
//! tags (`X.Y`, `X`, `latest`) only move forward: a backport release on an
//! older line never takes them over from a newer existing release.

use regex::Regex;
use semver::Version;

/// Parses a tag name as a version, accepting an optional leading `v`
pub fn parse_version_tag(tag: &str) -> Option<Version> {
    let raw = tag.strip_prefix('v').unwrap_or(tag);
    Version::parse(raw).ok()
}

/// Computes the ordered tag list for `git_ref`
///
/// `prefix` is prepended verbatim to every tag (e.g. `jupyterhub/jupyterhub:`).
/// `known_tags` are the repository's existing tag names; anything that does
/// not parse as a stable version is ignored. Returns an empty list when no tag
/// applies; callers substitute their default tag.
pub fn calculate_tags(
    git_ref: &str,
    prefix: &str,
    known_tags: &[String],
    branch_pattern: &Regex,
) -> Vec<String> {
    if let Some(tag) = git_ref.strip_prefix("refs/tags/") {
        return version_tags(tag, prefix, known_tags);
    }

    if let Some(branch) = git_ref.strip_prefix("refs/heads/") {
        if !branch.is_empty() && branch_pattern.is_match(branch) {
            return vec![format!("{}{}", prefix, branch)];
        }
    }

    Vec::new()
}

fn version_tags(tag: &str, prefix: &str, known_tags: &[String]) -> Vec<String> {
    let Some(version) = parse_version_tag(tag) else {
        return Vec::new();
    };

    let mut tags = vec![format!("{}{}", prefix, tag)];
    if !version.pre.is_empty() {
        return tags;
    }

    let newer: Vec<Version> = known_tags
        .iter()
        .filter_map(|t| parse_version_tag(t))
        .filter(|v| v.pre.is_empty() && *v > version)
        .collect();

    let newer_minor = newer
        .iter()
        .any(|v| v.major == version.major && v.minor == version.minor);
    let newer_major = newer.iter().any(|v| v.major == version.major);

    if !newer_minor {
        tags.push(format!("{}{}.{}", prefix, version.major, version.minor));
    }
    if !newer_major {
        tags.push(format!("{}{}", prefix, version.major));
    }
    if newer.is_empty() {
        tags.push(format!("{}latest", prefix));
    }

    tags
}
