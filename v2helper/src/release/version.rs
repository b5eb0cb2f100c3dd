//! Version token handling.
//!
//! Release tags look like `v4.23.0`; `v2ray --version` prints
//! `V2Ray 4.23.0 (...)`. Both are normalised to the tag form.

use std::cmp::Ordering;

use semver::Version;

/// Normalise a version token to the `v`-prefixed tag form.
pub fn normalize_tag(raw: &str) -> String {
    let trimmed = raw.trim();
    let bare = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    format!("v{}", bare)
}

/// Extract the version token from `v2ray --version` output.
///
/// The token is the second word of the first line.
pub fn parse_version_output(output: &str) -> Option<String> {
    let first = output.lines().next()?;
    let token = first.split_whitespace().nth(1)?;
    Some(normalize_tag(token))
}

/// Compare two tags as semantic versions, if both parse.
pub fn compare_tags(a: &str, b: &str) -> Option<Ordering> {
    let a = parse_semver(a)?;
    let b = parse_semver(b)?;
    Some(a.cmp(&b))
}

fn parse_semver(tag: &str) -> Option<Version> {
    let bare = normalize_tag(tag);
    let bare = &bare[1..];

    Version::parse(bare).ok().or_else(|| {
        // Tags such as `v4.23` lack a patch component.
        let parts: Vec<&str> = bare.split('.').collect();
        match parts.as_slice() {
            [major, minor] => Version::parse(&format!("{}.{}.0", major, minor)).ok(),
            [major] => Version::parse(&format!("{}.0.0", major)).ok(),
            _ => None,
        }
    })
}
