//! Best-effort distro detection from install locations.
//!
//! Install trees and live images almost always carry the distro name and
//! often a version in their URL or file name (`.../fedora/releases/40/...`,
//! `ubuntu-24.04-live-server-amd64.iso`). This is a heuristic over that
//! convention; anything unrecognized comes back as `(None, None)` and the
//! caller falls through to its defaults.

use regex::Regex;

/// Family names paired with a version-capturing pattern. Matched against
/// the lowercased location; the first family whose name appears wins.
const FAMILY_PATTERNS: &[(&str, &str)] = &[
    ("fedora", r"fedora[-_/](?:releases/)?(\d+)"),
    ("ubuntu", r"ubuntu[-_/](\d{2}\.\d{2})"),
    ("debian", r"debian[-_/](\d+)"),
    ("centos", r"centos[-_/](?:stream[-_/])?(\d+)"),
    ("rhel", r"rhel[-_/]?(\d+(?:\.\d+)?)"),
    ("opensuse", r"opensuse[-_/](?:leap[-_/])?(\d+\.\d+)"),
    ("alpine", r"alpine[-_/](?:v)?(\d+\.\d+)"),
    ("windows", r"win(?:dows)?[-_/]?(\d+)"),
];

/// Extracts a (family, version) pair from an install location string.
pub fn detect_from_location(location: &str) -> (Option<String>, Option<String>) {
    let haystack = location.to_lowercase();
    for (family, pattern) in FAMILY_PATTERNS {
        if !haystack.contains(family) && !(*family == "windows" && haystack.contains("win")) {
            continue;
        }
        let version = Regex::new(pattern)
            .ok()
            .and_then(|re| re.captures(&haystack))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());
        return (Some(family.to_string()), version);
    }
    (None, None)
}
