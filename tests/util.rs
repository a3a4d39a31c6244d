//! Shared test utilities for integration tests
//!
//! Provides fixture files for the `blink` binary tests.

#![allow(dead_code)]

use assert_fs::prelude::*;

/// Two features; FEAT-1 has four linked bugs (one open), FEAT-2 none.
pub const FEATURES_JSON: &str = r#"[
  {"key": "FEAT-1", "summary": "User login"},
  {"key": "FEAT-2", "summary": "Data export"}
]"#;

/// Flat and tracker-shaped bugs mixed; all dates are far in the past.
pub const BUGS_JSON: &str = r#"[
  {"key": "BUG-1", "summary": "Login page crash on submit", "status": "Open",
   "severity": "Major", "priority": "High", "created": "2020-01-01T00:00:00Z",
   "linked_feature": "FEAT-1"},
  {"key": "BUG-2", "summary": "Password reset mail missing", "status": "Resolved",
   "severity": "Minor", "priority": "Low", "created": "2020-01-01T00:00:00Z",
   "resolutiondate": "2020-01-03T00:00:00Z", "linked_feature": "FEAT-1"},
  {"key": "BUG-3", "summary": "SSO redirect loop", "status": "Closed",
   "severity": "Major", "priority": "High", "created": "2020-02-01T00:00:00Z",
   "resolutiondate": "2020-02-05T00:00:00Z", "linked_feature": "FEAT-1"},
  {"key": "BUG-4",
   "fields": {"summary": "Remember-me checkbox ignored",
              "status": {"name": "Done"}, "priority": {"name": "Lowest"},
              "severity": {"value": "Trivial"},
              "created": "2020-03-01T00:00:00.000+0000",
              "resolutiondate": "2020-03-02T00:00:00.000+0000"},
   "linked_feature": "FEAT-1"},
  {"key": "BUG-5", "summary": "Unlinked bug", "status": "Open",
   "created": "2020-01-01", "linked_feature": "undetermined"}
]"#;

/// Temp dir holding `features.json` and `bugs.json`.
pub fn make_fixture() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    tmp.child("features.json")
        .write_str(FEATURES_JSON)
        .expect("write features");
    tmp.child("bugs.json")
        .write_str(BUGS_JSON)
        .expect("write bugs");
    tmp
}
