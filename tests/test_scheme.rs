//! Tests for scheme negotiation

use devproxy::error::ConfigError;
use devproxy::proxy::scheme::{SchemePolicy, negotiate};

#[test]
fn test_literal_scheme_is_returned_unchanged() {
    let only_ftp = SchemePolicy::allowed(["ftp"]);

    assert_eq!(negotiate("https", &only_ftp).unwrap(), "https");
    assert_eq!(negotiate("http", &SchemePolicy::AllowAll).unwrap(), "http");
    assert_eq!(negotiate("custom", &only_ftp).unwrap(), "custom");
}

#[test]
fn test_allow_all_picks_first_preference() {
    assert_eq!(negotiate("https+http", &SchemePolicy::AllowAll).unwrap(), "https");
    assert_eq!(negotiate("http+https", &SchemePolicy::AllowAll).unwrap(), "http");
}

#[test]
fn test_falls_back_to_allowed_preference() {
    let policy = SchemePolicy::allowed(["http"]);
    assert_eq!(negotiate("https+http", &policy).unwrap(), "http");
}

#[test]
fn test_allowed_set_is_case_insensitive() {
    let policy = SchemePolicy::allowed(["HTTP"]);
    assert_eq!(negotiate("https+http", &policy).unwrap(), "http");
}

#[test]
fn test_all_rejected_names_every_candidate() {
    let policy = SchemePolicy::allowed(["ftp"]);
    let err = negotiate("https+http", &policy).unwrap_err();

    assert_eq!(
        err,
        ConfigError::SchemesRejected {
            candidates: vec!["https".to_string(), "http".to_string()],
        }
    );

    let message = err.to_string();
    assert!(message.contains("https, http"));
}

#[test]
fn test_empty_allow_set_rejects_compound_scheme() {
    let policy = SchemePolicy::allowed(Vec::<String>::new());
    assert!(negotiate("https+http", &policy).is_err());
}
