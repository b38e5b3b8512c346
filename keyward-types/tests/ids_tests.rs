use keyward_types::{identifiers_match, SystemIdentifier};
use proptest::prelude::*;

fn id(name: &str, value: &str) -> SystemIdentifier {
    SystemIdentifier::new(name, value)
}

#[test]
fn exact_match_ignores_order() {
    let authorized = vec![id("hostname", "a"), id("machine", "b")];
    let current = vec![id("machine", "b"), id("hostname", "a")];
    assert!(identifiers_match(&authorized, &current));
}

#[test]
fn missing_identifier_fails() {
    let authorized = vec![id("hostname", "a"), id("machine", "b")];
    let current = vec![id("hostname", "a")];
    assert!(!identifiers_match(&authorized, &current));
}

#[test]
fn extra_identifier_fails() {
    let authorized = vec![id("hostname", "a")];
    let current = vec![id("hostname", "a"), id("machine", "b")];
    assert!(!identifiers_match(&authorized, &current));
}

#[test]
fn changed_value_fails() {
    let authorized = vec![id("hostname", "a")];
    let current = vec![id("hostname", "z")];
    assert!(!identifiers_match(&authorized, &current));
}

#[test]
fn unbound_license_only_matches_empty_machine() {
    assert!(identifiers_match(&[], &[]));
    assert!(!identifiers_match(&[], &[id("hostname", "a")]));
}

#[test]
fn display_format() {
    assert_eq!(id("os", "linux").to_string(), "os=linux");
}

proptest! {
    /// A set always matches any permutation of itself.
    #[test]
    fn match_is_permutation_invariant(values in prop::collection::vec("[a-z]{1,8}", 0..6)) {
        let authorized: Vec<_> = values.iter().map(|v| id("k", v)).collect();
        let mut current = authorized.clone();
        current.reverse();
        prop_assert!(identifiers_match(&authorized, &current));
    }
}
