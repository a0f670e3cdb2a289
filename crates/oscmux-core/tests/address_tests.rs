//! Address validation and pattern matching tests

use oscmux_core::{matches, validate_address, AddressPattern};
use std::time::{Duration, Instant};

#[test]
fn test_pattern_parse() {
    let pattern = AddressPattern::parse("/lights/*/level").unwrap();
    assert_eq!(pattern.as_str(), "/lights/*/level");
    assert!(!pattern.is_literal());
    assert_eq!(pattern.to_string(), "/lights/*/level");
}

#[test]
fn test_pattern_parse_errors() {
    assert!(AddressPattern::parse("").is_err());
    assert!(AddressPattern::parse("lights/*").is_err());
    assert!(AddressPattern::parse("/lights/[12").is_err());
    assert!(AddressPattern::parse("/lights/{a,b").is_err());
}

#[test]
fn test_star_within_segment() {
    assert!(matches("/foo/*", "/foo/bar"));
    assert!(!matches("/foo/*", "/foo/bar/baz"));
    assert!(!matches("/foo/*", "/foo"));
    assert!(matches("/lights/*/level", "/lights/12/level"));
    assert!(!matches("/lights/*/level", "/lights/12/color"));
}

#[test]
fn test_character_classes() {
    assert!(matches("/a/[bc]d", "/a/bd"));
    assert!(matches("/a/[bc]d", "/a/cd"));
    assert!(!matches("/a/[bc]d", "/a/ad"));
    assert!(matches("/fader/[1-4]", "/fader/3"));
    assert!(!matches("/fader/[1-4]", "/fader/5"));
    assert!(matches("/fader/[!1-4]", "/fader/5"));
}

#[test]
fn test_alternation() {
    assert!(matches("/x/{on,off}", "/x/on"));
    assert!(matches("/x/{on,off}", "/x/off"));
    assert!(!matches("/x/{on,off}", "/x/maybe"));
    assert!(matches("/{left,right}/gain", "/right/gain"));
}

#[test]
fn test_many_stars_on_long_segment_fail_fast() {
    let pattern = AddressPattern::parse("/*a*a*a*a*a*b").unwrap();
    let address = format!("/{}", "a".repeat(200));

    let start = Instant::now();
    assert!(!pattern.matches(&address));
    assert!(start.elapsed() < Duration::from_secs(1));

    assert!(pattern.matches(&format!("/{}b", "a".repeat(200))));
    assert!(matches("/*a*", "/xxayy"));
    assert!(!matches("/*a*", "/xxyy"));
}

#[test]
fn test_mixed_wildcards() {
    let pattern = AddressPattern::parse("/mix/{bus,aux}[0-9]/*/mute").unwrap();
    assert!(pattern.matches("/mix/bus3/ch1/mute"));
    assert!(pattern.matches("/mix/aux0/x/mute"));
    assert!(!pattern.matches("/mix/bus/ch1/mute"));
    assert!(!pattern.matches("/mix/aux10/ch1/mute"));
}

#[test]
fn test_question_mark_single_char() {
    assert!(matches("/ch/??", "/ch/01"));
    assert!(!matches("/ch/??", "/ch/1"));
    assert!(matches("/ch/?x", "/ch/éx"));
}

#[test]
fn test_literal_pattern_exact_only() {
    let pattern = AddressPattern::parse("/status").unwrap();
    assert!(pattern.is_literal());
    assert!(pattern.matches("/status"));
    assert!(!pattern.matches("/status/"));
    assert!(!pattern.matches("/Status"));
}

#[test]
fn test_validate_address() {
    assert!(validate_address("/lights/1").is_ok());
    assert!(validate_address("").is_err());
    assert!(validate_address("lights").is_err());
    assert!(validate_address("/lights/{1,2}").is_err());
    assert!(validate_address("/lights/?").is_err());
}
