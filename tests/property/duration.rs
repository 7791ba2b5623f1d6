//! Property tests for ISO-8601 duration parsing.
//!
//! Invariants tested:
//! - The parser never panics
//! - Well-formed component durations parse to their exact value
//! - Case does not matter
//! - Strings outside the grammar are rejected

use async_test_timeout::{DurationParseError, parse_duration};
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Property: arbitrary input never panics
    #[test]
    fn parser_never_panics(input in "\\PC{0,32}") {
        let _ = parse_duration(&input);
    }

    /// Property: near-miss input built from grammar characters never panics
    #[test]
    fn grammar_soup_never_panics(input in "[-+PTDHMS0-9.,]{0,24}") {
        let _ = parse_duration(&input);
    }

    /// Property: day/hour/minute/second components add up exactly
    #[test]
    fn components_parse_exactly(
        days in 0u64..1_000,
        hours in 0u64..100,
        minutes in 0u64..100,
        seconds in 0u64..100,
        nanos in 0u32..1_000_000_000,
    ) {
        let input = format!("P{days}DT{hours}H{minutes}M{seconds}.{nanos:09}S");
        let expected = Duration::new(
            days * 86_400 + hours * 3_600 + minutes * 60 + seconds,
            nanos,
        );

        prop_assert_eq!(parse_duration(&input), Ok(expected));
        prop_assert_eq!(parse_duration(&input.to_lowercase()), Ok(expected));
    }

    /// Property: negative totals are rejected, never wrapped
    #[test]
    fn negative_totals_rejected(seconds in 1u64..1_000_000) {
        prop_assert_eq!(
            parse_duration(&format!("-PT{seconds}S")),
            Err(DurationParseError::Negative)
        );
    }

    /// Property: plain words are never durations
    #[test]
    fn words_rejected(word in "[a-oq-zA-OQ-Z][a-zA-Z]{0,10}") {
        let rejected = matches!(
            parse_duration(&word),
            Err(DurationParseError::Syntax { .. })
        );
        prop_assert!(rejected);
    }
}
