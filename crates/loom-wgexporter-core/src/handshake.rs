// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Relative handshake age parsing.
//!
//! The status tool prints ages such as `7 days, 20 hours, 30 minutes, 15 seconds ago`,
//! always largest unit first. Parsing is positional: digit runs are read right to
//! left and weighted seconds, minutes, hours, days, years. The unit words are
//! never inspected.

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;

use crate::error::{ParseError, Result};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const YEAR: i64 = 365 * DAY;

/// Weights applied from the rightmost digit run.
const UNIT_FACTORS: [i64; 5] = [1, MINUTE, HOUR, DAY, YEAR];

static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+").unwrap());

/// Parses a handshake age against the current wall clock.
///
/// Returns `Ok(None)` for blank input (no handshake observed yet).
pub fn parse_handshake(text: &str) -> Result<Option<i64>> {
	parse_handshake_at(text, Utc::now().timestamp())
}

/// Parses a handshake age relative to `now` (epoch seconds).
pub fn parse_handshake_at(text: &str, now: i64) -> Result<Option<i64>> {
	let normalized = text.trim().to_lowercase();
	if normalized.is_empty() {
		return Ok(None);
	}

	let age = parse_age_secs(&normalized)?;
	now
		.checked_sub(age)
		.map(Some)
		.ok_or(ParseError::Overflow(normalized))
}

/// Sums the digit runs of `text` into a number of seconds.
pub fn parse_age_secs(text: &str) -> Result<i64> {
	let runs: Vec<&str> = DIGIT_RUN.find_iter(text).map(|m| m.as_str()).collect();
	if runs.len() > UNIT_FACTORS.len() {
		return Err(ParseError::TooManyComponents {
			input: text.to_string(),
			found: runs.len(),
		});
	}

	runs
		.iter()
		.rev()
		.zip(UNIT_FACTORS)
		.try_fold(0i64, |total, (run, factor)| {
			let value: i64 = run.parse().map_err(|_| ParseError::InvalidComponent {
				input: text.to_string(),
				component: run.to_string(),
			})?;
			value
				.checked_mul(factor)
				.and_then(|secs| total.checked_add(secs))
				.ok_or_else(|| ParseError::Overflow(text.to_string()))
		})
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	const NOW: i64 = 1_700_000_000;

	fn assert_close(expected: i64, actual: i64) {
		assert!(
			(expected - actual).abs() <= 3,
			"expected {expected} within 3s, got {actual}"
		);
	}

	#[test]
	fn test_blank_is_unknown() {
		assert_eq!(parse_handshake("").unwrap(), None);
		assert_eq!(parse_handshake("   ").unwrap(), None);
		assert_eq!(parse_handshake("\t\n").unwrap(), None);
	}

	#[test]
	fn test_wall_clock_examples() {
		let cases = [
			("43 seconds ago", 43),
			("1 minute, 59 seconds ago", 119),
			("3 hours, 44 minutes, 51 seconds ago", 13_491),
			("7 days, 20 hours, 30 minutes, 15 seconds ago", 678_615),
		];

		for (input, age) in cases {
			let parsed = parse_handshake(input).unwrap().unwrap();
			let expected = Utc::now().timestamp() - age;
			assert_close(expected, parsed);
		}
	}

	#[test]
	fn test_fixed_now_examples() {
		assert_eq!(parse_handshake_at("43 seconds ago", NOW).unwrap(), Some(NOW - 43));
		assert_eq!(
			parse_handshake_at("1 minute, 59 seconds ago", NOW).unwrap(),
			Some(NOW - 119)
		);
		assert_eq!(
			parse_handshake_at("1 year, 2 days, 0 hours, 0 minutes, 1 second ago", NOW).unwrap(),
			Some(NOW - (YEAR + 2 * DAY + 1))
		);
	}

	#[test]
	fn test_case_and_padding_ignored() {
		assert_eq!(
			parse_handshake_at("   3 HOURS, 44 Minutes, 51 seconds AGO  ", NOW).unwrap(),
			Some(NOW - 13_491)
		);
	}

	#[test]
	fn test_now_without_digits() {
		assert_eq!(parse_handshake_at("Now", NOW).unwrap(), Some(NOW));
	}

	#[test]
	fn test_positional_not_keyword_based() {
		// Only order matters: the last run is always seconds.
		assert_eq!(parse_age_secs("2 hours").unwrap(), 2);
		assert_eq!(parse_age_secs("1 x, 1 y").unwrap(), 61);
	}

	#[test]
	fn test_too_many_components() {
		let err = parse_handshake_at("1 2 3 4 5 6", NOW).unwrap_err();
		assert_eq!(
			err,
			ParseError::TooManyComponents {
				input: "1 2 3 4 5 6".to_string(),
				found: 6,
			}
		);
	}

	#[test]
	fn test_component_overflow() {
		let err = parse_age_secs("99999999999999999999999 seconds ago").unwrap_err();
		assert!(matches!(err, ParseError::InvalidComponent { .. }));

		let err = parse_age_secs("9223372036854775807 minutes, 0 seconds ago").unwrap_err();
		assert!(matches!(err, ParseError::Overflow(_)));
	}

	proptest! {
		#[test]
		fn age_matches_weighted_sum(
			days in 0i64..10_000,
			hours in 0i64..24,
			minutes in 0i64..60,
			seconds in 0i64..60,
		) {
			let text = format!("{days} days, {hours} hours, {minutes} minutes, {seconds} seconds ago");
			let expected = days * DAY + hours * HOUR + minutes * MINUTE + seconds;
			prop_assert_eq!(parse_handshake_at(&text, NOW).unwrap(), Some(NOW - expected));
		}

		#[test]
		fn never_panics(text in ".{0,64}") {
			let _ = parse_handshake_at(&text, NOW);
		}
	}
}
