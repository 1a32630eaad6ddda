// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Parsing of `<float> <unit> received, <float> <unit> sent`.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ParseError, Result};
use crate::record::Quantity;

static TRANSFER: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(
		r"^(?P<rx>[0-9]+(?:\.[0-9]+)?(?:e[-+]?[0-9]+)?)\s+(?P<rx_unit>\S+)\s+received,\s*(?P<tx>[0-9]+(?:\.[0-9]+)?(?:e[-+]?[0-9]+)?)\s+(?P<tx_unit>\S+)\s+sent$",
	)
	.unwrap()
});

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transfer {
	pub received: Quantity,
	pub sent: Quantity,
}

/// Parses a transfer phrase. Anything that does not match the full shape is
/// rejected; there is no partial extraction.
pub fn parse_transfer(text: &str) -> Result<Transfer> {
	let normalized = text.trim().to_lowercase();
	let malformed = || ParseError::MalformedTransfer(normalized.clone());

	let caps = TRANSFER.captures(&normalized).ok_or_else(malformed)?;
	let magnitude = |name: &str| -> Result<f64> {
		caps[name].parse::<f64>().map_err(|_| malformed())
	};

	Ok(Transfer {
		received: Quantity::new(&caps["rx_unit"], magnitude("rx")?),
		sent: Quantity::new(&caps["tx_unit"], magnitude("tx")?),
	})
}
