// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
	#[error("too many time components in '{input}': found {found}, at most 5 allowed")]
	TooManyComponents { input: String, found: usize },

	#[error("invalid time component '{component}' in '{input}'")]
	InvalidComponent { input: String, component: String },

	#[error("handshake age out of range in '{0}'")]
	Overflow(String),

	#[error("malformed transfer '{0}'")]
	MalformedTransfer(String),

	#[error("peer {peer}: invalid {field}: {source}")]
	Field {
		peer: String,
		field: &'static str,
		#[source]
		source: Box<ParseError>,
	},
}

impl ParseError {
	/// Attaches the peer and field name to a sub-parser failure.
	pub fn in_field(self, peer: &str, field: &'static str) -> Self {
		ParseError::Field {
			peer: peer.to_string(),
			field,
			source: Box::new(self),
		}
	}
}

pub type Result<T> = std::result::Result<T, ParseError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_in_field_wraps_source() {
		let err = ParseError::MalformedTransfer("garbage".to_string()).in_field("abc=", "transfer");
		assert_eq!(
			err.to_string(),
			"peer abc=: invalid transfer: malformed transfer 'garbage'"
		);
		match err {
			ParseError::Field { source, .. } => {
				assert_eq!(*source, ParseError::MalformedTransfer("garbage".to_string()))
			}
			other => panic!("expected Field, got {other:?}"),
		}
	}
}
