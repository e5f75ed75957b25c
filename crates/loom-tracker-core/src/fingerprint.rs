// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fingerprinting used to group repeat occurrences of an error into one record.

use sha2::{Digest, Sha256};

/// Number of leading stack lines that participate in the fingerprint.
pub const FINGERPRINT_STACK_LINES: usize = 3;

/// Compute the fingerprint of an error.
///
/// The fingerprint is a SHA256 hash over:
/// 1. The error message
/// 2. The first [`FINGERPRINT_STACK_LINES`] non-empty stack lines, trimmed
///
/// A missing stack hashes the same as an empty one.
pub fn compute_fingerprint(message: &str, stack: Option<&str>) -> String {
	let mut hasher = Sha256::new();

	// Length prefix keeps "a|b" + no stack apart from "a" + stack "b".
	hasher.update((message.len() as u64).to_le_bytes());
	hasher.update(message.as_bytes());
	hasher.update(b"|");

	for line in stack_head(stack, FINGERPRINT_STACK_LINES) {
		hasher.update(line.as_bytes());
		hasher.update(b"|");
	}

	hex::encode(hasher.finalize())
}

/// Returns the first `n` non-empty, trimmed lines of a stack.
pub fn stack_head(stack: Option<&str>, n: usize) -> Vec<&str> {
	stack
		.map(|s| {
			s.lines()
				.map(str::trim)
				.filter(|l| !l.is_empty())
				.take(n)
				.collect()
		})
		.unwrap_or_default()
}

/// Truncate a string to at most `max_chars` characters, ending in an ellipsis
/// when shortened.
pub fn truncate(s: &str, max_chars: usize) -> String {
	if s.chars().count() <= max_chars {
		s.to_string()
	} else {
		let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
		format!("{kept}...")
	}
}
