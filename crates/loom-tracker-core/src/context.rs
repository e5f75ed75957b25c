// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Structured context attached to errors, breadcrumbs and users.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single context value.
///
/// Restricted to JSON-compatible primitives, lists and nested maps so that
/// records always serialize losslessly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	String(String),
	List(Vec<ContextValue>),
	Map(BTreeMap<String, ContextValue>),
}

impl ContextValue {
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Self::Int(i) => Some(*i as f64),
			Self::Float(f) => Some(*f),
			_ => None,
		}
	}
}

impl From<bool> for ContextValue {
	fn from(v: bool) -> Self {
		Self::Bool(v)
	}
}

impl From<i64> for ContextValue {
	fn from(v: i64) -> Self {
		Self::Int(v)
	}
}

impl From<i32> for ContextValue {
	fn from(v: i32) -> Self {
		Self::Int(v.into())
	}
}

impl From<u16> for ContextValue {
	fn from(v: u16) -> Self {
		Self::Int(v.into())
	}
}

impl From<u32> for ContextValue {
	fn from(v: u32) -> Self {
		Self::Int(v.into())
	}
}

impl From<u64> for ContextValue {
	fn from(v: u64) -> Self {
		i64::try_from(v).map_or(Self::Float(v as f64), Self::Int)
	}
}

impl From<f64> for ContextValue {
	fn from(v: f64) -> Self {
		Self::Float(v)
	}
}

impl From<&str> for ContextValue {
	fn from(v: &str) -> Self {
		Self::String(v.to_string())
	}
}

impl From<String> for ContextValue {
	fn from(v: String) -> Self {
		Self::String(v)
	}
}

impl<T: Into<ContextValue>> From<Option<T>> for ContextValue {
	fn from(v: Option<T>) -> Self {
		v.map_or(Self::Null, Into::into)
	}
}

impl<T: Into<ContextValue>> From<Vec<T>> for ContextValue {
	fn from(v: Vec<T>) -> Self {
		Self::List(v.into_iter().map(Into::into).collect())
	}
}

impl From<Context> for ContextValue {
	fn from(v: Context) -> Self {
		Self::Map(v.0)
	}
}

/// An ordered key/value bag of [`ContextValue`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(BTreeMap<String, ContextValue>);

impl Context {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder-style insert.
	pub fn with(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
		self.insert(key, value);
		self
	}

	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ContextValue>) {
		self.0.insert(key.into(), value.into());
	}

	pub fn get(&self, key: &str) -> Option<&ContextValue> {
		self.0.get(key)
	}

	pub fn get_str(&self, key: &str) -> Option<&str> {
		self.get(key).and_then(ContextValue::as_str)
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.0.contains_key(key)
	}

	pub fn remove(&mut self, key: &str) -> Option<ContextValue> {
		self.0.remove(key)
	}

	/// Inserts every entry of `other`, overwriting existing keys.
	pub fn extend(&mut self, other: Context) {
		self.0.extend(other.0);
	}

	/// Inserts the entries of `defaults` whose keys are not present yet.
	pub fn merge_defaults(&mut self, defaults: Context) {
		for (key, value) in defaults.0 {
			self.0.entry(key).or_insert(value);
		}
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &ContextValue)> {
		self.0.iter()
	}
}

impl<K: Into<String>, V: Into<ContextValue>> FromIterator<(K, V)> for Context {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self(
			iter
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		)
	}
}

/// User identity attached to the session via `set_user`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
	pub id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub username: Option<String>,
	#[serde(default, skip_serializing_if = "Context::is_empty")]
	pub data: Context,
}

impl UserContext {
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			..Default::default()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn merge_defaults_keeps_caller_values() {
		let mut ctx = Context::new().with("url", "/contacts");
		ctx.merge_defaults(
			Context::new()
				.with("url", "/dashboard")
				.with("environment", "staging"),
		);

		assert_eq!(ctx.get_str("url"), Some("/contacts"));
		assert_eq!(ctx.get_str("environment"), Some("staging"));
	}

	#[test]
	fn untagged_values_keep_their_shape() {
		let ctx = Context::new()
			.with("count", 3)
			.with("ratio", 0.5)
			.with("tags", vec!["a", "b"])
			.with("missing", None::<String>)
			.with("nested", Context::new().with("ok", true));

		let json = serde_json::to_string(&ctx).unwrap();
		let parsed: Context = serde_json::from_str(&json).unwrap();

		assert_eq!(parsed, ctx);
		assert_eq!(parsed.get("count"), Some(&ContextValue::Int(3)));
		assert_eq!(parsed.get("ratio"), Some(&ContextValue::Float(0.5)));
	}

	#[test]
	fn large_unsigned_falls_back_to_float() {
		assert_eq!(
			ContextValue::from(u64::MAX),
			ContextValue::Float(u64::MAX as f64)
		);
		assert_eq!(ContextValue::from(7u64), ContextValue::Int(7));
	}
}
