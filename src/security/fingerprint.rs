//! Canonical JSON, SHA-256 digests, request fingerprints, and idempotency keys.
//!
//! Canonical form sorts object keys by byte order at every level, so two payloads that differ
//! only in key order hash identically.
//!
//! Timestamps must reach the hasher as strings. `time` types serialize to tuples by default, so
//! annotate them with [`serialize_iso_timestamp`] to hash the same
//! `2024-01-02T03:04:05.000Z` form that browser clients produce.

// crates.io
use serde::Serializer;
use serde_json::Map;
use sha2::{Digest, Sha256};
use time::{UtcOffset, macros::format_description};
// self
use crate::{_prelude::*, security::sanitize::strip_control_chars};

const MAX_CANONICAL_DEPTH: usize = 64;
const MAX_DEPTH_MARKER: &str = "[MaxDepth]";

/// Returns a copy of `value` with every object's keys inserted in sorted order.
///
/// Nesting deeper than 64 levels is replaced by the string `"[MaxDepth]"`.
pub fn canonicalize_json(value: &Value) -> Value {
	canonicalize_at(value, 0)
}

/// Serializes `value` into canonical JSON text.
///
/// Timestamp fields should use [`serialize_iso_timestamp`]; see the module docs.
pub fn canonical_json_string<T>(value: &T) -> Result<String, serde_json::Error>
where
	T: ?Sized + Serialize,
{
	let value = serde_json::to_value(value)?;

	Ok(canonical_value_string(&value))
}

/// Serializes a timestamp as a UTC ISO 8601 string with millisecond precision.
///
/// Intended for `#[serde(serialize_with = "serialize_iso_timestamp")]` on timestamp fields of
/// fingerprinted payloads.
pub fn serialize_iso_timestamp<S>(at: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	let format =
		format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");
	let text = at.to_offset(UtcOffset::UTC).format(format).map_err(serde::ser::Error::custom)?;

	serializer.serialize_str(&text)
}

/// Lowercase hex SHA-256 of `input`.
pub fn sha256_hex(input: impl AsRef<[u8]>) -> String {
	format!("{:x}", Sha256::digest(input.as_ref()))
}

/// Inputs hashed by [`create_request_fingerprint`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFingerprintInput {
	/// Request method; uppercased before hashing.
	pub method: String,
	/// Request path; trimmed before hashing.
	pub path: String,
	/// Query parameters.
	pub query: Option<Value>,
	/// Request body.
	pub body: Option<Value>,
	/// Acting user.
	pub user_id: Option<String>,
}
impl RequestFingerprintInput {
	/// Starts an input for `method` and `path`.
	pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
		Self { method: method.into(), path: path.into(), ..Default::default() }
	}

	/// Sets the query.
	pub fn with_query(mut self, query: Value) -> Self {
		self.query = Some(query);

		self
	}

	/// Sets the body.
	pub fn with_body(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Sets the user id.
	pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
		self.user_id = Some(user_id.into());

		self
	}
}

/// Deterministic SHA-256 hex over the canonical `{method, path, query, body, userId}` object.
pub fn create_request_fingerprint(input: &RequestFingerprintInput) -> String {
	let canonical = serde_json::json!({
		"method": strip_control_chars(&input.method).to_uppercase(),
		"path": strip_control_chars(&input.path).trim(),
		"query": input.query.clone().unwrap_or(Value::Null),
		"body": input.body.clone().unwrap_or(Value::Null),
		"userId": input.user_id.clone().map_or(Value::Null, Value::String),
	});

	sha256_hex(canonical_value_string(&canonical))
}

/// Builds `"<scope>:<sha256-hex>"` where the hash covers `"<scope>:<canonical-payload>"`.
///
/// The scope is control-stripped, trimmed, and lowercased; an empty scope becomes `global`.
/// Timestamp fields in `payload` should use [`serialize_iso_timestamp`].
pub fn create_idempotency_key<T>(scope: &str, payload: &T) -> Result<String, serde_json::Error>
where
	T: ?Sized + Serialize,
{
	let scope = strip_control_chars(scope).trim().to_lowercase();
	let scope = if scope.is_empty() { "global".to_owned() } else { scope };
	let payload = canonical_json_string(payload)?;
	let hash = sha256_hex(format!("{scope}:{payload}"));

	Ok(format!("{scope}:{hash}"))
}

fn canonical_value_string(value: &Value) -> String {
	canonicalize_json(value).to_string()
}

fn canonicalize_at(value: &Value, depth: usize) -> Value {
	match value {
		Value::Array(_) | Value::Object(_) if depth >= MAX_CANONICAL_DEPTH =>
			Value::String(MAX_DEPTH_MARKER.into()),
		Value::Array(items) =>
			Value::Array(items.iter().map(|item| canonicalize_at(item, depth + 1)).collect()),
		Value::Object(map) => {
			let mut entries = map.iter().collect::<Vec<_>>();

			entries.sort_unstable_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

			let mut sorted = Map::with_capacity(entries.len());

			for (key, item) in entries {
				sorted.insert(key.clone(), canonicalize_at(item, depth + 1));
			}

			Value::Object(sorted)
		},
		scalar => scalar.clone(),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn key_order_never_changes_the_canonical_form() {
		let a = serde_json::json!({ "a": 1, "b": { "y": [1, { "d": 4, "c": 3 }], "x": null } });
		let b = serde_json::json!({ "b": { "x": null, "y": [1, { "c": 3, "d": 4 }] }, "a": 1 });

		assert_eq!(
			canonical_json_string(&a).expect("JSON values serialize."),
			canonical_json_string(&b).expect("JSON values serialize.")
		);
		assert_eq!(
			canonical_json_string(&a).expect("JSON values serialize."),
			r#"{"a":1,"b":{"x":null,"y":[1,{"c":3,"d":4}]}}"#
		);
	}

	#[test]
	fn fingerprint_is_order_independent_and_normalized() {
		let a = RequestFingerprintInput::new("post", " /users ")
			.with_body(serde_json::json!({ "a": 1, "b": 2 }))
			.with_user_id("u1");
		let b = RequestFingerprintInput::new("POST", "/users")
			.with_body(serde_json::json!({ "b": 2, "a": 1 }))
			.with_user_id("u1");
		let other_user = b.clone().with_user_id("u2");

		assert_eq!(create_request_fingerprint(&a), create_request_fingerprint(&b));
		assert_ne!(create_request_fingerprint(&b), create_request_fingerprint(&other_user));
		assert_eq!(create_request_fingerprint(&a).len(), 64);
	}

	#[test]
	fn timestamps_hash_as_utc_iso_strings() {
		#[derive(Serialize)]
		struct Booking {
			seats: u8,
			#[serde(serialize_with = "serialize_iso_timestamp")]
			at: OffsetDateTime,
		}

		let at = time::macros::datetime!(2024-01-02 03:04:05.678 +02:00);
		let booking = Booking { seats: 2, at };

		assert_eq!(
			canonical_json_string(&booking).expect("Timestamps serialize."),
			r#"{"at":"2024-01-02T01:04:05.678Z","seats":2}"#
		);
		assert_eq!(
			create_idempotency_key("booking", &booking).expect("Timestamps serialize."),
			create_idempotency_key(
				"booking",
				&serde_json::json!({ "at": "2024-01-02T01:04:05.678Z", "seats": 2 })
			)
			.expect("JSON payloads serialize.")
		);
	}

	#[test]
	fn sha256_hex_matches_known_vector() {
		assert_eq!(
			sha256_hex("abc"),
			"ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
		);
	}

	#[test]
	fn idempotency_key_is_scoped_and_stable() {
		let key = create_idempotency_key(" Orders ", &serde_json::json!({ "b": 2, "a": 1 }))
			.expect("JSON payloads serialize.");
		let same = create_idempotency_key("orders", &serde_json::json!({ "a": 1, "b": 2 }))
			.expect("JSON payloads serialize.");
		let expected_hash = sha256_hex(r#"orders:{"a":1,"b":2}"#);

		assert_eq!(key, same);
		assert_eq!(key, format!("orders:{expected_hash}"));
		assert!(
			create_idempotency_key("\n", &1).expect("Integers serialize.").starts_with("global:")
		);
	}

	#[test]
	fn deep_nesting_is_bounded() {
		let mut value = serde_json::json!(0);

		for _ in 0..80 {
			value = serde_json::json!([value]);
		}

		assert!(
			canonical_json_string(&value).expect("JSON values serialize.").contains("[MaxDepth]")
		);
	}
}
