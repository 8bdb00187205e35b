//! Log-context redaction and value masking.

// crates.io
use regex::Regex;
use serde_json::Map;
// self
use crate::{_prelude::*, error::ConfigError, security::sanitize::strip_control_chars};

/// Replacement written in place of sensitive values.
pub const DEFAULT_REDACTED: &str = "[REDACTED]";
/// Default nesting bound for [`sanitize_log_context`].
pub const DEFAULT_REDACT_MAX_DEPTH: usize = 6;
/// Default character cap for string values in log context.
pub const DEFAULT_LOG_STRING_MAX: usize = 512;

const MAX_DEPTH_MARKER: &str = "[MaxDepth]";
const TRUNCATED_SUFFIX: &str = "...[truncated]";
const SENSITIVE_KEYWORDS: [&str; 12] = [
	"password",
	"passwd",
	"secret",
	"token",
	"apikey",
	"api-key",
	"api_key",
	"authorization",
	"cookie",
	"session",
	"credential",
	"email",
];

/// Redaction settings.
#[derive(Clone, Debug)]
pub struct RedactOptions {
	/// Text substituted for sensitive values.
	pub redacted_text: String,
	/// Custom sensitive-key matcher; the built-in keyword list applies when unset.
	pub key_pattern: Option<Regex>,
	/// Containers nested this deep are replaced by `"[MaxDepth]"`.
	pub max_depth: usize,
	/// Strings longer than this many characters are truncated.
	pub max_string_length: usize,
}
impl RedactOptions {
	/// Replaces the keyword list with a case-insensitive regular expression.
	pub fn with_sensitive_key_pattern(mut self, pattern: &str) -> Result<Self, ConfigError> {
		self.key_pattern = Some(Regex::new(&format!("(?i){pattern}"))?);

		Ok(self)
	}

	/// Overrides the substituted text.
	pub fn with_redacted_text(mut self, text: impl Into<String>) -> Self {
		self.redacted_text = text.into();

		self
	}

	/// Overrides the depth bound.
	pub fn with_max_depth(mut self, max_depth: usize) -> Self {
		self.max_depth = max_depth;

		self
	}

	/// Overrides the string cap.
	pub fn with_max_string_length(mut self, max_string_length: usize) -> Self {
		self.max_string_length = max_string_length;

		self
	}

	/// Whether `key` names a sensitive field.
	pub fn is_sensitive_key(&self, key: &str) -> bool {
		match &self.key_pattern {
			Some(pattern) => pattern.is_match(key),
			None => {
				let lowered = key.to_ascii_lowercase();

				SENSITIVE_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
			},
		}
	}
}
impl Default for RedactOptions {
	fn default() -> Self {
		Self {
			redacted_text: DEFAULT_REDACTED.into(),
			key_pattern: None,
			max_depth: DEFAULT_REDACT_MAX_DEPTH,
			max_string_length: DEFAULT_LOG_STRING_MAX,
		}
	}
}

/// Produces a log-safe copy of `value`.
///
/// Sensitive keys are replaced whatever their value type, strings lose control characters and
/// are truncated, and containers at or past `max_depth` collapse to `"[MaxDepth]"`.
pub fn sanitize_log_context(value: &Value, options: &RedactOptions) -> Value {
	sanitize_at(value, options, 0)
}

/// Log-safe copy of free text such as a server-supplied error message.
///
/// Applies the same control-character stripping and truncation as string values in
/// [`sanitize_log_context`].
pub fn sanitize_log_text(text: &str, options: &RedactOptions) -> String {
	truncate(&strip_control_chars(text), options)
}

/// Replaces sensitive keys without touching other values.
///
/// Nesting deeper than `max_depth` is returned unchanged.
pub fn redact_sensitive_object(value: &Value, options: &RedactOptions) -> Value {
	redact_at(value, options, 0)
}

/// Masks the middle of `value`, keeping `keep_start` leading and `keep_end` trailing characters.
///
/// Values too short to keep anything are masked completely.
pub fn mask_sensitive_value(value: &str, keep_start: usize, keep_end: usize, mask: char) -> String {
	let chars = value.chars().collect::<Vec<_>>();

	if chars.len() <= keep_start + keep_end {
		return mask.to_string().repeat(chars.len());
	}

	let masked = chars.len() - keep_start - keep_end;
	let mut out = chars[..keep_start].iter().collect::<String>();

	out.extend(std::iter::repeat_n(mask, masked));
	out.extend(&chars[chars.len() - keep_end..]);

	out
}

fn sanitize_at(value: &Value, options: &RedactOptions, depth: usize) -> Value {
	match value {
		Value::String(text) => Value::String(sanitize_log_text(text, options)),
		Value::Array(_) | Value::Object(_) if depth >= options.max_depth =>
			Value::String(MAX_DEPTH_MARKER.into()),
		Value::Array(items) =>
			Value::Array(items.iter().map(|item| sanitize_at(item, options, depth + 1)).collect()),
		Value::Object(map) => {
			let mut out = Map::with_capacity(map.len());

			for (key, item) in map {
				let item = if options.is_sensitive_key(key) {
					Value::String(options.redacted_text.clone())
				} else {
					sanitize_at(item, options, depth + 1)
				};

				out.insert(key.clone(), item);
			}

			Value::Object(out)
		},
		scalar => scalar.clone(),
	}
}

fn redact_at(value: &Value, options: &RedactOptions, depth: usize) -> Value {
	if depth > options.max_depth {
		return value.clone();
	}

	match value {
		Value::Array(items) =>
			Value::Array(items.iter().map(|item| redact_at(item, options, depth + 1)).collect()),
		Value::Object(map) => Value::Object(
			map.iter()
				.map(|(key, item)| {
					let item = if options.is_sensitive_key(key) {
						Value::String(options.redacted_text.clone())
					} else {
						redact_at(item, options, depth + 1)
					};

					(key.clone(), item)
				})
				.collect(),
		),
		other => other.clone(),
	}
}

fn truncate(text: &str, options: &RedactOptions) -> String {
	if text.chars().count() <= options.max_string_length {
		return text.to_owned();
	}

	let mut out = text.chars().take(options.max_string_length).collect::<String>();

	out.push_str(TRUNCATED_SUFFIX);

	out
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn sensitive_keys_are_redacted_regardless_of_type() {
		let context = serde_json::json!({
			"page": "checkout",
			"password": "hunter2",
			"Authorization": "Bearer abc",
			"session": { "id": 7 },
			"userEmail": ["a@example.com"],
			"nested": { "apiKey": 42, "count": 3 },
		});
		let sanitized = sanitize_log_context(&context, &RedactOptions::default());

		assert_eq!(
			sanitized,
			serde_json::json!({
				"page": "checkout",
				"password": "[REDACTED]",
				"Authorization": "[REDACTED]",
				"session": "[REDACTED]",
				"userEmail": "[REDACTED]",
				"nested": { "apiKey": "[REDACTED]", "count": 3 },
			})
		);
	}

	#[test]
	fn free_text_matches_context_string_handling() {
		let options = RedactOptions::default().with_max_string_length(8);

		assert_eq!(sanitize_log_text("Bad\r\nGateway", &options), "BadGatew...[truncated]");
		assert_eq!(sanitize_log_text("short", &options), "short");
		assert_eq!(
			sanitize_log_text("x\u{0007}y", &RedactOptions::default()),
			sanitize_log_context(&serde_json::json!("x\u{0007}y"), &RedactOptions::default())
		);
	}

	#[test]
	fn strings_are_stripped_and_truncated() {
		let options = RedactOptions::default().with_max_string_length(4);
		let sanitized = sanitize_log_context(&serde_json::json!("ab\ncdefg"), &options);

		assert_eq!(sanitized, serde_json::json!("abcd...[truncated]"));
		assert_eq!(
			sanitize_log_context(&serde_json::json!("a\u{0}b"), &RedactOptions::default()),
			serde_json::json!("ab")
		);
	}

	#[test]
	fn depth_is_bounded() {
		let options = RedactOptions::default().with_max_depth(2);
		let sanitized =
			sanitize_log_context(&serde_json::json!({ "a": { "b": { "c": 1 } } }), &options);

		assert_eq!(sanitized, serde_json::json!({ "a": { "b": "[MaxDepth]" } }));
	}

	#[test]
	fn custom_pattern_replaces_keyword_list() {
		let options = RedactOptions::default()
			.with_sensitive_key_pattern("^ssn$")
			.expect("Pattern should compile.");

		assert!(options.is_sensitive_key("SSN"));
		assert!(!options.is_sensitive_key("password"));
		assert!(matches!(
			RedactOptions::default().with_sensitive_key_pattern("("),
			Err(ConfigError::InvalidPattern(_))
		));
	}

	#[test]
	fn redact_object_keeps_values_past_depth() {
		let options = RedactOptions::default().with_max_depth(0);
		let value = serde_json::json!({ "token": "t", "inner": { "token": "u" } });

		assert_eq!(
			redact_sensitive_object(&value, &options),
			serde_json::json!({ "token": "[REDACTED]", "inner": { "token": "u" } })
		);
	}

	#[test]
	fn masking_keeps_edges() {
		assert_eq!(mask_sensitive_value("4111111111111111", 4, 4, '*'), "4111********1111");
		assert_eq!(mask_sensitive_value("abc", 2, 2, '#'), "###");
		assert_eq!(mask_sensitive_value("héllo wörld", 1, 1, '*'), "h*********d");
	}
}
