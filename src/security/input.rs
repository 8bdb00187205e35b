//! Untrusted input helpers: HTML text, upload file names, and JSON request bodies.
//!
//! Lengths are counted in `char`s.

// crates.io
use serde::de::DeserializeOwned;
use unicode_normalization::UnicodeNormalization;
// self
use crate::{_prelude::*, error::JsonInputError, security::sanitize::strip_control_chars};

/// Name used when a file name sanitizes to nothing.
pub const DEFAULT_FILE_NAME_FALLBACK: &str = "file";
/// Default character cap for sanitized file names.
pub const DEFAULT_FILE_NAME_MAX: usize = 120;

const EXTENSION_CHECK_MAX: usize = 255;
const INVALID_FILE_NAME_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Options for [`sanitize_file_name`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SanitizeFileNameOptions {
	/// Returned (itself sanitized) when the input sanitizes to nothing.
	pub fallback: String,
	/// Character cap; values below 1 are treated as 1.
	pub max_length: usize,
}
impl SanitizeFileNameOptions {
	/// Sets the fallback name.
	pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
		self.fallback = fallback.into();

		self
	}

	/// Sets the character cap.
	pub fn with_max_length(mut self, max_length: usize) -> Self {
		self.max_length = max_length;

		self
	}
}
impl Default for SanitizeFileNameOptions {
	fn default() -> Self {
		Self { fallback: DEFAULT_FILE_NAME_FALLBACK.into(), max_length: DEFAULT_FILE_NAME_MAX }
	}
}

/// Escapes `& < > " '` so `value` renders as text inside HTML.
pub fn escape_html(value: &str) -> String {
	let mut out = String::with_capacity(value.len());

	for c in value.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			'\'' => out.push_str("&#39;"),
			c => out.push(c),
		}
	}

	out
}

/// Normalizes an upload file name into something safe to store.
///
/// The name is NFKC-normalized and loses control characters. Path separators and other
/// characters reserved by common file systems become `-`, whitespace runs collapse to one
/// space, and leading or trailing dots and spaces are removed. Overlong names are truncated
/// while keeping their extension. A name left empty becomes the sanitized fallback.
pub fn sanitize_file_name(value: &str, options: &SanitizeFileNameOptions) -> String {
	let max = options.max_length.max(1);
	let sanitized = sanitize_file_name_core(value);

	if sanitized.is_empty() {
		let fallback = sanitize_file_name_core(&options.fallback);

		if fallback.is_empty() {
			return DEFAULT_FILE_NAME_FALLBACK.into();
		}

		return truncate_preserving_extension(&fallback, max);
	}

	truncate_preserving_extension(&sanitized, max)
}

/// Whether the sanitized `file_name` ends in one of `allowed` (case-insensitive).
///
/// Entries may carry a leading dot. An empty allow-list accepts everything; names without an
/// extension, or whose only dot leads the name, are rejected.
pub fn has_allowed_file_extension<S>(file_name: &str, allowed: &[S]) -> bool
where
	S: AsRef<str>,
{
	if allowed.is_empty() {
		return true;
	}

	let options = SanitizeFileNameOptions::default().with_max_length(EXTENSION_CHECK_MAX);
	let sanitized = sanitize_file_name(file_name, &options);
	let Some(idx) = sanitized.rfind('.') else {
		return false;
	};

	if idx == 0 || idx + 1 == sanitized.len() {
		return false;
	}

	let extension = sanitized[idx + 1..].to_lowercase();

	allowed.iter().any(|item| {
		let item = item.as_ref();

		item.strip_prefix('.').unwrap_or(item).to_lowercase() == extension
	})
}

/// Parses `raw` as JSON and checks it against the shape of `T` in one step.
///
/// Syntax and shape failures are reported separately; the latter carries the path of the
/// first mismatching field.
pub fn safe_json_parse_with_schema<T>(raw: &str) -> Result<T, JsonInputError>
where
	T: DeserializeOwned,
{
	let value = serde_json::from_str::<Value>(raw).map_err(JsonInputError::Syntax)?;

	serde_path_to_error::deserialize(value).map_err(|e| JsonInputError::Schema {
		path: e.path().to_string(),
		source: e.into_inner(),
	})
}

fn sanitize_file_name_core(value: &str) -> String {
	let normalized = value.nfkc().collect::<String>();
	let replaced = strip_control_chars(&normalized)
		.chars()
		.map(|c| if INVALID_FILE_NAME_CHARS.contains(&c) { '-' } else { c })
		.collect::<String>();
	let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");

	collapsed.trim_matches(|c: char| c == '.' || c.is_whitespace()).to_owned()
}

fn truncate_preserving_extension(value: &str, max: usize) -> String {
	let chars = value.chars().collect::<Vec<_>>();

	if chars.len() <= max {
		return value.to_owned();
	}

	match chars.iter().rposition(|c| *c == '.') {
		Some(idx) if idx > 0 && idx + 1 < chars.len() && chars.len() - idx < max => {
			let extension = &chars[idx..];

			chars[..max - extension.len()].iter().chain(extension).collect()
		},
		_ => chars[..max].iter().collect(),
	}
}
