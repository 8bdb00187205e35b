//! Storage contract and the built-in in-memory store for session credentials.
//!
//! Tokens live for the lifetime of the process at most; hosts that need a different scope
//! (for example, a per-tab session) implement [`TokenStore`] themselves.

pub mod memory;

pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for the access/refresh token pair.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Loads the stored pair. Missing entries are `None`, never an error.
	fn load(&self) -> StoreFuture<'_, StoredTokens>;

	/// Replaces the stored pair.
	fn save(&self, tokens: StoredTokens) -> StoreFuture<'_, ()>;

	/// Removes both tokens.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Access/refresh token pair held by a [`TokenStore`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTokens {
	/// Bearer token attached to outbound requests.
	pub access_token: Option<TokenSecret>,
	/// Token exchanged for a new access token.
	pub refresh_token: Option<TokenSecret>,
}
impl StoredTokens {
	/// Creates a pair from raw strings.
	pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
		Self {
			access_token: Some(TokenSecret::new(access_token)),
			refresh_token: refresh_token.map(TokenSecret::new),
		}
	}

	/// Whether neither token is present.
	pub fn is_empty(&self) -> bool {
		self.access_token.is_none() && self.refresh_token.is_none()
	}
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn stored_tokens_debug_never_leaks_secrets() {
		let tokens = StoredTokens::new("access-secret", Some("refresh-secret".into()));
		let rendered = format!("{tokens:?}");

		assert!(!rendered.contains("access-secret"));
		assert!(!rendered.contains("refresh-secret"));
		assert!(!tokens.is_empty());
		assert!(StoredTokens::default().is_empty());
	}

	#[test]
	fn store_error_renders_message() {
		let err = StoreError::Backend { message: "session storage unavailable".into() };

		assert_eq!(err.to_string(), "Backend failure: session storage unavailable.");
	}
}
