//! In-memory cache for the double-submit CSRF token.
//!
//! The cache only stores and expires; fetching belongs to the executor, which refills it on a
//! miss and clears it after a 403.

// self
use crate::_prelude::*;

/// Default lifetime of a cached token; shorter than the server cookie's one hour.
pub const DEFAULT_CSRF_TTL: Duration = Duration::minutes(55);

/// Token plus the instant after which it must be refetched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedCsrfToken {
	/// Token echoed in `X-CSRF-Token`.
	pub token: String,
	/// Expiry instant (exclusive).
	pub expires_at: OffsetDateTime,
}

/// Thread-safe CSRF token cache shared by every clone of a client.
#[derive(Debug)]
pub struct CsrfTokenCache {
	ttl: Duration,
	slot: Mutex<Option<CachedCsrfToken>>,
}
impl CsrfTokenCache {
	/// Creates an empty cache with the given TTL.
	pub fn new(ttl: Duration) -> Self {
		Self { ttl, slot: Mutex::new(None) }
	}

	/// Configured TTL.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Returns the cached token if it is still valid now.
	pub fn get(&self) -> Option<String> {
		self.get_at(OffsetDateTime::now_utc())
	}

	/// Returns the cached token if `now < expires_at`; an expired entry is evicted.
	pub fn get_at(&self, now: OffsetDateTime) -> Option<String> {
		let mut slot = self.slot.lock();

		match slot.as_ref() {
			Some(cached) if now < cached.expires_at => Some(cached.token.clone()),
			Some(_) => {
				*slot = None;

				None
			},
			None => None,
		}
	}

	/// Stores `token` for one TTL starting now and returns it.
	pub fn set(&self, token: impl Into<String>) -> String {
		self.set_at(token, OffsetDateTime::now_utc())
	}

	/// Stores `token` for one TTL starting at `now` and returns it.
	pub fn set_at(&self, token: impl Into<String>, now: OffsetDateTime) -> String {
		let token = token.into();

		*self.slot.lock() = Some(CachedCsrfToken { token: token.clone(), expires_at: now + self.ttl });

		token
	}

	/// Evicts the cached token unconditionally.
	pub fn clear(&self) {
		*self.slot.lock() = None;
	}
}
impl Default for CsrfTokenCache {
	fn default() -> Self {
		Self::new(DEFAULT_CSRF_TTL)
	}
}
