//! Thread-safe in-memory [`TokenStore`] implementation.

// self
use crate::{
	_prelude::*,
	store::{StoreFuture, StoredTokens, TokenStore},
};

type StoreSlot = Arc<RwLock<StoredTokens>>;

/// Storage backend that keeps the token pair in-process; dropped with the last clone.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreSlot);
impl MemoryStore {
	/// Creates a store seeded with `tokens`.
	pub fn with_tokens(tokens: StoredTokens) -> Self {
		Self(Arc::new(RwLock::new(tokens)))
	}

	fn load_now(slot: StoreSlot) -> StoredTokens {
		slot.read().clone()
	}

	fn save_now(slot: StoreSlot, tokens: StoredTokens) {
		*slot.write() = tokens;
	}
}
impl TokenStore for MemoryStore {
	fn load(&self) -> StoreFuture<'_, StoredTokens> {
		let slot = self.0.clone();

		Box::pin(async move { Ok(Self::load_now(slot)) })
	}

	fn save(&self, tokens: StoredTokens) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			Self::save_now(slot, tokens);

			Ok(())
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			Self::save_now(slot, StoredTokens::default());

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn save_load_and_clear() {
		let store = MemoryStore::default();

		assert!(store.load().await.expect("Empty store should load.").is_empty());

		store
			.save(StoredTokens::new("access", Some("refresh".into())))
			.await
			.expect("Saving into the memory store should succeed.");

		let loaded = store.load().await.expect("Memory store should load saved tokens.");

		assert_eq!(loaded.access_token.as_ref().map(|t| t.expose()), Some("access"));
		assert_eq!(loaded.refresh_token.as_ref().map(|t| t.expose()), Some("refresh"));

		store.clear().await.expect("Clearing the memory store should succeed.");

		assert!(store.load().await.expect("Cleared store should load.").is_empty());
	}

	#[tokio::test]
	async fn clones_share_state() {
		let store = MemoryStore::with_tokens(StoredTokens::new("seed", None));
		let clone = store.clone();

		clone.clear().await.expect("Clearing through a clone should succeed.");

		assert!(store.load().await.expect("Original handle should load.").is_empty());
	}
}
