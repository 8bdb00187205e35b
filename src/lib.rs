//! Resilient HTTP request layer with bearer refresh singleflight, double-submit CSRF, and
//! jittered retries behind one error taxonomy, plus hardened request/response helpers.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod csrf;
pub mod error;
pub mod http;
pub mod obs;
pub mod security;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Test-only prelude and scripted doubles, enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;

	// std
	use std::collections::VecDeque;
	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	// self
	use crate::{
		client::{Client, ClientConfig, Sleeper, SleepFuture},
		error::TransportError,
		http::{Headers, HttpRequest, HttpResponse, HttpTransport, TransportFuture},
	};

	/// Client type alias used by tests that drive the scripted transport.
	pub type ScriptedClient = Client<ScriptedTransport>;

	/// One scripted reply returned by [`ScriptedTransport`].
	#[derive(Clone, Debug)]
	pub enum ScriptedReply {
		/// Respond with the provided response.
		Respond(HttpResponse),
		/// Fail with a network-level transport error.
		NetworkFailure,
		/// Never resolve; lets cancellation and timeout paths win.
		Hang,
	}
	impl ScriptedReply {
		/// JSON response with the given status and body.
		pub fn json(status: u16, body: serde_json::Value) -> Self {
			Self::Respond(HttpResponse::new(status, Headers::default(), body.to_string().into_bytes()))
		}

		/// Response with the given status, headers, and raw body.
		pub fn raw(status: u16, headers: Headers, body: impl Into<Vec<u8>>) -> Self {
			Self::Respond(HttpResponse::new(status, headers, body.into()))
		}
	}

	/// In-process transport that replays scripted replies per route and records every request.
	///
	/// Routes are matched on `"<METHOD> <path>"`, where `<path>` excludes the query string.
	/// Once a route's queue drains, its last reply keeps being replayed.
	#[derive(Debug, Default)]
	pub struct ScriptedTransport {
		routes: Mutex<HashMap<String, VecDeque<ScriptedReply>>>,
		fallback: Mutex<HashMap<String, ScriptedReply>>,
		requests: Mutex<Vec<HttpRequest>>,
	}
	impl ScriptedTransport {
		/// Queues replies for `method path`, e.g. `("GET", "/api/users")`.
		pub fn on(&self, method: &str, path: &str, replies: impl IntoIterator<Item = ScriptedReply>) {
			let key = format!("{method} {path}");
			let mut queue = replies.into_iter().collect::<VecDeque<_>>();

			if let Some(last) = queue.back() {
				self.fallback.lock().insert(key.clone(), last.clone());
			}

			self.routes.lock().entry(key).or_default().append(&mut queue);
		}

		/// Returns every request observed so far.
		pub fn requests(&self) -> Vec<HttpRequest> {
			self.requests.lock().clone()
		}

		/// Returns the requests whose URL path matches `path`.
		pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
			self.requests.lock().iter().filter(|request| request.url.path() == path).cloned().collect()
		}
	}
	impl HttpTransport for ScriptedTransport {
		fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
			let key = format!("{} {}", request.method, request.url.path());

			self.requests.lock().push(request);

			let queued = self.routes.lock().get_mut(&key).and_then(VecDeque::pop_front);
			let reply = queued.or_else(|| self.fallback.lock().get(&key).cloned());

			Box::pin(async move {
				match reply {
					Some(ScriptedReply::Respond(response)) => Ok(response),
					Some(ScriptedReply::NetworkFailure) =>
						Err(TransportError::network(std::io::Error::other("connection reset"))),
					Some(ScriptedReply::Hang) => std::future::pending().await,
					None => Ok(HttpResponse::new(404, Headers::default(), Vec::new())),
				}
			})
		}
	}

	/// Sleeper that records requested delays and returns immediately.
	#[derive(Clone, Debug, Default)]
	pub struct RecordingSleeper(Arc<Mutex<Vec<Duration>>>);
	impl RecordingSleeper {
		/// Returns every delay requested so far.
		pub fn delays(&self) -> Vec<Duration> {
			self.0.lock().clone()
		}
	}
	impl Sleeper for RecordingSleeper {
		fn sleep(&self, delay: Duration) -> SleepFuture<'_> {
			self.0.lock().push(delay);

			Box::pin(async {})
		}
	}

	/// Builds a client over a fresh [`ScriptedTransport`] and [`RecordingSleeper`].
	pub fn build_scripted_client(
		configure: impl FnOnce(crate::client::ClientConfigBuilder) -> crate::client::ClientConfigBuilder,
	) -> (ScriptedClient, Arc<ScriptedTransport>, RecordingSleeper) {
		let config = configure(ClientConfig::builder("https://app.example.com/api"))
			.build()
			.expect("Scripted client configuration should be valid.");
		let transport = Arc::new(ScriptedTransport::default());
		let sleeper = RecordingSleeper::default();
		let client = Client::with_transport(config, transport.clone())
			.expect("Scripted client should build.")
			.with_sleeper(sleeper.clone());

		(client, transport, sleeper)
	}

	/// Encodes an unsigned JWT whose `exp` claim is `expires_at`.
	pub fn test_jwt(expires_at: OffsetDateTime) -> String {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
		let payload = URL_SAFE_NO_PAD
			.encode(serde_json::json!({ "sub": "user-1", "exp": expires_at.unix_timestamp() }).to_string());

		format!("{header}.{payload}.signature")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{ApiError, Error, ErrorCode, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {httpmock as _, tracing_subscriber as _};
