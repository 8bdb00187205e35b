//! Single logical send with the one-shot auth and CSRF recoveries.

// self
use crate::{
	_prelude::*,
	client::{ApiResponse, Client, MAX_MOCK_SCENARIO_LENGTH, RequestOptions, RetryConfig},
	error::{ApiErrorParams, TransportError},
	http::{Headers, HttpMethod, HttpRequest, HttpResponse, HttpTransport},
	obs::{self, SecurityEvent},
	security::{
		CORRELATION_ID_HEADER, CSRF_HEADER_NAME, normalize_header_value, strip_control_chars,
	},
};

const REQUEST_CONTEXT_HEADER: &str = "X-Request-Context";
const REQUEST_CONTEXT_MAX: usize = 512;
const MOCK_SCENARIO_HEADER: &str = "x-mock-scenario";
const EMPTY_BODY_STATUSES: [u16; 3] = [204, 205, 304];

/// Inputs shared by every attempt of one logical call.
pub(super) struct Call<'a> {
	pub(super) path: &'a str,
	pub(super) options: &'a RequestOptions,
	pub(super) request_id: &'a str,
	pub(super) retry: &'a RetryConfig,
}

/// Recoveries already spent by the current attempt. Each one is available once.
#[derive(Clone, Copy, Debug, Default)]
struct RetryBudget {
	auth_retry_used: bool,
	csrf_retry_used: bool,
}

#[derive(Debug, ThisError)]
enum CsrfFetchFailure {
	#[error("CSRF endpoint URL is invalid: {0}.")]
	Url(#[from] url::ParseError),
	#[error(transparent)]
	Transport(#[from] TransportError),
	#[error("CSRF request timed out.")]
	Timeout,
	#[error("CSRF endpoint answered with status {0}.")]
	Status(u16),
	#[error("CSRF response is not valid JSON: {0}.")]
	Malformed(#[from] serde_json::Error),
	#[error("CSRF response carries no token.")]
	MissingToken,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CsrfTokenResponse {
	csrf_token: Option<String>,
}

impl<T> Client<T>
where
	T: HttpTransport,
{
	/// Runs one attempt: build, send, recover from 401/403 at most once each, then classify.
	pub(super) async fn execute(&self, call: &Call<'_>) -> Result<ApiResponse<Value>, ApiError> {
		let url = self.build_url(call.path, &call.options.query)?;
		let body = call
			.options
			.body
			.as_ref()
			.filter(|body| !body.is_null())
			.map(|body| body.to_string().into_bytes());
		let with_auth = call.options.auth_enabled();
		let with_csrf = call.options.csrf_enabled();
		let mut budget = RetryBudget::default();

		loop {
			let headers = self.build_headers(call, with_auth, with_csrf).await;
			let mut request =
				HttpRequest::new(call.options.method, url.clone()).with_headers(headers);

			if let Some(body) = &body {
				request = request.with_body(body.clone());
			}

			let response = self.send(request, call.options).await?;

			if response.status == 401 && with_auth && !budget.auth_retry_used {
				budget.auth_retry_used = true;

				if self.auth.force_refresh().await.is_some() {
					continue;
				}
			}
			if response.status == 403 && with_csrf && !budget.csrf_retry_used {
				budget.csrf_retry_used = true;

				self.csrf.clear();

				if self.fetch_csrf_token().await.is_some() {
					continue;
				}
			}

			return classify(response, call.retry);
		}
	}

	fn build_url(&self, path: &str, query: &[(String, String)]) -> Result<Url, ApiError> {
		let mut url = self.config.endpoint(path).map_err(|e| {
			ApiError::new(
				ApiErrorParams::new(ErrorCode::UnknownError, false)
					.with_message(format!("Request URL is invalid: {e}.")),
			)
		})?;

		if !query.is_empty() {
			url.query_pairs_mut().extend_pairs(query);
		}

		Ok(url)
	}

	async fn build_headers(&self, call: &Call<'_>, with_auth: bool, with_csrf: bool) -> Headers {
		let max = self.config.header_value_max;
		let mut headers = Headers::new()
			.with("content-type", "application/json")
			.with(CORRELATION_ID_HEADER, call.request_id);

		for (name, value) in call.options.headers.iter() {
			headers.insert(name, normalize_header_value(value, max));
		}

		if let Some(context) = &call.options.context {
			headers.insert(
				REQUEST_CONTEXT_HEADER,
				normalize_header_value(&context.to_value().to_string(), REQUEST_CONTEXT_MAX),
			);
		}
		if let Some(scenario) = self.config.active_mock_scenario() {
			let scenario = normalize_header_value(scenario, MAX_MOCK_SCENARIO_LENGTH);

			if !scenario.is_empty() {
				headers.insert(MOCK_SCENARIO_HEADER, scenario);
			}
		}

		let bearer = if with_auth { self.auth.ensure_valid_token().await } else { None };

		if let Some(token) = bearer {
			headers.insert("authorization", format!("Bearer {}", strip_control_chars(token.expose())));
		}

		let csrf = if with_csrf { self.csrf_token().await } else { None };

		if let Some(token) = csrf {
			headers.insert(CSRF_HEADER_NAME, strip_control_chars(&token));
		}

		headers
	}

	/// Sends under one cancellation scope: the caller's token when given, otherwise a fresh
	/// timeout window.
	async fn send(
		&self,
		request: HttpRequest,
		options: &RequestOptions,
	) -> Result<HttpResponse, ApiError> {
		let send = self.transport.send(request);

		match &options.signal {
			Some(signal) => tokio::select! {
				biased;
				_ = signal.cancelled() => Err(ApiError::timeout()),
				result = send => result.map_err(ApiError::from),
			},
			None => {
				let timeout = options
					.timeout
					.filter(|timeout| timeout.is_positive())
					.unwrap_or(self.config.timeout);

				match tokio::time::timeout(timeout.unsigned_abs(), send).await {
					Ok(result) => result.map_err(ApiError::from),
					Err(_) => Err(ApiError::timeout()),
				}
			},
		}
	}

	async fn csrf_token(&self) -> Option<String> {
		match self.csrf.get() {
			Some(token) => Some(token),
			None => self.fetch_csrf_token().await,
		}
	}

	/// Fetches a fresh CSRF token into the cache; any failure leaves the cache empty.
	async fn fetch_csrf_token(&self) -> Option<String> {
		match self.request_csrf_token().await {
			Ok(token) => Some(self.csrf.set(token)),
			Err(e) => {
				self.csrf.clear();
				obs::record_security_event(SecurityEvent::CsrfFetchFailed, Some(&e.to_string()));

				None
			},
		}
	}

	async fn request_csrf_token(&self) -> Result<String, CsrfFetchFailure> {
		let url = self.config.endpoint(&self.config.csrf_path)?;
		let request = HttpRequest::new(HttpMethod::Get, url);
		let response =
			tokio::time::timeout(self.config.timeout.unsigned_abs(), self.transport.send(request))
				.await
				.map_err(|_| CsrfFetchFailure::Timeout)??;

		if !response.is_success() {
			return Err(CsrfFetchFailure::Status(response.status));
		}

		serde_json::from_slice::<CsrfTokenResponse>(&response.body)?
			.csrf_token
			.filter(|token| !token.is_empty())
			.ok_or(CsrfFetchFailure::MissingToken)
	}
}

fn classify(response: HttpResponse, retry: &RetryConfig) -> Result<ApiResponse<Value>, ApiError> {
	if !response.is_success() {
		return Err(ApiError::from_response(&response, &retry.retryable_statuses));
	}

	let data = if EMPTY_BODY_STATUSES.contains(&response.status) || response.body.is_empty() {
		Value::Object(Default::default())
	} else {
		serde_json::from_slice(&response.body).map_err(ApiError::response_parse)?
	};

	Ok(ApiResponse { data, status: response.status, headers: response.headers })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, client::RequestContext, error::ErrorCause};

	#[test]
	fn empty_and_no_content_bodies_become_empty_objects() {
		let retry = RetryConfig::default();

		for response in [
			HttpResponse::new(204, Headers::new(), b"ignored".to_vec()),
			HttpResponse::new(200, Headers::new(), Vec::new()),
		] {
			let parsed = classify(response, &retry).expect("Empty bodies should succeed.");

			assert_eq!(parsed.data, serde_json::json!({}));
		}
	}

	#[test]
	fn unparsable_success_bodies_fail_without_retry() {
		let response = HttpResponse::new(200, Headers::new(), b"<html>".to_vec());
		let err =
			classify(response, &RetryConfig::default()).expect_err("HTML should not parse as JSON.");

		assert_eq!(err.code(), ErrorCode::ValidationError);
		assert_eq!(err.cause(), Some(ErrorCause::ResponseParse));
		assert!(!err.is_retryable());
	}

	#[tokio::test]
	async fn headers_are_assembled_and_sanitized() {
		let (client, transport, _) =
			build_scripted_client(|builder| builder.with_mock_scenario("slow\r\nnetwork"));

		let token = test_jwt(OffsetDateTime::now_utc() + Duration::hours(1));

		client.auth().set_tokens(token.clone(), None).await.expect("Memory store should save.");
		transport.on("GET", "/api/csrf-token", [ScriptedReply::json(
			200,
			serde_json::json!({ "csrfToken": "csrf-1" }),
		)]);
		transport.on("POST", "/api/users", [ScriptedReply::json(201, serde_json::json!({ "id": 1 }))]);

		let options = RequestOptions::post(serde_json::json!({ "name": "Ada" }))
			.with_header("X-Trace", "a\r\nInjected: yes")
			.with_context(RequestContext::page("users").with_action("create"))
			.with_query("dryRun", true);
		let response =
			client.request_value("/users", options).await.expect("Request should succeed.");

		assert_eq!(response.status, 201);

		let sent = transport.requests_to("/api/users");
		let headers = &sent[0].headers;

		assert_eq!(sent[0].url.query(), Some("dryRun=true"));
		assert_eq!(sent[0].json_body(), Some(serde_json::json!({ "name": "Ada" })));
		assert_eq!(headers.get("content-type"), Some("application/json"));
		assert_eq!(headers.get("authorization"), Some(format!("Bearer {token}").as_str()));
		assert_eq!(headers.get("x-csrf-token"), Some("csrf-1"));
		assert_eq!(headers.get("x-trace"), Some("aInjected: yes"));
		assert_eq!(headers.get("x-mock-scenario"), Some("slownetwork"));
		assert_eq!(
			headers
				.get("x-request-context")
				.and_then(|raw| serde_json::from_str::<Value>(raw).ok()),
			Some(serde_json::json!({ "page": "users", "action": "create" }))
		);
		assert!(headers.get("x-correlation-id").is_some_and(|id| id.len() == 36));
	}

	#[tokio::test]
	async fn null_bodies_are_omitted() {
		let (client, transport, _) = build_scripted_client(|builder| builder);

		transport.on("POST", "/api/ping", [ScriptedReply::json(200, serde_json::json!({}))]);

		client
			.request_value("/ping", RequestOptions::post(Value::Null).with_csrf(false))
			.await
			.expect("Request should succeed.");

		let sent = transport.requests_to("/api/ping");

		assert_eq!(sent.len(), 1);
		assert!(sent[0].body.is_none());
	}

	#[tokio::test]
	async fn get_requests_skip_csrf_and_anonymous_calls_skip_auth() {
		let (client, transport, _) = build_scripted_client(|builder| builder);
		let token = test_jwt(OffsetDateTime::now_utc() + Duration::hours(1));

		client.auth().set_tokens(token, None).await.expect("Memory store should save.");
		transport.on("GET", "/api/public", [ScriptedReply::json(200, serde_json::json!([]))]);

		client
			.request_value("/public", RequestOptions::get().with_auth(false))
			.await
			.expect("Request should succeed.");

		let sent = transport.requests();

		assert_eq!(sent.len(), 1);
		assert!(!sent[0].headers.contains("authorization"));
		assert!(!sent[0].headers.contains("x-csrf-token"));
	}

	#[tokio::test]
	async fn failed_csrf_fetch_sends_without_token() {
		let (client, transport, _) = build_scripted_client(|builder| builder);

		transport.on("GET", "/api/csrf-token", [ScriptedReply::json(500, serde_json::json!({}))]);
		transport.on("DELETE", "/api/users/1", [ScriptedReply::raw(204, Headers::new(), "")]);

		let response = client
			.request_value("/users/1", RequestOptions::new(HttpMethod::Delete))
			.await
			.expect("Request should succeed.");

		assert_eq!(response.data, serde_json::json!({}));
		assert!(!transport.requests_to("/api/users/1")[0].headers.contains("x-csrf-token"));
		assert!(client.csrf_cache().get().is_none());
	}
}
