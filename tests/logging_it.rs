#![cfg(feature = "tracing")]

// std
use std::io::{Result as IoResult, Write};
// crates.io
use tracing_subscriber::fmt::MakeWriter;
// self
use resilient_http::{
	_preludet::*,
	client::{RequestContext, RequestOptions},
	security::RedactOptions,
};

#[derive(Clone, Debug, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);
impl Capture {
	fn output(&self) -> String {
		String::from_utf8_lossy(&self.0.lock()).into_owned()
	}
}
impl Write for Capture {
	fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
		self.0.lock().extend_from_slice(buf);

		Ok(buf.len())
	}

	fn flush(&mut self) -> IoResult<()> {
		Ok(())
	}
}
impl<'a> MakeWriter<'a> for Capture {
	type Writer = Capture;

	fn make_writer(&'a self) -> Self::Writer {
		self.clone()
	}
}

fn capture_logs() -> (Capture, tracing::subscriber::DefaultGuard) {
	let capture = Capture::default();
	let subscriber = tracing_subscriber::fmt()
		.with_writer(capture.clone())
		.with_ansi(false)
		.with_max_level(tracing::Level::DEBUG)
		.finish();

	(capture, tracing::subscriber::set_default(subscriber))
}

#[tokio::test]
async fn attempts_emit_one_event_each() {
	let (capture, _guard) = capture_logs();
	let (client, transport, _) = build_scripted_client(|builder| builder);

	transport.on("GET", "/api/users", [
		ScriptedReply::json(503, serde_json::json!({})),
		ScriptedReply::json(200, serde_json::json!([])),
	]);
	transport.on("GET", "/api/missing", [ScriptedReply::json(404, serde_json::json!({}))]);

	client.request_value("/users", RequestOptions::get()).await.expect("Retry should succeed.");

	let _ = client.request_value("/missing", RequestOptions::get()).await;
	let output = capture.output();

	assert!(output.contains("resilient_http.request"));
	assert!(output.contains("http.client.request.retry"));
	assert!(output.contains("http.client.request.succeeded"));
	assert!(output.contains("http.client.request.failed"));
	assert!(output.contains("NOT_FOUND"));
	assert!(output.contains(" WARN "));
	assert!(output.contains("ERROR"));
}

#[tokio::test]
async fn credentials_and_sensitive_context_never_reach_the_log() {
	let (capture, _guard) = capture_logs();
	let (client, transport, _) = build_scripted_client(|builder| builder);
	let client = client.with_redaction(
		RedactOptions::default()
			.with_sensitive_key_pattern("^action$")
			.expect("Pattern should compile."),
	);
	let token = test_jwt(OffsetDateTime::now_utc() + Duration::hours(1));

	client.auth().set_tokens(token.clone(), None).await.expect("Memory store should save.");
	transport.on("GET", "/api/csrf-token", [ScriptedReply::json(
		200,
		serde_json::json!({ "csrfToken": "csrf-secret-value" }),
	)]);
	transport.on("POST", "/api/password", [ScriptedReply::json(
		422,
		serde_json::json!({ "message": "Password too short" }),
	)]);

	let options = RequestOptions::post(serde_json::json!({ "password": "hunter2" }))
		.with_context(RequestContext::page("settings").with_action("reset-hunter2"));
	let err = client
		.request_value("/password", options)
		.await
		.expect_err("The business rule should reject the call.");

	assert_eq!(err.code(), ErrorCode::BusinessError);

	let output = capture.output();

	assert!(output.contains("http.client.request.failed"));
	assert!(output.contains("settings"));
	assert!(output.contains("[REDACTED]"));
	assert!(!output.contains("hunter2"));
	assert!(!output.contains(&token));
	assert!(!output.contains("csrf-secret-value"));
}

#[tokio::test]
async fn csrf_fetch_failures_are_reported_as_security_events() {
	let (capture, _guard) = capture_logs();
	let (client, transport, _) = build_scripted_client(|builder| builder);

	transport.on("GET", "/api/csrf-token", [ScriptedReply::NetworkFailure]);
	transport.on("POST", "/api/users", [ScriptedReply::json(201, serde_json::json!({}))]);

	client
		.request_value("/users", RequestOptions::post(serde_json::json!({})))
		.await
		.expect("The call should proceed without a CSRF token.");

	assert!(capture.output().contains("csrf.fetch.failed"));
}

#[tokio::test]
async fn retry_events_carry_context_and_a_sanitized_error() {
	let (capture, _guard) = capture_logs();
	let (client, transport, _) = build_scripted_client(|builder| builder);
	let message = format!("Upstream\r\nInjected: yes {}", "x".repeat(600));

	transport.on("GET", "/api/orders", [
		ScriptedReply::json(503, serde_json::json!({ "message": message })),
		ScriptedReply::json(200, serde_json::json!([])),
	]);

	client
		.request_value(
			"/orders",
			RequestOptions::get().with_context(RequestContext::page("checkout")),
		)
		.await
		.expect("Retry should succeed.");

	let output = capture.output();
	let retries =
		output.lines().filter(|line| line.contains("http.client.request.retry")).collect::<Vec<_>>();

	assert_eq!(retries.len(), 1);
	assert!(retries[0].contains("checkout"));
	assert!(retries[0].contains("UpstreamInjected: yes"));
	assert!(retries[0].contains("...[truncated]"));
	assert!(!retries[0].contains(&"x".repeat(600)));
	assert!(!output.contains("\\r\\n"));
}
