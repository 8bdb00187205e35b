// self
use resilient_http::{_preludet::*, client::RequestOptions};

const CSRF_ROUTE: &str = "/api/csrf-token";
const REFRESH_ROUTE: &str = "/api/auth/refresh";

fn csrf_reply(token: &str) -> ScriptedReply {
	ScriptedReply::json(200, serde_json::json!({ "csrfToken": token }))
}

#[tokio::test]
async fn forbidden_response_refetches_csrf_and_resends_once() {
	let (client, transport, sleeper) = build_scripted_client(|builder| builder);

	transport.on("GET", CSRF_ROUTE, [csrf_reply("csrf-old"), csrf_reply("csrf-new")]);
	transport.on("POST", "/api/users", [
		ScriptedReply::json(403, serde_json::json!({ "message": "CSRF token mismatch" })),
		ScriptedReply::json(201, serde_json::json!({ "id": 1 })),
	]);

	let response = client
		.request_value("/users", RequestOptions::post(serde_json::json!({ "name": "Ada" })))
		.await
		.expect("The resend should succeed.");

	assert_eq!(response.status, 201);

	let posts = transport.requests_to("/api/users");

	assert_eq!(posts.len(), 2);
	assert_eq!(posts[0].headers.get("x-csrf-token"), Some("csrf-old"));
	assert_eq!(posts[1].headers.get("x-csrf-token"), Some("csrf-new"));
	assert_eq!(posts[0].headers.get("x-correlation-id"), posts[1].headers.get("x-correlation-id"));
	assert_eq!(transport.requests_to(CSRF_ROUTE).len(), 2);
	assert_eq!(client.csrf_cache().get().as_deref(), Some("csrf-new"));
	// The recovery lives inside one attempt, so no backoff is involved.
	assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn repeated_forbidden_surfaces_after_one_recovery() {
	let (client, transport, _) = build_scripted_client(|builder| builder);

	transport.on("GET", CSRF_ROUTE, [csrf_reply("csrf-1"), csrf_reply("csrf-2")]);
	transport.on("POST", "/api/users", [ScriptedReply::json(
		403,
		serde_json::json!({ "message": "Not allowed" }),
	)]);

	let err = client
		.request_value("/users", RequestOptions::post(serde_json::json!({})))
		.await
		.expect_err("A persistent 403 should fail.");

	assert_eq!(err.code(), ErrorCode::Forbidden);
	assert_eq!(err.message(), "Not allowed");
	assert!(!err.is_retryable());
	assert_eq!(transport.requests_to("/api/users").len(), 2);
}

#[tokio::test]
async fn forbidden_get_is_not_recovered() {
	let (client, transport, _) = build_scripted_client(|builder| builder);

	transport.on("GET", "/api/admin", [ScriptedReply::json(403, serde_json::json!({}))]);

	let err = client
		.request_value("/admin", RequestOptions::get())
		.await
		.expect_err("GET requests carry no CSRF token to refresh.");

	assert_eq!(err.code(), ErrorCode::Forbidden);
	assert_eq!(transport.requests().len(), 1);
	assert!(transport.requests_to(CSRF_ROUTE).is_empty());
}

#[tokio::test]
async fn unauthorized_response_refreshes_and_resends_with_new_bearer() {
	let (client, transport, _) = build_scripted_client(|builder| builder);
	let old = test_jwt(OffsetDateTime::now_utc() + Duration::hours(1));
	let new = test_jwt(OffsetDateTime::now_utc() + Duration::hours(2));

	client
		.auth()
		.set_tokens(old.clone(), Some("refresh-1".into()))
		.await
		.expect("Memory store should save.");
	transport.on("POST", REFRESH_ROUTE, [ScriptedReply::json(
		200,
		serde_json::json!({ "accessToken": new }),
	)]);
	transport.on("GET", "/api/me", [
		ScriptedReply::json(401, serde_json::json!({ "message": "expired" })),
		ScriptedReply::json(200, serde_json::json!({ "id": 1 })),
	]);

	let response =
		client.request_value("/me", RequestOptions::get()).await.expect("The resend should succeed.");

	assert_eq!(response.data, serde_json::json!({ "id": 1 }));

	let calls = transport.requests_to("/api/me");

	assert_eq!(calls.len(), 2);
	assert_eq!(calls[0].headers.get("authorization"), Some(format!("Bearer {old}").as_str()));
	assert_eq!(calls[1].headers.get("authorization"), Some(format!("Bearer {new}").as_str()));

	let refreshes = transport.requests_to(REFRESH_ROUTE);

	assert_eq!(refreshes.len(), 1);
	assert_eq!(refreshes[0].json_body(), Some(serde_json::json!({ "refreshToken": "refresh-1" })));
	assert_eq!(client.refresh_metrics().successes(), 1);
}

#[tokio::test]
async fn failed_refresh_surfaces_auth_error_and_clears_tokens() {
	let (client, transport, _) = build_scripted_client(|builder| builder);
	let token = test_jwt(OffsetDateTime::now_utc() + Duration::hours(1));

	client
		.auth()
		.set_tokens(token, Some("refresh-1".into()))
		.await
		.expect("Memory store should save.");
	transport.on("POST", REFRESH_ROUTE, [ScriptedReply::json(500, serde_json::json!({}))]);
	transport.on("GET", "/api/me", [ScriptedReply::json(401, serde_json::json!({}))]);

	let err = client
		.request_value("/me", RequestOptions::get())
		.await
		.expect_err("An unrecoverable 401 should fail.");

	assert_eq!(err.code(), ErrorCode::AuthError);
	assert!(!err.is_retryable());
	assert_eq!(transport.requests_to("/api/me").len(), 1);
	assert!(client.auth().access_token().await.is_none());
	assert_eq!(client.refresh_metrics().failures(), 1);
}

#[tokio::test]
async fn anonymous_calls_do_not_attempt_refresh() {
	let (client, transport, _) = build_scripted_client(|builder| builder);

	transport.on("GET", "/api/public", [ScriptedReply::json(401, serde_json::json!({}))]);

	let err = client
		.request_value("/public", RequestOptions::get().with_auth(false))
		.await
		.expect_err("The 401 should surface directly.");

	assert_eq!(err.code(), ErrorCode::AuthError);
	assert!(transport.requests_to(REFRESH_ROUTE).is_empty());
}
