//! End-to-end scenarios against a real upstream bound on an ephemeral port,
//! exercised through actix-web's own test harness (`actix_web::test`),
//! matching the style of the teacher's `tests/integration_tests.rs`.

use actix_web::{test, web, App, HttpRequest, HttpResponse};
use piapi_gateway::app::AppState;
use piapi_gateway::config::ConfigManager;
use piapi_gateway::proxy::ProxyClient;
use piapi_gateway::routes;
use std::sync::Arc;
use std::time::Duration;

/// A tiny upstream that echoes back the request's path/query/headers as a
/// JSON body, so each scenario can assert on exactly what the gateway sent.
async fn echo_upstream(req: HttpRequest) -> HttpResponse {
    let auth = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let api_key = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    HttpResponse::Ok().json(serde_json::json!({
        "path": req.path(),
        "query": req.query_string(),
        "authorization": auth,
        "x_api_key": api_key,
    }))
}

async fn failing_upstream() -> HttpResponse {
    HttpResponse::ServiceUnavailable().finish()
}

async fn start_upstream(
    handler: fn() -> actix_web::Resource,
) -> (String, actix_web::dev::ServerHandle) {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = actix_web::HttpServer::new(move || App::new().service(handler()))
        .listen(listener)
        .unwrap()
        .run();
    let handle = server.handle();
    tokio::spawn(server);
    (format!("http://{addr}"), handle)
}

fn echo_resource() -> actix_web::Resource {
    web::resource("/{tail:.*}").route(web::route().to(echo_upstream))
}

fn failing_resource() -> actix_web::Resource {
    web::resource("/{tail:.*}").route(web::route().to(failing_upstream))
}

fn gateway_app_data(yaml: &str) -> web::Data<AppState> {
    let manager = Arc::new(ConfigManager::new());
    manager.load(yaml).expect("test fixture config must be valid");
    web::Data::new(AppState {
        config_manager: manager,
        proxy_client: ProxyClient::new(Duration::from_secs(5)),
    })
}

#[actix_web::test]
async fn header_credential_is_injected_and_caller_token_is_stripped() {
    let (base_url, upstream_handle) = start_upstream(echo_resource).await;
    let yaml = format!(
        r#"
providers:
  - name: acme
    named_keys:
      primary: sk-live-secret
    services:
      - type: chat
        base_url: "{base_url}"
users:
  - token: alice-token
    service_routes:
      chat:
        provider_name: acme
        key_name: primary
"#
    );

    let app_data = gateway_app_data(&yaml);
    let app = test::init_service(App::new().app_data(app_data.clone()).configure(routes::configure("piapi"))).await;

    let req = test::TestRequest::get()
        .uri("/piapi/chat/v1/models?foo=bar")
        .insert_header(("authorization", "Bearer alice-token"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["path"], "/v1/models");
    assert_eq!(body["query"], "foo=bar");
    assert_eq!(body["authorization"], "Bearer sk-live-secret");

    upstream_handle.stop(true).await;
}

#[actix_web::test]
async fn query_credential_mode_appends_api_key() {
    let (base_url, upstream_handle) = start_upstream(echo_resource).await;
    let yaml = format!(
        r#"
providers:
  - name: acme
    named_keys:
      primary: sk-live-secret
    services:
      - type: chat
        base_url: "{base_url}"
        auth:
          mode: query
          name: api_key
users:
  - token: alice-token
    service_routes:
      chat:
        provider_name: acme
        key_name: primary
"#
    );

    let app_data = gateway_app_data(&yaml);
    let app = test::init_service(App::new().app_data(app_data.clone()).configure(routes::configure("piapi"))).await;

    let req = test::TestRequest::get()
        .uri("/piapi/chat/v1/models")
        .insert_header(("authorization", "Bearer alice-token"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["query"], "api_key=sk-live-secret");

    upstream_handle.stop(true).await;
}

#[actix_web::test]
async fn round_robin_alternates_across_requests() {
    let (base_url_a, handle_a) = start_upstream(echo_resource).await;
    let (base_url_b, handle_b) = start_upstream(echo_resource).await;
    let yaml = format!(
        r#"
providers:
  - name: acme
    named_keys:
      a: sk-a
      b: sk-b
    services:
      - type: chat
        base_url: "{base_url_a}"
users:
  - token: alice-token
    service_routes:
      chat:
        candidates:
          - provider_name: acme
            key_name: a
          - provider_name: acme
            key_name: b
"#
    );
    // Both candidates share one provider/service definition in this fixture
    // (base_url_a); base_url_b is unused here — round-robin is observed via
    // which *key* (a vs b) was injected, not which upstream received it.
    let _ = base_url_b;
    let _ = handle_b;

    let app_data = gateway_app_data(&yaml);
    let app = test::init_service(App::new().app_data(app_data.clone()).configure(routes::configure("piapi"))).await;

    let mut keys_seen = Vec::new();
    for _ in 0..4 {
        let req = test::TestRequest::get()
            .uri("/piapi/chat/x")
            .insert_header(("authorization", "Bearer alice-token"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        let body: serde_json::Value = test::read_body_json(resp).await;
        keys_seen.push(body["authorization"].as_str().unwrap().to_string());
    }

    assert_eq!(keys_seen, vec!["Bearer sk-a", "Bearer sk-b", "Bearer sk-a", "Bearer sk-b"]);
    handle_a.stop(true).await;
}

#[actix_web::test]
async fn repeated_upstream_failures_quarantine_the_only_candidate() {
    let (base_url, upstream_handle) = start_upstream(failing_resource).await;
    let yaml = format!(
        r#"
providers:
  - name: acme
    named_keys:
      primary: sk-live-secret
    services:
      - type: chat
        base_url: "{base_url}"
users:
  - token: alice-token
    service_routes:
      chat:
        provider_name: acme
        key_name: primary
"#
    );

    let app_data = gateway_app_data(&yaml);
    let app = test::init_service(App::new().app_data(app_data.clone()).configure(routes::configure("piapi"))).await;

    let first = test::TestRequest::get()
        .uri("/piapi/chat/x")
        .insert_header(("authorization", "Bearer alice-token"))
        .to_request();
    let resp = test::call_service(&app, first).await;
    assert_eq!(resp.status(), 503);

    let second = test::TestRequest::get()
        .uri("/piapi/chat/x")
        .insert_header(("authorization", "Bearer alice-token"))
        .to_request();
    let resp = test::call_service(&app, second).await;
    assert_eq!(resp.status(), 503, "candidate is now quarantined so the gateway itself returns 503");

    upstream_handle.stop(true).await;
}

#[actix_web::test]
async fn missing_token_is_rejected_before_any_upstream_call() {
    let app_data = gateway_app_data(
        r#"
providers: []
users: []
"#,
    );
    let app = test::init_service(App::new().app_data(app_data.clone()).configure(routes::configure("piapi"))).await;

    let req = test::TestRequest::get().uri("/piapi/chat/x").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn requests_without_the_gateway_prefix_do_not_match() {
    let app_data = gateway_app_data(
        r#"
providers: []
users: []
"#,
    );
    let app = test::init_service(App::new().app_data(app_data.clone()).configure(routes::configure("piapi"))).await;

    let req = test::TestRequest::get()
        .uri("/chat/x")
        .insert_header(("authorization", "Bearer alice-token"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn unknown_token_is_unauthorized() {
    let app_data = gateway_app_data(
        r#"
providers: []
users: []
"#,
    );
    let app = test::init_service(App::new().app_data(app_data.clone()).configure(routes::configure("piapi"))).await;

    let req = test::TestRequest::get()
        .uri("/piapi/chat/x")
        .insert_header(("authorization", "Bearer nope"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}
