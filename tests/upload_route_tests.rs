use axum::{
    Json, Router,
    body::{Body, Bytes, to_bytes},
    extract::{Multipart, State},
    http::{HeaderMap, Request, StatusCode},
    response::IntoResponse,
    routing::post,
};
use serde_json::{Value, json};
use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};
use tokio::net::TcpListener;
use tower::ServiceExt;
use url::Url;
use walt::config::{Config, Transport};
use walt::db::DbActorHandle;
use walt::server::router::{WaltState, walt_router};

const WALT_KEY: &str = "pwd";
const MASTER_KEY: &str = "master-secret";
const FRONT_DATA_URI: &str = "data:image/png;base64,UElOIQ==";

// Keys deliberately unsorted with odd spacing: the relay must not re-serialize.
const UPSTREAM_BODY: &str = r#"{"success":true, "zeta":1,"authentic":true,"authenticityRating":"92%","analysis":"<p>ok</p>","alpha":[2,1]}"#;

#[derive(Debug, Clone)]
struct CapturedPart {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Bytes,
}

#[derive(Debug, Clone)]
struct Captured {
    api_key: Option<String>,
    accept: Option<String>,
    json: Option<Value>,
    parts: Vec<CapturedPart>,
}

#[derive(Clone, Default)]
struct MockState {
    reqs: Arc<Mutex<Vec<Captured>>>,
    hits: Arc<AtomicUsize>,
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn ok_json(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state.reqs.lock().expect("lock").push(Captured {
        api_key: header(&headers, "x-api-key"),
        accept: header(&headers, "accept"),
        json: Some(body),
        parts: Vec::new(),
    });
    (
        StatusCode::OK,
        [("content-type", "application/json")],
        UPSTREAM_BODY,
    )
}

async fn ok_form(
    State(state): State<MockState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.expect("multipart field") {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.expect("field bytes");
        parts.push(CapturedPart {
            name,
            file_name,
            content_type,
            bytes,
        });
    }
    state.reqs.lock().expect("lock").push(Captured {
        api_key: header(&headers, "x-api-key"),
        accept: header(&headers, "accept"),
        json: None,
        parts,
    });
    (
        StatusCode::OK,
        [("content-type", "application/json")],
        UPSTREAM_BODY,
    )
}

async fn fail_500() -> impl IntoResponse {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "<html>upstream exploded: stack trace here</html>",
    )
}

async fn always_500(State(state): State<MockState>) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::BAD_GATEWAY, "try again later")
}

async fn always_401(State(state): State<MockState>) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::UNAUTHORIZED, r#"{"error":"bad api key"}"#)
}

async fn not_json() -> impl IntoResponse {
    (StatusCode::OK, "definitely not json")
}

async fn slow() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(5)).await;
    (StatusCode::OK, UPSTREAM_BODY)
}

fn mock_master(state: MockState) -> Router {
    Router::new()
        .route("/json/mobile-upload", post(ok_json))
        .route("/form/mobile-upload", post(ok_form))
        .route("/fail/mobile-upload", post(fail_500))
        .route("/garbage/mobile-upload", post(not_json))
        .route("/slow/mobile-upload", post(slow))
        .route("/flaky/mobile-upload", post(always_500))
        .route("/reject/mobile-upload", post(always_401))
        .with_state(state)
}

async fn spawn_test_server(app: Router) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    let base = Url::parse(&format!("http://{addr}/")).expect("base url");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    base
}

fn unique_sqlite_url(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();

    let mut temp_path = std::env::temp_dir();
    temp_path.push(format!(
        "walt-{prefix}-{}-{}.sqlite",
        std::process::id(),
        nanos
    ));
    format!("sqlite:{}", temp_path.display())
}

struct Harness {
    app: Router,
    db: DbActorHandle,
    captured: MockState,
}

async fn harness(prefix: &str, upstream_path: &str, tweak: impl FnOnce(&mut Config)) -> Harness {
    let captured = MockState::default();
    let base = spawn_test_server(mock_master(captured.clone())).await;

    let mut cfg = Config::default();
    cfg.basic.walt_key = WALT_KEY.to_string();
    cfg.basic.static_dir = std::env::temp_dir().join("walt-no-static");
    cfg.master.api_key = MASTER_KEY.to_string();
    cfg.master.base_url = base.join(upstream_path).expect("upstream base");
    cfg.master.max_rps = 0;
    tweak(&mut cfg);

    let db = walt::db::spawn(&unique_sqlite_url(prefix))
        .await
        .expect("spawn db");
    let state = WaltState::new(&cfg, db.clone()).expect("state");

    Harness {
        app: walt_router(state),
        db,
        captured,
    }
}

fn json_post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

async fn read_body(resp: axum::response::Response) -> Bytes {
    to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body")
}

#[tokio::test]
async fn upload_relays_master_response_verbatim() {
    let h = harness("relay", "json/", |_| {}).await;

    let resp = h
        .app
        .clone()
        .oneshot(json_post(
            "/api/upload",
            &json!({
                "sessionId": "s-relay",
                "frontImage": FRONT_DATA_URI,
                "backImage": "  ",
                "angledImage": "data:image/jpeg;base64,QU5HTEU="
            }),
        ))
        .await
        .expect("request failed");

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/json"
    );
    assert!(resp.headers().get("x-walt-mock").is_none());
    assert_eq!(read_body(resp).await, Bytes::from_static(UPSTREAM_BODY.as_bytes()));

    let reqs = h.captured.reqs.lock().expect("lock").clone();
    assert_eq!(reqs.len(), 1);
    assert_eq!(reqs[0].api_key.as_deref(), Some(MASTER_KEY));
    assert_eq!(reqs[0].accept.as_deref(), Some("application/json"));
    // Prefixes stripped, blank back image omitted.
    assert_eq!(
        reqs[0].json,
        Some(json!({
            "sessionId": "s-relay",
            "frontImageData": "UElOIQ==",
            "angledImageData": "QU5HTEU="
        }))
    );

    // Stored result survives a page reload.
    let resp = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/analyses/s-relay")
                .body(Body::empty())
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(read_body(resp).await, Bytes::from_static(UPSTREAM_BODY.as_bytes()));

    let stored = h
        .db
        .get_analysis("s-relay")
        .await
        .expect("get analysis")
        .expect("analysis row");
    assert_eq!(stored.result_json, UPSTREAM_BODY);
    assert_eq!(stored.authentic, Some(true));
    assert_eq!(stored.authenticity_rating, Some(92.0));
    assert_eq!(stored.source, "upstream");

    let log = h.db.list_api_log(10).await.expect("api log");
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].endpoint, "/api/upload");
    assert_eq!(log[0].status_code, 200);
    assert_eq!(log[0].transport, "json");
    assert!(log[0].error.is_none());
}

#[tokio::test]
async fn upload_without_front_image_is_rejected_before_upstream() {
    let h = harness("missing-front", "json/", |_| {}).await;

    for body in [
        json!({ "backImage": FRONT_DATA_URI }),
        json!({ "frontImage": "   ", "angledImage": FRONT_DATA_URI }),
    ] {
        let resp = h
            .app
            .clone()
            .oneshot(json_post("/api/upload", &body))
            .await
            .expect("request failed");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = serde_json::from_slice(&read_body(resp).await).unwrap();
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"]["code"], json!("MISSING_FRONT_IMAGE"));
    }

    // Invalid JSON never reaches the master server either.
    let resp = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/upload")
                .header("content-type", "application/json")
                .body(Body::from("not-json"))
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert!(h.captured.reqs.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn upstream_failures_map_to_generic_500() {
    let expected = json!({
        "success": false,
        "error": {
            "code": "SERVICE_UNAVAILABLE",
            "message": "Pin authentication service is temporarily unavailable."
        }
    });

    for path in ["fail/", "garbage/"] {
        let h = harness("upstream-fail", path, |_| {}).await;
        let resp = h
            .app
            .clone()
            .oneshot(json_post("/api/upload", &json!({ "frontImage": FRONT_DATA_URI })))
            .await
            .expect("request failed");

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR, "path {path}");
        let bytes = read_body(resp).await;
        let text = std::str::from_utf8(&bytes).expect("utf-8 body");
        assert!(!text.contains("stack trace"), "upstream body leaked: {text}");
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, expected);
    }

    let h = harness("upstream-fail-log", "fail/", |_| {}).await;
    let resp = h
        .app
        .clone()
        .oneshot(json_post(
            "/api/upload",
            &json!({ "sessionId": "s-fail", "frontImage": FRONT_DATA_URI }),
        ))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let log = h.db.list_api_log(10).await.expect("api log");
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].session_id.as_deref(), Some("s-fail"));
    assert_eq!(log[0].status_code, 500);
    assert!(log[0].error.is_some());
    assert!(h.db.get_analysis("s-fail").await.unwrap().is_none());
}

#[tokio::test]
async fn upstream_timeout_maps_to_generic_500() {
    let h = harness("timeout", "slow/", |cfg| cfg.master.timeout_secs = 1).await;

    let resp = h
        .app
        .clone()
        .oneshot(json_post("/api/upload", &json!({ "frontImage": FRONT_DATA_URI })))
        .await
        .expect("request failed");

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_slice(&read_body(resp).await).unwrap();
    assert_eq!(body["error"]["code"], json!("SERVICE_UNAVAILABLE"));
}

#[tokio::test]
async fn mock_fallback_serves_marked_demo_result() {
    let h = harness("mock-fallback", "fail/", |cfg| cfg.master.mock_fallback = true).await;

    let resp = h
        .app
        .clone()
        .oneshot(json_post(
            "/api/upload",
            &json!({ "sessionId": "s-mock", "frontImage": FRONT_DATA_URI }),
        ))
        .await
        .expect("request failed");

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("x-walt-mock").unwrap(), "true");
    let body: Value = serde_json::from_slice(&read_body(resp).await).unwrap();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["sessionId"], json!("s-mock"));

    let stored = h
        .db
        .get_analysis("s-mock")
        .await
        .expect("get analysis")
        .expect("analysis row");
    assert_eq!(stored.source, "mock");

    // Client errors are never masked by the fallback.
    let resp = h
        .app
        .clone()
        .oneshot(json_post("/api/upload", &json!({})))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn multipart_transport_sends_binary_parts() {
    let h = harness("multipart", "form/", |cfg| {
        cfg.master.transport = Transport::Multipart;
    })
    .await;

    let resp = h
        .app
        .clone()
        .oneshot(json_post(
            "/api/upload",
            &json!({
                "sessionId": "s-form",
                "frontImage": FRONT_DATA_URI,
                "backImage": "QkFDSw=="
            }),
        ))
        .await
        .expect("request failed");

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(read_body(resp).await, Bytes::from_static(UPSTREAM_BODY.as_bytes()));

    let reqs = h.captured.reqs.lock().expect("lock").clone();
    assert_eq!(reqs.len(), 1);
    assert_eq!(reqs[0].api_key.as_deref(), Some(MASTER_KEY));

    let part = |name: &str| {
        reqs[0]
            .parts
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .unwrap_or_else(|| panic!("missing part {name}"))
    };

    assert_eq!(part("api_key").bytes, Bytes::from_static(MASTER_KEY.as_bytes()));
    assert_eq!(part("session_id").bytes, Bytes::from_static(b"s-form"));

    let front = part("front_image");
    assert_eq!(front.bytes, Bytes::from_static(b"PIN!"));
    assert_eq!(front.file_name.as_deref(), Some("front.png"));
    assert_eq!(front.content_type.as_deref(), Some("image/png"));

    // Bare base64 gets the default image type.
    let back = part("back_image");
    assert_eq!(back.bytes, Bytes::from_static(b"BACK"));
    assert_eq!(back.content_type.as_deref(), Some("image/jpeg"));

    assert!(reqs[0].parts.iter().all(|p| p.name != "angled_image"));
}

#[tokio::test]
async fn multipart_client_upload_is_forwarded_as_json() {
    let h = harness("multipart-in", "json/", |_| {}).await;

    let boundary = "WALTBOUNDARY";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"session_id\"\r\n\r\nmp-1\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"front_image\"; filename=\"front.png\"\r\n\
         Content-Type: image/png\r\n\r\nPIN!\r\n\
         --{b}--\r\n",
        b = boundary
    );

    let resp = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/upload")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);

    let reqs = h.captured.reqs.lock().expect("lock").clone();
    assert_eq!(reqs.len(), 1);
    assert_eq!(
        reqs[0].json,
        Some(json!({ "sessionId": "mp-1", "frontImageData": "UElOIQ==" }))
    );
}

#[tokio::test]
async fn mobile_upload_requires_walt_key() {
    let h = harness("mobile", "json/", |_| {}).await;
    let body = json!({ "frontImage": FRONT_DATA_URI });

    // 1) no key -> 401 Missing
    let resp = h
        .app
        .clone()
        .oneshot(json_post("/api/mobile/upload", &body))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let v: Value = serde_json::from_slice(&read_body(resp).await).unwrap();
    assert_eq!(
        v,
        json!({ "error": "unauthorized", "reason": "Missing API key" })
    );

    // 2) wrong key -> 401 Invalid
    let mut req = json_post("/api/mobile/upload", &body);
    req.headers_mut()
        .insert("x-api-key", "nope".parse().unwrap());
    let resp = h.app.clone().oneshot(req).await.expect("request failed");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let v: Value = serde_json::from_slice(&read_body(resp).await).unwrap();
    assert_eq!(v["reason"], json!("Invalid API key"));

    assert!(h.captured.reqs.lock().expect("lock").is_empty());

    // 3) bearer key -> relayed
    let mut req = json_post("/api/mobile/upload", &body);
    req.headers_mut().insert(
        "authorization",
        format!("Bearer {WALT_KEY}").parse().unwrap(),
    );
    let resp = h.app.clone().oneshot(req).await.expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(read_body(resp).await, Bytes::from_static(UPSTREAM_BODY.as_bytes()));

    // 4) query key -> relayed
    let resp = h
        .app
        .clone()
        .oneshot(json_post(&format!("/api/mobile/upload?key={WALT_KEY}"), &body))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);

    let log = h.db.list_api_log(10).await.expect("api log");
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|row| row.endpoint == "/api/mobile/upload"));
}

#[tokio::test]
async fn oversized_json_upload_is_413_not_500() {
    let h = harness("too-large", "json/", |cfg| cfg.basic.max_upload_bytes = 1024).await;

    let big = format!("data:image/png;base64,{}", "A".repeat(4096));
    let resp = h
        .app
        .clone()
        .oneshot(json_post("/api/upload", &json!({ "frontImage": big })))
        .await
        .expect("request failed");

    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = serde_json::from_slice(&read_body(resp).await).unwrap();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"]["code"], json!("PAYLOAD_TOO_LARGE"));
    assert!(h.captured.reqs.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn bad_base64_is_rejected_for_json_transport() {
    let h = harness("bad-base64", "json/", |_| {}).await;

    let resp = h
        .app
        .clone()
        .oneshot(json_post(
            "/api/upload",
            &json!({ "frontImage": "data:image/png;base64,@@@@!!" }),
        ))
        .await
        .expect("request failed");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&read_body(resp).await).unwrap();
    assert_eq!(body["error"]["code"], json!("INVALID_IMAGE"));
    assert_eq!(body["error"]["message"], json!("Invalid front image."));
    assert!(h.captured.reqs.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn upstream_5xx_is_retried_up_to_the_limit() {
    let h = harness("retry-5xx", "flaky/", |cfg| cfg.master.retry_max_times = 2).await;

    let resp = h
        .app
        .clone()
        .oneshot(json_post("/api/upload", &json!({ "frontImage": FRONT_DATA_URI })))
        .await
        .expect("request failed");

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    // One call plus two retries.
    assert_eq!(h.captured.hits.load(Ordering::SeqCst), 3);

    // One logical submission, one log row.
    assert_eq!(h.db.list_api_log(10).await.expect("api log").len(), 1);
}

#[tokio::test]
async fn upstream_4xx_is_never_retried() {
    let h = harness("retry-4xx", "reject/", |cfg| cfg.master.retry_max_times = 2).await;

    let resp = h
        .app
        .clone()
        .oneshot(json_post("/api/upload", &json!({ "frontImage": FRONT_DATA_URI })))
        .await
        .expect("request failed");

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(h.captured.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn max_rps_delays_calls_past_the_burst() {
    // 1 rps allows a burst of 2, so the third call waits for a refill.
    let h = harness("rate-limit", "json/", |cfg| cfg.master.max_rps = 1).await;

    let start = Instant::now();
    for _ in 0..3 {
        let resp = h
            .app
            .clone()
            .oneshot(json_post("/api/upload", &json!({ "frontImage": FRONT_DATA_URI })))
            .await
            .expect("request failed");
        assert_eq!(resp.status(), StatusCode::OK);
    }

    assert!(
        start.elapsed() >= Duration::from_millis(800),
        "third call was not throttled: {:?}",
        start.elapsed()
    );
    assert_eq!(h.captured.reqs.lock().expect("lock").len(), 3);
}
