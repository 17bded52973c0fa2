use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tablemap::*;

type Seen = Arc<Mutex<Vec<(HeaderMap, Value)>>>;

#[derive(Clone)]
struct FakeProvider {
    status: StatusCode,
    body: String,
    seen: Seen,
}

async fn completions(
    State(provider): State<FakeProvider>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    provider.seen.lock().unwrap().push((headers, body));
    (provider.status, provider.body.clone())
}

/// Start a chat-completions stand-in returning `body` with `status`.
async fn spawn_provider(status: StatusCode, body: &str) -> (String, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state(FakeProvider {
            status,
            body: body.to_string(),
            seen: seen.clone(),
        });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/v1/chat/completions", addr), seen)
}

fn answer_body(content: &str) -> String {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
    .to_string()
}

fn analyzer_for(endpoint: &str) -> FloorPlanAnalyzer {
    FloorPlanAnalyzer::new(AnalyzerConfig::new("sk-test").endpoint(endpoint))
}

const OBJECTS: &str = r#"{"objects":[{"type":"table","x":120,"y":250,"width":50,"height":50}]}"#;

const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

// --- Gateway ---

#[tokio::test]
async fn analyze_returns_sanitized_answer() {
    let fenced = format!("```json\n{}\n```", OBJECTS);
    let (endpoint, _) = spawn_provider(StatusCode::OK, &answer_body(&fenced)).await;

    let answer = analyzer_for(&endpoint)
        .analyze_image(b"png-bytes", "image/png")
        .await
        .unwrap();

    assert_eq!(answer, OBJECTS);
}

#[tokio::test]
async fn request_carries_auth_model_and_inline_image() {
    let (endpoint, seen) = spawn_provider(StatusCode::OK, &answer_body("{}")).await;

    analyzer_for(&endpoint)
        .analyze_image(b"png-bytes", "image/png")
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let (headers, body) = &seen[0];

    assert_eq!(headers["authorization"], "Bearer sk-test");
    assert_eq!(headers["content-type"], "application/json");
    assert_eq!(body["model"], "gpt-4o");

    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0]["role"], "system");
    assert!(messages[0]["content"].is_string());
    assert_eq!(messages[1]["role"], "user");
    assert!(messages[1]["content"]
        .as_str()
        .unwrap()
        .contains(prompt::RAW_JSON_INSTRUCTION));
    assert_eq!(
        messages[2]["content"],
        json!([{
            "type": "image_url",
            "image_url": { "url": format!("data:image/png;base64,{}", encode_image(b"png-bytes")) }
        }])
    );
}

#[tokio::test]
async fn exemplars_are_sent_before_the_task() {
    let (endpoint, seen) = spawn_provider(StatusCode::OK, &answer_body("{}")).await;
    let profile = PromptProfile::default()
        .with_exemplar(
            Exemplar::new("https://example.com/plan-a.png", "Green squares mark tables.")
                .with_expected_output(OBJECTS),
        )
        .with_exemplar(Exemplar::new("https://example.com/plan-b.png", "Thick lines are walls."));

    analyzer_for(&endpoint)
        .with_profile(profile)
        .analyze_image(b"png-bytes", "image/png")
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    let messages = seen[0].1["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2 + 2 * 2 + 1);
    assert_eq!(
        messages[1]["content"],
        json!([
            { "type": "text", "text": "Green squares mark tables." },
            { "type": "image_url", "image_url": { "url": "https://example.com/plan-a.png" } }
        ])
    );
    assert!(messages[2]["content"].as_str().unwrap().ends_with(OBJECTS));
    assert_eq!(
        messages[3]["content"][1]["image_url"]["url"],
        "https://example.com/plan-b.png"
    );
}

#[tokio::test]
async fn base64_payload_is_sent_as_is() {
    let (endpoint, seen) = spawn_provider(StatusCode::OK, &answer_body("{}")).await;

    analyzer_for(&endpoint)
        .analyze_image_base64("AAAA", "image/webp")
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(
        seen[0].1["messages"][2]["content"][0]["image_url"]["url"],
        "data:image/webp;base64,AAAA"
    );
}

#[tokio::test]
async fn provider_error_is_surfaced_verbatim() {
    let body = r#"{"error":{"message":"Incorrect API key provided: sk-test.","type":"invalid_request_error"}}"#;
    let (endpoint, _) = spawn_provider(StatusCode::UNAUTHORIZED, body).await;

    let err = analyzer_for(&endpoint)
        .analyze_image(b"png-bytes", "image/png")
        .await
        .unwrap_err();

    match err {
        AnalyzeError::Provider(msg) => assert_eq!(msg, "Incorrect API key provided: sk-test."),
        other => panic!("expected provider error, got {:?}", other),
    }
}

#[tokio::test]
async fn empty_choices_is_an_error() {
    let (endpoint, _) = spawn_provider(StatusCode::OK, r#"{"choices":[]}"#).await;

    let err = analyzer_for(&endpoint)
        .analyze_image(b"png-bytes", "image/png")
        .await
        .unwrap_err();

    assert!(err.is_empty_response());
}

#[tokio::test]
async fn rate_limit_with_null_choices_is_a_provider_error() {
    let body = r#"{"choices":null,"error":{"message":"Rate limit reached"}}"#;
    let (endpoint, _) = spawn_provider(StatusCode::TOO_MANY_REQUESTS, body).await;

    let err = analyzer_for(&endpoint)
        .analyze_image(b"png-bytes", "image/png")
        .await
        .unwrap_err();

    match err {
        AnalyzeError::Provider(msg) => assert_eq!(msg, "Rate limit reached"),
        other => panic!("expected provider error, got {:?}", other),
    }
}

#[tokio::test]
async fn null_error_message_still_returns_answer() {
    let body = json!({
        "error": { "message": null },
        "choices": [{ "message": { "content": OBJECTS } }]
    })
    .to_string();
    let (endpoint, _) = spawn_provider(StatusCode::OK, &body).await;

    let answer = analyzer_for(&endpoint)
        .analyze_image(b"png-bytes", "image/png")
        .await
        .unwrap();

    assert_eq!(answer, OBJECTS);
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn raw_response_is_logged_at_info() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let body = r#"{"choices":null,"error":{"message":"Rate limit reached"}}"#;
    let (endpoint, _) = spawn_provider(StatusCode::TOO_MANY_REQUESTS, body).await;
    let _ = analyzer_for(&endpoint)
        .analyze_image(b"png-bytes", "image/png")
        .await;

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    let line = output
        .lines()
        .find(|l| l.contains("Raw provider response"))
        .expect("raw response line at info level");
    assert!(line.contains("INFO"));
    assert!(line.contains("status=429"));
    assert!(line.contains(body));
}

#[tokio::test]
async fn html_body_is_a_transport_error() {
    let (endpoint, _) =
        spawn_provider(StatusCode::BAD_GATEWAY, "<html>502 Bad Gateway</html>").await;

    let err = analyzer_for(&endpoint)
        .analyze_image(b"png-bytes", "image/png")
        .await
        .unwrap_err();

    assert!(err.is_transport());
    assert!(matches!(
        err,
        AnalyzeError::Transport {
            source: TransportCause::Decode(_),
            ..
        }
    ));
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = analyzer_for(&format!("http://{}/v1/chat/completions", addr))
        .analyze_image(b"png-bytes", "image/png")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AnalyzeError::Transport {
            source: TransportCause::Http(_),
            ..
        }
    ));
}

// --- Prompt profiles ---

#[test]
fn shipped_profile_matches_default() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/profiles/restaurant.json");
    assert_eq!(PromptProfile::from_path(path).unwrap(), PromptProfile::default());
}

// --- Upload server ---

async fn spawn_server(analyzer: FloorPlanAnalyzer) -> String {
    let app = server::build_router(Arc::new(analyzer), &ServerConfig::default()).unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn image_form(bytes: &[u8], mime: &str) -> reqwest::multipart::Form {
    let part = reqwest::multipart::Part::bytes(bytes.to_vec())
        .file_name("plan")
        .mime_str(mime)
        .unwrap();
    reqwest::multipart::Form::new().part("image", part)
}

#[tokio::test]
async fn home_route_says_hello() {
    let base = spawn_server(analyzer_for("http://127.0.0.1:9/unused")).await;

    let body: Value = reqwest::get(&base).await.unwrap().json().await.unwrap();
    assert_eq!(body, json!({ "message": "Hello, World!" }));
}

#[tokio::test]
async fn upload_relays_answer() {
    let (endpoint, seen) = spawn_provider(StatusCode::OK, &answer_body(OBJECTS)).await;
    let base = spawn_server(analyzer_for(&endpoint)).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/upload", base))
        .multipart(image_form(b"png-bytes", "image/png"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body,
        json!({ "message": "Image processed successfully", "response": OBJECTS })
    );

    let seen = seen.lock().unwrap();
    assert_eq!(
        seen[0].1["messages"][2]["content"][0]["image_url"]["url"],
        format!("data:image/png;base64,{}", encode_image(b"png-bytes"))
    );
}

#[tokio::test]
async fn upload_sniffs_undeclared_image_type() {
    let (endpoint, seen) = spawn_provider(StatusCode::OK, &answer_body("{}")).await;
    let base = spawn_server(analyzer_for(&endpoint)).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/upload", base))
        .multipart(image_form(JPEG_BYTES, "application/octet-stream"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    let seen = seen.lock().unwrap();
    let url = seen[0].1["messages"][2]["content"][0]["image_url"]["url"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(url.starts_with("data:image/jpeg;base64,"));
}

#[tokio::test]
async fn upload_without_image_field_is_bad_request() {
    let base = spawn_server(analyzer_for("http://127.0.0.1:9/unused")).await;

    let form = reqwest::multipart::Form::new().text("note", "no file here");
    let resp = reqwest::Client::new()
        .post(format!("{}/upload", base))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "error": "No file uploaded" }));
}

#[tokio::test]
async fn upload_without_multipart_is_bad_request() {
    let base = spawn_server(analyzer_for("http://127.0.0.1:9/unused")).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/upload", base))
        .body("not a form")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_reports_provider_failure() {
    let body = r#"{"error":{"message":"You uploaded an unsupported image."}}"#;
    let (endpoint, _) = spawn_provider(StatusCode::BAD_REQUEST, body).await;
    let base = spawn_server(analyzer_for(&endpoint)).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/upload", base))
        .multipart(image_form(b"not an image", "image/png"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Failed to process image");
    assert_eq!(
        body["details"],
        "Provider error: You uploaded an unsupported image."
    );
}

#[tokio::test]
async fn cors_preflight_allows_frontend_origin() {
    let base = spawn_server(analyzer_for("http://127.0.0.1:9/unused")).await;

    let resp = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, format!("{}/upload", base))
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "POST")
        .send()
        .await
        .unwrap();

    assert!(resp.status().is_success());
    let headers = resp.headers();
    assert_eq!(
        headers["access-control-allow-origin"],
        "http://localhost:5173"
    );
    assert_eq!(headers["access-control-allow-credentials"], "true");
}
