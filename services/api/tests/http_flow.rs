//! End-to-end tests of the HTTP surface, driving the router in-process.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use enhancer_api::{
    adapters::{ImageRsCodec, ImageprocEnhancer, JsonAccountStore},
    config::Config,
    web::{
        self,
        state::{AppState, SessionRegistry},
    },
};
use image::{Rgb, RgbImage};
use image_enhancer_core::domain::ExportFormat;
use image_enhancer_core::ports::{AccountStore, ImageCodec};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "enhancer-test-boundary";
const EMAIL: &str = "ines@example.com";
const PASSWORD: &str = "correct horse";

struct TestApp {
    router: Router,
    accounts: Arc<JsonAccountStore>,
    _dir: TempDir,
}

async fn test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        accounts_path: dir.path().join("users.json"),
        ..Config::default()
    };
    let accounts = Arc::new(JsonAccountStore::open(&config.accounts_path).await.unwrap());
    let state = Arc::new(AppState {
        accounts: accounts.clone(),
        enhancer: Arc::new(ImageprocEnhancer::new()),
        codec: Arc::new(ImageRsCodec::new()),
        sessions: Arc::new(SessionRegistry::new(chrono::Duration::minutes(30))),
        config: Arc::new(config),
    });
    TestApp {
        router: web::router(state),
        accounts,
        _dir: dir,
    }
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn upload_request(cookie: &str, file_name: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            BOUNDARY, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/enhance/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header(header::COOKIE, cookie)
        .body(Body::from(body))
        .unwrap()
}

fn sample_png() -> Vec<u8> {
    let image = RgbImage::from_fn(24, 16, |x, y| Rgb([(x * 10) as u8, (y * 15) as u8, 90]));
    ImageRsCodec::new().encode(&image, ExportFormat::Png).unwrap()
}

fn registration(email: &str) -> Value {
    json!({
        "first_name": "Ines",
        "last_name": "Duarte",
        "date_of_birth": "1994-03-08",
        "email": email,
        "password": PASSWORD,
        "confirm_password": PASSWORD,
    })
}

/// Registers and logs in, returning the `session=...` cookie pair.
async fn register_and_login(app: &TestApp) -> String {
    let (status, _, _) = send(app, json_request("POST", "/auth/register", None, registration(EMAIL))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, headers, _) = send(
        app,
        json_request("POST", "/auth/login", None, json!({"email": EMAIL, "password": PASSWORD})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let set_cookie = headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(set_cookie.contains("HttpOnly"));
    set_cookie.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn full_enhancement_flow() {
    let app = test_app().await;
    let cookie = register_and_login(&app).await;

    // Upload
    let (status, _, body) = send(&app, upload_request(&cookie, "street.png", &sample_png())).await;
    assert_eq!(status, StatusCode::OK);
    let upload: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(upload["file_name"], "street.png");
    assert_eq!(upload["width"], 24);
    assert_eq!(upload["height"], 16);

    // Nothing to preview yet
    let (status, _, _) = send(&app, get_request("/enhance/enhanced", Some(&cookie))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Apply
    let (status, _, body) = send(
        &app,
        json_request("POST", "/enhance/apply", Some(&cookie), json!({"technique": "complement"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let applied: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(applied["enhancement_count"], 1);

    let (status, headers, body) = send(&app, get_request("/enhance/enhanced", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    let preview = image::load_from_memory(&body).unwrap().to_rgb8();
    let pixel = preview.get_pixel(3, 2).0;
    assert_eq!(pixel[0], pixel[1]);
    assert_eq!(pixel[1], pixel[2]);

    // Download
    let (status, headers, body) =
        send(&app, get_request("/enhance/download?format=jpeg", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"enhanced.jpg\""
    );
    assert_eq!(image::guess_format(&body).unwrap(), image::ImageFormat::Jpeg);

    // Profile and analytics reflect the usage
    let (status, _, body) = send(&app, get_request("/profile", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    let profile: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(profile["enhancement_count"], 1);
    assert_eq!(profile["techniques_used"], json!(["complement"]));
    assert_eq!(profile["recent_activity"][0]["source_filename"], "street.png");
    assert!(profile.get("password_hash").is_none());

    let (_, _, body) = send(&app, get_request("/analytics", Some(&cookie))).await;
    let analytics: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(analytics["technique_counts"][0]["technique"], "complement");
    assert_eq!(analytics["timeline"].as_array().unwrap().len(), 1);

    // The store was updated durably
    let account = app.accounts.get_account(EMAIL).await.unwrap();
    assert_eq!(account.enhancement_count, 1);
    assert_eq!(account.enhancement_history[0].source_filename, "street.png");

    // Views
    let (status, _, body) = send(
        &app,
        json_request("PUT", "/view", Some(&cookie), json!({"view": "analytics"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap()["view"], "analytics");
    let (_, _, body) = send(&app, get_request("/view", Some(&cookie))).await;
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap()["view"], "analytics");

    // Logout invalidates the cookie
    let (status, headers, _) = send(&app, json_request("POST", "/auth/logout", Some(&cookie), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::SET_COOKIE].to_str().unwrap().contains("Max-Age=0"));
    let (status, _, _) = send(&app, get_request("/enhance/original", Some(&cookie))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_a_live_session() {
    let app = test_app().await;

    for uri in ["/profile", "/analytics", "/view", "/enhance/original"] {
        let (status, _, _) = send(&app, get_request(uri, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
    }
    let (status, _, _) = send(&app, get_request("/profile", Some("session=not-a-real-token"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, body) = send(&app, get_request("/enhance/techniques", None)).await;
    assert_eq!(status, StatusCode::OK);
    let catalog: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(catalog.as_array().unwrap().len(), 7);
    assert_eq!(catalog[0]["id"], "histogram_equalization");
}

#[tokio::test]
async fn wrong_credentials_are_rejected_without_side_effects() {
    let app = test_app().await;
    register_and_login(&app).await;

    for password in ["", "correct horse ", "Correct Horse"] {
        let (status, headers, _) = send(
            &app,
            json_request("POST", "/auth/login", None, json!({"email": EMAIL, "password": password})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(headers.get(header::SET_COOKIE).is_none());
    }

    let (status, _, _) = send(
        &app,
        json_request(
            "POST",
            "/auth/login",
            None,
            json!({"email": "nobody@example.com", "password": PASSWORD}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let account = app.accounts.get_account(EMAIL).await.unwrap();
    assert_eq!(account.enhancement_count, 0);
}

#[tokio::test]
async fn registration_rejects_duplicates_and_bad_forms() {
    let app = test_app().await;
    register_and_login(&app).await;

    let (status, _, _) = send(&app, json_request("POST", "/auth/register", None, registration(EMAIL))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let mut mismatched = registration("other@example.com");
    mismatched["confirm_password"] = json!("something else");
    let (status, _, body) = send(&app, json_request("POST", "/auth/register", None, mismatched)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(String::from_utf8(body).unwrap(), "Passwords do not match");

    let mut blank = registration("blank@example.com");
    blank["first_name"] = json!("  ");
    let (status, _, _) = send(&app, json_request("POST", "/auth/register", None, blank)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(app.accounts.get_account("other@example.com").await.is_err());
}

#[tokio::test]
async fn enhancement_errors_leave_the_session_usable() {
    let app = test_app().await;
    let cookie = register_and_login(&app).await;

    // Apply before any upload
    let (status, _, _) = send(
        &app,
        json_request("POST", "/enhance/apply", Some(&cookie), json!({"technique": "denoise"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Garbage upload
    let (status, _, _) = send(&app, upload_request(&cookie, "notes.txt", b"plain text, not pixels")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unknown technique id never reaches the engine
    let (status, _, _) = send(&app, upload_request(&cookie, "street.png", &sample_png())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(
        &app,
        json_request("POST", "/enhance/apply", Some(&cookie), json!({"technique": "sepia"})),
    )
    .await;
    assert!(status.is_client_error());

    // Download before any successful apply, then with an unknown format
    let (status, _, _) = send(&app, get_request("/enhance/download?format=png", Some(&cookie))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _, _) = send(
        &app,
        json_request("POST", "/enhance/apply", Some(&cookie), json!({"technique": "sharpening"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&app, get_request("/enhance/download?format=gif", Some(&cookie))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let account = app.accounts.get_account(EMAIL).await.unwrap();
    assert_eq!(account.enhancement_count, 1);
}

#[tokio::test]
async fn emails_are_matched_without_surrounding_whitespace() {
    let app = test_app().await;

    let (status, _, body) = send(
        &app,
        json_request("POST", "/auth/register", None, registration("  ines@example.com ")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap()["email"], EMAIL);

    for email in ["  ines@example.com ", EMAIL] {
        let (status, headers, _) = send(
            &app,
            json_request("POST", "/auth/login", None, json!({"email": email, "password": PASSWORD})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{:?}", email);
        assert!(headers.get(header::SET_COOKIE).is_some());
    }

    let (status, _, _) = send(&app, json_request("POST", "/auth/register", None, registration(EMAIL))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
