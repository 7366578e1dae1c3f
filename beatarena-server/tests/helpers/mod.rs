//! Shared helpers for API integration tests
//!
//! Each test gets its own root folder (database plus uploads) in a temporary
//! directory and drives the router in-process with `oneshot`.

#![allow(dead_code)]

use std::f32::consts::PI;
use std::io::Cursor;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use beatarena_common::config::{Config, RootFolder};
use beatarena_common::db::init_database;
use beatarena_server::{build_router, AppState};
use hound::{WavSpec, WavWriter};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

pub const ADMIN_EMAIL: &str = "admin@beatarena.test";
pub const PASSWORD: &str = "correct horse battery";
pub const TEST_SAMPLE_RATE: u32 = 8000;

const BOUNDARY: &str = "beatarena-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    // Keeps the root folder alive for the duration of the test
    pub dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    pub async fn with_config(mut config: Config) -> Self {
        config.admin_emails.push(ADMIN_EMAIL.to_string());

        let dir = TempDir::new().unwrap();
        let root = RootFolder::new(dir.path().to_path_buf());
        root.ensure_directories().unwrap();
        let pool = init_database(&root.database_path()).await.unwrap();

        let state = AppState::new(pool, config, root).unwrap();
        let router = build_router(state.clone());
        Self { router, state, dir }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Send and decode a JSON body (Null for empty bodies)
    pub async fn send_json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.send(request).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    /// Register an account and log in, returning (token, user id)
    pub async fn sign_up(&self, username: &str) -> (String, String) {
        let email = if username == "admin" {
            ADMIN_EMAIL.to_string()
        } else {
            format!("{}@beatarena.test", username)
        };

        let (status, _) = self
            .send_json(json_request(
                "POST",
                "/api/auth/register",
                None,
                json!({ "email": email, "password": PASSWORD, "username": username }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self
            .send_json(json_request(
                "POST",
                "/api/auth/login",
                None,
                json!({ "email": email, "password": PASSWORD }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);

        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    /// Create a contest through the admin API, returning its id
    pub async fn create_contest(&self, admin_token: &str, status: &str) -> String {
        let now = chrono::Utc::now();
        let (code, body) = self
            .send_json(json_request(
                "POST",
                "/api/admin/contests",
                Some(admin_token),
                json!({
                    "title": "Late Night Loops",
                    "description": "Make something for 3am",
                    "theme": "lo-fi",
                    "startDate": now - chrono::Duration::days(1),
                    "endDate": now + chrono::Duration::days(7),
                    "coverImage": "https://covers.test/loops.png",
                    "rules": "Original samples only",
                    "status": status,
                }),
            ))
            .await;
        assert_eq!(code, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    /// Upload a generated track to a contest, returning the submission id
    pub async fn submit(&self, token: &str, contest_id: &str, seconds: f32) -> String {
        let wav = sine_wav(seconds, 440.0);
        let (status, body) = self
            .send_json(upload_request(
                "/api/submissions/upload",
                Some(token),
                &[("contestId", contest_id)],
                Some(("beat.wav", "audio/wav", &wav)),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }
}

/// Mono 16-bit sine wave WAV at [`TEST_SAMPLE_RATE`]
pub fn sine_wav(seconds: f32, frequency: f32) -> Vec<u8> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: TEST_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        let frames = (seconds * TEST_SAMPLE_RATE as f32) as usize;
        for i in 0..frames {
            let t = i as f32 / TEST_SAMPLE_RATE as f32;
            let sample = (2.0 * PI * frequency * t).sin() * 0.5;
            writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

/// Multipart request with text fields and an optional
/// `(file name, content type, bytes)` file part
pub fn upload_request(
    uri: &str,
    token: Option<&str>,
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &[u8])>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, file_name, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}
