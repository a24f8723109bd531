#![allow(dead_code)]

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use sharebin_api::auth::ShareClaims;
use sharebin_api::setup::initialize_app;
use sharebin_api::state::AppState;
use sharebin_core::Config;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

pub const TEST_SECRET: &str = "api-test-secret-that-is-at-least-32-chars";
pub const TEST_DOMAIN: &str = "https://share.test";

/// Test application state
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    /// Get the HTTP test client
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

/// Full router over the in-process store and a temp artifact directory.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(&[]).await
}

pub async fn setup_test_app_with(extra: &[(&str, &str)]) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");

    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("JWT_SECRET".into(), TEST_SECRET.into());
    vars.insert("DATABASE_URL".into(), "memory://".into());
    vars.insert("DOMAIN".into(), TEST_DOMAIN.into());
    vars.insert(
        "STORAGE_PATH".into(),
        temp_dir.path().to_string_lossy().into_owned(),
    );
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    let config = Config::from_lookup(|key| vars.get(key).cloned()).expect("Invalid test config");

    let (state, router) = initialize_app(config)
        .await
        .expect("Failed to initialize app");
    let server = TestServer::new(router.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        _temp_dir: temp_dir,
    }
}

/// Signed token for a fresh user on `plan`, valid for an hour.
pub fn bearer_token(plan: &str) -> (Uuid, String) {
    signed_token(plan, 3600)
}

pub fn signed_token(plan: &str, expires_in_secs: i64) -> (Uuid, String) {
    let user_id = Uuid::new_v4();
    let claims = ShareClaims {
        sub: user_id,
        plan: Some(plan.to_string()),
        exp: chrono::Utc::now().timestamp() + expires_in_secs,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("Failed to sign token");
    (user_id, format!("Bearer {}", token))
}

pub fn text_form(text: &str) -> MultipartForm {
    MultipartForm::new().add_text("text", text.to_string())
}

pub fn url_form(url: &str) -> MultipartForm {
    MultipartForm::new().add_text("url", url.to_string())
}

pub fn file_form(filename: &str, mime: &str, bytes: &[u8]) -> MultipartForm {
    let part = Part::bytes(bytes.to_vec())
        .file_name(filename.to_string())
        .mime_type(mime.to_string());
    MultipartForm::new().add_part("file", part)
}

/// Smallest valid PNG: 1x1 transparent pixel.
pub fn minimal_png() -> Vec<u8> {
    vec![
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ]
}
