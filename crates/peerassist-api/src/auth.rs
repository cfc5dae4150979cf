use std::sync::Arc;
use std::time::Duration;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use validator::Validate;

use peerassist_db::models::OtpRow;
use peerassist_db::{Database, timestamp};
use peerassist_types::api::{
    Claims, LoginRequest, LoginResponse, MessageResponse, PasswordResetRequest,
    ResetPasswordRequest, SignupRequest,
};
use peerassist_types::events::Notification;
use peerassist_types::models::OtpContext;

use crate::error::{ApiError, Result};
use crate::jobs::{Job, JobQueue};
use crate::lifecycle::TaskLifecycle;
use crate::mailer::Mailer;
use crate::otp;
use crate::store::Store;

pub const TOKEN_TTL_HOURS: i64 = 24;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Store,
    pub lifecycle: TaskLifecycle,
    pub jobs: JobQueue,
    pub jwt_secret: String,
}

impl AppStateInner {
    /// Build the shared state and start the background job worker.
    pub fn new(
        db: Arc<Database>,
        mailer: Mailer,
        jwt_secret: String,
        store_timeout: Duration,
    ) -> AppState {
        let store = Store::new(db.clone(), store_timeout);
        let jobs = JobQueue::start(db, mailer);
        Arc::new(Self {
            lifecycle: TaskLifecycle::new(store.clone(), jobs.clone()),
            store,
            jobs,
            jwt_secret,
        })
    }
}

pub async fn signup(
    State(state): State<AppState>,
    req: std::result::Result<Json<SignupRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(req) = req?;
    req.validate()?;

    let password_hash = hash_password(&req.password)?;
    let email = req.email.clone();
    let created = state
        .store
        .run(move |db| {
            db.create_user(&req.email, &req.name, &req.mobile, &password_hash)
        })
        .await?;
    if !created {
        return Err(ApiError::Conflict("Email already registered"));
    }

    info!(%email, "User registered");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User registered successfully")),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    req: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let Json(req) = req?;
    req.validate()?;

    let email = req.email.clone();
    let stored = state
        .store
        .run(move |db| db.get_password_hash(&email))
        .await?
        .ok_or(ApiError::Unauthorized("Invalid email or password"))?;

    let parsed_hash =
        PasswordHash::new(&stored).map_err(|e| anyhow::anyhow!("stored hash unreadable: {}", e))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized("Invalid email or password"))?;

    let token = create_token(&state.jwt_secret, &req.email)?;

    Ok(Json(LoginResponse {
        message: "Login successful".into(),
        token,
    }))
}

pub async fn request_password_reset(
    State(state): State<AppState>,
    req: std::result::Result<Json<PasswordResetRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let Json(req) = req?;
    req.validate()?;

    let code = otp::generate();
    let expires_at = Utc::now() + TimeDelta::minutes(otp::PASSWORD_RESET_TTL_MINUTES);
    let row = OtpRow {
        email: req.email.clone(),
        context: OtpContext::PasswordReset.as_str().into(),
        task_id: String::new(),
        code_hash: otp::digest(&code),
        worker_email: None,
        expires_at: timestamp(expires_at),
    };

    let issued = state
        .store
        .run(move |db| {
            if !db.user_exists(&row.email)? {
                return Ok(false);
            }
            db.upsert_otp(&row)?;
            Ok(true)
        })
        .await?;
    if !issued {
        return Err(ApiError::NotFound("User"));
    }

    state.jobs.push(Job::Notify(Notification::PasswordResetOtp {
        email: req.email,
        code,
    }));

    Ok(Json(MessageResponse::new("OTP sent to your email")))
}

pub async fn reset_password(
    State(state): State<AppState>,
    req: std::result::Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let Json(req) = req?;
    req.validate()?;

    let password_hash = hash_password(&req.password)?;
    let code_hash = otp::digest(&req.otp);
    let now = timestamp(Utc::now());
    let email = req.email.clone();
    let reset = state
        .store
        .run(move |db| {
            db.reset_password(&email, &code_hash, &password_hash, &now)
        })
        .await?;
    if !reset {
        return Err(ApiError::Unauthorized("Invalid or expired OTP"));
    }

    info!(email = %req.email, "Password reset");
    Ok(Json(MessageResponse::new("Password updated successfully")))
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

fn create_token(secret: &str, email: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: email.to_string(),
        exp: (Utc::now() + TimeDelta::hours(TOKEN_TTL_HOURS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use jsonwebtoken::{DecodingKey, Validation, decode};
    use serde_json::json;

    use super::*;
    use crate::testing::{self, make_request};

    #[tokio::test]
    async fn signup_then_login_issues_token_for_email() {
        let app = testing::app();
        let signup = json!({
            "name": "Ann", "email": "a@x.com", "mobile": "5550100", "password": "hunter22"
        });

        let (status, _) =
            make_request(&app.router, Method::POST, "/signup", Some(signup.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = make_request(&app.router, Method::POST, "/signup", Some(signup)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = make_request(
            &app.router,
            Method::POST,
            "/login",
            Some(json!({ "email": "a@x.com", "password": "hunter22" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let token = body["token"].as_str().unwrap();
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(testing::JWT_SECRET.as_bytes()),
            &Validation::default(),
        )
        .unwrap()
        .claims;
        assert_eq!(claims.sub, "a@x.com");

        let (status, _) = make_request(
            &app.router,
            Method::POST,
            "/login",
            Some(json!({ "email": "a@x.com", "password": "wrong-password" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_email_and_bad_password_look_the_same() {
        let app = testing::app();
        let (status, body) = make_request(
            &app.router,
            Method::POST,
            "/login",
            Some(json!({ "email": "ghost@x.com", "password": "whatever1" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid email or password");
    }

    #[tokio::test]
    async fn malformed_signup_body_is_rejected() {
        let app = testing::app();
        let (status, body) = make_request(
            &app.router,
            Method::POST,
            "/signup",
            Some(json!({ "email": "a@x.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn signup_rejects_malformed_email_domains() {
        let app = testing::app();
        for email in ["a@.", "a@x..com", "a@.com"] {
            let (status, body) = make_request(
                &app.router,
                Method::POST,
                "/signup",
                Some(json!({
                    "name": "Ann", "email": email, "mobile": "5550100", "password": "hunter22"
                })),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{email}");
            assert_eq!(body["error"], "Invalid email address");
            assert!(!app.db.user_exists(email).unwrap());
        }
    }

    #[tokio::test]
    async fn password_reset_round_trip() {
        let mut app = testing::app();
        testing::user(&app, "a@x.com");

        let (status, _) = make_request(
            &app.router,
            Method::POST,
            "/requestPasswordReset",
            Some(json!({ "email": "nobody@x.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = make_request(
            &app.router,
            Method::POST,
            "/requestPasswordReset",
            Some(json!({ "email": "a@x.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let code = app.next_password_reset_code().await;

        let reset = json!({ "email": "a@x.com", "otp": code, "password": "brand-new-pass" });
        let (status, _) = make_request(
            &app.router,
            Method::POST,
            "/validateOtpAndUpdatePassword",
            Some(reset.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = make_request(
            &app.router,
            Method::POST,
            "/validateOtpAndUpdatePassword",
            Some(reset),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = make_request(
            &app.router,
            Method::POST,
            "/login",
            Some(json!({ "email": "a@x.com", "password": "brand-new-pass" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}
