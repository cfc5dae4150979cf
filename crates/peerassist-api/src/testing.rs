use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use peerassist_db::Database;
use peerassist_types::events::Notification;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower::ServiceExt;

use crate::auth::AppStateInner;
use crate::mailer::Mailer;
use crate::routes;

pub const JWT_SECRET: &str = "test-secret";

pub struct TestApp {
    pub router: Router,
    pub db: Arc<Database>,
    mail: mpsc::UnboundedReceiver<Notification>,
}

impl TestApp {
    async fn next_mail(&mut self) -> Notification {
        tokio::time::timeout(Duration::from_secs(5), self.mail.recv())
            .await
            .expect("no notification sent")
            .expect("mail channel closed")
    }

    pub async fn next_completion_code(&mut self) -> String {
        loop {
            if let Notification::TaskCompletionOtp { code, .. } = self.next_mail().await {
                return code;
            }
        }
    }

    pub async fn next_password_reset_code(&mut self) -> String {
        loop {
            if let Notification::PasswordResetOtp { code, .. } = self.next_mail().await {
                return code;
            }
        }
    }
}

pub fn app() -> TestApp {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let (tx, mail) = mpsc::unbounded_channel();
    let state = AppStateInner::new(
        db.clone(),
        Mailer::Capture(tx),
        JWT_SECRET.into(),
        Duration::from_secs(5),
    );
    TestApp {
        router: routes::router(state),
        db,
        mail,
    }
}

/// Insert a user directly, skipping password hashing.
pub fn user(app: &TestApp, email: &str) {
    let created = app.db.create_user(email, "Test User", "5550100", "hash");
    assert!(created.unwrap());
}

/// Post a one-person Plumbing task and return its id.
pub async fn post_task(app: &TestApp, email: &str, title: &str) -> String {
    let (status, body) = make_request(
        &app.router,
        Method::POST,
        &format!("/users/{email}/post_task"),
        Some(json!({
            "title": title,
            "description": "Need a hand",
            "task_time": "10:00 AM",
            "task_date": "2025-04-20",
            "estimated_pay_rate": 25.0,
            "place_of_work": "Gainesville",
            "work_type": "Plumbing",
            "people_needed": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["task_id"].as_str().unwrap().to_string()
}

pub async fn make_request(
    router: &Router,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
