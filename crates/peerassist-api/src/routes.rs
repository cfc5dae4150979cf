use axum::{
    Json, Router,
    routing::{get, post, put},
};
use serde_json::{Value, json};

use crate::auth::{self, AppState};
use crate::{completion, tasks, users};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/requestPasswordReset", post(auth::request_password_reset))
        .route("/validateOtpAndUpdatePassword", post(auth::reset_password))
        .route("/users/{email}/profileinfo", get(users::profile_info))
        .route("/users/{email}/profileupdate", put(users::profile_update))
        .route("/users/{email}/created-tasks", get(users::created_tasks))
        .route("/users/{email}/post_task", post(tasks::post_task))
        .route("/tasks/feed/{viewer_email}", get(tasks::feed))
        .route("/appliedtasks/{viewer_email}", get(tasks::applied_tasks))
        .route("/tasks/{task_id}/apply/{email}", post(tasks::apply))
        .route("/tasks/{task_id}/accept/{email}", post(tasks::accept))
        .route("/tasks/{task_id}/end/{email}", post(completion::end_task))
        .route(
            "/validateTaskCompletionOtp",
            post(completion::validate_completion),
        )
        .route("/scheduled-tasks/{email}", get(completion::scheduled_tasks))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use crate::testing::{self, make_request};

    #[tokio::test]
    async fn health_is_ok() {
        let app = testing::app();
        let (status, body) = make_request(&app.router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
