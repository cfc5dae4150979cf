//! Completion handshake and the worker's schedule.

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
};

use peerassist_types::api::{
    CompleteTaskResponse, EndTaskResponse, ScheduledTasksResponse, ValidateCompletionRequest,
};
use validator::Validate;

use crate::auth::AppState;
use crate::error::{ApiError, Result};
use crate::tasks::{parse_task_id, task_response};

/// A selected worker reports the task as done; the owner gets a code.
pub async fn end_task(
    State(state): State<AppState>,
    path: std::result::Result<Path<(String, String)>, PathRejection>,
) -> Result<Json<EndTaskResponse>> {
    let Path((task_id, worker)) = path?;
    let task_id = parse_task_id(&task_id)?;

    let request = state.lifecycle.request_completion(task_id, &worker).await?;
    Ok(Json(EndTaskResponse {
        message: "Task completion OTP sent to the task owner".into(),
        task_title: request.task_title,
        task_owner: request.task_owner,
    }))
}

/// The owner confirms with the code they were sent.
pub async fn validate_completion(
    State(state): State<AppState>,
    req: std::result::Result<Json<ValidateCompletionRequest>, JsonRejection>,
) -> Result<Json<CompleteTaskResponse>> {
    let Json(req) = req?;
    let task_id = parse_task_id(&req.task_id)?;
    req.validate()?;

    state
        .lifecycle
        .complete(task_id, &req.email, &req.otp)
        .await?;

    Ok(Json(CompleteTaskResponse {
        message: "Task completed successfully!".into(),
        task_id,
    }))
}

pub async fn scheduled_tasks(
    State(state): State<AppState>,
    path: std::result::Result<Path<String>, PathRejection>,
) -> Result<Json<ScheduledTasksResponse>> {
    let Path(email) = path?;

    let rows = state
        .store
        .run(move |db| {
            if !db.user_exists(&email)? {
                return Ok(None);
            }
            let ids: Vec<String> = db
                .scheduled_for_worker(&email)?
                .into_iter()
                .map(|s| s.task_id)
                .collect();
            Ok(Some(db.tasks_by_ids(&ids)?))
        })
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    let tasks = rows
        .into_iter()
        .map(task_response)
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Json(ScheduledTasksResponse {
        count: tasks.len(),
        scheduled_tasks: tasks,
    }))
}
