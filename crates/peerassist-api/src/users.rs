use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
};

use peerassist_types::api::{
    OwnedTaskResponse, ProfileResponse, ProfileUpdateRequest, ProfileUpdateResponse,
    TaskListResponse,
};
use validator::Validate;

use crate::auth::AppState;
use crate::error::{ApiError, Result};
use crate::tasks::task_response;

pub async fn profile_info(
    State(state): State<AppState>,
    path: std::result::Result<Path<String>, PathRejection>,
) -> Result<Json<ProfileResponse>> {
    let Path(email) = path?;

    let user = state
        .store
        .run(move |db| db.get_user(&email))
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    Ok(Json(ProfileResponse {
        email: user.email,
        name: user.name,
        mobile: user.mobile,
        completed_tasks: user.completed_tasks,
        rating: user.rating,
    }))
}

pub async fn profile_update(
    State(state): State<AppState>,
    path: std::result::Result<Path<String>, PathRejection>,
    req: std::result::Result<Json<ProfileUpdateRequest>, JsonRejection>,
) -> Result<Json<ProfileUpdateResponse>> {
    let Path(email) = path?;
    let Json(req) = req?;
    req.validate()?;

    let updated = state
        .store
        .run(move |db| {
            db.update_profile(&email, req.name.as_deref(), req.mobile.as_deref())
        })
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    Ok(Json(ProfileUpdateResponse {
        message: "Profile updated successfully".into(),
        updated,
    }))
}

/// Every task the user posted, newest first, with applicant and selection
/// lists visible to the owner.
pub async fn created_tasks(
    State(state): State<AppState>,
    path: std::result::Result<Path<String>, PathRejection>,
) -> Result<Json<TaskListResponse<OwnedTaskResponse>>> {
    let Path(email) = path?;

    let rows = state
        .store
        .run(move |db| {
            if !db.user_exists(&email)? {
                return Ok(None);
            }
            let mut out = Vec::new();
            for task in db.tasks_created_by(&email)? {
                let applicants = db.applicants(&task.id)?;
                let selected = db.selected_workers(&task.id)?;
                out.push((task, applicants, selected));
            }
            Ok(Some(out))
        })
        .await?
        .ok_or(ApiError::Unauthorized("Unknown user"))?;

    let tasks = rows
        .into_iter()
        .map(|(task, applicants, selected_users)| -> anyhow::Result<OwnedTaskResponse> {
            Ok(OwnedTaskResponse {
                task: task_response(task)?,
                applicants,
                selected_users,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Json(tasks.into()))
}
