use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use peerassist_db::models::{TaskFields, TaskRow};
use peerassist_db::tasks::{FeedFilter, UpdateOutcome};
use peerassist_db::timestamp;
use peerassist_types::api::{
    AcceptResponse, AppliedTask, AppliedTasksResponse, CreatorSummary, DATE_FORMAT, FeedQuery,
    MessageResponse, PostTaskRequest, PostTaskResponse, TaskListResponse, TaskResponse,
};
use peerassist_types::models::{TaskStatus, WorkType};
use validator::Validate;

use crate::auth::AppState;
use crate::error::{ApiError, Result};
use crate::jobs::Job;

type JsonBody<T> = std::result::Result<Json<T>, JsonRejection>;
type PathParams<T> = std::result::Result<Path<T>, PathRejection>;

pub(crate) fn parse_task_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::Validation("Invalid task ID format".into()))
}

/// Check a post/edit request and turn it into storable fields.
fn task_fields(req: &PostTaskRequest) -> Result<TaskFields> {
    req.validate()?;

    let task_date = NaiveDate::parse_from_str(&req.task_date, DATE_FORMAT)
        .map_err(|_| {
            ApiError::Validation("Invalid date format. Use YYYY-MM-DD".into())
        })?;
    let work_type =
        WorkType::try_from(req.work_type.as_str()).map_err(|_| ApiError::InvalidWorkType)?;

    Ok(TaskFields {
        title: req.title.clone(),
        description: req.description.clone(),
        task_time: req.task_time.clone(),
        task_date: task_date.format(DATE_FORMAT).to_string(),
        estimated_pay_rate: req.estimated_pay_rate,
        place_of_work: req.place_of_work.clone(),
        work_type: work_type.as_str().to_string(),
        people_needed: req.people_needed,
    })
}

fn parse_instant(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

/// Public view of a stored task.
pub(crate) fn task_response(row: TaskRow) -> anyhow::Result<TaskResponse> {
    Ok(TaskResponse {
        id: Uuid::parse_str(&row.id)?,
        task_date: NaiveDate::parse_from_str(&row.task_date, DATE_FORMAT)?,
        work_type: WorkType::try_from(row.work_type.as_str())?,
        status: TaskStatus::try_from(row.status.as_str())?,
        created_at: parse_instant(&row.created_at)?,
        updated_at: parse_instant(&row.updated_at)?,
        total_applicants: row.applicant_count,
        title: row.title,
        description: row.description,
        task_time: row.task_time,
        estimated_pay_rate: row.estimated_pay_rate,
        place_of_work: row.place_of_work,
        people_needed: row.people_needed,
        creator_email: row.creator_email,
        views: row.views,
    })
}

/// Ignore a malformed feed date bound rather than failing the request.
fn date_bound(name: &str, raw: Option<String>) -> Option<String> {
    let raw = raw.filter(|v| !v.is_empty())?;
    match NaiveDate::parse_from_str(&raw, DATE_FORMAT) {
        Ok(date) => Some(date.format(DATE_FORMAT).to_string()),
        Err(e) => {
            warn!(bound = name, value = %raw, "Ignoring malformed feed date: {}", e);
            None
        }
    }
}

/// Create a task, or edit one of the caller's open tasks when `id` is set.
pub async fn post_task(
    State(state): State<AppState>,
    path: PathParams<String>,
    req: JsonBody<PostTaskRequest>,
) -> Result<(StatusCode, Json<PostTaskResponse>)> {
    let Path(email) = path?;
    let Json(req) = req?;
    let fields = task_fields(&req)?;
    let now = timestamp(Utc::now());

    match req.id.as_deref().filter(|id| !id.is_empty()) {
        Some(raw_id) => {
            let task_id = parse_task_id(raw_id)?;
            let id = task_id.to_string();
            let outcome = state
                .store
                .run(move |db| db.update_task(&id, &email, &fields, &now))
                .await?;

            match outcome {
                UpdateOutcome::Updated { changed } => Ok((
                    StatusCode::OK,
                    Json(PostTaskResponse {
                        message: "Task updated successfully".into(),
                        task_id,
                        updated: Some(changed),
                    }),
                )),
                UpdateOutcome::NotFound => Err(ApiError::NotFound("Task")),
                UpdateOutcome::NotOpen(status) => Err(ApiError::InvalidState(format!(
                    "Task is {status} and can no longer be edited"
                ))),
            }
        }
        None => {
            let task_id = Uuid::new_v4();
            let id = task_id.to_string();
            let creator = email.clone();
            let created = state
                .store
                .run(move |db| {
                    if !db.user_exists(&creator)? {
                        return Ok(false);
                    }
                    db.insert_task(&id, &creator, &fields, &now)?;
                    Ok(true)
                })
                .await?;
            if !created {
                return Err(ApiError::NotFound("User"));
            }

            info!(%task_id, creator = %email, "Task posted");
            Ok((
                StatusCode::CREATED,
                Json(PostTaskResponse {
                    message: "Task created successfully".into(),
                    task_id,
                    updated: None,
                }),
            ))
        }
    }
}

/// Open tasks the viewer could still apply to.
pub async fn feed(
    State(state): State<AppState>,
    path: PathParams<String>,
    query: std::result::Result<Query<FeedQuery>, QueryRejection>,
) -> Result<Json<TaskListResponse<TaskResponse>>> {
    let Path(viewer) = path?;
    let Query(query) = query?;

    let filter = FeedFilter {
        category: query.category.filter(|c| !c.is_empty()),
        from_date: date_bound("from_date", query.from_date),
        to_date: date_bound("to_date", query.to_date),
    };

    let rows = state
        .store
        .run(move |db| {
            if !db.user_exists(&viewer)? {
                return Ok(None);
            }
            Ok(Some(db.feed(&viewer, &filter)?))
        })
        .await?
        .ok_or(ApiError::Unauthorized("Unknown user"))?;

    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let tasks = rows
        .into_iter()
        .map(task_response)
        .collect::<anyhow::Result<Vec<_>>>()?;

    if !ids.is_empty() {
        state.jobs.push(Job::CountViews(ids));
    }

    Ok(Json(tasks.into()))
}

/// Tasks the viewer applied to, with the creator's contact details.
pub async fn applied_tasks(
    State(state): State<AppState>,
    path: PathParams<String>,
) -> Result<Json<AppliedTasksResponse>> {
    let Path(viewer) = path?;

    let rows = state
        .store
        .run(move |db| {
            if !db.user_exists(&viewer)? {
                return Ok(None);
            }
            let mut out = Vec::new();
            for (task, selected) in db.tasks_applied_by(&viewer)? {
                let creator = db.get_user(&task.creator_email)?;
                out.push((task, selected, creator));
            }
            Ok(Some(out))
        })
        .await?
        .ok_or(ApiError::Unauthorized("Unknown user"))?;

    let mut applied = Vec::with_capacity(rows.len());
    for (task, selected, creator) in rows {
        let creator = match creator {
            Some(user) => CreatorSummary {
                name: user.name,
                email: user.email,
                mobile: user.mobile,
            },
            None => CreatorSummary {
                name: String::new(),
                email: task.creator_email.clone(),
                mobile: String::new(),
            },
        };
        applied.push(AppliedTask {
            task: task_response(task)?,
            creator,
            selected,
        });
    }

    Ok(Json(AppliedTasksResponse {
        count: applied.len(),
        applied_tasks: applied,
    }))
}

pub async fn apply(
    State(state): State<AppState>,
    path: PathParams<(String, String)>,
) -> Result<Json<MessageResponse>> {
    let Path((task_id, email)) = path?;
    let task_id = parse_task_id(&task_id)?;

    state.lifecycle.apply(task_id, &email).await?;
    let message = MessageResponse::new("Successfully applied for the task");
    Ok(Json(message))
}

pub async fn accept(
    State(state): State<AppState>,
    path: PathParams<(String, String)>,
) -> Result<Json<AcceptResponse>> {
    let Path((task_id, email)) = path?;
    let task_id = parse_task_id(&task_id)?;

    let status = state.lifecycle.accept(task_id, &email).await?;
    Ok(Json(AcceptResponse {
        message: "Worker accepted for the task".into(),
        status,
    }))
}
