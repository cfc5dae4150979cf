//! Task lifecycle engine: maps the store's guarded transitions onto API
//! errors and queues the notifications each transition produces.

use chrono::{TimeDelta, Utc};
use peerassist_db::lifecycle::{
    AcceptOutcome, ApplyOutcome, CompletionOutcome, CompletionRequestOutcome, Selection,
};
use peerassist_db::timestamp;
use peerassist_types::events::Notification;
use peerassist_types::models::TaskStatus;
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::jobs::{Job, JobQueue};
use crate::otp;
use crate::store::Store;

#[derive(Clone)]
pub struct TaskLifecycle {
    store: Store,
    jobs: JobQueue,
}

/// Who has to confirm a completion request, and for which task.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub task_title: String,
    pub task_owner: String,
}

fn now() -> String {
    timestamp(Utc::now())
}

impl TaskLifecycle {
    pub fn new(store: Store, jobs: JobQueue) -> Self {
        Self { store, jobs }
    }

    pub async fn apply(&self, task_id: Uuid, applicant: &str) -> Result<()> {
        let id = task_id.to_string();
        let email = applicant.to_owned();
        let at = now();
        let outcome = self
            .store
            .run(move |db| db.apply_to_task(&id, &email, &at))
            .await?;

        match outcome {
            ApplyOutcome::Applied => {
                info!(%task_id, applicant, "Application recorded");
                Ok(())
            }
            ApplyOutcome::TaskNotFound => Err(ApiError::NotFound("Task")),
            ApplyOutcome::ApplicantNotFound => Err(ApiError::NotFound("User")),
            ApplyOutcome::NotOpen(status) => Err(ApiError::InvalidState(format!(
                "Task is {status} and not open for applications"
            ))),
            ApplyOutcome::SelfApply => Err(ApiError::Conflict("You cannot apply to your own task")),
            ApplyOutcome::AlreadyApplied => {
                Err(ApiError::Conflict("You have already applied for this task"))
            }
        }
    }

    /// Select `worker` for the task. Returns the task status after selection.
    pub async fn accept(&self, task_id: Uuid, worker: &str) -> Result<TaskStatus> {
        let id = task_id.to_string();
        let email = worker.to_owned();
        let schedule_id = Uuid::new_v4().to_string();
        let at = now();
        let outcome = self
            .store
            .run(move |db| {
                db.accept_worker(&Selection {
                    task_id: &id,
                    worker_email: &email,
                    schedule_id: &schedule_id,
                    now: &at,
                })
            })
            .await?;

        match outcome {
            AcceptOutcome::Accepted { title, status } => {
                info!(%task_id, worker, %status, "Worker selected");
                self.jobs.push(Job::Notify(Notification::WorkerSelected {
                    email: worker.to_owned(),
                    task_title: title,
                }));
                Ok(status)
            }
            AcceptOutcome::TaskNotFound => Err(ApiError::NotFound("Task")),
            AcceptOutcome::WorkerNotFound => Err(ApiError::NotFound("User")),
            AcceptOutcome::NotOpen(status) => Err(ApiError::InvalidState(format!(
                "Task is {status} and not open for applications"
            ))),
            AcceptOutcome::SelfSelect => Err(ApiError::Conflict("You cannot accept yourself")),
            AcceptOutcome::AlreadySelected => Err(ApiError::Conflict("Worker is already selected")),
        }
    }

    /// Worker side of the completion handshake: mint a code for the task
    /// owner, replacing any code issued earlier for the same task.
    pub async fn request_completion(
        &self,
        task_id: Uuid,
        worker: &str,
    ) -> Result<CompletionRequest> {
        let code = otp::generate();
        let code_hash = otp::digest(&code);
        let expires_at = Utc::now() + TimeDelta::minutes(otp::TASK_COMPLETION_TTL_MINUTES);
        let expires_at = timestamp(expires_at);

        let id = task_id.to_string();
        let email = worker.to_owned();
        let outcome = self
            .store
            .run(move |db| {
                db.issue_completion_otp(&id, &email, &code_hash, &expires_at)
            })
            .await?;

        match outcome {
            CompletionRequestOutcome::Issued {
                creator_email,
                title,
            } => {
                info!(%task_id, worker, owner = %creator_email, "Completion code issued");
                self.jobs.push(Job::Notify(Notification::TaskCompletionOtp {
                    email: creator_email.clone(),
                    code,
                    task_title: title.clone(),
                    worker_email: worker.to_owned(),
                }));
                Ok(CompletionRequest {
                    task_title: title,
                    task_owner: creator_email,
                })
            }
            CompletionRequestOutcome::TaskNotFound => Err(ApiError::NotFound("Task")),
            CompletionRequestOutcome::NotSelected => Err(ApiError::Unauthorized(
                "You are not authorized to end this task",
            )),
            CompletionRequestOutcome::Finished(status) => {
                Err(ApiError::InvalidState(format!("Task is already {status}")))
            }
        }
    }

    /// Owner side of the handshake. Completion is all-or-nothing in the store.
    pub async fn complete(&self, task_id: Uuid, owner: &str, code: &str) -> Result<()> {
        let id = task_id.to_string();
        let email = owner.to_owned();
        let code_hash = otp::digest(code);
        let at = now();
        let outcome = self
            .store
            .run(move |db| db.complete_task(&id, &email, &code_hash, &at))
            .await?;

        match outcome {
            CompletionOutcome::Completed { worker_email } => {
                info!(%task_id, owner, worker = %worker_email, "Task completed");
                Ok(())
            }
            CompletionOutcome::InvalidCode => Err(ApiError::Unauthorized("Invalid or expired OTP")),
            CompletionOutcome::Finished(status) => {
                Err(ApiError::InvalidState(format!("Task is already {status}")))
            }
        }
    }
}
