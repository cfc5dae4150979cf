//! Guarded task transitions. Each operation reads the task and applies its
//! mutation inside one immediate transaction, so concurrent callers can never
//! both pass a guard that only one of them should pass.

use anyhow::{Result, bail};
use peerassist_types::models::{OtpContext, ScheduleStatus, TaskStatus};
use rusqlite::TransactionBehavior;

use crate::Database;
use crate::models::OtpRow;
use crate::queries::{OptionalExt, delete_otp, query_otp, upsert_otp, user_exists};
use crate::tasks::{parse_status, query_task};

#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Applied,
    TaskNotFound,
    ApplicantNotFound,
    NotOpen(TaskStatus),
    SelfApply,
    AlreadyApplied,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AcceptOutcome {
    /// Worker selected. `status` is the task status after the selection.
    Accepted { title: String, status: TaskStatus },
    TaskNotFound,
    WorkerNotFound,
    NotOpen(TaskStatus),
    /// The creator tried to select themselves.
    SelfSelect,
    AlreadySelected,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionRequestOutcome {
    Issued {
        creator_email: String,
        title: String,
    },
    TaskNotFound,
    NotSelected,
    Finished(TaskStatus),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    Completed { worker_email: String },
    /// No live OTP matched the submitted code.
    InvalidCode,
    Finished(TaskStatus),
}

/// Everything needed to derive the schedule row on selection.
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    pub task_id: &'a str,
    pub worker_email: &'a str,
    pub schedule_id: &'a str,
    pub now: &'a str,
}

impl Database {
    /// Add `applicant` to the task's applicants.
    pub fn apply_to_task(&self, task_id: &str, applicant: &str, now: &str) -> Result<ApplyOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(task) = query_task(&tx, task_id)? else {
                return Ok(ApplyOutcome::TaskNotFound);
            };
            if !user_exists(&tx, applicant)? {
                return Ok(ApplyOutcome::ApplicantNotFound);
            }

            let status = parse_status(&task.status)?;
            if !status.is_open() {
                return Ok(ApplyOutcome::NotOpen(status));
            }
            if task.creator_email == applicant {
                return Ok(ApplyOutcome::SelfApply);
            }

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO task_applicants (task_id, email, applied_at)
                 VALUES (?1, ?2, ?3)",
                (task_id, applicant, now),
            )?;
            if inserted == 0 {
                return Ok(ApplyOutcome::AlreadyApplied);
            }

            tx.commit()?;
            Ok(ApplyOutcome::Applied)
        })
    }

    /// Select a worker and derive their schedule row. The worker does not
    /// need to have applied, but may not be the task's creator. Once the
    /// selection count reaches `people_needed` the task moves to In Progress.
    pub fn accept_worker(&self, selection: &Selection<'_>) -> Result<AcceptOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(task) = query_task(&tx, selection.task_id)? else {
                return Ok(AcceptOutcome::TaskNotFound);
            };
            if !user_exists(&tx, selection.worker_email)? {
                return Ok(AcceptOutcome::WorkerNotFound);
            }

            let mut status = parse_status(&task.status)?;
            if !status.is_open() {
                return Ok(AcceptOutcome::NotOpen(status));
            }
            if task.creator_email == selection.worker_email {
                return Ok(AcceptOutcome::SelfSelect);
            }

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO task_selections (task_id, email, selected_at)
                 VALUES (?1, ?2, ?3)",
                (selection.task_id, selection.worker_email, selection.now),
            )?;
            if inserted == 0 {
                return Ok(AcceptOutcome::AlreadySelected);
            }

            tx.execute(
                "INSERT INTO scheduled_tasks (id, task_id, title, poster_email, worker_email,
                    scheduled_at, task_date, task_time, place, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    selection.schedule_id,
                    task.id,
                    task.title,
                    task.creator_email,
                    selection.worker_email,
                    selection.now,
                    task.task_date,
                    task.task_time,
                    task.place_of_work,
                    ScheduleStatus::Scheduled.as_str(),
                ],
            )?;

            let selected: i64 = tx.query_row(
                "SELECT COUNT(*) FROM task_selections WHERE task_id = ?1",
                [selection.task_id],
                |row| row.get(0),
            )?;
            if selected >= task.people_needed {
                tx.execute(
                    "UPDATE tasks SET status = ?2, updated_at = ?3 WHERE id = ?1",
                    (selection.task_id, TaskStatus::InProgress.as_str(), selection.now),
                )?;
                status = TaskStatus::InProgress;
            }

            tx.commit()?;
            Ok(AcceptOutcome::Accepted {
                title: task.title,
                status,
            })
        })
    }

    /// Issue (or reissue) the completion OTP for a selected worker. The OTP is
    /// keyed by (task owner, task) so a newer request invalidates the
    /// previous code.
    pub fn issue_completion_otp(
        &self,
        task_id: &str,
        worker_email: &str,
        code_hash: &str,
        expires_at: &str,
    ) -> Result<CompletionRequestOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(task) = query_task(&tx, task_id)? else {
                return Ok(CompletionRequestOutcome::TaskNotFound);
            };

            let selected: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM task_selections WHERE task_id = ?1 AND email = ?2",
                    (task_id, worker_email),
                    |row| row.get(0),
                )
                .optional()?;
            if selected.is_none() {
                return Ok(CompletionRequestOutcome::NotSelected);
            }

            let status = parse_status(&task.status)?;
            if status.is_terminal() {
                return Ok(CompletionRequestOutcome::Finished(status));
            }

            upsert_otp(
                &tx,
                &OtpRow {
                    email: task.creator_email.clone(),
                    context: OtpContext::TaskCompletion.as_str().into(),
                    task_id: task_id.into(),
                    code_hash: code_hash.into(),
                    worker_email: Some(worker_email.into()),
                    expires_at: expires_at.into(),
                },
            )?;

            tx.commit()?;
            Ok(CompletionRequestOutcome::Issued {
                creator_email: task.creator_email,
                title: task.title,
            })
        })
    }

    /// Confirm a task as completed with the owner's OTP.
    ///
    /// Task status, the worker's schedule row, the worker's completion count
    /// and the OTP deletion commit together or not at all. Any store failure
    /// inside the group is returned as `Err` after a full rollback.
    pub fn complete_task(
        &self,
        task_id: &str,
        creator_email: &str,
        code_hash: &str,
        now: &str,
    ) -> Result<CompletionOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(otp) = query_otp(&tx, creator_email, OtpContext::TaskCompletion, task_id)?
            else {
                return Ok(CompletionOutcome::InvalidCode);
            };
            if otp.code_hash != code_hash || otp.expires_at.as_str() <= now {
                return Ok(CompletionOutcome::InvalidCode);
            }
            let Some(worker_email) = otp.worker_email else {
                bail!("completion OTP for task {} has no worker", task_id);
            };

            let Some(task) = query_task(&tx, task_id)? else {
                bail!("completion OTP references missing task {}", task_id);
            };
            let status = parse_status(&task.status)?;
            if !status.can_transition_to(TaskStatus::Completed) {
                return Ok(CompletionOutcome::Finished(status));
            }

            let updated = tx.execute(
                "UPDATE tasks SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status = ?4",
                (task_id, TaskStatus::Completed.as_str(), now, status.as_str()),
            )?;
            if updated != 1 {
                bail!("task {} changed status mid-transaction", task_id);
            }

            let scheduled = tx.execute(
                "UPDATE scheduled_tasks SET status = ?3, completed_at = ?4
                 WHERE task_id = ?1 AND worker_email = ?2",
                (
                    task_id,
                    worker_email.as_str(),
                    ScheduleStatus::Completed.as_str(),
                    now,
                ),
            )?;
            if scheduled != 1 {
                bail!("worker {worker_email} has no schedule row for {task_id}");
            }

            let counted = tx.execute(
                "UPDATE users SET completed_tasks = completed_tasks + 1 WHERE email = ?1",
                [worker_email.as_str()],
            )?;
            if counted != 1 {
                bail!("completing {task_id}: worker {worker_email} not found");
            }

            delete_otp(&tx, creator_email, OtpContext::TaskCompletion, task_id)?;

            tx.commit()?;
            Ok(CompletionOutcome::Completed { worker_email })
        })
    }
}
