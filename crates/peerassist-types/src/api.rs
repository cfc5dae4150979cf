use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::{TaskStatus, WorkType};

// -- JWT Claims --

/// Session token claims. `sub` is the user's email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

// -- Common --

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_types: Option<Vec<String>>,
}

// -- Auth --

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    #[validate(custom(function = "not_blank", message = "name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(custom(function = "not_blank", message = "mobile is required"))]
    pub mobile: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    #[validate(custom(function = "not_blank", message = "email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PasswordResetRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ResetPasswordRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(custom(function = "not_blank", message = "otp is required"))]
    pub otp: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

// -- Profile --

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub email: String,
    pub name: String,
    pub mobile: String,
    pub completed_tasks: i64,
    pub rating: String,
}

/// Partial update. At least one field must be present.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "has_profile_change"))]
pub struct ProfileUpdateRequest {
    #[validate(custom(function = "not_blank", message = "name must not be empty"))]
    pub name: Option<String>,
    #[validate(custom(function = "not_blank", message = "mobile must not be empty"))]
    pub mobile: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileUpdateResponse {
    pub message: String,
    pub updated: bool,
}

// -- Tasks --

/// Create a task, or update one when `id` is present.
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PostTaskRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[validate(custom(function = "not_blank", message = "title is required"))]
    pub title: String,
    #[validate(custom(function = "not_blank", message = "description is required"))]
    pub description: String,
    #[validate(custom(function = "not_blank", message = "task_time is required"))]
    pub task_time: String,
    /// `YYYY-MM-DD`
    #[validate(custom(function = "iso_date", message = "Invalid date format. Use YYYY-MM-DD"))]
    pub task_date: String,
    #[validate(range(min = 0.0, message = "estimated_pay_rate must be a non-negative number"))]
    pub estimated_pay_rate: f64,
    #[validate(custom(function = "not_blank", message = "place_of_work is required"))]
    pub place_of_work: String,
    #[validate(custom(function = "known_work_type", message = "Invalid work type"))]
    pub work_type: String,
    #[validate(range(min = 1, message = "people_needed must be at least 1"))]
    pub people_needed: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostTaskResponse {
    pub message: String,
    pub task_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<bool>,
}

/// A task as any user may see it: no applicant or selection lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub task_time: String,
    pub task_date: NaiveDate,
    pub estimated_pay_rate: f64,
    pub place_of_work: String,
    pub work_type: WorkType,
    pub people_needed: i64,
    pub creator_email: String,
    pub status: TaskStatus,
    pub views: i64,
    pub total_applicants: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A task as its creator sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnedTaskResponse {
    #[serde(flatten)]
    pub task: TaskResponse,
    pub applicants: Vec<String>,
    pub selected_users: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    #[serde(alias = "work_type")]
    pub category: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskListResponse<T> {
    pub tasks: Vec<T>,
    pub count: usize,
}

impl<T> From<Vec<T>> for TaskListResponse<T> {
    fn from(tasks: Vec<T>) -> Self {
        Self {
            count: tasks.len(),
            tasks,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorSummary {
    pub name: String,
    pub email: String,
    pub mobile: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AppliedTask {
    pub task: TaskResponse,
    pub creator: CreatorSummary,
    pub selected: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AppliedTasksResponse {
    pub applied_tasks: Vec<AppliedTask>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptResponse {
    pub message: String,
    pub status: TaskStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScheduledTasksResponse {
    pub scheduled_tasks: Vec<TaskResponse>,
    pub count: usize,
}

// -- Completion handshake --

#[derive(Debug, Serialize, Deserialize)]
pub struct EndTaskResponse {
    pub message: String,
    pub task_title: String,
    pub task_owner: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ValidateCompletionRequest {
    pub task_id: String,
    /// Task owner's email.
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(custom(function = "not_blank", message = "otp is required"))]
    pub otp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteTaskResponse {
    pub message: String,
    pub task_id: Uuid,
}

// -- Validators --

pub const DATE_FORMAT: &str = "%Y-%m-%d";

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn iso_date(value: &str) -> Result<(), ValidationError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(|_| ())
        .map_err(|_| ValidationError::new("date"))
}

fn known_work_type(value: &str) -> Result<(), ValidationError> {
    WorkType::try_from(value)
        .map(|_| ())
        .map_err(|_| ValidationError::new("work_type"))
}

fn has_profile_change(req: &ProfileUpdateRequest) -> Result<(), ValidationError> {
    if req.name.is_none() && req.mobile.is_none() {
        return Err(ValidationError::new("empty_update")
            .with_message("No fields provided for update".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            name: "Ann".into(),
            email: email.into(),
            mobile: "5550100".into(),
            password: password.into(),
        }
    }

    fn task(task_date: &str, work_type: &str) -> PostTaskRequest {
        PostTaskRequest {
            id: None,
            title: "Fix sink".into(),
            description: "Leaking under the counter".into(),
            task_time: "10:00 AM".into(),
            task_date: task_date.into(),
            estimated_pay_rate: 25.0,
            place_of_work: "Gainesville".into(),
            work_type: work_type.into(),
            people_needed: 1,
        }
    }

    #[test]
    fn signup_rejects_malformed_email_domains() {
        assert!(signup("a@x.com", "hunter22").validate().is_ok());
        for email in ["a@.", "a@x..com", "a@.com", "plain", "@x.com", "a b@x.com"] {
            let errors = signup(email, "hunter22").validate().unwrap_err();
            assert!(errors.field_errors().contains_key("email"), "{email}");
        }
    }

    #[test]
    fn signup_requires_every_field() {
        let errors = signup("a@x.com", "short").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password"));

        let mut req = signup("a@x.com", "hunter22");
        req.name = "  ".into();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
    }

    #[test]
    fn empty_profile_update_is_rejected() {
        assert!(ProfileUpdateRequest::default().validate().is_err());

        let req = ProfileUpdateRequest {
            name: None,
            mobile: Some("5550199".into()),
        };
        assert!(req.validate().is_ok());

        let req = ProfileUpdateRequest {
            name: Some(" ".into()),
            mobile: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn task_rules() {
        assert!(task("2025-04-20", "Computer Help").validate().is_ok());

        let errors = task("20-04-2025", "Plumbing").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("task_date"));

        let errors = task("2025-04-20", "plumbing").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("work_type"));

        let mut req = task("2025-04-20", "Plumbing");
        req.people_needed = 0;
        req.estimated_pay_rate = -1.0;
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("people_needed"));
        assert!(errors.field_errors().contains_key("estimated_pay_rate"));
    }
}
