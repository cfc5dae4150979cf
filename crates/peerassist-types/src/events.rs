use serde::{Deserialize, Serialize};

/// Outbound notifications. Delivery is best-effort and never blocks the
/// request that produced the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Notification {
    /// A password reset was requested for `email`.
    PasswordResetOtp { email: String, code: String },

    /// A selected worker asked the task owner to confirm completion.
    TaskCompletionOtp {
        email: String,
        code: String,
        task_title: String,
        worker_email: String,
    },

    /// The task owner picked `email` to do the task.
    WorkerSelected { email: String, task_title: String },
}

impl Notification {
    /// Address the notification is delivered to.
    pub fn recipient(&self) -> &str {
        match self {
            Self::PasswordResetOtp { email, .. }
            | Self::TaskCompletionOtp { email, .. }
            | Self::WorkerSelected { email, .. } => email,
        }
    }
}
