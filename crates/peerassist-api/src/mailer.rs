//! Outbound mail. With no API key configured, notifications are only logged.

use anyhow::Result;
use peerassist_types::events::Notification;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info};

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";

#[derive(Clone)]
pub enum Mailer {
    Log,
    SendGrid {
        client: reqwest::Client,
        api_key: String,
        from: String,
    },
    /// Hands every notification to the test that owns the receiver.
    #[cfg(test)]
    Capture(tokio::sync::mpsc::UnboundedSender<Notification>),
}

impl Mailer {
    pub fn new(api_key: Option<String>, from: String) -> Self {
        match api_key.filter(|k| !k.is_empty()) {
            Some(api_key) => Self::SendGrid {
                client: reqwest::Client::new(),
                api_key,
                from,
            },
            None => Self::Log,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Log => "log only",
            Self::SendGrid { .. } => "sendgrid",
            #[cfg(test)]
            Self::Capture(_) => "capture",
        }
    }

    pub async fn send(&self, notification: &Notification) -> Result<()> {
        let to = notification.recipient();
        let (subject, body) = render(notification);

        match self {
            Self::Log => {
                info!(to, %subject, "Mail delivery disabled, notification not sent");
                debug!(to, %body, "Unsent mail body");
            }
            Self::SendGrid {
                client,
                api_key,
                from,
            } => {
                let payload = serde_json::json!({
                    "personalizations": [{ "to": [{ "email": to }] }],
                    "from": { "email": from },
                    "subject": subject,
                    "content": [{ "type": "text/plain", "value": body }],
                });

                client
                    .post(SENDGRID_URL)
                    .bearer_auth(api_key)
                    .header(CONTENT_TYPE, "application/json")
                    .body(payload.to_string())
                    .send()
                    .await?
                    .error_for_status()?;

                info!(to, %subject, "Mail sent");
            }
            #[cfg(test)]
            Self::Capture(tx) => {
                tx.send(notification.clone())
                    .map_err(|_| anyhow::anyhow!("capture receiver dropped"))?;
            }
        }

        Ok(())
    }
}

/// Subject and plain-text body for a notification.
pub fn render(notification: &Notification) -> (String, String) {
    match notification {
        Notification::PasswordResetOtp { code, .. } => (
            "Your PeerAssist password reset code".to_string(),
            format!(
                "Your password reset code is {code}.\n\n\
                 It expires in {} minutes. If you did not ask to reset your password, \
                 ignore this email.",
                crate::otp::PASSWORD_RESET_TTL_MINUTES
            ),
        ),
        Notification::TaskCompletionOtp {
            code,
            task_title,
            worker_email,
            ..
        } => (
            format!("Confirm completion of \"{task_title}\""),
            format!(
                "{worker_email} has marked your task \"{task_title}\" as finished.\n\n\
                 Share this code with them to confirm completion: {code}\n\n\
                 The code expires in {} minutes.",
                crate::otp::TASK_COMPLETION_TTL_MINUTES
            ),
        ),
        Notification::WorkerSelected { task_title, .. } => (
            format!("You were selected for \"{task_title}\""),
            format!(
                "Good news! The task owner picked you for \"{task_title}\".\n\n\
                 It now appears in your scheduled tasks."
            ),
        ),
    }
}
