pub mod auth;
pub mod completion;
pub mod error;
pub mod jobs;
pub mod lifecycle;
pub mod mailer;
pub mod otp;
pub mod routes;
pub mod store;
pub mod tasks;
pub mod users;

#[cfg(test)]
mod testing;

pub use auth::{AppState, AppStateInner};
pub use mailer::Mailer;
pub use routes::router;
