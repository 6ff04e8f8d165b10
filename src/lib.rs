//! Client-side engine for taking a timed EduLit assessment.
//!
//! The crate models the assessment-taking flow as an explicit state machine
//! ([`session::AssessmentSession`]) driven against the EduLit REST backend
//! through the [`api::EduLitApi`] trait. Rendering is out of scope; a UI layer
//! owns the session, calls its transition methods, and subscribes to
//! [`session::SessionEvent`] for save/submit notifications.

pub mod api;
pub mod core;
pub mod schemas;
pub mod session;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

pub use crate::api::errors::ApiError;
pub use crate::api::http::HttpApi;
pub use crate::api::EduLitApi;
pub use crate::core::config::{SessionSettings, Settings};
pub use crate::session::{AssessmentSession, SessionEvent, SessionPhase, SubmitTrigger};

/// Bootstrap a session for one assessment using environment-driven settings.
///
/// Loads `.env`, initializes tracing, builds the HTTP client, and runs the
/// initialization/resume protocol. The returned session is ready to take
/// input; `events` receives save and submit notifications.
pub async fn start_session(
    assessment_id: Uuid,
    user_id: Uuid,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> anyhow::Result<AssessmentSession> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    crate::core::telemetry::init_tracing(&settings)?;

    let api = Arc::new(HttpApi::from_settings(&settings)?);
    AssessmentSession::initialize(api, settings.session().clone(), assessment_id, user_id, events)
        .await
}
