use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// One student's run through an assessment. At most one open attempt
/// (`completed_at == None`) per (assessment, user) is assumed by the backend;
/// the session resumes it rather than creating a second one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    #[serde(rename = "attemptId")]
    pub id: Uuid,
    pub assessment_id: Uuid,
    pub user_id: Uuid,
    pub attempt_number: i32,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAttempt {
    pub assessment_id: Uuid,
    pub user_id: Uuid,
    pub attempt_number: i32,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptUpdate {
    #[serde(skip_serializing_if = "Option::is_none", with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(skip_serializing_if = "Option::is_none", with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

/// A student's response to one assessment question within an attempt.
/// Saves use replace-semantics: stale rows are deleted before new ones are
/// inserted, so one row exists per selected option (and exactly one for a
/// paragraph answer, pointing at its synthetic option).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    #[serde(rename = "answerId")]
    pub id: Uuid,
    pub assessment_question_id: Uuid,
    pub attempt_id: Uuid,
    pub selected_option_id: Uuid,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAnswer {
    pub assessment_question_id: Uuid,
    pub attempt_id: Uuid,
    pub selected_option_id: Uuid,
}
