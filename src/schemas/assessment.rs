use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A timed test definition. Read-only to the take-session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: Uuid,
    pub title: String,
    pub duration_minutes: i64,
    #[serde(default)]
    pub total_questions: i64,
}

/// One ordered slot binding a reusable question into an assessment.
/// `correct_answer` is the free-response reference text used by grading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentQuestion {
    #[serde(rename = "assessmentQuestionId")]
    pub id: Uuid,
    pub question_id: Uuid,
    pub order_num: i32,
    #[serde(default)]
    pub correct_answer: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    Paragraph,
    MultipleChoice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(rename = "questionId")]
    pub id: Uuid,
    pub title: String,
    /// Rich-text body, rendered as HTML by the UI layer.
    pub body: String,
    pub question_type: QuestionType,
}

/// A selectable choice. For Paragraph questions the backend stores the
/// student's free text in a synthetic option record; see `NewQuestionOption`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOption {
    #[serde(rename = "optionId")]
    pub id: Uuid,
    pub question_id: Uuid,
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
    #[serde(default)]
    pub order_idx: i32,
}

/// Payload for creating the synthetic option that carries a free-text answer.
/// A backend-schema workaround inherited from the API contract: answers can
/// only point at options, so paragraph text is persisted through one.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestionOption {
    pub question_id: Uuid,
    pub text: String,
    pub is_correct: bool,
    pub order_idx: i32,
}

impl NewQuestionOption {
    pub fn free_text(question_id: Uuid, text: impl Into<String>) -> Self {
        Self { question_id, text: text.into(), is_correct: false, order_idx: 0 }
    }
}
