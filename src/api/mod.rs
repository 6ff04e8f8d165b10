pub mod errors;
pub mod http;

use async_trait::async_trait;
use uuid::Uuid;

use crate::api::errors::ApiResult;
use crate::schemas::{
    Answer, Assessment, AssessmentQuestion, Attempt, AttemptUpdate, NewAnswer, NewAttempt,
    NewQuestionOption, Question, QuestionOption,
};

/// The EduLit REST contract surface consumed by the take-session.
///
/// The production implementation is [`http::HttpApi`]; tests substitute an
/// in-memory fake. Implementations must be safe to share across the session's
/// spawned tasks (debounced saves, countdown).
#[async_trait]
pub trait EduLitApi: Send + Sync {
    async fn get_assessment(&self, id: Uuid) -> ApiResult<Assessment>;

    /// Ordered question slots for an assessment. Callers re-sort by
    /// `order_num` defensively; the backend usually returns them sorted.
    async fn list_assessment_questions(
        &self,
        assessment_id: Uuid,
    ) -> ApiResult<Vec<AssessmentQuestion>>;

    async fn list_attempts(&self, assessment_id: Uuid) -> ApiResult<Vec<Attempt>>;

    async fn create_attempt(&self, payload: &NewAttempt) -> ApiResult<Attempt>;

    async fn update_attempt(&self, id: Uuid, payload: &AttemptUpdate) -> ApiResult<Attempt>;

    async fn get_question(&self, id: Uuid) -> ApiResult<Question>;

    async fn list_question_options(&self, question_id: Uuid) -> ApiResult<Vec<QuestionOption>>;

    async fn create_question_option(
        &self,
        payload: &NewQuestionOption,
    ) -> ApiResult<QuestionOption>;

    async fn update_question_option(&self, id: Uuid, text: &str) -> ApiResult<QuestionOption>;

    async fn list_answers(&self, attempt_id: Uuid) -> ApiResult<Vec<Answer>>;

    async fn create_answer(&self, payload: &NewAnswer) -> ApiResult<Answer>;

    async fn delete_answer(&self, id: Uuid) -> ApiResult<()>;

    /// Triggers server-side scoring for a completed attempt. The session never
    /// computes correctness client-side.
    async fn calculate_grading(&self, attempt_id: Uuid) -> ApiResult<()>;
}
