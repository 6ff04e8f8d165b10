use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::api::errors::{ApiError, ApiResult};
use crate::api::EduLitApi;
use crate::schemas::{
    Answer, Assessment, AssessmentQuestion, Attempt, AttemptUpdate, NewAnswer, NewAttempt,
    NewQuestionOption, Question, QuestionOption, QuestionType,
};

/// Ids of one seeded question slot, for driving the session in tests.
#[derive(Debug, Clone)]
pub(crate) struct SlotFixture {
    pub(crate) assessment_question_id: Uuid,
    pub(crate) question_id: Uuid,
    pub(crate) option_ids: Vec<Uuid>,
}

/// The canonical three-question assessment: one single-select (A/B/C, B
/// correct), one multi-select (A/B/C/D, B and D correct), one paragraph.
#[derive(Debug, Clone)]
pub(crate) struct ThreeQuestionFixture {
    pub(crate) assessment_id: Uuid,
    pub(crate) single: SlotFixture,
    pub(crate) multi: SlotFixture,
    pub(crate) paragraph: SlotFixture,
}

struct BackendState {
    assessment: Assessment,
    questions: Vec<AssessmentQuestion>,
    question_content: HashMap<Uuid, Question>,
    options: HashMap<Uuid, QuestionOption>,
    attempts: HashMap<Uuid, Attempt>,
    answers: HashMap<Uuid, Answer>,
    graded_attempts: Vec<Uuid>,
}

/// In-memory stand-in for the EduLit backend, with fault-injection switches
/// and call counters for asserting on the save/submit protocols.
pub(crate) struct InMemoryApi {
    state: StdMutex<BackendState>,
    pub(crate) fail_deletes: AtomicBool,
    pub(crate) fail_grading: AtomicBool,
    attempt_creates: AtomicUsize,
    answer_inserts: StdMutex<HashMap<Uuid, usize>>,
}

impl InMemoryApi {
    pub(crate) fn three_question_assessment(
        duration_minutes: i64,
    ) -> (Arc<Self>, ThreeQuestionFixture) {
        let assessment_id = Uuid::new_v4();
        let mut questions = Vec::new();
        let mut question_content = HashMap::new();
        let mut options = HashMap::new();

        let single = seed_choice_question(
            &mut questions,
            &mut question_content,
            &mut options,
            1,
            "Pick the right answer",
            &["A", "B", "C"],
            &[1],
        );
        let multi = seed_choice_question(
            &mut questions,
            &mut question_content,
            &mut options,
            2,
            "Pick all that apply",
            &["A", "B", "C", "D"],
            &[1, 3],
        );
        let paragraph = seed_paragraph_question(&mut questions, &mut question_content, 3);

        let assessment = Assessment {
            id: assessment_id,
            title: "Unit test assessment".to_string(),
            duration_minutes,
            total_questions: questions.len() as i64,
        };
        let api = Arc::new(Self {
            state: StdMutex::new(BackendState {
                assessment,
                questions,
                question_content,
                options,
                attempts: HashMap::new(),
                answers: HashMap::new(),
                graded_attempts: Vec::new(),
            }),
            fail_deletes: AtomicBool::new(false),
            fail_grading: AtomicBool::new(false),
            attempt_creates: AtomicUsize::new(0),
            answer_inserts: StdMutex::new(HashMap::new()),
        });

        (api, ThreeQuestionFixture { assessment_id, single, multi, paragraph })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn attempt_creates(&self) -> usize {
        self.attempt_creates.load(Ordering::SeqCst)
    }

    pub(crate) fn grading_calls(&self) -> usize {
        self.lock().graded_attempts.len()
    }

    pub(crate) fn graded_attempts(&self) -> Vec<Uuid> {
        self.lock().graded_attempts.clone()
    }

    pub(crate) fn answers_for(&self, assessment_question_id: Uuid) -> Vec<Answer> {
        self.lock()
            .answers
            .values()
            .filter(|answer| answer.assessment_question_id == assessment_question_id)
            .cloned()
            .collect()
    }

    pub(crate) fn insert_count(&self, assessment_question_id: Uuid) -> usize {
        self.answer_inserts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&assessment_question_id)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn option_text(&self, option_id: Uuid) -> Option<String> {
        self.lock().options.get(&option_id).map(|option| option.text.clone())
    }

    pub(crate) fn attempt(&self, attempt_id: Uuid) -> Option<Attempt> {
        self.lock().attempts.get(&attempt_id).cloned()
    }

    /// Seeds an open attempt started in the past, as left behind by an
    /// interrupted session.
    pub(crate) fn seed_open_attempt(
        &self,
        assessment_id: Uuid,
        user_id: Uuid,
        started_at: OffsetDateTime,
    ) -> Uuid {
        let attempt = Attempt {
            id: Uuid::new_v4(),
            assessment_id,
            user_id,
            attempt_number: 1,
            started_at: Some(started_at),
            completed_at: None,
        };
        let id = attempt.id;
        self.lock().attempts.insert(id, attempt);
        id
    }

    pub(crate) fn seed_answer(
        &self,
        attempt_id: Uuid,
        assessment_question_id: Uuid,
        selected_option_id: Uuid,
    ) {
        let answer = Answer {
            id: Uuid::new_v4(),
            assessment_question_id,
            attempt_id,
            selected_option_id,
            created_at: Some(OffsetDateTime::now_utc()),
        };
        self.lock().answers.insert(answer.id, answer);
    }

    /// Seeds the synthetic option carrying an earlier free-text draft.
    pub(crate) fn seed_free_text_option(&self, question_id: Uuid, text: &str) -> Uuid {
        let option = QuestionOption {
            id: Uuid::new_v4(),
            question_id,
            text: text.to_string(),
            is_correct: false,
            order_idx: 0,
        };
        let id = option.id;
        self.lock().options.insert(id, option);
        id
    }
}

fn seed_choice_question(
    questions: &mut Vec<AssessmentQuestion>,
    question_content: &mut HashMap<Uuid, Question>,
    options: &mut HashMap<Uuid, QuestionOption>,
    order_num: i32,
    title: &str,
    labels: &[&str],
    correct_indices: &[usize],
) -> SlotFixture {
    let question_id = Uuid::new_v4();
    let assessment_question_id = Uuid::new_v4();

    questions.push(AssessmentQuestion {
        id: assessment_question_id,
        question_id,
        order_num,
        correct_answer: None,
    });
    question_content.insert(
        question_id,
        Question {
            id: question_id,
            title: title.to_string(),
            body: format!("<p>{title}</p>"),
            question_type: QuestionType::MultipleChoice,
        },
    );

    let mut option_ids = Vec::new();
    for (idx, label) in labels.iter().enumerate() {
        let option = QuestionOption {
            id: Uuid::new_v4(),
            question_id,
            text: label.to_string(),
            is_correct: correct_indices.contains(&idx),
            order_idx: idx as i32,
        };
        option_ids.push(option.id);
        options.insert(option.id, option);
    }

    SlotFixture { assessment_question_id, question_id, option_ids }
}

fn seed_paragraph_question(
    questions: &mut Vec<AssessmentQuestion>,
    question_content: &mut HashMap<Uuid, Question>,
    order_num: i32,
) -> SlotFixture {
    let question_id = Uuid::new_v4();
    let assessment_question_id = Uuid::new_v4();

    questions.push(AssessmentQuestion {
        id: assessment_question_id,
        question_id,
        order_num,
        correct_answer: Some("reference answer".to_string()),
    });
    question_content.insert(
        question_id,
        Question {
            id: question_id,
            title: "Explain your reasoning".to_string(),
            body: "<p>Explain your reasoning</p>".to_string(),
            question_type: QuestionType::Paragraph,
        },
    );

    SlotFixture { assessment_question_id, question_id, option_ids: Vec::new() }
}

fn not_found(what: &str) -> ApiError {
    ApiError::Status { status: 404, detail: format!("{what} not found") }
}

#[async_trait]
impl EduLitApi for InMemoryApi {
    async fn get_assessment(&self, id: Uuid) -> ApiResult<Assessment> {
        let state = self.lock();
        if state.assessment.id != id {
            return Err(not_found("assessment"));
        }
        Ok(state.assessment.clone())
    }

    async fn list_assessment_questions(
        &self,
        assessment_id: Uuid,
    ) -> ApiResult<Vec<AssessmentQuestion>> {
        let state = self.lock();
        if state.assessment.id != assessment_id {
            return Err(not_found("assessment"));
        }
        Ok(state.questions.clone())
    }

    async fn list_attempts(&self, assessment_id: Uuid) -> ApiResult<Vec<Attempt>> {
        Ok(self
            .lock()
            .attempts
            .values()
            .filter(|attempt| attempt.assessment_id == assessment_id)
            .cloned()
            .collect())
    }

    async fn create_attempt(&self, payload: &NewAttempt) -> ApiResult<Attempt> {
        self.attempt_creates.fetch_add(1, Ordering::SeqCst);
        let attempt = Attempt {
            id: Uuid::new_v4(),
            assessment_id: payload.assessment_id,
            user_id: payload.user_id,
            attempt_number: payload.attempt_number,
            started_at: None,
            completed_at: None,
        };
        self.lock().attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn update_attempt(&self, id: Uuid, payload: &AttemptUpdate) -> ApiResult<Attempt> {
        let mut state = self.lock();
        let attempt = state.attempts.get_mut(&id).ok_or_else(|| not_found("attempt"))?;
        if let Some(started_at) = payload.started_at {
            attempt.started_at = Some(started_at);
        }
        if let Some(completed_at) = payload.completed_at {
            attempt.completed_at = Some(completed_at);
        }
        Ok(attempt.clone())
    }

    async fn get_question(&self, id: Uuid) -> ApiResult<Question> {
        self.lock().question_content.get(&id).cloned().ok_or_else(|| not_found("question"))
    }

    async fn list_question_options(&self, question_id: Uuid) -> ApiResult<Vec<QuestionOption>> {
        let mut options: Vec<QuestionOption> = self
            .lock()
            .options
            .values()
            .filter(|option| option.question_id == question_id)
            .cloned()
            .collect();
        options.sort_by_key(|option| option.order_idx);
        Ok(options)
    }

    async fn create_question_option(
        &self,
        payload: &NewQuestionOption,
    ) -> ApiResult<QuestionOption> {
        let option = QuestionOption {
            id: Uuid::new_v4(),
            question_id: payload.question_id,
            text: payload.text.clone(),
            is_correct: payload.is_correct,
            order_idx: payload.order_idx,
        };
        self.lock().options.insert(option.id, option.clone());
        Ok(option)
    }

    async fn update_question_option(&self, id: Uuid, text: &str) -> ApiResult<QuestionOption> {
        let mut state = self.lock();
        let option = state.options.get_mut(&id).ok_or_else(|| not_found("option"))?;
        option.text = text.to_string();
        Ok(option.clone())
    }

    async fn list_answers(&self, attempt_id: Uuid) -> ApiResult<Vec<Answer>> {
        Ok(self
            .lock()
            .answers
            .values()
            .filter(|answer| answer.attempt_id == attempt_id)
            .cloned()
            .collect())
    }

    async fn create_answer(&self, payload: &NewAnswer) -> ApiResult<Answer> {
        let answer = Answer {
            id: Uuid::new_v4(),
            assessment_question_id: payload.assessment_question_id,
            attempt_id: payload.attempt_id,
            selected_option_id: payload.selected_option_id,
            created_at: Some(OffsetDateTime::now_utc()),
        };
        self.lock().answers.insert(answer.id, answer.clone());
        *self
            .answer_inserts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(payload.assessment_question_id)
            .or_insert(0) += 1;
        Ok(answer)
    }

    async fn delete_answer(&self, id: Uuid) -> ApiResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                status: 500,
                detail: "delete rejected by fault injection".to_string(),
            });
        }
        self.lock().answers.remove(&id);
        Ok(())
    }

    async fn calculate_grading(&self, attempt_id: Uuid) -> ApiResult<()> {
        if self.fail_grading.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                status: 503,
                detail: "grading backend unavailable".to_string(),
            });
        }
        self.lock().graded_attempts.push(attempt_id);
        Ok(())
    }
}
