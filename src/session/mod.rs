pub mod answers;
pub(crate) mod autosave;
pub mod timer;


use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::api::EduLitApi;
use crate::core::config::SessionSettings;
use crate::core::time::format_offset;
use crate::schemas::{
    Assessment, AssessmentQuestion, Attempt, AttemptUpdate, NewAttempt, Question, QuestionOption,
    QuestionType,
};
use self::answers::{AnswerEntry, AnswerSheet};
use self::autosave::{AnswerStore, Debouncer};
use self::timer::Countdown;

/// Lifecycle of a take-session. Both submit paths (manual and timer expiry)
/// move `InProgress -> Submitting -> Submitted`; a failed finalize falls back
/// to `InProgress` so the student can retry manually, but the countdown stays
/// stopped once it has expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    InProgress,
    Submitting,
    Submitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual,
    TimerExpired,
}

/// Notifications for the UI layer. Saves and submits report through this
/// channel instead of propagating errors out of interaction handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    AnswerSaved { assessment_question_id: Uuid },
    SaveFailed { assessment_question_id: Uuid, detail: String },
    TimeExpired,
    Submitted { attempt_id: Uuid },
    SubmitFailed { detail: String },
}

/// A question as displayed: content plus its ordered options. For Paragraph
/// questions the options list may contain the synthetic free-text carrier.
#[derive(Debug, Clone)]
pub struct QuestionView {
    pub question: Question,
    pub options: Vec<QuestionOption>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingParagraph {
    assessment_question_id: Uuid,
    question_id: Uuid,
    generation: u64,
}

/// The assessment-taking state machine.
///
/// Owns the attempt, the ordered question list, the in-memory answer sheet,
/// the countdown, and the autosave machinery. All backend traffic goes
/// through the injected [`EduLitApi`].
pub struct AssessmentSession {
    api: Arc<dyn EduLitApi>,
    settings: SessionSettings,
    assessment: Assessment,
    questions: Vec<AssessmentQuestion>,
    attempt: Attempt,
    sheet: AnswerSheet,
    store: Arc<AnswerStore>,
    countdown: Countdown,
    expired_rx: mpsc::UnboundedReceiver<()>,
    debouncer: Debouncer,
    dirty_paragraph: Arc<StdMutex<Option<PendingParagraph>>>,
    next_generation: u64,
    current_index: usize,
    phase: SessionPhase,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl AssessmentSession {
    /// Loads the assessment and its questions, then resumes the open attempt
    /// or creates a fresh one. Any failure aborts initialization; there is no
    /// retry loop here, the caller surfaces the error.
    pub async fn initialize(
        api: Arc<dyn EduLitApi>,
        settings: SessionSettings,
        assessment_id: Uuid,
        user_id: Uuid,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Self> {
        let assessment =
            api.get_assessment(assessment_id).await.context("Failed to load assessment")?;
        let mut questions = api
            .list_assessment_questions(assessment_id)
            .await
            .context("Failed to load assessment questions")?;
        questions.sort_by_key(|slot| slot.order_num);

        let attempt = resume_or_create(api.as_ref(), assessment_id, user_id).await?;
        let sheet = restore_answers(api.as_ref(), &attempt, &questions).await?;

        // Remaining time derives from the server-recorded start, so a resumed
        // session shows the true countdown instead of restarting from the
        // full duration.
        let started_at = attempt.started_at.unwrap_or_else(OffsetDateTime::now_utc);
        let deadline = started_at + time::Duration::minutes(assessment.duration_minutes);
        let tick = Duration::from_millis(settings.tick_interval_ms);
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        let countdown = Countdown::start(remaining_until(deadline), tick, expired_tx);

        let store = Arc::new(AnswerStore::new(
            api.clone(),
            attempt.id,
            Duration::from_millis(settings.settle_delay_ms),
        ));
        let debouncer = Debouncer::new(Duration::from_millis(settings.debounce_ms));

        tracing::info!(
            assessment_id = %assessment.id,
            attempt_id = %attempt.id,
            questions = questions.len(),
            "Assessment session ready"
        );

        Ok(Self {
            api,
            settings,
            assessment,
            questions,
            attempt,
            sheet,
            store,
            countdown,
            expired_rx,
            debouncer,
            dirty_paragraph: Arc::new(StdMutex::new(None)),
            next_generation: 0,
            current_index: 0,
            phase: SessionPhase::InProgress,
            events,
        })
    }

    pub fn assessment(&self) -> &Assessment {
        &self.assessment
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn attempt(&self) -> &Attempt {
        &self.attempt
    }

    pub fn questions(&self) -> &[AssessmentQuestion] {
        &self.questions
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn remaining(&self) -> Duration {
        self.countdown.remaining()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Whether the sidebar marks this question answered: it must hold at
    /// least one selected option or non-empty text.
    pub fn is_answered(&self, assessment_question_id: Uuid) -> bool {
        self.sheet.is_answered(assessment_question_id)
    }

    pub fn answered_count(&self) -> usize {
        self.sheet.answered_count()
    }

    pub fn answer_text(&self, assessment_question_id: Uuid) -> Option<&str> {
        self.sheet.text(assessment_question_id)
    }

    pub fn selected_options(&self, assessment_question_id: Uuid) -> &[Uuid] {
        self.sheet.choices(assessment_question_id)
    }

    /// Jumps to a question by index (the sidebar grid) and fetches its
    /// content. Persisted paragraph text is resolved lazily here, on the
    /// first open after a resume.
    pub async fn open_question(&mut self, index: usize) -> Result<QuestionView> {
        let Some(slot) = self.questions.get(index).cloned() else {
            bail!("question index {index} out of bounds");
        };
        self.current_index = index;

        let question =
            self.api.get_question(slot.question_id).await.context("Failed to load question")?;
        let mut options = self
            .api
            .list_question_options(slot.question_id)
            .await
            .context("Failed to load question options")?;
        options.sort_by_key(|option| option.order_idx);

        if question.question_type == QuestionType::Paragraph
            && matches!(self.sheet.entry(slot.id), Some(AnswerEntry::TextPending))
        {
            self.resolve_pending_text(&slot, &options).await?;
        }

        Ok(QuestionView { question, options })
    }

    pub async fn next(&mut self) -> Result<QuestionView> {
        let last = self.questions.len().saturating_sub(1);
        let index = (self.current_index + 1).min(last);
        self.open_question(index).await
    }

    pub async fn previous(&mut self) -> Result<QuestionView> {
        let index = self.current_index.saturating_sub(1);
        self.open_question(index).await
    }

    /// Radio change on a single-select question: the selection collapses to
    /// one option and persists immediately.
    pub async fn select_single(&mut self, assessment_question_id: Uuid, option_id: Uuid) {
        self.sheet.set_single_choice(assessment_question_id, option_id);
        self.persist_choices(assessment_question_id).await;
    }

    /// Checkbox toggle on a multi-select question: the full recomputed set
    /// persists immediately.
    pub async fn toggle_choice(&mut self, assessment_question_id: Uuid, option_id: Uuid) {
        self.sheet.toggle_choice(assessment_question_id, option_id);
        self.persist_choices(assessment_question_id).await;
    }

    /// Keystroke in a Paragraph answer: local state updates synchronously so
    /// the textbox never loses input, and a debounced persist is scheduled.
    /// Each keystroke replaces the pending save.
    pub fn edit_paragraph(
        &mut self,
        assessment_question_id: Uuid,
        question_id: Uuid,
        text: &str,
    ) {
        self.sheet.set_text(assessment_question_id, text.to_string());

        let generation = self.next_generation;
        self.next_generation += 1;
        set_pending(
            &self.dirty_paragraph,
            Some(PendingParagraph { assessment_question_id, question_id, generation }),
        );

        let store = self.store.clone();
        let events = self.events.clone();
        let dirty = self.dirty_paragraph.clone();
        let text = text.to_string();
        self.debouncer.schedule(async move {
            match store.save_text(assessment_question_id, question_id, &text).await {
                Ok(()) => {
                    clear_pending_if(&dirty, generation);
                    let _ = events.send(SessionEvent::AnswerSaved { assessment_question_id });
                }
                Err(err) => {
                    tracing::warn!(
                        assessment_question_id = %assessment_question_id,
                        error = %err,
                        "Debounced paragraph save failed"
                    );
                    let _ = events.send(SessionEvent::SaveFailed {
                        assessment_question_id,
                        detail: err.to_string(),
                    });
                }
            }
        });
    }

    /// Runs the session until the countdown expires, then auto-submits once.
    /// Returns immediately if the countdown was already stopped by a manual
    /// submit. A failed auto-submit is reported through the event channel and
    /// not retried.
    pub async fn run_to_expiry(&mut self) {
        if self.expired_rx.recv().await.is_none() {
            return;
        }
        let _ = self.events.send(SessionEvent::TimeExpired);
        if let Err(err) = self.submit(SubmitTrigger::TimerExpired).await {
            tracing::error!(attempt_id = %self.attempt.id, error = %err, "Auto-submit failed");
        }
    }

    /// Finalizes the attempt: flush any pending paragraph save, close the
    /// attempt, and request grading. Exactly one grading call is issued per
    /// successful submit; a second call is rejected by the phase guard.
    pub async fn submit(&mut self, trigger: SubmitTrigger) -> Result<()> {
        if self.phase != SessionPhase::InProgress {
            bail!("attempt is already {:?}", self.phase);
        }
        self.phase = SessionPhase::Submitting;
        self.countdown.stop();
        self.flush_paragraph().await;

        match self.finalize().await {
            Ok(()) => {
                self.phase = SessionPhase::Submitted;
                let _ = self.events.send(SessionEvent::Submitted { attempt_id: self.attempt.id });
                Ok(())
            }
            Err(err) => {
                self.phase = SessionPhase::InProgress;
                let _ = self.events.send(SessionEvent::SubmitFailed { detail: err.to_string() });
                if trigger == SubmitTrigger::TimerExpired {
                    tracing::warn!(
                        attempt_id = %self.attempt.id,
                        "Timer-driven submit failed; countdown stays at zero until a manual retry"
                    );
                }
                Err(err)
            }
        }
    }

    async fn finalize(&mut self) -> Result<()> {
        let completed_at = OffsetDateTime::now_utc();
        let updated = self
            .api
            .update_attempt(
                self.attempt.id,
                &AttemptUpdate { started_at: None, completed_at: Some(completed_at) },
            )
            .await
            .context("Failed to close attempt")?;
        self.attempt = updated;

        self.api
            .calculate_grading(self.attempt.id)
            .await
            .context("Failed to request grading")?;

        tracing::info!(
            attempt_id = %self.attempt.id,
            completed_at = %format_offset(completed_at),
            "Attempt submitted for grading"
        );
        Ok(())
    }

    async fn persist_choices(&mut self, assessment_question_id: Uuid) {
        let selected = self.sheet.choices(assessment_question_id).to_vec();
        match self.store.save_choices(assessment_question_id, &selected).await {
            Ok(()) => {
                let _ = self.events.send(SessionEvent::AnswerSaved { assessment_question_id });
            }
            Err(err) => {
                tracing::warn!(
                    assessment_question_id = %assessment_question_id,
                    error = %err,
                    "Choice save failed"
                );
                let _ = self.events.send(SessionEvent::SaveFailed {
                    assessment_question_id,
                    detail: err.to_string(),
                });
            }
        }
    }

    /// Submitting with a debounce still pending would silently drop the tail
    /// of the student's text; save it now instead.
    async fn flush_paragraph(&mut self) {
        self.debouncer.cancel();
        let Some(pending) = set_pending(&self.dirty_paragraph, None) else {
            return;
        };
        let Some(text) =
            self.sheet.text(pending.assessment_question_id).map(ToString::to_string)
        else {
            return;
        };
        match self
            .store
            .save_text(pending.assessment_question_id, pending.question_id, &text)
            .await
        {
            Ok(()) => {
                let _ = self.events.send(SessionEvent::AnswerSaved {
                    assessment_question_id: pending.assessment_question_id,
                });
            }
            Err(err) => {
                tracing::warn!(
                    assessment_question_id = %pending.assessment_question_id,
                    error = %err,
                    "Flush of pending paragraph save failed"
                );
                let _ = self.events.send(SessionEvent::SaveFailed {
                    assessment_question_id: pending.assessment_question_id,
                    detail: err.to_string(),
                });
            }
        }
    }

    async fn resolve_pending_text(
        &mut self,
        slot: &AssessmentQuestion,
        options: &[QuestionOption],
    ) -> Result<()> {
        let answers = self
            .api
            .list_answers(self.attempt.id)
            .await
            .context("Failed to load persisted answers")?;
        let Some(answer) =
            answers.into_iter().find(|answer| answer.assessment_question_id == slot.id)
        else {
            return Ok(());
        };
        if let Some(option) = options.iter().find(|option| option.id == answer.selected_option_id)
        {
            self.sheet.set_text(slot.id, option.text.clone());
        }
        Ok(())
    }
}

fn set_pending(
    cell: &Arc<StdMutex<Option<PendingParagraph>>>,
    value: Option<PendingParagraph>,
) -> Option<PendingParagraph> {
    let mut guard = cell.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    std::mem::replace(&mut *guard, value)
}

fn clear_pending_if(cell: &Arc<StdMutex<Option<PendingParagraph>>>, generation: u64) {
    let mut guard = cell.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if (*guard).map(|pending| pending.generation) == Some(generation) {
        *guard = None;
    }
}

fn remaining_until(deadline: OffsetDateTime) -> Duration {
    let diff = deadline - OffsetDateTime::now_utc();
    if diff.is_negative() {
        Duration::ZERO
    } else {
        diff.unsigned_abs()
    }
}

async fn resume_or_create(
    api: &dyn EduLitApi,
    assessment_id: Uuid,
    user_id: Uuid,
) -> Result<Attempt> {
    let attempts =
        api.list_attempts(assessment_id).await.context("Failed to list attempts")?;
    if let Some(open) = attempts
        .into_iter()
        .find(|attempt| attempt.user_id == user_id && attempt.completed_at.is_none())
    {
        tracing::info!(attempt_id = %open.id, "Resuming open attempt");
        return Ok(open);
    }

    let created = api
        .create_attempt(&NewAttempt { assessment_id, user_id, attempt_number: 1 })
        .await
        .context("Failed to create attempt")?;
    let started = api
        .update_attempt(
            created.id,
            &AttemptUpdate { started_at: Some(OffsetDateTime::now_utc()), completed_at: None },
        )
        .await
        .context("Failed to set attempt start time")?;
    tracing::info!(attempt_id = %started.id, "Created new attempt");
    Ok(started)
}

/// Rebuilds the in-memory answer map from persisted rows. Choice selections
/// restore eagerly; paragraph answers are marked pending and their text is
/// resolved when the question is first opened.
async fn restore_answers(
    api: &dyn EduLitApi,
    attempt: &Attempt,
    questions: &[AssessmentQuestion],
) -> Result<AnswerSheet> {
    let mut sheet = AnswerSheet::default();
    let answers =
        api.list_answers(attempt.id).await.context("Failed to load persisted answers")?;
    if answers.is_empty() {
        return Ok(sheet);
    }

    for slot in questions {
        let selected: Vec<Uuid> = answers
            .iter()
            .filter(|answer| answer.assessment_question_id == slot.id)
            .map(|answer| answer.selected_option_id)
            .collect();
        if selected.is_empty() {
            continue;
        }

        let question =
            api.get_question(slot.question_id).await.context("Failed to load question")?;
        match question.question_type {
            QuestionType::MultipleChoice => sheet.restore_choices(slot.id, selected),
            QuestionType::Paragraph => sheet.mark_text_pending(slot.id),
        }
    }

    Ok(sheet)
}
