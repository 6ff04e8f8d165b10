use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::api::EduLitApi;
use crate::schemas::{Answer, NewAnswer, NewQuestionOption};

/// Persists answers with replace-semantics: stale rows for the question are
/// deleted, then the new selection (or free-text synthetic option) is
/// inserted. A per-question async lock serializes overlapping saves so rapid
/// toggling cannot interleave one cycle's deletes with another's inserts.
pub(crate) struct AnswerStore {
    api: Arc<dyn EduLitApi>,
    attempt_id: Uuid,
    settle_delay: Duration,
    locks: StdMutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl AnswerStore {
    pub(crate) fn new(api: Arc<dyn EduLitApi>, attempt_id: Uuid, settle_delay: Duration) -> Self {
        Self { api, attempt_id, settle_delay, locks: StdMutex::new(HashMap::new()) }
    }

    /// Replaces the persisted selection for a choice question with
    /// `option_ids`, one answer row per selected option.
    pub(crate) async fn save_choices(
        &self,
        assessment_question_id: Uuid,
        option_ids: &[Uuid],
    ) -> Result<()> {
        let lock = self.lock_for(assessment_question_id);
        let _guard = lock.lock().await;

        let stale = self.answers_for(assessment_question_id).await?;
        self.delete_answers(stale).await;

        if option_ids.is_empty() {
            return Ok(());
        }

        self.settle().await;
        for option_id in option_ids {
            self.api
                .create_answer(&NewAnswer {
                    assessment_question_id,
                    attempt_id: self.attempt_id,
                    selected_option_id: *option_id,
                })
                .await
                .context("Failed to save selected option")?;
        }

        tracing::debug!(
            assessment_question_id = %assessment_question_id,
            selected = option_ids.len(),
            "Choice answer saved"
        );
        Ok(())
    }

    /// Replaces the persisted free-text answer for a Paragraph question.
    ///
    /// The text lives in a synthetic option: the option referenced by the
    /// prior answer is reused when present, otherwise a fresh one is created.
    /// Exactly one answer row points at it afterwards.
    pub(crate) async fn save_text(
        &self,
        assessment_question_id: Uuid,
        question_id: Uuid,
        text: &str,
    ) -> Result<()> {
        let lock = self.lock_for(assessment_question_id);
        let _guard = lock.lock().await;

        let stale = self.answers_for(assessment_question_id).await?;
        let option = match stale.first().map(|answer| answer.selected_option_id) {
            Some(option_id) => self
                .api
                .update_question_option(option_id, text)
                .await
                .context("Failed to update free-text option")?,
            None => self
                .api
                .create_question_option(&NewQuestionOption::free_text(question_id, text))
                .await
                .context("Failed to create free-text option")?,
        };

        self.delete_answers(stale).await;
        self.settle().await;
        self.api
            .create_answer(&NewAnswer {
                assessment_question_id,
                attempt_id: self.attempt_id,
                selected_option_id: option.id,
            })
            .await
            .context("Failed to save free-text answer")?;

        tracing::debug!(
            assessment_question_id = %assessment_question_id,
            chars = text.len(),
            "Free-text answer saved"
        );
        Ok(())
    }

    fn lock_for(&self, assessment_question_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(assessment_question_id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    async fn answers_for(&self, assessment_question_id: Uuid) -> Result<Vec<Answer>> {
        let all = self
            .api
            .list_answers(self.attempt_id)
            .await
            .context("Failed to list existing answers")?;
        Ok(all
            .into_iter()
            .filter(|answer| answer.assessment_question_id == assessment_question_id)
            .collect())
    }

    /// Best-effort: a failed delete is logged and the rest proceed, matching
    /// the replace protocol's tolerance for stragglers.
    async fn delete_answers(&self, answers: Vec<Answer>) {
        for answer in answers {
            if let Err(err) = self.api.delete_answer(answer.id).await {
                tracing::warn!(answer_id = %answer.id, error = %err, "Failed to delete stale answer");
            }
        }
    }

    /// Waits for deletes to propagate through the eventually-consistent
    /// backend before inserting replacements.
    async fn settle(&self) {
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
    }
}

/// Trailing-edge debouncer for paragraph autosave. Scheduling a new task
/// aborts the pending one; the pending task is also aborted on drop so a
/// disposed session never fires a save.
pub(crate) struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub(crate) fn new(delay: Duration) -> Self {
        Self { delay, pending: None }
    }

    pub(crate) fn schedule<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        }));
    }

    pub(crate) fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
