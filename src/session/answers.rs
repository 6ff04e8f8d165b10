use std::collections::HashMap;

use uuid::Uuid;

/// In-memory answer for one assessment question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerEntry {
    /// Selected option ids, in toggle order. Single-select holds one element.
    Choices(Vec<Uuid>),
    /// Free text for a Paragraph question, updated on every keystroke.
    Text(String),
    /// A free-text answer persisted in an earlier visit; the body is resolved
    /// from its synthetic option the first time the question is opened.
    TextPending,
}

/// The client-side answer map, keyed by assessment question id.
///
/// Pure state: persistence lives in [`super::autosave::AnswerStore`]. A
/// question counts as answered only when it has at least one selected option
/// or non-empty text; bare key presence is not enough.
#[derive(Debug, Clone, Default)]
pub struct AnswerSheet {
    entries: HashMap<Uuid, AnswerEntry>,
}

impl AnswerSheet {
    pub fn set_single_choice(&mut self, question: Uuid, option: Uuid) {
        self.entries.insert(question, AnswerEntry::Choices(vec![option]));
    }

    /// Flips one option in a multi-select set and returns the resulting
    /// selection.
    pub fn toggle_choice(&mut self, question: Uuid, option: Uuid) -> Vec<Uuid> {
        let entry = self
            .entries
            .entry(question)
            .or_insert_with(|| AnswerEntry::Choices(Vec::new()));
        let selected = match entry {
            AnswerEntry::Choices(selected) => selected,
            _ => {
                *entry = AnswerEntry::Choices(Vec::new());
                match entry {
                    AnswerEntry::Choices(selected) => selected,
                    _ => unreachable!(),
                }
            }
        };
        if let Some(position) = selected.iter().position(|id| *id == option) {
            selected.remove(position);
        } else {
            selected.push(option);
        }
        selected.clone()
    }

    pub fn set_text(&mut self, question: Uuid, text: String) {
        self.entries.insert(question, AnswerEntry::Text(text));
    }

    /// Marks a question as having a persisted free-text answer whose body has
    /// not been fetched yet.
    pub fn mark_text_pending(&mut self, question: Uuid) {
        self.entries.insert(question, AnswerEntry::TextPending);
    }

    pub fn restore_choices(&mut self, question: Uuid, options: Vec<Uuid>) {
        self.entries.insert(question, AnswerEntry::Choices(options));
    }

    pub fn entry(&self, question: Uuid) -> Option<&AnswerEntry> {
        self.entries.get(&question)
    }

    pub fn choices(&self, question: Uuid) -> &[Uuid] {
        match self.entries.get(&question) {
            Some(AnswerEntry::Choices(selected)) => selected,
            _ => &[],
        }
    }

    pub fn text(&self, question: Uuid) -> Option<&str> {
        match self.entries.get(&question) {
            Some(AnswerEntry::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn is_answered(&self, question: Uuid) -> bool {
        match self.entries.get(&question) {
            Some(AnswerEntry::Choices(selected)) => !selected.is_empty(),
            Some(AnswerEntry::Text(text)) => !text.trim().is_empty(),
            Some(AnswerEntry::TextPending) => true,
            None => false,
        }
    }

    pub fn answered_count(&self) -> usize {
        self.entries.keys().filter(|question| self.is_answered(**question)).count()
    }
}
