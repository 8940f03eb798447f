//! Speech-to-text as a side input for event notes.
//!
//! A recognizer runs elsewhere and reports over a channel; this module only
//! folds its messages into the notes draft the operator is editing.

use tokio::sync::mpsc;

use crate::util::normalize_text_option;

/// Messages from a speech recognizer session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictationEvent {
    Started,
    Transcript(String),
    Ended,
}

/// Notes text being composed, by typing and by dictation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotesDraft {
    text: String,
    listening: bool,
}

impl NotesDraft {
    pub fn new(initial: Option<String>) -> Self {
        Self {
            text: normalize_text_option(initial).unwrap_or_default(),
            listening: false,
        }
    }

    /// Append a fragment, separated from existing text by one space.
    pub fn push_text(&mut self, fragment: &str) {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(fragment);
    }

    pub fn apply(&mut self, event: DictationEvent) {
        match event {
            DictationEvent::Started => self.listening = true,
            DictationEvent::Transcript(fragment) => self.push_text(&fragment),
            DictationEvent::Ended => self.listening = false,
        }
    }

    /// Fold recognizer messages into the draft until the session ends or the
    /// sender goes away.
    pub async fn collect(&mut self, events: &mut mpsc::Receiver<DictationEvent>) {
        while let Some(event) = events.recv().await {
            let ended = event == DictationEvent::Ended;
            self.apply(event);
            if ended {
                return;
            }
        }
        self.listening = false;
    }

    pub const fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_notes(self) -> Option<String> {
        normalize_text_option(Some(self.text))
    }
}
