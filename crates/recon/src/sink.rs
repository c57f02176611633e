//! Audit-trail messages. The engine only knows the [`MessageSink`] trait;
//! how messages are shown or stored is up to the caller.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Error,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub level: Level,
    pub text: String,
}

pub trait MessageSink {
    fn add_info_message(&mut self, text: String);
    fn add_error_message(&mut self, text: String);
}

/// Ordered in-memory message trail.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn infos(&self) -> impl Iterator<Item = &str> {
        self.by_level(Level::Info)
    }

    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.by_level(Level::Error)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    fn by_level(&self, level: Level) -> impl Iterator<Item = &str> {
        self.messages
            .iter()
            .filter(move |m| m.level == level)
            .map(|m| m.text.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}

impl MessageSink for MessageLog {
    fn add_info_message(&mut self, text: String) {
        self.messages.push(Message { level: Level::Info, text });
    }

    fn add_error_message(&mut self, text: String) {
        self.messages.push(Message { level: Level::Error, text });
    }
}
