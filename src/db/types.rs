use serde::{Deserialize, Serialize};

/// Who produced a turn of an oral-response session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Sender {
    User,
    Ai,
}

impl Sender {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::User => "Student",
            Self::Ai => "Examiner",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TranscriptTurn {
    pub(crate) sender: Sender,
    pub(crate) text: String,
}

#[cfg(test)]
impl TranscriptTurn {
    pub(crate) fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self { sender, text: text.into() }
    }
}
