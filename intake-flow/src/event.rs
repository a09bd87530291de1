use serde::{Deserialize, Serialize};

use crate::session::{ChatId, DocumentKind, FileRef};

pub const START_COMMAND: &str = "/start";

/// Inline button values the flow understands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Button {
    Select(DocumentKind),
    Yes,
    No,
    YesPrice,
    NoPrice,
    Unknown(String),
}

impl Button {
    pub fn parse(data: &str) -> Self {
        if let Some(kind) = DocumentKind::from_callback_data(data) {
            return Button::Select(kind);
        }
        match data {
            "Yes" => Button::Yes,
            "No" => Button::No,
            "YesPrice" => Button::YesPrice,
            "NoPrice" => Button::NoPrice,
            other => Button::Unknown(other.to_string()),
        }
    }

    pub fn callback_data(&self) -> &str {
        match self {
            Button::Select(kind) => kind.callback_data(),
            Button::Yes => "Yes",
            Button::No => "No",
            Button::YesPrice => "YesPrice",
            Button::NoPrice => "NoPrice",
            Button::Unknown(data) => data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Start,
    Text(String),
    Upload(FileRef),
    Button(Button),
}

/// One inbound event for a single chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub chat_id: ChatId,
    pub kind: EventKind,
    /// Set for button presses that must be acknowledged back to the transport
    pub interaction_id: Option<String>,
}

impl InboundEvent {
    pub fn new(chat_id: ChatId, kind: EventKind) -> Self {
        Self {
            chat_id,
            kind,
            interaction_id: None,
        }
    }

    pub fn start(chat_id: ChatId) -> Self {
        Self::new(chat_id, EventKind::Start)
    }

    /// Text message; the start command becomes a `Start` event
    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim() == START_COMMAND {
            Self::start(chat_id)
        } else {
            Self::new(chat_id, EventKind::Text(text))
        }
    }

    pub fn upload(chat_id: ChatId, file_ref: impl Into<FileRef>) -> Self {
        Self::new(chat_id, EventKind::Upload(file_ref.into()))
    }

    pub fn button(chat_id: ChatId, data: &str) -> Self {
        Self::new(chat_id, EventKind::Button(Button::parse(data)))
    }

    pub fn with_interaction(mut self, interaction_id: impl Into<String>) -> Self {
        self.interaction_id = Some(interaction_id.into());
        self
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match &self.kind {
            EventKind::Start => "start",
            EventKind::Text(_) => "text",
            EventKind::Upload(_) => "upload",
            EventKind::Button(Button::Select(_)) => "selection",
            EventKind::Button(Button::Yes | Button::No) => "data_confirmation",
            EventKind::Button(Button::YesPrice | Button::NoPrice) => "price_confirmation",
            EventKind::Button(Button::Unknown(_)) => "unknown_button",
        }
    }
}
