use serde::Serialize;
use std::path::PathBuf;

use crate::session::DocumentKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyboardButton {
    pub label: &'static str,
    pub callback_data: &'static str,
}

impl KeyboardButton {
    const fn new(label: &'static str, callback_data: &'static str) -> Self {
        Self {
            label,
            callback_data,
        }
    }
}

/// The only button sets the flow ever offers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Keyboard {
    /// Passport / vehicle document selection
    DocumentSelection,
    SendPassport,
    SendVehicleDocument,
    /// Yes / No on the extracted data
    DataConfirmation,
    /// YesPrice / NoPrice on the fixed price
    PriceConfirmation,
}

impl Keyboard {
    pub fn resend(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Passport => Keyboard::SendPassport,
            DocumentKind::VehicleDocument => Keyboard::SendVehicleDocument,
        }
    }

    pub fn buttons(self) -> Vec<KeyboardButton> {
        let passport = DocumentKind::Passport.callback_data();
        let vehicle = DocumentKind::VehicleDocument.callback_data();
        match self {
            Keyboard::DocumentSelection => vec![
                KeyboardButton::new("Passport", passport),
                KeyboardButton::new("Vehicle identification document", vehicle),
            ],
            Keyboard::SendPassport => vec![KeyboardButton::new("Send passport", passport)],
            Keyboard::SendVehicleDocument => vec![KeyboardButton::new(
                "Send vehicle identification document",
                vehicle,
            )],
            Keyboard::DataConfirmation => vec![
                KeyboardButton::new("Yes", "Yes"),
                KeyboardButton::new("No", "No"),
            ],
            Keyboard::PriceConfirmation => vec![
                KeyboardButton::new("Yes", "YesPrice"),
                KeyboardButton::new("No", "NoPrice"),
            ],
        }
    }

    pub fn callback_values(self) -> Vec<&'static str> {
        self.buttons()
            .into_iter()
            .map(|button| button.callback_data)
            .collect()
    }
}

/// What the transport should do next, in emission order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OutboundAction {
    SendText {
        text: String,
    },
    SendTextWithKeyboard {
        text: String,
        keyboard: Keyboard,
    },
    SendDocument {
        path: PathBuf,
        caption: String,
    },
    AcknowledgeInteraction {
        interaction_id: String,
    },
}

impl OutboundAction {
    pub fn text(text: impl Into<String>) -> Self {
        OutboundAction::SendText { text: text.into() }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        OutboundAction::SendTextWithKeyboard {
            text: text.into(),
            keyboard,
        }
    }

    pub fn keyboard(&self) -> Option<Keyboard> {
        match self {
            OutboundAction::SendTextWithKeyboard { keyboard, .. } => Some(*keyboard),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OutboundAction::SendText { .. } => "send_text",
            OutboundAction::SendTextWithKeyboard { .. } => "send_text_with_keyboard",
            OutboundAction::SendDocument { .. } => "send_document",
            OutboundAction::AcknowledgeInteraction { .. } => "acknowledge_interaction",
        }
    }
}
