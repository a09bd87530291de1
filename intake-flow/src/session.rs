use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of the chat a session belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// The two documents the intake flow collects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    Passport,
    VehicleDocument,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 2] = [DocumentKind::Passport, DocumentKind::VehicleDocument];

    /// Value carried by the selection buttons
    pub fn callback_data(self) -> &'static str {
        match self {
            DocumentKind::Passport => "Passport",
            DocumentKind::VehicleDocument => "Vehicle identification document",
        }
    }

    pub fn from_callback_data(data: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.callback_data() == data)
    }

    pub fn label(self) -> &'static str {
        match self {
            DocumentKind::Passport => "passport",
            DocumentKind::VehicleDocument => "vehicle identification document",
        }
    }
}

/// Which upload the session currently expects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitingFor {
    #[default]
    None,
    Passport,
    VehicleDocument,
}

impl WaitingFor {
    pub fn kind(self) -> Option<DocumentKind> {
        match self {
            WaitingFor::None => None,
            WaitingFor::Passport => Some(DocumentKind::Passport),
            WaitingFor::VehicleDocument => Some(DocumentKind::VehicleDocument),
        }
    }
}

impl From<DocumentKind> for WaitingFor {
    fn from(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Passport => WaitingFor::Passport,
            DocumentKind::VehicleDocument => WaitingFor::VehicleDocument,
        }
    }
}

/// Opaque transport reference to an uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileRef(String);

impl FileRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileRef {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for FileRef {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Coarse progress of a session, derived from its stored fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IntakePhase {
    AwaitingSelection,
    AwaitingUpload(DocumentKind),
    BothReceived,
}

/// Per-user intake state.
///
/// Fields are only changed through the mutators below so that a received
/// flag is never set without its file reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeSession {
    waiting_for: WaitingFor,
    passport_received: bool,
    vehicle_document_received: bool,
    passport_file_ref: Option<FileRef>,
    vehicle_file_ref: Option<FileRef>,
}

impl IntakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waiting_for(&self) -> WaitingFor {
        self.waiting_for
    }

    pub fn passport_received(&self) -> bool {
        self.passport_received
    }

    pub fn vehicle_document_received(&self) -> bool {
        self.vehicle_document_received
    }

    pub fn received(&self, kind: DocumentKind) -> bool {
        match kind {
            DocumentKind::Passport => self.passport_received,
            DocumentKind::VehicleDocument => self.vehicle_document_received,
        }
    }

    pub fn file_ref(&self, kind: DocumentKind) -> Option<&FileRef> {
        match kind {
            DocumentKind::Passport => self.passport_file_ref.as_ref(),
            DocumentKind::VehicleDocument => self.vehicle_file_ref.as_ref(),
        }
    }

    /// Mark `kind` as the next expected upload. Overwrites any previous choice.
    pub fn request_upload(&mut self, kind: DocumentKind) {
        self.waiting_for = kind.into();
    }

    /// Store an upload against the expected kind.
    ///
    /// Returns `None` without touching the session when nothing is expected.
    /// Uploading the same kind twice keeps the last file.
    pub fn accept_upload(&mut self, file_ref: FileRef) -> Option<DocumentKind> {
        let kind = self.waiting_for.kind()?;
        match kind {
            DocumentKind::Passport => {
                self.passport_received = true;
                self.passport_file_ref = Some(file_ref);
            }
            DocumentKind::VehicleDocument => {
                self.vehicle_document_received = true;
                self.vehicle_file_ref = Some(file_ref);
            }
        }
        self.waiting_for = WaitingFor::None;
        Some(kind)
    }

    pub fn reset_documents(&mut self) {
        *self = Self::default();
    }

    pub fn both_received(&self) -> bool {
        self.passport_received && self.vehicle_document_received
    }

    /// First document still missing, passport before vehicle document
    pub fn missing_document(&self) -> Option<DocumentKind> {
        DocumentKind::ALL
            .into_iter()
            .find(|kind| !self.received(*kind))
    }

    pub fn phase(&self) -> IntakePhase {
        if let Some(kind) = self.waiting_for.kind() {
            IntakePhase::AwaitingUpload(kind)
        } else if self.both_received() {
            IntakePhase::BothReceived
        } else {
            IntakePhase::AwaitingSelection
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_awaiting_selection() {
        let session = IntakeSession::new();
        assert_eq!(session.waiting_for(), WaitingFor::None);
        assert!(!session.passport_received());
        assert!(!session.vehicle_document_received());
        assert_eq!(session.phase(), IntakePhase::AwaitingSelection);
    }

    #[test]
    fn upload_without_expectation_is_ignored() {
        let mut session = IntakeSession::new();
        assert_eq!(session.accept_upload(FileRef::new("f1")), None);
        assert_eq!(session, IntakeSession::new());
    }

    #[test]
    fn accepted_upload_sets_flag_and_reference() {
        let mut session = IntakeSession::new();
        session.request_upload(DocumentKind::VehicleDocument);
        assert_eq!(
            session.phase(),
            IntakePhase::AwaitingUpload(DocumentKind::VehicleDocument)
        );

        let kind = session.accept_upload(FileRef::new("veh"));
        assert_eq!(kind, Some(DocumentKind::VehicleDocument));
        assert!(session.vehicle_document_received());
        assert_eq!(
            session.file_ref(DocumentKind::VehicleDocument).map(FileRef::as_str),
            Some("veh")
        );
        assert_eq!(session.waiting_for(), WaitingFor::None);
        assert_eq!(session.missing_document(), Some(DocumentKind::Passport));
    }

    #[test]
    fn reset_clears_references() {
        let mut session = IntakeSession::new();
        for kind in DocumentKind::ALL {
            session.request_upload(kind);
            session.accept_upload(FileRef::new(kind.callback_data()));
        }
        assert_eq!(session.phase(), IntakePhase::BothReceived);

        session.reset_documents();
        assert_eq!(session, IntakeSession::new());
        assert!(session.file_ref(DocumentKind::Passport).is_none());
    }

    #[test]
    fn callback_data_round_trips() {
        assert_eq!(
            DocumentKind::from_callback_data("Vehicle identification document"),
            Some(DocumentKind::VehicleDocument)
        );
        assert_eq!(DocumentKind::from_callback_data("Yes"), None);
    }

    #[test]
    fn snapshot_serializes_plain_fields() {
        let mut session = IntakeSession::new();
        session.request_upload(DocumentKind::Passport);
        session.accept_upload(FileRef::new("AgADBAAD"));

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["waiting_for"], "None");
        assert_eq!(json["passport_received"], true);
        assert_eq!(json["passport_file_ref"], "AgADBAAD");
        assert!(json["vehicle_file_ref"].is_null());

        let restored: IntakeSession = serde_json::from_value(json).unwrap();
        assert_eq!(restored, session);
    }
}
