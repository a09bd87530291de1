use tracing::{debug, error, info, warn};

use crate::{
    action::{Keyboard, OutboundAction},
    adapters::{AdapterError, Adapters},
    event::{Button, EventKind, InboundEvent},
    prompts,
    session::{ChatId, DocumentKind, FileRef, IntakeSession},
    settings::IntakeSettings,
};

/// Where an adapter failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Extraction,
    Conversation,
    Issuance,
}

/// The intake transition table.
///
/// Each call to [`IntakeMachine::transition`] consumes one event for one chat,
/// mutates that chat's session and returns the actions to perform, in order.
/// The caller is responsible for holding the session exclusively.
pub struct IntakeMachine {
    adapters: Adapters,
    settings: IntakeSettings,
}

impl IntakeMachine {
    pub fn new(adapters: Adapters, settings: IntakeSettings) -> Self {
        Self { adapters, settings }
    }

    pub async fn transition(
        &self,
        session: &mut IntakeSession,
        event: &InboundEvent,
    ) -> Vec<OutboundAction> {
        let chat_id = event.chat_id;
        let mut actions = match &event.kind {
            EventKind::Start => vec![OutboundAction::with_keyboard(
                prompts::WELCOME,
                Keyboard::DocumentSelection,
            )],
            EventKind::Text(text) => self.on_text(chat_id, text).await,
            EventKind::Upload(file_ref) => self.on_upload(chat_id, session, file_ref.clone()).await,
            EventKind::Button(button) => self.on_button(chat_id, session, button).await,
        };

        if let Some(interaction_id) = &event.interaction_id {
            actions.push(OutboundAction::AcknowledgeInteraction {
                interaction_id: interaction_id.clone(),
            });
        }
        actions
    }

    async fn on_text(&self, chat_id: ChatId, text: &str) -> Vec<OutboundAction> {
        let reply = match self.adapters.generator.generate(text).await {
            Ok(reply) => reply,
            Err(e) => self
                .on_adapter_failure(chat_id, Stage::Conversation, &e)
                .unwrap_or_default(),
        };
        vec![OutboundAction::text(reply)]
    }

    async fn on_button(
        &self,
        chat_id: ChatId,
        session: &mut IntakeSession,
        button: &Button,
    ) -> Vec<OutboundAction> {
        match button {
            Button::Select(kind) => {
                session.request_upload(*kind);
                vec![OutboundAction::text(prompts::waiting_for(*kind))]
            }
            Button::No => {
                session.reset_documents();
                info!(%chat_id, "extracted data rejected, documents reset");
                vec![OutboundAction::with_keyboard(
                    prompts::DATA_REJECTED,
                    Keyboard::DocumentSelection,
                )]
            }
            Button::Yes => vec![OutboundAction::with_keyboard(
                prompts::price_offer(&self.settings.price),
                Keyboard::PriceConfirmation,
            )],
            Button::NoPrice => vec![OutboundAction::with_keyboard(
                prompts::price_declined(&self.settings.price),
                Keyboard::PriceConfirmation,
            )],
            Button::YesPrice => match self.issue_policy(chat_id, session).await {
                Ok(action) => vec![action],
                Err(e) => self
                    .on_adapter_failure(chat_id, Stage::Issuance, &e)
                    .map(OutboundAction::text)
                    .into_iter()
                    .collect(),
            },
            Button::Unknown(data) => {
                debug!(%chat_id, data = %data, "ignoring unknown button");
                Vec::new()
            }
        }
    }

    async fn on_upload(
        &self,
        chat_id: ChatId,
        session: &mut IntakeSession,
        file_ref: FileRef,
    ) -> Vec<OutboundAction> {
        let Some(kind) = session.accept_upload(file_ref) else {
            debug!(%chat_id, "upload arrived before a document was selected");
            return vec![OutboundAction::text(prompts::SELECT_DOCUMENT_FIRST)];
        };
        info!(%chat_id, ?kind, "document received");

        let mut actions = vec![OutboundAction::text(prompts::received(kind))];
        match session.missing_document() {
            None => {
                let extracted = self.extracted_data(chat_id, session).await;
                actions.push(OutboundAction::with_keyboard(
                    prompts::confirm_data(&extracted),
                    Keyboard::DataConfirmation,
                ));
            }
            Some(missing) => actions.push(OutboundAction::with_keyboard(
                prompts::resend(missing),
                Keyboard::resend(missing),
            )),
        }
        actions
    }

    /// Extracted text for both stored documents, one extraction call each
    async fn extracted_data(&self, chat_id: ChatId, session: &IntakeSession) -> String {
        let (Some(passport), Some(vehicle)) = (
            session.file_ref(DocumentKind::Passport),
            session.file_ref(DocumentKind::VehicleDocument),
        ) else {
            return prompts::MISSING_DOCUMENTS.to_string();
        };

        let passport = self.extract(chat_id, passport).await;
        let vehicle = self.extract(chat_id, vehicle).await;
        prompts::extracted_data(&passport, &vehicle)
    }

    async fn extract(&self, chat_id: ChatId, file_ref: &FileRef) -> String {
        match self.adapters.extractor.extract(file_ref).await {
            Ok(text) => text,
            Err(e) => self
                .on_adapter_failure(chat_id, Stage::Extraction, &e)
                .unwrap_or_default(),
        }
    }

    async fn issue_policy(
        &self,
        chat_id: ChatId,
        session: &IntakeSession,
    ) -> Result<OutboundAction, AdapterError> {
        let extracted = self.extracted_data(chat_id, session).await;
        let policy_text = self
            .adapters
            .generator
            .generate(&prompts::policy_instruction(&extracted))
            .await?;

        let output_path = self.settings.policy_path(chat_id);
        let path = self
            .adapters
            .renderer
            .render(&policy_text, &output_path)
            .await?;

        info!(%chat_id, path = %path.display(), "policy issued");
        Ok(OutboundAction::SendDocument {
            path,
            caption: prompts::POLICY_CAPTION.to_string(),
        })
    }

    /// Single place that decides what the user sees when an adapter fails.
    ///
    /// Returns the replacement text, or `None` when the failure stays silent.
    fn on_adapter_failure(
        &self,
        chat_id: ChatId,
        stage: Stage,
        error: &AdapterError,
    ) -> Option<String> {
        match stage {
            Stage::Extraction => {
                warn!(%chat_id, error = %error, "document extraction failed");
                Some(prompts::EXTRACTION_PLACEHOLDER.to_string())
            }
            Stage::Conversation => {
                warn!(%chat_id, error = %error, "text generation failed");
                Some(prompts::generation_error(error))
            }
            Stage::Issuance => {
                error!(
                    %chat_id,
                    error = %error,
                    event = "policy_issuance_failed",
                    notified = self.settings.notify_issuance_failure,
                    "policy issuance failed"
                );
                self.settings
                    .notify_issuance_failure
                    .then(|| prompts::ISSUANCE_FAILED.to_string())
            }
        }
    }
}
