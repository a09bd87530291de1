//! Routes inbound events to the intake runner and performs the resulting actions.
//!
//! Every chat gets its own queue and worker task, so actions for one chat go
//! out in the order its events arrived while other chats proceed in parallel.
//! A worker that sees no events for the idle timeout removes its queue and
//! exits; the next event for that chat starts a new one.

use async_trait::async_trait;
use dashmap::DashMap;
use intake_flow::{ChatId, InboundEvent, IntakeRunner, OutboundAction};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::telegram::TelegramClient;

pub const DEFAULT_WORKER_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Somewhere outbound actions can be delivered
#[async_trait]
pub trait ActionSink: Send + Sync {
    async fn perform(&self, chat_id: ChatId, action: &OutboundAction) -> anyhow::Result<()>;
}

#[async_trait]
impl ActionSink for TelegramClient {
    async fn perform(&self, chat_id: ChatId, action: &OutboundAction) -> anyhow::Result<()> {
        match action {
            OutboundAction::SendText { text } => self.send_message(chat_id, text, None).await?,
            OutboundAction::SendTextWithKeyboard { text, keyboard } => {
                self.send_message(chat_id, text, Some(*keyboard)).await?
            }
            OutboundAction::SendDocument { path, caption } => {
                self.send_document(chat_id, path, caption).await?
            }
            OutboundAction::AcknowledgeInteraction { interaction_id } => {
                self.answer_callback_query(interaction_id).await?
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    runner: IntakeRunner,
    sink: Arc<dyn ActionSink>,
    queues: Arc<DashMap<ChatId, mpsc::UnboundedSender<InboundEvent>>>,
    idle_timeout: Duration,
}

impl Dispatcher {
    pub fn new(runner: IntakeRunner, sink: Arc<dyn ActionSink>) -> Self {
        Self {
            runner,
            sink,
            queues: Arc::new(DashMap::new()),
            idle_timeout: DEFAULT_WORKER_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Apply one event and deliver its actions, in order.
    ///
    /// A failed delivery is logged and the remaining actions are still attempted;
    /// the session has already moved on by then.
    pub async fn dispatch(&self, event: InboundEvent) {
        let correlation_id = Uuid::new_v4();
        let span = info_span!(
            "dispatch",
            %correlation_id,
            chat_id = %event.chat_id,
            event = event.name()
        );

        async {
            let chat_id = event.chat_id;
            let actions = match self.runner.handle(event).await {
                Ok(actions) => actions,
                Err(e) => {
                    error!(error = %e, "failed to apply event");
                    return;
                }
            };

            for action in &actions {
                if let Err(e) = self.sink.perform(chat_id, action).await {
                    warn!(error = %e, action = action.kind(), "failed to deliver action");
                }
            }
            info!(actions = actions.len(), "event dispatched");
        }
        .instrument(span)
        .await
    }

    /// Queue an event behind any earlier ones from the same chat
    pub fn submit(&self, event: InboundEvent) {
        let chat_id = event.chat_id;
        // The send happens under the entry lock, the same lock an idle worker
        // takes to remove itself, so no event lands in a queue nobody reads.
        let mut sender = self
            .queues
            .entry(chat_id)
            .or_insert_with(|| self.spawn_worker(chat_id));

        if let Err(mpsc::error::SendError(event)) = sender.send(event) {
            warn!(%chat_id, "chat worker died, starting a new one");
            *sender = self.spawn_worker(chat_id);
            if sender.send(event).is_err() {
                error!(%chat_id, "failed to queue event");
            }
        }
    }

    fn spawn_worker(&self, chat_id: ChatId) -> mpsc::UnboundedSender<InboundEvent> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = self.clone();
        tokio::spawn(async move {
            loop {
                match tokio::time::timeout(dispatcher.idle_timeout, rx.recv()).await {
                    Ok(Some(event)) => dispatcher.dispatch(event).await,
                    Ok(None) => break,
                    Err(_) => {
                        let removed = dispatcher
                            .queues
                            .remove_if(&chat_id, |_, _| rx.is_empty())
                            .is_some();
                        if removed {
                            break;
                        }
                    }
                }
            }
            debug!(%chat_id, "chat worker stopped");
        });
        tx
    }

    /// Drain a transport's event stream until it closes
    pub async fn run(self, mut rx: mpsc::Receiver<InboundEvent>) {
        while let Some(event) = rx.recv().await {
            self.submit(event);
        }
        info!("inbound event stream closed");
    }

    /// Chats that currently have a worker
    pub fn active_chats(&self) -> usize {
        self.queues.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_flow::{
        AdapterError, Adapters, DocumentExtractor, DocumentRenderer, FileRef, InMemorySessionStore,
        IntakeMachine, IntakeSettings, Keyboard, TextGenerator,
    };
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::time::Duration;

    struct SlowExtractor;

    #[async_trait]
    impl DocumentExtractor for SlowExtractor {
        async fn extract(&self, file_ref: &FileRef) -> Result<String, AdapterError> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(format!("text of {file_ref}"))
        }
    }

    struct EchoGenerator;

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(&self, instruction: &str) -> Result<String, AdapterError> {
            Ok(format!("reply to {instruction}"))
        }
    }

    struct PathRenderer;

    #[async_trait]
    impl DocumentRenderer for PathRenderer {
        async fn render(&self, _text: &str, output_path: &Path) -> Result<PathBuf, AdapterError> {
            Ok(output_path.to_path_buf())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(ChatId, OutboundAction)>>,
        fail_acks: bool,
    }

    impl RecordingSink {
        fn sent_to(&self, chat_id: ChatId) -> Vec<OutboundAction> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(chat, _)| *chat == chat_id)
                .map(|(_, action)| action.clone())
                .collect()
        }
    }

    #[async_trait]
    impl ActionSink for RecordingSink {
        async fn perform(&self, chat_id: ChatId, action: &OutboundAction) -> anyhow::Result<()> {
            if self.fail_acks && matches!(action, OutboundAction::AcknowledgeInteraction { .. }) {
                anyhow::bail!("callback query expired");
            }
            self.sent.lock().unwrap().push((chat_id, action.clone()));
            Ok(())
        }
    }

    fn dispatcher(sink: Arc<RecordingSink>) -> Dispatcher {
        let adapters = Adapters::new(
            Arc::new(SlowExtractor),
            Arc::new(EchoGenerator),
            Arc::new(PathRenderer),
        );
        let machine = Arc::new(IntakeMachine::new(adapters, IntakeSettings::default()));
        let runner = IntakeRunner::new(machine, Arc::new(InMemorySessionStore::new()));
        Dispatcher::new(runner, sink)
    }

    #[tokio::test]
    async fn dispatch_delivers_actions_in_order() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = dispatcher(sink.clone());
        let chat = ChatId(1);

        dispatcher
            .dispatch(InboundEvent::button(chat, "Passport").with_interaction("cb-1"))
            .await;

        let sent = sink.sent_to(chat);
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].keyboard(), None);
        assert_eq!(
            sent[1],
            OutboundAction::AcknowledgeInteraction {
                interaction_id: "cb-1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn delivery_failure_does_not_stop_later_actions() {
        let sink = Arc::new(RecordingSink {
            fail_acks: true,
            ..Default::default()
        });
        let dispatcher = dispatcher(sink.clone());
        let chat = ChatId(2);

        dispatcher
            .dispatch(InboundEvent::button(chat, "Passport").with_interaction("cb-1"))
            .await;
        dispatcher.dispatch(InboundEvent::upload(chat, "file-1")).await;

        let sent = sink.sent_to(chat);
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[2].keyboard(), Some(Keyboard::SendVehicleDocument));
    }

    #[tokio::test]
    async fn idle_worker_is_removed_and_restarted_on_demand() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = dispatcher(sink.clone()).with_idle_timeout(Duration::from_millis(30));
        let chat = ChatId(3);

        dispatcher.submit(InboundEvent::button(chat, "Passport"));
        assert_eq!(dispatcher.active_chats(), 1);

        for _ in 0..100 {
            if dispatcher.active_chats() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(dispatcher.active_chats(), 0);
        assert_eq!(sink.sent_to(chat).len(), 1);

        dispatcher.submit(InboundEvent::upload(chat, "passport"));
        for _ in 0..100 {
            if sink.sent_to(chat).len() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let sent = sink.sent_to(chat);
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[2].keyboard(), Some(Keyboard::SendVehicleDocument));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn queued_events_keep_per_chat_order() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = dispatcher(sink.clone());
        let (tx, rx) = mpsc::channel(64);
        let run = tokio::spawn(dispatcher.clone().run(rx));

        for user in 0..5 {
            let chat = ChatId(user);
            tx.send(InboundEvent::button(chat, "Passport")).await.unwrap();
            tx.send(InboundEvent::upload(chat, "passport")).await.unwrap();
            tx.send(InboundEvent::button(chat, "Vehicle identification document"))
                .await
                .unwrap();
            tx.send(InboundEvent::upload(chat, "vehicle")).await.unwrap();
        }
        drop(tx);
        run.await.unwrap();

        for _ in 0..200 {
            if (0..5).all(|user| sink.sent_to(ChatId(user)).len() == 6) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(dispatcher.active_chats(), 5);
        for user in 0..5 {
            let sent = sink.sent_to(ChatId(user));
            assert_eq!(sent.len(), 6, "chat {user}");
            assert_eq!(sent[2].keyboard(), Some(Keyboard::SendVehicleDocument));
            assert_eq!(sent[5].keyboard(), Some(Keyboard::DataConfirmation));
        }
    }
}
