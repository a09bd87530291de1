pub mod action;
pub mod adapters;
pub mod error;
pub mod event;
pub mod machine;
pub mod prompts;
pub mod runner;
pub mod session;
pub mod settings;
pub mod storage;

// Re-export commonly used types
pub use action::{Keyboard, KeyboardButton, OutboundAction};
pub use adapters::{AdapterError, Adapters, DocumentExtractor, DocumentRenderer, TextGenerator};
pub use error::{IntakeError, Result};
pub use event::{Button, EventKind, InboundEvent};
pub use machine::IntakeMachine;
pub use runner::IntakeRunner;
pub use session::{ChatId, DocumentKind, FileRef, IntakePhase, IntakeSession, WaitingFor};
pub use settings::{IntakeSettings, Price};
pub use storage::{InMemorySessionStore, SessionGuard, SessionStore};
