use thiserror::Error;

use crate::session::ChatId;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Session for chat {0} is busy, try again")]
    SessionUnavailable(ChatId),
}

pub type Result<T> = std::result::Result<T, IntakeError>;
