use thiserror::Error;

/// Why a join attempt was abandoned
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JoinFailure {
    #[error("browser sandbox unavailable: {0}")]
    Sandbox(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("not admitted from the waiting room within {secs}s")]
    WaitingRoomTimeout { secs: u64 },

    #[error("no in-meeting indicator within {secs}s")]
    ConfirmationTimeout { secs: u64 },

    #[error("page became unreachable: {0}")]
    Page(String),

    #[error("session ended before the bot got in")]
    Cancelled,
}

#[derive(Error, Debug, Clone)]
pub enum BotError {
    #[error("Failed to join meeting: {0}")]
    JoinFailed(#[from] JoinFailure),

    #[error("Failed to start audio capture: {0}")]
    Capture(String),

    #[error("Bot has already been started")]
    AlreadyStarted,

    #[error("Session ended without a recording: {0}")]
    NoRecording(String),
}

impl BotError {
    pub fn is_join_failure(&self) -> bool {
        matches!(self, BotError::JoinFailed(_))
    }
}
