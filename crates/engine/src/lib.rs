pub mod runner;

pub use runner::*;

use tokio::task::JoinError;

/// Errors surfaced when collecting an average task.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Average task panicked: {0}")]
    TaskPanicked(String),
    #[error("Average task was aborted")]
    TaskAborted,
}

impl From<JoinError> for EngineError {
    fn from(err: JoinError) -> Self {
        if err.is_panic() {
            EngineError::TaskPanicked(err.to_string())
        } else {
            EngineError::TaskAborted
        }
    }
}
