use camino::Utf8PathBuf;
use docfix_edit::EditError;
use docfix_types::summary::{FatalCause, FatalKind};
use thiserror::Error;

/// Conditions that end a session before its queue is exhausted.
///
/// Per-issue skips and detector failures are not errors; they are recorded
/// in the decision log and the session summary.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{path} is already being edited by another session")]
    LockContention { path: Utf8PathBuf },

    #[error("failed to read {path}: {source:#}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to write {path}: {source:#}")]
    Persist {
        path: Utf8PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to record decision: {0:#}")]
    DecisionLog(#[source] anyhow::Error),

    #[error("approval gate failed: {0:#}")]
    Approval(#[source] anyhow::Error),

    #[error("approved edit could not be applied: {0}")]
    Edit(#[source] EditError),

    #[error("session cancelled")]
    Cancelled,
}

impl SessionError {
    pub fn kind(&self) -> FatalKind {
        match self {
            SessionError::LockContention { .. } => FatalKind::LockContention,
            SessionError::Read { .. } => FatalKind::ReadFailure,
            SessionError::Persist { .. } => FatalKind::PersistenceFailure,
            SessionError::DecisionLog(_) => FatalKind::DecisionLogFailure,
            SessionError::Approval(_) => FatalKind::ApprovalFailure,
            SessionError::Edit(_) => FatalKind::InvalidEdit,
            SessionError::Cancelled => FatalKind::Cancelled,
        }
    }

    pub fn to_cause(&self) -> FatalCause {
        FatalCause {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}
