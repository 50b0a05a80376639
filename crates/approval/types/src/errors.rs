//! Error types for the approval layer

use crate::{ChainId, RequestId, RequestStatus, UserId};

/// Errors that can occur in approval operations
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    #[error("approval chain not found: {0}")]
    ChainNotFound(ChainId),

    #[error("approval request not found: {0}")]
    RequestNotFound(RequestId),

    #[error("level {order} not found in chain {chain}")]
    LevelNotFound { chain: ChainId, order: u32 },

    #[error("cannot {operation} a request that is {status}")]
    InvalidState {
        operation: &'static str,
        status: RequestStatus,
    },

    #[error("user {user} already approved at level {level}")]
    AlreadyVoted { user: UserId, level: u32 },

    #[error("chain must define at least one level")]
    EmptyChain,

    #[error("duplicate level order: {0}")]
    DuplicateLevelOrder(u32),

    #[error("level orders must be positive")]
    InvalidLevelOrder,

    #[error("required approvals must be positive at level {0}")]
    InvalidQuorum(u32),

    #[error("chain {0} still has open requests")]
    ChainInUse(ChainId),

    #[error("storage error: {0}")]
    Store(String),
}

/// Result type alias for approval operations
pub type ApprovalResult<T> = Result<T, ApprovalError>;
