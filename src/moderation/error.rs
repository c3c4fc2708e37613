//! Error types for the moderation system
//!
//! Only two failure categories abort a moderation run: a failed
//! authorization gate and an unavailable offense ledger. Every other
//! step failure is captured inside the request's outcome instead.

use crate::moderation::ledger::LedgerError;
use thiserror::Error;

/// Fatal errors for a moderation run
#[derive(Debug, Error)]
pub enum ModerationError {
    /// Actor lacks the moderation capability or the hierarchy check failed.
    /// The message is what the moderator sees; no side effects were performed.
    #[error("{0}")]
    Unauthorized(String),

    /// The offense ledger could not record the strike. The escalation tier
    /// cannot be computed without the count, so the request is aborted.
    #[error("offense ledger unavailable: {0}")]
    Ledger(#[from] LedgerError),
}

/// Result type for moderation operations
pub type ModerationResult<T> = Result<T, ModerationError>;
