//! Moderation system for Strike Warden
//!
//! Offense tracking, escalation policy, and the orchestrator that applies
//! punishments with per-step fault isolation. Discord access goes through
//! the [`ModPlatform`] capability trait so the core stays testable.

mod error;
mod ledger;
mod notice;
mod orchestrator;
mod outcome;
mod platform;
mod policy;

pub use error::{ModerationError, ModerationResult};
pub use ledger::{FileLedger, LedgerError, OffenseLedger};
pub use notice::{format_notice, pretty_duration};
pub use orchestrator::{Authorization, Orchestrator, QuickActionRequest, StrikeRequest};
pub use outcome::{DeletionOutcome, ModerationOutcome, PunishmentOutcome};
pub use platform::{DeleteError, HttpPlatform, LinkParseError, MessageRef, ModPlatform};
pub use policy::{EscalationPolicy, PunishmentTier};
