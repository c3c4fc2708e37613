//! Per-request moderation outcome
//!
//! One `ModerationOutcome` is created at the start of an orchestration run,
//! filled in as the steps complete, and consumed once to build the
//! moderator-facing summary and the audit record. Partial failure is the
//! normal case here: every step leaves its own mark regardless of what the
//! other steps did.

use crate::moderation::platform::MessageRef;
use crate::moderation::policy::PunishmentTier;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// What happened to the linked message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// No message link was supplied
    NotRequested,
    Deleted,
    /// Deletion was attempted (or pre-empted) and failed, with the reason
    Failed(String),
}

/// What happened when the punishment was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PunishmentOutcome {
    pub tier: PunishmentTier,
    pub applied: bool,
    /// Expiry instant for timed tiers
    pub until: Option<DateTime<Utc>>,
    /// Platform error string when `applied` is false
    pub error: Option<String>,
}

/// Aggregated result of one moderation action
#[derive(Debug, Clone)]
pub struct ModerationOutcome {
    /// Case id, also stamped on the audit record
    pub case_id: Uuid,
    pub guild_id: u64,
    pub target_id: u64,
    pub moderator_id: u64,
    pub rule: String,
    pub note: Option<String>,
    pub message_ref: Option<MessageRef>,
    pub deletion: DeletionOutcome,
    pub punishment: Option<PunishmentOutcome>,
    /// Whether the explanation DM reached the user
    pub notified: bool,
    /// Offense count after this strike; `None` for the quick action
    pub offense_count: Option<u64>,
}

impl ModerationOutcome {
    pub fn new(guild_id: u64, target_id: u64, moderator_id: u64, rule: impl Into<String>) -> Self {
        Self {
            case_id: Uuid::new_v4(),
            guild_id,
            target_id,
            moderator_id,
            rule: rule.into(),
            note: None,
            message_ref: None,
            deletion: DeletionOutcome::NotRequested,
            punishment: None,
            notified: false,
            offense_count: None,
        }
    }

    /// Rule plus the optional note, as written to audit-log reasons
    #[must_use]
    pub fn reason(&self) -> String {
        match &self.note {
            Some(note) => format!("{} — {}", self.rule, note),
            None => self.rule.clone(),
        }
    }

    /// Itemized per-step report for the moderator
    #[must_use]
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        match &self.deletion {
            DeletionOutcome::NotRequested => {}
            DeletionOutcome::Deleted => lines.push("• Message: **deleted**".to_string()),
            DeletionOutcome::Failed(reason) => {
                lines.push(format!("• Message: could not be deleted ({reason})"));
            }
        }

        if let Some(punishment) = &self.punishment {
            let offense = self
                .offense_count
                .map(|count| format!(" (offense #{count})"))
                .unwrap_or_default();
            match punishment.tier {
                PunishmentTier::Warning => {
                    lines.push(format!("• Warning: **issued**{offense}"));
                }
                PunishmentTier::TimeoutShort | PunishmentTier::TimeoutLong => {
                    if punishment.applied {
                        let until = punishment
                            .until
                            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                            .unwrap_or_default();
                        lines.push(format!("• Timeout: **applied** until {until}{offense}"));
                    } else {
                        let error = punishment.error.as_deref().unwrap_or("unknown error");
                        lines.push(format!("• Timeout: **failed** ({error}){offense}"));
                    }
                }
                PunishmentTier::Ban => {
                    if punishment.applied {
                        lines.push(format!("• Ban: **applied**{offense}"));
                    } else {
                        let error = punishment.error.as_deref().unwrap_or("unknown error");
                        lines.push(format!("• Ban: **failed** ({error}){offense}"));
                    }
                }
            }
        }

        lines.push(format!(
            "• DM to user: {}",
            if self.notified {
                "sent"
            } else {
                "not delivered (DMs closed?)"
            }
        ));
        lines.push(format!("• Reason/Audit: {}", self.reason()));

        lines
    }

    /// Full summary text
    #[must_use]
    pub fn summary(&self) -> String {
        self.summary_lines().join("\n")
    }

    /// Ordered fields for the audit embed
    #[must_use]
    pub fn audit_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("Case".to_string(), self.case_id.to_string()),
            ("Rule".to_string(), self.rule.clone()),
        ];
        if let Some(note) = &self.note {
            fields.push(("Note".to_string(), note.clone()));
        }

        let deletion = match &self.deletion {
            DeletionOutcome::NotRequested => "not requested".to_string(),
            DeletionOutcome::Deleted => "deleted".to_string(),
            DeletionOutcome::Failed(reason) => format!("failed: {reason}"),
        };
        fields.push(("Message".to_string(), deletion));

        if let Some(punishment) = &self.punishment {
            let applied = if punishment.applied {
                "applied".to_string()
            } else {
                format!(
                    "failed: {}",
                    punishment.error.as_deref().unwrap_or("unknown error")
                )
            };
            fields.push((
                "Punishment".to_string(),
                format!("{} — {}", punishment.tier, applied),
            ));
        }
        if let Some(count) = self.offense_count {
            fields.push(("Offense count".to_string(), count.to_string()));
        }
        fields.push((
            "User notified".to_string(),
            if self.notified { "yes" } else { "no" }.to_string(),
        ));

        fields
    }
}
