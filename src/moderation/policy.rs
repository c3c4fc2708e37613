//! Punishment policy
//!
//! Maps an offense count to a punishment tier through a small ordered
//! escalation table. The mapping is total: any count past the end of the
//! table resolves to the most severe tier.

use chrono::Duration;
use std::fmt;

/// Discrete punishment level selected from an offense count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PunishmentTier {
    /// A recorded warning, no platform mutation
    Warning,
    /// Short timeout (10 minutes by default)
    TimeoutShort,
    /// Long timeout (1 hour by default)
    TimeoutLong,
    /// Permanent ban, terminal
    Ban,
}

impl fmt::Display for PunishmentTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "Warning"),
            Self::TimeoutShort => write!(f, "Short Timeout"),
            Self::TimeoutLong => write!(f, "Long Timeout"),
            Self::Ban => write!(f, "Ban"),
        }
    }
}

impl PunishmentTier {
    /// Whether applying this tier mutates the platform (timeout or ban)
    #[must_use]
    pub fn mutates_platform(&self) -> bool {
        !matches!(self, Self::Warning)
    }
}

/// One row of the escalation table
#[derive(Debug, Clone, Copy)]
struct EscalationStep {
    /// Lowest offense count this row applies to
    count: u64,
    tier: PunishmentTier,
}

/// Ordered escalation table from offense count to tier
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    /// Rows in ascending count order, the last row is the most severe
    steps: Vec<EscalationStep>,
    short_timeout_minutes: u32,
    long_timeout_minutes: u32,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self::new(10, 60)
    }
}

impl EscalationPolicy {
    /// Build the standard four-step escalation with configurable durations
    #[must_use]
    pub fn new(short_timeout_minutes: u32, long_timeout_minutes: u32) -> Self {
        Self::with_table(
            vec![
                (1, PunishmentTier::Warning),
                (2, PunishmentTier::TimeoutShort),
                (3, PunishmentTier::TimeoutLong),
                (4, PunishmentTier::Ban),
            ],
            short_timeout_minutes,
            long_timeout_minutes,
        )
    }

    /// Build a policy from a custom table of (lowest count, tier) rows.
    /// Rows may be passed in any order; they are sorted by count.
    #[must_use]
    pub fn with_table(
        table: Vec<(u64, PunishmentTier)>,
        short_timeout_minutes: u32,
        long_timeout_minutes: u32,
    ) -> Self {
        let mut steps: Vec<EscalationStep> = table
            .into_iter()
            .map(|(count, tier)| EscalationStep { count, tier })
            .collect();
        steps.sort_by_key(|step| step.count);

        Self {
            steps,
            short_timeout_minutes,
            long_timeout_minutes,
        }
    }

    /// Select the tier for an offense count
    ///
    /// The count must be at least 1; the policy is only consulted after a
    /// strike has been recorded. Counts past the last table row map to the
    /// most severe tier.
    #[must_use]
    pub fn decide(&self, count: u64) -> PunishmentTier {
        debug_assert!(count >= 1, "policy consulted before any strike was recorded");

        self.steps
            .iter()
            .rev()
            .find(|step| count >= step.count)
            .map_or(PunishmentTier::Warning, |step| step.tier)
    }

    /// Timeout duration for a tier, `None` for untimed tiers
    #[must_use]
    pub fn timeout_duration(&self, tier: PunishmentTier) -> Option<Duration> {
        match tier {
            PunishmentTier::TimeoutShort => {
                Some(Duration::minutes(i64::from(self.short_timeout_minutes)))
            }
            PunishmentTier::TimeoutLong => {
                Some(Duration::minutes(i64::from(self.long_timeout_minutes)))
            }
            PunishmentTier::Warning | PunishmentTier::Ban => None,
        }
    }
}
