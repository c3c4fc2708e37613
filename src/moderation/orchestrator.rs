//! Moderation action orchestrator
//!
//! Runs one moderation request through a fixed step sequence:
//! authorization gate, optional message deletion, offense recording,
//! policy decision, punishment application, user notification, audit
//! emission. Only the authorization gate and the ledger are fatal; every
//! other step converts its own failure into a marker on the outcome and
//! lets the remaining steps run, so the moderator always gets a complete
//! itemized report even when Discord is partially unavailable.

use crate::moderation::error::ModerationResult;
use crate::moderation::ledger::OffenseLedger;
use crate::moderation::notice::format_notice;
use crate::moderation::outcome::{DeletionOutcome, ModerationOutcome, PunishmentOutcome};
use crate::moderation::platform::{DeleteError, MessageRef, ModPlatform};
use crate::moderation::policy::{EscalationPolicy, PunishmentTier};
use crate::moderation::ModerationError;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Rule citation used when the quick action fires
const QUICK_ACTION_RULE: &str = "Rule violation";

/// Pre-judged authorization facts, computed by the dispatch layer
///
/// The orchestrator never inspects Discord permissions itself; the command
/// layer resolves the flags and hierarchy comparison and hands over the
/// verdicts.
#[derive(Debug, Clone, Copy)]
pub struct Authorization {
    /// Actor holds the moderation capability (Timeout Members)
    pub actor_can_moderate: bool,
    /// The bot itself can time members out
    pub bot_can_moderate: bool,
    /// The bot can delete messages
    pub bot_can_delete_messages: bool,
    /// Target is below the bot's effective rank and is not the owner
    pub hierarchy_permits: bool,
}

impl Authorization {
    /// Authorization that passes every gate (test and trusted-path helper)
    #[must_use]
    pub fn granted() -> Self {
        Self {
            actor_can_moderate: true,
            bot_can_moderate: true,
            bot_can_delete_messages: true,
            hierarchy_permits: true,
        }
    }
}

/// A moderator-initiated strike
#[derive(Debug, Clone)]
pub struct StrikeRequest {
    pub guild_id: u64,
    pub target_id: u64,
    pub moderator_id: u64,
    /// Which rule was violated, free text
    pub rule: String,
    pub note: Option<String>,
    /// Optional link to the offending message, deleted when present
    pub message_link: Option<String>,
    pub auth: Authorization,
}

/// The message-context shortcut: delete the message and apply the short
/// timeout, with no offense-ledger interaction.
#[derive(Debug, Clone)]
pub struct QuickActionRequest {
    pub guild_id: u64,
    pub target_id: u64,
    pub moderator_id: u64,
    pub message: MessageRef,
    pub auth: Authorization,
}

/// Sequences moderation steps with per-step fault isolation
pub struct Orchestrator<L, P> {
    ledger: Arc<L>,
    platform: P,
    policy: EscalationPolicy,
}

impl<L: OffenseLedger, P: ModPlatform> Orchestrator<L, P> {
    pub fn new(ledger: Arc<L>, platform: P, policy: EscalationPolicy) -> Self {
        Self {
            ledger,
            platform,
            policy,
        }
    }

    /// Run a strike end to end.
    ///
    /// # Errors
    /// Fails only on a rejected authorization gate or an unavailable
    /// ledger; all other step failures are recorded in the outcome.
    pub async fn run_strike(&self, request: StrikeRequest) -> ModerationResult<ModerationOutcome> {
        Self::check_authorization(&request.auth, false)?;

        let mut outcome = ModerationOutcome::new(
            request.guild_id,
            request.target_id,
            request.moderator_id,
            request.rule,
        );
        outcome.note = request.note;

        if let Some(link) = request.message_link.as_deref() {
            self.delete_linked_message(&mut outcome, link, &request.auth)
                .await;
        }

        // Fatal past this point only if the ledger cannot record the strike
        let count = self.ledger.increment(request.target_id).await?;
        outcome.offense_count = Some(count);

        let tier = self.policy.decide(count);
        let duration = self.policy.timeout_duration(tier);
        info!(
            case_id = %outcome.case_id,
            target_id = request.target_id,
            moderator_id = request.moderator_id,
            offense_count = count,
            tier = %tier,
            "Strike recorded"
        );

        self.apply_punishment(&mut outcome, tier, duration).await;
        self.notify_user(&mut outcome, duration).await;
        self.emit_audit(&outcome, "Strike").await;

        Ok(outcome)
    }

    /// Run the quick delete+timeout shortcut. Fixed short-timeout tier, no
    /// ledger interaction, and the deletion capability is required up front.
    pub async fn run_quick_action(
        &self,
        request: QuickActionRequest,
    ) -> ModerationResult<ModerationOutcome> {
        Self::check_authorization(&request.auth, true)?;

        let mut outcome = ModerationOutcome::new(
            request.guild_id,
            request.target_id,
            request.moderator_id,
            QUICK_ACTION_RULE,
        );
        outcome.message_ref = Some(request.message);

        let reason = format!("{QUICK_ACTION_RULE} — quick action via context menu");
        outcome.deletion = match self.platform.delete_message(request.message, &reason).await {
            Ok(()) => DeletionOutcome::Deleted,
            Err(e) => DeletionOutcome::Failed(e.to_string()),
        };

        let tier = PunishmentTier::TimeoutShort;
        let duration = self.policy.timeout_duration(tier);
        self.apply_punishment(&mut outcome, tier, duration).await;
        self.notify_user(&mut outcome, duration).await;
        self.emit_audit(&outcome, "Quick Delete & Timeout").await;

        Ok(outcome)
    }

    /// The terminal gate: nothing runs and nothing is mutated past a failure
    /// here.
    fn check_authorization(auth: &Authorization, require_delete: bool) -> ModerationResult<()> {
        if !auth.actor_can_moderate {
            return Err(ModerationError::Unauthorized(
                "You need **Timeout Members** permission to use this.".to_string(),
            ));
        }

        let mut missing = Vec::new();
        if !auth.bot_can_moderate {
            missing.push("Timeout Members");
        }
        if require_delete && !auth.bot_can_delete_messages {
            missing.push("Manage Messages");
        }
        if !missing.is_empty() {
            return Err(ModerationError::Unauthorized(format!(
                "I'm missing required permissions: {}.",
                missing.join(", ")
            )));
        }

        if !auth.hierarchy_permits {
            return Err(ModerationError::Unauthorized(
                "I can't moderate that member due to role hierarchy / ownership.".to_string(),
            ));
        }

        Ok(())
    }

    /// Deletion step. A malformed link or missing capability downgrades the
    /// step to failed-with-reason; the rest of the request proceeds.
    async fn delete_linked_message(
        &self,
        outcome: &mut ModerationOutcome,
        link: &str,
        auth: &Authorization,
    ) {
        let reference = match MessageRef::parse(link) {
            Ok(reference) => reference,
            Err(e) => {
                outcome.deletion = DeletionOutcome::Failed(e.to_string());
                return;
            }
        };
        outcome.message_ref = Some(reference);

        if !auth.bot_can_delete_messages {
            outcome.deletion =
                DeletionOutcome::Failed(DeleteError::MissingCapability.to_string());
            return;
        }

        outcome.deletion = match self
            .platform
            .delete_message(reference, "Deleted via /strike")
            .await
        {
            Ok(()) => DeletionOutcome::Deleted,
            Err(e) => DeletionOutcome::Failed(e.to_string()),
        };
    }

    /// Punishment step. Platform errors are captured as reason strings, not
    /// raised.
    async fn apply_punishment(
        &self,
        outcome: &mut ModerationOutcome,
        tier: PunishmentTier,
        duration: Option<Duration>,
    ) {
        let reason = outcome.reason();

        let punishment = match tier {
            PunishmentTier::Warning => PunishmentOutcome {
                tier,
                applied: true,
                until: None,
                error: None,
            },
            PunishmentTier::TimeoutShort | PunishmentTier::TimeoutLong => match duration {
                Some(duration) => {
                    let until = Utc::now() + duration;
                    match self
                        .platform
                        .apply_timeout(outcome.guild_id, outcome.target_id, until, &reason)
                        .await
                    {
                        Ok(()) => PunishmentOutcome {
                            tier,
                            applied: true,
                            until: Some(until),
                            error: None,
                        },
                        Err(e) => PunishmentOutcome {
                            tier,
                            applied: false,
                            until: None,
                            error: Some(e),
                        },
                    }
                }
                None => PunishmentOutcome {
                    tier,
                    applied: false,
                    until: None,
                    error: Some("no timeout duration configured".to_string()),
                },
            },
            PunishmentTier::Ban => {
                match self
                    .platform
                    .apply_ban(outcome.guild_id, outcome.target_id, &reason)
                    .await
                {
                    Ok(()) => PunishmentOutcome {
                        tier,
                        applied: true,
                        until: None,
                        error: None,
                    },
                    Err(e) => PunishmentOutcome {
                        tier,
                        applied: false,
                        until: None,
                        error: Some(e),
                    },
                }
            }
        };

        outcome.punishment = Some(punishment);
    }

    /// Notification step. Closed DMs are a `false` flag, never an error.
    async fn notify_user(&self, outcome: &mut ModerationOutcome, duration: Option<Duration>) {
        let text = format_notice(&outcome.rule, outcome.note.as_deref(), duration);
        outcome.notified = self
            .platform
            .send_direct_message(outcome.target_id, &text)
            .await;
    }

    /// Audit step. Best effort; a dropped record is logged and otherwise
    /// invisible to the moderator.
    async fn emit_audit(&self, outcome: &ModerationOutcome, title: &str) {
        let posted = self
            .platform
            .post_audit_record(
                title,
                outcome.target_id,
                outcome.moderator_id,
                outcome.audit_fields(),
            )
            .await;
        if !posted {
            debug!(case_id = %outcome.case_id, "Audit record not posted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::ledger::{LedgerError, MockOffenseLedger};
    use crate::moderation::platform::MockModPlatform;

    fn strike_request() -> StrikeRequest {
        StrikeRequest {
            guild_id: 67890,
            target_id: 12345,
            moderator_id: 54321,
            rule: "Rule 3: Spam".to_string(),
            note: None,
            message_link: None,
            auth: Authorization::granted(),
        }
    }

    fn orchestrator(
        ledger: MockOffenseLedger,
        platform: MockModPlatform,
    ) -> Orchestrator<MockOffenseLedger, MockModPlatform> {
        Orchestrator::new(Arc::new(ledger), platform, EscalationPolicy::default())
    }

    /// Platform mock where DM and audit succeed and nothing else is expected
    fn quiet_platform() -> MockModPlatform {
        let mut platform = MockModPlatform::new();
        platform.expect_send_direct_message().returning(|_, _| true);
        platform
            .expect_post_audit_record()
            .returning(|_, _, _, _| true);
        platform
    }

    #[tokio::test]
    async fn test_first_strike_is_a_warning() {
        let mut ledger = MockOffenseLedger::new();
        ledger.expect_increment().returning(|_| Ok(1));

        let outcome = orchestrator(ledger, quiet_platform())
            .run_strike(strike_request())
            .await
            .unwrap();

        assert_eq!(outcome.offense_count, Some(1));
        let punishment = outcome.punishment.unwrap();
        assert_eq!(punishment.tier, PunishmentTier::Warning);
        assert!(punishment.applied);
        assert!(outcome.notified);
    }

    #[tokio::test]
    async fn test_escalation_sequence_across_four_strikes() {
        let mut ledger = MockOffenseLedger::new();
        let mut count = 0u64;
        ledger.expect_increment().times(4).returning(move |_| {
            count += 1;
            Ok(count)
        });

        let mut platform = quiet_platform();
        platform
            .expect_apply_timeout()
            .times(2)
            .returning(|_, _, _, _| Ok(()));
        platform.expect_apply_ban().times(1).returning(|_, _, _| Ok(()));

        let orchestrator = orchestrator(ledger, platform);
        let mut tiers = Vec::new();
        for _ in 0..4 {
            let outcome = orchestrator.run_strike(strike_request()).await.unwrap();
            tiers.push(outcome.punishment.unwrap().tier);
        }

        assert_eq!(
            tiers,
            vec![
                PunishmentTier::Warning,
                PunishmentTier::TimeoutShort,
                PunishmentTier::TimeoutLong,
                PunishmentTier::Ban
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_link_still_punishes_and_notifies() {
        let mut ledger = MockOffenseLedger::new();
        ledger.expect_increment().returning(|_| Ok(1));

        // delete_message must never be called for an unparseable link
        let platform = quiet_platform();

        let mut request = strike_request();
        request.message_link = Some("not a link".to_string());

        let outcome = orchestrator(ledger, platform)
            .run_strike(request)
            .await
            .unwrap();

        match &outcome.deletion {
            DeletionOutcome::Failed(reason) => assert!(reason.contains("malformed link")),
            other => panic!("expected failed deletion, got {other:?}"),
        }
        assert!(outcome.punishment.is_some());
        assert!(outcome.notified);
    }

    #[tokio::test]
    async fn test_deletion_failure_does_not_stop_the_run() {
        let mut ledger = MockOffenseLedger::new();
        ledger.expect_increment().returning(|_| Ok(2));

        let mut platform = quiet_platform();
        platform
            .expect_delete_message()
            .returning(|_, _| Err(DeleteError::Forbidden));
        platform
            .expect_apply_timeout()
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let mut request = strike_request();
        request.message_link = Some("https://discord.com/channels/1/222/333".to_string());

        let outcome = orchestrator(ledger, platform)
            .run_strike(request)
            .await
            .unwrap();

        assert!(matches!(outcome.deletion, DeletionOutcome::Failed(_)));
        let punishment = outcome.punishment.unwrap();
        assert_eq!(punishment.tier, PunishmentTier::TimeoutShort);
        assert!(punishment.applied);
    }

    #[tokio::test]
    async fn test_missing_delete_capability_downgrades_to_step_failure() {
        let mut ledger = MockOffenseLedger::new();
        ledger.expect_increment().returning(|_| Ok(1));

        // No delete_message expectation: the call must be pre-empted
        let platform = quiet_platform();

        let mut request = strike_request();
        request.message_link = Some("https://discord.com/channels/1/222/333".to_string());
        request.auth.bot_can_delete_messages = false;

        let outcome = orchestrator(ledger, platform)
            .run_strike(request)
            .await
            .unwrap();

        match &outcome.deletion {
            DeletionOutcome::Failed(reason) => assert!(reason.contains("Manage Messages")),
            other => panic!("expected failed deletion, got {other:?}"),
        }
        assert!(outcome.punishment.is_some());
    }

    #[tokio::test]
    async fn test_ledger_failure_is_fatal_before_punishment() {
        let mut ledger = MockOffenseLedger::new();
        ledger
            .expect_increment()
            .returning(|_| Err(LedgerError::Corrupt("disk gone".to_string())));

        // No platform expectations: no punishment, DM, or audit may happen
        let platform = MockModPlatform::new();

        let result = orchestrator(ledger, platform)
            .run_strike(strike_request())
            .await;

        match result {
            Err(ModerationError::Ledger(_)) => {}
            other => panic!("expected fatal ledger error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_punishment_failure_still_notifies_and_audits() {
        let mut ledger = MockOffenseLedger::new();
        ledger.expect_increment().returning(|_| Ok(4));

        let mut platform = MockModPlatform::new();
        platform
            .expect_apply_ban()
            .returning(|_, _, _| Err("Missing Permissions".to_string()));
        platform
            .expect_send_direct_message()
            .times(1)
            .returning(|_, _| true);
        platform
            .expect_post_audit_record()
            .times(1)
            .returning(|_, _, _, _| true);

        let outcome = orchestrator(ledger, platform)
            .run_strike(strike_request())
            .await
            .unwrap();

        let punishment = outcome.punishment.unwrap();
        assert_eq!(punishment.tier, PunishmentTier::Ban);
        assert!(!punishment.applied);
        assert_eq!(punishment.error.as_deref(), Some("Missing Permissions"));
        assert!(outcome.notified);
    }

    #[tokio::test]
    async fn test_closed_dms_are_non_fatal() {
        let mut ledger = MockOffenseLedger::new();
        ledger.expect_increment().returning(|_| Ok(1));

        let mut platform = MockModPlatform::new();
        platform
            .expect_send_direct_message()
            .returning(|_, _| false);
        platform
            .expect_post_audit_record()
            .times(1)
            .returning(|_, _, _, _| true);

        let outcome = orchestrator(ledger, platform)
            .run_strike(strike_request())
            .await
            .unwrap();

        assert!(!outcome.notified);
        assert!(outcome.summary().contains("not delivered"));
    }

    #[tokio::test]
    async fn test_dropped_audit_record_is_silent() {
        let mut ledger = MockOffenseLedger::new();
        ledger.expect_increment().returning(|_| Ok(1));

        let mut platform = MockModPlatform::new();
        platform.expect_send_direct_message().returning(|_, _| true);
        platform
            .expect_post_audit_record()
            .returning(|_, _, _, _| false);

        let outcome = orchestrator(ledger, platform)
            .run_strike(strike_request())
            .await
            .unwrap();

        // Nothing about the audit drop leaks into the moderator summary
        assert!(!outcome.summary().to_lowercase().contains("audit record"));
    }

    #[tokio::test]
    async fn test_unauthorized_actor_has_no_side_effects() {
        // No expectations anywhere: any call would panic the mock
        let ledger = MockOffenseLedger::new();
        let platform = MockModPlatform::new();

        let mut request = strike_request();
        request.auth.actor_can_moderate = false;

        let result = orchestrator(ledger, platform).run_strike(request).await;
        match result {
            Err(ModerationError::Unauthorized(message)) => {
                assert!(message.contains("Timeout Members"));
            }
            other => panic!("expected unauthorized, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hierarchy_violation_is_terminal() {
        let ledger = MockOffenseLedger::new();
        let platform = MockModPlatform::new();

        let mut request = strike_request();
        request.auth.hierarchy_permits = false;

        let result = orchestrator(ledger, platform).run_strike(request).await;
        match result {
            Err(ModerationError::Unauthorized(message)) => {
                assert!(message.contains("role hierarchy"));
            }
            other => panic!("expected unauthorized, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_quick_action_applies_short_timeout_without_the_ledger() {
        // Any ledger call panics: the quick action must never touch it
        let ledger = MockOffenseLedger::new();

        let mut platform = quiet_platform();
        platform.expect_delete_message().returning(|_, _| Ok(()));
        platform
            .expect_apply_timeout()
            .times(1)
            .withf(|_, _, until, _| {
                let minutes = (*until - Utc::now()).num_minutes();
                (9..=10).contains(&minutes)
            })
            .returning(|_, _, _, _| Ok(()));

        let request = QuickActionRequest {
            guild_id: 67890,
            target_id: 12345,
            moderator_id: 54321,
            message: MessageRef {
                channel_id: 222,
                message_id: 333,
            },
            auth: Authorization::granted(),
        };

        let outcome = orchestrator(ledger, platform)
            .run_quick_action(request)
            .await
            .unwrap();

        assert_eq!(outcome.offense_count, None);
        assert_eq!(outcome.deletion, DeletionOutcome::Deleted);
        let punishment = outcome.punishment.unwrap();
        assert_eq!(punishment.tier, PunishmentTier::TimeoutShort);
        assert!(punishment.applied);
    }

    #[tokio::test]
    async fn test_quick_action_requires_delete_capability_up_front() {
        let ledger = MockOffenseLedger::new();
        let platform = MockModPlatform::new();

        let request = QuickActionRequest {
            guild_id: 67890,
            target_id: 12345,
            moderator_id: 54321,
            message: MessageRef {
                channel_id: 222,
                message_id: 333,
            },
            auth: Authorization {
                bot_can_delete_messages: false,
                ..Authorization::granted()
            },
        };

        let result = orchestrator(ledger, platform).run_quick_action(request).await;
        match result {
            Err(ModerationError::Unauthorized(message)) => {
                assert!(message.contains("Manage Messages"));
            }
            other => panic!("expected unauthorized, got {other:?}"),
        }
    }
}
