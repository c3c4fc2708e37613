//! Platform capability interface
//!
//! The orchestrator talks to Discord exclusively through the [`ModPlatform`]
//! trait. The serenity-backed implementation normalizes API failures into
//! the small taxonomy the orchestrator reports on; anything shaped like a
//! version-compat or transport detail stays on this side of the seam.

use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;
use serenity::{ChannelId, CreateEmbed, CreateMessage, GuildId, Http, HttpError, MessageId, UserId};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// A parsed message link: channel id plus message id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub channel_id: u64,
    pub message_id: u64,
}

/// Why a message link could not be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LinkParseError {
    #[error("malformed link (expected .../channels/<guild>/<channel>/<message>)")]
    Format,
    #[error("malformed link (ids must be positive integers)")]
    InvalidId,
}

impl MessageRef {
    /// Parse a full Discord message link of the form
    /// `https://discord.com/channels/<guild>/<channel>/<message>`.
    pub fn parse(link: &str) -> Result<Self, LinkParseError> {
        let link = link.trim().trim_matches(|c| c == '<' || c == '>');
        let parts: Vec<&str> = link.split('/').collect();
        if parts.len() < 3 {
            return Err(LinkParseError::Format);
        }

        let channel_id = parts[parts.len() - 2]
            .parse::<u64>()
            .map_err(|_| LinkParseError::InvalidId)?;
        let message_id = parts[parts.len() - 1]
            .parse::<u64>()
            .map_err(|_| LinkParseError::InvalidId)?;
        if channel_id == 0 || message_id == 0 {
            return Err(LinkParseError::InvalidId);
        }

        Ok(Self {
            channel_id,
            message_id,
        })
    }
}

/// Why a message deletion failed
#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("not found (bad link or already deleted)")]
    NotFound,
    #[error("forbidden (role/override denies)")]
    Forbidden,
    #[error("missing Manage Messages in that channel")]
    MissingCapability,
    #[error("unexpected error: {0}")]
    Other(String),
}

/// Capabilities the moderation core consumes from the chat platform
///
/// Timeout and ban failures surface as plain reason strings; the
/// orchestrator records them and keeps going. Direct messages and audit
/// posts report delivery as a bare boolean.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ModPlatform: Send + Sync {
    /// Delete a message, with an audit-log reason where the API allows one
    async fn delete_message(&self, reference: MessageRef, reason: &str) -> Result<(), DeleteError>;

    /// Time a member out until the given instant
    async fn apply_timeout(
        &self,
        guild_id: u64,
        user_id: u64,
        until: DateTime<Utc>,
        reason: &str,
    ) -> Result<(), String>;

    /// Permanently ban a member
    async fn apply_ban(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<(), String>;

    /// DM a user; `false` means the notice could not be delivered
    async fn send_direct_message(&self, user_id: u64, text: &str) -> bool;

    /// Post an audit embed; best effort, `false` on any failure
    async fn post_audit_record(
        &self,
        title: &str,
        target_user: u64,
        acting_moderator: u64,
        fields: Vec<(String, String)>,
    ) -> bool;
}

/// Serenity-backed platform implementation
pub struct HttpPlatform {
    http: Arc<Http>,
    /// Destination for audit embeds; `None` disables audit posting
    audit_channel_id: Option<u64>,
}

impl HttpPlatform {
    #[must_use]
    pub fn new(http: Arc<Http>, audit_channel_id: Option<u64>) -> Self {
        Self {
            http,
            audit_channel_id,
        }
    }

    /// Map a serenity error onto the deletion taxonomy
    fn classify_delete_error(error: &serenity::Error) -> DeleteError {
        if let serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) = error {
            return match response.status_code.as_u16() {
                404 => DeleteError::NotFound,
                403 => DeleteError::Forbidden,
                _ => DeleteError::Other(error.to_string()),
            };
        }
        DeleteError::Other(error.to_string())
    }
}

#[async_trait::async_trait]
impl ModPlatform for HttpPlatform {
    async fn delete_message(&self, reference: MessageRef, reason: &str) -> Result<(), DeleteError> {
        self.http
            .delete_message(
                ChannelId::new(reference.channel_id),
                MessageId::new(reference.message_id),
                Some(reason),
            )
            .await
            .map_err(|e| Self::classify_delete_error(&e))
    }

    async fn apply_timeout(
        &self,
        guild_id: u64,
        user_id: u64,
        until: DateTime<Utc>,
        reason: &str,
    ) -> Result<(), String> {
        let mut member = GuildId::new(guild_id)
            .member(&*self.http, UserId::new(user_id))
            .await
            .map_err(|e| format!("failed to get member {user_id}: {e}"))?;

        member
            .disable_communication_until_datetime(&*self.http, until.into())
            .await
            .map_err(|e| e.to_string())?;

        info!(user_id, guild_id, %until, reason, "Timeout applied");
        Ok(())
    }

    async fn apply_ban(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<(), String> {
        GuildId::new(guild_id)
            .ban_with_reason(&*self.http, UserId::new(user_id), 0, reason)
            .await
            .map_err(|e| e.to_string())?;

        info!(user_id, guild_id, reason, "Ban applied");
        Ok(())
    }

    async fn send_direct_message(&self, user_id: u64, text: &str) -> bool {
        let dm = match UserId::new(user_id).create_dm_channel(&*self.http).await {
            Ok(dm) => dm,
            Err(e) => {
                info!(user_id, error = %e, "Could not open DM channel");
                return false;
            }
        };

        match dm.id.say(&*self.http, text).await {
            Ok(_) => true,
            Err(e) => {
                info!(user_id, error = %e, "Could not deliver DM");
                false
            }
        }
    }

    async fn post_audit_record(
        &self,
        title: &str,
        target_user: u64,
        acting_moderator: u64,
        fields: Vec<(String, String)>,
    ) -> bool {
        let Some(channel_id) = self.audit_channel_id else {
            return false;
        };

        let embed = CreateEmbed::new()
            .title(title.to_string())
            .description(format!(
                "Target: <@{target_user}> — Moderator: <@{acting_moderator}>"
            ))
            .fields(fields.into_iter().map(|(name, value)| (name, value, false)));

        match ChannelId::new(channel_id)
            .send_message(&*self.http, CreateMessage::new().embed(embed))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!(channel_id, error = %e, "Failed to post audit record");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_link() {
        let reference =
            MessageRef::parse("https://discord.com/channels/111/222/333").unwrap();
        assert_eq!(
            reference,
            MessageRef {
                channel_id: 222,
                message_id: 333
            }
        );
    }

    #[test]
    fn test_parse_tolerates_angle_brackets_and_whitespace() {
        let reference =
            MessageRef::parse("  <https://discord.com/channels/111/222/333>  ").unwrap();
        assert_eq!(reference.channel_id, 222);
        assert_eq!(reference.message_id, 333);
    }

    #[test]
    fn test_parse_rejects_short_links() {
        assert_eq!(MessageRef::parse("not a link"), Err(LinkParseError::Format));
    }

    #[test]
    fn test_parse_rejects_non_numeric_ids() {
        assert_eq!(
            MessageRef::parse("https://discord.com/channels/111/abc/333"),
            Err(LinkParseError::InvalidId)
        );
        assert_eq!(
            MessageRef::parse("https://discord.com/channels/111/222/abc"),
            Err(LinkParseError::InvalidId)
        );
    }

    #[test]
    fn test_parse_rejects_zero_ids() {
        assert_eq!(
            MessageRef::parse("https://discord.com/channels/111/0/333"),
            Err(LinkParseError::InvalidId)
        );
    }

    #[test]
    fn test_delete_error_display_is_moderator_readable() {
        assert_eq!(
            DeleteError::NotFound.to_string(),
            "not found (bad link or already deleted)"
        );
        assert_eq!(
            DeleteError::MissingCapability.to_string(),
            "missing Manage Messages in that channel"
        );
    }
}
