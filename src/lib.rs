pub mod commands;
pub mod data;
pub mod handlers;
pub mod logging;
pub mod moderation;

// Customize these constants for your bot
pub const COMMAND_TARGET: &str = "strike_warden::command";
pub const ERROR_TARGET: &str = "strike_warden::error";
pub const EVENT_TARGET: &str = "strike_warden::handlers";

pub use data::{Data, ModerationConfig};
pub use moderation::{ModerationOutcome, Orchestrator, PunishmentTier};
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
