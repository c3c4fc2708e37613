use crate::moderation::{
    Authorization, HttpPlatform, MessageRef, ModerationError, OffenseLedger, Orchestrator,
    QuickActionRequest, StrikeRequest,
};
use crate::{Context, Data, Error};
use poise::serenity_prelude as serenity;
use poise::{command, CreateReply};

/// Basic ping command
/// This command is used to check if the bot is responsive.
#[command(prefix_command, slash_command, guild_only)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say("Pong!").await?;
    Ok(())
}

/// Highest role position a member holds
fn top_role_position(guild: &serenity::Guild, member: &serenity::Member) -> u16 {
    member
        .roles
        .iter()
        .filter_map(|role_id| guild.roles.get(role_id))
        .map(|role| role.position)
        .max()
        .unwrap_or(0)
}

/// Resolve the authorization facts the orchestrator gates on: the actor's
/// moderation permission (from the interaction), the bot's own permissions,
/// and the role-hierarchy/ownership comparison against the target.
async fn judge_authorization(ctx: Context<'_>, target: &serenity::Member) -> Authorization {
    let actor_can_moderate = ctx
        .author_member()
        .await
        .and_then(|member| member.permissions)
        .is_some_and(|permissions| permissions.moderate_members());

    let bot_id = ctx.framework().bot_id;
    match ctx.guild() {
        Some(guild) => {
            let bot_member = guild.members.get(&bot_id);
            let bot_permissions = bot_member.map(|member| guild.member_permissions(member));
            let bot_top_role = bot_member.map_or(0, |member| top_role_position(&guild, member));

            let hierarchy_permits = top_role_position(&guild, target) < bot_top_role
                && guild.owner_id != target.user.id;

            Authorization {
                actor_can_moderate,
                bot_can_moderate: bot_permissions
                    .is_some_and(|permissions| permissions.moderate_members()),
                bot_can_delete_messages: bot_permissions
                    .is_some_and(|permissions| permissions.manage_messages()),
                hierarchy_permits,
            }
        }
        None => Authorization {
            actor_can_moderate,
            bot_can_moderate: false,
            bot_can_delete_messages: false,
            hierarchy_permits: false,
        },
    }
}

/// Build the orchestrator over the live Discord connection
fn orchestrator(
    ctx: Context<'_>,
) -> Orchestrator<crate::moderation::FileLedger, HttpPlatform> {
    let data: &Data = ctx.data();
    let platform = HttpPlatform::new(
        ctx.serenity_context().http.clone(),
        data.config.audit_log_channel_id,
    );
    Orchestrator::new(data.ledger.clone(), platform, data.policy())
}

async fn send_ephemeral(ctx: Context<'_>, content: String) -> Result<(), Error> {
    ctx.send(CreateReply::default().content(content).ephemeral(true))
        .await?;
    Ok(())
}

/// Strike a member: escalate from their offense history and DM them the rule.
#[command(slash_command, guild_only)]
pub async fn strike(
    ctx: Context<'_>,
    #[description = "Member to strike"] user: serenity::Member,
    #[description = "Which rule was violated (e.g., Rule 3: Spam)"] rule: String,
    #[description = "Optional mod note (included in DM & audit log)"] note: Option<String>,
    #[description = "Optional: link to the offending message (will delete it)"]
    message_link: Option<String>,
) -> Result<(), Error> {
    let auth = judge_authorization(ctx, &user).await;

    // Defer early: deletion, timeout, and DM calls can be slow
    ctx.defer_ephemeral().await?;

    let request = StrikeRequest {
        guild_id: ctx.guild_id().map_or(0, |id| id.get()),
        target_id: user.user.id.get(),
        moderator_id: ctx.author().id.get(),
        rule,
        note,
        message_link,
        auth,
    };

    match orchestrator(ctx).run_strike(request).await {
        Ok(outcome) => send_ephemeral(ctx, outcome.summary()).await,
        Err(e @ ModerationError::Unauthorized(_)) => send_ephemeral(ctx, e.to_string()).await,
        Err(e) => send_ephemeral(ctx, format!("Strike aborted: {e}")).await,
    }
}

/// Show a member's recorded offense count.
#[command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn offenses(
    ctx: Context<'_>,
    #[description = "Member to look up"] user: serenity::Member,
) -> Result<(), Error> {
    let count = ctx.data().ledger.get(user.user.id.get()).await;
    send_ephemeral(
        ctx,
        format!("{} has **{count}** recorded offense(s).", user.user.name),
    )
    .await
}

/// Reset a member's offense count to zero.
#[command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn reset_offenses(
    ctx: Context<'_>,
    #[description = "Member whose count to reset"] user: serenity::Member,
) -> Result<(), Error> {
    match ctx.data().ledger.reset(user.user.id.get()).await {
        Ok(()) => {
            send_ephemeral(
                ctx,
                format!("Offense count for {} reset to 0.", user.user.name),
            )
            .await
        }
        Err(e) => send_ephemeral(ctx, format!("Could not persist the reset: {e}")).await,
    }
}

/// Delete the message and time its author out for the short duration,
/// without recording an offense.
#[command(context_menu_command = "Delete & Timeout (10m)", guild_only)]
pub async fn quick_delete_timeout(
    ctx: Context<'_>,
    message: serenity::Message,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return send_ephemeral(ctx, "This action only works in a server.".to_string()).await;
    };

    let target = match guild_id.member(ctx, message.author.id).await {
        Ok(member) => member,
        Err(_) => {
            return send_ephemeral(ctx, "Target is not a guild member.".to_string()).await;
        }
    };
    let auth = judge_authorization(ctx, &target).await;

    ctx.defer_ephemeral().await?;

    let request = QuickActionRequest {
        guild_id: guild_id.get(),
        target_id: target.user.id.get(),
        moderator_id: ctx.author().id.get(),
        message: MessageRef {
            channel_id: message.channel_id.get(),
            message_id: message.id.get(),
        },
        auth,
    };

    match orchestrator(ctx).run_quick_action(request).await {
        Ok(outcome) => send_ephemeral(ctx, outcome.summary()).await,
        Err(e @ ModerationError::Unauthorized(_)) => send_ephemeral(ctx, e.to_string()).await,
        Err(e) => send_ephemeral(ctx, format!("Action aborted: {e}")).await,
    }
}
