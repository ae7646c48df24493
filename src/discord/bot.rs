//! Serenity client and event handler running the `/players` command.

use std::{future::Future, sync::Arc};

use serenity::{
    Client,
    all::{
        ButtonStyle, ChannelType, Command, CommandInteraction, ComponentInteraction, Context,
        CreateActionRow, CreateButton, CreateInteractionResponse,
        CreateInteractionResponseMessage, EditInteractionResponse, EventHandler, GatewayIntents,
        GuildId, Http, Interaction, Ready,
    },
    async_trait,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    discord::{
        commands::{PLAYERS_COMMAND, PlayersCommand, players_command},
        publish::{DiscordPublisher, publish_board},
    },
    error::ServiceError,
    services::{
        community_service::CANCELLING_MESSAGE,
        guild_actions::{
            ACCESSING_MEMBERS, GuildActions, GuildUpdateRequest, OPERATION_IN_PROGRESS,
            STARTING_OPERATION,
        },
        operations::{OperationKind, OperationTicket},
        progress::{LogProgress, Tee},
    },
};

/// Custom id of the cancel button attached to update progress messages.
pub const CANCEL_BUTTON_ID: &str = "players:cancel";
const NOTHING_TO_CANCEL: &str = "No operation is running.";
const ADMIN_ONLY: &str = "This command is reserved to administrators.";
const GUILD_ONLY: &str = "This command only works inside a server.";
/// Pending progress lines kept while a Discord edit is in flight.
const PROGRESS_BUFFER: usize = 16;

/// Failures starting the gateway client.
#[derive(Debug, Error)]
pub enum DiscordError {
    /// Client construction failed.
    #[error("failed to build discord client")]
    Build(#[source] serenity::Error),
    /// The gateway connection ended with an error.
    #[error("discord client stopped")]
    Client(#[source] serenity::Error),
}

/// Connected bot, ready to be started.
pub struct DiscordBot {
    client: Client,
}

impl DiscordBot {
    /// Build the client. Commands are registered in `guild_id`, or globally without one.
    pub async fn new(
        token: &str,
        guild_id: Option<u64>,
        actions: GuildActions,
    ) -> Result<Self, DiscordError> {
        let handler = PlayersHandler { actions, guild_id };
        let client = Client::builder(token, GatewayIntents::GUILDS)
            .event_handler(handler)
            .await
            .map_err(DiscordError::Build)?;
        Ok(Self { client })
    }

    /// Run until the gateway fails or `shutdown` resolves.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<(), DiscordError> {
        let shard_manager = self.client.shard_manager.clone();
        tokio::select! {
            result = self.client.start() => result.map_err(DiscordError::Client),
            _ = shutdown => {
                info!("shutting down discord shards");
                shard_manager.shutdown_all().await;
                Ok(())
            }
        }
    }
}

struct PlayersHandler {
    actions: GuildActions,
    guild_id: Option<u64>,
}

#[async_trait]
impl EventHandler for PlayersHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, guilds = ready.guilds.len(), "discord bot connected");

        let registered = match self.guild_id {
            Some(guild_id) => {
                GuildId::new(guild_id)
                    .set_commands(&ctx.http, vec![players_command()])
                    .await
            }
            None => Command::set_global_commands(&ctx.http, vec![players_command()]).await,
        };
        match registered {
            Ok(commands) => info!(
                count = commands.len(),
                guild_id = ?self.guild_id,
                "slash commands registered"
            ),
            Err(err) => error!(error = %err, "failed to register slash commands"),
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) if command.data.name == PLAYERS_COMMAND => {
                self.handle_players(&ctx, &command).await;
            }
            Interaction::Component(component) if component.data.custom_id == CANCEL_BUTTON_ID => {
                self.handle_cancel(&ctx, &component).await;
            }
            _ => {}
        }
    }
}

impl PlayersHandler {
    async fn handle_players(&self, ctx: &Context, command: &CommandInteraction) {
        let Some(guild_id) = command.guild_id else {
            reply_ephemeral(ctx, command, GUILD_ONLY).await;
            return;
        };
        let is_admin = command
            .member
            .as_ref()
            .and_then(|member| member.permissions)
            .is_some_and(|permissions| permissions.administrator());
        if !is_admin {
            reply_ephemeral(ctx, command, ADMIN_ONLY).await;
            return;
        }

        let Some(parsed) = PlayersCommand::from_options(&command.data.options()) else {
            warn!(command = %command.data.name, "unknown players sub-command");
            return;
        };
        let kind = match parsed {
            PlayersCommand::Rank { .. } => OperationKind::Ranking,
            PlayersCommand::Update { .. } => OperationKind::MemberUpdate,
        };
        let ticket = match self.actions.begin(kind) {
            Ok(ticket) => ticket,
            Err(_) => {
                reply_ephemeral(ctx, command, OPERATION_IN_PROGRESS).await;
                return;
            }
        };
        info!(guild_id = %guild_id, operation = %kind, "players command accepted");

        match parsed {
            PlayersCommand::Rank { include_banned } => {
                self.run_ranking(ctx, command, &ticket, include_banned).await;
            }
            PlayersCommand::Update {
                force_update,
                include_win_loss,
            } => {
                let request = GuildUpdateRequest {
                    guild_id: Some(guild_id.get()),
                    force_update,
                    include_win_loss,
                };
                self.run_update(ctx, command, &ticket, request).await;
            }
        }
    }

    async fn run_ranking(
        &self,
        ctx: &Context,
        command: &CommandInteraction,
        ticket: &OperationTicket,
        include_banned: bool,
    ) {
        let opening = CreateInteractionResponseMessage::new()
            .content(ACCESSING_MEMBERS)
            .ephemeral(true);
        if let Err(err) = command
            .create_response(&ctx.http, CreateInteractionResponse::Message(opening))
            .await
        {
            warn!(error = %err, "failed to acknowledge ranking command");
            return;
        }

        let outcome = match self.actions.ranking_with(ticket, include_banned).await {
            Ok(board) => {
                let publisher = DiscordPublisher::new(ctx.http.clone());
                let in_thread = command
                    .channel
                    .as_ref()
                    .is_some_and(|channel| is_thread(channel.kind));
                match publish_board(&publisher, command.channel_id.get(), in_thread, &board).await {
                    Ok(_) => format!("Ranking posted ({} players)", board.member_count),
                    Err(message) => message,
                }
            }
            Err(err) => describe_error(&err),
        };
        edit_reply(&ctx.http, command, &outcome, false).await;
    }

    async fn run_update(
        &self,
        ctx: &Context,
        command: &CommandInteraction,
        ticket: &OperationTicket,
        request: GuildUpdateRequest,
    ) {
        let opening = CreateInteractionResponseMessage::new()
            .content(STARTING_OPERATION)
            .components(vec![cancel_row()]);
        if let Err(err) = command
            .create_response(&ctx.http, CreateInteractionResponse::Message(opening))
            .await
        {
            warn!(error = %err, "failed to acknowledge update command");
            return;
        }

        if let Err(err) = self.actions.community().guild_settings_list(false).await {
            warn!(error = %err, "guild settings unavailable; using no staleness threshold");
        }

        let (tx, mut rx) = mpsc::channel::<String>(PROGRESS_BUFFER);
        let http = ctx.http.clone();
        let progress_command = command.clone();
        let editor = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                edit_reply(&http, &progress_command, &line, true).await;
            }
        });

        let outcome = {
            let progress = Tee(&tx, &LogProgress);
            self.actions.run_update(ticket, request, &progress).await
        };
        drop(tx);
        if let Err(err) = editor.await {
            debug!(error = %err, "progress editor stopped");
        }

        let message = match outcome {
            Ok(summary) => summary.message(),
            Err(err) => describe_error(&err),
        };
        edit_reply(&ctx.http, command, &message, false).await;
    }

    async fn handle_cancel(&self, ctx: &Context, component: &ComponentInteraction) {
        let content = if self.actions.cancel_operation() {
            CANCELLING_MESSAGE
        } else {
            NOTHING_TO_CANCEL
        };
        let response = CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true);
        if let Err(err) = component
            .create_response(&ctx.http, CreateInteractionResponse::Message(response))
            .await
        {
            warn!(error = %err, "failed to answer cancel button");
        }
    }
}

fn cancel_row() -> CreateActionRow {
    CreateActionRow::Buttons(vec![
        CreateButton::new(CANCEL_BUTTON_ID)
            .label("Cancel")
            .style(ButtonStyle::Danger),
    ])
}

fn is_thread(kind: ChannelType) -> bool {
    matches!(
        kind,
        ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread
    )
}

fn describe_error(err: &ServiceError) -> String {
    match err {
        ServiceError::Busy => OPERATION_IN_PROGRESS.to_string(),
        other => format!("Operation failed: {other}"),
    }
}

async fn reply_ephemeral(ctx: &Context, command: &CommandInteraction, content: &str) {
    let message = CreateInteractionResponseMessage::new()
        .content(content)
        .ephemeral(true);
    if let Err(err) = command
        .create_response(&ctx.http, CreateInteractionResponse::Message(message))
        .await
    {
        warn!(error = %err, "failed to reply to command");
    }
}

/// Replace the command's reply; the cancel button stays only while `running`.
async fn edit_reply(http: &Arc<Http>, command: &CommandInteraction, content: &str, running: bool) {
    let components = if running { vec![cancel_row()] } else { Vec::new() };
    let edit = EditInteractionResponse::new()
        .content(content)
        .components(components);
    if let Err(err) = command.edit_response(http, edit).await {
        warn!(error = %err, "failed to edit command reply");
    }
}
