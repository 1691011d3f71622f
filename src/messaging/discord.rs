//! Discord adapter using serenity.

use crate::controller::InteractionController;
use crate::engine::CommandEngine;
use crate::error::Result;
use crate::messaging::response::ResponseEditor;
use crate::messaging::traits::{ChannelHistory, InteractionAcknowledger};
use crate::{
    ChannelMessage, EDIT_COMMAND, EDITS_OPTION, EditInvocation, EmbedKind, EmbedMedia,
    MessageAttachment, MessageEmbed,
};

use async_trait::async_trait;
use serenity::all::{
    ChannelId, CommandDataOption, CommandInteraction, CommandOptionType, Context, CreateCommand,
    CreateCommandOption, CreateInteractionResponse, CreateInteractionResponseMessage,
    EventHandler, GetMessages, GuildId, Http, Interaction, InteractionId, Message, Ready,
};
use std::sync::Arc;

/// Controller wired to the production platform, engine and response editor.
pub type DiscordController = InteractionController<DiscordPlatform, CommandEngine, ResponseEditor>;

/// REST access to Discord shared by every invocation.
pub struct DiscordPlatform {
    http: Arc<Http>,
}

impl DiscordPlatform {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

impl ChannelHistory for DiscordPlatform {
    async fn recent_messages(&self, channel_id: u64, limit: u8) -> Result<Vec<ChannelMessage>> {
        let messages = ChannelId::new(channel_id)
            .messages(&*self.http, GetMessages::new().limit(limit))
            .await?;

        tracing::debug!(
            count = messages.len(),
            channel_id,
            "fetched discord message history"
        );

        Ok(messages.iter().map(channel_message).collect())
    }
}

impl InteractionAcknowledger for DiscordPlatform {
    async fn defer(&self, interaction_id: u64, token: &str) -> Result<()> {
        let response = CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new());
        self.http
            .create_interaction_response(
                InteractionId::new(interaction_id),
                token,
                &response,
                Vec::new(),
            )
            .await?;
        Ok(())
    }
}

// -- Serenity EventHandler --

pub struct Handler {
    controller: Arc<DiscordController>,
}

impl Handler {
    pub fn new(controller: Arc<DiscordController>) -> Self {
        Self { controller }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        tracing::info!(bot_name = %ready.user.name, "discord connected");
        tracing::info!(guild_count = ready.guilds.len(), "discord guilds available");
    }

    async fn interaction_create(&self, _ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };

        let invocation = edit_invocation(&command);
        self.controller.handle(&command.data.name, invocation).await;
    }
}

// -- Command registration --

/// The `/edit edits:<string>` command definition.
pub fn edit_command() -> CreateCommand {
    CreateCommand::new(EDIT_COMMAND)
        .description("edits a video")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                EDITS_OPTION,
                "edits to run on the video",
            )
            .required(true),
        )
}

/// Register the bot's commands against `guild_id`.
///
/// Existing commands are only listed, never diffed or removed, so repeated
/// runs can leave duplicates behind. A failed creation is logged and skipped.
pub async fn register_commands(http: &Http, guild_id: u64) -> Result<()> {
    let guild_id = GuildId::new(guild_id);

    let existing = guild_id.get_commands(http).await?;
    for command in &existing {
        tracing::info!(command = %command.name, %guild_id, "existing command found");
    }

    match guild_id.create_command(http, edit_command()).await {
        Ok(command) => {
            tracing::info!(command = %command.name, %guild_id, "registered guild command");
        }
        Err(error) => {
            tracing::warn!(%error, command = EDIT_COMMAND, %guild_id, "failed to register guild command");
        }
    }

    Ok(())
}

// -- Helper functions --

fn edit_invocation(command: &CommandInteraction) -> EditInvocation {
    EditInvocation {
        edit_spec: edits_option(&command.data.options)
            .unwrap_or_default()
            .to_string(),
        channel_id: command.channel_id.get(),
        interaction_id: command.id.get(),
        interaction_token: command.token.clone(),
    }
}

fn edits_option(options: &[CommandDataOption]) -> Option<&str> {
    options
        .iter()
        .find(|option| option.name == EDITS_OPTION)
        .and_then(|option| option.value.as_str())
}

fn channel_message(message: &Message) -> ChannelMessage {
    let attachments = message
        .attachments
        .iter()
        .map(|attachment| MessageAttachment {
            proxy_url: attachment.proxy_url.clone(),
            width: attachment.width.unwrap_or(0),
            height: attachment.height.unwrap_or(0),
        })
        .collect();

    let embeds = message
        .embeds
        .iter()
        .map(|embed| MessageEmbed {
            kind: EmbedKind::from_platform(embed.kind.as_deref()),
            has_provider: embed.provider.is_some(),
            video: embed.video.as_ref().map(|video| EmbedMedia {
                url: video.url.clone(),
                proxy_url: video.proxy_url.clone(),
                width: video.width.unwrap_or(0),
                height: video.height.unwrap_or(0),
            }),
            thumbnail: embed.thumbnail.as_ref().map(|thumbnail| EmbedMedia {
                url: thumbnail.url.clone(),
                proxy_url: thumbnail.proxy_url.clone(),
                width: thumbnail.width.unwrap_or(0),
                height: thumbnail.height.unwrap_or(0),
            }),
        })
        .collect();

    ChannelMessage {
        id: message.id.get(),
        attachments,
        embeds,
    }
}
