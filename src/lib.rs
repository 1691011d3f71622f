//! editbot: a Discord bot that edits the most recent media in a channel.

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod media;
pub mod messaging;
pub mod pipeline;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};

/// Name of the slash command this bot answers.
pub const EDIT_COMMAND: &str = "edit";

/// Name of the command's required string option.
pub const EDITS_OPTION: &str = "edits";

/// One user-issued `/edit` command occurrence.
///
/// Created on command receipt and discarded once the final response edit has
/// been attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditInvocation {
    /// Raw edit-spec text, forwarded to the engine after word splitting.
    pub edit_spec: String,
    pub channel_id: u64,
    pub interaction_id: u64,
    pub interaction_token: String,
}

/// Platform-neutral view of a channel history message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMessage {
    pub id: u64,
    /// Attachments in the platform's own order.
    pub attachments: Vec<MessageAttachment>,
    /// Embeds in the platform's own order.
    pub embeds: Vec<MessageEmbed>,
}

/// A file attached to a message. Missing dimensions are read as 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageAttachment {
    pub proxy_url: String,
    pub width: u32,
    pub height: u32,
}

/// Embed types the media resolver distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedKind {
    Video,
    Image,
    Gifv,
    Other,
}

impl EmbedKind {
    /// Map Discord's embed `type` string.
    pub fn from_platform(kind: Option<&str>) -> Self {
        match kind {
            Some("video") => Self::Video,
            Some("image") => Self::Image,
            Some("gifv") => Self::Gifv,
            _ => Self::Other,
        }
    }
}

/// An embed attached to a message, reduced to the parts media lookup needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEmbed {
    pub kind: EmbedKind,
    /// Embeds from an external provider (YouTube and friends) are not
    /// directly downloadable.
    pub has_provider: bool,
    pub video: Option<EmbedMedia>,
    pub thumbnail: Option<EmbedMedia>,
}

/// Video or thumbnail sub-object of an embed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedMedia {
    pub url: String,
    pub proxy_url: Option<String>,
    pub width: u32,
    pub height: u32,
}
