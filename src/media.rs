//! Media lookup in recent channel history.
//!
//! Walks the channel's latest messages newest-first and picks the first
//! attachment or embed that looks like visual media. The first hit wins: there
//! is no ranking by size or kind across candidates.

use crate::engine::InputKind;
use crate::error::EditError;
use crate::messaging::traits::ChannelHistory;
use crate::{ChannelMessage, EmbedKind, EmbedMedia, MessageEmbed};

use std::path::Path;
use std::sync::Arc;

/// How many recent messages are scanned for media.
pub const HISTORY_WINDOW: u8 = 25;

/// Media type, derived from the file extension only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Gifv,
    Gif,
}

impl MediaKind {
    /// Engine input class for this kind of media.
    pub fn input_kind(self) -> InputKind {
        match self {
            MediaKind::Image | MediaKind::Gif | MediaKind::Gifv => InputKind::Image,
            MediaKind::Video => InputKind::Video,
        }
    }
}

/// A piece of media found in channel history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReference {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub kind: MediaKind,
}

/// Finds the most recent usable media in a channel.
pub struct MediaResolver<H> {
    history: Arc<H>,
}

impl<H: ChannelHistory> MediaResolver<H> {
    pub fn new(history: Arc<H>) -> Self {
        Self { history }
    }

    pub async fn find_media(&self, channel_id: u64) -> Result<MediaReference, EditError> {
        let messages = self
            .history
            .recent_messages(channel_id, HISTORY_WINDOW)
            .await
            .map_err(|error| EditError::HistoryFetchFailed(error.to_string()))?;

        let media = first_media(&messages).ok_or(EditError::NoMediaFound)?;

        tracing::debug!(
            channel_id,
            scanned = messages.len(),
            kind = ?media.kind,
            url = %media.url,
            "resolved channel media"
        );

        Ok(media)
    }
}

/// First usable media across `messages`, which must be ordered newest-first.
pub fn first_media<'a>(
    messages: impl IntoIterator<Item = &'a ChannelMessage>,
) -> Option<MediaReference> {
    messages.into_iter().find_map(message_media)
}

/// Usable media in a single message, if any.
///
/// Attachments win over embeds. A zero height marks a non-visual file.
pub fn message_media(message: &ChannelMessage) -> Option<MediaReference> {
    if let Some(attachment) = message
        .attachments
        .iter()
        .find(|attachment| attachment.height != 0)
    {
        return Some(MediaReference {
            url: attachment.proxy_url.clone(),
            width: attachment.width,
            height: attachment.height,
            kind: classify_url(&attachment.proxy_url),
        });
    }

    message.embeds.iter().find_map(embed_media)
}

fn embed_media(embed: &MessageEmbed) -> Option<MediaReference> {
    match embed.kind {
        // Provider videos (YouTube and the like) point at a player page.
        EmbedKind::Video if !embed.has_provider => embed
            .video
            .as_ref()
            .map(|video| reference(video, video.url.clone(), MediaKind::Video)),
        EmbedKind::Image => embed.thumbnail.as_ref().map(|thumbnail| {
            let url = thumbnail
                .proxy_url
                .clone()
                .unwrap_or_else(|| thumbnail.url.clone());
            let kind = classify_url(&url);
            reference(thumbnail, url, kind)
        }),
        EmbedKind::Gifv => embed
            .video
            .as_ref()
            .map(|video| reference(video, video.url.clone(), MediaKind::Gifv)),
        _ => None,
    }
}

fn reference(media: &EmbedMedia, url: String, kind: MediaKind) -> MediaReference {
    MediaReference {
        url,
        width: media.width,
        height: media.height,
        kind,
    }
}

/// Classify a media URL by the extension of its path.
pub fn classify_url(url: &str) -> MediaKind {
    let path = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };

    let extension = Path::new(&path)
        .extension()
        .and_then(|extension| extension.to_str());

    classify_extension(extension)
}

/// Classify by extension. Unknown or missing extensions are treated as images.
pub fn classify_extension(extension: Option<&str>) -> MediaKind {
    let mime = extension
        .and_then(|extension| mime_guess::from_ext(&extension.to_ascii_lowercase()).first_raw());

    match mime {
        Some("image/gif") => MediaKind::Gif,
        Some(mime) if mime.starts_with("video/") => MediaKind::Video,
        _ => MediaKind::Image,
    }
}
