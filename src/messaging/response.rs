//! Client for editing and deleting deferred interaction responses.
//!
//! Talks to the interaction webhook endpoints directly with `reqwest`. The
//! interaction token in the URL authorizes the call. Outgoing content is
//! validated locally first, and nothing is sent when validation fails. Each
//! call makes exactly one attempt.

use crate::error::ResponseError;
use crate::messaging::traits::DeferredResponse;

use serde::{Deserialize, Serialize, Serializer};
use serenity::model::channel::Embed;

/// Limit on the combined text of all embeds in one message.
pub const EMBED_TEXT_LIMIT: usize = 6000;

/// Maximum embeds per message.
pub const MAX_EMBEDS: usize = 10;

/// Maximum explicit ids per allowed-mentions list.
pub const MAX_MENTION_IDS: usize = 100;

const EMBED_TITLE_LIMIT: usize = 256;
const EMBED_DESCRIPTION_LIMIT: usize = 4096;
const EMBED_FIELD_COUNT_LIMIT: usize = 25;
const EMBED_FIELD_NAME_LIMIT: usize = 256;
const EMBED_FIELD_VALUE_LIMIT: usize = 1024;
const EMBED_FOOTER_LIMIT: usize = 2048;
const EMBED_AUTHOR_LIMIT: usize = 256;

/// Message slot addressing the deferred response itself.
const ORIGINAL_MESSAGE: &str = "@original";

/// New content for a deferred response or follow-up message.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EditMessageData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeds: Option<Vec<Embed>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_mentions: Option<AllowedMentions>,

    /// Uploaded as multipart parts, never inside the JSON payload.
    #[serde(skip)]
    pub files: Vec<ResponseFile>,
}

impl EditMessageData {
    /// Plain text content that pings nobody.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            allowed_mentions: Some(AllowedMentions::none()),
            ..Default::default()
        }
    }

    /// A single file, no text, pinging nobody.
    pub fn file(file: ResponseFile) -> Self {
        Self {
            files: vec![file],
            allowed_mentions: Some(AllowedMentions::none()),
            ..Default::default()
        }
    }
}

/// A file to upload with an edit.
#[derive(Clone, PartialEq, Eq)]
pub struct ResponseFile {
    pub name: String,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for ResponseFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseFile")
            .field("name", &self.name)
            .field("len", &self.data.len())
            .finish()
    }
}

fn text_len(text: &str) -> usize {
    text.chars().count()
}

fn check_len(what: &str, text: &str, limit: usize) -> Result<(), ResponseError> {
    let len = text_len(text);
    if len > limit {
        return Err(ResponseError::InvalidEmbed(format!(
            "{what} is {len} characters, over the limit of {limit}"
        )));
    }
    Ok(())
}

/// Characters an embed counts against [`EMBED_TEXT_LIMIT`].
pub fn embed_length(embed: &Embed) -> usize {
    let fields: usize = embed
        .fields
        .iter()
        .map(|field| text_len(&field.name) + text_len(&field.value))
        .sum();

    embed.title.as_deref().map_or(0, text_len)
        + embed.description.as_deref().map_or(0, text_len)
        + fields
        + embed.footer.as_ref().map_or(0, |footer| text_len(&footer.text))
        + embed.author.as_ref().map_or(0, |author| text_len(&author.name))
}

/// Check an embed's individual limits.
pub fn validate_embed(embed: &Embed) -> Result<(), ResponseError> {
    if let Some(title) = &embed.title {
        check_len("title", title, EMBED_TITLE_LIMIT)?;
    }
    if let Some(description) = &embed.description {
        check_len("description", description, EMBED_DESCRIPTION_LIMIT)?;
    }
    if embed.fields.len() > EMBED_FIELD_COUNT_LIMIT {
        return Err(ResponseError::InvalidEmbed(format!(
            "{} fields, over the limit of {EMBED_FIELD_COUNT_LIMIT}",
            embed.fields.len()
        )));
    }
    for field in &embed.fields {
        if field.name.trim().is_empty() || field.value.trim().is_empty() {
            return Err(ResponseError::InvalidEmbed(
                "field name and value must not be empty".into(),
            ));
        }
        check_len("field name", &field.name, EMBED_FIELD_NAME_LIMIT)?;
        check_len("field value", &field.value, EMBED_FIELD_VALUE_LIMIT)?;
    }
    if let Some(footer) = &embed.footer {
        check_len("footer text", &footer.text, EMBED_FOOTER_LIMIT)?;
    }
    if let Some(author) = &embed.author {
        check_len("author name", &author.name, EMBED_AUTHOR_LIMIT)?;
    }
    Ok(())
}

/// Mention categories Discord may parse from content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionKind {
    Roles,
    Users,
    Everyone,
}

/// Which mentions in the content may ping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllowedMentions {
    pub parse: Vec<MentionKind>,

    #[serde(serialize_with = "snowflakes", skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<u64>,

    #[serde(serialize_with = "snowflakes", skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<u64>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub replied_user: bool,
}

fn snowflakes<S: Serializer>(ids: &[u64], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(ids.iter().map(u64::to_string))
}

impl AllowedMentions {
    /// Mention nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Check the combination rules Discord enforces.
    pub fn verify(&self) -> Result<(), ResponseError> {
        if self.parse.contains(&MentionKind::Users) && !self.users.is_empty() {
            return Err(ResponseError::InvalidMentionPolicy(
                "parse contains users, so users must be empty".into(),
            ));
        }
        if self.parse.contains(&MentionKind::Roles) && !self.roles.is_empty() {
            return Err(ResponseError::InvalidMentionPolicy(
                "parse contains roles, so roles must be empty".into(),
            ));
        }
        if self.users.len() > MAX_MENTION_IDS {
            return Err(ResponseError::InvalidMentionPolicy(format!(
                "{} users, over the limit of {MAX_MENTION_IDS}",
                self.users.len()
            )));
        }
        if self.roles.len() > MAX_MENTION_IDS {
            return Err(ResponseError::InvalidMentionPolicy(format!(
                "{} roles, over the limit of {MAX_MENTION_IDS}",
                self.roles.len()
            )));
        }
        Ok(())
    }
}

/// Message returned by Discord after an edit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SentMessage {
    pub id: String,
    #[serde(default)]
    pub channel_id: Option<String>,
}

#[derive(Serialize)]
struct AttachmentSlot<'a> {
    id: usize,
    filename: &'a str,
}

#[derive(Serialize)]
struct EditPayload<'a> {
    #[serde(flatten)]
    data: &'a EditMessageData,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<AttachmentSlot<'a>>,
}

/// Edits and deletes deferred interaction responses.
///
/// Cheap to clone and safe to share; holds no per-invocation state.
#[derive(Debug, Clone)]
pub struct ResponseEditor {
    http: reqwest::Client,
    api_base: String,
    application_id: u64,
}

impl ResponseEditor {
    pub fn new(http: reqwest::Client, api_base: impl Into<String>, application_id: u64) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            application_id,
        }
    }

    /// Edit the deferred response of the interaction behind `token`.
    pub async fn edit_initial(
        &self,
        token: &str,
        data: EditMessageData,
    ) -> Result<SentMessage, ResponseError> {
        self.edit_message_at(token, ORIGINAL_MESSAGE, data).await
    }

    /// Edit a follow-up message sent for the interaction behind `token`.
    pub async fn edit_message(
        &self,
        token: &str,
        message_id: u64,
        data: EditMessageData,
    ) -> Result<SentMessage, ResponseError> {
        self.edit_message_at(token, &message_id.to_string(), data)
            .await
    }

    /// Delete the deferred response of the interaction behind `token`.
    pub async fn delete_initial(&self, token: &str) -> Result<(), ResponseError> {
        self.delete_message_at(token, ORIGINAL_MESSAGE).await
    }

    /// Delete a follow-up message sent for the interaction behind `token`.
    pub async fn delete_message(&self, token: &str, message_id: u64) -> Result<(), ResponseError> {
        self.delete_message_at(token, &message_id.to_string()).await
    }

    fn message_url(&self, token: &str, message: &str) -> String {
        format!(
            "{}/webhooks/{}/{}/messages/{}",
            self.api_base, self.application_id, token, message
        )
    }

    async fn edit_message_at(
        &self,
        token: &str,
        message: &str,
        data: EditMessageData,
    ) -> Result<SentMessage, ResponseError> {
        validate(&data)?;

        let payload = EditPayload {
            data: &data,
            attachments: data
                .files
                .iter()
                .enumerate()
                .map(|(id, file)| AttachmentSlot {
                    id,
                    filename: &file.name,
                })
                .collect(),
        };

        let request = self.http.patch(self.message_url(token, message));
        let request = if data.files.is_empty() {
            request.json(&payload)
        } else {
            let payload_json = serde_json::to_string(&payload)
                .map_err(|error| ResponseError::EditFailed(error.to_string()))?;
            let mut form = reqwest::multipart::Form::new().text("payload_json", payload_json);
            for (index, file) in data.files.iter().enumerate() {
                let part = reqwest::multipart::Part::bytes(file.data.clone())
                    .file_name(file.name.clone());
                form = form.part(format!("files[{index}]"), part);
            }
            request.multipart(form)
        };

        let sent = request
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|error| ResponseError::EditFailed(error.to_string()))?
            .json::<SentMessage>()
            .await
            .map_err(|error| ResponseError::EditFailed(error.to_string()))?;

        tracing::debug!(message_id = %sent.id, files = data.files.len(), "edited interaction response");
        Ok(sent)
    }

    async fn delete_message_at(&self, token: &str, message: &str) -> Result<(), ResponseError> {
        self.http
            .delete(self.message_url(token, message))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|error| ResponseError::EditFailed(error.to_string()))?;

        tracing::debug!(%message, "deleted interaction response");
        Ok(())
    }
}

/// Local checks run before any request is made.
fn validate(data: &EditMessageData) -> Result<(), ResponseError> {
    if let Some(allowed_mentions) = &data.allowed_mentions {
        allowed_mentions.verify()?;
    }

    if let Some(embeds) = &data.embeds {
        if embeds.len() > MAX_EMBEDS {
            return Err(ResponseError::InvalidEmbed(format!(
                "{} embeds, over the limit of {MAX_EMBEDS}",
                embeds.len()
            )));
        }

        let mut total = 0;
        for embed in embeds {
            validate_embed(embed)?;
            total += embed_length(embed);
            if total > EMBED_TEXT_LIMIT {
                return Err(ResponseError::EmbedBudgetExceeded {
                    actual: total,
                    limit: EMBED_TEXT_LIMIT,
                });
            }
        }
    }

    Ok(())
}

impl DeferredResponse for ResponseEditor {
    async fn edit_original(&self, token: &str, data: EditMessageData) -> Result<(), ResponseError> {
        self.edit_initial(token, data).await.map(|_| ())
    }
}
