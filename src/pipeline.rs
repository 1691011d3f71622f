//! The edit pipeline: parse, resolve, download, hand off to the engine.

use crate::EditInvocation;
use crate::engine::{MediaEngine, OutputFile, StagedMedia};
use crate::error::EditError;
use crate::media::MediaResolver;
use crate::messaging::traits::ChannelHistory;

use std::sync::Arc;
use tokio::io::AsyncWriteExt as _;

/// Edit-spec split into engine arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditArgs {
    words: Vec<String>,
}

impl EditArgs {
    /// Split an edit-spec into shell-style words. Quotes group words.
    pub fn parse(spec: &str) -> Result<Self, EditError> {
        let words = shlex::split(spec)
            .ok_or_else(|| EditError::InvalidEditSpec("unbalanced quotes".into()))?;

        if words.is_empty() {
            return Err(EditError::InvalidEditSpec("no edits given".into()));
        }

        Ok(Self { words })
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }
}

/// Runs one edit invocation end to end, up to the engine's output file.
///
/// Holds no per-invocation state; a single pipeline serves concurrent
/// invocations.
pub struct EditPipeline<H, E> {
    resolver: MediaResolver<H>,
    engine: Arc<E>,
    http: reqwest::Client,
}

impl<H, E> EditPipeline<H, E>
where
    H: ChannelHistory,
    E: MediaEngine,
{
    pub fn new(history: Arc<H>, engine: Arc<E>, http: reqwest::Client) -> Self {
        Self {
            resolver: MediaResolver::new(history),
            engine,
            http,
        }
    }

    /// Produce the edited media for `invocation`.
    ///
    /// The staged source file is removed before this returns, whatever the
    /// outcome. The returned output file is removed when dropped.
    pub async fn edit(&self, invocation: &EditInvocation) -> Result<OutputFile, EditError> {
        let args = EditArgs::parse(&invocation.edit_spec)?;
        let media = self.resolver.find_media(invocation.channel_id).await?;
        let input_kind = media.kind.input_kind();

        let mut source = self.download(&media.url).await?;

        tracing::info!(
            interaction_id = invocation.interaction_id,
            kind = ?media.kind,
            input = %input_kind,
            "processing media"
        );

        self.engine
            .process(&args, input_kind, &mut source)
            .await
            .map_err(|error| EditError::ProcessingFailed(error.0))
    }

    /// Stream `url` into a fresh temp file, rewound to its start.
    async fn download(&self, url: &str) -> Result<StagedMedia, EditError> {
        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|error| EditError::MediaFetchFailed(error.to_string()))?;

        let mut staged = StagedMedia::create()?;
        let mut written = 0usize;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|error| EditError::MediaFetchFailed(error.to_string()))?
        {
            staged.file_mut().write_all(&chunk).await?;
            written += chunk.len();
        }

        staged.rewind().await?;

        tracing::debug!(bytes = written, path = %staged.path().display(), "staged media");
        Ok(staged)
    }
}
