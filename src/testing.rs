//! In-memory platform and engine fakes plus a local media server for tests.

use crate::engine::{EngineError, InputKind, MediaEngine, OutputFile, StagedMedia};
use crate::error::{Error, ResponseError};
use crate::messaging::response::EditMessageData;
use crate::messaging::traits::{ChannelHistory, DeferredResponse, InteractionAcknowledger};
use crate::pipeline::EditArgs;
use crate::{ChannelMessage, MessageAttachment};

use axum::Router;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncReadExt as _;

/// Size of the `/large.mp4` body served by [`spawn_media_server`].
pub const LARGE_MEDIA_LEN: usize = 512 * 1024;

/// Shared, ordered record of calls across fakes.
pub type CallLog = Arc<Mutex<Vec<String>>>;

fn push(log: &CallLog, entry: String) {
    log.lock().expect("call log lock").push(entry);
}

/// A message with a single GIF attachment of height 50.
pub fn gif_message(id: u64, url: &str) -> ChannelMessage {
    ChannelMessage {
        id,
        attachments: vec![MessageAttachment {
            proxy_url: url.into(),
            width: 80,
            height: 50,
        }],
        embeds: Vec::new(),
    }
}

/// Channel history and acknowledgment backed by a fixed message list.
pub struct FakePlatform {
    messages: Vec<ChannelMessage>,
    fail_history: bool,
    fail_defer: bool,
    log: CallLog,
}

impl FakePlatform {
    pub fn with_messages(messages: Vec<ChannelMessage>) -> Self {
        Self {
            messages,
            fail_history: false,
            fail_defer: false,
            log: CallLog::default(),
        }
    }

    pub fn failing_history() -> Self {
        Self {
            fail_history: true,
            ..Self::with_messages(Vec::new())
        }
    }

    pub fn failing_defer(mut self) -> Self {
        self.fail_defer = true;
        self
    }

    /// Share a call log with other fakes to check cross-component ordering.
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().expect("call log lock").clone()
    }
}

impl ChannelHistory for FakePlatform {
    async fn recent_messages(&self, channel_id: u64, limit: u8) -> crate::Result<Vec<ChannelMessage>> {
        push(&self.log, format!("history {channel_id} limit {limit}"));

        if self.fail_history {
            return Err(Error::Other(anyhow::anyhow!("missing access")));
        }

        Ok(self
            .messages
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

impl InteractionAcknowledger for FakePlatform {
    async fn defer(&self, interaction_id: u64, _token: &str) -> crate::Result<()> {
        push(&self.log, format!("defer {interaction_id}"));

        if self.fail_defer {
            return Err(Error::Other(anyhow::anyhow!("unknown interaction")));
        }
        Ok(())
    }
}

/// Records every deferred-response edit it is asked to make.
pub struct RecordingResponses {
    edits: Mutex<Vec<(String, EditMessageData)>>,
    fail: bool,
    log: CallLog,
}

impl RecordingResponses {
    pub fn new(log: CallLog) -> Self {
        Self {
            edits: Mutex::new(Vec::new()),
            fail: false,
            log,
        }
    }

    pub fn failing(log: CallLog) -> Self {
        Self {
            fail: true,
            ..Self::new(log)
        }
    }

    pub fn edits(&self) -> Vec<(String, EditMessageData)> {
        self.edits.lock().expect("edits lock").clone()
    }
}

impl DeferredResponse for RecordingResponses {
    async fn edit_original(&self, token: &str, data: EditMessageData) -> Result<(), ResponseError> {
        push(&self.log, format!("edit {token}"));
        self.edits
            .lock()
            .expect("edits lock")
            .push((token.to_string(), data));

        if self.fail {
            return Err(ResponseError::EditFailed("interaction expired".into()));
        }
        Ok(())
    }
}

/// One recorded engine invocation.
#[derive(Debug, Clone)]
pub struct EngineCall {
    pub words: Vec<String>,
    pub kind: InputKind,
    pub source_path: PathBuf,
    pub source: Vec<u8>,
}

enum EngineBehavior {
    Succeed(Vec<u8>),
    Fail(String),
}

/// Engine that reads its whole input and returns a canned result.
pub struct FakeEngine {
    behavior: EngineBehavior,
    calls: Mutex<Vec<EngineCall>>,
    log: CallLog,
}

impl FakeEngine {
    pub fn succeeding(output: &[u8]) -> Self {
        Self {
            behavior: EngineBehavior::Succeed(output.to_vec()),
            calls: Mutex::new(Vec::new()),
            log: CallLog::default(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            behavior: EngineBehavior::Fail(message.into()),
            ..Self::succeeding(b"")
        }
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().expect("engine calls lock").clone()
    }
}

impl MediaEngine for FakeEngine {
    async fn process(
        &self,
        args: &EditArgs,
        kind: InputKind,
        source: &mut StagedMedia,
    ) -> Result<OutputFile, EngineError> {
        let mut bytes = Vec::new();
        source
            .file_mut()
            .read_to_end(&mut bytes)
            .await
            .map_err(|error| EngineError(error.to_string()))?;

        push(&self.log, format!("engine {kind}"));
        self.calls.lock().expect("engine calls lock").push(EngineCall {
            words: args.words().to_vec(),
            kind,
            source_path: source.path().to_path_buf(),
            source: bytes,
        });

        match &self.behavior {
            EngineBehavior::Succeed(output) => {
                let file = OutputFile::create().map_err(|error| EngineError(error.to_string()))?;
                tokio::fs::write(file.path(), output)
                    .await
                    .map_err(|error| EngineError(error.to_string()))?;
                Ok(file)
            }
            EngineBehavior::Fail(message) => Err(EngineError(message.clone())),
        }
    }
}

/// Serve media on an ephemeral local port and return its base URL.
///
/// `/media/{name}` answers `media:{name}`, `/large.mp4` answers
/// [`LARGE_MEDIA_LEN`] bytes of `v`, anything else is a 404.
pub async fn spawn_media_server() -> String {
    async fn media(Path(name): Path<String>) -> impl IntoResponse {
        format!("media:{name}")
    }

    async fn large() -> impl IntoResponse {
        vec![b'v'; LARGE_MEDIA_LEN]
    }

    async fn missing() -> impl IntoResponse {
        (StatusCode::NOT_FOUND, "not found")
    }

    let app = Router::new()
        .route("/media/{name}", get(media))
        .route("/large.mp4", get(large))
        .fallback(missing);

    spawn_server(app).await
}

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("test listener should bind");
    let address = listener.local_addr().expect("listener should have an address");

    tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("test server should run");
    });

    format!("http://{address}")
}
