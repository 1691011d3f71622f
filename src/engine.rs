//! External media engine seam and the subprocess-backed engine.

use crate::error::ConfigError;
use crate::pipeline::EditArgs;

use std::path::Path;
use std::process::Stdio;
use tempfile::TempPath;
use tokio::io::AsyncSeekExt as _;
use tokio::process::Command;

/// Input class the engine expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Image,
    Video,
}

impl InputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputKind::Image => "image",
            InputKind::Video => "video",
        }
    }
}

impl std::fmt::Display for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error reported by the engine. The message is shown to the user as-is.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct EngineError(pub String);

/// Downloaded source media, staged in a uniquely named temp file.
///
/// The file is removed from disk when this value is dropped.
#[derive(Debug)]
pub struct StagedMedia {
    file: tokio::fs::File,
    path: TempPath,
}

impl StagedMedia {
    /// Create an empty `editbot.*` temp file.
    pub fn create() -> std::io::Result<Self> {
        let (file, path) = tempfile::Builder::new()
            .prefix("editbot.")
            .tempfile()?
            .into_parts();

        Ok(Self {
            file: tokio::fs::File::from_std(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_mut(&mut self) -> &mut tokio::fs::File {
        &mut self.file
    }

    /// Flush pending writes and seek back to the start.
    pub async fn rewind(&mut self) -> std::io::Result<()> {
        use tokio::io::AsyncWriteExt as _;

        self.file.flush().await?;
        self.file.seek(std::io::SeekFrom::Start(0)).await?;
        Ok(())
    }

    /// A blocking handle sharing this file's cursor, for use as child stdin.
    pub async fn std_handle(&self) -> std::io::Result<std::fs::File> {
        Ok(self.file.try_clone().await?.into_std().await)
    }
}

/// File produced by the engine. Removed from disk when dropped.
#[derive(Debug)]
pub struct OutputFile {
    path: TempPath,
}

impl OutputFile {
    /// Create an empty `editbot-out.*.mp4` temp file for the engine to fill.
    pub fn create() -> std::io::Result<Self> {
        let path = tempfile::Builder::new()
            .prefix("editbot-out.")
            .suffix(".mp4")
            .tempfile()?
            .into_temp_path();

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

/// The media-processing engine.
pub trait MediaEngine: Send + Sync + 'static {
    /// Transform `source` according to `args`.
    ///
    /// `source` is positioned at its start when this is called.
    fn process(
        &self,
        args: &EditArgs,
        kind: InputKind,
        source: &mut StagedMedia,
    ) -> impl std::future::Future<Output = Result<OutputFile, EngineError>> + Send;
}

/// Runs an external program once per edit.
///
/// Invoked as `{program} [leading args] --input {image|video} --output {path}
/// {edit words...}` with the staged media on stdin. A non-zero exit turns the
/// program's stderr into the user-facing error.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    leading_args: Vec<String>,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>, leading_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            leading_args,
        }
    }

    /// Build from a shell-style command line such as `vedit --quiet`.
    pub fn from_command_line(command_line: &str) -> Result<Self, ConfigError> {
        let mut words = shlex::split(command_line)
            .ok_or_else(|| {
                ConfigError::Invalid(format!("unbalanced quotes in engine command: {command_line}"))
            })?
            .into_iter();

        let program = words
            .next()
            .ok_or_else(|| ConfigError::Invalid("engine command is empty".into()))?;

        Ok(Self::new(program, words.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl MediaEngine for CommandEngine {
    async fn process(
        &self,
        args: &EditArgs,
        kind: InputKind,
        source: &mut StagedMedia,
    ) -> Result<OutputFile, EngineError> {
        let output_file = OutputFile::create()
            .map_err(|error| EngineError(format!("failed to create engine output: {error}")))?;
        let stdin = source
            .std_handle()
            .await
            .map_err(|error| EngineError(format!("failed to open staged media: {error}")))?;

        tracing::debug!(
            program = %self.program,
            input = %kind,
            words = args.words().len(),
            "running media engine"
        );

        let output = Command::new(&self.program)
            .args(&self.leading_args)
            .arg("--input")
            .arg(kind.as_str())
            .arg("--output")
            .arg(output_file.path())
            .args(args.words())
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|error| {
                EngineError(format!("failed to run engine `{}`: {error}", self.program))
            })?;

        if output.status.success() {
            return Ok(output_file);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        tracing::debug!(status = %output.status, %stderr, "media engine rejected edit");

        if stderr.is_empty() {
            Err(EngineError(format!(
                "engine exited with status {}",
                output.status.code().unwrap_or(-1)
            )))
        } else {
            Err(EngineError(stderr))
        }
    }
}
