//! Interaction controller: defer, run the pipeline, deliver one final edit.

use crate::engine::MediaEngine;
use crate::messaging::response::{EditMessageData, ResponseFile};
use crate::messaging::traits::{ChannelHistory, DeferredResponse, InteractionAcknowledger};
use crate::pipeline::EditPipeline;
use crate::{EDIT_COMMAND, EditInvocation};

use std::sync::Arc;

/// Filename of the uploaded result.
pub const OUTPUT_FILENAME: &str = "out.mp4";

/// Lifecycle of one invocation. `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Received,
    Deferred,
    Resolving,
    Succeeded,
    Failed,
}

/// Handles `/edit` invocations.
///
/// Every handled invocation gets exactly one final response edit: the result
/// file on success, the error text otherwise.
pub struct InteractionController<P, E, R> {
    platform: Arc<P>,
    pipeline: EditPipeline<P, E>,
    responses: Arc<R>,
}

impl<P, E, R> InteractionController<P, E, R>
where
    P: ChannelHistory + InteractionAcknowledger,
    E: MediaEngine,
    R: DeferredResponse,
{
    pub fn new(platform: Arc<P>, engine: Arc<E>, responses: Arc<R>, http: reqwest::Client) -> Self {
        Self {
            pipeline: EditPipeline::new(platform.clone(), engine, http),
            platform,
            responses,
        }
    }

    /// Handle a command event. Returns `None` for commands this bot does not own.
    pub async fn handle(&self, command: &str, invocation: EditInvocation) -> Option<InvocationState> {
        if command != EDIT_COMMAND {
            tracing::debug!(%command, "ignoring unknown command");
            return None;
        }

        let mut state = InvocationState::Received;
        tracing::info!(
            interaction_id = invocation.interaction_id,
            channel_id = invocation.channel_id,
            edit_spec = %invocation.edit_spec,
            "edit command received"
        );

        // The platform only waits a few seconds for this acknowledgment.
        if let Err(error) = self
            .platform
            .defer(invocation.interaction_id, &invocation.interaction_token)
            .await
        {
            tracing::warn!(%error, interaction_id = invocation.interaction_id, "failed to defer interaction");
        }
        advance(&invocation, &mut state, InvocationState::Deferred);

        advance(&invocation, &mut state, InvocationState::Resolving);
        let (output, data, outcome) = match self.pipeline.edit(&invocation).await {
            Ok(output) => match output.read().await {
                Ok(bytes) => {
                    let file = ResponseFile {
                        name: OUTPUT_FILENAME.into(),
                        data: bytes,
                    };
                    (Some(output), EditMessageData::file(file), InvocationState::Succeeded)
                }
                Err(error) => (
                    None,
                    EditMessageData::text(format!("failed to read edited media: {error}")),
                    InvocationState::Failed,
                ),
            },
            Err(error) => {
                tracing::info!(%error, interaction_id = invocation.interaction_id, "edit failed");
                (None, EditMessageData::text(error.to_string()), InvocationState::Failed)
            }
        };

        if let Err(error) = self
            .responses
            .edit_original(&invocation.interaction_token, data)
            .await
        {
            tracing::error!(%error, interaction_id = invocation.interaction_id, "failed to deliver final response");
        }

        // Uploaded (or abandoned); remove it from disk.
        drop(output);

        advance(&invocation, &mut state, outcome);
        Some(state)
    }
}

fn advance(invocation: &EditInvocation, state: &mut InvocationState, next: InvocationState) {
    tracing::debug!(
        interaction_id = invocation.interaction_id,
        from = ?state,
        to = ?next,
        "invocation state changed"
    );
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::response::AllowedMentions;
    use crate::testing::{
        CallLog, FakeEngine, FakePlatform, RecordingResponses, gif_message, spawn_media_server,
    };

    fn invocation(spec: &str) -> EditInvocation {
        EditInvocation {
            edit_spec: spec.into(),
            channel_id: 7,
            interaction_id: 99,
            interaction_token: "interaction-token".into(),
        }
    }

    struct Harness {
        controller: InteractionController<FakePlatform, FakeEngine, RecordingResponses>,
        engine: Arc<FakeEngine>,
        responses: Arc<RecordingResponses>,
        log: CallLog,
    }

    fn harness(platform: FakePlatform, engine: FakeEngine, failing_edit: bool) -> Harness {
        let log = CallLog::default();
        let platform = Arc::new(platform.with_log(log.clone()));
        let engine = Arc::new(engine.with_log(log.clone()));
        let responses = Arc::new(if failing_edit {
            RecordingResponses::failing(log.clone())
        } else {
            RecordingResponses::new(log.clone())
        });

        Harness {
            controller: InteractionController::new(
                platform,
                engine.clone(),
                responses.clone(),
                reqwest::Client::new(),
            ),
            engine,
            responses,
            log,
        }
    }

    fn log_entries(log: &CallLog) -> Vec<String> {
        log.lock().expect("call log lock").clone()
    }

    #[tokio::test]
    async fn uploads_engine_output_as_sole_final_edit() {
        let server = spawn_media_server().await;
        let harness = harness(
            FakePlatform::with_messages(vec![gif_message(1, &format!("{server}/media/cat.gif"))]),
            FakeEngine::succeeding(b"edited-gif"),
            false,
        );

        let state = harness
            .controller
            .handle("edit", invocation("crop 0,0,100,100"))
            .await;

        assert_eq!(state, Some(InvocationState::Succeeded));

        let edits = harness.responses.edits();
        assert_eq!(edits.len(), 1);
        let (token, data) = &edits[0];
        assert_eq!(token, "interaction-token");
        assert_eq!(data.content, None);
        assert_eq!(data.allowed_mentions, Some(AllowedMentions::none()));
        assert_eq!(
            data.files,
            vec![ResponseFile {
                name: "out.mp4".into(),
                data: b"edited-gif".to_vec(),
            }]
        );

        let calls = harness.engine.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].kind, crate::engine::InputKind::Image);
        assert_eq!(calls[0].words, vec!["crop", "0,0,100,100"]);

        assert_eq!(
            log_entries(&harness.log),
            vec![
                "defer 99",
                "history 7 limit 25",
                "engine image",
                "edit interaction-token",
            ]
        );
    }

    #[tokio::test]
    async fn engine_failure_produces_exactly_one_text_edit() {
        let server = spawn_media_server().await;
        let harness = harness(
            FakePlatform::with_messages(vec![gif_message(1, &format!("{server}/media/cat.gif"))]),
            FakeEngine::failing("crop rectangle is outside the frame"),
            false,
        );

        let state = harness
            .controller
            .handle("edit", invocation("crop 0,0,9999,9999"))
            .await;

        assert_eq!(state, Some(InvocationState::Failed));

        let edits = harness.responses.edits();
        assert_eq!(edits.len(), 1);
        assert_eq!(
            edits[0].1.content.as_deref(),
            Some("crop rectangle is outside the frame")
        );
        assert!(edits[0].1.files.is_empty());
    }

    #[tokio::test]
    async fn error_text_never_pings() {
        let server = spawn_media_server().await;
        let harness = harness(
            FakePlatform::with_messages(vec![gif_message(1, &format!("{server}/media/cat.gif"))]),
            FakeEngine::failing("unknown edit \"@everyone\""),
            false,
        );

        harness
            .controller
            .handle("edit", invocation("@everyone"))
            .await;

        let edits = harness.responses.edits();
        assert_eq!(edits.len(), 1);
        assert_eq!(
            edits[0].1.content.as_deref(),
            Some("unknown edit \"@everyone\"")
        );
        assert_eq!(edits[0].1.allowed_mentions, Some(AllowedMentions::none()));
    }

    #[tokio::test]
    async fn missing_media_is_reported_as_text() {
        let harness = harness(
            FakePlatform::with_messages(Vec::new()),
            FakeEngine::succeeding(b"unused"),
            false,
        );

        let state = harness.controller.handle("edit", invocation("reverse")).await;

        assert_eq!(state, Some(InvocationState::Failed));
        let edits = harness.responses.edits();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].1.content.as_deref(), Some("no media found"));
        assert!(harness.engine.calls().is_empty());
    }

    #[tokio::test]
    async fn defer_precedes_everything_even_for_bad_specs() {
        let harness = harness(
            FakePlatform::with_messages(Vec::new()),
            FakeEngine::succeeding(b"unused"),
            false,
        );

        let state = harness.controller.handle("edit", invocation("")).await;

        assert_eq!(state, Some(InvocationState::Failed));
        assert_eq!(
            log_entries(&harness.log),
            vec!["defer 99", "edit interaction-token"]
        );
        let edits = harness.responses.edits();
        assert_eq!(
            edits[0].1.content.as_deref(),
            Some("invalid edit spec: no edits given")
        );
    }

    #[tokio::test]
    async fn failed_defer_still_attempts_one_edit() {
        let harness = harness(
            FakePlatform::with_messages(Vec::new()).failing_defer(),
            FakeEngine::succeeding(b"unused"),
            false,
        );

        harness.controller.handle("edit", invocation("reverse")).await;

        assert_eq!(harness.responses.edits().len(), 1);
    }

    #[tokio::test]
    async fn failed_final_edit_is_not_retried() {
        let harness = harness(
            FakePlatform::with_messages(Vec::new()),
            FakeEngine::succeeding(b"unused"),
            true,
        );

        let state = harness.controller.handle("edit", invocation("reverse")).await;

        assert_eq!(state, Some(InvocationState::Failed));
        assert_eq!(harness.responses.edits().len(), 1);
    }

    #[tokio::test]
    async fn ignores_other_commands() {
        let harness = harness(
            FakePlatform::with_messages(Vec::new()),
            FakeEngine::succeeding(b"unused"),
            false,
        );

        let state = harness.controller.handle("ping", invocation("reverse")).await;

        assert_eq!(state, None);
        assert!(log_entries(&harness.log).is_empty());
    }

    #[tokio::test]
    async fn concurrent_invocations_are_independent() {
        let server = spawn_media_server().await;
        let harness = Arc::new(harness(
            FakePlatform::with_messages(vec![gif_message(1, &format!("{server}/media/cat.gif"))]),
            FakeEngine::succeeding(b"edited"),
            false,
        ));

        let tasks: Vec<_> = (0..4)
            .map(|index| {
                let harness = harness.clone();
                tokio::spawn(async move {
                    let mut invocation = invocation("reverse");
                    invocation.interaction_id = index;
                    invocation.interaction_token = format!("token-{index}");
                    harness.controller.handle("edit", invocation).await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(
                task.await.expect("task should join"),
                Some(InvocationState::Succeeded)
            );
        }

        let mut tokens: Vec<String> = harness
            .responses
            .edits()
            .into_iter()
            .map(|(token, _)| token)
            .collect();
        tokens.sort();
        assert_eq!(tokens, vec!["token-0", "token-1", "token-2", "token-3"]);

        let calls = harness.engine.calls();
        assert_eq!(calls.len(), 4);
        for call in &calls {
            assert!(!call.source_path.exists());
        }
    }
}
