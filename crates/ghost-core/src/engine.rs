//! Conversation Engine
//!
//! The turn loop shared by every backend adapter:
//!
//! ```text
//! start ──► AwaitingBackendReply ──(tool calls)──► ProcessingToolCalls
//!                │      ▲                                  │
//!         (text) │      └──────────(results)───────────────┘
//!                ▼
//!        AwaitingHumanInput ──("" | "exit")──► Ended
//!                │
//!                └──(text)──► AwaitingBackendReply
//! ```
//!
//! Any backend or tool transport error leaves the loop immediately.

use tracing::Instrument;

use crate::console::Notice;
use crate::error::Result;
use crate::gateway::InvocationGateway;
use crate::message::Turn;
use crate::provider::{BackendReply, ChatOutcome, ToolOutput, TurnBackend, TurnInput};
use crate::session::ConversationState;
use crate::tool::ToolCallRequest;

/// Literal the human types to end the session (an empty line works too)
pub const EXIT_COMMAND: &str = "exit";

const HUMAN_PROMPT: &str = "> ";

enum Phase {
    AwaitingBackendReply(TurnInput),
    ProcessingToolCalls(Vec<ToolCallRequest>),
    AwaitingHumanInput,
    Ended,
}

impl Phase {
    const fn name(&self) -> &'static str {
        match self {
            Self::AwaitingBackendReply(_) => "awaiting_backend_reply",
            Self::ProcessingToolCalls(_) => "processing_tool_calls",
            Self::AwaitingHumanInput => "awaiting_human_input",
            Self::Ended => "ended",
        }
    }
}

pub struct ConversationEngine<'a> {
    gateway: &'a InvocationGateway,
}

impl<'a> ConversationEngine<'a> {
    pub const fn new(gateway: &'a InvocationGateway) -> Self {
        Self { gateway }
    }

    /// Run a session until the human ends it
    pub async fn run<B>(&self, backend: &mut B, prompt: &str, model: &str) -> Result<ChatOutcome>
    where
        B: TurnBackend + ?Sized,
    {
        let mut state = ConversationState::new(model);
        let span = tracing::info_span!("session", id = %state.id, model = %model);
        self.drive(backend, &mut state, prompt).instrument(span).await
    }

    async fn drive<B>(
        &self,
        backend: &mut B,
        state: &mut ConversationState,
        prompt: &str,
    ) -> Result<ChatOutcome>
    where
        B: TurnBackend + ?Sized,
    {
        let console = self.gateway.console();
        let mut last_text = String::new();

        state.push(Turn::human(prompt));
        let mut phase = Phase::AwaitingBackendReply(TurnInput::Human(prompt.to_string()));

        loop {
            tracing::trace!(phase = phase.name(), "Engine step");
            phase = match phase {
                Phase::AwaitingBackendReply(input) => {
                    console.busy(Some("Waiting for LLM response"));
                    let reply = backend.send(input).await;
                    console.busy(None);
                    let reply = reply?;

                    record_reply(state, &reply);
                    if !reply.text.is_empty() {
                        last_text.clone_from(&reply.text);
                        console.show(Notice::Assistant(reply.text.clone()));
                    }

                    if reply.tool_calls.is_empty() {
                        Phase::AwaitingHumanInput
                    } else {
                        Phase::ProcessingToolCalls(reply.tool_calls)
                    }
                }

                Phase::ProcessingToolCalls(calls) => {
                    let mut outputs = Vec::with_capacity(calls.len());
                    for call in calls {
                        let result = self.gateway.invoke(&call).await?;
                        let text = result.text_payload().to_string();
                        state.push(Turn::tool_result(&text, call.id.clone()));
                        outputs.push(ToolOutput {
                            call_id: call.id,
                            name: call.name,
                            text,
                        });
                    }
                    Phase::AwaitingBackendReply(TurnInput::ToolResults(outputs))
                }

                Phase::AwaitingHumanInput => {
                    let line = console.read_line(HUMAN_PROMPT).await?;
                    if line.is_empty() || line == EXIT_COMMAND {
                        Phase::Ended
                    } else {
                        state.push(Turn::human(&line));
                        Phase::AwaitingBackendReply(TurnInput::Human(line))
                    }
                }

                Phase::Ended => {
                    tracing::info!(turns = state.len(), tool_calls = state.tool_calls_made(), "Chat done");
                    return Ok(ChatOutcome {
                        final_text: last_text,
                        turns: state.len(),
                        tool_calls: state.tool_calls_made(),
                    });
                }
            };
        }
    }
}

/// Append the assistant turn and remember the continuation token
fn record_reply(state: &mut ConversationState, reply: &BackendReply) {
    if let Some(token) = &reply.continuation {
        tracing::info!(continuation = %token, "Conversation ID");
        state.set_continuation(token.clone());
    }
    if !reply.text.is_empty() || !reply.tool_calls.is_empty() {
        state.push(Turn::assistant(&reply.text));
    }
    tracing::debug!(
        tools = ?reply.tool_names(),
        text_len = reply.text.len(),
        "Backend reply"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::testing::ScriptedConsole;
    use crate::tool::testing::StubProvider;
    use crate::tool::{REFUSED_TEXT, ToolProvider, ToolRegistry};
    use crate::GhostError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Backend replaying canned replies and recording every input
    struct ScriptedBackend {
        replies: VecDeque<Result<BackendReply>>,
        inputs: Vec<TurnInput>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<BackendReply>>) -> Self {
            Self {
                replies: replies.into(),
                inputs: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl TurnBackend for ScriptedBackend {
        async fn send(&mut self, input: TurnInput) -> Result<BackendReply> {
            self.inputs.push(input);
            self.replies
                .pop_front()
                .unwrap_or_else(|| Err(GhostError::Provider("no more replies".into())))
        }
    }

    fn setup(stub: &Arc<StubProvider>, lines: &[&str]) -> (InvocationGateway, Arc<ScriptedConsole>) {
        let mut registry = ToolRegistry::new();
        let handle: Arc<dyn ToolProvider> = stub.clone();
        registry.register(&handle, stub.tools.clone());
        let console = Arc::new(ScriptedConsole::new(lines));
        (InvocationGateway::new(Arc::new(registry), console.clone()), console)
    }

    fn call(id: &str, name: &str) -> ToolCallRequest {
        ToolCallRequest::new(name, serde_json::Map::new()).with_id(id)
    }

    #[tokio::test]
    async fn test_tool_call_then_exit() {
        let stub = StubProvider::new("stub", &["ls"]);
        // confirm the call, then end the session
        let (gateway, console) = setup(&stub, &["", "exit"]);
        let mut backend = ScriptedBackend::new(vec![
            Ok(BackendReply::calls(vec![call("c1", "ls")])),
            Ok(BackendReply::text("two files")),
        ]);

        let outcome = ConversationEngine::new(&gateway)
            .run(&mut backend, "list files", "m")
            .await
            .unwrap();

        assert_eq!(stub.call_count(), 1);
        assert_eq!(outcome.final_text, "two files");
        assert_eq!(outcome.tool_calls, 1);
        assert_eq!(backend.inputs.len(), 2);
        assert_eq!(backend.inputs[0], TurnInput::Human("list files".into()));
        assert!(matches!(
            &backend.inputs[1],
            TurnInput::ToolResults(outs) if outs.len() == 1 && outs[0].call_id.as_deref() == Some("c1")
        ));
        assert!(console.notices().contains(&Notice::Assistant("two files".into())));
    }

    #[tokio::test]
    async fn test_empty_line_ends_session() {
        let stub = StubProvider::new("stub", &[]);
        let (gateway, _) = setup(&stub, &[""]);
        let mut backend = ScriptedBackend::new(vec![Ok(BackendReply::text("hi"))]);

        let outcome = ConversationEngine::new(&gateway)
            .run(&mut backend, "hello", "m")
            .await
            .unwrap();

        assert_eq!(outcome.turns, 2);
        assert_eq!(backend.inputs.len(), 1);
    }

    #[tokio::test]
    async fn test_follow_up_turn_is_sent() {
        let stub = StubProvider::new("stub", &[]);
        let (gateway, _) = setup(&stub, &["and then?", "exit"]);
        let mut backend = ScriptedBackend::new(vec![
            Ok(BackendReply::text("first")),
            Ok(BackendReply::text("second")),
        ]);

        let outcome = ConversationEngine::new(&gateway)
            .run(&mut backend, "hello", "m")
            .await
            .unwrap();

        assert_eq!(backend.inputs[1], TurnInput::Human("and then?".into()));
        assert_eq!(outcome.final_text, "second");
    }

    #[tokio::test]
    async fn test_batch_keeps_request_order() {
        let stub = StubProvider::new("stub", &["a", "b"]);
        // accept the first call, refuse the second, then leave
        let (gateway, _) = setup(&stub, &["", "no", ""]);
        let mut backend = ScriptedBackend::new(vec![
            Ok(BackendReply::calls(vec![call("1", "a"), call("2", "b")])),
            Ok(BackendReply::text("done")),
        ]);

        ConversationEngine::new(&gateway)
            .run(&mut backend, "go", "m")
            .await
            .unwrap();

        let TurnInput::ToolResults(outputs) = &backend.inputs[1] else {
            panic!("expected tool results");
        };
        let ids: Vec<_> = outputs.iter().map(|o| o.call_id.as_deref().unwrap()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(outputs[1].text, REFUSED_TEXT);
        assert_eq!(stub.call_count(), 1);
    }

    #[tokio::test]
    async fn test_backend_error_aborts() {
        let stub = StubProvider::new("stub", &[]);
        let (gateway, _) = setup(&stub, &[]);
        let mut backend =
            ScriptedBackend::new(vec![Err(GhostError::ProviderUnavailable("timeout".into()))]);

        let err = ConversationEngine::new(&gateway)
            .run(&mut backend, "hello", "m")
            .await
            .unwrap_err();

        assert!(matches!(err, GhostError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn test_tool_transport_error_aborts() {
        let stub = StubProvider::failing("stub", &["ls"]);
        let (gateway, _) = setup(&stub, &[""]);
        let mut backend = ScriptedBackend::new(vec![Ok(BackendReply::calls(vec![call("c1", "ls")]))]);

        let err = ConversationEngine::new(&gateway)
            .run(&mut backend, "list", "m")
            .await
            .unwrap_err();

        assert!(matches!(err, GhostError::ToolTransport { .. }));
        assert_eq!(backend.inputs.len(), 1);
    }

    #[test]
    fn test_record_reply_keeps_token_and_skips_empty_replies() {
        let mut state = ConversationState::new("m");

        record_reply(&mut state, &BackendReply::default());
        assert!(state.is_empty());

        let reply = BackendReply {
            continuation: Some("resp_1".into()),
            ..BackendReply::calls(vec![call("c1", "ls")])
        };
        record_reply(&mut state, &reply);
        assert_eq!(state.len(), 1);
        assert_eq!(state.continuation(), Some("resp_1"));
    }
}
