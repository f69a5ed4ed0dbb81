//! Session management and the tool-calling orchestration loop.

use tracing::{debug, info, warn};

use crate::Result;
use crate::backend::{BackendTool, LlmBackend};
use crate::tools::{ToolDispatch, convert_tools};
use crate::transcript::{SessionId, Transcript, Turn};

/// Hard cap on inference passes per query. The backend could request tools
/// indefinitely; the cap is the sole circuit breaker.
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// Fixed reply returned when a query exhausts the iteration cap.
pub const EXHAUSTED_MESSAGE: &str =
    "I apologize, but I couldn't complete your request after multiple attempts.";

/// A conversation session.
///
/// Owns the transcript exclusively: the orchestration loop is the only
/// mutator, and one query is fully resolved before the next is accepted.
pub struct Session<B, T> {
    pub id: SessionId,
    backend: B,
    dispatch: T,
    tools: Vec<BackendTool>,
    transcript: Transcript,
    max_iterations: usize,
}

impl<B: LlmBackend, T: ToolDispatch> Session<B, T> {
    /// Create a session over a backend, a tool dispatcher, and the
    /// provider-declared tool descriptors (converted once and cached for the
    /// session's lifetime).
    pub fn new(backend: B, dispatch: T, descriptors: &[mcp::Tool]) -> Result<Self> {
        let tools = convert_tools(descriptors)?;
        let id = SessionId::new();
        info!(session = %id, tools = tools.len(), "session created");

        Ok(Self {
            id,
            backend,
            dispatch,
            tools,
            transcript: Transcript::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        })
    }

    /// Set the system prompt. Appended as the first transcript turn, so it
    /// must be called before the first query.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.transcript.append(Turn::system(system));
        self
    }

    /// Adjust the iteration cap (a tuning point, default 5).
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Read-only view of the conversation history.
    pub fn transcript(&self) -> &[Turn] {
        self.transcript.snapshot()
    }

    /// Process one user query to completion.
    ///
    /// Alternates inference and tool dispatch until the model produces a
    /// text-only answer or the iteration cap is reached. A backend error
    /// aborts the query (not the session): history up to and including this
    /// query's user turn remains, so a retried query sees prior context.
    pub async fn chat(&mut self, user_input: &str) -> Result<String> {
        self.transcript.append(Turn::user(user_input));

        let tools = if self.tools.is_empty() {
            None
        } else {
            Some(self.tools.as_slice())
        };

        for iteration in 1..=self.max_iterations {
            debug!(session = %self.id, iteration, "inference pass");

            let response = self.backend.chat(self.transcript.snapshot(), tools).await?;

            if response.tool_calls.is_empty() {
                debug!(session = %self.id, "final answer received");
                self.transcript.append(Turn::assistant(&response.content));
                return Ok(response.content);
            }

            info!(
                session = %self.id,
                calls = response.tool_calls.len(),
                "tool calls requested"
            );

            let calls = response.tool_calls;
            self.transcript
                .append(Turn::assistant_with_calls(response.content, calls.clone()));

            // Dispatch sequentially in request order so the model's next
            // view of history is deterministic. A per-call failure never
            // stops the rest of the batch.
            for call in &calls {
                let outcome = self
                    .dispatch
                    .call(&call.function.name, &call.function.arguments)
                    .await;

                if outcome.is_error() {
                    warn!(session = %self.id, tool = %call.function.name, "tool call failed");
                }

                self.transcript.append(Turn::tool(outcome.transcript_text()));
            }
        }

        warn!(session = %self.id, cap = self.max_iterations, "iteration cap reached");
        Ok(EXHAUSTED_MESSAGE.to_string())
    }

    /// Tear down the backend and the tool-provider connection.
    ///
    /// Both teardowns are always attempted; neither can fail the other.
    pub async fn shutdown(self) {
        self.backend.close().await;
        self.dispatch.shutdown().await;
        info!(session = %self.id, "session ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ChatResponse;
    use crate::tools::ToolOutcome;
    use crate::transcript::{FunctionCall, Role, ToolCall};
    use serde_json::{Map, Value, json};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend double that replays a script of responses.
    struct ScriptedBackend {
        script: Mutex<Vec<Result<ChatResponse>>>,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<ChatResponse>>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl LlmBackend for ScriptedBackend {
        async fn chat(
            &self,
            _transcript: &[Turn],
            _tools: Option<&[BackendTool]>,
        ) -> Result<ChatResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                // Past the end of the script the model keeps asking for the
                // same tool, which exercises the iteration cap.
                return Ok(tool_call_response("looping_tool"));
            }
            script.remove(0)
        }

        async fn close(&self) {}
    }

    /// Dispatcher double that records invocations and fails on demand.
    struct RecordingDispatch {
        invoked: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl RecordingDispatch {
        fn new() -> Self {
            Self {
                invoked: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }

        fn failing_on(name: &str) -> Self {
            Self {
                invoked: Mutex::new(Vec::new()),
                fail_on: Some(name.to_string()),
            }
        }

        fn invocations(&self) -> Vec<String> {
            self.invoked.lock().unwrap().clone()
        }
    }

    impl ToolDispatch for RecordingDispatch {
        async fn call(&self, name: &str, _arguments: &Map<String, Value>) -> ToolOutcome {
            self.invoked.lock().unwrap().push(name.to_string());
            if self.fail_on.as_deref() == Some(name) {
                ToolOutcome::error(format!("tool '{name}' exploded"))
            } else {
                ToolOutcome::Success(crate::tools::ToolPayload::Json(json!({"ok": name})))
            }
        }

        async fn shutdown(&self) {}
    }

    fn tool_call_response(name: &str) -> ChatResponse {
        ChatResponse {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: None,
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: Map::new(),
                },
            }],
        }
    }

    fn text_response(content: &str) -> ChatResponse {
        ChatResponse {
            content: content.to_string(),
            tool_calls: Vec::new(),
        }
    }

    fn descriptors() -> Vec<mcp::Tool> {
        vec![mcp::Tool {
            name: "get_current_weather".to_string(),
            description: Some("Current weather for a city".to_string()),
            input_schema: json!({"type": "object"}),
        }]
    }

    fn session(
        backend: ScriptedBackend,
        dispatch: RecordingDispatch,
    ) -> Session<ScriptedBackend, RecordingDispatch> {
        Session::new(backend, dispatch, &descriptors()).unwrap()
    }

    #[tokio::test]
    async fn text_only_query_appends_two_turns() {
        let backend = ScriptedBackend::new(vec![Ok(text_response("22 degrees"))]);
        let mut session = session(backend, RecordingDispatch::new());

        let answer = session.chat("weather in London?").await.unwrap();

        assert_eq!(answer, "22 degrees");
        assert_eq!(session.backend.call_count(), 1);
        let roles: Vec<Role> = session.transcript().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn one_tool_round_appends_four_turns() {
        let backend = ScriptedBackend::new(vec![
            Ok(tool_call_response("get_current_weather")),
            Ok(text_response("sunny, 22C")),
        ]);
        let mut session = session(backend, RecordingDispatch::new());

        let answer = session.chat("weather in London?").await.unwrap();

        assert_eq!(answer, "sunny, 22C");
        assert_eq!(session.backend.call_count(), 2);
        assert_eq!(session.dispatch.invocations(), vec!["get_current_weather"]);
        let roles: Vec<Role> = session.transcript().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
        // The intermediate assistant turn carries the call batch.
        assert!(session.transcript()[1].tool_calls.is_some());
    }

    #[tokio::test]
    async fn batch_of_k_calls_appends_k_tool_turns_in_order() {
        let batch = ChatResponse {
            content: String::new(),
            tool_calls: ["a", "b", "c"]
                .iter()
                .map(|n| ToolCall {
                    id: None,
                    function: FunctionCall {
                        name: n.to_string(),
                        arguments: Map::new(),
                    },
                })
                .collect(),
        };
        let backend = ScriptedBackend::new(vec![Ok(batch), Ok(text_response("done"))]);
        // "b" fails, but "c" still runs and order is preserved.
        let mut session = session(backend, RecordingDispatch::failing_on("b"));

        session.chat("go").await.unwrap();

        assert_eq!(session.dispatch.invocations(), vec!["a", "b", "c"]);
        let tool_turns: Vec<&Turn> = session
            .transcript()
            .iter()
            .filter(|t| t.role == Role::Tool)
            .collect();
        assert_eq!(tool_turns.len(), 3);
        let failed: Value = serde_json::from_str(&tool_turns[1].content).unwrap();
        assert_eq!(failed["error"], "tool 'b' exploded");
    }

    #[tokio::test]
    async fn iteration_cap_returns_exhaustion_message() {
        // Empty script: every pass requests another tool call.
        let backend = ScriptedBackend::new(Vec::new());
        let mut session = session(backend, RecordingDispatch::new());

        let answer = session.chat("loop forever").await.unwrap();

        assert_eq!(answer, EXHAUSTED_MESSAGE);
        assert_eq!(session.backend.call_count(), DEFAULT_MAX_ITERATIONS);
        // No synthesized assistant turn after exhaustion: the last turn is
        // the final batch's tool result.
        assert_eq!(session.transcript().last().unwrap().role, Role::Tool);
    }

    #[tokio::test]
    async fn backend_error_aborts_query_but_keeps_history() {
        let backend = ScriptedBackend::new(vec![
            Err(crate::Error::Timeout("deadline".to_string())),
            Ok(text_response("recovered")),
        ]);
        let mut session = session(backend, RecordingDispatch::new());

        assert!(session.chat("first").await.is_err());
        // The failed attempt's user turn remains.
        assert_eq!(session.transcript().len(), 1);

        let answer = session.chat("second").await.unwrap();
        assert_eq!(answer, "recovered");
        assert_eq!(session.transcript().len(), 3);
    }

    #[tokio::test]
    async fn system_prompt_is_first_turn() {
        let backend = ScriptedBackend::new(vec![Ok(text_response("hi"))]);
        let mut session =
            session(backend, RecordingDispatch::new()).with_system("You are a weather assistant.");

        session.chat("hello").await.unwrap();
        assert_eq!(session.transcript()[0].role, Role::System);
    }

    #[tokio::test]
    async fn custom_iteration_cap_is_honored() {
        let backend = ScriptedBackend::new(Vec::new());
        let mut session = session(backend, RecordingDispatch::new()).with_max_iterations(2);

        let answer = session.chat("loop").await.unwrap();
        assert_eq!(answer, EXHAUSTED_MESSAGE);
        assert_eq!(session.backend.call_count(), 2);
    }
}
