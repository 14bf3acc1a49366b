//! Streaming response bridge
//!
//! Turns the conversation history into a lazy, cancellable stream of
//! [`StreamEvent`]s: text is forwarded as soon as it arrives, an `end_call`
//! function call ends the stream, and in goodbye-prompt mode a reply ending
//! in "Goodbye!" is followed by a final hang-up signal.

use crate::llm::config::GenerationConfig;
use crate::llm::context::ConversationContext;
use crate::llm::events::StreamEvent;
use crate::llm::gemini::{to_contents, LlmClient};
use crate::llm::prompts::GOODBYE_SENTINEL;
use crate::llm::tools::{end_call, EndCallArgs, END_CALL_TOOL_NAME};
use crate::Result;
use async_stream::stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Stream of events for one response generation
pub type ResponseStream = BoxStream<'static, Result<StreamEvent>>;

/// Reasoning node that answers the caller through a streaming LLM
#[derive(Clone)]
pub struct ChatNode {
    client: Arc<dyn LlmClient>,
    config: Arc<GenerationConfig>,
    goodbye_prompt: bool,
}

impl ChatNode {
    /// Create a node
    ///
    /// `goodbye_prompt` enables ending the call when a reply ends with
    /// "Goodbye!".
    pub fn new(client: Arc<dyn LlmClient>, config: GenerationConfig, goodbye_prompt: bool) -> Self {
        Self {
            client,
            config: Arc::new(config),
            goodbye_prompt,
        }
    }

    /// Generation settings shared by every request of this call
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn uses_goodbye_prompt(&self) -> bool {
        self.goodbye_prompt
    }

    /// Stream a reply to the current conversation
    ///
    /// Each call opens a fresh request. Once `cancel` fires no further events
    /// are produced and the partial reply is dropped. Provider failures end
    /// the stream with an `Err` item.
    pub fn process_context(
        &self,
        context: &ConversationContext,
        cancel: CancellationToken,
    ) -> ResponseStream {
        let contents = to_contents(context.events());

        if let Some(user_message) = context.latest_user_transcript() {
            info!("Processing user message: \"{}\"", user_message);
        }

        let client = Arc::clone(&self.client);
        let config = Arc::clone(&self.config);
        let goodbye_prompt = self.goodbye_prompt;

        Box::pin(stream! {
            let mut upstream = client.generate_content_stream(&config, contents);
            let mut full_response = String::new();

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("Generation cancelled after {} chars", full_response.len());
                        return;
                    }
                    next = upstream.next() => next,
                };

                let increment = match next {
                    Some(Ok(increment)) => increment,
                    Some(Err(e)) => {
                        yield Err(e);
                        return;
                    }
                    None => break,
                };

                if let Some(text) = increment.text.filter(|t| !t.is_empty()) {
                    full_response.push_str(&text);
                    yield Ok(StreamEvent::text(text));
                }

                for call in &increment.function_calls {
                    if call.name != END_CALL_TOOL_NAME {
                        warn!("Ignoring call to unknown function '{}'", call.name);
                        continue;
                    }

                    let args = EndCallArgs::from_args(&call.args);
                    info!(
                        "End call tool called. Ending conversation with goodbye message: {}",
                        args.goodbye_message
                    );
                    for event in end_call(args) {
                        yield Ok(event);
                    }
                    return;
                }
            }

            if !full_response.is_empty() {
                info!("Agent response: \"{}\" ({} chars)", full_response, full_response.len());
            }

            if goodbye_prompt && full_response.ends_with(GOODBYE_SENTINEL) {
                info!("Goodbye message detected. Ending call");
                yield Ok(StreamEvent::end_call(None));
            }
        })
    }
}
