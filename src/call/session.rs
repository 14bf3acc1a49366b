//! Call session wiring
//!
//! Connects the call runtime's events to the response bridge:
//! transcripts -> history -> generation on "stopped speaking" -> broadcast.
//! At most one generation runs at a time and a new "started speaking"
//! event cancels it (barge-in).

use crate::config::AgentConfig;
use crate::llm::bridge::{ChatNode, ResponseStream};
use crate::llm::config::GenerationConfig;
use crate::llm::context::ConversationContext;
use crate::llm::events::StreamEvent;
use crate::llm::gemini::LlmClient;
use crate::llm::prompts;
use crate::{Result, VoiceChatError};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Channel buffer size for runtime events in both directions
const EVENT_CHANNEL_SIZE: usize = 100;

/// Events delivered by the call runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    /// A finished transcript of caller speech
    TranscriptionReceived(String),

    /// The caller started talking
    UserStartedSpeaking,

    /// The caller stopped talking; time to answer
    UserStoppedSpeaking,

    /// The caller hung up
    Hangup,
}

/// How a call finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEnd {
    /// The agent ended the call
    AgentHangup,

    /// The caller hung up or the runtime went away
    CallerHangup,
}

/// Runtime side of a call session
pub struct CallHandle {
    /// Event sender
    event_tx: mpsc::Sender<CallEvent>,

    /// Response receiver
    response_rx: mpsc::Receiver<StreamEvent>,
}

impl CallHandle {
    /// Send an event to the session
    pub async fn send(&self, event: CallEvent) -> Result<()> {
        self.event_tx
            .send(event)
            .await
            .map_err(|e| VoiceChatError::ChannelError(format!("Failed to send event: {}", e)))
    }

    /// Deliver a finished utterance: transcript, then end of speech
    pub async fn say(&self, transcript: impl Into<String>) -> Result<()> {
        self.send(CallEvent::TranscriptionReceived(transcript.into()))
            .await?;
        self.send(CallEvent::UserStoppedSpeaking).await
    }

    /// Receive the next response event
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.response_rx.recv().await
    }

    /// Try to receive a response event without waiting
    pub fn try_recv(&mut self) -> Option<StreamEvent> {
        match self.response_rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Split into the event sender and response receiver
    pub fn into_parts(self) -> (mpsc::Sender<CallEvent>, mpsc::Receiver<StreamEvent>) {
        (self.event_tx, self.response_rx)
    }
}

struct ActiveGeneration {
    id: Uuid,
    cancel: CancellationToken,
    stream: ResponseStream,
    /// Text forwarded so far
    response: String,
}

/// Next event of the running generation; never resolves when idle
async fn next_response(active: &mut Option<ActiveGeneration>) -> Option<Result<StreamEvent>> {
    match active {
        Some(generation) => generation.stream.next().await,
        None => std::future::pending().await,
    }
}

/// One call: its history, its reasoning node and its runtime channels
pub struct CallSession {
    call_id: Uuid,
    node: ChatNode,
    context: ConversationContext,
    initial_message: Option<String>,
    event_rx: mpsc::Receiver<CallEvent>,
    response_tx: mpsc::Sender<StreamEvent>,
}

impl CallSession {
    /// Create a session and the handle the call runtime talks through
    ///
    /// The system prompt and greeting are assembled here, once per call.
    pub fn new(config: &AgentConfig, client: Arc<dyn LlmClient>) -> (Self, CallHandle) {
        let generation = GenerationConfig::from_agent_config(config, prompts::system_prompt_now(config));
        let node = ChatNode::new(client, generation, config.uses_goodbye_prompt());

        Self::with_node(
            node,
            config.max_context_length,
            prompts::initial_message_now(config),
        )
    }

    /// Create a session around an existing node
    pub fn with_node(
        node: ChatNode,
        max_context_length: usize,
        initial_message: Option<String>,
    ) -> (Self, CallHandle) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let (response_tx, response_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);

        let call_id = Uuid::new_v4();
        debug!(
            call_id = %call_id,
            model = %node.config().model_id,
            tools = node.config().tools.len(),
            "Session created"
        );

        let session = Self {
            call_id,
            node,
            context: ConversationContext::new(max_context_length),
            initial_message,
            event_rx,
            response_tx,
        };

        let handle = CallHandle {
            event_tx,
            response_rx,
        };

        (session, handle)
    }

    pub fn call_id(&self) -> Uuid {
        self.call_id
    }

    /// Conversation history so far
    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    /// Run the call until either side hangs up
    ///
    /// Runtime events and the running generation are served from one loop,
    /// so history is only ever touched here. A provider failure ends the
    /// call with that error.
    pub async fn run(mut self) -> Result<CallEnd> {
        info!(call_id = %self.call_id, "Call started");

        if let Some(greeting) = self.initial_message.take() {
            self.broadcast(StreamEvent::text(greeting.clone())).await?;
            self.context.add_agent_message(greeting);
        }

        let mut active: Option<ActiveGeneration> = None;

        let result = loop {
            tokio::select! {
                event = self.event_rx.recv() => match event {
                    Some(CallEvent::TranscriptionReceived(text)) => {
                        if text.trim().is_empty() {
                            debug!("Ignoring empty transcript");
                        } else {
                            info!(call_id = %self.call_id, "User said: \"{}\"", text);
                            self.context.add_user_message(text);
                        }
                    }
                    Some(CallEvent::UserStartedSpeaking) => {
                        if let Some(generation) = active.take() {
                            info!(call_id = %self.call_id, "User interrupted, cancelling generation {}", generation.id);
                            generation.cancel.cancel();
                        }
                    }
                    Some(CallEvent::UserStoppedSpeaking) => {
                        if let Some(previous) = active.take() {
                            debug!("Superseding generation {}", previous.id);
                            previous.cancel.cancel();
                        }
                        active = Some(self.start_generation());
                    }
                    Some(CallEvent::Hangup) | None => {
                        info!(call_id = %self.call_id, "Caller hung up");
                        break Ok(CallEnd::CallerHangup);
                    }
                },
                item = next_response(&mut active), if active.is_some() => match item {
                    Some(Ok(event)) => {
                        let ends_call = event.is_end_call();
                        if let (Some(generation), StreamEvent::TextChunk { content }) = (active.as_mut(), &event) {
                            generation.response.push_str(content);
                        }

                        if let Err(e) = self.broadcast(event).await {
                            break Err(e);
                        }

                        if ends_call {
                            if let Some(generation) = active.take() {
                                self.commit(generation);
                            }
                            info!(call_id = %self.call_id, "Agent ended the call");
                            break Ok(CallEnd::AgentHangup);
                        }
                    }
                    Some(Err(e)) => {
                        active = None;
                        break Err(e);
                    }
                    None => {
                        if let Some(generation) = active.take() {
                            self.commit(generation);
                        }
                    }
                },
            }
        };

        if let Some(generation) = active.take() {
            generation.cancel.cancel();
        }

        match &result {
            Ok(end) => info!(call_id = %self.call_id, "Call finished: {:?}", end),
            Err(e) => error!(call_id = %self.call_id, "Call failed: {}", e),
        }

        result
    }

    /// Deliver an event to the call runtime
    async fn broadcast(&self, event: StreamEvent) -> Result<()> {
        self.response_tx.send(event).await.map_err(|e| {
            warn!("Runtime stopped receiving responses");
            VoiceChatError::ChannelError(format!("Failed to deliver response: {}", e))
        })
    }

    /// Record a finished reply as an agent turn
    fn commit(&mut self, generation: ActiveGeneration) {
        debug!("Generation {} finished", generation.id);
        if !generation.response.is_empty() {
            self.context.add_agent_message(generation.response);
        }
    }

    /// Begin a reply to the current history
    fn start_generation(&self) -> ActiveGeneration {
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let stream = self.node.process_context(&self.context, cancel.clone());

        debug!("Starting generation {}", id);

        ActiveGeneration {
            id,
            cancel,
            stream,
            response: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::gemini::{Content, IncrementStream, StreamIncrement};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FixedClient;

    impl LlmClient for FixedClient {
        fn generate_content_stream(
            &self,
            _config: &GenerationConfig,
            _contents: Vec<Content>,
        ) -> IncrementStream {
            Box::pin(futures::stream::iter(vec![Ok(StreamIncrement::text("Hi."))]))
        }
    }

    /// Sets its flag when the upstream stream holding it is dropped
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    struct StallingClient {
        dropped: Arc<AtomicBool>,
    }

    impl LlmClient for StallingClient {
        fn generate_content_stream(
            &self,
            _config: &GenerationConfig,
            _contents: Vec<Content>,
        ) -> IncrementStream {
            let guard = DropFlag(Arc::clone(&self.dropped));
            Box::pin(
                futures::stream::iter(vec![Ok(StreamIncrement::text("Hold on"))])
                    .chain(futures::stream::pending())
                    .map(move |item| {
                        let _ = &guard;
                        item
                    }),
            )
        }
    }

    #[tokio::test]
    async fn test_session_creation() {
        let config = AgentConfig::default().with_max_context_length(5);
        let (session, _handle) = CallSession::new(&config, Arc::new(FixedClient));

        assert!(session.context().is_empty());
        assert_eq!(session.context().max_length(), 5);
        assert!(session.initial_message.is_some());
        assert!(session.node.uses_goodbye_prompt());
    }

    #[tokio::test]
    async fn test_greeting_then_hangup() {
        let config = AgentConfig::default();
        let (session, mut handle) = CallSession::new(&config, Arc::new(FixedClient));

        handle.send(CallEvent::Hangup).await.unwrap();
        let end = session.run().await.unwrap();
        assert_eq!(end, CallEnd::CallerHangup);

        let greeting = handle.recv().await.unwrap();
        assert!(matches!(greeting, StreamEvent::TextChunk { content } if content.starts_with("Hello there.")));
    }

    #[tokio::test]
    async fn test_handle_try_recv_empty() {
        let config = AgentConfig::default().with_initial_message(None);
        let (_session, mut handle) = CallSession::new(&config, Arc::new(FixedClient));
        assert!(handle.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_hangup_releases_active_generation() {
        let dropped = Arc::new(AtomicBool::new(false));
        let client = Arc::new(StallingClient {
            dropped: Arc::clone(&dropped),
        });
        let config = AgentConfig::default().with_initial_message(None);
        let (session, mut handle) = CallSession::new(&config, client);
        let call = tokio::spawn(session.run());

        handle.say("Hi").await.unwrap();
        assert_eq!(handle.recv().await.unwrap(), StreamEvent::text("Hold on"));
        assert!(!dropped.load(Ordering::SeqCst));

        handle.send(CallEvent::Hangup).await.unwrap();
        assert_eq!(call.await.unwrap().unwrap(), CallEnd::CallerHangup);
        assert!(dropped.load(Ordering::SeqCst));
    }
}
