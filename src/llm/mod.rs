//! Conversation and LLM streaming for the voice agent
//!
//! # Architecture
//!
//! - **prompts**: System prompt and greeting assembly
//! - **context**: Bounded per-call conversation history
//! - **config**: Per-call generation settings
//! - **tools**: The end-call function and its arguments
//! - **gemini**: Provider wire format and the streaming HTTP client
//! - **bridge**: Turns history into a cancellable stream of output events
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use tokio_util::sync::CancellationToken;
//! use voice_chat::config::AgentConfig;
//! use voice_chat::llm::{prompts, ChatNode, ConversationContext, GeminiClient, GenerationConfig};
//!
//! let config = AgentConfig::default().apply_env();
//! let client = Arc::new(GeminiClient::new(&config)?);
//! let generation = GenerationConfig::from_agent_config(&config, prompts::system_prompt_now(&config));
//! let node = ChatNode::new(client, generation, config.uses_goodbye_prompt());
//!
//! let mut context = ConversationContext::new(config.max_context_length);
//! context.add_user_message("Hi, I had a rough day.");
//!
//! let mut events = node.process_context(&context, CancellationToken::new());
//! while let Some(event) = events.next().await {
//!     println!("{:?}", event?);
//! }
//! ```

pub mod bridge;
pub mod config;
pub mod context;
pub mod events;
pub mod gemini;
pub mod prompts;
pub mod tools;

// Re-export commonly used types
pub use bridge::{ChatNode, ResponseStream};
pub use config::GenerationConfig;
pub use context::{ConversationContext, ConversationEvent, Role};
pub use events::StreamEvent;
pub use gemini::{
    Content, FunctionCall, FunctionDeclaration, GeminiClient, IncrementStream, LlmClient,
    StreamIncrement,
};
pub use tools::{end_call, EndCallArgs, EndCallTool, END_CALL_TOOL_NAME};
