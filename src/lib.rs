pub mod call;
pub mod config;
pub mod llm;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum VoiceChatError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("IO error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for VoiceChatError {
    fn from(e: std::io::Error) -> Self {
        VoiceChatError::IOError(e.to_string())
    }
}

impl From<reqwest::Error> for VoiceChatError {
    fn from(e: reqwest::Error) -> Self {
        VoiceChatError::InferenceError(e.to_string())
    }
}

impl VoiceChatError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Bad settings or credentials need a restart
            VoiceChatError::ConfigError(_) => false,
            // A failed request only ends the current call
            VoiceChatError::InferenceError(_) => true,
            VoiceChatError::StreamError(_) => true,
            // The runtime side went away
            VoiceChatError::ChannelError(_) => false,
            VoiceChatError::IOError(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            VoiceChatError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            VoiceChatError::InferenceError(_) => {
                "AI response generation failed. Please try again.".to_string()
            }
            VoiceChatError::StreamError(_) => {
                "The response stream was interrupted. Please try again.".to_string()
            }
            VoiceChatError::ChannelError(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
            VoiceChatError::IOError(_) => "File system error occurred.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VoiceChatError>;
