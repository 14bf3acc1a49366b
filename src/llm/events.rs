//! Events produced for the call runtime

/// Output of a response generation, delivered to the call runtime in order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// Text to be spoken
    TextChunk { content: String },

    /// Hang up, optionally after speaking a farewell
    EndCall { message: Option<String> },
}

impl StreamEvent {
    pub fn text(content: impl Into<String>) -> Self {
        StreamEvent::TextChunk {
            content: content.into(),
        }
    }

    pub fn end_call(message: Option<String>) -> Self {
        StreamEvent::EndCall { message }
    }

    pub fn is_end_call(&self) -> bool {
        matches!(self, StreamEvent::EndCall { .. })
    }
}
