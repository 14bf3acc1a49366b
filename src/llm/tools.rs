//! The end-call tool
//!
//! The only function the model may call. Its arguments arrive as a loose
//! JSON object and are decoded into [`EndCallArgs`] with defaults.

use crate::llm::events::StreamEvent;
use crate::llm::gemini::FunctionDeclaration;
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Function name the model uses to end the call
pub const END_CALL_TOOL_NAME: &str = "end_call";

/// Farewell used when the model gives none
pub const DEFAULT_GOODBYE_MESSAGE: &str = "Goodbye!";

/// Arguments of an `end_call` invocation
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct EndCallArgs {
    /// Farewell spoken before hanging up
    #[serde(default = "default_goodbye_message")]
    pub goodbye_message: String,
}

fn default_goodbye_message() -> String {
    DEFAULT_GOODBYE_MESSAGE.to_string()
}

impl Default for EndCallArgs {
    fn default() -> Self {
        Self {
            goodbye_message: default_goodbye_message(),
        }
    }
}

impl EndCallArgs {
    pub fn new(goodbye_message: impl Into<String>) -> Self {
        Self {
            goodbye_message: goodbye_message.into(),
        }
    }

    /// Decode from a function-call argument object
    ///
    /// Malformed or blank values fall back to the default farewell.
    pub fn from_args(args: &Map<String, Value>) -> Self {
        let decoded: Self = serde_json::from_value(Value::Object(args.clone())).unwrap_or_default();
        if decoded.goodbye_message.trim().is_empty() {
            return Self::default();
        }
        decoded
    }
}

/// Declaration of the end-call tool
pub struct EndCallTool;

impl EndCallTool {
    pub fn name() -> &'static str {
        END_CALL_TOOL_NAME
    }

    /// Function declaration advertised to the model
    pub fn declaration() -> FunctionDeclaration {
        FunctionDeclaration {
            name: END_CALL_TOOL_NAME.to_string(),
            description: "Ends the call. Use this when the user says goodbye or the conversation \
                          has reached a natural conclusion."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "goodbye_message": {
                        "type": "string",
                        "description": "A short farewell to say before hanging up."
                    }
                },
                "required": ["goodbye_message"]
            }),
        }
    }
}

/// Events emitted when the model ends the call
pub fn end_call(args: EndCallArgs) -> Vec<StreamEvent> {
    vec![StreamEvent::end_call(Some(args.goodbye_message))]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_decode_goodbye_message() {
        let decoded = EndCallArgs::from_args(&args(json!({"goodbye_message": "Bye now!"})));
        assert_eq!(decoded.goodbye_message, "Bye now!");
    }

    #[test]
    fn test_missing_message_defaults() {
        let decoded = EndCallArgs::from_args(&Map::new());
        assert_eq!(decoded.goodbye_message, "Goodbye!");
    }

    #[test]
    fn test_malformed_message_defaults() {
        let decoded = EndCallArgs::from_args(&args(json!({"goodbye_message": 42})));
        assert_eq!(decoded, EndCallArgs::default());

        let blank = EndCallArgs::from_args(&args(json!({"goodbye_message": "  "})));
        assert_eq!(blank, EndCallArgs::default());
    }

    #[test]
    fn test_end_call_events() {
        let events = end_call(EndCallArgs::new("Take care!"));
        assert_eq!(
            events,
            vec![StreamEvent::EndCall {
                message: Some("Take care!".to_string())
            }]
        );
    }

    #[test]
    fn test_declaration_schema() {
        let decl = EndCallTool::declaration();
        assert_eq!(decl.name, EndCallTool::name());
        assert_eq!(
            decl.parameters["properties"]["goodbye_message"]["type"],
            "string"
        );
    }
}
