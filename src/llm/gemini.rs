//! Gemini streaming client
//!
//! Talks to `models/{model}:streamGenerateContent?alt=sse` and turns each
//! server-sent event into a [`StreamIncrement`]. The [`LlmClient`] trait is
//! the seam the response bridge depends on, so tests can replay scripted
//! increments instead of calling the network.

use crate::config::AgentConfig;
use crate::llm::config::GenerationConfig;
use crate::llm::context::{ConversationEvent, Role};
use crate::{Result, VoiceChatError};
use async_stream::stream;
use eventsource_stream::Eventsource;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, error, trace};

/// Lazy sequence of increments from one streaming request
pub type IncrementStream = BoxStream<'static, Result<StreamIncrement>>;

/// A hosted model that can stream a reply to a conversation
pub trait LlmClient: Send + Sync {
    /// Open a streaming request; nothing is sent until the stream is polled
    fn generate_content_stream(
        &self,
        config: &GenerationConfig,
        contents: Vec<Content>,
    ) -> IncrementStream;
}

/// One message of the provider conversation format
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_role("user", text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::with_role("model", text)
    }

    fn with_role(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![Part::text(text)],
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Set on reasoning summaries, which are never spoken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

/// A named function invocation requested by the model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,

    #[serde(default)]
    pub args: Map<String, Value>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// A function the model is allowed to call
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestGenerationConfig {
    temperature: f32,
    thinking_config: ThinkingConfig,
}

/// Body of a `streamGenerateContent` request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    contents: Vec<Content>,
    system_instruction: Content,
    generation_config: RequestGenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

impl GenerateContentRequest {
    pub fn new(config: &GenerationConfig, contents: Vec<Content>) -> Self {
        let tools = if config.tools.is_empty() {
            Vec::new()
        } else {
            vec![Tool {
                function_declarations: config.tools.clone(),
            }]
        };

        Self {
            contents,
            system_instruction: Content {
                role: None,
                parts: vec![Part::text(config.system_instruction.clone())],
            },
            generation_config: RequestGenerationConfig {
                temperature: config.temperature,
                thinking_config: ThinkingConfig {
                    thinking_budget: config.thinking_budget,
                },
            },
            tools,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

/// One partially delivered piece of the model's reply
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StreamIncrement {
    /// Spoken text carried by this increment
    pub text: Option<String>,

    /// Function calls carried by this increment
    pub function_calls: Vec<FunctionCall>,
}

impl StreamIncrement {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            function_calls: Vec::new(),
        }
    }

    pub fn function_call(call: FunctionCall) -> Self {
        Self {
            text: None,
            function_calls: vec![call],
        }
    }

    /// Collect text and function calls from the first candidate
    fn from_response(response: GenerateContentResponse) -> Self {
        let parts = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .unwrap_or_default();

        let mut text: Option<String> = None;
        let mut function_calls = Vec::new();

        for part in parts {
            if let Some(call) = part.function_call {
                function_calls.push(call);
            }
            if part.thought == Some(true) {
                continue;
            }
            if let Some(t) = part.text {
                text.get_or_insert_with(String::new).push_str(&t);
            }
        }

        Self {
            text,
            function_calls,
        }
    }
}

fn extract_api_error_message(event_json: &Value) -> Option<String> {
    let error = event_json.get("error")?;
    if let Some(message) = error.get("message").and_then(|value| value.as_str()) {
        return Some(message.to_string());
    }
    if let Some(message) = error.as_str() {
        return Some(message.to_string());
    }
    Some("An error occurred during streaming".to_string())
}

/// Parse the `data:` payload of one server-sent event
pub fn parse_sse_data(raw: &str) -> Result<StreamIncrement> {
    let event_json: Value = serde_json::from_str(raw).map_err(|e| {
        VoiceChatError::StreamError(format!("SSE parsing error: {}, data: {}", e, raw))
    })?;

    if let Some(message) = extract_api_error_message(&event_json) {
        return Err(VoiceChatError::InferenceError(format!(
            "Gemini API error: {}",
            message
        )));
    }

    let response: GenerateContentResponse = serde_json::from_value(event_json).map_err(|e| {
        VoiceChatError::StreamError(format!("SSE data schema error: {}, data: {}", e, raw))
    })?;

    Ok(StreamIncrement::from_response(response))
}

/// Convert call history into provider messages, keeping text turns only
pub fn to_contents(events: &[ConversationEvent]) -> Vec<Content> {
    events
        .iter()
        .filter(|e| e.has_text())
        .filter_map(|e| match e.role {
            Role::User => Some(Content::user(e.content.clone())),
            Role::Agent => Some(Content::model(e.content.clone())),
            Role::System => None,
        })
        .collect()
}

/// Gemini REST client
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    /// Create a client from the agent configuration
    pub fn new(config: &AgentConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| VoiceChatError::ConfigError("Missing Gemini API key".to_string()))?;

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| {
                VoiceChatError::ConfigError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn stream_url(&self, model_id: &str) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, model_id
        )
    }
}

impl LlmClient for GeminiClient {
    fn generate_content_stream(
        &self,
        config: &GenerationConfig,
        contents: Vec<Content>,
    ) -> IncrementStream {
        let url = self.stream_url(&config.model_id);
        let body = GenerateContentRequest::new(config, contents);
        let request = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body);

        Box::pin(stream! {
            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    error!("Gemini request failed: {}", e);
                    yield Err(VoiceChatError::from(e));
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                error!("Gemini returned {}: {}", status, detail);
                yield Err(VoiceChatError::InferenceError(format!(
                    "Gemini returned {}: {}",
                    status, detail
                )));
                return;
            }

            debug!("Gemini stream opened");
            let mut events = response.bytes_stream().eventsource();

            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        error!("SSE stream error: {}", e);
                        yield Err(VoiceChatError::StreamError(format!("SSE stream error: {}", e)));
                        return;
                    }
                };

                trace!("Gemini SSE: {:?}", event.data);
                if event.data.trim().is_empty() {
                    continue;
                }

                match parse_sse_data(&event.data) {
                    Ok(increment) => yield Ok(increment),
                    Err(e) => {
                        error!("{}", e);
                        yield Err(e);
                        return;
                    }
                }
            }

            debug!("Gemini stream closed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::tools::EndCallTool;
    use serde_json::json;

    #[test]
    fn test_parse_text_increment() {
        let raw = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hello"},{"text":" there"}]}}]}"#;
        let increment = parse_sse_data(raw).unwrap();
        assert_eq!(increment.text.as_deref(), Some("Hello there"));
        assert!(increment.function_calls.is_empty());
    }

    #[test]
    fn test_parse_function_call_increment() {
        let raw = r#"{"candidates":[{"content":{"role":"model","parts":[{"functionCall":{"name":"end_call","args":{"goodbye_message":"Bye now!"}}}]},"finishReason":"STOP"}]}"#;
        let increment = parse_sse_data(raw).unwrap();
        assert!(increment.text.is_none());
        assert_eq!(increment.function_calls.len(), 1);
        assert_eq!(increment.function_calls[0].name, "end_call");
        assert_eq!(increment.function_calls[0].args["goodbye_message"], "Bye now!");
    }

    #[test]
    fn test_parse_skips_thought_parts() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"thinking...","thought":true},{"text":"Hi"}]}}]}"#;
        let increment = parse_sse_data(raw).unwrap();
        assert_eq!(increment.text.as_deref(), Some("Hi"));
    }

    #[test]
    fn test_parse_usage_only_chunk() {
        let raw = r#"{"usageMetadata":{"promptTokenCount":12}}"#;
        let increment = parse_sse_data(raw).unwrap();
        assert_eq!(increment, StreamIncrement::default());
    }

    #[test]
    fn test_parse_api_error() {
        let raw = r#"{"error":{"code":429,"message":"Resource exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = parse_sse_data(raw).unwrap_err();
        assert!(matches!(err, VoiceChatError::InferenceError(m) if m.contains("Resource exhausted")));
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse_sse_data("not json").unwrap_err();
        assert!(matches!(err, VoiceChatError::StreamError(_)));
    }

    #[test]
    fn test_to_contents_filters_text_turns() {
        let events = vec![
            ConversationEvent::agent("Hello there."),
            ConversationEvent::system("call connected"),
            ConversationEvent::user("Hi"),
            ConversationEvent::user(""),
        ];

        let contents = to_contents(&events);
        assert_eq!(
            contents,
            vec![Content::model("Hello there."), Content::user("Hi")]
        );
    }

    #[test]
    fn test_request_body_shape() {
        let config = GenerationConfig::new("gemini-2.5-flash", "Be brief.")
            .with_temperature(0.5)
            .with_tool(EndCallTool::declaration());
        let body = GenerateContentRequest::new(&config, vec![Content::user("Hi")]);
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "Hi");
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert!(value["systemInstruction"].get("role").is_none());
        assert_eq!(value["generationConfig"]["temperature"], 0.5);
        assert_eq!(value["generationConfig"]["thinkingConfig"]["thinkingBudget"], 0);
        assert_eq!(
            value["tools"][0]["functionDeclarations"][0]["name"],
            json!("end_call")
        );
    }

    #[test]
    fn test_request_without_tools_omits_field() {
        let config = GenerationConfig::new("gemini-2.5-flash-lite", "Be brief.");
        let body = GenerateContentRequest::new(&config, Vec::new());
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn test_client_requires_api_key() {
        assert!(GeminiClient::new(&AgentConfig::default()).is_err());

        let client = GeminiClient::new(
            &AgentConfig::default()
                .with_api_key("k")
                .with_api_base_url("http://localhost:9000/"),
        )
        .unwrap();
        assert_eq!(
            client.stream_url("gemini-2.5-flash"),
            "http://localhost:9000/v1beta/models/gemini-2.5-flash:streamGenerateContent?alt=sse"
        );
    }
}
