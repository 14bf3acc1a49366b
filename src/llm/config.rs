//! Per-call generation settings sent with every streaming request

use crate::config::AgentConfig;
use crate::llm::gemini::FunctionDeclaration;
use crate::llm::tools::EndCallTool;

/// Immutable request settings for one call session
#[derive(Clone, Debug)]
pub struct GenerationConfig {
    /// Model identifier
    pub model_id: String,

    /// System instruction sent alongside the history
    pub system_instruction: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Thinking token budget (0 = disabled)
    pub thinking_budget: i32,

    /// Functions the model may call
    pub tools: Vec<FunctionDeclaration>,
}

impl GenerationConfig {
    /// Create a configuration with no tools
    pub fn new(model_id: impl Into<String>, system_instruction: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            system_instruction: system_instruction.into(),
            temperature: 0.7,
            thinking_budget: 0,
            tools: Vec::new(),
        }
    }

    /// Derive the call's settings from the agent configuration
    ///
    /// The end-call tool is only declared when the model is not relying on
    /// the "Goodbye!" prompt.
    pub fn from_agent_config(config: &AgentConfig, system_instruction: impl Into<String>) -> Self {
        let mut generation = Self::new(config.model_id.clone(), system_instruction)
            .with_temperature(config.temperature)
            .with_thinking_budget(config.thinking_budget);

        if !config.uses_goodbye_prompt() {
            generation = generation.with_tool(EndCallTool::declaration());
        }

        generation
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the thinking budget
    pub fn with_thinking_budget(mut self, budget: i32) -> Self {
        self.thinking_budget = budget;
        self
    }

    /// Declare a function the model may call
    pub fn with_tool(mut self, tool: FunctionDeclaration) -> Self {
        self.tools.push(tool);
        self
    }

    /// Whether a function with this name is declared
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::tools::END_CALL_TOOL_NAME;

    #[test]
    fn test_goodbye_model_has_no_tools() {
        let config = AgentConfig::new("gemini-2.5-flash-lite").with_temperature(0.4);
        let generation = GenerationConfig::from_agent_config(&config, "prompt");

        assert_eq!(generation.model_id, "gemini-2.5-flash-lite");
        assert_eq!(generation.temperature, 0.4);
        assert_eq!(generation.thinking_budget, 0);
        assert!(generation.tools.is_empty());
    }

    #[test]
    fn test_other_models_get_end_call_tool() {
        let config = AgentConfig::new("gemini-2.5-flash");
        let generation = GenerationConfig::from_agent_config(&config, "prompt");

        assert_eq!(generation.tools.len(), 1);
        assert!(generation.has_tool(END_CALL_TOOL_NAME));
        assert_eq!(generation.system_instruction, "prompt");
    }
}
