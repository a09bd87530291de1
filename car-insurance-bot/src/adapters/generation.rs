use async_trait::async_trait;
use intake_flow::{AdapterError, TextGenerator};
use rig::{agent::Agent, client::CompletionClient, completion::Prompt, providers::openrouter};
use tracing::info;

const GENERATOR_PREAMBLE: &str = "You are a professional insurance document generator \
and a friendly car insurance assistant.\n\
When asked for a policy, produce a plain-text dummy policy document with clear section \
headings.\n\
Otherwise answer briefly and steer the user back to uploading their passport and \
vehicle identification document.";

/// Free-text replies and policy bodies, both through one OpenRouter agent
pub struct LlmGenerator {
    agent: Agent<openrouter::CompletionModel>,
}

impl LlmGenerator {
    pub fn new(api_key: &str, model: &str) -> Self {
        let client = openrouter::Client::new(api_key);
        let agent = client.agent(model).preamble(GENERATOR_PREAMBLE).build();
        Self { agent }
    }
}

#[async_trait]
impl TextGenerator for LlmGenerator {
    async fn generate(&self, instruction: &str) -> Result<String, AdapterError> {
        let response = self
            .agent
            .prompt(instruction.to_string())
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        if response.trim().is_empty() {
            return Err(AdapterError::InvalidResponse("no content generated".into()));
        }

        info!(chars = response.len(), "LLM generation completed");
        Ok(response)
    }
}
