use intake_flow::AdapterError;
use reqwest::Client;
use serde_json::{Value, json};

const OPENROUTER_CHAT_COMPLETIONS: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Thin client over OpenRouter's chat completions endpoint, used where the
/// request needs image content parts
#[derive(Clone)]
pub struct OpenRouterClient {
    http: Client,
    api_key: String,
    endpoint: String,
}

impl OpenRouterClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_endpoint(api_key, OPENROUTER_CHAT_COMPLETIONS)
    }

    pub fn with_endpoint(api_key: &str, endpoint: &str) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.to_string(),
            endpoint: endpoint.to_string(),
        }
    }

    pub async fn chat_completion(
        &self,
        model: &str,
        content: Vec<Value>,
        max_tokens: u32,
    ) -> Result<String, AdapterError> {
        let payload = json!({
            "model": model,
            "messages": [
                {
                    "role": "user",
                    "content": content
                }
            ],
            "max_tokens": max_tokens
        });

        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| AdapterError::InvalidResponse(e.to_string()))?;

        message_content(&response_json)
    }
}

fn message_content(response: &Value) -> Result<String, AdapterError> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| AdapterError::InvalidResponse("missing choices[0].message.content".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_is_read_from_first_choice() {
        let response = json!({
            "choices": [{ "message": { "role": "assistant", "content": "Name: John Doe" } }]
        });
        assert_eq!(message_content(&response).unwrap(), "Name: John Doe");
    }

    #[test]
    fn missing_content_is_invalid() {
        let err = message_content(&json!({ "choices": [] })).unwrap_err();
        assert!(matches!(err, AdapterError::InvalidResponse(_)));
    }
}
