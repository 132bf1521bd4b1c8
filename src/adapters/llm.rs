//! Mistral chat-completions client.
//!
//! Backs two collaborator roles: IOC extraction from the raw alert and the
//! final decision over the assembled investigation. Both go through the same
//! JSON-mode chat completion call; the returned content is deserialized into
//! the typed result at this boundary, so a malformed completion surfaces as
//! an [`AdapterError`] and the owning stage falls back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Alert, Investigation, IocBundle, Verdict};

use super::{AdapterError, DecisionEngine, IocExtractor};

const DEFAULT_API_URL: &str = "https://api.mistral.ai";
const DEFAULT_MODEL: &str = "mistral-small-latest";

/// Chat-completions client for the Mistral API.
pub struct MistralClient {
    api_url: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl MistralClient {
    /// Create a client. A missing key is not an error until a call is made,
    /// so construction never fails and offline paths stay usable.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// One JSON-mode completion round trip, returning the message content.
    async fn complete(&self, prompt: &str) -> Result<String, AdapterError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AdapterError::MissingCredentials("MISTRAL_API_KEY"))?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            response_format: ResponseFormat { kind: "json_object" },
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.api_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AdapterError::InvalidResponse("completion has no choices".to_string()))?;

        debug!(model = %self.model, bytes = content.len(), "received completion");
        Ok(content)
    }
}

#[async_trait]
impl IocExtractor for MistralClient {
    async fn extract(&self, alert: &Alert) -> Result<IocBundle, AdapterError> {
        let alert_json = serde_json::to_string(alert.as_value())
            .map_err(|e| AdapterError::InvalidResponse(e.to_string()))?;

        let content = self.complete(&extraction_prompt(&alert_json)).await?;

        serde_json::from_str(&content).map_err(|e| {
            AdapterError::InvalidResponse(format!("IOC payload failed validation: {e}"))
        })
    }
}

#[async_trait]
impl DecisionEngine for MistralClient {
    async fn decide(&self, snapshot: &Investigation) -> Result<Verdict, AdapterError> {
        let snapshot_json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| AdapterError::InvalidResponse(e.to_string()))?;

        let content = self.complete(&decision_prompt(&snapshot_json)).await?;

        serde_json::from_str(&content).map_err(|e| {
            AdapterError::InvalidResponse(format!("verdict payload failed validation: {e}"))
        })
    }
}

fn extraction_prompt(alert_json: &str) -> String {
    format!(
        r#"You are a SOC analyst. Extract IOCs from the following alert.
Respond ONLY with a JSON object with these keys: "ip_addresses", "urls", "domains", "file_hashes", "user_accounts".
If a key has no value, use an empty list [].

Alert:
{alert_json}

JSON Response:
"#
    )
}

fn decision_prompt(snapshot_json: &str) -> String {
    format!(
        r#"You are an autonomous Level 2 SOC analyst agent. You have been provided with a complete investigation packet.

Your task is to:
1.  Write a concise summary of the event.
2.  Classify the attack pattern.
3.  Assign a final severity rating (Low, Medium, High, or Critical).
4.  Decide which automated actions to take from the list of available tools.

Your available tools are:
- "block_ip": Blocks an IP address at the firewall.
- "isolate_host": Disconnects a host from the network.
- "disable_user": Disables a user account in Active Directory.

You MUST provide your response in a single, clean JSON object with the following keys: "analyst_summary", "attack_category", "final_severity", and "automated_actions".

The "automated_actions" key MUST contain a JSON array of objects, where each object has two keys: "action" (the tool name) and "target" (the IP, hostname, or username to act upon). If no action is needed, return an empty array [].

--- INVESTIGATION DATA ---
{snapshot_json}
--- END INVESTIGATION DATA ---

JSON Response:
"#
    )
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Severity;
    use serde_json::json;

    #[test]
    fn test_completion_content_parses_into_bundle() {
        let content = json!({
            "ip_addresses": ["203.0.113.9"],
            "urls": [],
            "domains": ["evil.example"],
            "file_hashes": [],
            "user_accounts": ["jsmith"]
        })
        .to_string();

        let bundle: IocBundle = serde_json::from_str(&content).unwrap();
        assert_eq!(bundle.ip_addresses, vec!["203.0.113.9"]);
        assert_eq!(bundle.user_accounts, vec!["jsmith"]);
    }

    #[test]
    fn test_completion_content_parses_into_verdict() {
        let content = json!({
            "analyst_summary": "Credential stuffing from a flagged IP.",
            "attack_category": "Brute Force",
            "final_severity": "High",
            "automated_actions": [{"action": "block_ip", "target": "203.0.113.9"}]
        })
        .to_string();

        let verdict: Verdict = serde_json::from_str(&content).unwrap();
        assert_eq!(verdict.final_severity, Severity::High);
        assert_eq!(verdict.automated_actions.len(), 1);
    }

    #[test]
    fn test_chat_response_shape() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "{}"}}]
        }))
        .unwrap();

        assert_eq!(response.choices.len(), 1);
        assert_eq!(response.choices[0].message.content, "{}");
    }

    #[test]
    fn test_prompts_embed_payload() {
        assert!(extraction_prompt("{\"x\":1}").contains("{\"x\":1}"));
        assert!(decision_prompt("SNAPSHOT").contains("SNAPSHOT"));
    }

    #[tokio::test]
    async fn test_missing_key_is_reported_at_call_time() {
        let client = MistralClient::new(None);
        let alert = Alert::new(json!({"timestamp": "2024-03-11T10:15:00"}));

        let err = client.extract(&alert).await.unwrap_err();
        assert!(matches!(err, AdapterError::MissingCredentials("MISTRAL_API_KEY")));
    }
}
