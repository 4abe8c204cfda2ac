//! Rule generation over an OpenAI-compatible chat-completions API.

use crate::parse::parse_generated_rules;
use crate::{RuleError, RuleProvider, RuleSet};

const SYSTEM_PROMPT: &str = r#"You referee a game like rock paper scissors played with custom objects.
Reply with exactly one JSON object and no other text:
{"success": true, "result": [{"object": "...", "emoji": "...", "loses_against": ["..."], "wins_against": ["..."], "logic": "..."}], "error": null}

Rules for "result":
- Include every object you are given, spelled exactly as given.
- Every pair of objects is related: one of them loses against the other.
- Never let two objects lose against each other.
- Every object wins against at least one object and loses against at least one object.
- If fewer than three objects are given, add the fewest extra objects needed to satisfy these rules.
- Give every object a distinct emoji.
- "logic" briefly explains why the object loses.
If no valid relations can be built, reply {"success": false, "result": null, "error": "<reason>"}."#;

/// Connection settings for [`HttpRuleProvider`].
#[derive(Debug, Clone)]
pub struct HttpRuleConfig {
    /// Base API URL (e.g. `https://api.openai.com/v1`).
    pub api_url: String,
    pub api_key: String,
    pub model: String,
}

/// A [`RuleProvider`] that asks a chat model to invent the relations.
///
/// Sends requests to `{api_url}/chat/completions`.
pub struct HttpRuleProvider {
    client: reqwest::Client,
    config: HttpRuleConfig,
}

impl HttpRuleProvider {
    pub fn new(config: HttpRuleConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Sends the prompt and returns the model's raw text reply.
    async fn complete(&self, options: &[String]) -> Result<String, RuleError> {
        let url = format!("{}/chat/completions", self.config.api_url.trim_end_matches('/'));

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt(options)}
            ],
            "temperature": 0.4,
            "response_format": {"type": "json_object"}
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RuleError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(RuleError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RuleError::Malformed(format!("response is not JSON: {e}")))?;

        extract_content(&json)
    }
}

impl RuleProvider for HttpRuleProvider {
    async fn generate(&self, options: &[String]) -> Result<RuleSet, RuleError> {
        let content = self.complete(options).await?;
        tracing::debug!(model = %self.config.model, bytes = content.len(), "rule generator replied");
        parse_generated_rules(&content)
    }
}

fn user_prompt(options: &[String]) -> String {
    format!("Generate the relations for these objects: {}", options.join(", "))
}

/// Pulls `choices[0].message.content` out of a chat-completions response.
fn extract_content(json: &serde_json::Value) -> Result<String, RuleError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            RuleError::Malformed("response missing choices[0].message.content".to_owned())
        })
}
