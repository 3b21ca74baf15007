use std::collections::BTreeMap;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use anyhow::{Result, anyhow};

#[derive(Serialize)]
struct ChatRequest {
    query: String,
    space_name: String,
    #[serde(rename = "userId")]
    user_id: String,
    flow_name: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    response: String,
    #[serde(default)]
    sources: Option<BTreeMap<String, Value>>,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
}

/// Answer text plus optional provenance, as returned by the chat service.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub content: String,
    pub sources: Option<BTreeMap<String, Value>>,
}

#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
    token: String,
    space_name: String,
    flow_name: String,
}

impl ChatClient {
    pub fn new(base_url: &str, token: &str, space_name: &str, flow_name: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
            token: token.to_string(),
            space_name: space_name.to_string(),
            flow_name: flow_name.to_string(),
        }
    }

    pub async fn ask(&self, query: &str) -> Result<ChatReply> {
        let request = ChatRequest {
            query: query.to_string(),
            space_name: self.space_name.clone(),
            user_id: "anonymous".to_string(),
            flow_name: self.flow_name.clone(),
        };

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Chat service error {}: {}", status, text));
        }

        let chat_response: ChatResponse = response.json().await?;
        Ok(ChatReply {
            content: chat_response.response,
            sources: chat_response.sources,
        })
    }

    /// Probe the service's health endpoint (sibling of the chat route).
    pub async fn health(&self) -> Result<bool> {
        let url = match self.base_url.rsplit_once('/') {
            Some((root, _)) => format!("{}/health", root),
            None => format!("{}/health", self.base_url),
        };

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("Health check failed: {}", response.status()));
        }

        let health: HealthResponse = response.json().await?;
        Ok(health.status == "ok")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_with_sources_deserializes() {
        let body = r#"{
            "response": "The sum insured is 5,00,000.",
            "sources": {
                "policy": "Terms-LE23M976.pdf",
                "chunk": {"page": 12}
            }
        }"#;

        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.response, "The sum insured is 5,00,000.");
        let sources = parsed.sources.unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources["policy"], "Terms-LE23M976.pdf");
    }

    #[test]
    fn response_without_sources_deserializes() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"response": "ok"}"#).unwrap();
        assert_eq!(parsed.response, "ok");
        assert!(parsed.sources.is_none());
    }

    #[test]
    fn request_serializes_with_user_id_key() {
        let request = ChatRequest {
            query: "What is the excess?".to_string(),
            space_name: "Insurance_usecase".to_string(),
            user_id: "anonymous".to_string(),
            flow_name: "Quote-Comp".to_string(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["userId"], "anonymous");
        assert_eq!(json["query"], "What is the excess?");
    }
}
