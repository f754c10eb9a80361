//! Legal question answering

use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ApiConfig;
use crate::error::{ClientError, Result};
use crate::profile::http::build_http_client;

#[derive(Debug, Clone, Serialize)]
struct AgentRequest<'a> {
    question: &'a str,
}

/// A retrieved passage the answer was grounded on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Database id; numeric or string depending on the index
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub content_preview: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAnswer {
    pub answer: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Path of a generated application form, when the question asked for one
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub sources: Vec<Source>,
}

#[derive(Debug, Deserialize)]
struct AgentError {
    error: String,
}

/// Client for the `/agent` endpoint
pub struct AgentClient {
    base_url: String,
    client: Client,
}

impl AgentClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: build_http_client(config)?,
        })
    }

    /// Ask a question. Blank questions are not sent and yield `None`.
    pub async fn ask(&self, question: &str) -> Result<Option<AgentAnswer>> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(None);
        }

        let url = format!("{}/agent", self.base_url);
        debug!(len = question.len(), "Asking agent");
        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&AgentRequest { question })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Prefer the server's `{error}` message over the raw body
            let message = serde_json::from_str::<AgentError>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(ClientError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let answer: AgentAnswer = response.json().await?;
        info!(
            category = answer.category.as_deref().unwrap_or("-"),
            sources = answer.sources.len(),
            "Agent answered"
        );
        Ok(Some(answer))
    }
}
