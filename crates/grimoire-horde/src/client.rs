//! HTTP client for the AI Horde cluster.
//!
//! Two calls matter: popping a queued text job and submitting its result.
//! Both carry the worker's api key and agent identification headers on every
//! request.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Default public cluster.
pub const DEFAULT_CLUSTER: &str = "https://horde.koboldai.net";

/// Agent strings sent with every cluster request.
const WORKER_USER_AGENT: &str = "GrimoireEmbeddedWorkerV2";
const CLIENT_AGENT: &str = "GrimoireEmbedWorker:2";

/// Full bridge identification advertised when popping jobs.
pub const BRIDGE_AGENT: &str = "GrimoireEmbedWorker:2:https://github.com/grimoire-llm/grimoire";

#[derive(Debug, Error)]
pub enum HordeError {
    #[error("cluster request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("cluster answered {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Body of a job pop request.
#[derive(Debug, Clone, Serialize)]
pub struct PopRequest {
    pub name: String,
    pub models: Vec<String>,
    pub max_length: u32,
    pub max_context_length: u32,
    pub priority_usernames: Vec<String>,
    pub softprompts: Vec<String>,
    pub bridge_agent: String,
}

/// A popped job. `id` is absent when the cluster has nothing queued.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoppedJob {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Serialize)]
struct Submission<'a> {
    id: &'a str,
    generation: &'a str,
    state: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitReply {
    #[serde(default)]
    reward: f64,
}

/// Thin wrapper over a shared [`reqwest::Client`] with cluster auth baked in.
#[derive(Debug, Clone)]
pub struct HordeClient {
    http: reqwest::Client,
    cluster: String,
}

impl HordeClient {
    pub fn new(cluster: impl Into<String>, api_key: &str) -> Result<Self, HordeError> {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(api_key) {
            headers.insert("apikey", value);
        } else {
            warn!("horde api key contains invalid header characters; sending without one");
        }
        headers.insert(USER_AGENT, HeaderValue::from_static(WORKER_USER_AGENT));
        headers.insert("Client-Agent", HeaderValue::from_static(CLIENT_AGENT));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            cluster: cluster.into(),
        })
    }

    /// Ask the cluster for one queued text job.
    pub async fn pop(&self, request: &PopRequest) -> Result<PoppedJob, HordeError> {
        let response = self
            .http
            .post(format!("{}/api/v2/generate/text/pop", self.cluster))
            .json(request)
            .send()
            .await?;
        Self::read_json(response).await
    }

    /// Submit a finished generation; returns the kudos reward.
    pub async fn submit(&self, job_id: &str, generation: &str) -> Result<f64, HordeError> {
        let response = self
            .http
            .post(format!("{}/api/v2/generate/text/submit", self.cluster))
            .json(&Submission {
                id: job_id,
                generation,
                state: "ok",
            })
            .send()
            .await?;
        let reply: SubmitReply = Self::read_json(response).await?;
        Ok(reply.reward)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, HordeError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HordeError::Status { status, body });
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_pop_body_means_no_job() {
        let popped: PoppedJob = serde_json::from_value(json!({})).unwrap();
        assert!(popped.id.is_none());

        let popped: PoppedJob = serde_json::from_value(json!({"id": null})).unwrap();
        assert!(popped.id.is_none());
    }

    #[test]
    fn popped_job_keeps_its_payload() {
        let popped: PoppedJob = serde_json::from_value(json!({
            "id": "job-7",
            "payload": {"prompt": "hello", "max_length": 80},
        }))
        .unwrap();
        assert_eq!(popped.id.as_deref(), Some("job-7"));
        assert_eq!(popped.payload["max_length"], 80);
    }
}
