use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use crate::core::config::Settings;

/// Normalized verdict from the external grading service. Scores arrive on a
/// 0-100 scale and are rescaled to section maxima by the caller.
#[derive(Debug, Clone)]
pub(crate) struct GraderVerdict {
    pub(crate) score: f64,
    pub(crate) commentary: String,
}

#[derive(Debug, Clone)]
pub(crate) struct GraderClient {
    client: Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
    configured: bool,
}

impl GraderClient {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.grader().timeout_seconds);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.grader().base_url.trim_end_matches('/').to_string(),
            api_key: settings.grader().api_key.clone(),
            max_retries: settings.grader().max_retries,
            configured: settings.grader().is_configured(),
        })
    }

    pub(crate) fn is_configured(&self) -> bool {
        self.configured
    }

    /// Grades one free-text answer against its prompt. Retries transient
    /// failures with exponential backoff; a final failure is returned to the
    /// caller, never converted into a zero score.
    pub(crate) async fn grade(&self, prompt: &str, answer: &str) -> Result<GraderVerdict> {
        if !self.configured {
            anyhow::bail!("grading service is not configured");
        }

        let timer = Instant::now();
        let payload = json!({
            "prompt": prompt,
            "answer": answer,
        });

        let url = format!("{}/v1/grade", self.base_url);
        let mut last_error = None;
        let mut body = Value::Null;

        for attempt in 0..=self.max_retries {
            let response =
                self.client.post(&url).bearer_auth(&self.api_key).json(&payload).send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    body = resp.json().await.unwrap_or(Value::Null);
                    if status.is_success() {
                        last_error = None;
                        break;
                    }
                    last_error = Some(anyhow::anyhow!("grader API error: {body}"));
                }
                Err(err) => {
                    last_error = Some(anyhow::anyhow!(err).context("Failed to call grader API"));
                }
            }

            if attempt < self.max_retries {
                tokio::time::sleep(Duration::from_secs(2_u64.pow(attempt))).await;
            }
        }

        if let Some(err) = last_error {
            metrics::counter!("grader_failures_total").increment(1);
            return Err(err);
        }

        let score = body
            .get("score")
            .and_then(|value| value.as_f64())
            .context("Missing grader response score")?;
        let commentary = body
            .get("commentary")
            .and_then(|value| value.as_str())
            .unwrap_or_default()
            .to_string();

        tracing::info!(
            duration_seconds = timer.elapsed().as_secs_f64(),
            score,
            "Grader verdict received"
        );

        Ok(GraderVerdict { score, commentary })
    }
}
