use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::core::config::Settings;

#[derive(Debug, Deserialize)]
struct TgSendResponse {
    ok: bool,
    result: Option<TgMessage>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct TgOkResponse {
    ok: bool,
    description: Option<String>,
}

/// Telegram delivery for reviewer and candidate notifications. Every send is
/// fire-and-forget: a delivery failure is logged and swallowed, it never
/// fails the transition that triggered it.
#[derive(Debug, Clone)]
pub(crate) struct Notifier {
    client: Client,
    token: String,
    reviewers_chat_id: String,
    results_chat_id: String,
}

pub(crate) struct ReviewNotification<'a> {
    pub task_id: &'a str,
    pub candidate_name: &'a str,
    pub exam_title: &'a str,
    pub section_kind: &'a str,
}

pub(crate) struct ResultNotification<'a> {
    pub candidate_name: &'a str,
    pub exam_title: &'a str,
    pub score: f64,
    pub level: &'a str,
}

impl Notifier {
    pub(crate) fn from_settings(settings: &Settings) -> Self {
        Self {
            client: Client::new(),
            token: settings.notifier().bot_token.clone(),
            reviewers_chat_id: settings.notifier().reviewers_chat_id.clone(),
            results_chat_id: settings.notifier().results_chat_id.clone(),
        }
    }

    pub(crate) fn is_configured(&self) -> bool {
        !self.token.trim().is_empty() && !self.reviewers_chat_id.trim().is_empty()
    }

    /// Announces a new manual-review task to the reviewers chat. Returns the
    /// message id so the announcement can be retracted once claimed.
    pub(crate) async fn notify_reviewers(
        &self,
        notification: ReviewNotification<'_>,
    ) -> Option<i64> {
        if !self.is_configured() {
            tracing::warn!("Notifier is not configured, skipping reviewer notification");
            return None;
        }

        let text = format!(
            "\u{1F4DD} New submission awaiting review\n\
             Candidate: <b>{}</b>\n\
             Exam: <b>{}</b>\n\
             Section: <b>{}</b>\n\
             Task: <code>{}</code>",
            escape_html(notification.candidate_name),
            escape_html(notification.exam_title),
            escape_html(notification.section_kind),
            escape_html(notification.task_id),
        );

        let message_id = self.send_message(&self.reviewers_chat_id, &text).await?;
        metrics::counter!("notifications_sent_total").increment(1);
        Some(message_id)
    }

    pub(crate) async fn notify_candidate_result(&self, notification: ResultNotification<'_>) {
        if self.token.trim().is_empty() || self.results_chat_id.trim().is_empty() {
            tracing::warn!("Notifier is not configured, skipping result notification");
            return;
        }

        let text = format!(
            "\u{1F3C1} Exam completed\n\
             Candidate: <b>{}</b>\n\
             Exam: <b>{}</b>\n\
             Score: <b>{}</b>\n\
             Level: <b>{}</b>",
            escape_html(notification.candidate_name),
            escape_html(notification.exam_title),
            notification.score,
            escape_html(notification.level),
        );

        if self.send_message(&self.results_chat_id, &text).await.is_some() {
            metrics::counter!("notifications_sent_total").increment(1);
        }
    }

    /// Removes a reviewer announcement after the task is claimed, so the
    /// chat only shows work still up for grabs.
    pub(crate) async fn retract_notification(&self, message_id: i64) {
        if !self.is_configured() {
            return;
        }

        let response = self
            .client
            .post(format!("https://api.telegram.org/bot{}/deleteMessage", self.token))
            .json(&json!({
                "chat_id": self.reviewers_chat_id,
                "message_id": message_id,
            }))
            .send()
            .await;

        match response {
            Ok(resp) => match resp.json::<TgOkResponse>().await {
                Ok(payload) if payload.ok => {
                    metrics::counter!("notifications_retracted_total").increment(1);
                }
                Ok(payload) => {
                    let description = payload
                        .description
                        .unwrap_or_else(|| "unknown Telegram API error".to_string());
                    tracing::warn!(message_id, description, "Failed to retract notification");
                }
                Err(err) => {
                    tracing::warn!(error = %err, message_id, "Failed to decode deleteMessage payload");
                }
            },
            Err(err) => {
                tracing::warn!(error = %err, message_id, "Failed to request message deletion");
            }
        }
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Option<i64> {
        let response = self
            .client
            .post(format!("https://api.telegram.org/bot{}/sendMessage", self.token))
            .json(&json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
            }))
            .send()
            .await;

        match response {
            Ok(resp) => match resp.json::<TgSendResponse>().await {
                Ok(payload) if payload.ok => payload.result.map(|message| message.message_id),
                Ok(payload) => {
                    let description = payload
                        .description
                        .unwrap_or_else(|| "unknown Telegram API error".to_string());
                    tracing::warn!(description, "Telegram sendMessage returned ok=false");
                    None
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to decode sendMessage payload");
                    None
                }
            },
            Err(err) => {
                tracing::warn!(error = %err, "Failed to send Telegram message");
                None
            }
        }
    }
}

fn escape_html(value: &str) -> String {
    value.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
