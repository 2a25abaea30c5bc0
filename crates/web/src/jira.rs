use std::{fmt::Display, sync::Arc};

use axum::{
    body::Bytes,
    extract::{FromRef, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use recheck_core::config::Config;
use serde::Deserialize;
use sha2::Sha256;

/// Verify and extract a Jira webhook payload.
#[derive(Clone)]
#[must_use]
pub struct JiraEvent {
    pub event: JiraWebhookEvent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraWebhookEvent {
    #[serde(default, rename = "webhookEvent")]
    pub webhook_event: String,
    pub issue: Option<JiraIssue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraIssue {
    pub key: String,
}

impl<S> FromRequest<S> for JiraEvent
where
    Arc<Config>: FromRef<S>,
    S: Send + Sync + Clone,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        fn err(m: impl Display) -> Response {
            tracing::error!("{m}");
            (StatusCode::BAD_REQUEST, m.to_string()).into_response()
        }
        let config = <Arc<Config>>::from_ref(state);
        let secret = config.jira.as_ref().and_then(|jira| jira.webhook_secret.as_deref());
        let body = if let Some(secret) = secret {
            let signature_sha256 = req
                .headers()
                .get("X-Hub-Signature")
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| err("X-Hub-Signature missing"))?
                .strip_prefix("sha256=")
                .ok_or_else(|| err("X-Hub-Signature sha256= prefix missing"))?;
            let signature =
                hex::decode(signature_sha256).map_err(|_| err("X-Hub-Signature malformed"))?;
            let body =
                Bytes::from_request(req, state).await.map_err(|_| err("error reading body"))?;
            let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
                .expect("HMAC can take key of any size");
            mac.update(&body);
            if mac.verify_slice(&signature).is_err() {
                return Err(err("signature mismatch"));
            }
            body
        } else {
            Bytes::from_request(req, state).await.map_err(|_| err("error reading body"))?
        };
        let event: JiraWebhookEvent =
            serde_json::from_slice(&body).map_err(|_| err("error parsing body"))?;
        Ok(JiraEvent { event })
    }
}

#[cfg(test)]
mod tests {
    use super::JiraWebhookEvent;

    #[test]
    fn parses_issue_event_payload() {
        let payload = r#"{
            "timestamp": 1754500000000,
            "webhookEvent": "jira:issue_updated",
            "issue": {
                "id": "10002",
                "key": "JIRA-42",
                "fields": { "summary": "Flaky build" }
            }
        }"#;
        let event: JiraWebhookEvent = serde_json::from_str(payload).unwrap();
        assert_eq!(event.webhook_event, "jira:issue_updated");
        assert_eq!(event.issue.unwrap().key, "JIRA-42");
    }

    #[test]
    fn tolerates_payload_without_issue() {
        let payload = r#"{"webhookEvent": "comment_created"}"#;
        let event: JiraWebhookEvent = serde_json::from_str(payload).unwrap();
        assert!(event.issue.is_none());
    }
}
