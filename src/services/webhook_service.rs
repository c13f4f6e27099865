//! Check-in webhook delivery.
//!
//! After an attendance token is consumed, the external attendance recorder
//! is told about it with an HMAC-signed POST. Delivery runs in the
//! background and never changes the outcome of the validation.

use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::models::webhook::{CheckInWebhookData, WebhookPayload};
use crate::services::token_service::CheckedInStudent;

type HmacSha256 = Hmac<Sha256>;

/// Per-delivery timeout (prevents hanging on slow endpoints)
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("invalid webhook url: {0}")]
    InvalidUrl(String),

    #[error("failed to serialize payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Sends `attendance.checked_in` events to one configured endpoint.
#[derive(Debug, Clone)]
pub struct CheckInNotifier {
    client: reqwest::Client,
    url: String,
    secret: String,
}

impl CheckInNotifier {
    /// Build a notifier after validating the target URL.
    pub fn new(url: &str, secret: &str) -> Result<Self, WebhookError> {
        validate_webhook_url(url)?;

        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            secret: secret.to_string(),
        })
    }

    /// Queue delivery of a check-in event and return immediately.
    pub fn notify(&self, student: &CheckedInStudent) {
        let notifier = self.clone();
        let check_in = CheckInWebhookData {
            student_uid: student.student_uid.clone(),
            student_name: student.student_name.clone(),
            checked_in_at: student.checked_in_at,
        };

        tokio::spawn(async move {
            if let Err(e) = notifier.deliver(check_in).await {
                tracing::error!("Failed to send check-in webhook to {}: {}", notifier.url, e);
            }
        });
    }

    /// Send a single signed webhook.
    ///
    /// # Headers Sent
    ///
    /// - `Content-Type: application/json`
    /// - `X-Webhook-Signature: sha256=<hex>`
    /// - `X-Webhook-Event-Id: <uuid>`
    ///
    /// Returns the receiver's HTTP status.
    pub async fn deliver(&self, check_in: CheckInWebhookData) -> Result<u16, WebhookError> {
        let event_id = Uuid::new_v4();
        let payload = WebhookPayload::checked_in(event_id, check_in);
        let payload_json = serde_json::to_string(&payload)?;

        let signature = generate_signature(&self.secret, &payload_json);

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("X-Webhook-Signature", &signature)
            .header("X-Webhook-Event-Id", event_id.to_string())
            .body(payload_json)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(%event_id, status = status.as_u16(), "check-in webhook delivered");
        } else {
            tracing::warn!(%event_id, status = status.as_u16(), "check-in webhook rejected by receiver");
        }

        Ok(status.as_u16())
    }
}

/// Generate HMAC-SHA256 signature for webhook payload.
///
/// # Format
///
/// `sha256=<hex_encoded_hmac>`
///
/// # Verification
///
/// Receivers should:
/// 1. Extract signature from `X-Webhook-Signature` header
/// 2. Compute HMAC-SHA256(secret, request_body)
/// 3. Compare using constant-time comparison
pub fn generate_signature(secret: &str, payload: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key length is valid");
    mac.update(payload.as_bytes());
    let result = mac.finalize();
    format!("sha256={}", hex::encode(result.into_bytes()))
}

/// Validate webhook URL format.
///
/// # Rules
///
/// - Must be valid URL
/// - Must be HTTPS (HTTP localhost allowed for development)
/// - Maximum 2048 characters
fn validate_webhook_url(url: &str) -> Result<(), WebhookError> {
    if url.len() > 2048 {
        return Err(WebhookError::InvalidUrl(
            "URL exceeds 2048 characters".to_string(),
        ));
    }

    let parsed = url::Url::parse(url)
        .map_err(|_| WebhookError::InvalidUrl("Invalid URL format".to_string()))?;

    match parsed.scheme() {
        "https" => Ok(()),
        "http" => {
            if matches!(
                parsed.host_str(),
                Some("localhost") | Some("127.0.0.1") | Some("0.0.0.0")
            ) {
                Ok(())
            } else {
                Err(WebhookError::InvalidUrl(
                    "HTTP is only allowed for localhost. Use HTTPS for production.".to_string(),
                ))
            }
        }
        _ => Err(WebhookError::InvalidUrl(
            "URL must use HTTP or HTTPS".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_prefixed_hex_hmac() {
        let signature = generate_signature("secret", r#"{"a":1}"#);
        let hex_part = signature.strip_prefix("sha256=").unwrap();
        assert_eq!(hex_part.len(), 64);

        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(br#"{"a":1}"#);
        assert_eq!(hex_part, hex::encode(mac.finalize().into_bytes()));

        assert_ne!(signature, generate_signature("other", r#"{"a":1}"#));
    }

    #[test]
    fn url_rules() {
        assert!(validate_webhook_url("https://records.example.com/hook").is_ok());
        assert!(validate_webhook_url("http://localhost:9000/hook").is_ok());
        assert!(validate_webhook_url("http://records.example.com/hook").is_err());
        assert!(validate_webhook_url("ftp://records.example.com").is_err());
        assert!(validate_webhook_url("not a url").is_err());

        let long = format!("https://example.com/{}", "a".repeat(2048));
        assert!(validate_webhook_url(&long).is_err());
    }

    #[test]
    fn notifier_rejects_bad_url() {
        assert!(matches!(
            CheckInNotifier::new("http://records.example.com", "s"),
            Err(WebhookError::InvalidUrl(_))
        ));
    }

    #[test]
    fn payload_shape() {
        let checked_in_at = chrono::DateTime::parse_from_rfc3339("2020-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let payload = WebhookPayload::checked_in(
            Uuid::new_v4(),
            CheckInWebhookData {
                student_uid: "u1".into(),
                student_name: "Alice".into(),
                checked_in_at,
            },
        );
        assert_eq!(payload.created_at, checked_in_at);

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["event_type"], "attendance.checked_in");
        assert_eq!(value["data"]["check_in"]["student_uid"], "u1");
        assert_eq!(value["created_at"], value["data"]["check_in"]["checked_in_at"]);
    }
}
