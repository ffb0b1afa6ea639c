use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha1::Sha1;

use super::{ActorDirectory, Contact, EmailSink, NotificationSink};
use crate::models::{EmailTemplate, EmailTrigger, NotificationEvent};

pub const SIGNATURE_HEADER: &str = "x-talentbook-signature";

/// Base64 HMAC-SHA1 of `body`, so receivers can check the sender.
pub fn sign_payload(secret: &str, body: &[u8]) -> anyhow::Result<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid signing secret: {e}"))?;
    mac.update(body);
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

async fn post_signed<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    secret: Option<&str>,
    payload: &T,
) -> anyhow::Result<()> {
    let body = serde_json::to_vec(payload)?;
    let mut request = client
        .post(url)
        .header(reqwest::header::CONTENT_TYPE, "application/json");
    if let Some(secret) = secret {
        request = request.header(SIGNATURE_HEADER, sign_payload(secret, &body)?);
    }

    request
        .body(body)
        .send()
        .await
        .with_context(|| format!("failed to reach {url}"))?
        .error_for_status()
        .with_context(|| format!("{url} returned error"))?;

    Ok(())
}

pub struct WebhookNotifier {
    url: String,
    secret: Option<String>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: String, secret: Option<String>) -> Self {
        Self {
            url,
            secret,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn notify(&self, event: &NotificationEvent) -> anyhow::Result<()> {
        post_signed(&self.client, &self.url, self.secret.as_deref(), event)
            .await
            .context("notification delivery failed")
    }
}

pub struct WebhookMailer {
    base_url: String,
    secret: Option<String>,
    client: reqwest::Client,
}

impl WebhookMailer {
    pub fn new(base_url: String, secret: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            secret,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmailSink for WebhookMailer {
    async fn send(&self, template: EmailTemplate, email: &EmailTrigger) -> anyhow::Result<()> {
        let url = format!("{}/{}", self.base_url, template.as_str());
        post_signed(&self.client, &url, self.secret.as_deref(), email)
            .await
            .context("email delivery failed")
    }
}

pub struct HttpDirectory {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDirectory {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ActorDirectory for HttpDirectory {
    async fn contact(&self, actor_id: &str) -> anyhow::Result<Option<Contact>> {
        let url = format!("{}/actors/{actor_id}", self.base_url);
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .context("failed to reach actor directory")?;

        if res.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let contact = res
            .error_for_status()
            .context("actor directory returned error")?
            .json::<Contact>()
            .await
            .context("invalid actor directory response")?;
        Ok(Some(contact))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_stable_and_keyed() {
        let a = sign_payload("secret", b"{\"x\":1}").unwrap();
        let b = sign_payload("secret", b"{\"x\":1}").unwrap();
        let c = sign_payload("other", b"{\"x\":1}").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        // 20-byte SHA1 MAC, base64 encoded
        assert_eq!(a.len(), 28);
    }
}
