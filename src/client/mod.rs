// src/client/mod.rs

pub mod retry;
pub mod types;

pub use retry::{with_backoff, AttemptError, RetryPolicy};
pub use types::{first_string, ChatMessage, Role};

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::config::ApiConfig;
use types::{HerbalRemedyRequest, TranslateRequest};

const TRANSLATION_KEYS: &[&str] = &["translatedText", "translated_text", "translation", "text"];

/// JSON client for the backend REST API. Every call goes through the
/// retry policy.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
    policy: RetryPolicy,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, policy: RetryPolicy) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("medidash/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base = base_url(config.base_url())?;
        debug!(%base, "api client ready");
        Ok(Self { http, base, policy })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve an endpoint path against the base, keeping any path prefix
    /// the base carries.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("joining `{}` onto `{}`", path, self.base))
    }

    #[instrument(skip(self, history), fields(history = history.len()))]
    pub async fn herbal_remedy(&self, message: &str, history: &[ChatMessage]) -> Result<Value> {
        let url = self.endpoint("api/herbal-remedy")?;
        let body = HerbalRemedyRequest { message, history };
        self.send("herbal-remedy", || self.http.post(url.clone()).json(&body))
            .await
    }

    #[instrument(skip(self))]
    pub async fn herb_info(&self, name: &str) -> Result<Value> {
        let url = self.endpoint("api/herb-info")?;
        self.send("herb-info", || self.http.get(url.clone()).query(&[("name", name)]))
            .await
    }

    /// Translated text, read from the first string field the backend uses.
    #[instrument(skip(self, text))]
    pub async fn translate(&self, text: &str, target: &str) -> Result<String> {
        let url = self.endpoint("api/translate")?;
        let body = TranslateRequest { text, target };
        let value = self
            .send("translate", || self.http.post(url.clone()).json(&body))
            .await?;
        first_string(&value, TRANSLATION_KEYS)
            .ok_or_else(|| anyhow!("translate response has no translated text: {}", value))
    }

    pub async fn captcha_challenge(&self) -> Result<Value> {
        let url = self.endpoint("api/captcha/challenge")?;
        self.send("captcha-challenge", || self.http.get(url.clone()))
            .await
    }

    #[instrument(skip(self))]
    pub async fn medicine(&self, id: &str) -> Result<Value> {
        let mut url = self.endpoint("api/medicine/")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("base url `{}` cannot carry a path", self.base))?
            .pop_if_empty()
            .push(id);
        self.send("medicine", || self.http.get(url.clone())).await
    }

    async fn send<F>(&self, what: &str, build: F) -> Result<Value>
    where
        F: Fn() -> RequestBuilder,
    {
        with_backoff(&self.policy, |attempt| {
            let request = build();
            async move {
                debug!(attempt, "sending request");
                let resp = request.send().await?;
                let status = resp.status();
                if !status.is_success() {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(AttemptError::from_status(status, &body));
                }
                resp.json::<Value>().await.map_err(AttemptError::from)
            }
        })
        .await
        .with_context(|| format!("{} request failed", what))
    }
}

fn base_url(raw: &str) -> Result<Url> {
    let mut raw = raw.trim().to_string();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    Url::parse(&raw).with_context(|| format!("invalid base url `{}`", raw))
}
