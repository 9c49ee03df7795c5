use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigError};
use crate::error::{Result, SyncError};

pub mod model;

pub use model::{Attachment, FilePart};

/// The single HTTP seam every data-access function goes through.
///
/// Paths are relative to the API origin (`api/v1/lead`). Implementations must
/// map HTTP 401 to [`SyncError::Unauthorized`] after triggering the login redirect.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str, query: &[(&'static str, String)]) -> Result<Value>;

    async fn post(&self, path: &str, body: &Value) -> Result<Value>;

    async fn put(&self, path: &str, body: &Value) -> Result<Value>;

    async fn delete(&self, path: &str) -> Result<Value>;

    async fn upload(&self, path: &str, parts: Vec<FilePart>) -> Result<Value>;
}

/// Hard navigation to the login page. Global: fires whichever slice made the call.
pub trait LoginRedirect: Send + Sync {
    fn redirect(&self, login_path: &str);
}

/// Default redirect for headless use: log it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRedirect;

impl LoginRedirect for LogRedirect {
    fn redirect(&self, login_path: &str) {
        warn!(login_path, "session rejected; login required");
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
    login_path: String,
    redirect: Arc<dyn LoginRedirect>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("login_path", &self.login_path)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(base_url: Url) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("console-sync/", env!("CARGO_PKG_VERSION")))
            .no_proxy()
            .build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            token: None,
            login_path: "/login".to_string(),
            redirect: Arc::new(LogRedirect),
        }
    }

    pub fn from_config(cfg: &Config) -> std::result::Result<Self, ClientInitError> {
        let base_url = cfg.base_url()?;
        let mut builder = Client::builder()
            .user_agent(cfg.api.user_agent.clone())
            .no_proxy();
        if let Some(timeout) = cfg.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = Self::with_client(builder.build()?, base_url)
            .with_login_path(cfg.app.login_path.clone());
        Ok(match &cfg.api.token {
            Some(token) => client.with_token(token.clone()),
            None => client,
        })
    }

    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_login_path(mut self, login_path: String) -> Self {
        self.login_path = login_path;
        self
    }

    pub fn with_redirect(mut self, redirect: Arc<dyn LoginRedirect>) -> Self {
        self.redirect = redirect;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    pub fn build_request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let endpoint = self.endpoint(path)?;
        let mut builder = self
            .http
            .request(method, endpoint)
            .header("Accept", "application/json");
        if let Some(token) = &self.token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        Ok(builder)
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<Value> {
        let request = builder.build()?;
        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "api request");
        for (name, value) in request.headers() {
            if name.as_str().eq_ignore_ascii_case("authorization") {
                debug!("  {}: Bearer [REDACTED]", name);
            } else {
                debug!("  {}: {}", name, value.to_str().unwrap_or("[invalid]"));
            }
        }

        let res = self.http.execute(request).await?;
        let status = res.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!(%method, %url, "received 401; redirecting to login");
            self.redirect.redirect(&self.login_path);
            return Err(SyncError::Unauthorized);
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%method, %url, status = status.as_u16(), "api error");
            return Err(SyncError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let body = res.text().await?;
        info!(%method, %url, status = status.as_u16(), bytes = body.len(), "api response");
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// Prefer the server's `message` field; fall back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum ClientInitError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

#[async_trait]
impl Transport for ApiClient {
    async fn get(&self, path: &str, query: &[(&'static str, String)]) -> Result<Value> {
        let builder = self.build_request(Method::GET, path)?.query(query);
        self.execute(builder).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let builder = self.build_request(Method::POST, path)?.json(body);
        self.execute(builder).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        let builder = self.build_request(Method::PUT, path)?.json(body);
        self.execute(builder).await
    }

    async fn delete(&self, path: &str) -> Result<Value> {
        let builder = self.build_request(Method::DELETE, path)?;
        self.execute(builder).await
    }

    async fn upload(&self, path: &str, parts: Vec<FilePart>) -> Result<Value> {
        let mut form = Form::new();
        for part in parts {
            let Attachment {
                file_name,
                content_type,
                bytes,
            } = part.attachment;
            let body = Part::bytes(bytes)
                .file_name(file_name)
                .mime_str(&content_type)?;
            form = form.part(part.field, body);
        }
        let builder = self.build_request(Method::POST, path)?.multipart(form);
        self.execute(builder).await
    }
}
