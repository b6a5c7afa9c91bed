//! vSphere REST API HTTP client with session-based authentication.
//!
//! Communicates with vCenter via `https://{host}/api/...` and, for the few
//! managed-object methods the Automation API lacks, the VI/JSON endpoints at
//! `https://{host}/sdk/vim25/{release}/...`. Both accept the same session
//! token in the `vmware-api-session-id` header.

use crate::error::{VmwareError, VmwareErrorKind, VmwareResult};
use crate::types::VsphereConfig;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

const SESSION_HEADER: &str = "vmware-api-session-id";

/// vSphere REST API client.
pub struct VsphereClient {
    client: Client,
    base_url: String,
    session_id: Option<String>,
    config: VsphereConfig,
}

impl VsphereClient {
    /// Build a new client from config (does NOT create a session yet).
    pub fn new(config: &VsphereConfig) -> VmwareResult<Self> {
        if config.host.trim().is_empty() {
            return Err(VmwareError::invalid_param("vCenter hostname must not be empty"));
        }

        let client = Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VmwareError::connection(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url_for(config)?,
            session_id: None,
            config: config.clone(),
        })
    }

    /// Whether we have an active session.
    pub fn is_connected(&self) -> bool {
        self.session_id.is_some()
    }

    // ── Session management ──────────────────────────────────────────

    /// Create a new API session (POST /api/session).
    pub async fn login(&mut self) -> VmwareResult<()> {
        let url = format!("{}/api/session", self.base_url);
        log::debug!("Opening vSphere session on {} as {}", self.base_url, self.config.username);

        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(VmwareError::auth(format!(
                "Invalid credentials for {}",
                self.config.username
            )));
        }

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(VmwareError::api(
                status.as_u16(),
                format!("Login failed: {body}"),
            ));
        }

        // Session ID comes back as a quoted JSON string
        let session_id: String = resp.json().await.map_err(|e| {
            VmwareError::parse(format!("Failed to parse session response: {e}"))
        })?;

        self.session_id = Some(session_id);
        Ok(())
    }

    /// Delete the current session (DELETE /api/session).
    pub async fn logout(&mut self) -> VmwareResult<()> {
        if let Some(ref sid) = self.session_id {
            let url = format!("{}/api/session", self.base_url);
            if let Err(e) = self.client.delete(&url).header(SESSION_HEADER, sid.as_str()).send().await {
                log::warn!("Failed to close vSphere session: {e}");
            }
        }
        self.session_id = None;
        Ok(())
    }

    // ── HTTP helpers ────────────────────────────────────────────────

    fn require_session(&self) -> VmwareResult<&str> {
        self.session_id
            .as_deref()
            .ok_or_else(|| VmwareError::auth("Not logged in: no active session"))
    }

    fn request(&self, builder: RequestBuilder) -> VmwareResult<RequestBuilder> {
        let sid = self.require_session()?;
        Ok(builder.header(SESSION_HEADER, sid))
    }

    /// GET a JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> VmwareResult<T> {
        self.get_with_params(path, &[]).await
    }

    /// GET a JSON response with query params.
    pub async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> VmwareResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.request(self.client.get(&url))?;
        if !params.is_empty() {
            builder = builder.query(params);
        }
        let resp = builder.send().await?;
        let resp = Self::check_status(resp).await?;
        Self::parse_response(resp).await
    }

    /// POST with JSON body, return parsed response.
    pub async fn post<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> VmwareResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.request(self.client.post(&url))?.json(body).send().await?;
        let resp = Self::check_status(resp).await?;
        Self::parse_response(resp).await
    }

    /// POST with no body, return nothing (discards response).
    pub async fn post_empty(&self, path: &str) -> VmwareResult<()> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.request(self.client.post(&url))?.send().await?;
        Self::check_status(resp).await?;
        Ok(())
    }

    /// PUT with JSON body.
    pub async fn put<B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> VmwareResult<()> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.request(self.client.put(&url))?.json(body).send().await?;
        Self::check_status(resp).await?;
        Ok(())
    }

    /// DELETE, ignoring response body.
    pub async fn delete(&self, path: &str) -> VmwareResult<()> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.request(self.client.delete(&url))?.send().await?;
        Self::check_status(resp).await?;
        Ok(())
    }

    // ── VI/JSON ─────────────────────────────────────────────────────

    /// Path of a managed-object property or method on the VI/JSON API.
    pub fn vi_path(&self, mo_type: &str, mo_id: &str, member: &str) -> String {
        format!(
            "/sdk/vim25/{}/{}/{}/{}",
            self.config.api_release,
            mo_type,
            escape(mo_id),
            member
        )
    }

    /// Invoke a managed-object method with arguments and parse its return value.
    pub async fn vi_call<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        mo_type: &str,
        mo_id: &str,
        method: &str,
        args: &B,
    ) -> VmwareResult<T> {
        let path = self.vi_path(mo_type, mo_id, method);
        self.post(&path, args).await
    }

    /// Invoke a managed-object method that takes no arguments.
    pub async fn vi_invoke(&self, mo_type: &str, mo_id: &str, method: &str) -> VmwareResult<()> {
        let path = self.vi_path(mo_type, mo_id, method);
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .request(self.client.post(&url))?
            .json(&serde_json::json!({}))
            .send()
            .await?;
        Self::check_status(resp).await?;
        Ok(())
    }

    /// Read a managed-object property.
    pub async fn vi_property<T: DeserializeOwned>(
        &self,
        mo_type: &str,
        mo_id: &str,
        property: &str,
    ) -> VmwareResult<T> {
        let path = self.vi_path(mo_type, mo_id, property);
        self.get(&path).await
    }

    // ── Internal helpers ────────────────────────────────────────────

    async fn check_status(resp: Response) -> VmwareResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let code = status.as_u16();
        let body = resp.text().await.unwrap_or_default();

        match status {
            StatusCode::UNAUTHORIZED => Err(VmwareError::auth(format!("Session expired or invalid: {body}"))),
            StatusCode::FORBIDDEN => Err(VmwareError::new(
                VmwareErrorKind::AccessDenied,
                format!("Access denied: {body}"),
            )),
            StatusCode::NOT_FOUND => Err(VmwareError::not_found(format!("Resource not found: {body}"))),
            _ => Err(VmwareError::api(code, format!("API error {code}: {body}"))),
        }
    }

    async fn parse_response<T: DeserializeOwned>(resp: Response) -> VmwareResult<T> {
        let text = resp.text().await.map_err(|e| {
            VmwareError::parse(format!("Failed to read response body: {e}"))
        })?;
        parse_body(&text)
    }
}

/// `https://host:port` from the configured hostname. The hostname may carry
/// an `https://` scheme and a port; a non-default port given there wins over
/// `config.port`.
fn base_url_for(config: &VsphereConfig) -> VmwareResult<String> {
    let raw = config.host.trim().trim_end_matches('/');
    let invalid = |why: String| VmwareError::invalid_param(format!("invalid vCenter hostname '{raw}': {why}"));

    let with_scheme = if raw.contains("://") { raw.to_string() } else { format!("https://{raw}") };
    let url = Url::parse(&with_scheme).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "https" {
        return Err(invalid(format!("scheme '{}' is not supported, use https", url.scheme())));
    }
    if url.path() != "/" || url.query().is_some() || !url.username().is_empty() {
        return Err(invalid("expected a bare host name".into()));
    }
    let host = url.host_str().ok_or_else(|| invalid("no host".into()))?;
    Ok(format!("https://{}:{}", host, url.port().unwrap_or(config.port)))
}

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Percent-encode a managed-object id for use as one URL path segment.
pub(crate) fn escape(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

fn parse_body<T: DeserializeOwned>(text: &str) -> VmwareResult<T> {
    if text.trim().is_empty() {
        // Some vSphere endpoints return empty body for success
        return serde_json::from_str("null").map_err(|e| {
            VmwareError::parse(format!("Cannot deserialise empty response: {e}"))
        });
    }

    serde_json::from_str(text).map_err(|e| {
        let head: String = text.chars().take(500).collect();
        VmwareError::parse(format!("JSON parse error: {e}; body: {head}"))
    })
}
