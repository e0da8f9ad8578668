use crate::core::models::ReloadResponse;
use crate::source::{ReloadSource, TransportError};
use async_trait::async_trait;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::{StatusCode, Url};
use std::time::Duration;
use tokio::sync::Mutex;

const USER_AGENT: &str = concat!("mdpoll/", env!("CARGO_PKG_VERSION"));

/// Polls `<page path>?<marker>` over HTTP.
///
/// The server long-polls while the `If-None-Match` validator matches the
/// current document, so the last seen `ETag` is replayed on every request
/// unless validators are disabled.
pub struct HttpSource {
    client: reqwest::Client,
    page_url: Url,
    reload_url: Url,
    send_validators: bool,
    validator: Mutex<Option<String>>,
}

impl HttpSource {
    pub fn new(
        page_url: &str,
        query_marker: &str,
        send_validators: bool,
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let (page_url, reload_url) = build_urls(page_url, query_marker)?;

        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(TransportError::Request)?;

        Ok(Self {
            client,
            page_url,
            reload_url,
            send_validators,
            validator: Mutex::new(None),
        })
    }

    pub fn reload_url(&self) -> &Url {
        &self.reload_url
    }

    pub fn page_url(&self) -> &Url {
        &self.page_url
    }

    pub async fn validator(&self) -> Option<String> {
        self.validator.lock().await.clone()
    }

    /// Fetches the full page, the way a browser would on first load.
    pub async fn fetch_page(&self) -> Result<String, TransportError> {
        let response = self.client.get(self.page_url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let etag = etag_of(&response);
        let page = response.text().await.map_err(TransportError::Body)?;
        self.remember_validator(etag.as_deref()).await;
        Ok(page)
    }

    async fn remember_validator(&self, etag: Option<&str>) {
        let Some(etag) = etag else {
            return;
        };

        let mut validator = self.validator.lock().await;
        if validator.as_deref() != Some(etag) {
            tracing::trace!(etag, "Tracking new validator");
            *validator = Some(etag.to_string());
        }
    }
}

fn etag_of(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn build_urls(page_url: &str, query_marker: &str) -> Result<(Url, Url), TransportError> {
    let invalid = |reason: String| TransportError::InvalidUrl {
        url: page_url.to_string(),
        reason,
    };

    let mut page = Url::parse(page_url).map_err(|e| invalid(e.to_string()))?;
    if !matches!(page.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {:?}", page.scheme())));
    }
    page.set_fragment(None);
    page.set_query(None);

    let mut reload = page.clone();
    reload.set_query(Some(query_marker));

    Ok((page, reload))
}

#[async_trait]
impl ReloadSource for HttpSource {
    fn target(&self) -> String {
        self.reload_url.to_string()
    }

    async fn fetch(&self) -> Result<ReloadResponse, TransportError> {
        let mut request = self.client.get(self.reload_url.clone());

        if self.send_validators {
            if let Some(tag) = self.validator().await {
                request = request.header(IF_NONE_MATCH, tag);
            }
        }

        let response = request.send().await?;
        let status = response.status();

        let etag = etag_of(&response);

        // A 200 validator is only committed after the body has been applied.
        if status == StatusCode::NOT_MODIFIED {
            self.remember_validator(etag.as_deref()).await;
        }

        let body = if status == StatusCode::OK {
            response.text().await.map_err(TransportError::Body)?
        } else {
            // Drain so the connection can be reused; contents are irrelevant.
            let _ = response.bytes().await;
            String::new()
        };

        Ok(ReloadResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().map(str::to_string),
            etag,
            body,
        })
    }

    async fn commit_validator(&self, etag: Option<&str>) {
        self.remember_validator(etag).await;
    }
}
