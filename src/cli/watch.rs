use crate::core::container::{ContentContainer, DocumentContainer};
use crate::core::settings::Settings;
use crate::poller::PreviewPoller;
use crate::source::HttpSource;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

pub async fn run(settings: &Settings, url: &str, output: PathBuf) -> Result<()> {
    let selector = settings.poller.selector()?;

    let source = Arc::new(
        HttpSource::new(
            url,
            &settings.poller.query_marker,
            settings.http.send_validators,
            settings.http.request_timeout(),
        )
        .context("Failed to set up HTTP client")?,
    );

    let page = source
        .fetch_page()
        .await
        .with_context(|| format!("Failed to load {}", source.page_url()))?;

    let document = Arc::new(DocumentContainer::new(page, selector, &output));
    if document.contents().await.is_none() {
        tracing::warn!(
            selector = %settings.poller.content_selector,
            "Page has no element matching the content selector, updates will not be visible"
        );
    }
    document
        .flush()
        .await
        .context("Failed to write initial preview")?;

    println!(
        "Previewing {} -> {}",
        source.page_url(),
        document.output().display()
    );

    let handle = PreviewPoller::new(source, document, settings.poller.schedule()).start();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    tracing::info!("Interrupted, stopping poller");
    handle.stop().await;
    Ok(())
}
