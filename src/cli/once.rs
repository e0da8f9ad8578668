use crate::core::container::{ContentContainer, MemoryContainer};
use crate::core::models::PollOutcome;
use crate::core::settings::Settings;
use crate::poller::PreviewPoller;
use crate::source::HttpSource;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct OnceOutput {
    url: String,
    #[serde(flatten)]
    outcome: PollOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    contents: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    fetched_at: DateTime<Utc>,
}

pub async fn run(settings: &Settings, url: &str, json: bool) -> Result<()> {
    let source = Arc::new(
        HttpSource::new(
            url,
            &settings.poller.query_marker,
            settings.http.send_validators,
            settings.http.request_timeout(),
        )
        .context("Failed to set up HTTP client")?,
    );
    let container = MemoryContainer::new();

    let poller = PreviewPoller::new(
        source.clone(),
        Arc::new(container.clone()),
        settings.poller.schedule(),
    );
    let outcome = poller.poll(true).await;

    let contents = match outcome {
        PollOutcome::Updated { .. } => container.contents().await,
        _ => None,
    };

    let output = OnceOutput {
        url: source.reload_url().to_string(),
        outcome,
        etag: source.validator().await,
        contents,
        fetched_at: Utc::now(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_text_output(&output);
    }

    Ok(())
}

fn print_text_output(output: &OnceOutput) {
    match &output.outcome {
        PollOutcome::Updated { bytes } => println!("{}: updated ({} bytes)", output.url, bytes),
        PollOutcome::NotApplied { bytes, reason } => println!(
            "{}: received {} bytes but did not apply them: {}",
            output.url, bytes, reason
        ),
        PollOutcome::NotModified => println!("{}: not modified", output.url),
        PollOutcome::SoftError { status, reason } => println!(
            "{}: unexpected status {}{}",
            output.url,
            status,
            reason
                .as_ref()
                .map(|r| format!(" {}", r))
                .unwrap_or_default()
        ),
        PollOutcome::TransportFailure { message } => {
            println!("{}: request failed: {}", output.url, message)
        }
    }

    if let Some(etag) = &output.etag {
        println!("  ETag: {}", etag);
    }

    if let Some(contents) = &output.contents {
        println!();
        println!("{}", contents);
    }
}
