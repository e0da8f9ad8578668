use serde::Serialize;
use tokio::time::Instant;

/// Per-cycle state of the polling loop.
#[derive(Debug, Clone, Copy)]
pub struct PollState {
    pub is_first_request: bool,
    pub cycle_start: Instant,
}

impl PollState {
    pub fn begin(is_first_request: bool) -> Self {
        Self {
            is_first_request,
            cycle_start: Instant::now(),
        }
    }
}

/// A completed response to a reload request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadResponse {
    pub status: u16,
    pub reason: Option<String>,
    pub etag: Option<String>,
    pub body: String,
}

#[cfg(test)]
impl ReloadResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            reason: Some("OK".to_string()),
            etag: None,
            body: body.into(),
        }
    }

    pub fn not_modified() -> Self {
        Self {
            status: 304,
            reason: Some("Not Modified".to_string()),
            etag: None,
            body: String::new(),
        }
    }

    pub fn with_status(status: u16, reason: Option<&str>) -> Self {
        Self {
            status,
            reason: reason.map(str::to_string),
            etag: None,
            body: String::new(),
        }
    }
}

impl ReloadResponse {
    pub fn class(&self) -> ResponseClass {
        match self.status {
            200 => ResponseClass::Changed,
            304 => ResponseClass::Unchanged,
            _ => ResponseClass::Anomaly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Changed,
    Unchanged,
    Anomaly,
}

/// What a single poll cycle ended with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PollOutcome {
    Updated {
        bytes: usize,
    },
    /// New markup arrived but the container could not take it.
    NotApplied {
        bytes: usize,
        reason: String,
    },
    NotModified,
    SoftError {
        status: u16,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    TransportFailure {
        message: String,
    },
}

impl PollOutcome {
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, PollOutcome::TransportFailure { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            PollOutcome::Updated { .. } => "updated",
            PollOutcome::NotApplied { .. } => "not applied",
            PollOutcome::NotModified => "not modified",
            PollOutcome::SoftError { .. } => "soft error",
            PollOutcome::TransportFailure { .. } => "transport failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_classes() {
        assert_eq!(ReloadResponse::ok("<p>x</p>").class(), ResponseClass::Changed);
        assert_eq!(
            ReloadResponse::not_modified().class(),
            ResponseClass::Unchanged
        );
        assert_eq!(
            ReloadResponse::with_status(404, Some("Not Found")).class(),
            ResponseClass::Anomaly
        );
        assert_eq!(
            ReloadResponse::with_status(204, None).class(),
            ResponseClass::Anomaly
        );
    }

    #[test]
    fn test_outcome_json_shape() {
        let json = serde_json::to_value(PollOutcome::SoftError {
            status: 500,
            reason: None,
        })
        .unwrap();
        assert_eq!(json["outcome"], "soft_error");
        assert_eq!(json["status"], 500);
        assert!(json.get("reason").is_none());

        let json = serde_json::to_value(PollOutcome::Updated { bytes: 9 }).unwrap();
        assert_eq!(json["outcome"], "updated");
        assert_eq!(json["bytes"], 9);

        let json = serde_json::to_value(PollOutcome::NotApplied {
            bytes: 9,
            reason: "no element matches".into(),
        })
        .unwrap();
        assert_eq!(json["outcome"], "not_applied");
        assert_eq!(json["reason"], "no element matches");
    }

    #[test]
    fn test_transport_failure_flag() {
        assert!(PollOutcome::TransportFailure {
            message: "refused".into()
        }
        .is_transport_failure());
        assert!(!PollOutcome::NotModified.is_transport_failure());
    }
}
