use crate::core::dom::Selector;
use crate::core::schedule::{RearmPolicy, RearmSchedule};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub debug: bool,
    pub poller: PollerSettings,
    pub http: HttpSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerSettings {
    pub query_marker: String,
    pub poll_ceiling_ms: u64,
    pub content_selector: String,
    pub policy: RearmPolicy,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            query_marker: "reload".to_string(),
            poll_ceiling_ms: 1000,
            content_selector: "article.markdown-body".to_string(),
            policy: RearmPolicy::FixedInterval,
        }
    }
}

impl PollerSettings {
    pub fn schedule(&self) -> RearmSchedule {
        RearmSchedule::new(self.policy, Duration::from_millis(self.poll_ceiling_ms))
    }

    pub fn selector(&self) -> Result<Selector> {
        self.content_selector
            .parse()
            .with_context(|| format!("Invalid content selector: {:?}", self.content_selector))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub send_validators: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            send_validators: true,
            request_timeout_secs: None,
        }
    }
}

impl HttpSettings {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("mdpoll").join("config.toml"))
    }

    /// Loads the explicit file if given, otherwise the default config path.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let settings = match explicit {
            Some(path) => Self::load_from(path)?,
            None => {
                let path = Self::config_path().context("Could not determine config directory")?;

                if !path.exists() {
                    tracing::debug!(?path, "Config file not found, using defaults");
                    Self::default()
                } else {
                    Self::load_from(&path)?
                }
            }
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::info!(?path, "Loaded config");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poller.query_marker.trim().is_empty() {
            anyhow::bail!("poller.query_marker must not be empty");
        }
        if self.poller.query_marker.contains(['?', '#', '&']) {
            anyhow::bail!(
                "poller.query_marker must be a bare query token, got {:?}",
                self.poller.query_marker
            );
        }
        if self.poller.poll_ceiling_ms == 0 {
            anyhow::bail!("poller.poll_ceiling_ms must be greater than 0");
        }
        self.poller.selector()?;
        if self.http.request_timeout_secs == Some(0) {
            anyhow::bail!("http.request_timeout_secs must be greater than 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.poller.query_marker, "reload");
        assert_eq!(settings.poller.poll_ceiling_ms, 1000);
        assert_eq!(settings.poller.content_selector, "article.markdown-body");
        assert_eq!(settings.poller.policy, RearmPolicy::FixedInterval);
        assert!(settings.http.send_validators);
        assert!(settings.http.request_timeout().is_none());
        assert!(!settings.debug);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = Settings::default();
        settings.poller.poll_ceiling_ms = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.poller.query_marker = "  ".to_string();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.poller.query_marker = "reload&x=1".to_string();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.poller.content_selector = "main > article".to_string();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.http.request_timeout_secs = Some(0);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            debug = true

            [poller]
            query_marker = "refresh"
            poll_ceiling_ms = 250
            policy = "immediate-rearm"

            [http]
            send_validators = false
            request_timeout_secs = 45
        "#;

        let settings: Settings = toml::from_str(toml).unwrap();
        assert!(settings.debug);
        assert_eq!(settings.poller.query_marker, "refresh");
        assert_eq!(settings.poller.poll_ceiling_ms, 250);
        assert_eq!(settings.poller.content_selector, "article.markdown-body");
        assert_eq!(settings.poller.policy, RearmPolicy::ImmediateRearm);
        assert!(!settings.http.send_validators);
        assert_eq!(settings.http.request_timeout(), Some(Duration::from_secs(45)));

        let schedule = settings.poller.schedule();
        assert_eq!(schedule.policy(), RearmPolicy::ImmediateRearm);
        assert_eq!(schedule.ceiling(), Duration::from_millis(250));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[poller]\ncontent_selector = \"#preview\"\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.poller.content_selector, "#preview");
        assert_eq!(settings.poller.query_marker, "reload");

        std::fs::write(&path, "[poller]\npoll_ceiling_ms = 0\n").unwrap();
        assert!(Settings::load(Some(&path)).is_err());

        assert!(Settings::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_round_trips_through_toml() {
        let rendered = toml::to_string(&Settings::default()).unwrap();
        assert!(rendered.contains("policy = \"fixed-interval\""));
        assert!(!rendered.contains("request_timeout_secs"));
    }
}
