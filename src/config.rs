//! Browser configuration
//!
//! Loaded from YAML (`config/facet_tree.yaml`), then overridden from the
//! environment. Every key is optional.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use dataset_client::{HttpGatewayOptions, WireFormat};
use serde::Deserialize;

use crate::render::DEFAULT_ITEM_LINK_TEMPLATE;

pub const ENV_CONFIG_PATH: &str = "FACET_TREE_CONFIG";
pub const ENV_BASE_URL: &str = "FACET_TREE_BASE_URL";
pub const ENV_WIRE_FORMAT: &str = "FACET_TREE_WIRE_FORMAT";
pub const ENV_SAMPLE_SIZE: &str = "FACET_TREE_SAMPLE_SIZE";
pub const ENV_GROUP_PAGE_SIZE: &str = "FACET_TREE_GROUP_PAGE_SIZE";
pub const ENV_TIMEOUT_SECS: &str = "FACET_TREE_TIMEOUT_SECS";

/// Facet options offered when none are configured
pub const DEFAULT_ATTRIBUTES: [&str; 7] = [
    "keyword",
    "lab",
    "institution",
    "doi",
    "experimenter",
    "units",
    "electrodes",
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserConfig {
    pub gateway: GatewaySettings,
    /// Facet options, in the order offered to the user
    pub attributes: Vec<String>,
    /// Item-detail link, `{id}` replaced by the item id
    pub item_link_template: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewaySettings {
    pub base_url: String,
    pub wire_format: WireFormat,
    pub sample_size: usize,
    pub group_page_size: usize,
    pub timeout_secs: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        let http = HttpGatewayOptions::default();
        Self {
            base_url: http.base_url,
            wire_format: http.wire_format,
            sample_size: http.sample_size,
            group_page_size: http.group_page_size,
            timeout_secs: http.timeout.as_secs(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            gateway: GatewaySettings::default(),
            attributes: DEFAULT_ATTRIBUTES.iter().map(|a| a.to_string()).collect(),
            item_link_template: DEFAULT_ITEM_LINK_TEMPLATE.to_string(),
        }
    }
}

impl BrowserConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Load configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: BrowserConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// File (if given) or defaults, then `.env` and process environment
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        // A missing .env is fine
        let _ = dotenvy::dotenv();
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `FACET_TREE_*` overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.gateway.base_url = url;
        }
        if let Some(format) = lookup(ENV_WIRE_FORMAT) {
            self.gateway.wire_format = format
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .with_context(|| format!("invalid {ENV_WIRE_FORMAT}"))?;
        }
        if let Some(size) = lookup(ENV_SAMPLE_SIZE) {
            self.gateway.sample_size = parse_number(ENV_SAMPLE_SIZE, &size)?;
        }
        if let Some(size) = lookup(ENV_GROUP_PAGE_SIZE) {
            self.gateway.group_page_size = parse_number(ENV_GROUP_PAGE_SIZE, &size)?;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            self.gateway.timeout_secs = parse_number(ENV_TIMEOUT_SECS, &secs)?;
        }
        self.validate()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.gateway.base_url.trim().is_empty() {
            bail!("gateway.base_url must not be empty");
        }
        if self.gateway.sample_size == 0 {
            bail!("gateway.sample_size must be at least 1");
        }
        if self.gateway.group_page_size == 0 {
            bail!("gateway.group_page_size must be at least 1");
        }
        if self.gateway.timeout_secs == 0 {
            bail!("gateway.timeout_secs must be at least 1");
        }
        if !self.item_link_template.contains("{id}") {
            bail!("item_link_template must contain {{id}}");
        }
        Ok(())
    }

    pub fn http_options(&self) -> HttpGatewayOptions {
        HttpGatewayOptions {
            base_url: self.gateway.base_url.clone(),
            wire_format: self.gateway.wire_format,
            sample_size: self.gateway.sample_size,
            group_page_size: self.gateway.group_page_size,
            timeout: Duration::from_secs(self.gateway.timeout_secs),
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("invalid {key}: {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BrowserConfig::default();
        assert_eq!(config.gateway.base_url, "http://localhost:8000");
        assert_eq!(config.gateway.wire_format, WireFormat::PlainText);
        assert_eq!(config.gateway.sample_size, 25);
        assert_eq!(config.attributes.len(), 7);
        assert_eq!(config.attributes[0], "keyword");
        assert_eq!(config.item_link_template, "/datasets/{id}/");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
gateway:
  base_url: "https://data.example.org"
  wire_format: json
attributes: [type, lab]
"#;
        let config = BrowserConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.gateway.base_url, "https://data.example.org");
        assert_eq!(config.gateway.wire_format, WireFormat::Json);
        assert_eq!(config.gateway.group_page_size, 25);
        assert_eq!(config.attributes, vec!["type", "lab"]);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(BrowserConfig::from_yaml("colour: blue").is_err());
    }

    #[test]
    fn test_zero_sample_size_rejected() {
        let err = BrowserConfig::from_yaml("gateway:\n  sample_size: 0").unwrap_err();
        assert!(err.to_string().contains("gateway.sample_size"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = BrowserConfig::default();
        config
            .apply_overrides(env(&[
                (ENV_BASE_URL, "http://10.0.0.5:9000"),
                (ENV_WIRE_FORMAT, "json"),
                (ENV_SAMPLE_SIZE, "10"),
                (ENV_TIMEOUT_SECS, "5"),
            ]))
            .unwrap();

        let http = config.http_options();
        assert_eq!(http.base_url, "http://10.0.0.5:9000");
        assert_eq!(http.wire_format, WireFormat::Json);
        assert_eq!(http.sample_size, 10);
        assert_eq!(http.group_page_size, 25);
        assert_eq!(http.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_bad_env_value_names_key() {
        let mut config = BrowserConfig::default();
        let err = config
            .apply_overrides(env(&[(ENV_GROUP_PAGE_SIZE, "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_GROUP_PAGE_SIZE));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "item_link_template: \"/items/{{id}}\"").unwrap();
        let config = BrowserConfig::from_file(file.path()).unwrap();
        assert_eq!(config.item_link_template, "/items/{id}");
        assert!(BrowserConfig::from_file("/nonexistent/facet_tree.yaml").is_err());
    }
}
