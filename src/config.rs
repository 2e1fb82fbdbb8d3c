use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_TLV_DEPTH: usize = 32;
pub const DEFAULT_MAX_DER_DEPTH: usize = 32;

/// Limits applied by the TLV and DER decoders.
///
/// Can be stored as JSON:
/// ```
/// # use matcert::config::CodecConfig;
/// let config = CodecConfig::from_json(r#"{"max_tlv_depth": 8}"#).unwrap();
/// assert_eq!(config.max_tlv_depth, 8);
/// assert_eq!(config.max_der_depth, matcert::config::DEFAULT_MAX_DER_DEPTH);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub max_tlv_depth: usize,
    pub max_der_depth: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_tlv_depth: DEFAULT_MAX_TLV_DEPTH,
            max_der_depth: DEFAULT_MAX_DER_DEPTH,
        }
    }
}

impl CodecConfig {
    pub fn from_json(data: &str) -> Result<Self> {
        serde_json::from_str(data).context("parsing codec config")
    }

    pub fn load(path: &str) -> Result<Self> {
        let data =
            std::fs::read_to_string(path).context(format!("reading codec config from {}", path))?;
        Self::from_json(&data)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data).context(format!("writing codec config to {}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_load() -> Result<()> {
        let path = std::env::temp_dir().join(format!("matcert-config-{}.json", std::process::id()));
        let path = path.to_string_lossy().to_string();
        let config = CodecConfig {
            max_tlv_depth: 4,
            max_der_depth: 6,
        };
        config.save(&path)?;
        let loaded = CodecConfig::load(&path)?;
        std::fs::remove_file(&path)?;
        assert_eq!(loaded, config);
        Ok(())
    }

    #[test]
    fn rejects_bad_json() {
        assert!(CodecConfig::from_json("{\"max_tlv_depth\": \"deep\"}").is_err());
        assert_eq!(CodecConfig::from_json("{}").unwrap(), CodecConfig::default());
    }
}
