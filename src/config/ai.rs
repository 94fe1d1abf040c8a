// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_call_limit() -> u32 {
    20
}

/// Annotator settings read from `config/ai.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub enabled: bool,
    /// "openai" (case-insensitive). Anything else disables the remote annotator.
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from OPENAI_API_KEY.
    #[serde(default)]
    pub api_key: String,
    /// Remote calls allowed per run; later items go to the keyword fallback.
    #[serde(default = "default_call_limit")]
    pub call_limit: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "openai".to_string(),
            model: default_model(),
            api_key: String::new(),
            call_limit: default_call_limit(),
        }
    }
}

impl AiConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let mut cfg: AiConfig = serde_json::from_str(&data)?;

        cfg.provider = cfg.provider.trim().to_lowercase();
        if cfg.model.trim().is_empty() {
            cfg.model = default_model();
        }

        // Only an enabled annotator needs its key.
        if cfg.enabled && cfg.api_key.trim().eq_ignore_ascii_case("env") {
            cfg.api_key = match cfg.provider.as_str() {
                "openai" => env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow::anyhow!("Missing OPENAI_API_KEY env var"))?,
                other => anyhow::bail!("Unsupported provider in config: {other}"),
            };
        }

        Ok(cfg)
    }

    /// `load_from_file`, or the disabled default when the file is absent or unusable.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load_from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "ai config not loaded, annotator disabled");
                Self::default()
            }
        }
    }
}
