//! # Source Authority
//!
//! Maps news outlets (e.g. "CoinDesk", "The Block") to trust weights used to scale
//! each article's evidence in the signal engine.
//!
//! - Loads from JSON config (weights + aliases), or uses the built-in seed.
//! - Case-insensitive lookup with normalization of punctuation, dashes, etc.
//! - Aliases map alternative spellings/domains to canonical names.
//! - Lookup order: alias → exact match → default. No fuzzy matching: an outlet that
//!   is not listed gets the default weight.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path};

pub const DEFAULT_AUTHORITY: f64 = 0.70;

/// Immutable authority table handed to the engine at construction.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceAuthority {
    /// Weight for any outlet not listed.
    #[serde(default = "default_default_weight")]
    pub default_weight: f64,
    /// Explicit weights for canonical outlet names.
    #[serde(default)]
    pub weights: HashMap<String, f64>,
    /// Aliases mapping non-canonical names → canonical names.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

fn default_default_weight() -> f64 {
    DEFAULT_AUTHORITY
}

impl Default for SourceAuthority {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl SourceAuthority {
    /// Load configuration from a JSON file. Keys are normalized on load.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)
            .with_context(|| format!("reading authority table {}", path.display()))?;
        let raw: Self = serde_json::from_str(&s).context("parsing authority json")?;
        Ok(raw.normalized())
    }

    /// `load_from_file` or the built-in seed when the file is missing or invalid.
    pub fn load_or_seed<P: AsRef<Path>>(path: P) -> Self {
        match Self::load_from_file(path) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(error = ?e, "authority table not loaded, using seed");
                Self::default_seed()
            }
        }
    }

    /// Build from explicit pairs (tests, embedding).
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>, default_weight: f64) -> Self {
        Self {
            default_weight,
            weights: pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            aliases: HashMap::new(),
        }
        .normalized()
    }

    fn normalized(self) -> Self {
        Self {
            default_weight: clamp01(self.default_weight),
            weights: self
                .weights
                .into_iter()
                .map(|(k, v)| (normalize(&k), v))
                .collect(),
            aliases: self
                .aliases
                .into_iter()
                .map(|(k, v)| (normalize(&k), normalize(&v)))
                .collect(),
        }
    }

    /// Weight for an outlet name, clamped to `[0, 1]`.
    ///
    /// Matching is case- and punctuation-insensitive: names go through the same
    /// normalization as the table keys, so `"COINDESK"` and `" CoinDesk. "` both get
    /// CoinDesk's weight. Whole names only; no substring matching.
    pub fn weight_for(&self, source: &str) -> f64 {
        let s = normalize(source);

        if let Some(canon) = self.aliases.get(&s) {
            if let Some(&w) = self.weights.get(canon) {
                return clamp01(w);
            }
        }

        if let Some(&w) = self.weights.get(&s) {
            return clamp01(w);
        }

        clamp01(self.default_weight)
    }

    /// Built-in seed with the major crypto outlets.
    pub fn default_seed() -> Self {
        let mut weights = HashMap::new();
        let mut aliases = HashMap::new();

        for (k, v) in [
            ("coindesk", 1.0),
            ("cointelegraph", 0.9),
            ("bitcoin magazine", 0.85),
            ("decrypt", 0.85),
            ("the block", 0.9),
        ] {
            weights.insert(k.to_string(), v);
        }

        for (a, c) in [
            ("coindesk com", "coindesk"),
            ("cointelegraph com", "cointelegraph"),
            ("bitcoinmagazine com", "bitcoin magazine"),
            ("bitcoin mag", "bitcoin magazine"),
            ("decrypt co", "decrypt"),
            ("theblock", "the block"),
            ("theblock co", "the block"),
        ] {
            aliases.insert(a.to_string(), c.to_string());
        }

        Self {
            default_weight: DEFAULT_AUTHORITY,
            weights,
            aliases,
        }
    }
}

/// Normalize input string: lowercase, replace punctuation/dashes with spaces,
/// collapse multiple spaces into one.
fn normalize(s: &str) -> String {
    let mut out = s.trim().to_ascii_lowercase();

    for ch in ['—', '–', '-', '_', '/', '\\'] {
        out = out.replace(ch, " ");
    }

    out = out.replace(['\n', '\r', '\t', '.', ',', '’', '\''], " ");

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}
