// src/analyze/assets.rs
//! Known-asset catalog used to tag articles with tickers.
//!
//! Matching is whole-token and case-insensitive, so "SOL" does not fire on
//! "solution" and "$BTC" still counts. Full names map to tickers via aliases.

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct AssetCatalog {
    /// Tickers in reporting order.
    pub symbols: Vec<String>,
    /// Upper-case name → ticker ("BITCOIN" → "BTC").
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

impl Default for AssetCatalog {
    fn default() -> Self {
        let symbols = [
            "BTC", "ETH", "SOL", "XRP", "ADA", "DOGE", "DOT", "MATIC", "LINK", "AVAX", "UNI",
            "ATOM", "LTC", "BCH", "ETC", "ALGO", "VET", "FIL", "XLM", "HBAR", "NEAR", "APE",
            "SAND", "MANA", "AXS", "GALA",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let aliases = [
            ("BITCOIN", "BTC"),
            ("ETHEREUM", "ETH"),
            ("ETHER", "ETH"),
            ("SOLANA", "SOL"),
            ("RIPPLE", "XRP"),
            ("CARDANO", "ADA"),
            ("DOGECOIN", "DOGE"),
            ("POLKADOT", "DOT"),
            ("CHAINLINK", "LINK"),
            ("AVALANCHE", "AVAX"),
            ("LITECOIN", "LTC"),
        ]
        .iter()
        .map(|(a, t)| (a.to_string(), t.to_string()))
        .collect();

        Self { symbols, aliases }
    }
}

impl AssetCatalog {
    /// Tickers mentioned in `text`, deduplicated, in catalog order.
    pub fn extract(&self, text: &str) -> Vec<String> {
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_ascii_uppercase())
            .collect();

        let mentioned = |sym: &str| {
            tokens.iter().any(|t| {
                t == sym
                    || self
                        .aliases
                        .get(t)
                        .is_some_and(|target| target.eq_ignore_ascii_case(sym))
            })
        };

        self.symbols
            .iter()
            .filter(|s| mentioned(s.as_str()))
            .cloned()
            .collect()
    }
}
