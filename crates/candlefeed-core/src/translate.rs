//! Per-provider symbol translation.
//!
//! Translation is total: every canonical symbol maps to *some* provider
//! identifier. Unknown symbols fall back to a deterministic per-provider
//! default instead of failing, so a bad ticker surfaces as an empty series
//! downstream, not as an error here.

use crate::Symbol;

/// Quote-currency suffixes recognized on incoming canonical symbols.
const QUOTE_SUFFIXES: [&str; 3] = ["USDT", "-USD", "USD"];

/// Strategy a provider facade uses to derive its upstream identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolTranslation {
    /// Strip any recognized quote suffix from the canonical symbol, then
    /// append the provider's own quote convention. Used by providers that
    /// accept near-arbitrary tickers (`BTC` -> `BTCUSDT`, `BTC` -> `BTC-USD`).
    SuffixRewrite { append: &'static str },
    /// Finite instrument table keyed by base asset, with a deterministic
    /// fallback identifier for anything unrecognized.
    TableLookup {
        table: &'static [(&'static str, &'static str)],
        fallback: &'static str,
    },
}

impl SymbolTranslation {
    /// Derive the provider identifier. Never fails.
    pub fn translate(&self, symbol: &Symbol) -> String {
        let base = base_asset(symbol);
        match self {
            Self::SuffixRewrite { append } => format!("{base}{append}"),
            Self::TableLookup { table, fallback } => table
                .iter()
                .find(|(ticker, _)| *ticker == base)
                .map(|(_, id)| (*id).to_owned())
                .unwrap_or_else(|| (*fallback).to_owned()),
        }
    }
}

/// Extract the base asset from a canonical symbol by stripping a recognized
/// quote suffix (`BTCUSDT`, `BTC-USD`, `BTCUSD` all yield `BTC`). A symbol
/// that is nothing but a suffix is left intact.
pub fn base_asset(symbol: &Symbol) -> String {
    let raw = symbol.as_str();
    for suffix in QUOTE_SUFFIXES {
        if let Some(stripped) = raw.strip_suffix(suffix) {
            if !stripped.is_empty() {
                return stripped.to_owned();
            }
        }
    }
    raw.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDS: &[(&str, &str)] = &[("BTC", "bitcoin"), ("ETH", "ethereum")];

    fn symbol(raw: &str) -> Symbol {
        Symbol::parse(raw).expect("valid symbol")
    }

    #[test]
    fn strips_each_quote_suffix_convention() {
        assert_eq!(base_asset(&symbol("BTCUSDT")), "BTC");
        assert_eq!(base_asset(&symbol("BTC-USD")), "BTC");
        assert_eq!(base_asset(&symbol("BTCUSD")), "BTC");
        assert_eq!(base_asset(&symbol("BTC")), "BTC");
    }

    #[test]
    fn bare_suffix_symbol_is_left_intact() {
        assert_eq!(base_asset(&symbol("USDT")), "USDT");
    }

    #[test]
    fn suffix_rewrite_appends_provider_convention() {
        let pair = SymbolTranslation::SuffixRewrite { append: "USDT" };
        assert_eq!(pair.translate(&symbol("BTC-USD")), "BTCUSDT");

        let dashed = SymbolTranslation::SuffixRewrite { append: "-USD" };
        assert_eq!(dashed.translate(&symbol("ETHUSDT")), "ETH-USD");
    }

    #[test]
    fn table_lookup_resolves_known_assets() {
        let lookup = SymbolTranslation::TableLookup {
            table: IDS,
            fallback: "bitcoin",
        };
        assert_eq!(lookup.translate(&symbol("ETHUSDT")), "ethereum");
    }

    #[test]
    fn table_lookup_falls_back_deterministically() {
        let lookup = SymbolTranslation::TableLookup {
            table: IDS,
            fallback: "bitcoin",
        };
        assert_eq!(lookup.translate(&symbol("NOSUCH")), "bitcoin");
        assert_eq!(lookup.translate(&symbol("NOSUCH")), "bitcoin");
    }
}
