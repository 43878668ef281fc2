//! Reduced-list helpers.
//!
//! The classification of stablecoins and liquid-staking tokens happens
//! outside the engine; these functions turn its output into a plain
//! symbol list and apply the cheap deterministic filters around it.

use std::collections::{HashMap, HashSet};

use tracing::debug;

/// Tickers that are always treated as stablecoins.
pub const KNOWN_STABLECOINS: &[&str] = &[
    "USDT", "USDC", "DAI", "BUSD", "TUSD", "UST", "FRAX", "GUSD", "PAX", "HUSD",
];

/// Length of the symbol windows compared by [`reduce_token_list`].
const VARIANT_WINDOW: usize = 3;

/// Strip control characters and surrounding whitespace from a snapshot
/// symbol (`"\u{8}8"` → `"8"`, `"SCHIZODIO "` → `"SCHIZODIO"`).
pub fn sanitize_symbol(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Keep the universe symbols the classifier quoted (`'SYM'`) in its
/// free-text answer, in universe order.
pub fn parse_classifier_answer(symbols: &[String], answer: &str) -> Vec<String> {
    let kept: Vec<String> = symbols
        .iter()
        .filter(|s| answer.contains(&format!("'{s}'")))
        .cloned()
        .collect();
    debug!(universe = symbols.len(), kept = kept.len(), "Classifier answer parsed");
    kept
}

/// Drop symbols ending with `suffix`, except the symbol equal to it.
pub fn remove_suffixed(symbols: &[String], suffix: &str) -> Vec<String> {
    symbols
        .iter()
        .filter(|s| !s.ends_with(suffix) || s.as_str() == suffix)
        .cloned()
        .collect()
}

/// Drop the tickers in [`KNOWN_STABLECOINS`].
pub fn drop_known_stablecoins(symbols: &[String]) -> Vec<String> {
    symbols
        .iter()
        .filter(|s| !KNOWN_STABLECOINS.contains(&s.as_str()))
        .cloned()
        .collect()
}

/// Collapse correlated variants sharing a 3-character window onto the
/// shortest symbol carrying that window.
///
/// Returns the distinct survivors in first-seen order. Symbols shorter
/// than the window have nothing to compare and pass through.
pub fn reduce_token_list(symbols: &[String]) -> Vec<String> {
    // window -> index into `symbols` of the current shortest holder
    let mut holders: HashMap<&str, usize> = HashMap::new();
    let mut windows: Vec<&str> = Vec::new();
    let mut short: Vec<usize> = Vec::new();

    for (idx, symbol) in symbols.iter().enumerate() {
        if symbol.len() < VARIANT_WINDOW || !symbol.is_ascii() {
            short.push(idx);
            continue;
        }
        for start in 0..=symbol.len() - VARIANT_WINDOW {
            let window = &symbol[start..start + VARIANT_WINDOW];
            match holders.get(window) {
                Some(&held) if symbols[held].len() <= symbol.len() => {}
                Some(_) => {
                    holders.insert(window, idx);
                }
                None => {
                    holders.insert(window, idx);
                    windows.push(window);
                }
            }
        }
    }

    let mut survivors: Vec<usize> = windows.iter().map(|w| holders[w]).collect();
    survivors.extend(short);

    let mut seen = HashSet::new();
    survivors
        .into_iter()
        .filter(|idx| seen.insert(symbols[*idx].as_str()))
        .map(|idx| symbols[idx].clone())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sanitize_symbol() {
        assert_eq!(sanitize_symbol("\u{8}8"), "8");
        assert_eq!(sanitize_symbol("SCHIZODIO "), "SCHIZODIO");
        assert_eq!(sanitize_symbol("ETH"), "ETH");
    }

    #[test]
    fn test_parse_classifier_answer() {
        let universe = list(&["ETH", "USDC", "STRK", "LORDS"]);
        let answer = "'ETH', 'STRK', 'LORDS'";
        assert_eq!(
            parse_classifier_answer(&universe, answer),
            list(&["ETH", "STRK", "LORDS"])
        );
    }

    #[test]
    fn test_parse_classifier_answer_requires_quotes() {
        let universe = list(&["ETH", "WETH"]);
        // Bare mention without quotes does not count.
        assert_eq!(parse_classifier_answer(&universe, "ETH, 'WETH'"), list(&["WETH"]));
    }

    #[test]
    fn test_remove_suffixed() {
        let symbols = list(&["STRK", "xSTRK", "nstSTRK", "ETH"]);
        assert_eq!(remove_suffixed(&symbols, "STRK"), list(&["STRK", "ETH"]));
    }

    #[test]
    fn test_drop_known_stablecoins() {
        let symbols = list(&["USDC", "ETH", "DAI", "BTC"]);
        assert_eq!(drop_known_stablecoins(&symbols), list(&["ETH", "BTC"]));
    }

    #[test]
    fn test_reduce_token_list_collapses_variants() {
        // Every window of WBTC is held by a shorter symbol.
        let symbols = list(&["WBTC", "BTC", "WBT"]);
        assert_eq!(reduce_token_list(&symbols), list(&["WBT", "BTC"]));
    }

    #[test]
    fn test_reduce_token_list_keeps_variant_with_own_window() {
        // "WST" belongs to WSTETH alone, so it survives next to ETH.
        let symbols = list(&["WSTETH", "ETH"]);
        assert_eq!(reduce_token_list(&symbols), list(&["WSTETH", "ETH"]));
    }

    #[test]
    fn test_reduce_token_list_keeps_short_symbols() {
        let symbols = list(&["OP", "ETH"]);
        let reduced = reduce_token_list(&symbols);
        assert_eq!(reduced, list(&["ETH", "OP"]));
    }

    #[test]
    fn test_reduce_token_list_no_duplicates() {
        let symbols = list(&["LORDS", "EKUBO"]);
        let reduced = reduce_token_list(&symbols);
        assert_eq!(reduced, list(&["LORDS", "EKUBO"]));
    }
}
