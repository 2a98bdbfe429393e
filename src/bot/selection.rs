//! Picks which rate candidate to present when the upstream returns several.

use crate::fxrates::{ExchangeRate, RATE_TYPE_MID, SOURCE_BCV};

/// Government-issued currencies that get the BCV/MID tie-break. Crypto bases
/// (USDT) are not in the set. Updated manually in lockstep with the
/// currencies the upstream adds.
const FIAT_BASES: [&str; 5] = ["USD", "EUR", "RUB", "TRY", "CNY"];

/// Selects the preferred rate from the candidates for one base currency.
///
/// Fiat bases prefer the BCV MID rate, then any MID rate. Everything else
/// falls back to the first candidate in upstream order, which is never
/// re-sorted.
pub fn select_preferred_rate(rates: &[ExchangeRate]) -> Option<&ExchangeRate> {
    if rates.len() == 1 {
        return rates.first();
    }

    let base = rates.first()?.base.as_str();

    if FIAT_BASES.contains(&base) {
        if let Some(rate) = rates
            .iter()
            .find(|r| r.source == SOURCE_BCV && r.rate_type == RATE_TYPE_MID)
        {
            return Some(rate);
        }

        if let Some(rate) = rates.iter().find(|r| r.rate_type == RATE_TYPE_MID) {
            return Some(rate);
        }
    }

    rates.first()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candidate(base: &str, rate: f64, rate_type: &str, source: &str) -> ExchangeRate {
        let now = Utc::now();

        ExchangeRate {
            base: base.to_string(),
            target: "VES".to_string(),
            rate,
            rate_type: rate_type.to_string(),
            source: source.to_string(),
            as_of: now,
            fetched_at: now,
        }
    }

    #[test]
    fn test_empty_input_selects_nothing() {
        assert!(select_preferred_rate(&[]).is_none());
    }

    #[test]
    fn test_singleton_is_returned_unconditionally() {
        let rates = vec![candidate("USDT", 44.1, "P2P", "BINANCE")];

        let selected = select_preferred_rate(&rates).unwrap();

        assert_eq!(selected, &rates[0]);
    }

    #[test]
    fn test_fiat_base_prefers_bcv_mid() {
        let rates = vec![
            candidate("USD", 44.5, "P2P", "BINANCE"),
            candidate("USD", 43.9, "MID", "ECB"),
            candidate("USD", 42.0, "MID", "BCV"),
        ];

        let selected = select_preferred_rate(&rates).unwrap();

        assert_eq!(selected.source, "BCV");
        assert_eq!(selected.rate_type, "MID");
        assert_eq!(selected.rate, 42.0);
    }

    #[test]
    fn test_fiat_base_without_bcv_takes_any_mid() {
        let rates = vec![
            candidate("EUR", 48.0, "BUY", "BCV"),
            candidate("EUR", 47.5, "MID", "ECB"),
            candidate("EUR", 47.6, "MID", "XE"),
        ];

        let selected = select_preferred_rate(&rates).unwrap();

        assert_eq!(selected.rate_type, "MID");
        assert_eq!(selected.source, "ECB");
    }

    #[test]
    fn test_fiat_base_without_mid_falls_back_to_first() {
        let rates = vec![
            candidate("TRY", 1.2, "BUY", "BCV"),
            candidate("TRY", 1.3, "SELL", "BCV"),
        ];

        let selected = select_preferred_rate(&rates).unwrap();

        assert_eq!(selected, &rates[0]);
    }

    #[test]
    fn test_non_fiat_base_keeps_upstream_order() {
        let rates = vec![
            candidate("USDT", 44.8, "P2P", "BINANCE"),
            candidate("USDT", 44.2, "MID", "BCV"),
        ];

        let selected = select_preferred_rate(&rates).unwrap();

        assert_eq!(selected, &rates[0]);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let rates = vec![
            candidate("USD", 44.5, "P2P", "BINANCE"),
            candidate("USD", 42.0, "MID", "BCV"),
            candidate("USD", 43.9, "MID", "ECB"),
        ];

        let first = select_preferred_rate(&rates).unwrap().clone();
        let second = select_preferred_rate(&rates).unwrap().clone();

        assert_eq!(first, second);
    }
}
