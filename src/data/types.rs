use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a forecast came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    Polymarket,
    Kalshi,
    Deterministic,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Polymarket => "Polymarket",
            Source::Kalshi => "Kalshi",
            Source::Deterministic => "Deterministic",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastItem {
    pub source: Source,
    pub title: String,
    pub probability: u8,
}

impl ForecastItem {
    /// Build an item, clamping the probability into 0..=100.
    pub fn new(source: Source, title: impl Into<String>, probability: i64) -> Self {
        Self {
            source,
            title: title.into(),
            probability: probability.clamp(0, 100) as u8,
        }
    }

    /// Lowercased `source:title`, used to spot duplicates.
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.source, self.title).to_lowercase()
    }
}

/// What the serving interface hands back for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub date: String,
    pub items: Vec<ForecastItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probability_is_clamped() {
        assert_eq!(ForecastItem::new(Source::Kalshi, "x", 140).probability, 100);
        assert_eq!(ForecastItem::new(Source::Kalshi, "x", -3).probability, 0);
        assert_eq!(ForecastItem::new(Source::Kalshi, "x", 42).probability, 42);
    }

    #[test]
    fn test_wire_shape() {
        let snapshot = Snapshot {
            date: "2024-03-01".to_string(),
            items: vec![ForecastItem::new(Source::Polymarket, "Fed cuts rates", 42)],
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(
            json,
            r#"{"date":"2024-03-01","items":[{"source":"Polymarket","title":"Fed cuts rates","probability":42}]}"#
        );
    }

    #[test]
    fn test_dedup_key_ignores_case() {
        let a = ForecastItem::new(Source::Polymarket, "Fed Cuts Rates", 40);
        let b = ForecastItem::new(Source::Polymarket, "fed cuts rates", 55);
        assert_eq!(a.dedup_key(), b.dedup_key());
    }
}
