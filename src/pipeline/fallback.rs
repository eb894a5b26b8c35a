use crate::data::types::{ForecastItem, Source};

const TEMPLATES: &[&str] = &[
    "US CPI YoY ≥ 3.5% on next print",
    "Fed changes rates at next meeting",
    "WTI crude settles above $90 this month",
    "S&P 500 drawdown > 3% this week",
    "EURUSD ends month > 1.11",
    "BTC closes week above prior high",
    "10Y UST yield > 5% this quarter",
    "Core PCE YoY ≥ 3.0% on next print",
];

pub const DEFAULT_FALLBACK_ITEMS: usize = 6;

/// 32-bit linear congruential generator (Numerical Recipes constants).
#[derive(Debug, Clone)]
struct Lcg {
    state: u32,
}

impl Lcg {
    fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Advance once and return a value in [0, 1).
    fn next_unit(&mut self) -> f64 {
        self.state = self.state.wrapping_mul(1664525).wrapping_add(1013904223);
        self.state as f64 / 4_294_967_296.0
    }
}

/// Sum of the UTF-16 code units of the date string, wrapped to u32.
fn date_seed(date: &str) -> u32 {
    date.encode_utf16().fold(0u32, |acc, c| acc.wrapping_add(c as u32))
}

/// Synthetic finance snapshot for `date`. Same date, same output.
pub fn fallback_financial(date: &str, count: usize) -> Vec<ForecastItem> {
    let mut rng = Lcg::new(date_seed(date));

    (0..count)
        .map(|i| {
            let title = TEMPLATES[i % TEMPLATES.len()];
            let probability = (30.0 + rng.next_unit() * 50.0).round() as i64;
            ForecastItem::new(Source::Deterministic, title, probability)
        })
        .collect()
}
