use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;
use crate::data::classifier::is_financial_title;
use crate::data::types::{ForecastItem, Source};

/// Tunables for the line-based scrapers.
#[derive(Debug, Clone, Copy)]
pub struct ParseRules {
    /// A title must be strictly longer than this (in chars).
    pub min_title_len: usize,
    /// Titles are cut to this many chars before emission.
    pub max_title_len: usize,
    /// Stop scanning once a source has produced this many items.
    pub max_candidates: usize,
}

impl Default for ParseRules {
    fn default() -> Self {
        Self {
            min_title_len: 12,
            max_title_len: 160,
            max_candidates: 64,
        }
    }
}

// ASCII digits only: `\d` would also match fullwidth and other Unicode digits.
fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([0-9]{1,3})\s?%").expect("valid percent regex"))
}

// $0.00 - $9.99, clamped to 0.99 afterwards
fn dollar_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$([0-1]?[0-9]?\.[0-9]{2})").expect("valid dollar regex"))
}

fn bare_percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]+%$").expect("valid bare percent regex"))
}

fn bare_amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\$?[0-9]+(\.[0-9]+)?$").expect("valid bare amount regex"))
}

/// Non-empty, trimmed lines of the scraped page.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}

pub fn looks_like_title(line: &str, rules: &ParseRules) -> bool {
    line.chars().count() > rules.min_title_len
        && !bare_percent_re().is_match(line)
        && !bare_amount_re().is_match(line)
}

/// First `NN%` on the line, clamped to 0..=100.
pub fn grab_percent(line: &str) -> Option<u8> {
    let cap = percent_re().captures(line)?;
    let pct = cap[1].parse::<i64>().ok()?;
    Some(pct.clamp(0, 100) as u8)
}

/// First `$0.NN` style price on the line, as a whole percentage.
pub fn grab_dollar(line: &str) -> Option<u8> {
    let cap = dollar_re().captures(line)?;
    let price = cap[1].parse::<f64>().ok()?.clamp(0.0, 0.99);
    Some(((price * 100.0).round() as i64).clamp(0, 100) as u8)
}

fn truncate_title(title: &str, max_len: usize) -> String {
    title.chars().take(max_len).collect()
}

/// Try to read a forecast out of the line at `idx`, peeking one line ahead
/// for the probability when the title line itself has none.
fn match_at<F>(
    lines: &[&str],
    idx: usize,
    source: Source,
    rules: &ParseRules,
    extract: F,
) -> Option<ForecastItem>
where
    F: Fn(&str) -> Option<u8>,
{
    let line = lines[idx];
    if !looks_like_title(line, rules) || !is_financial_title(line) {
        return None;
    }

    let next = lines.get(idx + 1).copied().unwrap_or("");
    let probability = extract(line).or_else(|| extract(next));

    if probability.is_none() {
        debug!("{}: no probability near {:?}", source, line);
    }

    probability.map(|p| ForecastItem::new(source, truncate_title(line, rules.max_title_len), p as i64))
}

fn parse_lines<F>(text: &str, source: Source, rules: &ParseRules, extract: F) -> Vec<ForecastItem>
where
    F: Fn(&str) -> Option<u8> + Copy,
{
    let lines = split_lines(text);
    let mut out = Vec::new();

    for idx in 0..lines.len() {
        if out.len() >= rules.max_candidates {
            break;
        }
        if let Some(item) = match_at(&lines, idx, source, rules, extract) {
            out.push(item);
        }
    }

    out
}

/// Polymarket listings quote chances as percentages.
pub fn parse_polymarket(text: &str, rules: &ParseRules) -> Vec<ForecastItem> {
    parse_lines(text, Source::Polymarket, rules, grab_percent)
}

/// Kalshi listings quote YES contract prices in dollars.
pub fn parse_kalshi(text: &str, rules: &ParseRules) -> Vec<ForecastItem> {
    parse_lines(text, Source::Kalshi, rules, grab_dollar)
}
