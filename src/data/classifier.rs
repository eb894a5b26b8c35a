/// Keywords that mark a title as financial/economic.
pub const FINANCE_INCLUDE: &[&str] = &[
    // macro & econ
    "cpi", "inflation", "pce", "gdp", "unemployment", "payrolls", "nfp", "pmi", "ism",
    "retail sales", "core", "yoy", "mom",
    // rates / fixed income
    "fed", "fomc", "rate", "rates", "hike", "cut", "treasury", "bond", "yield", "bill", "note",
    "curve", "term premium",
    // equities
    "s&p", "spx", "nasdaq", "dow", "equity", "equities", "stocks", "earnings", "recession",
    // credit / banks / housing
    "credit", "cre", "commercial real estate", "bank", "lending", "mortgage", "housing", "builder",
    // commodities
    "oil", "wti", "brent", "gasoline", "gold", "silver", "copper",
    // fx / crypto
    "fx", "eurusd", "usdjpy", "gbpusd", "dxy", "bitcoin", "btc", "ethereum", "eth", "crypto",
    // volatility
    "vix", "volatility",
];

/// Keywords that disqualify a title no matter what else it mentions.
pub const FINANCE_EXCLUDE: &[&str] = &[
    // politics & elections
    "election", "president", "primary", "congress", "senate", "house", "governor", "parliament",
    "minister", "debate",
    // sports & entertainment
    "nfl", "nba", "mlb", "nhl", "soccer", "fifa", "olympic", "oscar", "grammy", "emmy",
    // weather & misc
    "weather", "hurricane", "storm", "earthquake", "lottery",
];

/// True when the title is about financial markets: no excluded keyword and
/// at least one included keyword (case-insensitive substring match).
pub fn is_financial_title(title: &str) -> bool {
    let lower = title.to_lowercase();

    if FINANCE_EXCLUDE.iter().any(|bad| lower.contains(bad)) {
        return false;
    }

    FINANCE_INCLUDE.iter().any(|good| lower.contains(good))
}
