//! Lexical extractors
//!
//! Independent pattern-based extraction routines over the lowercased prompt.
//! Every extractor is a pure function and every miss degrades to "no match":
//! a malformed number or an unbuildable pattern contributes nothing, so the
//! compiler as a whole never fails.

use regex::Regex;

use crate::workflow::{CompareOp, NotifyChannel, OrderSide};

/// Asset used when nothing in the prompt resolves.
pub const DEFAULT_ASSET: &str = "BTC";

/// Interval applied when the prompt asks to repeat without naming a cadence.
pub const DEFAULT_LOOP_INTERVAL_SECS: u64 = 15;

/// Numbers below this are leverage/amount/interval noise, not price levels.
const MIN_PRICE_THRESHOLD: f64 = 50.0;

/// Ticker/alias dictionary, matched case-insensitively in insertion order.
const ASSET_ALIASES: &[(&str, &str)] = &[
    ("btc", "BTC"),
    ("bitcoin", "BTC"),
    ("eth", "ETH"),
    ("ethereum", "ETH"),
    ("sol", "SOL"),
    ("solana", "SOL"),
    ("ada", "ADA"),
    ("cardano", "ADA"),
    ("xrp", "XRP"),
    ("ripple", "XRP"),
    ("doge", "DOGE"),
    ("dogecoin", "DOGE"),
    ("bnb", "BNB"),
    ("binance", "BNB"),
    ("matic", "MATIC"),
    ("polygon", "MATIC"),
    ("reliance", "RELIANCE"),
    ("nifty", "NIFTY"),
    ("banknifty", "BANKNIFTY"),
    ("sensex", "SENSEX"),
    ("gold", "GOLD"),
    ("silver", "SILVER"),
    ("crude", "CRUDE"),
];

/// Captured tokens that are never asset names.
const ASSET_STOPWORDS: &[&str] = &[
    "the", "it", "this", "dip", "now", "later", "if", "when", "at", "and", "or", "to",
];

/// Clamp a byte window to char boundaries so slicing never panics.
fn window(text: &str, mut start: usize, mut end: usize) -> &str {
    end = end.min(text.len());
    while start > 0 && !text.is_char_boundary(start) {
        start -= 1;
    }
    while end < text.len() && !text.is_char_boundary(end) {
        end += 1;
    }
    &text[start..end]
}

/// Resolve the prompt's asset: dictionary first, dynamic pattern pass second,
/// fixed default last.
pub fn extract_asset(lower: &str) -> String {
    for (alias, ticker) in ASSET_ALIASES {
        if lower.contains(alias) {
            return (*ticker).to_string();
        }
    }

    let dynamic_patterns = [
        r"(?:buy|sell|long|short|accumulate)\s+(?:\d*\.?\d*\s*)?([a-z]{2,10})(?:\s+(?:stock|shares?|coin|token))?",
        r"([a-z]{2,10})\s+(?:stock|shares?|coin|token)",
    ];
    for pattern in dynamic_patterns {
        let Ok(re) = Regex::new(pattern) else { continue };
        if let Some(caps) = re.captures(lower) {
            if let Some(candidate) = caps.get(1).map(|m| m.as_str().trim()) {
                if candidate.len() >= 2 && !ASSET_STOPWORDS.contains(&candidate) {
                    return candidate.to_uppercase();
                }
            }
        }
    }

    DEFAULT_ASSET.to_string()
}

/// Resolve a token captured by the quote-sizing pattern into a ticker.
fn resolve_token(token: &str) -> String {
    for (alias, ticker) in ASSET_ALIASES {
        if token == *alias {
            return (*ticker).to_string();
        }
    }
    token.to_uppercase()
}

/// A trade verb occurrence before graph synthesis.
#[derive(Debug, Clone)]
pub struct RawTradeAction {
    pub side: OrderSide,
    pub amount: f64,
    pub leverage: Option<u32>,
    /// Price from a trailing "at X"; used for trigger-operator inference
    /// only, never stored on the action.
    pub price_hint: Option<f64>,
    /// Byte offset of the match; the output action ordering.
    pub position: usize,
}

/// Scan for `(buy|sell|long|short) [amount] [unit] [at price]` occurrences,
/// dedup by `(side, price hint)` keeping the first, order by position.
pub fn extract_trade_actions(lower: &str) -> Vec<RawTradeAction> {
    let Ok(re) = Regex::new(
        r"\b(buy|sell|long|short)\s+(?:(\d+(?:\.\d+)?)\s*(?:shares?|units?|coins?|tokens?|x)?\s*)?(?:[a-z]+\s+)?(?:at\s+(\d+(?:\.\d+)?))?",
    ) else {
        return Vec::new();
    };
    let lev_re = Regex::new(r"(\d+)x").ok();

    let mut found: Vec<RawTradeAction> = Vec::new();
    for caps in re.captures_iter(lower) {
        let Some(full) = caps.get(0) else { continue };
        let Some(side) = caps.get(1).and_then(|m| OrderSide::from_keyword(m.as_str())) else {
            continue;
        };
        let amount = caps
            .get(2)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(1.0);
        let price_hint = caps.get(3).and_then(|m| m.as_str().parse::<f64>().ok());

        // Leverage lives in a small window around the verb, e.g. "10x".
        let nearby = window(lower, full.start().saturating_sub(10), full.end() + 15);
        let leverage = lev_re
            .as_ref()
            .and_then(|re| re.captures(nearby))
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok());

        found.push(RawTradeAction {
            side,
            amount,
            leverage,
            price_hint,
            position: full.start(),
        });
    }

    let mut seen: Vec<(OrderSide, Option<u64>)> = Vec::new();
    let mut unique: Vec<RawTradeAction> = Vec::new();
    for action in found {
        let key = (action.side, action.price_hint.map(f64::to_bits));
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        unique.push(action);
    }
    unique.sort_by_key(|a| a.position);
    unique
}

/// Quote-denominated sizing, e.g. "5 usdc worth of eth".
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteSizing {
    pub quote_amount: f64,
    pub quote_asset: String,
    pub target_asset: String,
}

pub fn extract_quote_sizing(lower: &str) -> Option<QuoteSizing> {
    let re = Regex::new(r"(\d+(?:\.\d+)?)\s*(usdc|usd)\s+(?:worth\s+of|of)\s+([a-z]{2,10})").ok()?;
    let caps = re.captures(lower)?;
    let quote_amount = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let quote_asset = caps.get(2)?.as_str().to_uppercase();
    let target_asset = resolve_token(caps.get(3)?.as_str());
    Some(QuoteSizing { quote_amount, quote_asset, target_asset })
}

/// A numeric price condition before graph synthesis.
#[derive(Debug, Clone)]
pub struct RawPriceTrigger {
    pub threshold: f64,
    pub operator: CompareOp,
    pub position: usize,
}

/// Apply the ordered condition patterns, dedup by value (first occurrence
/// wins), infer the operator from nearby context, order by position.
pub fn extract_price_triggers(lower: &str) -> Vec<RawPriceTrigger> {
    let patterns = [
        r"(?:price|value|cost)?\s*(?:is|goes|reaches|hits|drops?|falls?|gets?\s*to|exceeds?)?\s*(?:above|below|over|under|>=|<=|>|<)?\s*\$?(\d+(?:\.\d+)?)",
        r"(?:at|@)\s*\$?(\d+(?:\.\d+)?)",
        r"(?:above|below|over|under)\s*\$?(\d+(?:\.\d+)?)",
        r"(?:if|when)\s+.*?\$?(\d+(?:\.\d+)?)",
    ];
    let sell_at = Regex::new(r"sell\s+.*?at").ok();
    let buy_at = Regex::new(r"buy\s+.*?at").ok();

    let mut seen: Vec<u64> = Vec::new();
    let mut triggers: Vec<RawPriceTrigger> = Vec::new();

    for pattern in patterns {
        let Ok(re) = Regex::new(pattern) else { continue };
        for caps in re.captures_iter(lower) {
            let (Some(full), Some(num)) = (caps.get(0), caps.get(1)) else { continue };
            let Some(value) = num.as_str().parse::<f64>().ok() else { continue };

            // "10x" is leverage, not a price level.
            if lower.as_bytes().get(num.end()) == Some(&b'x') {
                continue;
            }
            if value < MIN_PRICE_THRESHOLD {
                continue;
            }
            if seen.contains(&value.to_bits()) {
                continue;
            }
            seen.push(value.to_bits());

            let ctx = window(lower, full.start().saturating_sub(25), full.end() + 10);
            let operator = infer_operator(ctx, sell_at.as_ref(), buy_at.as_ref());

            triggers.push(RawPriceTrigger { threshold: value, operator, position: full.start() });
        }
    }

    triggers.sort_by_key(|t| t.position);
    triggers
}

fn infer_operator(ctx: &str, sell_at: Option<&Regex>, buy_at: Option<&Regex>) -> CompareOp {
    let has = |needle: &str| ctx.contains(needle);
    if has("below") || has("under") || has("drop") || has("fall") || has("<") {
        CompareOp::Lte
    } else if has("above") || has("over") || has("exceed") || has(">") {
        CompareOp::Gte
    } else if sell_at.is_some_and(|re| re.is_match(ctx)) {
        // "sell ... at X" fires once the price reaches X
        CompareOp::Gte
    } else if buy_at.is_some_and(|re| re.is_match(ctx)) {
        // "buy ... at X" fires once the price comes down to X
        CompareOp::Lte
    } else {
        CompareOp::Gte
    }
}

/// Recurring cadence detected in the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recurrence {
    pub interval_secs: u64,
    /// False when synthesized from a repeat keyword rather than "every N ..".
    pub explicit: bool,
}

pub fn extract_recurrence(lower: &str) -> Option<Recurrence> {
    if let Ok(re) = Regex::new(r"(?:every|each)\s+(\d+)\s*(sec(?:ond)?s?|min(?:ute)?s?)") {
        if let Some(caps) = re.captures(lower) {
            let n = caps.get(1).and_then(|m| m.as_str().parse::<u64>().ok());
            let unit = caps.get(2).map(|m| m.as_str()).unwrap_or("sec");
            if let Some(n) = n.filter(|n| *n > 0) {
                let interval_secs = if unit.starts_with("min") { n * 60 } else { n };
                return Some(Recurrence { interval_secs, explicit: true });
            }
        }
    }

    const REPEAT_HINTS: &[&str] = &["again and again", "repeatedly", "repeat", "loop", "continuous"];
    if REPEAT_HINTS.iter().any(|hint| lower.contains(hint)) {
        return Some(Recurrence { interval_secs: DEFAULT_LOOP_INTERVAL_SECS, explicit: false });
    }
    None
}

/// Take-profit / stop-loss levels; percent suffix routes to the percent field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskTargets {
    pub take_profit: Option<f64>,
    pub take_profit_percent: Option<f64>,
    pub stop_loss: Option<f64>,
    pub stop_loss_percent: Option<f64>,
}

pub fn extract_risk_targets(lower: &str) -> RiskTargets {
    let mut targets = RiskTargets::default();

    if let Ok(re) = Regex::new(r"(?:take\s*profit|tp|target)\s*(?:at|@|:)?\s*(\d+(?:\.\d+)?)\s*(%)?") {
        if let Some(caps) = re.captures(lower) {
            if let Some(value) = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) {
                if caps.get(2).is_some() {
                    targets.take_profit_percent = Some(value);
                } else {
                    targets.take_profit = Some(value);
                }
            }
        }
    }

    if let Ok(re) = Regex::new(r"(?:stop\s*loss|sl|stop)\s*(?:at|@|:)?\s*(\d+(?:\.\d+)?)\s*(%)?") {
        if let Some(caps) = re.captures(lower) {
            if let Some(value) = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) {
                if caps.get(2).is_some() {
                    targets.stop_loss_percent = Some(value);
                } else {
                    targets.stop_loss = Some(value);
                }
            }
        }
    }

    targets
}

/// Notification destination found in the prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct NotifyTarget {
    pub channel: NotifyChannel,
    pub to: String,
}

/// Email address, phone-like digits, or the word "discord", in that order.
pub fn extract_notify_target(lower: &str) -> Option<NotifyTarget> {
    if let Ok(re) = Regex::new(r"(?:email|mail).*?([a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,})") {
        if let Some(caps) = re.captures(lower) {
            if let Some(address) = caps.get(1) {
                return Some(NotifyTarget {
                    channel: NotifyChannel::Email,
                    to: address.as_str().to_string(),
                });
            }
        }
    }

    if let Ok(re) = Regex::new(r"(?:sms|text|phone).*?(\+?\d[\d\s-]{8,})") {
        if let Some(caps) = re.captures(lower) {
            if let Some(number) = caps.get(1) {
                return Some(NotifyTarget {
                    channel: NotifyChannel::Sms,
                    to: number.as_str().trim().to_string(),
                });
            }
        }
    }

    if lower.contains("discord") {
        return Some(NotifyTarget { channel: NotifyChannel::Discord, to: "user".to_string() });
    }

    None
}
