use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use regex::Regex;
use serde_json::Value;

use crate::model::{CanonicalRecord, RawItem};

/// Token the source uses for "this product is on special offer".
pub const SPECIAL_OFFER_YES: &str = "Y";
pub const MAX_RATING: f64 = 5.0;

/// Currency marks, thousands separators and whitespace. Whatever is left after
/// removing these must parse as a plain number.
static DISPLAY_NOISE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[₩$,\s]|원$").unwrap());

/// Normalize one raw item, stamping it with the current time.
pub fn normalize(item: &RawItem) -> CanonicalRecord {
    normalize_at(item, Utc::now())
}

/// Normalize a whole batch with one shared collection timestamp. Output order
/// matches input order.
pub fn normalize_batch(items: &[RawItem]) -> Vec<CanonicalRecord> {
    let now = Utc::now();
    items.par_iter().map(|item| normalize_at(item, now)).collect()
}

/// Never fails: anything missing or unreadable falls back to its sentinel
/// (empty string, zero, false, None).
pub fn normalize_at(item: &RawItem, collected_at: DateTime<Utc>) -> CanonicalRecord {
    CanonicalRecord {
        id: item.id.as_ref().and_then(as_text).unwrap_or_default(),
        name: item
            .name
            .as_ref()
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_default(),
        price: item
            .price
            .as_ref()
            .and_then(as_number)
            .map(|p| p.max(0.0))
            .unwrap_or(0.0),
        rating: item
            .rating
            .as_ref()
            .and_then(as_number)
            .map(|r| r.clamp(0.0, MAX_RATING))
            .unwrap_or(0.0),
        review_count: item.review_count.as_ref().and_then(as_count).unwrap_or(0),
        special_offer: item.special_offer.as_ref().is_some_and(is_special_offer),
        image: item
            .image
            .as_ref()
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        collected_at,
    }
}

/// Exact "Y" only. A bare `true` is what a canonical record serializes to,
/// so it has to survive a second pass.
fn is_special_offer(value: &Value) -> bool {
    match value {
        Value::String(s) => s == SPECIAL_OFFER_YES,
        Value::Bool(b) => *b,
        _ => false,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numbers pass through. Strings like "₩129,000", "12,900원" or "4.5" lose
/// their display noise and must then parse whole; "4/5" or a price range is
/// not a number.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_display_number(s),
        _ => None,
    }
}

fn parse_display_number(s: &str) -> Option<f64> {
    let cleaned = DISPLAY_NOISE_RE.replace_all(s.trim(), "");
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-') {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn as_count(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    as_number(value).map(|n| if n > 0.0 { n.trunc() as u64 } else { 0 })
}
