use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::model::CanonicalRecord;

/// Lowest mid-range price (inclusive).
pub const MID_RANGE_FLOOR: f64 = 50_000.0;
/// Highest mid-range price (inclusive).
pub const MID_RANGE_CEILING: f64 = 200_000.0;
pub const TOP_RATED_MIN: f64 = 4.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceTier {
    Budget,
    MidRange,
    Premium,
}

impl PriceTier {
    pub fn of(price: f64) -> Self {
        if price < MID_RANGE_FLOOR {
            PriceTier::Budget
        } else if price <= MID_RANGE_CEILING {
            PriceTier::MidRange
        } else {
            PriceTier::Premium
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceCategories {
    pub budget: Vec<CanonicalRecord>,
    pub mid_range: Vec<CanonicalRecord>,
    pub premium: Vec<CanonicalRecord>,
}

/// Price tiers partition the input; the offer and rating sets overlap freely.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedReport {
    pub generated_at: DateTime<Utc>,
    pub category: String,
    pub total_products: usize,
    pub price_categories: PriceCategories,
    pub special_offers: Vec<CanonicalRecord>,
    pub top_rated: Vec<CanonicalRecord>,
}

pub fn categorize(records: &[CanonicalRecord], category: &str) -> CategorizedReport {
    let mut tiers = PriceCategories::default();
    let mut special_offers = Vec::new();
    let mut top_rated = Vec::new();

    for record in records {
        let tier = PriceTier::of(record.price);
        debug!(name = %record.name, price = record.price, ?tier, "price tier");
        match tier {
            PriceTier::Budget => tiers.budget.push(record.clone()),
            PriceTier::MidRange => tiers.mid_range.push(record.clone()),
            PriceTier::Premium => tiers.premium.push(record.clone()),
        }

        if record.special_offer {
            debug!(name = %record.name, "special offer");
            special_offers.push(record.clone());
        }

        if record.rating >= TOP_RATED_MIN {
            debug!(name = %record.name, rating = record.rating, "top rated");
            top_rated.push(record.clone());
        }
    }

    CategorizedReport {
        generated_at: Utc::now(),
        category: category.to_string(),
        total_products: records.len(),
        price_categories: tiers,
        special_offers,
        top_rated,
    }
}
