use chrono::{DateTime, Datelike, Utc};

use crate::model::{Amount, DateRange, Item, ItemCondition, Ms};

/// Pricing knobs. The seasonal table is keyed by calendar month of the rental
/// start, index 0 = January.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingConfig {
    pub seasonal: [f64; 12],
    pub bundle_discount: f64,
    /// Bill weekend days at half rate when the rental crosses the work-week
    /// boundary or spans more than five work days.
    pub half_day_weekends: bool,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            seasonal: [0.0, 0.0, 0.0, 0.0, 0.05, 0.10, 0.15, 0.15, 0.05, 0.0, 0.0, 0.05],
            bundle_discount: 0.10,
            half_day_weekends: false,
        }
    }
}

/// Discount for the wear already on an item. Out-of-service items keep their
/// full base price; availability filters them out before pricing.
fn condition_discount(condition: ItemCondition) -> f64 {
    match condition {
        ItemCondition::Perfect => 0.0,
        ItemCondition::Good => 0.05,
        ItemCondition::Suitable => 0.10,
        ItemCondition::Broken | ItemCondition::NotAvailable => 0.0,
    }
}

fn month0(at: Ms) -> usize {
    DateTime::<Utc>::from_timestamp_millis(at)
        .map(|d| d.month0() as usize)
        .unwrap_or(0)
}

/// Per-day price of one item for a rental starting at `start`:
/// base × (1 − conditionDiscount) × (1 + seasonalSurcharge[month]).
pub fn unit_price(item: &Item, start: Ms, config: &PricingConfig) -> f64 {
    let base = item.base_price as f64;
    let discounted = base - base * condition_discount(item.condition);
    discounted + discounted * config.seasonal[month0(start)]
}

fn is_weekend(date: chrono::NaiveDate) -> bool {
    date.weekday().num_days_from_monday() >= 5
}

fn billable_days(range: &DateRange, config: &PricingConfig) -> f64 {
    let whole = range.days() as f64;
    if !config.half_day_weekends {
        return whole;
    }
    let (Some(first), Some(last)) = (
        DateTime::<Utc>::from_timestamp_millis(range.start),
        DateTime::<Utc>::from_timestamp_millis(range.end),
    ) else {
        return whole;
    };
    let first = first.date_naive();
    let last = last.date_naive();

    let mut work = 0i64;
    let mut weekend = 0i64;
    let mut day = first;
    while day <= last {
        if is_weekend(day) {
            weekend += 1;
        } else {
            work += 1;
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    if is_weekend(first) != is_weekend(last) || work > 5 {
        work as f64 + weekend as f64 * 0.5
    } else {
        whole
    }
}

/// Price a set of items over an inclusive date range. Pure and deterministic;
/// re-run server-side on every booking or modification to catch stale quotes.
pub fn price(items: &[Item], range: &DateRange, config: &PricingConfig) -> Amount {
    if items.is_empty() {
        return 0;
    }
    let per_day: f64 = items.iter().map(|i| unit_price(i, range.start, config)).sum();
    let mut total = per_day * billable_days(range, config);
    if items.len() > 1 {
        total -= total * config.bundle_discount;
    }
    total.floor() as Amount
}
