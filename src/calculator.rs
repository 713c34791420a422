//! Profit and cost arithmetic
//!
//! [`derive`] is the single formula for the persisted financial snapshot and is
//! called by every write path. [`LiveQuote`] is the separate what-if
//! calculator shown next to a listing; its results are never stored.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::model::{Listing, RepairItem};

/// Auction overhead assumed by the live calculator when none is configured
pub const DEFAULT_AUCTION_OVERHEAD: f64 = 500.0;

/// Cost and value inputs of the persisted snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FinancialInputs {
    pub recommended_max_bid: f64,
    pub towing_cost: f64,
    pub detailing_cost: f64,
    pub damage_estimate: f64,
    pub extra_costs: f64,
    pub estimated_market_value: f64,
}

/// Derived financial outputs stored on a listing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinancialSummary {
    pub estimated_total_investment: f64,
    pub profit_margin: f64,
}

impl From<&Listing> for FinancialInputs {
    fn from(listing: &Listing) -> Self {
        Self {
            recommended_max_bid: listing.recommended_max_bid,
            towing_cost: listing.towing_cost,
            detailing_cost: listing.detailing_cost,
            damage_estimate: listing.damage_estimate,
            extra_costs: listing.extra_costs,
            estimated_market_value: listing.estimated_market_value,
        }
    }
}

/// Treats NaN and infinities as 0 so they never reach a stored record.
pub fn amount(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Parses a free-text amount; anything unparseable counts as 0.
pub fn parse_amount(raw: &str) -> f64 {
    raw.trim().parse::<f64>().map(amount).unwrap_or(0.0)
}

/// Reads a JSON number or numeric string; anything else counts as 0.
pub fn loose_amount(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().map(amount).unwrap_or(0.0),
        Value::String(raw) => parse_amount(raw),
        _ => 0.0,
    }
}

/// Deserializes an amount the way [`loose_amount`] reads it.
fn deserialize_loose_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|value| loose_amount(&value))
}

/// Computes total investment and profit margin.
///
/// A negative margin is a valid result and represents a loss.
pub fn derive(inputs: FinancialInputs) -> FinancialSummary {
    let estimated_total_investment = amount(inputs.recommended_max_bid)
        + amount(inputs.towing_cost)
        + amount(inputs.detailing_cost)
        + amount(inputs.damage_estimate)
        + amount(inputs.extra_costs);

    FinancialSummary {
        estimated_total_investment,
        profit_margin: amount(inputs.estimated_market_value) - estimated_total_investment,
    }
}

/// Recomputes the snapshot fields of `listing` from its current inputs.
pub fn refresh(listing: &mut Listing) {
    let summary = derive(FinancialInputs::from(&*listing));
    listing.estimated_total_investment = summary.estimated_total_investment;
    listing.profit_margin = summary.profit_margin;
}

/// One editable repair line in the live calculator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRepair {
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "deserialize_loose_amount")]
    pub parts: f64,
    #[serde(default, deserialize_with = "deserialize_loose_amount")]
    pub labour: f64,
}

impl From<&RepairItem> for QuoteRepair {
    fn from(item: &RepairItem) -> Self {
        Self {
            description: item.description.clone(),
            parts: item.parts_cost,
            labour: item.labour,
        }
    }
}

/// What-if inputs for a single listing
#[derive(Debug, Clone, PartialEq)]
pub struct LiveQuote {
    pub bid_amount: f64,
    pub auction_overhead: f64,
    pub towing_cost: f64,
    pub detailing_cost: f64,
    pub extra_costs: f64,
    pub repairs: Vec<QuoteRepair>,
    pub estimated_market_value: f64,
}

/// Overrides a caller may send for a live quote
///
/// Amounts may be numbers or free text, the way an input box delivers them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteOverrides {
    pub bid_amount: Option<Value>,
    pub auction_overhead: Option<Value>,
    pub towing_cost: Option<Value>,
    pub detailing_cost: Option<Value>,
    pub extra_costs: Option<Value>,
    pub repairs: Option<Vec<QuoteRepair>>,
}

/// Result of a live quote
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteBreakdown {
    pub bid_amount: f64,
    pub auction_overhead: f64,
    pub cost_to_door: f64,
    pub repair_total: f64,
    pub ready_to_sell_total: f64,
    pub estimated_market_value: f64,
    pub displayed_profit: f64,
}

impl LiveQuote {
    /// Seeds the calculator from a stored listing.
    pub fn for_listing(listing: &Listing, auction_overhead: f64) -> Self {
        Self {
            bid_amount: listing.recommended_max_bid,
            auction_overhead,
            towing_cost: listing.towing_cost,
            detailing_cost: listing.detailing_cost,
            extra_costs: listing.extra_costs,
            repairs: listing
                .repairs
                .iter()
                .flatten()
                .map(QuoteRepair::from)
                .collect(),
            estimated_market_value: listing.estimated_market_value,
        }
    }

    pub fn with_overrides(mut self, overrides: QuoteOverrides) -> Self {
        let apply = |target: &mut f64, raw: Option<Value>| {
            if let Some(raw) = raw {
                *target = loose_amount(&raw);
            }
        };

        apply(&mut self.bid_amount, overrides.bid_amount);
        apply(&mut self.auction_overhead, overrides.auction_overhead);
        apply(&mut self.towing_cost, overrides.towing_cost);
        apply(&mut self.detailing_cost, overrides.detailing_cost);
        apply(&mut self.extra_costs, overrides.extra_costs);
        if let Some(repairs) = overrides.repairs {
            self.repairs = repairs;
        }
        self
    }

    pub fn repair_total(&self) -> f64 {
        self.repairs
            .iter()
            .map(|r| amount(r.parts) + amount(r.labour))
            .sum()
    }

    pub fn calculate(&self) -> QuoteBreakdown {
        let cost_to_door =
            amount(self.bid_amount) + amount(self.auction_overhead) + amount(self.towing_cost);
        let repair_total = self.repair_total();
        let ready_to_sell_total = cost_to_door
            + amount(self.detailing_cost)
            + amount(self.extra_costs)
            + repair_total;

        QuoteBreakdown {
            bid_amount: amount(self.bid_amount),
            auction_overhead: amount(self.auction_overhead),
            cost_to_door,
            repair_total,
            ready_to_sell_total,
            estimated_market_value: amount(self.estimated_market_value),
            displayed_profit: amount(self.estimated_market_value) - ready_to_sell_total,
        }
    }
}
