//! Inventory filtering and sorting
//!
//! Pure functions over a snapshot of active listings. The filter and sort
//! selection travels with each request, so concurrent browsers never share
//! state.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::calculator::parse_amount;
use crate::error::{AppError, ValidationErrors};
use crate::model::Listing;

/// Sort order for the inventory
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// Highest profit margin first
    #[default]
    Profit,
    /// Soonest auction first
    AuctionDate,
    /// Highest estimated market value first
    MarketValue,
}

impl SortBy {
    pub fn compare(&self, a: &Listing, b: &Listing) -> Ordering {
        match self {
            SortBy::Profit => b.profit_margin.total_cmp(&a.profit_margin),
            SortBy::AuctionDate => a.auction_date.cmp(&b.auction_date),
            SortBy::MarketValue => b
                .estimated_market_value
                .total_cmp(&a.estimated_market_value),
        }
    }

    /// Stable sort: listings that compare equal keep their relative order.
    pub fn sort(&self, listings: &mut [Listing]) {
        listings.sort_by(|a, b| self.compare(a, b));
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "profit" => Ok(SortBy::Profit),
            "auction_date" => Ok(SortBy::AuctionDate),
            "market_value" => Ok(SortBy::MarketValue),
            other => Err(format!(
                "unknown sort '{other}', expected one of: profit, auction_date, market_value"
            )),
        }
    }
}

/// Raw query-string parameters of the inventory endpoint
///
/// # Example
/// Query string: `?search=civic&minProfit=1500&maxBid=10000&sortBy=auction_date`
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct InventoryParams {
    pub search: Option<String>,
    pub min_profit: Option<String>,
    pub max_bid: Option<String>,
    pub make: Option<String>,
    pub sort_by: Option<String>,
}

/// A filter and sort selection
///
/// The default selection matches every listing and sorts by profit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryQuery {
    /// Case-insensitive substring of make, model or VIN; empty matches all
    pub search: String,
    /// Minimum profit margin; 0 disables
    pub min_profit: f64,
    /// Maximum recommended bid; 0 disables
    pub max_bid: f64,
    /// Case-insensitive substring of make; empty matches all
    pub make: String,
    pub sort_by: SortBy,
}

impl TryFrom<InventoryParams> for InventoryQuery {
    type Error = AppError;

    /// Amounts that do not parse disable their filter; an unknown sort is rejected.
    fn try_from(params: InventoryParams) -> Result<Self, Self::Error> {
        let sort_by = match params.sort_by.as_deref() {
            None => SortBy::default(),
            Some(raw) => raw.parse().map_err(|reason: String| {
                let mut errors = ValidationErrors::new();
                errors.push("sortBy", reason);
                AppError::ValidationFailed(errors)
            })?,
        };

        Ok(Self {
            search: params.search.unwrap_or_default().trim().to_string(),
            min_profit: params.min_profit.as_deref().map(parse_amount).unwrap_or(0.0),
            max_bid: params.max_bid.as_deref().map(parse_amount).unwrap_or(0.0),
            make: params.make.unwrap_or_default().trim().to_string(),
            sort_by,
        })
    }
}

fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

impl InventoryQuery {
    /// `true` when any filter narrows the set.
    pub fn is_filtering(&self) -> bool {
        !self.search.is_empty()
            || self.min_profit > 0.0
            || self.max_bid > 0.0
            || !self.make.is_empty()
    }

    pub fn matches(&self, listing: &Listing) -> bool {
        if !self.search.is_empty() {
            let needle = self.search.to_lowercase();
            let hit = contains_ignore_case(&listing.make, &needle)
                || contains_ignore_case(&listing.model, &needle)
                || listing
                    .vin
                    .as_deref()
                    .is_some_and(|vin| contains_ignore_case(vin, &needle));
            if !hit {
                return false;
            }
        }

        if self.min_profit > 0.0 && listing.profit_margin < self.min_profit {
            return false;
        }

        if self.max_bid > 0.0 && listing.recommended_max_bid > self.max_bid {
            return false;
        }

        if !self.make.is_empty()
            && !contains_ignore_case(&listing.make, &self.make.to_lowercase())
        {
            return false;
        }

        true
    }

    /// Filters, then sorts.
    pub fn apply(&self, listings: Vec<Listing>) -> Vec<Listing> {
        let mut selected: Vec<Listing> = listings.into_iter().filter(|l| self.matches(l)).collect();
        self.sort_by.sort(&mut selected);
        selected
    }
}

/// Aggregate figures over a set of listings
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventorySummary {
    pub count: usize,
    pub average_profit: f64,
    pub average_max_bid: f64,
}

impl InventorySummary {
    pub fn of(listings: &[Listing]) -> Self {
        if listings.is_empty() {
            return Self {
                count: 0,
                average_profit: 0.0,
                average_max_bid: 0.0,
            };
        }

        let count = listings.len();
        let total_profit: f64 = listings.iter().map(|l| l.profit_margin).sum();
        let total_bid: f64 = listings.iter().map(|l| l.recommended_max_bid).sum();

        Self {
            count,
            average_profit: total_profit / count as f64,
            average_max_bid: total_bid / count as f64,
        }
    }
}
