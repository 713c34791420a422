//! Data models for the listing marketplace
//!
//! This module defines the persisted records (listings and users) and the
//! response shapes built from them. Request payloads are validated from raw
//! JSON in [`crate::validation`] and arrive here as [`ListingDraft`] and
//! [`ListingPatch`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workflow state of a listing
///
/// Any status can be set by an authorized update; there is no enforced
/// transition order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    #[default]
    Active,
    Sold,
    Expired,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Sold => "sold",
            ListingStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(ListingStatus::Active),
            "sold" => Ok(ListingStatus::Sold),
            "expired" => Ok(ListingStatus::Expired),
            other => Err(format!(
                "unknown status '{other}', expected one of: active, sold, expired"
            )),
        }
    }
}

/// One itemized repair line
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RepairItem {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts_link: Option<String>,
    #[serde(default)]
    pub parts_cost: f64,
    #[serde(default)]
    pub labour: f64,
}

/// A vehicle-auction listing as stored in the database
///
/// `profit_margin` and `estimated_total_investment` are snapshots taken by
/// [`crate::calculator::derive`] on every write.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // Vehicle
    pub make: String,
    pub model: String,
    pub year: i32,
    pub kilometers: u64,
    pub vin: Option<String>,
    pub trim: Option<String>,

    // Auction
    pub auction_link: String,
    pub auction_date: DateTime<Utc>,
    pub current_high_bid: Option<f64>,
    pub current_high_bidder: Option<String>,

    // Condition
    pub damage_estimate: f64,

    // Financial inputs
    pub estimated_market_value: f64,
    pub recommended_max_bid: f64,
    pub absolute_max_bid: f64,

    // Costs
    #[serde(default)]
    pub towing_cost: f64,
    #[serde(default)]
    pub detailing_cost: f64,
    #[serde(default)]
    pub extra_costs: f64,

    // Derived
    pub profit_margin: f64,
    pub estimated_total_investment: f64,

    // Details
    #[serde(default)]
    pub main_points: Vec<String>,
    pub car_gurus_link: Option<String>,
    pub repairs: Option<Vec<RepairItem>>,

    #[serde(default)]
    pub status: ListingStatus,

    /// Id of the user that created the listing
    pub added_by_id: String,
}

/// A validated creation payload
///
/// Everything a [`Listing`] carries except the server-assigned fields
/// (identity, timestamps, owner) and the derived financial outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingDraft {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub kilometers: u64,
    pub vin: Option<String>,
    pub trim: Option<String>,
    pub auction_link: String,
    pub auction_date: DateTime<Utc>,
    pub current_high_bid: Option<f64>,
    pub current_high_bidder: Option<String>,
    pub damage_estimate: f64,
    pub estimated_market_value: f64,
    pub recommended_max_bid: f64,
    pub absolute_max_bid: f64,
    pub towing_cost: f64,
    pub detailing_cost: f64,
    pub extra_costs: f64,
    pub main_points: Vec<String>,
    pub car_gurus_link: Option<String>,
    pub repairs: Option<Vec<RepairItem>>,
    pub status: ListingStatus,
}

/// A validated partial update
///
/// `None` leaves a field untouched. For nullable fields the inner `Option`
/// distinguishes "set" (`Some(Some(v))`) from "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPatch {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub kilometers: Option<u64>,
    pub vin: Option<Option<String>>,
    pub trim: Option<Option<String>>,
    pub auction_link: Option<String>,
    pub auction_date: Option<DateTime<Utc>>,
    pub current_high_bid: Option<Option<f64>>,
    pub current_high_bidder: Option<Option<String>>,
    pub damage_estimate: Option<f64>,
    pub estimated_market_value: Option<f64>,
    pub recommended_max_bid: Option<f64>,
    pub absolute_max_bid: Option<f64>,
    pub towing_cost: Option<f64>,
    pub detailing_cost: Option<f64>,
    pub extra_costs: Option<f64>,
    pub main_points: Option<Vec<String>>,
    pub car_gurus_link: Option<Option<String>>,
    pub repairs: Option<Option<Vec<RepairItem>>>,
    pub status: Option<ListingStatus>,
}

impl ListingPatch {
    /// Applies every supplied field to `listing`.
    ///
    /// Derived financial fields and `updated_at` are left to the caller.
    pub fn apply_to(self, listing: &mut Listing) {
        fn set<T>(target: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *target = v;
            }
        }

        set(&mut listing.make, self.make);
        set(&mut listing.model, self.model);
        set(&mut listing.year, self.year);
        set(&mut listing.kilometers, self.kilometers);
        set(&mut listing.vin, self.vin);
        set(&mut listing.trim, self.trim);
        set(&mut listing.auction_link, self.auction_link);
        set(&mut listing.auction_date, self.auction_date);
        set(&mut listing.current_high_bid, self.current_high_bid);
        set(&mut listing.current_high_bidder, self.current_high_bidder);
        set(&mut listing.damage_estimate, self.damage_estimate);
        set(&mut listing.estimated_market_value, self.estimated_market_value);
        set(&mut listing.recommended_max_bid, self.recommended_max_bid);
        set(&mut listing.absolute_max_bid, self.absolute_max_bid);
        set(&mut listing.towing_cost, self.towing_cost);
        set(&mut listing.detailing_cost, self.detailing_cost);
        set(&mut listing.extra_costs, self.extra_costs);
        set(&mut listing.main_points, self.main_points);
        set(&mut listing.car_gurus_link, self.car_gurus_link);
        set(&mut listing.repairs, self.repairs);
        set(&mut listing.status, self.status);
    }
}

/// A user record
///
/// Only the capability flag matters to the listing operations; the bearer
/// token that identifies the user lives in a separate index table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// Minimal projection of a listing's creator shown on the admin dashboard
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CreatorSummary {
    pub email: String,
    pub username: String,
}

impl From<&User> for CreatorSummary {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            username: user.username.clone(),
        }
    }
}

/// Listing plus creator projection, as returned by the admin listing view
///
/// `added_by` is `None` when the creating user no longer exists.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdminListing {
    #[serde(flatten)]
    pub listing: Listing,
    pub added_by: Option<CreatorSummary>,
}

/// Query parameters for the admin listing view
///
/// # Example
/// Query string: `?status=sold`
#[derive(Deserialize, Debug, Default)]
pub struct AdminListParams {
    /// Only return listings in this status; `all` or absent returns every status
    pub status: Option<String>,
}

impl AdminListParams {
    /// Parses the requested status; `all` matches in any letter case.
    pub fn status_filter(&self) -> Result<Option<ListingStatus>, String> {
        let requested = self.status.as_deref().map(|raw| raw.trim().to_ascii_lowercase());
        match requested.as_deref() {
            None | Some("") | Some("all") => Ok(None),
            Some(raw) => raw.parse().map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Sold".parse::<ListingStatus>(), Ok(ListingStatus::Sold));
        assert_eq!(" expired ".parse::<ListingStatus>(), Ok(ListingStatus::Expired));
        assert!("archived".parse::<ListingStatus>().is_err());
    }

    #[test]
    fn admin_status_filter_treats_all_as_none() {
        let params = |s: &str| AdminListParams {
            status: Some(s.to_string()),
        };
        assert_eq!(params("all").status_filter(), Ok(None));
        assert_eq!(params(" All ").status_filter(), Ok(None));
        assert_eq!(params("SOLD").status_filter(), Ok(Some(ListingStatus::Sold)));
        assert_eq!(params("sold").status_filter(), Ok(Some(ListingStatus::Sold)));
        assert!(params("gone").status_filter().is_err());
        assert_eq!(AdminListParams::default().status_filter(), Ok(None));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ListingStatus::Active).unwrap(),
            "\"active\""
        );
    }
}
