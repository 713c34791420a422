//! Payload validation for listing writes
//!
//! Payloads are read as raw JSON documents rather than through a derived
//! `Deserialize` so that every offending field can be reported by name.
//! Syntax errors surface as [`AppError::MalformedInput`]; well-formed
//! documents with bad fields surface as [`AppError::ValidationFailed`].

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use url::Url;

use crate::error::{AppError, AppResult, ValidationErrors};
use crate::model::{ListingDraft, ListingPatch, ListingStatus, RepairItem};

/// Oldest model year accepted for a listing
pub const MIN_YEAR: i32 = 1990;

/// Which fields a creation payload must carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Admin form: vehicle, auction, condition and financial inputs are all required
    Create,
    /// Bulk import: only vehicle and auction identity are required, amounts default to 0
    Import,
}

type Checked<T> = Result<T, ValidationErrors>;

fn reject<T>(reason: impl Into<String>) -> Checked<T> {
    let mut errors = ValidationErrors::new();
    errors.push("", reason);
    Err(errors)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn text(value: &Value) -> Checked<String> {
    match value.as_str() {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(_) => reject("must not be empty"),
        None => reject("must be a string"),
    }
}

fn non_negative(value: &Value) -> Checked<f64> {
    match value.as_f64() {
        Some(n) if !n.is_finite() => reject("must be a finite number"),
        Some(n) if n < 0.0 => reject("must not be negative"),
        Some(n) => Ok(n),
        None => reject("must be a number"),
    }
}

fn whole_number(value: &Value) -> Checked<i64> {
    if let Some(n) = value.as_i64() {
        return Ok(n);
    }
    match value.as_f64() {
        Some(n) if n.fract() == 0.0 && n.abs() <= i64::MAX as f64 => Ok(n as i64),
        Some(_) => reject("must be a whole number"),
        None => reject("must be a number"),
    }
}

fn count(value: &Value) -> Checked<u64> {
    let n = whole_number(value)?;
    u64::try_from(n).or_else(|_| reject("must not be negative"))
}

fn model_year(value: &Value, current_year: i32) -> Checked<i32> {
    let max = current_year + 1;
    let n = whole_number(value)?;
    match i32::try_from(n) {
        Ok(year) if (MIN_YEAR..=max).contains(&year) => Ok(year),
        _ => reject(format!("must be between {MIN_YEAR} and {max}")),
    }
}

fn link(value: &Value) -> Checked<String> {
    let raw = text(value)?;
    match Url::parse(&raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(raw),
        Ok(_) => reject("must be an http or https URL"),
        Err(err) => reject(format!("must be a valid URL ({err})")),
    }
}

fn timestamp(value: &Value) -> Checked<DateTime<Utc>> {
    let raw = text(value)?;

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&raw, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }

    reject("must be an ISO 8601 date or date-time")
}

fn status(value: &Value) -> Checked<ListingStatus> {
    match value.as_str() {
        Some(raw) => raw.parse().or_else(|reason: String| reject(reason)),
        None => reject("must be a string"),
    }
}

/// A bare string becomes a one-element list; blank entries are dropped.
fn main_points(value: &Value) -> Checked<Vec<String>> {
    match value {
        Value::String(point) => Ok(Some(point.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .into_iter()
            .collect()),
        Value::Array(items) => {
            let mut errors = ValidationErrors::new();
            let mut points = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match item.as_str() {
                    Some(point) if !point.trim().is_empty() => {
                        points.push(point.trim().to_string())
                    }
                    Some(_) => {}
                    None => errors.push(format!("[{i}]"), "must be a string"),
                }
            }
            if errors.is_empty() {
                Ok(points)
            } else {
                Err(errors)
            }
        }
        _ => reject("must be a string or an array of strings"),
    }
}

/// Accepts a plain array or an `{ "items": [...] }` wrapper.
fn repairs(value: &Value) -> Checked<Vec<RepairItem>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(wrapper) => match wrapper.get("items") {
            Some(Value::Array(items)) => items,
            _ => return reject("must be an array of repair items"),
        },
        _ => return reject("must be an array of repair items"),
    };

    let mut errors = ValidationErrors::new();
    let mut repairs = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let Some(fields) = item.as_object() else {
            errors.push(format!("[{i}]"), "must be an object");
            continue;
        };

        let mut reader = Reader::new(fields);
        let description = reader.required("description", text);
        let parts_link = reader.optional("partsLink", link);
        let parts_cost = reader.defaulted("partsCost", 0.0, non_negative);
        let labour = reader.defaulted("labour", 0.0, non_negative);

        match (description, parts_cost, labour) {
            (Some(description), Some(parts_cost), Some(labour)) if reader.is_clean() => {
                repairs.push(RepairItem {
                    description,
                    parts_link,
                    parts_cost,
                    labour,
                });
            }
            _ => errors.extend_prefixed(&format!("[{i}]."), reader.into_errors()),
        }
    }

    if errors.is_empty() {
        Ok(repairs)
    } else {
        Err(errors)
    }
}

/// Reads named fields from a JSON object, collecting every failure.
struct Reader<'a> {
    fields: &'a Map<String, Value>,
    errors: ValidationErrors,
}

impl<'a> Reader<'a> {
    fn new(fields: &'a Map<String, Value>) -> Self {
        Self {
            fields,
            errors: ValidationErrors::new(),
        }
    }

    fn check<T>(
        &mut self,
        field: &str,
        value: &Value,
        check: impl FnOnce(&Value) -> Checked<T>,
    ) -> Option<T> {
        match check(value) {
            Ok(v) => Some(v),
            Err(errors) => {
                self.errors.extend_prefixed(field, errors);
                None
            }
        }
    }

    fn required<T>(&mut self, field: &str, check: impl FnOnce(&Value) -> Checked<T>) -> Option<T> {
        let fields = self.fields;
        match fields.get(field) {
            None | Some(Value::Null) => {
                self.errors.push(field, "is required");
                None
            }
            Some(value) => self.check(field, value, check),
        }
    }

    /// Absent, `null` and blank strings all read as "not supplied".
    fn optional<T>(&mut self, field: &str, check: impl FnOnce(&Value) -> Checked<T>) -> Option<T> {
        let fields = self.fields;
        match fields.get(field) {
            Some(value) if !is_blank(value) => self.check(field, value, check),
            _ => None,
        }
    }

    fn defaulted<T>(
        &mut self,
        field: &str,
        default: T,
        check: impl FnOnce(&Value) -> Checked<T>,
    ) -> Option<T> {
        let fields = self.fields;
        match fields.get(field) {
            None | Some(Value::Null) => Some(default),
            Some(value) => self.check(field, value, check),
        }
    }

    fn amount(&mut self, field: &str, profile: Profile) -> Option<f64> {
        match profile {
            Profile::Create => self.required(field, non_negative),
            Profile::Import => self.defaulted(field, 0.0, non_negative),
        }
    }

    /// Patch semantics for a field that can never be empty.
    fn replace<T>(&mut self, field: &str, check: impl FnOnce(&Value) -> Checked<T>) -> Option<T> {
        let fields = self.fields;
        match fields.get(field) {
            None => None,
            Some(Value::Null) => {
                self.errors.push(field, "cannot be null");
                None
            }
            Some(value) => self.check(field, value, check),
        }
    }

    /// Patch semantics for a nullable field: `null` or a blank string clears it.
    fn replace_nullable<T>(
        &mut self,
        field: &str,
        check: impl FnOnce(&Value) -> Checked<T>,
    ) -> Option<Option<T>> {
        let fields = self.fields;
        match fields.get(field) {
            None => None,
            Some(value) if is_blank(value) => Some(None),
            Some(value) => self.check(field, value, check).map(Some),
        }
    }

    fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn into_errors(self) -> ValidationErrors {
        self.errors
    }
}

/// Parses a request body as JSON.
///
/// Syntax errors are reported as [`AppError::MalformedInput`] before any
/// field is looked at.
pub fn parse_document(body: &[u8]) -> AppResult<Value> {
    serde_json::from_slice(body)
        .map_err(|err| AppError::MalformedInput(format!("invalid JSON syntax: {err}")))
}

/// Well-formed JSON of the wrong shape is a validation failure on `$`.
fn expect_object(document: &Value) -> AppResult<&Map<String, Value>> {
    document.as_object().ok_or_else(|| {
        let mut errors = ValidationErrors::new();
        errors.push("$", "must be an object");
        AppError::ValidationFailed(errors)
    })
}

/// Validates listing payloads against the field rules
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    current_year: i32,
}

impl Validator {
    /// Validator whose newest accepted model year is `current_year + 1`.
    pub fn new(current_year: i32) -> Self {
        Self { current_year }
    }

    /// Validator for the current calendar year.
    pub fn current() -> Self {
        Self::new(Utc::now().year())
    }

    /// Validates a creation payload.
    pub fn draft(&self, fields: &Map<String, Value>, profile: Profile) -> Checked<ListingDraft> {
        let mut r = Reader::new(fields);

        let make = r.required("make", text);
        let model = r.required("model", text);
        let year = r.required("year", |v| model_year(v, self.current_year));
        let kilometers = r.required("kilometers", count);
        let vin = r.optional("vin", text);
        let trim = r.optional("trim", text);
        let auction_link = r.required("auctionLink", link);
        let auction_date = r.required("auctionDate", timestamp);
        let current_high_bid = r.optional("currentHighBid", non_negative);
        let current_high_bidder = r.optional("currentHighBidder", text);
        let damage_estimate = r.amount("damageEstimate", profile);
        let estimated_market_value = r.amount("estimatedMarketValue", profile);
        let recommended_max_bid = r.amount("recommendedMaxBid", profile);
        let absolute_max_bid = r.amount("absoluteMaxBid", profile);
        let towing_cost = r.defaulted("towingCost", 0.0, non_negative);
        let detailing_cost = r.defaulted("detailingCost", 0.0, non_negative);
        let extra_costs = r.defaulted("extraCosts", 0.0, non_negative);
        let points = r.defaulted("mainPoints", Vec::new(), main_points);
        let car_gurus_link = r.optional("carGurusLink", link);
        let repair_items = r.optional("repairs", repairs);
        let listing_status = r.defaulted("status", ListingStatus::default(), status);

        let (
            Some(make),
            Some(model),
            Some(year),
            Some(kilometers),
            Some(auction_link),
            Some(auction_date),
            Some(damage_estimate),
            Some(estimated_market_value),
            Some(recommended_max_bid),
            Some(absolute_max_bid),
            Some(towing_cost),
            Some(detailing_cost),
            Some(extra_costs),
            Some(main_points),
            Some(status),
        ) = (
            make,
            model,
            year,
            kilometers,
            auction_link,
            auction_date,
            damage_estimate,
            estimated_market_value,
            recommended_max_bid,
            absolute_max_bid,
            towing_cost,
            detailing_cost,
            extra_costs,
            points,
            listing_status,
        )
        else {
            return Err(r.into_errors());
        };

        if !r.is_clean() {
            return Err(r.into_errors());
        }

        Ok(ListingDraft {
            make,
            model,
            year,
            kilometers,
            vin,
            trim,
            auction_link,
            auction_date,
            current_high_bid,
            current_high_bidder,
            damage_estimate,
            estimated_market_value,
            recommended_max_bid,
            absolute_max_bid,
            towing_cost,
            detailing_cost,
            extra_costs,
            main_points,
            car_gurus_link,
            repairs: repair_items,
            status,
        })
    }

    /// Validates a partial update; only supplied fields are checked.
    pub fn patch(&self, fields: &Map<String, Value>) -> Checked<ListingPatch> {
        let mut r = Reader::new(fields);

        let patch = ListingPatch {
            make: r.replace("make", text),
            model: r.replace("model", text),
            year: r.replace("year", |v| model_year(v, self.current_year)),
            kilometers: r.replace("kilometers", count),
            vin: r.replace_nullable("vin", text),
            trim: r.replace_nullable("trim", text),
            auction_link: r.replace("auctionLink", link),
            auction_date: r.replace("auctionDate", timestamp),
            current_high_bid: r.replace_nullable("currentHighBid", non_negative),
            current_high_bidder: r.replace_nullable("currentHighBidder", text),
            damage_estimate: r.replace("damageEstimate", non_negative),
            estimated_market_value: r.replace("estimatedMarketValue", non_negative),
            recommended_max_bid: r.replace("recommendedMaxBid", non_negative),
            absolute_max_bid: r.replace("absoluteMaxBid", non_negative),
            towing_cost: r.replace("towingCost", non_negative),
            detailing_cost: r.replace("detailingCost", non_negative),
            extra_costs: r.replace("extraCosts", non_negative),
            main_points: r.replace("mainPoints", main_points),
            car_gurus_link: r.replace_nullable("carGurusLink", link),
            repairs: r.replace_nullable("repairs", repairs),
            status: r.replace("status", status),
        };

        if r.is_clean() {
            Ok(patch)
        } else {
            Err(r.into_errors())
        }
    }

    /// Parses and validates a creation request body.
    pub fn create_payload(&self, body: &[u8]) -> AppResult<ListingDraft> {
        let document = parse_document(body)?;
        let fields = expect_object(&document)?;
        self.draft(fields, Profile::Create)
            .map_err(AppError::ValidationFailed)
    }

    /// Parses and validates an update request body.
    pub fn update_payload(&self, body: &[u8]) -> AppResult<ListingPatch> {
        let document = parse_document(body)?;
        let fields = expect_object(&document)?;
        self.patch(fields).map_err(AppError::ValidationFailed)
    }

    /// Parses and validates a bulk-import document.
    ///
    /// The document is either one listing object or an array of them. Every
    /// entry is validated before any is accepted; errors in array entries are
    /// reported as `[index].field`.
    pub fn import_document(&self, body: &[u8]) -> AppResult<Vec<ListingDraft>> {
        let document = parse_document(body)?;

        match &document {
            Value::Object(fields) => self
                .draft(fields, Profile::Import)
                .map(|draft| vec![draft])
                .map_err(AppError::ValidationFailed),
            Value::Array(entries) => {
                let mut errors = ValidationErrors::new();
                if entries.is_empty() {
                    errors.push("$", "must contain at least one listing");
                }

                let mut drafts = Vec::with_capacity(entries.len());
                for (i, entry) in entries.iter().enumerate() {
                    let Some(fields) = entry.as_object() else {
                        errors.push(format!("[{i}]"), "must be an object");
                        continue;
                    };
                    match self.draft(fields, Profile::Import) {
                        Ok(draft) => drafts.push(draft),
                        Err(entry_errors) => {
                            errors.extend_prefixed(&format!("[{i}]."), entry_errors)
                        }
                    }
                }

                errors.into_result().map(|()| drafts)
            }
            _ => {
                let mut errors = ValidationErrors::new();
                errors.push("$", "must be a listing object or an array of listing objects");
                Err(AppError::ValidationFailed(errors))
            }
        }
    }
}
