//! HTTP request handlers for the listing API
//!
//! Handlers stay thin: the caller is identified by the [`Viewer`] and
//! [`AdminAccess`] extractors, payloads go through the [`Validator`], and the
//! work is done by [`ListingRepository`]. Write bodies are taken as raw bytes
//! so that invalid JSON is reported as `MALFORMED_INPUT` rather than by the
//! framework's own rejection.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::calculator::{LiveQuote, QuoteOverrides};
use crate::database::AppState;
use crate::error::{AppError, AppResult, ValidationErrors};
use crate::inventory::{InventoryParams, InventoryQuery, InventorySummary};
use crate::middleware::{AdminAccess, Viewer};
use crate::model::{AdminListParams, Listing};
use crate::repository::ListingRepository;
use crate::validation::{parse_document, Validator};

/// Liveness probe
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Lists active inventory with filters and sorting
///
/// # Query Parameters
///
/// - `search` - substring of make, model or VIN
/// - `minProfit` - minimum profit margin (0 disables)
/// - `maxBid` - maximum recommended bid (0 disables)
/// - `make` - substring of make
/// - `sortBy` - `profit` (default), `auction_date` or `market_value`
///
/// # Response
///
/// ```json
/// {
///   "total": 12,
///   "count": 3,
///   "sortBy": "profit",
///   "filtered": true,
///   "summary": { "count": 3, "averageProfit": 2100.0, "averageMaxBid": 7800.0 },
///   "data": [...]
/// }
/// ```
pub async fn list_inventory(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(params): Query<InventoryParams>,
) -> AppResult<Json<Value>> {
    let query = InventoryQuery::try_from(params)?;

    let active = ListingRepository::new(&state.db).list_active_listings(&viewer)?;
    let total = active.len();
    let data = query.apply(active);

    Ok(Json(json!({
        "total": total,
        "count": data.len(),
        "sortBy": query.sort_by,
        "filtered": query.is_filtering(),
        "summary": InventorySummary::of(&data),
        "data": data,
    })))
}

/// Fetches one listing
///
/// # Path Parameters
///
/// - `id` - The listing identifier
///
/// # Response
///
/// - **200 OK** - the listing
/// - **404 Not Found** - unknown id, or a sold/expired listing requested by a
///   non-admin
pub async fn get_listing(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<String>,
) -> AppResult<Json<Listing>> {
    let listing = ListingRepository::new(&state.db).get_listing(&viewer, &id)?;
    Ok(Json(listing))
}

/// Runs the live profit calculator for one listing
///
/// This handler:
/// 1. Reads the optional override body (an empty body uses the listing as is)
/// 2. Loads the listing visible to the caller
/// 3. Seeds the calculator from it and the configured auction overhead
/// 4. Applies the overrides and returns the breakdown
///
/// Nothing is written.
///
/// # Request Body
///
/// ```json
/// {
///   "bidAmount": "7000",
///   "auctionOverhead": 450,
///   "repairs": [{ "description": "Bumper", "parts": "300", "labour": "" }]
/// }
/// ```
///
/// Amounts may be numbers or text; anything unparseable counts as 0.
///
/// # Response
///
/// - **200 OK** - `{ listingId, storedProfitMargin, quote }`
/// - **400 Bad Request** - `MALFORMED_INPUT`, or `VALIDATION_FAILED` on `$`
///   for a body of the wrong shape
/// - **404 Not Found** - listing not visible to the caller
pub async fn quote_listing(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let overrides = if body.iter().all(u8::is_ascii_whitespace) {
        QuoteOverrides::default()
    } else {
        serde_json::from_value(parse_document(&body)?).map_err(|err| {
            let mut errors = ValidationErrors::new();
            errors.push("$", err.to_string());
            AppError::ValidationFailed(errors)
        })?
    };

    let listing = ListingRepository::new(&state.db).get_listing(&viewer, &id)?;
    let breakdown = LiveQuote::for_listing(&listing, state.settings.auction_overhead)
        .with_overrides(overrides)
        .calculate();

    Ok(Json(json!({
        "listingId": listing.id,
        "storedProfitMargin": listing.profit_margin,
        "quote": breakdown,
    })))
}

/// Lists every listing for the admin dashboard, newest first
///
/// Each entry carries an `addedBy` projection (`email`, `username`) of the
/// admin that created it, or `null` when that user is gone.
///
/// # Query Parameters
///
/// - `status` (optional) - `active`, `sold`, `expired` or `all`
///
/// # Example Request
///
/// `GET /api/admin/listings?status=sold`
pub async fn list_admin_listings(
    State(state): State<AppState>,
    admin: AdminAccess,
    Query(params): Query<AdminListParams>,
) -> AppResult<Json<Value>> {
    let status = params.status_filter().map_err(|reason| {
        let mut errors = ValidationErrors::new();
        errors.push("status", reason);
        AppError::ValidationFailed(errors)
    })?;

    let data = ListingRepository::new(&state.db).list_all_listings_for_admin(&admin, status)?;

    Ok(Json(json!({
        "total": data.len(),
        "data": data,
    })))
}

/// Creates a listing
///
/// This handler:
/// 1. Parses the body, rejecting invalid JSON as `MALFORMED_INPUT`
/// 2. Validates every field, collecting all failures
/// 3. Derives `estimatedTotalInvestment` and `profitMargin`
/// 4. Stores the listing with the calling admin as its owner
///
/// # Request Body
///
/// ```json
/// {
///   "make": "Honda",
///   "model": "Civic",
///   "year": 2018,
///   "kilometers": 84000,
///   "auctionLink": "https://auctions.example.com/lot/1",
///   "auctionDate": "2026-11-02T15:00:00Z",
///   "damageEstimate": 1200,
///   "estimatedMarketValue": 14000,
///   "recommendedMaxBid": 8000,
///   "absoluteMaxBid": 9000,
///   "mainPoints": ["Clean title"]
/// }
/// ```
///
/// # Response
///
/// - **201 Created** - the stored listing, including id and derived fields
/// - **400 Bad Request** - `VALIDATION_FAILED` or `MALFORMED_INPUT`
pub async fn create_listing(
    State(state): State<AppState>,
    admin: AdminAccess,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let draft = Validator::current().create_payload(&body)?;
    let listing = ListingRepository::new(&state.db).create_listing(&admin, draft)?;

    Ok((StatusCode::CREATED, Json(listing)))
}

/// Applies a partial update to a listing
///
/// Only supplied fields are validated and applied. `null` clears an optional
/// field. The financial snapshot is re-derived from the merged record.
///
/// # Response
///
/// - **200 OK** - the updated listing
/// - **400 Bad Request** - `VALIDATION_FAILED` or `MALFORMED_INPUT`
/// - **404 Not Found** - unknown id
pub async fn update_listing(
    State(state): State<AppState>,
    admin: AdminAccess,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<Json<Listing>> {
    let patch = Validator::current().update_payload(&body)?;
    let listing = ListingRepository::new(&state.db).update_listing(&admin, &id, patch)?;

    Ok(Json(listing))
}

/// Hard-deletes a listing and returns the removed record
///
/// # Example Request
///
/// `DELETE /api/admin/listings/aB3dE5fG7hJ9`
///
/// # Response
///
/// - **200 OK** - the deleted listing
/// - **404 Not Found** - unknown id; nothing is changed
pub async fn delete_listing(
    State(state): State<AppState>,
    admin: AdminAccess,
    Path(id): Path<String>,
) -> AppResult<Json<Listing>> {
    let listing = ListingRepository::new(&state.db).delete_listing(&admin, &id)?;
    Ok(Json(listing))
}

/// Imports one listing object or an array of them
///
/// Every entry is validated before anything is stored; the import is
/// all-or-nothing. Financial amounts default to 0 when absent.
///
/// # Response
///
/// - **201 Created** - `{ imported, data }`
/// - **400 Bad Request** - `MALFORMED_INPUT` for invalid JSON syntax,
///   `VALIDATION_FAILED` with `[index].field` entries otherwise
pub async fn import_listings(
    State(state): State<AppState>,
    admin: AdminAccess,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let drafts = Validator::current().import_document(&body)?;
    let data = ListingRepository::new(&state.db).import_listings(&admin, drafts)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "imported": data.len(),
            "data": data,
        })),
    ))
}
