//! Route definitions for the listing API
//!
//! This module configures all HTTP routes and maps them to their handlers.

use axum::routing::{get, patch, post};
use axum::Router;

use crate::database::AppState;
use crate::handler::{
    create_listing, delete_listing, get_listing, health, import_listings, list_admin_listings,
    list_inventory, quote_listing, update_listing,
};

/// Creates the application router
///
/// # Route Definitions
///
/// - `GET /health` - liveness probe (public)
/// - `GET /api/listings` - active inventory with filters (authenticated)
/// - `GET /api/listings/{id}` - one listing (authenticated)
/// - `POST /api/listings/{id}/quote` - live profit calculator (authenticated)
/// - `GET /api/admin/listings` - every listing with its creator (admin)
/// - `POST /api/admin/listings` - create a listing (admin)
/// - `POST /api/admin/listings/import` - bulk JSON import (admin)
/// - `PATCH /api/admin/listings/{id}` - partial update (admin)
/// - `DELETE /api/admin/listings/{id}` - hard delete (admin)
///
/// # Example Usage
///
/// ```no_run
/// # use auction_listings::database::{init_db, AppState};
/// # use auction_listings::route::create_app;
/// # let db = init_db("data.db").unwrap();
/// let app = create_app(AppState::new(db));
/// // axum::serve(listener, app).await.unwrap();
/// ```
pub fn create_app(state: AppState) -> Router {
    let inventory_routes = Router::new()
        .route("/listings", get(list_inventory))
        .route("/listings/{id}", get(get_listing))
        .route("/listings/{id}/quote", post(quote_listing));

    // Every handler here takes `AdminAccess`
    let admin_routes = Router::new()
        .route("/listings", get(list_admin_listings).post(create_listing))
        .route("/listings/import", post(import_listings))
        .route(
            "/listings/{id}",
            patch(update_listing).delete(delete_listing),
        );

    Router::new()
        .route("/health", get(health))
        .nest("/api", inventory_routes)
        .nest("/api/admin", admin_routes)
        .with_state(state)
}
