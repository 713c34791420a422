//! Shared helpers for the HTTP integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tower::ServiceExt;

use auction_listings::database::{init_db, upsert_user, AppState};
use auction_listings::route::create_app;

pub const ADMIN_TOKEN: &str = "admin-token";
pub const BUYER_TOKEN: &str = "buyer-token";

/// Creates a test application with a temporary database, one admin and one buyer
pub fn setup_test_app() -> (Router, NamedTempFile) {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = temp_db.path().to_str().unwrap();
    let db = init_db(db_path).expect("Failed to initialize test database");

    upsert_user(&db, "admin@example.com", "admin", true, ADMIN_TOKEN).unwrap();
    upsert_user(&db, "buyer@example.com", "buyer", false, BUYER_TOKEN).unwrap();

    (create_app(AppState::new(db)), temp_db)
}

/// Helper function to parse response body as JSON
pub async fn response_json(body: Body) -> Value {
    let bytes = body
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();

    serde_json::from_slice(&bytes).expect("Failed to parse JSON")
}

/// Sends one request, optionally with a bearer token and a raw body
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<String>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    app.clone().oneshot(request).await.unwrap()
}

/// A complete, valid creation payload
pub fn listing_payload() -> Value {
    json!({
        "make": "Honda",
        "model": "Civic",
        "year": 2018,
        "kilometers": 84000,
        "vin": "2HGFC2F59JH000001",
        "auctionLink": "https://auctions.example.com/lot/1",
        "auctionDate": "2026-11-02T15:00:00Z",
        "damageEstimate": 1200,
        "estimatedMarketValue": 14000,
        "recommendedMaxBid": 8000,
        "absoluteMaxBid": 9000,
        "towingCost": 250,
        "detailingCost": 150,
        "extraCosts": 100,
        "mainPoints": ["Clean title", "  ", "New tires"]
    })
}

/// Creates a listing as admin and returns the stored record
pub async fn create_listing(app: &Router, payload: Value) -> Value {
    let response = send(
        app,
        "POST",
        "/api/admin/listings",
        Some(ADMIN_TOKEN),
        Some(payload.to_string()),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    response_json(response.into_body()).await
}
