//! Library exports for the auction listing service
//!
//! This module exposes internal components for testing and potential library usage.

pub mod calculator;
pub mod config;
pub mod database;
pub mod error;
pub mod handler;
pub mod inventory;
pub mod middleware;
pub mod model;
pub mod repository;
pub mod route;
pub mod validation;
