//! Plate-to-FIPE lookup service
//!
//! This library provides the core functionality for the placa-fipe service:
//! license-plate normalization and validation, and a sequential multi-provider
//! resolution pipeline that adapts upstream JSON APIs and scraped HTML pages
//! into one canonical vehicle + FIPE price record.

pub mod app_state;
pub mod config;
pub mod models;
pub mod providers;
pub mod routes;
