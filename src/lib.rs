//! News Admin - an admin console for a news aggregator
//!
//! This crate imports sources and articles from a NewsAPI-style service into
//! SQLite and serves server-rendered admin pages for categories, sources and
//! article statistics.

pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod newsapi;
pub mod reconcile;
pub mod report;
pub mod routes;
