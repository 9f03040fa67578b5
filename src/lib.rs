//! Server-driven data tables over back-office REST collections
//!
//! [`controller::ListViewController`] keeps the paging, sort, search and date
//! filter state of one table and turns it into remote queries; the terminal UI
//! in [`tui`] and the `export` command both drive it.

pub mod auth;
pub mod cache;
pub mod config;
pub mod controller;
pub mod errors;
pub mod export;
pub mod fetch;
pub mod models;
pub mod query;
pub mod resources;
pub mod transport;
pub mod tui;
