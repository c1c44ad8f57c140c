//! Storage-location allocator for physical warehouses.
//!
//! Decides which cell of which rack receives stock, in what orientation,
//! and keeps per-cell occupancy consistent under concurrent placement,
//! removal and moves.

pub mod analytics;
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod model;
pub mod orientation;
pub mod topology;
pub mod types;
