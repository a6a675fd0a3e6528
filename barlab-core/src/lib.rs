//! Barlab Core — single-asset, event-driven OHLCV backtest engine.
//!
//! This crate contains the heart of the engine:
//! - Domain types (bars, orders, trades, positions)
//! - Column-oriented bar series with CSV ingest and prefix views
//! - Write-once indicator registry with warm-up tracking
//! - Broker with bracket settlement, next-open fills, and cash accounting
//! - Bar-by-bar event loop with a strategy host (init/next hooks)
//! - End-of-run statistics over the equity curve and trade ledger

pub mod broker;
pub mod data;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod indicators;
pub mod stats;
