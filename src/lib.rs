//! Basecoin - block lifecycle adapter between a consensus engine and an
//! application transaction handler
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Lifecycle
//! - [`lifecycle`] - Height, phase and block sequencing
//! - [`chain_identity`] - Chain id bound before genesis
//! - [`validators`] - Validator power changes per block
//!
//! ## Transactions
//! - [`transaction`] - Envelope and wire codec
//! - [`handler`] - Handler trait and call context
//! - [`dispatcher`] - Check/deliver routing
//! - [`kvstore`] - Demo key/value handler
//!
//! ## State
//! - [`store`] - Committed, check and append views
//! - [`persistence`] - Database layer (SQLite)
//! - [`query`] - Read-only query gateway
//!
//! ## Protocol
//! - [`abci`] - Requests, responses and the application trait
//! - [`app`] - The composed application
//! - [`connection`] - Consensus and mempool connections
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Lifecycle
// ============================================================================
pub mod chain_identity;
pub mod lifecycle;
pub mod validators;

// ============================================================================
// Transactions
// ============================================================================
pub mod dispatcher;
pub mod handler;
pub mod kvstore;
pub mod transaction;

// ============================================================================
// State
// ============================================================================
pub mod persistence;
pub mod query;
pub mod store;

// ============================================================================
// Protocol
// ============================================================================
pub mod abci;
pub mod app;
pub mod connection;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
