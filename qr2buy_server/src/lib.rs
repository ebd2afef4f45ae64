//! # qr2buy server
//! This module hosts the HTTP surface of the qr2buy display server. It is responsible for:
//! * Receiving payment confirmations from Stripe (webhook push path) and from returning buyers (verify pull path).
//! * Serving the config poll that physical displays fall back to.
//! * Fanning live state changes out to connected displays and dashboards over SSE and WebSocket.
//! * The credential-gated admin surface for catalog management and manual corrections.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
pub mod auth;
pub mod cli;
pub mod config;
pub mod errors;

pub mod broadcast;
pub mod data_objects;
pub mod middleware;
pub mod routes;
pub mod server;

pub mod admin_routes;
pub mod checkout_routes;
pub mod integrations;
pub mod stripe_routes;

#[cfg(test)]
mod endpoint_tests;
