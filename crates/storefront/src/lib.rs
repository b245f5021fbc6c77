//! Canopy storefront library.
//!
//! The JSON API behind the Canopy storefront and back office, packaged as
//! a library so the server binary, the CLI and tests share one codebase.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;
