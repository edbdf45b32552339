//! Webshop CRM Core - Shared domain types.
//!
//! This crate provides the types shared by every Webshop CRM component:
//! - `server` - REST API and live-session relay
//! - `cli` - Command-line tools for migrations, users and seed data
//!
//! # Architecture
//!
//! The core crate contains only types and pure helpers - no I/O, no database
//! access, no HTTP clients. Database encoding for IDs and enums is available
//! behind the `sqlite` feature.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, validated emails, status enums and money helpers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
