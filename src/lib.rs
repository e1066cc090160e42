//! # Routine Loader
//!
//! Loads MySQL stored routines from annotated pseudo-SQL sources and records
//! their metadata for a wrapper-code generator.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌──────────┐
//! │  *.psql     │──▶│  Load pipeline   │──▶│  MySQL   │
//! │  sources    │   │ (core crate)     │◀──│ catalog  │
//! └─────────────┘   └────────┬─────────┘   └──────────┘
//!                            ▼
//!                   ┌──────────────────┐
//!                   │ routines.json    │
//!                   │ (metadata store) │
//!                   └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | MySQL connection |
//! | [`mysql`] | MySQL implementation of the database facade |
//! | [`placeholders`] | Placeholder map from config constants and column types |
//! | [`metadata_store`] | JSON metadata file |
//! | [`source`] | Source discovery and reading |
//! | [`loader`] | Batch orchestration |

pub mod config;
pub mod db;
pub mod loader;
pub mod metadata_store;
pub mod mysql;
pub mod placeholders;
pub mod source;
