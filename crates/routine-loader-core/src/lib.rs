//! # Routine Loader Core
//!
//! Database-independent logic for loading stored routines from annotated
//! pseudo-SQL sources: placeholder resolution, directive and doc-block
//! parsing, reload decisions, catalog reconciliation, and the database
//! facade trait with an in-memory implementation.
//!
//! This crate contains no sqlx, tokio runtime, or filesystem I/O; the
//! `routine-loader` application supplies the MySQL backend and the files.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`placeholder`] | `@NAME@` / `@TABLE.COLUMN%type@` resolution and magic constants |
//! | [`directives`] | `-- type:`, `-- return:` and `-- param:` comments |
//! | [`signature`] | `create procedure|function <name>` detection |
//! | [`docblock`] | `/** ... */` descriptions and `@param` tags |
//! | [`reload`] | Whether a routine must be reloaded |
//! | [`reconcile`] | Parameters and bulk insert columns from the catalog |
//! | [`assemble`] | The final [`metadata::RoutineMetadata`] record |
//! | [`pipeline`] | One routine, end to end |
//! | [`database`] | [`database::RoutineDatabase`] trait and in-memory backend |

pub mod assemble;
pub mod database;
pub mod directives;
pub mod docblock;
pub mod error;
pub mod metadata;
pub mod models;
pub mod pipeline;
pub mod placeholder;
pub mod reconcile;
pub mod reload;
pub mod signature;
