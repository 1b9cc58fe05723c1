//! # btreedb
//!
//! A benchmark-facing CRUD adapter over an ordered key-value engine:
//! - Compact binary row format with full and field-filtered decoding
//! - Read / Scan / Update / Insert / Delete mapped onto Get / Put / Seek
//! - One reference-counted engine handle shared by every worker
//! - Durable ordered engine (WAL + checkpoint snapshots)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Benchmark Harness (workers)                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  Db trait (via DbFactory "btreedb")
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │              BTreeDb adapter (one per worker)                │
//! │                 encode / decode rows                         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  get / put / seek (no adapter locking)
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │     SharedEngine: Arc<KvTable>, opened once, ref-counted     │
//! └─────────────────────┬───────────────────────────────────────┘
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  MemTable   │
//!   │  (Append)   │          │  (RwLock)   │
//!   └─────────────┘          └──────┬──────┘
//!                                   ▼
//!                           ┌─────────────┐
//!                           │  Snapshot   │
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod row;
pub mod engine;
pub mod shared;
pub mod db;
pub mod adapter;
pub mod factory;
pub mod measurements;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use adapter::BTreeDb;
pub use config::{Config, Properties};
pub use db::{Db, Status};
pub use engine::{KvEngine, KvTable};
pub use error::{BTreeDbError, Result};
pub use factory::{DbFactory, BTREE_DB_NAME};
pub use row::{Field, Row};
pub use shared::SharedEngine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of btreedb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
