//! # Puck Data
//!
//! The data engine behind a hockey statistics API: teams, arenas, the games
//! played between them and the players' statistics in each game.
//!
//! ## Features
//!
//! - **Filtered listings**: whitelisted filters (equality, prefix, lower
//!   bound, range), sorting and optional pagination, parsed from raw query
//!   parameters and compiled to parameterized SQL
//! - **Validated batch writes**: declarative per-field rules, including store
//!   lookups for existence and uniqueness, checked over a whole batch before
//!   anything is written
//! - **All-or-nothing**: a valid batch is applied in one transaction
//! - **Pluggable storage**: in-memory, MySQL and SQLite backends
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use puck::prelude::*;
//! use std::collections::HashMap;
//!
//! let store = Arc::new(InMemoryStore::new());
//! let teams: ResourceService<Team, InMemoryStore> = ResourceService::new(store);
//!
//! let created = teams
//!     .create(vec![json!({
//!         "team_name": "Halifax Harbour Hawks",
//!         "abbreviation": "HHH",
//!         "founding_year": 1994,
//!         "championships": 2,
//!         "general_manager": "R. Doyle"
//!     })])
//!     .await?;
//! assert!(created.is_success());
//!
//! let params = HashMap::from([("team_name".to_string(), "Hal".to_string())]);
//! let page = teams.list(&params).await?;
//! ```

pub mod config;
pub mod core;
pub mod resources;
pub mod server;
pub mod storage;
pub mod telemetry;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        error::{EngineError, FailureKind, StoreError},
        field::{FieldKind, FieldValue},
        outcome::OperationResult,
        paginator::{Nested, PageMeta, PageSpec, Paginated, Paginator},
        query::{FilterSpec, ListQuery, Predicate, QueryConfig, SortDirection, SortSpec},
        query_builder::QueryBuilder,
        repository::{Applied, Change, Lookup, Repository, Write},
        resource::{Resource, TableRef},
        service::ResourceService,
        validation::{BatchOutcome, BatchValidator, Rule, RuleSet, ValidationEngine},
    };

    // === Resources ===
    pub use crate::resources::{Arena, Game, Player, Statistic, Team};

    // === Storage ===
    #[cfg(feature = "in-memory")]
    pub use crate::storage::InMemoryStore;
    #[cfg(feature = "mysql")]
    pub use crate::storage::MysqlStore;
    #[cfg(feature = "sqlite")]
    pub use crate::storage::SqliteStore;
    pub use crate::storage::{Store, open_store};

    // === Config ===
    pub use crate::config::{AppConfig, LoggingConfig, ServerConfig, StoreBackend, StoreConfig};

    // === Server ===
    pub use crate::server::{AppState, build_router, serve};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{Value, json};
    pub use std::sync::Arc;
}
