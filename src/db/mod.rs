//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Lazily created, shared connection pool
//! - Query execution with row caps and timeouts
//! - Type mappings from driver rows to JSON
//! - Connection keep-alive task

pub mod executor;
pub mod keepalive;
pub mod pool;
pub mod types;

pub use executor::QueryExecutor;
pub use keepalive::{
    BreakerState, CircuitBreaker, ConnectionKeeper, DatabaseProbe, HealthProbe, KeeperConfig,
    KeeperStatus,
};
pub use pool::{DatabaseAccessor, DbPool};
