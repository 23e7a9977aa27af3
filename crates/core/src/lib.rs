//! Patron Core Library
//!
//! Models, profile merge engine, VIP classification, configuration, and
//! persistent storage for the Patron identity & entitlement engine.

pub mod config;
pub mod error;
pub mod merge;
pub mod models;
pub mod storage;
pub mod vip;

pub use config::{ConfigError, EngineConfig};
pub use error::{Error, Result};
pub use models::*;
pub use storage::{Database, ExtrasStore, KvStore, PreferencesStore, SessionStore};
