//! Prelude module for ferret
//!
//! This module re-exports the most commonly used types and traits.
//!
//! ```ignore
//! use ferret::prelude::*;
//! ```

pub use std::sync::Arc;

pub use ferret_macros::Document;
pub use turso::EncryptionOpts;

pub use crate::connection::Builder;
pub use crate::connection::Connection;
pub use crate::connection::Dialect;
pub use crate::document::Component;
pub use crate::document::Document;
pub use crate::error::Error;
pub use crate::error::Result;
pub use crate::error::ValidationError;
pub use crate::executor::Executor;
pub use crate::middleware;
pub use crate::middleware::Middleware;
pub use crate::query::Condition;
pub use crate::query::Order;
pub use crate::record::Record;
pub use crate::relation;
pub use crate::relation::BelongsTo;
pub use crate::relation::HasMany;
pub use crate::relation::HasOne;
pub use crate::schema::Schema;
pub use crate::scope::Model;
pub use crate::scope::Scope;
pub use crate::value::FromValue;
pub use crate::value::IntoValue;
// Re-export optional types
#[cfg(feature = "with-json")]
pub use crate::value::Json;
pub use crate::value::Value;
