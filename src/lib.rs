//! # ferret
//!
//! A small active-record ORM for [Turso](https://turso.tech) and other SQL
//! backends reachable through an [`Executor`].
//!
//! ## Features
//!
//! - Derive macro mapping struct members to columns, relations, transient
//!   values and embedded components
//! - Per-table metadata derived once at registration and shared by every record
//! - Composable scopes ("groups") with named sub-scopes and positional access
//! - Select/Insert/Update/Delete builders with joins, grouping and ordering
//! - Middleware pipeline for validation and relation binding
//! - Placeholder and insert-id dialects for SQLite-style and Postgres-style backends
//!
//! ## Quick Start
//!
//! ```ignore
//! use ferret::prelude::*;
//!
//! #[derive(Debug, Default, Document)]
//! #[ferret(table = "person")]
//! pub struct Person {
//!     #[ferret(column, primary_key)]
//!     pub id: i64,
//!     #[ferret(column, not_null)]
//!     pub email: String,
//!     #[ferret(column)]
//!     pub place_id: i64,
//!     #[ferret(belongs_to = "place")]
//!     pub place: BelongsTo<Place>,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let db = Builder::new_local(":memory:").build().await?;
//!     let conn: Arc<dyn Executor> = Arc::new(db.connect()?);
//!
//!     let places = Model::<Place>::new(conn.clone())?;
//!     let people = Model::<Person>::new(conn)?;
//!     people.use_middleware(middleware::presence_of("email"));
//!     people.use_middleware(relation::belongs_to(&places));
//!
//!     let mut person = people.find(1).await?;
//!     person.email = "john@doe.com".to_string();
//!     person.save().await?;
//!
//!     let place = person.place.get(&person).await?;
//!     let adults = people.create_group("adults", Condition::gte("age", 18));
//!     let oldest = adults.order("age DESC").first().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Document Attributes
//!
//! The `#[ferret(...)]` attribute supports:
//!
//! - `table = "..."` - Table name (default: struct name in snake_case)
//! - `init = "method"` - Custom initialization hook
//! - `column` / `column = "..."` - Map a member to a column
//! - `type = "..."`, `default = "..."`, `not_null`, `primary_key` - Column details
//! - `belongs_to`, `has_many`, `has_one` with optional `fk`, `key`, `through`
//! - `transient` - Reachable through `get`/`set` but never stored
//! - `component` - Embedded sub-object bound before the init hook

extern crate self as ferret;

pub mod connection;
pub mod document;
pub mod error;
pub mod executor;
pub mod metadata;
pub mod middleware;
pub mod prelude;
pub mod query;
pub mod record;
pub mod relation;
pub mod schema;
pub mod scope;
pub mod value;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use connection::Builder;
pub use connection::Connection;
pub use connection::Database;
pub use connection::Dialect;
pub use connection::InsertId;
pub use connection::Placeholder;
pub use document::Component;
pub use document::Document;
pub use error::Error;
pub use error::Result;
pub use error::ValidationError;
pub use executor::Executor;
// Re-export the derive macro
pub use ferret_macros::Document;
pub use metadata::Metadata;
pub use middleware::Middleware;
pub use query::Condition;
pub use query::Delete;
pub use query::Insert;
pub use query::Join;
pub use query::JoinKind;
pub use query::Order;
pub use query::Select;
pub use query::SelectMany;
pub use query::SelectQuery;
pub use query::Update;
pub use record::Record;
pub use relation::BelongsTo;
pub use relation::HasMany;
pub use relation::HasOne;
pub use schema::Schema;
pub use scope::Model;
pub use scope::Scope;
pub use scope::WeakModel;
pub use value::ColumnType;
pub use value::FromValue;
pub use value::IntoValue;
// Re-export optional types
#[cfg(feature = "with-json")]
pub use value::Json;
pub use value::Value;
