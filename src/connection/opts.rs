use std::time::Duration;

use super::dialect::Dialect;

/// Settings shared by a [`Database`](super::Database) and every connection it opens
#[derive(Debug, Clone)]
pub struct DatabaseOpts {
    pub(crate) path:         String,
    pub(crate) mvcc:         bool,
    pub(crate) encryption:   bool,
    pub(crate) dialect:      Dialect,
    /// Applied to each new connection when set
    pub(crate) busy_timeout: Option<Duration>,
}

impl DatabaseOpts {
    pub(crate) fn local(path: &str) -> Self {
        Self { path: path.to_string(), mvcc: false, encryption: false, dialect: Dialect::SQLITE, busy_timeout: None }
    }
}
