use super::Connection;
use super::ConnectionResult;
use super::opts::DatabaseOpts;

/// An opened database; hand out connections with [`Database::connect`]
#[derive(Clone)]
pub struct Database {
    db:   turso::Database,
    opts: DatabaseOpts,
}

impl Database {
    pub(super) fn new(db: turso::Database, opts: DatabaseOpts) -> Self {
        Self { db, opts }
    }

    pub fn connect(&self) -> ConnectionResult<Connection> {
        let conn = Connection::new(self.db.connect()?, self.opts.clone());
        if let Some(timeout) = self.opts.busy_timeout {
            conn.busy_timeout(timeout)?;
        }

        tracing::debug!("Connected to {}", self.opts.path);
        Ok(conn)
    }
}
