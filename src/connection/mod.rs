pub(crate) mod builder;
pub(crate) mod database;
pub(crate) mod dialect;
pub(crate) mod opts;

use async_trait::async_trait;
pub use builder::Builder;
pub use database::Database;
pub use dialect::Dialect;
pub use dialect::InsertId;
pub use dialect::Placeholder;

use crate::Executor;
use crate::Value;

pub(self) type ConnectionResult<T> = std::result::Result<T, turso::Error>;

#[derive(Debug, Clone)]
pub struct Connection {
    inner: turso::Connection,
    opts:  opts::DatabaseOpts,
}

impl Connection {
    fn new(inner: turso::Connection, opts: opts::DatabaseOpts) -> Self {
        Self { inner, opts }
    }

    pub fn is_mvcc_enabled(&self) -> bool {
        self.opts.mvcc
    }

    pub fn is_encryption_enabled(&self) -> bool {
        self.opts.encryption
    }

    pub fn path(&self) -> &str {
        self.opts.path.as_str()
    }

    pub async fn query(&self, sql: &str, params: impl turso::IntoParams) -> turso::Result<turso::Rows> {
        self.inner.query(sql, params).await
    }

    pub async fn execute(&self, sql: &str, params: impl turso::IntoParams) -> turso::Result<u64> {
        self.inner.execute(sql, params).await
    }

    pub async fn execute_batch(&self, sql: &str) -> turso::Result<()> {
        self.inner.execute_batch(sql).await
    }

    pub fn last_insert_rowid(&self) -> i64 {
        self.inner.last_insert_rowid()
    }

    pub fn busy_timeout(&self, duration: std::time::Duration) -> turso::Result<()> {
        self.inner.busy_timeout(duration)
    }
}

#[async_trait]
impl Executor for Connection {
    fn dialect(&self) -> Dialect {
        self.opts.dialect
    }

    async fn execute(&self, sql: &str, params: Vec<Value>) -> crate::Result<u64> {
        tracing::trace!("SQL: {}", sql);
        tracing::trace!("Params: {:?}", params);

        Ok(self.inner.execute(sql, params).await?)
    }

    async fn fetch_all(&self, sql: &str, params: Vec<Value>) -> crate::Result<Vec<Vec<Value>>> {
        tracing::trace!("SQL: {}", sql);
        tracing::trace!("Params: {:?}", params);

        let mut rows = self.inner.query(sql, params).await?;
        let mut results = Vec::new();

        while let Some(row) = rows.next().await? {
            let mut values = Vec::with_capacity(row.column_count());
            for i in 0..row.column_count() {
                values.push(row.get_value(i)?);
            }
            results.push(values);
        }

        tracing::trace!("Rows: {}", results.len());
        Ok(results)
    }

    async fn fetch_one(&self, sql: &str, params: Vec<Value>) -> crate::Result<Vec<Value>> {
        tracing::trace!("SQL: {}", sql);
        tracing::trace!("Params: {:?}", params);

        let mut rows = self.inner.query(sql, params).await?;
        let row = rows.next().await?.ok_or(crate::Error::NotFound)?;

        let mut values = Vec::with_capacity(row.column_count());
        for i in 0..row.column_count() {
            values.push(row.get_value(i)?);
        }

        Ok(values)
    }

    async fn last_insert_id(&self) -> crate::Result<i64> {
        Ok(self.inner.last_insert_rowid())
    }
}
