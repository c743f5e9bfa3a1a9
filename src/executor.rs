//! The storage seam every model talks through.

use async_trait::async_trait;

use crate::Dialect;
use crate::Error;
use crate::Result;
use crate::Value;

/// A database handle able to run parameterized SQL
///
/// Statements arrive with `?` placeholders already rewritten for
/// [`dialect`](Executor::dialect). Rows come back as plain value vectors in
/// select-list order.
#[async_trait]
pub trait Executor: Send + Sync + 'static {
    fn dialect(&self) -> Dialect;

    /// Run a statement that returns no rows; yields the affected row count
    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64>;

    async fn fetch_all(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Vec<Value>>>;

    /// First row of the result set, or [`Error::NotFound`]
    async fn fetch_one(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Value>> {
        self.fetch_all(sql, params).await?.into_iter().next().ok_or(Error::NotFound)
    }

    /// First column of the first row
    async fn scan_scalar(&self, sql: &str, params: Vec<Value>) -> Result<Value> {
        self.fetch_one(sql, params).await?.into_iter().next().ok_or(Error::NotFound)
    }

    /// Row id produced by the most recent INSERT on this handle
    async fn last_insert_id(&self) -> Result<i64>;
}
