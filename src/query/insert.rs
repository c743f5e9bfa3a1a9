use std::fmt;
use std::sync::Arc;

use crate::Condition;
use crate::Document;
use crate::Error;
use crate::IntoValue;
use crate::Record;
use crate::Result;
use crate::Select;
use crate::Value;
use crate::connection::InsertId;
use crate::scope::ModelCore;

/// INSERT builder yielding the stored, re-fetched record
///
/// The new primary key is recovered the way the executor's dialect prescribes
/// (`RETURNING <pk>` or the last inserted row id); the full row is then
/// fetched back by that key, bound and initialized. A record left invalid by
/// initialization is reported as [`Error::Invalid`] even though the row exists.
///
/// # Example
///
/// ```ignore
/// let place = places.insert().value("country", "Italy").value("city", "Rome").exec().await?;
/// ```
pub struct Insert<D> {
    core:    Arc<ModelCore<D>>,
    columns: Vec<String>,
    values:  Vec<Value>,
}

impl<D> Clone for Insert<D> {
    fn clone(&self) -> Self {
        Self { core: self.core.clone(), columns: self.columns.clone(), values: self.values.clone() }
    }
}

impl<D> fmt::Debug for Insert<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Insert")
            .field("table", &self.core.metadata.table)
            .field("columns", &self.columns)
            .field("values", &self.values)
            .finish()
    }
}

impl<D: Document> Insert<D> {
    pub(crate) fn new(core: Arc<ModelCore<D>>) -> Self {
        Self { core, columns: Vec::new(), values: Vec::new() }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>, {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn values(mut self, values: Vec<Value>) -> Self {
        self.values.extend(values);
        self
    }

    pub fn value<V: IntoValue>(mut self, column: &str, value: V) -> Self {
        self.columns.push(column.to_string());
        self.values.push(value.into_value());
        self
    }

    /// Every mapped non-key column of `record`, with its current value
    pub fn record(mut self, record: &Record<D>) -> Result<Self> {
        for field in self.core.metadata.value_fields() {
            self.values.push(record.get(&field.column)?);
            self.columns.push(field.column.clone());
        }
        Ok(self)
    }

    /// Render with `?` placeholders, including the `RETURNING` clause when the
    /// dialect recovers keys that way.
    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        if self.columns.len() != self.values.len() {
            return Err(Error::Query(format!(
                "insert into {} has {} columns but {} values",
                self.core.metadata.table,
                self.columns.len(),
                self.values.len()
            )));
        }

        let metadata = &self.core.metadata;
        let mut sql = if self.columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", metadata.table)
        } else {
            let placeholders: Vec<&str> = self.columns.iter().map(|_| "?").collect();
            format!("INSERT INTO {} ({}) VALUES ({})", metadata.table, self.columns.join(", "), placeholders.join(", "))
        };

        if self.core.executor.dialect().insert_id == InsertId::Returning {
            sql.push_str(&format!(" RETURNING {}", metadata.primary_key));
        }

        Ok((sql, self.values.clone()))
    }

    #[tracing::instrument(skip(self), fields(table = %self.core.metadata.table))]
    pub async fn exec(self) -> Result<Record<D>> {
        let (sql, params) = self.build()?;
        let executor = self.core.executor.clone();
        let dialect = executor.dialect();
        let sql = dialect.rebind(&sql);

        tracing::debug!("Insert SQL: {}", sql);
        tracing::debug!("Insert Params: {:?}", params);

        let id = match dialect.insert_id {
            InsertId::Returning => executor.scan_scalar(&sql, params).await?,
            InsertId::LastInsertId => {
                executor.execute(&sql, params).await?;
                Value::Integer(executor.last_insert_id().await?)
            }
        };

        tracing::debug!("Inserted {} with key {:?}", self.core.metadata.table, id);

        let metadata = &self.core.metadata;
        let record = Select::new(self.core.clone())
            .filter(Condition::eq(&metadata.qualify(&metadata.primary_key), id))
            .exec()
            .await?;

        record.into_valid()
    }
}
