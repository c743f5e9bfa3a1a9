//! DELETE query builder

use crate::Condition;
use crate::Executor;
use crate::Result;
use crate::Value;

/// DELETE query builder for removing rows from a table
///
/// Without any filters, it will delete all rows (use with caution!).
///
/// # Example
///
/// ```ignore
/// Delete::new("friends")
///     .filter(Condition::eq("friender", 1))
///     .exec(&conn)
///     .await?;
/// ```
#[derive(Clone, Debug)]
pub struct Delete {
    table:      String,
    conditions: Vec<Condition>,
}

impl Delete {
    pub fn new(table: &str) -> Self {
        Self { table: table.to_string(), conditions: Vec::new() }
    }

    /// Add a filter condition
    pub fn filter(mut self, condition: Condition) -> Self {
        if !condition.is_empty() {
            self.conditions.push(condition);
        }
        self
    }

    /// Build the SQL query and parameters
    pub fn build(&self) -> (String, Vec<Value>) {
        let mut sql = format!("DELETE FROM {}", self.table);
        let mut params = Vec::new();

        if !self.conditions.is_empty() {
            let where_parts: Vec<String> = self.conditions.iter().map(|c| format!("({})", c.sql())).collect();
            sql.push_str(" WHERE ");
            sql.push_str(&where_parts.join(" AND "));

            for condition in &self.conditions {
                params.extend(condition.values().iter().cloned());
            }
        }

        (sql, params)
    }

    /// Execute the delete and return the number of rows affected
    pub async fn exec(self, executor: &dyn Executor) -> Result<u64> {
        let (sql, params) = self.build();
        executor.execute(&executor.dialect().rebind(&sql), params).await
    }
}
