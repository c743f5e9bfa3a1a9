use crate::Condition;
use crate::Document;
use crate::Error;
use crate::Executor;
use crate::IntoValue;
use crate::Record;
use crate::Result;
use crate::Value;

/// UPDATE builder over a table
///
/// # Example
///
/// ```ignore
/// Update::new("person")
///     .set("place_id", 2)
///     .filter(Condition::eq("place_id", 1))
///     .exec(&conn)
///     .await?;
/// ```
#[derive(Clone, Debug)]
pub struct Update {
    table:      String,
    sets:       Vec<(String, Value)>,
    conditions: Vec<Condition>,
}

impl Update {
    pub fn new(table: &str) -> Self {
        Self { table: table.to_string(), sets: Vec::new(), conditions: Vec::new() }
    }

    /// Every mapped non-key column of `record`, keyed by its primary key
    pub fn record<D: Document>(record: &Record<D>) -> Result<Self> {
        let metadata = record.metadata();
        let mut update = Self::new(&metadata.table);

        for field in metadata.value_fields() {
            update = update.set(&field.column, record.get(&field.column)?);
        }

        Ok(update.filter(Condition::eq(&metadata.primary_key, record.primary_key_value()?)))
    }

    pub fn set<V: IntoValue>(mut self, column: &str, value: V) -> Self {
        self.sets.push((column.to_string(), value.into_value()));
        self
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        if !condition.is_empty() {
            self.conditions.push(condition);
        }
        self
    }

    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        if self.sets.is_empty() {
            return Err(Error::Query("No columns to update".to_string()));
        }

        let set_parts: Vec<String> = self.sets.iter().map(|(column, _)| format!("{} = ?", column)).collect();
        let mut params: Vec<Value> = self.sets.iter().map(|(_, value)| value.clone()).collect();
        let mut sql = format!("UPDATE {} SET {}", self.table, set_parts.join(", "));

        if !self.conditions.is_empty() {
            let where_parts: Vec<String> = self.conditions.iter().map(|c| format!("({})", c.sql())).collect();
            sql.push_str(" WHERE ");
            sql.push_str(&where_parts.join(" AND "));

            for condition in &self.conditions {
                params.extend(condition.values().iter().cloned());
            }
        }

        Ok((sql, params))
    }

    pub async fn exec(self, executor: &dyn Executor) -> Result<u64> {
        let (sql, params) = self.build()?;
        executor.execute(&executor.dialect().rebind(&sql), params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Dialect;
    use crate::testing::StubExecutor;

    #[test]
    fn test_update_build() {
        let (sql, params) = Update::new("person")
            .set("email", "jd@doe.com")
            .set("place_id", 2)
            .filter(Condition::eq("id", 1))
            .build()
            .unwrap();

        assert_eq!(sql, "UPDATE person SET email = ?, place_id = ? WHERE (id = ?)");
        assert_eq!(params, vec![Value::Text("jd@doe.com".to_string()), Value::Integer(2), Value::Integer(1)]);
    }

    #[test]
    fn test_update_without_filter_touches_every_row() {
        let (sql, _) = Update::new("place").set("telcode", 39).build().unwrap();
        assert_eq!(sql, "UPDATE place SET telcode = ?");
    }

    #[test]
    fn test_update_requires_sets() {
        let result = Update::new("person").filter(Condition::eq("id", 1)).build();
        assert!(matches!(result, Err(Error::Query(_))));
    }

    #[tokio::test]
    async fn test_update_exec_rebinds_placeholders() {
        let stub = StubExecutor::with_dialect(Dialect::POSTGRES);
        let affected = Update::new("person").set("email", "x@y.z").filter(Condition::eq("id", 4)).exec(stub.as_ref()).await.unwrap();

        assert_eq!(affected, 1);
        assert_eq!(stub.statements()[0].0, "UPDATE person SET email = $1 WHERE (id = $2)");
    }
}
