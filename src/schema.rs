//! DDL rendered from a registration's metadata

use crate::Document;
use crate::Metadata;
use crate::Model;
use crate::Result;
use crate::Value;

/// Schema helper for creating and dropping the table behind a model
///
/// Column types come from each field's type tag (declared or inferred), so a
/// table created here round-trips through the same registration.
///
/// # Example
///
/// ```ignore
/// let people = Model::<Person>::new(Arc::new(conn))?;
/// Schema::create_table(&people, true).await?;
/// ```
pub struct Schema;

impl Schema {
    #[tracing::instrument(skip(model), fields(table = %model.metadata().table))]
    pub async fn create_table<D: Document>(model: &Model<D>, if_not_exists: bool) -> Result<()> {
        let sql = Self::create_table_sql(model.metadata(), if_not_exists);
        tracing::trace!("SQL: {}", sql);
        model.executor().execute(&sql, Vec::new()).await?;
        Ok(())
    }

    /// Generate the CREATE TABLE statement for `metadata`
    pub fn create_table_sql(metadata: &Metadata, if_not_exists: bool) -> String {
        let exists_clause = if if_not_exists { "IF NOT EXISTS " } else { "" };

        let column_defs: Vec<String> = metadata
            .fields
            .iter()
            .map(|field| {
                let mut def = format!("{} {}", field.column, field.type_name);

                if field.primary_key {
                    def.push_str(" PRIMARY KEY");
                } else if field.not_null {
                    def.push_str(" NOT NULL");
                }

                if let Some(default) = &field.default {
                    def.push_str(&format!(" DEFAULT {}", default));
                }

                def
            })
            .collect();

        format!("CREATE TABLE {}{} (\n  {}\n)", exists_clause, metadata.table, column_defs.join(",\n  "))
    }

    #[tracing::instrument(skip(model), fields(table = %model.metadata().table))]
    pub async fn drop_table<D: Document>(model: &Model<D>, if_exists: bool) -> Result<()> {
        let sql = Self::drop_table_sql(model.metadata(), if_exists);
        tracing::trace!("SQL: {}", sql);
        model.executor().execute(&sql, Vec::new()).await?;
        Ok(())
    }

    pub fn drop_table_sql(metadata: &Metadata, if_exists: bool) -> String {
        let exists_clause = if if_exists { "IF EXISTS " } else { "" };
        format!("DROP TABLE {}{}", exists_clause, metadata.table)
    }

    /// Whether the model's table exists, per `sqlite_master`
    pub async fn table_exists<D: Document>(model: &Model<D>) -> Result<bool> {
        let executor = model.executor();
        let sql = executor.dialect().rebind("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?");

        let count = executor.scan_scalar(&sql, vec![Value::Text(model.metadata().table.clone())]).await?;
        Ok(matches!(count, Value::Integer(n) if n > 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Account;
    use crate::testing::Person;
    use crate::testing::Place;
    use crate::testing::StubExecutor;

    #[test]
    fn test_create_table_sql() {
        let metadata = Metadata::derive::<Person>("person").unwrap();
        let sql = Schema::create_table_sql(&metadata, false);

        assert_eq!(
            sql,
            "CREATE TABLE person (\n  id integer PRIMARY KEY,\n  first_name text,\n  last_name text,\n  email text NOT \
             NULL,\n  place_id integer\n)"
        );
    }

    #[test]
    fn test_create_table_sql_if_not_exists() {
        let metadata = Metadata::derive::<Place>("place").unwrap();
        let sql = Schema::create_table_sql(&metadata, true);

        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS place ("));
        assert!(sql.contains("telcode integer"));
        assert!(!sql.contains("residents"));
    }

    #[test]
    fn test_create_table_sql_uses_registered_table() {
        let metadata = Metadata::derive::<Person>("people").unwrap();
        assert!(Schema::create_table_sql(&metadata, false).starts_with("CREATE TABLE people ("));
    }

    #[test]
    fn test_create_table_sql_renamed_typed_and_defaulted_columns() {
        let metadata = Metadata::derive::<Account>("account").unwrap();

        assert_eq!(
            Schema::create_table_sql(&metadata, false),
            "CREATE TABLE account (\n  account_id integer PRIMARY KEY,\n  display_name varchar(64) NOT NULL,\n  status \
             text DEFAULT 'active',\n  level smallint DEFAULT 0\n)"
        );
    }

    #[test]
    fn test_drop_table_sql() {
        let metadata = Metadata::derive::<Place>("place").unwrap();
        assert_eq!(Schema::drop_table_sql(&metadata, false), "DROP TABLE place");
        assert_eq!(Schema::drop_table_sql(&metadata, true), "DROP TABLE IF EXISTS place");
    }

    #[tokio::test]
    async fn test_create_and_drop_through_executor() {
        let stub = StubExecutor::new();
        let places = Model::<Place>::new(stub.clone()).unwrap();

        Schema::create_table(&places, true).await.unwrap();
        Schema::drop_table(&places, true).await.unwrap();

        let statements = stub.statements();
        assert!(statements[0].0.starts_with("CREATE TABLE IF NOT EXISTS place"));
        assert_eq!(statements[1].0, "DROP TABLE IF EXISTS place");
    }

    #[tokio::test]
    async fn test_table_exists() {
        let stub = StubExecutor::new();
        stub.push_rows(vec![vec![Value::Integer(1)]]);
        let places = Model::<Place>::new(stub.clone()).unwrap();

        assert!(Schema::table_exists(&places).await.unwrap());
        assert_eq!(stub.statements()[0].1, vec![Value::Text("place".to_string())]);
    }
}
