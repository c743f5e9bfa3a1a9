//! Fixtures for unit tests: a scripted executor and a few derived documents.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::BelongsTo;
use crate::Component;
use crate::Dialect;
use crate::Document;
use crate::Error;
use crate::Executor;
use crate::HasMany;
use crate::HasOne;
use crate::Metadata;
use crate::Result;
use crate::Value;

#[derive(Debug, Default, Document)]
#[ferret(table = "person", init = "count_init")]
pub(crate) struct Person {
    #[ferret(column, primary_key)]
    pub id:         i64,
    #[ferret(column)]
    pub first_name: String,
    #[ferret(column)]
    pub last_name:  String,
    #[ferret(column, not_null)]
    pub email:      String,
    #[ferret(column)]
    pub place_id:   i64,
    #[ferret(belongs_to = "place")]
    pub place:      BelongsTo<Place>,
    #[ferret(has_many = "person", through = "friends", key = "friended", fk = "friender")]
    pub friends:    HasMany<Person>,
    #[ferret(transient)]
    pub nickname:   String,
    #[ferret(component)]
    pub audit:      Audit,
    pub init_calls: usize,
    pub untracked:  String,
}

impl Person {
    fn count_init(&mut self) {
        self.init_calls += 1;
    }
}

#[derive(Debug, Default, Document)]
#[ferret(table = "place")]
pub(crate) struct Place {
    #[ferret(column, primary_key)]
    pub id:             i64,
    #[ferret(column)]
    pub country:        String,
    #[ferret(column)]
    pub city:           String,
    #[ferret(column)]
    pub telcode:        i64,
    #[ferret(has_many = "person")]
    pub residents:      HasMany<Person>,
    #[ferret(has_one = "person", fk = "place_id")]
    pub first_resident: HasOne<Person>,
}

/// Storage names differ from member names; declared types and defaults
#[derive(Debug, Default, Document)]
#[ferret(table = "account")]
pub(crate) struct Account {
    #[ferret(column = "account_id", primary_key)]
    pub id:     i64,
    #[ferret(column = "display_name", type = "varchar(64)", not_null)]
    pub name:   String,
    #[ferret(column, default = "'active'")]
    pub status: String,
    #[ferret(column, type = "smallint", default = "0")]
    pub level:  u8,
}

/// Outer component; records whether its nested stamp was bound first
#[derive(Debug, Default)]
pub(crate) struct Audit {
    pub bound_table: String,
    pub order:       usize,
    pub stamp:       Stamp,
}

impl Component for Audit {
    fn bind(&mut self, metadata: &Metadata) {
        self.bound_table = metadata.table.clone();
        self.order = self.stamp.order + 1;
    }

    fn components(&mut self) -> Vec<&mut dyn Component> {
        vec![&mut self.stamp]
    }
}

#[derive(Debug, Default)]
pub(crate) struct Stamp {
    pub bound_table: String,
    pub order:       usize,
}

impl Component for Stamp {
    fn bind(&mut self, metadata: &Metadata) {
        self.bound_table = metadata.table.clone();
        self.order = 1;
    }
}

pub(crate) fn person_row(id: i64, first_name: &str, last_name: &str, email: &str, place_id: i64) -> Vec<Value> {
    vec![
        Value::Integer(id),
        Value::Text(first_name.to_string()),
        Value::Text(last_name.to_string()),
        Value::Text(email.to_string()),
        Value::Integer(place_id),
    ]
}

/// Executor answering fetches from a queue and logging every statement
pub(crate) struct StubExecutor {
    dialect:   Dialect,
    affected:  u64,
    last_id:   Mutex<i64>,
    responses: Mutex<VecDeque<Result<Vec<Vec<Value>>>>>,
    log:       Mutex<Vec<(String, Vec<Value>)>>,
}

impl StubExecutor {
    fn build(dialect: Dialect, affected: u64) -> Arc<Self> {
        Arc::new(Self {
            dialect,
            affected,
            last_id: Mutex::new(0),
            responses: Mutex::new(VecDeque::new()),
            log: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn new() -> Arc<Self> {
        Self::build(Dialect::SQLITE, 1)
    }

    pub(crate) fn with_dialect(dialect: Dialect) -> Arc<Self> {
        Self::build(dialect, 1)
    }

    pub(crate) fn with_affected(affected: u64) -> Arc<Self> {
        Self::build(Dialect::SQLITE, affected)
    }

    /// Queue the rows returned by the next unanswered fetch
    pub(crate) fn push_rows(&self, rows: Vec<Vec<Value>>) {
        self.responses.lock().unwrap().push_back(Ok(rows));
    }

    pub(crate) fn fail_next(&self, message: &str) {
        self.responses.lock().unwrap().push_back(Err(Error::Query(message.to_string())));
    }

    pub(crate) fn set_last_insert_id(&self, id: i64) {
        *self.last_id.lock().unwrap() = id;
    }

    pub(crate) fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, sql: &str, params: Vec<Value>) {
        self.log.lock().unwrap().push((sql.to_string(), params));
    }
}

#[async_trait]
impl Executor for StubExecutor {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<u64> {
        self.record(sql, params);
        Ok(self.affected)
    }

    async fn fetch_all(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Vec<Value>>> {
        self.record(sql, params);
        self.responses.lock().unwrap().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn last_insert_id(&self) -> Result<i64> {
        Ok(*self.last_id.lock().unwrap())
    }
}
