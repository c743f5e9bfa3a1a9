use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::Condition;
use crate::Document;
use crate::Order;
use crate::Record;
use crate::Result;
use crate::Value;
use crate::connection::Placeholder;
use crate::scope::ModelCore;

/// Marker for a query expecting a single row
#[derive(Clone, Copy, Debug)]
pub struct One;

/// Marker for a query returning every matching row
#[derive(Clone, Copy, Debug)]
pub struct Many;

/// SELECT that binds exactly one record; zero rows is [`Error::NotFound`](crate::Error::NotFound)
pub type Select<D> = SelectQuery<D, One>;

/// SELECT that binds every matching row; zero rows is an empty result
pub type SelectMany<D> = SelectQuery<D, Many>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinKind::Inner => write!(f, "INNER JOIN"),
            JoinKind::Left => write!(f, "LEFT JOIN"),
            JoinKind::Right => write!(f, "RIGHT JOIN"),
            JoinKind::Cross => write!(f, "CROSS JOIN"),
        }
    }
}

/// A joined table and its join predicate
#[derive(Clone, Debug, PartialEq)]
pub struct Join {
    pub kind:  JoinKind,
    pub table: String,
    pub on:    Condition,
}

impl Join {
    pub fn new(kind: JoinKind, table: impl Into<String>, on: Condition) -> Self {
        Self { kind, table: table.into(), on }
    }

    fn render(&self) -> String {
        if self.on.is_empty() {
            format!("{} {}", self.kind, self.table)
        } else {
            format!("{} {} ON {}", self.kind, self.table, self.on.sql())
        }
    }
}

#[derive(Clone, Debug, Default)]
struct SelectState {
    distinct:   bool,
    extra:      Vec<Condition>,
    joins:      Vec<Join>,
    conditions: Vec<Condition>,
    group_by:   Vec<String>,
    having:     Vec<Condition>,
    order_by:   Vec<Condition>,
    limit:      Option<usize>,
    offset:     Option<usize>,
}

/// SELECT builder over a model's table
///
/// Mapped columns are always selected first, qualified with the table name, so
/// joins never make them ambiguous. Every chain step consumes and returns the
/// builder; clone it to reuse a half-built query as a template.
///
/// # Example
///
/// ```ignore
/// let people = persons
///     .all()
///     .filter(Condition::eq("person.place_id", 1))
///     .order_by_desc("person.id")
///     .limit(10)
///     .exec()
///     .await?;
/// ```
pub struct SelectQuery<D, K> {
    core:  Arc<ModelCore<D>>,
    state: SelectState,
    _kind: PhantomData<K>,
}

impl<D, K> Clone for SelectQuery<D, K> {
    fn clone(&self) -> Self {
        Self { core: self.core.clone(), state: self.state.clone(), _kind: PhantomData }
    }
}

impl<D, K> fmt::Debug for SelectQuery<D, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectQuery").field("table", &self.core.metadata.table).field("state", &self.state).finish()
    }
}

impl<D: Document, K> SelectQuery<D, K> {
    pub(crate) fn new(core: Arc<ModelCore<D>>) -> Self {
        Self { core, state: SelectState::default(), _kind: PhantomData }
    }

    fn retype<T>(self) -> SelectQuery<D, T> {
        SelectQuery { core: self.core, state: self.state, _kind: PhantomData }
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        if !condition.is_empty() {
            self.state.conditions.push(condition);
        }
        self
    }

    /// Select an extra expression after the mapped columns
    pub fn column(mut self, expression: impl Into<String>, values: Vec<Value>) -> Self {
        self.state.extra.push(Condition::raw(expression, values));
        self
    }

    pub fn columns<I, S>(mut self, expressions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>, {
        self.state.extra.extend(expressions.into_iter().map(|e| Condition::raw(e, Vec::new())));
        self
    }

    pub fn distinct(mut self) -> Self {
        self.state.distinct = true;
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.state.joins.push(join);
        self
    }

    pub fn inner_join(self, table: &str, on: &str) -> Self {
        self.join(Join::new(JoinKind::Inner, table, Condition::raw(on, Vec::new())))
    }

    pub fn inner_join_with(self, table: &str, on: Condition) -> Self {
        self.join(Join::new(JoinKind::Inner, table, on))
    }

    pub fn left_join(self, table: &str, on: &str) -> Self {
        self.join(Join::new(JoinKind::Left, table, Condition::raw(on, Vec::new())))
    }

    pub fn left_join_with(self, table: &str, on: Condition) -> Self {
        self.join(Join::new(JoinKind::Left, table, on))
    }

    pub fn right_join(self, table: &str, on: &str) -> Self {
        self.join(Join::new(JoinKind::Right, table, Condition::raw(on, Vec::new())))
    }

    pub fn right_join_with(self, table: &str, on: Condition) -> Self {
        self.join(Join::new(JoinKind::Right, table, on))
    }

    pub fn cross_join(self, table: &str) -> Self {
        self.join(Join::new(JoinKind::Cross, table, Condition::empty()))
    }

    pub fn group_by(mut self, expression: impl Into<String>) -> Self {
        self.state.group_by.push(expression.into());
        self
    }

    pub fn having(mut self, condition: Condition) -> Self {
        if !condition.is_empty() {
            self.state.having.push(condition);
        }
        self
    }

    pub fn order_by(mut self, column: &str, direction: Order) -> Self {
        self.state.order_by.push(Condition::raw(format!("{} {}", column, direction), Vec::new()));
        self
    }

    pub fn order_by_asc(self, column: &str) -> Self {
        self.order_by(column, Order::Asc)
    }

    pub fn order_by_desc(self, column: &str) -> Self {
        self.order_by(column, Order::Desc)
    }

    /// Order by a free-form expression, e.g. `"person.id DESC"`
    pub fn order_by_expression(mut self, expression: impl Into<String>, values: Vec<Value>) -> Self {
        let expression = expression.into();
        if !expression.is_empty() {
            self.state.order_by.push(Condition::raw(expression, values));
        }
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.state.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.state.offset = Some(offset);
        self
    }

    fn from_clause(&self, sql: &mut String, params: &mut Vec<Value>) {
        sql.push_str(" FROM ");
        sql.push_str(&self.core.metadata.table);

        for join in &self.state.joins {
            sql.push(' ');
            sql.push_str(&join.render());
            params.extend(join.on.values().iter().cloned());
        }

        push_conditions(sql, params, " WHERE ", &self.state.conditions);
    }

    /// Render with `?` placeholders; the executor's dialect rebinds them.
    pub fn build(&self) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut columns = self.core.metadata.qualified_columns();
        for extra in &self.state.extra {
            columns.push(extra.sql().to_string());
            params.extend(extra.values().iter().cloned());
        }

        let mut sql = String::from("SELECT ");
        if self.state.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&columns.join(", "));

        self.from_clause(&mut sql, &mut params);

        if !self.state.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.state.group_by.join(", "));
        }

        push_conditions(&mut sql, &mut params, " HAVING ", &self.state.having);

        if !self.state.order_by.is_empty() {
            let order_parts: Vec<&str> = self.state.order_by.iter().map(|o| o.sql()).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_parts.join(", "));
            for order in &self.state.order_by {
                params.extend(order.values().iter().cloned());
            }
        }

        match (self.state.limit, self.state.offset) {
            (Some(limit), _) => sql.push_str(&format!(" LIMIT {}", limit)),
            (None, Some(_)) if self.core.executor.dialect().placeholder == Placeholder::Question => {
                sql.push_str(" LIMIT -1")
            }
            _ => {}
        }

        if let Some(offset) = self.state.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        (sql, params)
    }

    /// `SELECT COUNT(*)` over the same tables and filters.
    ///
    /// With distinct, grouping, having, limit or offset set, the whole query is
    /// counted as a subquery so those clauses still shape the result.
    pub fn count_sql(&self) -> (String, Vec<Value>) {
        let state = &self.state;
        let shaped = state.distinct
            || !state.group_by.is_empty()
            || !state.having.is_empty()
            || state.limit.is_some()
            || state.offset.is_some();

        if shaped {
            let (inner, params) = self.build();
            return (format!("SELECT COUNT(*) FROM ({}) AS counted", inner), params);
        }

        let mut sql = String::from("SELECT COUNT(*)");
        let mut params = Vec::new();
        self.from_clause(&mut sql, &mut params);
        (sql, params)
    }

    #[tracing::instrument(skip(self), fields(table = %self.core.metadata.table))]
    pub async fn count(self) -> Result<i64> {
        let (sql, params) = self.count_sql();
        let executor = &self.core.executor;
        let value = executor.scan_scalar(&executor.dialect().rebind(&sql), params).await?;
        match value {
            Value::Integer(count) => Ok(count),
            _ => Ok(0),
        }
    }

    async fn fetch(&self, one: bool) -> Result<Vec<Vec<Value>>> {
        let (sql, params) = self.build();
        let executor = &self.core.executor;
        let sql = executor.dialect().rebind(&sql);

        if one { Ok(vec![executor.fetch_one(&sql, params).await?]) } else { executor.fetch_all(&sql, params).await }
    }
}

impl<D: Document> SelectQuery<D, One> {
    pub fn many(self) -> SelectMany<D> {
        self.retype()
    }

    /// Fetch, bind and initialize the first matching row
    #[tracing::instrument(skip(self), fields(table = %self.core.metadata.table))]
    pub async fn exec(self) -> Result<Record<D>> {
        let row = self.fetch(true).await?.into_iter().next().ok_or(crate::Error::NotFound)?;
        let mut record = Record::from_row(self.core.clone(), row)?;
        record.initialize().await;
        Ok(record)
    }
}

impl<D: Document> SelectQuery<D, Many> {
    pub fn one(self) -> Select<D> {
        self.retype()
    }

    /// Fetch every matching row and initialize each bound record in result order
    #[tracing::instrument(skip(self), fields(table = %self.core.metadata.table))]
    pub async fn exec(self) -> Result<Vec<Record<D>>> {
        let rows = self.fetch(false).await?;
        let mut records = Vec::with_capacity(rows.len());

        for row in rows {
            let mut record = Record::from_row(self.core.clone(), row)?;
            record.initialize().await;
            records.push(record);
        }

        Ok(records)
    }
}

fn push_conditions(sql: &mut String, params: &mut Vec<Value>, keyword: &str, conditions: &[Condition]) {
    if conditions.is_empty() {
        return;
    }

    let parts: Vec<String> = conditions.iter().map(|c| format!("({})", c.sql())).collect();
    sql.push_str(keyword);
    sql.push_str(&parts.join(" AND "));

    for condition in conditions {
        params.extend(condition.values().iter().cloned());
    }
}
