use crate::IntoValue;
use crate::Value;

/// A predicate fragment with its positional arguments
///
/// Columns are plain strings and may be qualified (`person.id`). An empty
/// condition renders nothing and vanishes when combined with [`and`](Condition::and).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Condition {
    pub(crate) sql:    String,
    pub(crate) values: Vec<Value>,
}

impl Condition {
    /// The always-true predicate
    pub fn empty() -> Self {
        Self::default()
    }

    /// `column = ?`, or `column IS NULL` when `value` is null
    pub fn eq<V: IntoValue>(column: &str, value: V) -> Self {
        match value.into_value() {
            Value::Null => Self::is_null(column),
            value => Self { sql: format!("{} = ?", column), values: vec![value] },
        }
    }

    /// `column != ?`, or `column IS NOT NULL` when `value` is null
    pub fn ne<V: IntoValue>(column: &str, value: V) -> Self {
        match value.into_value() {
            Value::Null => Self::is_not_null(column),
            value => Self { sql: format!("{} != ?", column), values: vec![value] },
        }
    }

    pub fn gt<V: IntoValue>(column: &str, value: V) -> Self {
        Self { sql: format!("{} > ?", column), values: vec![value.into_value()] }
    }

    pub fn gte<V: IntoValue>(column: &str, value: V) -> Self {
        Self { sql: format!("{} >= ?", column), values: vec![value.into_value()] }
    }

    pub fn lt<V: IntoValue>(column: &str, value: V) -> Self {
        Self { sql: format!("{} < ?", column), values: vec![value.into_value()] }
    }

    pub fn lte<V: IntoValue>(column: &str, value: V) -> Self {
        Self { sql: format!("{} <= ?", column), values: vec![value.into_value()] }
    }

    pub fn like(column: &str, pattern: impl Into<String>) -> Self {
        Self { sql: format!("{} LIKE ?", column), values: vec![Value::Text(pattern.into())] }
    }

    pub fn contains(column: &str, value: impl Into<String>) -> Self {
        Self { sql: format!("{} LIKE ?", column), values: vec![Value::Text(format!("%{}%", value.into()))] }
    }

    pub fn is_null(column: &str) -> Self {
        Self { sql: format!("{} IS NULL", column), values: vec![] }
    }

    pub fn is_not_null(column: &str) -> Self {
        Self { sql: format!("{} IS NOT NULL", column), values: vec![] }
    }

    pub fn is_in<V: IntoValue>(column: &str, values: Vec<V>) -> Self {
        let placeholders: Vec<&str> = values.iter().map(|_| "?").collect();
        Self {
            sql:    format!("{} IN ({})", column, placeholders.join(", ")),
            values: values.into_iter().map(|v| v.into_value()).collect(),
        }
    }

    pub fn between<V: IntoValue>(column: &str, low: V, high: V) -> Self {
        Self { sql: format!("{} BETWEEN ? AND ?", column), values: vec![low.into_value(), high.into_value()] }
    }

    /// Verbatim predicate text with `?` markers for `values`
    pub fn raw(sql: impl Into<String>, values: Vec<Value>) -> Self {
        Self { sql: sql.into(), values }
    }

    /// AND-combine every non-empty condition in `conditions`
    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Self {
        conditions.into_iter().fold(Self::empty(), Self::and)
    }

    pub fn and(self, other: Condition) -> Self {
        if other.is_empty() {
            return self;
        }
        if self.is_empty() {
            return other;
        }

        let mut values = self.values;
        values.extend(other.values);
        Self { sql: format!("({}) AND ({})", self.sql, other.sql), values }
    }

    pub fn or(self, other: Condition) -> Self {
        let mut values = self.values;
        values.extend(other.values);
        Self { sql: format!("({}) OR ({})", self.sql, other.sql), values }
    }

    pub fn not(self) -> Self {
        Self { sql: format!("NOT ({})", self.sql), values: self.values }
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    Asc,

    Desc,
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Order::Asc => write!(f, "ASC"),
            Order::Desc => write!(f, "DESC"),
        }
    }
}
