//! Record-level checks run at the end of lifecycle initialization.
//!
//! Middleware never fails an operation by itself: it appends to the record's
//! error list, and operations that need a valid record turn a non-empty list
//! into [`Error::Invalid`](crate::Error::Invalid).

use async_trait::async_trait;
use regex::Regex;

use crate::Condition;
use crate::Document;
use crate::Error;
use crate::FromValue;
use crate::Record;
use crate::Result;
use crate::ValidationError;
use crate::Value;
use crate::value;

/// One step of a model's lifecycle pipeline
#[async_trait]
pub trait Middleware<D>: Send + Sync {
    async fn run(&self, record: &mut Record<D>);
}

/// Middleware from a plain closure
pub struct FromFn<F>(F);

/// Adapt `f` into a [`Middleware`]
///
/// ```ignore
/// persons.use_middleware(middleware::from_fn(|record: &mut Record<Person>| {
///     if record.first_name == record.last_name {
///         record.add_error("first and last name must differ");
///     }
/// }));
/// ```
pub fn from_fn<D, F>(f: F) -> FromFn<F>
where F: Fn(&mut Record<D>) + Send + Sync {
    FromFn(f)
}

#[async_trait]
impl<D, F> Middleware<D> for FromFn<F>
where
    D: Document,
    F: Fn(&mut Record<D>) + Send + Sync,
{
    async fn run(&self, record: &mut Record<D>) {
        (self.0)(record)
    }
}

/// See [`presence_of`]
#[derive(Clone, Debug)]
pub struct Presence {
    field: String,
}

/// Require `field` to hold a non-zero, non-empty value
pub fn presence_of(field: &str) -> Presence {
    Presence { field: field.to_string() }
}

#[async_trait]
impl<D: Document> Middleware<D> for Presence {
    async fn run(&self, record: &mut Record<D>) {
        let present = record.get(&self.field).map(|v| value::is_present(&v)).unwrap_or(false);
        if !present {
            record.add_error(ValidationError::Presence { field: self.field.clone() });
        }
    }
}

/// See [`format_of`]
#[derive(Clone, Debug)]
pub struct Format {
    field:   String,
    pattern: Regex,
}

/// Require the text of `field` to match `pattern`
///
/// Fails with [`Error::Config`] when `pattern` is not a valid regular expression.
pub fn format_of(field: &str, pattern: &str) -> Result<Format> {
    let pattern = Regex::new(pattern).map_err(|e| Error::Config(format!("invalid pattern for {}: {}", field, e)))?;
    Ok(Format { field: field.to_string(), pattern })
}

#[async_trait]
impl<D: Document> Middleware<D> for Format {
    async fn run(&self, record: &mut Record<D>) {
        let matches = match record.get(&self.field) {
            Ok(Value::Text(text)) => self.pattern.is_match(&text),
            Ok(Value::Null) | Err(_) => false,
            Ok(other) => self.pattern.is_match(&value::display_value(&other)),
        };

        if !matches {
            record.add_error(ValidationError::Format {
                field:   self.field.clone(),
                pattern: self.pattern.as_str().to_string(),
            });
        }
    }
}

/// See [`uniqueness_of`]
#[derive(Clone, Debug)]
pub struct Uniqueness {
    fields: Vec<String>,
}

/// Require no other stored row to share the value of `field`
///
/// A record that is not persisted yet conflicts with every matching row.
pub fn uniqueness_of(field: &str) -> Uniqueness {
    Uniqueness { fields: vec![field.to_string()] }
}

/// Require no other stored row to share the combined values of `fields`
pub fn unique_combination_of(fields: &[&str]) -> Uniqueness {
    Uniqueness { fields: fields.iter().map(|f| f.to_string()).collect() }
}

impl Uniqueness {
    async fn conflicts<D: Document>(&self, record: &Record<D>, values: &[Value]) -> Result<bool> {
        let metadata = record.metadata();
        let condition = Condition::all(self.fields.iter().zip(values).map(|(f, v)| Condition::eq(f, v.clone())));
        let sql = format!("SELECT {} FROM {} WHERE {}", metadata.primary_key, metadata.table, condition.sql());

        let executor = record.executor();
        let rows = executor.fetch_all(&executor.dialect().rebind(&sql), condition.into_values()).await?;

        let own = if record.is_persisted() { Some(record.primary_key_value()?) } else { None };
        Ok(rows.iter().any(|row| match (&own, row.first()) {
            (Some(own), Some(id)) => own != id,
            _ => true,
        }))
    }
}

#[async_trait]
impl<D: Document> Middleware<D> for Uniqueness {
    async fn run(&self, record: &mut Record<D>) {
        let values: Result<Vec<Value>> = self.fields.iter().map(|f| record.get(f)).collect();
        let values = match values {
            Ok(values) => values,
            Err(e) => {
                record.add_error(ValidationError::Storage(e.to_string()));
                return;
            }
        };

        match self.conflicts(record, &values).await {
            Ok(false) => {}
            Ok(true) => {
                let rendered: Vec<String> = values.iter().map(value::display_value).collect();
                let error = match (self.fields.as_slice(), rendered.as_slice()) {
                    ([field], [value]) => ValidationError::Uniqueness { field: field.clone(), value: value.clone() },
                    _ => ValidationError::UniqueCombination { fields: self.fields.clone(), values: rendered },
                };
                record.add_error(error);
            }
            Err(e) => {
                tracing::warn!("Uniqueness check on {} failed: {}", record.table(), e);
                record.add_error(ValidationError::Storage(e.to_string()));
            }
        }
    }
}

/// See [`validate`]
pub struct Validate<T, F> {
    field:     String,
    predicate: F,
    _value:    std::marker::PhantomData<fn() -> T>,
}

/// Require `predicate` to accept the value of `field`, read as `T`
///
/// ```ignore
/// persons.use_middleware(middleware::validate("email", |email: &String| email.contains('@')));
/// ```
pub fn validate<T, F>(field: &str, predicate: F) -> Validate<T, F>
where
    T: FromValue,
    F: Fn(&T) -> bool + Send + Sync, {
    Validate { field: field.to_string(), predicate, _value: std::marker::PhantomData }
}

#[async_trait]
impl<D, T, F> Middleware<D> for Validate<T, F>
where
    D: Document,
    T: FromValue + 'static,
    F: Fn(&T) -> bool + Send + Sync,
{
    async fn run(&self, record: &mut Record<D>) {
        let valid = record.get_as::<T>(&self.field).map(|v| (self.predicate)(&v)).unwrap_or(false);
        if !valid {
            record.add_error(ValidationError::Custom { field: self.field.clone() });
        }
    }
}
