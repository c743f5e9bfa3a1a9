//! The runtime binding of one document to its registration.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::Arc;

use crate::Document;
use crate::Error;
use crate::Executor;
use crate::FromValue;
use crate::IntoValue;
use crate::Metadata;
use crate::Model;
use crate::Result;
use crate::ValidationError;
use crate::Value;
use crate::document::bind_component;
use crate::query::Delete;
use crate::query::Update;
use crate::scope::ModelCore;
use crate::value;

/// A document bound to the model it was loaded from or created for
///
/// Derefs to the document, so members are read and written directly;
/// [`get`](Record::get) and [`set`](Record::set) reach the same members by
/// storage column or member name.
pub struct Record<D> {
    doc:       D,
    core:      Arc<ModelCore<D>>,
    errors:    Vec<ValidationError>,
    persisted: bool,
}

impl<D: Document> Record<D> {
    pub(crate) fn new(doc: D, core: Arc<ModelCore<D>>) -> Self {
        Self { doc, core, errors: Vec::new(), persisted: false }
    }

    /// Bind a fetched row, given in metadata field order.
    pub(crate) fn from_row(core: Arc<ModelCore<D>>, row: Vec<Value>) -> Result<Self> {
        let metadata = core.metadata.clone();
        if row.len() < metadata.fields.len() {
            return Err(Error::Binding(format!(
                "{} row has {} values, expected {}",
                metadata.table,
                row.len(),
                metadata.fields.len()
            )));
        }

        let mut doc = D::default();
        for (field, value) in metadata.fields.iter().zip(row) {
            doc.set_member(&field.name, value)?;
        }

        Ok(Self { doc, core, errors: Vec::new(), persisted: true })
    }

    fn member_name<'a>(&'a self, name: &'a str) -> &'a str {
        match self.core.metadata.field(name) {
            Some(field) => &field.name,
            None => name,
        }
    }

    /// Value of a mapped column, falling back to a member of that name
    pub fn get(&self, name: &str) -> Result<Value> {
        self.doc.get_member(self.member_name(name)).ok_or_else(|| Error::UnknownField(name.to_string()))
    }

    pub fn get_as<T: FromValue>(&self, name: &str) -> Result<T> {
        T::from_value(self.get(name)?)
    }

    /// Assign a mapped column or member; the value must fit the member's type.
    pub fn set<V: IntoValue>(&mut self, name: &str, value: V) -> Result<()> {
        let value = value.into_value();
        let kind = value::kind_of(&value);
        let member = self.member_name(name).to_string();

        self.doc.set_member(&member, value).map_err(|e| match e {
            Error::TypeConversion { .. } | Error::UnexpectedNull => {
                Error::Binding(format!("cannot assign {} to {}: {}", kind, name, e))
            }
            other => other,
        })
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn error(&self, index: usize) -> Option<&ValidationError> {
        self.errors.get(index)
    }

    pub fn add_error(&mut self, error: impl Into<ValidationError>) {
        self.errors.push(error.into());
    }

    pub fn set_errors(&mut self, errors: Vec<ValidationError>) {
        self.errors = errors;
    }

    pub fn remove_error(&mut self, index: usize) -> Option<ValidationError> {
        if index < self.errors.len() { Some(self.errors.remove(index)) } else { None }
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    /// Re-run lifecycle initialization and report whether no errors remain
    pub async fn is_valid(&mut self) -> bool {
        self.initialize().await;
        self.errors.is_empty()
    }

    pub async fn is_invalid(&mut self) -> bool {
        !self.is_valid().await
    }

    /// Write every mapped non-key column back by primary key.
    #[tracing::instrument(skip(self), fields(table = %self.core.metadata.table))]
    pub async fn save(&mut self) -> Result<()> {
        if !self.persisted {
            return Err(Error::PrimaryKeyNotSet);
        }

        self.initialize().await;
        if !self.errors.is_empty() {
            return Err(Error::Invalid(self.errors.clone()));
        }

        let affected = Update::record(self)?.exec(self.executor().as_ref()).await?;
        if affected == 0 {
            return Err(Error::NoRowsAffected);
        }

        Ok(())
    }

    /// Remove the stored row; the record keeps its values but is no longer persisted.
    #[tracing::instrument(skip(self), fields(table = %self.core.metadata.table))]
    pub async fn delete(&mut self) -> Result<u64> {
        if !self.persisted {
            return Err(Error::PrimaryKeyNotSet);
        }

        let metadata = &self.core.metadata;
        let affected = Delete::new(&metadata.table)
            .filter(crate::Condition::eq(&metadata.primary_key, self.primary_key_value()?))
            .exec(self.executor().as_ref())
            .await?;

        self.persisted = false;
        Ok(affected)
    }

    /// Mapped column values keyed by storage column
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.core
            .metadata
            .fields
            .iter()
            .filter_map(|f| self.doc.get_member(&f.name).map(|v| (f.column.clone(), v)))
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> =
            self.to_map().iter().map(|(column, v)| (column.clone(), value::to_json(v))).collect();
        serde_json::Value::Object(map)
    }

    pub fn primary_key(&self) -> &str {
        &self.core.metadata.primary_key
    }

    pub fn primary_key_value(&self) -> Result<Value> {
        self.get(self.primary_key())
    }

    pub fn table(&self) -> &str {
        &self.core.metadata.table
    }

    pub fn metadata(&self) -> &Metadata {
        &self.core.metadata
    }

    /// Move this record to another registration of the same document type.
    pub fn rebind(self, model: &Model<D>) -> Self {
        Self { core: model.core().clone(), ..self }
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub fn document(&self) -> &D {
        &self.doc
    }

    pub fn into_document(self) -> D {
        self.doc
    }

    pub(crate) fn executor(&self) -> &Arc<dyn Executor> {
        &self.core.executor
    }

    pub(crate) fn core(&self) -> &Arc<ModelCore<D>> {
        &self.core
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    /// Components innermost first, then the init hook, then the middleware pipeline.
    pub(crate) async fn initialize(&mut self) {
        self.errors.clear();

        let metadata = self.core.metadata.clone();
        for component in self.doc.components() {
            bind_component(component, &metadata);
        }
        self.doc.init();

        for middleware in self.core.pipeline() {
            middleware.run(self).await;
        }
    }

    /// Turn a record left with errors after initialization into [`Error::Invalid`].
    pub(crate) fn into_valid(self) -> Result<Self> {
        if self.errors.is_empty() { Ok(self) } else { Err(Error::Invalid(self.errors)) }
    }
}

impl<D> Deref for Record<D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.doc
    }
}

impl<D> DerefMut for Record<D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut self.doc
    }
}

impl<D: fmt::Debug> fmt::Debug for Record<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("doc", &self.doc)
            .field("errors", &self.errors)
            .field("persisted", &self.persisted)
            .finish()
    }
}
