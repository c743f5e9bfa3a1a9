//! Models and the composable scopes derived from them.
//!
//! A [`Model`] is the root [`Scope`] of a registration. Scopes are values:
//! narrowing one with [`Scope::create_group`] or [`Scope::order`] returns a new
//! scope and leaves the receiver untouched. Named groups are remembered on the
//! scope they were created from.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::Weak;

use crate::Condition;
use crate::Document;
use crate::Error;
use crate::Executor;
use crate::Insert;
use crate::IntoValue;
use crate::Metadata;
use crate::Middleware;
use crate::Record;
use crate::Result;
use crate::Select;
use crate::SelectMany;
use crate::query::Join;
use crate::query::SelectQuery;

type Groups<D> = Arc<RwLock<HashMap<String, Scope<D>>>>;

/// Registration state shared by every scope, query and record of a model
pub(crate) struct ModelCore<D> {
    pub(crate) metadata: Arc<Metadata>,
    pub(crate) executor: Arc<dyn Executor>,
    pipeline:            RwLock<Vec<Arc<dyn Middleware<D>>>>,
}

impl<D> ModelCore<D> {
    /// Snapshot of the middleware pipeline in registration order
    pub(crate) fn pipeline(&self) -> Vec<Arc<dyn Middleware<D>>> {
        match self.pipeline.read() {
            Ok(pipeline) => pipeline.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// A filtered, ordered view over a model's table
pub struct Scope<D> {
    core:      Arc<ModelCore<D>>,
    predicate: Condition,
    join:      Option<Join>,
    order:     Option<String>,
    groups:    Groups<D>,
}

impl<D> Clone for Scope<D> {
    fn clone(&self) -> Self {
        Self {
            core:      self.core.clone(),
            predicate: self.predicate.clone(),
            join:      self.join.clone(),
            order:     self.order.clone(),
            groups:    self.groups.clone(),
        }
    }
}

impl<D> fmt::Debug for Scope<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("table", &self.core.metadata.table)
            .field("predicate", &self.predicate)
            .field("join", &self.join)
            .field("order", &self.order)
            .finish()
    }
}

impl<D: Document> Scope<D> {
    fn root(core: Arc<ModelCore<D>>) -> Self {
        let order = format!("{} ASC", core.metadata.qualify(&core.metadata.primary_key));
        Self {
            core,
            predicate: Condition::empty(),
            join: None,
            order: Some(order),
            groups: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// A relation-scoped view over `core`'s table
    pub(crate) fn related(core: Arc<ModelCore<D>>, predicate: Condition, join: Option<Join>) -> Self {
        Self { core, predicate, join, order: None, groups: Arc::new(RwLock::new(HashMap::new())) }
    }

    fn default_order(&self) -> String {
        format!("{} ASC", self.qualify(&self.core.metadata.primary_key))
    }

    fn qualify(&self, column: &str) -> String {
        if column.contains('.') { column.to_string() } else { self.core.metadata.qualify(column) }
    }

    fn base(&self, order: String) -> Select<D> {
        let select = SelectQuery::new(self.core.clone()).filter(self.predicate.clone());
        let select = match &self.join {
            Some(join) => select.join(join.clone()),
            None => select,
        };
        select.order_by_expression(order, Vec::new())
    }

    /// Single-row query seeded with this scope's predicate, join and order
    pub fn select(&self) -> Select<D> {
        self.base(self.get_order())
    }

    /// Multi-row query seeded with this scope's predicate, join and order; not executed
    pub fn all(&self) -> SelectMany<D> {
        self.select().many()
    }

    pub fn insert(&self) -> Insert<D> {
        Insert::new(self.core.clone())
    }

    /// Bind `doc` to this model without storing it
    pub fn new_record(&self, doc: D) -> Record<D> {
        Record::new(doc, self.core.clone())
    }

    /// Record whose primary key equals `pk`; invalid records are an error.
    #[tracing::instrument(skip(self, pk), fields(table = %self.core.metadata.table))]
    pub async fn find<V: IntoValue>(&self, pk: V) -> Result<Record<D>> {
        let column = self.qualify(&self.core.metadata.primary_key);
        self.select().filter(Condition::eq(&column, pk)).exec().await?.into_valid()
    }

    /// First record, in scope order, whose `column` equals `value`
    #[tracing::instrument(skip(self, value), fields(table = %self.core.metadata.table))]
    pub async fn find_by<V: IntoValue>(&self, column: &str, value: V) -> Result<Record<D>> {
        let column = self.qualify(column);
        self.select().filter(Condition::eq(&column, value)).exec().await?.into_valid()
    }

    /// Initialize `doc` and insert it; an invalid document never reaches storage.
    #[tracing::instrument(skip(self, doc), fields(table = %self.core.metadata.table))]
    pub async fn create(&self, doc: D) -> Result<Record<D>> {
        let mut record = self.new_record(doc);
        record.initialize().await;

        if !record.errors().is_empty() {
            tracing::debug!("Refusing to insert invalid {} ({} errors)", self.core.metadata.table, record.errors().len());
            return Err(Error::Invalid(record.errors().to_vec()));
        }

        Insert::new(self.core.clone()).record(&record)?.exec().await
    }

    /// Register a named child scope narrowed by `condition`.
    ///
    /// The child keeps this scope's join but not its order. Creating a group
    /// under an existing name replaces it.
    pub fn create_group(&self, name: &str, condition: Condition) -> Scope<D> {
        let group = Scope {
            core:      self.core.clone(),
            predicate: self.predicate.clone().and(condition),
            join:      self.join.clone(),
            order:     None,
            groups:    Arc::new(RwLock::new(HashMap::new())),
        };

        match self.groups.write() {
            Ok(mut groups) => groups.insert(name.to_string(), group.clone()),
            Err(poisoned) => poisoned.into_inner().insert(name.to_string(), group.clone()),
        };

        tracing::debug!("Created group {} on {}", name, self.core.metadata.table);
        group
    }

    pub fn from_group(&self, name: &str) -> Result<Scope<D>> {
        let group = match self.groups.read() {
            Ok(groups) => groups.get(name).cloned(),
            Err(poisoned) => poisoned.into_inner().get(name).cloned(),
        };
        group.ok_or_else(|| Error::GroupNotFound(name.to_string()))
    }

    pub async fn count(&self) -> Result<i64> {
        self.all().count().await
    }

    /// Whether a row with primary key `pk` is visible through this scope
    pub async fn exists<V: IntoValue>(&self, pk: V) -> Result<bool> {
        let column = self.qualify(&self.core.metadata.primary_key);
        Ok(self.all().filter(Condition::eq(&column, pk)).count().await? > 0)
    }

    /// Copy of this scope ordered by `by`, e.g. `"person.last_name DESC, person.id"`
    ///
    /// The copy starts with no groups of its own.
    pub fn order(&self, by: &str) -> Scope<D> {
        Scope {
            core:      self.core.clone(),
            predicate: self.predicate.clone(),
            join:      self.join.clone(),
            order:     Some(by.to_string()),
            groups:    Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Effective order clause; scopes without one fall back to primary key ascending
    pub fn get_order(&self) -> String {
        self.order.clone().unwrap_or_else(|| self.default_order())
    }

    /// The `i`th record (1-indexed) in scope order
    pub async fn nth(&self, i: usize) -> Result<Record<D>> {
        let offset = position(i)?;
        self.select().limit(1).offset(offset).exec().await?.into_valid()
    }

    /// The `i`th record (1-indexed) counting from the end of scope order
    pub async fn nth_to_last(&self, i: usize) -> Result<Record<D>> {
        let offset = position(i)?;
        self.base(invert_order(&self.get_order())).limit(1).offset(offset).exec().await?.into_valid()
    }

    pub async fn first(&self) -> Result<Record<D>> {
        self.nth(1).await
    }

    pub async fn second(&self) -> Result<Record<D>> {
        self.nth(2).await
    }

    pub async fn third(&self) -> Result<Record<D>> {
        self.nth(3).await
    }

    pub async fn fourth(&self) -> Result<Record<D>> {
        self.nth(4).await
    }

    pub async fn fifth(&self) -> Result<Record<D>> {
        self.nth(5).await
    }

    pub async fn last(&self) -> Result<Record<D>> {
        self.nth_to_last(1).await
    }

    pub async fn second_to_last(&self) -> Result<Record<D>> {
        self.nth_to_last(2).await
    }

    pub fn predicate(&self) -> &Condition {
        &self.predicate
    }

    pub fn join(&self) -> Option<&Join> {
        self.join.as_ref()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.core.metadata
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.core.executor
    }
}

fn position(i: usize) -> Result<usize> {
    i.checked_sub(1).ok_or_else(|| Error::Query("positions start at 1".to_string()))
}

/// Swap ASC and DESC on every term of an order clause; bare terms become DESC.
fn invert_order(order: &str) -> String {
    order_terms(order)
        .into_iter()
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(|term| {
            let upper = term.to_ascii_uppercase();
            if upper.ends_with(" DESC") {
                format!("{} ASC", term[..term.len() - 5].trim_end())
            } else if upper.ends_with(" ASC") {
                format!("{} DESC", term[..term.len() - 4].trim_end())
            } else {
                format!("{} DESC", term)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Split an order clause on commas outside parentheses and quoted literals
fn order_terms(order: &str) -> Vec<&str> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in order.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                terms.push(&order[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    terms.push(&order[start..]);
    terms
}

/// A registered document type: its metadata, executor, middleware and root scope
///
/// ```ignore
/// let conn = Arc::new(Builder::new_local(":memory:").build().await?.connect()?);
/// let persons: Model<Person> = Model::register(conn, "person")?;
/// persons.use_middleware(middleware::presence_of("email"));
/// let john = persons.find(1).await?;
/// ```
pub struct Model<D> {
    root: Scope<D>,
}

impl<D> Clone for Model<D> {
    fn clone(&self) -> Self {
        Self { root: self.root.clone() }
    }
}

impl<D> fmt::Debug for Model<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model").field("metadata", &self.root.core.metadata).finish()
    }
}

impl<D: Document> Model<D> {
    /// Derive metadata for `D` and bind it to `table` on `executor`.
    pub fn register(executor: Arc<dyn Executor>, table: &str) -> Result<Self> {
        let metadata = Metadata::derive::<D>(table)?;
        let core = Arc::new(ModelCore { metadata: Arc::new(metadata), executor, pipeline: RwLock::new(Vec::new()) });
        Ok(Self { root: Scope::root(core) })
    }

    /// Register `D` under its declared table name
    pub fn new(executor: Arc<dyn Executor>) -> Result<Self> {
        Self::register(executor, D::table_name())
    }

    /// Append `middleware` to the lifecycle pipeline of every record of this model
    pub fn use_middleware<M: Middleware<D> + 'static>(&self, middleware: M) {
        let middleware: Arc<dyn Middleware<D>> = Arc::new(middleware);
        match self.root.core.pipeline.write() {
            Ok(mut pipeline) => pipeline.push(middleware),
            Err(poisoned) => poisoned.into_inner().push(middleware),
        }
    }

    pub fn downgrade(&self) -> WeakModel<D> {
        WeakModel { core: Arc::downgrade(&self.root.core), groups: Arc::downgrade(&self.root.groups) }
    }

    pub(crate) fn core(&self) -> &Arc<ModelCore<D>> {
        &self.root.core
    }
}

impl<D> Deref for Model<D> {
    type Target = Scope<D>;

    fn deref(&self) -> &Scope<D> {
        &self.root
    }
}

/// Non-owning handle on a [`Model`]
pub struct WeakModel<D> {
    core:   Weak<ModelCore<D>>,
    groups: Weak<RwLock<HashMap<String, Scope<D>>>>,
}

impl<D> Clone for WeakModel<D> {
    fn clone(&self) -> Self {
        Self { core: self.core.clone(), groups: self.groups.clone() }
    }
}

impl<D: Document> WeakModel<D> {
    pub fn upgrade(&self) -> Option<Model<D>> {
        let core = self.core.upgrade()?;
        let groups = self.groups.upgrade()?;
        let root = Scope::root(core);
        Some(Model { root: Scope { groups, ..root } })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::Value;
    use crate::middleware;
    use crate::testing::Person;
    use crate::testing::StubExecutor;
    use crate::testing::person_row;

    const COLUMNS: &str = "person.id, person.first_name, person.last_name, person.email, person.place_id";

    fn model(stub: &Arc<StubExecutor>) -> Model<Person> {
        Model::register(stub.clone(), "person").unwrap()
    }

    #[test]
    fn test_root_scope_orders_by_primary_key() {
        let stub = StubExecutor::new();
        let persons = model(&stub);

        assert_eq!(persons.get_order(), "person.id ASC");
        assert!(persons.predicate().is_empty());
        assert_eq!(persons.all().build().0, format!("SELECT {} FROM person ORDER BY person.id ASC", COLUMNS));
    }

    #[test]
    fn test_new_uses_declared_table() {
        let stub = StubExecutor::new();
        let persons: Model<Person> = Model::new(stub.clone()).unwrap();
        assert_eq!(persons.metadata().table, "person");
    }

    #[test]
    fn test_order_returns_new_scope() {
        let stub = StubExecutor::new();
        let persons = model(&stub);
        let by_name = persons.order("person.last_name DESC");

        assert_eq!(by_name.get_order(), "person.last_name DESC");
        assert_eq!(persons.get_order(), "person.id ASC");
    }

    #[test]
    fn test_invert_order() {
        assert_eq!(invert_order("person.id ASC"), "person.id DESC");
        assert_eq!(invert_order("person.id desc"), "person.id ASC");
        assert_eq!(invert_order("last_name DESC, first_name"), "last_name ASC, first_name DESC");
    }

    #[test]
    fn test_invert_order_keeps_function_arguments_together() {
        assert_eq!(invert_order("COALESCE(a, b) DESC, id"), "COALESCE(a, b) ASC, id DESC");
        assert_eq!(invert_order("substr(name, 1, 3)"), "substr(name, 1, 3) DESC");
        assert_eq!(invert_order("ifnull(city, ',') ASC"), "ifnull(city, ',') DESC");
    }

    #[tokio::test]
    async fn test_nth_to_last_inverts_expression_order() {
        let stub = StubExecutor::new();
        let persons = model(&stub);

        let _ = persons.order("COALESCE(person.last_name, person.first_name) DESC").last().await;
        assert!(stub.statements()[0].0.ends_with("ORDER BY COALESCE(person.last_name, person.first_name) ASC LIMIT 1 OFFSET 0"));
    }

    #[test]
    fn test_ordered_scope_has_its_own_groups() {
        let stub = StubExecutor::new();
        let persons = model(&stub);
        persons.create_group("Does", Condition::eq("person.last_name", "Doe"));

        let ordered = persons.order("person.last_name DESC");
        ordered.create_group("Johns", Condition::eq("person.first_name", "John"));

        assert!(ordered.from_group("Johns").is_ok());
        assert!(matches!(persons.from_group("Johns"), Err(Error::GroupNotFound(_))));
        assert!(persons.from_group("Does").is_ok());
    }

    #[test]
    fn test_create_group_and_from_group() {
        let stub = StubExecutor::new();
        let persons = model(&stub);
        let group = persons.create_group("FromPlace1", Condition::eq("person.place_id", 1));

        assert_eq!(group.get_order(), "person.id ASC");
        let found = persons.from_group("FromPlace1").unwrap();
        assert_eq!(found.predicate(), group.predicate());
        assert_eq!(
            found.all().build().0,
            format!("SELECT {} FROM person WHERE (person.place_id = ?) ORDER BY person.id ASC", COLUMNS)
        );
    }

    #[test]
    fn test_nested_groups_and_combine_predicates() {
        let stub = StubExecutor::new();
        let persons = model(&stub);
        let does = persons.create_group("Does", Condition::eq("person.last_name", "Doe"));
        let johns = does.create_group("Johns", Condition::eq("person.first_name", "John"));

        let (sql, params) = johns.all().build();
        assert!(sql.contains("WHERE ((person.last_name = ?) AND (person.first_name = ?))"));
        assert_eq!(params.len(), 2);

        assert!(does.from_group("Johns").is_ok());
        assert!(matches!(persons.from_group("Johns"), Err(Error::GroupNotFound(_))));
    }

    #[test]
    fn test_groups_registered_concurrently() {
        let stub = StubExecutor::new();
        let persons = model(&stub);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let persons = persons.clone();
                std::thread::spawn(move || {
                    persons.create_group(&format!("group{}", i), Condition::eq("person.place_id", i as i64));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..8 {
            assert!(persons.from_group(&format!("group{}", i)).is_ok());
        }
    }

    #[tokio::test]
    async fn test_find_filters_by_qualified_primary_key() {
        let stub = StubExecutor::new();
        stub.push_rows(vec![person_row(1, "John", "Doe", "john@doe.com", 1)]);

        let john = model(&stub).find(1).await.unwrap();
        assert_eq!(john.first_name, "John");

        let (sql, params) = &stub.statements()[0];
        assert_eq!(sql, &format!("SELECT {} FROM person WHERE (person.id = ?) ORDER BY person.id ASC", COLUMNS));
        assert_eq!(params, &vec![Value::Integer(1)]);
    }

    #[tokio::test]
    async fn test_find_in_group_keeps_group_predicate() {
        let stub = StubExecutor::new();
        let persons = model(&stub);
        persons.create_group("FromPlace1", Condition::eq("person.place_id", 1));

        let result = persons.from_group("FromPlace1").unwrap().find(1).await;
        assert!(matches!(result, Err(Error::NotFound)));

        let (sql, params) = &stub.statements()[0];
        assert!(sql.ends_with("WHERE (person.place_id = ?) AND (person.id = ?) ORDER BY person.id ASC"));
        assert_eq!(params, &vec![Value::Integer(1), Value::Integer(1)]);
    }

    #[tokio::test]
    async fn test_find_invalid_record_is_error() {
        let stub = StubExecutor::new();
        stub.push_rows(vec![person_row(1, "John", "Doe", "", 1)]);
        let persons = model(&stub);
        persons.use_middleware(middleware::presence_of("email"));

        let err = persons.find(1).await.unwrap_err();
        assert!(err.is_invalid());
        assert_eq!(err.validation_errors()[0], crate::ValidationError::Presence { field: "email".to_string() });
    }

    #[tokio::test]
    async fn test_find_by_qualifies_bare_columns() {
        let stub = StubExecutor::new();
        let _ = model(&stub).find_by("email", "john@doe.com").await;
        let _ = model(&stub).find_by("place.city", "Rome").await;

        let statements = stub.statements();
        assert!(statements[0].0.contains("WHERE (person.email = ?)"));
        assert!(statements[1].0.contains("WHERE (place.city = ?)"));
    }

    #[tokio::test]
    async fn test_create_invalid_does_not_touch_storage() {
        let stub = StubExecutor::new();
        let persons = model(&stub);
        persons.use_middleware(middleware::presence_of("email"));

        let err = persons.create(Person { first_name: "John".to_string(), ..Default::default() }).await.unwrap_err();

        assert!(err.is_invalid());
        assert!(stub.statements().is_empty());
    }

    #[tokio::test]
    async fn test_create_inserts_and_refetches() {
        let stub = StubExecutor::new();
        stub.set_last_insert_id(3);
        stub.push_rows(vec![person_row(3, "Jim", "Doe", "jim@doe.com", 1)]);

        let person = Person {
            first_name: "Jim".to_string(),
            last_name: "Doe".to_string(),
            email: "jim@doe.com".to_string(),
            place_id: 1,
            ..Default::default()
        };
        let record = model(&stub).create(person).await.unwrap();

        assert_eq!(record.id, 3);
        let statements = stub.statements();
        assert_eq!(statements[0].0, "INSERT INTO person (first_name, last_name, email, place_id) VALUES (?, ?, ?, ?)");
        assert_eq!(statements.len(), 2);
    }

    #[tokio::test]
    async fn test_nth_and_nth_to_last() {
        let stub = StubExecutor::new();
        let persons = model(&stub);

        let _ = persons.nth(3).await;
        let _ = persons.last().await;
        let _ = persons.order("person.last_name ASC, person.id").second_to_last().await;

        let statements = stub.statements();
        assert!(statements[0].0.ends_with("ORDER BY person.id ASC LIMIT 1 OFFSET 2"));
        assert!(statements[1].0.ends_with("ORDER BY person.id DESC LIMIT 1 OFFSET 0"));
        assert!(statements[2].0.ends_with("ORDER BY person.last_name DESC, person.id DESC LIMIT 1 OFFSET 1"));
    }

    #[tokio::test]
    async fn test_nth_zero_is_rejected() {
        let stub = StubExecutor::new();
        assert!(matches!(model(&stub).nth(0).await, Err(Error::Query(_))));
        assert!(stub.statements().is_empty());
    }

    #[tokio::test]
    async fn test_count_and_exists() {
        let stub = StubExecutor::new();
        stub.push_rows(vec![vec![Value::Integer(2)]]);
        stub.push_rows(vec![vec![Value::Integer(0)]]);
        let persons = model(&stub);
        let group = persons.create_group("FromPlace1", Condition::eq("person.place_id", 1));

        assert_eq!(group.count().await.unwrap(), 2);
        assert!(!group.exists(5).await.unwrap());

        let statements = stub.statements();
        assert_eq!(statements[0].0, "SELECT COUNT(*) FROM person WHERE (person.place_id = ?)");
        assert_eq!(statements[1].0, "SELECT COUNT(*) FROM person WHERE (person.place_id = ?) AND (person.id = ?)");
        assert_eq!(statements[1].1, vec![Value::Integer(1), Value::Integer(5)]);
    }

    #[test]
    fn test_weak_model_upgrade() {
        let stub = StubExecutor::new();
        let persons = model(&stub);
        persons.create_group("Does", Condition::eq("person.last_name", "Doe"));

        let weak = persons.downgrade();
        let upgraded = weak.upgrade().unwrap();
        assert!(upgraded.from_group("Does").is_ok());

        drop(upgraded);
        drop(persons);
        assert!(weak.upgrade().is_none());
    }
}
