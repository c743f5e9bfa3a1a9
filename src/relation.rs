//! Lazy relation accessors and the middleware that binds them.
//!
//! A document declares a slot member per relation (`BelongsTo<R>`, `HasOne<R>`
//! or `HasMany<R>`). Registering [`belongs_to`], [`has_one`] or [`has_many`] on
//! the owning model binds those slots during lifecycle initialization to the
//! related model and the relation keys. Accessors take the owning record and
//! read its key when called, so a key changed after loading is honoured.
//! Nothing is fetched until the slot is used.
//!
//! ```ignore
//! persons.use_middleware(relation::belongs_to(&places));
//! persons.use_middleware(relation::has_many(&persons));
//!
//! let john = persons.find(1).await?;
//! let place = john.place.get(&john).await?;
//! let jane = john.friends.scope(&john)?.find(2).await?;
//! ```

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::Condition;
use crate::Document;
use crate::Error;
use crate::Middleware;
use crate::Model;
use crate::Record;
use crate::Result;
use crate::Scope;
use crate::Select;
use crate::SelectMany;
use crate::ValidationError;
use crate::metadata::Relation;
use crate::metadata::RelationKind;
use crate::query::Join;
use crate::query::JoinKind;
use crate::scope::ModelCore;
use crate::scope::WeakModel;

/// Related registration and resolved keys held by a bound slot
struct Bound<R> {
    core:     Arc<ModelCore<R>>,
    relation: Relation,
}

impl<R> Clone for Bound<R> {
    fn clone(&self) -> Self {
        Self { core: self.core.clone(), relation: self.relation.clone() }
    }
}

impl<R: Document> Bound<R> {
    /// Scope over the related table narrowed to rows related to `owner` as it is now
    fn scope<D: Document>(&self, owner: &Record<D>) -> Result<Scope<R>> {
        let target = &self.core.metadata;
        let relation = &self.relation;

        let (predicate, join) = match &relation.through {
            Some(through) => {
                let on = Condition::raw(
                    format!("{} = {}.{}", target.qualify(&target.primary_key), through, relation.key),
                    Vec::new(),
                );
                let predicate =
                    Condition::eq(&format!("{}.{}", through, relation.foreign_key), owner.primary_key_value()?);
                (predicate, Some(Join::new(JoinKind::Inner, through.clone(), on)))
            }
            None => (Condition::eq(&target.qualify(&relation.foreign_key), owner.get(&relation.key)?), None),
        };

        Ok(Scope::related(self.core.clone(), predicate, join))
    }
}

/// Single related record through the owner's key, e.g. a person's place
pub struct BelongsTo<R> {
    bound: Option<Bound<R>>,
}

/// Single related record pointing back at the owner
pub struct HasOne<R> {
    bound: Option<Bound<R>>,
}

/// Related records pointing back at the owner, directly or through a join table
pub struct HasMany<R> {
    bound: Option<Bound<R>>,
}

macro_rules! slot {
    ($slot:ident) => {
        impl<R> Default for $slot<R> {
            fn default() -> Self {
                Self { bound: None }
            }
        }

        impl<R> Clone for $slot<R> {
            fn clone(&self) -> Self {
                Self { bound: self.bound.clone() }
            }
        }

        impl<R> fmt::Debug for $slot<R> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($slot)).field("bound", &self.bound.is_some()).finish()
            }
        }

        impl<R> $slot<R> {
            pub fn is_bound(&self) -> bool {
                self.bound.is_some()
            }

            fn bound(&self) -> Result<&Bound<R>> {
                self.bound.as_ref().ok_or_else(|| Error::RelationNotBound(type_name::<R>().to_string()))
            }
        }
    };
}

slot!(BelongsTo);
slot!(HasOne);
slot!(HasMany);

macro_rules! single_slot {
    ($slot:ident) => {
        impl<R: Document> $slot<R> {
            /// Fetch the record related to `owner`; zero rows is [`Error::NotFound`].
            pub async fn get<D: Document>(&self, owner: &Record<D>) -> Result<Record<R>> {
                self.query(owner)?.exec().await?.into_valid()
            }

            /// Unexecuted query for the record related to `owner`, for further narrowing
            pub fn query<D: Document>(&self, owner: &Record<D>) -> Result<Select<R>> {
                Ok(self.bound()?.scope(owner)?.select())
            }
        }
    };
}

single_slot!(BelongsTo);
single_slot!(HasOne);

impl<R: Document> HasMany<R> {
    /// Scope over the records related to `owner`
    pub fn scope<D: Document>(&self, owner: &Record<D>) -> Result<Scope<R>> {
        self.bound()?.scope(owner)
    }

    pub fn all<D: Document>(&self, owner: &Record<D>) -> Result<SelectMany<R>> {
        Ok(self.scope(owner)?.all())
    }
}

/// Middleware binding one relation slot per record; see [`belongs_to`]
pub struct RelationBinder<R> {
    kind:    RelationKind,
    related: WeakModel<R>,
}

/// Bind the `belongs_to` relation whose related table is `related`'s
pub fn belongs_to<R: Document>(related: &Model<R>) -> RelationBinder<R> {
    RelationBinder { kind: RelationKind::BelongsTo, related: related.downgrade() }
}

/// Bind the `has_many` relation whose related table is `related`'s
pub fn has_many<R: Document>(related: &Model<R>) -> RelationBinder<R> {
    RelationBinder { kind: RelationKind::HasMany, related: related.downgrade() }
}

/// Bind the `has_one` relation whose related table is `related`'s
pub fn has_one<R: Document>(related: &Model<R>) -> RelationBinder<R> {
    RelationBinder { kind: RelationKind::HasOne, related: related.downgrade() }
}

impl<R: Document> RelationBinder<R> {
    fn bind<D: Document>(&self, record: &mut Record<D>) -> std::result::Result<(), ValidationError> {
        let failure = |relation: &str, reason: String| ValidationError::Relation { relation: relation.to_string(), reason };

        let related = self
            .related
            .upgrade()
            .ok_or_else(|| failure(&self.kind.to_string(), "related model has been dropped".to_string()))?;
        let key = Relation::registry_key(self.kind, &related.metadata().table);

        let relation = record
            .metadata()
            .relation(self.kind, &related.metadata().table)
            .cloned()
            .ok_or_else(|| failure(&key, format!("{} declares no such relation", record.table())))?;

        let bound = Bound { core: related.core().clone(), relation };
        // Unreadable owner keys fail at bind time
        bound.scope(record).map_err(|e| failure(&key, e.to_string()))?;

        let name = bound.relation.name.clone();
        let slot = record
            .relation_slot(&name)
            .ok_or_else(|| failure(&key, format!("member {} is not a relation slot", name)))?;

        let filled = match self.kind {
            RelationKind::BelongsTo => slot.downcast_mut::<BelongsTo<R>>().map(|slot| slot.bound = Some(bound)).is_some(),
            RelationKind::HasOne => slot.downcast_mut::<HasOne<R>>().map(|slot| slot.bound = Some(bound)).is_some(),
            RelationKind::HasMany => slot.downcast_mut::<HasMany<R>>().map(|slot| slot.bound = Some(bound)).is_some(),
        };

        if !filled {
            let reason = format!("member {} does not hold a {} slot for {}", name, self.kind, type_name::<R>());
            return Err(failure(&key, reason));
        }

        Ok(())
    }
}

#[async_trait]
impl<D: Document, R: Document> Middleware<D> for RelationBinder<R> {
    async fn run(&self, record: &mut Record<D>) {
        if let Err(error) = self.bind(record) {
            tracing::warn!("Dropped relation binding on {}: {}", record.table(), error);
            record.add_error(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::Value;
    use crate::testing::Person;
    use crate::testing::Place;
    use crate::testing::StubExecutor;
    use crate::testing::person_row;

    const PERSON_COLUMNS: &str = "person.id, person.first_name, person.last_name, person.email, person.place_id";

    fn models(stub: &Arc<StubExecutor>) -> (Model<Person>, Model<Place>) {
        let persons: Model<Person> = Model::register(stub.clone(), "person").unwrap();
        let places: Model<Place> = Model::register(stub.clone(), "place").unwrap();
        (persons, places)
    }

    fn john(persons: &Model<Person>) -> Record<Person> {
        let mut record = persons.new_record(Person::default());
        record.set("id", 1).unwrap();
        record.set("place_id", 7).unwrap();
        record
    }

    #[tokio::test]
    async fn test_unbound_slots() {
        let stub = StubExecutor::new();
        let (persons, _places) = models(&stub);
        let person = john(&persons);

        assert!(!person.place.is_bound());
        assert!(matches!(person.place.get(&person).await, Err(Error::RelationNotBound(_))));
        assert!(matches!(person.friends.scope(&person), Err(Error::RelationNotBound(_))));
    }

    #[tokio::test]
    async fn test_belongs_to_filters_related_key() {
        let stub = StubExecutor::new();
        let (persons, places) = models(&stub);
        persons.use_middleware(belongs_to(&places));

        let mut record = john(&persons);
        record.initialize().await;
        assert!(record.errors().is_empty());

        let (sql, params) = record.place.query(&record).unwrap().build();
        assert_eq!(
            sql,
            "SELECT place.id, place.country, place.city, place.telcode FROM place WHERE (place.id = ?) ORDER BY place.id ASC"
        );
        assert_eq!(params, vec![Value::Integer(7)]);
    }

    #[tokio::test]
    async fn test_has_many_direct() {
        let stub = StubExecutor::new();
        let (persons, places) = models(&stub);
        places.use_middleware(has_many(&persons));

        let mut rome = places.new_record(Place::default());
        rome.set("id", 3).unwrap();
        rome.initialize().await;

        let (sql, params) = rome.residents.all(&rome).unwrap().build();
        assert_eq!(sql, format!("SELECT {} FROM person WHERE (person.place_id = ?) ORDER BY person.id ASC", PERSON_COLUMNS));
        assert_eq!(params, vec![Value::Integer(3)]);
    }

    #[tokio::test]
    async fn test_has_one() {
        let stub = StubExecutor::new();
        let (persons, places) = models(&stub);
        places.use_middleware(has_one(&persons));

        let mut rome = places.new_record(Place::default());
        rome.set("id", 3).unwrap();
        rome.initialize().await;

        let (sql, _) = rome.first_resident.query(&rome).unwrap().build();
        assert!(sql.ends_with("FROM person WHERE (person.place_id = ?) ORDER BY person.id ASC"));
    }

    #[tokio::test]
    async fn test_has_many_through_join_table() {
        let stub = StubExecutor::new();
        let (persons, _places) = models(&stub);
        persons.use_middleware(has_many(&persons));

        let mut record = john(&persons);
        record.initialize().await;

        let (sql, params) = record.friends.all(&record).unwrap().build();
        assert_eq!(
            sql,
            format!(
                "SELECT {} FROM person INNER JOIN friends ON person.id = friends.friended \
                 WHERE (friends.friender = ?) ORDER BY person.id ASC",
                PERSON_COLUMNS
            )
        );
        assert_eq!(params, vec![Value::Integer(1)]);
    }

    #[tokio::test]
    async fn test_through_scope_find() {
        let stub = StubExecutor::new();
        let (persons, _places) = models(&stub);
        persons.use_middleware(has_many(&persons));

        let mut record = john(&persons);
        record.initialize().await;

        stub.push_rows(vec![person_row(2, "Jane", "Doe", "jane@doe.com", 1)]);
        let jane = record.friends.scope(&record).unwrap().find(2).await.unwrap();

        assert_eq!(jane.first_name, "Jane");
        assert!(jane.friends.is_bound());
        let (sql, params) = &stub.statements()[0];
        assert!(sql.ends_with("WHERE (friends.friender = ?) AND (person.id = ?) ORDER BY person.id ASC"));
        assert_eq!(params, &vec![Value::Integer(1), Value::Integer(2)]);
    }

    #[tokio::test]
    async fn test_belongs_to_get_fetches_related() {
        let stub = StubExecutor::new();
        let (persons, places) = models(&stub);
        persons.use_middleware(belongs_to(&places));

        let mut record = john(&persons);
        record.initialize().await;

        stub.push_rows(vec![vec![
            Value::Integer(7),
            Value::Text("Italy".to_string()),
            Value::Text("Rome".to_string()),
            Value::Integer(39),
        ]]);
        let place = record.place.get(&record).await.unwrap();
        assert_eq!(place.city, "Rome");
    }

    #[tokio::test]
    async fn test_undeclared_relation_is_recorded() {
        let stub = StubExecutor::new();
        let (persons, places) = models(&stub);
        places.use_middleware(belongs_to(&persons));

        let mut rome = places.new_record(Place::default());
        rome.initialize().await;

        assert!(matches!(
            &rome.errors()[0],
            ValidationError::Relation { relation, .. } if relation == "belongsToperson"
        ));
    }

    #[tokio::test]
    async fn test_dropped_related_model_is_recorded() {
        let stub = StubExecutor::new();
        let (persons, places) = models(&stub);
        persons.use_middleware(belongs_to(&places));
        drop(places);

        let mut record = john(&persons);
        record.initialize().await;

        assert_eq!(record.errors().len(), 1);
        assert!(!record.place.is_bound());
    }

    #[tokio::test]
    async fn test_belongs_to_follows_key_set_after_binding() {
        let stub = StubExecutor::new();
        let (persons, places) = models(&stub);
        persons.use_middleware(belongs_to(&places));

        let mut record = john(&persons);
        record.initialize().await;

        record.set("place_id", 2).unwrap();
        assert_eq!(record.place.query(&record).unwrap().build().1, vec![Value::Integer(2)]);

        record.place_id = 5;
        assert_eq!(record.place.query(&record).unwrap().build().1, vec![Value::Integer(5)]);

        stub.push_rows(vec![vec![
            Value::Integer(5),
            Value::Text("France".to_string()),
            Value::Text("Paris".to_string()),
            Value::Integer(33),
        ]]);
        let place = record.place.get(&record).await.unwrap();
        assert_eq!(place.city, "Paris");
        assert_eq!(stub.statements()[0].1, vec![Value::Integer(5)]);
    }

    #[tokio::test]
    async fn test_has_many_follows_primary_key_set_after_binding() {
        let stub = StubExecutor::new();
        let (persons, places) = models(&stub);
        places.use_middleware(has_many(&persons));

        let mut rome = places.new_record(Place::default());
        rome.set("id", 3).unwrap();
        rome.initialize().await;

        rome.id = 4;
        assert_eq!(rome.residents.all(&rome).unwrap().build().1, vec![Value::Integer(4)]);
    }
}
