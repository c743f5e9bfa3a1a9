//! Table metadata derived from a document's declared members.
//!
//! [`Metadata::derive`] walks [`Document::members`] once per registration and
//! produces the immutable column and relation descriptors every record and
//! scope of that registration shares.

use std::collections::BTreeMap;
use std::fmt;

use crate::ColumnType;
use crate::Document;
use crate::Error;
use crate::Result;

/// Variant of a declared relationship
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RelationKind {
    BelongsTo,
    HasMany,
    HasOne,
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationKind::BelongsTo => write!(f, "belongsTo"),
            RelationKind::HasMany => write!(f, "hasMany"),
            RelationKind::HasOne => write!(f, "hasOne"),
        }
    }
}

/// Column tags as declared on a member
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnTags {
    pub column:      &'static str,
    /// Explicit `type` tag, if any
    pub type_tag:    Option<&'static str>,
    /// Affinity inferred from the member's Rust type
    pub inferred:    ColumnType,
    pub default:     Option<&'static str>,
    pub not_null:    bool,
    pub primary_key: bool,
}

impl ColumnTags {
    pub fn new(column: &'static str, inferred: ColumnType) -> Self {
        Self { column, type_tag: None, inferred, default: None, not_null: false, primary_key: false }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn type_tag(mut self, tag: &'static str) -> Self {
        self.type_tag = Some(tag);
        self
    }

    pub fn default(mut self, literal: &'static str) -> Self {
        self.default = Some(literal);
        self
    }
}

/// Relation tags as declared on a member
#[derive(Clone, Debug, PartialEq)]
pub struct RelationTags {
    pub kind:        RelationKind,
    pub table:       &'static str,
    pub foreign_key: Option<&'static str>,
    pub key:         Option<&'static str>,
    pub through:     Option<&'static str>,
}

impl RelationTags {
    pub fn new(kind: RelationKind, table: &'static str) -> Self {
        Self { kind, table, foreign_key: None, key: None, through: None }
    }

    pub fn foreign_key(mut self, fk: &'static str) -> Self {
        self.foreign_key = Some(fk);
        self
    }

    pub fn key(mut self, key: &'static str) -> Self {
        self.key = Some(key);
        self
    }

    pub fn through(mut self, table: &'static str) -> Self {
        self.through = Some(table);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum MemberKind {
    Column(ColumnTags),
    Relation(RelationTags),
    /// Reachable through `get`/`set` by member name, never stored
    Transient,
    /// Embedded sub-object initialized before its owner
    Component,
}

/// One declared member of a document type, as emitted by `#[derive(Document)]`
#[derive(Clone, Debug, PartialEq)]
pub struct Member {
    pub name: &'static str,
    pub kind: MemberKind,
}

impl Member {
    pub fn column(name: &'static str, tags: ColumnTags) -> Self {
        Self { name, kind: MemberKind::Column(tags) }
    }

    pub fn relation(name: &'static str, tags: RelationTags) -> Self {
        Self { name, kind: MemberKind::Relation(tags) }
    }

    pub fn transient(name: &'static str) -> Self {
        Self { name, kind: MemberKind::Transient }
    }

    pub fn component(name: &'static str) -> Self {
        Self { name, kind: MemberKind::Component }
    }
}

/// A mapped column
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    /// Member the column is stored in
    pub name:        String,
    pub column:      String,
    pub type_name:   String,
    pub default:     Option<String>,
    pub not_null:    bool,
    pub primary_key: bool,
}

/// A declared relationship with its keys resolved
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relation {
    /// Member holding the relation slot
    pub name:        String,
    pub kind:        RelationKind,
    pub key:         String,
    pub foreign_key: String,
    pub table:       String,
    pub through:     Option<String>,
}

impl Relation {
    /// Registry key: variant followed by the related table, e.g. `belongsToplace`
    pub fn registry_key(kind: RelationKind, table: &str) -> String {
        format!("{}{}", kind, table)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    pub table:       String,
    pub primary_key: String,
    /// Mapped columns in declaration order; rows are selected in this order
    pub fields:      Vec<Field>,
    pub relations:   BTreeMap<String, Relation>,
}

impl Metadata {
    /// Build the metadata for `D` stored in `table`.
    ///
    /// Fails with [`Error::Config`] when the type maps no column, declares no
    /// primary key or more than one, repeats a storage column, or declares two
    /// relations of the same variant to the same table.
    pub fn derive<D: Document>(table: &str) -> Result<Metadata> {
        let mut fields: Vec<Field> = Vec::new();
        let mut primary_key: Option<String> = None;
        let mut pending = Vec::new();

        for member in D::members() {
            match member.kind {
                MemberKind::Column(tags) => {
                    if fields.iter().any(|f| f.column == tags.column) {
                        return Err(Error::Config(format!("column {} is mapped twice on {}", tags.column, table)));
                    }

                    if tags.primary_key {
                        if let Some(existing) = &primary_key {
                            return Err(Error::Config(format!(
                                "{} declares more than one primary key ({} and {})",
                                table, existing, tags.column
                            )));
                        }
                        primary_key = Some(tags.column.to_string());
                    }

                    fields.push(Field {
                        name:        member.name.to_string(),
                        column:      tags.column.to_string(),
                        type_name:   tags.type_tag.unwrap_or(tags.inferred.tag()).to_string(),
                        default:     tags.default.map(str::to_string),
                        not_null:    tags.not_null,
                        primary_key: tags.primary_key,
                    });
                }
                MemberKind::Relation(tags) => pending.push((member.name, tags)),
                MemberKind::Transient | MemberKind::Component => {}
            }
        }

        if fields.is_empty() {
            return Err(Error::Config(format!("{} has no mapped columns", table)));
        }

        let primary_key = primary_key.ok_or_else(|| Error::Config(format!("{} has no primary key", table)))?;

        let mut relations = BTreeMap::new();
        for (name, tags) in pending {
            let relation = resolve_relation(table, &primary_key, name, tags);
            let key = Relation::registry_key(relation.kind, &relation.table);
            if relations.contains_key(&key) {
                return Err(Error::Config(format!("{} declares relation {} twice", table, key)));
            }
            relations.insert(key, relation);
        }

        tracing::debug!("Registered {} ({} columns, {} relations)", table, fields.len(), relations.len());

        Ok(Metadata { table: table.to_string(), primary_key, fields, relations })
    }

    pub fn field(&self, column: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.column == column)
    }

    pub fn field_by_member(&self, member: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == member)
    }

    pub fn relation(&self, kind: RelationKind, table: &str) -> Option<&Relation> {
        self.relations.get(&Relation::registry_key(kind, table))
    }

    /// `table.column` for every mapped column, in select order
    pub fn qualified_columns(&self) -> Vec<String> {
        self.fields.iter().map(|f| self.qualify(&f.column)).collect()
    }

    pub fn qualify(&self, column: &str) -> String {
        format!("{}.{}", self.table, column)
    }

    /// Mapped columns other than the primary key
    pub fn value_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| !f.primary_key)
    }
}

fn resolve_relation(local: &str, local_pk: &str, name: &str, tags: RelationTags) -> Relation {
    let (key, foreign_key) = match (tags.kind, tags.through) {
        (_, Some(_)) => (format!("{}_id", tags.table), format!("{}_id", local)),
        (RelationKind::BelongsTo, None) => (format!("{}_id", tags.table), "id".to_string()),
        (RelationKind::HasMany | RelationKind::HasOne, None) => (local_pk.to_string(), format!("{}_id", local)),
    };

    Relation {
        name: name.to_string(),
        kind: tags.kind,
        key: tags.key.map(str::to_string).unwrap_or(key),
        foreign_key: tags.foreign_key.map(str::to_string).unwrap_or(foreign_key),
        table: tags.table.to_string(),
        through: tags.through.map(str::to_string),
    }
}
