use std::any::Any;

use crate::Metadata;
use crate::Result;
use crate::Value;
use crate::metadata::Member;

/// A record type mapped to one table
///
/// Usually implemented with `#[derive(Document)]`:
///
/// ```ignore
/// #[derive(Default, Document)]
/// #[ferret(table = "person", init = "prepare")]
/// pub struct Person {
///     #[ferret(column, primary_key)]
///     pub id: i64,
///     #[ferret(column, not_null)]
///     pub email: String,
///     #[ferret(column)]
///     pub place_id: i64,
///     #[ferret(belongs_to = "place")]
///     pub place: BelongsTo<Place>,
/// }
/// ```
///
/// Hand-written implementations are validated by [`Metadata::derive`] exactly
/// like derived ones.
pub trait Document: Default + Send + Sync + 'static {
    /// Default table used by [`Model::new`](crate::Model::new)
    fn table_name() -> &'static str;

    /// Declared members, in declaration order
    fn members() -> Vec<Member>;

    /// Current value of a column or transient member
    fn get_member(&self, member: &str) -> Option<Value>;

    /// Assign a column or transient member.
    ///
    /// Fails when the member is unknown or the value does not convert to the
    /// member's type.
    fn set_member(&mut self, member: &str, value: Value) -> Result<()>;

    /// Relation slot stored in `member`, for the relation binders to fill
    fn relation_slot(&mut self, _member: &str) -> Option<&mut dyn Any> {
        None
    }

    /// Embedded components, in declaration order
    fn components(&mut self) -> Vec<&mut dyn Component> {
        Vec::new()
    }

    /// Custom initialization hook, run after components are bound
    fn init(&mut self) {}
}

/// An embedded sub-object with its own binding hook
pub trait Component: Send + Sync {
    fn bind(&mut self, _metadata: &Metadata) {}

    /// Nested components, bound before this one
    fn components(&mut self) -> Vec<&mut dyn Component> {
        Vec::new()
    }
}

/// Bind `component` and everything nested in it, innermost first.
pub(crate) fn bind_component(component: &mut dyn Component, metadata: &Metadata) {
    for child in component.components() {
        bind_component(child, metadata);
    }
    component.bind(metadata);
}
