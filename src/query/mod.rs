//! Query builders for ferret

pub(crate) mod condition;
pub(crate) mod delete;
pub(crate) mod insert;
pub(crate) mod select;
pub(crate) mod update;

pub use condition::Condition;
pub use condition::Order;
pub use delete::Delete;
pub use insert::Insert;
pub use select::Join;
pub use select::JoinKind;
pub use select::Many;
pub use select::One;
pub use select::Select;
pub use select::SelectMany;
pub use select::SelectQuery;
pub use update::Update;
