use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] turso::Error),

    #[error("Type conversion error: expected {expected}, got {actual}")]
    TypeConversion { expected: &'static str, actual: String },

    #[error("Unexpected null value for non-nullable field")]
    UnexpectedNull,

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("No rows returned")]
    NotFound,

    #[error("No rows affected")]
    NoRowsAffected,

    #[error("Primary key must be set for this operation")]
    PrimaryKeyNotSet,

    /// The record failed lifecycle validation; the detailed list is carried along.
    #[error("document is invalid")]
    Invalid(Vec<ValidationError>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Relation {0} is not bound")]
    RelationNotBound(String),

    #[error("Binding error: {0}")]
    Binding(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Error::Invalid(_))
    }

    /// Validation errors carried by [`Error::Invalid`], empty for every other variant.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            Error::Invalid(errors) => errors,
            _ => &[],
        }
    }
}

/// A single entry on a record's error list.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("field {field} is not present in document")]
    Presence { field: String },

    #[error("field {field} does not match the specified pattern {pattern}")]
    Format { field: String, pattern: String },

    #[error("value {value} for field {field} is not unique")]
    Uniqueness { field: String, value: String },

    #[error("combination of values [{}] for fields [{}] is not unique", .values.join(" "), .fields.join(" "))]
    UniqueCombination { fields: Vec<String>, values: Vec<String> },

    #[error("field {field} is not valid")]
    Custom { field: String },

    #[error("relation {relation} could not be bound: {reason}")]
    Relation { relation: String, reason: String },

    #[error("{0}")]
    Storage(String),

    #[error("{0}")]
    Message(String),
}

impl From<String> for ValidationError {
    fn from(message: String) -> Self {
        ValidationError::Message(message)
    }
}

impl From<&str> for ValidationError {
    fn from(message: &str) -> Self {
        ValidationError::Message(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_type_conversion() {
        let err = Error::TypeConversion { expected: "Integer", actual: "Text(hello)".to_string() };
        let display = format!("{}", err);
        assert!(display.contains("Type conversion error"));
        assert!(display.contains("Integer"));
        assert!(display.contains("Text(hello)"));
    }

    #[test]
    fn test_error_display_unexpected_null() {
        let display = format!("{}", Error::UnexpectedNull);
        assert!(display.contains("Unexpected null"));
    }

    #[test]
    fn test_error_display_unknown_field() {
        let display = format!("{}", Error::UnknownField("user_id".to_string()));
        assert!(display.contains("Unknown field"));
        assert!(display.contains("user_id"));
    }

    #[test]
    fn test_invalid_displays_generic_message() {
        let err = Error::Invalid(vec![ValidationError::Presence { field: "email".to_string() }]);
        assert_eq!(err.to_string(), "document is invalid");
        assert!(err.is_invalid());
        assert!(!err.is_not_found());
        assert_eq!(err.validation_errors().len(), 1);
    }

    #[test]
    fn test_not_found_is_distinct_from_invalid() {
        let err = Error::NotFound;
        assert!(err.is_not_found());
        assert!(!err.is_invalid());
        assert!(err.validation_errors().is_empty());
    }

    #[test]
    fn test_validation_error_messages() {
        let presence = ValidationError::Presence { field: "email".to_string() };
        assert_eq!(presence.to_string(), "field email is not present in document");

        let format = ValidationError::Format { field: "email".to_string(), pattern: "^.+@.+$".to_string() };
        assert_eq!(format.to_string(), "field email does not match the specified pattern ^.+@.+$");

        let unique = ValidationError::Uniqueness { field: "email".to_string(), value: "john@doe.com".to_string() };
        assert_eq!(unique.to_string(), "value john@doe.com for field email is not unique");

        let custom = ValidationError::Custom { field: "email".to_string() };
        assert_eq!(custom.to_string(), "field email is not valid");
    }

    #[test]
    fn test_unique_combination_message() {
        let err = ValidationError::UniqueCombination {
            fields: vec!["first_name".to_string(), "last_name".to_string()],
            values: vec!["John".to_string(), "Doe".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "combination of values [John Doe] for fields [first_name last_name] is not unique"
        );
    }

    #[test]
    fn test_message_from_str() {
        let err: ValidationError = "name is reserved".into();
        assert_eq!(err, ValidationError::Message("name is reserved".to_string()));
        assert_eq!(err.to_string(), "name is reserved");
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(Error::NotFound)
        }

        assert_eq!(returns_ok().unwrap(), 42);
        assert!(returns_err().is_err());
    }
}
