//! Error types for schema generation.
//!
//! All errors in this module are raised while the schema is being
//! assembled. They are fatal: a schema that fails to assemble is never
//! served, so every variant names the offending identifier for quick
//! diagnosis. Request-time failures never use these types; they travel
//! in the `{data, errors}` shape returned by the operation governor.

/// Errors that can occur while building a schema from registered host types.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A host type was used where a different kind was required, for
    /// example an abstract type on the object-mapping path.
    #[error("type {type_name} must be {expected}")]
    KindMismatch {
        /// Name of the host type that was rejected.
        type_name: String,
        /// Description of the kind that was expected.
        expected: &'static str,
    },

    /// Two routes resolved to the same field name within one root type.
    #[error("duplicate route field name: {name}")]
    DuplicateRouteField {
        /// The field name produced by both routes.
        name: String,
    },

    /// Two distinct host types synthesized the same schema type name.
    #[error("duplicate schema type name: {name}")]
    DuplicateTypeName {
        /// The colliding synthesized name.
        name: String,
    },

    /// A shape referenced a host type that was never registered.
    #[error("unknown host type: {name}")]
    UnknownType {
        /// The registry key that failed to resolve.
        name: String,
    },

    /// Mutation routes exist but no query routes do. The target engine
    /// requires a Query root, and empty roots are never published.
    #[error("schema has mutation routes but no query routes")]
    MissingQueryRoot,

    /// The underlying engine rejected the assembled schema.
    #[error("failed to build schema: {0}")]
    Build(String),
}
