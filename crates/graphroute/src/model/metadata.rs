//! Member metadata and required-ness resolution.
//!
//! Every registered member (field, argument) carries a
//! [`MemberAnnotations`] value describing it. This replaces runtime
//! attribute scanning with explicit typed configuration supplied at
//! registration time.

use crate::model::TypeShape;

/// Tri-state required-ness of a member or argument.
///
/// `Default` defers to the underlying type: non-nullable value shapes
/// become non-null, everything else stays nullable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Requiredness {
    /// Derive required-ness from the underlying type shape.
    #[default]
    Default,
    /// The member is mandatory regardless of its shape.
    Required,
    /// The member is explicitly optional.
    NotRequired,
}

/// Declarative annotations attached to a member at registration time.
#[derive(Debug, Clone, Default)]
pub struct MemberAnnotations {
    /// Human-readable description, surfaced in the schema.
    pub description: Option<String>,
    /// Deprecation reason; presence marks the member deprecated.
    pub deprecation: Option<String>,
    /// Default value applied when the member is not supplied.
    pub default_value: Option<serde_json::Value>,
    /// Required/non-null marker.
    pub required: bool,
    /// Explicit not-required override with its configured sub-state.
    /// Wins over every other source of required-ness.
    pub not_required: Option<Requiredness>,
    /// Bypasses structural mapping: the member is mapped as this shape
    /// instead of its declared one.
    pub type_override: Option<TypeShape>,
}

impl MemberAnnotations {
    /// Creates empty annotations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the description.
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Marks the member deprecated with the given reason.
    pub fn deprecate(mut self, reason: impl Into<String>) -> Self {
        self.deprecation = Some(reason.into());
        self
    }

    /// Sets the default value.
    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Marks the member required.
    pub fn require(mut self) -> Self {
        self.required = true;
        self
    }

    /// Overrides required-ness resolution with an explicit sub-state.
    pub fn not_require(mut self, sub_state: Requiredness) -> Self {
        self.not_required = Some(sub_state);
        self
    }

    /// Maps the member as `shape` instead of its declared type.
    pub fn override_type(mut self, shape: TypeShape) -> Self {
        self.type_override = Some(shape);
        self
    }

    /// Description text, empty when absent.
    pub fn description_or_empty(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    /// Resolves the required-ness tri-state for a member of the given shape.
    ///
    /// Precedence:
    /// 1. an explicit not-required override wins outright;
    /// 2. a required marker forces `Required`, unless the shape is a
    ///    nullable wrapper, map-like, or sequence-like; optionality is
    ///    already expressible through emptiness for those shapes;
    /// 3. otherwise `Default`.
    pub fn requiredness(&self, shape: &TypeShape) -> Requiredness {
        if let Some(sub_state) = self.not_required {
            return sub_state;
        }
        if self.required
            && !shape.is_nullable_wrapper()
            && !shape.is_map_like()
            && !shape.is_sequence_like()
        {
            return Requiredness::Required;
        }
        Requiredness::Default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScalarKind;

    fn int() -> TypeShape {
        TypeShape::Scalar(ScalarKind::Int)
    }

    #[test]
    fn test_not_required_override_wins() {
        let annotations = MemberAnnotations::new()
            .require()
            .not_require(Requiredness::NotRequired);
        assert_eq!(annotations.requiredness(&int()), Requiredness::NotRequired);

        let annotations = MemberAnnotations::new()
            .require()
            .not_require(Requiredness::Default);
        assert_eq!(annotations.requiredness(&int()), Requiredness::Default);
    }

    #[test]
    fn test_required_marker_forces_required() {
        let annotations = MemberAnnotations::new().require();
        assert_eq!(annotations.requiredness(&int()), Requiredness::Required);
    }

    #[test]
    fn test_required_ignored_for_nullable_shapes() {
        let annotations = MemberAnnotations::new().require();
        let nullable = TypeShape::nullable(int());
        assert_eq!(annotations.requiredness(&nullable), Requiredness::Default);
    }

    #[test]
    fn test_required_ignored_for_sequence_and_map_shapes() {
        let annotations = MemberAnnotations::new().require();
        let sequence = TypeShape::sequence(int());
        let map = TypeShape::map(TypeShape::Scalar(ScalarKind::String), int());
        assert_eq!(annotations.requiredness(&sequence), Requiredness::Default);
        assert_eq!(annotations.requiredness(&map), Requiredness::Default);
    }

    #[test]
    fn test_unannotated_member_defaults() {
        let annotations = MemberAnnotations::new();
        assert_eq!(annotations.requiredness(&int()), Requiredness::Default);
        assert_eq!(annotations.description_or_empty(), "");
        assert!(annotations.deprecation.is_none());
        assert!(annotations.default_value.is_none());
    }
}
