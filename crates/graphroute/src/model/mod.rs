//! Host type model.
//!
//! Schemas are generated from explicit descriptions of the host
//! application's types. [`TypeShape`] describes the structure of a
//! value, [`HostType`] describes a registered named type, and the
//! [`HostTypeRegistry`] holds everything the mapper may need to reach
//! through structural references.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

pub mod metadata;
pub mod routes;

pub use metadata::{MemberAnnotations, Requiredness};
pub use routes::{
    ArgumentDescriptor, ArgumentValues, HandlerFuture, RouteDescriptor, RouteHandler,
    ServiceInstance,
};

use crate::error::SchemaError;

/// Built-in scalar kinds understood by the mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Int,
    Long,
    Float,
    Decimal,
    String,
    Id,
    Boolean,
    Date,
    DateTime,
    DateTimeOffset,
    Duration,
    Bytes,
}

impl ScalarKind {
    /// The schema type name this scalar maps to.
    pub fn schema_name(self) -> &'static str {
        match self {
            ScalarKind::Int => "Int",
            ScalarKind::Long => "Long",
            ScalarKind::Float => "Float",
            ScalarKind::Decimal => "Decimal",
            ScalarKind::String => "String",
            ScalarKind::Id => "ID",
            ScalarKind::Boolean => "Boolean",
            ScalarKind::Date => "Date",
            ScalarKind::DateTime => "DateTime",
            ScalarKind::DateTimeOffset => "DateTimeOffset",
            ScalarKind::Duration => "Duration",
            ScalarKind::Bytes => "Base64",
        }
    }

    /// Whether the scalar is a value kind, non-null by default under
    /// `Requiredness::Default`. Reference-like scalars (strings, ids,
    /// byte blobs) stay nullable.
    pub fn is_value_kind(self) -> bool {
        !matches!(self, ScalarKind::String | ScalarKind::Id | ScalarKind::Bytes)
    }

    /// Whether incoming and outgoing string values are canonicalized
    /// as dates or timestamps.
    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            ScalarKind::Date | ScalarKind::DateTime | ScalarKind::DateTimeOffset
        )
    }
}

/// Structural description of a host value.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeShape {
    /// A built-in scalar.
    Scalar(ScalarKind),
    /// An explicitly optional wrapper around the inner shape.
    Nullable(Box<TypeShape>),
    /// An ordered collection of the inner shape.
    Sequence(Box<TypeShape>),
    /// A key/value dictionary. Published as a list of key/value pair
    /// objects, never as a schema map.
    Map(Box<TypeShape>, Box<TypeShape>),
    /// A reference to a registered [`HostType`] by registry key.
    Named(String),
    /// An asynchronous wrapper; invisible in the schema.
    Async(Box<TypeShape>),
    /// An execution-context parameter; never published.
    Context,
    /// No meaningful value. Routes returning this publish a nullable
    /// String field that always resolves to null.
    Unit,
}

impl TypeShape {
    pub fn named(key: impl Into<String>) -> Self {
        TypeShape::Named(key.into())
    }

    pub fn nullable(inner: TypeShape) -> Self {
        TypeShape::Nullable(Box::new(inner))
    }

    pub fn sequence(inner: TypeShape) -> Self {
        TypeShape::Sequence(Box::new(inner))
    }

    pub fn map(key: TypeShape, value: TypeShape) -> Self {
        TypeShape::Map(Box::new(key), Box::new(value))
    }

    pub fn async_result(inner: TypeShape) -> Self {
        TypeShape::Async(Box::new(inner))
    }

    /// Peels an asynchronous wrapper, if any.
    pub fn unwrap_async(&self) -> &TypeShape {
        match self {
            TypeShape::Async(inner) => inner.unwrap_async(),
            other => other,
        }
    }

    pub fn is_nullable_wrapper(&self) -> bool {
        matches!(self, TypeShape::Nullable(_))
    }

    pub fn is_sequence_like(&self) -> bool {
        matches!(self, TypeShape::Sequence(_))
    }

    pub fn is_map_like(&self) -> bool {
        matches!(self, TypeShape::Map(_, _))
    }
}

/// The raw identity of a host type: its base name plus any generic
/// type arguments. Name synthesis works from this.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    /// Unsanitized base name of the host type.
    pub base_name: String,
    /// Generic type arguments, empty for plain types.
    pub type_args: Vec<TypeShape>,
}

impl TypeDescriptor {
    pub fn simple(base_name: impl Into<String>) -> Self {
        Self {
            base_name: base_name.into(),
            type_args: Vec::new(),
        }
    }

    pub fn generic(base_name: impl Into<String>, type_args: Vec<TypeShape>) -> Self {
        Self {
            base_name: base_name.into(),
            type_args,
        }
    }
}

/// Kind of a registered host type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostTypeKind {
    /// A concrete object with members.
    Object,
    /// An interface-like type with members and known subtypes.
    Abstract,
    /// A closed set of named variants.
    Enum,
}

/// A named member of an object or abstract type.
#[derive(Debug, Clone)]
pub struct MemberDescriptor {
    pub name: String,
    pub shape: TypeShape,
    pub annotations: MemberAnnotations,
}

/// A variant of an enum host type.
#[derive(Debug, Clone)]
pub struct EnumVariant {
    pub name: String,
    pub description: Option<String>,
    pub deprecation: Option<String>,
}

impl EnumVariant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            deprecation: None,
        }
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn deprecate(mut self, reason: impl Into<String>) -> Self {
        self.deprecation = Some(reason.into());
        self
    }
}

/// Decides whether a runtime value belongs to a concrete subtype.
pub type SubtypePredicate = Arc<dyn Fn(&async_graphql::Value) -> bool + Send + Sync>;

/// A concrete subtype candidate of an abstract type, with the
/// predicate that claims runtime values for it.
#[derive(Clone)]
pub struct KnownSubtype {
    /// Registry key of the concrete host type.
    pub target: String,
    /// Claims a runtime value for the target.
    pub matches: SubtypePredicate,
}

impl KnownSubtype {
    pub fn new<F>(target: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&async_graphql::Value) -> bool + Send + Sync + 'static,
    {
        Self {
            target: target.into(),
            matches: Arc::new(predicate),
        }
    }

    /// A subtype claimed by a string discriminator field in the value.
    pub fn tagged(
        target: impl Into<String>,
        tag_field: impl Into<String>,
        tag_value: impl Into<String>,
    ) -> Self {
        let tag_field = tag_field.into();
        let tag_value = tag_value.into();
        Self::new(target, move |value| {
            if let async_graphql::Value::Object(object) = value {
                matches!(
                    object.get(&async_graphql::Name::new(&tag_field)),
                    Some(async_graphql::Value::String(s)) if *s == tag_value
                )
            } else {
                false
            }
        })
    }
}

impl fmt::Debug for KnownSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnownSubtype")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// A registered host type.
#[derive(Debug, Clone)]
pub struct HostType {
    /// Registry key. [`TypeShape::Named`] references resolve through it.
    pub key: String,
    /// Raw identity driving name synthesis.
    pub descriptor: TypeDescriptor,
    pub kind: HostTypeKind,
    pub description: Option<String>,
    /// Members, for object and abstract kinds.
    pub members: Vec<MemberDescriptor>,
    /// Variants, for the enum kind.
    pub variants: Vec<EnumVariant>,
    /// Registry keys of abstract types this object implements.
    pub implements: Vec<String>,
    /// Concrete subtype candidates, for the abstract kind. Consulted
    /// in declaration order, first match wins.
    pub known_subtypes: Vec<KnownSubtype>,
}

impl HostType {
    fn with_kind(key: impl Into<String>, descriptor: TypeDescriptor, kind: HostTypeKind) -> Self {
        Self {
            key: key.into(),
            descriptor,
            kind,
            description: None,
            members: Vec::new(),
            variants: Vec::new(),
            implements: Vec::new(),
            known_subtypes: Vec::new(),
        }
    }

    /// A plain concrete object; the key doubles as the base name.
    pub fn object(name: &str) -> Self {
        Self::with_kind(name, TypeDescriptor::simple(name), HostTypeKind::Object)
    }

    /// A generic concrete object. The key identifies this instantiation;
    /// the descriptor carries the base name and type arguments.
    pub fn generic_object(key: &str, base_name: &str, type_args: Vec<TypeShape>) -> Self {
        Self::with_kind(
            key,
            TypeDescriptor::generic(base_name, type_args),
            HostTypeKind::Object,
        )
    }

    /// An abstract (interface-like) type.
    pub fn interface(name: &str) -> Self {
        Self::with_kind(name, TypeDescriptor::simple(name), HostTypeKind::Abstract)
    }

    /// An enum type.
    pub fn enumeration(name: &str) -> Self {
        Self::with_kind(name, TypeDescriptor::simple(name), HostTypeKind::Enum)
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Appends a member with default annotations.
    pub fn member(self, name: impl Into<String>, shape: TypeShape) -> Self {
        self.member_with(name, shape, MemberAnnotations::default())
    }

    /// Appends a member with explicit annotations.
    pub fn member_with(
        mut self,
        name: impl Into<String>,
        shape: TypeShape,
        annotations: MemberAnnotations,
    ) -> Self {
        self.members.push(MemberDescriptor {
            name: name.into(),
            shape,
            annotations,
        });
        self
    }

    /// Appends an enum variant.
    pub fn variant(mut self, name: impl Into<String>) -> Self {
        self.variants.push(EnumVariant::new(name));
        self
    }

    /// Appends a fully described enum variant.
    pub fn variant_with(mut self, variant: EnumVariant) -> Self {
        self.variants.push(variant);
        self
    }

    /// Declares that this object implements the abstract type `key`.
    pub fn implements(mut self, key: impl Into<String>) -> Self {
        self.implements.push(key.into());
        self
    }

    /// Declares a concrete subtype candidate of this abstract type.
    pub fn known_subtype(mut self, subtype: KnownSubtype) -> Self {
        self.known_subtypes.push(subtype);
        self
    }
}

/// All host types a schema may reference, keyed by registry key.
///
/// Insertion order is preserved; registering a key twice replaces the
/// earlier entry.
#[derive(Debug, Clone, Default)]
pub struct HostTypeRegistry {
    types: IndexMap<String, Arc<HostType>>,
}

impl HostTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, host_type: HostType) -> &mut Self {
        self.types.insert(host_type.key.clone(), Arc::new(host_type));
        self
    }

    pub fn get(&self, key: &str) -> Option<&Arc<HostType>> {
        self.types.get(key)
    }

    /// Resolves a key, failing with [`SchemaError::UnknownType`] when absent.
    pub fn expect(&self, key: &str) -> Result<&Arc<HostType>, SchemaError> {
        self.types.get(key).ok_or_else(|| SchemaError::UnknownType {
            name: key.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<HostType>> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
