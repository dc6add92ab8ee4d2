//! Maps host type shapes onto dynamic schema types.
//!
//! The mapper walks shapes on demand: referencing a named type queues
//! it for generation, and [`TypeMapper::run`] drains the queue until
//! every reachable type exists exactly once. Generation is memoized by
//! registry key and direction; two distinct host types that synthesize
//! the same schema name fail assembly instead of silently aliasing.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use async_graphql::dynamic::{
    Enum, EnumItem, Field, FieldFuture, FieldValue, InputObject, InputValue, Interface,
    InterfaceField, Object, Type, TypeRef,
};
use async_graphql::{Name, Value};
use indexmap::IndexMap;
use tracing::trace;

use crate::error::SchemaError;
use crate::model::{
    HostType, HostTypeKind, HostTypeRegistry, Requiredness, ScalarKind, SubtypePredicate,
    TypeDescriptor, TypeShape,
};
use crate::naming::{NameSynthesizer, graph_name};
use crate::types::scalars;

/// Which side of the schema a type is being mapped for. Input objects
/// get their own `Input_`-prefixed types; enums and scalars are shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Output,
    Input,
}

/// Resolves which concrete schema type an abstract-typed runtime value
/// reports as. Candidates are consulted in declaration order.
pub struct SubtypeResolver {
    interface: String,
    candidates: Vec<(SubtypePredicate, String)>,
}

impl fmt::Debug for SubtypeResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubtypeResolver")
            .field("interface", &self.interface)
            .finish_non_exhaustive()
    }
}

impl SubtypeResolver {
    pub fn interface_name(&self) -> &str {
        &self.interface
    }

    pub fn resolve(&self, value: &Value) -> Option<&str> {
        self.candidates
            .iter()
            .find(|(predicate, _)| predicate(value))
            .map(|(_, name)| name.as_str())
    }
}

/// How a resolved value is rewritten before it is handed to the engine.
#[derive(Clone)]
pub(crate) enum ValuePlan {
    Passthrough,
    /// Canonicalize date/timestamp text.
    Temporal(ScalarKind),
    /// Rewrite a string into an enum value.
    EnumValue,
    /// Apply the inner plan to every element.
    Sequence(Box<ValuePlan>),
    /// Flatten a dictionary into key/value entries, stringifying keys.
    MapEntries(Box<ValuePlan>),
    /// Attach the concrete type name resolved for an abstract value.
    Abstract(Arc<SubtypeResolver>),
}

pub(crate) fn apply_plan(plan: &ValuePlan, value: Value) -> async_graphql::Result<Value> {
    match plan {
        ValuePlan::Passthrough | ValuePlan::Abstract(_) => Ok(value),
        ValuePlan::Temporal(kind) => Ok(scalars::canonicalize(*kind, value)),
        ValuePlan::EnumValue => Ok(match value {
            Value::String(s) => Value::Enum(Name::new(s)),
            other => other,
        }),
        ValuePlan::Sequence(inner) => match value {
            Value::List(items) => Ok(Value::List(
                items
                    .into_iter()
                    .map(|item| apply_plan(inner, item))
                    .collect::<async_graphql::Result<_>>()?,
            )),
            other => Ok(other),
        },
        ValuePlan::MapEntries(value_plan) => match value {
            Value::Object(map) => {
                let mut entries = Vec::with_capacity(map.len());
                for (key, entry_value) in map {
                    let mut entry = async_graphql::indexmap::IndexMap::new();
                    entry.insert(Name::new("key"), Value::String(key.to_string()));
                    entry.insert(Name::new("value"), apply_plan(value_plan, entry_value)?);
                    entries.push(Value::Object(entry));
                }
                Ok(Value::List(entries))
            }
            other => Ok(other),
        },
    }
}

/// Applies a plan at a field boundary, producing the engine's field
/// value. Abstract values are tagged with their resolved concrete type.
pub(crate) fn plan_field_value(
    plan: &ValuePlan,
    value: Value,
) -> async_graphql::Result<Option<FieldValue<'static>>> {
    if matches!(value, Value::Null) {
        return Ok(None);
    }
    match plan {
        ValuePlan::Abstract(resolver) => {
            let type_name = resolver
                .resolve(&value)
                .ok_or_else(|| {
                    async_graphql::Error::new(format!(
                        "no known subtype matched a value of {}",
                        resolver.interface_name()
                    ))
                })?
                .to_string();
            Ok(Some(FieldValue::value(value).with_type(type_name)))
        }
        ValuePlan::Sequence(inner) if attaches_types(inner) => {
            let Value::List(items) = value else {
                return Ok(Some(FieldValue::value(value)));
            };
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match plan_field_value(inner, item)? {
                    Some(resolved) => out.push(resolved),
                    None => out.push(FieldValue::NULL),
                }
            }
            Ok(Some(FieldValue::list(out)))
        }
        _ => Ok(Some(FieldValue::value(apply_plan(plan, value)?))),
    }
}

/// Whether a plan carries abstract values at any sequence depth, so
/// their elements must be resolved into tagged field values instead of
/// plain engine values.
fn attaches_types(plan: &ValuePlan) -> bool {
    match plan {
        ValuePlan::Abstract(_) => true,
        ValuePlan::Sequence(inner) => attaches_types(inner),
        _ => false,
    }
}

/// Generates dynamic schema types from the host type registry.
pub struct TypeMapper {
    registry: Arc<HostTypeRegistry>,
    /// (key, direction) pairs already queued or generated.
    generated: HashSet<(String, Direction)>,
    /// Generation work not yet performed.
    pending: VecDeque<(String, Direction)>,
    /// Schema type names already claimed, for collision detection.
    names: HashSet<String>,
    /// Finished types awaiting registration.
    types: Vec<Type>,
    /// Subtype resolvers built so far, keyed by registry key.
    resolvers: IndexMap<String, Arc<SubtypeResolver>>,
}

impl TypeMapper {
    pub fn new(registry: Arc<HostTypeRegistry>) -> Self {
        Self {
            registry,
            generated: HashSet::new(),
            pending: VecDeque::new(),
            names: HashSet::new(),
            types: Vec::new(),
            resolvers: IndexMap::new(),
        }
    }

    /// The schema type reference for a shape under the given
    /// required-ness and direction. Referencing a named type queues its
    /// generation.
    pub fn type_ref(
        &mut self,
        shape: &TypeShape,
        requiredness: Requiredness,
        direction: Direction,
    ) -> Result<TypeRef, SchemaError> {
        let (base, default_non_null) = self.base_type_ref(shape, direction)?;
        let non_null = match requiredness {
            Requiredness::Required => true,
            Requiredness::NotRequired => false,
            Requiredness::Default => default_non_null,
        };
        Ok(if non_null {
            TypeRef::NonNull(Box::new(base))
        } else {
            base
        })
    }

    /// The nullable base reference for a shape, plus whether the shape
    /// is non-null by default.
    fn base_type_ref(
        &mut self,
        shape: &TypeShape,
        direction: Direction,
    ) -> Result<(TypeRef, bool), SchemaError> {
        match shape {
            TypeShape::Scalar(kind) => {
                Ok((TypeRef::named(kind.schema_name()), kind.is_value_kind()))
            }
            TypeShape::Nullable(inner) => {
                let (base, _) = self.base_type_ref(inner, direction)?;
                Ok((base, false))
            }
            TypeShape::Async(inner) => self.base_type_ref(inner, direction),
            TypeShape::Sequence(inner) => {
                let element = self.type_ref(inner, Requiredness::Default, direction)?;
                Ok((TypeRef::List(Box::new(element)), false))
            }
            TypeShape::Map(key, value) => {
                let entry = self.generate_entry_type(key, value, direction)?;
                let element = TypeRef::NonNull(Box::new(TypeRef::named(entry)));
                Ok((TypeRef::List(Box::new(element)), false))
            }
            TypeShape::Named(key) => {
                let host = self.registry.expect(key)?.clone();
                let name = self.synthesize(&host.descriptor)?;
                match host.kind {
                    HostTypeKind::Enum => {
                        self.queue(key.clone(), Direction::Output);
                        Ok((TypeRef::named(name), true))
                    }
                    HostTypeKind::Object => {
                        self.queue(key.clone(), direction);
                        let name = match direction {
                            Direction::Output => name,
                            Direction::Input => format!("Input_{name}"),
                        };
                        Ok((TypeRef::named(name), false))
                    }
                    HostTypeKind::Abstract => {
                        if direction == Direction::Input {
                            return Err(SchemaError::KindMismatch {
                                type_name: key.clone(),
                                expected: "a concrete object type for input mapping",
                            });
                        }
                        self.queue(key.clone(), Direction::Output);
                        Ok((TypeRef::named(name), false))
                    }
                }
            }
            TypeShape::Context => Err(SchemaError::Build(
                "execution-context parameters have no schema representation".to_string(),
            )),
            TypeShape::Unit => Ok((TypeRef::named(TypeRef::STRING), false)),
        }
    }

    /// The value rewrite plan for a shape.
    pub(crate) fn value_plan(&mut self, shape: &TypeShape) -> Result<ValuePlan, SchemaError> {
        match shape {
            TypeShape::Scalar(kind) if kind.is_temporal() => Ok(ValuePlan::Temporal(*kind)),
            TypeShape::Scalar(_) | TypeShape::Context | TypeShape::Unit => {
                Ok(ValuePlan::Passthrough)
            }
            TypeShape::Nullable(inner) | TypeShape::Async(inner) => self.value_plan(inner),
            TypeShape::Sequence(inner) => {
                Ok(ValuePlan::Sequence(Box::new(self.value_plan(inner)?)))
            }
            TypeShape::Map(_, value) => {
                Ok(ValuePlan::MapEntries(Box::new(self.value_plan(value)?)))
            }
            TypeShape::Named(key) => {
                let host = self.registry.expect(key)?.clone();
                match host.kind {
                    HostTypeKind::Enum => Ok(ValuePlan::EnumValue),
                    HostTypeKind::Object => Ok(ValuePlan::Passthrough),
                    HostTypeKind::Abstract => {
                        Ok(ValuePlan::Abstract(self.subtype_resolver(key)?))
                    }
                }
            }
        }
    }

    /// The resolver dispatching runtime values of an abstract type to
    /// their concrete schema types. Building it queues every candidate.
    pub fn subtype_resolver(&mut self, key: &str) -> Result<Arc<SubtypeResolver>, SchemaError> {
        if let Some(resolver) = self.resolvers.get(key) {
            return Ok(resolver.clone());
        }
        let host = self.registry.expect(key)?.clone();
        if host.kind != HostTypeKind::Abstract {
            return Err(SchemaError::KindMismatch {
                type_name: key.to_string(),
                expected: "an abstract type",
            });
        }
        let interface = self.synthesize(&host.descriptor)?;
        let mut candidates = Vec::with_capacity(host.known_subtypes.len());
        for subtype in &host.known_subtypes {
            let target = self.registry.expect(&subtype.target)?.clone();
            if target.kind != HostTypeKind::Object {
                return Err(SchemaError::KindMismatch {
                    type_name: subtype.target.clone(),
                    expected: "a concrete object type",
                });
            }
            let target_name = self.synthesize(&target.descriptor)?;
            self.queue(subtype.target.clone(), Direction::Output);
            candidates.push((subtype.matches.clone(), target_name));
        }
        let resolver = Arc::new(SubtypeResolver {
            interface,
            candidates,
        });
        self.resolvers.insert(key.to_string(), resolver.clone());
        Ok(resolver)
    }

    /// Drains the generation queue until every reachable type exists.
    pub fn run(&mut self) -> Result<(), SchemaError> {
        while let Some((key, direction)) = self.pending.pop_front() {
            let host = self.registry.expect(&key)?.clone();
            match (host.kind, direction) {
                (HostTypeKind::Object, Direction::Output) => self.generate_object(&host)?,
                (HostTypeKind::Object, Direction::Input) => self.generate_input(&host)?,
                (HostTypeKind::Enum, _) => self.generate_enum(&host)?,
                (HostTypeKind::Abstract, _) => self.generate_interface(&host)?,
            }
        }
        Ok(())
    }

    /// All generated types, consuming the mapper.
    pub fn into_types(self) -> Vec<Type> {
        self.types
    }

    fn synthesize(&self, descriptor: &TypeDescriptor) -> Result<String, SchemaError> {
        NameSynthesizer::new(&self.registry).descriptor_name(descriptor)
    }

    fn queue(&mut self, key: String, direction: Direction) {
        if self.generated.insert((key.clone(), direction)) {
            self.pending.push_back((key, direction));
        }
    }

    /// Claims a schema type name and stores the finished type.
    fn finish(&mut self, name: String, schema_type: impl Into<Type>) -> Result<(), SchemaError> {
        if !self.names.insert(name.clone()) {
            return Err(SchemaError::DuplicateTypeName { name });
        }
        trace!(type_name = %name, "generated schema type");
        self.types.push(schema_type.into());
        Ok(())
    }

    /// Members ordered by their published field name, for stable output.
    fn ordered_members<'h>(host: &'h HostType) -> Vec<&'h crate::model::MemberDescriptor> {
        let mut members: Vec<_> = host.members.iter().collect();
        members.sort_by_key(|member| graph_name(&member.name));
        members
    }

    fn generate_object(&mut self, host: &HostType) -> Result<(), SchemaError> {
        if host.kind != HostTypeKind::Object {
            return Err(SchemaError::KindMismatch {
                type_name: host.key.clone(),
                expected: "a concrete object type",
            });
        }
        let name = self.synthesize(&host.descriptor)?;
        let mut object = Object::new(&name);
        if let Some(description) = &host.description {
            object = object.description(description);
        }
        for interface_key in &host.implements {
            let interface = self.registry.expect(interface_key)?.clone();
            if interface.kind != HostTypeKind::Abstract {
                return Err(SchemaError::KindMismatch {
                    type_name: interface_key.clone(),
                    expected: "an abstract type",
                });
            }
            object = object.implement(self.synthesize(&interface.descriptor)?);
            self.queue(interface_key.clone(), Direction::Output);
        }
        let members = Self::ordered_members(host);
        if members.is_empty() {
            object = object.field(placeholder_field());
        }
        for member in members {
            let shape = member
                .annotations
                .type_override
                .as_ref()
                .unwrap_or(&member.shape);
            let requiredness = member.annotations.requiredness(&member.shape);
            let type_ref = self.type_ref(shape, requiredness, Direction::Output)?;
            let plan = self.value_plan(shape)?;
            let mut field = member_field(graph_name(&member.name), member.name.clone(), type_ref, plan);
            if let Some(description) = &member.annotations.description {
                field = field.description(description);
            }
            if let Some(reason) = &member.annotations.deprecation {
                field = field.deprecation(Some(reason.as_str()));
            }
            object = object.field(field);
        }
        self.finish(name, object)
    }

    fn generate_input(&mut self, host: &HostType) -> Result<(), SchemaError> {
        let name = format!("Input_{}", self.synthesize(&host.descriptor)?);
        let mut input = InputObject::new(&name);
        if let Some(description) = &host.description {
            input = input.description(description);
        }
        let members = Self::ordered_members(host);
        if members.is_empty() {
            input = input.field(InputValue::new("_placeholder", TypeRef::named(TypeRef::STRING)));
        }
        for member in members {
            let shape = member
                .annotations
                .type_override
                .as_ref()
                .unwrap_or(&member.shape);
            let requiredness = member.annotations.requiredness(&member.shape);
            let type_ref = self.type_ref(shape, requiredness, Direction::Input)?;
            let mut field = InputValue::new(graph_name(&member.name), type_ref);
            if let Some(description) = &member.annotations.description {
                field = field.description(description);
            }
            if let Some(default) = &member.annotations.default_value {
                field = field.default_value(crate::schema::json_to_graphql_value(default.clone()));
            }
            input = input.field(field);
        }
        self.finish(name, input)
    }

    fn generate_enum(&mut self, host: &HostType) -> Result<(), SchemaError> {
        let name = self.synthesize(&host.descriptor)?;
        let mut schema_enum = Enum::new(&name);
        if let Some(description) = &host.description {
            schema_enum = schema_enum.description(description);
        }
        for variant in &host.variants {
            let mut item = EnumItem::new(&variant.name);
            if let Some(description) = &variant.description {
                item = item.description(description);
            }
            if let Some(reason) = &variant.deprecation {
                item = item.deprecation(Some(reason.as_str()));
            }
            schema_enum = schema_enum.item(item);
        }
        self.finish(name, schema_enum)
    }

    fn generate_interface(&mut self, host: &HostType) -> Result<(), SchemaError> {
        if host.kind != HostTypeKind::Abstract {
            return Err(SchemaError::KindMismatch {
                type_name: host.key.clone(),
                expected: "an abstract type",
            });
        }
        let name = self.synthesize(&host.descriptor)?;
        let mut interface = Interface::new(&name);
        if let Some(description) = &host.description {
            interface = interface.description(description);
        }
        let members = Self::ordered_members(host);
        if members.is_empty() {
            interface = interface.field(InterfaceField::new(
                "_placeholder",
                TypeRef::named(TypeRef::STRING),
            ));
        }
        for member in members {
            let shape = member
                .annotations
                .type_override
                .as_ref()
                .unwrap_or(&member.shape);
            let requiredness = member.annotations.requiredness(&member.shape);
            let type_ref = self.type_ref(shape, requiredness, Direction::Output)?;
            let mut field = InterfaceField::new(graph_name(&member.name), type_ref);
            if let Some(description) = &member.annotations.description {
                field = field.description(description);
            }
            interface = interface.field(field);
        }
        // Candidate objects must exist even when no field requested them.
        self.subtype_resolver(&host.key)?;
        self.finish(name, interface)
    }

    /// Generates the key/value entry object a dictionary publishes as.
    /// Keys are always strings; values keep the dictionary's value type.
    fn generate_entry_type(
        &mut self,
        key: &TypeShape,
        value: &TypeShape,
        direction: Direction,
    ) -> Result<String, SchemaError> {
        let descriptor =
            TypeDescriptor::generic("KeyValuePair", vec![key.clone(), value.clone()]);
        let base = self.synthesize(&descriptor)?;
        let name = match direction {
            Direction::Output => base,
            Direction::Input => format!("Input_{base}"),
        };
        // Entry names are fully determined by their shapes, so an
        // existing entry type with this name is the same type.
        if self.names.contains(&name) {
            return Ok(name);
        }
        match direction {
            Direction::Output => {
                let value_ref = self.type_ref(value, Requiredness::Default, direction)?;
                let value_plan = self.value_plan(value)?;
                let key_ref = TypeRef::NonNull(Box::new(TypeRef::named(TypeRef::STRING)));
                let entry = Object::new(&name)
                    .field(member_field(
                        "key".to_string(),
                        "key".to_string(),
                        key_ref,
                        ValuePlan::Passthrough,
                    ))
                    .field(member_field(
                        "value".to_string(),
                        "value".to_string(),
                        value_ref,
                        value_plan,
                    ));
                self.finish(name.clone(), entry)?;
            }
            Direction::Input => {
                let value_ref = self.type_ref(value, Requiredness::Default, direction)?;
                let key_ref = TypeRef::NonNull(Box::new(TypeRef::named(TypeRef::STRING)));
                let entry = InputObject::new(&name)
                    .field(InputValue::new("key", key_ref))
                    .field(InputValue::new("value", value_ref));
                self.finish(name.clone(), entry)?;
            }
        }
        Ok(name)
    }
}

/// A field resolving a named property out of the parent's object value.
fn member_field(field_name: String, source_name: String, type_ref: TypeRef, plan: ValuePlan) -> Field {
    Field::new(field_name, type_ref, move |ctx| {
        let source_name = source_name.clone();
        let plan = plan.clone();
        FieldFuture::new(async move {
            if let Some(Value::Object(parent)) = ctx.parent_value.as_value() {
                match parent.get(&Name::new(&source_name)) {
                    Some(value) => plan_field_value(&plan, value.clone()),
                    None => Ok(None),
                }
            } else {
                Ok(None)
            }
        })
    })
}

/// Keeps an otherwise empty composite type valid. Always resolves null.
fn placeholder_field() -> Field {
    Field::new("_placeholder", TypeRef::named(TypeRef::STRING), |_| {
        FieldFuture::new(async { Ok(None::<FieldValue>) })
    })
}
