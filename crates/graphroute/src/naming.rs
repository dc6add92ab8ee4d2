//! Deterministic name synthesis for schema types and fields.
//!
//! Names are derived purely from registered type descriptors, so the
//! same registry always produces the same schema. Generic types join
//! their sanitized base name and argument names with a double
//! underscore; argument names are joined with single underscores.

use crate::error::SchemaError;
use crate::model::{HostTypeRegistry, TypeDescriptor, TypeShape};

/// Strips every character outside `[0-9a-zA-Z]`.
pub fn safe_string(name: &str) -> String {
    name.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// Camel-cases an identifier: the first character is lowered, interior
/// underscores are dropped and the following character is raised.
/// Single-character names are returned unchanged.
pub fn camel_case(name: &str) -> String {
    if name.chars().count() <= 1 {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len());
    let mut raise_next = false;
    for ch in name.chars() {
        if ch == '_' {
            raise_next = true;
            continue;
        }
        if out.is_empty() {
            out.extend(ch.to_lowercase());
        } else if raise_next {
            out.extend(ch.to_uppercase());
            raise_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// The published field name for a member or method name.
pub fn graph_name(name: &str) -> String {
    safe_string(&camel_case(name))
}

/// Synthesizes schema type names from shapes, resolving named
/// references through the registry.
pub struct NameSynthesizer<'a> {
    registry: &'a HostTypeRegistry,
}

impl<'a> NameSynthesizer<'a> {
    pub fn new(registry: &'a HostTypeRegistry) -> Self {
        Self { registry }
    }

    /// The schema type name a shape synthesizes to.
    ///
    /// Nullable and asynchronous wrappers are invisible. Sequences
    /// become `List__<inner>`, maps become `Map__<key>_<value>`, and
    /// named references resolve to their descriptor's name.
    pub fn shape_name(&self, shape: &TypeShape) -> Result<String, SchemaError> {
        match shape {
            TypeShape::Scalar(kind) => Ok(kind.schema_name().to_string()),
            TypeShape::Nullable(inner) | TypeShape::Async(inner) => self.shape_name(inner),
            TypeShape::Sequence(inner) => Ok(format!("List__{}", self.shape_name(inner)?)),
            TypeShape::Map(key, value) => Ok(format!(
                "Map__{}_{}",
                self.shape_name(key)?,
                self.shape_name(value)?
            )),
            TypeShape::Named(key) => {
                let host = self.registry.expect(key)?;
                self.descriptor_name(&host.descriptor)
            }
            TypeShape::Context => Ok("Context".to_string()),
            TypeShape::Unit => Ok("String".to_string()),
        }
    }

    /// The schema type name a descriptor synthesizes to.
    ///
    /// A base name ending in `Wrapper` is invisible: the joined
    /// argument names are used alone, without the leading base or
    /// double underscore.
    pub fn descriptor_name(&self, descriptor: &TypeDescriptor) -> Result<String, SchemaError> {
        let base = safe_string(&descriptor.base_name);
        if descriptor.type_args.is_empty() {
            return Ok(base);
        }
        let args = descriptor
            .type_args
            .iter()
            .map(|shape| self.shape_name(shape))
            .collect::<Result<Vec<_>, _>>()?
            .join("_");
        if base.ends_with("Wrapper") {
            Ok(args)
        } else {
            Ok(format!("{base}__{args}"))
        }
    }
}
