//! Route descriptors: the executable entry points of a schema.
//!
//! A route binds a service method to a root field. The descriptor
//! carries everything the assembler needs to publish the field and
//! everything the resolver needs to invoke the method at request time.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;

use crate::model::{MemberAnnotations, TypeShape};
use crate::naming::graph_name;

/// A type-erased service object resolved from a [`crate::services::ServiceProvider`].
pub type ServiceInstance = Arc<dyn Any + Send + Sync>;

/// Future returned by a route handler.
pub type HandlerFuture = BoxFuture<'static, Result<serde_json::Value, String>>;

/// Invokes the bound service method with the decoded argument values.
pub type RouteHandler = Arc<dyn Fn(ServiceInstance, ArgumentValues) -> HandlerFuture + Send + Sync>;

/// Argument values decoded from a request, keyed by the argument's
/// registered name and preserving declaration order.
#[derive(Debug, Clone, Default)]
pub struct ArgumentValues {
    values: IndexMap<String, serde_json::Value>,
}

impl ArgumentValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.values.get(name)
    }

    /// Reads an argument as an integer.
    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(serde_json::Value::as_i64)
    }

    /// Reads an argument as a string slice.
    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(serde_json::Value::as_str)
    }

    /// Reads an argument as a boolean.
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(serde_json::Value::as_bool)
    }

    /// Deserializes an argument into a typed value.
    pub fn decode<T: DeserializeOwned>(&self, name: &str) -> Result<T, String> {
        let value = self
            .get(name)
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        serde_json::from_value(value).map_err(|e| format!("argument {name}: {e}"))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Renders the values as a JSON object, used in invocation diagnostics.
impl fmt::Display for ArgumentValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let object: serde_json::Map<String, serde_json::Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        write!(f, "{}", serde_json::Value::Object(object))
    }
}

/// A single declared argument of a route.
#[derive(Debug, Clone)]
pub struct ArgumentDescriptor {
    /// Registered argument name; the schema exposes its camel-cased form.
    pub name: String,
    /// Host type shape of the argument.
    pub shape: TypeShape,
    /// Annotations applied to the argument.
    pub annotations: MemberAnnotations,
}

impl ArgumentDescriptor {
    pub fn new(name: impl Into<String>, shape: TypeShape) -> Self {
        Self {
            name: name.into(),
            shape,
            annotations: MemberAnnotations::default(),
        }
    }

    /// An execution-context parameter. Never published as a schema
    /// argument and never bound from request input.
    pub fn context(name: impl Into<String>) -> Self {
        Self::new(name, TypeShape::Context)
    }

    pub fn with(mut self, annotations: MemberAnnotations) -> Self {
        self.annotations = annotations;
        self
    }
}

/// A service method published as a root field.
#[derive(Clone)]
pub struct RouteDescriptor {
    /// Name of the bound method; the default source of the field name.
    pub method_name: String,
    /// Explicit field name, published verbatim when present.
    pub name_override: Option<String>,
    /// Whether the field lands on the Mutation root instead of Query.
    pub is_mutation: bool,
    /// Service key the handler is invoked against.
    pub service: String,
    /// Declared arguments in order.
    pub arguments: Vec<ArgumentDescriptor>,
    /// Host type shape of the response.
    pub response: TypeShape,
    /// Field description.
    pub description: Option<String>,
    /// Deprecation reason.
    pub deprecation: Option<String>,
    /// The invocation closure.
    pub handler: RouteHandler,
}

impl RouteDescriptor {
    fn with_handler<F, Fut>(
        method_name: impl Into<String>,
        service: impl Into<String>,
        response: TypeShape,
        is_mutation: bool,
        handler: F,
    ) -> Self
    where
        F: Fn(ServiceInstance, ArgumentValues) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, String>> + Send + 'static,
    {
        Self {
            method_name: method_name.into(),
            name_override: None,
            is_mutation,
            service: service.into(),
            arguments: Vec::new(),
            response,
            description: None,
            deprecation: None,
            handler: Arc::new(move |instance, arguments| Box::pin(handler(instance, arguments))),
        }
    }

    /// A route published on the Query root.
    pub fn query<F, Fut>(
        method_name: impl Into<String>,
        service: impl Into<String>,
        response: TypeShape,
        handler: F,
    ) -> Self
    where
        F: Fn(ServiceInstance, ArgumentValues) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, String>> + Send + 'static,
    {
        Self::with_handler(method_name, service, response, false, handler)
    }

    /// A route published on the Mutation root.
    pub fn mutation<F, Fut>(
        method_name: impl Into<String>,
        service: impl Into<String>,
        response: TypeShape,
        handler: F,
    ) -> Self
    where
        F: Fn(ServiceInstance, ArgumentValues) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, String>> + Send + 'static,
    {
        Self::with_handler(method_name, service, response, true, handler)
    }

    /// Overrides the published field name. The override is used verbatim.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name_override = Some(name.into());
        self
    }

    /// Appends a declared argument.
    pub fn argument(mut self, argument: ArgumentDescriptor) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn deprecate(mut self, reason: impl Into<String>) -> Self {
        self.deprecation = Some(reason.into());
        self
    }

    /// The field name this route publishes: the override when present,
    /// otherwise the camel-cased method name.
    pub fn field_name(&self) -> String {
        self.name_override
            .clone()
            .unwrap_or_else(|| graph_name(&self.method_name))
    }
}

impl fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("method_name", &self.method_name)
            .field("name_override", &self.name_override)
            .field("is_mutation", &self.is_mutation)
            .field("service", &self.service)
            .field("arguments", &self.arguments)
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScalarKind;

    fn sample_route() -> RouteDescriptor {
        RouteDescriptor::query(
            "get_state",
            "StateService",
            TypeShape::Scalar(ScalarKind::Int),
            |_, _| async { Ok(serde_json::json!(1)) },
        )
    }

    #[test]
    fn test_field_name_is_camel_cased_method_name() {
        assert_eq!(sample_route().field_name(), "getState");
    }

    #[test]
    fn test_field_name_override_used_verbatim() {
        let route = sample_route().named("Exact_Name");
        assert_eq!(route.field_name(), "Exact_Name");
    }

    #[test]
    fn test_argument_values_display_renders_json() {
        let mut values = ArgumentValues::new();
        values.insert("id", serde_json::json!(5));
        values.insert("tag", serde_json::json!("a"));
        assert_eq!(values.to_string(), r#"{"id":5,"tag":"a"}"#);
    }

    #[test]
    fn test_argument_values_typed_getters() {
        let mut values = ArgumentValues::new();
        values.insert("n", serde_json::json!(7));
        values.insert("s", serde_json::json!("x"));
        values.insert("b", serde_json::json!(true));
        assert_eq!(values.int("n"), Some(7));
        assert_eq!(values.str("s"), Some("x"));
        assert_eq!(values.bool("b"), Some(true));
        assert_eq!(values.int("missing"), None);

        let decoded: Vec<i64> = {
            let mut v = ArgumentValues::new();
            v.insert("xs", serde_json::json!([1, 2, 3]));
            v.decode("xs").unwrap()
        };
        assert_eq!(decoded, vec![1, 2, 3]);
    }
}
