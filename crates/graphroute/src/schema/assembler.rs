//! Assembles registered routes and host types into an executable schema.

use std::collections::HashSet;
use std::sync::Arc;

use async_graphql::Value;
use async_graphql::dynamic::{Field, FieldFuture, InputValue, Object, Schema, TypeRef};
use tracing::{debug, trace};

use crate::error::SchemaError;
use crate::model::{
    ArgumentValues, HostTypeKind, HostTypeRegistry, Requiredness, RouteDescriptor, TypeShape,
};
use crate::naming::graph_name;
use crate::schema::mapper::{Direction, TypeMapper, plan_field_value};
use crate::schema::{graphql_value_to_json, json_to_graphql_value};
use crate::services::ServiceProvider;
use crate::types::scalars;

/// Engine limits applied to the assembled schema.
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Maximum query depth.
    pub max_depth: usize,
    /// Maximum query complexity.
    pub max_complexity: usize,
    /// Whether introspection queries are answered.
    pub introspection_enabled: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            max_depth: 15,
            max_complexity: 500,
            introspection_enabled: true,
        }
    }
}

/// Builds a dynamic schema from a host type registry, a set of routes,
/// and a service provider for handler invocation.
pub struct SchemaAssembler {
    registry: Arc<HostTypeRegistry>,
    services: Arc<dyn ServiceProvider>,
    routes: Vec<RouteDescriptor>,
    config: AssemblerConfig,
}

impl SchemaAssembler {
    pub fn new(registry: Arc<HostTypeRegistry>, services: Arc<dyn ServiceProvider>) -> Self {
        Self {
            registry,
            services,
            routes: Vec::new(),
            config: AssemblerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AssemblerConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a route.
    pub fn route(mut self, route: RouteDescriptor) -> Self {
        self.routes.push(route);
        self
    }

    /// Adds several routes.
    pub fn routes(mut self, routes: impl IntoIterator<Item = RouteDescriptor>) -> Self {
        self.routes.extend(routes);
        self
    }

    /// Assembles the executable schema.
    ///
    /// Fails when two routes publish the same field name on one root,
    /// when only mutation routes exist, or when type mapping rejects a
    /// registered shape.
    pub fn assemble(self) -> Result<Schema, SchemaError> {
        debug!(route_count = self.routes.len(), "assembling schema");

        let mut mapper = TypeMapper::new(self.registry.clone());
        let mut query_fields = Vec::new();
        let mut mutation_fields = Vec::new();
        let mut seen_query = HashSet::new();
        let mut seen_mutation = HashSet::new();

        for route in &self.routes {
            let field_name = route.field_name();
            let seen = if route.is_mutation {
                &mut seen_mutation
            } else {
                &mut seen_query
            };
            if !seen.insert(field_name.clone()) {
                return Err(SchemaError::DuplicateRouteField { name: field_name });
            }
            trace!(field = %field_name, mutation = route.is_mutation, "publishing route");
            let field = self.route_field(&mut mapper, route, field_name)?;
            if route.is_mutation {
                mutation_fields.push(field);
            } else {
                query_fields.push(field);
            }
        }

        if query_fields.is_empty() {
            if mutation_fields.is_empty() {
                return Err(SchemaError::Build("no routes registered".to_string()));
            }
            return Err(SchemaError::MissingQueryRoot);
        }

        mapper.run()?;

        let has_mutation = !mutation_fields.is_empty();
        let mut builder = Schema::build("Query", has_mutation.then_some("Mutation"), None);
        builder = scalars::register_scalars(builder);

        let mut query = Object::new("Query").description("Root query operations");
        for field in query_fields {
            query = query.field(field);
        }
        builder = builder.register(query);

        if has_mutation {
            let mut mutation = Object::new("Mutation").description("Root mutation operations");
            for field in mutation_fields {
                mutation = mutation.field(field);
            }
            builder = builder.register(mutation);
        }

        for schema_type in mapper.into_types() {
            builder = builder.register(schema_type);
        }

        builder = builder
            .limit_depth(self.config.max_depth)
            .limit_complexity(self.config.max_complexity);
        if !self.config.introspection_enabled {
            builder = builder.disable_introspection();
        }

        builder
            .finish()
            .map_err(|e| SchemaError::Build(e.to_string()))
    }

    /// Builds the root field for one route, including its resolver.
    fn route_field(
        &self,
        mapper: &mut TypeMapper,
        route: &RouteDescriptor,
        field_name: String,
    ) -> Result<Field, SchemaError> {
        let response_shape = route.response.unwrap_async().clone();
        let type_ref = match &response_shape {
            TypeShape::Unit => TypeRef::named(TypeRef::STRING),
            shape => mapper.type_ref(shape, Requiredness::Default, Direction::Output)?,
        };
        let plan = mapper.value_plan(&response_shape)?;

        let mut argument_inputs = Vec::new();
        let mut specs = Vec::new();
        for argument in &route.arguments {
            // Execution-context parameters are invisible to callers.
            if matches!(argument.shape, TypeShape::Context) {
                continue;
            }
            let requiredness = argument.annotations.requiredness(&argument.shape);
            let shape = argument
                .annotations
                .type_override
                .as_ref()
                .unwrap_or(&argument.shape);
            let argument_ref = mapper.type_ref(shape, requiredness, Direction::Input)?;
            let published = graph_name(&argument.name);
            let mut input = InputValue::new(&published, argument_ref);
            if let Some(description) = &argument.annotations.description {
                input = input.description(description);
            }
            if let Some(default) = &argument.annotations.default_value {
                input = input.default_value(json_to_graphql_value(default.clone()));
            }
            argument_inputs.push(input);
            specs.push(ArgumentSpec {
                name: argument.name.clone(),
                published,
                shape: shape.clone(),
                default: argument.annotations.default_value.clone(),
            });
        }

        let services = self.services.clone();
        let registry = self.registry.clone();
        let handler = route.handler.clone();
        let service = route.service.clone();
        let method = route.method_name.clone();
        let specs = Arc::new(specs);

        let mut field = Field::new(field_name, type_ref, move |ctx| {
            let services = services.clone();
            let registry = registry.clone();
            let handler = handler.clone();
            let service = service.clone();
            let method = method.clone();
            let specs = specs.clone();
            let plan = plan.clone();
            FieldFuture::new(async move {
                let Some(instance) = services.get(&service) else {
                    return Err(async_graphql::Error::new(format!(
                        "no service registered for {service}"
                    )));
                };

                let supplied = ctx.args.as_index_map();
                let mut values = ArgumentValues::new();
                for spec in specs.iter() {
                    let decoded = match supplied.get(&async_graphql::Name::new(&spec.published)) {
                        Some(value) => decode_argument(&registry, &spec.shape, value.clone()),
                        None => spec.default.clone().unwrap_or(serde_json::Value::Null),
                    };
                    values.insert(spec.name.clone(), decoded);
                }

                let result = handler(instance, values.clone()).await.map_err(|message| {
                    async_graphql::Error::new(format!(
                        "can't invoke {service}.{method} with arguments {values}: {message}"
                    ))
                })?;
                trace!(service = %service, method = %method, "route handler completed");

                plan_field_value(&plan, json_to_graphql_value(result))
            })
        });

        for input in argument_inputs {
            field = field.argument(input);
        }
        if let Some(description) = &route.description {
            field = field.description(description);
        }
        if let Some(reason) = &route.deprecation {
            field = field.deprecation(Some(reason.as_str()));
        }
        Ok(field)
    }
}

/// Static description of one published argument, captured by the resolver.
struct ArgumentSpec {
    name: String,
    published: String,
    shape: TypeShape,
    default: Option<serde_json::Value>,
}

/// Rewrites an engine argument value into the JSON the handler expects:
/// key/value entry lists fold back into JSON objects, nested members
/// are re-keyed by their registered names, and enum values become
/// plain strings.
fn decode_argument(
    registry: &HostTypeRegistry,
    shape: &TypeShape,
    value: Value,
) -> serde_json::Value {
    if matches!(value, Value::Null) {
        return serde_json::Value::Null;
    }
    match shape {
        TypeShape::Nullable(inner) | TypeShape::Async(inner) => {
            decode_argument(registry, inner, value)
        }
        TypeShape::Sequence(inner) => match value {
            Value::List(items) => serde_json::Value::Array(
                items
                    .into_iter()
                    .map(|item| decode_argument(registry, inner, item))
                    .collect(),
            ),
            other => graphql_value_to_json(other),
        },
        TypeShape::Map(_, value_shape) => match value {
            Value::List(entries) => {
                let mut object = serde_json::Map::new();
                for entry in entries {
                    let Value::Object(mut entry) = entry else {
                        continue;
                    };
                    let key = match entry.shift_remove(&async_graphql::Name::new("key")) {
                        Some(Value::String(key)) => key,
                        Some(other) => graphql_value_to_json(other).to_string(),
                        None => continue,
                    };
                    let entry_value = entry
                        .shift_remove(&async_graphql::Name::new("value"))
                        .unwrap_or(Value::Null);
                    object.insert(key, decode_argument(registry, value_shape, entry_value));
                }
                serde_json::Value::Object(object)
            }
            other => graphql_value_to_json(other),
        },
        TypeShape::Named(key) => {
            let Some(host) = registry.get(key) else {
                return graphql_value_to_json(value);
            };
            match host.kind {
                HostTypeKind::Enum => match value {
                    Value::Enum(name) => serde_json::Value::String(name.to_string()),
                    other => graphql_value_to_json(other),
                },
                HostTypeKind::Object | HostTypeKind::Abstract => match value {
                    Value::Object(mut map) => {
                        let mut object = serde_json::Map::new();
                        for member in &host.members {
                            let member_shape = member
                                .annotations
                                .type_override
                                .as_ref()
                                .unwrap_or(&member.shape);
                            let published = graph_name(&member.name);
                            match map.shift_remove(&async_graphql::Name::new(&published)) {
                                Some(member_value) => {
                                    object.insert(
                                        member.name.clone(),
                                        decode_argument(registry, member_shape, member_value),
                                    );
                                }
                                None => {
                                    if let Some(default) = &member.annotations.default_value {
                                        object.insert(member.name.clone(), default.clone());
                                    }
                                }
                            }
                        }
                        serde_json::Value::Object(object)
                    }
                    other => graphql_value_to_json(other),
                },
            }
        }
        TypeShape::Scalar(kind) if kind.is_temporal() => {
            graphql_value_to_json(scalars::canonicalize(*kind, value))
        }
        _ => graphql_value_to_json(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArgumentDescriptor, HostType, ScalarKind};
    use crate::services::ServiceCollection;

    fn empty_services() -> Arc<dyn ServiceProvider> {
        Arc::new(ServiceCollection::new())
    }

    fn unit_route(method: &str) -> RouteDescriptor {
        RouteDescriptor::query(method, "Svc", TypeShape::Unit, |_, _| async {
            Ok(serde_json::Value::Null)
        })
    }

    #[test]
    fn test_duplicate_field_names_fail_with_the_name() {
        let assembler = SchemaAssembler::new(Arc::new(HostTypeRegistry::new()), empty_services())
            .route(unit_route("same_route"))
            .route(unit_route("same_route"));
        let err = assembler.assemble().unwrap_err();
        assert!(err.to_string().contains("sameRoute"), "{err}");
    }

    #[test]
    fn test_same_field_name_allowed_across_roots() {
        let assembler = SchemaAssembler::new(Arc::new(HostTypeRegistry::new()), empty_services())
            .route(unit_route("ping"))
            .route(
                RouteDescriptor::mutation("ping", "Svc", TypeShape::Unit, |_, _| async {
                    Ok(serde_json::Value::Null)
                }),
            );
        assert!(assembler.assemble().is_ok());
    }

    #[test]
    fn test_mutations_without_queries_fail() {
        let assembler = SchemaAssembler::new(Arc::new(HostTypeRegistry::new()), empty_services())
            .route(RouteDescriptor::mutation(
                "set_state",
                "Svc",
                TypeShape::Unit,
                |_, _| async { Ok(serde_json::Value::Null) },
            ));
        let err = assembler.assemble().unwrap_err();
        assert!(matches!(err, SchemaError::MissingQueryRoot));
    }

    #[test]
    fn test_no_routes_fail() {
        let assembler =
            SchemaAssembler::new(Arc::new(HostTypeRegistry::new()), empty_services());
        assert!(matches!(
            assembler.assemble().unwrap_err(),
            SchemaError::Build(_)
        ));
    }

    #[test]
    fn test_decode_argument_folds_entry_lists() {
        let registry = HostTypeRegistry::new();
        let shape = TypeShape::map(
            TypeShape::Scalar(ScalarKind::Int),
            TypeShape::Scalar(ScalarKind::String),
        );
        let value = Value::from_json(serde_json::json!([
            {"key": "99", "value": "a"},
            {"key": "7", "value": "b"},
        ]))
        .unwrap();
        let decoded = decode_argument(&registry, &shape, value);
        assert_eq!(decoded, serde_json::json!({"99": "a", "7": "b"}));
    }

    #[test]
    fn test_decode_argument_rekeys_nested_objects() {
        let mut registry = HostTypeRegistry::new();
        registry.register(
            HostType::object("Filter")
                .member("max_count", TypeShape::Scalar(ScalarKind::Int))
                .member("tag", TypeShape::Scalar(ScalarKind::String)),
        );
        let value = Value::from_json(serde_json::json!({"maxCount": 5, "tag": "x"})).unwrap();
        let decoded = decode_argument(&registry, &TypeShape::named("Filter"), value);
        assert_eq!(decoded, serde_json::json!({"max_count": 5, "tag": "x"}));
    }

    #[test]
    fn test_context_arguments_are_not_published() {
        let route = unit_route("fetch")
            .argument(ArgumentDescriptor::context("ctx"))
            .argument(ArgumentDescriptor::new(
                "id",
                TypeShape::Scalar(ScalarKind::Int),
            ));
        let assembler = SchemaAssembler::new(Arc::new(HostTypeRegistry::new()), empty_services())
            .route(route);
        let schema = assembler.assemble().unwrap();
        let sdl = schema.sdl();
        assert!(sdl.contains("fetch(id: Int!): String"), "{sdl}");
        assert!(!sdl.contains("ctx"), "{sdl}");
    }
}
