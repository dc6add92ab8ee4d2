//! GraphQL schema generation and operation governance for typed host APIs.
//!
//! This crate turns explicit descriptions of an application's types and
//! service methods into an executable GraphQL schema, then governs how
//! request documents run against it:
//!
//! - **Type mapping**: registered host types (objects, generics,
//!   enums, abstract types, collections, dictionaries) become schema
//!   types with deterministic synthesized names and nullability derived
//!   from shape and annotations.
//! - **Routes**: service methods are published as root fields, with
//!   arguments decoded back into the names the handler expects.
//! - **Operation governance**: documents are parsed once, admitted
//!   against a selection ceiling and a field blacklist, and
//!   multi-operation documents execute sequentially in declaration
//!   order with fail-fast aggregation.
//!
//! # Example
//!
//! ```ignore
//! let mut registry = HostTypeRegistry::new();
//! registry.register(HostType::object("Widget").member("id", TypeShape::Scalar(ScalarKind::Int)));
//!
//! let mut services = ServiceCollection::new();
//! services.register("WidgetService", WidgetService::default());
//!
//! let schema = SchemaAssembler::new(Arc::new(registry), Arc::new(services))
//!     .route(RouteDescriptor::query("get_widget", "WidgetService", TypeShape::named("Widget"), handler))
//!     .assemble()?;
//!
//! let governor = OperationGovernor::new(Arc::new(DynamicSchemaEngine::new(schema)));
//! let outcome = governor.execute(DocumentRequest::new("{ getWidget { id } }")).await;
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod naming;
pub mod operations;
pub mod schema;
pub mod services;
pub mod types;

pub use config::GraphRouteConfig;
pub use error::SchemaError;
pub use model::{
    ArgumentDescriptor, ArgumentValues, EnumVariant, HostType, HostTypeKind, HostTypeRegistry,
    KnownSubtype, MemberAnnotations, Requiredness, RouteDescriptor, ScalarKind, ServiceInstance,
    TypeDescriptor, TypeShape,
};
pub use operations::{
    ApprovingValidator, DocumentBuilder, DocumentRequest, DocumentValidator, DynamicSchemaEngine,
    EngineRequest, ExecutionEngine, ExecutionFault, GovernorConfig, OperationGovernor,
    OperationInfo, OperationOutcome, ParsedDocument, ParsingDocumentBuilder, ValidationOutcome,
};
pub use schema::{AssemblerConfig, Direction, SchemaAssembler, TypeMapper};
pub use services::{ServiceCollection, ServiceProvider};

/// Result type used throughout schema assembly.
pub type Result<T> = std::result::Result<T, SchemaError>;
