//! Multi-operation document execution with admission control.
//!
//! The governor parses a request document once, enforces a top-level
//! selection ceiling and an operation-name blacklist, and then either
//! hands the document to the engine as-is (zero or one operation) or
//! executes every operation sequentially in declaration order,
//! aggregating results under each operation's name. The first
//! operation to fail short-circuits the run and its outcome is
//! returned alone.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_graphql::dynamic::Schema;
use async_graphql::{Name, ServerError, Value, Variables};
use async_graphql_parser::types::{DocumentOperations, FragmentDefinition, Selection};
use async_graphql_parser::{Positioned, parse_query};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Admission rules the governor applies before execution.
#[derive(Debug, Clone)]
pub struct GovernorConfig {
    /// Ceiling on top-level selections summed across all operations.
    pub max_selections: usize,
    /// Top-level field names that are never executed.
    pub restricted_operations: HashSet<String>,
    /// Whether multi-operation documents are validated once up front.
    pub validate_documents: bool,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_selections: 10,
            restricted_operations: HashSet::new(),
            validate_documents: true,
        }
    }
}

/// A single error from parsing, admission control, or execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionFault {
    pub message: String,
}

impl ExecutionFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<ServerError> for ExecutionFault {
    fn from(error: ServerError) -> Self {
        Self {
            message: error.message,
        }
    }
}

/// The result of executing a document or a single operation.
#[derive(Debug, Clone)]
pub struct OperationOutcome {
    pub data: Value,
    pub errors: Vec<ExecutionFault>,
}

impl OperationOutcome {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            errors: Vec::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            data: Value::Null,
            errors: vec![ExecutionFault::new(message)],
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// One operation of a parsed document.
#[derive(Debug, Clone)]
pub struct OperationInfo {
    /// Operation name; absent only for anonymous single operations.
    pub name: Option<String>,
    /// Effective top-level field names, with fragment spreads and
    /// inline fragments resolved to the fields they reach.
    pub selections: Vec<String>,
    /// Count of effective top-level fields.
    pub selection_count: usize,
}

/// A parsed document with its operations in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub operations: Vec<OperationInfo>,
}

impl ParsedDocument {
    pub fn total_selections(&self) -> usize {
        self.operations.iter().map(|op| op.selection_count).sum()
    }
}

/// Parses request text into a [`ParsedDocument`].
pub trait DocumentBuilder: Send + Sync {
    fn build(&self, query: &str) -> Result<ParsedDocument, String>;
}

/// The standard builder, backed by the GraphQL parser.
#[derive(Debug, Default)]
pub struct ParsingDocumentBuilder;

impl DocumentBuilder for ParsingDocumentBuilder {
    fn build(&self, query: &str) -> Result<ParsedDocument, String> {
        let document = parse_query(query).map_err(|e| e.to_string())?;
        let positioned = match &document.operations {
            DocumentOperations::Single(operation) => vec![(None, operation)],
            DocumentOperations::Multiple(operations) => {
                let mut named: Vec<_> = operations
                    .iter()
                    .map(|(name, operation)| (Some(name.to_string()), operation))
                    .collect();
                // The parser keys multiple operations by name; source
                // position restores declaration order.
                named.sort_by_key(|(_, operation)| operation.pos);
                named
            }
        };
        let operations = positioned
            .into_iter()
            .map(|(name, operation)| {
                let mut selections = Vec::new();
                collect_top_level_fields(
                    &operation.node.selection_set.node.items,
                    &document.fragments,
                    &mut HashSet::new(),
                    &mut selections,
                );
                let selection_count = selections.len();
                OperationInfo {
                    name,
                    selections,
                    selection_count,
                }
            })
            .collect();
        Ok(ParsedDocument { operations })
    }
}

/// Collects the top-level fields a selection set effectively reaches,
/// following fragment spreads to their definitions and descending into
/// inline fragments. Each resolved field counts individually.
fn collect_top_level_fields(
    items: &[Positioned<Selection>],
    fragments: &HashMap<Name, Positioned<FragmentDefinition>>,
    visited: &mut HashSet<String>,
    fields: &mut Vec<String>,
) {
    for selection in items {
        match &selection.node {
            Selection::Field(field) => fields.push(field.node.name.node.to_string()),
            Selection::InlineFragment(fragment) => collect_top_level_fields(
                &fragment.node.selection_set.node.items,
                fragments,
                visited,
                fields,
            ),
            Selection::FragmentSpread(spread) => {
                let fragment_name = &spread.node.fragment_name.node;
                // The visited set terminates spread cycles; undefined
                // fragments are left for engine validation to report.
                if visited.insert(fragment_name.to_string()) {
                    if let Some(fragment) = fragments.get(fragment_name) {
                        collect_top_level_fields(
                            &fragment.node.selection_set.node.items,
                            fragments,
                            visited,
                            fields,
                        );
                    }
                }
            }
        }
    }
}

/// Outcome of an up-front document validation.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub errors: Vec<ExecutionFault>,
}

impl ValidationOutcome {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<ExecutionFault>) -> Self {
        Self {
            is_valid: false,
            errors,
        }
    }
}

/// Validates a whole document once before a multi-operation run.
pub trait DocumentValidator: Send + Sync {
    fn validate(&self, document: &ParsedDocument, query: &str) -> ValidationOutcome;
}

/// Accepts every document. Per-operation execution still surfaces the
/// engine's own validation errors.
#[derive(Debug, Default)]
pub struct ApprovingValidator;

impl DocumentValidator for ApprovingValidator {
    fn validate(&self, _document: &ParsedDocument, _query: &str) -> ValidationOutcome {
        ValidationOutcome::valid()
    }
}

/// One execution handed to the engine.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub query: String,
    pub operation_name: Option<String>,
    pub inputs: Option<serde_json::Value>,
    pub cancellation: CancellationToken,
    /// Whether the engine should validate before executing. Advisory:
    /// a multi-operation run validates once and asks sub-executions to
    /// skip revalidation, but engines may validate anyway.
    pub enable_validation: bool,
}

/// Executes a single operation of a document.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn execute(&self, request: EngineRequest) -> OperationOutcome;
}

/// [`ExecutionEngine`] backed by an assembled dynamic schema.
pub struct DynamicSchemaEngine {
    schema: Schema,
}

impl DynamicSchemaEngine {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }
}

#[async_trait]
impl ExecutionEngine for DynamicSchemaEngine {
    async fn execute(&self, request: EngineRequest) -> OperationOutcome {
        let mut engine_request = async_graphql::Request::new(request.query);
        engine_request.operation_name = request.operation_name;
        if let Some(inputs) = request.inputs {
            engine_request.variables = Variables::from_json(inputs);
        }
        tokio::select! {
            biased;
            _ = request.cancellation.cancelled() => {
                OperationOutcome::failure("execution was cancelled")
            }
            response = self.schema.execute(engine_request) => OperationOutcome {
                data: response.data,
                errors: response.errors.into_iter().map(ExecutionFault::from).collect(),
            },
        }
    }
}

/// An incoming request document.
#[derive(Debug, Clone)]
pub struct DocumentRequest {
    pub query: String,
    pub inputs: Option<serde_json::Value>,
    pub cancellation: CancellationToken,
}

impl DocumentRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            inputs: None,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_inputs(mut self, inputs: serde_json::Value) -> Self {
        self.inputs = Some(inputs);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

/// Parses, admits, and executes request documents.
pub struct OperationGovernor {
    engine: Arc<dyn ExecutionEngine>,
    validator: Arc<dyn DocumentValidator>,
    builder: Arc<dyn DocumentBuilder>,
    config: GovernorConfig,
}

impl OperationGovernor {
    pub fn new(engine: Arc<dyn ExecutionEngine>) -> Self {
        Self {
            engine,
            validator: Arc::new(ApprovingValidator),
            builder: Arc::new(ParsingDocumentBuilder),
            config: GovernorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GovernorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn DocumentValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_document_builder(mut self, builder: Arc<dyn DocumentBuilder>) -> Self {
        self.builder = builder;
        self
    }

    /// Executes a document end to end.
    ///
    /// Parse and admission failures come back as a synthetic outcome
    /// with one error and no data; they never panic and never reach
    /// the engine.
    pub async fn execute(&self, request: DocumentRequest) -> OperationOutcome {
        let document = match self.builder.build(&request.query) {
            Ok(document) => document,
            Err(message) => return OperationOutcome::failure(message),
        };

        let total = document.total_selections();
        if total > self.config.max_selections {
            return OperationOutcome::failure(format!(
                "document selects {total} top-level fields, exceeding the configured maximum of {}",
                self.config.max_selections
            ));
        }

        for operation in &document.operations {
            for selection in &operation.selections {
                if self.config.restricted_operations.contains(selection) {
                    return OperationOutcome::failure(format!(
                        "operation field '{selection}' is restricted"
                    ));
                }
            }
        }

        if document.operations.len() <= 1 {
            return self
                .engine
                .execute(EngineRequest {
                    query: request.query,
                    operation_name: None,
                    inputs: request.inputs,
                    cancellation: request.cancellation,
                    enable_validation: true,
                })
                .await;
        }

        if self.config.validate_documents {
            let outcome = self.validator.validate(&document, &request.query);
            if !outcome.is_valid {
                return OperationOutcome {
                    data: Value::Null,
                    errors: outcome.errors,
                };
            }
        }

        let mut aggregate = async_graphql::indexmap::IndexMap::new();
        for operation in &document.operations {
            let Some(name) = &operation.name else {
                return OperationOutcome::failure(
                    "multi-operation documents require a name on every operation",
                );
            };
            debug!(operation = %name, "executing operation");
            let outcome = self
                .engine
                .execute(EngineRequest {
                    query: request.query.clone(),
                    operation_name: Some(name.clone()),
                    inputs: request.inputs.clone(),
                    cancellation: request.cancellation.clone(),
                    enable_validation: false,
                })
                .await;
            if !outcome.is_ok() {
                return outcome;
            }
            aggregate.insert(Name::new(name), outcome.data);
        }

        OperationOutcome::ok(Value::Object(aggregate))
    }
}
