//! End-to-end tests: assembled schema behind the operation governor.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use graphroute::{
    ArgumentDescriptor, DocumentRequest, DynamicSchemaEngine, GovernorConfig, HostType,
    HostTypeRegistry, OperationGovernor, RouteDescriptor, ScalarKind, SchemaAssembler,
    ServiceCollection, TypeShape,
};
use tokio_util::sync::CancellationToken;

struct StateService {
    state: AtomicI64,
    bumps: AtomicI64,
}

fn build_governor(config: GovernorConfig) -> (OperationGovernor, Arc<StateService>) {
    let mut registry = HostTypeRegistry::new();
    registry.register(
        HostType::object("EchoedDates")
            .member("offset", TypeShape::Scalar(ScalarKind::DateTimeOffset))
            .member("date_time", TypeShape::Scalar(ScalarKind::DateTime)),
    );

    let service = Arc::new(StateService {
        state: AtomicI64::new(0),
        bumps: AtomicI64::new(0),
    });
    let mut services = ServiceCollection::new();
    services.register_arc("StateService", service.clone());

    let get_state = RouteDescriptor::query(
        "get_state",
        "StateService",
        TypeShape::Scalar(ScalarKind::Int),
        |instance, _| async move {
            let service = instance
                .downcast_ref::<StateService>()
                .ok_or_else(|| "not a StateService".to_string())?;
            Ok(serde_json::json!(service.state.load(Ordering::SeqCst)))
        },
    );

    let set_state = RouteDescriptor::mutation(
        "set_state",
        "StateService",
        TypeShape::Scalar(ScalarKind::Int),
        |instance, args| async move {
            let service = instance
                .downcast_ref::<StateService>()
                .ok_or_else(|| "not a StateService".to_string())?;
            let new_state = args
                .int("new_state")
                .ok_or_else(|| "missing new_state".to_string())?;
            service.state.store(new_state, Ordering::SeqCst);
            Ok(serde_json::json!(new_state))
        },
    )
    .argument(ArgumentDescriptor::new(
        "new_state",
        TypeShape::Scalar(ScalarKind::Int),
    ));

    let bump = RouteDescriptor::mutation(
        "bump",
        "StateService",
        TypeShape::Scalar(ScalarKind::Int),
        |instance, _| async move {
            let service = instance
                .downcast_ref::<StateService>()
                .ok_or_else(|| "not a StateService".to_string())?;
            Ok(serde_json::json!(
                service.bumps.fetch_add(1, Ordering::SeqCst) + 1
            ))
        },
    );

    let fail = RouteDescriptor::query(
        "fail",
        "StateService",
        TypeShape::Scalar(ScalarKind::Int),
        |_, _| async { Err("backing store offline".to_string()) },
    );

    let echo_dates = RouteDescriptor::query(
        "echo_dates",
        "StateService",
        TypeShape::named("EchoedDates"),
        |_, args| async move {
            Ok(serde_json::json!({
                "offset": args.str("offset"),
                "date_time": args.str("date_time"),
            }))
        },
    )
    .argument(ArgumentDescriptor::new(
        "offset",
        TypeShape::Scalar(ScalarKind::DateTimeOffset),
    ))
    .argument(ArgumentDescriptor::new(
        "date_time",
        TypeShape::Scalar(ScalarKind::DateTime),
    ));

    let schema = SchemaAssembler::new(Arc::new(registry), Arc::new(services))
        .routes([get_state, set_state, bump, fail, echo_dates])
        .assemble()
        .unwrap();

    let governor =
        OperationGovernor::new(Arc::new(DynamicSchemaEngine::new(schema))).with_config(config);
    (governor, service)
}

#[tokio::test]
async fn test_single_operation_round_trip() {
    let (governor, service) = build_governor(GovernorConfig::default());
    service.state.store(42, Ordering::SeqCst);

    let outcome = governor
        .execute(DocumentRequest::new("{ getState }"))
        .await;

    assert!(outcome.is_ok(), "{:?}", outcome.errors);
    assert_eq!(
        outcome.data.into_json().unwrap(),
        serde_json::json!({"getState": 42})
    );
}

#[tokio::test]
async fn test_multi_operation_document_runs_in_declaration_order() {
    let (governor, _) = build_governor(GovernorConfig::default());

    let outcome = governor
        .execute(DocumentRequest::new(
            "mutation SetState { setState(newState: 5) }\nquery GetState { getState }",
        ))
        .await;

    assert!(outcome.is_ok(), "{:?}", outcome.errors);
    assert_eq!(
        outcome.data.into_json().unwrap(),
        serde_json::json!({
            "SetState": {"setState": 5},
            "GetState": {"getState": 5},
        })
    );
}

#[tokio::test]
async fn test_failing_operation_stops_later_operations() {
    let (governor, service) = build_governor(GovernorConfig::default());

    let outcome = governor
        .execute(DocumentRequest::new(
            "query Fail { fail }\nmutation Bump { bump }",
        ))
        .await;

    assert!(!outcome.is_ok());
    assert!(
        outcome.errors[0].message.contains("StateService"),
        "{:?}",
        outcome.errors
    );
    assert_eq!(service.bumps.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_handler_failure_names_service_and_arguments() {
    let (governor, _) = build_governor(GovernorConfig::default());

    let outcome = governor.execute(DocumentRequest::new("{ fail }")).await;

    assert!(!outcome.is_ok());
    let message = &outcome.errors[0].message;
    assert!(message.contains("can't invoke StateService.fail"), "{message}");
    assert!(message.contains("backing store offline"), "{message}");
}

#[tokio::test]
async fn test_selection_ceiling_blocks_whole_document() {
    let config = GovernorConfig {
        max_selections: 1,
        ..GovernorConfig::default()
    };
    let (governor, service) = build_governor(config);

    let outcome = governor
        .execute(DocumentRequest::new(
            "mutation Bump { bump }\nmutation Again { bump }",
        ))
        .await;

    assert!(!outcome.is_ok());
    assert!(
        outcome.errors[0].message.contains("maximum of 1"),
        "{:?}",
        outcome.errors
    );
    assert_eq!(service.bumps.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_restricted_field_blocks_whole_document() {
    let config = GovernorConfig {
        restricted_operations: HashSet::from(["bump".to_string()]),
        ..GovernorConfig::default()
    };
    let (governor, service) = build_governor(config);

    let outcome = governor
        .execute(DocumentRequest::new(
            "query GetState { getState }\nmutation Bump { bump }",
        ))
        .await;

    assert!(!outcome.is_ok());
    assert!(
        outcome.errors[0].message.contains("bump"),
        "{:?}",
        outcome.errors
    );
    assert_eq!(service.bumps.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_restricted_field_behind_fragment_never_executes() {
    let config = GovernorConfig {
        restricted_operations: HashSet::from(["bump".to_string()]),
        ..GovernorConfig::default()
    };
    let (governor, service) = build_governor(config);

    let outcome = governor
        .execute(DocumentRequest::new(
            "mutation Bump { ...sneaky }\nfragment sneaky on Mutation { bump }",
        ))
        .await;

    assert!(!outcome.is_ok());
    assert!(
        outcome.errors[0].message.contains("bump"),
        "{:?}",
        outcome.errors
    );
    assert_eq!(service.bumps.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_restricted_field_blocks_regardless_of_nesting() {
    let config = GovernorConfig {
        restricted_operations: HashSet::from(["echoDates".to_string()]),
        ..GovernorConfig::default()
    };
    let (governor, _) = build_governor(config);

    let outcome = governor
        .execute(DocumentRequest::new(
            r#"{ echoDates(offset: "x", dateTime: "y") { offset dateTime } }"#,
        ))
        .await;

    assert!(!outcome.is_ok());
    assert!(
        outcome.errors[0].message.contains("echoDates"),
        "{:?}",
        outcome.errors
    );
}

#[tokio::test]
async fn test_parse_failure_returns_single_synthetic_error() {
    let (governor, _) = build_governor(GovernorConfig::default());

    let outcome = governor.execute(DocumentRequest::new("query {")).await;

    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.data, async_graphql::Value::Null);
}

#[tokio::test]
async fn test_unknown_field_surfaces_engine_validation() {
    let (governor, _) = build_governor(GovernorConfig::default());

    let outcome = governor
        .execute(DocumentRequest::new("{ noSuchField }"))
        .await;

    assert!(!outcome.is_ok());
}

#[tokio::test]
async fn test_temporal_arguments_and_results_are_canonicalized() {
    let (governor, _) = build_governor(GovernorConfig::default());

    let outcome = governor
        .execute(DocumentRequest::new(
            r#"{ echoDates(offset: "2013-07-02T09:00:00", dateTime: "2013-07-02T09:00") { offset dateTime } }"#,
        ))
        .await;

    assert!(outcome.is_ok(), "{:?}", outcome.errors);
    assert_eq!(
        outcome.data.into_json().unwrap(),
        serde_json::json!({
            "echoDates": {
                "offset": "2013-07-02T09:00:00Z",
                "dateTime": "2013-07-02T09:00:00",
            }
        })
    );
}

#[tokio::test]
async fn test_offset_values_convert_to_utc() {
    let (governor, _) = build_governor(GovernorConfig::default());

    let outcome = governor
        .execute(DocumentRequest::new(
            r#"{ echoDates(offset: "2013-07-02T09:00:00+06:00", dateTime: "2013-07-02T09:00:00+06:00") { offset dateTime } }"#,
        ))
        .await;

    assert!(outcome.is_ok(), "{:?}", outcome.errors);
    assert_eq!(
        outcome.data.into_json().unwrap(),
        serde_json::json!({
            "echoDates": {
                "offset": "2013-07-02T09:00:00+06:00",
                "dateTime": "2013-07-02T03:00:00Z",
            }
        })
    );
}

#[tokio::test]
async fn test_cancelled_request_never_reaches_the_handler() {
    let (governor, service) = build_governor(GovernorConfig::default());
    let token = CancellationToken::new();
    token.cancel();

    let outcome = governor
        .execute(DocumentRequest::new("mutation Bump { bump }").with_cancellation(token))
        .await;

    assert!(!outcome.is_ok());
    assert!(
        outcome.errors[0].message.contains("cancelled"),
        "{:?}",
        outcome.errors
    );
    assert_eq!(service.bumps.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_operation_name_targets_one_operation_per_execution() {
    let (governor, service) = build_governor(GovernorConfig::default());
    service.state.store(7, Ordering::SeqCst);

    let outcome = governor
        .execute(DocumentRequest::new(
            "query First { getState }\nquery Second { getState }",
        ))
        .await;

    assert!(outcome.is_ok(), "{:?}", outcome.errors);
    assert_eq!(
        outcome.data.into_json().unwrap(),
        serde_json::json!({
            "First": {"getState": 7},
            "Second": {"getState": 7},
        })
    );
}
