use std::sync::Arc;

use riskgraph::{
    Entity, EntityService, ExecutionError, GraphError, InMemoryTripleStore, RiskgraphConfig,
    SchemaRegistry, Value,
};
use serde_json::json;

fn service() -> EntityService {
    EntityService::new(
        Arc::new(SchemaRegistry::builtin().unwrap()),
        Arc::new(InMemoryTripleStore::new()),
        &RiskgraphConfig::default(),
    )
}

fn setup(svc: &EntityService) -> (Entity, Entity, Entity) {
    let risk = svc.create("Risk", &json!({ "name": "Outage" })).unwrap();
    let runbook = svc.create("Reference", &json!({ "name": "Runbook" })).unwrap();
    let postmortem = svc.create("Reference", &json!({ "name": "Postmortem" })).unwrap();
    (risk, runbook, postmortem)
}

fn references(svc: &EntityService, risk: &Entity) -> Option<Value> {
    svc.find_by_id("Risk", &risk.id().to_string())
        .unwrap()
        .unwrap()
        .get("references")
        .cloned()
}

#[test]
fn detaching_an_unattached_value_is_a_no_op() {
    let svc = service();
    let (risk, runbook, postmortem) = setup(&svc);
    let risk_id = risk.id().to_string();

    svc.attach("Risk", &risk_id, "references", &runbook.id().to_string())
        .unwrap();
    let before = references(&svc, &risk);

    let detached = svc
        .detach("Risk", &risk_id, "references", &postmortem.id().to_string())
        .unwrap();
    assert!(detached);
    assert_eq!(references(&svc, &risk), before);
    assert_eq!(
        before,
        Some(Value::List(vec![Value::String(runbook.id().to_string())]))
    );
}

#[test]
fn detaching_a_nonexistent_entity_is_not_found() {
    let svc = service();
    let (risk, runbook, _) = setup(&svc);
    let risk_id = risk.id().to_string();
    svc.attach("Risk", &risk_id, "references", &runbook.id().to_string())
        .unwrap();

    let ghost = uuid::Uuid::new_v4().to_string();
    let err = svc
        .detach("Risk", &risk_id, "references", &ghost)
        .unwrap_err();
    match err {
        GraphError::Execution(ExecutionError::EntityNotFound { id }) => {
            assert_eq!(id.to_string(), ghost);
        }
        other => panic!("expected EntityNotFound, got {other:?}"),
    }
    assert!(references(&svc, &risk).is_some());
}

#[test]
fn attach_many_then_detach_one() {
    let svc = service();
    let (risk, runbook, postmortem) = setup(&svc);
    let risk_id = risk.id().to_string();

    for target in [&runbook, &postmortem] {
        assert!(svc
            .attach("Risk", &risk_id, "references", &target.id().to_string())
            .unwrap());
    }
    svc.detach("Risk", &risk_id, "references", &runbook.locator().to_string())
        .unwrap();
    assert_eq!(
        references(&svc, &risk),
        Some(Value::List(vec![Value::String(postmortem.id().to_string())]))
    );
}

#[test]
fn attach_checks_field_and_target_type() {
    let svc = service();
    let (risk, runbook, _) = setup(&svc);
    let risk_id = risk.id().to_string();

    let err = svc
        .attach("Risk", &risk_id, "owner", &runbook.id().to_string())
        .unwrap_err();
    assert_eq!(err.kind(), "UnsupportedField");

    let err = svc
        .attach("Risk", &risk_id, "taxonomy", &runbook.id().to_string())
        .unwrap_err();
    match err {
        GraphError::Execution(ExecutionError::TypeMismatch {
            field,
            expected,
            actual,
        }) => {
            assert_eq!(field, "taxonomy");
            assert_eq!(expected, "TaxonomyEntry");
            assert_eq!(actual, "Reference");
        }
        other => panic!("expected TypeMismatch, got {other:?}"),
    }
}
