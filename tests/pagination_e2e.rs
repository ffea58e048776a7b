use std::sync::Arc;

use riskgraph::page::{FilterMode, FilterOperator, OrderMode};
use riskgraph::{
    Connection, EntityService, Filter, InMemoryTripleStore, ListArgs, PaginationPolicy,
    RiskgraphConfig, SchemaRegistry, Value,
};
use serde_json::json;

fn service(policy: PaginationPolicy) -> EntityService {
    let mut config = RiskgraphConfig::default();
    config.pagination.policy = policy;
    EntityService::new(
        Arc::new(SchemaRegistry::builtin().unwrap()),
        Arc::new(InMemoryTripleStore::new()),
        &config,
    )
}

fn seed(svc: &EntityService) {
    for (name, media, priority) in [
        ("Alpha", "text/html", 3),
        ("bravo", "application/pdf", 1),
        ("Charlie", "text/html", 2),
        ("delta", "application/pdf", 5),
    ] {
        svc.create("Reference", &json!({ "name": name, "media_type": media }))
            .unwrap();
        svc.create("Risk", &json!({ "name": name, "priority": priority }))
            .unwrap();
    }
}

fn names(page: &Connection) -> Vec<&str> {
    page.nodes()
        .filter_map(|e| e.get("name").and_then(Value::as_str))
        .collect()
}

fn page(svc: &EntityService, entity_type: &str, args: &ListArgs) -> Connection {
    svc.list(entity_type, args).unwrap().unwrap()
}

#[test]
fn pages_through_three_references() {
    let svc = service(PaginationPolicy::Heuristic);
    for name in ["a", "b", "c"] {
        svc.create("Reference", &json!({ "name": name })).unwrap();
    }

    let first = page(
        &svc,
        "Reference",
        &ListArgs {
            first: Some(2),
            ..ListArgs::default()
        },
    );
    assert_eq!(names(&first), ["a", "b"]);
    assert!(first.page_info.has_next_page);
    assert!(!first.page_info.has_previous_page);
    assert_eq!(first.page_info.global_count, 3);

    let second = page(
        &svc,
        "Reference",
        &ListArgs {
            first: Some(2),
            offset: 2,
            ..ListArgs::default()
        },
    );
    assert_eq!(names(&second), ["c"]);
    assert!(!second.page_info.has_next_page);
    assert!(second.page_info.has_previous_page);

    let past = ListArgs {
        offset: 4,
        ..ListArgs::default()
    };
    assert!(svc.list("Reference", &past).unwrap().is_none());
}

#[test]
fn sorts_case_insensitively_in_both_directions() {
    let svc = service(PaginationPolicy::Heuristic);
    seed(&svc);

    let mut args = ListArgs {
        ordered_by: Some("name".to_string()),
        ..ListArgs::default()
    };
    assert_eq!(names(&page(&svc, "Reference", &args)), ["Alpha", "bravo", "Charlie", "delta"]);

    args.order_mode = OrderMode::Desc;
    assert_eq!(names(&page(&svc, "Reference", &args)), ["delta", "Charlie", "bravo", "Alpha"]);

    let by_priority = ListArgs {
        ordered_by: Some("priority".to_string()),
        ..ListArgs::default()
    };
    assert_eq!(names(&page(&svc, "Risk", &by_priority)), ["bravo", "Charlie", "Alpha", "delta"]);
}

#[test]
fn filters_and_search() {
    let svc = service(PaginationPolicy::Heuristic);
    seed(&svc);

    let html = ListArgs {
        filters: vec![Filter::eq("media_type", ["text/html"])],
        ..ListArgs::default()
    };
    let result = page(&svc, "Reference", &html);
    assert_eq!(names(&result), ["Alpha", "Charlie"]);
    assert_eq!(result.page_info.global_count, 2);

    let both = ListArgs {
        filters: vec![
            Filter::eq("media_type", ["text/html"]),
            Filter::eq("name", ["Alpha"]),
        ],
        filter_mode: FilterMode::And,
        ..ListArgs::default()
    };
    assert_eq!(names(&page(&svc, "Reference", &both)), ["Alpha"]);

    let high = ListArgs {
        filters: vec![Filter::eq("priority", [2]).with_operator(FilterOperator::Gte)],
        ..ListArgs::default()
    };
    assert_eq!(names(&page(&svc, "Risk", &high)), ["Alpha", "Charlie", "delta"]);

    let regex = ListArgs {
        filters: vec![Filter::eq("name", ["^[a-z]"]).with_operator(FilterOperator::Match)],
        ..ListArgs::default()
    };
    assert_eq!(names(&page(&svc, "Reference", &regex)), ["bravo", "delta"]);

    let search = ListArgs {
        search: Some("HARL".to_string()),
        ..ListArgs::default()
    };
    assert_eq!(names(&page(&svc, "Reference", &search)), ["Charlie"]);

    let nothing = ListArgs {
        filters: vec![Filter::eq("media_type", ["image/png"])],
        ..ListArgs::default()
    };
    assert!(svc.list("Reference", &nothing).unwrap().is_none());
}

#[test]
fn bad_regex_is_invalid_argument() {
    let svc = service(PaginationPolicy::Heuristic);
    seed(&svc);
    let args = ListArgs {
        filters: vec![Filter::eq("name", ["("]).with_operator(FilterOperator::Match)],
        ..ListArgs::default()
    };
    let err = svc.list("Reference", &args).unwrap_err();
    assert_eq!(err.kind(), "InvalidArgument");
}

#[test]
fn exactly_full_last_page_reports_no_next_page() {
    let svc = service(PaginationPolicy::Heuristic);
    seed(&svc);
    let args = ListArgs {
        first: Some(2),
        offset: 2,
        ..ListArgs::default()
    };
    let last = page(&svc, "Reference", &args);
    assert_eq!(last.edges.len(), 2);
    assert!(!last.page_info.has_next_page);
    assert!(last.page_info.has_previous_page);
    assert_eq!(last.page_info.global_count, 4);

    let beyond = ListArgs {
        offset: 4,
        ..args
    };
    assert!(svc.list("Reference", &beyond).unwrap().is_none());
}

#[test]
fn heuristic_and_exact_policies_differ_on_filtered_pages() {
    let html = |first| ListArgs {
        first: Some(first),
        filters: vec![Filter::eq("media_type", ["text/html"])],
        ..ListArgs::default()
    };

    let heuristic = service(PaginationPolicy::Heuristic);
    seed(&heuristic);
    let exact = service(PaginationPolicy::Exact);
    seed(&exact);

    // Both matches fit on the page; only the exact policy knows nothing follows.
    let h = page(&heuristic, "Reference", &html(2));
    let e = page(&exact, "Reference", &html(2));
    assert_eq!(names(&h), names(&e));
    assert!(h.page_info.has_next_page);
    assert!(!e.page_info.has_next_page);

    let h = page(&heuristic, "Reference", &html(1));
    let e = page(&exact, "Reference", &html(1));
    assert!(h.page_info.has_next_page);
    assert!(e.page_info.has_next_page);
    assert_eq!(h.page_info.global_count, 1);
    assert_eq!(e.page_info.global_count, 2);
}

#[test]
fn default_first_applies_when_absent() {
    let mut config = RiskgraphConfig::default();
    config.pagination.default_first = Some(2);
    let svc = EntityService::new(
        Arc::new(SchemaRegistry::builtin().unwrap()),
        Arc::new(InMemoryTripleStore::new()),
        &config,
    );
    seed(&svc);
    let result = page(&svc, "Reference", &ListArgs::default());
    assert_eq!(result.edges.len(), 2);
    assert!(result.page_info.has_next_page);
}
