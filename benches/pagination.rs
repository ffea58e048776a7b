use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde_json::json;

use riskgraph::page::{paginate, FilterOperator, OrderMode};
use riskgraph::{
    Entity, EntityService, Filter, InMemoryTripleStore, ListArgs, PaginationPolicy,
    RiskgraphConfig, SchemaRegistry,
};

const ROWS: usize = 2_000;

/// Reduced entities read back through the service, as a list call sees them.
fn seeded_entities() -> Vec<Entity> {
    let service = EntityService::new(
        Arc::new(SchemaRegistry::builtin().unwrap()),
        Arc::new(InMemoryTripleStore::new()),
        &RiskgraphConfig::default(),
    );
    for i in 0..ROWS {
        service
            .create(
                "Risk",
                &json!({
                    "name": format!("risk-{i:05}"),
                    "status": if i % 3 == 0 { "open" } else { "closed" },
                    "priority": i % 7,
                }),
            )
            .unwrap();
    }
    service
        .list("Risk", &ListArgs::default())
        .unwrap()
        .unwrap()
        .edges
        .into_iter()
        .map(|e| e.node)
        .collect()
}

fn bench_paginate(c: &mut Criterion) {
    let entities = seeded_entities();
    let mut group = c.benchmark_group("pagination");
    group.throughput(Throughput::Elements(ROWS as u64));

    let plain = ListArgs {
        first: Some(50),
        offset: 500,
        ..ListArgs::default()
    };
    let filtered = ListArgs {
        first: Some(50),
        filters: vec![
            Filter::eq("status", ["open"]),
            Filter::eq("priority", [5]).with_operator(FilterOperator::Gte),
        ],
        ..ListArgs::default()
    };
    let sorted = ListArgs {
        first: Some(50),
        ordered_by: Some("priority".to_string()),
        order_mode: OrderMode::Desc,
        search: Some("risk-01".to_string()),
        ..ListArgs::default()
    };

    for (name, args) in [("offset", &plain), ("filtered", &filtered), ("sorted_search", &sorted)] {
        for policy in [PaginationPolicy::Heuristic, PaginationPolicy::Exact] {
            group.bench_function(format!("{name}/{policy:?}"), |b| {
                b.iter(|| paginate(black_box(entities.clone()), args, policy).unwrap());
            });
        }
    }
    group.finish();
}

fn bench_list_through_service(c: &mut Criterion) {
    let service = EntityService::new(
        Arc::new(SchemaRegistry::builtin().unwrap()),
        Arc::new(InMemoryTripleStore::new()),
        &RiskgraphConfig::default(),
    );
    for i in 0..ROWS {
        service
            .create(
                "Reference",
                &json!({ "name": format!("doc-{i}"), "url": format!("https://example.com/{i}") }),
            )
            .unwrap();
    }
    let args = ListArgs {
        first: Some(25),
        ..ListArgs::default()
    };
    c.bench_function("pagination/service_list", |b| {
        b.iter(|| service.list("Reference", black_box(&args)).unwrap());
    });
}

criterion_group!(benches, bench_paginate, bench_list_through_service);
criterion_main!(benches);
