mod common;

use std::{collections::BTreeSet, sync::Arc};

use calcflow::{
    BuildError, CalcFlow, DynError, ExecutionStrategy, InstanceRegistry, MetadataCatalog,
    NodeError, ResolutionError, TypeInfo,
};
use common::{count, log, node_info, record, recording_factory, Log, Node};

type R = Node<0>;
type P1 = Node<1>;
type P2 = Node<2>;

const STRATEGIES: [ExecutionStrategy; 2] = [
    ExecutionStrategy::Sequential,
    ExecutionStrategy::Concurrent { workers: 4 },
];

/// R needs P1 and P2, P2 needs P1
fn example_catalog() -> MetadataCatalog {
    MetadataCatalog::new()
        .field::<R, P1>("p1")
        .field::<R, P2>("p2")
        .field::<P2, P1>("p1")
}

fn flow(catalog: MetadataCatalog, log: &Log, strategy: ExecutionStrategy) -> CalcFlow {
    CalcFlow::builder()
        .scanner(catalog)
        .factory(recording_factory(log))
        .strategy(strategy)
        .build()
        .unwrap()
}

#[test]
fn example_graph_resolves_bottom_up() {
    let log = log();
    let flow = flow(example_catalog(), &log, ExecutionStrategy::Sequential);

    let outcome = flow
        .build_outcome(TypeInfo::of::<R>(), &InstanceRegistry::new())
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![TypeInfo::of::<P1>(), TypeInfo::of::<P2>(), TypeInfo::of::<R>()]
    );
    assert_eq!(
        outcome.registry.keys().into_iter().collect::<BTreeSet<_>>(),
        BTreeSet::from([TypeInfo::of::<P1>(), TypeInfo::of::<P2>(), TypeInfo::of::<R>()])
    );

    // P1 = 1, P2 = 2 + 1, R = 0 + 1 + 3
    let root = outcome.root.downcast::<R>().unwrap();
    assert_eq!(root.total(), 4);
}

#[test]
fn every_factory_runs_once_per_build() {
    for strategy in STRATEGIES {
        let log = log();
        let flow = flow(example_catalog(), &log, strategy);

        let root = flow.produce::<R>().unwrap();
        assert_eq!(root.total(), 4);
        for node in [TypeInfo::of::<R>(), TypeInfo::of::<P1>(), TypeInfo::of::<P2>()] {
            assert_eq!(count(&log, node), 1, "{node} with {strategy:?}");
        }
    }
}

#[test]
fn pre_seeded_nodes_feed_consumers_without_construction() {
    for strategy in STRATEGIES {
        let log = log();
        let flow = flow(example_catalog(), &log, strategy);
        let pre_seeded = InstanceRegistry::new().with(P1::with_bias(10));

        let root = flow.produce_with::<R>(&pre_seeded).unwrap();

        assert_eq!(count(&log, TypeInfo::of::<P1>()), 0);
        assert_eq!(
            *log.lock().unwrap(),
            vec![TypeInfo::of::<P2>(), TypeInfo::of::<R>()]
        );
        // P1 = 11, P2 = 2 + 11, R = 11 + 13
        assert_eq!(root.total(), 24);
        // The caller's registry is not written to
        assert_eq!(pre_seeded.len(), 1);
    }
}

#[test]
fn pre_seeded_root_is_returned_as_is() {
    for strategy in STRATEGIES {
        let log = log();
        let flow = flow(example_catalog(), &log, strategy);
        let pre_seeded = InstanceRegistry::new().with(R::with_bias(100));

        let outcome = flow
            .build_outcome(TypeInfo::of::<R>(), &pre_seeded)
            .unwrap();

        assert_eq!(outcome.root.downcast::<R>().unwrap().bias, 100);
        assert!(log.lock().unwrap().is_empty(), "{strategy:?}");
        assert_eq!(outcome.registry.len(), 1);
    }
}

#[test]
fn dependencies_of_pre_seeded_nodes_are_not_built() {
    for strategy in STRATEGIES {
        let log = log();
        let flow = flow(seeded_branch_catalog(), &log, strategy);
        let pre_seeded = InstanceRegistry::new().with(P2::with_bias(10));

        let root = flow.produce_with::<R>(&pre_seeded).unwrap();

        assert_eq!(count(&log, TypeInfo::of::<P1>()), 0, "{strategy:?}");
        assert_eq!(count(&log, TypeInfo::of::<P2>()), 0);
        assert_eq!(count(&log, TypeInfo::of::<Node<3>>()), 1);
        // P2 = 2 + 10, R = 12 + 3
        assert_eq!(root.total(), 15);
    }
}

/// R -> {P2, 3}, P2 -> P1. P1 is only needed by P2
fn seeded_branch_catalog() -> MetadataCatalog {
    MetadataCatalog::new()
        .field::<R, P2>("p2")
        .field::<R, Node<3>>("three")
        .field::<P2, P1>("p1")
}

#[test]
fn registry_can_be_carried_into_the_next_build() {
    let log = log();
    let flow = flow(example_catalog(), &log, ExecutionStrategy::Sequential);

    let first = flow
        .build_outcome(TypeInfo::of::<P2>(), &InstanceRegistry::new())
        .unwrap();
    assert_eq!(first.registry.len(), 2);

    let second = flow
        .build_outcome(TypeInfo::of::<R>(), &first.registry)
        .unwrap();
    assert_eq!(count(&log, TypeInfo::of::<P1>()), 1);
    assert_eq!(count(&log, TypeInfo::of::<P2>()), 1);
    assert_eq!(count(&log, TypeInfo::of::<R>()), 1);
    assert_eq!(second.registry.len(), 3);
}

#[test]
fn repeated_builds_reuse_the_discovered_graph() {
    let catalog = Arc::new(example_catalog());
    let log = log();
    let flow = CalcFlow::builder()
        .shared_scanner(catalog.clone())
        .factory(recording_factory(&log))
        .build()
        .unwrap();

    let first = flow.graph_builder().discover(TypeInfo::of::<R>()).unwrap();
    let scans = catalog.scan_count();

    flow.produce::<R>().unwrap();
    flow.produce::<R>().unwrap();

    assert_eq!(catalog.scan_count(), scans);
    assert_eq!(
        *flow.graph_builder().discover(TypeInfo::of::<R>()).unwrap(),
        *first
    );
    // Each build still constructs its own instances
    assert_eq!(count(&log, TypeInfo::of::<R>()), 2);
}

#[test]
fn shared_consumer_is_built_once_under_concurrency() {
    // R consumes six independent producers, all of them ready at once
    let catalog = (1..=6).fold(MetadataCatalog::new(), |catalog, id| {
        catalog.declare_field(
            TypeInfo::of::<R>(),
            calcflow::FieldDescriptor::new(FIELDS[id as usize], node_info(id)),
        )
    });
    let log = log();
    let flow = flow(catalog, &log, ExecutionStrategy::Concurrent { workers: 8 });

    for round in 1..=50 {
        let root = flow.produce::<R>().unwrap();
        assert_eq!(root.total(), 1 + 2 + 3 + 4 + 5 + 6);
        assert_eq!(count(&log, TypeInfo::of::<R>()), round);
    }
    for id in 1..=6 {
        assert_eq!(count(&log, node_info(id)), 50);
    }
}

const FIELDS: [&str; 8] = ["f0", "f1", "f2", "f3", "f4", "f5", "f6", "f7"];

#[test]
fn diamond_waits_for_both_sides() {
    for strategy in STRATEGIES {
        let log = log();
        let flow = flow(diamond_catalog(), &log, strategy);

        let root = flow.produce::<R>().unwrap();
        // 3 + 5 and 4 + 5
        assert_eq!(root.total(), 17);
        assert_eq!(count(&log, TypeInfo::of::<Node<5>>()), 1);
        assert_eq!(log.lock().unwrap().last(), Some(&TypeInfo::of::<R>()));
    }
}

/// R -> {3, 4}, 3 -> 5, 4 -> 5
fn diamond_catalog() -> MetadataCatalog {
    MetadataCatalog::new()
        .field::<R, Node<3>>("left")
        .field::<R, Node<4>>("right")
        .field::<Node<3>, Node<5>>("base")
        .field::<Node<4>, Node<5>>("base")
}

#[test]
fn mutual_dependency_fails_discovery() {
    let catalog = MetadataCatalog::new()
        .field::<R, P1>("a")
        .field::<P1, P2>("b")
        .field::<P2, P1>("a");
    let log = log();
    let flow = flow(catalog, &log, ExecutionStrategy::Sequential);

    let err = flow.produce::<R>().unwrap_err();
    assert!(matches!(
        err,
        BuildError::Resolution(ResolutionError::CyclicDependency { .. })
    ));
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn missing_capability_implementation_fails_before_construction() {
    trait Source {}
    let catalog = MetadataCatalog::new()
        .capability::<dyn Source>()
        .field::<R, dyn Source>("source");
    let log = log();
    let flow = flow(catalog, &log, ExecutionStrategy::Sequential);

    let err = flow.produce::<R>().unwrap_err();
    assert!(matches!(
        err,
        BuildError::Resolution(ResolutionError::MissingImplementation { .. })
    ));
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn capabilities_resolve_to_prepared_implementations() {
    trait Source {}
    let catalog = MetadataCatalog::new()
        .capability::<dyn Source>()
        .extends::<Node<6>, dyn Source>()
        .prepare::<R, Node<6>>()
        .field::<R, dyn Source>("source")
        .field::<P1, dyn Source>("source");
    let log = log();
    let flow = flow(
        catalog.field::<R, P1>("p1"),
        &log,
        ExecutionStrategy::Sequential,
    );

    let root = flow.produce::<R>().unwrap();
    // Node<6> = 6, P1 = 1 + 6, R = 6 + 7
    assert_eq!(root.total(), 13);
    assert_eq!(count(&log, TypeInfo::of::<Node<6>>()), 1);
}

#[test]
fn construction_failure_halts_only_its_branch() {
    for strategy in STRATEGIES {
        let log = log();
        let factory = record::<0>(calcflow::FactoryRegistry::new(), &log);
        let factory = record::<1>(factory, &log)
            .register_with(|| Err::<Node<3>, DynError>("disk on fire".into()));
        let flow = CalcFlow::builder()
            .scanner(catalog_with_broken_branch())
            .factory(factory)
            .strategy(strategy)
            .build()
            .unwrap();

        let err = flow.produce::<R>().unwrap_err();
        let BuildError::Incomplete(incomplete) = err else {
            panic!("expected an incomplete build");
        };

        assert_eq!(
            incomplete.unresolved.iter().copied().collect::<BTreeSet<_>>(),
            BTreeSet::from([TypeInfo::of::<R>(), TypeInfo::of::<Node<3>>()])
        );
        let cause = incomplete.first_cause().unwrap();
        assert!(matches!(cause, NodeError::Construction { .. }));
        assert_eq!(cause.node(), TypeInfo::of::<Node<3>>());
        assert!(incomplete.to_string().contains("disk on fire"));

        // The independent branch still completed, the root was never attempted
        assert_eq!(count(&log, TypeInfo::of::<P1>()), 1);
        assert_eq!(count(&log, TypeInfo::of::<R>()), 0);
    }
}

/// R -> {P1, 3}, 3 fails to construct, P1 is independent
fn catalog_with_broken_branch() -> MetadataCatalog {
    MetadataCatalog::new()
        .field::<R, P1>("p1")
        .field::<R, Node<3>>("broken")
}

#[test]
fn missing_result_key_is_a_binding_error() {
    for strategy in STRATEGIES {
        let catalog = MetadataCatalog::new().field_keyed::<R, P1>("p1", "does-not-exist");
        let log = log();
        let flow = flow(catalog, &log, strategy);

        let err = flow.produce::<R>().unwrap_err();
        let BuildError::Incomplete(incomplete) = err else {
            panic!("expected an incomplete build");
        };

        assert_eq!(incomplete.unresolved, vec![TypeInfo::of::<R>()]);
        assert!(matches!(
            incomplete.first_cause(),
            Some(NodeError::Binding { .. })
        ));
        assert!(incomplete.to_string().contains("does-not-exist"));
        // R was created, but never stored
        assert_eq!(count(&log, TypeInfo::of::<R>()), 1);
    }
}

#[test]
fn every_failed_branch_is_reported() {
    for strategy in STRATEGIES {
        let log = log();
        let factory = record::<0>(calcflow::FactoryRegistry::new(), &log);
        let factory = record::<3>(factory, &log)
            .register_with(|| Err::<P1, DynError>("no input file".into()))
            .register_with(|| Err::<P2, DynError>("no network".into()));
        let flow = CalcFlow::builder()
            .scanner(
                MetadataCatalog::new()
                    .field::<R, P1>("p1")
                    .field::<R, P2>("p2")
                    .field::<R, Node<3>>("three"),
            )
            .factory(factory)
            .strategy(strategy)
            .build()
            .unwrap();

        let err = flow.produce::<R>().unwrap_err();
        let BuildError::Incomplete(incomplete) = err else {
            panic!("expected an incomplete build");
        };

        assert_eq!(incomplete.causes.len(), 2, "{strategy:?}");
        assert_eq!(
            incomplete.causes.iter().map(NodeError::node).collect::<BTreeSet<_>>(),
            BTreeSet::from([TypeInfo::of::<P1>(), TypeInfo::of::<P2>()])
        );
        assert_eq!(
            incomplete.unresolved.iter().copied().collect::<BTreeSet<_>>(),
            BTreeSet::from([TypeInfo::of::<R>(), TypeInfo::of::<P1>(), TypeInfo::of::<P2>()])
        );
        // The healthy branch is still built
        assert_eq!(count(&log, TypeInfo::of::<Node<3>>()), 1);
        assert_eq!(count(&log, TypeInfo::of::<R>()), 0);
    }
}

#[test]
fn inherited_fields_and_implementations_are_resolved() {
    trait Source {}
    struct Base;
    let catalog = MetadataCatalog::new()
        .capability::<dyn Source>()
        .extends::<R, Base>()
        .extends::<Node<6>, dyn Source>()
        .prepare::<Base, Node<6>>()
        .field::<Base, P1>("p1")
        .field::<Base, dyn Source>("source");
    let log = log();
    let flow = flow(catalog, &log, ExecutionStrategy::Sequential);

    let root = flow.produce::<R>().unwrap();
    // R = 0 + 1 + 6
    assert_eq!(root.total(), 7);
    assert_eq!(count(&log, TypeInfo::of::<Node<6>>()), 1);
}

#[test]
fn produce_rejects_mismatched_root_type() {
    let log = log();
    let flow = flow(example_catalog(), &log, ExecutionStrategy::Sequential);
    let instance = flow
        .build_class(TypeInfo::of::<P1>(), &InstanceRegistry::new())
        .unwrap();

    assert_eq!(instance.info, TypeInfo::of::<P1>());
    assert!(instance.downcast::<P2>().is_err());
}

#[test]
fn zero_workers_is_rejected() {
    let result = CalcFlow::builder()
        .scanner(MetadataCatalog::new())
        .factory(calcflow::FactoryRegistry::new())
        .strategy(ExecutionStrategy::Concurrent { workers: 0 })
        .build();

    assert!(matches!(
        result,
        Err(calcflow::errors::ConfigError::NoWorkers)
    ));
}
