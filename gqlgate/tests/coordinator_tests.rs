//! Lookup pipeline tests: identity, caching, deduplication, tenant scoping
//! and cache set retirement

#[path = "testutils/mod.rs"]
mod testutils;

use std::sync::Arc;
use std::time::Duration;

use gqlgate::cache::CacheSetState;
use gqlgate::{GatewayConfig, GatewayError, SchemaUpdate};
use testutils::gateway_fixture::{request, supergraph, CountingCompiler, GatewayFixture};

#[tokio::test]
async fn test_equivalent_queries_share_one_plan() {
    let fixture = GatewayFixture::with_base(GatewayConfig::default(), CountingCompiler::new(), "v1").await;

    let first = fixture.lookup("", "{ a b }").await.unwrap();
    assert!(!first.hits.plan);
    assert!(!first.hits.normalization);

    let second = fixture
        .lookup("", "query {\n  b\n  a # trailing comment\n}")
        .await
        .unwrap();
    assert!(second.hits.plan);
    assert!(second.hits.validation);
    assert!(!second.hits.normalization);
    assert_eq!(first.operation.hash(), second.operation.hash());
    assert!(Arc::ptr_eq(&first.plan, &second.plan));

    let third = fixture.lookup("", "{ a b }").await.unwrap();
    assert!(third.hits.normalization);
    assert!(third.hits.plan);

    assert_eq!(fixture.compiler.calls(), 1);
    let counters = fixture.coordinator.stats().counters;
    assert_eq!(counters.plan_hits, 2);
    assert_eq!(counters.plan_misses, 1);
    assert_eq!(counters.compilations, 1);
}

#[tokio::test]
async fn test_operation_name_selects_and_scopes_identity() {
    let fixture = GatewayFixture::with_base(GatewayConfig::default(), CountingCompiler::new(), "v1").await;
    let document = "query A { a } query B { a }";

    let body = |name: &str| {
        gqlgate::GraphQLRequest::new(document)
            .with_operation_name(name)
            .to_bytes()
            .unwrap()
    };
    let a = fixture.coordinator.lookup("", &body("A")).await.unwrap();
    let b = fixture.coordinator.lookup("", &body("B")).await.unwrap();
    assert_ne!(a.operation.hash(), b.operation.hash());
    assert_eq!(a.plan.operation_name.as_deref(), Some("A"));
    assert_eq!(fixture.compiler.calls(), 2);

    let ambiguous = fixture.coordinator.lookup("", &request(document)).await;
    assert!(matches!(
        ambiguous,
        Err(GatewayError::AmbiguousOperation { count: 2 })
    ));
}

#[tokio::test]
async fn test_tenant_isolation() {
    let fixture = GatewayFixture::new(GatewayConfig::default(), CountingCompiler::new());
    fixture
        .coordinator
        .apply_schema_update(
            SchemaUpdate::new(supergraph("v1")).with_feature_flag("beta", supergraph("v1-beta")),
        )
        .await
        .unwrap();

    let beta = fixture.lookup("beta", "{ a }").await.unwrap();
    assert_eq!(beta.plan.tenant_key, "beta");

    let base = fixture.lookup("", "{ a }").await.unwrap();
    assert!(!base.hits.plan);
    assert_eq!(base.plan.tenant_key, "");
    assert_eq!(base.plan.schema_version, "v1");
    assert_eq!(base.operation.hash(), beta.operation.hash());
    assert_eq!(fixture.compiler.calls(), 2);

    assert!(fixture.lookup("beta", "{ a }").await.unwrap().hits.plan);
    assert!(fixture.lookup("", "{ a }").await.unwrap().hits.plan);
}

#[tokio::test]
async fn test_evicted_plan_is_recompiled() {
    let mut config = GatewayConfig::default();
    config.cache.plan.max_cost = 1;
    let fixture = GatewayFixture::with_base(config, CountingCompiler::new(), "v1").await;

    fixture.lookup("", "{ a }").await.unwrap();
    fixture.lookup("", "{ b }").await.unwrap();
    assert_eq!(fixture.compiler.calls(), 2);

    let again = fixture.lookup("", "{ a }").await.unwrap();
    assert!(!again.hits.plan);
    assert_eq!(fixture.compiler.calls(), 3);

    let set = fixture.coordinator.cache_set("").unwrap();
    assert_eq!(set.plans().len(), 1);
}

#[tokio::test]
async fn test_disabled_cache_always_compiles() {
    let config = GatewayConfig {
        cache: gqlgate::CacheConfig::disabled(),
        ..GatewayConfig::default()
    };
    let fixture = GatewayFixture::with_base(config, CountingCompiler::new(), "v1").await;

    for _ in 0..3 {
        let outcome = fixture.lookup("", "{ a }").await.unwrap();
        assert!(!outcome.hits.plan);
        assert!(!outcome.hits.normalization);
    }
    assert_eq!(fixture.compiler.calls(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_lookups_compile_once() {
    let fixture = Arc::new(
        GatewayFixture::with_base(
            GatewayConfig::default(),
            CountingCompiler::with_delay(Duration::from_millis(200)),
            "v1",
        )
        .await,
    );

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..16 {
        let fixture = Arc::clone(&fixture);
        tasks.spawn(async move { fixture.lookup("", "{ me { id name } }").await });
    }

    let mut hashes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined.unwrap().unwrap();
        hashes.push(outcome.plan.operation_hash);
    }
    assert_eq!(hashes.len(), 16);
    assert!(hashes.iter().all(|h| *h == hashes[0]));
    assert_eq!(fixture.compiler.calls(), 1);
    assert!(fixture.coordinator.stats().counters.deduplicated_waits > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_compile_errors_are_shared_but_not_cached() {
    let fixture = Arc::new(
        GatewayFixture::with_base(
            GatewayConfig::default(),
            CountingCompiler::with_delay(Duration::from_millis(200)),
            "v1",
        )
        .await,
    );
    fixture.compiler.set_failing(true);

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let fixture = Arc::clone(&fixture);
        tasks.spawn(async move { fixture.lookup("", "{ c }").await });
    }
    while let Some(joined) = tasks.join_next().await {
        let err = joined.unwrap().unwrap_err();
        assert!(matches!(err, GatewayError::Compilation(_)));
        assert!(!err.is_client_error());
    }
    assert_eq!(fixture.compiler.calls(), 1);

    fixture.compiler.set_failing(false);
    let outcome = fixture.lookup("", "{ c }").await.unwrap();
    assert!(!outcome.hits.plan);
    assert_eq!(fixture.compiler.calls(), 2);
    assert_eq!(fixture.coordinator.stats().counters.compilation_errors, 1);
}

#[tokio::test]
async fn test_trace_requests_bypass_the_cache() {
    let fixture = GatewayFixture::with_base(GatewayConfig::default(), CountingCompiler::new(), "v1").await;

    let cached = fixture.lookup("", "{ a }").await.unwrap();
    assert!(cached.plan.trace.is_none());

    let traced = fixture.lookup_traced("", "{ a }").await.unwrap();
    assert!(!traced.hits.plan);
    assert!(traced.plan.trace.is_some());
    assert_eq!(fixture.compiler.calls(), 2);

    let again = fixture.lookup("", "{ a }").await.unwrap();
    assert!(again.hits.plan);
    assert!(again.plan.trace.is_none());
    assert_eq!(fixture.coordinator.stats().counters.bypassed_compilations, 1);
}

#[tokio::test]
async fn test_routing_errors() {
    let fixture = GatewayFixture::new(GatewayConfig::default(), CountingCompiler::new());
    assert!(matches!(
        fixture.lookup("", "{ a }").await,
        Err(GatewayError::NotReady(_))
    ));

    fixture
        .coordinator
        .apply_schema_update(SchemaUpdate::new(supergraph("v1")))
        .await
        .unwrap();
    let err = fixture.lookup("gamma", "{ a }").await.unwrap_err();
    assert!(matches!(err, GatewayError::UnknownTenant(ref t) if t == "gamma"));
    assert!(err.is_client_error());
}

#[tokio::test]
async fn test_bad_input_is_a_client_error() {
    let fixture = GatewayFixture::with_base(GatewayConfig::default(), CountingCompiler::new(), "v1").await;

    let syntax = fixture.lookup("", "{ a ").await.unwrap_err();
    assert!(matches!(syntax, GatewayError::Parse(_)));

    let deep = format!("{}{}", "{ a ".repeat(20_000), "}".repeat(20_000));
    let nested = fixture.lookup("", &deep).await.unwrap_err();
    assert!(matches!(nested, GatewayError::Parse(_)));

    let unknown = fixture.lookup("", "{ nope }").await.unwrap_err();
    assert!(matches!(unknown, GatewayError::Validation(_)));
    let again = fixture.lookup("", "{  nope }").await.unwrap_err();
    assert!(again.is_client_error());
    assert_eq!(fixture.coordinator.stats().counters.validation_hits, 1);

    let body = fixture.coordinator.lookup("", br#"{"variables":{}}"#).await;
    assert!(matches!(body, Err(GatewayError::InvalidRequest(_))));
    assert_eq!(fixture.compiler.calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rebuilt_set_does_not_join_retiring_compilation() {
    let config = GatewayConfig {
        retire_grace_period_ms: 60_000,
        ..GatewayConfig::default()
    };
    let fixture = Arc::new(
        GatewayFixture::with_base(
            config,
            CountingCompiler::with_delay(Duration::from_millis(300)),
            "v1",
        )
        .await,
    );
    let original = fixture.coordinator.cache_set("").unwrap();

    let inflight = {
        let fixture = Arc::clone(&fixture);
        tokio::spawn(async move { fixture.lookup("", "{ a }").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    for version in ["v2", "v1"] {
        fixture
            .coordinator
            .apply_schema_update(SchemaUpdate::new(supergraph(version)))
            .await
            .unwrap();
    }
    assert_eq!(original.state(), CacheSetState::Retiring);
    let rebuilt = fixture.coordinator.cache_set("").unwrap();
    assert_eq!(rebuilt.schema_version(), original.schema_version());
    assert_ne!(rebuilt.id(), original.id());

    let outcome = fixture.lookup("", "{ a }").await.unwrap();
    assert!(!outcome.hits.plan);
    assert_eq!(fixture.coordinator.stats().counters.deduplicated_waits, 0);
    assert_eq!(rebuilt.plans().len(), 1);

    inflight.await.unwrap().unwrap();
    assert_eq!(fixture.compiler.calls(), 2);
    assert!(fixture.lookup("", "{ a }").await.unwrap().hits.plan);
}

#[tokio::test]
async fn test_inflight_request_finishes_on_retired_set() {
    let config = GatewayConfig {
        retire_grace_period_ms: 60_000,
        ..GatewayConfig::default()
    };
    let fixture = Arc::new(
        GatewayFixture::with_base(
            config,
            CountingCompiler::with_delay(Duration::from_millis(300)),
            "v1",
        )
        .await,
    );
    let v1 = fixture.coordinator.cache_set("").unwrap();

    let inflight = {
        let fixture = Arc::clone(&fixture);
        tokio::spawn(async move { fixture.lookup("", "{ a }").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(v1.in_flight(), 2);

    let report = fixture
        .coordinator
        .apply_schema_update(SchemaUpdate::new(supergraph("v2")))
        .await
        .unwrap();
    assert_eq!(report.retired.len(), 1);
    assert_eq!(v1.state(), CacheSetState::Retiring);

    let outcome = inflight.await.unwrap().unwrap();
    assert_eq!(outcome.plan.schema_version, "v1");
    assert_eq!(v1.state(), CacheSetState::Closed);

    let fresh = fixture.lookup("", "{ a }").await.unwrap();
    assert_eq!(fresh.plan.schema_version, "v2");
}

#[tokio::test]
async fn test_schema_update_rebuilds_only_changed_tenants() {
    let fixture = GatewayFixture::new(GatewayConfig::default(), CountingCompiler::new());
    fixture
        .coordinator
        .apply_schema_update(
            SchemaUpdate::new(supergraph("v1")).with_feature_flag("beta", supergraph("v1-beta")),
        )
        .await
        .unwrap();
    let base = fixture.coordinator.cache_set("").unwrap();
    fixture.lookup("beta", "{ b }").await.unwrap();
    assert_eq!(fixture.coordinator.tracker().len("beta"), 1);

    let report = fixture
        .coordinator
        .apply_schema_update(
            SchemaUpdate::new(supergraph("v1")).with_feature_flag("beta", supergraph("v2-beta")),
        )
        .await
        .unwrap();
    assert_eq!(report.unchanged, vec!["".to_string()]);
    assert_eq!(report.built.len(), 1);
    assert_eq!(report.built[0].tenant_key, "beta");
    assert_eq!(base.state(), CacheSetState::Active);

    let report = fixture
        .coordinator
        .apply_schema_update(SchemaUpdate::new(supergraph("v1")))
        .await
        .unwrap();
    assert_eq!(report.removed, vec!["beta".to_string()]);
    assert!(fixture.coordinator.tracker().snapshot("beta").is_none());
    assert!(matches!(
        fixture.lookup("beta", "{ b }").await,
        Err(GatewayError::UnknownTenant(_))
    ));
}

#[tokio::test]
async fn test_schema_updates_from_a_feed() {
    let fixture = GatewayFixture::new(GatewayConfig::default(), CountingCompiler::new());
    let (sender, receiver) = tokio::sync::mpsc::channel(4);
    let watcher = fixture.coordinator.watch_schema_updates(receiver);

    sender.send(SchemaUpdate::new(supergraph("v1"))).await.unwrap();
    sender.send(SchemaUpdate::new(supergraph("v2"))).await.unwrap();
    drop(sender);
    watcher.await.unwrap();

    assert_eq!(
        fixture.coordinator.cache_set("").unwrap().schema_version(),
        "v2"
    );
}

#[tokio::test]
async fn test_invalid_cache_config_fails_construction() {
    let mut config = GatewayConfig::default();
    config.cache.normalization.max_cost = 0;
    let result = gqlgate::OperationCoordinator::new(
        config,
        Arc::new(CountingCompiler::new()),
    );
    assert!(matches!(result, Err(GatewayError::CacheBackend(_))));
}
