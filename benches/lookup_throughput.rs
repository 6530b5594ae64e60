/// Benchmark for plan lookup throughput
///
/// Measures lookups served from a warm plan cache against lookups that have
/// to compile, and the cost of many concurrent callers asking for the same
/// uncached operation.
use gqlgate::schema::{FieldDefinition, TypeDefinition};
use gqlgate::{
    CacheConfig, FederatedPlanner, GatewayConfig, GraphQLRequest, OperationCoordinator, Schema,
    SchemaUpdate,
};
use std::sync::Arc;
use std::time::Instant;

fn supergraph() -> Schema {
    let mut query = TypeDefinition::object();
    for i in 0..50 {
        query = query.with_field(
            format!("field{}", i),
            FieldDefinition::new("Product").owned_by(if i % 2 == 0 { "products" } else { "inventory" }),
        );
    }
    Schema::new()
        .with_version("bench")
        .with_type("Query", query)
        .with_type(
            "Product",
            TypeDefinition::object()
                .owned_by("products")
                .with_keys(vec!["upc".into()])
                .with_field("upc", FieldDefinition::new("String!"))
                .with_field("name", FieldDefinition::new("String"))
                .with_field("inStock", FieldDefinition::new("Boolean").owned_by("inventory")),
        )
}

fn body(i: usize) -> Vec<u8> {
    let query = format!(
        "query Op{i} {{ field{} {{ name inStock }} field{} {{ upc }} }}",
        i % 50,
        (i + 7) % 50
    );
    GraphQLRequest::new(query).to_bytes().expect("Failed to encode request")
}

async fn coordinator(cache: CacheConfig) -> OperationCoordinator {
    let config = GatewayConfig {
        cache,
        ..GatewayConfig::default()
    };
    let coordinator = OperationCoordinator::new(config, Arc::new(FederatedPlanner::new()))
        .expect("Failed to create coordinator");
    coordinator
        .apply_schema_update(SchemaUpdate::new(supergraph()))
        .await
        .expect("Failed to load schema");
    coordinator
}

fn main() {
    println!("=== Plan Lookup Throughput Benchmark ===\n");
    let runtime = tokio::runtime::Runtime::new().expect("Failed to start runtime");
    let operations = 200;
    let iterations = 20;
    let bodies: Vec<Vec<u8>> = (0..operations).map(body).collect();

    runtime.block_on(async {
        // Cold: caching disabled, every lookup compiles
        println!("📊 Benchmark: lookups with caching disabled");
        let cold = coordinator(CacheConfig::disabled()).await;
        let start = Instant::now();
        for _ in 0..iterations {
            for body in &bodies {
                cold.lookup("", body).await.expect("lookup failed");
            }
        }
        let elapsed = start.elapsed();
        let total = operations * iterations;
        println!("  Lookups: {}", total);
        println!("  Time: {:?}", elapsed);
        println!("  Throughput: {:.0} lookups/sec\n", total as f64 / elapsed.as_secs_f64());

        // Warm: first pass compiles, the rest hit the caches
        println!("📊 Benchmark: lookups with caching enabled");
        let warm = coordinator(CacheConfig::default()).await;
        let start = Instant::now();
        for _ in 0..iterations {
            for body in &bodies {
                warm.lookup("", body).await.expect("lookup failed");
            }
        }
        let elapsed = start.elapsed();
        let counters = warm.stats().counters;
        println!("  Lookups: {}", total);
        println!("  Time: {:?}", elapsed);
        println!("  Throughput: {:.0} lookups/sec", total as f64 / elapsed.as_secs_f64());
        println!("  Plan hit rate: {:.1}%\n", counters.plan_hit_rate() * 100.0);

        // Herd: many callers for the same uncached operation
        println!("📊 Benchmark: 64 concurrent callers per uncached operation");
        let herd = coordinator(CacheConfig::default()).await;
        let start = Instant::now();
        for body in bodies.iter().take(50) {
            let mut tasks = tokio::task::JoinSet::new();
            for _ in 0..64 {
                let herd = herd.clone();
                let body = body.clone();
                tasks.spawn(async move { herd.lookup("", &body).await.map(|_| ()) });
            }
            while let Some(joined) = tasks.join_next().await {
                joined.expect("task failed").expect("lookup failed");
            }
        }
        let counters = herd.stats().counters;
        println!("  Time: {:?}", start.elapsed());
        println!("  Compilations: {} for 50 operations", counters.compilations);
        println!("  Deduplicated waits: {}", counters.deduplicated_waits);
    });
}
