use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gqlgate::plan::{CompileError, CompileOptions, CompiledPlan, FederatedPlanner, PlanCompiler};
use gqlgate::schema::{FieldDefinition, TypeDefinition};
use gqlgate::{
    GatewayConfig, GatewayResult, GraphQLRequest, LookupOptions, LookupOutcome,
    NormalizedOperation, OperationCoordinator, Schema, SchemaUpdate,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Two subgraphs: `accounts` owns users and the scalar root fields, `products`
/// owns products. Reviews on users are resolved by `reviews`.
pub fn supergraph(version: &str) -> Schema {
    Schema::new()
        .with_version(version)
        .with_type(
            "Query",
            TypeDefinition::object()
                .with_field("a", FieldDefinition::new("String").owned_by("accounts"))
                .with_field("b", FieldDefinition::new("String").owned_by("accounts"))
                .with_field("c", FieldDefinition::new("String").owned_by("accounts"))
                .with_field("me", FieldDefinition::new("User").owned_by("accounts"))
                .with_field(
                    "topProducts",
                    FieldDefinition::new("[Product]")
                        .owned_by("products")
                        .with_argument("first", "Int"),
                ),
        )
        .with_type(
            "User",
            TypeDefinition::object()
                .owned_by("accounts")
                .with_keys(vec!["id".into()])
                .with_field("id", FieldDefinition::new("ID!"))
                .with_field("name", FieldDefinition::new("String"))
                .with_field(
                    "reviews",
                    FieldDefinition::new("[Review]").owned_by("reviews"),
                ),
        )
        .with_type(
            "Product",
            TypeDefinition::object()
                .owned_by("products")
                .with_keys(vec!["upc".into()])
                .with_field("upc", FieldDefinition::new("String!"))
                .with_field("name", FieldDefinition::new("String")),
        )
        .with_type(
            "Review",
            TypeDefinition::object()
                .owned_by("reviews")
                .with_field("body", FieldDefinition::new("String")),
        )
}

pub fn request(query: &str) -> Vec<u8> {
    GraphQLRequest::new(query).to_bytes().unwrap()
}

/// `FederatedPlanner` that counts calls, can be slowed down and can be told
/// to fail
pub struct CountingCompiler {
    planner: FederatedPlanner,
    calls: AtomicUsize,
    delay: Duration,
    failing: AtomicBool,
}

impl CountingCompiler {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            planner: FederatedPlanner::new(),
            calls: AtomicUsize::new(0),
            delay,
            failing: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl PlanCompiler for CountingCompiler {
    fn compile(
        &self,
        operation: &NormalizedOperation,
        schema: &Schema,
        options: &CompileOptions,
    ) -> Result<CompiledPlan, CompileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CompileError::Planning(
                "subgraph 'accounts' is unavailable".to_string(),
            ));
        }
        self.planner.compile(operation, schema, options)
    }
}

pub struct GatewayFixture {
    pub coordinator: OperationCoordinator,
    pub compiler: Arc<CountingCompiler>,
}

impl GatewayFixture {
    pub fn new(config: GatewayConfig, compiler: CountingCompiler) -> Self {
        init_logging();
        let compiler = Arc::new(compiler);
        let coordinator =
            OperationCoordinator::new(config, Arc::clone(&compiler) as Arc<dyn PlanCompiler>)
                .expect("Failed to create coordinator");
        Self {
            coordinator,
            compiler,
        }
    }

    /// Fixture with the base graph loaded at `version`
    pub async fn with_base(config: GatewayConfig, compiler: CountingCompiler, version: &str) -> Self {
        let fixture = Self::new(config, compiler);
        fixture
            .coordinator
            .apply_schema_update(SchemaUpdate::new(supergraph(version)))
            .await
            .expect("Failed to load base schema");
        fixture
    }

    pub async fn lookup(&self, tenant_key: &str, query: &str) -> GatewayResult<LookupOutcome> {
        self.coordinator.lookup(tenant_key, &request(query)).await
    }

    pub async fn lookup_traced(&self, tenant_key: &str, query: &str) -> GatewayResult<LookupOutcome> {
        self.coordinator
            .lookup_with_options(
                tenant_key,
                &request(query),
                LookupOptions {
                    include_query_plan: false,
                    trace: true,
                },
            )
            .await
    }
}
