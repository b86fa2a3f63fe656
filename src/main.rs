use axum::{
    routing::{delete, get, post},
    Router,
};
use nfe_import_rust::api::{self, ApiState};
use nfe_import_rust::{create_pool, AppConfig, JobRegistry, PgStore};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Log com horário local
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // Configuração
    let config = AppConfig::from_env();
    info!("Starting server with config: {:?}", config);

    // Pool de conexões
    let pool = create_pool(&config.database.url, config.database.pool_size).await?;
    info!("Database pool created");

    // Migrações (cria o schema normalizado de NF-e quando necessário)
    sqlx::migrate!("./migrations").run(&pool).await?;

    let store = Arc::new(PgStore::new(pool, config.database.timeout_secs));
    let registry = Arc::new(JobRegistry::new());

    // Limpeza periódica de jobs terminais antigos (mantém os falhados)
    let retention = chrono::Duration::seconds(config.batch.job_retention_secs);
    let registry_limpeza = registry.clone();
    tokio::spawn(async move {
        let mut intervalo = tokio::time::interval(Duration::from_secs(300));
        loop {
            intervalo.tick().await;
            registry_limpeza.cleanup(retention, true);
        }
    });

    let state = ApiState {
        store,
        registry,
        max_concurrent: config.batch.max_concurrent_uploads,
    };

    let app = Router::new()
        .route("/health", get(api::health_check))
        .route("/api/batch/upload", post(api::batch_upload::<PgStore>))
        .route("/api/batch/status/:job_id", get(api::job_status::<PgStore>))
        .route("/api/batch/jobs", get(api::list_jobs::<PgStore>))
        .route("/api/batch/jobs/:job_id", delete(api::delete_job::<PgStore>))
        .route(
            "/api/batch/jobs/:job_id/cancel",
            post(api::cancel_job::<PgStore>),
        )
        .layer(ServiceBuilder::new())
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST   /api/batch/upload              - submete lote de XMLs");
    info!("  GET    /api/batch/status/:job_id      - status do job");
    info!("  GET    /api/batch/jobs                - lista jobs");
    info!("  POST   /api/batch/jobs/:job_id/cancel - cancela job");
    info!("  DELETE /api/batch/jobs/:job_id        - remove job terminal");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
