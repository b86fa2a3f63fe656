use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;
use std::time::Duration;

/// Cria o pool de conexões com o banco.
///
/// Cada worker de importação segura no máximo uma conexão por vez, então o
/// pool acompanha `MAX_CONCURRENT_UPLOADS` com folga para as consultas da
/// API (ver `DatabaseConfig::pool_size`).
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let mut connect_options = PgConnectOptions::from_str(database_url)?;

    // loga consultas lentas acima de 5 segundos
    connect_options =
        connect_options.log_slow_statements(tracing::log::LevelFilter::Warn, Duration::from_secs(5));

    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(connect_options)
        .await
}
