use serde::{Deserialize, Serialize};

/// Configuração da aplicação
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    /// Timeout por chamada ao banco, em segundos
    pub timeout_secs: u64,
    /// Conexões máximas no pool; dimensionado para os workers de lote
    /// (uma conexão por worker) mais as consultas da API
    pub pool_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Importações simultâneas por lote
    pub max_concurrent_uploads: usize,
    /// Idade máxima de jobs terminais antes da limpeza periódica
    pub job_retention_secs: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/nfe".to_string(),
                timeout_secs: 30,
                pool_size: 10,
            },
            batch: BatchConfig {
                max_concurrent_uploads: 5,
                job_retention_secs: 3600,
            },
        }
    }
}

impl AppConfig {
    /// Carrega a configuração das variáveis de ambiente
    pub fn from_env() -> Self {
        let padrao = Self::default();
        Self {
            server: ServerConfig {
                host: std::env::var("SERVER_HOST").unwrap_or(padrao.server.host),
                port: std::env::var("SERVER_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(padrao.server.port),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL").unwrap_or(padrao.database.url),
                timeout_secs: std::env::var("DB_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(padrao.database.timeout_secs),
                pool_size: std::env::var("DB_POOL_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(padrao.database.pool_size),
            },
            batch: BatchConfig {
                max_concurrent_uploads: std::env::var("MAX_CONCURRENT_UPLOADS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(padrao.batch.max_concurrent_uploads),
                job_retention_secs: std::env::var("JOB_RETENTION_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(padrao.batch.job_retention_secs),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cobrem_execucao_local() {
        let config = AppConfig::default();
        assert_eq!(config.database.timeout_secs, 30);
        // o pool comporta todos os workers de lote simultâneos
        assert!(config.database.pool_size as usize >= config.batch.max_concurrent_uploads);
        assert_eq!(config.batch.max_concurrent_uploads, 5);
    }
}
