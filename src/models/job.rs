use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Máximo de entradas de erro expostas no snapshot de um job
pub const MAX_ERROS_SNAPSHOT: usize = 50;

/// Ciclo de vida de um job de lote.
///
/// `Pending -> Running -> {Completed | Failed | Cancelled}`; estados
/// terminais são finais.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(format!("status de job desconhecido: {other}")),
        }
    }
}

/// Erro estruturado de um único arquivo dentro do lote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobErro {
    pub file: String,
    pub error: String,
    pub error_kind: String,
    pub timestamp: DateTime<Utc>,
}

/// Registro de acompanhamento de um lote de importação.
///
/// Contadores e lista de erros só são mutados pelo orquestrador através do
/// registry (uma escrita por vez); após estado terminal o job é imutável.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub job_id: String,
    pub folder: String,
    pub status: JobStatus,
    pub total: u64,
    pub processed: u64,
    pub successful: u64,
    pub failed: u64,
    /// Notas cuja chave de acesso já existia (não conta como falha)
    pub duplicated: u64,
    pub errors: Vec<JobErro>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchJob {
    pub fn new(job_id: String, folder: String, total: u64) -> Self {
        Self {
            job_id,
            folder,
            status: JobStatus::Pending,
            total,
            processed: 0,
            successful: 0,
            failed: 0,
            duplicated: 0,
            errors: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Progresso derivado, nunca armazenado (0.0 a 100.0)
    pub fn progresso(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.processed as f64 / self.total as f64) * 100.0
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        let started = self.started_at?;
        let fim = self.completed_at.unwrap_or_else(Utc::now);
        Some((fim - started).num_milliseconds() as f64 / 1000.0)
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.job_id.clone(),
            status: self.status,
            folder: self.folder.clone(),
            total: self.total,
            processed: self.processed,
            successful: self.successful,
            failed: self.failed,
            duplicated: self.duplicated,
            errors: self
                .errors
                .iter()
                .take(MAX_ERROS_SNAPSHOT)
                .cloned()
                .collect(),
            progress: (self.progresso() * 100.0).round() / 100.0,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            duration_seconds: self.duration_seconds(),
        }
    }
}

/// Forma estável do status de job consumida pelos pollers externos
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    pub folder: String,
    pub total: u64,
    pub processed: u64,
    pub successful: u64,
    pub failed: u64,
    pub duplicated: u64,
    pub errors: Vec<JobErro>,
    pub progress: f64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
}
