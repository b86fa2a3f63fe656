use chrono::{Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ImportError;
use crate::models::{BatchJob, JobErro, JobSnapshot, JobStatus};
use crate::service::importer::ImportOutcome;

/// Registro de jobs de lote em andamento e concluídos.
///
/// O mapa job_id -> BatchJob é o único estado mutável compartilhado do
/// núcleo; toda atualização de contadores passa por `get_mut`, que segura o
/// lock do shard e garante uma escrita por vez (nunca read-modify-write sem
/// sincronização). Criado na subida do processo e injetado por referência,
/// nunca um singleton de linguagem.
#[derive(Default)]
pub struct JobRegistry {
    jobs: DashMap<String, BatchJob>,
}

/// Estatísticas agregadas do registro
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub total_jobs: usize,
    pub active_jobs: usize,
    pub total_files_processed: u64,
    pub total_successful: u64,
    pub total_failed: u64,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cria um job em `Pending`; gera um UUID quando o chamador não fornece
    /// id. Um id já registrado devolve o job existente (a API pré-cria o job
    /// antes de disparar o processamento em background).
    pub fn create_job(&self, job_id: Option<String>, folder: &str, total: u64) -> JobSnapshot {
        let job_id = job_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        if let Some(existente) = self.jobs.get(&job_id) {
            return existente.snapshot();
        }
        let job = BatchJob::new(job_id.clone(), folder.to_string(), total);
        let snapshot = job.snapshot();
        self.jobs.insert(job_id.clone(), job);
        info!("job {} criado para {} ({} arquivos)", job_id, folder, total);
        snapshot
    }

    /// `Pending -> Running`
    pub fn start(&self, job_id: &str) {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            if job.status == JobStatus::Pending {
                job.status = JobStatus::Running;
                job.started_at = Some(Utc::now());
            }
        }
    }

    /// `Running -> Completed`; um job cancelado no meio permanece cancelado
    pub fn complete(&self, job_id: &str) {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            if job.status == JobStatus::Running {
                job.status = JobStatus::Completed;
                job.completed_at = Some(Utc::now());
                info!(
                    "job {} concluído: {} ok, {} duplicadas, {} falhas de {} arquivos",
                    job_id, job.successful, job.duplicated, job.failed, job.total
                );
            }
        }
    }

    /// Falha de orquestração (distinta das falhas por documento, que mantêm
    /// o lote `Completed`)
    pub fn fail(&self, job_id: &str, erro: &str) {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            if !job.status.is_terminal() {
                job.status = JobStatus::Failed;
                job.completed_at = Some(Utc::now());
                tracing::error!("job {} falhou: {}", job_id, erro);
            }
        }
    }

    /// Cancela um job ativo. Workers em voo terminam o documento atual;
    /// apenas a submissão de novos documentos é interrompida.
    pub fn cancel(&self, job_id: &str) -> Option<JobSnapshot> {
        let mut job = self.jobs.get_mut(job_id)?;
        if !job.status.is_terminal() {
            job.status = JobStatus::Cancelled;
            job.completed_at = Some(Utc::now());
            info!("job {} cancelado", job_id);
        }
        Some(job.snapshot())
    }

    pub fn is_cancelled(&self, job_id: &str) -> bool {
        self.jobs
            .get(job_id)
            .map(|j| j.status == JobStatus::Cancelled)
            .unwrap_or(true)
    }

    /// Registra o desfecho terminal de um documento num único passo atômico
    /// (contadores e entrada de erro juntos, sob o mesmo lock).
    pub fn record_outcome(
        &self,
        job_id: &str,
        arquivo: &str,
        resultado: &Result<ImportOutcome, ImportError>,
    ) {
        let Some(mut job) = self.jobs.get_mut(job_id) else {
            return;
        };
        // Completed/Failed são imutáveis; Cancelled ainda recebe os
        // documentos que estavam em voo quando o cancelamento chegou
        if matches!(job.status, JobStatus::Completed | JobStatus::Failed) {
            return;
        }

        match resultado {
            Ok(ImportOutcome::Importada(_)) => job.successful += 1,
            Ok(ImportOutcome::JaImportada) => job.duplicated += 1,
            Err(e) => {
                job.failed += 1;
                job.errors.push(JobErro {
                    file: arquivo.to_string(),
                    error: e.to_string(),
                    error_kind: e.kind().to_string(),
                    timestamp: Utc::now(),
                });
            }
        }
        job.processed += 1;
    }

    pub fn get(&self, job_id: &str) -> Option<JobSnapshot> {
        self.jobs.get(job_id).map(|j| j.snapshot())
    }

    /// Lista jobs do mais novo para o mais antigo, com filtro e limite opcionais
    pub fn list(&self, status: Option<JobStatus>, limit: Option<usize>) -> Vec<JobSnapshot> {
        let mut jobs: Vec<JobSnapshot> = self
            .jobs
            .iter()
            .filter(|j| status.map_or(true, |s| j.status == s))
            .map(|j| j.snapshot())
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            jobs.truncate(limit);
        }
        jobs
    }

    pub fn delete(&self, job_id: &str) -> bool {
        let removido = self.jobs.remove(job_id).is_some();
        if removido {
            debug!("job {} removido", job_id);
        }
        removido
    }

    /// Remove jobs terminais mais velhos que `max_age`; com `keep_failed`
    /// os jobs falhados ficam para post-mortem
    pub fn cleanup(&self, max_age: Duration, keep_failed: bool) -> usize {
        let agora = Utc::now();
        let mut removiveis = Vec::new();

        for job in self.jobs.iter() {
            if job.is_active() {
                continue;
            }
            if keep_failed && job.status == JobStatus::Failed {
                continue;
            }
            let fim = job.completed_at.unwrap_or(job.created_at);
            if agora - fim > max_age {
                removiveis.push(job.job_id.clone());
            }
        }

        for job_id in &removiveis {
            self.jobs.remove(job_id);
        }
        if !removiveis.is_empty() {
            info!("limpeza removeu {} jobs antigos", removiveis.len());
        }
        removiveis.len()
    }

    pub fn statistics(&self) -> RegistryStats {
        let mut stats = RegistryStats {
            total_jobs: 0,
            active_jobs: 0,
            total_files_processed: 0,
            total_successful: 0,
            total_failed: 0,
        };
        for job in self.jobs.iter() {
            stats.total_jobs += 1;
            if job.is_active() {
                stats.active_jobs += 1;
            }
            stats.total_files_processed += job.processed;
            stats.total_successful += job.successful;
            stats.total_failed += job.failed;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;

    fn registro_com_job(total: u64) -> (JobRegistry, String) {
        let registry = JobRegistry::new();
        let snap = registry.create_job(None, "/tmp/xmls", total);
        (registry, snap.job_id)
    }

    #[test]
    fn ciclo_de_vida_normal() {
        let (registry, id) = registro_com_job(2);
        assert_eq!(registry.get(&id).unwrap().status, JobStatus::Pending);

        registry.start(&id);
        assert_eq!(registry.get(&id).unwrap().status, JobStatus::Running);

        registry.record_outcome(&id, "a.xml", &Ok(ImportOutcome::Importada(1)));
        registry.record_outcome(
            &id,
            "b.xml",
            &Err(ImportError::Parse(ParseError::NoRoot)),
        );
        registry.complete(&id);

        let snap = registry.get(&id).unwrap();
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.processed, 2);
        assert_eq!(snap.successful, 1);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.errors.len(), 1);
        assert_eq!(snap.errors[0].error_kind, "ParseError");
        assert_eq!(snap.progress, 100.0);
        assert!(snap.duration_seconds.is_some());
    }

    #[test]
    fn estado_terminal_e_final() {
        let (registry, id) = registro_com_job(1);
        registry.start(&id);
        registry.complete(&id);

        // nenhuma transição ou contagem depois de terminal
        registry.fail(&id, "tarde demais");
        registry.record_outcome(&id, "x.xml", &Ok(ImportOutcome::Importada(9)));

        let snap = registry.get(&id).unwrap();
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.processed, 0);
    }

    #[test]
    fn duplicada_conta_separado_de_falha() {
        let (registry, id) = registro_com_job(2);
        registry.start(&id);
        registry.record_outcome(&id, "a.xml", &Ok(ImportOutcome::JaImportada));

        let snap = registry.get(&id).unwrap();
        assert_eq!(snap.duplicated, 1);
        assert_eq!(snap.failed, 0);
        assert_eq!(snap.successful, 0);
        assert_eq!(snap.processed, 1);
    }

    #[test]
    fn cancelado_ainda_recebe_documentos_em_voo() {
        let (registry, id) = registro_com_job(3);
        registry.start(&id);
        registry.cancel(&id);
        assert!(registry.is_cancelled(&id));

        // worker que já estava processando termina e é contado
        registry.record_outcome(&id, "a.xml", &Ok(ImportOutcome::Importada(1)));
        // complete não sobrescreve o cancelamento
        registry.complete(&id);

        let snap = registry.get(&id).unwrap();
        assert_eq!(snap.status, JobStatus::Cancelled);
        assert_eq!(snap.processed, 1);
    }

    #[test]
    fn list_filtra_e_limita_do_mais_novo() {
        let registry = JobRegistry::new();
        let a = registry.create_job(Some("a".into()), "/x", 1).job_id;
        let b = registry.create_job(Some("b".into()), "/x", 1).job_id;
        registry.start(&b);

        let pendentes = registry.list(Some(JobStatus::Pending), None);
        assert_eq!(pendentes.len(), 1);
        assert_eq!(pendentes[0].job_id, a);

        let todos = registry.list(None, Some(1));
        assert_eq!(todos.len(), 1);
    }

    #[test]
    fn cleanup_respeita_idade_e_keep_failed() {
        let registry = JobRegistry::new();
        let ok = registry.create_job(Some("ok".into()), "/x", 1).job_id;
        let ruim = registry.create_job(Some("ruim".into()), "/x", 1).job_id;
        let ativo = registry.create_job(Some("ativo".into()), "/x", 1).job_id;

        registry.start(&ok);
        registry.complete(&ok);
        registry.start(&ruim);
        registry.fail(&ruim, "backend fora");
        registry.start(&ativo);

        // idade zero: tudo que é terminal já está "velho"
        let removidos = registry.cleanup(Duration::seconds(0), true);
        assert_eq!(removidos, 1);
        assert!(registry.get(&ok).is_none());
        assert!(registry.get(&ruim).is_some());
        assert!(registry.get(&ativo).is_some());

        let removidos = registry.cleanup(Duration::seconds(0), false);
        assert_eq!(removidos, 1);
        assert!(registry.get(&ruim).is_none());
    }

    #[test]
    fn snapshot_serializa_o_schema_estavel_de_polling() {
        let (registry, id) = registro_com_job(2);
        registry.start(&id);
        registry.record_outcome(&id, "a.xml", &Ok(ImportOutcome::Importada(1)));

        let snap = registry.get(&id).unwrap();
        let json = serde_json::to_value(&snap).unwrap();

        // contrato consumido pelos pollers: nomes e formas estáveis
        assert_eq!(json["job_id"], id);
        assert_eq!(json["status"], "running");
        assert_eq!(json["total"], 2);
        assert_eq!(json["processed"], 1);
        assert_eq!(json["successful"], 1);
        assert_eq!(json["failed"], 0);
        assert_eq!(json["duplicated"], 0);
        assert_eq!(json["progress"], 50.0);
        assert!(json["errors"].as_array().unwrap().is_empty());
        assert!(json["started_at"].is_string());
        assert!(json["completed_at"].is_null());
    }

    #[test]
    fn statistics_agrega_contadores() {
        let (registry, id) = registro_com_job(2);
        registry.start(&id);
        registry.record_outcome(&id, "a.xml", &Ok(ImportOutcome::Importada(1)));
        registry.record_outcome(&id, "b.xml", &Err(ImportError::Parse(ParseError::NoRoot)));

        let stats = registry.statistics();
        assert_eq!(stats.total_jobs, 1);
        assert_eq!(stats.active_jobs, 1);
        assert_eq!(stats.total_files_processed, 2);
        assert_eq!(stats.total_successful, 1);
        assert_eq!(stats.total_failed, 1);
    }
}
