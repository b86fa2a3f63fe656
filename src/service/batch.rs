use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::db::NfeStore;
use crate::error::{BatchError, ImportError, ParseError};
use crate::models::JobSnapshot;
use crate::service::importer::NfeImporter;
use crate::service::jobs::JobRegistry;

/// Orquestrador de lote: enumera os XMLs de um diretório e dirige N
/// importações concorrentes com isolamento de falha por documento.
pub struct BatchProcessor<S: NfeStore + 'static> {
    importer: Arc<NfeImporter<S>>,
    registry: Arc<JobRegistry>,
    max_concurrent: usize,
}

impl<S: NfeStore + 'static> BatchProcessor<S> {
    pub fn new(store: Arc<S>, registry: Arc<JobRegistry>, max_concurrent: usize) -> Self {
        Self {
            importer: Arc::new(NfeImporter::new(store)),
            registry,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Processa todos os `*.xml` / `*.XML` do diretório.
    ///
    /// Validações de lote (diretório inexistente, zero arquivos) abortam
    /// antes de qualquer worker subir. Falhas por documento nunca abortam o
    /// lote; retorna quando todo documento tem desfecho terminal.
    pub async fn process_folder(
        &self,
        folder: &str,
        job_id: Option<String>,
    ) -> Result<JobSnapshot, BatchError> {
        let arquivos = match listar_xmls(Path::new(folder)).await {
            Ok(arquivos) => arquivos,
            Err(e) => {
                // um job pré-criado para esta pasta não pode ficar ativo
                // para sempre se a listagem falhar
                if let Some(id) = &job_id {
                    self.registry.fail(id, &e.to_string());
                }
                return Err(e);
            }
        };
        self.process_files(folder, arquivos, job_id).await
    }

    /// Processa uma lista de arquivos já enumerada. O `total` do job é o
    /// tamanho da lista recebida na submissão; mudanças na pasta depois
    /// disso não afetam o lote.
    pub async fn process_files(
        &self,
        folder: &str,
        arquivos: Vec<PathBuf>,
        job_id: Option<String>,
    ) -> Result<JobSnapshot, BatchError> {
        let snapshot = self
            .registry
            .create_job(job_id, folder, arquivos.len() as u64);
        let job_id = snapshot.job_id;
        info!(
            "iniciando lote {}: {} arquivos em {}",
            job_id,
            arquivos.len(),
            folder
        );

        self.registry.start(&job_id);

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(arquivos.len());

        for caminho in arquivos {
            let semaphore = semaphore.clone();
            let registry = self.registry.clone();
            let importer = self.importer.clone();
            let job_id = job_id.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                // cancelamento interrompe a submissão de novos documentos;
                // quem já tem permit termina o documento atual
                if registry.is_cancelled(&job_id) {
                    return;
                }

                let nome = caminho
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| caminho.display().to_string());

                let resultado = match tokio::fs::read(&caminho).await {
                    Ok(bytes) => importer.importar(&bytes).await,
                    Err(e) => Err(ImportError::Parse(ParseError::Io(e.to_string()))),
                };

                if let Err(e) = &resultado {
                    warn!("arquivo {} falhou: {}", nome, e);
                }
                registry.record_outcome(&job_id, &nome, &resultado);
            }));
        }

        let mut falha_orquestracao = None;
        for resultado in join_all(handles).await {
            if let Err(e) = resultado {
                falha_orquestracao = Some(e.to_string());
            }
        }

        match falha_orquestracao {
            Some(erro) => self.registry.fail(&job_id, &erro),
            None => self.registry.complete(&job_id),
        }

        self.registry
            .get(&job_id)
            .ok_or_else(|| BatchError::JobNotFound(job_id))
    }
}

/// Enumera os arquivos XML do diretório em ordem de nome (também usada pela
/// API para validar o lote antes de aceitar o job)
pub async fn listar_xmls(dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let metadados = tokio::fs::metadata(dir)
        .await
        .map_err(|_| BatchError::FolderNotFound(dir.display().to_string()))?;
    if !metadados.is_dir() {
        return Err(BatchError::FolderNotFound(dir.display().to_string()));
    }

    let mut arquivos = Vec::new();
    let mut entradas = tokio::fs::read_dir(dir).await?;
    while let Some(entrada) = entradas.next_entry().await? {
        let caminho = entrada.path();
        let eh_xml = caminho
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("xml"))
            .unwrap_or(false);
        if eh_xml && entrada.file_type().await?.is_file() {
            arquivos.push(caminho);
        }
    }

    if arquivos.is_empty() {
        return Err(BatchError::NoXmlFiles(dir.display().to_string()));
    }
    arquivos.sort();
    Ok(arquivos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::JobStatus;

    fn processor(max: usize) -> BatchProcessor<MemoryStore> {
        BatchProcessor::new(
            Arc::new(MemoryStore::new()),
            Arc::new(JobRegistry::new()),
            max,
        )
    }

    #[tokio::test]
    async fn diretorio_inexistente_falha_antes_de_criar_job() {
        let err = processor(2)
            .process_folder("/caminho/que/nao/existe", None)
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::FolderNotFound(_)));
    }

    #[tokio::test]
    async fn diretorio_sem_xml_falha_antes_de_criar_job() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("nota.txt"), "nao sou xml").unwrap();

        let err = processor(2)
            .process_folder(dir.path().to_str().unwrap(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::NoXmlFiles(_)));
    }

    #[tokio::test]
    async fn falha_de_listagem_marca_job_pre_criado_como_failed() {
        let registry = Arc::new(JobRegistry::new());
        registry.create_job(Some("j1".into()), "/pasta/sumida", 0);

        let processor = BatchProcessor::new(
            Arc::new(MemoryStore::new()),
            registry.clone(),
            2,
        );
        let err = processor
            .process_folder("/pasta/sumida", Some("j1".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::FolderNotFound(_)));

        // o job pré-criado não fica preso em Pending
        let snap = registry.get("j1").unwrap();
        assert_eq!(snap.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn extensao_maiuscula_tambem_conta() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("NOTA.XML"), "lixo").unwrap();

        let snap = processor(2)
            .process_folder(dir.path().to_str().unwrap(), None)
            .await
            .unwrap();
        assert_eq!(snap.total, 1);
        assert_eq!(snap.processed, 1);
    }
}
