use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::db::NfeStore;
use crate::error::BatchError;
use crate::models::{JobSnapshot, JobStatus};
use crate::service::batch::{listar_xmls, BatchProcessor};
use crate::service::jobs::JobRegistry;

/// Estado compartilhado da API
pub struct ApiState<S: NfeStore + 'static> {
    pub store: Arc<S>,
    pub registry: Arc<JobRegistry>,
    pub max_concurrent: usize,
}

impl<S: NfeStore> Clone for ApiState<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            registry: self.registry.clone(),
            max_concurrent: self.max_concurrent,
        }
    }
}

/// Corpo da submissão de lote
#[derive(Debug, Deserialize)]
pub struct BatchUploadRequest {
    pub folder_path: String,
    pub max_concurrent: Option<usize>,
}

/// Resposta inicial da submissão (o processamento segue em background)
#[derive(Debug, Serialize)]
pub struct BatchUploadResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct ErroResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

fn erro(status: StatusCode, mensagem: impl Into<String>) -> Response {
    (
        status,
        Json(ErroResponse {
            error: mensagem.into(),
        }),
    )
        .into_response()
}

/// Verificação de saúde
pub async fn health_check() -> &'static str {
    "OK"
}

/// Submete um lote de XMLs; valida o diretório de forma síncrona e devolve
/// 202 com o job_id para polling
pub async fn batch_upload<S: NfeStore>(
    State(state): State<ApiState<S>>,
    Json(req): Json<BatchUploadRequest>,
) -> Response {
    // validação rápida antes de aceitar o job; a lista enumerada aqui é a
    // que será processada (o total não muda se a pasta mudar depois)
    let arquivos = match listar_xmls(std::path::Path::new(&req.folder_path)).await {
        Ok(arquivos) => arquivos,
        Err(e @ (BatchError::FolderNotFound(_) | BatchError::NoXmlFiles(_))) => {
            return erro(StatusCode::BAD_REQUEST, e.to_string());
        }
        Err(e) => return erro(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    let total = arquivos.len() as u64;

    let job_id = format!(
        "batch-{}-{}",
        Local::now().format("%Y%m%d-%H%M%S"),
        &Uuid::new_v4().to_string()[..8]
    );

    // pré-cria o job para que o polling funcione já a partir do 202
    state
        .registry
        .create_job(Some(job_id.clone()), &req.folder_path, total);

    let processor = BatchProcessor::new(
        state.store.clone(),
        state.registry.clone(),
        req.max_concurrent.unwrap_or(state.max_concurrent),
    );
    let folder = req.folder_path.clone();
    let job_para_task = job_id.clone();
    tokio::spawn(async move {
        if let Err(e) = processor
            .process_files(&folder, arquivos, Some(job_para_task))
            .await
        {
            error!("processamento de lote falhou: {}", e);
        }
    });

    info!("lote {} aceito: {} arquivos em {}", job_id, total, req.folder_path);

    (
        StatusCode::ACCEPTED,
        Json(BatchUploadResponse {
            job_id,
            status: JobStatus::Pending,
            total,
        }),
    )
        .into_response()
}

/// Status de um job pelo id
pub async fn job_status<S: NfeStore>(
    State(state): State<ApiState<S>>,
    Path(job_id): Path<String>,
) -> Response {
    match state.registry.get(&job_id) {
        Some(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        None => erro(StatusCode::NOT_FOUND, format!("job não encontrado: {job_id}")),
    }
}

/// Lista jobs, com filtro por status e limite opcionais
pub async fn list_jobs<S: NfeStore>(
    State(state): State<ApiState<S>>,
    Query(query): Query<ListJobsQuery>,
) -> Response {
    let filtro = match query.status.as_deref().map(|s| s.parse::<JobStatus>()) {
        Some(Ok(status)) => Some(status),
        Some(Err(e)) => return erro(StatusCode::BAD_REQUEST, e),
        None => None,
    };
    let jobs: Vec<JobSnapshot> = state.registry.list(filtro, query.limit);
    (StatusCode::OK, Json(jobs)).into_response()
}

/// Cancela um job ativo; workers em voo terminam o documento atual
pub async fn cancel_job<S: NfeStore>(
    State(state): State<ApiState<S>>,
    Path(job_id): Path<String>,
) -> Response {
    match state.registry.cancel(&job_id) {
        Some(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        None => erro(StatusCode::NOT_FOUND, format!("job não encontrado: {job_id}")),
    }
}

/// Remove um job terminal; jobs ativos devem ser cancelados antes
pub async fn delete_job<S: NfeStore>(
    State(state): State<ApiState<S>>,
    Path(job_id): Path<String>,
) -> Response {
    match state.registry.get(&job_id) {
        None => erro(StatusCode::NOT_FOUND, format!("job não encontrado: {job_id}")),
        Some(snapshot) if !snapshot.status.is_terminal() => erro(
            StatusCode::CONFLICT,
            "job ativo: cancele antes de remover",
        ),
        Some(_) => {
            state.registry.delete(&job_id);
            StatusCode::NO_CONTENT.into_response()
        }
    }
}
