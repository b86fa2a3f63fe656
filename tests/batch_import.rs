//! Cenários de ponta a ponta do importador em lote, rodando sobre o store
//! em memória (mesmas regras de unicidade do Postgres).

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use nfe_import_rust::error::StoreError;
use nfe_import_rust::models::{
    ImpostoItem, JobStatus, NovaEmpresa, NovaNotaFiscal, NovoItem, NovoPagamento, NovoTransporte,
};
use nfe_import_rust::nfe::fixtures::{
    nfe_completa, nfe_sem_documento_destinatario, CHAVE_TESTE, CHAVE_TESTE_2,
};
use nfe_import_rust::service::batch::listar_xmls;
use nfe_import_rust::{BatchProcessor, JobRegistry, MemoryStore, NfeStore};
use tempfile::TempDir;
use tokio::sync::Notify;

fn escrever(dir: &Path, nome: &str, conteudo: &str) {
    std::fs::write(dir.join(nome), conteudo).unwrap();
}

/// Chave de acesso válida e distinta por índice (mantém 44 dígitos)
fn chave(i: usize) -> String {
    format!("{}{:02}", &CHAVE_TESTE[..42], i)
}

fn processor(store: &Arc<MemoryStore>, max: usize) -> BatchProcessor<MemoryStore> {
    BatchProcessor::new(store.clone(), Arc::new(JobRegistry::new()), max)
}

#[tokio::test]
async fn cenario_misto_tres_documentos() {
    let dir = TempDir::new().unwrap();
    escrever(dir.path(), "boa.xml", &nfe_completa(CHAVE_TESTE));
    escrever(dir.path(), "sem_parte.xml", &nfe_sem_documento_destinatario());
    escrever(dir.path(), "lixo.xml", "isto nao e um xml <<<");

    let store = Arc::new(MemoryStore::new());
    let snap = processor(&store, 5)
        .process_folder(dir.path().to_str().unwrap(), None)
        .await
        .unwrap();

    assert_eq!(snap.status, JobStatus::Completed);
    assert_eq!(snap.total, 3);
    assert_eq!(snap.processed, 3);
    assert_eq!(snap.successful, 1);
    assert_eq!(snap.failed, 2);
    assert_eq!(snap.duplicated, 0);

    let kinds: Vec<(&str, &str)> = snap
        .errors
        .iter()
        .map(|e| (e.file.as_str(), e.error_kind.as_str()))
        .collect();
    assert!(kinds.contains(&("lixo.xml", "ParseError")));
    assert!(kinds.contains(&("sem_parte.xml", "MappingError")));

    assert_eq!(store.total_notas(), 1);
    let nota = store.nota_por_chave(CHAVE_TESTE).unwrap();
    assert_eq!(nota.chave_acesso, CHAVE_TESTE);
}

#[tokio::test]
async fn reimportacao_conta_como_duplicada_sem_nova_linha() {
    let dir = TempDir::new().unwrap();
    escrever(dir.path(), "boa.xml", &nfe_completa(CHAVE_TESTE));

    let store = Arc::new(MemoryStore::new());
    let primeiro = processor(&store, 5)
        .process_folder(dir.path().to_str().unwrap(), None)
        .await
        .unwrap();
    assert_eq!(primeiro.successful, 1);

    // novo lote com o mesmo documento
    let segundo = processor(&store, 5)
        .process_folder(dir.path().to_str().unwrap(), None)
        .await
        .unwrap();

    assert_eq!(segundo.status, JobStatus::Completed);
    assert_eq!(segundo.successful, 0);
    assert_eq!(segundo.failed, 0);
    assert_eq!(segundo.duplicated, 1);
    assert_eq!(store.total_notas(), 1);
}

#[tokio::test]
async fn falhas_parciais_nao_abortam_o_lote() {
    let dir = TempDir::new().unwrap();
    for i in 0..7 {
        escrever(dir.path(), &format!("nota_{i}.xml"), &nfe_completa(&chave(i)));
    }
    for i in 0..3 {
        escrever(dir.path(), &format!("ruim_{i}.xml"), "<<< lixo >>>");
    }

    let store = Arc::new(MemoryStore::new());
    let snap = processor(&store, 4)
        .process_folder(dir.path().to_str().unwrap(), None)
        .await
        .unwrap();

    assert_eq!(snap.status, JobStatus::Completed);
    assert_eq!(snap.total, 10);
    assert_eq!(snap.processed, 10);
    assert_eq!(snap.successful, 7);
    assert_eq!(snap.failed, 3);
    assert_eq!(store.total_notas(), 7);
}

#[tokio::test]
async fn contadores_invariantes_ao_nivel_de_concorrencia() {
    let dir = TempDir::new().unwrap();
    for i in 0..6 {
        escrever(dir.path(), &format!("nota_{i}.xml"), &nfe_completa(&chave(i)));
    }
    escrever(dir.path(), "ruim_a.xml", "lixo");
    escrever(dir.path(), "ruim_b.xml", "mais lixo");

    let mut resultados = Vec::new();
    for max in [1, 10] {
        let store = Arc::new(MemoryStore::new());
        let snap = processor(&store, max)
            .process_folder(dir.path().to_str().unwrap(), None)
            .await
            .unwrap();
        resultados.push((snap.successful, snap.failed, snap.processed, store.total_notas()));
    }

    assert_eq!(resultados[0], (6, 2, 8, 6));
    assert_eq!(resultados[0], resultados[1]);
}

#[tokio::test]
async fn mesmo_emitente_em_varios_documentos_vira_uma_empresa() {
    let dir = TempDir::new().unwrap();
    // duas notas de chaves diferentes, mesmo emitente e mesmo destinatário
    escrever(dir.path(), "a.xml", &nfe_completa(CHAVE_TESTE));
    escrever(dir.path(), "b.xml", &nfe_completa(CHAVE_TESTE_2));

    let store = Arc::new(MemoryStore::new());
    let snap = processor(&store, 10)
        .process_folder(dir.path().to_str().unwrap(), None)
        .await
        .unwrap();

    assert_eq!(snap.successful, 2);
    assert_eq!(store.total_notas(), 2);
    // emitente + destinatário, cada um uma única vez
    assert_eq!(store.total_empresas(), 2);
}

/// Store que segura a primeira inserção de nota até o teste liberar,
/// deixando um documento em voo enquanto o resto da fila espera o permit.
struct StoreComTrava {
    inner: MemoryStore,
    primeira_em_voo: Notify,
    liberar: Notify,
    ja_segurou: AtomicBool,
}

impl StoreComTrava {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            primeira_em_voo: Notify::new(),
            liberar: Notify::new(),
            ja_segurou: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl NfeStore for StoreComTrava {
    async fn find_or_create_empresa(
        &self,
        cpf_cnpj: &str,
        empresa: &NovaEmpresa,
    ) -> Result<i64, StoreError> {
        self.inner.find_or_create_empresa(cpf_cnpj, empresa).await
    }

    async fn insert_nota(&self, nota: &NovaNotaFiscal) -> Result<i64, StoreError> {
        if !self.ja_segurou.swap(true, Ordering::SeqCst) {
            self.primeira_em_voo.notify_one();
            self.liberar.notified().await;
        }
        self.inner.insert_nota(nota).await
    }

    async fn insert_item(&self, nota_id: i64, item: &NovoItem) -> Result<i64, StoreError> {
        self.inner.insert_item(nota_id, item).await
    }

    async fn insert_imposto(&self, item_id: i64, imposto: &ImpostoItem) -> Result<(), StoreError> {
        self.inner.insert_imposto(item_id, imposto).await
    }

    async fn insert_pagamento(
        &self,
        nota_id: i64,
        pagamento: &NovoPagamento,
    ) -> Result<(), StoreError> {
        self.inner.insert_pagamento(nota_id, pagamento).await
    }

    async fn insert_transporte(
        &self,
        nota_id: i64,
        transporte: &NovoTransporte,
    ) -> Result<(), StoreError> {
        self.inner.insert_transporte(nota_id, transporte).await
    }
}

#[tokio::test]
async fn cancelamento_pula_a_fila_e_conta_o_documento_em_voo() {
    let dir = TempDir::new().unwrap();
    for i in 0..4 {
        escrever(dir.path(), &format!("nota_{i}.xml"), &nfe_completa(&chave(i)));
    }

    let store = Arc::new(StoreComTrava::new());
    let registry = Arc::new(JobRegistry::new());
    let processor = BatchProcessor::new(store.clone(), registry.clone(), 1);

    let pasta = dir.path().to_str().unwrap().to_string();
    let handle = tokio::spawn(async move {
        processor
            .process_folder(&pasta, Some("lote-cancelado".into()))
            .await
    });

    // espera o primeiro documento chegar ao banco, cancela e libera
    store.primeira_em_voo.notified().await;
    registry.cancel("lote-cancelado");
    store.liberar.notify_one();

    let snap = handle.await.unwrap().unwrap();
    assert_eq!(snap.status, JobStatus::Cancelled);
    // o documento em voo terminou e foi contado
    assert_eq!(snap.processed, 1);
    assert_eq!(snap.successful, 1);
    assert!(snap.processed < snap.total);
    // ninguém da fila tocou o banco depois do cancelamento
    assert_eq!(store.inner.total_notas(), 1);
}

#[tokio::test]
async fn total_e_fixado_na_enumeracao_da_submissao() {
    let dir = TempDir::new().unwrap();
    escrever(dir.path(), "a.xml", &nfe_completa(CHAVE_TESTE));
    escrever(dir.path(), "b.xml", &nfe_completa(CHAVE_TESTE_2));

    let arquivos = listar_xmls(dir.path()).await.unwrap();
    // arquivo que aparece depois da submissão não entra neste lote
    escrever(dir.path(), "c.xml", &nfe_completa(&chave(7)));

    let store = Arc::new(MemoryStore::new());
    let snap = BatchProcessor::new(store.clone(), Arc::new(JobRegistry::new()), 2)
        .process_files(dir.path().to_str().unwrap(), arquivos, None)
        .await
        .unwrap();

    assert_eq!(snap.total, 2);
    assert_eq!(snap.processed, 2);
    assert_eq!(snap.progress, 100.0);
    assert_eq!(store.total_notas(), 2);
}

#[tokio::test]
async fn status_do_job_acompanha_pelo_registry() {
    let dir = TempDir::new().unwrap();
    escrever(dir.path(), "boa.xml", &nfe_completa(CHAVE_TESTE));

    let store = Arc::new(MemoryStore::new());
    let registry = Arc::new(JobRegistry::new());
    let processor = BatchProcessor::new(store, registry.clone(), 2);

    let snap = processor
        .process_folder(dir.path().to_str().unwrap(), Some("lote-teste".into()))
        .await
        .unwrap();

    assert_eq!(snap.job_id, "lote-teste");
    let consultado = registry.get("lote-teste").unwrap();
    assert_eq!(consultado.status, JobStatus::Completed);
    assert_eq!(consultado.progress, 100.0);
    assert!(consultado.started_at.is_some());
    assert!(consultado.completed_at.is_some());
}
