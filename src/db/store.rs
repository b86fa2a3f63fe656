use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{
    ImpostoItem, NovaEmpresa, NovaNotaFiscal, NovoItem, NovoPagamento, NovoTransporte,
};

/// Fronteira de persistência consumida pelo pipeline de importação.
///
/// Contrato append-only: busca por chave e inserções escopadas ao pai.
/// Nenhuma operação de update ou delete faz parte do pipeline.
#[async_trait]
pub trait NfeStore: Send + Sync {
    /// Idempotente: busca por CPF/CNPJ primeiro e só insere no miss.
    /// Seguro para chamadas concorrentes com o mesmo documento - uma
    /// violação de unicidade no insert significa "outra importação acabou
    /// de criar" e é resolvida re-consultando uma vez.
    async fn find_or_create_empresa(
        &self,
        cpf_cnpj: &str,
        empresa: &NovaEmpresa,
    ) -> Result<i64, StoreError>;

    /// Chave de acesso duplicada devolve `StoreError::ChaveDuplicada`,
    /// que o pipeline converte em "já importada", nunca em falha.
    async fn insert_nota(&self, nota: &NovaNotaFiscal) -> Result<i64, StoreError>;

    async fn insert_item(&self, nota_id: i64, item: &NovoItem) -> Result<i64, StoreError>;

    async fn insert_imposto(&self, item_id: i64, imposto: &ImpostoItem) -> Result<(), StoreError>;

    async fn insert_pagamento(
        &self,
        nota_id: i64,
        pagamento: &NovoPagamento,
    ) -> Result<(), StoreError>;

    async fn insert_transporte(
        &self,
        nota_id: i64,
        transporte: &NovoTransporte,
    ) -> Result<(), StoreError>;
}
