use std::sync::Arc;

use tracing::{debug, info};

use crate::db::NfeStore;
use crate::error::{ImportError, StoreError};
use crate::nfe::{map_nota, NfeDocument};

/// Desfecho terminal da importação de um documento
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Nota criada; carrega o id gerado
    Importada(i64),
    /// Chave de acesso já existia no banco - contado à parte, não é falha
    JaImportada,
}

/// Pipeline de importação de um documento: parse -> mapeamento ->
/// persistência das partes -> nota -> filhos.
///
/// Sem estado mutável compartilhado; qualquer número de instâncias pode
/// rodar em paralelo. Em caso de falha no meio os filhos restantes são
/// abortados e as linhas já inseridas ficam (limitação documentada, sem
/// rollback neste escopo).
pub struct NfeImporter<S: NfeStore> {
    store: Arc<S>,
}

impl<S: NfeStore> NfeImporter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn importar(&self, xml: &[u8]) -> Result<ImportOutcome, ImportError> {
        let doc = NfeDocument::parse(xml)?;
        let mut mapeada = map_nota(&doc)?;

        debug!("processando NF-e {}", mapeada.nota.chave_acesso);

        // partes antes da nota, nota antes dos filhos
        let emitente_id = self
            .store
            .find_or_create_empresa(&mapeada.emitente.cpf_cnpj, &mapeada.emitente)
            .await?;
        let destinatario_id = self
            .store
            .find_or_create_empresa(&mapeada.destinatario.cpf_cnpj, &mapeada.destinatario)
            .await?;

        mapeada.nota.emitente_id = Some(emitente_id);
        mapeada.nota.destinatario_id = Some(destinatario_id);

        let nota_id = match self.store.insert_nota(&mapeada.nota).await {
            Ok(id) => id,
            Err(StoreError::ChaveDuplicada) => {
                info!(
                    "NF-e {} já existia no banco, pulando",
                    mapeada.nota.chave_acesso
                );
                return Ok(ImportOutcome::JaImportada);
            }
            Err(e) => return Err(e.into()),
        };

        for item in &mapeada.itens {
            let item_id = self.store.insert_item(nota_id, item).await?;
            for imposto in &item.impostos {
                self.store.insert_imposto(item_id, imposto).await?;
            }
        }

        for pagamento in &mapeada.pagamentos {
            self.store.insert_pagamento(nota_id, pagamento).await?;
        }

        if let Some(transporte) = &mapeada.transporte {
            self.store.insert_transporte(nota_id, transporte).await?;
        }

        info!(
            "NF-e {} importada com sucesso (id {})",
            mapeada.nota.chave_acesso, nota_id
        );
        Ok(ImportOutcome::Importada(nota_id))
    }
}
