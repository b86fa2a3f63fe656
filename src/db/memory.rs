use std::sync::Mutex;

use async_trait::async_trait;

use crate::db::NfeStore;
use crate::error::StoreError;
use crate::models::{
    ImpostoItem, NovaEmpresa, NovaNotaFiscal, NovoItem, NovoPagamento, NovoTransporte,
};

#[derive(Default)]
struct Dados {
    seq: i64,
    empresas: Vec<(i64, NovaEmpresa)>,
    notas: Vec<(i64, NovaNotaFiscal)>,
    itens: Vec<(i64, i64, NovoItem)>,
    impostos: Vec<(i64, ImpostoItem)>,
    pagamentos: Vec<(i64, NovoPagamento)>,
    transportes: Vec<(i64, NovoTransporte)>,
}

impl Dados {
    fn proximo_id(&mut self) -> i64 {
        self.seq += 1;
        self.seq
    }
}

/// Store em memória com as mesmas regras de unicidade do Postgres
/// (`cpf_cnpj` e `chave_acesso`). Usado nos testes e em execuções a seco.
#[derive(Default)]
pub struct MemoryStore {
    dados: Mutex<Dados>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_empresas(&self) -> usize {
        self.dados.lock().unwrap().empresas.len()
    }

    pub fn total_notas(&self) -> usize {
        self.dados.lock().unwrap().notas.len()
    }

    pub fn nota_por_chave(&self, chave: &str) -> Option<NovaNotaFiscal> {
        self.dados
            .lock()
            .unwrap()
            .notas
            .iter()
            .find(|(_, n)| n.chave_acesso == chave)
            .map(|(_, n)| n.clone())
    }

    pub fn itens_da_nota(&self, nota_id: i64) -> Vec<NovoItem> {
        self.dados
            .lock()
            .unwrap()
            .itens
            .iter()
            .filter(|(_, nid, _)| *nid == nota_id)
            .map(|(_, _, item)| item.clone())
            .collect()
    }

    pub fn total_pagamentos(&self) -> usize {
        self.dados.lock().unwrap().pagamentos.len()
    }

    pub fn total_impostos(&self) -> usize {
        self.dados.lock().unwrap().impostos.len()
    }
}

#[async_trait]
impl NfeStore for MemoryStore {
    async fn find_or_create_empresa(
        &self,
        cpf_cnpj: &str,
        empresa: &NovaEmpresa,
    ) -> Result<i64, StoreError> {
        let mut dados = self.dados.lock().unwrap();
        if let Some((id, _)) = dados.empresas.iter().find(|(_, e)| e.cpf_cnpj == cpf_cnpj) {
            return Ok(*id);
        }
        let id = dados.proximo_id();
        dados.empresas.push((id, empresa.clone()));
        Ok(id)
    }

    async fn insert_nota(&self, nota: &NovaNotaFiscal) -> Result<i64, StoreError> {
        let mut dados = self.dados.lock().unwrap();
        if dados
            .notas
            .iter()
            .any(|(_, n)| n.chave_acesso == nota.chave_acesso)
        {
            return Err(StoreError::ChaveDuplicada);
        }
        let id = dados.proximo_id();
        dados.notas.push((id, nota.clone()));
        Ok(id)
    }

    async fn insert_item(&self, nota_id: i64, item: &NovoItem) -> Result<i64, StoreError> {
        let mut dados = self.dados.lock().unwrap();
        let id = dados.proximo_id();
        dados.itens.push((id, nota_id, item.clone()));
        Ok(id)
    }

    async fn insert_imposto(&self, item_id: i64, imposto: &ImpostoItem) -> Result<(), StoreError> {
        self.dados
            .lock()
            .unwrap()
            .impostos
            .push((item_id, imposto.clone()));
        Ok(())
    }

    async fn insert_pagamento(
        &self,
        nota_id: i64,
        pagamento: &NovoPagamento,
    ) -> Result<(), StoreError> {
        self.dados
            .lock()
            .unwrap()
            .pagamentos
            .push((nota_id, pagamento.clone()));
        Ok(())
    }

    async fn insert_transporte(
        &self,
        nota_id: i64,
        transporte: &NovoTransporte,
    ) -> Result<(), StoreError> {
        self.dados
            .lock()
            .unwrap()
            .transportes
            .push((nota_id, transporte.clone()));
        Ok(())
    }
}
