use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::NfeStore;
use crate::error::StoreError;
use crate::models::{
    ImpostoItem, NovaEmpresa, NovaNotaFiscal, NovoItem, NovoPagamento, NovoTransporte, TipoImposto,
};

/// Implementação PostgreSQL da fronteira de persistência.
///
/// As restrições de unicidade do banco (`empresas.cpf_cnpj`,
/// `notas_fiscais.chave_acesso`) são a garantia final contra duplicatas;
/// o código trata violação como condição esperada, não como pânico.
pub struct PgStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, timeout_secs: u64) -> Self {
        Self {
            pool,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Toda chamada ao banco carrega um timeout limitado
    async fn com_timeout<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(StoreError::from(e)),
            Err(_) => Err(StoreError::Timeout(self.timeout.as_secs())),
        }
    }

    async fn buscar_empresa(&self, cpf_cnpj: &str) -> Result<Option<i64>, StoreError> {
        self.com_timeout(
            sqlx::query_scalar::<_, i64>(
                r#"
                SELECT id FROM empresas WHERE cpf_cnpj = $1
                "#,
            )
            .bind(cpf_cnpj)
            .fetch_optional(&self.pool),
        )
        .await
    }
}

/// Código SQLSTATE de violação de restrição de unicidade
fn eh_violacao_unicidade(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

#[async_trait]
impl NfeStore for PgStore {
    async fn find_or_create_empresa(
        &self,
        cpf_cnpj: &str,
        empresa: &NovaEmpresa,
    ) -> Result<i64, StoreError> {
        if let Some(id) = self.buscar_empresa(cpf_cnpj).await? {
            return Ok(id);
        }

        let inserido = tokio::time::timeout(
            self.timeout,
            sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO empresas (
                    tipo_pessoa, cpf_cnpj, razao_social, nome_fantasia,
                    inscricao_estadual, regime_tributario,
                    logradouro, numero, complemento, bairro,
                    codigo_municipio, nome_municipio, uf, cep,
                    telefone, email, indicador_ie_destinatario
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
                RETURNING id
                "#,
            )
            .bind(empresa.tipo_pessoa.as_str())
            .bind(&empresa.cpf_cnpj)
            .bind(&empresa.razao_social)
            .bind(&empresa.nome_fantasia)
            .bind(&empresa.inscricao_estadual)
            .bind(&empresa.regime_tributario)
            .bind(&empresa.logradouro)
            .bind(&empresa.numero)
            .bind(&empresa.complemento)
            .bind(&empresa.bairro)
            .bind(&empresa.codigo_municipio)
            .bind(&empresa.nome_municipio)
            .bind(&empresa.uf)
            .bind(&empresa.cep)
            .bind(&empresa.telefone)
            .bind(&empresa.email)
            .bind(&empresa.indicador_ie_destinatario)
            .fetch_one(&self.pool),
        )
        .await
        .map_err(|_| StoreError::Timeout(self.timeout.as_secs()))?;

        match inserido {
            Ok(id) => Ok(id),
            // outra importação criou a mesma empresa entre a busca e o
            // insert: re-consulta uma vez antes de desistir
            Err(e) if eh_violacao_unicidade(&e) => {
                tracing::debug!("empresa {} criada concorrentemente, re-consultando", cpf_cnpj);
                self.buscar_empresa(cpf_cnpj)
                    .await?
                    .ok_or_else(|| StoreError::Backend(e.to_string()))
            }
            Err(e) => Err(StoreError::from(e)),
        }
    }

    async fn insert_nota(&self, nota: &NovaNotaFiscal) -> Result<i64, StoreError> {
        let resultado = tokio::time::timeout(
            self.timeout,
            sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO notas_fiscais (
                    chave_acesso, numero_nf, serie, modelo,
                    natureza_operacao, tipo_operacao, data_hora_emissao,
                    emitente_id, destinatario_id,
                    valor_total_produtos, valor_frete, valor_seguro,
                    valor_desconto, valor_total_nota,
                    base_calculo_icms, valor_icms, valor_ipi, valor_pis, valor_cofins,
                    status, numero_protocolo, codigo_status, motivo_status,
                    data_hora_recebimento,
                    informacoes_complementares, informacoes_fisco, xml_completo
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                        $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27)
                RETURNING id
                "#,
            )
            .bind(&nota.chave_acesso)
            .bind(nota.numero_nf)
            .bind(&nota.serie)
            .bind(&nota.modelo)
            .bind(&nota.natureza_operacao)
            .bind(&nota.tipo_operacao)
            .bind(nota.data_hora_emissao)
            .bind(nota.emitente_id)
            .bind(nota.destinatario_id)
            .bind(&nota.valor_total_produtos)
            .bind(&nota.valor_frete)
            .bind(&nota.valor_seguro)
            .bind(&nota.valor_desconto)
            .bind(&nota.valor_total_nota)
            .bind(&nota.base_calculo_icms)
            .bind(&nota.valor_icms)
            .bind(&nota.valor_ipi)
            .bind(&nota.valor_pis)
            .bind(&nota.valor_cofins)
            .bind(nota.status.as_str())
            .bind(&nota.numero_protocolo)
            .bind(&nota.codigo_status)
            .bind(&nota.motivo_status)
            .bind(nota.data_hora_recebimento)
            .bind(&nota.informacoes_complementares)
            .bind(&nota.informacoes_fisco)
            .bind(&nota.xml_completo)
            .fetch_one(&self.pool),
        )
        .await
        .map_err(|_| StoreError::Timeout(self.timeout.as_secs()))?;

        match resultado {
            Ok(id) => Ok(id),
            Err(e) if eh_violacao_unicidade(&e) => Err(StoreError::ChaveDuplicada),
            Err(e) => Err(StoreError::from(e)),
        }
    }

    async fn insert_item(&self, nota_id: i64, item: &NovoItem) -> Result<i64, StoreError> {
        self.com_timeout(
            sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO nf_itens (
                    nota_fiscal_id, numero_item, codigo_produto, codigo_ean,
                    descricao, ncm, cfop, unidade_comercial,
                    quantidade_comercial, valor_unitario_comercial, valor_total_bruto,
                    unidade_tributavel, quantidade_tributavel, valor_unitario_tributavel
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                RETURNING id
                "#,
            )
            .bind(nota_id)
            .bind(item.numero_item)
            .bind(&item.codigo_produto)
            .bind(&item.codigo_ean)
            .bind(&item.descricao)
            .bind(&item.ncm)
            .bind(&item.cfop)
            .bind(&item.unidade_comercial)
            .bind(&item.quantidade_comercial)
            .bind(&item.valor_unitario_comercial)
            .bind(&item.valor_total_bruto)
            .bind(&item.unidade_tributavel)
            .bind(&item.quantidade_tributavel)
            .bind(&item.valor_unitario_tributavel)
            .fetch_one(&self.pool),
        )
        .await
    }

    async fn insert_imposto(&self, item_id: i64, imposto: &ImpostoItem) -> Result<(), StoreError> {
        // uma tabela por categoria de imposto, como no schema analítico
        let resultado = match imposto.tipo {
            TipoImposto::Icms => {
                sqlx::query(
                    r#"
                    INSERT INTO nf_itens_icms (nf_item_id, origem, cst, csosn, valor_bc, aliquota, valor_icms)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(item_id)
                .bind(&imposto.origem)
                .bind(&imposto.cst)
                .bind(&imposto.csosn)
                .bind(&imposto.valor_bc)
                .bind(&imposto.aliquota)
                .bind(&imposto.valor)
                .execute(&self.pool)
            }
            TipoImposto::Ipi => {
                sqlx::query(
                    r#"
                    INSERT INTO nf_itens_ipi (nf_item_id, cst, valor_bc, aliquota, valor_ipi)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(item_id)
                .bind(&imposto.cst)
                .bind(&imposto.valor_bc)
                .bind(&imposto.aliquota)
                .bind(&imposto.valor)
                .execute(&self.pool)
            }
            TipoImposto::Pis => {
                sqlx::query(
                    r#"
                    INSERT INTO nf_itens_pis (nf_item_id, cst, valor_bc, aliquota, valor_pis)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(item_id)
                .bind(&imposto.cst)
                .bind(&imposto.valor_bc)
                .bind(&imposto.aliquota)
                .bind(&imposto.valor)
                .execute(&self.pool)
            }
            TipoImposto::Cofins => {
                sqlx::query(
                    r#"
                    INSERT INTO nf_itens_cofins (nf_item_id, cst, valor_bc, aliquota, valor_cofins)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(item_id)
                .bind(&imposto.cst)
                .bind(&imposto.valor_bc)
                .bind(&imposto.aliquota)
                .bind(&imposto.valor)
                .execute(&self.pool)
            }
        };

        self.com_timeout(resultado).await?;
        Ok(())
    }

    async fn insert_pagamento(
        &self,
        nota_id: i64,
        pagamento: &NovoPagamento,
    ) -> Result<(), StoreError> {
        self.com_timeout(
            sqlx::query(
                r#"
                INSERT INTO nf_pagamentos (nota_fiscal_id, indicador_pagamento, forma_pagamento, valor_pagamento)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(nota_id)
            .bind(&pagamento.indicador_pagamento)
            .bind(&pagamento.forma_pagamento)
            .bind(&pagamento.valor_pagamento)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn insert_transporte(
        &self,
        nota_id: i64,
        transporte: &NovoTransporte,
    ) -> Result<(), StoreError> {
        self.com_timeout(
            sqlx::query(
                r#"
                INSERT INTO nf_transporte (
                    nota_fiscal_id, modalidade_frete,
                    transportadora_nome, transportadora_cnpj,
                    veiculo_placa, veiculo_uf
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(nota_id)
            .bind(&transporte.modalidade_frete)
            .bind(&transporte.transportadora_nome)
            .bind(&transporte.transportadora_cnpj)
            .bind(&transporte.veiculo_placa)
            .bind(&transporte.veiculo_uf)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}
