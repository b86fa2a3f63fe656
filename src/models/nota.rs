use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::NovaEmpresa;

/// Situação da nota derivada do protocolo de autorização (cStat)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotaStatus {
    Emitida,
    Autorizada,
    Cancelada,
    Denegada,
    Rejeitada,
    Inutilizada,
}

impl NotaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotaStatus::Emitida => "emitida",
            NotaStatus::Autorizada => "autorizada",
            NotaStatus::Cancelada => "cancelada",
            NotaStatus::Denegada => "denegada",
            NotaStatus::Rejeitada => "rejeitada",
            NotaStatus::Inutilizada => "inutilizada",
        }
    }
}

/// Nota fiscal pronta para inserção em `notas_fiscais`.
///
/// `chave_acesso` tem exatamente 44 dígitos e é única; os valores monetários
/// são sempre `BigDecimal` construído da string exata do XML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NovaNotaFiscal {
    pub chave_acesso: String,
    pub numero_nf: i64,
    pub serie: Option<String>,
    pub modelo: Option<String>,
    pub natureza_operacao: Option<String>,
    pub tipo_operacao: Option<String>,
    pub data_hora_emissao: Option<NaiveDateTime>,

    // preenchidos pelo pipeline após resolver as empresas
    pub emitente_id: Option<i64>,
    pub destinatario_id: Option<i64>,

    // totalizadores (ICMSTot)
    pub valor_total_produtos: BigDecimal,
    pub valor_frete: BigDecimal,
    pub valor_seguro: BigDecimal,
    pub valor_desconto: BigDecimal,
    pub valor_total_nota: BigDecimal,
    pub base_calculo_icms: BigDecimal,
    pub valor_icms: BigDecimal,
    pub valor_ipi: BigDecimal,
    pub valor_pis: BigDecimal,
    pub valor_cofins: BigDecimal,

    pub status: NotaStatus,
    pub numero_protocolo: Option<String>,
    pub codigo_status: Option<String>,
    pub motivo_status: Option<String>,
    pub data_hora_recebimento: Option<NaiveDateTime>,

    pub informacoes_complementares: Option<String>,
    pub informacoes_fisco: Option<String>,

    /// XML original completo, guardado para auditoria
    pub xml_completo: String,
}

/// Item (produto/serviço) da nota, ordenado por `numero_item`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NovoItem {
    pub numero_item: i32,
    pub codigo_produto: Option<String>,
    pub codigo_ean: Option<String>,
    pub descricao: Option<String>,
    pub ncm: Option<String>,
    pub cfop: Option<String>,
    pub unidade_comercial: Option<String>,
    pub quantidade_comercial: BigDecimal,
    pub valor_unitario_comercial: BigDecimal,
    pub valor_total_bruto: BigDecimal,
    pub unidade_tributavel: Option<String>,
    pub quantidade_tributavel: BigDecimal,
    pub valor_unitario_tributavel: BigDecimal,
    pub impostos: Vec<ImpostoItem>,
}

/// Categoria de imposto por item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipoImposto {
    Icms,
    Ipi,
    Pis,
    Cofins,
}

impl TipoImposto {
    pub fn as_str(&self) -> &'static str {
        match self {
            TipoImposto::Icms => "icms",
            TipoImposto::Ipi => "ipi",
            TipoImposto::Pis => "pis",
            TipoImposto::Cofins => "cofins",
        }
    }
}

/// Detalhamento de um imposto (no máximo um por par item/tipo).
///
/// `origem` e `csosn` só se aplicam ao ICMS; os demais campos compartilham
/// o formato {situação, base, alíquota, valor}.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpostoItem {
    pub tipo: TipoImposto,
    pub origem: Option<String>,
    pub cst: Option<String>,
    pub csosn: Option<String>,
    pub valor_bc: BigDecimal,
    pub aliquota: BigDecimal,
    pub valor: BigDecimal,
}

/// Detalhe de pagamento (uma nota pode ter vários - pagamento dividido)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NovoPagamento {
    pub indicador_pagamento: Option<String>,
    pub forma_pagamento: Option<String>,
    pub valor_pagamento: BigDecimal,
}

/// Dados de transporte (zero ou um por nota)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NovoTransporte {
    pub modalidade_frete: Option<String>,
    pub transportadora_nome: Option<String>,
    pub transportadora_cnpj: Option<String>,
    pub veiculo_placa: Option<String>,
    pub veiculo_uf: Option<String>,
}

/// Grafo completo de entidades produzido pelo mapeador para uma nota
#[derive(Debug, Clone)]
pub struct NotaMapeada {
    pub emitente: NovaEmpresa,
    pub destinatario: NovaEmpresa,
    pub nota: NovaNotaFiscal,
    pub itens: Vec<NovoItem>,
    pub pagamentos: Vec<NovoPagamento>,
    pub transporte: Option<NovoTransporte>,
}
