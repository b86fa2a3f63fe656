use serde::{Deserialize, Serialize};

/// Tipo de pessoa (derivado da presença de CNPJ ou CPF na nota)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipoPessoa {
    Juridica,
    Fisica,
}

impl TipoPessoa {
    pub fn as_str(&self) -> &'static str {
        match self {
            TipoPessoa::Juridica => "juridica",
            TipoPessoa::Fisica => "fisica",
        }
    }
}

/// Empresa (emitente ou destinatário) pronta para inserção em `empresas`.
///
/// Unicidade por `cpf_cnpj`; o registro nunca é atualizado nem removido
/// pelo pipeline de importação.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NovaEmpresa {
    pub tipo_pessoa: TipoPessoa,
    pub cpf_cnpj: String,
    pub razao_social: Option<String>,
    pub nome_fantasia: Option<String>,
    pub inscricao_estadual: Option<String>,
    pub regime_tributario: Option<String>,
    pub logradouro: Option<String>,
    pub numero: Option<String>,
    pub complemento: Option<String>,
    pub bairro: Option<String>,
    pub codigo_municipio: Option<String>,
    pub nome_municipio: Option<String>,
    pub uf: Option<String>,
    pub cep: Option<String>,
    pub telefone: Option<String>,
    pub email: Option<String>,
    pub indicador_ie_destinatario: Option<String>,
}
