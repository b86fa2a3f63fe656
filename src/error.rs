use thiserror::Error;

/// Erros estruturais do XML (documento malformado ou incompleto)
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("XML malformado: {0}")]
    Xml(String),

    #[error("nó NFe/infNFe não encontrado no documento")]
    NoRoot,

    #[error("bloco obrigatório ausente: {0}")]
    MissingBlock(&'static str),

    #[error("falha ao ler arquivo: {0}")]
    Io(String),
}

/// Parte da nota (para erros de mapeamento)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parte {
    Emitente,
    Destinatario,
}

impl std::fmt::Display for Parte {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Parte::Emitente => write!(f, "emitente"),
            Parte::Destinatario => write!(f, "destinatario"),
        }
    }
}

/// XML estruturalmente válido porém semanticamente inválido
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("{0} sem CNPJ nem CPF")]
    ParteSemDocumento(Parte),

    #[error("chave de acesso inválida (esperado 44 dígitos): {0}")]
    ChaveAcessoInvalida(String),

    #[error("valor decimal inválido em {campo}: {valor}")]
    ValorInvalido { campo: &'static str, valor: String },
}

/// Erros da fronteira de persistência
#[derive(Debug, Error)]
pub enum StoreError {
    /// Chave de acesso já existe - tratado como "já importada", não como falha
    #[error("chave de acesso duplicada")]
    ChaveDuplicada,

    #[error("timeout na operação de banco (> {0}s)")]
    Timeout(u64),

    #[error("erro de banco: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Falha de importação de um único documento
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("erro de parse: {0}")]
    Parse(#[from] ParseError),

    #[error("erro de mapeamento: {0}")]
    Mapping(#[from] MappingError),

    #[error("erro de persistência: {0}")]
    Persistence(#[from] StoreError),
}

impl ImportError {
    /// Categoria estável exposta no relatório do lote
    pub fn kind(&self) -> &'static str {
        match self {
            ImportError::Parse(_) => "ParseError",
            ImportError::Mapping(_) => "MappingError",
            ImportError::Persistence(_) => "PersistenceError",
        }
    }
}

/// Erros de nível de lote - abortam antes de iniciar qualquer worker
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("diretório não encontrado: {0}")]
    FolderNotFound(String),

    #[error("nenhum arquivo XML encontrado em: {0}")]
    NoXmlFiles(String),

    #[error("job não encontrado: {0}")]
    JobNotFound(String),

    #[error("erro de IO ao listar diretório: {0}")]
    Io(#[from] std::io::Error),
}
