pub mod empresa;
pub mod job;
pub mod nota;

pub use empresa::{NovaEmpresa, TipoPessoa};
pub use job::{BatchJob, JobErro, JobSnapshot, JobStatus, MAX_ERROS_SNAPSHOT};
pub use nota::{
    ImpostoItem, NotaMapeada, NotaStatus, NovaNotaFiscal, NovoItem, NovoPagamento, NovoTransporte,
    TipoImposto,
};
