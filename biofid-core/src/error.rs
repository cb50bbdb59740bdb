//! # Erros da Conversão
//!
//! Taxonomia de falhas de um documento. Falhas de leitura (formato, arquivo ausente,
//! XML malformado) viram `ConversionError`; documentos bem-formados mas vazios **não**
//! são erros e retornam `Ok(None)` nas funções de [`crate::convert`].

use std::path::PathBuf;

/// Erros que podem abortar a conversão de um documento.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// Extensão não reconhecida (checada antes de qualquer I/O).
    #[error("formato de arquivo não suportado: {path}")]
    UnsupportedFormat { path: PathBuf },

    /// O arquivo alvo não existe.
    #[error("arquivo não encontrado: {path}")]
    NotFound { path: PathBuf },

    #[error("erro de I/O: {0}")]
    Io(#[from] std::io::Error),

    /// XML malformado encontrado no meio do stream. A passada atual é abortada.
    #[error("falha ao ler o XML na posição {position}: {message}")]
    Parse { message: String, position: usize },

    #[error("typesystem inválido: {0}")]
    TypeSystem(String),

    #[error("configuração inválida: {0}")]
    Config(String),

    /// Diretório de entrada sem nenhum arquivo suportado.
    #[error("o diretório {path} está vazio")]
    EmptyDirectory { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, ConversionError>;

impl ConversionError {
    pub(crate) fn parse(err: impl std::fmt::Display, position: usize) -> Self {
        ConversionError::Parse {
            message: err.to_string(),
            position,
        }
    }
}
