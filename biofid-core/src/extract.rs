//! # Extração de Texto
//!
//! Ponto de extensão para fontes que não são XMI. Hoje existe apenas o extrator de PDF,
//! disponível com a feature `pdf` (`pdf-extract`). O PDF precisa já conter texto: não há OCR.

use std::path::Path;

/// Erros de extração de texto.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("falha na extração do texto: {0}")]
    ExtractionFailed(String),
    #[error("erro de I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDFs protegidos por senha não são suportados")]
    PasswordUnsupported,
    #[error("feature `pdf` desabilitada. Compile com --features pdf")]
    FeatureNotEnabled,
}

/// Extrai o texto visível de um documento.
pub trait TextExtractor {
    /// `password` vazio significa documento sem senha.
    fn extract(&self, path: &Path, password: &str) -> Result<String, ExtractError>;
}

/// Extrator de PDFs baseado em `pdf-extract`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl TextExtractor for PdfTextExtractor {
    #[cfg(feature = "pdf")]
    fn extract(&self, path: &Path, password: &str) -> Result<String, ExtractError> {
        if !password.is_empty() {
            return Err(ExtractError::PasswordUnsupported);
        }
        if !path.is_file() {
            return Err(ExtractError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                path.display().to_string(),
            )));
        }
        tracing::debug!("Extraindo texto de {}", path.display());
        pdf_extract::extract_text(path).map_err(|e| ExtractError::ExtractionFailed(e.to_string()))
    }

    #[cfg(not(feature = "pdf"))]
    fn extract(&self, _path: &Path, _password: &str) -> Result<String, ExtractError> {
        Err(ExtractError::FeatureNotEnabled)
    }
}
