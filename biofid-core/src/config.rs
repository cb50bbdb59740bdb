//! # Configuração da Conversão
//!
//! Quais elementos do XMI interessam ao conversor, onde está o typesystem e quais
//! extensões de arquivo são aceitas. O `Default` reproduz as configurações do BIOfid;
//! um JSON parcial pode sobrescrever qualquer campo:
//!
//! ```json
//! { "typesystem_path": "resources/typesystem.xml", "supported_extensions": ["xmi"] }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::annotation::{
    ANNOTATION_NS, CAS_NS, CONCEPT_NS, HEIDELTIME_NS, OCR_NS, SEGMENTATION_NS, TYPE_NS, WIKIPEDIA_NS,
};
use crate::error::{ConversionError, Result};
use crate::typesystem::TypeSystem;

/// Nome qualificado de um elemento: namespace + nome local.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagName {
    pub namespace: String,
    pub local: String,
}

impl TagName {
    pub fn new(namespace: &str, local: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            local: local.to_string(),
        }
    }

    pub fn matches(&self, namespace: &str, local: &str) -> bool {
        self.namespace == namespace && self.local == local
    }
}

/// Seleção de elementos para as duas passadas do scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Elementos específicos (sentenças, páginas, sofa, Wikipedia, GeoNames...).
    pub relevant_tags: Vec<TagName>,
    /// Namespaces cujos elementos são todos relevantes (tipos de entidades nomeadas).
    pub relevant_namespaces: Vec<String>,
    /// Elemento dos comentários de anotação (segunda passada).
    pub comment_tag: TagName,
    /// Valor de `key` que autoriza o comentário a sobrescrever o `value`.
    pub comment_key: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            relevant_tags: vec![
                TagName::new(SEGMENTATION_NS, "Sentence"),
                TagName::new(OCR_NS, "OCRPage"),
                TagName::new(CAS_NS, "Sofa"),
                TagName::new(HEIDELTIME_NS, "Timex3"),
                TagName::new(WIKIPEDIA_NS, "WikipediaLink"),
                TagName::new(ANNOTATION_NS, "GeoNamesEntity"),
            ],
            relevant_namespaces: vec![TYPE_NS.to_string(), CONCEPT_NS.to_string()],
            comment_tag: TagName::new(ANNOTATION_NS, "AnnotationComment"),
            comment_key: "PATO_uri".to_string(),
        }
    }
}

impl ScannerConfig {
    pub fn is_relevant(&self, namespace: &str, local: &str) -> bool {
        self.relevant_tags.iter().any(|t| t.matches(namespace, local))
            || self.relevant_namespaces.iter().any(|ns| ns == namespace)
    }
}

/// Configuração completa de uma conversão.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub scanner: ScannerConfig,
    /// Typesystem UIMA; `None` usa o typesystem embutido.
    pub typesystem_path: Option<PathBuf>,
    pub supported_extensions: Vec<String>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            scanner: ScannerConfig::default(),
            typesystem_path: None,
            supported_extensions: vec!["xmi".into(), "xml".into(), "xmi.gz".into()],
        }
    }
}

impl ConversionConfig {
    /// Lê a configuração de um arquivo JSON (campos ausentes usam o padrão).
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| ConversionError::Config(e.to_string()))
    }

    /// A extensão é checada antes de qualquer I/O.
    pub fn is_supported(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.supported_extensions
            .iter()
            .any(|ext| name.len() > ext.len() + 1 && name.ends_with(&format!(".{}", ext)))
    }

    pub fn load_typesystem(&self) -> Result<TypeSystem> {
        match &self.typesystem_path {
            Some(path) => TypeSystem::from_file(path),
            None => TypeSystem::builtin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_extensions() {
        let config = ConversionConfig::default();
        assert!(config.is_supported(Path::new("data/doc.xmi")));
        assert!(config.is_supported(Path::new("doc.xml")));
        assert!(config.is_supported(Path::new("doc.xmi.gz")));
        assert!(!config.is_supported(Path::new("doc.txt")));
        assert!(!config.is_supported(Path::new("doc.xml.zip")));
        assert!(!config.is_supported(Path::new(".xmi")));
    }

    #[test]
    fn test_relevance() {
        let config = ScannerConfig::default();
        assert!(config.is_relevant(TYPE_NS, "Anything"));
        assert!(config.is_relevant(SEGMENTATION_NS, "Sentence"));
        assert!(!config.is_relevant(SEGMENTATION_NS, "Token"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ConversionConfig =
            serde_json::from_str(r#"{ "supported_extensions": ["xmi"] }"#).unwrap();
        assert_eq!(config.supported_extensions, vec!["xmi".to_string()]);
        assert_eq!(config.scanner.comment_key, "PATO_uri");
        assert!(config.typesystem_path.is_none());
    }
}
