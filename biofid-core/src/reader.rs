//! # Leitor de Resultados NLP
//!
//! Fachada de leitura sobre um documento UIMA: taxa, locais, texto puro e texto anotado.
//!
//! ## Exemplo
//!
//! ```rust,no_run
//! use biofid_core::{ConversionConfig, NlpReader, UimaReader};
//!
//! let reader = UimaReader::open("data/uima.xmi", &ConversionConfig::default()).unwrap();
//! for taxon in reader.taxa() {
//!     println!("{} [{}..{}] {:?}", taxon.text, taxon.begin, taxon.end, taxon.uris);
//! }
//! ```

use std::path::Path;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::annotation::Annotation;
use crate::config::ConversionConfig;
use crate::convert::render_document;
use crate::error::{ConversionError, Result};
use crate::scanner::{collect_comments, load_document, scan_document};
use crate::typesystem::TypeSystem;

/// Tipo UIMA de todos os taxa (flora e fauna herdam dele).
pub const TAXON_TYPE: &str = "org.texttechnologylab.annotation.type.Taxon";
pub const LOCATION_TYPE: &str = "org.texttechnologylab.annotation.type.Location_Place";

/// Uma entidade nomeada encontrada no texto.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamedEntity {
    pub id: String,
    pub begin: usize,
    pub end: usize,
    /// Trecho coberto pela entidade.
    pub text: String,
    /// Nome do tipo em minúsculas (ex: "taxon", "location_place").
    pub ne_type: String,
    pub uris: Vec<String>,
}

/// Interface comum de leitura para arquivos de resultados NLP.
pub trait NlpReader {
    /// Todos os taxa anotados no texto.
    fn taxa(&self) -> Vec<NamedEntity>;
    /// Todos os locais anotados no texto.
    fn locations(&self) -> Vec<NamedEntity>;
    /// Texto original, sem marcação.
    fn text(&self) -> &str;
    /// Texto com marcação inline; `None` se o documento não tem anotações.
    fn annotated_text(&self) -> Option<&str>;
}

/// Leitor de documentos XMI do BIOfid.
#[derive(Debug)]
pub struct UimaReader {
    text: String,
    annotations: Vec<Annotation>,
    annotated_text: Option<String>,
    typesystem: TypeSystem,
}

impl UimaReader {
    pub fn open(path: impl AsRef<Path>, config: &ConversionConfig) -> Result<Self> {
        let path = path.as_ref();
        if !config.is_supported(path) {
            return Err(ConversionError::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        }
        let typesystem = config.load_typesystem()?;
        let document = load_document(path)?;
        let scanned = scan_document(&document, &config.scanner, &typesystem)?;

        let annotations: Vec<Annotation> = scanned.index.iter().map(|(_, a)| a.clone()).collect();
        let text = scanned.text.unwrap_or_default();
        let annotated_text = if text.is_empty() || scanned.index.is_empty() {
            None
        } else {
            let comments = collect_comments(&document, &config.scanner)?;
            Some(render_document(
                &text,
                scanned.index,
                &comments,
                &config.scanner.comment_key,
            ))
        };
        debug!("{} anotações lidas de {}", annotations.len(), path.display());

        Ok(Self {
            text,
            annotations,
            annotated_text,
            typesystem,
        })
    }

    fn select(&self, ancestor: &str) -> Vec<NamedEntity> {
        self.annotations
            .iter()
            .filter(|a| self.typesystem.is_a(&a.type_name, ancestor))
            .map(|a| to_named_entity(a, &self.text))
            .collect()
    }
}

impl NlpReader for UimaReader {
    fn taxa(&self) -> Vec<NamedEntity> {
        self.select(TAXON_TYPE)
    }

    fn locations(&self) -> Vec<NamedEntity> {
        self.select(LOCATION_TYPE)
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn annotated_text(&self) -> Option<&str> {
        self.annotated_text.as_deref()
    }
}

fn to_named_entity(annotation: &Annotation, text: &str) -> NamedEntity {
    let mut uris: Vec<String> = annotation
        .attributes
        .get("value")
        .map(|value| {
            value
                .split(',')
                .map(|uri| percent_decode_str(uri.trim()).decode_utf8_lossy().into_owned())
                .filter(|uri| !uri.is_empty())
                .collect()
        })
        .unwrap_or_default();
    if let Some(geonames_id) = annotation.attributes.get("id").map(str::trim) {
        if !geonames_id.is_empty() {
            uris.push(format!("https://sws.geonames.org/{}/", geonames_id));
        }
    }

    NamedEntity {
        id: annotation.id.clone(),
        begin: annotation.begin,
        end: annotation.end,
        text: text
            .chars()
            .skip(annotation.begin)
            .take(annotation.end - annotation.begin)
            .collect(),
        ne_type: annotation.name.clone(),
        uris,
    }
}
