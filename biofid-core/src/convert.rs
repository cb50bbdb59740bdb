//! # Orquestração da Conversão
//!
//! Liga os estágios do pipeline para um documento:
//!
//! ```text
//! arquivo → load_document → scan_document → collect_comments → enrich_with_comments
//!         → normalize_attributes → remove_double_annotations → annotate_text → String
//! ```
//!
//! Também oferece a conversão em lote de um diretório, em paralelo com `rayon`.
//! Cada documento usa o seu próprio [`AnnotationIndex`]; nada mutável é compartilhado
//! entre as threads.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::ConversionConfig;
use crate::error::{ConversionError, Result};
use crate::index::AnnotationIndex;
use crate::normalize::normalize_attributes;
use crate::render::annotate_text;
use crate::resolver::remove_double_annotations;
use crate::scanner::{collect_comments, enrich_with_comments, load_document, scan_document, CommentRecords};
use crate::typesystem::TypeSystem;

/// Partes de nome de arquivo removidas por [`file_stem`].
const STEM_EXTENSIONS: &[&str] = &["txt", "xml", "xmi", "gz"];

/// Converte um arquivo XMI em texto anotado.
///
/// Retorna `Ok(None)` quando o documento é bem-formado mas não tem texto ou anotações.
pub fn convert_file(path: &Path, config: &ConversionConfig) -> Result<Option<String>> {
    if !config.is_supported(path) {
        return Err(ConversionError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    }
    let typesystem = config.load_typesystem()?;
    convert_with_typesystem(path, config, &typesystem)
}

fn convert_with_typesystem(
    path: &Path,
    config: &ConversionConfig,
    typesystem: &TypeSystem,
) -> Result<Option<String>> {
    let document = load_document(path)?;
    let converted = convert_bytes(&document, config, typesystem)?;
    if converted.is_none() {
        info!("Arquivo {} sem conteúdo anotado; pulando", path.display());
    }
    Ok(converted)
}

/// Converte um documento já carregado em memória.
pub fn convert_bytes(
    document: &[u8],
    config: &ConversionConfig,
    typesystem: &TypeSystem,
) -> Result<Option<String>> {
    let scanned = scan_document(document, &config.scanner, typesystem)?;
    let Some(text) = scanned.text else {
        return Ok(None);
    };
    if scanned.index.is_empty() {
        return Ok(None);
    }

    let comments = collect_comments(document, &config.scanner)?;
    Ok(Some(render_document(
        &text,
        scanned.index,
        &comments,
        &config.scanner.comment_key,
    )))
}

/// Estágios que mutam o índice: comentários, normalização, deduplicação e render.
pub fn render_document(
    text: &str,
    mut index: AnnotationIndex,
    comments: &CommentRecords,
    comment_key: &str,
) -> String {
    enrich_with_comments(&mut index, comments, comment_key);
    for annotation in index.iter_mut() {
        annotation.attributes = normalize_attributes(&annotation.attributes);
    }
    remove_double_annotations(&mut index);
    debug!("{} anotações em {} spans após a deduplicação", index.len(), index.span_count());
    annotate_text(text, &mut index)
}

/// Fronteira do documento: qualquer erro vira `None` (e é logado).
pub fn convert_uima_to_annotated_text(path: impl AsRef<Path>) -> Option<String> {
    let path = path.as_ref();
    match convert_file(path, &ConversionConfig::default()) {
        Ok(text) => text,
        Err(err) => {
            error!("Falha ao converter {}: {}", path.display(), err);
            None
        }
    }
}

/// Nome do arquivo sem as extensões conhecidas (`doc.xmi.gz` → `doc`).
pub fn file_stem(file_name: &str) -> String {
    file_name
        .split('.')
        .filter(|part| !STEM_EXTENSIONS.contains(part))
        .collect()
}

/// Arquivo que falhou na conversão em lote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub error: String,
}

/// Resultado de [`convert_directory`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    /// Arquivos de saída escritos.
    pub converted: Vec<PathBuf>,
    /// Entradas sem conteúdo ou com extensão não suportada.
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<FailedFile>,
}

enum Outcome {
    Converted(PathBuf),
    Skipped(PathBuf),
    Failed(FailedFile),
}

/// Converte todos os arquivos suportados de `folder`, escrevendo `<sink>/<stem>.txt`.
pub fn convert_directory(folder: &Path, sink: &Path, config: &ConversionConfig) -> Result<BatchReport> {
    if !folder.is_dir() {
        return Err(ConversionError::NotFound {
            path: folder.to_path_buf(),
        });
    }

    let mut files: Vec<PathBuf> = fs::read_dir(folder)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    if files.is_empty() {
        return Err(ConversionError::EmptyDirectory {
            path: folder.to_path_buf(),
        });
    }
    files.sort();

    fs::create_dir_all(sink)?;
    let typesystem = config.load_typesystem()?;
    info!("Convertendo {} arquivos de {}", files.len(), folder.display());

    let outcomes: Vec<Outcome> = files
        .par_iter()
        .map(|path| convert_into(path, sink, config, &typesystem))
        .collect();

    let mut report = BatchReport::default();
    for outcome in outcomes {
        match outcome {
            Outcome::Converted(path) => report.converted.push(path),
            Outcome::Skipped(path) => report.skipped.push(path),
            Outcome::Failed(failed) => report.failed.push(failed),
        }
    }
    info!(
        "Lote concluído: {} convertidos, {} pulados, {} falhas",
        report.converted.len(),
        report.skipped.len(),
        report.failed.len()
    );
    Ok(report)
}

fn convert_into(path: &Path, sink: &Path, config: &ConversionConfig, typesystem: &TypeSystem) -> Outcome {
    if !config.is_supported(path) {
        debug!("Ignorando {}", path.display());
        return Outcome::Skipped(path.to_path_buf());
    }

    let written = convert_with_typesystem(path, config, typesystem).and_then(|converted| {
        let Some(text) = converted else {
            return Ok(None);
        };
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let target = sink.join(format!("{}.txt", file_stem(name)));
        fs::write(&target, text)?;
        Ok(Some(target))
    });

    match written {
        Ok(Some(target)) => Outcome::Converted(target),
        Ok(None) => Outcome::Skipped(path.to_path_buf()),
        Err(err) => {
            error!("Falha ao converter {}: {}", path.display(), err);
            Outcome::Failed(FailedFile {
                path: path.to_path_buf(),
                error: err.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("doc.xmi.gz"), "doc");
        assert_eq!(file_stem("1901_flora.xml"), "1901_flora");
        assert_eq!(file_stem("notes.txt"), "notes");
        // Partes desconhecidas são coladas sem o ponto
        assert_eq!(file_stem("a.b.xmi"), "ab");
    }

    #[test]
    fn test_unsupported_extension_is_rejected_before_io() {
        let result = convert_file(Path::new("does/not/exist.pdf"), &ConversionConfig::default());
        assert!(matches!(result, Err(ConversionError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_missing_file() {
        let result = convert_file(Path::new("does/not/exist.xmi"), &ConversionConfig::default());
        assert!(matches!(result, Err(ConversionError::NotFound { .. })));
        assert!(convert_uima_to_annotated_text("does/not/exist.xmi").is_none());
    }

    #[test]
    fn test_document_without_payload_yields_none() {
        let ts = TypeSystem::builtin().unwrap();
        let doc = br#"<xmi:XMI xmlns:xmi="http://www.omg.org/XMI" xmi:version="2.0"/>"#;
        let out = convert_bytes(doc, &ConversionConfig::default(), &ts).unwrap();
        assert!(out.is_none());
    }
}
