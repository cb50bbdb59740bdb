//! # Scanner de Documentos XMI
//!
//! Lê o documento UIMA em **uma passada de streaming** (pull-parser `quick-xml`),
//! capturando o texto completo (`sofaString`) e construindo o [`AnnotationIndex`].
//! Uma segunda passada, restrita aos `AnnotationComment`s, coleta os comentários usados
//! para enriquecer anotações já indexadas.
//!
//! ## Fluxo
//!
//! 1. [`load_document`]: checa o arquivo, descompacta `.gz` e limpa referências de
//!    caracteres de controle (`&#10;` → espaço, preservando os offsets).
//! 2. [`scan_document`]: texto + anotações dos elementos relevantes.
//! 3. [`collect_comments`] + [`enrich_with_comments`]: sobrescreve o `value` das anotações
//!    referenciadas por comentários `PATO_uri`.
//!
//! Um erro de XML aborta a passada e nenhuma anotação dela é devolvida.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use flate2::read::GzDecoder;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use regex::Regex;
use tracing::{debug, error, warn};

use crate::annotation::{remove_namespace, Annotation, AttributeMap, XMI_ID_KEY};
use crate::config::ScannerConfig;
use crate::error::{ConversionError, Result};
use crate::index::AnnotationIndex;
use crate::typesystem::TypeSystem;

const SOFA_STRING: &str = "sofaString";
const BEGIN: &str = "begin";
const END: &str = "end";
const VALUE: &str = "value";
const REFERENCE: &str = "reference";
const KEY: &str = "key";

/// Um elemento XML relevante, já com namespace resolvido.
#[derive(Debug, Clone)]
pub struct XmlElement {
    pub namespace: String,
    pub local: String,
    /// Atributos em notação Clark (`{ns}local`) quando prefixados.
    pub attributes: Vec<(String, String)>,
}

impl XmlElement {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Resultado da primeira passada.
#[derive(Debug, Default)]
pub struct ScannedDocument {
    /// Texto completo do documento; `None` se nenhum sofa foi encontrado.
    pub text: Option<String>,
    pub index: AnnotationIndex,
}

/// Comentários indexados pelo id da anotação referenciada.
pub type CommentRecords = HashMap<String, AttributeMap>;

/// Lê o arquivo (descompactando `.gz`) e limpa as referências de caracteres de controle.
pub fn load_document(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(ConversionError::NotFound {
            path: path.to_path_buf(),
        });
    }
    debug!("Lendo {}", path.display());

    let file = File::open(path)?;
    let mut raw = String::new();
    if path.to_string_lossy().ends_with("gz") {
        GzDecoder::new(file).read_to_string(&mut raw)?;
    } else {
        std::io::BufReader::new(file).read_to_string(&mut raw)?;
    }
    Ok(clean_text(&raw).into_owned().into_bytes())
}

/// Substitui referências `&#..;` (ex: `&#10;`) por um espaço.
///
/// Uma referência de caractere decodifica para um único caractere, então trocá-la
/// por um espaço mantém os offsets das anotações intactos.
pub fn clean_text(text: &str) -> Cow<'_, str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&#..;").expect("regex de controle inválida"))
        .replace_all(text, " ")
}

/// Percorre o XML emitindo cada elemento (abertura ou vazio) aceito por `is_relevant`.
///
/// Um documento que termina com elementos ainda abertos (arquivo truncado) é um
/// erro de parse: o quick-xml só reclama de tags de fechamento trocadas.
pub fn stream_elements(
    document: &[u8],
    is_relevant: impl Fn(&str, &str) -> bool,
    mut callback: impl FnMut(XmlElement),
) -> Result<()> {
    let mut reader = NsReader::from_reader(document);
    let mut buf = Vec::new();
    let mut depth = 0usize;

    loop {
        let position = reader.buffer_position();
        let (resolved, event) = reader
            .read_resolved_event_into(&mut buf)
            .map_err(|e| ConversionError::parse(e, position))?;
        let namespace = match resolved {
            ResolveResult::Bound(Namespace(ns)) => String::from_utf8_lossy(ns).into_owned(),
            _ => String::new(),
        };

        if matches!(event, Event::Start(_)) {
            depth += 1;
        }

        match event {
            Event::Start(e) | Event::Empty(e) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if is_relevant(&namespace, &local) {
                    let mut attributes = Vec::new();
                    for attr in e.attributes() {
                        let attr = attr.map_err(|err| ConversionError::parse(err, position))?;
                        let value = attr
                            .unescape_value()
                            .map_err(|err| ConversionError::parse(err, position))?
                            .into_owned();
                        let (attr_ns, attr_local) = reader.resolve_attribute(attr.key);
                        let attr_local = String::from_utf8_lossy(attr_local.as_ref()).into_owned();
                        let key = match attr_ns {
                            ResolveResult::Bound(Namespace(ns)) => {
                                format!("{{{}}}{}", String::from_utf8_lossy(ns), attr_local)
                            }
                            _ => attr_local,
                        };
                        attributes.push((key, value));
                    }
                    callback(XmlElement {
                        namespace,
                        local,
                        attributes,
                    });
                }
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof if depth != 0 => {
                return Err(ConversionError::parse(
                    "fim inesperado do documento",
                    reader.buffer_position(),
                ));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

/// Primeira passada: captura o texto e indexa as anotações.
pub fn scan_document(
    document: &[u8],
    config: &ScannerConfig,
    typesystem: &TypeSystem,
) -> Result<ScannedDocument> {
    let mut scanned = ScannedDocument::default();
    let mut undeclared: HashSet<String> = HashSet::new();

    let result = stream_elements(
        document,
        |ns, local| config.is_relevant(ns, local),
        |element| {
            debug!("Processando elemento {}", element.local);
            if let Some(sofa) = element.attribute(SOFA_STRING) {
                if scanned.text.is_none() {
                    scanned.text = Some(sofa.to_string());
                } else {
                    warn!("Mais de um sofaString no documento; mantendo o primeiro");
                }
                return;
            }
            if let Some(annotation) = annotation_from_element(&element) {
                if !typesystem.declares(&annotation.type_name)
                    && undeclared.insert(annotation.type_name.clone())
                {
                    warn!("Tipo não declarado no typesystem: {}", annotation.type_name);
                }
                scanned.index.add(annotation);
            }
        },
    );

    if let Err(err) = result {
        error!("O parsing do arquivo causou um erro: {}", err);
        return Err(err);
    }
    Ok(scanned)
}

/// Constrói uma anotação; elementos sem offsets válidos ou autodescritivos são descartados.
pub fn annotation_from_element(element: &XmlElement) -> Option<Annotation> {
    let begin = element.attribute(BEGIN)?.trim().parse::<usize>().ok()?;
    let end = element.attribute(END)?.trim().parse::<usize>().ok()?;
    if begin > end {
        debug!("Offsets invertidos em {} ({}..{})", element.local, begin, end);
        return None;
    }
    // `value="Taxon"` em um elemento Taxon não carrega informação
    if element.attribute(VALUE) == Some(remove_namespace(&element.local)) {
        return None;
    }

    let id = element.attribute(XMI_ID_KEY).unwrap_or_default();
    let attributes: AttributeMap = element.attributes.iter().cloned().collect();
    Some(Annotation::new(
        id,
        begin,
        end,
        &element.namespace,
        &element.local,
        attributes,
    ))
}

/// Segunda passada: comentários de anotação, indexados por `reference`.
pub fn collect_comments(document: &[u8], config: &ScannerConfig) -> Result<CommentRecords> {
    let mut comments = CommentRecords::new();
    let result = stream_elements(
        document,
        |ns, local| config.comment_tag.matches(ns, local),
        |element| {
            if let Some(reference) = element.attribute(REFERENCE) {
                let record: AttributeMap = element.attributes.iter().cloned().collect();
                comments.insert(reference.to_string(), record);
            }
        },
    );

    if let Err(err) = result {
        error!("O parsing dos comentários causou um erro: {}", err);
        return Err(err);
    }
    Ok(comments)
}

/// Sobrescreve o `value` das anotações referenciadas por comentários com a chave configurada.
pub fn enrich_with_comments(index: &mut AnnotationIndex, comments: &CommentRecords, comment_key: &str) {
    if comments.is_empty() {
        return;
    }
    for annotation in index.iter_mut() {
        let Some(comment) = comments.get(&annotation.id) else {
            continue;
        };
        if comment.get(KEY) != Some(comment_key) {
            continue;
        }
        if let Some(value) = comment.get(VALUE) {
            annotation.attributes.insert(VALUE, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotationKind, TaxonClass};

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xmi:XMI xmlns:xmi="http://www.omg.org/XMI" xmlns:cas="http:///uima/cas.ecore"
    xmlns:type="http:///org/texttechnologylab/annotation/type.ecore"
    xmlns:type2="http:///de/tudarmstadt/ukp/dkpro/core/api/segmentation/type.ecore"
    xmlns:type3="http:///de/tudarmstadt/ukp/dkpro/core/api/segmentation/type.ecore"
    xmlns:annotation="http:///org/texttechnologylab/annotation.ecore" xmi:version="2.0">
  <cas:NULL xmi:id="0"/>
  <cas:Sofa xmi:id="1" sofaNum="1" sofaID="_InitialView" mimeType="text" sofaString="Fagus sylvatica wächst."/>
  <type2:Sentence xmi:id="19" sofa="1" begin="0" end="23"/>
  <type3:Token xmi:id="20" sofa="1" begin="0" end="5"/>
  <type:Plant_Flora xmi:id="30" sofa="1" begin="0" end="15" value="https://www.biofid.de/bio-ontologies#GBIF_1"/>
  <type:Taxon xmi:id="31" sofa="1" begin="0" end="15" value="Taxon"/>
  <type:Taxon xmi:id="32" sofa="1" begin="0"/>
  <annotation:AnnotationComment xmi:id="40" reference="30" key="PATO_uri" value="http://purl.obolibrary.org/obo/PATO_1"/>
</xmi:XMI>"#;

    #[test]
    fn test_scan_collects_text_and_annotations() {
        let ts = TypeSystem::builtin().unwrap();
        let scanned = scan_document(DOC.as_bytes(), &ScannerConfig::default(), &ts).unwrap();

        assert_eq!(scanned.text.as_deref(), Some("Fagus sylvatica wächst."));
        // Sentence + Plant_Flora; o Token não é relevante, o Taxon autodescritivo e o sem `end` caem
        assert_eq!(scanned.index.len(), 2);

        let plant = scanned.index.iter().map(|(_, a)| a).find(|a| a.id == "30").unwrap();
        assert_eq!(plant.kind, AnnotationKind::Taxon(TaxonClass::PlantFlora));
        assert_eq!(plant.name, "plant_flora");
        assert_eq!((plant.begin, plant.end), (0, 15));
        assert_eq!(plant.attributes.get("sofa"), Some("1"));
    }

    #[test]
    fn test_comments_overwrite_value() {
        let ts = TypeSystem::builtin().unwrap();
        let config = ScannerConfig::default();
        let mut scanned = scan_document(DOC.as_bytes(), &config, &ts).unwrap();
        let comments = collect_comments(DOC.as_bytes(), &config).unwrap();
        assert_eq!(comments.len(), 1);

        enrich_with_comments(&mut scanned.index, &comments, &config.comment_key);
        let plant = scanned.index.iter().map(|(_, a)| a).find(|a| a.id == "30").unwrap();
        assert_eq!(plant.attributes.get("value"), Some("http://purl.obolibrary.org/obo/PATO_1"));
    }

    #[test]
    fn test_comment_with_other_key_is_ignored() {
        let doc = DOC.replace("key=\"PATO_uri\"", "key=\"note\"");
        let ts = TypeSystem::builtin().unwrap();
        let config = ScannerConfig::default();
        let mut scanned = scan_document(doc.as_bytes(), &config, &ts).unwrap();
        let comments = collect_comments(doc.as_bytes(), &config).unwrap();
        enrich_with_comments(&mut scanned.index, &comments, &config.comment_key);

        let plant = scanned.index.iter().map(|(_, a)| a).find(|a| a.id == "30").unwrap();
        assert_eq!(plant.attributes.get("value"), Some("https://www.biofid.de/bio-ontologies#GBIF_1"));
    }

    #[test]
    fn test_malformed_document_fails() {
        let broken = &DOC[..DOC.len() - 20];
        let broken = format!("{}</wrong>", broken);
        let ts = TypeSystem::builtin().unwrap();
        let result = scan_document(broken.as_bytes(), &ScannerConfig::default(), &ts);
        assert!(matches!(result, Err(ConversionError::Parse { .. })));
    }

    #[test]
    fn test_truncated_document_fails() {
        let ts = TypeSystem::builtin().unwrap();
        let config = ScannerConfig::default();
        // Raiz nunca fechada, mas tudo o que foi lido é XML bem formado
        let truncated = DOC.trim_end_matches("</xmi:XMI>");
        assert!(matches!(
            scan_document(truncated.as_bytes(), &config, &ts),
            Err(ConversionError::Parse { .. })
        ));
        assert!(matches!(
            collect_comments(truncated.as_bytes(), &config),
            Err(ConversionError::Parse { .. })
        ));

        let cut = &DOC[..DOC.find("<type:Taxon").unwrap()];
        assert!(matches!(
            scan_document(cut.as_bytes(), &config, &ts),
            Err(ConversionError::Parse { .. })
        ));
    }

    #[test]
    fn test_empty_root_is_complete() {
        let doc = r#"<xmi:XMI xmlns:xmi="http://www.omg.org/XMI" xmi:version="2.0"/>"#;
        let ts = TypeSystem::builtin().unwrap();
        let scanned = scan_document(doc.as_bytes(), &ScannerConfig::default(), &ts).unwrap();
        assert!(scanned.text.is_none());
        assert!(scanned.index.is_empty());
    }

    #[test]
    fn test_clean_text_keeps_length_of_decoded_text() {
        assert_eq!(clean_text("a&#10;b"), "a b");
        assert_eq!(clean_text("sem controle"), "sem controle");
    }
}
