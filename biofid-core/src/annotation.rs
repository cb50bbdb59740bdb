//! # Modelo de Anotações
//!
//! Define a [`Annotation`] (uma ocorrência de um span anotado), os tipos semânticos
//! fechados ([`AnnotationKind`]) e o mapa ordenado de atributos ([`AttributeMap`]).
//!
//! ## Nomes e Namespaces
//!
//! No XMI cada elemento tem um namespace e um nome local, por exemplo
//! `{http:///org/texttechnologylab/annotation/type.ecore}Taxon`. O sistema guarda três visões:
//!
//! | Campo       | Exemplo                                         | Uso                          |
//! |-------------|-------------------------------------------------|------------------------------|
//! | `kind`      | `Taxon(TaxonClass::Taxon)`                      | regras de prioridade/render  |
//! | `name`      | `taxon`                                         | nome renderizado (`class`)   |
//! | `type_name` | `org.texttechnologylab.annotation.type.Taxon`   | typesystem e leitor          |

use serde::{Deserialize, Serialize};

pub const XMI_NS: &str = "http://www.omg.org/XMI";
pub const CAS_NS: &str = "http:///uima/cas.ecore";
pub const SEGMENTATION_NS: &str = "http:///de/tudarmstadt/ukp/dkpro/core/api/segmentation/type.ecore";
pub const OCR_NS: &str = "http:///org/texttechnologylab/annotation/ocr.ecore";
pub const HEIDELTIME_NS: &str = "http:///de/unihd/dbs/uima/types/heideltime.ecore";
pub const TYPE_NS: &str = "http:///org/texttechnologylab/annotation/type.ecore";
pub const CONCEPT_NS: &str = "http:///org/texttechnologylab/annotation/type/concept.ecore";
pub const WIKIPEDIA_NS: &str = "http:///org/hucompute/textimager/uima/type/wikipedia.ecore";
pub const ANNOTATION_NS: &str = "http:///org/texttechnologylab/annotation.ecore";

/// Chave do atributo `xmi:id` na notação `{namespace}local`.
pub const XMI_ID_KEY: &str = "{http://www.omg.org/XMI}id";

/// Classe taxonômica, da mais específica para a mais genérica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaxonClass {
    /// **Flora**: `Plant_Flora`
    PlantFlora,
    /// **Fauna**: `Animal_Fauna`
    AnimalFauna,
    /// **Genérico**: `Taxon`
    Taxon,
}

impl TaxonClass {
    /// Prioridade na remoção de duplicatas (menor vence).
    pub fn priority(&self) -> u8 {
        match self {
            TaxonClass::PlantFlora => 0,
            TaxonClass::AnimalFauna => 1,
            TaxonClass::Taxon => 2,
        }
    }
}

/// Tipo semântico de uma anotação, derivado do namespace e do nome local do elemento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnnotationKind {
    /// Limite de sentença (estrutural).
    Sentence,
    /// Página de OCR (estrutural).
    Page,
    /// Link da Wikipedia: apenas doa o título, nunca é renderizado.
    WikipediaLink,
    Taxon(TaxonClass),
    Location,
    GeoNames,
    Timex,
    /// Qualquer outra anotação dos namespaces relevantes.
    Entity,
}

impl AnnotationKind {
    /// Classifica um elemento pelo par (namespace, nome local).
    pub fn classify(namespace: &str, local: &str) -> Self {
        match (namespace, local) {
            (SEGMENTATION_NS, "Sentence") => AnnotationKind::Sentence,
            (OCR_NS, "OCRPage") => AnnotationKind::Page,
            (WIKIPEDIA_NS, "WikipediaLink") => AnnotationKind::WikipediaLink,
            (ANNOTATION_NS, "GeoNamesEntity") => AnnotationKind::GeoNames,
            (HEIDELTIME_NS, "Timex3") => AnnotationKind::Timex,
            (TYPE_NS, "Plant_Flora") => AnnotationKind::Taxon(TaxonClass::PlantFlora),
            (TYPE_NS, "Animal_Fauna") => AnnotationKind::Taxon(TaxonClass::AnimalFauna),
            (TYPE_NS, "Taxon") => AnnotationKind::Taxon(TaxonClass::Taxon),
            (TYPE_NS, "Location_Place") => AnnotationKind::Location,
            _ => AnnotationKind::Entity,
        }
    }

    /// Sentenças e páginas são renderizadas com o próprio nome e id original.
    pub fn is_structural(&self) -> bool {
        matches!(self, AnnotationKind::Sentence | AnnotationKind::Page)
    }

    pub fn taxon_class(&self) -> Option<TaxonClass> {
        match self {
            AnnotationKind::Taxon(class) => Some(*class),
            _ => None,
        }
    }
}

/// Converte um namespace ecore no prefixo do tipo UIMA.
///
/// `http:///org/texttechnologylab/annotation/type.ecore` + `Taxon`
/// → `org.texttechnologylab.annotation.type.Taxon`
pub fn uima_type_name(namespace: &str, local: &str) -> String {
    let package = namespace
        .trim_start_matches("http://")
        .trim_start_matches('/')
        .trim_end_matches(".ecore")
        .replace('/', ".");
    if package.is_empty() {
        local.to_string()
    } else {
        format!("{}.{}", package, local)
    }
}

/// Remove o prefixo `{namespace}` de um nome em notação Clark.
pub fn remove_namespace(name: &str) -> &str {
    match name.find('}') {
        Some(idx) if name.starts_with('{') => &name[idx + 1..],
        _ => name,
    }
}

/// Mapa ordenado de atributos (a ordem de inserção é a ordem de renderização).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeMap {
    entries: Vec<(String, String)>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Insere ou substitui (mantendo a posição original da chave).
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Igualdade ignorando uma chave (ex: `wikipedia-title`).
    pub fn equal_ignoring(&self, other: &AttributeMap, ignored: &str) -> bool {
        let count = |map: &AttributeMap| map.iter().filter(|(k, _)| *k != ignored).count();
        count(self) == count(other)
            && self
                .iter()
                .filter(|(k, _)| *k != ignored)
                .all(|(k, v)| other.get(k) == Some(v))
    }
}

/// A igualdade não depende da ordem das chaves.
impl PartialEq for AttributeMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl Eq for AttributeMap {}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = AttributeMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// Uma ocorrência de um span anotado no texto.
///
/// Os offsets `begin`/`end` são índices de caractere no texto plano (`end` exclusivo).
/// `begin == end` denota um marcador de largura zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Identificador estável do documento de origem (`xmi:id`).
    pub id: String,
    pub begin: usize,
    pub end: usize,
    /// Nome local sem namespace, em minúsculas (ex: "taxon", "sentence").
    pub name: String,
    /// Nome completo do tipo UIMA (ex: "org.texttechnologylab.annotation.type.Taxon").
    pub type_name: String,
    pub kind: AnnotationKind,
    pub attributes: AttributeMap,
    /// Derivado na resolução: a tag de abertura é emitida como `<em .../>`.
    pub self_closing: bool,
}

impl Annotation {
    pub fn new(
        id: impl Into<String>,
        begin: usize,
        end: usize,
        namespace: &str,
        local: &str,
        attributes: AttributeMap,
    ) -> Self {
        Self {
            id: id.into(),
            begin,
            end,
            name: local.to_lowercase(),
            type_name: uima_type_name(namespace, local),
            kind: AnnotationKind::classify(namespace, local),
            attributes,
            self_closing: false,
        }
    }

    pub fn is_zero_width(&self) -> bool {
        self.begin == self.end
    }

    pub fn has_same_position(&self, other: &Annotation) -> bool {
        self.begin == other.begin && self.end == other.end
    }

    /// Identidade para deduplicação: (begin, end, name).
    pub fn identity(&self) -> (usize, usize, &str) {
        (self.begin, self.end, self.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_kinds() {
        assert_eq!(AnnotationKind::classify(SEGMENTATION_NS, "Sentence"), AnnotationKind::Sentence);
        assert_eq!(AnnotationKind::classify(OCR_NS, "OCRPage"), AnnotationKind::Page);
        assert_eq!(
            AnnotationKind::classify(TYPE_NS, "Plant_Flora"),
            AnnotationKind::Taxon(TaxonClass::PlantFlora)
        );
        assert_eq!(AnnotationKind::classify(TYPE_NS, "Other"), AnnotationKind::Entity);
        // Mesmo nome local em outro namespace não é uma sentença
        assert_eq!(AnnotationKind::classify(TYPE_NS, "Sentence"), AnnotationKind::Entity);
    }

    #[test]
    fn test_uima_type_name() {
        assert_eq!(
            uima_type_name(TYPE_NS, "Taxon"),
            "org.texttechnologylab.annotation.type.Taxon"
        );
        assert_eq!(
            uima_type_name(SEGMENTATION_NS, "Sentence"),
            "de.tudarmstadt.ukp.dkpro.core.api.segmentation.type.Sentence"
        );
    }

    #[test]
    fn test_remove_namespace() {
        assert_eq!(remove_namespace("{http:///uima/cas.ecore}Sofa"), "Sofa");
        assert_eq!(remove_namespace("Sofa"), "Sofa");
    }

    #[test]
    fn test_attribute_map_equality_ignores_order() {
        let a: AttributeMap = [("wikidata", "Q1"), ("uri", "http://x")].into_iter().collect();
        let b: AttributeMap = [("uri", "http://x"), ("wikidata", "Q1")].into_iter().collect();
        assert_eq!(a, b);

        let mut c = b.clone();
        c.insert("wikipedia-title", "Frankfurt");
        assert_ne!(a, c);
        assert!(a.equal_ignoring(&c, "wikipedia-title"));
    }

    #[test]
    fn test_insert_keeps_position() {
        let mut map: AttributeMap = [("a", "1"), ("b", "2")].into_iter().collect();
        map.insert("a", "3");
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(map.get("a"), Some("3"));
    }
}
