//! # Normalização de Atributos
//!
//! Os elementos XMI chegam com uma "sopa" de atributos heterogêneos: URIs separadas por
//! vírgula, ids do GeoNames, strings de score de modelos (`Flair;score=0.91234`), códigos
//! de classe (`loc`, `per`)... Este módulo reduz tudo isso a um vocabulário semântico fixo:
//!
//! | Chave               | Origem                                               |
//! |---------------------|------------------------------------------------------|
//! | `wikidata`          | URL contendo `wikidata.org`                          |
//! | `biofid-uri`        | URL da ontologia BIOfid                              |
//! | `wikidata-id`       | Id Wikidata puro (`Q1794`)                           |
//! | `pageId`            | Nome de arquivo de página (`..._0042.xml` → `0042`)  |
//! | `probability-score` | Score do modelo, truncado                            |
//! | `probability-model` | Nome do modelo que gerou o score                     |
//! | `uri`               | Qualquer outra URI `http…` (GeoNames, OBO)           |
//! | `class`             | Classe genérica (`location_place`, `person_humanbeing`) |
//! | `wikipedia-title`   | Título vindo de um link da Wikipedia                 |
//!
//! ## Algoritmo
//! 1. Decodifica (percent-decoding) e quebra listas de URIs.
//! 2. Converte `id` (GeoNames) em `https://sws.geonames.org/<id>/`.
//! 3. Extrai pares (modelo, score) de `value`/`identifier`; sem score, classifica cada valor.
//! 4. Aplica a tabela ordenada de regras ([`attribute_rules`]); a primeira que casar vence.
//! 5. Renomeia `Target` para `wikipedia-title`.
//! 6. Reduz o `pageId` ao sufixo numérico.
//! 7. Expande listas em chaves indexadas (`wikidata-0`, `wikidata-1`, ...).
//!
//! A normalização nunca falha: formatos inesperados simplesmente descartam o valor.
//! Um conjunto já normalizado passa pela função sem mudanças.

use std::sync::OnceLock;

use percent_encoding::percent_decode_str;
use regex::Regex;
use tracing::warn;

use crate::annotation::AttributeMap;

pub const WIKIDATA: &str = "wikidata";
pub const BIOFID_URI: &str = "biofid-uri";
pub const WIKIDATA_ID: &str = "wikidata-id";
pub const PAGE_ID: &str = "pageId";
pub const PROBABILITY_SCORE: &str = "probability-score";
pub const PROBABILITY_MODEL: &str = "probability-model";
pub const URI: &str = "uri";
pub const CLASS: &str = "class";
pub const WIKIPEDIA_TITLE: &str = "wikipedia-title";

/// Vocabulário semântico completo da saída.
pub const SEMANTIC_VOCABULARY: &[&str] = &[
    WIKIDATA,
    BIOFID_URI,
    WIKIDATA_ID,
    PAGE_ID,
    PROBABILITY_SCORE,
    PROBABILITY_MODEL,
    URI,
    CLASS,
    WIKIPEDIA_TITLE,
];

/// Atributos brutos esperados nos elementos XMI (na ordem em que são lidos).
pub const RAW_ATTRIBUTES: &[&str] = &[
    "pageId",
    "timexValue",
    "value",
    "identifier",
    "Target",
    "WikiData",
    "isInstance",
    "id",
];

const VALUE: &str = "value";
const IDENTIFIER: &str = "identifier";
const GEONAMES_ID: &str = "id";
const TARGET: &str = "Target";
const SCORE_MARKER: &str = "score";
const REMOVED_MARKER: &str = "-REMOVED";
const GEONAMES_URI_PREFIX: &str = "https://sws.geonames.org";

/// Códigos curtos de classe → nome longo.
const GENERIC_NAMED_ENTITY_CLASSES: &[(&str, &str)] = &[
    ("loc", "location_place"),
    ("misc", "miscellaneous"),
    ("org", "organization"),
    ("per", "person_humanbeing"),
];

/// Como uma regra reconhece valores de um atributo.
#[derive(Debug)]
pub enum Matcher {
    /// Mantém apenas os valores que casam com a regex.
    Pattern(Regex),
    /// Mantém todos os valores se o nome do atributo for exatamente esta chave.
    Key(&'static str),
    /// Como `Key`, mas só para os valores que já estão na forma final.
    KeyPattern(&'static str, Regex),
}

/// Uma linha da tabela de classificação: matchers → chave semântica.
#[derive(Debug)]
pub struct AttributeRule {
    pub target: &'static str,
    pub matchers: Vec<Matcher>,
}

impl AttributeRule {
    fn pattern(target: &'static str, pattern: &str) -> Self {
        Self {
            target,
            matchers: vec![Matcher::Pattern(compile(pattern))],
        }
    }

    fn key(target: &'static str) -> Self {
        Self {
            target,
            matchers: vec![Matcher::Key(target)],
        }
    }

    /// Valores do atributo `name` aceitos por esta regra (vazio = não casou).
    pub fn apply(&self, name: &str, values: &[String]) -> Vec<String> {
        for matcher in &self.matchers {
            let accepted: Vec<String> = match matcher {
                Matcher::Pattern(re) => values.iter().filter(|v| re.is_match(v)).cloned().collect(),
                Matcher::Key(key) if *key == name => values.to_vec(),
                Matcher::Key(_) => Vec::new(),
                Matcher::KeyPattern(key, re) if *key == name => {
                    values.iter().filter(|v| re.is_match(v)).cloned().collect()
                }
                Matcher::KeyPattern(..) => Vec::new(),
            };
            if !accepted.is_empty() {
                return accepted;
            }
        }
        Vec::new()
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("padrão de atributo inválido")
}

/// Tabela de regras em ordem de prioridade.
pub fn attribute_rules() -> &'static [AttributeRule] {
    static RULES: OnceLock<Vec<AttributeRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            AttributeRule::pattern(WIKIDATA, r"wikidata\.org"),
            AttributeRule::pattern(BIOFID_URI, r"biofid\.de/bio-ontologies"),
            AttributeRule::pattern(WIKIDATA_ID, r"^Q[0-9]+$"),
            AttributeRule {
                target: PAGE_ID,
                matchers: vec![
                    Matcher::Pattern(page_id_regex().clone()),
                    Matcher::KeyPattern(PAGE_ID, compile(r"^[^_/]+$")),
                ],
            },
            AttributeRule::key(PROBABILITY_SCORE),
            AttributeRule::key(PROBABILITY_MODEL),
            AttributeRule::pattern(URI, r"^http"),
            AttributeRule {
                target: CLASS,
                matchers: vec![Matcher::KeyPattern(CLASS, class_name_regex())],
            },
        ]
    })
}

fn page_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compile(r"^.*_(.*)\.xml"))
}

/// Só os nomes longos de [`GENERIC_NAMED_ENTITY_CLASSES`] são classes válidas.
fn class_name_regex() -> Regex {
    let names: Vec<&str> = GENERIC_NAMED_ENTITY_CLASSES.iter().map(|(_, name)| *name).collect();
    compile(&format!("^({})$", names.join("|")))
}

fn score_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compile(r"([01]\.[0-9]*)\s*$"))
}

fn list_separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compile(r"[,\t;]"))
}

/// Lista ordenada de chave → valores, sem valores repetidos por chave.
#[derive(Debug, Default)]
struct Grouped {
    entries: Vec<(String, Vec<String>)>,
}

impl Grouped {
    fn extend(&mut self, key: &str, values: impl IntoIterator<Item = String>) {
        let idx = match self.entries.iter().position(|(k, _)| k == key) {
            Some(idx) => idx,
            None => {
                self.entries.push((key.to_string(), Vec::new()));
                self.entries.len() - 1
            }
        };
        let slot = &mut self.entries[idx].1;
        for value in values {
            if !slot.contains(&value) {
                slot.push(value);
            }
        }
    }

    fn push(&mut self, key: &str, value: String) {
        self.extend(key, std::iter::once(value));
    }

    /// Como `extend`, mas aceita repetidos (scores e modelos andam em pares).
    fn append(&mut self, key: &str, values: impl IntoIterator<Item = String>) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => slot.extend(values),
            None => self.entries.push((key.to_string(), values.into_iter().collect())),
        }
    }

    fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }
}

/// Normaliza os atributos brutos de uma anotação.
pub fn normalize_attributes(raw: &AttributeMap) -> AttributeMap {
    let mut found = Grouped::default();

    // 1. Atributos brutos: decodifica e quebra listas
    for &name in RAW_ATTRIBUTES {
        if let Some(value) = raw.get(name) {
            found.extend(name, split_values(&decode(value)));
        }
    }
    // Chaves que já são semânticas passam direto (idempotência)
    for (key, value) in raw.iter() {
        if RAW_ATTRIBUTES.contains(&key) {
            continue;
        }
        match semantic_base(key) {
            Some(base @ (PROBABILITY_SCORE | PROBABILITY_MODEL)) => found.append(base, [value.to_string()]),
            Some(base) => found.push(base, value.to_string()),
            None => {}
        }
    }

    // 2. GeoNames
    if let Some(ids) = found.remove(GEONAMES_ID) {
        let uris = ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .map(|id| format!("{}/{}/", GEONAMES_URI_PREFIX, id));
        found.extend(URI, uris);
    }

    // 3. Scores de modelos ou classificação dos valores
    for name in [VALUE, IDENTIFIER] {
        let Some(values) = found.remove(name) else {
            continue;
        };
        let scoring = scoring_models_and_values(&values);
        if !scoring.is_empty() {
            for (score, model) in scoring {
                found.append(PROBABILITY_SCORE, [score]);
                found.append(PROBABILITY_MODEL, [model]);
            }
            continue;
        }
        for value in values {
            if let Some(key) = classify_value(&value) {
                let value = match key {
                    CLASS => generic_class_name(&value).unwrap_or_default().to_string(),
                    _ => value,
                };
                found.push(key, value);
            }
        }
    }

    let mut titles = found.remove(TARGET).unwrap_or_default();
    titles.extend(found.remove(WIKIPEDIA_TITLE).unwrap_or_default());

    // 4. Tabela de regras: a primeira regra que casar decide a chave
    let mut resolved = Grouped::default();
    for (name, values) in &found.entries {
        for rule in attribute_rules() {
            let accepted = rule.apply(name, values);
            if accepted.is_empty() {
                continue;
            }
            match rule.target {
                PROBABILITY_SCORE | PROBABILITY_MODEL => resolved.append(rule.target, accepted),
                target => resolved.extend(target, accepted),
            }
            break;
        }
    }

    // 5. Título da Wikipedia
    if !titles.is_empty() {
        resolved.extend(WIKIPEDIA_TITLE, titles);
    }

    // 6. pageId → apenas o sufixo
    if let Some((_, values)) = resolved.entries.iter_mut().find(|(k, _)| k == PAGE_ID) {
        for value in values.iter_mut() {
            *value = page_id_regex().replace(value, "$1").into_owned();
        }
    }

    // 7. Expande listas; as chaves indexadas vão para o fim, depois das simples
    let mut attributes = AttributeMap::new();
    let mut enumerated = Vec::new();
    for (key, values) in resolved.entries {
        match values.len() {
            0 => {}
            1 => attributes.insert(key, values.into_iter().next().unwrap_or_default()),
            _ => enumerated.push((key, values)),
        }
    }
    for (key, values) in enumerated {
        for (i, value) in values.into_iter().enumerate() {
            attributes.insert(format!("{}-{}", key, i), value);
        }
    }
    attributes
}

fn decode(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

/// Quebra listas (`a,b`, `a;b`, `a\tb`) quando contêm uma URI ou um `;`.
fn split_values(value: &str) -> Vec<String> {
    let is_uri_list = value.contains("://") && (value.contains(',') || value.contains('\t'));
    if is_uri_list || value.contains(';') {
        list_separator()
            .split(value)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        vec![value.to_string()]
    }
}

/// `wikidata-1` → `wikidata`; chaves fora do vocabulário → `None`.
fn semantic_base(key: &str) -> Option<&'static str> {
    if let Some(base) = SEMANTIC_VOCABULARY.iter().find(|k| **k == key) {
        return Some(*base);
    }
    let (base, suffix) = key.rsplit_once('-')?;
    if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    SEMANTIC_VOCABULARY.iter().find(|k| **k == base).copied()
}

/// Extrai pares (score, modelo) de uma lista como `["Flair", "score=0.91234"]`.
///
/// O modelo vem logo antes do score. Modelos marcados com `-REMOVED` são ignorados,
/// assim como scores fora do formato `score=0.1234`.
pub fn scoring_models_and_values(values: &[String]) -> Vec<(String, String)> {
    let mut scoring = Vec::new();
    for (i, element) in values.iter().enumerate() {
        if !element.contains(SCORE_MARKER) {
            continue;
        }
        let Some(model) = i.checked_sub(1).map(|prev| values[prev].as_str()) else {
            warn!("Score sem modelo correspondente: {:?}", element);
            continue;
        };
        if model.contains(REMOVED_MARKER) {
            continue;
        }
        match score_regex().captures(element).and_then(|c| c.get(1)) {
            Some(literal) => scoring.push((truncate_score(literal.as_str()), model.to_string())),
            None => warn!("Formato de score inesperado: {:?}", element),
        }
    }
    scoring
}

/// Trunca (sem arredondar) o score a quatro caracteres a partir do ponto decimal.
///
/// `0.91234` → `0.912`
pub fn truncate_score(literal: &str) -> String {
    match literal.find('.') {
        Some(dot) => literal.chars().take(dot + 4).collect(),
        None => literal.to_string(),
    }
}

fn classify_value(value: &str) -> Option<&'static str> {
    if value.contains("biofid.de/bio-ontologies") {
        Some(BIOFID_URI)
    } else if value.contains("wikidata.org") {
        Some(WIKIDATA)
    } else if value.contains("obolibrary.org") {
        Some(URI)
    } else if generic_class_name(value).is_some() {
        Some(CLASS)
    } else {
        None
    }
}

fn generic_class_name(code: &str) -> Option<&'static str> {
    let lower = code.to_lowercase();
    GENERIC_NAMED_ENTITY_CLASSES
        .iter()
        .find(|(short, _)| *short == lower)
        .map(|(_, long)| *long)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> AttributeMap {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_uri_list_is_classified() {
        let raw = attrs(&[(
            "value",
            "http://www.wikidata.org/entity/Q32473,https://www.biofid.de/bio-ontologies#GBIF_1900039",
        )]);
        let out = normalize_attributes(&raw);
        let pairs: Vec<(&str, &str)> = out.iter().collect();
        assert_eq!(
            pairs,
            vec![
                ("wikidata", "http://www.wikidata.org/entity/Q32473"),
                ("biofid-uri", "https://www.biofid.de/bio-ontologies#GBIF_1900039"),
            ]
        );
    }

    #[test]
    fn test_multiple_values_are_enumerated() {
        let raw = attrs(&[(
            "value",
            "http://www.wikidata.org/entity/Q286622,http://www.wikidata.org/entity/Q50754496,\
             https://www.biofid.de/bio-ontologies#GBIF_1909334",
        )]);
        let out = normalize_attributes(&raw);
        assert_eq!(out.get("biofid-uri"), Some("https://www.biofid.de/bio-ontologies#GBIF_1909334"));
        assert_eq!(out.get("wikidata-0"), Some("http://www.wikidata.org/entity/Q286622"));
        assert_eq!(out.get("wikidata-1"), Some("http://www.wikidata.org/entity/Q50754496"));
        assert!(!out.contains_key("wikidata"));

        // Chaves indexadas vão para o fim
        let keys: Vec<&str> = out.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["biofid-uri", "wikidata-0", "wikidata-1"]);
    }

    #[test]
    fn test_scalar_keys_precede_indexed_keys() {
        let raw = attrs(&[
            ("value", "Flair;score=0.91234;Spacy;score=0.5"),
            ("id", "6547483"),
            ("Target", "Eibe"),
        ]);
        let out = normalize_attributes(&raw);
        let keys: Vec<&str> = out.iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                "uri",
                "wikipedia-title",
                "probability-score-0",
                "probability-score-1",
                "probability-model-0",
                "probability-model-1",
            ]
        );
    }

    #[test]
    fn test_semantic_keys_with_raw_values_are_dropped() {
        let raw = attrs(&[("pageId", "42"), ("class", "x"), ("uri", "nothttp")]);
        let out = normalize_attributes(&raw);
        let pairs: Vec<(&str, &str)> = out.iter().collect();
        assert_eq!(pairs, vec![("pageId", "42")]);

        let out = normalize_attributes(&attrs(&[("pageId", "scans/page_0042"), ("class", "loc")]));
        assert!(out.is_empty());

        let out = normalize_attributes(&attrs(&[("class", "location_place")]));
        assert_eq!(out.get("class"), Some("location_place"));
    }

    #[test]
    fn test_percent_encoded_uri() {
        let raw = attrs(&[("value", "http%3A%2F%2Fwww.wikidata.org%2Fentity%2FQ1794")]);
        let out = normalize_attributes(&raw);
        assert_eq!(out.get("wikidata"), Some("http://www.wikidata.org/entity/Q1794"));
    }

    #[test]
    fn test_geonames_id_becomes_uri() {
        let raw = attrs(&[("id", "6547483")]);
        let out = normalize_attributes(&raw);
        assert_eq!(out.get("uri"), Some("https://sws.geonames.org/6547483/"));
        assert!(!out.contains_key("id"));
    }

    #[test]
    fn test_flair_score() {
        let raw = attrs(&[("value", "Flair;score=0.91234")]);
        let out = normalize_attributes(&raw);
        assert_eq!(out.get("probability-model"), Some("Flair"));
        assert_eq!(out.get("probability-score"), Some("0.912"));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_removed_model_yields_nothing() {
        let raw = attrs(&[("value", "Flair-REMOVED;score=0.5")]);
        let out = normalize_attributes(&raw);
        assert!(out.is_empty());
    }

    #[test]
    fn test_malformed_score_is_skipped() {
        let scoring = scoring_models_and_values(&["Flair".into(), "score=high".into()]);
        assert!(scoring.is_empty());
        let scoring = scoring_models_and_values(&["score=0.5".into()]);
        assert!(scoring.is_empty());
    }

    #[test]
    fn test_truncate_score() {
        assert_eq!(truncate_score("0.91234"), "0.912");
        assert_eq!(truncate_score("0.5"), "0.5");
        assert_eq!(truncate_score("1.0000"), "1.000");
    }

    #[test]
    fn test_class_codes() {
        let out = normalize_attributes(&attrs(&[("value", "LOC")]));
        assert_eq!(out.get("class"), Some("location_place"));
        let out = normalize_attributes(&attrs(&[("value", "per")]));
        assert_eq!(out.get("class"), Some("person_humanbeing"));
        let out = normalize_attributes(&attrs(&[("value", "something else")]));
        assert!(out.is_empty());
    }

    #[test]
    fn test_wikidata_id_and_title() {
        let raw = attrs(&[("WikiData", "Q1794"), ("Target", "Frankfurt_am_Main")]);
        let out = normalize_attributes(&raw);
        assert_eq!(out.get("wikidata-id"), Some("Q1794"));
        assert_eq!(out.get("wikipedia-title"), Some("Frankfurt_am_Main"));
        assert!(!out.contains_key("Target"));
    }

    #[test]
    fn test_page_id_is_reduced() {
        let out = normalize_attributes(&attrs(&[("pageId", "journal_1901_0042.xml")]));
        assert_eq!(out.get("pageId"), Some("0042"));
    }

    #[test]
    fn test_unknown_attributes_are_dropped() {
        let raw = attrs(&[
            ("{http://www.omg.org/XMI}id", "19"),
            ("sofa", "1"),
            ("begin", "0"),
            ("timexValue", "2020-01-01"),
            ("isInstance", "true"),
        ]);
        assert!(normalize_attributes(&raw).is_empty());
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let raw = attrs(&[
            (
                "value",
                "https://www.biofid.de/bio-ontologies#GBIF_1909334,\
                 http://www.wikidata.org/entity/Q286622,http://www.wikidata.org/entity/Q50754496",
            ),
            ("id", "6547483"),
            ("pageId", "journal_0042.xml"),
            ("Target", "Eibe"),
            ("WikiData", "Q286622"),
        ]);
        let once = normalize_attributes(&raw);
        let twice = normalize_attributes(&once);
        assert_eq!(once, twice);

        let scores = normalize_attributes(&attrs(&[("value", "Flair;score=0.91234;Spacy;score=0.5")]));
        assert_eq!(scores.get("probability-model-1"), Some("Spacy"));
        assert_eq!(normalize_attributes(&scores), scores);
    }
}
