//! # Renderização da Marcação
//!
//! Percorre o texto caractere a caractere. Em cada posição consulta o
//! [`resolver`](crate::resolver), ordena as anotações sobreviventes por
//! [`priority_key`] e emite as tags antes do caractere (escapado para HTML).
//!
//! ```text
//! <sentence class="sentence" id="19">I found <em class="taxon" id="652a3cabc6" ...>Fagus sylvatica</em> ...
//! ```
//!
//! - Sentenças e páginas usam o próprio nome e o id original.
//! - As demais anotações viram `<em>` com um id curto: os 10 primeiros hexadecimais do
//!   MD5 do id original.
//! - Tags que ainda estiverem abertas no fim do texto são fechadas em ordem inversa.

use std::fmt::Write;

use md5::{Digest, Md5};
use tracing::debug;

use crate::annotation::Annotation;
use crate::index::{AnnotationId, AnnotationIndex};
use crate::normalize::CLASS;
use crate::resolver::{priority_key, resolve_position};

/// Nomes de anotação que nunca geram tags.
pub const EXCLUDED_TAG_NAMES: &[&str] = &["quicktreenode"];

/// Elemento genérico usado por anotações não estruturais.
const INLINE_ELEMENT: &str = "em";

/// Gera o texto anotado. O índice sai mutado (supressões e `self_closing`).
pub fn annotate_text(text: &str, index: &mut AnnotationIndex) -> String {
    let view = index.positions();
    let mut output = String::with_capacity(text.len() * 2);
    let mut open: Vec<AnnotationId> = Vec::new();

    let mut chars = text.chars();
    let mut pos = 0;
    loop {
        if let Some(entries) = view.get(&pos) {
            let mut rendered = resolve_position(index, pos, entries);
            rendered.sort_by_cached_key(|id| index.get(*id).map(|a| priority_key(a, pos)));

            for id in rendered {
                let Some(annotation) = index.get(id) else { continue };
                if EXCLUDED_TAG_NAMES.contains(&annotation.name.as_str()) {
                    continue;
                }
                if annotation.begin == pos {
                    output.push_str(&start_tag(annotation));
                    if !annotation.self_closing {
                        open.push(id);
                    }
                } else if let Some(idx) = open.iter().rposition(|o| *o == id) {
                    output.push_str(&end_tag(annotation));
                    open.remove(idx);
                } else {
                    debug!("Fim sem abertura ignorado: {} ({})", annotation.name, annotation.id);
                }
            }
        }

        match chars.next() {
            Some(c) => push_escaped(&mut output, c),
            None => break,
        }
        pos += 1;
    }

    // Fecha tudo que sobrou (ex: uma página que termina além do texto)
    while let Some(id) = open.pop() {
        if let Some(annotation) = index.get(id) {
            output.push_str(&end_tag(annotation));
        }
    }

    output
}

/// Tag de abertura: `<nome class=".." id=".." attr="..">` (ou `/>`).
pub fn start_tag(annotation: &Annotation) -> String {
    let structural = annotation.kind.is_structural();
    let element = if structural {
        annotation.name.as_str()
    } else {
        INLINE_ELEMENT
    };

    let mut tag = format!("<{}", element);
    if !annotation.attributes.contains_key(CLASS) {
        let _ = write!(tag, " class=\"{}\"", annotation.name);
    }

    let id = if structural {
        annotation.id.clone()
    } else {
        short_id(&annotation.id)
    };
    let _ = write!(tag, " id=\"{}\"", id);

    for (key, value) in annotation.attributes.iter() {
        let _ = write!(tag, " {}=\"{}\"", key, escape(value));
    }

    if annotation.self_closing {
        tag.push('/');
    }
    tag.push('>');
    tag
}

pub fn end_tag(annotation: &Annotation) -> String {
    if annotation.kind.is_structural() {
        format!("</{}>", annotation.name)
    } else {
        format!("</{}>", INLINE_ELEMENT)
    }
}

/// Os 10 primeiros caracteres hexadecimais do MD5 do id.
pub fn short_id(id: &str) -> String {
    let digest = Md5::digest(id.as_bytes());
    let mut hex = String::with_capacity(32);
    for byte in digest.iter() {
        let _ = write!(hex, "{:02x}", byte);
    }
    hex.truncate(10);
    hex
}

fn push_escaped(output: &mut String, c: char) {
    match c {
        '&' => output.push_str("&amp;"),
        '<' => output.push_str("&lt;"),
        '>' => output.push_str("&gt;"),
        '"' => output.push_str("&quot;"),
        '\'' => output.push_str("&#x27;"),
        _ => output.push(c),
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        push_escaped(&mut escaped, c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AttributeMap, OCR_NS, SEGMENTATION_NS, TYPE_NS};

    fn ann(id: &str, begin: usize, end: usize, ns: &str, local: &str, attrs: &[(&str, &str)]) -> Annotation {
        let attributes: AttributeMap = attrs.iter().map(|(k, v)| (*k, *v)).collect();
        Annotation::new(id, begin, end, ns, local, attributes)
    }

    #[test]
    fn test_short_id_matches_md5_prefix() {
        assert_eq!(short_id("232291"), "652a3cabc6");
        assert_eq!(short_id("232300"), "cc95270887");
        assert_eq!(short_id("232305"), "7982b06819");
    }

    #[test]
    fn test_start_tag_variants() {
        let sentence = ann("19", 0, 5, SEGMENTATION_NS, "Sentence", &[]);
        assert_eq!(start_tag(&sentence), r#"<sentence class="sentence" id="19">"#);
        assert_eq!(end_tag(&sentence), "</sentence>");

        let place = ann("232305", 0, 5, TYPE_NS, "Location_Place", &[("wikidata", "Q1794")]);
        assert_eq!(
            start_tag(&place),
            r#"<em class="location_place" id="7982b06819" wikidata="Q1794">"#
        );
        assert_eq!(end_tag(&place), "</em>");

        let mut classified = ann("232305", 0, 5, TYPE_NS, "NamedEntity", &[("class", "location_place")]);
        classified.self_closing = true;
        assert_eq!(
            start_tag(&classified),
            r#"<em id="7982b06819" class="location_place"/>"#
        );
    }

    #[test]
    fn test_text_is_escaped() {
        let mut index = AnnotationIndex::new();
        assert_eq!(annotate_text("a < b & \"c\"", &mut index), "a &lt; b &amp; &quot;c&quot;");
    }

    #[test]
    fn test_nested_tags_close_in_order() {
        let mut index = AnnotationIndex::new();
        index.add(ann("s", 0, 9, SEGMENTATION_NS, "Sentence", &[]));
        index.add(ann("t", 0, 5, TYPE_NS, "Taxon", &[]));

        let out = annotate_text("Fagus sp.", &mut index);
        assert_eq!(
            out,
            format!(
                r#"<sentence class="sentence" id="s"><em class="taxon" id="{}">Fagus</em> sp.</sentence>"#,
                short_id("t")
            )
        );
    }

    #[test]
    fn test_unclosed_page_is_closed_at_the_end() {
        let mut index = AnnotationIndex::new();
        index.add(ann("p1", 0, 40, OCR_NS, "OCRPage", &[("pageId", "0042")]));

        let out = annotate_text("abc", &mut index);
        assert_eq!(out, r#"<ocrpage class="ocrpage" id="p1" pageId="0042">abc</ocrpage>"#);
    }

    #[test]
    fn test_zero_width_marker_is_self_closed() {
        let mut index = AnnotationIndex::new();
        index.add(ann("z", 2, 2, TYPE_NS, "Taxon", &[]));

        let out = annotate_text("abcd", &mut index);
        assert_eq!(out, format!(r#"ab<em class="taxon" id="{}"/>cd"#, short_id("z")));
    }

    #[test]
    fn test_excluded_names_render_nothing() {
        let mut index = AnnotationIndex::new();
        index.add(ann("q", 0, 2, TYPE_NS, "QuickTreeNode", &[]));
        assert_eq!(annotate_text("abcd", &mut index), "abcd");
    }

    #[test]
    fn test_every_opened_tag_closes() {
        let mut index = AnnotationIndex::new();
        index.add(ann("1", 0, 4, TYPE_NS, "Taxon", &[]));
        index.add(ann("2", 0, 4, TYPE_NS, "Location_Place", &[]));
        index.add(ann("3", 2, 4, TYPE_NS, "Person_HumanBeing", &[]));
        index.add(ann("4", 4, 4, TYPE_NS, "Timex", &[]));

        let out = annotate_text("abcd", &mut index);
        assert_eq!(out.matches("<em").count(), 4);
        assert_eq!(out.matches("</em>").count(), 3);
        assert_eq!(out.matches("/>").count(), 1);
    }
}
