//! # Resolução de Spans
//!
//! Decide, para cada posição do texto, quais anotações realmente viram tags. É aqui que
//! duplicatas são fundidas, ruído (`other`) é descartado e os links da Wikipedia doam
//! seus títulos às anotações vizinhas.
//!
//! ## Duas etapas
//!
//! | Etapa                           | Quando                    | Escopo                   |
//! |---------------------------------|---------------------------|--------------------------|
//! | [`remove_double_annotations`]   | uma vez, antes do render  | todos os ids de um span  |
//! | [`resolve_position`]            | a cada posição do render  | ids que abrem/fecham ali |
//!
//! Toda remoção passa por [`AnnotationIndex::remove`]: removida em uma posição, a
//! anotação some do documento inteiro (inclusive da sua outra ponta).
//!
//! ## Ordem das tags
//!
//! [`priority_key`] ordena as anotações de uma posição (menor renderiza primeiro).
//! O ajuste em milésimos sobre a posição é:
//!
//! | Caso                         | Ajuste |
//! |------------------------------|--------|
//! | fim de palavra               | 350    |
//! | largura zero                 | 325    |
//! | fim de página                | 250    |
//! | início de página             | 200    |
//! | fim de sentença              | 150    |
//! | início de sentença           | 100    |
//! | início de palavra            | 0      |
//!
//! Empates: aberturas com `end` maior abrem antes (envolvem as menores) e fechamentos
//! com `begin` maior fecham antes (são os mais internos).

use std::cmp::Reverse;
use std::collections::HashSet;

use tracing::debug;

use crate::annotation::{Annotation, AnnotationKind};
use crate::index::{AnnotationId, AnnotationIndex};
use crate::normalize::WIKIPEDIA_TITLE;

const NOISE_MARKER: &str = "other";

/// Chave de ordenação de uma anotação em uma posição.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PriorityKey {
    rank: i64,
    nesting: Reverse<usize>,
    id: String,
}

/// Calcula a chave de ordenação de `annotation` na posição `pos`.
pub fn priority_key(annotation: &Annotation, pos: usize) -> PriorityKey {
    let ends_here = annotation.end == pos;

    let mut modifier = match annotation.kind {
        AnnotationKind::Sentence => 100,
        AnnotationKind::Page => 200,
        _ if ends_here => 300,
        _ => 0,
    };
    if ends_here {
        modifier += 50;
    }
    if annotation.is_zero_width() {
        modifier -= 25;
    }

    let nesting = if annotation.begin == pos {
        annotation.end
    } else {
        annotation.begin
    };

    PriorityKey {
        rank: pos as i64 * 1000 - modifier,
        nesting: Reverse(nesting),
        id: annotation.id.clone(),
    }
}

/// Remove duplicatas dentro de cada span exato.
///
/// - Dois taxa de classes diferentes: fica o mais específico (flora/fauna > taxon).
/// - Mesmo nome: fica o que tem mais atributos (no empate, o segundo).
pub fn remove_double_annotations(index: &mut AnnotationIndex) {
    let spans: Vec<Vec<AnnotationId>> = index
        .spans()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(_, ids)| ids)
        .collect();

    for ids in spans {
        let mut removed: HashSet<AnnotationId> = HashSet::new();
        for (i, &first) in ids.iter().enumerate() {
            for &second in &ids[i + 1..] {
                if removed.contains(&first) || removed.contains(&second) {
                    continue;
                }
                let (Some(a1), Some(a2)) = (index.get(first), index.get(second)) else {
                    continue;
                };
                if let Some(loser) = duplicate_loser(a1, a2) {
                    removed.insert(if loser == 0 { first } else { second });
                }
            }
        }
        for id in removed {
            if let Some(annotation) = index.remove(id) {
                debug!(
                    "Anotação duplicada removida: {} ({}..{})",
                    annotation.name, annotation.begin, annotation.end
                );
            }
        }
    }
}

/// Qual das duas anotações (0 ou 1) deve sair, se alguma.
fn duplicate_loser(a1: &Annotation, a2: &Annotation) -> Option<usize> {
    if !a1.has_same_position(a2) {
        return None;
    }
    match (a1.kind.taxon_class(), a2.kind.taxon_class()) {
        (Some(c1), Some(c2)) if c1 != c2 => {
            return Some(if c1.priority() < c2.priority() { 1 } else { 0 });
        }
        _ => {}
    }
    if a1.name == a2.name {
        return Some(if a1.attributes.len() > a2.attributes.len() { 1 } else { 0 });
    }
    None
}

fn is_removal_candidate(annotation: &Annotation) -> bool {
    annotation.kind == AnnotationKind::WikipediaLink || annotation.name.contains(NOISE_MARKER)
}

/// Resolve as anotações que abrem ou fecham em `pos`.
///
/// Devolve os ids que devem ser renderizados (sem ordem definida; veja [`priority_key`]).
/// Anotações suprimidas são removidas do índice. Uma anotação que já abriu
/// (`begin < pos`) nunca é suprimida no seu fim, então toda tag aberta fecha.
pub fn resolve_position(
    index: &mut AnnotationIndex,
    pos: usize,
    entries: &[AnnotationId],
) -> Vec<AnnotationId> {
    let mut active: Vec<AnnotationId> = entries.iter().copied().filter(|id| index.contains(*id)).collect();
    if active.is_empty() {
        return Vec::new();
    }

    // 1. Ruído e doadores de título
    let mut remove: HashSet<AnnotationId> = HashSet::new();
    let mut donors: Vec<AnnotationId> = Vec::new();
    for &id in &active {
        let Some(annotation) = index.get(id) else { continue };
        if annotation.begin < pos || !is_removal_candidate(annotation) {
            continue;
        }
        remove.insert(id);
        if annotation.kind == AnnotationKind::WikipediaLink {
            donors.push(id);
        }
    }

    // 2. Anotação solitária
    if active.len() == 1 {
        if remove.is_empty() {
            return active;
        }
        discard(index, &remove);
        return Vec::new();
    }

    // 3. Pares com o mesmo nome
    let mut dropped_entries: HashSet<usize> = HashSet::new();
    for i in 0..active.len() {
        for j in i + 1..active.len() {
            if dropped_entries.contains(&j) {
                continue;
            }
            let (first, second) = (active[i], active[j]);
            let (Some(a), Some(b)) = (index.get(first), index.get(second)) else {
                continue;
            };
            if a.name != b.name || !a.attributes.equal_ignoring(&b.attributes, WIKIPEDIA_TITLE) {
                continue;
            }
            if first == second {
                // a mesma anotação de largura zero aparece duas vezes na posição
                dropped_entries.insert(j);
                mark_self_closing(index, first);
            } else if a.begin == pos && b.begin == pos {
                let zero_width_twin = a.is_zero_width() && a.id == b.id;
                remove.insert(second);
                if zero_width_twin {
                    mark_self_closing(index, first);
                }
            }
        }
    }
    active = active
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !dropped_entries.contains(i))
        .map(|(_, id)| id)
        .collect();

    // 4. Propaga o título da Wikipedia
    for donor in &donors {
        let Some(title) = index
            .get(*donor)
            .and_then(|d| d.attributes.get(WIKIPEDIA_TITLE))
            .map(str::to_string)
        else {
            continue;
        };
        for &id in &active {
            if id == *donor || remove.contains(&id) {
                continue;
            }
            if let Some(annotation) = index.get_mut(id) {
                if !annotation.kind.is_structural() {
                    annotation.attributes.insert(WIKIPEDIA_TITLE, title.as_str());
                }
            }
        }
    }

    // 5. Remoção global
    discard(index, &remove);
    active.retain(|id| !remove.contains(id));
    active
}

fn mark_self_closing(index: &mut AnnotationIndex, id: AnnotationId) {
    if let Some(annotation) = index.get_mut(id) {
        annotation.self_closing = true;
    }
}

fn discard(index: &mut AnnotationIndex, ids: &HashSet<AnnotationId>) {
    for id in ids {
        if let Some(annotation) = index.remove(*id) {
            debug!("Anotação suprimida: {} ({})", annotation.name, annotation.id);
        }
    }
}
