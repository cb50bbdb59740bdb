//! # Índice de Anotações
//!
//! Dono de todas as [`Annotation`]s de um documento. As anotações vivem em uma
//! **arena** (`Vec<Option<Annotation>>`) e são referenciadas por [`AnnotationId`];
//! spans e a visão por posição guardam apenas ids.
//!
//! ## Visões
//!
//! - **Por span**: `(begin, end)` → conjunto de ids que cobrem exatamente aquele trecho.
//! - **Por posição** ([`AnnotationIndex::positions`]): posição → ids com `begin` ou `end`
//!   naquela posição. Uma anotação aparece nas duas pontas (e duas vezes na mesma posição
//!   quando tem largura zero).
//!
//! Remover uma anotação esvazia o slot da arena e a tira do seu span; ids que sobraram
//! em uma visão por posição já calculada passam a ser ignorados por [`AnnotationIndex::get`].

use std::collections::{BTreeMap, BTreeSet};

use crate::annotation::Annotation;

/// Índice estável de uma anotação na arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnotationId(usize);

impl AnnotationId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Visão derivada: posição no texto → anotações que abrem ou fecham ali.
pub type PositionView = BTreeMap<usize, Vec<AnnotationId>>;

#[derive(Debug, Default, Clone)]
pub struct AnnotationIndex {
    arena: Vec<Option<Annotation>>,
    spans: BTreeMap<(usize, usize), BTreeSet<AnnotationId>>,
    live: usize,
}

impl AnnotationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adiciona uma anotação ao span `(begin, end)` correspondente.
    pub fn add(&mut self, annotation: Annotation) -> AnnotationId {
        let id = AnnotationId(self.arena.len());
        self.spans
            .entry((annotation.begin, annotation.end))
            .or_default()
            .insert(id);
        self.arena.push(Some(annotation));
        self.live += 1;
        id
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.arena.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: AnnotationId) -> Option<&mut Annotation> {
        self.arena.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: AnnotationId) -> bool {
        self.get(id).is_some()
    }

    /// Remoção autoritativa: some de todas as visões de uma vez.
    pub fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        let annotation = self.arena.get_mut(id.0)?.take()?;
        let key = (annotation.begin, annotation.end);
        if let Some(set) = self.spans.get_mut(&key) {
            set.remove(&id);
            if set.is_empty() {
                self.spans.remove(&key);
            }
        }
        self.live -= 1;
        Some(annotation)
    }

    /// Número de anotações vivas.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn span_count(&self) -> usize {
        self.spans.len()
    }

    /// Ids que cobrem exatamente o span `(begin, end)`.
    pub fn span(&self, begin: usize, end: usize) -> Vec<AnnotationId> {
        self.spans
            .get(&(begin, end))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Todos os spans com seus ids (ordenados por begin, end).
    pub fn spans(&self) -> impl Iterator<Item = ((usize, usize), Vec<AnnotationId>)> + '_ {
        self.spans
            .iter()
            .map(|(key, set)| (*key, set.iter().copied().collect()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (AnnotationId, &Annotation)> {
        self.arena
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|a| (AnnotationId(i), a)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Annotation> {
        self.arena.iter_mut().filter_map(Option::as_mut)
    }

    /// Calcula a visão por posição a partir dos spans atuais.
    pub fn positions(&self) -> PositionView {
        let mut view = PositionView::new();
        for (&(begin, end), ids) in &self.spans {
            view.entry(begin).or_default().extend(ids.iter().copied());
            view.entry(end).or_default().extend(ids.iter().copied());
        }
        view
    }
}
