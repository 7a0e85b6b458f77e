//! Authoritative annotation collection with built-in undo history.
//!
//! Every mutation goes through [`AnnotationStore::apply`], which records the
//! pre-mutation snapshot before committing. There is no other way to change
//! the collection except installing a snapshot via undo/redo or restoring a
//! persisted session (which also resets history).

use std::collections::HashSet;
use std::sync::Arc;

use crate::annotation::{Annotation, AnnotationDraft, AnnotationId, AnnotationPatch};
use crate::history::History;

/// Immutable full copy of the annotation collection.
pub type Snapshot = Arc<[Annotation]>;

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Create(AnnotationDraft),
    Update { id: AnnotationId, patch: AnnotationPatch },
    Delete { id: AnnotationId },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    Created(Annotation),
    Updated(Annotation),
    Deleted(Annotation),
    /// The target id was not in the store; nothing changed and no history
    /// entry was recorded.
    Missing(AnnotationId),
}

impl MutationOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, MutationOutcome::Missing(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryStep {
    Applied,
    NothingToUndo,
    NothingToRedo,
}

#[derive(Debug, Clone)]
pub struct AnnotationStore {
    /// Insertion order is z-order.
    annotations: Vec<Annotation>,
    history: History<Snapshot>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::with_history_depth(crate::history::HISTORY_DEPTH)
    }

    pub fn with_history_depth(depth: usize) -> Self {
        Self { annotations: Vec::new(), history: History::with_depth(depth) }
    }

    /// Replace the collection with previously persisted annotations and drop
    /// any history. Later duplicates of an id are discarded.
    pub fn restore(&mut self, annotations: Vec<Annotation>) {
        let mut seen = HashSet::with_capacity(annotations.len());
        self.annotations = annotations
            .into_iter()
            .filter(|annotation| {
                let fresh = seen.insert(annotation.id);
                if !fresh {
                    log::warn!("Dropping restored annotation with duplicate id {}", annotation.id);
                }
                fresh
            })
            .collect();
        self.history.clear();
    }

    /// Single entry point for mutations: snapshot, then apply.
    pub fn apply(&mut self, mutation: Mutation) -> MutationOutcome {
        match mutation {
            Mutation::Create(draft) => MutationOutcome::Created(self.insert(draft)),
            Mutation::Update { id, patch } => {
                let Some(index) = self.position(id) else {
                    log::debug!("Ignoring update for missing annotation {id}");
                    return MutationOutcome::Missing(id);
                };
                self.record();
                let annotation = &mut self.annotations[index];
                patch.apply_to(annotation);
                MutationOutcome::Updated(annotation.clone())
            }
            Mutation::Delete { id } => {
                let Some(index) = self.position(id) else {
                    log::debug!("Ignoring delete for missing annotation {id}");
                    return MutationOutcome::Missing(id);
                };
                self.record();
                MutationOutcome::Deleted(self.annotations.remove(index))
            }
        }
    }

    pub fn create(&mut self, draft: AnnotationDraft) -> Annotation {
        self.insert(draft)
    }

    /// Returns `false` when `id` is absent, which is not an error.
    pub fn update(&mut self, id: AnnotationId, patch: AnnotationPatch) -> bool {
        self.apply(Mutation::Update { id, patch }).changed()
    }

    pub fn delete(&mut self, id: AnnotationId) -> Option<Annotation> {
        match self.apply(Mutation::Delete { id }) {
            MutationOutcome::Deleted(annotation) => Some(annotation),
            _ => None,
        }
    }

    pub fn undo(&mut self) -> HistoryStep {
        match self.history.undo(self.snapshot()) {
            Some(previous) => {
                self.install(previous);
                HistoryStep::Applied
            }
            None => HistoryStep::NothingToUndo,
        }
    }

    pub fn redo(&mut self) -> HistoryStep {
        match self.history.redo(self.snapshot()) {
            Some(next) => {
                self.install(next);
                HistoryStep::Applied
            }
            None => HistoryStep::NothingToRedo,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|annotation| annotation.id == id)
    }

    /// Annotations on `page` in creation order.
    pub fn list_by_page(&self, page: u32) -> Vec<&Annotation> {
        self.annotations.iter().filter(|annotation| annotation.page == page).collect()
    }

    pub fn all(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn snapshot(&self) -> Snapshot {
        Arc::from(self.annotations.as_slice())
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    fn insert(&mut self, draft: AnnotationDraft) -> Annotation {
        self.record();
        let annotation = draft.into_annotation(self.fresh_id());
        self.annotations.push(annotation.clone());
        log::debug!("Created annotation {} on page {}", annotation.id, annotation.page);
        annotation
    }

    fn record(&mut self) {
        let snapshot = self.snapshot();
        self.history.record_before_mutation(snapshot);
    }

    fn install(&mut self, snapshot: Snapshot) {
        self.annotations = snapshot.to_vec();
    }

    fn position(&self, id: AnnotationId) -> Option<usize> {
        self.annotations.iter().position(|annotation| annotation.id == id)
    }

    // Restored sessions can carry arbitrary ids.
    fn fresh_id(&self) -> AnnotationId {
        loop {
            let id = AnnotationId::new_v4();
            if self.position(id).is_none() {
                return id;
            }
        }
    }
}

impl Default for AnnotationStore {
    fn default() -> Self {
        Self::new()
    }
}
