//! Override resolution between a shared profile and one context.
//!
//! A context's override Definition for a profile (the "shell") carries its
//! own metadata and roots, copied from the profile when the shell is
//! created, and a sparse registry. Each registry entry is either local
//! (`override_source` unset, the context owns it) or a placeholder deferred
//! to some profile. An id with no entry at all defers to the base profile.
//!
//! Reads go through [`ContextView`], which answers for deferred ids from
//! the owning profile and records what it had to look up. Writes go through
//! [`OverrideResolver::merge_for_write`], which makes the edited node local
//! first so the context owns exactly the nodes it has changed.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use crate::error::{PatchError, ReifyError};
use crate::patch::{patch, PipelineUpdate};
use crate::profile::{override_definition_id, Profile};
use crate::reify::NodeSource;
use crate::selection::{Definition, PipelineActionNode, Selection};
use crate::template::TemplateCatalog;
use crate::types::{ActionId, ContextId, ProfileId, Target};

// ---------------------------------------------------------------------------
// OverrideResolver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct OverrideResolver<'a> {
    base: &'a Profile,
    others: &'a [Profile],
    catalog: &'a TemplateCatalog,
}

impl<'a> OverrideResolver<'a> {
    pub fn new(base: &'a Profile, catalog: &'a TemplateCatalog) -> Self {
        Self {
            base,
            others: &[],
            catalog,
        }
    }

    /// Profiles other than the base that override entries may defer to.
    pub fn with_profiles(mut self, others: &'a [Profile]) -> Self {
        self.others = others;
        self
    }

    /// An empty override for `context`: the base's metadata and roots, no
    /// local nodes.
    pub fn new_shell(&self, context: &ContextId) -> Definition {
        let base = &self.base.definition;
        Definition {
            id: override_definition_id(context, &self.base.id),
            name: base.name.clone(),
            description: base.description.clone(),
            tags: base.tags.clone(),
            template: base.template.clone(),
            targets: base.targets.clone(),
            nodes: Default::default(),
        }
    }

    pub fn view(&self, shell: Definition) -> ContextView<'a> {
        ContextView {
            resolver: *self,
            shell: RefCell::new(shell),
            grew: Cell::new(false),
        }
    }

    /// Apply `update` to the context's shell.
    ///
    /// An update aimed at one node first makes that node local, copying its
    /// current value, then patches the copy. The base profile is never
    /// touched. Updates without a node act on the shell itself.
    pub fn merge_for_write(
        &self,
        shell: &Definition,
        update: &PipelineUpdate,
    ) -> Result<Definition, PatchError> {
        match update.target_node() {
            Some(id) => {
                let materialized = self.materialize(shell, id)?;
                patch(&materialized, update)
            }
            None => match update {
                PipelineUpdate::AddTopLevelGroup { .. }
                | PipelineUpdate::RemoveTopLevelGroup { .. } => {
                    let hydrated = self.hydrate(shell);
                    let mut next = patch(&hydrated, update)?;
                    // Placeholders the update left untouched go back to
                    // being implicit.
                    next.nodes.retain(|id, node| {
                        shell.nodes.contains_key(id)
                            || !hydrated.node(id).is_some_and(|h| Arc::ptr_eq(h, node))
                    });
                    Ok(next)
                }
                _ => patch(shell, update),
            },
        }
    }

    /// Make `id` local in the shell, leaving every other entry alone.
    pub fn materialize(&self, shell: &Definition, id: &ActionId) -> Result<Definition, PatchError> {
        if shell.node(id).is_some_and(|n| !n.is_deferred()) {
            return Ok(shell.clone());
        }
        if !self.knows(shell, id) {
            return Err(PatchError::NodeNotFound(id.clone()));
        }

        let view = self.view(shell.clone());
        let current = view.node(id).map_err(|e| PatchError::Materialize {
            id: id.clone(),
            reason: e.to_string(),
        })?;
        let (mut next, _) = view.into_parts();

        let mut local = current.as_ref().clone();
        local.override_source = None;
        next.nodes.insert(id.clone(), Arc::new(local));
        tracing::debug!(shell = %next.id, node = %id, "materialized node locally");
        Ok(next)
    }

    /// Give up the context's own value for `id`, or its deferral to another
    /// profile, and defer to the base again. Only that entry changes.
    pub fn revert_to_default(&self, shell: &Definition, id: &ActionId) -> Definition {
        let mut next = shell.clone();
        match shell.node(id) {
            None => return next,
            Some(n) if n.override_source.as_ref() == Some(&self.base.id) => return next,
            Some(_) => {}
        }
        match self.base.definition.node(id) {
            Some(base_node) if !base_node.is_deferred() => {
                next.nodes.insert(
                    id.clone(),
                    Arc::new(base_node.deferred_to(self.base.id.clone())),
                );
            }
            _ => {
                next.nodes.remove(id);
            }
        }
        tracing::debug!(shell = %next.id, node = %id, "reverted node to default");
        next
    }

    fn knows(&self, shell: &Definition, id: &ActionId) -> bool {
        shell.node(id).is_some()
            || self.base.definition.node(id).is_some()
            || self.template_default(shell, id).is_some()
    }

    fn template_default(&self, shell: &Definition, id: &ActionId) -> Option<PipelineActionNode> {
        let template = shell
            .template
            .as_ref()
            .or(self.base.definition.template.as_ref())?;
        self.catalog.default_node(template, id)
    }

    fn source_definition(&self, source: &ProfileId) -> Option<&'a Definition> {
        if *source == self.base.id {
            return Some(&self.base.definition);
        }
        self.others
            .iter()
            .find(|p| p.id == *source)
            .map(|p| &p.definition)
    }

    /// Placeholders for every base node the shell has no entry for, so
    /// structural updates are checked against the whole effective registry.
    fn hydrate(&self, shell: &Definition) -> Definition {
        let mut next = shell.clone();
        for (id, node) in &self.base.definition.nodes {
            if !next.nodes.contains_key(id) && !node.is_deferred() {
                next.nodes
                    .insert(id.clone(), Arc::new(node.deferred_to(self.base.id.clone())));
            }
        }
        next
    }
}

// ---------------------------------------------------------------------------
// ContextView
// ---------------------------------------------------------------------------

/// A context's effective Definition for reading.
///
/// Looking up an id with no entry records a placeholder for it, and an id
/// whose source no longer has it is filled from the template and recorded
/// as local. Reads can therefore grow the shell; callers persist it when
/// [`ContextView::into_parts`] reports growth.
pub struct ContextView<'a> {
    resolver: OverrideResolver<'a>,
    shell: RefCell<Definition>,
    grew: Cell<bool>,
}

impl ContextView<'_> {
    /// The shell as it stands after the reads so far, and whether it grew.
    pub fn into_parts(self) -> (Definition, bool) {
        (self.shell.into_inner(), self.grew.get())
    }

    fn record(&self, node: Arc<PipelineActionNode>) {
        self.shell
            .borrow_mut()
            .nodes
            .insert(node.id.clone(), node);
        self.grew.set(true);
    }

    fn fetch(
        &self,
        id: &ActionId,
        source: &ProfileId,
        record_placeholder: bool,
    ) -> Result<Arc<PipelineActionNode>, ReifyError> {
        let missing = || ReifyError::DeferredSourceMissing {
            id: id.clone(),
            source_ref: source.to_string(),
        };
        let definition = self.resolver.source_definition(source).ok_or_else(missing)?;

        match definition.node(id) {
            Some(node) if !node.is_deferred() => {
                if record_placeholder {
                    self.record(Arc::new(node.deferred_to(source.clone())));
                }
                Ok(Arc::clone(node))
            }
            // Deferral is followed one hop only.
            Some(_) => Err(missing()),
            None => {
                let synthesized = {
                    let shell = self.shell.borrow();
                    self.resolver.template_default(&shell, id)
                };
                let node = Arc::new(synthesized.ok_or_else(missing)?);
                tracing::debug!(node = %id, source = %source, "synthesized first-use default");
                self.record(Arc::clone(&node));
                Ok(node)
            }
        }
    }
}

impl NodeSource for ContextView<'_> {
    fn root(&self, target: Target) -> Option<Selection> {
        self.shell.borrow().root(target).cloned()
    }

    fn node(&self, id: &ActionId) -> Result<Arc<PipelineActionNode>, ReifyError> {
        let entry = self.shell.borrow().node(id).cloned();
        match entry {
            Some(node) => match &node.override_source {
                None => Ok(node),
                Some(source) => self.fetch(id, source, false),
            },
            None => self.fetch(id, &self.resolver.base.id, true),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
