//! The Patch Engine: one typed mutation in, a new Definition out.
//!
//! `patch` never mutates its input. The returned Definition shares every
//! untouched node with the input (same `Arc`), so a reader holding the old
//! Definition keeps a consistent view while an edit is in flight.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::action::ActionValue;
use crate::error::PatchError;
use crate::selection::{Definition, PipelineActionNode, Selection};
use crate::types::{ActionId, CollectionId, Enablement, ProfileId, Target};

// ---------------------------------------------------------------------------
// PipelineUpdate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PipelineUpdate {
    /// Stored on toggleable nodes; accepted and ignored on always-on ones.
    SetEnabled { id: ActionId, enabled: bool },
    ChooseOneOf { id: ActionId, chosen: ActionId },
    /// Swap a leaf's payload. The node keeps its id and everything else.
    ReplaceLeaf { id: ActionId, value: ActionValue },
    /// `Some` defers the node to that profile, `None` makes it local.
    SetOverrideSource {
        id: ActionId,
        source: Option<ProfileId>,
    },
    SetQuickAccess { id: ActionId, quick_access: bool },
    /// Register `node` (and any new nodes it refers to) and append it to
    /// the AllOf root of each listed target.
    AddTopLevelGroup {
        node: PipelineActionNode,
        #[serde(default)]
        descendants: Vec<PipelineActionNode>,
        targets: Vec<Target>,
    },
    RemoveTopLevelGroup { id: ActionId },
    /// Absent fields are left untouched; `Some("")` clears.
    SetMetadata {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        tags: Option<BTreeSet<CollectionId>>,
    },
}

impl PipelineUpdate {
    pub fn op_name(&self) -> &'static str {
        match self {
            PipelineUpdate::SetEnabled { .. } => "set_enabled",
            PipelineUpdate::ChooseOneOf { .. } => "choose_one_of",
            PipelineUpdate::ReplaceLeaf { .. } => "replace_leaf",
            PipelineUpdate::SetOverrideSource { .. } => "set_override_source",
            PipelineUpdate::SetQuickAccess { .. } => "set_quick_access",
            PipelineUpdate::AddTopLevelGroup { .. } => "add_top_level_group",
            PipelineUpdate::RemoveTopLevelGroup { .. } => "remove_top_level_group",
            PipelineUpdate::SetMetadata { .. } => "set_metadata",
        }
    }

    /// The single existing node this update edits. Structural and metadata
    /// updates have none; they act on the Definition shell.
    pub fn target_node(&self) -> Option<&ActionId> {
        match self {
            PipelineUpdate::SetEnabled { id, .. }
            | PipelineUpdate::ChooseOneOf { id, .. }
            | PipelineUpdate::ReplaceLeaf { id, .. }
            | PipelineUpdate::SetOverrideSource { id, .. }
            | PipelineUpdate::SetQuickAccess { id, .. } => Some(id),
            PipelineUpdate::AddTopLevelGroup { .. }
            | PipelineUpdate::RemoveTopLevelGroup { .. }
            | PipelineUpdate::SetMetadata { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// patch
// ---------------------------------------------------------------------------

pub fn patch(definition: &Definition, update: &PipelineUpdate) -> Result<Definition, PatchError> {
    let mut next = definition.clone();

    match update {
        PipelineUpdate::SetEnabled { id, enabled } => {
            let node = existing(definition, id)?;
            if node.enabled.is_toggleable() {
                let enabled = if *enabled {
                    Enablement::On
                } else {
                    Enablement::Off
                };
                if node.enabled != enabled {
                    replace(&mut next, node, |n| n.enabled = enabled);
                }
            }
        }

        PipelineUpdate::ChooseOneOf { id, chosen } => {
            let node = existing(definition, id)?;
            match &node.selection {
                Selection::OneOf { alternatives, .. } => {
                    if !alternatives.contains(chosen) {
                        return Err(PatchError::AlternativeNotFound {
                            node: id.clone(),
                            chosen: chosen.clone(),
                        });
                    }
                    let alternatives = alternatives.clone();
                    replace(&mut next, node, |n| {
                        n.selection = Selection::OneOf {
                            chosen: chosen.clone(),
                            alternatives,
                        }
                    });
                }
                other => return Err(wrong_kind(id, "a one-of group", other)),
            }
        }

        PipelineUpdate::ReplaceLeaf { id, value } => {
            let node = existing(definition, id)?;
            match &node.selection {
                Selection::Leaf(_) => {
                    replace(&mut next, node, |n| n.selection = Selection::Leaf(value.clone()))
                }
                other => return Err(wrong_kind(id, "a leaf", other)),
            }
        }

        PipelineUpdate::SetOverrideSource { id, source } => {
            let node = existing(definition, id)?;
            replace(&mut next, node, |n| n.override_source = source.clone());
        }

        PipelineUpdate::SetQuickAccess { id, quick_access } => {
            let node = existing(definition, id)?;
            replace(&mut next, node, |n| n.quick_access = *quick_access);
        }

        PipelineUpdate::AddTopLevelGroup {
            node,
            descendants,
            targets,
        } => add_group(&mut next, node, descendants, targets)?,

        PipelineUpdate::RemoveTopLevelGroup { id } => remove_group(&mut next, id)?,

        PipelineUpdate::SetMetadata {
            name,
            description,
            tags,
        } => {
            if let Some(name) = name {
                next.name = name.clone();
            }
            if let Some(description) = description {
                next.description = description.clone();
            }
            if let Some(tags) = tags {
                next.tags = tags.clone();
            }
        }
    }

    tracing::debug!(definition = %definition.id, op = update.op_name(), "applied patch");
    Ok(next)
}

fn existing<'d>(
    definition: &'d Definition,
    id: &ActionId,
) -> Result<&'d Arc<PipelineActionNode>, PatchError> {
    definition
        .node(id)
        .ok_or_else(|| PatchError::NodeNotFound(id.clone()))
}

/// Put a modified copy of `node` in `next`; the original stays untouched.
fn replace(
    next: &mut Definition,
    node: &PipelineActionNode,
    edit: impl FnOnce(&mut PipelineActionNode),
) {
    let mut copy = node.clone();
    edit(&mut copy);
    next.nodes.insert(copy.id.clone(), Arc::new(copy));
}

fn wrong_kind(id: &ActionId, expected: &'static str, found: &Selection) -> PatchError {
    PatchError::InvalidSelectionType {
        id: id.clone(),
        expected,
        found: found.kind_name(),
    }
}

fn add_group(
    next: &mut Definition,
    node: &PipelineActionNode,
    descendants: &[PipelineActionNode],
    targets: &[Target],
) -> Result<(), PatchError> {
    let incoming: Vec<&PipelineActionNode> =
        std::iter::once(node).chain(descendants.iter()).collect();

    let mut new_ids = BTreeSet::new();
    for n in &incoming {
        if next.nodes.contains_key(&n.id) || !new_ids.insert(n.id.clone()) {
            return Err(PatchError::NodeExists(n.id.clone()));
        }
    }
    for n in &incoming {
        for child in n.selection.children() {
            if !next.nodes.contains_key(child) && !new_ids.contains(child) {
                return Err(PatchError::DanglingReference {
                    from: n.id.clone(),
                    to: child.clone(),
                });
            }
        }
    }

    for target in targets {
        match next.targets.get(target) {
            None | Some(Selection::AllOf { .. }) => {}
            Some(_) => return Err(PatchError::InvalidRoot(target.to_string())),
        }
    }

    for n in incoming {
        next.nodes.insert(n.id.clone(), Arc::new(n.clone()));
    }
    for target in targets {
        let root = next
            .targets
            .entry(*target)
            .or_insert_with(|| Selection::AllOf {
                members: Vec::new(),
            });
        if let Selection::AllOf { members } = root {
            if !members.contains(&node.id) {
                members.push(node.id.clone());
            }
        }
    }

    if let Some(id) = next.find_cycle() {
        return Err(PatchError::Cycle(id));
    }
    Ok(())
}

fn remove_group(next: &mut Definition, id: &ActionId) -> Result<(), PatchError> {
    if !next.nodes.contains_key(id) {
        return Err(PatchError::NodeNotFound(id.clone()));
    }

    let mut referenced_by = next.referrers(id);
    for (target, root) in &next.targets {
        if matches!(root, Selection::OneOf { .. }) && root.refers_to(id) {
            referenced_by.push(ActionId::root(*target));
        }
    }
    if !referenced_by.is_empty() {
        return Err(PatchError::NodeInUse {
            id: id.clone(),
            referenced_by,
        });
    }

    for root in next.targets.values_mut() {
        if let Selection::AllOf { members } = root {
            members.retain(|m| m != id);
        }
    }
    // Descendants stay registered; they may be re-attached by a later add.
    next.nodes.remove(id);
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
