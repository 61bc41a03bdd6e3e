//! The selection tree: how actions are picked and configured.
//!
//! A [`Definition`] owns every node in `nodes` (the registry). Per-target
//! roots and `OneOf`/`AllOf` selections refer to nodes by id only, so a node
//! shared by both targets is stored once and an edit to it is seen by every
//! target that uses it.
//!
//! Nodes are held behind `Arc`. Cloning a Definition copies the registry's
//! pointers, not the nodes; the patch engine swaps in a fresh `Arc` for the
//! one node it changes and everything else stays shared with the input.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::action::ActionValue;
use crate::error::ReifyError;
use crate::types::{ActionId, CollectionId, DefinitionId, Enablement, ProfileId, Target, TemplateId};

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Selection {
    /// Terminal configuration.
    Leaf(ActionValue),
    /// Exactly one alternative is active; `chosen` must be one of them.
    OneOf {
        chosen: ActionId,
        alternatives: Vec<ActionId>,
    },
    /// Every member whose enablement is active participates, in order.
    AllOf { members: Vec<ActionId> },
}

impl Selection {
    pub fn all_of(members: impl IntoIterator<Item = impl Into<ActionId>>) -> Self {
        Selection::AllOf {
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Selection::Leaf(_) => "a leaf",
            Selection::OneOf { .. } => "a one-of group",
            Selection::AllOf { .. } => "an all-of group",
        }
    }

    /// Ids this selection refers to, in declaration order.
    pub fn children(&self) -> &[ActionId] {
        match self {
            Selection::Leaf(_) => &[],
            Selection::OneOf { alternatives, .. } => alternatives,
            Selection::AllOf { members } => members,
        }
    }

    pub fn refers_to(&self, id: &ActionId) -> bool {
        self.children().contains(id)
    }
}

// ---------------------------------------------------------------------------
// PipelineActionNode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineActionNode {
    pub id: ActionId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub enabled: Enablement,
    pub selection: Selection,
    /// When set, `selection` is a placeholder and the real value belongs to
    /// this profile's Definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_source: Option<ProfileId>,
    /// Shown in the compact in-game menu.
    #[serde(default)]
    pub quick_access: bool,
}

impl PipelineActionNode {
    pub fn new(id: impl Into<ActionId>, name: impl Into<String>, selection: Selection) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            enabled: Enablement::AlwaysOn,
            selection,
            override_source: None,
            quick_access: false,
        }
    }

    pub fn leaf(
        id: impl Into<ActionId>,
        name: impl Into<String>,
        value: impl Into<ActionValue>,
    ) -> Self {
        Self::new(id, name, Selection::Leaf(value.into()))
    }

    pub fn one_of(
        id: impl Into<ActionId>,
        name: impl Into<String>,
        chosen: impl Into<ActionId>,
        alternatives: impl IntoIterator<Item = impl Into<ActionId>>,
    ) -> Self {
        Self::new(
            id,
            name,
            Selection::OneOf {
                chosen: chosen.into(),
                alternatives: alternatives.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn all_of(
        id: impl Into<ActionId>,
        name: impl Into<String>,
        members: impl IntoIterator<Item = impl Into<ActionId>>,
    ) -> Self {
        Self::new(id, name, Selection::all_of(members))
    }

    pub fn with_enabled(mut self, enabled: Enablement) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_quick_access(mut self, quick_access: bool) -> Self {
        self.quick_access = quick_access;
        self
    }

    pub fn is_deferred(&self) -> bool {
        self.override_source.is_some()
    }

    /// A deferred placeholder for this node, pointing at `source`.
    pub fn deferred_to(&self, source: ProfileId) -> Self {
        Self {
            override_source: Some(source),
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Definition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    pub id: DefinitionId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Collections this pipeline applies to.
    #[serde(default)]
    pub tags: BTreeSet<CollectionId>,
    /// Template this Definition was instantiated from; first-use defaults
    /// for missing nodes are synthesized from it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateId>,
    #[serde(default)]
    pub targets: BTreeMap<Target, Selection>,
    #[serde(default)]
    pub nodes: BTreeMap<ActionId, Arc<PipelineActionNode>>,
}

impl Definition {
    pub fn new(id: impl Into<DefinitionId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            tags: BTreeSet::new(),
            template: None,
            targets: BTreeMap::new(),
            nodes: BTreeMap::new(),
        }
    }

    pub fn with_node(mut self, node: PipelineActionNode) -> Self {
        self.nodes.insert(node.id.clone(), Arc::new(node));
        self
    }

    pub fn with_root(mut self, target: Target, selection: Selection) -> Self {
        self.targets.insert(target, selection);
        self
    }

    pub fn node(&self, id: &ActionId) -> Option<&Arc<PipelineActionNode>> {
        self.nodes.get(id)
    }

    pub fn root(&self, target: Target) -> Option<&Selection> {
        self.targets.get(&target)
    }

    /// Nodes whose selection refers to `id`.
    pub fn referrers(&self, id: &ActionId) -> Vec<ActionId> {
        self.nodes
            .values()
            .filter(|n| n.selection.refers_to(id))
            .map(|n| n.id.clone())
            .collect()
    }

    /// Targets whose root selection refers to `id` directly.
    pub fn rooted_in(&self, id: &ActionId) -> Vec<Target> {
        self.targets
            .iter()
            .filter(|(_, s)| s.refers_to(id))
            .map(|(t, _)| *t)
            .collect()
    }

    /// Ids of nodes this Definition owns outright (not deferred).
    pub fn local_node_ids(&self) -> BTreeSet<ActionId> {
        self.nodes
            .values()
            .filter(|n| !n.is_deferred())
            .map(|n| n.id.clone())
            .collect()
    }

    /// Check the structural invariants of a complete Definition: every
    /// referenced id exists, every `chosen` is among its alternatives, and no
    /// node reaches itself. Placeholders of deferred nodes are not checked;
    /// their real value lives elsewhere.
    pub fn validate(&self) -> Result<(), ReifyError> {
        for (target, selection) in &self.targets {
            for child in selection.children() {
                self.require(child)?;
            }
            if let Selection::OneOf {
                chosen,
                alternatives,
            } = selection
            {
                if !alternatives.contains(chosen) {
                    return Err(ReifyError::ChoiceNotAmongAlternatives {
                        node: ActionId::root(*target),
                        chosen: chosen.clone(),
                    });
                }
            }
        }

        for node in self.nodes.values().filter(|n| !n.is_deferred()) {
            for child in node.selection.children() {
                self.require(child)?;
            }
            if let Selection::OneOf {
                chosen,
                alternatives,
            } = &node.selection
            {
                if !alternatives.contains(chosen) {
                    return Err(ReifyError::ChoiceNotAmongAlternatives {
                        node: node.id.clone(),
                        chosen: chosen.clone(),
                    });
                }
            }
        }

        match self.find_cycle() {
            Some(id) => Err(ReifyError::Cycle { id }),
            None => Ok(()),
        }
    }

    /// A node that can reach itself through local selections, if any.
    pub fn find_cycle(&self) -> Option<ActionId> {
        let mut done = BTreeSet::new();
        for id in self.nodes.keys() {
            if let Err(id) = self.check_acyclic(id, &mut Vec::new(), &mut done) {
                return Some(id);
            }
        }
        None
    }

    fn require(&self, id: &ActionId) -> Result<(), ReifyError> {
        if self.nodes.contains_key(id) {
            Ok(())
        } else {
            Err(ReifyError::DanglingReference { id: id.clone() })
        }
    }

    fn check_acyclic(
        &self,
        id: &ActionId,
        path: &mut Vec<ActionId>,
        done: &mut BTreeSet<ActionId>,
    ) -> Result<(), ActionId> {
        if done.contains(id) {
            return Ok(());
        }
        if path.contains(id) {
            return Err(id.clone());
        }
        let Some(node) = self.nodes.get(id) else {
            return Ok(());
        };
        if node.is_deferred() {
            done.insert(id.clone());
            return Ok(());
        }
        path.push(id.clone());
        for child in node.selection.children() {
            self.check_acyclic(child, path, done)?;
        }
        path.pop();
        done.insert(id.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
