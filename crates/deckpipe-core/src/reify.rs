//! Reification: resolving a Definition for one target into a concrete,
//! diagnosed tree.
//!
//! Reification runs in two passes from the target's root. The structural
//! pass visits every reachable node, whatever is chosen or enabled, and any
//! dangling id, stray choice or cycle aborts it. The diagnostic walk then
//! descends only into the chosen alternative of a `OneOf` and the active
//! members of an `AllOf`, in declaration order, so a broken alternative
//! nobody picked is never diagnosed. Dependency problems are collected per
//! node and never stop the walk.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::action::ActionValue;
use crate::dependency::{DependencyError, DependencyStatus};
use crate::error::ReifyError;
use crate::selection::{Definition, PipelineActionNode, Selection};
use crate::types::{ActionId, Target};

// ---------------------------------------------------------------------------
// NodeSource
// ---------------------------------------------------------------------------

/// Where the Reifier gets authoritative nodes from.
///
/// A plain Definition serves its own registry. A context view answers for
/// deferred nodes by fetching them from the profile that owns them.
pub trait NodeSource {
    fn root(&self, target: Target) -> Option<Selection>;

    fn node(&self, id: &ActionId) -> Result<Arc<PipelineActionNode>, ReifyError>;
}

impl NodeSource for Definition {
    fn root(&self, target: Target) -> Option<Selection> {
        Definition::root(self, target).cloned()
    }

    fn node(&self, id: &ActionId) -> Result<Arc<PipelineActionNode>, ReifyError> {
        let node = Definition::node(self, id)
            .ok_or_else(|| ReifyError::DanglingReference { id: id.clone() })?;
        match &node.override_source {
            Some(source) => Err(ReifyError::DeferredSourceMissing {
                id: id.clone(),
                source_ref: source.to_string(),
            }),
            None => Ok(Arc::clone(node)),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolvedSelection {
    Action { value: ActionValue },
    OneOf { chosen: Box<ResolvedNode> },
    /// Only the active members, in declaration order.
    AllOf { members: Vec<ResolvedNode> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedNode {
    pub id: ActionId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub quick_access: bool,
    pub selection: ResolvedSelection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedPipeline {
    pub target: Target,
    pub resolved: ResolvedSelection,
    /// Unmet dependencies keyed by node. Nodes without problems are absent.
    pub diagnostics: BTreeMap<ActionId, Vec<DependencyError>>,
}

/// One step of the flattened execution plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedAction {
    pub action_id: ActionId,
    pub value: ActionValue,
}

/// Unmet dependencies of one node, for the pre-launch warning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaunchBlocker {
    pub node: ActionId,
    pub name: String,
    pub errors: Vec<DependencyError>,
}

impl ResolvedPipeline {
    /// The actions setup would apply, left to right, depth first.
    pub fn plan(&self) -> Vec<PlannedAction> {
        let mut out = Vec::new();
        flatten(&ActionId::root(self.target), &self.resolved, &mut out);
        out
    }

    /// Diagnostics that block launching this target, grouped by node.
    /// Only chosen branches of this target were diagnosed, so every entry
    /// counts.
    pub fn launch_blockers(&self) -> Vec<LaunchBlocker> {
        let mut names = BTreeMap::new();
        collect_names(&self.resolved, &mut names);
        self.diagnostics
            .iter()
            .map(|(id, errors)| LaunchBlocker {
                node: id.clone(),
                name: names
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| id.to_string()),
                errors: errors.clone(),
            })
            .collect()
    }

    pub fn is_launchable(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

fn flatten(owner: &ActionId, selection: &ResolvedSelection, out: &mut Vec<PlannedAction>) {
    match selection {
        ResolvedSelection::Action { value } => out.push(PlannedAction {
            action_id: owner.clone(),
            value: value.clone(),
        }),
        ResolvedSelection::OneOf { chosen } => flatten(&chosen.id, &chosen.selection, out),
        ResolvedSelection::AllOf { members } => {
            for m in members {
                flatten(&m.id, &m.selection, out);
            }
        }
    }
}

fn collect_names(selection: &ResolvedSelection, names: &mut BTreeMap<ActionId, String>) {
    match selection {
        ResolvedSelection::Action { .. } => {}
        ResolvedSelection::OneOf { chosen } => {
            names.insert(chosen.id.clone(), chosen.name.clone());
            collect_names(&chosen.selection, names);
        }
        ResolvedSelection::AllOf { members } => {
            for m in members {
                names.insert(m.id.clone(), m.name.clone());
                collect_names(&m.selection, names);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Reifier
// ---------------------------------------------------------------------------

pub struct Reifier<'a> {
    deps: &'a dyn DependencyStatus,
}

impl<'a> Reifier<'a> {
    pub fn new(deps: &'a dyn DependencyStatus) -> Self {
        Self { deps }
    }

    /// Resolve `target` from `source`. A target with no root resolves to an
    /// empty `AllOf`.
    pub fn reify(
        &self,
        source: &dyn NodeSource,
        target: Target,
    ) -> Result<ResolvedPipeline, ReifyError> {
        tracing::debug!(%target, "reifying");
        if let Some(root) = source.root(target) {
            Structure {
                source,
                checked: BTreeSet::new(),
                path: Vec::new(),
            }
            .selection(&ActionId::root(target), &root)?;
        }
        let mut walk = Walk {
            source,
            deps: self.deps,
            diagnostics: BTreeMap::new(),
            visiting: Vec::new(),
        };
        let resolved = match source.root(target) {
            Some(root) => walk.selection(&ActionId::root(target), &root)?,
            None => ResolvedSelection::AllOf {
                members: Vec::new(),
            },
        };
        tracing::debug!(
            %target,
            diagnosed = walk.diagnostics.len(),
            "reified"
        );
        Ok(ResolvedPipeline {
            target,
            resolved,
            diagnostics: walk.diagnostics,
        })
    }
}

/// Shorthand for reifying a complete Definition.
pub fn reify(
    definition: &Definition,
    target: Target,
    deps: &dyn DependencyStatus,
) -> Result<ResolvedPipeline, ReifyError> {
    Reifier::new(deps).reify(definition, target)
}

/// Every id reachable from a root must resolve, regardless of choice or
/// enablement.
struct Structure<'a> {
    source: &'a dyn NodeSource,
    checked: BTreeSet<ActionId>,
    path: Vec<ActionId>,
}

impl Structure<'_> {
    fn selection(&mut self, owner: &ActionId, selection: &Selection) -> Result<(), ReifyError> {
        if let Selection::OneOf {
            chosen,
            alternatives,
        } = selection
        {
            if !alternatives.contains(chosen) {
                return Err(ReifyError::ChoiceNotAmongAlternatives {
                    node: owner.clone(),
                    chosen: chosen.clone(),
                });
            }
        }
        for child in selection.children() {
            if self.checked.contains(child) {
                continue;
            }
            if self.path.contains(child) {
                return Err(ReifyError::Cycle { id: child.clone() });
            }
            let node = self.source.node(child)?;
            self.path.push(child.clone());
            self.selection(child, &node.selection)?;
            self.path.pop();
            self.checked.insert(child.clone());
        }
        Ok(())
    }
}

struct Walk<'a> {
    source: &'a dyn NodeSource,
    deps: &'a dyn DependencyStatus,
    diagnostics: BTreeMap<ActionId, Vec<DependencyError>>,
    visiting: Vec<ActionId>,
}

impl Walk<'_> {
    fn selection(
        &mut self,
        owner: &ActionId,
        selection: &Selection,
    ) -> Result<ResolvedSelection, ReifyError> {
        match selection {
            Selection::Leaf(value) => {
                let errors = self.deps.fetch_dependency_status(value)?;
                if !errors.is_empty() {
                    self.diagnostics
                        .entry(owner.clone())
                        .or_default()
                        .extend(errors);
                }
                Ok(ResolvedSelection::Action {
                    value: value.clone(),
                })
            }
            Selection::OneOf {
                chosen,
                alternatives,
            } => {
                if !alternatives.contains(chosen) {
                    return Err(ReifyError::ChoiceNotAmongAlternatives {
                        node: owner.clone(),
                        chosen: chosen.clone(),
                    });
                }
                let node = self.source.node(chosen)?;
                Ok(ResolvedSelection::OneOf {
                    chosen: Box::new(self.node(&node)?),
                })
            }
            Selection::AllOf { members } => {
                let mut resolved = Vec::new();
                for id in members {
                    let node = self.source.node(id)?;
                    if node.enabled.is_active() {
                        resolved.push(self.node(&node)?);
                    }
                }
                Ok(ResolvedSelection::AllOf { members: resolved })
            }
        }
    }

    fn node(&mut self, node: &PipelineActionNode) -> Result<ResolvedNode, ReifyError> {
        if self.visiting.contains(&node.id) {
            return Err(ReifyError::Cycle {
                id: node.id.clone(),
            });
        }
        self.visiting.push(node.id.clone());
        let selection = self.selection(&node.id, &node.selection)?;
        self.visiting.pop();
        Ok(ResolvedNode {
            id: node.id.clone(),
            name: node.name.clone(),
            description: node.description.clone(),
            quick_access: node.quick_access,
            selection,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
