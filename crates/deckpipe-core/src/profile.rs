use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::selection::Definition;
use crate::template::Template;
use crate::types::{CollectionId, ContextId, DefinitionId, ProfileId};

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// A named pipeline shared by every context it applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub definition: Definition,
}

impl Profile {
    pub fn from_template(id: ProfileId, name: impl Into<String>, template: &Template) -> Self {
        let mut definition = template.definition.clone();
        definition.id = DefinitionId::new(id.as_str());
        definition.name = name.into();
        definition.description = template.summary.to_string();
        Self { id, definition }
    }

    /// A copy under a new id. Node ids are kept so the copy stays
    /// comparable with its source.
    pub fn clone_as(&self, id: ProfileId, name: impl Into<String>) -> Self {
        let mut definition = self.definition.clone();
        definition.id = DefinitionId::new(id.as_str());
        definition.name = name.into();
        Self { id, definition }
    }

    pub fn applies_to(&self, collections: &BTreeSet<CollectionId>) -> bool {
        !self.definition.tags.is_disjoint(collections)
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Per-app state: which profile it prefers and its sparse overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub id: ContextId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<ProfileId>,
    #[serde(default)]
    pub overrides: BTreeMap<ProfileId, Definition>,
}

impl Context {
    pub fn new(id: ContextId) -> Self {
        Self {
            id,
            default_profile: None,
            overrides: BTreeMap::new(),
        }
    }

    pub fn override_for(&self, profile: &ProfileId) -> Option<&Definition> {
        self.overrides.get(profile)
    }

    /// Forget everything this context knows about `profile`. Entries of
    /// other overrides that deferred to it fall back to their own base.
    /// Returns true if anything changed.
    pub fn forget_profile(&mut self, profile: &ProfileId) -> bool {
        let mut changed = self.overrides.remove(profile).is_some();
        if self.default_profile.as_ref() == Some(profile) {
            self.default_profile = None;
            changed = true;
        }
        for shell in self.overrides.values_mut() {
            let before = shell.nodes.len();
            shell
                .nodes
                .retain(|_, n| n.override_source.as_ref() != Some(profile));
            changed |= shell.nodes.len() != before;
        }
        changed
    }

    /// The profile launches use: the explicit default when set, else the
    /// first applicable one.
    pub fn effective_profile<'p>(&'p self, applicable: &[&'p Profile]) -> Option<&'p ProfileId> {
        self.default_profile
            .as_ref()
            .or_else(|| applicable.first().map(|p| &p.id))
    }
}

pub fn override_definition_id(context: &ContextId, profile: &ProfileId) -> DefinitionId {
    DefinitionId::new(format!("{context}:{profile}"))
}

// ---------------------------------------------------------------------------
// Collection membership
// ---------------------------------------------------------------------------

/// Read-only view of which user collections contain a context.
pub trait CollectionLookup {
    fn collections_containing(&self, context: &ContextId) -> BTreeSet<CollectionId>;
}

/// Profiles whose tags intersect the context's collections, in the order
/// given.
pub fn profiles_for_context<'p>(
    profiles: &'p [Profile],
    context: &ContextId,
    lookup: &dyn CollectionLookup,
) -> Vec<&'p Profile> {
    let collections = lookup.collections_containing(context);
    profiles.iter().filter(|p| p.applies_to(&collections)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::AudioRouting;
    use crate::selection::PipelineActionNode;
    use crate::template::{TemplateCatalog, DUAL_SCREEN};
    use crate::types::{ActionId, TemplateId};

    struct Fixed(BTreeMap<ContextId, BTreeSet<CollectionId>>);

    impl CollectionLookup for Fixed {
        fn collections_containing(&self, context: &ContextId) -> BTreeSet<CollectionId> {
            self.0.get(context).cloned().unwrap_or_default()
        }
    }

    fn tagged(id: &str, tags: &[&str]) -> Profile {
        let catalog = TemplateCatalog::builtin();
        let template = catalog.get(&TemplateId::new(DUAL_SCREEN)).unwrap();
        let mut p = Profile::from_template(ProfileId::new(id), id, template);
        p.definition.tags = tags.iter().map(|t| CollectionId::new(*t)).collect();
        p
    }

    #[test]
    fn from_template_takes_profile_identity() {
        let p = tagged("citra", &[]);
        assert_eq!(p.definition.id.as_str(), "citra");
        assert_eq!(p.definition.template, Some(TemplateId::new(DUAL_SCREEN)));
        p.definition.validate().unwrap();
    }

    #[test]
    fn clone_keeps_node_ids() {
        let p = tagged("citra", &["emulators"]);
        let c = p.clone_as(ProfileId::new("citra-docked"), "Docked");
        assert!(c.definition.nodes.keys().eq(p.definition.nodes.keys()));
        assert_eq!(c.definition.tags, p.definition.tags);
        assert_eq!(c.definition.name, "Docked");
    }

    #[test]
    fn applicable_profiles_follow_collections() {
        let profiles = vec![
            tagged("citra", &["emulators"]),
            tagged("desktop", &["desktop"]),
            tagged("melonds", &["emulators", "nintendo"]),
        ];
        let ctx = ContextId::new("app-1");
        let lookup = Fixed(
            [(ctx.clone(), [CollectionId::new("emulators")].into_iter().collect())]
                .into_iter()
                .collect(),
        );
        let applicable = profiles_for_context(&profiles, &ctx, &lookup);
        let ids: Vec<_> = applicable.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["citra", "melonds"]);

        let mut context = Context::new(ctx);
        assert_eq!(context.effective_profile(&applicable).map(|p| p.as_str()), Some("citra"));
        context.default_profile = Some(ProfileId::new("melonds"));
        assert_eq!(context.effective_profile(&applicable).map(|p| p.as_str()), Some("melonds"));
    }

    #[test]
    fn forget_profile_drops_override_and_default() {
        let pid = ProfileId::new("citra");
        let mut ctx = Context::new(ContextId::new("app-1"));
        ctx.default_profile = Some(pid.clone());
        ctx.overrides.insert(pid.clone(), Definition::new("app-1:citra", "citra"));
        assert!(ctx.forget_profile(&pid));
        assert!(ctx.overrides.is_empty());
        assert!(ctx.default_profile.is_none());
        assert!(!ctx.forget_profile(&pid));
    }

    #[test]
    fn forget_profile_drops_deferrals_to_it() {
        let gone = ProfileId::new("loud");
        let kept = PipelineActionNode::leaf("a", "A", AudioRouting::default());
        let deferred = PipelineActionNode::leaf("b", "B", AudioRouting::default());
        let mut ctx = Context::new(ContextId::new("app-1"));
        ctx.overrides.insert(
            ProfileId::new("citra"),
            Definition::new("app-1:citra", "citra")
                .with_node(kept.deferred_to(ProfileId::new("citra")))
                .with_node(deferred.deferred_to(gone.clone())),
        );

        assert!(ctx.forget_profile(&gone));
        let shell = ctx.override_for(&ProfileId::new("citra")).unwrap();
        assert!(shell.node(&ActionId::new("a")).is_some());
        assert!(shell.node(&ActionId::new("b")).is_none());
        assert!(!ctx.forget_profile(&gone));
    }
}
