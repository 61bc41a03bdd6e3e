//! Store-backed operations over profiles and contexts.
//!
//! Each call loads what it needs, runs the pure core (patch, resolver,
//! reifier) and saves what changed.

use crate::dependency::DependencyStatus;
use crate::error::{DeckError, Result};
use crate::patch::{patch, PipelineUpdate};
use crate::paths;
use crate::profile::{profiles_for_context, CollectionLookup, Context, Profile};
use crate::reify::{Reifier, ResolvedPipeline};
use crate::resolver::OverrideResolver;
use crate::selection::Definition;
use crate::store::ProfileStore;
use crate::template::TemplateCatalog;
use crate::types::{ActionId, ContextId, ProfileId, Target, TemplateId};

pub struct Deck<S> {
    store: S,
    catalog: TemplateCatalog,
}

impl<S: ProfileStore> Deck<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            catalog: TemplateCatalog::builtin(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    // -----------------------------------------------------------------------
    // Profiles
    // -----------------------------------------------------------------------

    pub fn create_profile(&self, id: &str, name: &str, template: &TemplateId) -> Result<Profile> {
        paths::validate_record_id(id)?;
        let id = ProfileId::new(id);
        self.ensure_absent(&id)?;
        let template = self.catalog.get(template)?;
        let profile = Profile::from_template(id, name, template);
        self.store.save_profile(&profile)?;
        tracing::info!(profile = %profile.id, template = %template.id, "created profile");
        Ok(profile)
    }

    pub fn clone_profile(
        &self,
        source: &ProfileId,
        id: &str,
        name: Option<&str>,
    ) -> Result<Profile> {
        paths::validate_record_id(id)?;
        let id = ProfileId::new(id);
        self.ensure_absent(&id)?;
        let source = self.store.load_profile(source)?;
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} (copy)", source.definition.name));
        let profile = source.clone_as(id, name);
        self.store.save_profile(&profile)?;
        Ok(profile)
    }

    /// Delete a profile and every context's override of it. Returns the
    /// number of contexts that changed.
    pub fn delete_profile(&self, id: &ProfileId) -> Result<usize> {
        self.store.delete_profile(id)?;
        let mut touched = 0;
        for mut context in self.store.list_contexts()? {
            if context.forget_profile(id) {
                self.store.save_context(&context)?;
                touched += 1;
            }
        }
        tracing::info!(profile = %id, contexts = touched, "deleted profile");
        Ok(touched)
    }

    pub fn patch_profile(&self, id: &ProfileId, update: &PipelineUpdate) -> Result<Profile> {
        let mut profile = self.store.load_profile(id)?;
        profile.definition = patch(&profile.definition, update)?;
        self.store.save_profile(&profile)?;
        Ok(profile)
    }

    pub fn reify_profile(
        &self,
        id: &ProfileId,
        target: Target,
        deps: &dyn DependencyStatus,
    ) -> Result<ResolvedPipeline> {
        let profile = self.store.load_profile(id)?;
        Ok(Reifier::new(deps).reify(&profile.definition, target)?)
    }

    fn ensure_absent(&self, id: &ProfileId) -> Result<()> {
        match self.store.load_profile(id) {
            Ok(_) => Err(DeckError::ProfileExists(id.to_string())),
            Err(DeckError::ProfileNotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    // -----------------------------------------------------------------------
    // Contexts
    // -----------------------------------------------------------------------

    /// The stored context, or a fresh one if nothing was customized yet.
    pub fn context(&self, id: &ContextId) -> Result<Context> {
        paths::validate_record_id(id.as_str())?;
        Ok(self
            .store
            .load_context(id)?
            .unwrap_or_else(|| Context::new(id.clone())))
    }

    pub fn set_default_profile(
        &self,
        id: &ContextId,
        profile: Option<&ProfileId>,
    ) -> Result<Context> {
        if let Some(profile) = profile {
            self.store.load_profile(profile)?;
        }
        let mut context = self.context(id)?;
        context.default_profile = profile.cloned();
        self.store.save_context(&context)?;
        Ok(context)
    }

    /// Forget every customization of a context.
    pub fn reset_context(&self, id: &ContextId) -> Result<()> {
        paths::validate_record_id(id.as_str())?;
        self.store.delete_context(id)?;
        tracing::info!(context = %id, "reset context");
        Ok(())
    }

    pub fn applicable_profiles(
        &self,
        id: &ContextId,
        lookup: &dyn CollectionLookup,
    ) -> Result<Vec<Profile>> {
        let profiles = self.store.list_profiles()?;
        Ok(profiles_for_context(&profiles, id, lookup)
            .into_iter()
            .cloned()
            .collect())
    }

    /// The default profile when set, else the first applicable one.
    pub fn effective_profile(
        &self,
        id: &ContextId,
        lookup: &dyn CollectionLookup,
    ) -> Result<ProfileId> {
        let context = self.context(id)?;
        let profiles = self.store.list_profiles()?;
        let applicable = profiles_for_context(&profiles, id, lookup);
        context
            .effective_profile(&applicable)
            .cloned()
            .ok_or_else(|| DeckError::NoProfileForContext(id.to_string()))
    }

    pub fn patch_context(
        &self,
        id: &ContextId,
        profile: &ProfileId,
        update: &PipelineUpdate,
    ) -> Result<Definition> {
        self.with_shell(id, profile, |resolver, shell| {
            Ok(resolver.merge_for_write(shell, update)?)
        })
    }

    pub fn revert_context_node(
        &self,
        id: &ContextId,
        profile: &ProfileId,
        node: &ActionId,
    ) -> Result<Definition> {
        self.with_shell(id, profile, |resolver, shell| {
            Ok(resolver.revert_to_default(shell, node))
        })
    }

    /// Reify a context's view of `profile`. Looking up nodes the context
    /// has not seen before records them in its override, which is saved.
    pub fn reify_context(
        &self,
        id: &ContextId,
        profile: &ProfileId,
        target: Target,
        deps: &dyn DependencyStatus,
    ) -> Result<ResolvedPipeline> {
        let mut context = self.context(id)?;
        let base = self.store.load_profile(profile)?;
        let others = self.other_profiles(profile)?;
        let resolver = OverrideResolver::new(&base, &self.catalog).with_profiles(&others);
        let shell = context
            .override_for(profile)
            .cloned()
            .unwrap_or_else(|| resolver.new_shell(id));

        let view = resolver.view(shell);
        let resolved = Reifier::new(deps).reify(&view, target)?;
        let (shell, grew) = view.into_parts();
        if grew {
            tracing::debug!(context = %id, profile = %profile, "override grew while reading");
            context.overrides.insert(profile.clone(), shell);
            self.store.save_context(&context)?;
        }
        Ok(resolved)
    }

    fn with_shell(
        &self,
        id: &ContextId,
        profile: &ProfileId,
        edit: impl FnOnce(&OverrideResolver<'_>, &Definition) -> Result<Definition>,
    ) -> Result<Definition> {
        let mut context = self.context(id)?;
        let base = self.store.load_profile(profile)?;
        let others = self.other_profiles(profile)?;
        let resolver = OverrideResolver::new(&base, &self.catalog).with_profiles(&others);
        let shell = context
            .override_for(profile)
            .cloned()
            .unwrap_or_else(|| resolver.new_shell(id));

        let next = edit(&resolver, &shell)?;
        context.overrides.insert(profile.clone(), next.clone());
        self.store.save_context(&context)?;
        Ok(next)
    }

    fn other_profiles(&self, base: &ProfileId) -> Result<Vec<Profile>> {
        Ok(self
            .store
            .list_profiles()?
            .into_iter()
            .filter(|p| p.id != *base)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reify::tests::MissingKinds;
    use crate::store::{CollectionMap, FsStore};
    use crate::template::DUAL_SCREEN;
    use crate::types::CollectionId;
    use tempfile::TempDir;

    const LAYOUT: &str = "core:window:layout";
    const SIDE: &str = "core:window:side_by_side";

    fn deck(dir: &TempDir) -> Deck<FsStore> {
        Deck::new(FsStore::new(dir.path()))
    }

    fn dual() -> TemplateId {
        TemplateId::new(DUAL_SCREEN)
    }

    #[test]
    fn create_and_duplicate() {
        let dir = TempDir::new().unwrap();
        let deck = deck(&dir);
        deck.create_profile("citra", "Citra", &dual()).unwrap();
        assert!(matches!(
            deck.create_profile("citra", "Again", &dual()),
            Err(DeckError::ProfileExists(_))
        ));
        assert!(matches!(
            deck.create_profile("other", "Other", &TemplateId::new("nope")),
            Err(DeckError::TemplateNotFound(_))
        ));
        let copy = deck
            .clone_profile(&ProfileId::new("citra"), "citra-2", None)
            .unwrap();
        assert_eq!(copy.definition.name, "Citra (copy)");
    }

    #[test]
    fn context_edit_does_not_touch_profile() {
        let dir = TempDir::new().unwrap();
        let deck = deck(&dir);
        let pid = ProfileId::new("citra");
        let ctx = ContextId::new("app-1");
        deck.create_profile("citra", "Citra", &dual()).unwrap();
        let before = deck.store().load_profile(&pid).unwrap();

        deck.patch_context(
            &ctx,
            &pid,
            &PipelineUpdate::ChooseOneOf {
                id: ActionId::new(LAYOUT),
                chosen: ActionId::new(SIDE),
            },
        )
        .unwrap();

        assert_eq!(deck.store().load_profile(&pid).unwrap(), before);
        let deps = MissingKinds(vec![]);
        let ctx_plan = deck
            .reify_context(&ctx, &pid, Target::Primary, &deps)
            .unwrap()
            .plan();
        let base_plan = deck.reify_profile(&pid, Target::Primary, &deps).unwrap().plan();
        assert!(ctx_plan.iter().any(|p| p.action_id.as_str() == SIDE));
        assert!(!base_plan.iter().any(|p| p.action_id.as_str() == SIDE));
    }

    #[test]
    fn reading_a_context_persists_growth() {
        let dir = TempDir::new().unwrap();
        let deck = deck(&dir);
        let pid = ProfileId::new("citra");
        let ctx = ContextId::new("app-1");
        deck.create_profile("citra", "Citra", &dual()).unwrap();
        assert!(deck.store().load_context(&ctx).unwrap().is_none());

        deck.reify_context(&ctx, &pid, Target::Primary, &MissingKinds(vec![]))
            .unwrap();
        let stored = deck.store().load_context(&ctx).unwrap().unwrap();
        let shell = stored.override_for(&pid).unwrap();
        assert!(shell.local_node_ids().is_empty());
        assert!(!shell.nodes.is_empty());
    }

    #[test]
    fn revert_through_store() {
        let dir = TempDir::new().unwrap();
        let deck = deck(&dir);
        let pid = ProfileId::new("citra");
        let ctx = ContextId::new("app-1");
        deck.create_profile("citra", "Citra", &dual()).unwrap();
        let layout = ActionId::new(LAYOUT);
        deck.patch_context(
            &ctx,
            &pid,
            &PipelineUpdate::ChooseOneOf {
                id: layout.clone(),
                chosen: ActionId::new(SIDE),
            },
        )
        .unwrap();
        let shell = deck.revert_context_node(&ctx, &pid, &layout).unwrap();
        assert!(shell.local_node_ids().is_empty());
    }

    #[test]
    fn deleting_a_deferral_source_falls_back_to_base() {
        let dir = TempDir::new().unwrap();
        let deck = deck(&dir);
        let base = ProfileId::new("citra");
        let loud = ProfileId::new("loud");
        let ctx = ContextId::new("app-1");
        deck.create_profile("citra", "Citra", &dual()).unwrap();
        deck.create_profile("loud", "Loud", &dual()).unwrap();
        deck.patch_context(
            &ctx,
            &base,
            &PipelineUpdate::SetOverrideSource {
                id: ActionId::new(LAYOUT),
                source: Some(loud.clone()),
            },
        )
        .unwrap();

        assert_eq!(deck.delete_profile(&loud).unwrap(), 1);
        let deps = MissingKinds(vec![]);
        let ctx_plan = deck
            .reify_context(&ctx, &base, Target::Primary, &deps)
            .unwrap()
            .plan();
        let base_plan = deck.reify_profile(&base, Target::Primary, &deps).unwrap().plan();
        assert_eq!(ctx_plan, base_plan);
    }

    #[test]
    fn deleting_a_profile_cascades_to_contexts() {
        let dir = TempDir::new().unwrap();
        let deck = deck(&dir);
        let pid = ProfileId::new("citra");
        deck.create_profile("citra", "Citra", &dual()).unwrap();
        for ctx in ["app-1", "app-2"] {
            deck.set_default_profile(&ContextId::new(ctx), Some(&pid))
                .unwrap();
        }
        deck.patch_context(
            &ContextId::new("app-1"),
            &pid,
            &PipelineUpdate::SetMetadata {
                name: Some("Mine".to_string()),
                description: None,
                tags: None,
            },
        )
        .unwrap();

        assert_eq!(deck.delete_profile(&pid).unwrap(), 2);
        deck.reset_context(&ContextId::new("app-2")).unwrap();
        assert!(matches!(
            deck.reset_context(&ContextId::new("app-2")),
            Err(DeckError::ContextNotFound(_))
        ));
        for ctx in deck.store().list_contexts().unwrap() {
            assert!(ctx.overrides.is_empty());
            assert!(ctx.default_profile.is_none());
        }
    }

    #[test]
    fn effective_profile_resolution() {
        let dir = TempDir::new().unwrap();
        let deck = deck(&dir);
        let ctx = ContextId::new("app-1");
        let mut collections = CollectionMap::default();

        assert!(matches!(
            deck.effective_profile(&ctx, &collections),
            Err(DeckError::NoProfileForContext(_))
        ));

        deck.create_profile("citra", "Citra", &dual()).unwrap();
        deck.patch_profile(
            &ProfileId::new("citra"),
            &PipelineUpdate::SetMetadata {
                name: None,
                description: None,
                tags: Some([CollectionId::new("emulators")].into_iter().collect()),
            },
        )
        .unwrap();
        collections.add(CollectionId::new("emulators"), ctx.clone());
        assert_eq!(
            deck.effective_profile(&ctx, &collections).unwrap(),
            ProfileId::new("citra")
        );
        assert_eq!(deck.applicable_profiles(&ctx, &collections).unwrap().len(), 1);

        assert!(matches!(
            deck.set_default_profile(&ctx, Some(&ProfileId::new("ghost"))),
            Err(DeckError::ProfileNotFound(_))
        ));
    }
}
