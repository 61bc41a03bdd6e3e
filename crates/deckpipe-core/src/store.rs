//! Document persistence for profiles, contexts and collection membership.
//!
//! One YAML document per record, written atomically. The core only talks
//! to [`ProfileStore`]; [`FsStore`] is the local implementation.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::error::{DeckError, Result};
use crate::paths;
use crate::profile::{CollectionLookup, Context, Profile};
use crate::types::{CollectionId, ContextId, ProfileId};

// ---------------------------------------------------------------------------
// ProfileStore
// ---------------------------------------------------------------------------

pub trait ProfileStore {
    fn load_profile(&self, id: &ProfileId) -> Result<Profile>;
    fn save_profile(&self, profile: &Profile) -> Result<()>;
    fn delete_profile(&self, id: &ProfileId) -> Result<()>;
    fn list_profiles(&self) -> Result<Vec<Profile>>;

    /// A context nobody has customized yet has no document.
    fn load_context(&self, id: &ContextId) -> Result<Option<Context>>;
    fn save_context(&self, context: &Context) -> Result<()>;
    fn delete_context(&self, id: &ContextId) -> Result<()>;
    fn list_contexts(&self) -> Result<Vec<Context>>;
}

// ---------------------------------------------------------------------------
// FsStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ProfileStore for FsStore {
    fn load_profile(&self, id: &ProfileId) -> Result<Profile> {
        paths::validate_record_id(id.as_str())?;
        let path = paths::profile_path(&self.root, id.as_str());
        if !path.exists() {
            return Err(DeckError::ProfileNotFound(id.to_string()));
        }
        let data = std::fs::read_to_string(&path)?;
        let profile: Profile = serde_yaml::from_str(&data)?;
        Ok(profile)
    }

    fn save_profile(&self, profile: &Profile) -> Result<()> {
        paths::validate_record_id(profile.id.as_str())?;
        let path = paths::profile_path(&self.root, profile.id.as_str());
        let data = serde_yaml::to_string(profile)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    fn delete_profile(&self, id: &ProfileId) -> Result<()> {
        paths::validate_record_id(id.as_str())?;
        let path = paths::profile_path(&self.root, id.as_str());
        if !path.exists() {
            return Err(DeckError::ProfileNotFound(id.to_string()));
        }
        std::fs::remove_file(&path)?;
        Ok(())
    }

    fn list_profiles(&self) -> Result<Vec<Profile>> {
        let mut profiles: Vec<Profile> = list_yaml(&paths::profiles_dir(&self.root))?;
        profiles.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(profiles)
    }

    fn load_context(&self, id: &ContextId) -> Result<Option<Context>> {
        paths::validate_record_id(id.as_str())?;
        let path = paths::context_path(&self.root, id.as_str());
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        let context: Context = serde_yaml::from_str(&data)?;
        Ok(Some(context))
    }

    fn save_context(&self, context: &Context) -> Result<()> {
        paths::validate_record_id(context.id.as_str())?;
        let path = paths::context_path(&self.root, context.id.as_str());
        let data = serde_yaml::to_string(context)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    fn delete_context(&self, id: &ContextId) -> Result<()> {
        paths::validate_record_id(id.as_str())?;
        let path = paths::context_path(&self.root, id.as_str());
        if !path.exists() {
            return Err(DeckError::ContextNotFound(id.to_string()));
        }
        std::fs::remove_file(&path)?;
        Ok(())
    }

    fn list_contexts(&self) -> Result<Vec<Context>> {
        let mut contexts: Vec<Context> = list_yaml(&paths::contexts_dir(&self.root))?;
        contexts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(contexts)
    }
}

fn list_yaml<T: for<'de> Deserialize<'de>>(dir: &Path) -> Result<Vec<T>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
            continue;
        }
        let data = std::fs::read_to_string(&path)?;
        out.push(serde_yaml::from_str(&data)?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

/// Collection membership kept in `.deckpipe/collections.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionMap {
    #[serde(default)]
    pub collections: BTreeMap<CollectionId, BTreeSet<ContextId>>,
}

impl CollectionMap {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::collections_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(serde_yaml::from_str(&data)?)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&paths::collections_path(root), data.as_bytes())
    }

    /// Returns false if the context was already a member.
    pub fn add(&mut self, collection: CollectionId, context: ContextId) -> bool {
        self.collections.entry(collection).or_default().insert(context)
    }

    pub fn remove(&mut self, collection: &CollectionId, context: &ContextId) -> bool {
        let Some(members) = self.collections.get_mut(collection) else {
            return false;
        };
        let removed = members.remove(context);
        if members.is_empty() {
            self.collections.remove(collection);
        }
        removed
    }
}

impl CollectionLookup for CollectionMap {
    fn collections_containing(&self, context: &ContextId) -> BTreeSet<CollectionId> {
        self.collections
            .iter()
            .filter(|(_, members)| members.contains(context))
            .map(|(id, _)| id.clone())
            .collect()
    }
}
