use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// String identifiers
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identity of a node, unique within a Definition. Built-in nodes use
    /// the `scope:group:action` form, e.g. `core:display:display_config`.
    ActionId
);
string_id!(DefinitionId);
string_id!(ProfileId);
string_id!(ContextId);
string_id!(
    /// A user collection (e.g. "Emulators"); profiles tag themselves with these.
    CollectionId
);
string_id!(TemplateId);

impl ActionId {
    /// Pseudo-id under which diagnostics for a root-level leaf are reported.
    pub fn root(target: Target) -> Self {
        Self(format!("root:{}", target.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// The execution surface a pipeline is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Primary,
    Secondary,
}

impl Target {
    pub fn all() -> &'static [Target] {
        &[Target::Primary, Target::Secondary]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Target::Primary => "primary",
            Target::Secondary => "secondary",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Target {
    type Err = crate::error::DeckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(Target::Primary),
            "secondary" => Ok(Target::Secondary),
            _ => Err(crate::error::DeckError::InvalidTarget(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Enablement
// ---------------------------------------------------------------------------

/// Whether a node participates when it is a member of an AllOf group.
///
/// `AlwaysOn` nodes are not user-toggleable; a stored toggle on them is
/// ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Enablement {
    #[default]
    AlwaysOn,
    On,
    Off,
}

impl Enablement {
    pub fn is_active(self) -> bool {
        !matches!(self, Enablement::Off)
    }

    pub fn is_toggleable(self) -> bool {
        !matches!(self, Enablement::AlwaysOn)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Enablement::AlwaysOn => "always_on",
            Enablement::On => "on",
            Enablement::Off => "off",
        }
    }
}

impl fmt::Display for Enablement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_parse_roundtrip() {
        for t in Target::all() {
            let parsed: Target = t.as_str().parse().unwrap();
            assert_eq!(parsed, *t);
        }
        assert!("desktop".parse::<Target>().is_err());
    }

    #[test]
    fn enablement_activity() {
        assert!(Enablement::AlwaysOn.is_active());
        assert!(Enablement::On.is_active());
        assert!(!Enablement::Off.is_active());
        assert!(!Enablement::AlwaysOn.is_toggleable());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = ActionId::new("core:display:display_config");
        let yaml = serde_yaml::to_string(&id).unwrap();
        assert_eq!(yaml.trim(), "core:display:display_config");
        assert_eq!(ActionId::root(Target::Secondary).as_str(), "root:secondary");
    }
}
