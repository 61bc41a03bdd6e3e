//! Built-in starter Definitions.
//!
//! Node ids in a template are stable across releases (`scope:group:action`).
//! Profiles remember which template they came from, and a context that
//! defers to a node its source profile has lost gets the template's default
//! for that id.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::action::{
    AudioRouting, DisplayConfig, HookStage, LaunchHook, LaunchOptions, LayoutOption, SecondaryApp,
    SecondaryAppSource, SecondaryWindowing, WindowLayout,
};
use crate::error::{DeckError, Result};
use crate::selection::{Definition, PipelineActionNode, Selection};
use crate::types::{ActionId, Enablement, Target, TemplateId};

pub const DUAL_SCREEN: &str = "dual-screen";
pub const SINGLE_SCREEN: &str = "single-screen";

#[derive(Debug, Clone, Serialize)]
pub struct Template {
    pub id: TemplateId,
    pub summary: &'static str,
    pub definition: Definition,
}

#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: BTreeMap<TemplateId, Template>,
}

impl TemplateCatalog {
    pub fn builtin() -> Self {
        let templates = [dual_screen(), single_screen()]
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();
        Self { templates }
    }

    pub fn get(&self, id: &TemplateId) -> Result<&Template> {
        self.templates
            .get(id)
            .ok_or_else(|| DeckError::TemplateNotFound(id.to_string()))
    }

    pub fn list(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    /// The template's node for `id`, detached from any profile.
    pub fn default_node(&self, template: &TemplateId, id: &ActionId) -> Option<PipelineActionNode> {
        self.templates
            .get(template)?
            .definition
            .node(id)
            .map(|n| n.as_ref().clone())
    }
}

// ---------------------------------------------------------------------------
// Shared nodes
// ---------------------------------------------------------------------------

const DISPLAY: &str = "core:display:display_config";
const LAYOUT: &str = "core:window:layout";
const LAYOUT_SEPARATE: &str = "core:window:separate";
const LAYOUT_SIDE_BY_SIDE: &str = "core:window:side_by_side";
const LAYOUT_SINGLE: &str = "core:window:single";
const AUDIO: &str = "core:audio:routing";
const LAUNCH_OPTIONS: &str = "core:launch:options";
const HOOK_BEFORE: &str = "core:hooks:before_launch";
const HOOK_AFTER: &str = "core:hooks:after_exit";
const SECONDARY_APP: &str = "core:secondary:app";

fn display() -> PipelineActionNode {
    PipelineActionNode::leaf(DISPLAY, "Display", DisplayConfig::default())
        .with_description("External display resolution and placement")
        .with_quick_access(true)
}

fn layout_leaf(id: &str, name: &str, layout: LayoutOption) -> PipelineActionNode {
    PipelineActionNode::leaf(
        id,
        name,
        WindowLayout {
            layout,
            ..WindowLayout::default()
        },
    )
}

fn audio() -> PipelineActionNode {
    PipelineActionNode::leaf(AUDIO, "Audio", AudioRouting::default())
        .with_description("Route game audio and microphone")
        .with_enabled(Enablement::Off)
}

fn hooks() -> [PipelineActionNode; 2] {
    [
        PipelineActionNode::leaf(
            HOOK_BEFORE,
            "Before launch",
            LaunchHook {
                stage: HookStage::BeforeLaunch,
                ..LaunchHook::default()
            },
        )
        .with_enabled(Enablement::Off),
        PipelineActionNode::leaf(
            HOOK_AFTER,
            "After exit",
            LaunchHook {
                stage: HookStage::AfterExit,
                ..LaunchHook::default()
            },
        )
        .with_enabled(Enablement::Off),
    ]
}

fn launch_options() -> PipelineActionNode {
    PipelineActionNode::leaf(
        LAUNCH_OPTIONS,
        "Launch options",
        LaunchOptions {
            options: "%command%".to_string(),
        },
    )
    .with_enabled(Enablement::Off)
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

fn dual_screen() -> Template {
    let [before, after] = hooks();
    let definition = Definition::new(DUAL_SCREEN, "Dual screen")
        .with_node(display())
        .with_node(
            PipelineActionNode::one_of(
                LAYOUT,
                "Window layout",
                LAYOUT_SEPARATE,
                [LAYOUT_SEPARATE, LAYOUT_SIDE_BY_SIDE],
            )
            .with_quick_access(true),
        )
        .with_node(layout_leaf(
            LAYOUT_SEPARATE,
            "Separate windows",
            LayoutOption::SeparateWindows,
        ))
        .with_node(layout_leaf(
            LAYOUT_SIDE_BY_SIDE,
            "Side by side",
            LayoutOption::SideBySide,
        ))
        .with_node(audio())
        .with_node(launch_options())
        .with_node(before)
        .with_node(after)
        .with_node(
            PipelineActionNode::leaf(
                SECONDARY_APP,
                "Secondary app",
                SecondaryApp {
                    source: SecondaryAppSource::Preset {
                        preset: "keyboard".to_string(),
                    },
                    windowing: SecondaryWindowing::Fullscreen,
                },
            )
            .with_enabled(Enablement::Off),
        )
        .with_root(
            Target::Primary,
            Selection::all_of([DISPLAY, LAYOUT, AUDIO, LAUNCH_OPTIONS, HOOK_BEFORE, HOOK_AFTER]),
        )
        .with_root(
            Target::Secondary,
            Selection::all_of([DISPLAY, LAYOUT, SECONDARY_APP]),
        );

    Template {
        id: TemplateId::new(DUAL_SCREEN),
        summary: "Emulator split across the built-in and an external screen",
        definition: with_template(definition, DUAL_SCREEN),
    }
}

fn single_screen() -> Template {
    let [before, after] = hooks();
    let definition = Definition::new(SINGLE_SCREEN, "Single screen")
        .with_node(display())
        .with_node(layout_leaf(
            LAYOUT_SINGLE,
            "Single screen",
            LayoutOption::SingleScreen,
        ))
        .with_node(audio())
        .with_node(launch_options())
        .with_node(before)
        .with_node(after)
        .with_root(
            Target::Primary,
            Selection::all_of([LAYOUT_SINGLE, AUDIO, LAUNCH_OPTIONS, HOOK_BEFORE, HOOK_AFTER]),
        )
        .with_root(
            Target::Secondary,
            Selection::all_of([DISPLAY, LAYOUT_SINGLE, AUDIO]),
        );

    Template {
        id: TemplateId::new(SINGLE_SCREEN),
        summary: "One screen at a time, docked or handheld",
        definition: with_template(definition, SINGLE_SCREEN),
    }
}

fn with_template(mut definition: Definition, id: &str) -> Definition {
    definition.template = Some(TemplateId::new(id));
    definition
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_templates_are_valid() {
        let catalog = TemplateCatalog::builtin();
        assert_eq!(catalog.list().count(), 2);
        for t in catalog.list() {
            t.definition.validate().unwrap();
            assert_eq!(t.definition.template.as_ref(), Some(&t.id));
            assert!(t.definition.root(Target::Primary).is_some());
            assert!(t.definition.root(Target::Secondary).is_some());
        }
    }

    #[test]
    fn targets_share_nodes() {
        let catalog = TemplateCatalog::builtin();
        let def = &catalog.get(&TemplateId::new(DUAL_SCREEN)).unwrap().definition;
        assert_eq!(
            def.rooted_in(&ActionId::new(LAYOUT)),
            vec![Target::Primary, Target::Secondary]
        );
    }

    #[test]
    fn default_node_lookup() {
        let catalog = TemplateCatalog::builtin();
        let node = catalog
            .default_node(&TemplateId::new(DUAL_SCREEN), &ActionId::new(AUDIO))
            .unwrap();
        assert_eq!(node.enabled, Enablement::Off);
        assert!(catalog
            .default_node(&TemplateId::new(SINGLE_SCREEN), &ActionId::new(SECONDARY_APP))
            .is_none());
    }

    #[test]
    fn unknown_template_errors() {
        let catalog = TemplateCatalog::builtin();
        assert!(matches!(
            catalog.get(&TemplateId::new("triple-screen")),
            Err(DeckError::TemplateNotFound(_))
        ));
    }
}
