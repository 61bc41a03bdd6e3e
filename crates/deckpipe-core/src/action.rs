//! The closed set of concrete configuration values a pipeline can carry.
//!
//! New kinds of configuration are added as new `ActionValue` variants; every
//! `match` over the set is exhaustive, so adding one forces each consumer
//! (dependency declarations, the effect host, display) to handle it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::dependency::Dependency;

/// Window-manager script that positions emulator windows across screens.
pub const WINDOWING_SCRIPT: &str = "emulatorwindowing.js";

// ---------------------------------------------------------------------------
// ActionValue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ActionValue {
    DisplayConfig(DisplayConfig),
    WindowLayout(WindowLayout),
    AudioRouting(AudioRouting),
    LaunchHook(LaunchHook),
    LaunchOptions(LaunchOptions),
    SourceFile(SourceFile),
    SecondaryApp(SecondaryApp),
}

impl ActionValue {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionValue::DisplayConfig(_) => ActionKind::DisplayConfig,
            ActionValue::WindowLayout(_) => ActionKind::WindowLayout,
            ActionValue::AudioRouting(_) => ActionKind::AudioRouting,
            ActionValue::LaunchHook(_) => ActionKind::LaunchHook,
            ActionValue::LaunchOptions(_) => ActionKind::LaunchOptions,
            ActionValue::SourceFile(_) => ActionKind::SourceFile,
            ActionValue::SecondaryApp(_) => ActionKind::SecondaryApp,
        }
    }

    /// What must be present on the system for this value to be applied.
    pub fn dependencies(&self) -> Vec<Dependency> {
        match self {
            ActionValue::DisplayConfig(_) => {
                vec![Dependency::Command("xrandr".to_string())]
            }
            ActionValue::WindowLayout(_) => {
                vec![Dependency::Script(WINDOWING_SCRIPT.to_string())]
            }
            ActionValue::AudioRouting(a) => {
                let mut deps = vec![Dependency::Command("pactl".to_string())];
                if a.primary_sink.is_none() {
                    deps.push(Dependency::FieldNotSet("primary audio sink".to_string()));
                }
                deps
            }
            ActionValue::LaunchHook(h) => match &h.program {
                None => vec![Dependency::FieldNotSet("hook command".to_string())],
                Some(p) if p.contains('/') => vec![Dependency::File(PathBuf::from(p))],
                Some(p) => vec![Dependency::Command(p.clone())],
            },
            ActionValue::LaunchOptions(_) => vec![],
            ActionValue::SourceFile(s) => match &s.source {
                FileSource::Flatpak { package, .. } => vec![Dependency::Package(package.clone())],
                FileSource::Custom { path: Some(p), .. } => vec![Dependency::File(p.clone())],
                FileSource::Custom { path: None, .. } => {
                    vec![Dependency::FieldNotSet("custom file".to_string())]
                }
            },
            ActionValue::SecondaryApp(app) => match &app.source {
                SecondaryAppSource::Flatpak { package, .. } => {
                    vec![Dependency::Package(package.clone())]
                }
                SecondaryAppSource::Preset { preset } => vec![Dependency::Preset(preset.clone())],
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    DisplayConfig,
    WindowLayout,
    AudioRouting,
    LaunchHook,
    LaunchOptions,
    SourceFile,
    SecondaryApp,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::DisplayConfig => "display_config",
            ActionKind::WindowLayout => "window_layout",
            ActionKind::AudioRouting => "audio_routing",
            ActionKind::LaunchHook => "launch_hook",
            ActionKind::LaunchOptions => "launch_options",
            ActionKind::SourceFile => "source_file",
            ActionKind::SecondaryApp => "secondary_app",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Variant payloads
// ---------------------------------------------------------------------------

/// Resolution and placement of the external display while the app runs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub external: ExternalDisplaySettings,
    /// Where the built-in screen sits relative to the external one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deck_location: Option<RelativeLocation>,
    #[serde(default)]
    pub deck_is_primary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExternalDisplaySettings {
    /// Leave whatever resolution was active before setup.
    #[default]
    Previous,
    Native,
    /// Highest mode within `width` x `height` at `refresh` Hz.
    Limited { width: u16, height: u16, refresh: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativeLocation {
    Above,
    #[default]
    Below,
    LeftOf,
    RightOf,
    SameAs,
}

/// Screen layout written into an emulator's settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowLayout {
    pub layout: LayoutOption,
    #[serde(default)]
    pub swap_screens: bool,
    #[serde(default)]
    pub fullscreen: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutOption {
    #[default]
    SeparateWindows,
    SingleScreen,
    HybridScreen,
    SideBySide,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioRouting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_sink: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_sink: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mic_source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookStage {
    #[default]
    BeforeLaunch,
    AfterExit,
}

/// A user command run around the launch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LaunchHook {
    #[serde(default)]
    pub stage: HookStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

/// Launch options applied to the app for the duration of the session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LaunchOptions {
    pub options: String,
}

/// Which settings file an emulator configuration edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub source: FileSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileSource {
    /// The settings file at its default location inside a flatpak install.
    Flatpak {
        package: String,
        relative_path: PathBuf,
    },
    Custom {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
        #[serde(default)]
        valid_ext: Vec<String>,
    },
}

/// A second application shown on the other screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryApp {
    pub source: SecondaryAppSource,
    #[serde(default)]
    pub windowing: SecondaryWindowing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SecondaryAppSource {
    Flatpak {
        package: String,
        #[serde(default)]
        args: Vec<String>,
    },
    Preset { preset: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondaryWindowing {
    #[default]
    Fullscreen,
    Windowed,
    Minimized,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<DisplayConfig> for ActionValue {
    fn from(value: DisplayConfig) -> Self {
        ActionValue::DisplayConfig(value)
    }
}

impl From<WindowLayout> for ActionValue {
    fn from(value: WindowLayout) -> Self {
        ActionValue::WindowLayout(value)
    }
}

impl From<AudioRouting> for ActionValue {
    fn from(value: AudioRouting) -> Self {
        ActionValue::AudioRouting(value)
    }
}

impl From<LaunchHook> for ActionValue {
    fn from(value: LaunchHook) -> Self {
        ActionValue::LaunchHook(value)
    }
}

impl From<LaunchOptions> for ActionValue {
    fn from(value: LaunchOptions) -> Self {
        ActionValue::LaunchOptions(value)
    }
}

impl From<SourceFile> for ActionValue {
    fn from(value: SourceFile) -> Self {
        ActionValue::SourceFile(value)
    }
}

impl From<SecondaryApp> for ActionValue {
    fn from(value: SecondaryApp) -> Self {
        ActionValue::SecondaryApp(value)
    }
}
