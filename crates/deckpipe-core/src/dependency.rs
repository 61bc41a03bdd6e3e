//! Dependency declarations and the probe that checks them.
//!
//! Every `ActionValue` declares what it needs ([`Dependency`]). A
//! [`DependencyStatus`] collaborator turns those declarations into
//! [`DependencyError`]s; the Reifier attaches them to nodes as non-fatal
//! diagnostics.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::action::ActionValue;
use crate::config::DependencyConfig;
use crate::error::CollaboratorError;

// ---------------------------------------------------------------------------
// Dependency
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Dependency {
    /// An executable on `PATH`.
    Command(String),
    /// A regular file.
    File(PathBuf),
    Directory(PathBuf),
    /// Anything at this path.
    Path(PathBuf),
    /// A window-manager script, installed on demand.
    Script(String),
    /// A required configuration field the user has not filled in.
    FieldNotSet(String),
    /// An installed application package (flatpak id).
    Package(String),
    /// A secondary-app preset by id.
    Preset(String),
}

// ---------------------------------------------------------------------------
// DependencyError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyErrorKind {
    CommandMissing,
    PathNotFile,
    PathNotDirectory,
    PathMissing,
    ScriptMissing,
    ScriptInstallFailed,
    FieldUnset,
    PackageMissing,
    PresetMissing,
}

impl DependencyErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DependencyErrorKind::CommandMissing => "command-missing",
            DependencyErrorKind::PathNotFile => "path-not-file",
            DependencyErrorKind::PathNotDirectory => "path-not-directory",
            DependencyErrorKind::PathMissing => "path-missing",
            DependencyErrorKind::ScriptMissing => "script-missing",
            DependencyErrorKind::ScriptInstallFailed => "script-install-failed",
            DependencyErrorKind::FieldUnset => "field-unset",
            DependencyErrorKind::PackageMissing => "package-missing",
            DependencyErrorKind::PresetMissing => "preset-missing",
        }
    }
}

/// One unmet dependency of a node. `subject` names the missing thing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyError {
    pub kind: DependencyErrorKind,
    pub subject: String,
}

impl DependencyError {
    pub fn new(kind: DependencyErrorKind, subject: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
        }
    }
}

impl fmt::Display for DependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.subject;
        match self.kind {
            DependencyErrorKind::CommandMissing => write!(f, "command '{s}' not found"),
            DependencyErrorKind::PathNotFile => write!(f, "'{s}' is not a file"),
            DependencyErrorKind::PathNotDirectory => write!(f, "'{s}' is not a directory"),
            DependencyErrorKind::PathMissing => write!(f, "'{s}' does not exist"),
            DependencyErrorKind::ScriptMissing => write!(f, "script '{s}' not found"),
            DependencyErrorKind::ScriptInstallFailed => {
                write!(f, "script '{s}' could not be installed")
            }
            DependencyErrorKind::FieldUnset => write!(f, "'{s}' is not set"),
            DependencyErrorKind::PackageMissing => write!(f, "package '{s}' is not installed"),
            DependencyErrorKind::PresetMissing => write!(f, "preset '{s}' does not exist"),
        }
    }
}

// ---------------------------------------------------------------------------
// DependencyStatus collaborator
// ---------------------------------------------------------------------------

/// Checks an action's declared dependencies against the environment.
pub trait DependencyStatus {
    fn fetch_dependency_status(
        &self,
        value: &ActionValue,
    ) -> Result<Vec<DependencyError>, CollaboratorError>;
}

/// Probe that checks dependencies against the local machine.
#[derive(Debug, Clone)]
pub struct LocalDependencyStatus {
    script_source_dir: PathBuf,
    script_install_dir: PathBuf,
    package_dirs: Vec<PathBuf>,
    preset_dir: PathBuf,
}

impl LocalDependencyStatus {
    pub fn new(cfg: &DependencyConfig) -> Self {
        Self {
            script_source_dir: expand_home(&cfg.script_source_dir),
            script_install_dir: expand_home(&cfg.script_install_dir),
            package_dirs: cfg.package_dirs.iter().map(|d| expand_home(d)).collect(),
            preset_dir: expand_home(&cfg.preset_dir),
        }
    }

    fn check(&self, dep: &Dependency) -> Option<DependencyError> {
        use DependencyErrorKind as K;

        match dep {
            Dependency::Command(cmd) => which::which(cmd)
                .is_err()
                .then(|| DependencyError::new(K::CommandMissing, cmd)),
            Dependency::File(path) => check_path(path, Some(true)),
            Dependency::Directory(path) => check_path(path, Some(false)),
            Dependency::Path(path) => check_path(path, None),
            Dependency::Script(name) => self.ensure_script(name),
            Dependency::FieldNotSet(field) => Some(DependencyError::new(K::FieldUnset, field)),
            Dependency::Package(pkg) => (!self.package_dirs.iter().any(|d| d.join(pkg).is_dir()))
                .then(|| DependencyError::new(K::PackageMissing, pkg)),
            Dependency::Preset(preset) => (!self
                .preset_dir
                .join(format!("{preset}.yaml"))
                .is_file())
            .then(|| DependencyError::new(K::PresetMissing, preset)),
        }
    }

    /// A script counts as present once it is in the install dir; a missing
    /// install is repaired by copying it from the source dir.
    fn ensure_script(&self, name: &str) -> Option<DependencyError> {
        let installed = self.script_install_dir.join(name);
        if installed.is_file() {
            return None;
        }
        let source = self.script_source_dir.join(name);
        if !source.is_file() {
            return Some(DependencyError::new(
                DependencyErrorKind::ScriptMissing,
                name,
            ));
        }
        match crate::io::atomic_copy(&source, &installed) {
            Ok(()) => {
                tracing::info!(script = name, "installed window-manager script");
                None
            }
            Err(e) => {
                tracing::warn!(script = name, error = %e, "script install failed");
                Some(DependencyError::new(
                    DependencyErrorKind::ScriptInstallFailed,
                    name,
                ))
            }
        }
    }
}

impl DependencyStatus for LocalDependencyStatus {
    fn fetch_dependency_status(
        &self,
        value: &ActionValue,
    ) -> Result<Vec<DependencyError>, CollaboratorError> {
        Ok(value
            .dependencies()
            .iter()
            .filter_map(|d| self.check(d))
            .collect())
    }
}

fn check_path(path: &Path, want_file: Option<bool>) -> Option<DependencyError> {
    let subject = path.display().to_string();
    if !path.exists() {
        return Some(DependencyError::new(
            DependencyErrorKind::PathMissing,
            subject,
        ));
    }
    match want_file {
        Some(true) if !path.is_file() => Some(DependencyError::new(
            DependencyErrorKind::PathNotFile,
            subject,
        )),
        Some(false) if !path.is_dir() => Some(DependencyError::new(
            DependencyErrorKind::PathNotDirectory,
            subject,
        )),
        _ => None,
    }
}

/// Expand a leading `~/` against the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match home::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}
