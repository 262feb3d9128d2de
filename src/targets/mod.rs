//! Erasure targets: the units of work a task executes.
//!
//! Targets are built from a tagged [`TargetConfig`] through [`TargetConfig::into_target`],
//! which dispatches on the variant tag. Every collaborator a target needs comes
//! from the [`Services`] bundle.

pub mod free_space_fill;
pub mod unused_space;
pub mod workspace;


pub use free_space_fill::{FillSummary, FreeSpaceFill};
pub use unused_space::{UnusedSpaceConfig, UnusedSpaceTarget};
pub use workspace::Workspace;

use crate::algorithms::MethodRegistry;
use crate::config::Settings;
use crate::filesystem::FileSystemRegistry;
use crate::platform::{LocalPlatform, Platform};
use crate::progress::SteppedProgressManager;
use crate::task::TaskContext;
use crate::volume::{LocalVolumeResolver, VolumeResolver};
use crate::WipeResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    UnusedSpace,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::UnusedSpace => write!(f, "unused_space"),
        }
    }
}

/// One erasure job inside a task
pub trait ErasureTarget: Send + fmt::Debug {
    fn kind(&self) -> TargetKind;

    /// Operator-facing description
    fn ui_text(&self) -> String;

    /// Run to completion on the calling thread.
    ///
    /// Adds exactly one step of weight `ctx.target_share()` to `ctx.steps` once the
    /// pre-flight checks pass.
    fn execute(&mut self, ctx: &TaskContext<'_>) -> WipeResult<()>;

    /// The target's own progress tree while it is executing
    fn progress(&self) -> Option<Arc<SteppedProgressManager>>;
}

/// Serialized target, tagged by kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetConfig {
    UnusedSpace(UnusedSpaceConfig),
}

impl TargetConfig {
    pub fn kind(&self) -> TargetKind {
        match self {
            TargetConfig::UnusedSpace(_) => TargetKind::UnusedSpace,
        }
    }

    pub fn into_target(self, services: &Services) -> WipeResult<Box<dyn ErasureTarget>> {
        match self {
            TargetConfig::UnusedSpace(config) => {
                Ok(Box::new(UnusedSpaceTarget::new(config, services.clone())))
            }
        }
    }
}

/// Collaborators shared by all targets of a task
#[derive(Clone)]
pub struct Services {
    pub platform: Arc<dyn Platform>,
    pub volumes: Arc<dyn VolumeResolver>,
    pub filesystems: Arc<FileSystemRegistry>,
    pub methods: Arc<MethodRegistry>,
    pub settings: Arc<Settings>,
}

impl Services {
    /// Services backed by the running host
    pub fn local(settings: Settings, unsafe_mode: bool) -> Self {
        Self {
            platform: Arc::new(LocalPlatform::new().assume_elevated(unsafe_mode)),
            volumes: Arc::new(LocalVolumeResolver),
            filesystems: Arc::new(FileSystemRegistry::with_builtin(settings.resident_file_limit)),
            methods: Arc::new(MethodRegistry::with_builtin()),
            settings: Arc::new(settings),
        }
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("filesystems", &self.filesystems)
            .field("methods", &self.methods)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
