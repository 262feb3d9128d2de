//! Unused-space erasure: the phase pipeline for one volume.
//!
//! ```text
//! PrivilegeCheck ─► Advisory ─► [ClusterTips] ─► BulkFill ─► ResidentFiles
//!                                                    │              │
//!                                                    └─► Cleanup ◄──┘ (always)
//!                                                           │
//!                                                           ▼
//!                                              DirectoryStructures ─► Done
//! ```
//!
//! Step weights within the target's share: cluster tips 0.0 (search) + 0.1
//! (erase), bulk fill 0.8 (0.9 when tips are skipped), resident files 0.05,
//! cleanup 0.0, directory structures 0.05.

use super::free_space_fill::FreeSpaceFill;
use super::workspace::Workspace;
use super::{ErasureTarget, Services, TargetKind};
use crate::algorithms::ErasureMethod;
use crate::crypto::Prng;
use crate::filesystem::FileSystem;
use crate::progress::{
    Progress, ProgressDetail, ProgressManager, ProgressStep, SteppedProgressManager,
};
use crate::task::TaskContext;
use crate::volume::Volume;
use crate::{WipeError, WipeResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

pub const CLUSTER_TIP_SEARCH_WEIGHT: f32 = 0.0;
pub const CLUSTER_TIP_ERASE_WEIGHT: f32 = 0.1;
pub const FILL_WEIGHT_WITH_TIPS: f32 = 0.8;
pub const FILL_WEIGHT_WITHOUT_TIPS: f32 = 0.9;
pub const RESIDENT_FILES_WEIGHT: f32 = 0.05;
pub const CLEANUP_WEIGHT: f32 = 0.0;
pub const DIRECTORY_STRUCTURES_WEIGHT: f32 = 0.05;

/// Method id that defers to the configured default
pub const DEFAULT_METHOD: &str = "default";

const SEARCHING_TIPS: &str = "Searching for files' cluster tips...";
const ERASING_TIPS: &str = "Erasing cluster tips...";
const ERASING_UNUSED_SPACE: &str = "Erasing unused space...";
const ERASING_RESIDENT_FILES: &str = "Erasing old resident file system table files...";
const REMOVING_TEMPORARY_FILES: &str = "Removing temporary files...";
const ERASING_DIRECTORY_STRUCTURES: &str = "Erasing unused directory structures...";

/// Versioned configuration of an unused-space target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnusedSpaceConfig {
    /// Any path on the volume to erase
    pub drive: PathBuf,
    #[serde(default)]
    pub erase_cluster_tips: bool,
    /// Method id; `None` or `"default"` uses the configured default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

/// Everything the phases share once the pre-flight checks passed
struct Run<'a, 'c> {
    ctx: &'a TaskContext<'c>,
    progress: &'a SteppedProgressManager,
    volume: &'a dyn Volume,
    filesystem: &'a dyn FileSystem,
    method: &'a dyn ErasureMethod,
    prng: &'a mut dyn Prng,
    drive: String,
}

#[derive(Debug)]
pub struct UnusedSpaceTarget {
    config: UnusedSpaceConfig,
    services: Services,
    progress: Option<Arc<SteppedProgressManager>>,
}

impl UnusedSpaceTarget {
    pub fn new(config: UnusedSpaceConfig, services: Services) -> Self {
        Self {
            config,
            services,
            progress: None,
        }
    }

    pub fn config(&self) -> &UnusedSpaceConfig {
        &self.config
    }

    /// The method this target will run with: its own, or the configured default
    pub fn effective_method(&self) -> WipeResult<Arc<dyn ErasureMethod>> {
        let id = match self.config.method.as_deref() {
            None | Some(DEFAULT_METHOD) => {
                self.services.settings.default_unused_space_method.as_str()
            }
            Some(id) => id,
        };
        self.services.methods.get(id)
    }

    pub fn supports_method(&self, method: &dyn ErasureMethod) -> bool {
        method.supports_unused_space()
    }

    fn run_phases(&self, run: &mut Run<'_, '_>) -> WipeResult<()> {
        if self.config.erase_cluster_tips {
            run.ctx.check_canceled()?;
            erase_cluster_tips(run)?;
        }

        run.ctx.check_canceled()?;
        let platform = self.services.platform.as_ref();
        let workspace = Workspace::create(run.filesystem, run.volume.mount_point(), platform)?;

        let outcome = self.fill_and_erase_resident(run, &workspace);

        let cleanup_step = run.progress.add_leaf(CLEANUP_WEIGHT, REMOVING_TEMPORARY_FILES);
        run.ctx.report(
            REMOVING_TEMPORARY_FILES,
            &*cleanup_step,
            &ProgressDetail::item(workspace.path().display().to_string()),
        );
        let cleanup = workspace.close();
        cleanup_step.mark_complete();

        outcome.and(cleanup)?;

        run.ctx.check_canceled()?;
        erase_directory_structures(run)
    }

    fn fill_and_erase_resident(
        &self,
        run: &mut Run<'_, '_>,
        workspace: &Workspace<'_>,
    ) -> WipeResult<()> {
        if run.volume.clear_compression(workspace.path())? {
            tracing::info!(
                path = %workspace.path().display(),
                "Cleared compression on working directory"
            );
        }
        workspace.suspend_notifications();

        let fill_weight = if self.config.erase_cluster_tips {
            FILL_WEIGHT_WITH_TIPS
        } else {
            FILL_WEIGHT_WITHOUT_TIPS
        };
        let fill_step = run.progress.add_leaf(fill_weight, ERASING_UNUSED_SPACE);
        let detail_item = run.drive.clone();
        let passes = run.method.passes();
        let ctx = run.ctx;

        let fill = FreeSpaceFill {
            volume: run.volume,
            filesystem: run.filesystem,
            method: run.method,
            work_dir: workspace.path(),
            fill_unit: self.services.settings.fill_unit_bytes,
        };
        let summary = fill.run(&mut *run.prng, &fill_step, &mut |step, pass| {
            ctx.check_canceled()?;
            ctx.report(
                ERASING_UNUSED_SPACE,
                step,
                &ProgressDetail::pass(detail_item.as_str(), pass, passes),
            );
            Ok(())
        })?;
        tracing::info!(
            drive = %run.drive,
            files = summary.files,
            bytes = summary.allocated,
            "Unused space filled"
        );

        run.ctx.check_canceled()?;
        erase_resident_files(run, workspace)
    }
}

fn erase_cluster_tips(run: &mut Run<'_, '_>) -> WipeResult<()> {
    let search_step = run.progress.add_leaf(CLUSTER_TIP_SEARCH_WEIGHT, SEARCHING_TIPS);
    let erase_step = run.progress.add_leaf(CLUSTER_TIP_ERASE_WEIGHT, ERASING_TIPS);
    let ctx = run.ctx;

    run.filesystem.erase_cluster_tips(
        run.volume,
        run.method,
        &mut *run.prng,
        &mut |path| {
            ctx.check_canceled()?;
            ctx.report(
                SEARCHING_TIPS,
                &*search_step,
                &ProgressDetail::item(path.display().to_string()),
            );
            Ok(())
        },
        &mut |current, total, path| {
            search_step.mark_complete();
            ctx.check_canceled()?;
            erase_step.set_total(total as u64);
            erase_step.set_completed(current as u64);
            ctx.report(
                ERASING_TIPS,
                &*erase_step,
                &ProgressDetail::item(path.display().to_string()),
            );
            Ok(())
        },
    )?;

    search_step.mark_complete();
    erase_step.mark_complete();
    Ok(())
}

fn erase_resident_files(run: &mut Run<'_, '_>, workspace: &Workspace<'_>) -> WipeResult<()> {
    let step = run.progress.add_leaf(RESIDENT_FILES_WEIGHT, ERASING_RESIDENT_FILES);
    let ctx = run.ctx;
    let drive = run.drive.as_str();

    run.filesystem.erase_old_resident_files(
        run.volume,
        workspace.path(),
        run.method,
        &mut *run.prng,
        &mut |current, total| counted(ctx, &step, ERASING_RESIDENT_FILES, drive, current, total),
    )?;

    step.mark_complete();
    Ok(())
}

fn erase_directory_structures(run: &mut Run<'_, '_>) -> WipeResult<()> {
    let step = run
        .progress
        .add_leaf(DIRECTORY_STRUCTURES_WEIGHT, ERASING_DIRECTORY_STRUCTURES);
    let ctx = run.ctx;
    let drive = run.drive.as_str();

    run.filesystem
        .erase_directory_structures(run.volume, &mut |current, total| {
            counted(ctx, &step, ERASING_DIRECTORY_STRUCTURES, drive, current, total)
        })?;

    step.mark_complete();
    Ok(())
}

/// Progress callback body for `(current, total)` phases
fn counted(
    ctx: &TaskContext<'_>,
    step: &ProgressManager,
    label: &str,
    drive: &str,
    current: usize,
    total: usize,
) -> WipeResult<()> {
    ctx.check_canceled()?;
    step.set_total(total as u64);
    step.set_completed(current as u64);
    ctx.report(label, step, &ProgressDetail::item(drive));
    Ok(())
}

impl ErasureTarget for UnusedSpaceTarget {
    fn kind(&self) -> TargetKind {
        TargetKind::UnusedSpace
    }

    fn ui_text(&self) -> String {
        format!("Unused disk space ({})", self.config.drive.display())
    }

    fn execute(&mut self, ctx: &TaskContext<'_>) -> WipeResult<()> {
        let services = self.services.clone();

        if !services.platform.is_elevated() {
            return Err(WipeError::InsufficientPrivileges(
                "erasing unused space requires administrative privileges".to_string(),
            ));
        }

        let volume = services.volumes.resolve(&self.config.drive)?;
        if services.platform.has_restore_points(volume.mount_point()) {
            ctx.log.warning(format!(
                "{} has system snapshots. Data in snapshots cannot be erased by unused space \
                 erasure; remove the snapshots to erase it.",
                volume.mount_point().display()
            ));
        }
        if volume.has_quota() {
            ctx.log.warning(format!(
                "{} has disk quotas active. The unused space may not be fully erased, since \
                 the quota limits how much space this process can fill.",
                volume.mount_point().display()
            ));
        }

        let method = self.effective_method()?;
        if !self.supports_method(method.as_ref()) {
            return Err(WipeError::UnsupportedMethod(method.id().to_string()));
        }
        let filesystem = services.filesystems.resolve(volume.fs_type());
        let mut prng = services.settings.active_prng.create()?;

        tracing::info!(
            drive = %self.config.drive.display(),
            method = method.id(),
            filesystem = filesystem.name(),
            prng = prng.name(),
            cluster_tips = self.config.erase_cluster_tips,
            "Erasing unused space"
        );

        let progress = Arc::new(SteppedProgressManager::new());
        ctx.steps.add_step(ProgressStep::new(
            progress.clone(),
            ctx.target_share(),
            self.ui_text(),
        ));
        self.progress = Some(progress.clone());

        let mut run = Run {
            ctx,
            progress: &progress,
            volume: volume.as_ref(),
            filesystem: filesystem.as_ref(),
            method: method.as_ref(),
            prng: prng.as_mut(),
            drive: self.config.drive.display().to_string(),
        };
        let result = self.run_phases(&mut run);

        if result.is_ok() {
            progress.mark_complete();
        }
        self.progress = None;
        result
    }

    fn progress(&self) -> Option<Arc<SteppedProgressManager>> {
        self.progress.clone()
    }
}
