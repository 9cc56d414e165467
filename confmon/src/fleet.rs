//! Fleet run: capture every device, archive the changes, commit once.
//!
//! A run walks the inventory in order. Each device is connected, its running
//! configuration captured and written to the archive, and the new text is
//! compared with the snapshot that was on disk when the run started. Changed
//! snapshots are staged; at the end of the run all of them go into a single
//! commit and a single push. One device failing never stops the others.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;

use futures_util::stream::{self, StreamExt};
use futures_util::FutureExt;
use log::{debug, error, info, warn};

use crate::archive::{Snapshot, SnapshotArchive};
use crate::device::Device;
use crate::differ::{ChangeResult, Differ};
use crate::error::{Error, Result};
use crate::inventory::Inventory;
use crate::repository::{CommitOutcome, Repository};
use crate::session::SessionFactory;

/// Names of the devices that changed in this run, in inventory order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    devices: Vec<String>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device. A name is only recorded once.
    pub fn push(&mut self, device: impl Into<String>) {
        let device = device.into();
        if !self.devices.contains(&device) {
            self.devices.push(device);
        }
    }

    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Commit message naming every changed device, `None` if nothing changed.
    pub fn commit_message(&self) -> Option<String> {
        match self.devices.as_slice() {
            [] => None,
            [single] => Some(format!("Device {single} was updated")),
            many => Some(format!("Devices updated: {}", many.join(", "))),
        }
    }
}

/// What happened to one device.
#[derive(Debug)]
pub enum DeviceOutcome {
    Changed,
    Unchanged,
    Failed(Error),
}

impl fmt::Display for DeviceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceOutcome::Changed => f.write_str("changed"),
            DeviceOutcome::Unchanged => f.write_str("unchanged"),
            DeviceOutcome::Failed(e) => write!(f, "failed ({}): {}", e.kind(), e),
        }
    }
}

#[derive(Debug)]
pub struct DeviceReport {
    pub device: String,
    pub outcome: DeviceOutcome,
}

/// Result of a whole run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// One report per device, in inventory order.
    pub devices: Vec<DeviceReport>,

    /// `None` when nothing changed and the repository was not touched.
    pub commit: Option<CommitOutcome>,

    /// Commit and push problems. They do not fail the run.
    pub warnings: Vec<String>,
}

impl RunSummary {
    fn names<'a>(
        &'a self,
        keep: impl Fn(&DeviceOutcome) -> bool + 'a,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.devices
            .iter()
            .filter(move |r| keep(&r.outcome))
            .map(|r| r.device.as_str())
    }

    pub fn changed(&self) -> impl Iterator<Item = &str> {
        self.names(|o| matches!(o, DeviceOutcome::Changed))
    }

    pub fn unchanged(&self) -> impl Iterator<Item = &str> {
        self.names(|o| matches!(o, DeviceOutcome::Unchanged))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.devices.iter().filter_map(|r| match &r.outcome {
            DeviceOutcome::Failed(e) => Some((r.device.as_str(), e)),
            _ => None,
        })
    }

    pub fn outcome(&self, device: &str) -> Option<&DeviceOutcome> {
        self.devices
            .iter()
            .find(|r| r.device == device)
            .map(|r| &r.outcome)
    }

    /// Write the end-of-run summary to the log.
    pub fn log(&self) {
        let changed: Vec<_> = self.changed().collect();
        let unchanged: Vec<_> = self.unchanged().collect();
        let failed: Vec<_> = self.failed().collect();

        info!(
            "run complete: {} changed, {} unchanged, {} failed",
            changed.len(),
            unchanged.len(),
            failed.len()
        );
        if !changed.is_empty() {
            info!("  changed: {}", changed.join(", "));
        }
        if !unchanged.is_empty() {
            info!("  unchanged: {}", unchanged.join(", "));
        }
        for (device, e) in &failed {
            warn!("  failed: {} ({}): {}", device, e.kind(), e);
        }
        for warning in &self.warnings {
            warn!("  {}", warning);
        }
    }
}

/// Runs the snapshot, diff and commit cycle over a device list.
#[derive(Debug, Clone)]
pub struct FleetOrchestrator {
    devices: Vec<Device>,
    archive: SnapshotArchive,
    concurrency: usize,
}

impl FleetOrchestrator {
    pub fn new(devices: Vec<Device>, archive_root: impl Into<PathBuf>) -> Self {
        Self {
            devices,
            archive: SnapshotArchive::new(archive_root),
            concurrency: 1,
        }
    }

    pub fn from_inventory(inventory: &Inventory) -> Self {
        Self::new(inventory.devices.clone(), inventory.archive_root.clone())
    }

    /// Number of devices captured at once. 1 (the default) is sequential.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn archive(&self) -> &SnapshotArchive {
        &self.archive
    }

    /// Run one cycle over every device.
    ///
    /// Only a failure to prepare the repository is returned as an error.
    /// Device failures are recorded in the summary, and commit or push
    /// failures become summary warnings.
    pub async fn run<F, D, R>(
        &self,
        factory: &F,
        differ: &D,
        repository: &mut R,
    ) -> Result<RunSummary>
    where
        F: SessionFactory,
        D: Differ,
        R: Repository,
    {
        repository.prepare().await?;

        // Comparison copies, taken before any device is contacted
        let previous: Vec<Result<Option<String>>> = self
            .devices
            .iter()
            .map(|d| self.archive.load_previous(&d.name))
            .collect();

        let jobs = self
            .devices
            .iter()
            .zip(previous)
            .map(|(device, previous)| async move {
                let result = match previous {
                    Ok(previous) => capture_isolated(device, factory)
                        .await
                        .map(|text| (previous, text)),
                    Err(e) => Err(e),
                };
                (device, result)
            });
        let mut captures = std::pin::pin!(stream::iter(jobs).buffered(self.concurrency));

        let mut changes = ChangeSet::new();
        let mut summary = RunSummary::default();
        while let Some((device, result)) = captures.next().await {
            let outcome = match result {
                Ok((previous, text)) => self
                    .record(device, previous, text, differ, repository, &mut changes)
                    .await
                    .unwrap_or_else(DeviceOutcome::Failed),
                Err(e) => DeviceOutcome::Failed(e),
            };

            match &outcome {
                DeviceOutcome::Failed(e) => error!("{}: {} failure: {}", device.name, e.kind(), e),
                other => info!("{}: {}", device.name, other),
            }
            summary.devices.push(DeviceReport {
                device: device.name.clone(),
                outcome,
            });
        }

        if let Some(message) = changes.commit_message() {
            self.publish(&message, repository, &mut summary).await;
        } else {
            info!("no configuration changes, repository untouched");
        }

        summary.log();
        Ok(summary)
    }

    /// Persist a captured configuration, compare it and stage it if changed.
    async fn record<D: Differ, R: Repository>(
        &self,
        device: &Device,
        previous: Option<String>,
        text: String,
        differ: &D,
        repository: &mut R,
        changes: &mut ChangeSet,
    ) -> Result<DeviceOutcome> {
        let snapshot = Snapshot::new(device.name.clone(), text);
        let path = self.archive.persist(&snapshot)?;

        match differ.compare(previous.as_deref(), &snapshot.text) {
            ChangeResult::Unchanged => Ok(DeviceOutcome::Unchanged),
            ChangeResult::Changed { delta } => {
                debug!("{}: configuration delta\n{}", device.name, delta);
                if let Err(e) = repository.stage(&path).await {
                    self.restore(device, previous);
                    return Err(e);
                }
                changes.push(device.name.clone());
                Ok(DeviceOutcome::Changed)
            }
        }
    }

    /// Put the previous snapshot back so an unstaged change is seen again
    /// on the next run.
    fn restore(&self, device: &Device, previous: Option<String>) {
        let result = match previous {
            Some(text) => self
                .archive
                .persist(&Snapshot::new(device.name.clone(), text))
                .map(|_| ()),
            None => self.archive.remove(&device.name),
        };
        if let Err(e) = result {
            warn!("{}: could not restore previous snapshot: {}", device.name, e);
        }
    }

    async fn publish<R: Repository>(
        &self,
        message: &str,
        repository: &mut R,
        summary: &mut RunSummary,
    ) {
        match repository.commit(message).await {
            Ok(CommitOutcome::Committed) => {
                summary.commit = Some(CommitOutcome::Committed);
                if let Err(e) = repository.push().await {
                    warn!("push failed: {}", e);
                    summary.warnings.push(format!("push failed: {e}"));
                }
            }
            Ok(CommitOutcome::NothingToCommit) => {
                summary.commit = Some(CommitOutcome::NothingToCommit);
            }
            Err(e) => {
                warn!("commit failed: {}", e);
                summary.warnings.push(format!("commit failed: {e}"));
            }
        }
    }
}

/// Connect, capture and disconnect one device.
async fn capture<F: SessionFactory>(device: &Device, factory: &F) -> Result<String> {
    let mut connection = device.connect(factory).await?;
    let captured = connection.capture_running_config().await;
    connection.disconnect().await;
    captured
}

/// [`capture`], with a panic in the session turned into `Error::Fault`.
async fn capture_isolated<F: SessionFactory>(device: &Device, factory: &F) -> Result<String> {
    AssertUnwindSafe(capture(device, factory))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(Error::Fault(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
