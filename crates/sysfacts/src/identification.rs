//! Machine identification - concurrent hardware-identity probes.
//!
//! The fast identifier probes run on blocking worker tasks at the same
//! time; every result is marshaled over a channel to one collector task
//! that owns the result struct, so the shared fields only ever have a
//! single writer. The machine-id probe runs strictly after all fast
//! probes have finished.
//!
//! Probes have no timeout: a hung probe hangs the whole invocation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Blocking probes for the six machine identifiers.
///
/// Implementations decide per-field resilience; an `Err` from any probe
/// is fatal for the whole identification run.
pub trait IdentitySource: Send + Sync + 'static {
    fn cpu_id(&self) -> Result<String>;
    fn gpu_id(&self) -> Result<String>;
    fn hard_drive_id(&self) -> Result<String>;
    fn mac_id(&self) -> Result<String>;
    fn motherboard_id(&self) -> Result<String>;
    fn machine_id(&self) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdentityField {
    Cpu,
    Gpu,
    HardDrive,
    Mac,
    Motherboard,
    Machine,
}

/// The fast probes, launched concurrently ahead of the machine id.
const FAST_FIELDS: [IdentityField; 5] = [
    IdentityField::Cpu,
    IdentityField::Gpu,
    IdentityField::HardDrive,
    IdentityField::Mac,
    IdentityField::Motherboard,
];

/// Identification result. Fields are filled independently and stay empty
/// when their probe never delivered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineIdentification {
    pub cpu_id: String,
    pub gpu_id: String,
    pub hard_drive_id: String,
    pub mac_id: String,
    pub motherboard_id: String,
    pub machine_id: String,
}

impl MachineIdentification {
    fn set(&mut self, field: IdentityField, value: String) {
        match field {
            IdentityField::Cpu => self.cpu_id = value,
            IdentityField::Gpu => self.gpu_id = value,
            IdentityField::HardDrive => self.hard_drive_id = value,
            IdentityField::Mac => self.mac_id = value,
            IdentityField::Motherboard => self.motherboard_id = value,
            IdentityField::Machine => self.machine_id = value,
        }
    }
}

/// Runs the identity probes of an [`IdentitySource`] and assembles the
/// [`MachineIdentification`].
pub struct IdentificationAggregator<S> {
    source: Arc<S>,
    busy: Arc<AtomicBool>,
}

impl<S: IdentitySource> IdentificationAggregator<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True while an identification run is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Run the fast probes concurrently, then the machine-id probe.
    ///
    /// The machine id is sequenced after the barrier so the cheap probes
    /// are not displayed with inflated timings; nothing in it depends on
    /// the other fields, so it could join the concurrent batch if that
    /// ordering ever stops mattering.
    pub async fn run(&self) -> Result<MachineIdentification> {
        self.busy.store(true, Ordering::SeqCst);
        let result = self.run_probes().await;
        self.busy.store(false, Ordering::SeqCst);
        result
    }

    async fn run_probes(&self) -> Result<MachineIdentification> {
        debug!("Starting machine identification");

        let (tx, mut rx) = mpsc::unbounded_channel::<(IdentityField, String)>();

        // Single consumer owns the result struct; workers never touch it.
        let collector = tokio::spawn(async move {
            let mut identification = MachineIdentification::default();
            while let Some((field, value)) = rx.recv().await {
                identification.set(field, value);
            }
            identification
        });

        let mut workers = Vec::with_capacity(FAST_FIELDS.len());
        for field in FAST_FIELDS {
            workers.push(tokio::spawn(probe_into(
                self.source.clone(),
                field,
                tx.clone(),
            )));
        }

        // Barrier: the machine-id probe must not start until every fast
        // probe has delivered.
        for worker in workers {
            worker.await.context("identity probe task panicked")??;
        }

        probe_into(self.source.clone(), IdentityField::Machine, tx.clone()).await?;

        drop(tx);
        let identification = collector
            .await
            .context("identification collector panicked")?;

        debug!("Machine identification complete");
        Ok(identification)
    }
}

/// Run one blocking probe on a worker thread and marshal its result to
/// the collector.
async fn probe_into<S: IdentitySource>(
    source: Arc<S>,
    field: IdentityField,
    tx: mpsc::UnboundedSender<(IdentityField, String)>,
) -> Result<()> {
    let value = tokio::task::spawn_blocking(move || probe(&*source, field))
        .await
        .context("identity probe task panicked")??;
    let _ = tx.send((field, value));
    Ok(())
}

fn probe<S: IdentitySource>(source: &S, field: IdentityField) -> Result<String> {
    match field {
        IdentityField::Cpu => source.cpu_id(),
        IdentityField::Gpu => source.gpu_id(),
        IdentityField::HardDrive => source.hard_drive_id(),
        IdentityField::Mac => source.mac_id(),
        IdentityField::Motherboard => source.motherboard_id(),
        IdentityField::Machine => source.machine_id(),
    }
}
