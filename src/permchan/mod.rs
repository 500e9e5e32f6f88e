//! Permanent channels (`+P`) and their snapshot database.
//!
//! - [`escape`]: attribute value escaping
//! - [`codec`]: snapshot text format, versions 1 and 2
//! - [`store`]: gathering live state into records and replaying records
//! - [`writer`]: temp file + rename writes
//! - [`scheduler`]: dirty flag, flush timer and backoff
//! - [`gate`]: one-shot startup load
//! - [`marker`]: the `+P` mode and its registry hooks
//! - [`seed`]: `[[permchannels]]` config blocks
//!
//! [`PermChannels`] ties them together for the host.

pub mod codec;
pub mod escape;
pub mod gate;
pub mod marker;
pub mod scheduler;
pub mod seed;
pub mod store;
pub mod writer;

use crate::config::{Config, PermChannelBlock};
use crate::error::{ChannelError, LoadError, PersistError};
use crate::state::{ChannelRegistry, ServerList};
use chrono::Utc;
use codec::{EncodeOptions, FormatVersion};
use gate::{GateOutcome, InitGate};
use marker::{DirtyFlag, PermanenceHooks, PermanentMode};
use scheduler::{FlushPolicy, FlushScheduler, TickOutcome};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use store::LoadReport;
use tracing::{debug, info, warn};
use writer::{AtomicFileWriter, SnapshotWriter};

/// Name and version stamped into snapshot headers.
pub const GENERATOR: &str = concat!("slircd-permchan ", env!("CARGO_PKG_VERSION"));

/// Resolved `[permchanneldb]` settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistSettings {
    /// Snapshot path; `None` disables writing.
    pub target: Option<PathBuf>,
    pub list_modes: bool,
    pub oper_only: bool,
    pub version: FormatVersion,
    pub policy: FlushPolicy,
}

impl PersistSettings {
    pub fn from_config(config: &Config) -> Self {
        let db = &config.permchanneldb;
        Self {
            target: db.target_path(&config.server.config_dir),
            list_modes: db.listmodes,
            oper_only: db.operonly,
            version: FormatVersion::from_number(db.writeversion.clamp(1, 2))
                .unwrap_or(FormatVersion::V2),
            policy: FlushPolicy {
                base: db.saveperiod,
                backoff: db.backoff,
                max: db.max_backoff(),
            },
        }
    }
}

/// Permanent channel persistence for one server.
pub struct PermChannels {
    settings: PersistSettings,
    marker: PermanentMode,
    dirty: DirtyFlag,
    scheduler: FlushScheduler,
    gate: InitGate,
    writer: Box<dyn SnapshotWriter>,
    seeds: Vec<PermChannelBlock>,
}

impl PermChannels {
    pub fn new(config: &Config) -> Self {
        Self::with_writer(config, Box::new(AtomicFileWriter))
    }

    pub fn with_writer(config: &Config, writer: Box<dyn SnapshotWriter>) -> Self {
        let settings = PersistSettings::from_config(config);
        let dirty = DirtyFlag::default();
        Self {
            marker: PermanentMode::new(settings.oper_only),
            scheduler: FlushScheduler::new(settings.policy, dirty.clone()),
            dirty,
            gate: InitGate::new(),
            writer,
            seeds: config.permchannels.clone(),
            settings,
        }
    }

    /// Register `+P` and the persistence hooks with the registry.
    pub fn install(&self, registry: &mut ChannelRegistry) -> Result<(), ChannelError> {
        registry.register_mode(self.marker.spec())?;
        registry.add_observer(Arc::new(PermanenceHooks::new(
            self.marker,
            self.dirty.clone(),
        )));
        Ok(())
    }

    /// Apply a rehashed config. Pending changes stay pending.
    pub fn reconfigure(&mut self, config: &Config, registry: &mut ChannelRegistry) {
        self.settings = PersistSettings::from_config(config);
        self.marker.set_oper_only(self.settings.oper_only);
        registry.set_oper_only(self.marker.letter(), self.settings.oper_only);
        self.scheduler.reconfigure(self.settings.policy);
        self.seeds = config.permchannels.clone();
        debug!(interval = ?self.settings.policy.base, "Permanent channel settings reloaded");
    }

    pub fn marker(&self) -> &PermanentMode {
        &self.marker
    }

    /// Delay until the host should call [`tick`](Self::tick) again.
    pub fn interval(&self) -> Duration {
        self.scheduler.interval()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.is_set()
    }

    /// Render the current snapshot text.
    pub fn snapshot(&self, registry: &ChannelRegistry, now: i64) -> String {
        render_snapshot(registry, &self.settings, &self.marker, now)
    }

    /// Timer callback: flush if dirty, back off on failure.
    pub fn tick(&mut self, registry: &ChannelRegistry) -> TickOutcome {
        let Self {
            settings,
            marker,
            scheduler,
            writer,
            ..
        } = self;
        let outcome =
            scheduler.tick(|| write_database(registry, settings, marker, &**writer));
        crate::metrics::set_flush_interval(scheduler.interval());
        outcome
    }

    /// Host signal: every mode provider is registered. Loads the snapshot
    /// and seed blocks the first time only, and only when unlinked.
    pub fn on_collaborators_ready(
        &mut self,
        registry: &mut ChannelRegistry,
        servers: &dyn ServerList,
    ) -> GateOutcome {
        let Self {
            gate,
            settings,
            marker,
            seeds,
            ..
        } = self;
        gate.fire(servers, || {
            load_database(registry, settings, marker, seeds, Utc::now().timestamp())
        })
    }
}

fn render_snapshot(
    registry: &ChannelRegistry,
    settings: &PersistSettings,
    marker: &PermanentMode,
    now: i64,
) -> String {
    let records = store::gather_durable(registry, marker, settings.list_modes);
    codec::encode(
        &records,
        &EncodeOptions {
            version: settings.version,
            list_modes: settings.list_modes,
            generated_at: now,
            generator: GENERATOR,
        },
    )
}

fn write_database(
    registry: &ChannelRegistry,
    settings: &PersistSettings,
    marker: &PermanentMode,
    writer: &dyn SnapshotWriter,
) -> Result<(), PersistError> {
    let Some(path) = settings.target.as_deref() else {
        return Ok(());
    };
    let snapshot = render_snapshot(registry, settings, marker, Utc::now().timestamp());
    match writer.write(path, snapshot.as_bytes()) {
        Ok(()) => {
            crate::metrics::record_flush();
            Ok(())
        }
        Err(e) => {
            crate::metrics::record_flush_failure(&e);
            Err(e)
        }
    }
}

/// Read a snapshot file. A missing file is an empty snapshot.
pub fn read_snapshot(path: &Path) -> Result<Vec<codec::ChannelRecord>, LoadError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(codec::decode_bytes(&bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(LoadError::DecodeUnavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// Snapshot file first, then seed blocks; the first source to create a
/// channel wins.
fn load_database(
    registry: &mut ChannelRegistry,
    settings: &PersistSettings,
    marker: &PermanentMode,
    seeds: &[PermChannelBlock],
    now: i64,
) -> LoadReport {
    let mut report = LoadReport::default();

    if let Some(path) = settings.target.as_deref() {
        match read_snapshot(path) {
            Ok(records) => report.merge(store::load_records(&records, registry, marker, now)),
            Err(e) => {
                warn!(error = %e, "Treating permanent channel database as empty");
                crate::metrics::record_load_error(&e);
            }
        }
    }

    let seed_records: Vec<_> = seeds.iter().map(seed::seed_record).collect();
    report.merge(store::load_records(&seed_records, registry, marker, now));

    info!(
        created = report.created,
        already_live = report.already_live,
        rejected = report.rejected,
        skipped_items = report.skipped_items,
        "Loaded permanent channels"
    );
    report
}
