//! Maintenance commands behind the `vantage` binary.
//!
//! Each command works on plain paths and returns a short human-readable
//! summary, so the binary only parses arguments and prints.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use scene::{CoordinateSpace, ViewpointGraph};
use store::backend::parse_snapshot;
use store::{FileBackend, HotspotSnapshot, HotspotStore, SyncStatus};
use tracing::{debug, info};

/// Outcome of `vantage validate`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigReport {
    pub initial: String,
    pub viewpoints: Vec<ViewpointSummary>,
    /// Viewpoints no sequence of connections leads to from `initial`.
    pub unreachable: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewpointSummary {
    pub id: String,
    pub splat: bool,
    pub connections: usize,
    pub image_hotspots: usize,
    pub world_hotspots: usize,
}

impl fmt::Display for ConfigReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} viewpoints, initial {}",
            self.viewpoints.len(),
            self.initial
        )?;
        for vp in &self.viewpoints {
            writeln!(
                f,
                "  {:<16} {:<6} {} connections, {} image / {} world hotspots",
                vp.id,
                if vp.splat { "splat" } else { "image" },
                vp.connections,
                vp.image_hotspots,
                vp.world_hotspots
            )?;
        }
        for id in &self.unreachable {
            writeln!(f, "warning: {id} is not reachable from {}", self.initial)?;
        }
        Ok(())
    }
}

/// Loads and validates a viewpoint configuration file.
pub fn validate_config(path: &Path) -> Result<ConfigReport, String> {
    let graph = load_graph(path)?;

    let viewpoints = graph
        .iter()
        .map(|vp| {
            let world = vp
                .default_hotspots
                .iter()
                .filter(|h| h.placement.space() == CoordinateSpace::World)
                .count();
            ViewpointSummary {
                id: vp.id.clone(),
                splat: vp.has_splat(),
                connections: vp.connections.len(),
                image_hotspots: vp.default_hotspots.len() - world,
                world_hotspots: world,
            }
        })
        .collect();

    let reachable = reachable_from_initial(&graph);
    let unreachable = graph
        .iter()
        .filter(|vp| !reachable.contains(vp.id.as_str()))
        .map(|vp| vp.id.clone())
        .collect();

    Ok(ConfigReport {
        initial: graph.initial_id().to_string(),
        viewpoints,
        unreachable,
    })
}

fn reachable_from_initial(graph: &ViewpointGraph) -> BTreeSet<&str> {
    let mut seen = BTreeSet::new();
    let mut queue = VecDeque::from([graph.initial_id()]);
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        if let Some(vp) = graph.get(id) {
            queue.extend(vp.connections.values().map(String::as_str));
        }
    }
    seen
}

fn load_graph(path: &Path) -> Result<ViewpointGraph, String> {
    let raw = fs::read_to_string(path).map_err(|e| format!("read {path:?}: {e}"))?;
    ViewpointGraph::from_json_str(&raw).map_err(|e| format!("{}: {e}", path.display()))
}

/// Opens an existing data file; unlike the server, never seeds a new one
/// and never falls back to defaults when the file is corrupt.
fn open_existing(data: &Path) -> Result<HotspotStore<FileBackend>, String> {
    let raw = fs::read_to_string(data).map_err(|e| match e.kind() {
        ErrorKind::NotFound => format!("no hotspot data at {}", data.display()),
        _ => format!("read {data:?}: {e}"),
    })?;
    if !raw.trim().is_empty() {
        parse_snapshot(&raw).map_err(|e| format!("{}: {e}", data.display()))?;
    }
    let backend = FileBackend::open(data, HotspotSnapshot::new()).map_err(|e| e.to_string())?;
    let store = HotspotStore::new(backend, HotspotSnapshot::new());
    if store.is_stale() {
        return Err(format!("failed to read {}", data.display()));
    }
    Ok(store)
}

/// Serialized snapshot of every viewpoint in `data`.
pub fn export(data: &Path) -> Result<String, String> {
    let store = open_existing(data)?;
    debug!(path = %data.display(), viewpoints = store.snapshot().len(), "exporting");
    store.export_all().map_err(|e| e.to_string())
}

/// Replaces the contents of `data` with the snapshot at `snapshot`.
/// Returns the number of hotspots written.
pub fn import(data: &Path, snapshot: &Path) -> Result<usize, String> {
    let json = fs::read_to_string(snapshot).map_err(|e| format!("read {snapshot:?}: {e}"))?;
    let parsed = parse_snapshot(&json).map_err(|e| format!("{}: {e}", snapshot.display()))?;
    let backend = FileBackend::open(data, HotspotSnapshot::new()).map_err(|e| e.to_string())?;
    let mut store = HotspotStore::new(backend, HotspotSnapshot::new());
    match store.import_snapshot(parsed).map_err(|e| e.to_string())? {
        SyncStatus::Synced => {
            info!(path = %data.display(), "snapshot imported");
            Ok(count(store.snapshot()))
        }
        SyncStatus::Stale(_) => Err(format!("failed to write {}", data.display())),
    }
}

/// Restores `data` to the default hotspots declared in `config`.
/// Returns the number of hotspots written.
pub fn reset(data: &Path, config: &Path) -> Result<usize, String> {
    let defaults = load_graph(config)?.default_hotspots();
    let backend = FileBackend::open(data, defaults.clone()).map_err(|e| e.to_string())?;
    let mut store = HotspotStore::new(backend, defaults);
    match store.reset() {
        SyncStatus::Synced => Ok(count(store.snapshot())),
        SyncStatus::Stale(_) => Err(format!("failed to write {}", data.display())),
    }
}

fn count(snapshot: &HotspotSnapshot) -> usize {
    snapshot.values().map(Vec::len).sum()
}
