use std::io::Write;
use std::path::PathBuf;

use hollow_engine::sync::{
    Clock, FileStore, PeerRecord, SharedStore, SystemClock, DEFAULT_NAMESPACE,
    DEFAULT_STALE_THRESHOLD_MS,
};

pub const DEFAULT_STORE_DIR: &str = "gossip";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonOptions {
    pub store_dir: PathBuf,
    pub namespace: String,
    pub stale_ms: u64,
}

impl Default for CommonOptions {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            namespace: DEFAULT_NAMESPACE.to_string(),
            stale_ms: DEFAULT_STALE_THRESHOLD_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Peers,
    Messages { peer_id: String },
    Prune,
}

pub fn run<W: Write>(kind: CommandKind, opts: CommonOptions, stdout: &mut W) -> Result<(), String> {
    let store = FileStore::open(&opts.store_dir, &opts.namespace)
        .map_err(|error| format!("failed to open store: {error}"))?;
    run_against(&kind, &store, opts.stale_ms, SystemClock.now_ms(), stdout)
}

/// Runs `kind` against any store at a fixed `now_ms`.
pub fn run_against<W: Write>(
    kind: &CommandKind,
    store: &dyn SharedStore,
    stale_ms: u64,
    now_ms: u64,
    stdout: &mut W,
) -> Result<(), String> {
    match kind {
        CommandKind::Peers => {
            for (peer_id, bytes) in list(store)? {
                let line = match PeerRecord::decode(&bytes) {
                    Ok(record) => format_peer_line(&peer_id, &record, now_ms, stale_ms),
                    Err(error) => format!("{peer_id} malformed: {error}"),
                };
                write_line(stdout, &line)?;
            }
            Ok(())
        }
        CommandKind::Messages { peer_id } => {
            let bytes = store
                .get(peer_id)
                .map_err(|error| format!("failed to read peer '{peer_id}': {error}"))?
                .ok_or_else(|| format!("no record for peer '{peer_id}'"))?;
            let record = PeerRecord::decode(&bytes)
                .map_err(|error| format!("record for peer '{peer_id}' is malformed: {error}"))?;
            for message in &record.messages {
                let data = serde_json::to_string(&message.data)
                    .map_err(|error| format!("failed to encode message data: {error}"))?;
                write_line(
                    stdout,
                    &format!(
                        "{} {} {} {data}",
                        message.timestamp, message.sender_id, message.kind
                    ),
                )?;
            }
            Ok(())
        }
        CommandKind::Prune => {
            let mut pruned = 0usize;
            for (peer_id, bytes) in list(store)? {
                let Ok(record) = PeerRecord::decode(&bytes) else {
                    continue;
                };
                if !record.is_stale(now_ms, stale_ms) {
                    continue;
                }
                store
                    .remove(&peer_id)
                    .map_err(|error| format!("failed to remove peer '{peer_id}': {error}"))?;
                write_line(stdout, &format!("pruned {peer_id}"))?;
                pruned = pruned.saturating_add(1);
            }
            write_line(stdout, &format!("pruned {pruned} stale record(s)"))
        }
    }
}

pub fn format_peer_line(peer_id: &str, record: &PeerRecord, now_ms: u64, stale_ms: u64) -> String {
    let freshness = if record.is_stale(now_ms, stale_ms) {
        "stale"
    } else {
        "fresh"
    };
    format!(
        "{peer_id} x={:.1} y={:.1} health={}/{} age_ms={} {freshness}",
        record.x,
        record.y,
        record.health,
        record.max_health,
        record.age_ms(now_ms)
    )
}

fn list(store: &dyn SharedStore) -> Result<Vec<(String, Vec<u8>)>, String> {
    store
        .list()
        .map_err(|error| format!("failed to list store: {error}"))
}

fn write_line<W: Write>(stdout: &mut W, line: &str) -> Result<(), String> {
    writeln!(stdout, "{line}").map_err(|error| format!("failed to write output: {error}"))
}
