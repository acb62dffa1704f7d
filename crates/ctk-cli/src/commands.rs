use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::{json, Map, Value};
use tracing::debug;

use ctk_tracker::{
    ConnectorHierarchy, ConnectorId, ConnectorIdAllocator, ConnectorRef, ConnectorTracker,
    DiffState, MemoryHierarchy, RegistrationState, SnapshotFormat, StreamHandle, SweepReport,
    TrackerConfig, TrackerSnapshot, TreeNode,
};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Demo(args) => cmd_demo(args, cli.format),
        Command::Inspect(args) => cmd_inspect(args, cli.format),
        Command::Config(args) => cmd_config(args, cli.format),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<TrackerConfig> {
    let Some(path) = path else {
        return Ok(TrackerConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    TrackerConfig::from_toml_str(&text).with_context(|| format!("invalid config {}", path.display()))
}

fn id_list(ids: &[ConnectorId]) -> Vec<String> {
    ids.iter().map(ToString::to_string).collect()
}

// ---- demo ----

struct Demo {
    tracker: ConnectorTracker,
    /// Description of every connector sent in the flush.
    flushed: Vec<String>,
    report: SweepReport,
}

/// A root holding a split panel with two labels. The first label owns an
/// upload channel and is removed after the first flush; with `hide_label`
/// the second one is hidden as well.
fn run_demo(hide_label: bool, config: TrackerConfig) -> anyhow::Result<Demo> {
    let ids = ConnectorIdAllocator::new();
    let tree = Arc::new(MemoryHierarchy::new());
    let root = TreeNode::new(ids.next_id(), "UI");
    let split = TreeNode::new(ids.next_id(), "HorizontalSplitPanel");
    let first = TreeNode::new(ids.next_id(), "Label");
    let second = TreeNode::new(ids.next_id(), "Label");
    tree.add_root(&root);
    tree.attach(root.connector_id(), &split);
    tree.attach(split.connector_id(), &first);
    tree.attach(split.connector_id(), &second);

    let mut tracker = ConnectorTracker::new(root.clone(), tree.clone(), config)?;
    for connector in [&root, &split, &first, &second] {
        tracker.register(connector)?;
    }
    let upload = StreamHandle::new("upload").into_handle();
    tracker.add_channel(first.connector_id(), "upload", upload)?;

    let flushed = flush(&mut tracker)?;

    if hide_label {
        tree.set_visible(second.connector_id(), false);
    }
    tree.detach(first.connector_id());
    tracker.unregister(&first);
    let report = tracker.sweep();

    Ok(Demo {
        tracker,
        flushed,
        report,
    })
}

/// Send every visible dirty connector, the way a response writer does.
fn flush(tracker: &mut ConnectorTracker) -> anyhow::Result<Vec<String>> {
    let mut writer = tracker.begin_write()?;
    let mut sent = Vec::new();
    for connector in writer.dirty_visible_connectors() {
        let state = shared_state(&connector, writer.hierarchy().as_ref());
        let diff = writer.diff_against(&connector, &state);
        sent.push(format!("{} ({} keys)", writer.describe(&connector), diff.len()));
        writer.set_diff_state(&connector, state);
        writer.mark_client_initialized(&connector);
        writer.mark_clean(&connector);
    }
    Ok(sent)
}

fn shared_state(connector: &ConnectorRef, hierarchy: &dyn ConnectorHierarchy) -> DiffState {
    let mut state = Map::new();
    state.insert("kind".into(), Value::from(connector.kind()));
    state.insert("visible".into(), Value::from(hierarchy.is_visible(connector)));
    if let Some(parent) = hierarchy.parent(connector) {
        state.insert("parent".into(), Value::from(parent.connector_id().as_str()));
    }
    state
}

fn cmd_demo(args: DemoArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let demo = run_demo(args.hide_label, config)?;
    let tracker = &demo.tracker;

    if let Some(path) = &args.snapshot {
        let snapshot_format = if path.extension().is_some_and(|ext| ext == "bin") {
            SnapshotFormat::Binary
        } else {
            SnapshotFormat::Json
        };
        tracker.snapshot()?.write_to(path, snapshot_format)?;
    }

    match format {
        OutputFormat::Json => {
            let out = json!({
                "flushed": demo.flushed,
                "sweep": demo.report,
                "registered": id_list(&tracker.registered_ids()),
                "dirty": tracker.dirty_connectors().len(),
                "channels": tracker.channel_count(),
                "snapshot": args.snapshot.as_ref().map(|p| p.display().to_string()),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!("{} Session root {}", "✓".green().bold(), tracker.root_id().to_string().cyan());
            println!("\n{}", "Flushed:".bold());
            for line in &demo.flushed {
                println!("  {} {}", "→".blue(), line);
            }
            println!("\n{}", "Sweep:".bold());
            println!("  removed:          {}", demo.report.removed);
            println!("  missed detaches:  {}", demo.report.missed_detaches);
            println!("  invalidated:      {}", demo.report.invalidated);
            println!("  revoked channels: {}", demo.report.revoked_channels);
            println!(
                "\nRegistered: {}",
                id_list(&tracker.registered_ids()).join(", ").yellow()
            );
            if let Some(path) = &args.snapshot {
                println!("Snapshot written to {}", path.display().to_string().bold());
            }
        }
    }
    Ok(())
}

// ---- inspect ----

/// Ids whose diff state does not parse back into a state object.
fn check_diff_states(snapshot: &TrackerSnapshot) -> Vec<(ConnectorId, String)> {
    snapshot
        .diff_states
        .iter()
        .filter_map(|(id, text)| {
            serde_json::from_str::<DiffState>(text)
                .err()
                .map(|e| (id.clone(), e.to_string()))
        })
        .collect()
}

fn cmd_inspect(args: InspectArgs, format: OutputFormat) -> anyhow::Result<()> {
    let snapshot = TrackerSnapshot::read_from(&args.path)
        .with_context(|| format!("failed to load {}", args.path.display()))?;
    let broken = check_diff_states(&snapshot);
    debug!(
        path = %args.path.display(),
        connectors = snapshot.connectors.len(),
        broken = broken.len(),
        "loaded snapshot"
    );

    match format {
        OutputFormat::Json => {
            let out = json!({
                "version": snapshot.version,
                "created_at": snapshot.created_at,
                "root": snapshot.root,
                "connectors": snapshot.connectors,
                "dirty": snapshot.dirty,
                "diff_states": snapshot.diff_states.keys().collect::<Vec<_>>(),
                "channels": snapshot.channels,
                "secret_keys": snapshot.secret_keys.len(),
                "broken_diff_states": broken.iter().map(|(id, _)| id).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!(
                "Snapshot v{} of root {} taken {}",
                snapshot.version,
                snapshot.root.to_string().cyan(),
                snapshot.created_at.to_rfc3339().dimmed()
            );
            println!("\n{}", "Connectors:".bold());
            for record in &snapshot.connectors {
                let state = match record.state {
                    RegistrationState::Registered => "registered".green(),
                    RegistrationState::PendingRemoval => "pending removal".yellow(),
                };
                let client = if record.client_initialized { "known" } else { "uninitialized" };
                let dirty = if snapshot.dirty.contains(&record.id) { " dirty" } else { "" };
                println!("  {:>6}  {}  {}{}", record.id.to_string(), state, client.dimmed(), dirty.red());
            }
            println!("\nDiff states: {}", snapshot.diff_states.len());
            println!("{}", "Channels:".bold());
            for binding in &snapshot.channels {
                println!(
                    "  {} / {} → {}",
                    binding.owner,
                    binding.name.bold(),
                    binding.handle.short_id().dimmed()
                );
            }
            println!("Secret keys: {}", snapshot.secret_keys.len());
            for (id, reason) in &broken {
                println!("  {} diff state of {}: {}", "✗".red().bold(), id, reason);
            }
        }
    }

    if !broken.is_empty() {
        bail!("{} diff state(s) failed to parse", broken.len());
    }
    Ok(())
}

// ---- config ----

fn cmd_config(args: ConfigArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(args.file.as_deref())?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Text => print!("{}", config.to_toml_string()?),
    }
    Ok(())
}
