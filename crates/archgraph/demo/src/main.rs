#![deny(unsafe_code)]
//! Archgraph demo binary.
//!
//! Runs a self-contained walk through the engine:
//! 1. Seed a small order-to-cash architecture
//! 2. Copy-on-write update with relationship migration
//! 3. Current and as-of traversal
//! 4. Validation run
//!
//! Uses the in-memory backend unless the configuration names another.

mod seed;

use anyhow::{Context, Result};
use archgraph_engine::{
    init_tracing, EngineConfig, GraphStats, KnowledgeGraph, NodeFilter, Severity, Subgraph, Warning,
};
use archgraph_types::{Direction, NodeType};
use clap::Parser;
use serde_json::json;

/// Archgraph demo CLI
#[derive(Parser)]
#[command(name = "archgraph-demo")]
#[command(about = "Seed, update, traverse and validate a sample architecture", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ARCHGRAPH_CONFIG")]
    config: Option<String>,

    /// Traversal depth
    #[arg(short, long, default_value_t = 2)]
    depth: u32,

    /// Log level (overrides configuration)
    #[arg(long, env = "ARCHGRAPH_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    json: bool,
}

// ── Formatting Helpers ──────────────────────────────────────────────────

const BANNER: &str = r#"
 ╔═══════════════════════════════════════════════════════════════╗
 ║                 Archgraph  --  Demo                           ║
 ║                                                               ║
 ║   Temporal knowledge graph for enterprise architecture.       ║
 ╚═══════════════════════════════════════════════════════════════╝
"#;

fn section(title: &str) {
    let width: usize = 60;
    let pad = width.saturating_sub(title.len() + 4);
    let left = pad / 2;
    let right = pad - left;
    println!();
    println!(" ┌{}┐", "─".repeat(width));
    println!(" │{}  {}  {}│", " ".repeat(left), title, " ".repeat(right));
    println!(" └{}┘", "─".repeat(width));
}

fn ok(msg: &str) {
    println!("   [OK]  {}", msg);
}

fn info(msg: &str) {
    println!("   [--]  {}", msg);
}

fn warn(msg: &str) {
    println!("   [!!]  {}", msg);
}

// ── Main ────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    println!("{}", BANNER);

    if let Err(e) = run(cli).await {
        eprintln!();
        eprintln!("   [FATAL]  Demo failed: {:#}", e);
        std::process::exit(1);
    }

    println!();
    println!(" ════════════════════════════════════════════════════════════════");
    println!("  Demo complete.");
    println!(" ════════════════════════════════════════════════════════════════");
    println!();
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = EngineConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;
    init_tracing(&config.logging);

    let graph = KnowledgeGraph::from_config(config).await?;

    // ── Phase A: Seed ───────────────────────────────────────────────
    section("Phase A: Seed Architecture");

    let seeded = seed::seed(&graph).await?;
    ok(&format!("{} relationships created", seeded.relationships));
    print_stats(&graph.stats().await?);
    let seeded_at = graph.now();

    // ── Phase B: Copy-on-write Update ───────────────────────────────
    section("Phase B: Copy-on-write Update");

    let before = graph
        .relationships()
        .list_for_node(seeded.commerce.id, Direction::Both, None)
        .await?;
    let commerce = graph
        .nodes()
        .update(
            seeded.commerce.id,
            &json!({ "status": "active", "acceptance_criteria": "Checkout p99 under 300ms" }),
        )
        .await?;
    let after = graph
        .relationships()
        .list_for_node(commerce.id, Direction::Both, None)
        .await?;
    ok(&format!(
        "{} v{} -> v{}  ({} -> {})",
        commerce.name(),
        seeded.commerce.version,
        commerce.version,
        seeded.commerce.id,
        commerce.id
    ));
    info(&format!("{} relationships before, {} migrated", before.len(), after.len()));
    for view in &after {
        let access = view
            .relationship
            .props
            .access_type
            .map(|a| format!("  [{}]", a.as_str()))
            .unwrap_or_default();
        info(&format!(
            "{} --{}--> {}{}",
            view.source.name, view.relationship.rel_type, view.target.name, access
        ));
    }
    let order = graph.nodes().get(seeded.order.id, None).await?;
    ok(&format!("{} untouched at v{}", order.name(), order.version));

    let history = graph.nodes().history(commerce.id).await?;
    info(&format!(
        "history: {}",
        history.iter().map(|n| format!("v{}", n.version)).collect::<Vec<_>>().join(", ")
    ));

    // ── Phase C: Traversal ──────────────────────────────────────────
    section(&format!("Phase C: Traversal  (depth {})", cli.depth));

    let now = graph
        .traversal()
        .traverse_subgraph(seeded.order_management.id, cli.depth, None)
        .await?;
    print_subgraph("current", &now);
    let then = graph
        .traversal()
        .traverse_subgraph(seeded.order_management.id, cli.depth, Some(seeded_at))
        .await?;
    print_subgraph("as of seeding", &then);

    let services = graph.nodes().list(&NodeFilter::of_type(NodeType::Service)).await?;
    for service in &services.nodes {
        let linked = graph
            .relationships()
            .list_for_node(service.id, Direction::In, None)
            .await?;
        info(&format!("{} has {} incoming relationships", service.name(), linked.len()));
    }

    // ── Phase D: Validation ─────────────────────────────────────────
    section("Phase D: Validation");

    let warnings = graph.validator().run_all(None).await;
    print_warnings(&warnings);
    let service_findings = graph.validator().run_for_node(seeded.order_service.id).await?;
    ok(&format!(
        "{} is {}",
        seeded.order_service.name(),
        if service_findings.is_empty() { "connected" } else { "orphaned" }
    ));

    section("Summary");
    print_stats(&graph.stats().await?);
    Ok(())
}

fn print_stats(stats: &GraphStats) {
    info(&format!(
        "{} nodes, {} relationships",
        stats.total_nodes(),
        stats.total_relationships()
    ));
    for (node_type, count) in &stats.nodes {
        info(&format!("  {:<24} {}", node_type.as_str(), count));
    }
}

fn print_subgraph(label: &str, subgraph: &Subgraph) {
    ok(&format!(
        "{}: {} nodes, {} relationships",
        label,
        subgraph.nodes.len(),
        subgraph.relationships.len()
    ));
    for node in &subgraph.nodes {
        info(&format!("  {} ({}, v{})", node.name(), node.node_type(), node.version));
    }
}

fn print_warnings(warnings: &[Warning]) {
    if warnings.is_empty() {
        ok("no findings");
        return;
    }
    for w in warnings {
        let line = format!("[{}] {}: {}", w.severity, w.rule_id, w.message);
        match w.severity {
            Severity::Error | Severity::Warning => warn(&line),
            Severity::Info => info(&line),
        }
    }
}
