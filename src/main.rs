use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kgstudy::graph::demo::{unique_entity_types, unique_relationship_types};
use kgstudy::store::{AppEvent, ExtractionStatus};
use kgstudy::{Config, EntityType, KgError, RelationshipType, Session};
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "kgstudy")]
#[command(about = "Explore knowledge graphs extracted from study material")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Explore the bundled biology graph offline
    Demo {
        /// Only show nodes of this entity type (repeatable)
        #[arg(long = "entity")]
        entity_types: Vec<EntityType>,

        /// Only show edges of this relationship type (repeatable)
        #[arg(long = "relationship")]
        relationship_types: Vec<RelationshipType>,

        /// Node to select
        #[arg(long)]
        select: Option<String>,
    },
    /// Start extraction for an upload and wait for the graph
    Extract {
        #[arg(long)]
        upload_id: String,
    },
    /// Search nodes of an extracted graph
    Search {
        #[arg(long)]
        graph_id: String,

        query: String,
    },
    /// Check that the remote service is reachable
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.kgstudy.log_level.as_str()),
    )
    .init();

    let session = Session::new(config).context("Failed to create session")?;

    match args.command {
        Command::Demo {
            entity_types,
            relationship_types,
            select,
        } => run_demo(&session, entity_types, relationship_types, select).await,
        Command::Extract { upload_id } => run_extract(&session, upload_id).await,
        Command::Search { graph_id, query } => run_search(&session, graph_id, &query).await,
        Command::Health => run_health(&session).await,
    }
}

async fn run_demo(
    session: &Session,
    entity_types: Vec<EntityType>,
    relationship_types: Vec<RelationshipType>,
    select: Option<String>,
) -> Result<()> {
    session.load_demo();
    let store = session.store();

    store.dispatch(AppEvent::SetEntityTypeFilters(
        entity_types.into_iter().collect::<BTreeSet<_>>(),
    ));
    store.dispatch(AppEvent::SetRelationshipTypeFilters(
        relationship_types.into_iter().collect::<BTreeSet<_>>(),
    ));

    let state = store.snapshot();
    let graph = state
        .graph
        .clone()
        .context("demo graph did not load")?;
    let stats = graph.compute_stats();
    println!(
        "Graph {}: {} nodes, {} edges",
        graph.graph_id, stats.node_count, stats.edge_count
    );
    println!(
        "Entity types: {}",
        join(unique_entity_types(&graph).iter().map(|t| t.as_str()))
    );
    println!(
        "Relationship types: {}",
        join(unique_relationship_types(&graph).iter().map(|t| t.as_str()))
    );

    if let Some(filtered) = state.filtered_graph() {
        println!(
            "Visible after filters: {} nodes, {} edges",
            filtered.nodes.len(),
            filtered.edges.len()
        );
    }

    let Some(node_id) = select else {
        return Ok(());
    };

    if let Some(warning) = session.select_node(&node_id).await {
        println!("Warning: {}", warning);
    }

    let state = store.snapshot();
    let Some(selected) = state.selected_node_id.clone() else {
        println!("Node {} is not visible with the current filters", node_id);
        return Ok(());
    };

    if let Some(details) = &state.node_details {
        println!();
        println!("{} ({})", details.node.name, details.node.entity_type);
        if let Some(description) = &details.node.description {
            println!("  {}", description);
        }
        println!(
            "  {} inbound, {} outbound relationships",
            details.inbound.len(),
            details.outbound.len()
        );
    }

    let neighborhood = state.neighborhood();
    println!();
    println!("Neighborhood of {}: {}", selected, join(neighborhood.node_ids.iter()));

    let path = state.study_path();
    let names = path.ordered_nodes.iter().map(|n| n.name.as_str());
    println!("Study path: {}", join_with(names, " -> "));
    if let Some(warning) = &path.warning {
        println!("Warning: {}", warning);
    }

    let highlights = state.highlights();
    println!(
        "Highlighted: {} nodes, {} edges",
        highlights.node_ids.len(),
        highlights.edge_ids.len()
    );
    Ok(())
}

async fn run_extract(session: &Session, upload_id: String) -> Result<()> {
    let store = Arc::clone(session.store());
    store.dispatch(AppEvent::SetUploadId(Some(upload_id)));

    let graph_id = session.build_graph().await?;
    println!("Extraction started for graph {}", graph_id);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut last_message = None;
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                session.cancel_extraction();
                println!("Extraction cancelled.");
                return Ok(());
            }
            _ = tokio::time::sleep(std::time::Duration::from_millis(200)) => {}
        }

        let (status, message, polling) =
            store.read(|s| (s.extract_status, s.extract_message.clone(), s.polling_enabled));
        if message != last_message {
            if let Some(m) = &message {
                println!("[{:?}] {}", status, m);
            }
            last_message = message.clone();
        }
        if polling {
            continue;
        }

        return match status {
            ExtractionStatus::Complete => {
                let state = store.snapshot();
                if let Some(graph) = &state.graph {
                    let stats = graph.compute_stats();
                    println!(
                        "Graph {}: {} nodes, {} edges",
                        graph.graph_id, stats.node_count, stats.edge_count
                    );
                }
                Ok(())
            }
            _ => Err(KgError::Extraction(
                message.unwrap_or_else(|| format!("{:?}", status)),
            )
            .into()),
        };
    }
}

async fn run_search(session: &Session, graph_id: String, query: &str) -> Result<()> {
    let store = session.store();
    store.dispatch(AppEvent::SetGraphId(Some(graph_id)));

    let results = session.search(query).await;
    if results.is_empty() {
        println!("No matches for {:?}", query.trim());
        return Ok(());
    }
    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. {} [{}] ({})",
            i + 1,
            result.name,
            result.entity_type,
            result.id
        );
        if let Some(description) = &result.description {
            println!("   {}", description);
        }
    }
    Ok(())
}

async fn run_health(session: &Session) -> Result<()> {
    let base = session.client().base_url().to_string();
    if session.check_health().await {
        println!("{} is reachable", base);
        Ok(())
    } else {
        anyhow::bail!("{} is not reachable", base)
    }
}

fn join(items: impl Iterator<Item = impl AsRef<str>>) -> String {
    join_with(items, ", ")
}

fn join_with(items: impl Iterator<Item = impl AsRef<str>>, sep: &str) -> String {
    items
        .map(|s| s.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(sep)
}
