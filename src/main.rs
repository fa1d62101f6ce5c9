use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use termed::config::Config;
use termed::graph::{pretty_print_tree_to_depth, to_tree};
use termed::nodes::{index_nodes, open_node_index, parse_query, reference_neighbours, referrer_neighbours, NodeIndex};
use termed::{GraphId, Node, NodeCriterion, NodeId, NodeSpecification, Specification, TypeId};

#[derive(Parser)]
#[command(name = "termed", about = "Termed thesaurus index — search and browse node graphs")]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(long, global = true)]
    debug: bool,

    /// Index directory. Overrides `[index] directory` from config.toml.
    #[arg(long, global = true)]
    index_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Bulk index nodes from a JSON array file.
    Index { file: PathBuf },
    /// Free-text search over indexed nodes.
    Search {
        text: String,
        /// Restrict to one type, as `<graph uuid>/<type id>`.
        #[arg(long = "type")]
        type_id: Option<String>,
        #[arg(long, default_value_t = 20)]
        max: usize,
    },
    /// Search with the node query language, e.g.
    /// `p.prefLabel:cat AND r.broader.code:mammal`.
    Find {
        query: String,
        #[arg(long, default_value_t = 20)]
        max: usize,
    },
    /// Print the reference tree below a node.
    Tree {
        /// Node key, `<graph uuid>/<type id>/<uuid>`.
        node: String,
        #[arg(long)]
        attr: String,
        /// Follow references backwards.
        #[arg(long)]
        referrers: bool,
    },
    /// Print index statistics.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(if cli.debug { "debug" } else { "info" })),
        )
        .init();

    let mut config = Config::load()?;
    if let Some(dir) = cli.index_dir {
        config.index.directory = Some(dir);
    }
    if config.index.directory.is_none() {
        tracing::warn!("no index directory configured, using a throwaway in-memory index");
    }

    let index = Arc::new(open_node_index(&config.index)?);
    let result = run(cli.command, &index, &config).await;
    index.close().await?;
    result
}

async fn run(command: Command, index: &Arc<NodeIndex>, config: &Config) -> anyhow::Result<()> {
    match command {
        Command::Index { file } => {
            let raw = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let nodes: Vec<Node> = serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;
            let count = nodes.len();

            let job = index_nodes(index, nodes).await?;
            index.wait_for_bulk().await;
            let stats = index.bulk_stats();
            if stats.jobs_failed > 0 {
                anyhow::bail!("bulk job {job} failed after {} items", stats.items_indexed);
            }
            println!("indexed {count} nodes");
        }

        Command::Search { text, type_id, max } => {
            let mut spec: NodeSpecification = NodeCriterion::text(text).into();
            if let Some(type_id) = type_id {
                spec = Specification::and([NodeCriterion::Type(parse_type_id(&type_id)?).into(), spec]);
            }
            print_matches(index, &spec, max)?;
        }

        Command::Find { query, max } => {
            let spec = parse_query(index, &query).with_context(|| format!("parsing query {query:?}"))?;
            print_matches(index, &spec, max)?;
        }

        Command::Tree { node, attr, referrers } => {
            let root: NodeId = node.parse()?;
            let tree = if referrers {
                to_tree(root, referrer_neighbours(Arc::clone(index), attr))
            } else {
                to_tree(root, reference_neighbours(Arc::clone(index), attr))
            };
            print!("{}", pretty_print_tree_to_depth(&tree, config.tree.max_depth));
        }

        Command::Stats => {
            println!("documents:  {}", index.len()?);
            println!("generation: {}", index.visible_generation());
            match &config.index.directory {
                Some(dir) => println!("directory:  {}", dir.display()),
                None => println!("directory:  (memory)"),
            }
        }
    }
    Ok(())
}

fn print_matches(index: &NodeIndex, spec: &NodeSpecification, max: usize) -> anyhow::Result<()> {
    let hits = index.get_by_spec(spec, &[], Some(max))?;
    println!("{} matches", hits.total());
    for node in hits {
        let node = node?;
        let label = node.properties.values().flatten().next().map(|v| v.value.as_str()).unwrap_or("");
        println!("{}\t{}", node.node_id(), label);
    }
    Ok(())
}

fn parse_type_id(s: &str) -> anyhow::Result<TypeId> {
    let (graph, id) = s.split_once('/').context("type must look like <graph uuid>/<type id>")?;
    let graph: uuid::Uuid = graph.parse().with_context(|| format!("bad graph uuid in {s:?}"))?;
    Ok(TypeId::new(GraphId::new(graph), id))
}
