//! Facet tree command line browser
//!
//! # Usage
//!
//! ```bash
//! # Facet options from configuration
//! facet_tree attributes
//!
//! # Group an offline fixture by lab then type, expanding two levels
//! facet_tree --config config/facet_tree.yaml browse \
//!     --fixture fixtures/datasets.json --facet lab --facet type --expand 2
//!
//! # Same against the dataset API (FACET_TREE_BASE_URL)
//! facet_tree browse --facet lab
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use dataset_client::{DatasetGateway, HttpGateway, InProcessGateway};
use facet_tree::config::ENV_CONFIG_PATH;
use facet_tree::{BrowserConfig, FacetCatalog, NodeStateKind, TextRenderer, TreeController};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "facet_tree")]
#[command(version)]
#[command(about = "Browse a dataset collection as a tree grouped by chosen facets")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML configuration file
    #[arg(long, short, global = true, env = ENV_CONFIG_PATH)]
    config: Option<PathBuf>,

    /// Output format: text (default) or json
    #[arg(long, short = 'o', global = true, default_value = "text", value_enum)]
    format: OutputFormat,

    /// Only log warnings and errors
    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List the facet options offered for grouping
    Attributes,

    /// Build the tree and print it
    Browse {
        /// JSON record list served in-process instead of the dataset API
        #[arg(long)]
        fixture: Option<PathBuf>,

        /// Facet to group by; repeat to add levels in order
        #[arg(long = "facet", short = 'f')]
        facets: Vec<String>,

        /// Expand collapsed nodes down to this depth
        #[arg(long, short, default_value_t = 0)]
        expand: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    let result = match BrowserConfig::load(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Commands::Attributes => cmd_attributes(&config, cli.format),
            Commands::Browse {
                fixture,
                facets,
                expand,
            } => cmd_browse(&config, fixture, &facets, expand, cli.format).await,
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "error": format!("{e:#}") }));
            } else {
                eprintln!("error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(quiet: bool) {
    let default = if quiet {
        "warn"
    } else {
        "facet_tree=info,dataset_client=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn cmd_attributes(config: &BrowserConfig, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config.attributes)?),
        OutputFormat::Text => {
            for attribute in &config.attributes {
                println!("{attribute}");
            }
        }
    }
    Ok(())
}

async fn cmd_browse(
    config: &BrowserConfig,
    fixture: Option<PathBuf>,
    facets: &[String],
    expand: usize,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let gateway: Arc<dyn DatasetGateway> = match fixture {
        Some(path) => Arc::new(
            InProcessGateway::from_json_file(&path)
                .with_context(|| format!("loading fixture {}", path.display()))?
                .with_sample_size(config.gateway.sample_size)
                .with_group_page_size(config.gateway.group_page_size),
        ),
        None => Arc::new(HttpGateway::new(config.http_options())?),
    };

    let mut controller =
        TreeController::new(gateway, FacetCatalog::new(config.attributes.iter().cloned()));
    let root = controller.seed_root().into_iter().collect();
    controller.settle(root).await;

    for facet in facets {
        controller.select_and_settle(facet).await?;
    }

    for _ in 0..expand {
        let collapsed: Vec<_> = controller
            .tree()
            .iter()
            .filter(|n| n.kind() == NodeStateKind::Collapsed && n.depth() <= expand)
            .map(|n| n.id())
            .collect();
        if collapsed.is_empty() {
            break;
        }
        let mut fetches = Vec::with_capacity(collapsed.len());
        for id in collapsed {
            fetches.extend(controller.activate(id)?);
        }
        controller.settle(fetches).await;
    }

    let renderer = TextRenderer::new(config.item_link_template.clone());
    let lines = renderer.render(&controller);
    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "facets": controller.catalog().selected(),
                "remaining": controller.catalog().remaining(),
                "nodes": controller.tree().len(),
                "lines": lines,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            for line in lines {
                println!("{line}");
            }
        }
    }
    Ok(())
}
