use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use gtopsql::{config::TranslatorConfig, graph_catalog::GraphTopology, Translator};
use validator::Validate;

/// gtopsql - lower a Cypher query to SQL over a graph topology
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Graph topology document (.json, .yaml or .yml)
    #[arg(long)]
    gtop: PathBuf,

    /// Cypher query text
    #[arg(long, conflicts_with = "query_file")]
    query: Option<String>,

    /// File holding the Cypher query
    #[arg(long)]
    query_file: Option<PathBuf>,

    /// Translator settings; GTOPSQL_* environment variables are used otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Upper bound for unbounded variable-length relationships
    #[arg(long)]
    max_expansion_hops: Option<u32>,

    /// Lower expanded variants on a single thread
    #[arg(long)]
    no_parallel: bool,
}

impl Cli {
    fn translator_config(&self) -> anyhow::Result<TranslatorConfig> {
        let mut config = match &self.config {
            Some(path) => TranslatorConfig::from_yaml_file(path)?,
            None => TranslatorConfig::from_env()?,
        };
        if let Some(hops) = self.max_expansion_hops {
            config.max_expansion_hops = hops;
        }
        if self.no_parallel {
            config.parallel_lowering = false;
        }
        config.validate()?;
        Ok(config)
    }

    fn query_text(&self) -> anyhow::Result<String> {
        match (&self.query, &self.query_file) {
            (Some(query), _) => Ok(query.clone()),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("reading query file {}", path.display())),
            (None, None) => bail!("one of --query or --query-file is required"),
        }
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    // Defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.translator_config()?;
    let gtop = GraphTopology::from_file(&cli.gtop)?;
    let query = cli.query_text()?;
    log::info!(
        "loaded {} node and {} relationship mappings from {}",
        gtop.nodes.len(),
        gtop.relationships.len(),
        cli.gtop.display()
    );

    let translator = Translator::new(config);
    match translator.translate(&gtop, &query) {
        Ok(sql) => {
            println!("{}", sql);
            Ok(())
        }
        Err(e) => {
            log::error!("{}: {}", e.category(), e);
            std::process::exit(1);
        }
    }
}
