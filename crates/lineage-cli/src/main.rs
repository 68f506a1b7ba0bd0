//! CLI binary for building lineage graphs and extracting SQL lineage.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use lineage_graph::{GraphView, LineageEngine};
use lineage_sql::{SqlLineageEntry, SqlLineageExtractor, SqlLineageStore};
use lineage_types::PipelineDefinition;

mod fixtures;

use fixtures::{ExecutionFixture, StorageFixture};

#[derive(Parser)]
#[command(name = "lineage", version, about = "Lineage graphs for declarative ML pipelines")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a lineage report from a pipeline definition JSON file
    Graph {
        /// Path to the pipeline definition JSON
        definition: PathBuf,

        /// Pipeline name (default: the definition file stem)
        #[arg(long)]
        name: Option<String>,

        /// Execution telemetry fixture JSON (steps and job descriptions)
        #[arg(long)]
        execution: Option<PathBuf>,

        /// Bucket metadata fixture JSON
        #[arg(long)]
        storage: Option<PathBuf>,

        /// Which graph views to include
        #[arg(long, value_enum, default_value = "both")]
        view: ViewArg,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Extract table-level lineage from a SQL script
    Sql {
        /// Path to the SQL file
        file: PathBuf,

        /// Dialect hint for the AST parser (hive, mysql, postgres, snowflake)
        #[arg(long, default_value = "generic")]
        dialect: String,

        /// Use the regex tier instead of the AST parser
        #[arg(long)]
        pattern: bool,

        /// Append the record to this JSONL store
        #[arg(long, requires = "pipeline", requires = "job")]
        store: Option<PathBuf>,

        /// Pipeline name recorded with the stored entry
        #[arg(long)]
        pipeline: Option<String>,

        /// Job name recorded with the stored entry
        #[arg(long)]
        job: Option<String>,

        /// Step name recorded with the stored entry
        #[arg(long)]
        step: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ViewArg {
    Pipeline,
    Data,
    Both,
}

impl From<ViewArg> for GraphView {
    fn from(view: ViewArg) -> Self {
        match view {
            ViewArg::Pipeline => GraphView::Pipeline,
            ViewArg::Data => GraphView::Data,
            ViewArg::Both => GraphView::Both,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Graph {
            definition,
            name,
            execution,
            storage,
            view,
            out,
        } => cmd_graph(&definition, name, execution, storage, view.into(), out).await,
        Commands::Sql {
            file,
            dialect,
            pattern,
            store,
            pipeline,
            job,
            step,
        } => cmd_sql(&file, &dialect, pattern, store, pipeline, job, step),
    }
}

async fn cmd_graph(
    definition_path: &Path,
    name: Option<String>,
    execution: Option<PathBuf>,
    storage: Option<PathBuf>,
    view: GraphView,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(definition_path)
        .with_context(|| format!("reading {}", definition_path.display()))?;
    let doc: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", definition_path.display()))?;
    let definition = PipelineDefinition::from_value(&doc);

    let name = name.unwrap_or_else(|| {
        definition_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "pipeline".to_string())
    });

    let mut engine = LineageEngine::new();
    if let Some(path) = execution {
        let fixture = ExecutionFixture::load(&path)
            .with_context(|| format!("loading execution fixture {}", path.display()))?;
        engine = engine.with_execution(Arc::new(fixture));
    }
    if let Some(path) = storage {
        let fixture = StorageFixture::load(&path)
            .with_context(|| format!("loading storage fixture {}", path.display()))?;
        engine = engine.with_storage(Arc::new(fixture));
    }

    let report = engine.build(&definition, &name, view).await;
    for warning in &report.warnings {
        tracing::warn!(scope = %warning.scope, detail = %warning.detail, "degraded lookup");
    }

    let rendered = serde_json::to_string_pretty(&report)?;
    match out {
        Some(path) => {
            std::fs::write(&path, rendered).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), "report written");
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

fn cmd_sql(
    file: &Path,
    dialect: &str,
    pattern: bool,
    store: Option<PathBuf>,
    pipeline: Option<String>,
    job: Option<String>,
    step: Option<String>,
) -> anyhow::Result<()> {
    let sql = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let extractor = if pattern {
        SqlLineageExtractor::pattern()
    } else {
        SqlLineageExtractor::ast(dialect)
    };
    let statements = split_statements(&sql);
    let records = extractor.extract_all(statements.iter().map(String::as_str));

    println!("{}", serde_json::to_string_pretty(&records)?);

    if let Some(path) = store {
        // clap enforces these alongside --store
        let pipeline = pipeline.context("--pipeline is required with --store")?;
        let job = job.context("--job is required with --store")?;
        let store = SqlLineageStore::new(&path);
        for record in records {
            let entry =
                SqlLineageEntry::new(pipeline.clone(), job.clone(), step.as_deref(), record);
            store
                .put(&entry)
                .with_context(|| format!("appending to {}", path.display()))?;
        }
        tracing::info!(path = %path.display(), "records stored");
    }
    Ok(())
}

/// Split a script into statements on `;`, dropping empty fragments.
fn split_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty())
        .map(str::to_string)
        .collect()
}
