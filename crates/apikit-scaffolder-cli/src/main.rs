//! apikit-scaffolder CLI entrypoint
//! Parses command-line arguments and dispatches to the core scaffolder.

// Internal imports (std, crate)
use std::path::PathBuf;

// External imports (alphabetized)
use anyhow::Context;
use apikit_scaffolder_core::{
    ApiSpecification, ConfigDocument, OpenApiContext, PlanRenderer, ScaffoldError, ScaffoldPlan,
    Scaffolder, ScaffolderConfig,
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "apikit-scaffolder")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Inputs shared by every subcommand
#[derive(clap::Args, Debug)]
struct Inputs {
    /// Path or URL of an OpenAPI definition (YAML or JSON), may be repeated
    ///
    /// Example: --spec src/main/resources/api/petstore.yaml
    /// Example: --spec https://example.com/openapi.json
    #[arg(long)]
    spec: Vec<String>,
    /// Already parsed specification tree (YAML or JSON), may be repeated
    #[arg(long)]
    spec_tree: Vec<PathBuf>,
    /// Scaffolder configuration file (.yaml or .toml)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Existing Mule configuration file, may be repeated
    #[arg(long)]
    existing: Vec<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Format {
    Json,
    Yaml,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print the reconciliation plan
    Plan {
        #[command(flatten)]
        inputs: Inputs,
        /// Output format of the plan
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
    /// Render the missing flows and configs as XML
    Scaffold {
        #[command(flatten)]
        inputs: Inputs,
        /// Output directory for rendered documents
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Directory with template overrides
        #[arg(long)]
        template_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Plan { inputs, format } => {
            let (_, plan) = build_plan(&inputs).await?;
            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
                Format::Yaml => print!("{}", serde_yaml::to_string(&plan)?),
            }
            check(&plan)
        }
        Commands::Scaffold {
            inputs,
            output_dir,
            template_dir,
        } => {
            let (config, plan) = build_plan(&inputs).await?;
            let output_dir = output_dir
                .or_else(|| config.output_dir.clone().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("."));

            let renderer = match &template_dir {
                Some(dir) => PlanRenderer::from_dir(dir)
                    .with_context(|| format!("Failed to load templates from {}", dir.display()))?,
                None => PlanRenderer::new().context("Failed to load built-in templates")?,
            };
            let written = renderer
                .write(&plan, &output_dir)
                .await
                .with_context(|| format!("Failed to write to {}", output_dir.display()))?;

            for path in &written {
                println!("Wrote {}", path.display());
            }
            if written.is_empty() {
                println!("Nothing to scaffold");
            }
            check(&plan)
        }
    }
}

/// Load every input and run the scaffolder
async fn build_plan(inputs: &Inputs) -> anyhow::Result<(ScaffolderConfig, ScaffoldPlan)> {
    let config = match &inputs.config {
        Some(path) => ScaffolderConfig::from_file(path)
            .await
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ScaffolderConfig::default(),
    };
    if inputs.spec.is_empty() && inputs.spec_tree.is_empty() {
        anyhow::bail!("At least one --spec or --spec-tree is required");
    }

    let mut specs = Vec::new();
    for location in &inputs.spec {
        tracing::info!("Loading OpenAPI definition from {}", location);
        let context = OpenApiContext::from_file_or_url(location)
            .await
            .with_context(|| format!("Failed to load API definition {}", location))?;
        specs.push(context.to_specification(location)?);
    }
    for path in &inputs.spec_tree {
        specs.push(
            ApiSpecification::from_file(path)
                .await
                .with_context(|| format!("Failed to load specification tree {}", path.display()))?,
        );
    }

    let existing = inputs
        .existing
        .iter()
        .cloned()
        .chain(config.config_files.iter().map(PathBuf::from));
    let mut documents = Vec::new();
    let mut unreadable = Vec::new();
    for path in existing {
        match ConfigDocument::from_file(&path).await {
            Ok(document) => documents.push(document),
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                unreadable.push(ScaffoldError::new(path.to_string_lossy(), &e));
            }
        }
    }

    let mut plan = Scaffolder::new(config.clone()).run(&specs, &documents)?;
    plan.errors.extend(unreadable);
    Ok((config, plan))
}

fn check(plan: &ScaffoldPlan) -> anyhow::Result<()> {
    for error in &plan.errors {
        eprintln!("error: {}", error);
    }
    if plan.has_errors() {
        anyhow::bail!("{} configuration file(s) could not be reconciled", plan.errors.len());
    }
    Ok(())
}
