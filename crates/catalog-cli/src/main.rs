//! tagsync CLI
//!
//! Command-line interface for bulk tagging, tag removal, and owner assignment
//! against an OpenMetadata catalog.

use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tagsync_catalog_client::{CatalogClient, ClientConfig, EntityReference, TagFqn};
use tagsync_catalog_tagger::{
    clean_mappings, export_table_fqns, generate_from_fqns, load_fqn_list, load_mappings,
    load_table_assignments, save_mappings, IdentityResolver, Mappings, NameNormalizer, RunOptions,
    RunSummary, Scope, TaggingRun, DEFAULT_CLASSIFICATION, DEFAULT_PAGE_SIZE,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "tagsync")]
#[command(version, about = "Bulk tag reconciliation for OpenMetadata", long_about = None)]
struct Cli {
    /// Catalog connection config (JSON with base_url and jwt_token)
    #[arg(
        long,
        env = "TAGSYNC_CONFIG",
        default_value = "config/openmetadata_config.json",
        global = true
    )]
    config: PathBuf,

    /// Application mapping file
    #[arg(
        long,
        env = "TAGSYNC_MAPPING",
        default_value = "data/application_mapping.json",
        global = true
    )]
    mapping: PathBuf,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Do not resolve the catalog host before starting
    #[arg(long, global = true)]
    skip_dns_check: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply application tags, per mapped schema or from a CSV
    Tag {
        /// Report what would change without patching anything
        #[arg(long)]
        dry_run: bool,

        /// Only process this application key
        #[arg(short, long)]
        application: Option<String>,

        /// CSV of table/application rows instead of whole schemas
        #[arg(long)]
        csv_file: Option<PathBuf>,

        /// Exported FQN list used to resolve bare table names
        #[arg(long)]
        fqn_lookup: Option<PathBuf>,

        /// Scope for bare table names of applications without a mapping
        #[arg(long, value_name = "SERVICE.DATABASE.SCHEMA")]
        scope: Option<Scope>,

        #[command(flatten)]
        pacing: Pacing,

        /// Tag classification
        #[arg(long, default_value = DEFAULT_CLASSIFICATION)]
        classification: String,
    },

    /// Remove a tag from every table in a schema
    Untag {
        #[arg(long, value_name = "SERVICE.DATABASE.SCHEMA")]
        schema: Scope,

        /// Fully qualified tag, e.g. "Application System.ATS"
        #[arg(long)]
        tag: String,

        /// Remove the tag from the schema entity as well
        #[arg(long)]
        include_schema: bool,

        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        pacing: Pacing,
    },

    /// Make one user or team the owner of every table in a schema
    AssignOwner {
        #[arg(long, value_name = "SERVICE.DATABASE.SCHEMA")]
        schema: Scope,

        #[arg(long)]
        owner_id: String,

        #[arg(long, value_enum, default_value_t = OwnerType::User)]
        owner_type: OwnerType,

        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        pacing: Pacing,
    },

    /// Export every table FQN in the catalog to a CSV
    ExportFqns {
        #[arg(short, long, default_value = "data/openmetadata_table_fqns.csv")]
        output: PathBuf,

        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: usize,
    },

    /// Build an application mapping from an exported FQN list
    GenerateMapping {
        #[arg(long, default_value = "data/openmetadata_table_fqns.csv")]
        fqn_csv: PathBuf,

        /// Output file (defaults to --mapping)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Drop excluded applications and re-key entries with cleaned names
        #[arg(long)]
        clean: bool,
    },
}

#[derive(clap::Args)]
struct Pacing {
    /// Entities per batch
    #[arg(long, default_value_t = 100)]
    batch_size: usize,

    /// Pause between batches
    #[arg(long, default_value_t = 2)]
    batch_delay_secs: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum OwnerType {
    User,
    Team,
}

impl OwnerType {
    fn as_str(self) -> &'static str {
        match self {
            OwnerType::User => "user",
            OwnerType::Team => "team",
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_file.as_deref()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let result = match &cli.command {
        Commands::Tag {
            dry_run,
            application,
            csv_file,
            fqn_lookup,
            scope,
            pacing,
            classification,
        } => {
            let options = run_options(*dry_run, pacing, classification);
            tag(
                &cli,
                &options,
                application.as_deref(),
                csv_file.as_deref(),
                fqn_lookup.as_deref(),
                scope.as_ref(),
            )
            .await
        }
        Commands::Untag {
            schema,
            tag,
            include_schema,
            dry_run,
            pacing,
        } => {
            let options = run_options(*dry_run, pacing, DEFAULT_CLASSIFICATION);
            untag(&cli, &options, schema, tag, *include_schema).await
        }
        Commands::AssignOwner {
            schema,
            owner_id,
            owner_type,
            dry_run,
            pacing,
        } => {
            let options = run_options(*dry_run, pacing, DEFAULT_CLASSIFICATION);
            let owner = EntityReference::owner(owner_id, owner_type.as_str());
            assign_owner(&cli, &options, schema, &owner).await
        }
        Commands::ExportFqns { output, page_size } => export_fqns(&cli, output, *page_size).await,
        Commands::GenerateMapping {
            fqn_csv,
            output,
            clean,
        } => generate_mapping(fqn_csv, output.as_deref().unwrap_or(&cli.mapping), *clean),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Run aborted");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Console logging filtered by `RUST_LOG` (default `info`), plus an
/// optional plain-text log file.
fn init_logging(log_file: Option<&Path>) -> CliResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = File::options().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

fn run_options(dry_run: bool, pacing: &Pacing, classification: &str) -> RunOptions {
    RunOptions {
        dry_run,
        batch_size: pacing.batch_size,
        batch_delay: Duration::from_secs(pacing.batch_delay_secs),
        classification: classification.to_string(),
        ..Default::default()
    }
}

/// Load the config and build a client, failing before any catalog call
/// if the config is unusable or the host does not resolve.
async fn connect(cli: &Cli) -> CliResult<CatalogClient> {
    let config = ClientConfig::from_json_file(&cli.config)?;
    let client = CatalogClient::new(config)?;

    if cli.skip_dns_check {
        tracing::debug!("Skipping DNS check");
    } else {
        client.check_dns().await?;
        tracing::info!(base_url = %client.base_url(), "Catalog host resolved");
    }
    Ok(client)
}

fn report(summary: &RunSummary) {
    tracing::info!("\n{}", summary);
    println!("{}", summary);
}

async fn tag(
    cli: &Cli,
    options: &RunOptions,
    application: Option<&str>,
    csv_file: Option<&Path>,
    fqn_lookup: Option<&Path>,
    scope: Option<&Scope>,
) -> CliResult<()> {
    let summary = match csv_file {
        Some(csv_path) => {
            let rows = load_table_assignments(csv_path)?;
            let resolver = match fqn_lookup {
                Some(path) => IdentityResolver::from_fqns(load_fqn_list(path)?),
                None => IdentityResolver::new(),
            };
            // The mapping only supplies scopes here, so it is optional
            let mappings = if cli.mapping.exists() {
                load_mappings(&cli.mapping)?
            } else {
                tracing::warn!(path = %cli.mapping.display(), "No mapping file, using --scope only");
                Mappings::new()
            };

            let client = connect(cli).await?;
            TaggingRun::new(&client, options)
                .tag_assignments(&rows, &resolver, &mappings, scope, application)
                .await
        }
        None => {
            let mappings = load_mappings(&cli.mapping)?;
            let client = connect(cli).await?;
            TaggingRun::new(&client, options)
                .tag_schemas(&mappings, application)
                .await
        }
    };

    report(&summary);
    Ok(())
}

async fn untag(
    cli: &Cli,
    options: &RunOptions,
    schema: &Scope,
    tag: &str,
    include_schema: bool,
) -> CliResult<()> {
    let tag = TagFqn::parse(tag);
    if tag.name().is_empty() {
        return Err(format!("Tag '{}' must be <Classification>.<TagName>", tag).into());
    }

    let client = connect(cli).await?;
    let summary = TaggingRun::new(&client, options)
        .untag_schema(schema, &tag, include_schema)
        .await;
    report(&summary);
    Ok(())
}

async fn assign_owner(
    cli: &Cli,
    options: &RunOptions,
    schema: &Scope,
    owner: &EntityReference,
) -> CliResult<()> {
    let client = connect(cli).await?;
    let summary = TaggingRun::new(&client, options)
        .assign_owner(schema, owner)
        .await;
    report(&summary);
    Ok(())
}

async fn export_fqns(cli: &Cli, output: &Path, page_size: usize) -> CliResult<()> {
    let client = connect(cli).await?;
    let written = export_table_fqns(&client, output, page_size).await?;
    println!("Exported {} table FQNs to '{}'", written, output.display());
    Ok(())
}

fn generate_mapping(fqn_csv: &Path, output: &Path, clean: bool) -> CliResult<()> {
    let fqns = load_fqn_list(fqn_csv)?;
    let mut mappings = generate_from_fqns(&fqns);

    if clean {
        let cleaned = clean_mappings(&mappings, &NameNormalizer::default());
        for key in &cleaned.excluded {
            println!("Excluded: {}", key);
        }
        for (from, to) in &cleaned.renamed {
            println!("Renamed: {} -> {}", from, to);
        }
        mappings = cleaned.mappings;
    }

    save_mappings(output, &mappings)?;
    println!(
        "Wrote {} application mappings to '{}'",
        mappings.len(),
        output.display()
    );
    Ok(())
}
