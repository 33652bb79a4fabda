//! Curate CLI - batch maintenance for DSpace repositories
//!
//! ```bash
//! curate agrovoc-lookup -i subjects.txt --om matches.txt --or rejects.txt
//! curate fix-metadata -i corrections.csv -f dc.contributor.author -t correct -m 3 \
//!     --db dspace -u dspace -p fuuu
//! curate delete-metadata -i deletions.csv -f dc.contributor.author -m 3 \
//!     --db dspace -u dspace -p fuuu
//! curate post-bitstreams -i bitstreams.csv -e me@example.com -p fuuu
//! ```
//!
//! Database and REST credentials can also come from the environment or a
//! `.env` file (`DSPACE_DB_*`, `DSPACE_REST_*`, `DSPACE_JSESSIONID`).

use clap::{Args, Parser, Subcommand};
use curation::config::{
    DatabaseConfig, DeleteConfig, FixConfig, LookupConfig, PostConfig, RunMode, DEFAULT_CACHE_DIR,
    DEFAULT_REST_URL, DEFAULT_VOCABULARY_ENDPOINT,
};
use curation::rest::types::BitstreamFormat;
use curation::{bitstreams, logging, metadata, vocabulary, Reporter, ToolResult};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "curate", version)]
#[command(about = "Batch curation tools for DSpace 6 repositories", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up subject terms in the AGROVOC vocabulary
    AgrovocLookup(LookupArgs),

    /// Find and replace metadata values in the DSpace database
    FixMetadata(FixArgs),

    /// Delete metadata values from the DSpace database
    DeleteMetadata(DeleteArgs),

    /// Post bitstreams to existing items through the DSpace REST API
    PostBitstreams(PostArgs),
}

#[derive(Args)]
struct ModeArgs {
    /// Print debug messages to standard error
    #[arg(short, long)]
    debug: bool,

    /// Only print changes that would be made
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Do not print progress messages to the screen
    #[arg(short, long)]
    quiet: bool,
}

impl ModeArgs {
    fn run_mode(&self) -> RunMode {
        RunMode {
            debug: self.debug,
            dry_run: self.dry_run,
            quiet: self.quiet,
        }
    }
}

#[derive(Args)]
struct DatabaseArgs {
    /// Database name
    #[arg(long = "database-name", visible_alias = "db", env = "DSPACE_DB_NAME")]
    name: String,

    /// Database username
    #[arg(short = 'u', long = "database-user", env = "DSPACE_DB_USER")]
    user: String,

    /// Database password
    #[arg(short = 'p', long = "database-pass", env = "DSPACE_DB_PASSWORD", hide_env_values = true)]
    password: String,

    /// Database host
    #[arg(long = "database-host", env = "DSPACE_DB_HOST", default_value = "localhost")]
    host: String,

    /// Database port
    #[arg(long = "database-port", env = "DSPACE_DB_PORT", default_value_t = 5432)]
    port: u16,
}

impl From<DatabaseArgs> for DatabaseConfig {
    fn from(args: DatabaseArgs) -> Self {
        DatabaseConfig {
            host: args.host,
            port: args.port,
            name: args.name,
            user: args.user,
            password: args.password,
        }
    }
}

#[derive(Args)]
struct LookupArgs {
    /// File containing subject terms, one per line
    #[arg(short, long)]
    input_file: PathBuf,

    /// File to write matched subjects to
    #[arg(long, visible_alias = "om")]
    output_matches_file: PathBuf,

    /// File to write rejected subjects to
    #[arg(long, visible_alias = "or")]
    output_rejects_file: PathBuf,

    /// Language of the subject terms
    #[arg(short, long, default_value = "en")]
    language: String,

    /// Perform wildcard searches and print suggested labels
    #[arg(short, long)]
    suggest_matches: bool,

    /// Write suggested labels to the rejects file as CSV
    #[arg(long, requires = "suggest_matches")]
    save_suggestions: bool,

    /// AGROVOC search endpoint
    #[arg(long, default_value = DEFAULT_VOCABULARY_ENDPOINT)]
    endpoint: String,

    /// Directory for cached vocabulary responses
    #[arg(long, default_value = DEFAULT_CACHE_DIR)]
    cache_dir: PathBuf,

    /// Do not read or write the response cache
    #[arg(long)]
    no_cache: bool,

    /// Print debug messages to standard error
    #[arg(short, long)]
    debug: bool,

    /// Do not print progress messages to the screen
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Args)]
struct FixArgs {
    /// Path to CSV file
    #[arg(short = 'i', long)]
    csv_file: PathBuf,

    /// Name of column with values to be replaced
    #[arg(short, long)]
    from_field_name: String,

    /// Name of column with values to replace
    #[arg(short, long)]
    to_field_name: String,

    /// ID of the field in the metadatafieldregistry table
    #[arg(short, long)]
    metadata_field_id: i32,

    #[command(flatten)]
    database: DatabaseArgs,

    #[command(flatten)]
    mode: ModeArgs,
}

#[derive(Args)]
struct DeleteArgs {
    /// Path to CSV file
    #[arg(short = 'i', long)]
    csv_file: PathBuf,

    /// Name of column with values to delete
    #[arg(short, long)]
    from_field_name: String,

    /// ID of the field in the metadatafieldregistry table
    #[arg(short, long)]
    metadata_field_id: i32,

    #[command(flatten)]
    database: DatabaseArgs,

    #[command(flatten)]
    mode: ModeArgs,
}

#[derive(Args)]
struct PostArgs {
    /// Path to CSV file with id, filename and bundle columns
    #[arg(short = 'i', long)]
    csv_file: PathBuf,

    /// URL of the DSpace 6.x REST API
    #[arg(short = 'u', long, env = "DSPACE_REST_URL", default_value = DEFAULT_REST_URL)]
    rest_url: String,

    /// Email address of administrator user
    #[arg(short = 'e', long, env = "DSPACE_REST_USER")]
    user: Option<String>,

    /// Password of administrator user
    #[arg(short, long, env = "DSPACE_REST_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// JSESSIONID, if previously authenticated
    #[arg(short = 's', long, env = "DSPACE_JSESSIONID", hide_env_values = true)]
    jsessionid: Option<String>,

    /// Bitstream formats to overwrite (test with a dry run first!)
    #[arg(long, value_enum, num_args = 1..)]
    overwrite_format: Vec<BitstreamFormat>,

    /// Directory the filenames in the CSV are relative to
    #[arg(long, default_value = ".")]
    files_dir: PathBuf,

    #[command(flatten)]
    mode: ModeArgs,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::AgrovocLookup(args) => cmd_lookup(args).await,
        Commands::FixMetadata(args) => cmd_fix(args).await,
        Commands::DeleteMetadata(args) => cmd_delete(args).await,
        Commands::PostBitstreams(args) => cmd_post(args).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn cmd_lookup(args: LookupArgs) -> ToolResult<()> {
    let config = LookupConfig {
        input_file: args.input_file,
        output_matches_file: args.output_matches_file,
        output_rejects_file: args.output_rejects_file,
        language: args.language,
        suggest_matches: args.suggest_matches,
        save_suggestions: args.save_suggestions,
        endpoint: args.endpoint,
        cache_dir: (!args.no_cache).then_some(args.cache_dir),
        mode: RunMode {
            debug: args.debug,
            dry_run: false,
            quiet: args.quiet,
        },
    };

    logging::init(config.mode.debug);
    vocabulary::run(&config, &Reporter::new(config.mode.quiet)).await?;
    Ok(())
}

async fn cmd_fix(args: FixArgs) -> ToolResult<()> {
    let config = FixConfig {
        csv_file: args.csv_file,
        from_field_name: args.from_field_name,
        to_field_name: args.to_field_name,
        metadata_field_id: args.metadata_field_id,
        database: args.database.into(),
        mode: args.mode.run_mode(),
    };

    logging::init(config.mode.debug);
    metadata::run_fix(&config, &Reporter::new(config.mode.quiet)).await?;
    Ok(())
}

async fn cmd_delete(args: DeleteArgs) -> ToolResult<()> {
    let config = DeleteConfig {
        csv_file: args.csv_file,
        from_field_name: args.from_field_name,
        metadata_field_id: args.metadata_field_id,
        database: args.database.into(),
        mode: args.mode.run_mode(),
    };

    logging::init(config.mode.debug);
    metadata::run_delete(&config, &Reporter::new(config.mode.quiet)).await?;
    Ok(())
}

async fn cmd_post(args: PostArgs) -> ToolResult<()> {
    let config = PostConfig {
        csv_file: args.csv_file,
        rest_url: args.rest_url,
        user: args.user,
        password: args.password,
        jsessionid: args.jsessionid,
        overwrite_formats: args.overwrite_format,
        files_dir: args.files_dir,
        mode: args.mode.run_mode(),
    };

    logging::init(config.mode.debug);
    bitstreams::run(&config, &Reporter::new(config.mode.quiet)).await?;
    Ok(())
}
