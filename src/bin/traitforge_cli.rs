//! TraitForge CLI - customization and publication front-end
//!
//! Commands: catalog, customize, fingerprint, publish, upload-catalog, resolve
//! Outputs JSON to stdout, logs to stderr
//! Returns 1 on usage/load failure, 2 when an operation is rejected

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use traitforge_core::{
    catalog::load_catalog_or_default,
    content::{GatewayFetcher, MemoryContentStore, NftStorageClient},
    customization::NullColorTarget,
    fingerprint,
    pipeline::{PublishPayload, PublishRequest},
    resolve_http, Catalog, Config, ContentStore, CustomizationStore, Mode, PublicationPipeline,
    TraitTuple, User,
};

#[derive(Parser)]
#[command(name = "traitforge-cli", version)]
#[command(about = "TraitForge CLI - avatar customization and publication")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON config file
    #[arg(short, long, env = "TRAITFORGE_CONFIG")]
    config: Option<PathBuf>,

    /// IPFS gateway prefix
    #[arg(long, env = "TRAITFORGE_GATEWAY")]
    gateway: Option<String>,

    /// Catalog URI or local path
    #[arg(long, env = "TRAITFORGE_CATALOG_URI")]
    catalog: Option<String>,

    /// Upload token for the content store
    #[arg(long, env = "NFT_STORAGE_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[derive(Args, Default)]
struct Selections {
    /// Select an asset, `Category=id` or `Category=none`
    #[arg(long = "set", value_name = "CATEGORY=ID")]
    set: Vec<String>,

    /// Pick a palette color, `Category=#rrggbb`
    #[arg(long = "color", value_name = "CATEGORY=COLOR")]
    color: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalog categories
    Catalog,

    /// Apply selections to the initial customization and print the result
    Customize {
        #[command(flatten)]
        selections: Selections,
    },

    /// Fingerprint a comma separated 13-slot trait list
    Fingerprint {
        #[arg(short, long)]
        traits: String,
    },

    /// Upload thumbnail, model and metadata
    Publish {
        /// Avatar name
        #[arg(short, long, required_unless_present = "payload")]
        name: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        /// Thumbnail image file
        #[arg(long, required_unless_present = "payload")]
        thumbnail: Option<PathBuf>,

        /// GLB model file
        #[arg(long)]
        model: Option<PathBuf>,

        /// JSON payload (PublishPayload) instead of files
        #[arg(short, long, conflicts_with_all = ["name", "thumbnail", "model"])]
        payload: Option<String>,

        /// Connected wallet address
        #[arg(short, long)]
        wallet: Option<String>,

        #[command(flatten)]
        selections: Selections,

        /// Keep uploads in memory instead of the remote store
        #[arg(long)]
        dry_run: bool,
    },

    /// Publish the active catalog document
    UploadCatalog {
        #[arg(long)]
        dry_run: bool,
    },

    /// Resolve a content URI to a gateway URL
    Resolve { uri: String },
}

enum Failure {
    Usage(String),
    Rejected(String),
}

fn emit(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => println!(r#"{{"error": "{}"}}"#, e),
    }
}

fn split_pair(raw: &str) -> Result<(&str, &str), Failure> {
    raw.split_once('=')
        .ok_or_else(|| Failure::Usage(format!("expected CATEGORY=VALUE, got '{}'", raw)))
}

fn apply_selections(store: &mut CustomizationStore, selections: &Selections) -> Result<(), Failure> {
    store.set_mode(Mode::Creator);
    for raw in &selections.set {
        let (category, value) = split_pair(raw)?;
        let asset = match value {
            "none" => None,
            id => Some(
                id.parse::<u32>()
                    .map_err(|e| Failure::Usage(format!("invalid asset id '{}': {}", id, e)))?,
            ),
        };
        store
            .set_asset(category, asset)
            .map_err(|e| Failure::Rejected(e.to_string()))?;
    }
    for raw in &selections.color {
        let (category, color) = split_pair(raw)?;
        store
            .set_color(category, color)
            .map_err(|e| Failure::Rejected(e.to_string()))?;
    }
    Ok(())
}

fn read_file(path: &PathBuf) -> Result<Vec<u8>, Failure> {
    fs::read(path).map_err(|e| Failure::Usage(format!("{}: {}", path.display(), e)))
}

async fn run_publish<S: ContentStore>(
    pipeline: PublicationPipeline<S>,
    user: &User,
    request: PublishRequest,
    traits: TraitTuple,
) -> Result<Value, Failure> {
    let published = pipeline
        .publish_as(user, request, traits)
        .await
        .map_err(|e| Failure::Rejected(e.to_string()))?;
    Ok(json!({ "success": true, "published": published }))
}

async fn run_upload_catalog<S: ContentStore>(
    pipeline: PublicationPipeline<S>,
    catalog: &Catalog,
    gateway: &str,
) -> Result<Value, Failure> {
    let uri = pipeline
        .upload_catalog(catalog)
        .await
        .map_err(|e| Failure::Rejected(e.to_string()))?;
    Ok(json!({ "success": true, "catalogUri": uri, "url": resolve_http(&uri, gateway) }))
}

fn remote_store(config: &Config) -> Result<NftStorageClient, Failure> {
    let token = config
        .upload_token
        .clone()
        .ok_or_else(|| Failure::Usage("an upload token is required unless --dry-run is set".into()))?;
    Ok(NftStorageClient::new(config.upload_endpoint.clone(), token))
}

async fn run(cli: Cli) -> Result<Value, Failure> {
    let mut config = Config::load_or_default(cli.config.as_deref())
        .map_err(|e| Failure::Usage(e.to_string()))?;
    if let Some(gateway) = cli.gateway {
        config.gateway = gateway;
    }
    if let Some(catalog) = cli.catalog {
        config.catalog_uri = Some(catalog);
    }
    if let Some(token) = cli.token {
        config.upload_token = Some(token);
    }

    let catalog =
        load_catalog_or_default(&config.catalog_source(), &GatewayFetcher::new(), &config.gateway).await;

    match cli.command {
        Commands::Catalog => {
            let categories: Vec<_> = catalog
                .categories()
                .iter()
                .map(|c| json!({
                    "id": c.id,
                    "name": c.name,
                    "position": c.position,
                    "assets": c.assets.len(),
                    "removable": c.removable,
                    "colorPalette": c.color_palette,
                }))
                .collect();
            Ok(Value::Array(categories))
        }

        Commands::Customize { selections } => {
            let mut store = CustomizationStore::initialize(catalog, Box::new(NullColorTarget));
            apply_selections(&mut store, &selections)?;
            let traits = store.traits();
            Ok(json!({
                "customization": store.customization(),
                "lockedGroups": store.locked_groups(),
                "traits": traits,
                "traitFingerprint": fingerprint(&traits),
            }))
        }

        Commands::Fingerprint { traits } => {
            let traits = TraitTuple::parse_list(&traits).map_err(Failure::Usage)?;
            Ok(json!({
                "traits": traits,
                "traitFingerprint": fingerprint(&traits),
            }))
        }

        Commands::Publish { name, description, thumbnail, model, payload, wallet, selections, dry_run } => {
            let request = match payload {
                Some(raw) => {
                    let payload: PublishPayload = serde_json::from_str(&raw)
                        .map_err(|e| Failure::Usage(format!("Invalid payload: {}", e)))?;
                    payload
                        .decode(&config.default_description)
                        .map_err(|e| Failure::Usage(e.to_string()))?
                }
                None => {
                    let (Some(name), Some(thumbnail)) = (name, thumbnail) else {
                        return Err(Failure::Usage("--name and --thumbnail are required".into()));
                    };
                    PublishRequest {
                        name,
                        description: description.unwrap_or_else(|| config.default_description.clone()),
                        thumbnail: read_file(&thumbnail)?,
                        model: model.as_ref().map(read_file).transpose()?,
                    }
                }
            };

            let mut user = User::default();
            user.set_wallet(wallet);

            let mut store = CustomizationStore::initialize(catalog, Box::new(NullColorTarget));
            apply_selections(&mut store, &selections)?;
            let traits = store.traits();

            if dry_run {
                run_publish(PublicationPipeline::new(MemoryContentStore::new()), &user, request, traits).await
            } else {
                run_publish(PublicationPipeline::new(remote_store(&config)?), &user, request, traits).await
            }
        }

        Commands::UploadCatalog { dry_run } => {
            if dry_run {
                run_upload_catalog(PublicationPipeline::new(MemoryContentStore::new()), &catalog, &config.gateway).await
            } else {
                run_upload_catalog(PublicationPipeline::new(remote_store(&config)?), &catalog, &config.gateway).await
            }
        }

        Commands::Resolve { uri } => Ok(json!({
            "uri": uri,
            "url": resolve_http(&uri, &config.gateway),
        })),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(output) => {
            emit(&output);
            ExitCode::SUCCESS
        }
        Err(Failure::Usage(error)) => {
            emit(&json!({ "success": false, "error": error }));
            ExitCode::FAILURE
        }
        Err(Failure::Rejected(error)) => {
            emit(&json!({ "success": false, "error": error }));
            ExitCode::from(2)
        }
    }
}
