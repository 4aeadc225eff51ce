use chrono::Utc;
use clap::{Parser, Subcommand};
use preview_resolver_core::{
    CancellationToken, GatewayStore, LocalDirStore, MemoryStore, ObjectStore,
    PreviewRequest, PreviewRequestHandler, ResolverConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "preview-resolver", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Resolver configuration (JSON). Built-in defaults apply when omitted.
    #[arg(long, env = "PREVIEW_RESOLVER_CONFIG")]
    config: Option<PathBuf>,

    /// Serve objects from a local directory laid out like the bucket.
    #[arg(long, env = "PREVIEW_STORE_DIR", conflicts_with_all = ["gateway_url", "manifest"])]
    store_dir: Option<PathBuf>,

    /// Object gateway base URL
    #[arg(long, env = "PREVIEW_GATEWAY_URL", conflicts_with = "manifest")]
    gateway_url: Option<String>,

    /// Bucket name on the object gateway
    #[arg(long, env = "PREVIEW_BUCKET", default_value = "landing")]
    bucket: String,

    /// JSON array of object keys to resolve against, instead of a live store.
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Give up after this many seconds and report the preview as not found.
    #[arg(long)]
    deadline_secs: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a preview the way the API layer does and print the response.
    Resolve {
        /// Display file name of the document.
        #[arg(long)]
        file_name: String,
        /// File type or extension hint, e.g. `xdw` or a MIME type.
        #[arg(long)]
        file_type: Option<String>,
        /// Object key of the original document.
        #[arg(long)]
        original_key: Option<String>,
        /// Document id under which page images are stored.
        #[arg(long)]
        file_id: Option<String>,
        /// Page to return for image previews.
        #[arg(long)]
        page: Option<u32>,
    },
    /// Run only the candidate locator for an original key.
    Locate {
        #[arg(long)]
        original_key: String,
    },
    /// Show the normalized target derived from an original key.
    Normalize {
        #[arg(long)]
        original_key: String,
    },
    /// Score a converted file name against a target base name.
    Score {
        #[arg(long)]
        candidate: String,
        #[arg(long)]
        target: String,
    },
    /// Print the routing table and the broad-search prefixes it yields.
    Routes {
        /// Show only the prefixes searched for this original key.
        #[arg(long)]
        original_key: Option<String>,
    },
}

fn open_store(cli: &Cli) -> anyhow::Result<Arc<dyn ObjectStore>> {
    if let Some(dir) = &cli.store_dir {
        return Ok(Arc::new(LocalDirStore::new(dir.clone())));
    }
    if let Some(url) = &cli.gateway_url {
        let store = GatewayStore::new(url, &cli.bucket)?;
        return Ok(Arc::new(store));
    }
    if let Some(path) = &cli.manifest {
        let store = MemoryStore::from_manifest(path)?;
        info!(objects = store.len(), manifest = %path.display(), "loaded manifest");
        return Ok(Arc::new(store));
    }
    warn!("no store configured, resolving against an empty store");
    Ok(Arc::new(MemoryStore::new()))
}

fn cancellation(deadline_secs: Option<u64>) -> CancellationToken {
    let cancel = CancellationToken::new();

    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    if let Some(secs) = deadline_secs {
        let on_deadline = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            warn!(deadline_secs = secs, "deadline reached, cancelling resolution");
            on_deadline.cancel();
        });
    }

    cancel
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ResolverConfig::from_path(path)?,
        None => ResolverConfig::default(),
    };

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "preview-resolver boot"
    );

    let handler = PreviewRequestHandler::new(open_store(&cli)?, config);
    let locator = handler.locator();

    match cli.command {
        Command::Resolve {
            file_name,
            file_type,
            original_key,
            file_id,
            page,
        } => {
            let request = PreviewRequest {
                file_name,
                file_type,
                original_key_hint: original_key,
                file_id,
                page_number: page,
            };
            let cancel = cancellation(cli.deadline_secs);

            let response = handler
                .resolve_preview_with_cancel(&request, &cancel)
                .await?;

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Locate { original_key } => {
            let cancel = cancellation(cli.deadline_secs);
            let result = locator
                .resolve_with_cancel(&original_key, &cancel)
                .await?;

            match (&result.object_key, result.phase, result.score) {
                (Some(key), Some(phase), Some(score)) if result.found => {
                    println!("found phase={phase} score={score} key={key}");
                }
                _ => println!("not found: {original_key}"),
            }
        }
        Command::Normalize { original_key } => {
            let target = locator.normalizer().normalize(&original_key);
            println!("{}", serde_json::to_string_pretty(&target)?);
        }
        Command::Score { candidate, target } => {
            let scorer = locator.scorer();
            let extracted = scorer.extract_original_name(&candidate);
            let score = scorer.score(&candidate, &target);
            println!("extracted={extracted} target={target} score={score}");
        }
        Command::Routes { original_key } => match original_key {
            Some(key) => {
                let relative = locator.normalizer().strip_routing_prefixes(&key);
                for prefix in locator.broad_prefixes(relative) {
                    println!("{prefix}");
                }
            }
            None => {
                let routing = &locator.config().routing;
                for category in routing.categories() {
                    println!("{category}: {}", routing.servers_for(category).join(", "));
                }
            }
        },
    }

    Ok(())
}
