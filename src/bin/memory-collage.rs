//! CLI binary for memory-collage.
//!
//! `serve` runs the HTTP endpoint; `compose` runs the compositor once and
//! prints the resulting URL. Both map flags (with env fallbacks) to a
//! `CollageConfig` and a storage backend.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use memory_collage::storage::supabase::DEFAULT_BUCKET;
use memory_collage::{
    create_router, media_route, parse_hex_color, AppState, CollageConfig, CollageRequest,
    Compositor, LocalStorage, ObjectStorage, SupabaseStorage,
};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

/// Compose memory photos into a single cover collage.
#[derive(Parser, Debug)]
#[command(
    name = "memory-collage",
    version,
    about = "Compose memory photos into a single cover collage",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    storage: StorageArgs,

    #[command(flatten)]
    render: RenderArgs,

    /// Enable debug logging.
    #[arg(short, long, global = true, env = "COLLAGE_VERBOSE")]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true, env = "COLLAGE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "COLLAGE_BIND", default_value = "0.0.0.0:8080")]
        bind: SocketAddr,
    },

    /// Compose one collage and print its URL.
    Compose {
        /// Memory identifier; becomes the storage path prefix.
        #[arg(long)]
        memory_id: String,

        /// Caption drawn along the bottom edge.
        #[arg(long)]
        title: Option<String>,

        /// Print the full result (location, tile errors, stats) as JSON.
        #[arg(long)]
        json: bool,

        /// Source image URLs in display order.
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    Supabase,
    Local,
}

#[derive(Args, Debug)]
struct StorageArgs {
    /// Storage backend.
    #[arg(long, global = true, env = "COLLAGE_STORAGE", value_enum, default_value = "supabase")]
    storage: Backend,

    /// Supabase project URL.
    #[arg(long, global = true, env = "SUPABASE_URL")]
    supabase_url: Option<String>,

    /// Supabase service-role key.
    #[arg(long, global = true, env = "SUPABASE_SERVICE_ROLE_KEY", hide_env_values = true)]
    service_key: Option<String>,

    /// Bucket that receives collages.
    #[arg(long, global = true, env = "COLLAGE_BUCKET", default_value = DEFAULT_BUCKET)]
    bucket: String,

    /// Root directory for the local backend.
    #[arg(long, global = true, env = "COLLAGE_LOCAL_DIR", default_value = "./media")]
    local_dir: PathBuf,

    /// Public URL of the local directory; `serve` mounts the directory at its path.
    #[arg(
        long,
        global = true,
        env = "COLLAGE_PUBLIC_BASE_URL",
        default_value = "http://localhost:8080/media"
    )]
    public_base_url: String,

    /// Return signed URLs valid for this many seconds instead of public URLs.
    #[arg(long, global = true, env = "COLLAGE_SIGNED_URL_TTL")]
    signed_url_ttl: Option<u64>,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// TrueType font used for captions (default: embedded DejaVu Sans Bold).
    #[arg(long, global = true, env = "COLLAGE_FONT")]
    font: Option<PathBuf>,

    /// JPEG quality (1–100).
    #[arg(long, global = true, env = "COLLAGE_QUALITY", default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Canvas background colour.
    #[arg(long, global = true, env = "COLLAGE_BACKGROUND", default_value = "#ffffff")]
    background: String,

    /// Per-image download timeout in seconds.
    #[arg(long, global = true, env = "COLLAGE_FETCH_TIMEOUT", default_value_t = 30)]
    fetch_timeout: u64,

    /// Deadline for a whole collage request in seconds.
    #[arg(long, global = true, env = "COLLAGE_TIMEOUT", default_value_t = 60)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build compositor ─────────────────────────────────────────────────
    let config = build_config(&cli.render, &cli.storage)?;
    let storage = build_storage(&cli.storage)?;
    let compositor = Compositor::new(config, storage).context("Failed to set up compositor")?;

    match cli.command {
        Command::Serve { bind } => {
            let mut state = AppState::new(compositor);
            if cli.storage.storage == Backend::Local {
                let route = media_route(&cli.storage.public_base_url)?;
                state = state.with_media(route, cli.storage.local_dir.clone());
            }
            serve(state, bind).await
        }
        Command::Compose {
            memory_id,
            title,
            json,
            urls,
        } => compose(compositor, memory_id, title, urls, json, cli.quiet).await,
    }
}

async fn serve(state: AppState, bind: SocketAddr) -> Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    info!("Listening on {}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")
}

async fn compose(
    compositor: Compositor,
    memory_id: String,
    title: Option<String>,
    urls: Vec<String>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let timeout = Duration::from_secs(compositor.config().operation_timeout_secs);
    let request = CollageRequest::new(urls, memory_id, title);

    let output = tokio::time::timeout(timeout, compositor.create_collage(&request))
        .await
        .with_context(|| format!("Collage creation timed out after {}s", timeout.as_secs()))?
        .context("Collage creation failed")?;
    let Some(output) = output else {
        bail!("No images provided");
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        );
        return Ok(());
    }

    println!("{}", output.location);
    if !quiet {
        let s = &output.stats;
        if output.is_composite() {
            eprintln!(
                "{}  {}/{} tiles  {} bytes  {}ms",
                if output.tile_errors.is_empty() {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                s.tiles_drawn,
                s.requested,
                s.encoded_bytes,
                s.total_duration_ms
            );
            for e in &output.tile_errors {
                eprintln!("   {}", e);
            }
        } else {
            eprintln!("{}  single image, used as-is", green("✔"));
        }
        if let Some(ref path) = output.object_path {
            eprintln!("   stored at {}", bold(path));
        }
    }
    Ok(())
}

/// Map CLI args to `CollageConfig`.
fn build_config(render: &RenderArgs, storage: &StorageArgs) -> Result<CollageConfig> {
    let background = parse_hex_color(&render.background).context("Invalid --background")?;
    let mut builder = CollageConfig::builder()
        .jpeg_quality(render.quality)
        .background(background)
        .fetch_timeout_secs(render.fetch_timeout)
        .operation_timeout_secs(render.timeout);
    if let Some(ref font) = render.font {
        builder = builder.caption_font(font);
    }
    if let Some(ttl) = storage.signed_url_ttl {
        builder = builder.signed_url_ttl_secs(ttl);
    }
    builder.build().context("Invalid configuration")
}

fn build_storage(args: &StorageArgs) -> Result<Arc<dyn ObjectStorage>> {
    match args.storage {
        Backend::Supabase => {
            let Some(ref url) = args.supabase_url else {
                bail!("--supabase-url (SUPABASE_URL) is required for the supabase backend");
            };
            let Some(ref key) = args.service_key else {
                bail!(
                    "--service-key (SUPABASE_SERVICE_ROLE_KEY) is required for the supabase backend"
                );
            };
            let storage = SupabaseStorage::new(url.as_str(), key.as_str(), args.bucket.as_str())
                .context("Failed to create Supabase storage client")?;
            Ok(Arc::new(storage))
        }
        Backend::Local => Ok(Arc::new(LocalStorage::new(
            &args.local_dir,
            args.public_base_url.as_str(),
        ))),
    }
}
