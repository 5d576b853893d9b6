use std::path::PathBuf;

use clap::Parser;
use quizdeck::{db::Db, extractors::JwtVerifier, storage::CsvArchive, AppState};
use rand::{rngs::StdRng, SeedableRng};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// SQLite database URL, e.g. `sqlite://quizdeck.db`.
    #[clap(env)]
    database_url: String,

    /// HS256 secret shared with the identity service.
    #[clap(env, hide_env_values = true)]
    jwt_secret: String,

    /// The address to bind to.
    #[arg(short, long, env, default_value = "127.0.0.1:1414")]
    address: String,

    /// Directory for archived CSV uploads.
    #[arg(long, env)]
    upload_dir: Option<PathBuf>,

    /// Fixed seed for question and option shuffling.
    #[arg(long, env)]
    shuffle_seed: Option<u64>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "tower_http=info,quizdeck=debug".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
        .init();

    let args = Args::parse();

    let db = Db::new(&args.database_url).await?;

    let rng = match args.shuffle_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let archive = args.upload_dir.map(CsvArchive::new);
    if let Some(archive) = &archive {
        tokio::fs::create_dir_all(archive.root()).await?;
    }

    let state = AppState::new(db, JwtVerifier::new(&args.jwt_secret), archive, rng);
    let app = quizdeck::router(state);

    let listener = tokio::net::TcpListener::bind(&args.address).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
