use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use tracing_subscriber::EnvFilter;

use deckbox::backend::HttpBackend;
use deckbox::context::{self, SessionStorage};
use deckbox::opt::{Config, ErrToStr, Res};
use deckbox::store::CollectionStore;

#[derive(Parser, Debug)]
#[command(version, about = "Manage card collections from the terminal")]
struct Args {
    /// Redirect URL from the identity provider, to finish signing in.
    #[arg(long)]
    callback: Option<String>,
}

#[tokio::main]
async fn main() -> Res<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("deckbox=info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env();

    let storage: Arc<dyn SessionStorage> = match &config.storage_path {
        Some(path) => Arc::new(context::load_data_from_file(path).err_to_str()?),
        None => Arc::new(context::create_context().err_to_str()?),
    };
    let backend = Arc::new(HttpBackend::new(&config).err_to_str()?);
    let store = CollectionStore::new(backend, storage, config.sign_in_url.clone());

    if let Some(callback) = &args.callback {
        if let Some(location) = store.consume_callback(callback).err_to_str()? {
            tracing::info!("continue at {}", location);
        }
    }

    if store.session().is_authenticated() {
        if let Err(err) = store.load_collections().await {
            tracing::error!("could not load collections: {}", err);
        }
    }

    deckbox::cli::main(&store).await.err_to_str()
}
