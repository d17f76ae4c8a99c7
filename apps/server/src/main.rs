use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use grapevine_config::load as load_config;
use grapevine_conversations::ConversationService;
use grapevine_database::{
    initialize_database, CommentRepository, CreateCommentRecord, CreateUserRequest,
    FollowRepository, MessageKind, User, UserRepository,
};
use grapevine_realtime::{build_router, AppState, CommentBridge};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "grapevine-backend")]
#[command(about = "Grapevine realtime backend (serves by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP and websocket server
    Serve,
    /// Seed the database with demo users, chats, and comments
    SeedDemo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::SeedDemo => seed_demo().await,
    }
}

mod telemetry {
    use anyhow::Result;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

async fn run_server() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    info!("starting grapevine backend");

    let config = load_config().context("failed to load configuration")?;

    let pool = initialize_database(&config.database)
        .await
        .context("failed to initialise database")?;

    let state = AppState::new(pool.clone());
    let bridge = CommentBridge::new(pool, Arc::clone(state.hub()), config.bridge.clone()).start();

    let app = build_router(state);

    let address = config.http.bind_addr();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    bridge.shutdown().await;

    info!("backend shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}

async fn seed_demo() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    info!("seeding demo data");

    let config = load_config().context("failed to load configuration")?;

    let pool = initialize_database(&config.database)
        .await
        .context("failed to initialise database")?;

    let users = UserRepository::new(pool.clone());
    let follows = FollowRepository::new(pool.clone());
    let comments = CommentRepository::new(pool.clone());
    let conversations = ConversationService::new(pool);

    let ada = ensure_user(&users, "ada", Some("https://cdn.example.com/avatars/ada.png")).await?;
    let brian =
        ensure_user(&users, "brian", Some("https://cdn.example.com/avatars/brian.png")).await?;
    let chloe = ensure_user(&users, "chloe", None).await?;

    follows.follow(brian.id, ada.id).await?;
    follows.follow(chloe.id, ada.id).await?;
    follows.follow(ada.id, brian.id).await?;

    let chat = conversations
        .open_chat(&ada.public_id, &brian.public_id)
        .await?;
    conversations
        .append_message(
            &chat.public_id,
            &ada.public_id,
            "hey, did you see the launch thread?",
            MessageKind::Text,
        )
        .await?;
    conversations
        .append_message(
            &chat.public_id,
            &brian.public_id,
            "just caught up, it's everywhere",
            MessageKind::Text,
        )
        .await?;
    conversations
        .append_message(&chat.public_id, &brian.public_id, "call later?", MessageKind::Text)
        .await?;

    let post_id = "demo-post-1";
    let root = comments
        .create(&CreateCommentRecord {
            post_id: post_id.to_string(),
            author_id: brian.id,
            parent_public_id: None,
            body: "great write-up".to_string(),
        })
        .await?;
    comments
        .create(&CreateCommentRecord {
            post_id: post_id.to_string(),
            author_id: chloe.id,
            parent_public_id: Some(root.public_id.clone()),
            body: "agreed, the rollout section especially".to_string(),
        })
        .await?;

    println!("Seeded demo data:");
    println!("- users: ada, brian, chloe (brian and chloe follow ada, ada follows brian)");
    println!("- 1 chat between ada and brian with 3 messages");
    println!("- 2 comments on {post_id}");

    Ok(())
}

async fn ensure_user(
    users: &UserRepository,
    username: &str,
    avatar_url: Option<&str>,
) -> anyhow::Result<User> {
    if let Some(existing) = users.find_by_username(username).await? {
        return Ok(existing);
    }

    let request = CreateUserRequest {
        username: username.to_string(),
        avatar_url: avatar_url.map(str::to_string),
    };
    Ok(users.create(&request).await?)
}
