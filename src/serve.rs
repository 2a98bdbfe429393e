//! Runs the bot in webhook or long-polling mode with graceful shutdown.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::get;
use clap::Args;
use teloxide::prelude::*;
use teloxide::update_listeners::{Polling, UpdateListener, webhooks};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use crate::bot::{BotState, handle_inline_query, handle_message};
use crate::config::{Config, ConfigError, RunMode};
use crate::fxrates;

/// How long a Telegram long poll is held open.
const POLLING_TIMEOUT: Duration = Duration::from_secs(10);
/// How long in-flight requests and updates get to finish once shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// The path to the server TOML configuration, if any
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Webhook listen address
    #[arg(long)]
    pub listen: Option<String>,
}

#[derive(Debug)]
pub enum ServeError {
    ReadConfig(ConfigError),
    Env(ConfigError),
    InvalidConfig(ConfigError),
    OpenLogFile(std::io::Error),
    FxRates(fxrates::Error),
    CreateBot(teloxide::RequestError),
    SetWebhook(teloxide::RequestError),
    DeleteWebhook(teloxide::RequestError),
    InvalidWebhookUrl(String),
    Listen {
        address: String,
        source: std::io::Error,
    },
    Server(std::io::Error),
    /// In-flight updates did not drain within the grace period.
    ShutdownTimeout,
    Join(tokio::task::JoinError),
}

impl fmt::Display for ServeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadConfig(e) => write!(f, "unable to read server config, {}", e),
            Self::Env(e) => write!(f, "{}", e),
            Self::InvalidConfig(e) => write!(f, "invalid config: {}", e),
            Self::OpenLogFile(e) => write!(f, "unable to open log file: {}", e),
            Self::FxRates(e) => write!(f, "unable to create rates client: {}", e),
            Self::CreateBot(e) => write!(f, "unable to create bot: {}", e),
            Self::SetWebhook(e) => write!(f, "unable to set webhook: {}", e),
            Self::DeleteWebhook(e) => write!(f, "unable to delete webhook: {}", e),
            Self::InvalidWebhookUrl(url) => write!(f, "invalid webhook url: {:?}", url),
            Self::Listen { address, source } => {
                write!(f, "unable to listen on {}: {}", address, source)
            }
            Self::Server(e) => write!(f, "webhook server error: {}", e),
            Self::ShutdownTimeout => write!(f, "shutdown grace period exceeded"),
            Self::Join(e) => write!(f, "background task failed: {}", e),
        }
    }
}

impl std::error::Error for ServeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadConfig(e) | Self::Env(e) | Self::InvalidConfig(e) => Some(e),
            Self::OpenLogFile(e) | Self::Server(e) => Some(e),
            Self::FxRates(e) => Some(e),
            Self::CreateBot(e) | Self::SetWebhook(e) | Self::DeleteWebhook(e) => Some(e),
            Self::InvalidWebhookUrl(_) | Self::ShutdownTimeout => None,
            Self::Listen { source, .. } => Some(source),
            Self::Join(e) => Some(e),
        }
    }
}

/// Loads configuration, connects to Telegram and the rates API, and
/// dispatches updates until a shutdown signal arrives.
pub async fn run(args: ServeArgs) -> Result<(), ServeError> {
    let mut config = match &args.config {
        Some(path) => Config::read(path).map_err(ServeError::ReadConfig)?,
        None => Config::default(),
    };

    let _guard = init_tracing()?;

    if dotenvy::dotenv().is_err() {
        warn!("unable to load .env file");
    }

    config.apply_env().map_err(ServeError::Env)?;

    // The --listen flag wins over both the file and the environment.
    if let Some(listen) = &args.listen {
        config.listen_address = listen.clone();
    }

    config.validate().map_err(ServeError::InvalidConfig)?;

    let fx = fxrates::Client::new(config.fxrates.base_url.clone(), config.fxrates.timeout)
        .map_err(ServeError::FxRates)?;
    let state = Arc::new(BotState::new(fx));

    let bot = Bot::new(&config.telegram.token);
    let me = bot.get_me().await.map_err(ServeError::CreateBot)?;
    info!("🚀 Starting ChiguiCifras as @{}", me.username());

    let shutdown = CancellationToken::new();
    spawn_signal_watcher(shutdown.clone());

    match config.run_mode() {
        RunMode::Webhook => run_webhook_mode(bot, state, &config, shutdown).await,
        RunMode::Polling => run_polling_mode(bot, state, shutdown).await,
    }
}

async fn run_webhook_mode(
    bot: Bot,
    state: Arc<BotState>,
    config: &Config,
    shutdown: CancellationToken,
) -> Result<(), ServeError> {
    let webhook_url = reqwest::Url::parse(&config.telegram.webhook_url)
        .map_err(|_| ServeError::InvalidWebhookUrl(config.telegram.webhook_url.clone()))?;

    let listener = TcpListener::bind(&config.listen_address)
        .await
        .map_err(|e| ServeError::Listen {
            address: config.listen_address.clone(),
            source: e,
        })?;
    let local_address = listener.local_addr().map_err(|e| ServeError::Listen {
        address: config.listen_address.clone(),
        source: e,
    })?;

    // A stale registration would keep deliveries pointed at the old URL.
    if let Err(e) = bot.delete_webhook().await {
        warn!("Failed to delete existing webhook: {e}");
    }

    let mut set_webhook = bot.set_webhook(webhook_url.clone());
    set_webhook.secret_token = Some(config.telegram.webhook_secret_token.clone());
    set_webhook.await.map_err(ServeError::SetWebhook)?;

    let options = webhooks::Options::new(local_address, webhook_url.clone())
        .secret_token(config.telegram.webhook_secret_token.clone());
    let (mut update_listener, stop_flag, router) = webhooks::axum_no_setup(options);
    let stop_token = update_listener.stop_token();

    let app = router.route("/health", get(health));

    let mut dispatcher = build_dispatcher(bot, state);
    let shutdown_token = dispatcher.shutdown_token();

    let mut tasks: JoinSet<Result<(), ServeError>> = JoinSet::new();

    let webhook_path = webhook_url.path().to_string();
    let server_shutdown = shutdown.clone();
    tasks.spawn(async move {
        info!(
            "🌐 Starting webhook listener on {local_address} (path {webhook_path}, url {webhook_url})"
        );

        let server = async { axum::serve(listener, app).with_graceful_shutdown(stop_flag).await };
        // Cancellation starts the drain clock; connections still open at the
        // deadline are dropped.
        let deadline = async {
            server_shutdown.cancelled().await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        };

        tokio::select! {
            result = server => {
                result.map_err(ServeError::Server)?;
                info!("server shut down");
                Ok(())
            }
            _ = deadline => Err(ServeError::ShutdownTimeout),
        }
    });

    tasks.spawn(async move {
        info!("🤖 Starting telegram bot in webhook mode");
        dispatcher
            .dispatch_with_listener(
                update_listener,
                LoggingErrorHandler::with_custom_text("webhook update listener error"),
            )
            .await;

        Ok(())
    });

    spawn_shutdown_watcher(&mut tasks, shutdown.clone(), stop_token, shutdown_token);

    wait_all(tasks, shutdown).await
}

async fn run_polling_mode(
    bot: Bot,
    state: Arc<BotState>,
    shutdown: CancellationToken,
) -> Result<(), ServeError> {
    // Telegram rejects long polling while a webhook is registered.
    let mut delete_webhook = bot.delete_webhook();
    delete_webhook.drop_pending_updates = Some(true);
    delete_webhook.await.map_err(ServeError::DeleteWebhook)?;

    let mut update_listener = Polling::builder(bot.clone())
        .timeout(POLLING_TIMEOUT)
        .build();
    let stop_token = update_listener.stop_token();

    let mut dispatcher = build_dispatcher(bot, state);
    let shutdown_token = dispatcher.shutdown_token();

    let mut tasks: JoinSet<Result<(), ServeError>> = JoinSet::new();

    tasks.spawn(async move {
        info!("🤖 Starting telegram bot in polling mode");
        dispatcher
            .dispatch_with_listener(
                update_listener,
                LoggingErrorHandler::with_custom_text("polling update listener error"),
            )
            .await;

        Ok(())
    });

    spawn_shutdown_watcher(&mut tasks, shutdown.clone(), stop_token, shutdown_token);

    wait_all(tasks, shutdown).await
}

fn build_dispatcher(
    bot: Bot,
    state: Arc<BotState>,
) -> Dispatcher<Bot, teloxide::RequestError, teloxide::dispatching::DefaultKey> {
    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_inline_query().endpoint(handle_inline_query));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
}

/// Stops the update listener once the token fires, then drains the dispatcher
/// within the grace period.
fn spawn_shutdown_watcher(
    tasks: &mut JoinSet<Result<(), ServeError>>,
    shutdown: CancellationToken,
    stop_token: teloxide::stop::StopToken,
    shutdown_token: teloxide::dispatching::ShutdownToken,
) {
    tasks.spawn(async move {
        shutdown.cancelled().await;

        stop_token.stop();
        if let Ok(wait) = shutdown_token.shutdown()
            && tokio::time::timeout(SHUTDOWN_GRACE, wait).await.is_err()
        {
            return Err(ServeError::ShutdownTimeout);
        }

        Ok(())
    });
}

/// Waits for every task; the first failure aborts the rest and is returned.
async fn wait_all(
    mut tasks: JoinSet<Result<(), ServeError>>,
    shutdown: CancellationToken,
) -> Result<(), ServeError> {
    let mut first_error = None;

    while let Some(joined) = tasks.join_next().await {
        let result = match joined {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => continue,
            Err(e) => Err(ServeError::Join(e)),
        };

        if let Err(e) = result
            && first_error.is_none()
        {
            first_error = Some(e);
            shutdown.cancel();
            tasks.abort_all();
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn spawn_signal_watcher(shutdown: CancellationToken) {
    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal};

        let interrupt = signal(SignalKind::interrupt());
        let terminate = signal(SignalKind::terminate());
        let quit = signal(SignalKind::quit());

        let (Ok(mut interrupt), Ok(mut terminate), Ok(mut quit)) = (interrupt, terminate, quit)
        else {
            warn!("Failed to register signal handlers");
            return;
        };

        tokio::select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
            _ = quit.recv() => {}
        }

        info!("🛑 Shutdown signal received");
        shutdown.cancel();
    });
}

async fn health() -> StatusCode {
    StatusCode::OK
}

fn init_tracing() -> Result<tracing_appender::non_blocking::WorkerGuard, ServeError> {
    let log_dir = Path::new("logs");
    std::fs::create_dir_all(log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("chigui.log"))
        .map_err(ServeError::OpenLogFile)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    Ok(guard)
}
