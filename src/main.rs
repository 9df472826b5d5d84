use std::{
    error::Error as StdError,
    future::IntoFuture,
    io::Write,
    process,
    sync::Arc,
};

use pagewright::{
    application::{
        error::AppError,
        live_preview::{LivePreview, LivePreviewConfig},
        sanitize::{AmmoniaSanitizer, Sanitizer},
    },
    config,
    infra::{
        contentstack::ContentstackClient,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

const RENDER_BODY_LIMIT: usize = 16 * 1024 * 1024;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let chain = std::iter::successors(Some(error as &dyn StdError), |err: &&dyn StdError| (*err).source())
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ");
    if dispatcher::has_been_set() {
        error!(error = %chain, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %chain, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Render(args) => run_render(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let live_preview = LivePreview::init(&LivePreviewConfig {
        enabled: settings.live_preview.enabled,
        capacity: settings.live_preview.capacity.get() as usize,
    });
    let state = build_http_state(&settings, Some(live_preview))?;
    serve_http(&settings, state).await
}

/// Render one route through the same pipeline the server uses.
async fn run_render(settings: config::Settings, args: config::RenderArgs) -> Result<(), AppError> {
    let state = build_http_state(&settings, None)?;

    info!(
        target = "pagewright::render",
        path = %args.path,
        "rendering route"
    );
    let response = http::render_request_path(&state, &args.path).await;
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), RENDER_BODY_LIMIT)
        .await
        .map_err(|err| AppError::unexpected(format!("failed to collect rendered body: {err}")))?;

    match args.output.as_ref() {
        Some(path) => {
            std::fs::write(path, &body).map_err(|err| AppError::from(InfraError::from(err)))?;
            info!(
                target = "pagewright::render",
                output = %path.display(),
                bytes = body.len(),
                "wrote rendered page"
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&body)
                .and_then(|()| stdout.flush())
                .map_err(|err| AppError::from(InfraError::from(err)))?;
        }
    }

    if status.is_success() {
        Ok(())
    } else {
        Err(AppError::RenderStatus {
            path: args.path,
            status,
        })
    }
}

fn build_http_state(
    settings: &config::Settings,
    live_preview: Option<LivePreview>,
) -> Result<HttpState, AppError> {
    let client = ContentstackClient::new(&settings.content, &settings.live_preview)?;
    let sanitizer: Arc<dyn Sanitizer> = Arc::new(AmmoniaSanitizer::new());

    Ok(HttpState::new(
        Arc::new(client),
        sanitizer,
        live_preview,
        settings.site.clone(),
    ))
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let live_preview = state.live_preview.is_some();
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "pagewright::serve",
        addr = %settings.server.addr,
        live_preview,
        "listening"
    );

    let signalled = Arc::new(Notify::new());
    let on_signal = Arc::clone(&signalled);
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            on_signal.notify_one();
        })
        .into_future();
    let mut handle = tokio::spawn(server);

    tokio::select! {
        joined = &mut handle => return server_outcome(joined),
        () = signalled.notified() => {}
    }

    // Live-preview streams never end on their own; bound the drain.
    let grace = settings.server.graceful_shutdown;
    info!(
        target = "pagewright::serve",
        grace_seconds = grace.as_secs(),
        "shutting down"
    );
    match tokio::time::timeout(grace, &mut handle).await {
        Ok(joined) => server_outcome(joined),
        Err(_) => {
            warn!(
                target = "pagewright::serve",
                "graceful shutdown timed out; dropping open connections"
            );
            handle.abort();
            Ok(())
        }
    }
}

fn server_outcome(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(result) => result.map_err(|err| AppError::from(InfraError::from(err))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "pagewright::serve", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(target = "pagewright::serve", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
