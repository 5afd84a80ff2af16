mod cli;
mod config;

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use livrec_engine::capture::{CaptureEngine, HttpCaptureEngine};
use livrec_engine::platform::PlatformFactory;
use livrec_engine::recorder::LiveRecorder;
use livrec_engine::registry::RecordingRegistry;
use livrec_engine::shutdown::ShutdownCoordinator;
use livrec_engine::transcode::{FfmpegTranscoder, Transcoder};

use crate::cli::Args;
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(&args);

    let app_config = AppConfig::load(&args.config)?;

    let registry = Arc::new(RecordingRegistry::new());
    let coordinator = Arc::new(ShutdownCoordinator::new(registry.clone()));
    let factory = PlatformFactory::builtin();
    let transcoder: Arc<dyn Transcoder> = Arc::new(FfmpegTranscoder::new());

    let mut recorders = Vec::with_capacity(app_config.streamers.len());
    for streamer in app_config.streamers {
        let platform = factory.create(&streamer)?;
        let engine: Arc<dyn CaptureEngine> = Arc::new(HttpCaptureEngine::new(&streamer)?);
        let recorder = LiveRecorder::new(
            streamer,
            platform,
            registry.clone(),
            engine,
            transcoder.clone(),
        )?;
        recorders.push(tokio::spawn(recorder.start(coordinator.subscribe())));
    }
    info!(streamers = recorders.len(), "livrec started");

    // The sweeper runs for the whole process lifetime so any shutdown
    // request, wherever it originates, closes the in-flight recordings.
    let sweeper = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.run().await }
    });

    wait_for_shutdown_signal().await;
    coordinator.request_shutdown();

    if let Err(join_error) = sweeper.await {
        error!(error = %join_error, "shutdown sweep task failed");
    }
    for recorder in recorders {
        let _ = recorder.await;
    }

    info!("livrec stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Console output plus a daily-rotated plain-text file under `log_dir`.
/// The returned guard must stay alive so buffered log lines are flushed on
/// exit.
fn init_logging(args: &Args) -> WorkerGuard {
    let filter = if args.quiet {
        EnvFilter::new("error")
    } else if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let file_appender = tracing_appender::rolling::daily(&args.log_dir, "livrec.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    guard
}
