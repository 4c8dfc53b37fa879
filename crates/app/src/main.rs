use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use wakevox_app::engine::EngineConfig;
use wakevox_app::runtime;
use wakevox_audio::CaptureConfig;
use wakevox_foundation::ShutdownHandler;

#[derive(Parser, Debug)]
#[command(name = "wakevox", about = "Always-on wake-word listener")]
struct Cli {
    /// Input device name. Defaults to the capture preference list.
    #[arg(long, env = "WAKEVOX_DEVICE")]
    device: Option<String>,

    /// Wake phrases, comma separated. Matched by substring containment,
    /// case-normalized at configuration time.
    #[arg(long, value_delimiter = ',', default_value = "hey wakevox")]
    wake_phrase: Vec<String>,

    /// Packaged model tree to provision from.
    #[arg(long, default_value = "assets/model")]
    model_assets: PathBuf,

    /// Writable per-install model location.
    #[arg(long, default_value = "data/model")]
    model_dir: PathBuf,

    /// Provision record path.
    #[arg(long, default_value = "data/provision.json")]
    provision_state: PathBuf,

    /// Seconds before a stuck handoff is forcibly resumed.
    #[arg(long, default_value_t = 30)]
    handoff_timeout_secs: u64,
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "wakevox.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    std::mem::forget(guard);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging().map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;
    tracing::info!("starting wakevox");

    let config = EngineConfig {
        wake_phrases: cli.wake_phrase.clone(),
        capture: CaptureConfig {
            preferred_device: cli.device.clone(),
            ..Default::default()
        },
        handoff_timeout: Duration::from_secs(cli.handoff_timeout_secs),
        ..Default::default()
    };

    let deps = build_deps(&cli)?;
    let mut handle = runtime::start(config, deps).await?;

    // Stand-ins for the external collaborators: the launcher logs the
    // trigger and waits for the operator to resume; the notifier logs
    // terminal failures.
    let mut hotword_rx = handle.hotword_rx.take().expect("hotword receiver");
    tokio::spawn(async move {
        while hotword_rx.recv().await.is_some() {
            tracing::info!("hotword fired: launch the assistant session, then type 'resume'");
        }
    });
    let mut failure_rx = handle.failure_rx.take().expect("failure receiver");
    tokio::spawn(async move {
        while let Some(failure) = failure_rx.recv().await {
            tracing::error!(?failure, "hotword engine disabled");
        }
    });

    let shutdown = ShutdownHandler::new().install();
    let control = handle.control.clone();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // Line-oriented control loop standing in for the conversational-loop
    // collaborator's pause/resume signals.
    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            line = lines.next_line() => {
                match line {
                    Ok(Some(cmd)) => match cmd.trim() {
                        "pause" => control.pause().await,
                        "resume" => control.resume().await,
                        "quit" | "exit" => break,
                        "" => {}
                        _ => println!("commands: pause | resume | quit"),
                    },
                    _ => break,
                }
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

#[cfg(feature = "vosk")]
fn build_deps(cli: &Cli) -> anyhow::Result<runtime::EngineDeps> {
    use std::sync::Arc;

    use wakevox_app::stt::{build_vosk_stack, ModelPaths};
    use wakevox_stt::version_code;

    let paths = ModelPaths {
        assets_dir: cli.model_assets.clone(),
        target_dir: cli.model_dir.clone(),
        state_file: cli.provision_state.clone(),
    };
    let capture = CaptureConfig {
        preferred_device: cli.device.clone(),
        ..Default::default()
    };
    let (builder, flag_sink) =
        build_vosk_stack(&paths, capture, version_code(env!("CARGO_PKG_VERSION")))?;
    Ok(runtime::EngineDeps {
        builder,
        flag_sink,
        permission: Arc::new(runtime::AlwaysGranted),
    })
}

#[cfg(not(feature = "vosk"))]
fn build_deps(_cli: &Cli) -> anyhow::Result<runtime::EngineDeps> {
    anyhow::bail!("wakevox was built without a recognizer backend; rebuild with --features vosk")
}
