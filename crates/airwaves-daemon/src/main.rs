mod http;
mod mpv;

use std::sync::Arc;

use airwaves_core::host::{HostApi, HostUi, LauncherControl};
use airwaves_core::storage::JsonFileStore;
use airwaves_core::{PluginCore, PluginEvent};
use airwaves_proto::config::Config;
use airwaves_proto::protocol::Broadcast;
use tokio::sync::{broadcast, mpsc};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// A tracing layer that forwards WARN/ERROR lines to the broadcast channel.
struct BroadcastLayer {
    sender: broadcast::Sender<Broadcast>,
}

impl BroadcastLayer {
    fn new(sender: broadcast::Sender<Broadcast>) -> Self {
        Self { sender }
    }
}

impl<S> tracing_subscriber::Layer<S> for BroadcastLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let level = event.metadata().level();
        if !matches!(*level, tracing::Level::WARN | tracing::Level::ERROR) {
            return;
        }

        let mut message = format!("{} [{}] ", chrono::Local::now().format("%H:%M:%S"), level);
        let mut visitor = MessageVisitor(&mut message);
        event.record(&mut visitor);

        // No receivers is fine.
        let _ = self.sender.send(Broadcast::Log { message });
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl<'a> tracing::field::Visit for MessageVisitor<'a> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{:?}", value));
        } else {
            self.0.push_str(&format!(" {}={:?}", field.name(), value));
        }
    }
}

/// No toolbar to draw into: the launcher is only logged.
struct LogOnlyUi;

impl HostUi for LogOnlyUi {
    fn register_slot(&self, slot: &str, control: LauncherControl) {
        info!("launcher {:?} ({}) registered in {}", control.label, control.id, slot);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (broadcast_tx, _) = broadcast::channel::<Broadcast>(100);

    let data_dir = airwaves_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("airwaves.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(BroadcastLayer::new(broadcast_tx.clone()))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "info,airwaves_core=debug,airwaves_daemon=debug",
                )
            }),
        )
        .init();

    info!("Log file: {:?}", log_path);

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    let (event_tx, event_rx) = mpsc::channel::<PluginEvent>(256);

    let storage = Arc::new(JsonFileStore::open(config.storage.state_file.clone()).await);
    info!("State file: {:?}", storage.path());
    let player = Arc::new(mpv::MpvPlayer::new(
        airwaves_proto::platform::find_mpv_binary(),
        config.player.volume,
        event_tx.clone(),
    ));
    let host = HostApi::default()
        .with_storage(storage)
        .with_player(player.clone())
        .with_ui(Arc::new(LogOnlyUi));

    let core = PluginCore::init(&config, host, broadcast_tx.clone(), event_tx.clone()).await?;
    let handle = core.handle();

    if config.http.enabled {
        let _http_handle =
            http::start_server(config.http.bind_address.clone(), config.http.port, handle.clone());
        println!(
            "airwaves: control API on http://{}:{}/api/state",
            config.http.bind_address, config.http.port
        );
    }

    let shutdown = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            shutdown.shutdown().await;
        }
    });

    info!("Plugin initialised, running event loop");
    core.run(event_rx).await;
    player.stop().await;

    Ok(())
}
