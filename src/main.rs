use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use voice_clipper::{
    AudioFormat, Config, ConsentSource, GatewayEvent, IdleTransport, SessionConfig,
    SessionController, SessionRegistry, SpeakerId, OPT_IN_DEFAULT,
};

#[derive(Debug, Parser)]
#[command(name = "voice-clipper", about = "Capture a live voice session into a clip buffer")]
struct Cli {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/voice-clipper")]
    config: String,

    /// Server hosting the voice channel
    #[arg(long)]
    server_id: u64,

    /// Voice channel to join
    #[arg(long)]
    channel_id: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;
    info!("{} starting", cfg.service.name);

    let session_config = SessionConfig {
        server_id: cli.server_id,
        channel_id: cli.channel_id,
        clip_duration: Duration::from_secs(cfg.clip.clip_duration_secs),
        chunk_duration: Duration::from_secs(cfg.clip.chunk_duration_secs),
        gateway_url: cfg.gateway.url.clone(),
        token: cfg.gateway.token.clone(),
        intents: cfg.gateway.intents,
        ..SessionConfig::default()
    };
    let format = AudioFormat {
        channels: cfg.audio.channels,
        bits_per_sample: cfg.audio.bits_per_sample,
        sample_rate: cfg.audio.sample_rate,
    };

    // The media transport and consent store are external collaborators;
    // until real ones are attached the buffer fills with silent chunks and
    // every speaker gets the default opt-in status.
    let transport = Box::new(IdleTransport::new(format));
    let consent: Arc<dyn ConsentSource> = Arc::new(|_: SpeakerId| OPT_IN_DEFAULT);

    let mut registry = SessionRegistry::new();
    let mut controller = SessionController::new(session_config, transport, consent);
    controller.connect().await?;
    controller.start_capture().await?;
    registry.insert(controller);

    let Some(session) = registry.get_mut(cli.server_id) else {
        return Ok(());
    };

    loop {
        tokio::select! {
            event = session.next_event() => match event {
                Some(GatewayEvent::Connected) => info!("Voice session connected"),
                Some(GatewayEvent::MediaUpdate(params)) => {
                    info!("Media endpoint assigned: {}", params.endpoint)
                }
                Some(GatewayEvent::Disconnected { reason }) => {
                    warn!("Session ended: {}", reason);
                    break;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    session.shutdown().await?;
    Ok(())
}
