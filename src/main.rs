use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use voicewire::{Session, SessionConfig, SessionEvent};

/// Interactive realtime voice session against an Azure OpenAI deployment.
#[derive(Parser, Debug)]
#[command(name = "voicewire", version, about)]
struct Cli {
    /// Azure OpenAI resource endpoint (falls back to AZURE_OPENAI_ENDPOINT)
    #[arg(long)]
    endpoint: Option<String>,

    /// Realtime deployment name (falls back to AZURE_OPENAI_DEPLOYMENT)
    #[arg(long)]
    deployment: Option<String>,

    /// Azure region of the realtime endpoint (falls back to AZURE_OPENAI_REGION)
    #[arg(long)]
    region: Option<String>,

    /// Assistant voice
    #[arg(long)]
    voice: Option<String>,

    /// Standing API key (falls back to AZURE_OPENAI_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Pre-issued ephemeral key, forwarded as the bearer token as-is
    #[arg(long)]
    ephemeral_key: Option<String>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<SessionConfig> {
        let mut config = match (&self.endpoint, &self.deployment, &self.region) {
            (Some(endpoint), Some(deployment), Some(region)) => {
                SessionConfig::new(endpoint, deployment, region)
            }
            _ => SessionConfig::from_env().context(
                "incomplete configuration: set the AZURE_OPENAI_* variables \
                 or pass --endpoint, --deployment and --region",
            )?,
        };
        if let Some(voice) = self.voice {
            config = config.with_voice(voice);
        }
        if let Some(key) = self.api_key {
            config = config.with_api_key(key);
        }
        if let Some(key) = self.ephemeral_key {
            config = config.with_ephemeral_key(key);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Cli::parse().into_config()?;
    config.validate().context("invalid configuration")?;

    let mut session = Session::connect(config)
        .await
        .context("failed to start session")?;
    if let Some(id) = session.session_id() {
        info!("realtime session id: {id}");
    }

    let mut events = session.events().expect("event receiver already taken");
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::ChannelOpen { label } => println!("[channel] {label} open"),
                SessionEvent::ChannelMessage { text } => println!("[message] {text}"),
                SessionEvent::Transcript { text, is_final } => {
                    if is_final {
                        println!("[transcript] {text}");
                    }
                }
                SessionEvent::RemoteTrackStarted { codec } => {
                    println!("[audio] remote track started ({codec})");
                }
                SessionEvent::StateChanged(state) => println!("[state] {state}"),
                SessionEvent::Closed => {
                    println!("[closed]");
                    break;
                }
            }
        }
    });

    println!("Session live. Speak now; press Enter or Ctrl-C to hang up.");
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    tokio::select! {
        _ = stdin.next_line() => {}
        _ = tokio::signal::ctrl_c() => {}
    }

    session.close().await?;
    let _ = printer.await;
    Ok(())
}
