//! jxlink - gateway between JX door controllers and an aggregation server

use std::net::Ipv4Addr;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::{Local, NaiveDate};
use clap::builder::FalseyValueParser;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jxlink::{Bridge, BridgeConfig, RemoteConfig, Reply, Session, StoreId};

#[derive(Parser)]
#[command(name = "jxlink", version, about)]
struct Cli {
    /// UDP port the controllers report to
    #[arg(long, env = "LOCAL_PORT", default_value_t = 6767)]
    local_port: u16,

    /// UDP port the controllers listen on
    #[arg(long, env = "DEVICE_PORT", default_value_t = 6767)]
    device_port: u16,

    /// Aggregation server host
    #[arg(long, env = "REMOTE_HOST")]
    remote_host: Option<String>,

    /// Aggregation server port
    #[arg(long, env = "REMOTE_PORT", default_value_t = 8000)]
    remote_port: u16,

    /// Store code announced to the server
    #[arg(long, env = "STORE_ID")]
    store_id: Option<String>,

    /// Delay before reconnecting, in milliseconds
    #[arg(long, env = "RECONNECT_INTERVAL", default_value_t = 5000)]
    reconnect_interval: u64,

    /// Server heartbeat interval, in milliseconds
    #[arg(long, env = "REMOTE_TCP_TIMEOUT", default_value_t = 3_650_000)]
    remote_tcp_timeout: u64,

    /// Heartbeats missed before the link is dropped
    #[arg(long, env = "TCP_TIMEOUT_MULTIPLIER", default_value_t = 2)]
    tcp_timeout_multiplier: u32,

    /// Command reply window, in seconds
    #[arg(long, env = "COMMAND_TIMEOUT", default_value_t = 30)]
    command_timeout: u64,

    /// Verbose logging; any value but an explicit false turns it on
    #[arg(long, env = "DEBUG", value_parser = FalseyValueParser::new())]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the bridge until interrupted
    Run,

    /// Send one command to a controller on the local network
    Send {
        /// Controller address, broadcast when omitted
        #[arg(long)]
        address: Option<Ipv4Addr>,

        #[command(subcommand)]
        action: Action,
    },
}

#[derive(Subcommand)]
enum Action {
    Init,
    OpenDoor {
        #[arg(default_value_t = 1)]
        door: u8,
        /// Keep the door open instead of closing it automatically
        #[arg(long)]
        hold: bool,
    },
    ReadTime,
    /// Set the controller clock to now
    SetTime,
    RegisterCard {
        card: u32,
        /// Expiry date, YYYY-MM-DD
        expires: NaiveDate,
    },
    DeleteCard {
        card: u32,
    },
    QueryAuth {
        card: u32,
    },
    EnableRealtime,
    DisableRealtime,
    SetServer,
}

impl Cli {
    fn remote(&self) -> anyhow::Result<Option<RemoteConfig>> {
        let Some(host) = &self.remote_host else {
            return Ok(None);
        };
        let Some(store_id) = &self.store_id else {
            bail!("STORE_ID is required when REMOTE_HOST is set");
        };

        let remote = RemoteConfig::new(host.clone(), self.remote_port, StoreId::new(store_id.clone())?)
            .with_reconnect_interval(Duration::from_millis(self.reconnect_interval))
            .with_remote_timeout(
                Duration::from_millis(self.remote_tcp_timeout),
                self.tcp_timeout_multiplier,
            );

        Ok(Some(remote))
    }

    fn bridge_config(&self) -> anyhow::Result<BridgeConfig> {
        let mut config = BridgeConfig::new(self.local_port)
            .with_device_port(self.device_port)
            .with_command_timeout(Duration::from_secs(self.command_timeout));

        if let Some(remote) = self.remote()? {
            config = config.with_remote(remote);
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();

    match &cli.command {
        None | Some(Command::Run) => run(&cli).await,
        Some(Command::Send { address, action }) => send(&cli, *address, action).await,
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.bridge_config()?;
    if config.remote.is_none() {
        tracing::warn!("No REMOTE_HOST configured, running as local endpoint only");
    }

    let bridge = Bridge::bind(config).await.context("starting bridge")?;

    tokio::select! {
        _ = bridge.run() => {}
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for Ctrl-C")?;
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}

async fn send(cli: &Cli, address: Option<Ipv4Addr>, action: &Action) -> anyhow::Result<()> {
    // Ephemeral port so a running bridge keeps its socket
    let config = BridgeConfig::new(0)
        .with_device_port(cli.device_port)
        .with_command_timeout(Duration::from_secs(cli.command_timeout));

    let bridge = Bridge::bind(config).await.context("binding local socket")?;
    let runner = bridge.clone();
    let task = tokio::spawn(async move { runner.run().await });

    let session = bridge.session(address)?;
    let result = execute(&session, action).await;
    task.abort();

    match result? {
        Outcome::Reply(Reply::Sent) => println!("sent"),
        Outcome::Reply(Reply::Received(frame)) => match frame.fields() {
            Ok(fields) => println!("{}: {}", frame.code, fields),
            Err(_) => println!("{}", frame),
        },
        Outcome::Time(time) => println!("{}", time.format("%Y-%m-%d %H:%M:%S %:z")),
    }

    Ok(())
}

enum Outcome {
    Reply(Reply),
    Time(chrono::DateTime<chrono::FixedOffset>),
}

async fn execute(session: &Session, action: &Action) -> jxlink::Result<Outcome> {
    let reply = match action {
        Action::Init => session.init_device().await?,
        Action::OpenDoor { door, hold } => session.open_door(*door, !hold).await?,
        Action::ReadTime => return Ok(Outcome::Time(session.read_time().await?)),
        Action::SetTime => session.set_time(&Local::now()).await?,
        Action::RegisterCard { card, expires } => session.register_card(*card, *expires).await?,
        Action::DeleteCard { card } => session.delete_card(*card).await?,
        Action::QueryAuth { card } => session.query_auth(*card).await?,
        Action::EnableRealtime => session.enable_realtime().await?,
        Action::DisableRealtime => session.disable_realtime().await?,
        Action::SetServer => session.set_server().await?,
    };
    Ok(Outcome::Reply(reply))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::builder::TypedValueParser;
    use clap::CommandFactory;
    use std::ffi::OsStr;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_send_open_door_parses() {
        let cli = Cli::try_parse_from([
            "jxlink", "send", "--address", "192.168.3.250", "open-door", "2", "--hold",
        ])
        .unwrap();

        match cli.command {
            Some(Command::Send {
                address,
                action: Action::OpenDoor { door, hold },
            }) => {
                assert_eq!(address, Some(Ipv4Addr::new(192, 168, 3, 250)));
                assert_eq!(door, 2);
                assert!(hold);
            }
            _ => panic!("unexpected command"),
        }
    }

    #[test]
    fn test_remote_requires_store_id() {
        let cli = Cli {
            local_port: 6767,
            device_port: 6767,
            remote_host: Some("server.local".into()),
            remote_port: 8000,
            store_id: None,
            reconnect_interval: 5000,
            remote_tcp_timeout: 3_650_000,
            tcp_timeout_multiplier: 2,
            command_timeout: 30,
            debug: false,
            command: None,
        };
        assert!(cli.remote().is_err());

        let cli = Cli {
            store_id: Some("S01".into()),
            ..cli
        };
        let remote = cli.remote().unwrap().unwrap();
        assert_eq!(remote.store_id.as_str(), "S01");
    }

    #[test]
    fn test_debug_accepts_numeric_values() {
        let cmd = Cli::command();
        let parser = FalseyValueParser::new();

        assert!(parser.parse_ref(&cmd, None, OsStr::new("1")).unwrap());
        assert!(parser.parse_ref(&cmd, None, OsStr::new("yes")).unwrap());
        assert!(!parser.parse_ref(&cmd, None, OsStr::new("0")).unwrap());
        assert!(!parser.parse_ref(&cmd, None, OsStr::new("false")).unwrap());
    }
}
