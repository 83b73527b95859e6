//! loralink CLI - run link-layer agents against an in-process radio.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use crossbeam_queue::ArrayQueue;
use tracing::info;

use loralink::agent::{Agent, ConnectionGoal};
use loralink::config::{init_logging, Config};
use loralink::error::Result;
use loralink::pipe::MessagePipe;
use loralink::radio::LocalRadio;
use loralink::types::{DeviceAddress, Payload};
use loralink::VERSION;

#[derive(Parser)]
#[command(name = "loralink", version = VERSION, about = "Narrow-band chat link layer tools")]
struct Cli {
    /// Path to a configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (overrides the configuration).
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run two agents over an in-process radio and watch them chat.
    Simulate(SimulateArgs),
    /// Print an example configuration file.
    Config,
}

#[derive(clap::Args)]
struct SimulateArgs {
    /// How long to run, in seconds.
    #[arg(long, default_value_t = 10)]
    duration: u64,

    /// Delivery window of the simulated radio, in milliseconds.
    #[arg(long, default_value_t = 300)]
    window_ms: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = if let Some(ref path) = cli.config {
        Config::load(path)?
    } else {
        Config::default()
    };
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Simulate(args) => simulate(&config, &args),
        Commands::Config => {
            let text = toml::to_string_pretty(&Config::example())
                .map_err(|e| loralink::Error::Config(e.to_string()))?;
            print!("{text}");
            Ok(())
        }
    }
}

/// Wire two agents to a shared radio, point them at each other, and let
/// them discover, handshake, and chat until the deadline.
fn simulate(config: &Config, args: &SimulateArgs) -> Result<()> {
    let radio = Arc::new(LocalRadio::new(Duration::from_millis(args.window_ms)));
    let deadline = Instant::now() + Duration::from_secs(args.duration);

    let mut workers = Vec::new();
    let mut inboxes = Vec::new();
    let roles = [
        ("alfa", DeviceAddress(0x0000_00A1), ConnectionGoal::Advertise),
        ("bravo", DeviceAddress(0x0000_00B2), ConnectionGoal::Seek),
    ];

    for (name, address, goal) in roles {
        let outbound = Arc::new(ArrayQueue::new(64));
        let inbound = Arc::new(ArrayQueue::new(64));
        inboxes.push((name, Arc::clone(&inbound)));

        let mut agent_config = config.agent_config();
        agent_config.address = address;
        let mut agent = Agent::new(
            agent_config,
            Arc::clone(&radio) as Arc<dyn loralink::radio::RadioPort>,
            MessagePipe::queued(Arc::clone(&outbound), inbound),
        );
        agent.set_goal(goal);
        let handle = agent.handle();

        workers.push(thread::spawn(move || {
            let mut counter = 0u64;
            while Instant::now() < deadline {
                if let Some(payload) = Payload::from_slice(format!("{name} #{counter}").as_bytes())
                {
                    if outbound.push(payload).is_ok() {
                        counter += 1;
                    }
                }
                agent.execute_agent_action();
            }
            handle.set_goal(ConnectionGoal::Disconnect);
            agent.execute_agent_action();
        }));
    }

    for worker in workers {
        worker
            .join()
            .map_err(|_| loralink::Error::Internal("agent thread panicked".into()))?;
    }

    for (name, inbound) in inboxes {
        let mut delivered = 0;
        while let Some(payload) = inbound.pop() {
            info!(
                peer = name,
                message = %String::from_utf8_lossy(payload.as_bytes()),
                "delivered"
            );
            delivered += 1;
        }
        info!(peer = name, delivered, "simulation finished");
    }

    Ok(())
}
