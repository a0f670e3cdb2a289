//! oscmux CLI - listen for, send and publish OSC over UDP
//!
//! A host application for the oscmux runtime: it owns an `OscContext` and
//! drives `update` on a fixed poll interval until Ctrl+C.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use oscmux::{
    OscConfig, OscContext, OscMessage, UdpConfig, UdpTransport, ValueSource, DEFAULT_OSC_PORT,
};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod values;

use config::CliConfig;

/// Deepest address matched when `listen` is given no patterns
const CATCH_ALL_DEPTH: usize = 8;

/// oscmux - Open Sound Control over UDP
#[derive(Parser)]
#[command(name = "oscmux")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "OSCMUX_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Local interface to bind
    #[arg(short, long, global = true, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Allow sending to broadcast addresses
    #[arg(long, global = true)]
    broadcast: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every message received on a port
    Listen {
        /// UDP port to listen on
        #[arg(short, long, default_value_t = DEFAULT_OSC_PORT)]
        port: u16,

        /// Address patterns to subscribe to (default: everything)
        pattern: Vec<String>,

        /// Only accept messages with this type signature (e.g. ",if")
        #[arg(short, long)]
        signature: Option<String>,
    },

    /// Send one message
    Send {
        /// Destination host (IP literal or localhost)
        host: String,

        /// Destination port
        port: u16,

        /// OSC address
        address: String,

        /// Arguments, e.g. i:42 f:0.5 s:text T N b:00ff
        args: Vec<String>,

        /// Local port to send from
        #[arg(long)]
        from: Option<u16>,
    },

    /// Send a message repeatedly
    Publish {
        /// Destination host (IP literal or localhost)
        host: String,

        /// Destination port
        port: u16,

        /// OSC address
        address: String,

        /// Arguments, e.g. i:42 f:0.5 s:text T N b:00ff
        args: Vec<String>,

        /// Milliseconds between sends
        #[arg(short, long, default_value = "1000", conflicts_with = "rate")]
        interval: u64,

        /// Sends per second instead of an interval
        #[arg(short, long)]
        rate: Option<f32>,

        /// Stop after this many sends
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Show version and configuration
    Info,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli.log_level, cli.json_logs)?;

    let config = CliConfig::load(cli.config.as_deref())?;
    let transport = UdpTransport::with_config(UdpConfig {
        bind_ip: cli.bind,
        broadcast: cli.broadcast,
        ..Default::default()
    });

    match cli.command {
        Commands::Listen {
            port,
            pattern,
            signature,
        } => {
            let mut ctx = OscContext::new(transport, config.osc.clone())?;
            let patterns = if pattern.is_empty() {
                catch_all_patterns(CATCH_ALL_DEPTH)
            } else {
                pattern
            };

            for pattern in &patterns {
                let handler = print_message;
                match &signature {
                    Some(signature) => ctx.subscribe_typed(port, pattern, signature, handler)?,
                    None => ctx.subscribe(port, pattern, handler)?,
                };
            }

            println!(
                "{} Listening on {}:{} for {}",
                "OSC".cyan().bold(),
                cli.bind,
                port,
                patterns.join(" ")
            );
            run_loop(&mut ctx, &config, |_| false).await?;
        }

        Commands::Send {
            host,
            port,
            address,
            args,
            from,
        } => {
            let mut ctx = OscContext::new(transport, config.osc.clone())?;
            let args = values::parse_values(&args)?;
            let message = OscMessage::with_args(address.as_str(), args.clone());

            match from {
                Some(local) => ctx.send_from(local, &host, port, &address, args)?,
                None => ctx.send(&host, port, &address, args)?,
            }
            println!("{} {} -> {}:{}", "SENT".green().bold(), message, host, port);
        }

        Commands::Publish {
            host,
            port,
            address,
            args,
            interval,
            rate,
            count,
        } => {
            let mut ctx = OscContext::new(transport, config.osc.clone())?;
            let args = values::parse_values(&args)?;
            let handle = ctx.publish(&host, port, &address, ValueSource::Fixed(args), interval)?;
            if let Some(rate) = rate {
                if let Some(entry) = ctx.publication_mut(handle) {
                    entry.set_frame_rate(rate);
                }
            }

            let interval = ctx
                .publication(handle)
                .map(|entry| entry.interval_ms())
                .unwrap_or(interval);
            println!(
                "{} {} -> {}:{} every {} ms",
                "PUBLISH".cyan().bold(),
                address,
                host,
                port,
                interval
            );

            let mut sent = 0;
            run_loop(&mut ctx, &config, |stats| {
                sent += stats.post.sent;
                count.is_some_and(|limit| sent >= limit)
            })
            .await?;
            println!("{} {} messages", "DONE".green().bold(), sent);
        }

        Commands::Info => {
            print_info(&config);
        }
    }

    Ok(())
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).compact())
            .init();
    }

    Ok(())
}

/// Call `update` every poll interval until Ctrl+C or `done` returns true
async fn run_loop<F>(
    ctx: &mut OscContext<UdpTransport>,
    config: &CliConfig,
    mut done: F,
) -> Result<()>
where
    F: FnMut(&oscmux::UpdateStats) -> bool,
{
    let mut tick = tokio::time::interval(Duration::from_millis(config.poll_interval_ms));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                match ctx.update() {
                    Ok(stats) => {
                        if done(&stats) {
                            break;
                        }
                    }
                    Err(e) if e.is_retryable() => warn!("update skipped: {}", e),
                    Err(e) => return Err(e.into()),
                }
            }
            result = &mut shutdown => {
                result.context("Failed to listen for ctrl+c")?;
                info!("Received shutdown signal");
                break;
            }
        }
    }

    Ok(())
}

fn print_message(message: &OscMessage) {
    println!("{} {}", "OSC".cyan(), message);
}

/// `/*`, `/*/*`, ... up to `depth` segments
fn catch_all_patterns(depth: usize) -> Vec<String> {
    (1..=depth).map(|n| "/*".repeat(n)).collect()
}

fn print_info(config: &CliConfig) {
    let osc: &OscConfig = &config.osc;

    println!("{}", "oscmux - Open Sound Control over UDP".cyan().bold());
    println!();
    println!("Version:    {}", env!("CARGO_PKG_VERSION"));
    println!("Platform:   {}", std::env::consts::OS);
    println!("Arch:       {}", std::env::consts::ARCH);
    println!();
    println!("{}", "Limits:".green());
    println!("  client port          {}", if osc.client_port == 0 { "ephemeral".to_string() } else { osc.client_port.to_string() });
    println!("  ports                {}", osc.max_ports);
    println!("  subscriptions/port   {}", osc.max_subscriptions);
    println!("  publications/port    {}", osc.max_publications);
    println!("  datagrams/parse      {}", osc.max_datagrams_per_parse);
    println!("  packet size          {} bytes", osc.max_packet_size);
    println!("  bundle depth         {}", osc.max_bundle_depth);
    println!("  poll interval        {} ms", config.poll_interval_ms);
    println!();
    println!("{}", "Examples:".green());
    println!("  oscmux listen --port 9000                       # Print everything on port 9000");
    println!("  oscmux listen -p 9000 '/mixer/*/fader'          # Only fader messages");
    println!("  oscmux send 127.0.0.1 9000 /light/1 f:0.5       # Send one message");
    println!("  oscmux publish 127.0.0.1 9000 /ping -r 30 -n 90 # 30 Hz for three seconds");
}
