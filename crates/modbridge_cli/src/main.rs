//! CLI host for the module bridge.
//!
//! # Responsibility
//! - Start a bridge session with the built-in modules and drive it from a shell.
//! - Act as the main loop: pump main-queue work while a call is pending.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use modbridge_core::bridge::decode_reply;
use modbridge_core::{init_logging, Bridge, BridgeConfig, BridgeValue, ModuleContext, Outcome};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

const PUMP_INTERVAL: Duration = Duration::from_millis(2);

#[derive(Debug, Parser)]
#[command(name = "modbridge", version, about = "Drive native bridge modules from a shell")]
struct Cli {
    /// Bridge config file (TOML).
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
    /// Directory for persistent module data; in-memory when omitted.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Give up on a pending call after this many milliseconds.
    #[arg(long, default_value_t = 5_000)]
    timeout_ms: u64,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print core health and version.
    Ping,
    /// List modules with their methods and queues.
    List,
    /// Print exported constants as JSON.
    Constants {
        /// Only this module.
        module: Option<String>,
    },
    /// Invoke one method; arguments are a JSON array.
    Call {
        module: String,
        method: String,
        #[arg(default_value = "[]")]
        arguments: String,
    },
    /// Submit a raw call envelope and print the reply envelope.
    Submit { envelope: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Command::Ping = cli.command {
        println!("modbridge_core ping={}", modbridge_core::ping());
        println!("modbridge_core version={}", modbridge_core::core_version());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };
    if let Some(dir) = &config.logging.dir {
        init_logging(&config.logging.level, &dir.to_string_lossy())?;
    }

    let mut context = ModuleContext::new();
    if let Some(dir) = &cli.data_dir {
        context = context.with_data_dir(dir);
    }
    let bridge = Bridge::start_builtin(&config, context).context("failed to start bridge")?;
    let timeout = Duration::from_millis(cli.timeout_ms);
    info!(
        "event=cli_start module=cli status=ok session={} modules={}",
        bridge.session_id(),
        bridge.registry().len()
    );

    let result = run(&bridge, cli.command, timeout);
    bridge.shutdown();
    result
}

fn run(bridge: &Bridge, command: Command, timeout: Duration) -> Result<()> {
    match command {
        Command::Ping => {}
        Command::List => {
            let registry = bridge.registry();
            for (module, methods) in registry.exported_methods() {
                let queue = registry
                    .get(&module)
                    .map(|module| module.method_queue().to_string())
                    .unwrap_or_default();
                println!("{module} (queue={queue})");
                for (name, selector) in methods {
                    println!("  {name} -> {selector}");
                }
            }
        }
        Command::Constants { module } => {
            let constants = bridge.registry().exported_constants();
            let value = match module {
                Some(module) => match constants.get(&module) {
                    Some(constants) => BridgeValue::from(constants.clone()),
                    None => bail!("module is not registered: {module}"),
                },
                None => BridgeValue::Map(
                    constants
                        .into_iter()
                        .map(|(name, constants)| (name, BridgeValue::from(constants)))
                        .collect(),
                ),
            };
            println!("{}", value.to_json_string());
        }
        Command::Call {
            module,
            method,
            arguments,
        } => {
            let arguments: Vec<BridgeValue> =
                serde_json::from_str(&arguments).context("arguments must be a JSON array")?;
            let handle = bridge.call(&module, &method, arguments);
            match await_outcome(bridge, handle, timeout)? {
                Ok(value) => println!("{}", value.to_json_string()),
                Err(error) => bail!("{error}"),
            }
        }
        Command::Submit { envelope } => {
            let (reply_tx, reply_rx) = mpsc::channel();
            bridge.submit_json(&envelope, move |reply| {
                let _ = reply_tx.send(reply);
            })?;
            let deadline = Instant::now() + timeout;
            let reply = loop {
                bridge.pump_main();
                if let Ok(reply) = reply_rx.recv_timeout(PUMP_INTERVAL) {
                    break reply;
                }
                if Instant::now() >= deadline {
                    bail!("no reply within {} ms", timeout.as_millis());
                }
            };
            decode_reply(&reply)?;
            println!("{reply}");
        }
    }
    Ok(())
}

fn await_outcome(
    bridge: &Bridge,
    mut handle: modbridge_core::PromiseHandle,
    timeout: Duration,
) -> Result<Outcome> {
    let deadline = Instant::now() + timeout;
    loop {
        bridge.pump_main();
        if let Some(outcome) = handle.try_take() {
            return Ok(outcome);
        }
        if Instant::now() >= deadline {
            bail!("call did not settle within {} ms", timeout.as_millis());
        }
        thread::sleep(PUMP_INTERVAL);
    }
}
