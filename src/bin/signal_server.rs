//! Standalone signaling server for RoomCall rooms
//!
//! Usage: roomcall-signal [--config <path>] [--addr <host:port>] [--capacity <n>]

use anyhow::{bail, Context};
use roomcall::{RoomCallConfig, SignalingHub, SignalingServer};
use std::env;

fn parse_args(args: &[String]) -> anyhow::Result<RoomCallConfig> {
    let mut config_path = None;
    let mut addr = None;
    let mut capacity = None;

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--config", Some(v)) => config_path = Some(v.clone()),
            ("--addr", Some(v)) => addr = Some(v.clone()),
            ("--capacity", Some(v)) => {
                capacity = Some(v.parse::<usize>().context("--capacity expects a number")?)
            }
            (flag, _) => bail!(
                "Unknown or incomplete argument '{}'\nUsage: roomcall-signal [--config <path>] [--addr <host:port>] [--capacity <n>]",
                flag
            ),
        }
        i += 2;
    }

    let mut config = match config_path {
        Some(path) => RoomCallConfig::load_from_file(&path)?,
        None => RoomCallConfig::load_or_default(),
    };
    if let Some(addr) = addr {
        config.signaling.server_addr = addr;
    }
    if let Some(capacity) = capacity {
        config.room.capacity = capacity;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    roomcall::init_logging();

    let args: Vec<String> = env::args().collect();
    let config = parse_args(&args)?;

    let hub = SignalingHub::new(config.room.capacity);
    let server = SignalingServer::bind(&config.signaling.server_addr, hub)
        .await
        .with_context(|| format!("starting signaling server on {}", config.signaling.server_addr))?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => log::info!("Shutting down signaling server"),
    }
    Ok(())
}
