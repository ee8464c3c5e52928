//! # DoorSync CLI
//!
//! Command-line utilities for inspecting and debugging the gateway
//! wire protocol.

use anyhow::{Context, Result};
use doorsync_core::{GatewayId, LockId, LockStatus};
use doorsync_proto::{Channel, CommandMessage, TopicScheme};
use std::env;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    let scheme = TopicScheme::default();

    match args[1].as_str() {
        "topic" => {
            if args.len() < 3 {
                eprintln!("Usage: doorsync topic <gateway-id>");
                std::process::exit(1);
            }
            let gateway: GatewayId = args[2].parse().context("Invalid gateway id")?;
            println!("command:   {}", scheme.command(&gateway));
            println!("telemetry: {}", scheme.telemetry(&gateway));
        }
        "parse" => {
            if args.len() < 3 {
                eprintln!("Usage: doorsync parse <topic>");
                std::process::exit(1);
            }
            let (gateway, channel) = scheme
                .parse(&args[2])
                .context("Topic is outside the gateway scheme")?;
            let channel = match channel {
                Channel::Command => "command",
                Channel::Telemetry => "telemetry",
            };
            println!("gateway: {gateway}");
            println!("channel: {channel}");
        }
        "sample-command" => {
            if args.len() < 3 {
                eprintln!("Usage: doorsync sample-command <lock-id>");
                std::process::exit(1);
            }
            let lock_id: i64 = args[2].parse().context("Invalid lock id")?;
            let command =
                CommandMessage::sync_lock(LockId(lock_id), LockStatus::Locked, Vec::new());
            println!("{}", serde_json::to_string_pretty(&command)?);
        }
        "help" | "--help" | "-h" => {
            print_help();
        }
        cmd => {
            eprintln!("Unknown command: {cmd}");
            print_help();
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_help() {
    println!(
        r"DoorSync CLI

USAGE:
    doorsync <COMMAND> [OPTIONS]

COMMANDS:
    topic <gateway-id>        Print the command and telemetry topics of a gateway
    parse <topic>             Parse a topic into gateway and channel
    sample-command <lock-id>  Print a sample sync command payload
    help                      Show this help message

EXAMPLES:
    doorsync topic gw-entrance-01
    doorsync parse gateway/gw-entrance-01/telemetry
    doorsync sample-command 7
"
    );
}
