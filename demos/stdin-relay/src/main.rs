//! Relay JSON log lines from stdin to an XMPP recipient.
//!
//! Stands in for a host application driving the output plugin: each stdin
//! line is one message. Lines that parse as JSON objects become field maps;
//! anything else is forwarded as a bare `message` field.

mod cli;

use clap::Parser;
use log::{error, info};
use std::io::BufRead;
use xmpp_output::prelude::*;

fn read_message(line: &str) -> LogMessage {
    match serde_json::from_str(line) {
        Ok(value) => {
            let message = LogMessage::from_json(&value);
            if message.is_empty() {
                LogMessage::new().with_field("message", line)
            } else {
                message
            }
        }
        Err(_) => LogMessage::new().with_field("message", line),
    }
}

fn main() {
    env_logger::init();
    let args = cli::Args::parse();

    let config = OutputConfig {
        hostname: args.hostname.clone(),
        service_name: args.service_name.clone(),
        port: args.port,
        accept_selfsigned: args.accept_selfsigned,
        username: args.username.clone(),
        password: args.password.clone(),
        require_security: args.require_security,
        recipient: args.recipient.clone(),
        format: args.format.clone(),
        resource: args.resource.clone(),
    };

    if args.verbose {
        info!("Connecting to {}", config.server_string());
        info!("Relaying to {}", args.recipient);
    }

    let output = XmppOutput::new(config, &args.node_id()).unwrap_or_else(|e| {
        eprintln!("Failed to start XMPP output: {e}");
        std::process::exit(1);
    });

    let stdin = std::io::stdin();
    let mut relayed: u64 = 0;
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                eprintln!("Failed to read stdin: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match output.write(&read_message(&line)) {
            Ok(()) => relayed += 1,
            Err(e) => error!("Dropped message: {e}"),
        }
    }

    output.stop();
    if args.verbose {
        info!("Relayed {relayed} messages");
    }
}
