//! MIDI sniffer for debugging and binding setup
//!
//! `--list-ports` prints what the transport can see, `--sniff` dumps raw
//! traffic from one input port, and `--monitor` prints every message the
//! running gateway dispatches.

use anyhow::{Context, Result};
use colored::*;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc};
use tracing::info;

use crate::midi::{format_hex, Message, MessageKind};
use crate::transport::Transport;

/// Print every input and output port the transport can open
pub fn list_ports(transport: &dyn Transport) -> Result<()> {
    let inputs = transport
        .input_ports()
        .context("Failed to enumerate MIDI inputs")?;
    let outputs = transport
        .output_ports()
        .context("Failed to enumerate MIDI outputs")?;

    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());
    print_port_list("Input Ports:", &inputs);
    print_port_list("Output Ports:", &outputs);
    println!();
    Ok(())
}

fn print_port_list(title: &str, ports: &[String]) {
    println!("\n{}", title.bold());
    if ports.is_empty() {
        println!("  {}", "No ports found".dimmed());
    }
    for (index, name) in ports.iter().enumerate() {
        println!("  {} {}", format!("[{}]", index).dimmed(), name);
    }
}

/// Dump traffic from the input port matching `pattern` until Ctrl+C
pub async fn run_cli_sniffer(transport: &dyn Transport, pattern: &str) -> Result<()> {
    let (tx, mut rx) = mpsc::channel(1000);
    let connection = transport
        .open_input(pattern, tx)
        .with_context(|| format!("Failed to open MIDI input '{}'", pattern))?;

    println!("{}", "=== MIDI Sniffer ===".bold().cyan());
    println!("Listening on {} (Ctrl+C to exit)", connection.port().bright_white());
    print_header();

    let start = Instant::now();
    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Some(message) => println!("{}", format_line(start, &message)),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    drop(connection);
    println!("\n{}", "Sniffer stopped".yellow());
    Ok(())
}

/// Print messages republished by the running agents
pub async fn print_monitor(mut monitor: broadcast::Receiver<Message>) {
    info!("Monitoring inbound MIDI traffic");
    print_header();

    let start = Instant::now();
    loop {
        match monitor.recv().await {
            Ok(message) => println!("{}", format_line(start, &message)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                println!("{}", format!("... {} messages skipped", skipped).dimmed());
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

fn print_header() {
    println!("{}", "Format: [timestamp] PORT | HEX => PARSED".dimmed());
    println!("{}\n", "─".repeat(80).dimmed());
}

fn format_line(start: Instant, message: &Message) -> String {
    let timestamp = format!("{:08}", start.elapsed().as_millis());
    let port = if message.port.chars().count() > 20 {
        let head: String = message.port.chars().take(17).collect();
        format!("{}...", head)
    } else {
        message.port.clone()
    };

    let hex = format_hex(&message.encode());
    let hex = match message.kind {
        MessageKind::NoteOn => hex.bright_green(),
        MessageKind::NoteOff => hex.bright_red(),
        MessageKind::ControlChange => hex.bright_yellow(),
    };

    format!(
        "[{}ms] {:20} | {} => {}",
        timestamp.dimmed(),
        port.white(),
        hex,
        message.to_string().bright_blue()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    #[test]
    fn test_format_line_shows_hex_and_parsed() {
        colored::control::set_override(false);
        let message = Message::new(MessageKind::ControlChange, 7, 0, 64).with_port("nanoKONTROL2");

        let line = format_line(Instant::now(), &message);

        assert!(line.contains("B0 07 40"));
        assert!(line.contains("CC ch:1 cc:7 v:64"));
        assert!(line.contains("nanoKONTROL2"));
    }

    #[test]
    fn test_long_port_names_are_truncated() {
        colored::control::set_override(false);
        let message = Message::new(MessageKind::NoteOn, 1, 0, 127)
            .with_port("A very long MIDI port name indeed");

        let line = format_line(Instant::now(), &message);

        assert!(line.contains("A very long MIDI ..."));
    }

    #[test]
    fn test_list_ports_with_mock_transport() {
        let transport = MockTransport::new();
        assert!(list_ports(transport.as_ref()).is_ok());
    }
}
