// src/main.rs
// Simple router node: HELLO exchange and next-hop computation over UDP multicast

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use spf_router::packet::{self, CONTROL_PORT, Frame, MULTICAST_V4_ADDR};
use spf_router::{Event, RouterConfig, RouterNode};

#[derive(Debug, Parser)]
#[command(about = "Link-state router control plane over UDP multicast")]
struct Args {
    /// Router id (random if omitted).
    #[arg(long)]
    id: Option<String>,

    #[arg(long, default_value = "area")]
    area: String,

    /// Seconds between hello broadcasts.
    #[arg(long, default_value_t = 1.0)]
    hello_interval: f64,

    /// Seconds of silence before a neighbor is dropped.
    #[arg(long, default_value_t = 3.0)]
    hold_time: f64,

    /// Local IPv4 interface to join the multicast group on.
    #[arg(long, default_value_t = Ipv4Addr::UNSPECIFIED)]
    iface: Ipv4Addr,
}

/// Convert a CLI seconds value, rejecting negative, NaN and overflowing input.
fn secs(value: f64) -> io::Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

fn main() -> io::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();
    let hold_time = secs(args.hold_time)?;
    let config = match args.id {
        Some(id) => RouterConfig::new(id, args.area, hold_time),
        None => RouterConfig::with_random_id(args.area, hold_time),
    }
    .hello_interval(secs(args.hello_interval)?);

    let mut node = RouterNode::new(config)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let socket = packet::bind_multicast_v4(args.iface)?;
    socket.set_nonblocking(true)?;
    let dest: SocketAddr = (MULTICAST_V4_ADDR, CONTROL_PORT).into();
    info!(id = %node.id(), %dest, "router running");

    let start = Instant::now();
    let mut buf = [0u8; 1500];
    loop {
        loop {
            match Frame::recv(&socket, &mut buf) {
                Ok((frame, src)) => {
                    debug!(%src, opcode = %frame.opcode, "received frame");
                    node.handle_control_message(&frame.opcode, &frame.body, start.elapsed());
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => warn!("receive error: {e}"),
            }
        }

        for event in node.tick_with_events(start.elapsed()) {
            match event {
                // No per-router delivery here: every message goes to the group.
                Event::Send { message, .. } => {
                    if let Err(e) = Frame::from_message(&message).send_to(&socket, dest) {
                        error!("send error: {e}");
                    }
                }
                // Flooding is handled by another layer; this demo only reports it.
                Event::LinkStateChanged(ls) => info!("local {}", ls.summary()),
                Event::MobileSeqChanged(seq) => debug!(seq, "mobile sequence advanced"),
                Event::Binding(change) => info!(?change, "binding"),
                Event::KeyBinding(change) => info!(?change, "mobile key binding"),
            }
        }

        thread::sleep(Duration::from_millis(100));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secs_accepts_fractions() {
        assert_eq!(secs(1.5).unwrap(), Duration::from_millis(1500));
        assert_eq!(secs(0.0).unwrap(), Duration::ZERO);
    }

    #[test]
    fn secs_rejects_bad_values() {
        for bad in [-1.0, f64::NAN, f64::INFINITY, 1e30] {
            let err = secs(bad).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        }
    }
}
