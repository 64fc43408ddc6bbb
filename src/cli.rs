//! Command line interface for the `pushframe` binary.
//!
//! Shared with `build.rs`, which renders the man page, so this module may
//! only depend on `clap` and the standard library.

use std::{net::SocketAddr, path::PathBuf};

use clap::{Parser, Subcommand};

/// Command line arguments for the `pushframe` binary.
#[derive(Debug, Parser)]
#[command(name = "pushframe", version, about = "Receive web push notifications")]
pub struct Cli {
    /// Action to perform.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect and print each notification as a JSON line.
    Listen(ListenArgs),
}

/// Arguments for `pushframe listen`.
#[derive(Debug, clap::Args)]
pub struct ListenArgs {
    /// Credentials document produced by registration.
    #[arg(short, long, value_name = "FILE")]
    pub credentials: PathBuf,

    /// JSON array of delivered persistent ids, read at start and rewritten
    /// after every notification.
    #[arg(short, long, value_name = "FILE")]
    pub persistent_ids: Option<PathBuf>,

    /// Connection server host.
    #[arg(long, default_value = "mtalk.google.com")]
    pub host: String,

    /// Connection server port.
    #[arg(long, default_value_t = 5228)]
    pub port: u16,

    /// Upper bound on the reconnect delay, in seconds.
    #[arg(long, value_name = "SECS", default_value_t = 15)]
    pub max_backoff: u64,

    /// Serve Prometheus metrics on this address.
    #[arg(long, value_name = "ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}
