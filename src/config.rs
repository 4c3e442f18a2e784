//! Server Configuration
//!
//! Every option can be given as a flag or through a `QUILLKV_*`
//! environment variable; flags win.
//!
//! ```text
//! quillkv --port 6380 --databases 4
//! QUILLKV_REPLAY_LOG=/var/lib/quill.log quillkv
//! ```

use clap::builder::TypedValueParser;
use clap::Parser;
use std::path::PathBuf;

/// Default number of logical databases.
pub const DEFAULT_DATABASES: usize = 8;

/// Server options.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "quillkv", version, about = "An in-memory key-value server speaking RESP")]
pub struct Config {
    /// Host to bind to
    #[arg(long, env = "QUILLKV_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "QUILLKV_PORT", default_value_t = crate::DEFAULT_PORT)]
    pub port: u16,

    /// Number of logical databases
    #[arg(
        long,
        env = "QUILLKV_DATABASES",
        default_value_t = DEFAULT_DATABASES,
        value_parser = clap::value_parser!(u16).range(1..=1024).map(usize::from)
    )]
    pub databases: usize,

    /// Replay log path
    #[arg(long, env = "QUILLKV_REPLAY_LOG", default_value = "quillkv.log")]
    pub replay_log: PathBuf,

    /// Run without a replay log
    #[arg(long, env = "QUILLKV_NO_REPLAY_LOG")]
    pub no_replay_log: bool,

    /// Log filter used when RUST_LOG is unset (e.g. `info`, `quillkv=debug`)
    #[arg(long, env = "QUILLKV_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The replay log path, unless disabled.
    pub fn replay_log_path(&self) -> Option<&PathBuf> {
        (!self.no_replay_log).then_some(&self.replay_log)
    }
}
