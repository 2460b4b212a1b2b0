use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_GROUP_COUNT: usize = 4;

/// Process configuration. Every flag can also come from its environment
/// variable; a flag on the command line wins.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(author, version, about = "Classroom roster and group-formation sidecar", long_about = None)]
pub struct Config {
    /// Workspace directory opened before the first request
    #[arg(long, env = "GROUPD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Log filter in `tracing_subscriber::EnvFilter` syntax
    #[arg(long = "log", env = "GROUPD_LOG", default_value = "info")]
    pub log_filter: String,

    /// Group count used when a request does not name one
    #[arg(
        long = "default-groups",
        env = "GROUPD_DEFAULT_GROUPS",
        default_value_t = DEFAULT_GROUP_COUNT as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub default_group_count: u64,
}

impl Config {
    pub fn group_count(&self) -> usize {
        usize::try_from(self.default_group_count).unwrap_or(usize::MAX)
    }
}
