use std::{net::IpAddr, path::PathBuf, time::Duration};

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Print VPC information (platform, subnets, zone) published in DNS TXT records"
)]
pub struct Args {
    /// Path to configuration file (TOML)
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Domain appended to every TXT lookup
    #[arg(long = "domain", value_name = "DOMAIN")]
    pub domain: Option<String>,

    /// Lifetime of cached entries (e.g. "1m", "30s")
    #[arg(long = "ttl", value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub ttl: Option<Duration>,

    /// Time limit of each network lookup (e.g. "2s")
    #[arg(long = "timeout", value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Only print the subnet containing this address (subnets only)
    #[arg(long = "addr", value_name = "IP")]
    pub addr: Option<IpAddr>,

    /// Resource to print
    #[arg(value_enum)]
    pub resource: Resource,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    Platform,
    Subnets,
    Zone,
}
