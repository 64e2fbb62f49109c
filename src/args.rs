use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Parser, ValueHint};
use clap_complete::Shell;

use crate::auth::RequiredAuthPassword;
use crate::errors::StartupError;

#[derive(Parser)]
#[command(name = "davserve", author, about, version)]
pub struct CliArgs {
    /// Be verbose, log debug messages
    #[arg(short = 'v', long = "verbose", env = "DAVSERVE_VERBOSE")]
    pub verbose: bool,

    /// Disable logging except for errors
    #[arg(
        short = 'q',
        long = "quiet",
        env = "DAVSERVE_QUIET",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// Which directory to serve. Created if it doesn't exist yet
    #[arg(value_hint = ValueHint::DirPath, env = "DAVSERVE_PATH")]
    pub path: Option<PathBuf>,

    /// Port to use. 0 picks a free one
    #[arg(short = 'p', long = "port", default_value = "8080", env = "DAVSERVE_PORT")]
    pub port: u16,

    /// Interface to listen on
    #[arg(
        short = 'i',
        long = "interfaces",
        value_parser(parse_interface),
        num_args(1),
        env = "DAVSERVE_INTERFACE",
        value_delimiter(',')
    )]
    pub interfaces: Vec<IpAddr>,

    /// Username clients must authenticate with
    #[arg(short = 'u', long = "username", env = "DAVSERVE_USERNAME")]
    pub username: Option<String>,

    /// Password clients must authenticate with
    #[arg(long = "password", env = "DAVSERVE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Hashed password clients must authenticate with. Currently supported formats:
    /// sha256:hash, sha512:hash
    /// (e.g. sha256:a665a45920422f9d417e4867efdc4fb8a04a1f3fff1fa07e998e86f7f7a27ae3)
    #[arg(
        long = "password-hash",
        value_parser(parse_password_hash),
        conflicts_with = "password",
        env = "DAVSERVE_PASSWORD_HASH",
        hide_env_values = true
    )]
    pub password_hash: Option<RequiredAuthPassword>,

    /// Let clients in without credentials
    #[arg(long = "allow-anonymous", env = "DAVSERVE_ALLOW_ANONYMOUS")]
    pub allow_anonymous: bool,

    /// Add CORS headers to successful responses
    #[arg(long = "enable-cors", env = "DAVSERVE_ENABLE_CORS")]
    pub enable_cors: bool,

    /// Seconds a client stays blocked after too many failed logins
    #[arg(
        long = "block-duration",
        default_value = "300",
        env = "DAVSERVE_BLOCK_DURATION"
    )]
    pub block_duration: u64,

    /// Failed logins after which a client gets blocked
    #[arg(
        long = "max-failed-attempts",
        default_value = "5",
        value_parser = clap::value_parser!(u32).range(1..),
        env = "DAVSERVE_MAX_FAILED_ATTEMPTS"
    )]
    pub max_failed_attempts: u32,

    /// Only let clients from the whitelist in
    #[arg(long = "enable-ip-whitelist", env = "DAVSERVE_ENABLE_IP_WHITELIST")]
    pub enable_ip_whitelist: bool,

    /// Comma separated IPs and CIDR ranges (e.g. 127.0.0.1,192.168.1.0/24)
    #[arg(long = "whitelist", value_delimiter = ',', env = "DAVSERVE_WHITELIST")]
    pub whitelist: Vec<String>,

    /// Generate completion file for a shell
    #[arg(long = "print-completions", value_name = "shell")]
    pub print_completions: Option<Shell>,

    /// Generate man page
    #[arg(long = "print-manpage")]
    pub print_manpage: bool,
}

/// Checks whether an interface is valid, i.e. it can be parsed into an IP address
fn parse_interface(src: &str) -> Result<IpAddr, std::net::AddrParseError> {
    src.parse::<IpAddr>()
}

/// Parse a `method:hex` password hash
pub fn parse_password_hash(src: &str) -> Result<RequiredAuthPassword, StartupError> {
    let (method, hash_hex) = src.split_once(':').ok_or(StartupError::InvalidHashFormat)?;
    let hash_bin = hex::decode(hash_hex).map_err(|_| StartupError::InvalidPasswordHash)?;

    match method {
        "sha256" => Ok(RequiredAuthPassword::Sha256(hash_bin)),
        "sha512" => Ok(RequiredAuthPassword::Sha512(hash_bin)),
        _ => Err(StartupError::InvalidHashMethod(method.to_owned())),
    }
}
