use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use log::{LevelFilter, info};

use crate::{
    args::CliArgs,
    auth::{RequiredAuth, RequiredAuthPassword},
    errors::StartupError,
    guard::IpWhitelist,
};

#[derive(Debug, Clone)]
/// Configuration of the WebDAV server
pub struct DavConfig {
    /// Log debug messages
    pub verbose: bool,

    /// Log at info level. Errors are always logged
    pub logging_enabled: bool,

    /// Canonical path of the served root
    pub path: PathBuf,

    /// Port on which the server will be listening
    pub port: u16,

    /// IP address(es) on which the server will be available
    pub interfaces: Vec<IpAddr>,

    /// The one identity clients must present, `None` in anonymous mode
    pub required_auth: Option<RequiredAuth>,

    /// Skip authentication entirely
    pub allow_anonymous: bool,

    /// Add CORS headers to successful responses
    pub enable_cors: bool,

    /// How long a client stays blocked
    pub block_duration: Duration,

    /// Failed authentications after which a client gets blocked
    pub max_failed_attempts: u32,

    pub whitelist: IpWhitelist,
}

impl DavConfig {
    /// Parses the command line arguments
    pub fn try_from_args(args: CliArgs) -> Result<Self> {
        let interfaces = if !args.interfaces.is_empty() {
            args.interfaces
        } else {
            vec![
                IpAddr::V6(Ipv6Addr::new(0, 0, 0, 0, 0, 0, 0, 0)),
                IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            ]
        };

        let password = match (args.password, args.password_hash) {
            (Some(plain), _) => Some(RequiredAuthPassword::Plain(plain)),
            (None, hash) => hash,
        };
        let required_auth = match (args.username, password) {
            (Some(username), Some(password)) => Some(RequiredAuth { username, password }),
            (None, None) => None,
            _ => bail!("--username and a password must be given together"),
        };
        if required_auth.is_none() && !args.allow_anonymous {
            bail!("No credentials configured. Set --username and --password, or --allow-anonymous");
        }

        let port = match args.port {
            0 => port_check::free_local_port().context("No free ports available")?,
            _ => args.port,
        };

        let path = args.path.unwrap_or_else(|| PathBuf::from("."));
        let path = prepare_root(&path)
            .with_context(|| format!("Couldn't prepare root directory {}", path.display()))?;

        Ok(Self {
            verbose: args.verbose,
            logging_enabled: !args.quiet,
            path,
            port,
            interfaces,
            required_auth,
            allow_anonymous: args.allow_anonymous,
            enable_cors: args.enable_cors,
            block_duration: Duration::from_secs(args.block_duration),
            max_failed_attempts: args.max_failed_attempts,
            whitelist: IpWhitelist {
                enabled: args.enable_ip_whitelist,
                entries: args
                    .whitelist
                    .into_iter()
                    .map(|entry| entry.trim().to_owned())
                    .filter(|entry| !entry.is_empty())
                    .collect(),
            },
        })
    }

    pub fn log_level(&self) -> LevelFilter {
        match (self.logging_enabled, self.verbose) {
            (false, _) => LevelFilter::Error,
            (true, false) => LevelFilter::Info,
            (true, true) => LevelFilter::Debug,
        }
    }
}

/// Make sure the root exists as a directory and return its canonical form.
pub fn prepare_root(path: &Path) -> Result<PathBuf, StartupError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| {
            StartupError::IoError(format!("Failed to create {}", path.display()), e)
        })?;
    }
    if !path.is_dir() {
        return Err(StartupError::RootIsNotADirectory(path.display().to_string()));
    }
    path.canonicalize()
        .map_err(|e| StartupError::IoError(format!("Failed to resolve {}", path.display()), e))
}

/// Holder of the live configuration.
///
/// Requests take a [`snapshot`](Self::snapshot) once and keep using it even if the
/// configuration is replaced meanwhile.
#[derive(Debug)]
pub struct ConfigStore {
    current: RwLock<Arc<DavConfig>>,
}

impl ConfigStore {
    pub fn new(config: DavConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    pub fn snapshot(&self) -> Arc<DavConfig> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in a new configuration and apply its log level.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn replace(&self, config: DavConfig) {
        log::set_max_level(config.log_level());
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
        info!(target: "server", "Configuration reloaded");
    }
}
