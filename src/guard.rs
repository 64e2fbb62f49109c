//! IP based abuse mitigation: whitelisting, failed attempt tracking and
//! time-boxed blocking.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use log::{info, warn};
use thiserror::Error;

/// Failed authentications seen from one client.
#[derive(Debug, Clone, Copy)]
pub struct AttemptTracker {
    pub count: u32,
    pub last_attempt: Instant,
}

/// A client that exceeded the allowed number of failed authentications.
#[derive(Debug, Clone, Copy)]
pub struct BlockedIp {
    pub blocked_at: Instant,
}

/// Whitelist entries the guard checks clients against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpWhitelist {
    pub enabled: bool,

    /// Exact addresses or `address/prefix` ranges, as configured
    pub entries: Vec<String>,
}

/// Whitelist evaluation could not reach a verdict.
///
/// The guard treats this as "allow" (fail open). This trades security for availability:
/// a client whose address cannot be interpreted is let through to authentication
/// rather than locked out.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WhitelistEvaluationError {
    #[error("client address '{0}' is not an IP address")]
    UnparsableClientAddress(String),
}

/// Outcome of recording a failed authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// The client may try again; carries the current failure count
    Counted(u32),
    /// The client just reached the limit and is now blocked
    Blocked,
}

/// Shared per-server state of the access guard.
///
/// Both maps are keyed by the client IP as resolved by the dispatcher. All mutations go
/// through `DashMap` entry or `remove_if` calls so concurrent requests from the same
/// client never lose counts.
#[derive(Debug, Default)]
pub struct AccessGuard {
    attempts: DashMap<String, AttemptTracker>,
    blocked: DashMap<String, BlockedIp>,
}

impl AccessGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `ip` is currently blocked. Expired blocks are evicted on the way.
    pub fn is_blocked(&self, ip: &str, block_duration: Duration) -> bool {
        self.is_blocked_at(ip, block_duration, Instant::now())
    }

    pub fn is_blocked_at(&self, ip: &str, block_duration: Duration, now: Instant) -> bool {
        let expired = |_: &String, entry: &BlockedIp| {
            now.saturating_duration_since(entry.blocked_at) > block_duration
        };

        if self.blocked.remove_if(ip, expired).is_some() {
            self.attempts.remove(ip);
            info!(target: "security", "Block on {ip} expired, failure count reset");
            return false;
        }

        self.blocked.contains_key(ip)
    }

    /// Whether `ip` passes the whitelist. Always true when whitelisting is disabled.
    pub fn is_allowed(&self, ip: &str, whitelist: &IpWhitelist) -> bool {
        if !whitelist.enabled {
            return true;
        }

        match evaluate_whitelist(ip, &whitelist.entries) {
            Ok(true) => true,
            Ok(false) => {
                warn!(target: "security", "Rejected {ip}: not in IP whitelist");
                false
            }
            Err(e) => {
                warn!(target: "security", "Whitelist check failed open: {e}");
                true
            }
        }
    }

    /// Count a failed authentication from `ip`, blocking it once `max_attempts` is reached.
    pub fn record_failure(&self, ip: &str, max_attempts: u32) -> FailureOutcome {
        self.record_failure_at(ip, max_attempts, Instant::now())
    }

    pub fn record_failure_at(&self, ip: &str, max_attempts: u32, now: Instant) -> FailureOutcome {
        let count = {
            let mut tracker = self
                .attempts
                .entry(ip.to_string())
                .or_insert(AttemptTracker {
                    count: 0,
                    last_attempt: now,
                });
            tracker.count += 1;
            tracker.last_attempt = now;
            tracker.count
        };

        if count >= max_attempts {
            self.blocked
                .insert(ip.to_string(), BlockedIp { blocked_at: now });
            warn!(
                target: "security",
                "Blocked {ip} after {count} failed authentication attempts"
            );
            FailureOutcome::Blocked
        } else {
            warn!(
                target: "security",
                "Failed authentication from {ip} ({count}/{max_attempts})"
            );
            FailureOutcome::Counted(count)
        }
    }

    /// Forget previous failures of `ip` after it authenticated successfully.
    pub fn record_success(&self, ip: &str) {
        if self.attempts.remove(ip).is_some() {
            info!(target: "security", "Cleared failed attempts of {ip}");
        }
    }

    /// Number of failures currently counted against `ip`.
    #[cfg(test)]
    pub fn failure_count(&self, ip: &str) -> u32 {
        self.attempts.get(ip).map(|t| t.count).unwrap_or(0)
    }
}

/// Check `ip` against whitelist entries, matching verbatim or by CIDR range.
///
/// Malformed entries simply don't match. An unparsable client address is an error.
pub fn evaluate_whitelist(
    ip: &str,
    entries: &[String],
) -> Result<bool, WhitelistEvaluationError> {
    if entries.iter().any(|entry| entry.trim() == ip) {
        return Ok(true);
    }

    ip.parse::<IpAddr>()
        .map_err(|_| WhitelistEvaluationError::UnparsableClientAddress(ip.to_string()))?;

    Ok(entries
        .iter()
        .map(|entry| entry.trim())
        .filter(|entry| entry.contains('/'))
        .any(|cidr| is_ip_in_cidr(ip, cidr)))
}

/// Whether `ip` lies inside the `address/prefix` range `cidr`.
///
/// Returns false for anything malformed, and when the address families differ.
pub fn is_ip_in_cidr(ip: &str, cidr: &str) -> bool {
    let Some((network, prefix)) = cidr.split_once('/') else {
        return false;
    };
    let (Ok(ip), Ok(network), Ok(prefix)) = (
        ip.parse::<IpAddr>(),
        network.parse::<IpAddr>(),
        prefix.parse::<u32>(),
    ) else {
        return false;
    };

    match (ip, network) {
        (IpAddr::V4(ip), IpAddr::V4(network)) if prefix <= 32 => {
            let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
            u32::from(ip) & mask == u32::from(network) & mask
        }
        (IpAddr::V6(ip), IpAddr::V6(network)) if prefix <= 128 => {
            let mask = u128::MAX.checked_shl(128 - prefix).unwrap_or(0);
            u128::from(ip) & mask == u128::from(network) & mask
        }
        _ => false,
    }
}
