//! Client identity resolution for rate limiting.
//!
//! The forwarded-for header is only honored when the socket peer sits inside
//! a configured trusted-proxy range. Anything else is ignored outright, so a
//! direct client can never claim an address other than its own.

use std::net::IpAddr;

use axum::http::HeaderMap;
use ipnet::IpNet;
use tracing::{debug, info, warn};

use crate::ratelimit::constants::{BROAD_IPV4_PREFIX, BROAD_IPV6_PREFIX};
use crate::ratelimit::{ClientIdentity, ConfigError, Environment, TrustLevel};

/// Header carrying the client-then-proxies address chain.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Load balancer / reverse proxy ranges allowed to set forwarded-for headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedProxyConfig {
    nets: Vec<IpNet>,
}

impl TrustedProxyConfig {
    pub const fn new(nets: Vec<IpNet>) -> Self {
        Self { nets }
    }

    /// Parses a comma-separated list of CIDR blocks or bare addresses.
    ///
    /// Bare addresses become host routes (`/32`, `/128`). Empty entries are
    /// skipped; anything unparseable is a configuration error.
    pub fn parse(list: &str) -> Result<Self, ConfigError> {
        let mut nets = Vec::new();
        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let net = if entry.contains('/') {
                entry
                    .parse::<IpNet>()
                    .map_err(|_| ConfigError::InvalidTrustedProxy(entry.to_string()))?
            } else {
                entry
                    .parse::<IpAddr>()
                    .map(IpNet::from)
                    .map_err(|_| ConfigError::InvalidTrustedProxy(entry.to_string()))?
            };
            nets.push(net.trunc());
        }
        Ok(Self { nets })
    }

    /// Default list for an environment: the local reverse proxy in
    /// development, nothing elsewhere.
    pub fn default_for(environment: Environment) -> Self {
        if environment.is_hardened() {
            Self::default()
        } else {
            Self::new(vec![
                IpNet::from(IpAddr::from([127, 0, 0, 1])),
                IpNet::from(IpAddr::from([0u16, 0, 0, 0, 0, 0, 0, 1])),
            ])
        }
    }

    pub fn nets(&self) -> &[IpNet] {
        &self.nets
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    /// Returns true if the address falls inside any trusted range.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        let ip = ip.to_canonical();
        self.nets.iter().any(|net| net.contains(&ip))
    }

    /// Checks the list for ranges that are wider than a load balancer needs.
    ///
    /// Catch-all ranges (`/0`) are refused in staging and production. Other
    /// broad ranges are logged: as warnings when hardened, at info otherwise.
    pub fn audit(&self, environment: Environment) -> Result<(), ConfigError> {
        if environment.is_hardened() && self.nets.is_empty() {
            warn!(
                environment = %environment,
                "No trusted proxies configured; forwarded-for headers will be ignored"
            );
        }

        for net in &self.nets {
            let broad = match net {
                IpNet::V4(v4) => v4.prefix_len() < BROAD_IPV4_PREFIX,
                IpNet::V6(v6) => v6.prefix_len() < BROAD_IPV6_PREFIX,
            };
            if !broad {
                continue;
            }
            if environment.is_hardened() {
                if net.prefix_len() == 0 {
                    return Err(ConfigError::PermissiveTrustedProxy {
                        cidr: net.to_string(),
                        environment,
                    });
                }
                warn!(
                    cidr = %net,
                    environment = %environment,
                    "Broad trusted proxy range; restrict it to the load balancer addresses"
                );
            } else {
                info!(
                    cidr = %net,
                    environment = %environment,
                    "Broad trusted proxy range accepted outside hardened environments"
                );
            }
        }
        Ok(())
    }
}

/// Resolves the address to count a request against.
///
/// Never fails: malformed forwarded-for values from a trusted proxy fall back
/// to the proxy's own address.
pub fn resolve_client_identity(
    socket_peer: IpAddr,
    headers: &HeaderMap,
    trusted: &TrustedProxyConfig,
) -> ClientIdentity {
    let peer = socket_peer.to_canonical();

    if !trusted.contains(&peer) {
        return ClientIdentity {
            ip: peer,
            trust_level: TrustLevel::Direct,
        };
    }

    let ip = match headers.get(X_FORWARDED_FOR) {
        None => peer,
        Some(value) => match value.to_str().ok().and_then(leftmost_forwarded_ip) {
            Some(origin) => origin,
            None => {
                debug!(peer = %peer, "Malformed X-Forwarded-For from trusted proxy, using peer address");
                peer
            }
        },
    };

    ClientIdentity {
        ip,
        trust_level: TrustLevel::TrustedProxy,
    }
}

/// Left-most entry of a forwarded-for list, if it is an IP address.
fn leftmost_forwarded_ip(value: &str) -> Option<IpAddr> {
    let first = value.split(',').next()?.trim();
    first.parse::<IpAddr>().ok().map(|ip| ip.to_canonical())
}
