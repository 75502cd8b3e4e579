//! Target policies for outbound fetches.
//!
//! The fetch operation never filters targets itself. Deployments that must
//! not reach internal addresses plug in a policy here.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use url::{Host, Url};

/// Decides whether a target URL may be fetched.
pub trait TargetPolicy: Send + Sync + fmt::Debug {
    /// `Err(reason)` refuses the target before any connection is made.
    fn check(&self, url: &Url) -> Result<(), String>;
}

/// Permits every target.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl TargetPolicy for AllowAll {
    fn check(&self, _url: &Url) -> Result<(), String> {
        Ok(())
    }
}

/// Refuses loopback, private, link-local and unspecified literal addresses,
/// plus `localhost`.
///
/// Hostnames are not resolved here, so a public name pointing at a private
/// address is not caught.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyPrivateNetworks;

impl TargetPolicy for DenyPrivateNetworks {
    fn check(&self, url: &Url) -> Result<(), String> {
        let denied = match url.host() {
            None => return Err("target has no host".to_string()),
            Some(Host::Domain(domain)) => {
                let domain = domain.trim_end_matches('.').to_ascii_lowercase();
                domain == "localhost" || domain.ends_with(".localhost")
            }
            Some(Host::Ipv4(ip)) => is_internal_v4(ip),
            Some(Host::Ipv6(ip)) => is_internal_v6(ip),
        };

        if denied {
            Err(format!("target host '{}' is on an internal network", url.host_str().unwrap_or_default()))
        } else {
            Ok(())
        }
    }
}

fn is_internal_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
}

fn is_internal_v6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_internal_v4(v4);
    }
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || (first & 0xfe00) == 0xfc00 // unique local
        || (first & 0xffc0) == 0xfe80 // link local
}
