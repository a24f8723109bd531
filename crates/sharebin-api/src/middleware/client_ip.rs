//! Client address resolution for per-client limits.

use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

/// Best guess at the originating client.
///
/// With `trusted_proxies` proxies in front, the entry that many places from the
/// end of `X-Forwarded-For` is the client. Falls back to `X-Real-IP`, then to
/// the peer address of the connection.
pub fn client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trusted_proxies: usize,
) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| from_forwarded_for(v, trusted_proxies));

    forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
        })
        .or_else(|| peer.map(|addr| addr.ip()))
}

fn from_forwarded_for(value: &str, trusted_proxies: usize) -> Option<IpAddr> {
    let hops: Vec<&str> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    // A chain no longer than the trusted hops was not extended by a client;
    // the nearest entry is the only one we can vouch for.
    let index = if trusted_proxies == 0 || hops.len() <= trusted_proxies {
        hops.len().checked_sub(1)?
    } else {
        hops.len() - trusted_proxies - 1
    };
    hops.get(index)?.parse().ok()
}
