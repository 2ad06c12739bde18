use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;


pub const DEFAULT_UPSTREAM_HOST: &str = "172.17.0.1";
pub const DEFAULT_UPSTREAM_ADDR: &str = "172.17.0.1:9090";
pub const DEFAULT_LISTEN_PORT: u16 = 9511;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// host:port of the upstream source, resolved on every connection attempt
    pub upstream_addr: String,
    pub listen_addr: SocketAddr,

    /// only every n-th chunk received from upstream is relayed downstream; must be at least 1
    pub decimation_divisor: u32,

    pub reconnect_delay: Duration,
    /// an upstream connection attempt that takes longer than this is treated as failed
    pub connect_timeout: Duration,
    pub read_buffer_size: usize,
}

impl RelayConfig {
    pub fn new(upstream_addr: impl Into<String>) -> RelayConfig {
        RelayConfig {
            upstream_addr: upstream_addr.into(),
            listen_addr: SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_LISTEN_PORT).into(),
            decimation_divisor: 3,
            reconnect_delay: Duration::from_millis(5000),
            connect_timeout: Duration::from_secs(5),
            read_buffer_size: 64*1024,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig::new(DEFAULT_UPSTREAM_ADDR)
    }
}

/// Appends `default_port` to `upstream` unless it has a port already. `upstream` is a host name,
///  an IP address (IPv6 with or without brackets), or any of these with a port.
pub fn with_default_port(upstream: &str, default_port: u16) -> String {
    if upstream.parse::<SocketAddr>().is_ok() {
        return upstream.to_string();
    }
    if let Ok(ip) = upstream.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
        return SocketAddr::new(ip, default_port).to_string();
    }
    match upstream.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => upstream.to_string(),
        _ => format!("{}:{}", upstream, default_port),
    }
}
