use log::{debug, info};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpStream};
use std::ops::RangeInclusive;
use std::time::Duration;

pub const DEFAULT_PORT_RANGE: RangeInclusive<u16> = 5000..=5003;
pub const DEFAULT_IP_RANGE: RangeInclusive<u8> = 0..=0;
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Local-network neighbor discovery
///
/// Candidates share the node's first three IPv4 octets. For every port in
/// the port range and every offset in the ip range, the last octet is
/// shifted by the offset. A candidate counts as a neighbor when it accepts a
/// TCP connection within the probe timeout; there is no handshake.
pub struct NeighborScanner {
    host: String,
    port: u16,
    port_range: RangeInclusive<u16>,
    ip_range: RangeInclusive<u8>,
    probe_timeout: Duration,
}

impl NeighborScanner {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            port_range: DEFAULT_PORT_RANGE,
            ip_range: DEFAULT_IP_RANGE,
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    pub fn with_port_range(mut self, port_range: RangeInclusive<u16>) -> Self {
        self.port_range = port_range;
        self
    }

    pub fn with_ip_range(mut self, ip_range: RangeInclusive<u8>) -> Self {
        self.ip_range = ip_range;
        self
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    /// Every address the scanner would probe, in probe order.
    pub fn candidates(&self) -> Vec<SocketAddrV4> {
        let ip: Ipv4Addr = match self.host.parse() {
            Ok(ip) => ip,
            Err(_) => {
                debug!("Host {} is not IPv4, nothing to scan", self.host);
                return Vec::new();
            }
        };
        let own = SocketAddrV4::new(ip, self.port);
        let [a, b, c, last] = ip.octets();

        let mut candidates = Vec::new();
        for port in self.port_range.clone() {
            for offset in self.ip_range.clone() {
                let Some(octet) = last.checked_add(offset) else {
                    continue;
                };
                let candidate = SocketAddrV4::new(Ipv4Addr::new(a, b, c, octet), port);
                if candidate != own {
                    candidates.push(candidate);
                }
            }
        }
        candidates
    }

    /// Probes every candidate and returns the reachable ones as `host:port`.
    pub fn scan(&self) -> Vec<String> {
        let found: Vec<String> = self
            .candidates()
            .into_iter()
            .filter(|candidate| is_reachable(&SocketAddr::V4(*candidate), self.probe_timeout))
            .map(|candidate| candidate.to_string())
            .collect();
        info!(
            "Neighbor scan from {}:{} found {} peers",
            self.host,
            self.port,
            found.len()
        );
        found
    }
}

/// True when something accepts a TCP connection at `addr` within `timeout`.
pub fn is_reachable(addr: &SocketAddr, timeout: Duration) -> bool {
    TcpStream::connect_timeout(addr, timeout).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_default_candidates_skip_self() {
        let scanner = NeighborScanner::new("127.0.0.1", 5001);
        let candidates: Vec<String> = scanner.candidates().iter().map(|c| c.to_string()).collect();
        assert_eq!(
            candidates,
            vec!["127.0.0.1:5000", "127.0.0.1:5002", "127.0.0.1:5003"]
        );
    }

    #[test]
    fn test_ip_offsets_shift_last_octet() {
        let scanner = NeighborScanner::new("192.168.1.10", 5000)
            .with_port_range(5000..=5001)
            .with_ip_range(0..=2);
        let candidates: Vec<String> = scanner.candidates().iter().map(|c| c.to_string()).collect();
        assert_eq!(
            candidates,
            vec![
                "192.168.1.11:5000",
                "192.168.1.12:5000",
                "192.168.1.10:5001",
                "192.168.1.11:5001",
                "192.168.1.12:5001",
            ]
        );
    }

    #[test]
    fn test_octet_overflow_is_skipped() {
        let scanner = NeighborScanner::new("10.0.0.254", 6000)
            .with_port_range(6000..=6000)
            .with_ip_range(0..=3);
        let candidates: Vec<String> = scanner.candidates().iter().map(|c| c.to_string()).collect();
        assert_eq!(candidates, vec!["10.0.0.255:6000"]);
    }

    #[test]
    fn test_non_ipv4_host_has_no_candidates() {
        assert!(NeighborScanner::new("localhost", 5000).candidates().is_empty());
        assert!(NeighborScanner::new("::1", 5000).candidates().is_empty());
    }

    #[test]
    fn test_scan_finds_listening_port() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let open = listener.local_addr().unwrap().port();

        // scanning from a port outside the range so nothing is skipped as self
        let scanner = NeighborScanner::new("127.0.0.1", 1)
            .with_port_range(open..=open)
            .with_probe_timeout(Duration::from_millis(500));
        assert_eq!(scanner.scan(), vec![format!("127.0.0.1:{open}")]);

        drop(listener);
        assert!(!is_reachable(
            &SocketAddr::from(([127, 0, 0, 1], 9)),
            Duration::from_millis(200)
        ));
    }
}
