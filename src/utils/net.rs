use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Best-effort discovery of the address other hosts can reach us on.
///
/// Connecting a UDP socket sends no packets; it only asks the OS which
/// local interface would route to the target.
pub fn local_ip() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect("10.255.255.255:1")?;
        Ok(socket.local_addr()?.ip())
    };

    match probe() {
        Ok(ip) if !ip.is_unspecified() => ip,
        _ => IpAddr::V4(Ipv4Addr::LOCALHOST),
    }
}

/// Advertised base URL for a peer listening on `port`
pub fn default_advertise_address(port: u16) -> String {
    match local_ip() {
        IpAddr::V4(ip) => format!("http://{}:{}", ip, port),
        IpAddr::V6(ip) => format!("http://[{}]:{}", ip, port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_ip_is_specified() {
        assert!(!local_ip().is_unspecified());
    }

    #[test]
    fn test_default_advertise_address() {
        let addr = default_advertise_address(5001);
        assert!(addr.starts_with("http://"));
        assert!(addr.ends_with(":5001"));
    }
}
