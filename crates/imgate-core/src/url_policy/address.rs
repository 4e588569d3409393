//! Classification of addresses that must never be fetched from.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// True if `ip` is private, loopback, link-local, reserved, multicast or
/// otherwise not a public unicast destination.
pub fn is_private_address(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => is_private_v6(v6),
    }
}

fn is_private_v4(ip: Ipv4Addr) -> bool {
    let [a, b, c, _] = ip.octets();
    ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_multicast()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_unspecified()
        // "this network" 0.0.0.0/8
        || a == 0
        // shared address space (carrier-grade NAT) 100.64.0.0/10
        || (a == 100 && (b & 0xc0) == 64)
        // IETF protocol assignments 192.0.0.0/24
        || (a == 192 && b == 0 && c == 0)
        // benchmarking 198.18.0.0/15
        || (a == 198 && (b & 0xfe) == 18)
        // reserved 240.0.0.0/4
        || a >= 240
}

fn is_private_v6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = embedded_v4(ip) {
        return is_private_v4(v4);
    }
    let seg = ip.segments();
    ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        // unique local fc00::/7
        || (seg[0] & 0xfe00) == 0xfc00
        // link-local fe80::/10
        || (seg[0] & 0xffc0) == 0xfe80
        // deprecated site-local fec0::/10
        || (seg[0] & 0xffc0) == 0xfec0
        // documentation 2001:db8::/32
        || (seg[0] == 0x2001 && seg[1] == 0x0db8)
        // discard-only 100::/64
        || (seg[0] == 0x0100 && seg[1] == 0 && seg[2] == 0 && seg[3] == 0)
}

/// IPv4 address carried inside an IPv4-mapped (`::ffff:a.b.c.d`) or
/// IPv4-compatible (`::a.b.c.d`) IPv6 address.
fn embedded_v4(ip: Ipv6Addr) -> Option<Ipv4Addr> {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return Some(v4);
    }
    let seg = ip.segments();
    // ::/96 minus :: and ::1, which the caller already treats as unspecified/loopback.
    if seg[..6].iter().all(|s| *s == 0) && !(ip.is_unspecified() || ip.is_loopback()) {
        let [.., a, b, c, d] = ip.octets();
        return Some(Ipv4Addr::new(a, b, c, d));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocked(s: &str) -> bool {
        is_private_address(s.parse().unwrap())
    }

    #[test]
    fn rfc1918_ranges() {
        assert!(blocked("10.0.0.1"));
        assert!(blocked("10.255.255.255"));
        assert!(blocked("172.16.0.1"));
        assert!(blocked("172.31.255.254"));
        assert!(blocked("192.168.1.1"));
        assert!(!blocked("172.32.0.1"));
    }

    #[test]
    fn loopback_and_link_local() {
        assert!(blocked("127.0.0.1"));
        assert!(blocked("127.8.9.10"));
        assert!(blocked("169.254.1.1"));
        assert!(blocked("169.254.169.254"));
        assert!(blocked("::1"));
        assert!(blocked("fe80::1"));
    }

    #[test]
    fn reserved_and_multicast() {
        assert!(blocked("0.0.0.0"));
        assert!(blocked("0.1.2.3"));
        assert!(blocked("224.0.0.1"));
        assert!(blocked("239.255.255.250"));
        assert!(blocked("240.0.0.1"));
        assert!(blocked("255.255.255.255"));
        assert!(blocked("100.64.0.1"));
        assert!(blocked("198.18.0.1"));
        assert!(blocked("192.0.0.8"));
        assert!(blocked("192.0.2.1"));
        assert!(blocked("ff02::1"));
        assert!(blocked("fd00::1"));
        assert!(blocked("2001:db8::1"));
        assert!(blocked("::"));
    }

    #[test]
    fn public_addresses_pass() {
        assert!(!blocked("8.8.8.8"));
        assert!(!blocked("1.1.1.1"));
        assert!(!blocked("93.184.216.34"));
        assert!(!blocked("100.128.0.1"));
        assert!(!blocked("2606:4700:4700::1111"));
    }

    #[test]
    fn mapped_v4_uses_embedded_address() {
        assert!(blocked("::ffff:127.0.0.1"));
        assert!(blocked("::ffff:10.1.2.3"));
        assert!(blocked("::192.168.0.1"));
        assert!(!blocked("::ffff:8.8.8.8"));
    }
}
