use super::flags::CadtFlags;
use crate::error::{Error, Result};
use crate::type_ipset::Attribute;
use crate::uapi;
use eui48::MacAddress;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Entry is one member of a set.
///
/// Every field is optional; which ones make sense depends on the set type,
/// and the kernel is the one enforcing that. Attributes this crate does not
/// model are kept in `unknown` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub ip: Option<IpAddr>,
    pub ip_to: Option<IpAddr>,
    pub cidr: Option<u8>,
    pub port: Option<u16>,
    pub port_to: Option<u16>,
    pub timeout: Option<u32>,
    pub proto: Option<u8>,
    pub flags: Option<CadtFlags>,
    pub lineno: Option<u32>,
    pub mark: Option<u32>,
    pub mark_mask: Option<u32>,
    pub mac: Option<MacAddress>,
    /// Member set of a list:set.
    pub name: Option<String>,
    pub name_ref: Option<String>,
    pub ip2: Option<IpAddr>,
    pub cidr2: Option<u8>,
    pub iface: Option<String>,
    pub bytes: Option<u64>,
    pub packets: Option<u64>,
    pub comment: Option<String>,
    /// skbinfo mark and mask.
    pub skb_mark: Option<(u32, u32)>,
    pub skb_prio: Option<u32>,
    pub skb_queue: Option<u16>,
    pub unknown: Vec<Attribute>,
}

/// One field setter. An entry is built by applying a list of these in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryField {
    /// A single address. Excludes `Net`.
    Ip(IpAddr),
    /// An address with a prefix length. Excludes `Ip`.
    Net(IpAddr, u8),
    /// Upper bound of an address range starting at `Ip`.
    IpTo(IpAddr),
    Ip2(IpAddr),
    Net2(IpAddr, u8),
    Port { port: u16, proto: Option<u8> },
    PortTo(u16),
    Timeout(u32),
    Flags(CadtFlags),
    Lineno(u32),
    Mark { mark: u32, mask: Option<u32> },
    Mac(MacAddress),
    Name(String),
    NameRef(String),
    Iface(String),
    Counters { bytes: u64, packets: u64 },
    Comment(String),
    SkbMark { mark: u32, mask: u32 },
    SkbPrio(u32),
    SkbQueue(u16),
}

impl Entry {
    /// Builds an entry by applying the given fields in order.
    pub fn new<I>(fields: I) -> Result<Entry>
    where
        I: IntoIterator<Item = EntryField>,
    {
        fields
            .into_iter()
            .try_fold(Entry::default(), |entry, field| entry.with(field))
    }

    /// Returns a copy of the entry with one more field set.
    pub fn with(mut self, field: EntryField) -> Result<Entry> {
        match field {
            EntryField::Ip(ip) => {
                if self.cidr.is_some() {
                    return Err(conflict("ip", "network"));
                }
                check_same_family(&ip, self.ip_to.as_ref())?;
                self.ip = Some(ip);
            }
            EntryField::Net(ip, cidr) => {
                if self.ip.is_some() && self.cidr.is_none() {
                    return Err(conflict("network", "ip"));
                }
                check_prefix(&ip, cidr)?;
                check_same_family(&ip, self.ip_to.as_ref())?;
                self.ip = Some(ip);
                self.cidr = Some(cidr);
            }
            EntryField::IpTo(ip) => {
                check_same_family(&ip, self.ip.as_ref())?;
                self.ip_to = Some(ip);
            }
            EntryField::Ip2(ip) => {
                if self.cidr2.is_some() {
                    return Err(conflict("ip2", "network2"));
                }
                self.ip2 = Some(ip);
            }
            EntryField::Net2(ip, cidr) => {
                if self.ip2.is_some() && self.cidr2.is_none() {
                    return Err(conflict("network2", "ip2"));
                }
                check_prefix(&ip, cidr)?;
                self.ip2 = Some(ip);
                self.cidr2 = Some(cidr);
            }
            EntryField::Port { port, proto } => {
                self.port = Some(port);
                self.proto = proto;
            }
            EntryField::PortTo(port) => self.port_to = Some(port),
            EntryField::Timeout(t) => self.timeout = Some(t),
            EntryField::Flags(f) => self.flags = Some(f),
            EntryField::Lineno(n) => self.lineno = Some(n),
            EntryField::Mark { mark, mask } => {
                self.mark = Some(mark);
                self.mark_mask = mask;
            }
            EntryField::Mac(mac) => self.mac = Some(mac),
            EntryField::Name(name) => {
                check_string("set name", &name, uapi::IPSET_MAXNAMELEN - 1)?;
                self.name = Some(name);
            }
            EntryField::NameRef(name) => {
                check_string("set name", &name, uapi::IPSET_MAXNAMELEN - 1)?;
                self.name_ref = Some(name);
            }
            EntryField::Iface(iface) => {
                check_string("interface name", &iface, uapi::IFNAMSIZ - 1)?;
                self.iface = Some(iface);
            }
            EntryField::Counters { bytes, packets } => {
                self.bytes = Some(bytes);
                self.packets = Some(packets);
            }
            EntryField::Comment(comment) => {
                if comment.len() > uapi::IPSET_MAX_COMMENT_SIZE || comment.contains('\0') {
                    return Err(Error::Construction(format!(
                        "comment must be at most {} bytes without NUL",
                        uapi::IPSET_MAX_COMMENT_SIZE
                    )));
                }
                self.comment = Some(comment);
            }
            EntryField::SkbMark { mark, mask } => self.skb_mark = Some((mark, mask)),
            EntryField::SkbPrio(prio) => self.skb_prio = Some(prio),
            EntryField::SkbQueue(queue) => self.skb_queue = Some(queue),
        }
        Ok(self)
    }

    /// Encodes the entry as a nested IPSET_ATTR_DATA attribute.
    pub fn to_attribute(&self) -> Attribute {
        let mut c = vec![];

        if let Some(ip) = &self.ip {
            c.push(ip_attribute(uapi::IPSET_ATTR_IP, ip));
        }
        if let Some(ip) = &self.ip_to {
            c.push(ip_attribute(uapi::IPSET_ATTR_IP_TO, ip));
        }
        if let Some(cidr) = self.cidr {
            c.push(Attribute::from_u8(uapi::IPSET_ATTR_CIDR, cidr));
        }
        if let Some(port) = self.port {
            c.push(Attribute::from_u16(uapi::IPSET_ATTR_PORT, port, true));
        }
        if let Some(port) = self.port_to {
            c.push(Attribute::from_u16(uapi::IPSET_ATTR_PORT_TO, port, true));
        }
        if let Some(t) = self.timeout {
            c.push(Attribute::from_u32(uapi::IPSET_ATTR_TIMEOUT, t, true));
        }
        if let Some(proto) = self.proto {
            c.push(Attribute::from_u8(uapi::IPSET_ATTR_PROTO, proto));
        }
        if let Some(flags) = self.flags {
            c.push(Attribute::from_u32(uapi::IPSET_ATTR_CADT_FLAGS, flags.bits(), true));
        }
        if let Some(n) = self.lineno {
            c.push(Attribute::from_u32(uapi::IPSET_ATTR_CADT_LINENO, n, true));
        }
        if let Some(mark) = self.mark {
            c.push(Attribute::from_u32(uapi::IPSET_ATTR_MARK, mark, true));
        }
        if let Some(mask) = self.mark_mask {
            c.push(Attribute::from_u32(uapi::IPSET_ATTR_MARKMASK, mask, true));
        }
        if let Some(mac) = &self.mac {
            c.push(Attribute::new(uapi::IPSET_ATTR_ETHER, mac.as_bytes().to_vec()));
        }
        if let Some(name) = &self.name {
            c.push(Attribute::from_string(uapi::IPSET_ATTR_NAME, name));
        }
        if let Some(name) = &self.name_ref {
            c.push(Attribute::from_string(uapi::IPSET_ATTR_NAMEREF, name));
        }
        if let Some(ip) = &self.ip2 {
            c.push(ip_attribute(uapi::IPSET_ATTR_IP2, ip));
        }
        if let Some(cidr) = self.cidr2 {
            c.push(Attribute::from_u8(uapi::IPSET_ATTR_CIDR2, cidr));
        }
        if let Some(iface) = &self.iface {
            c.push(Attribute::from_string(uapi::IPSET_ATTR_IFACE, iface));
        }
        if let Some(bytes) = self.bytes {
            c.push(Attribute::from_u64(uapi::IPSET_ATTR_BYTES, bytes, true));
        }
        if let Some(packets) = self.packets {
            c.push(Attribute::from_u64(uapi::IPSET_ATTR_PACKETS, packets, true));
        }
        if let Some(comment) = &self.comment {
            c.push(Attribute::from_string(uapi::IPSET_ATTR_COMMENT, comment));
        }
        if let Some((mark, mask)) = self.skb_mark {
            let v = (u64::from(mark) << 32) | u64::from(mask);
            c.push(Attribute::from_u64(uapi::IPSET_ATTR_SKBMARK, v, true));
        }
        if let Some(prio) = self.skb_prio {
            c.push(Attribute::from_u32(uapi::IPSET_ATTR_SKBPRIO, prio, true));
        }
        if let Some(queue) = self.skb_queue {
            c.push(Attribute::from_u16(uapi::IPSET_ATTR_SKBQUEUE, queue, true));
        }
        c.extend(self.unknown.iter().cloned());

        Attribute::nested(uapi::IPSET_ATTR_DATA, c)
    }

    /// Decodes an entry from a nested data attribute.
    pub fn from_attribute(attr: &Attribute) -> Result<Entry> {
        let mut out = Entry::default();

        for a in attr.children()? {
            match a.typ() {
                uapi::IPSET_ATTR_IP => out.ip = Some(ip_from_attribute(a)?),
                uapi::IPSET_ATTR_IP_TO => out.ip_to = Some(ip_from_attribute(a)?),
                uapi::IPSET_ATTR_CIDR => out.cidr = Some(a.as_u8()?),
                uapi::IPSET_ATTR_PORT => out.port = Some(a.as_u16()?),
                uapi::IPSET_ATTR_PORT_TO => out.port_to = Some(a.as_u16()?),
                uapi::IPSET_ATTR_TIMEOUT => out.timeout = Some(a.as_u32()?),
                uapi::IPSET_ATTR_PROTO => out.proto = Some(a.as_u8()?),
                uapi::IPSET_ATTR_CADT_FLAGS => {
                    out.flags = Some(CadtFlags::from_bits_truncate(a.as_u32()?))
                }
                uapi::IPSET_ATTR_CADT_LINENO => out.lineno = Some(a.as_u32()?),
                uapi::IPSET_ATTR_MARK => out.mark = Some(a.as_u32()?),
                uapi::IPSET_ATTR_MARKMASK => out.mark_mask = Some(a.as_u32()?),
                uapi::IPSET_ATTR_ETHER => out.mac = Some(mac_from_attribute(a)?),
                uapi::IPSET_ATTR_NAME => out.name = Some(a.as_string()?),
                uapi::IPSET_ATTR_NAMEREF => out.name_ref = Some(a.as_string()?),
                uapi::IPSET_ATTR_IP2 => out.ip2 = Some(ip_from_attribute(a)?),
                uapi::IPSET_ATTR_CIDR2 => out.cidr2 = Some(a.as_u8()?),
                uapi::IPSET_ATTR_IFACE => out.iface = Some(a.as_string()?),
                uapi::IPSET_ATTR_BYTES => out.bytes = Some(a.as_u64()?),
                uapi::IPSET_ATTR_PACKETS => out.packets = Some(a.as_u64()?),
                uapi::IPSET_ATTR_COMMENT => out.comment = Some(a.as_string()?),
                uapi::IPSET_ATTR_SKBMARK => {
                    let v = a.as_u64()?;
                    out.skb_mark = Some(((v >> 32) as u32, v as u32));
                }
                uapi::IPSET_ATTR_SKBPRIO => out.skb_prio = Some(a.as_u32()?),
                uapi::IPSET_ATTR_SKBQUEUE => out.skb_queue = Some(a.as_u16()?),
                _ => out.unknown.push(a.clone()),
            }
        }

        Ok(out)
    }
}

fn conflict(field: &str, other: &str) -> Error {
    Error::Construction(format!("{} cannot be combined with {}", field, other))
}

fn check_prefix(ip: &IpAddr, cidr: u8) -> Result<()> {
    let max = if ip.is_ipv4() { 32 } else { 128 };
    if cidr > max {
        return Err(Error::Construction(format!(
            "prefix length {} exceeds {} for {}",
            cidr, max, ip
        )));
    }
    Ok(())
}

fn check_same_family(ip: &IpAddr, other: Option<&IpAddr>) -> Result<()> {
    match other {
        Some(o) if o.is_ipv4() != ip.is_ipv4() => Err(Error::Construction(format!(
            "{} and {} belong to different address families",
            ip, o
        ))),
        _ => Ok(()),
    }
}

fn check_string(what: &str, s: &str, max: usize) -> Result<()> {
    if s.is_empty() || s.len() > max || s.contains('\0') {
        return Err(Error::Construction(format!(
            "{} {:?} must be 1 to {} bytes without NUL",
            what, s, max
        )));
    }
    Ok(())
}

/// An address is a nested attribute holding one IPv4 or IPv6 child.
pub(crate) fn ip_attribute(typ: u16, ip: &IpAddr) -> Attribute {
    let child = match ip {
        IpAddr::V4(v4) => Attribute::net_order(uapi::IPSET_ATTR_IPADDR_IPV4, v4.octets().to_vec()),
        IpAddr::V6(v6) => Attribute::net_order(uapi::IPSET_ATTR_IPADDR_IPV6, v6.octets().to_vec()),
    };
    Attribute::nested(typ, vec![child])
}

/// Address octets are always in network order, whether or not the kernel
/// flags them as such.
pub(crate) fn ip_from_attribute(attr: &Attribute) -> Result<IpAddr> {
    for c in attr.children()? {
        let d = c.data()?;
        match (c.typ(), d.len()) {
            (uapi::IPSET_ATTR_IPADDR_IPV4, 4) => {
                return Ok(IpAddr::V4(Ipv4Addr::new(d[0], d[1], d[2], d[3])));
            }
            (uapi::IPSET_ATTR_IPADDR_IPV6, 16) => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(d);
                return Ok(IpAddr::V6(Ipv6Addr::from(octets)));
            }
            (uapi::IPSET_ATTR_IPADDR_IPV4, _) | (uapi::IPSET_ATTR_IPADDR_IPV6, _) => {
                return Err(Error::Decoding(format!(
                    "address attribute of {} bytes",
                    d.len()
                )));
            }
            _ => {}
        }
    }
    Err(Error::Decoding(format!(
        "attribute {} holds no address",
        attr.typ()
    )))
}

fn mac_from_attribute(attr: &Attribute) -> Result<MacAddress> {
    let d = attr.data()?;
    if d.len() != 6 {
        return Err(Error::Decoding(format!("MAC address of {} bytes", d.len())));
    }
    let mut eui = [0u8; 6];
    eui.copy_from_slice(d);
    Ok(MacAddress::new(eui))
}
