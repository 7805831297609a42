use super::entry::{ip_attribute, ip_from_attribute, Entry};
use super::flags::CadtFlags;
use crate::error::{Error, Result};
use crate::proto::NetlinkMessage;
use crate::type_ipset::{Attribute, Message};
use crate::uapi;
use log::warn;
use std::net::IpAddr;

/// HeaderOptions are the create-time parameters of a set, plus the
/// statistics the kernel reports back in a header or list reply.
///
/// All fields are optional, since each set type accepts a different subset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderOptions {
    /// Range start of a bitmap type.
    pub ip: Option<IpAddr>,
    pub ip_to: Option<IpAddr>,
    pub cidr: Option<u8>,
    pub port: Option<u16>,
    pub port_to: Option<u16>,
    /// Default timeout of new entries, in seconds.
    pub timeout: Option<u32>,
    /// Capabilities such as counters, comment, forceadd and skbinfo.
    pub flags: Option<CadtFlags>,
    pub mark_mask: Option<u32>,
    pub hash_size: Option<u32>,
    pub max_elem: Option<u32>,
    pub net_mask: Option<u8>,
    pub bucket_size: Option<u8>,
    pub resize: Option<u8>,
    pub size: Option<u32>,
    pub elements: Option<u32>,
    pub references: Option<u32>,
    pub mem_size: Option<u32>,
    pub unknown: Vec<Attribute>,
}

impl HeaderOptions {
    pub fn counters(&self) -> bool {
        self.has_flag(CadtFlags::WITH_COUNTERS)
    }

    pub fn comment(&self) -> bool {
        self.has_flag(CadtFlags::WITH_COMMENT)
    }

    pub fn forceadd(&self) -> bool {
        self.has_flag(CadtFlags::WITH_FORCEADD)
    }

    pub fn skbinfo(&self) -> bool {
        self.has_flag(CadtFlags::WITH_SKBINFO)
    }

    fn has_flag(&self, f: CadtFlags) -> bool {
        self.flags.map_or(false, |flags| flags.contains(f))
    }

    /// Encodes the options as a nested IPSET_ATTR_DATA attribute.
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
        if let Some(flags) = self.flags {
            c.push(Attribute::from_u32(uapi::IPSET_ATTR_CADT_FLAGS, flags.bits(), true));
        }
        if let Some(mask) = self.mark_mask {
            c.push(Attribute::from_u32(uapi::IPSET_ATTR_MARKMASK, mask, true));
        }
        if let Some(v) = self.hash_size {
            c.push(Attribute::from_u32(uapi::IPSET_ATTR_HASHSIZE, v, true));
        }
        if let Some(v) = self.max_elem {
            c.push(Attribute::from_u32(uapi::IPSET_ATTR_MAXELEM, v, true));
        }
        if let Some(v) = self.net_mask {
            c.push(Attribute::from_u8(uapi::IPSET_ATTR_NETMASK, v));
        }
        if let Some(v) = self.bucket_size {
            c.push(Attribute::from_u8(uapi::IPSET_ATTR_BUCKETSIZE, v));
        }
        if let Some(v) = self.resize {
            c.push(Attribute::from_u8(uapi::IPSET_ATTR_RESIZE, v));
        }
        if let Some(v) = self.size {
            c.push(Attribute::from_u32(uapi::IPSET_ATTR_SIZE, v, true));
        }
        if let Some(v) = self.elements {
            c.push(Attribute::from_u32(uapi::IPSET_ATTR_ELEMENTS, v, true));
        }
        if let Some(v) = self.references {
            c.push(Attribute::from_u32(uapi::IPSET_ATTR_REFERENCES, v, true));
        }
        if let Some(v) = self.mem_size {
            c.push(Attribute::from_u32(uapi::IPSET_ATTR_MEMSIZE, v, true));
        }
        c.extend(self.unknown.iter().cloned());

        Attribute::nested(uapi::IPSET_ATTR_DATA, c)
    }

    pub fn from_attribute(attr: &Attribute) -> Result<HeaderOptions> {
        let mut out = HeaderOptions::default();

        for a in attr.children()? {
            match a.typ() {
                uapi::IPSET_ATTR_IP => out.ip = Some(ip_from_attribute(a)?),
                uapi::IPSET_ATTR_IP_TO => out.ip_to = Some(ip_from_attribute(a)?),
                uapi::IPSET_ATTR_CIDR => out.cidr = Some(a.as_u8()?),
                uapi::IPSET_ATTR_PORT => out.port = Some(a.as_u16()?),
                uapi::IPSET_ATTR_PORT_TO => out.port_to = Some(a.as_u16()?),
                uapi::IPSET_ATTR_TIMEOUT => out.timeout = Some(a.as_u32()?),
                uapi::IPSET_ATTR_CADT_FLAGS => {
                    out.flags = Some(CadtFlags::from_bits_truncate(a.as_u32()?))
                }
                uapi::IPSET_ATTR_MARKMASK => out.mark_mask = Some(a.as_u32()?),
                uapi::IPSET_ATTR_HASHSIZE => out.hash_size = Some(a.as_u32()?),
                uapi::IPSET_ATTR_MAXELEM => out.max_elem = Some(a.as_u32()?),
                uapi::IPSET_ATTR_NETMASK => out.net_mask = Some(a.as_u8()?),
                uapi::IPSET_ATTR_BUCKETSIZE => out.bucket_size = Some(a.as_u8()?),
                uapi::IPSET_ATTR_RESIZE => out.resize = Some(a.as_u8()?),
                uapi::IPSET_ATTR_SIZE => out.size = Some(a.as_u32()?),
                uapi::IPSET_ATTR_ELEMENTS => out.elements = Some(a.as_u32()?),
                uapi::IPSET_ATTR_REFERENCES => out.references = Some(a.as_u32()?),
                uapi::IPSET_ATTR_MEMSIZE => out.mem_size = Some(a.as_u32()?),
                _ => out.unknown.push(a.clone()),
            }
        }

        Ok(out)
    }
}

/// IpSet describes one set as reported by the kernel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpSet {
    pub name: String,
    pub type_name: String,
    pub revision: u8,
    pub family: u8,
    pub header: HeaderOptions,
    /// Members in the order the kernel sent them.
    pub entries: Vec<Entry>,
}

impl IpSet {
    pub fn from_message(msg: &Message) -> Result<IpSet> {
        IpSet::from_attrs(&msg.attrs)
    }

    pub fn from_netlink(nlmsg: &NetlinkMessage) -> Result<IpSet> {
        IpSet::from_message(&Message::from_netlink(nlmsg)?)
    }

    pub fn from_attrs(attrs: &[Attribute]) -> Result<IpSet> {
        let mut name = None;
        let mut out = IpSet::default();

        for attr in attrs.iter() {
            match attr.typ() {
                uapi::IPSET_ATTR_PROTOCOL => check_protocol(attr.as_u8()?)?,
                uapi::IPSET_ATTR_SETNAME => name = Some(attr.as_string()?),
                uapi::IPSET_ATTR_TYPENAME => out.type_name = attr.as_string()?,
                uapi::IPSET_ATTR_REVISION => out.revision = attr.as_u8()?,
                uapi::IPSET_ATTR_FAMILY => out.family = attr.as_u8()?,
                uapi::IPSET_ATTR_DATA => out.header = HeaderOptions::from_attribute(attr)?,
                // ADT is a list of nested data attributes, one per entry
                uapi::IPSET_ATTR_ADT => {
                    for data in attr.children()? {
                        if data.typ() != uapi::IPSET_ATTR_DATA {
                            warn!("ignoring attribute {} in entry list", data.typ());
                            continue;
                        }
                        out.entries.push(Entry::from_attribute(data)?);
                    }
                }
                _ => {}
            }
        }

        // Continuation messages of a large listing carry only the name and
        // more entries; their type name stays empty.
        out.name = name.ok_or_else(|| Error::Decoding("reply without set name".into()))?;
        Ok(out)
    }
}

pub(crate) fn check_protocol(actual: u8) -> Result<()> {
    if actual != uapi::IPSET_PROTOCOL {
        return Err(Error::ProtocolVersion {
            expected: uapi::IPSET_PROTOCOL,
            actual,
        });
    }
    Ok(())
}
