/// ipset: set management
/// higher-level methods for creating, filling and inspecting ipsets.
///
/// Every command is one request to the netfilter netlink family; `Conn`
/// builds the request, hands it to a `Query` and decodes what comes back.
/// Sets and entries are modeled with Options throughout, since which fields
/// are meaningful depends on the set type.
mod entry;
mod flags;
mod set;

pub use self::entry::{Entry, EntryField};
pub use self::flags::CadtFlags;
pub use self::set::{HeaderOptions, IpSet};

use crate::error::{command_name, Error, Result};
use crate::proto::{NetlinkMessage, Query};
use crate::type_ipset::{find, Attribute, Message};
use crate::uapi;
use log::debug;

/// Config holds the per-connection settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Address family written to the header of every request.
    pub family: u8,
    /// Tolerate existing sets and entries on create and add, and missing
    /// entries on delete, like `ipset -exist`.
    pub ignore_existing: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            family: uapi::NFPROTO_IPV4,
            ignore_existing: false,
        }
    }
}

/// Protocol versions supported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolInfo {
    pub protocol: u8,
    /// Oldest supported version; only sent by newer kernels.
    pub protocol_min: Option<u8>,
}

/// Revision range the kernel supports for one set type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeRevisions {
    pub max: u8,
    pub min: u8,
}

/// Conn issues ipset commands over a `Query`, normally a `NetlinkSocket`.
#[derive(Debug)]
pub struct Conn<Q: Query> {
    query: Q,
    config: Config,
}

impl<Q: Query> Conn<Q> {
    pub fn new(query: Q, family: u8) -> Conn<Q> {
        Conn::with_config(
            query,
            Config {
                family,
                ..Default::default()
            },
        )
    }

    pub fn with_config(query: Q, config: Config) -> Conn<Q> {
        Conn { query, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn into_inner(self) -> Q {
        self.query
    }

    /// Asks the kernel which protocol version it speaks.
    pub fn protocol(&mut self) -> Result<ProtocolInfo> {
        let msg = self.request();
        let resp = self.exec(uapi::IPSET_CMD_PROTOCOL, uapi::NLM_F_REQUEST, msg)?;
        let msg = first_reply(uapi::IPSET_CMD_PROTOCOL, &resp)?;

        let protocol = find(&msg.attrs, uapi::IPSET_ATTR_PROTOCOL)
            .ok_or_else(|| Error::Decoding("protocol reply without version".into()))?
            .as_u8()?;
        let protocol_min = match find(&msg.attrs, uapi::IPSET_ATTR_PROTOCOL_MIN) {
            Some(a) => Some(a.as_u8()?),
            None => None,
        };

        Ok(ProtocolInfo {
            protocol,
            protocol_min,
        })
    }

    /// Creates a set with default options.
    pub fn create(&mut self, name: &str, type_name: &str, revision: u8, family: u8) -> Result<()> {
        self.create_with(name, type_name, revision, family, &HeaderOptions::default())
    }

    pub fn create_with(
        &mut self,
        name: &str,
        type_name: &str,
        revision: u8,
        family: u8,
        opts: &HeaderOptions,
    ) -> Result<()> {
        check_name(name)?;
        check_name(type_name)?;

        let mut msg = self.request();
        msg.push(Attribute::from_string(uapi::IPSET_ATTR_SETNAME, name));
        msg.push(Attribute::from_string(uapi::IPSET_ATTR_TYPENAME, type_name));
        msg.push(Attribute::from_u8(uapi::IPSET_ATTR_REVISION, revision));
        msg.push(Attribute::from_u8(uapi::IPSET_ATTR_FAMILY, family));
        msg.push(opts.to_attribute());

        let flags = self.exclusive(uapi::NLM_F_REQUEST | uapi::NLM_F_ACK | uapi::NLM_F_CREATE);
        self.exec(uapi::IPSET_CMD_CREATE, flags, msg)?;
        Ok(())
    }

    pub fn destroy(&mut self, name: &str) -> Result<()> {
        self.named(uapi::IPSET_CMD_DESTROY, Some(name))
    }

    /// Destroys every set not referenced by the kernel.
    pub fn destroy_all(&mut self) -> Result<()> {
        self.named(uapi::IPSET_CMD_DESTROY, None)
    }

    pub fn flush(&mut self, name: &str) -> Result<()> {
        self.named(uapi::IPSET_CMD_FLUSH, Some(name))
    }

    pub fn flush_all(&mut self) -> Result<()> {
        self.named(uapi::IPSET_CMD_FLUSH, None)
    }

    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        self.pair(uapi::IPSET_CMD_RENAME, from, to)
    }

    /// Exchanges the contents of two sets of compatible types.
    pub fn swap(&mut self, a: &str, b: &str) -> Result<()> {
        self.pair(uapi::IPSET_CMD_SWAP, a, b)
    }

    /// Succeeds when the entry is a member of the set. A missing member is a
    /// kernel error for which `Error::is_not_found` holds.
    pub fn test(&mut self, name: &str, entry: &Entry) -> Result<()> {
        check_name(name)?;

        let mut msg = self.request();
        msg.push(Attribute::from_string(uapi::IPSET_ATTR_SETNAME, name));
        msg.push(entry.to_attribute());

        self.exec(
            uapi::IPSET_CMD_TEST,
            uapi::NLM_F_REQUEST | uapi::NLM_F_ACK,
            msg,
        )?;
        Ok(())
    }

    /// Fetches the descriptor of one set, without its entries.
    pub fn header(&mut self, name: &str) -> Result<IpSet> {
        check_name(name)?;

        let mut msg = self.request();
        msg.push(Attribute::from_string(uapi::IPSET_ATTR_SETNAME, name));

        let resp = self.exec(uapi::IPSET_CMD_HEADER, uapi::NLM_F_REQUEST, msg)?;
        let msg = first_reply(uapi::IPSET_CMD_HEADER, &resp)?;
        IpSet::from_message(&msg)
    }

    /// Lists one set with its entries.
    ///
    /// Large sets may come back split over several messages; each one is
    /// returned as its own `IpSet`, in the order the kernel sent them.
    pub fn list(&mut self, name: &str) -> Result<Vec<IpSet>> {
        check_name(name)?;
        self.list_sets(Some(name))
    }

    pub fn list_all(&mut self) -> Result<Vec<IpSet>> {
        self.list_sets(None)
    }

    /// Adds entries to a set.
    pub fn add(&mut self, name: &str, entries: &[Entry]) -> Result<()> {
        self.adt(uapi::IPSET_CMD_ADD, name, entries)
    }

    pub fn delete(&mut self, name: &str, entries: &[Entry]) -> Result<()> {
        self.adt(uapi::IPSET_CMD_DEL, name, entries)
    }

    /// Asks the kernel which revisions of a set type it supports.
    pub fn type_revisions(&mut self, type_name: &str, family: u8) -> Result<TypeRevisions> {
        check_name(type_name)?;

        let mut msg = self.request();
        msg.push(Attribute::from_string(uapi::IPSET_ATTR_TYPENAME, type_name));
        msg.push(Attribute::from_u8(uapi::IPSET_ATTR_FAMILY, family));

        let resp = self.exec(uapi::IPSET_CMD_TYPE, uapi::NLM_F_REQUEST, msg)?;
        let msg = first_reply(uapi::IPSET_CMD_TYPE, &resp)?;

        let max = find(&msg.attrs, uapi::IPSET_ATTR_REVISION)
            .ok_or_else(|| Error::Decoding("type reply without revision".into()))?
            .as_u8()?;
        let min = match find(&msg.attrs, uapi::IPSET_ATTR_REVISION_MIN) {
            Some(a) => a.as_u8()?,
            None => 0,
        };

        Ok(TypeRevisions { max, min })
    }

    fn list_sets(&mut self, name: Option<&str>) -> Result<Vec<IpSet>> {
        let mut msg = self.request();
        if let Some(name) = name {
            msg.push(Attribute::from_string(uapi::IPSET_ATTR_SETNAME, name));
        }

        let resp = self.exec(
            uapi::IPSET_CMD_LIST,
            uapi::NLM_F_REQUEST | uapi::NLM_F_DUMP,
            msg,
        )?;

        let mut out = vec![];
        for nlmsg in resp.iter() {
            out.push(IpSet::from_netlink(nlmsg)?);
        }
        Ok(out)
    }

    fn adt(&mut self, cmd: u8, name: &str, entries: &[Entry]) -> Result<()> {
        check_name(name)?;

        // The kernel reports failures by line number, so every entry gets one.
        let mut adt = Attribute::nested(uapi::IPSET_ATTR_ADT, vec![]);
        for (i, entry) in entries.iter().enumerate() {
            let mut e = entry.clone();
            if e.lineno.is_none() {
                e.lineno = Some(i as u32);
            }
            adt.push(e.to_attribute())?;
        }

        let mut msg = self.request();
        msg.push(Attribute::from_string(uapi::IPSET_ATTR_SETNAME, name));
        msg.push(adt);
        msg.push(Attribute::from_u32(uapi::IPSET_ATTR_LINENO, 0, true));

        let flags = self.exclusive(uapi::NLM_F_REQUEST | uapi::NLM_F_ACK);
        self.exec(cmd, flags, msg)?;
        Ok(())
    }

    fn named(&mut self, cmd: u8, name: Option<&str>) -> Result<()> {
        let mut msg = self.request();
        if let Some(name) = name {
            check_name(name)?;
            msg.push(Attribute::from_string(uapi::IPSET_ATTR_SETNAME, name));
        }

        self.exec(cmd, uapi::NLM_F_REQUEST | uapi::NLM_F_ACK, msg)?;
        Ok(())
    }

    fn pair(&mut self, cmd: u8, first: &str, second: &str) -> Result<()> {
        check_name(first)?;
        check_name(second)?;

        let mut msg = self.request();
        msg.push(Attribute::from_string(uapi::IPSET_ATTR_SETNAME, first));
        msg.push(Attribute::from_string(uapi::IPSET_ATTR_SETNAME2, second));

        self.exec(cmd, uapi::NLM_F_REQUEST | uapi::NLM_F_ACK, msg)?;
        Ok(())
    }

    /// Every request starts with the protocol version.
    fn request(&self) -> Message {
        let mut msg = Message::new(self.config.family);
        msg.push(Attribute::from_u8(
            uapi::IPSET_ATTR_PROTOCOL,
            uapi::IPSET_PROTOCOL,
        ));
        msg
    }

    fn exclusive(&self, flags: u16) -> u16 {
        if self.config.ignore_existing {
            flags
        } else {
            flags | uapi::NLM_F_EXCL
        }
    }

    fn exec(&mut self, cmd: u8, flags: u16, msg: Message) -> Result<Vec<NetlinkMessage>> {
        debug!(
            "ipset {}: {} attributes, flags {:#x}",
            command_name(cmd),
            msg.attrs.len(),
            flags
        );

        let req = msg.to_netlink(cmd, flags)?;
        self.query.query(req).map_err(|e| e.with_command(cmd))
    }
}

fn first_reply(cmd: u8, resp: &[NetlinkMessage]) -> Result<Message> {
    match resp.first() {
        Some(nlmsg) => Message::from_netlink(nlmsg),
        None => Err(Error::Decoding(format!(
            "no reply to {}",
            command_name(cmd)
        ))),
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() >= uapi::IPSET_MAXNAMELEN || name.contains('\0') {
        return Err(Error::Encoding(format!(
            "name {:?} must be 1 to {} bytes without NUL",
            name,
            uapi::IPSET_MAXNAMELEN - 1
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Config, Conn, Entry, EntryField, IpSet, ProtocolInfo, TypeRevisions};
    use crate::error::{Error, KernelErrorKind, Result};
    use crate::proto::{NetlinkMessage, Query};
    use crate::type_ipset::{message_type, Message};
    use crate::uapi;
    use eui48::MacAddress;
    use std::net::IpAddr;

    const PREFIX: &str = "02 00 00 00 05 00 01 00 06 00 00 00";

    fn hex(s: &str) -> Vec<u8> {
        s.split_whitespace()
            .map(|b| u8::from_str_radix(b, 16).unwrap())
            .collect()
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    /// Stub checks the one request it expects and replays canned replies.
    struct Stub {
        cmd: u8,
        flags: u16,
        request: Vec<u8>,
        replies: Vec<Vec<u8>>,
        errno: Option<i32>,
        calls: usize,
    }

    impl Stub {
        fn new(cmd: u8, flags: u16, request: &str) -> Stub {
            Stub {
                cmd,
                flags,
                request: hex(request),
                replies: vec![],
                errno: None,
                calls: 0,
            }
        }

        fn reply(mut self, data: &str) -> Stub {
            self.replies.push(hex(data));
            self
        }

        fn fail(mut self, errno: i32) -> Stub {
            self.errno = Some(errno);
            self
        }
    }

    impl Query for Stub {
        fn query(&mut self, request: NetlinkMessage) -> Result<Vec<NetlinkMessage>> {
            self.calls += 1;
            assert_eq!(request.header.typ, message_type(self.cmd));
            assert_eq!(request.header.flags, self.flags);
            assert_eq!(request.data, self.request);
            assert_eq!(request.header.len as usize, 16 + self.request.len());

            if let Some(errno) = self.errno {
                return Err(Error::from_errno(-errno));
            }

            Ok(self
                .replies
                .iter()
                .map(|d| {
                    let mut m = NetlinkMessage::new(message_type(self.cmd), 0);
                    m.add_data(d.clone());
                    m
                })
                .collect())
        }
    }

    const RA: u16 = uapi::NLM_F_REQUEST | uapi::NLM_F_ACK;

    #[test]
    fn test_protocol() {
        let mut stub = Stub::new(uapi::IPSET_CMD_PROTOCOL, uapi::NLM_F_REQUEST, PREFIX)
            .reply(PREFIX);
        let info = Conn::new(&mut stub, uapi::NFPROTO_IPV4).protocol().unwrap();
        assert_eq!(
            info,
            ProtocolInfo {
                protocol: 6,
                protocol_min: None
            }
        );
        assert_eq!(stub.calls, 1);
    }

    #[test]
    fn test_protocol_min() {
        let mut stub = Stub::new(uapi::IPSET_CMD_PROTOCOL, uapi::NLM_F_REQUEST, PREFIX)
            .reply("02 00 00 00 05 00 01 00 07 00 00 00 05 00 0a 00 06 00 00 00");
        let info = Conn::new(&mut stub, uapi::NFPROTO_IPV4).protocol().unwrap();
        assert_eq!(info.protocol, 7);
        assert_eq!(info.protocol_min, Some(6));
    }

    #[test]
    fn test_create() {
        let req = format!(
            "{} 08 00 02 00 66 6f 6f 00 0d 00 03 00 68 61 73 68 3a 6d 61 63 00 00 00 00 \
             05 00 04 00 00 00 00 00 05 00 05 00 00 00 00 00 04 00 07 80",
            PREFIX
        );
        let flags = RA | uapi::NLM_F_CREATE | uapi::NLM_F_EXCL;
        let mut stub = Stub::new(uapi::IPSET_CMD_CREATE, flags, &req);
        Conn::new(&mut stub, uapi::NFPROTO_IPV4)
            .create("foo", "hash:mac", 0, 0)
            .unwrap();
        assert_eq!(stub.calls, 1);
    }

    #[test]
    fn test_create_ignore_existing() {
        let req = format!(
            "{} 08 00 02 00 66 6f 6f 00 0d 00 03 00 68 61 73 68 3a 6d 61 63 00 00 00 00 \
             05 00 04 00 00 00 00 00 05 00 05 00 00 00 00 00 04 00 07 80",
            PREFIX
        );
        let mut stub = Stub::new(uapi::IPSET_CMD_CREATE, RA | uapi::NLM_F_CREATE, &req);
        let config = Config {
            ignore_existing: true,
            ..Default::default()
        };
        Conn::with_config(&mut stub, config)
            .create("foo", "hash:mac", 0, 0)
            .unwrap();
    }

    #[test]
    fn test_destroy_and_flush() {
        let named = format!("{} 08 00 02 00 66 6f 6f 00", PREFIX);

        let mut stub = Stub::new(uapi::IPSET_CMD_DESTROY, RA, &named);
        Conn::new(&mut stub, uapi::NFPROTO_IPV4).destroy("foo").unwrap();

        let mut stub = Stub::new(uapi::IPSET_CMD_DESTROY, RA, PREFIX);
        Conn::new(&mut stub, uapi::NFPROTO_IPV4).destroy_all().unwrap();

        let mut stub = Stub::new(uapi::IPSET_CMD_FLUSH, RA, &named);
        Conn::new(&mut stub, uapi::NFPROTO_IPV4).flush("foo").unwrap();

        let mut stub = Stub::new(uapi::IPSET_CMD_FLUSH, RA, PREFIX);
        Conn::new(&mut stub, uapi::NFPROTO_IPV4).flush_all().unwrap();
        assert_eq!(stub.calls, 1);
    }

    #[test]
    fn test_rename_and_swap() {
        let req = format!("{} 08 00 02 00 62 61 72 00 08 00 03 00 62 61 7a 00", PREFIX);

        let mut stub = Stub::new(uapi::IPSET_CMD_RENAME, RA, &req);
        Conn::new(&mut stub, uapi::NFPROTO_IPV4)
            .rename("bar", "baz")
            .unwrap();

        let mut stub = Stub::new(uapi::IPSET_CMD_SWAP, RA, &req);
        Conn::new(&mut stub, uapi::NFPROTO_IPV4)
            .swap("bar", "baz")
            .unwrap();
        assert_eq!(stub.calls, 1);
    }

    #[test]
    fn test_test() {
        let req = format!(
            "{} 08 00 02 00 62 61 7a 00 10 00 07 80 0c 00 01 80 08 00 01 40 c0 a8 01 01",
            PREFIX
        );
        let mut stub = Stub::new(uapi::IPSET_CMD_TEST, RA, &req);
        let entry = Entry::new(vec![EntryField::Ip(ip("192.168.1.1"))]).unwrap();
        Conn::new(&mut stub, uapi::NFPROTO_IPV4)
            .test("baz", &entry)
            .unwrap();
    }

    #[test]
    fn test_test_missing_member() {
        let req = format!(
            "{} 08 00 02 00 62 61 7a 00 10 00 07 80 0c 00 01 80 08 00 01 40 c0 a8 01 01",
            PREFIX
        );
        let mut stub = Stub::new(uapi::IPSET_CMD_TEST, RA, &req).fail(uapi::IPSET_ERR_EXIST);
        let entry = Entry::new(vec![EntryField::Ip(ip("192.168.1.1"))]).unwrap();
        let err = Conn::new(&mut stub, uapi::NFPROTO_IPV4)
            .test("baz", &entry)
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.kind(), Some(KernelErrorKind::ElementNotFound));
        assert_eq!(err.errno(), Some(uapi::IPSET_ERR_EXIST));
        match err {
            Error::Kernel { command, .. } => assert_eq!(command, "test"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_header() {
        let req = format!("{} 08 00 02 00 62 61 7a 00", PREFIX);
        let mut stub = Stub::new(uapi::IPSET_CMD_HEADER, uapi::NLM_F_REQUEST, &req).reply(
            "02 00 00 00 05 00 01 00 06 00 00 00 08 00 02 00 62 61 7a 00 0c 00 03 00 \
             68 61 73 68 3a 69 70 00 05 00 05 00 02 00 00 00 05 00 04 00 00 00 00 00",
        );
        let set = Conn::new(&mut stub, uapi::NFPROTO_IPV4)
            .header("baz")
            .unwrap();
        assert_eq!(set.name, "baz");
        assert_eq!(set.type_name, "hash:ip");
        assert_eq!(set.family, uapi::NFPROTO_IPV4);
        assert_eq!(set.revision, 0);
    }

    #[test]
    fn test_header_truncated_reply() {
        let req = format!("{} 08 00 02 00 62 61 7a 00", PREFIX);
        let mut stub = Stub::new(uapi::IPSET_CMD_HEADER, uapi::NLM_F_REQUEST, &req)
            .reply("02 00 00 00 05 00 01 00 06 00 00 00 08 00 02 00 62 61 7a 00 0c 00 03 00");
        let err = Conn::new(&mut stub, uapi::NFPROTO_IPV4)
            .header("baz")
            .unwrap_err();
        assert!(matches!(err, Error::Decoding(_)));
    }

    #[test]
    fn test_header_no_reply() {
        let req = format!("{} 08 00 02 00 62 61 7a 00", PREFIX);
        let mut stub = Stub::new(uapi::IPSET_CMD_HEADER, uapi::NLM_F_REQUEST, &req);
        let err = Conn::new(&mut stub, uapi::NFPROTO_IPV4)
            .header("baz")
            .unwrap_err();
        assert!(matches!(err, Error::Decoding(_)));
    }

    #[test]
    fn test_list_all() {
        let mut stub = Stub::new(
            uapi::IPSET_CMD_LIST,
            uapi::NLM_F_REQUEST | uapi::NLM_F_DUMP,
            PREFIX,
        )
        .reply(
            "02 00 00 00 05 00 01 00 06 00 00 00 08 00 02 00 62 61 61 00 0c 00 03 00 \
             68 61 73 68 3a 69 70 00 05 00 05 00 02 00 00 00 05 00 04 00 04 00 00 00 \
             2c 00 07 80 08 00 12 40 00 00 04 00 08 00 13 40 00 01 00 00 08 00 19 40 \
             00 00 00 00 08 00 1a 40 00 00 00 58 08 00 18 40 00 00 00 00 04 00 08 80",
        )
        .reply(
            "02 00 00 00 05 00 01 00 06 00 00 00 08 00 02 00 62 61 72 00 0d 00 03 00 \
             68 61 73 68 3a 6d 61 63 00 00 00 00 05 00 05 00 00 00 00 00 05 00 04 00 \
             00 00 00 00 2c 00 07 80 08 00 12 40 00 00 04 00 08 00 13 40 00 01 00 00 \
             08 00 19 40 00 00 00 00 08 00 1a 40 00 00 01 18 08 00 18 40 00 00 00 03 \
             34 00 08 80 10 00 07 80 0a 00 11 00 01 23 45 67 89 af 00 00 10 00 07 80 \
             0a 00 11 00 01 23 45 67 89 ae 00 00 10 00 07 80 0a 00 11 00 01 23 45 67 \
             89 ad 00 00",
        )
        .reply(
            "02 00 00 00 05 00 01 00 06 00 00 00 08 00 02 00 62 61 7a 00 0c 00 03 00 \
             68 61 73 68 3a 69 70 00 05 00 05 00 02 00 00 00 05 00 04 00 00 00 00 00 \
             2c 00 07 80 08 00 12 40 00 00 04 00 08 00 13 40 00 01 00 00 08 00 19 40 \
             00 00 00 00 08 00 1a 40 00 00 00 e8 08 00 18 40 00 00 00 03 34 00 08 80 \
             10 00 07 80 0c 00 01 80 08 00 01 00 c0 a8 08 03 10 00 07 80 0c 00 01 80 \
             08 00 01 00 c0 a8 08 02 10 00 07 80 0c 00 01 80 08 00 01 00 c0 a8 08 01",
        );

        let sets = Conn::new(&mut stub, uapi::NFPROTO_IPV4).list_all().unwrap();
        assert_eq!(sets.len(), 3);

        let baa = &sets[0];
        assert_eq!(baa.name, "baa");
        assert_eq!(baa.type_name, "hash:ip");
        assert_eq!(baa.revision, 4);
        assert_eq!(baa.header.hash_size, Some(1024));
        assert_eq!(baa.header.max_elem, Some(65536));
        assert_eq!(baa.header.mem_size, Some(0x58));
        assert!(baa.entries.is_empty());

        let bar = &sets[1];
        assert_eq!(bar.name, "bar");
        assert_eq!(bar.type_name, "hash:mac");
        assert_eq!(bar.family, 0);
        assert_eq!(bar.header.elements, Some(3));
        let macs: Vec<_> = bar.entries.iter().map(|e| e.mac).collect();
        assert_eq!(
            macs,
            vec![
                Some(MacAddress::new([0x01, 0x23, 0x45, 0x67, 0x89, 0xaf])),
                Some(MacAddress::new([0x01, 0x23, 0x45, 0x67, 0x89, 0xae])),
                Some(MacAddress::new([0x01, 0x23, 0x45, 0x67, 0x89, 0xad])),
            ]
        );

        let baz = &sets[2];
        assert_eq!(baz.name, "baz");
        assert_eq!(baz.header.mem_size, Some(0xe8));
        let ips: Vec<_> = baz.entries.iter().map(|e| e.ip).collect();
        assert_eq!(
            ips,
            vec![
                Some(ip("192.168.8.3")),
                Some(ip("192.168.8.2")),
                Some(ip("192.168.8.1")),
            ]
        );
    }

    #[test]
    fn test_list_continuation() {
        let req = format!("{} 08 00 02 00 62 61 7a 00", PREFIX);
        let mut stub = Stub::new(
            uapi::IPSET_CMD_LIST,
            uapi::NLM_F_REQUEST | uapi::NLM_F_DUMP,
            &req,
        )
        .reply(
            "02 00 00 00 05 00 01 00 06 00 00 00 08 00 02 00 62 61 7a 00 0c 00 03 00 \
             68 61 73 68 3a 69 70 00 05 00 05 00 02 00 00 00 05 00 04 00 04 00 00 00 \
             14 00 08 80 10 00 07 80 0c 00 01 80 08 00 01 00 c0 a8 08 01",
        )
        .reply(
            "02 00 00 00 05 00 01 00 06 00 00 00 08 00 02 00 62 61 7a 00 \
             14 00 08 80 10 00 07 80 0c 00 01 80 08 00 01 00 c0 a8 08 02",
        );

        let sets = Conn::new(&mut stub, uapi::NFPROTO_IPV4).list("baz").unwrap();
        assert_eq!(sets.len(), 2);

        assert_eq!(sets[0].name, "baz");
        assert_eq!(sets[0].type_name, "hash:ip");
        assert_eq!(sets[0].revision, 4);
        assert_eq!(sets[0].entries[0].ip, Some(ip("192.168.8.1")));

        assert_eq!(sets[1].name, "baz");
        assert_eq!(sets[1].type_name, "");
        assert_eq!(sets[1].entries.len(), 1);
        assert_eq!(sets[1].entries[0].ip, Some(ip("192.168.8.2")));
    }

    /// Capture records every request and answers with an ack.
    #[derive(Default)]
    struct Capture {
        requests: Vec<NetlinkMessage>,
    }

    impl Query for Capture {
        fn query(&mut self, request: NetlinkMessage) -> Result<Vec<NetlinkMessage>> {
            self.requests.push(request);
            Ok(vec![])
        }
    }

    #[test]
    fn test_create_decodes_back() {
        let long = "s".repeat(31);
        let cases = vec![
            ("foo", "hash:mac", 0, uapi::NFPROTO_UNSPEC),
            ("v6", "hash:net", 7, uapi::NFPROTO_IPV6),
            (long.as_str(), "bitmap:port", 3, uapi::NFPROTO_IPV4),
        ];

        for (name, type_name, revision, family) in cases {
            let mut capture = Capture::default();
            Conn::new(&mut capture, uapi::NFPROTO_IPV4)
                .create(name, type_name, revision, family)
                .unwrap();
            assert_eq!(capture.requests.len(), 1);

            let msg = Message::from_bytes(&capture.requests[0].data).unwrap();
            let set = IpSet::from_message(&msg).unwrap();
            assert_eq!(set.name, name);
            assert_eq!(set.type_name, type_name);
            assert_eq!(set.revision, revision);
            assert_eq!(set.family, family);
            assert!(set.entries.is_empty());
        }
    }

    #[test]
    fn test_list_one() {
        let req = format!("{} 08 00 02 00 62 61 61 00", PREFIX);
        let mut stub = Stub::new(
            uapi::IPSET_CMD_LIST,
            uapi::NLM_F_REQUEST | uapi::NLM_F_DUMP,
            &req,
        )
        .reply(
            "02 00 00 00 05 00 01 00 06 00 00 00 08 00 02 00 62 61 61 00 0c 00 03 00 \
             68 61 73 68 3a 69 70 00 04 00 08 80",
        );
        let sets = Conn::new(&mut stub, uapi::NFPROTO_IPV4).list("baa").unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].name, "baa");
    }

    const ADD_REQUEST: &str = "08 00 02 00 66 6f 6f 00 34 00 08 80 \
        18 00 07 80 0c 00 01 80 08 00 01 40 c0 a8 01 01 08 00 09 40 00 00 00 00 \
        18 00 07 80 0c 00 01 80 08 00 01 40 c0 a8 01 02 08 00 09 40 00 00 00 01 \
        08 00 09 40 00 00 00 00";

    fn two_ips() -> Vec<Entry> {
        vec![
            Entry::new(vec![EntryField::Ip(ip("192.168.1.1"))]).unwrap(),
            Entry::new(vec![EntryField::Ip(ip("192.168.1.2"))]).unwrap(),
        ]
    }

    #[test]
    fn test_add() {
        let req = format!("{} {}", PREFIX, ADD_REQUEST);
        let mut stub = Stub::new(uapi::IPSET_CMD_ADD, RA | uapi::NLM_F_EXCL, &req);
        Conn::new(&mut stub, uapi::NFPROTO_IPV4)
            .add("foo", &two_ips())
            .unwrap();
        assert_eq!(stub.calls, 1);
    }

    #[test]
    fn test_add_duplicate() {
        let req = format!("{} {}", PREFIX, ADD_REQUEST);
        let mut stub = Stub::new(uapi::IPSET_CMD_ADD, RA | uapi::NLM_F_EXCL, &req)
            .fail(uapi::IPSET_ERR_EXIST);
        let err = Conn::new(&mut stub, uapi::NFPROTO_IPV4)
            .add("foo", &two_ips())
            .unwrap_err();
        assert!(err.is_already_exists());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_delete() {
        let req = format!("{} {}", PREFIX, ADD_REQUEST);
        let mut stub = Stub::new(uapi::IPSET_CMD_DEL, RA, &req);
        let config = Config {
            family: uapi::NFPROTO_IPV4,
            ignore_existing: true,
        };
        Conn::with_config(&mut stub, config)
            .delete("foo", &two_ips())
            .unwrap();
    }

    #[test]
    fn test_add_keeps_explicit_lineno() {
        let req = format!(
            "{} 08 00 02 00 66 6f 6f 00 1c 00 08 80 18 00 07 80 0c 00 01 80 \
             08 00 01 40 c0 a8 01 01 08 00 09 40 00 00 00 07 08 00 09 40 00 00 00 00",
            PREFIX
        );
        let mut stub = Stub::new(uapi::IPSET_CMD_ADD, RA | uapi::NLM_F_EXCL, &req);
        let entry = Entry::new(vec![
            EntryField::Ip(ip("192.168.1.1")),
            EntryField::Lineno(7),
        ])
        .unwrap();
        Conn::new(&mut stub, uapi::NFPROTO_IPV4)
            .add("foo", &[entry])
            .unwrap();
    }

    #[test]
    fn test_destroy_missing_set() {
        let req = format!("{} 08 00 02 00 66 6f 6f 00", PREFIX);
        let mut stub = Stub::new(uapi::IPSET_CMD_DESTROY, RA, &req).fail(libc::ENOENT);
        let err = Conn::new(&mut stub, uapi::NFPROTO_IPV4)
            .destroy("foo")
            .unwrap_err();
        assert_eq!(err.kind(), Some(KernelErrorKind::SetNotFound));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_destroy_in_use() {
        let req = format!("{} 08 00 02 00 66 6f 6f 00", PREFIX);
        let mut stub =
            Stub::new(uapi::IPSET_CMD_DESTROY, RA, &req).fail(uapi::IPSET_ERR_BUSY);
        let err = Conn::new(&mut stub, uapi::NFPROTO_IPV4)
            .destroy("foo")
            .unwrap_err();
        assert_eq!(err.kind(), Some(KernelErrorKind::InUse));
    }

    #[test]
    fn test_invalid_names_never_sent() {
        let mut stub = Stub::new(uapi::IPSET_CMD_DESTROY, RA, PREFIX);
        {
            let mut conn = Conn::new(&mut stub, uapi::NFPROTO_IPV4);
            assert!(matches!(conn.destroy(""), Err(Error::Encoding(_))));
            assert!(matches!(
                conn.flush(&"a".repeat(32)),
                Err(Error::Encoding(_))
            ));
            assert!(matches!(
                conn.rename("ok", "bad\0name"),
                Err(Error::Encoding(_))
            ));
            assert!(matches!(conn.add("", &[]), Err(Error::Encoding(_))));
        }
        assert_eq!(stub.calls, 0);
    }

    #[test]
    fn test_type_revisions() {
        let req = format!(
            "{} 0c 00 03 00 68 61 73 68 3a 69 70 00 05 00 05 00 02 00 00 00",
            PREFIX
        );
        let mut stub = Stub::new(uapi::IPSET_CMD_TYPE, uapi::NLM_F_REQUEST, &req).reply(
            "02 00 00 00 05 00 01 00 06 00 00 00 0c 00 03 00 68 61 73 68 3a 69 70 00 \
             05 00 05 00 02 00 00 00 05 00 04 00 05 00 00 00 05 00 0a 00 00 00 00 00",
        );
        let revs = Conn::new(&mut stub, uapi::NFPROTO_IPV4)
            .type_revisions("hash:ip", uapi::NFPROTO_IPV4)
            .unwrap();
        assert_eq!(revs, TypeRevisions { max: 5, min: 0 });
    }

    #[test]
    fn test_request_family() {
        let req = "0a 00 00 00 05 00 01 00 06 00 00 00";
        let mut stub = Stub::new(uapi::IPSET_CMD_FLUSH, RA, req);
        let mut conn = Conn::new(&mut stub, uapi::NFPROTO_IPV6);
        assert_eq!(conn.config().family, uapi::NFPROTO_IPV6);
        conn.flush_all().unwrap();
    }
}
