use crate::error::{Error, Result};
use crate::Serializable;
use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// The preamble packet sent with every netlink transaction
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct NetlinkHeader {
    pub len: u32,
    pub typ: u16,
    pub flags: u16,
    pub seq: u32,
    pub pid: u32,
}

impl NetlinkHeader {
    pub fn from_bytes(v: &[u8]) -> Result<NetlinkHeader> {
        if v.len() < NetlinkHeader::size() {
            return Err(Error::Decoding("message too short".into()));
        }

        let mut rdr = Cursor::new(v);
        Ok(NetlinkHeader {
            len: rdr.read_u32::<NativeEndian>()?,
            typ: rdr.read_u16::<NativeEndian>()?,
            flags: rdr.read_u16::<NativeEndian>()?,
            seq: rdr.read_u32::<NativeEndian>()?,
            pid: rdr.read_u32::<NativeEndian>()?,
        })
    }

    pub fn size() -> usize {
        0x10
    }
}

impl Serializable for NetlinkHeader {
    fn to_bytes(&self) -> Vec<u8> {
        // We will append the rest of the message to this vector, so we might
        // as well allocate the whole thing now
        let mut out: Vec<u8> =
            Vec::with_capacity((self.len as usize).max(NetlinkHeader::size()));
        // writes into a Vec cannot fail
        let _ = out.write_u32::<NativeEndian>(self.len);
        let _ = out.write_u16::<NativeEndian>(self.typ);
        let _ = out.write_u16::<NativeEndian>(self.flags);
        let _ = out.write_u32::<NativeEndian>(self.seq);
        let _ = out.write_u32::<NativeEndian>(self.pid);
        out
    }
}

/// NetlinkMessage is a single netlink message sent or received over the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetlinkMessage {
    pub header: NetlinkHeader,
    pub data: Vec<u8>, // the remaining data
}

impl NetlinkMessage {
    pub fn new(typ: u16, flags: u16) -> NetlinkMessage {
        NetlinkMessage {
            header: NetlinkHeader {
                len: NetlinkHeader::size() as u32,
                typ,
                flags,
                seq: 0, // set when sending
                pid: 0, // set by kernel
            },
            data: vec![],
        }
    }

    pub fn from_bytes(v: &[u8]) -> Result<Vec<NetlinkMessage>> {
        let mut idx = 0;
        let mut res = Vec::new();
        let len = v.len();

        while idx < len {
            let msg = NetlinkMessage::one_from_bytes(v, idx)?;
            idx += msg.header.len as usize;
            idx = crate::util::align(idx);
            res.push(msg);
        }

        Ok(res)
    }

    pub fn one_from_bytes(v: &[u8], idx: usize) -> Result<NetlinkMessage> {
        if v.len() < (idx + NetlinkHeader::size()) {
            return Err(Error::Decoding("message too short for header".into()));
        }

        // read the header pointing at idx
        let header = NetlinkHeader::from_bytes(&v[idx..idx + NetlinkHeader::size()])?;
        let header_len = header.len as usize;
        if header_len < NetlinkHeader::size() {
            return Err(Error::Decoding(format!(
                "netlink message length {} below header size",
                header_len
            )));
        }
        if v.len() < (idx + header_len) {
            return Err(Error::Decoding("buffer too short for message".into()));
        }

        // the leftover data is [idx + header .. idx +  len]
        Ok(NetlinkMessage {
            header,
            data: v[idx + NetlinkHeader::size()..idx + header_len].to_owned(),
        })
    }

    /// Adds some raw data to the netlink message, and updates length.
    /// This adds any necessary padding after the appended data to ensure
    /// it matches the netlink alignment rules.
    pub fn add_data(&mut self, mut d: Vec<u8>) {
        let l = d.len();
        let aligned_len = crate::util::align(l);

        // Netlink messages are always aligned; pad with zeroes.
        self.data.append(&mut d);
        self.data.resize(self.data.len() + aligned_len - l, 0);
        self.header.len += aligned_len as u32;
    }
}

impl Serializable for NetlinkMessage {
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.header.to_bytes();
        out.extend(self.data.iter());
        out
    }
}
