//! A client for the Linux kernel ipset subsystem, speaking its netlink
//! protocol directly.
//!
//! `hl::ipset::Conn` is the entry point: wrap a `proto::NetlinkSocket` (or
//! any other `proto::Query`) and issue commands.
pub mod error;
pub mod hl;
pub mod proto;
pub mod type_ipset;
pub mod uapi;

pub use crate::error::{Error, KernelErrorKind, Result};
pub use crate::hl::ipset::{
    CadtFlags, Config, Conn, Entry, EntryField, HeaderOptions, IpSet, ProtocolInfo, TypeRevisions,
};

pub trait Serializable {
    fn to_bytes(&self) -> Vec<u8>;
}

impl Serializable for std::vec::Vec<u8> {
    fn to_bytes(&self) -> Vec<u8> {
        self.to_owned()
    }
}

pub mod util {
    /// Rounds up to the 4-byte alignment of netlink messages and attributes.
    pub fn align(len: usize) -> usize {
        const NLA_ALIGNTO: usize = 4;

        ((len) + NLA_ALIGNTO - 1) & !(NLA_ALIGNTO - 1)
    }

}
