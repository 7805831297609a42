use crate::error::{Error, Result};
use crate::uapi;
use byteorder::{BigEndian, ByteOrder};

/// The generic netfilter header preceding every ipset attribute list.
#[derive(Debug, Eq, PartialEq, Clone, Default)]
pub struct NfGenMsg {
    pub family: u8,
    pub version: u8,
    /// Always zero for ipset; big-endian on the wire.
    pub res_id: u16,
}

impl NfGenMsg {
    pub fn new(family: u8) -> NfGenMsg {
        NfGenMsg {
            family,
            version: uapi::NFNETLINK_V0,
            res_id: 0,
        }
    }

    pub fn from_bytes(v: &[u8]) -> Result<NfGenMsg> {
        if v.len() < NfGenMsg::size() {
            return Err(Error::Decoding("buffer too short for nfgenmsg".into()));
        }

        Ok(NfGenMsg {
            family: v[0],
            version: v[1],
            res_id: BigEndian::read_u16(&v[2..4]),
        })
    }

    pub fn size() -> usize {
        0x4
    }
}

impl crate::Serializable for NfGenMsg {
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![self.family, self.version, 0, 0];
        BigEndian::write_u16(&mut out[2..4], self.res_id);
        out
    }
}
