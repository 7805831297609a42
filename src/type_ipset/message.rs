use super::{Attribute, NfGenMsg};
use crate::error::Result;
use crate::proto::NetlinkMessage;
use crate::uapi;
use crate::Serializable;

/// Message is the body of an ipset netlink message: the generic header
/// followed by the top-level attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: NfGenMsg,
    pub attrs: Vec<Attribute>,
}

impl Message {
    pub fn new(family: u8) -> Message {
        Message {
            header: NfGenMsg::new(family),
            attrs: vec![],
        }
    }

    pub fn push(&mut self, attr: Attribute) {
        self.attrs.push(attr);
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = self.header.to_bytes();
        for a in self.attrs.iter() {
            a.write_to(&mut out)?;
        }
        Ok(out)
    }

    pub fn from_bytes(v: &[u8]) -> Result<Message> {
        let header = NfGenMsg::from_bytes(v)?;
        let attrs = Attribute::from_bytes(&v[NfGenMsg::size()..])?;
        Ok(Message { header, attrs })
    }

    pub fn from_netlink(nlmsg: &NetlinkMessage) -> Result<Message> {
        Message::from_bytes(&nlmsg.data)
    }

    /// Wraps the message for the given ipset command.
    pub fn to_netlink(&self, cmd: u8, flags: u16) -> Result<NetlinkMessage> {
        let mut req = NetlinkMessage::new(message_type(cmd), flags);
        req.add_data(self.to_bytes()?);
        Ok(req)
    }
}

/// The netlink message type of an ipset command.
pub fn message_type(cmd: u8) -> u16 {
    (u16::from(uapi::NFNL_SUBSYS_IPSET) << 8) | u16::from(cmd)
}
