//! Wire types of the ipset netlink subsystem.
mod attr;
mod message;
mod nfgenmsg;

pub use self::attr::{find, Attribute, Payload};
pub use self::message::{message_type, Message};
pub use self::nfgenmsg::NfGenMsg;
