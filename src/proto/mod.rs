/*
 * Implementation of the netlink protocol.
 */
/// proto implements the netlink framing, the socket and the Query seam
/// used by the ipset command layer.
pub use self::conn::{NetlinkSocket, Query};
pub use self::packet::{NetlinkHeader, NetlinkMessage};

pub mod conn;
mod packet;
