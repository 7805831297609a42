use super::{NetlinkHeader, NetlinkMessage};
use crate::error::{Error, Result};
use crate::uapi;
use crate::Serializable;
use byteorder::{NativeEndian, ReadBytesExt};
use log::{trace, warn};
use std::io::{self, Cursor};
use std::mem;
use std::os::unix::io::RawFd;

const RECEIVE_BUFFER_SIZE: usize = 65536;

/// Query submits one request and collects every reply message belonging to it.
///
/// Acks, NLMSG_DONE and error frames are consumed by the implementation; a
/// kernel error is returned as `Error::Kernel`.
pub trait Query {
    fn query(&mut self, request: NetlinkMessage) -> Result<Vec<NetlinkMessage>>;
}

impl<Q: Query + ?Sized> Query for &mut Q {
    fn query(&mut self, request: NetlinkMessage) -> Result<Vec<NetlinkMessage>> {
        (**self).query(request)
    }
}

#[derive(Debug)]
pub struct NetlinkSocket {
    proto: i32,
    next_seq: u32,
    fd: RawFd,
}

impl NetlinkSocket {
    pub fn new(proto: i32) -> Result<NetlinkSocket> {
        let mut s = NetlinkSocket {
            next_seq: 1,
            proto,
            fd: -1,
        };

        s.bind()?;
        Ok(s)
    }

    /// Opens a socket on the netfilter netlink family, which carries ipset.
    pub fn netfilter() -> Result<NetlinkSocket> {
        NetlinkSocket::new(uapi::NETLINK_NETFILTER)
    }

    fn sockaddr(&self) -> libc::sockaddr_nl {
        let mut saddr: libc::sockaddr_nl = unsafe { mem::zeroed() };
        saddr.nl_family = libc::AF_NETLINK as libc::sa_family_t;

        saddr
    }

    /// The so-called port id, assigned by the kernel when the socket is opened.
    /// Has nothing to do with the process id.
    fn pid(&self) -> Result<u32> {
        if self.fd < 0 {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "not connected").into());
        }

        let mut saddr = self.sockaddr();
        let mut slen = mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t;
        let res = unsafe {
            libc::getsockname(
                self.fd,
                &mut saddr as *mut libc::sockaddr_nl as *mut libc::sockaddr,
                &mut slen,
            )
        };

        if res < 0 {
            return Err(io::Error::last_os_error().into());
        }

        Ok(saddr.nl_pid)
    }

    fn bind(&mut self) -> Result<()> {
        let sock = unsafe {
            libc::socket(
                libc::AF_NETLINK,
                libc::SOCK_DGRAM | libc::SOCK_CLOEXEC,
                self.proto,
            )
        };

        if sock < 0 {
            return Err(io::Error::last_os_error().into());
        }
        self.fd = sock;

        let saddr = self.sockaddr();
        let res = unsafe {
            libc::bind(
                self.fd,
                &saddr as *const libc::sockaddr_nl as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
            )
        };
        if res < 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(())
    }

    fn send(&mut self, buf: &[u8]) -> Result<()> {
        let saddr = self.sockaddr();
        let res = unsafe {
            libc::sendto(
                self.fd,
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
                0, // flags
                &saddr as *const libc::sockaddr_nl as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
            )
        };

        if res < 0 {
            return Err(io::Error::last_os_error().into());
        }
        trace!("sent {} bytes", res);
        Ok(())
    }

    fn recv(&mut self) -> Result<Vec<NetlinkMessage>> {
        if self.fd < 0 {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "not connected").into());
        }

        // TODO: peek with MSG_TRUNC instead of a fixed buffer for very large dumps
        let mut buf: Vec<u8> = vec![0; RECEIVE_BUFFER_SIZE];

        let res = unsafe {
            libc::recv(
                self.fd,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0, //flags
            )
        };
        if res < 0 {
            return Err(io::Error::last_os_error().into());
        }
        let res = res as usize;
        trace!("received {} bytes", res);

        if res < NetlinkHeader::size() {
            return Err(Error::Decoding("netlink message too short".into()));
        }
        buf.truncate(res);

        NetlinkMessage::from_bytes(&buf)
    }

    /// Sends the request and reads replies until the transaction is complete.
    ///
    /// Only messages whose type matches the request are returned.
    pub fn exec(&mut self, request: &mut NetlinkMessage) -> Result<Vec<NetlinkMessage>> {
        request.header.seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        self.send(&request.to_bytes())?;

        let pid = self.pid()?;
        let wants_ack = request.header.flags & uapi::NLM_F_ACK != 0;

        let mut out: Vec<NetlinkMessage> = vec![];
        loop {
            for resp in self.recv()? {
                if resp.header.seq != request.header.seq {
                    // We don't currently support shared sockets
                    return Err(Error::Decoding(format!(
                        "sequence mismatch: expected {}, got {}",
                        request.header.seq, resp.header.seq
                    )));
                }

                if resp.header.pid != pid {
                    return Err(Error::Decoding(format!(
                        "reply for port id {}, ours is {}",
                        resp.header.pid, pid
                    )));
                }

                // The errno is the first 4 bytes; zero is an ack.
                if resp.header.typ == uapi::NLMSG_ERROR {
                    if resp.data.len() < 4 {
                        return Err(Error::Decoding("error message too short".into()));
                    }
                    let errno = Cursor::new(&resp.data).read_i32::<NativeEndian>()?;
                    if errno == 0 {
                        return Ok(out);
                    }
                    return Err(Error::from_errno(errno));
                }

                if resp.header.typ == uapi::NLMSG_DONE {
                    return Ok(out);
                }

                if resp.header.typ != request.header.typ {
                    warn!("ignoring netlink message of type {:#x}", resp.header.typ);
                    continue;
                }

                let respflags = resp.header.flags;
                out.push(resp);

                // Without a multipart reply or a pending ack, we're done.
                if respflags & uapi::NLM_F_MULTI == 0 && !wants_ack {
                    return Ok(out);
                }
            }
        }
    }
}

impl Query for NetlinkSocket {
    fn query(&mut self, mut request: NetlinkMessage) -> Result<Vec<NetlinkMessage>> {
        self.exec(&mut request)
    }
}

impl Drop for NetlinkSocket {
    fn drop(&mut self) {
        if self.fd >= 0 {
            unsafe { libc::close(self.fd) };
            self.fd = -1;
        }
    }
}
