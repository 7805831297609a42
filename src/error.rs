//! Error types for ipset operations.

use crate::uapi;
use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from the netlink socket.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A request could not be serialized.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A reply was malformed or truncated.
    #[error("decoding error: {0}")]
    Decoding(String),

    #[error("unsupported ipset protocol version {actual}, expected {expected}")]
    ProtocolVersion { expected: u8, actual: u8 },

    /// An entry was built from conflicting or invalid fields.
    #[error("invalid entry: {0}")]
    Construction(String),

    /// The kernel rejected the request.
    #[error("{command}: {kind} ({}, errno {errno})", errno_text(.errno))]
    Kernel {
        kind: KernelErrorKind,
        errno: i32,
        command: &'static str,
    },
}

/// Classification of kernel error codes.
///
/// The errno table is kernel-version dependent; anything not recognized
/// stays `Other` and keeps its raw code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelErrorKind {
    AlreadyExists,
    SetNotFound,
    ElementNotFound,
    TypeMismatch,
    InUse,
    InvalidArgument,
    Other,
}

impl fmt::Display for KernelErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            KernelErrorKind::AlreadyExists => "already exists",
            KernelErrorKind::SetNotFound => "set not found",
            KernelErrorKind::ElementNotFound => "element not found",
            KernelErrorKind::TypeMismatch => "type mismatch",
            KernelErrorKind::InUse => "in use",
            KernelErrorKind::InvalidArgument => "invalid argument",
            KernelErrorKind::Other => "kernel error",
        };
        f.write_str(s)
    }
}

impl KernelErrorKind {
    /// Classify a positive errno returned for the given ipset command.
    pub fn classify(errno: i32, cmd: Option<u8>) -> KernelErrorKind {
        match errno {
            libc::EEXIST | uapi::IPSET_ERR_EXIST_SETNAME2 => KernelErrorKind::AlreadyExists,
            // The same code reports "already added" and "not a member".
            uapi::IPSET_ERR_EXIST => match cmd {
                Some(uapi::IPSET_CMD_TEST) | Some(uapi::IPSET_CMD_DEL) => {
                    KernelErrorKind::ElementNotFound
                }
                _ => KernelErrorKind::AlreadyExists,
            },
            libc::ENOENT => KernelErrorKind::SetNotFound,
            uapi::IPSET_ERR_TYPE_MISMATCH => KernelErrorKind::TypeMismatch,
            libc::EBUSY | uapi::IPSET_ERR_BUSY | uapi::IPSET_ERR_REFERENCED => {
                KernelErrorKind::InUse
            }
            libc::EINVAL
            | uapi::IPSET_ERR_FIND_TYPE
            | uapi::IPSET_ERR_INVALID_CIDR
            | uapi::IPSET_ERR_INVALID_NETMASK
            | uapi::IPSET_ERR_INVALID_FAMILY
            | uapi::IPSET_ERR_TIMEOUT
            | uapi::IPSET_ERR_IPADDR_IPV4
            | uapi::IPSET_ERR_IPADDR_IPV6
            | uapi::IPSET_ERR_COUNTER
            | uapi::IPSET_ERR_COMMENT
            | uapi::IPSET_ERR_INVALID_MARKMASK
            | uapi::IPSET_ERR_SKBINFO => KernelErrorKind::InvalidArgument,
            _ => KernelErrorKind::Other,
        }
    }
}

/// Human-readable text for an errno, including the ipset-private range.
pub fn describe(errno: i32) -> String {
    let s = match errno {
        uapi::IPSET_ERR_PROTOCOL => "kernel and userspace protocol versions differ",
        uapi::IPSET_ERR_FIND_TYPE => "set type is not supported",
        uapi::IPSET_ERR_MAX_SETS => "maximal number of sets reached",
        uapi::IPSET_ERR_BUSY => "set is in use by a kernel component",
        uapi::IPSET_ERR_EXIST_SETNAME2 => "second set name already exists",
        uapi::IPSET_ERR_TYPE_MISMATCH => "sets have different types",
        uapi::IPSET_ERR_EXIST => "element is already added or missing",
        uapi::IPSET_ERR_INVALID_CIDR => "invalid CIDR value",
        uapi::IPSET_ERR_INVALID_NETMASK => "invalid netmask",
        uapi::IPSET_ERR_INVALID_FAMILY => "invalid family",
        uapi::IPSET_ERR_TIMEOUT => "timeout is not supported by the set",
        uapi::IPSET_ERR_REFERENCED => "set is referenced by another set",
        uapi::IPSET_ERR_IPADDR_IPV4 => "invalid IPv4 address",
        uapi::IPSET_ERR_IPADDR_IPV6 => "invalid IPv6 address",
        uapi::IPSET_ERR_COUNTER => "counters are not supported by the set",
        uapi::IPSET_ERR_COMMENT => "comments are not supported by the set",
        uapi::IPSET_ERR_INVALID_MARKMASK => "invalid markmask",
        uapi::IPSET_ERR_SKBINFO => "skbinfo is not supported by the set",
        e if e >= uapi::IPSET_ERR_TYPE_SPECIFIC => "set type specific error",
        e if e >= uapi::IPSET_ERR_PRIVATE => "unknown ipset error",
        e => return io::Error::from_raw_os_error(e).to_string(),
    };
    s.to_owned()
}

fn errno_text(errno: &i32) -> String {
    describe(*errno)
}

impl Error {
    /// Builds a kernel error from the (negative) code of an NLMSG_ERROR reply.
    pub fn from_errno(errno: i32) -> Self {
        let errno = errno.checked_abs().unwrap_or(i32::MAX);
        Error::Kernel {
            kind: KernelErrorKind::classify(errno, None),
            errno,
            command: "netlink",
        }
    }

    /// Re-classifies a kernel error with the command that triggered it.
    /// Other errors are returned unchanged.
    pub fn with_command(self, cmd: u8) -> Self {
        match self {
            Error::Kernel { errno, .. } => Error::Kernel {
                kind: KernelErrorKind::classify(errno, Some(cmd)),
                errno,
                command: command_name(cmd),
            },
            other => other,
        }
    }

    pub fn kind(&self) -> Option<KernelErrorKind> {
        match self {
            Error::Kernel { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn errno(&self) -> Option<i32> {
        match self {
            Error::Kernel { errno, .. } => Some(*errno),
            _ => None,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        self.kind() == Some(KernelErrorKind::AlreadyExists)
    }

    /// True for both a missing set and a missing element.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.kind(),
            Some(KernelErrorKind::SetNotFound) | Some(KernelErrorKind::ElementNotFound)
        )
    }
}

pub(crate) fn command_name(cmd: u8) -> &'static str {
    match cmd {
        uapi::IPSET_CMD_PROTOCOL => "protocol",
        uapi::IPSET_CMD_CREATE => "create",
        uapi::IPSET_CMD_DESTROY => "destroy",
        uapi::IPSET_CMD_FLUSH => "flush",
        uapi::IPSET_CMD_RENAME => "rename",
        uapi::IPSET_CMD_SWAP => "swap",
        uapi::IPSET_CMD_LIST => "list",
        uapi::IPSET_CMD_SAVE => "save",
        uapi::IPSET_CMD_ADD => "add",
        uapi::IPSET_CMD_DEL => "del",
        uapi::IPSET_CMD_TEST => "test",
        uapi::IPSET_CMD_HEADER => "header",
        uapi::IPSET_CMD_TYPE => "type",
        _ => "unknown command",
    }
}
