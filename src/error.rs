use std::net::Ipv4Addr;

use tracing::{error, warn};

#[derive(Debug)]
pub enum Error {
    // Dropped events; all logged at debug/warn and otherwise swallowed.
    InvalidGroup(Ipv4Addr),
    InterfaceIndexOutOfRange(u32),
    UnresolvedSource(Ipv4Addr),
    WrongInterfaceDirection(u32),
    SelfOrigin(Ipv4Addr),
    // Recoverable collaborator failures.
    KernelInstallFailure(Ipv4Addr, IoError),
    // Fatal.
    UpstreamInterfaceMissing,
}

#[derive(Debug)]
pub enum IoError {
    KernelAddRoute(std::io::Error),
    KernelDelRoute(std::io::Error),
    SocketJoin(std::io::Error),
    SocketLeave(std::io::Error),
    PacketSend(std::io::Error),
}

// ===== impl Error =====

impl Error {
    pub(crate) fn log(&self) {
        match self {
            Error::InvalidGroup(group) => {
                warn!(%group, "{}", self);
            }
            Error::InterfaceIndexOutOfRange(ifindex) => {
                warn!(%ifindex, "{}", self);
            }
            Error::UnresolvedSource(src) => {
                warn!(%src, "{}", self);
            }
            Error::WrongInterfaceDirection(ifindex) => {
                warn!(%ifindex, "{}", self);
            }
            Error::SelfOrigin(src) => {
                warn!(%src, "{}", self);
            }
            Error::KernelInstallFailure(group, error) => {
                warn!(%group, error = %with_source(error), "{}", self);
            }
            Error::UpstreamInterfaceMissing => {
                error!("{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidGroup(group) => {
                write!(f, "invalid multicast group {group}")
            }
            Error::InterfaceIndexOutOfRange(ifindex) => {
                write!(f, "interface index {ifindex} out of range")
            }
            Error::UnresolvedSource(src) => {
                write!(f, "source address {src} does not map to a known interface")
            }
            Error::WrongInterfaceDirection(ifindex) => {
                write!(f, "interface {ifindex} is not a downstream interface")
            }
            Error::SelfOrigin(src) => {
                write!(f, "report originated from local address {src}")
            }
            Error::KernelInstallFailure(group, _) => {
                write!(f, "failed to install kernel forwarding entry for {group}")
            }
            Error::UpstreamInterfaceMissing => {
                write!(f, "no upstream interface is configured")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::KernelInstallFailure(_, error) => Some(error),
            _ => None,
        }
    }
}

// ===== impl IoError =====

impl IoError {
    pub(crate) fn log(&self) {
        warn!(error = %with_source(self), "{}", self);
    }
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoError::KernelAddRoute(..) => {
                write!(f, "failed to add kernel forwarding entry")
            }
            IoError::KernelDelRoute(..) => {
                write!(f, "failed to delete kernel forwarding entry")
            }
            IoError::SocketJoin(..) => {
                write!(f, "failed to join multicast group on socket")
            }
            IoError::SocketLeave(..) => {
                write!(f, "failed to leave multicast group on socket")
            }
            IoError::PacketSend(..) => {
                write!(f, "failed to send IGMP packet")
            }
        }
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IoError::KernelAddRoute(error)
            | IoError::KernelDelRoute(error)
            | IoError::SocketJoin(error)
            | IoError::SocketLeave(error)
            | IoError::PacketSend(error) => Some(error),
        }
    }
}

// ===== global functions =====

fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
