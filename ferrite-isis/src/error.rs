//
// Copyright (c) The Ferrite Routing Contributors
//
// SPDX-License-Identifier: MIT
//

use ferrite_utils::mac_addr::MacAddr;
use tracing::{error, warn, warn_span};

use crate::collections::{AdjacencyId, InterfaceId, LspEntryId};
use crate::network::MulticastAddr;
use crate::packet::error::DecodeError;

// IS-IS errors.
#[derive(Debug)]
pub enum Error {
    // I/O errors
    IoError(IoError),
    // Inter-task communication
    InterfaceIdNotFound(InterfaceId),
    AdjacencyIdNotFound(AdjacencyId),
    LspEntryIdNotFound(LspEntryId),
    // Packet input
    PduInputError(String, MacAddr, PduInputError),
    // Other
    CircuitIdAllocationFailed,
    InterfaceStartError(String, Box<Error>),
}

// IS-IS PDU input errors.
#[derive(Debug)]
pub enum PduInputError {
    DecodeError(DecodeError),
    AdjacencyReject(AdjacencyRejectError),
}

// IS-IS I/O errors.
#[derive(Debug)]
pub enum IoError {
    SocketError(std::io::Error),
    MulticastJoinError(MulticastAddr, std::io::Error),
    MulticastLeaveError(MulticastAddr, std::io::Error),
    RecvError(std::io::Error),
    RecvMissingSourceAddr,
    SendError(std::io::Error),
}

// Protocol violations that prevent an adjacency from being formed or
// refreshed. These drive a defined state transition and are never fatal.
#[derive(Debug)]
pub enum AdjacencyRejectError {
    InvalidHelloType,
    CircuitTypeMismatch,
    MaxAreaAddrsMismatch(u8),
    AreaMismatch,
    WrongSystem,
    DuplicateSystemId,
    MissingProtocolsSupported,
    NeighborMismatch,
}

// ===== impl Error =====

impl Error {
    pub(crate) fn log(&self) {
        match self {
            Error::IoError(error) => {
                error.log();
            }
            Error::InterfaceIdNotFound(iface_id) => {
                warn!(?iface_id, "{}", self);
            }
            Error::AdjacencyIdNotFound(adj_id) => {
                warn!(?adj_id, "{}", self);
            }
            Error::LspEntryIdNotFound(lse_id) => {
                warn!(?lse_id, "{}", self);
            }
            Error::PduInputError(ifname, source, error) => {
                warn_span!("interface", name = %ifname, %source).in_scope(
                    || {
                        warn!(error = %with_source(error), "{}", self);
                    },
                )
            }
            Error::CircuitIdAllocationFailed => {
                warn!("{}", self);
            }
            Error::InterfaceStartError(name, error) => {
                error!(%name, error = %with_source(error), "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(error) => error.fmt(f),
            Error::InterfaceIdNotFound(..) => {
                write!(f, "interface ID not found")
            }
            Error::AdjacencyIdNotFound(..) => {
                write!(f, "adjacency ID not found")
            }
            Error::LspEntryIdNotFound(..) => {
                write!(f, "LSP entry ID not found")
            }
            Error::PduInputError(..) => {
                write!(f, "failed to process received packet")
            }
            Error::CircuitIdAllocationFailed => {
                write!(f, "failed to allocate Circuit ID")
            }
            Error::InterfaceStartError(..) => {
                write!(f, "failed to start interface")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(error) => Some(error),
            Error::PduInputError(_, _, error) => Some(error),
            Error::InterfaceStartError(_, error) => Some(error),
            _ => None,
        }
    }
}

impl From<IoError> for Error {
    fn from(error: IoError) -> Error {
        Error::IoError(error)
    }
}

// ===== impl PduInputError =====

impl std::fmt::Display for PduInputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PduInputError::DecodeError(error) => error.fmt(f),
            PduInputError::AdjacencyReject(error) => error.fmt(f),
        }
    }
}

impl std::error::Error for PduInputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PduInputError::DecodeError(error) => Some(error),
            PduInputError::AdjacencyReject(error) => Some(error),
        }
    }
}

impl From<DecodeError> for PduInputError {
    fn from(error: DecodeError) -> PduInputError {
        PduInputError::DecodeError(error)
    }
}

impl From<AdjacencyRejectError> for PduInputError {
    fn from(error: AdjacencyRejectError) -> PduInputError {
        PduInputError::AdjacencyReject(error)
    }
}

// ===== impl IoError =====

impl IoError {
    pub(crate) fn log(&self) {
        match self {
            IoError::SocketError(error) => {
                warn!(error = %with_source(error), "{}", self);
            }
            IoError::MulticastJoinError(addr, error)
            | IoError::MulticastLeaveError(addr, error) => {
                warn!(?addr, error = %with_source(error), "{}", self);
            }
            IoError::RecvError(error) | IoError::SendError(error) => {
                warn!(error = %with_source(error), "{}", self);
            }
            IoError::RecvMissingSourceAddr => {
                warn!("{}", self);
            }
        }
    }
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoError::SocketError(..) => {
                write!(f, "failed to create raw socket")
            }
            IoError::MulticastJoinError(..) => {
                write!(f, "failed to join multicast group")
            }
            IoError::MulticastLeaveError(..) => {
                write!(f, "failed to leave multicast group")
            }
            IoError::RecvError(..) => {
                write!(f, "failed to receive packet")
            }
            IoError::RecvMissingSourceAddr => {
                write!(
                    f,
                    "failed to retrieve source address from received packet"
                )
            }
            IoError::SendError(..) => {
                write!(f, "failed to send packet")
            }
        }
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IoError::SocketError(error)
            | IoError::MulticastJoinError(_, error)
            | IoError::MulticastLeaveError(_, error)
            | IoError::RecvError(error)
            | IoError::SendError(error) => Some(error),
            _ => None,
        }
    }
}

// ===== impl AdjacencyRejectError =====

impl std::fmt::Display for AdjacencyRejectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdjacencyRejectError::InvalidHelloType => {
                write!(f, "invalid hello type")
            }
            AdjacencyRejectError::CircuitTypeMismatch => {
                write!(f, "level mismatch")
            }
            AdjacencyRejectError::MaxAreaAddrsMismatch(..) => {
                write!(f, "maximumAreaAddresses mismatch")
            }
            AdjacencyRejectError::AreaMismatch => {
                write!(f, "area mismatch")
            }
            AdjacencyRejectError::WrongSystem => {
                write!(f, "wrong system")
            }
            AdjacencyRejectError::DuplicateSystemId => {
                write!(f, "duplicate System-ID")
            }
            AdjacencyRejectError::MissingProtocolsSupported => {
                write!(f, "missing Protocols Supported TLV")
            }
            AdjacencyRejectError::NeighborMismatch => {
                write!(f, "three-way handshake neighbor mismatch")
            }
        }
    }
}

impl std::error::Error for AdjacencyRejectError {}

// ===== helper functions =====

fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
