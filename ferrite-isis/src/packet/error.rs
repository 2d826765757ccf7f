//
// Copyright (c) The Ferrite Routing Contributors
//
// SPDX-License-Identifier: MIT
//

use bytes::TryGetError;
use serde::{Deserialize, Serialize};

// Type aliases.
pub type DecodeResult<T> = Result<T, DecodeError>;
pub type TlvDecodeResult<T> = Result<T, TlvDecodeError>;

// IS-IS PDU decoding errors.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum DecodeError {
    IncompletePdu,
    InvalidIrdpDiscriminator(u8),
    InvalidVersion(u8),
    InvalidIdLength(u8),
    UnknownPduType(u8),
    InvalidHeaderLength(u8),
    InvalidHelloCircuitType(u8),
    InvalidHelloHoldtime(u16),
    InvalidPduLength(u16),
    InvalidTlvLength(u8),
    TlvError(TlvDecodeError),
}

// IS-IS TLV decoding errors.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum TlvDecodeError {
    ReadOutOfBounds,
    InvalidLength(u8),
    InvalidAreaAddrLen(u8),
    InvalidThreeWayAdjState(u8),
    AuthUnsupportedType(u8),
    InvalidPrefixLength(u8),
}

// ===== impl DecodeError =====

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::IncompletePdu => {
                write!(f, "incomplete PDU")
            }
            DecodeError::InvalidIrdpDiscriminator(discriminator) => {
                write!(f, "invalid IRDP discriminator: {discriminator}")
            }
            DecodeError::InvalidVersion(version) => {
                write!(f, "invalid version: {version}")
            }
            DecodeError::InvalidIdLength(id_len) => {
                write!(f, "invalid ID length: {id_len}")
            }
            DecodeError::UnknownPduType(pdu_type) => {
                write!(f, "unknown PDU type: {pdu_type}")
            }
            DecodeError::InvalidHeaderLength(hdr_len) => {
                write!(f, "invalid header length: {hdr_len}")
            }
            DecodeError::InvalidHelloCircuitType(circuit_type) => {
                write!(f, "invalid hello circuit type: {circuit_type}")
            }
            DecodeError::InvalidHelloHoldtime(holdtime) => {
                write!(f, "invalid hello holdtime: {holdtime}")
            }
            DecodeError::InvalidPduLength(pdu_len) => {
                write!(f, "invalid PDU length: {pdu_len}")
            }
            DecodeError::InvalidTlvLength(tlv_len) => {
                write!(f, "invalid TLV length: {tlv_len}")
            }
            DecodeError::TlvError(error) => error.fmt(f),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::TlvError(error) => Some(error),
            _ => None,
        }
    }
}

impl From<TryGetError> for DecodeError {
    fn from(_error: TryGetError) -> DecodeError {
        DecodeError::IncompletePdu
    }
}

impl From<TlvDecodeError> for DecodeError {
    fn from(error: TlvDecodeError) -> DecodeError {
        DecodeError::TlvError(error)
    }
}

// ===== impl TlvDecodeError =====

impl std::fmt::Display for TlvDecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlvDecodeError::ReadOutOfBounds => {
                write!(f, "attempt to read out of bounds")
            }
            TlvDecodeError::InvalidLength(tlv_len) => {
                write!(f, "invalid TLV length: {tlv_len}")
            }
            TlvDecodeError::InvalidAreaAddrLen(addr_len) => {
                write!(f, "invalid area address length: {addr_len}")
            }
            TlvDecodeError::InvalidThreeWayAdjState(state) => {
                write!(f, "invalid three-way adjacency state: {state}")
            }
            TlvDecodeError::AuthUnsupportedType(auth_type) => {
                write!(f, "unsupported authentication type: {auth_type}")
            }
            TlvDecodeError::InvalidPrefixLength(plen) => {
                write!(f, "invalid prefix length: {plen}")
            }
        }
    }
}

impl std::error::Error for TlvDecodeError {}

impl From<TryGetError> for TlvDecodeError {
    fn from(_error: TryGetError) -> TlvDecodeError {
        TlvDecodeError::ReadOutOfBounds
    }
}
