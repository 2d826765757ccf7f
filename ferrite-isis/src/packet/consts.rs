//
// Copyright (c) The Ferrite Routing Contributors
//
// SPDX-License-Identifier: MIT
//

use bitflags::bitflags;
use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

pub const IDRP_DISCRIMINATOR: u8 = 0x83;
pub const VERSION_PROTO_EXT: u8 = 1;
pub const VERSION: u8 = 1;
pub const SYSTEM_ID_LEN: u8 = 6;

// IS-IS PDU types.
//
// IANA registry:
// https://www.iana.org/assignments/isis-pdu/isis-pdu.xhtml#pdu
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[derive(FromPrimitive, ToPrimitive)]
#[derive(Deserialize, Serialize)]
pub enum PduType {
    HelloLanL1 = 15,
    HelloLanL2 = 16,
    HelloP2P = 17,
    LspL1 = 18,
    LspL2 = 20,
    CsnpL1 = 24,
    CsnpL2 = 25,
    PsnpL1 = 26,
    PsnpL2 = 27,
}

// IS-IS top-level TLV types.
//
// IANA registry:
// https://www.iana.org/assignments/isis-tlv-codepoints/isis-tlv-codepoints.xhtml#tlv-codepoints
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[derive(FromPrimitive, ToPrimitive)]
#[derive(Deserialize, Serialize)]
pub enum TlvType {
    AreaAddresses = 1,
    IsReach = 2,
    Neighbors = 6,
    Padding = 8,
    LspEntries = 9,
    Authentication = 10,
    LspBufferSize = 14,
    ExtIsReach = 22,
    Ipv4InternalReach = 128,
    ProtocolsSupported = 129,
    Ipv4ExternalReach = 130,
    Ipv4Addresses = 132,
    Ipv4RouterId = 134,
    ExtIpv4Reach = 135,
    DynamicHostname = 137,
    Ipv6RouterId = 140,
    Ipv6Addresses = 232,
    Ipv6Reach = 236,
    ThreeWayAdj = 240,
}

// IS-IS Authentication Type Codes.
//
// IANA registry:
// https://www.iana.org/assignments/isis-tlv-codepoints/isis-tlv-codepoints.xhtml#isis-tlv-codepoints-10
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[derive(FromPrimitive, ToPrimitive)]
#[derive(Deserialize, Serialize)]
pub enum AuthenticationType {
    ClearText = 1,
    Cryptographic = 3,
    HmacMd5 = 54,
}

// Network Layer Protocol Identifiers (NLPIDs).
//
// IANA Registry:
// https://www.iana.org/assignments/nlpids/nlpids.xhtml
pub enum Nlpid {
    Ipv4 = 0xCC,
    Ipv6 = 0x8E,
}

bitflags! {
    // LSP flags field.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct LspFlags: u8 {
        const IS_TYPE1 = 0x01;
        const IS_TYPE2 = 0x02;
        const OL = 0x04;
        const ATT = 0x08;
        const P = 0x80;
    }
}

// Decodes the ID Length field of the PDU common header.
//
// The on-wire field uses a sentinel encoding where zero means the default
// 6-octet System ID length and 255 means a null System ID.
pub const fn id_len_decode(raw: u8) -> u8 {
    match raw {
        0 => SYSTEM_ID_LEN,
        255 => 0,
        _ => raw,
    }
}

// Encodes the ID Length field of the PDU common header.
//
// Inverse of `id_len_decode`.
pub const fn id_len_encode(id_len: u8) -> u8 {
    match id_len {
        SYSTEM_ID_LEN => 0,
        0 => 255,
        _ => id_len,
    }
}
