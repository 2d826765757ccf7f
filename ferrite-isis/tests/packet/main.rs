//
// Copyright (c) The Ferrite Routing Contributors
//
// SPDX-License-Identifier: MIT
//

mod hello;
mod lsp;
mod snp;

use bytes::Bytes;
use ferrite_isis::packet::consts::{id_len_decode, id_len_encode};
use ferrite_isis::packet::error::DecodeError;
use ferrite_isis::packet::pdu::Pdu;

//
// Helper functions.
//

fn test_encode_pdu(bytes_expected: &[u8], pdu: &Pdu) {
    let bytes_actual = pdu.encode();
    assert_eq!(bytes_expected, bytes_actual.as_ref());
}

fn test_decode_pdu(bytes: &[u8], pdu_expected: &Pdu) {
    let bytes = Bytes::copy_from_slice(bytes);
    let mut pdu_actual = Pdu::decode(bytes.clone()).unwrap();
    match &mut pdu_actual {
        // The raw image is carried for byte-exact re-encoding and isn't part
        // of the logical PDU contents.
        Pdu::Hello(pdu) => pdu.raw = Default::default(),
        Pdu::Lsp(pdu) => pdu.raw = bytes,
        Pdu::Snp(..) => (),
    }
    assert_eq!(*pdu_expected, pdu_actual);
}

// Checks that re-encoding a decoded wire capture reproduces it byte for
// byte.
fn test_roundtrip_pdu(bytes: &[u8]) {
    let bytes = Bytes::copy_from_slice(bytes);
    let pdu = Pdu::decode(bytes.clone()).unwrap();
    assert_eq!(bytes, pdu.encode());
}

//
// Common header tests.
//

#[test]
fn test_id_len_sentinel_swap() {
    // The on-wire ID Length field maps 0 to the default 6-octet System ID
    // and 255 to a null System ID, symmetrically in both directions.
    assert_eq!(id_len_decode(0), 6);
    assert_eq!(id_len_decode(255), 0);
    assert_eq!(id_len_decode(6), 6);
    assert_eq!(id_len_encode(6), 0);
    assert_eq!(id_len_encode(0), 255);

    assert_eq!(id_len_encode(id_len_decode(0)), 0);
    assert_eq!(id_len_encode(id_len_decode(255)), 255);
}

#[test]
fn test_decode_truncated_header() {
    let bytes = Bytes::copy_from_slice(&[0x83, 0x1b, 0x01]);
    assert_eq!(Pdu::decode(bytes), Err(DecodeError::IncompletePdu));
}

#[test]
fn test_decode_unsupported_id_len() {
    // LAN L1 Hello with the ID Length field rewritten to 4.
    let mut bytes = hello::HELLO1.0.clone();
    bytes[3] = 0x04;
    let bytes = Bytes::copy_from_slice(&bytes);
    assert_eq!(Pdu::decode(bytes), Err(DecodeError::InvalidIdLength(4)));
}
