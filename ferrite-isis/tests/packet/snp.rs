//
// Copyright (c) The Ferrite Routing Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::LazyLock as Lazy;

use ferrite_isis::packet::pdu::{Pdu, Snp, SnpTlvs};
use ferrite_isis::packet::tlv::{LspEntriesTlv, LspEntry};
use ferrite_isis::packet::{LanId, LevelNumber, LspId};

use super::{test_decode_pdu, test_encode_pdu, test_roundtrip_pdu};

//
// Test packets.
//

static CSNP1: Lazy<(Vec<u8>, Pdu)> = Lazy::new(|| {
    (
        vec![
            0x83, 0x21, 0x01, 0x00, 0x18, 0x01, 0x00, 0x00, 0x00, 0x33, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
            0x09, 0x10, 0x04, 0xb0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x01, 0xab, 0xcd,
        ],
        Pdu::Snp(Snp::new(
            LevelNumber::L1,
            LanId::from([0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00]),
            Some((
                LspId::from([0x00; 8]),
                LspId::from([0xff; 8]),
            )),
            SnpTlvs {
                lsp_entries: vec![LspEntriesTlv {
                    list: vec![LspEntry {
                        rem_lifetime: 1200,
                        lsp_id: LspId::from([
                            0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00,
                        ]),
                        seqno: 0x00000001,
                        cksum: 0xabcd,
                    }],
                }],
                ..Default::default()
            },
        )),
    )
});

static PSNP1: Lazy<(Vec<u8>, Pdu)> = Lazy::new(|| {
    (
        vec![
            0x83, 0x11, 0x01, 0x00, 0x1a, 0x01, 0x00, 0x00, 0x00, 0x23, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x09, 0x10, 0x04, 0xb0, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
            0xab, 0xcd,
        ],
        Pdu::Snp(Snp::new(
            LevelNumber::L1,
            LanId::from([0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00]),
            None,
            SnpTlvs {
                lsp_entries: vec![LspEntriesTlv {
                    list: vec![LspEntry {
                        rem_lifetime: 1200,
                        lsp_id: LspId::from([
                            0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00,
                        ]),
                        seqno: 0x00000001,
                        cksum: 0xabcd,
                    }],
                }],
                ..Default::default()
            },
        )),
    )
});

//
// Tests.
//

#[test]
fn test_encode_csnp1() {
    let (ref bytes, ref csnp) = *CSNP1;
    test_encode_pdu(bytes, csnp);
}

#[test]
fn test_decode_csnp1() {
    let (ref bytes, ref csnp) = *CSNP1;
    test_decode_pdu(bytes, csnp);
}

#[test]
fn test_roundtrip_csnp1() {
    let (ref bytes, _) = *CSNP1;
    test_roundtrip_pdu(bytes);
}

#[test]
fn test_encode_psnp1() {
    let (ref bytes, ref psnp) = *PSNP1;
    test_encode_pdu(bytes, psnp);
}

#[test]
fn test_decode_psnp1() {
    let (ref bytes, ref psnp) = *PSNP1;
    test_decode_pdu(bytes, psnp);
}

#[test]
fn test_roundtrip_psnp1() {
    let (ref bytes, _) = *PSNP1;
    test_roundtrip_pdu(bytes);
}
