//
// Copyright (c) The Ferrite Routing Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::LazyLock as Lazy;

use const_addrs::{ip4, ip6, net4, net6};
use ferrite_isis::packet::consts::LspFlags;
use ferrite_isis::packet::pdu::{Lsp, LspTlvs, Pdu};
use ferrite_isis::packet::tlv::{
    AreaAddressesTlv, DynamicHostnameTlv, ExtIpv4Reach, ExtIpv4ReachTlv,
    ExtIsReach, ExtIsReachTlv, Ipv4AddressesTlv, Ipv4Reach, Ipv4ReachTlv,
    Ipv4RouterIdTlv, Ipv6AddressesTlv, Ipv6Reach, Ipv6ReachTlv,
    Ipv6RouterIdTlv, IsReach, IsReachTlv, LspBufferSizeTlv,
    ProtocolsSupportedTlv,
};
use ferrite_isis::packet::{AreaAddr, LanId, LevelNumber, LspId};

use super::{test_decode_pdu, test_roundtrip_pdu};

//
// Test packets.
//

// Level 1 LSP wire capture carrying wide IS and IP reachability with
// traffic-engineering Sub-TLVs, a Router Capability TLV and both router-id
// TLVs.
static LSP1: Lazy<Vec<u8>> = Lazy::new(|| {
    vec![
        0x83, 0x1b, 0x01, 0x00, 0x12, 0x01, 0x00, 0x00, 0x01, 0x6a, 0x04,
        0x92, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x04, 0x4e, 0xaa, 0x01, 0x81, 0x01, 0xcc, 0xf2, 0x30, 0x01,
        0x01, 0x01, 0x01, 0x00, 0x02, 0x09, 0xc0, 0x00, 0x1f, 0x40, 0x01,
        0x03, 0x00, 0x3e, 0x80, 0x13, 0x01, 0x00, 0x16, 0x09, 0x00, 0x00,
        0x03, 0xe8, 0x01, 0x03, 0x00, 0x3a, 0x98, 0x17, 0x02, 0x01, 0x10,
        0x15, 0x0c, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00,
        0x00, 0x00, 0x03, 0x01, 0x04, 0x03, 0x49, 0x00, 0x00, 0x16, 0x61,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x03, 0x00, 0x00, 0x0a, 0x56,
        0x03, 0x04, 0x00, 0x00, 0x00, 0x0f, 0x06, 0x04, 0x0a, 0x00, 0x01,
        0x01, 0x08, 0x04, 0x0a, 0x00, 0x01, 0x02, 0x09, 0x04, 0x4c, 0xee,
        0x6b, 0x28, 0x0a, 0x04, 0x4b, 0x3e, 0xbc, 0x20, 0x0b, 0x20, 0x4b,
        0x3e, 0xbc, 0x20, 0x4b, 0x3e, 0xbc, 0x20, 0x4b, 0x3e, 0xbc, 0x20,
        0x4b, 0x3e, 0xbc, 0x20, 0x4b, 0x3e, 0xbc, 0x20, 0x4b, 0x3e, 0xbc,
        0x20, 0x4b, 0x3e, 0xbc, 0x20, 0x4b, 0x3e, 0xbc, 0x20, 0x12, 0x03,
        0x00, 0x00, 0x64, 0x20, 0x0b, 0x30, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x01, 0x00, 0x3a, 0x98, 0x0f, 0x02, 0x01, 0x10, 0x84, 0x04,
        0x01, 0x01, 0x01, 0x01, 0x87, 0x35, 0x00, 0x00, 0x00, 0x0a, 0x58,
        0x0a, 0x00, 0x01, 0x23, 0x04, 0x01, 0x40, 0x0b, 0x04, 0x01, 0x01,
        0x01, 0x01, 0x0c, 0x10, 0x20, 0x01, 0x0d, 0xb8, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x03, 0x06,
        0x40, 0x00, 0x00, 0x00, 0x00, 0x0a, 0x00, 0x00, 0x00, 0x0a, 0x20,
        0x01, 0x01, 0x01, 0x01, 0x86, 0x04, 0x01, 0x01, 0x01, 0x01, 0xe8,
        0x10, 0x20, 0x01, 0x0d, 0xb8, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0xec, 0x48, 0x00, 0x00, 0x00,
        0x0a, 0x20, 0x80, 0x20, 0x01, 0x0d, 0xb8, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x23, 0x04, 0x01,
        0x20, 0x0b, 0x04, 0x01, 0x01, 0x01, 0x01, 0x0c, 0x10, 0x20, 0x01,
        0x0d, 0xb8, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x01, 0x03, 0x06, 0x40, 0x00, 0x00, 0x00, 0x00, 0x0b,
        0x00, 0x00, 0x00, 0x0a, 0x00, 0x40, 0x20, 0x01, 0x0d, 0xb8, 0x10,
        0x00, 0x00, 0x00, 0x8c, 0x10, 0x20, 0x01, 0x0d, 0xb8, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
    ]
});

// Locally constructed LSP exercising every typed TLV the encoder emits.
static LSP2: Lazy<Lsp> = Lazy::new(|| {
    Lsp::new(
        LevelNumber::L1,
        1170,
        LspId::from([0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00]),
        0x00000004,
        LspFlags::IS_TYPE1,
        LspTlvs {
            auth: None,
            protocols_supported: Some(ProtocolsSupportedTlv {
                list: vec![0xcc, 0x8e],
            }),
            area_addrs: vec![AreaAddressesTlv {
                list: vec![AreaAddr::from([0x49, 0x00, 0x00].as_slice())],
            }],
            hostname: Some(DynamicHostnameTlv {
                hostname: "rt1".to_owned(),
            }),
            lsp_buf_size: Some(LspBufferSizeTlv { size: 1492 }),
            is_reach: vec![IsReachTlv {
                list: vec![IsReach {
                    metric: 10,
                    metric_delay: None,
                    metric_expense: None,
                    metric_error: None,
                    neighbor: LanId::from([
                        0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x01,
                    ]),
                }],
            }],
            ext_is_reach: vec![ExtIsReachTlv {
                list: vec![ExtIsReach {
                    neighbor: LanId::from([
                        0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x01,
                    ]),
                    metric: 10,
                    sub_tlvs: vec![],
                }],
            }],
            ipv4_addrs: vec![Ipv4AddressesTlv {
                list: vec![ip4!("10.0.1.1")],
            }],
            ipv4_internal_reach: vec![Ipv4ReachTlv {
                list: vec![Ipv4Reach {
                    up_down: false,
                    ie_bit: false,
                    metric: 10,
                    metric_delay: None,
                    metric_expense: None,
                    metric_error: None,
                    prefix: net4!("10.0.0.0/8"),
                }],
            }],
            ipv4_external_reach: vec![],
            ext_ipv4_reach: vec![ExtIpv4ReachTlv {
                list: vec![ExtIpv4Reach {
                    metric: 10,
                    up_down: false,
                    prefix: net4!("192.168.1.0/24"),
                    sub_tlvs: vec![],
                }],
            }],
            ipv4_router_id: Some(Ipv4RouterIdTlv::new(ip4!("1.1.1.1"))),
            ipv6_addrs: vec![Ipv6AddressesTlv {
                list: vec![ip6!("2001:db8::1")],
            }],
            ipv6_reach: vec![Ipv6ReachTlv {
                list: vec![Ipv6Reach {
                    metric: 10,
                    up_down: false,
                    external: false,
                    prefix: net6!("2001:db8::/64"),
                    sub_tlvs: vec![],
                }],
            }],
            ipv6_router_id: Some(Ipv6RouterIdTlv::new(ip6!("2001:db8::1"))),
            unknown: vec![],
        },
    )
});

//
// Tests.
//

#[test]
fn test_roundtrip_lsp1() {
    test_roundtrip_pdu(&LSP1);
}

#[test]
fn test_checksum_lsp1() {
    let bytes = bytes::Bytes::copy_from_slice(&LSP1);
    let Pdu::Lsp(lsp) = Pdu::decode(bytes).unwrap() else {
        panic!("expected an LSP");
    };

    // The capture carries a protocol-compliant checksum; the local Fletcher
    // implementation must agree with it.
    assert_eq!(lsp.cksum, 0x4eaa);
    assert!(lsp.is_checksum_valid());
    assert_eq!(lsp.rem_lifetime, 1170);
    assert_eq!(lsp.seqno, 0x00000004);
    assert_eq!(
        lsp.lsp_id,
        LspId::from([0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00])
    );
}

#[test]
fn test_decode_lsp2() {
    let lsp = LSP2.clone();
    let bytes = lsp.raw.to_vec();
    test_decode_pdu(&bytes, &Pdu::Lsp(lsp));
}

#[test]
fn test_roundtrip_lsp2() {
    test_roundtrip_pdu(&LSP2.raw.clone());
}

#[test]
fn test_checksum_lsp2() {
    let bytes = bytes::Bytes::copy_from_slice(&LSP2.raw);
    let Pdu::Lsp(lsp) = Pdu::decode(bytes).unwrap() else {
        panic!("expected an LSP");
    };
    assert!(lsp.is_checksum_valid());
}

// A freshly constructed LSP with no TLVs is a fixed point of the codec:
// serializing, decoding and re-serializing must produce identical bytes.
#[test]
fn test_empty_lsp_fixed_point() {
    let lsp = Lsp::new(
        LevelNumber::L2,
        1200,
        LspId::from([0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x00, 0x00]),
        1,
        LspFlags::IS_TYPE1 | LspFlags::IS_TYPE2,
        LspTlvs::default(),
    );
    let bytes = lsp.raw.to_vec();

    let decoded = Pdu::decode(bytes::Bytes::copy_from_slice(&bytes)).unwrap();
    assert_eq!(bytes, decoded.encode().to_vec());
    assert_eq!(Pdu::Lsp(lsp), decoded);
}
