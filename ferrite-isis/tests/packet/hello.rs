//
// Copyright (c) The Ferrite Routing Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::LazyLock as Lazy;

use bytes::Bytes;
use const_addrs::{ip4, ip6};
use ferrite_isis::packet::pdu::{Hello, HelloTlvs, HelloVariant, Pdu};
use ferrite_isis::packet::tlv::{
    AreaAddressesTlv, Ipv4AddressesTlv, Ipv6AddressesTlv, NeighborsTlv,
    PaddingTlv, ProtocolsSupportedTlv, ThreeWayAdjState, ThreeWayAdjTlv,
    UnknownTlv,
};
use ferrite_isis::packet::{AreaAddr, LanId, LevelType, SystemId};
use ferrite_utils::mac_addr::MacAddr;

use super::{test_decode_pdu, test_encode_pdu, test_roundtrip_pdu};

//
// Test packets.
//

pub(crate) static HELLO1: Lazy<(Vec<u8>, Pdu)> = Lazy::new(|| {
    (
        vec![
            0x83, 0x1b, 0x01, 0x00, 0x0f, 0x01, 0x00, 0x00, 0x03, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x01, 0x00, 0x1e, 0x00, 0x33, 0x40, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x01, 0x01, 0x81, 0x02, 0xcc, 0x8e, 0x01, 0x04,
            0x03, 0x49, 0x00, 0x00, 0x06, 0x06, 0xaa, 0xbb, 0xcc, 0xdd, 0xee,
            0xff, 0x84, 0x04, 0x0a, 0x00, 0x01, 0x01,
        ],
        Pdu::Hello(Hello::new(
            LevelType::L1,
            LevelType::All,
            SystemId::from([0x00, 0x00, 0x00, 0x00, 0x00, 0x01]),
            30,
            HelloVariant::Lan {
                priority: 64,
                lan_id: LanId::from([
                    0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x01,
                ]),
            },
            HelloTlvs {
                protocols_supported: Some(ProtocolsSupportedTlv {
                    list: vec![0xcc, 0x8e],
                }),
                area_addrs: vec![AreaAddressesTlv {
                    list: vec![AreaAddr::from([0x49, 0x00, 0x00].as_slice())],
                }],
                neighbors: vec![NeighborsTlv {
                    list: vec![MacAddr::from([
                        0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff,
                    ])],
                }],
                ipv4_addrs: vec![Ipv4AddressesTlv {
                    list: vec![ip4!("10.0.1.1")],
                }],
                ..Default::default()
            },
        )),
    )
});

// Point-to-point IIH wire capture. Note that the PDU length field carries
// the padded length (1497) while the capture itself is 83 octets long.
static HELLO2: Lazy<(Vec<u8>, Pdu)> = Lazy::new(|| {
    (
        vec![
            0x83, 0x14, 0x01, 0x00, 0x11, 0x01, 0x00, 0x00, 0x02, 0x36, 0xd3,
            0x64, 0x2f, 0x27, 0xad, 0x00, 0x1e, 0x05, 0xd9, 0x00, 0x81, 0x02,
            0xcc, 0x8e, 0x01, 0x02, 0x01, 0x01, 0xf0, 0x0f, 0x00, 0x00, 0x00,
            0x00, 0x00, 0xfa, 0xa5, 0x6c, 0xc9, 0xad, 0xad, 0x00, 0x00, 0x00,
            0x00, 0x84, 0x04, 0xc0, 0xa8, 0x0c, 0x01, 0xe8, 0x10, 0xfe, 0x80,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xb8, 0x19, 0x81, 0xff, 0xfe,
            0xa4, 0xbf, 0xd8, 0x08, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0xff, 0x02, 0x01, 0x02,
        ],
        Pdu::Hello(Hello::new(
            LevelType::All,
            LevelType::L2,
            SystemId::from([0x36, 0xd3, 0x64, 0x2f, 0x27, 0xad]),
            30,
            HelloVariant::P2P {
                local_circuit_id: 0,
            },
            HelloTlvs {
                protocols_supported: Some(ProtocolsSupportedTlv {
                    list: vec![0xcc, 0x8e],
                }),
                area_addrs: vec![AreaAddressesTlv {
                    list: vec![AreaAddr::from([0x01].as_slice())],
                }],
                three_way_adj: Some(ThreeWayAdjTlv {
                    state: ThreeWayAdjState::Up,
                    local_circuit_id: Some(0),
                    neighbor: Some((
                        SystemId::from([
                            0x00, 0xfa, 0xa5, 0x6c, 0xc9, 0xad,
                        ]),
                        0xad000000,
                    )),
                }),
                ipv4_addrs: vec![Ipv4AddressesTlv {
                    list: vec![ip4!("192.168.12.1")],
                }],
                ipv6_addrs: vec![Ipv6AddressesTlv {
                    list: vec![ip6!("fe80::b819:81ff:fea4:bfd8")],
                }],
                padding: vec![PaddingTlv { length: 8 }],
                unknown: vec![UnknownTlv::new(
                    0xff,
                    2,
                    Bytes::copy_from_slice(&[0x01, 0x02]),
                )],
                ..Default::default()
            },
        )),
    )
});

//
// Tests.
//

#[test]
fn test_encode_hello1() {
    let (ref bytes, ref hello) = *HELLO1;
    test_encode_pdu(bytes, hello);
}

#[test]
fn test_decode_hello1() {
    let (ref bytes, ref hello) = *HELLO1;
    test_decode_pdu(bytes, hello);
}

#[test]
fn test_roundtrip_hello1() {
    let (ref bytes, _) = *HELLO1;
    test_roundtrip_pdu(bytes);
}

#[test]
fn test_decode_hello2() {
    let (ref bytes, ref hello) = *HELLO2;
    test_decode_pdu(bytes, hello);
}

#[test]
fn test_roundtrip_hello2() {
    // Re-encoding the decoded capture must reproduce the identical byte
    // sequence, including the declared padded PDU length.
    let (ref bytes, _) = *HELLO2;
    test_roundtrip_pdu(bytes);
}
