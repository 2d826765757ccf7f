//
// Copyright (c) The Ferrite Routing Contributors
//
// SPDX-License-Identifier: MIT
//

//! Protocol-level state machine tests.
//!
//! These tests drive an instance through its message entry points with the
//! timer and socket stubs from the `testing` feature, and observe behavior
//! through the management API and the transmitted-PDU channel.

use std::time::Duration;

use bytes::Bytes;
use ferrite_isis::adjacency::AdjacencyState;
use ferrite_isis::collections::ObjectKey;
use ferrite_isis::config::{ConfigSnapshot, InstanceCfg, InterfaceCfg};
use ferrite_isis::instance::{
    Instance, InstanceChannelsTx, ProtocolInputChannelsRx,
};
use ferrite_isis::interface::InterfaceType;
use ferrite_isis::packet::consts::LspFlags;
use ferrite_isis::packet::pdu::{
    Hello, HelloTlvs, HelloVariant, Lsp, LspTlvs, Pdu,
};
use ferrite_isis::packet::tlv::{
    AreaAddressesTlv, NeighborsTlv, ProtocolsSupportedTlv,
};
use ferrite_isis::packet::{
    AreaAddr, LanId, LevelNumber, LevelType, LspId, SystemId,
};
use ferrite_isis::spf::DecisionMsg;
use ferrite_isis::tasks::messages::input::{
    DisElectionMsg, LspOriginateMsg, NetRxPduMsg, SendCsnpMsg, SendPsnpMsg,
};
use ferrite_isis::tasks::messages::output::NetTxPduMsg;
use ferrite_isis::tasks::messages::{ProtocolInputMsg, ProtocolOutputMsg};
use ferrite_utils::mac_addr::MacAddr;
use ferrite_utils::southbound::{
    InterfaceFlags, InterfaceUpdateMsg, SouthboundMsg,
};
use tokio::sync::mpsc;

const LOCAL_SYSTEM_ID: [u8; 6] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x01];

struct TestRig {
    instance: Instance,
    output_rx: mpsc::Receiver<ProtocolOutputMsg>,
    decision_rx: mpsc::UnboundedReceiver<DecisionMsg>,
    // Keep the protocol input receivers alive so timer messages don't fail
    // to enqueue.
    _protocol_input_rx: ProtocolInputChannelsRx,
}

fn area() -> AreaAddr {
    AreaAddr::from([0x49, 0x00, 0x00].as_slice())
}

// Local hardware address assigned to the Nth configured interface.
fn local_mac(index: u8) -> MacAddr {
    MacAddr::from([0x00, 0x00, 0x00, 0x00, index + 1, 0x00])
}

fn new_rig(interfaces: &[(&str, InterfaceType)]) -> TestRig {
    let (protocol_input_tx, protocol_input_rx) =
        Instance::protocol_input_channels();
    let (decision_tx, decision_rx) = mpsc::unbounded_channel();
    let (output_tx, output_rx) = mpsc::channel(4);
    let tx = InstanceChannelsTx {
        protocol_input: protocol_input_tx,
        decision: decision_tx,
        protocol_output: output_tx,
    };
    let mut instance = Instance::new("test".to_owned(), tx);

    // Apply the configuration snapshot.
    let mut snapshot = ConfigSnapshot {
        instance: InstanceCfg {
            system_id: Some(SystemId::from(LOCAL_SYSTEM_ID)),
            area_addrs: [area()].into(),
            ..Default::default()
        },
        ..Default::default()
    };
    for (ifname, iface_type) in interfaces {
        snapshot.interfaces.insert(
            (*ifname).to_owned(),
            InterfaceCfg {
                interface_type: *iface_type,
                ..Default::default()
            },
        );
    }
    instance.apply_config(snapshot);

    // Deliver the kernel interface snapshot.
    for (index, (ifname, iface_type)) in interfaces.iter().enumerate() {
        let mut flags = InterfaceFlags::OPERATIVE;
        if *iface_type == InterfaceType::Broadcast {
            flags.insert(InterfaceFlags::BROADCAST);
        }
        instance.process_southbound_msg(SouthboundMsg::InterfaceUpd(
            InterfaceUpdateMsg {
                ifname: (*ifname).to_owned(),
                ifindex: index as u32 + 1,
                mtu: 1500,
                flags,
                mac_address: local_mac(index as u8),
            },
        ));
    }

    TestRig {
        instance,
        output_rx,
        decision_rx,
        _protocol_input_rx: protocol_input_rx,
    }
}

fn recv_pdu(instance: &mut Instance, ifname: &str, src: MacAddr, pdu: Pdu) {
    instance.process_protocol_msg(ProtocolInputMsg::NetRxPdu(NetRxPduMsg {
        iface_key: ObjectKey::Value(ifname.to_owned()),
        src,
        bytes: Bytes::new(),
        pdu: Ok(pdu),
    }));
}

// Collects all PDUs relayed by the network Tx stubs.
async fn drain_output(
    output_rx: &mut mpsc::Receiver<ProtocolOutputMsg>,
) -> Vec<(String, Pdu)> {
    let mut pdus = vec![];
    loop {
        match tokio::time::timeout(Duration::from_millis(50), output_rx.recv())
            .await
        {
            Ok(Some(ProtocolOutputMsg::NetTxPdu(NetTxPduMsg {
                pdu,
                ifname,
                ..
            }))) => pdus.push((ifname, pdu)),
            _ => break,
        }
    }
    pdus
}

fn p2p_hello(system_id: [u8; 6]) -> Pdu {
    Pdu::Hello(Hello::new(
        LevelType::All,
        LevelType::All,
        SystemId::from(system_id),
        30,
        HelloVariant::P2P {
            local_circuit_id: 1,
        },
        HelloTlvs {
            protocols_supported: Some(ProtocolsSupportedTlv {
                list: vec![0xcc],
            }),
            area_addrs: vec![AreaAddressesTlv { list: vec![area()] }],
            ..Default::default()
        },
    ))
}

fn lan_hello_l1(
    system_id: [u8; 6],
    area_addr: AreaAddr,
    neighbors: Vec<MacAddr>,
) -> Pdu {
    let source = SystemId::from(system_id);
    Pdu::Hello(Hello::new(
        LevelType::L1,
        LevelType::All,
        source,
        30,
        HelloVariant::Lan {
            priority: 64,
            lan_id: LanId::from((source, 1)),
        },
        HelloTlvs {
            protocols_supported: Some(ProtocolsSupportedTlv {
                list: vec![0xcc],
            }),
            area_addrs: vec![AreaAddressesTlv {
                list: vec![area_addr],
            }],
            neighbors: vec![NeighborsTlv { list: neighbors }],
            ..Default::default()
        },
    ))
}

fn test_lsp(system_id: [u8; 6], seqno: u32, rem_lifetime: u16) -> Lsp {
    let mut lsp_id_bytes = [0; 8];
    lsp_id_bytes[..6].copy_from_slice(&system_id);
    Lsp::new(
        LevelNumber::L1,
        rem_lifetime,
        LspId::from(lsp_id_bytes),
        seqno,
        LspFlags::IS_TYPE1,
        LspTlvs::default(),
    )
}

// ===== Tests =====

// A LAN adjacency reaches Up if and only if the local link address appears
// in the neighbor's most recent IS-Neighbors TLV; removing it drives the
// adjacency back to Initializing.
#[tokio::test]
async fn lan_adjacency_monotonicity() {
    let mut rig = new_rig(&[("eth0", InterfaceType::Broadcast)]);
    let peer_mac = MacAddr::from([0x00, 0x00, 0x00, 0x00, 0x02, 0x00]);
    let peer_id = [0x00, 0x00, 0x00, 0x00, 0x00, 0x02];

    // One-way hello: the adjacency is created in the Initializing state.
    recv_pdu(
        &mut rig.instance,
        "eth0",
        peer_mac,
        lan_hello_l1(peer_id, area(), vec![]),
    );
    let adj = rig.instance.adjacencies("eth0").unwrap().next().unwrap();
    assert_eq!(adj.state, AdjacencyState::Initializing);

    // The neighbor lists us back: the adjacency goes Up.
    recv_pdu(
        &mut rig.instance,
        "eth0",
        peer_mac,
        lan_hello_l1(peer_id, area(), vec![local_mac(0)]),
    );
    let adj = rig.instance.adjacencies("eth0").unwrap().next().unwrap();
    assert_eq!(adj.state, AdjacencyState::Up);

    // We disappear from the neighbor's list: back to Initializing.
    recv_pdu(
        &mut rig.instance,
        "eth0",
        peer_mac,
        lan_hello_l1(peer_id, area(), vec![]),
    );
    let adj = rig.instance.adjacencies("eth0").unwrap().next().unwrap();
    assert_eq!(adj.state, AdjacencyState::Initializing);
}

// Level 1 LAN hellos without a shared area address never form an adjacency.
#[tokio::test]
async fn lan_adjacency_area_mismatch() {
    let mut rig = new_rig(&[("eth0", InterfaceType::Broadcast)]);
    let peer_mac = MacAddr::from([0x00, 0x00, 0x00, 0x00, 0x02, 0x00]);
    let peer_id = [0x00, 0x00, 0x00, 0x00, 0x00, 0x02];

    recv_pdu(
        &mut rig.instance,
        "eth0",
        peer_mac,
        lan_hello_l1(
            peer_id,
            AreaAddr::from([0x47].as_slice()),
            vec![local_mac(0)],
        ),
    );
    assert_eq!(rig.instance.adjacencies("eth0").unwrap().count(), 0);
}

// A point-to-point hello without the three-way TLV brings the adjacency
// straight up.
#[tokio::test]
async fn p2p_adjacency_up() {
    let mut rig = new_rig(&[("eth0", InterfaceType::PointToPoint)]);
    let peer_mac = MacAddr::from([0x00, 0x00, 0x00, 0x00, 0x02, 0x00]);

    recv_pdu(
        &mut rig.instance,
        "eth0",
        peer_mac,
        p2p_hello([0x00, 0x00, 0x00, 0x00, 0x00, 0x02]),
    );
    let adj = rig.instance.adjacencies("eth0").unwrap().next().unwrap();
    assert_eq!(adj.state, AdjacencyState::Up);
    assert_eq!(adj.level_usage, LevelType::All);
}

// Receiving a new LSP floods it to every other ready circuit but not back
// toward the sender; re-receiving the same sequence number changes only the
// acknowledgment bookkeeping.
#[tokio::test]
async fn flooding_idempotence() {
    let mut rig = new_rig(&[
        ("eth0", InterfaceType::PointToPoint),
        ("eth1", InterfaceType::PointToPoint),
    ]);
    let peer0_mac = MacAddr::from([0x00, 0x00, 0x00, 0x00, 0x02, 0x00]);
    let peer1_mac = MacAddr::from([0x00, 0x00, 0x00, 0x00, 0x03, 0x00]);

    // Bring one adjacency up on each circuit.
    recv_pdu(
        &mut rig.instance,
        "eth0",
        peer0_mac,
        p2p_hello([0x00, 0x00, 0x00, 0x00, 0x00, 0x02]),
    );
    recv_pdu(
        &mut rig.instance,
        "eth1",
        peer1_mac,
        p2p_hello([0x00, 0x00, 0x00, 0x00, 0x00, 0x03]),
    );
    drain_output(&mut rig.output_rx).await;

    // Receive a foreign LSP on eth0.
    let origin = [0x00, 0x00, 0x00, 0x00, 0x00, 0x09];
    let lsp = test_lsp(origin, 5, 1200);
    let lsp_id = lsp.lsp_id;
    recv_pdu(&mut rig.instance, "eth0", peer0_mac, Pdu::Lsp(lsp.clone()));

    // The LSP is installed and flooded to eth1 only.
    assert_eq!(
        rig.instance
            .lookup_lsp(LevelNumber::L1, lsp_id)
            .map(|lsp| lsp.seqno),
        Some(5)
    );
    let pdus = drain_output(&mut rig.output_rx).await;
    assert!(
        pdus.iter()
            .any(|(ifname, pdu)| ifname == "eth1" && matches!(pdu, Pdu::Lsp(..)))
    );
    assert!(
        !pdus
            .iter()
            .any(|(ifname, pdu)| ifname == "eth0" && matches!(pdu, Pdu::Lsp(..)))
    );

    // The LSDB change was signaled to the decision process.
    assert_eq!(
        rig.decision_rx.try_recv().ok(),
        Some(DecisionMsg {
            level: LevelNumber::L1
        })
    );

    // Re-receiving the same sequence number must not re-trigger flooding.
    recv_pdu(&mut rig.instance, "eth0", peer0_mac, Pdu::Lsp(lsp));
    let pdus = drain_output(&mut rig.output_rx).await;
    assert!(!pdus.iter().any(|(_, pdu)| matches!(pdu, Pdu::Lsp(..))));

    // The acknowledgment is drained into a single PSNP on the receiving
    // circuit.
    rig.instance.process_protocol_msg(ProtocolInputMsg::SendPsnp(
        SendPsnpMsg {
            iface_key: ObjectKey::Value("eth0".to_owned()),
            level: LevelNumber::L1,
        },
    ));
    let pdus = drain_output(&mut rig.output_rx).await;
    let psnp = pdus
        .iter()
        .find_map(|(ifname, pdu)| match pdu {
            Pdu::Snp(snp) if ifname == "eth0" => Some(snp),
            _ => None,
        })
        .expect("expected a PSNP on eth0");
    assert!(psnp.summary.is_none());
    assert!(
        psnp.tlvs
            .lsp_entries
            .iter()
            .flat_map(|tlv| tlv.list.iter())
            .any(|entry| entry.lsp_id == lsp_id)
    );
}

// A purge for an unknown LSP-ID installs a zero-lifetime placeholder, is
// acknowledged on point-to-point circuits, and raises no SRM flags.
#[tokio::test]
async fn purge_of_unknown_lsp() {
    let mut rig = new_rig(&[
        ("eth0", InterfaceType::PointToPoint),
        ("eth1", InterfaceType::PointToPoint),
    ]);
    let peer0_mac = MacAddr::from([0x00, 0x00, 0x00, 0x00, 0x02, 0x00]);
    let peer1_mac = MacAddr::from([0x00, 0x00, 0x00, 0x00, 0x03, 0x00]);

    recv_pdu(
        &mut rig.instance,
        "eth0",
        peer0_mac,
        p2p_hello([0x00, 0x00, 0x00, 0x00, 0x00, 0x02]),
    );
    recv_pdu(
        &mut rig.instance,
        "eth1",
        peer1_mac,
        p2p_hello([0x00, 0x00, 0x00, 0x00, 0x00, 0x03]),
    );
    drain_output(&mut rig.output_rx).await;

    // Receive a purge for an LSP-ID that was never installed.
    let origin = [0x00, 0x00, 0x00, 0x00, 0x00, 0x09];
    let lsp = test_lsp(origin, 5, 0);
    let lsp_id = lsp.lsp_id;
    recv_pdu(&mut rig.instance, "eth0", peer0_mac, Pdu::Lsp(lsp));

    // A zero-lifetime placeholder is retained.
    let placeholder =
        rig.instance.lookup_lsp(LevelNumber::L1, lsp_id).unwrap();
    assert_eq!(placeholder.rem_lifetime, 0);

    // No flooding takes place, in either direction.
    let pdus = drain_output(&mut rig.output_rx).await;
    assert!(!pdus.iter().any(|(_, pdu)| matches!(pdu, Pdu::Lsp(..))));

    // The purge is acknowledged on the receiving circuit.
    rig.instance.process_protocol_msg(ProtocolInputMsg::SendPsnp(
        SendPsnpMsg {
            iface_key: ObjectKey::Value("eth0".to_owned()),
            level: LevelNumber::L1,
        },
    ));
    let pdus = drain_output(&mut rig.output_rx).await;
    assert!(pdus.iter().any(|(ifname, pdu)| {
        ifname == "eth0"
            && match pdu {
                Pdu::Snp(snp) => snp
                    .tlvs
                    .lsp_entries
                    .iter()
                    .flat_map(|tlv| tlv.list.iter())
                    .any(|entry| entry.lsp_id == lsp_id),
                _ => false,
            }
    }));
}

// Periodic CSNPs are generated only while this system is the designated one,
// i.e. while no Up LAN peer has a smaller hardware address.
#[tokio::test]
async fn csnp_generation_follows_designation() {
    // Case 1: the peer's hardware address is larger, so we are designated.
    let mut rig = new_rig(&[("eth0", InterfaceType::Broadcast)]);
    let peer_mac = MacAddr::from([0x00, 0x00, 0x00, 0x09, 0x09, 0x09]);
    recv_pdu(
        &mut rig.instance,
        "eth0",
        peer_mac,
        lan_hello_l1(
            [0x00, 0x00, 0x00, 0x00, 0x00, 0x02],
            area(),
            vec![local_mac(0)],
        ),
    );
    rig.instance.process_protocol_msg(ProtocolInputMsg::DisElection(
        DisElectionMsg {
            iface_key: ObjectKey::Value("eth0".to_owned()),
            level: LevelNumber::L1,
        },
    ));
    rig.instance.process_protocol_msg(ProtocolInputMsg::LspOriginate(
        LspOriginateMsg {},
    ));
    drain_output(&mut rig.output_rx).await;
    rig.instance.process_protocol_msg(ProtocolInputMsg::SendCsnp(
        SendCsnpMsg {
            iface_key: ObjectKey::Value("eth0".to_owned()),
            level: LevelNumber::L1,
        },
    ));
    let pdus = drain_output(&mut rig.output_rx).await;
    assert!(pdus.iter().any(|(ifname, pdu)| {
        ifname == "eth0"
            && matches!(pdu, Pdu::Snp(snp) if snp.summary.is_some())
    }));

    // Case 2: the peer's hardware address is smaller, so it is designated
    // and no CSNPs are generated locally.
    let mut rig = new_rig(&[("eth0", InterfaceType::Broadcast)]);
    let peer_mac = MacAddr::from([0x00, 0x00, 0x00, 0x00, 0x00, 0x02]);
    recv_pdu(
        &mut rig.instance,
        "eth0",
        peer_mac,
        lan_hello_l1(
            [0x00, 0x00, 0x00, 0x00, 0x00, 0x02],
            area(),
            vec![local_mac(0)],
        ),
    );
    rig.instance.process_protocol_msg(ProtocolInputMsg::DisElection(
        DisElectionMsg {
            iface_key: ObjectKey::Value("eth0".to_owned()),
            level: LevelNumber::L1,
        },
    ));
    rig.instance.process_protocol_msg(ProtocolInputMsg::LspOriginate(
        LspOriginateMsg {},
    ));
    drain_output(&mut rig.output_rx).await;
    rig.instance.process_protocol_msg(ProtocolInputMsg::SendCsnp(
        SendCsnpMsg {
            iface_key: ObjectKey::Value("eth0".to_owned()),
            level: LevelNumber::L1,
        },
    ));
    let pdus = drain_output(&mut rig.output_rx).await;
    assert!(!pdus.iter().any(|(_, pdu)| matches!(pdu, Pdu::Snp(..))));
}
