//
// Copyright (c) The Ferrite Routing Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::Utc;
use ferrite_utils::mac_addr::MacAddr;

use crate::adjacency::{
    Adjacency, AdjacencyEvent, AdjacencyState, P2pHandshakeAction,
};
use crate::collections::{
    AdjacencyKey, InterfaceIndex, InterfaceKey, LspEntryKey,
};
use crate::debug::{Debug, LspPurgeReason};
use crate::error::{AdjacencyRejectError, Error, PduInputError};
use crate::instance::{InstanceArenas, InstanceUpView};
use crate::interface::InterfaceType;
use crate::lsdb::{self, LspEntryFlags, lsp_compare};
use crate::packet::consts::PduType;
use crate::packet::error::DecodeError;
use crate::packet::pdu::{Hello, HelloVariant, Lsp, Pdu, Snp, SnpTlvs};
use crate::packet::tlv::ThreeWayAdjState;
use crate::packet::{LanId, LevelNumber, LevelType, LspId};
use crate::{adjacency, spf};

// ===== Network PDU receipt =====

pub(crate) fn process_pdu(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    iface_key: InterfaceKey,
    src: MacAddr,
    pdu: Result<Pdu, DecodeError>,
) -> Result<(), Error> {
    // Lookup interface.
    let iface = arenas.interfaces.get_mut_by_key(&iface_key)?;
    let iface_idx = iface.index;

    // Ignore PDUs received on inactive or passive interfaces.
    if !iface.state.active || iface.is_passive() {
        return Ok(());
    }

    // Check if the PDU was decoded successfully.
    let pdu = match pdu {
        Ok(pdu) => pdu,
        Err(error) => {
            match error {
                DecodeError::InvalidVersion(..) => {
                    iface.state.event_counters.version_skew += 1;
                    iface.state.discontinuity_time = Utc::now();
                }
                DecodeError::InvalidIdLength(..) => {
                    iface.state.event_counters.id_len_mismatch += 1;
                    iface.state.discontinuity_time = Utc::now();
                }
                DecodeError::UnknownPduType(..) => {
                    iface.state.packet_counters.l1.unknown_in += 1;
                    iface.state.packet_counters.l2.unknown_in += 1;
                    iface.state.discontinuity_time = Utc::now();
                }
                _ => (),
            }
            return Err(Error::PduInputError(
                iface.name.clone(),
                src,
                PduInputError::DecodeError(error),
            ));
        }
    };

    // Update packet counters.
    let pdu_type = pdu.pdu_type();
    match pdu_type {
        PduType::HelloP2P => {
            iface.state.packet_counters.l1.iih_in += 1;
            iface.state.packet_counters.l2.iih_in += 1;
        }
        PduType::HelloLanL1 => {
            iface.state.packet_counters.l1.iih_in += 1;
        }
        PduType::HelloLanL2 => {
            iface.state.packet_counters.l2.iih_in += 1;
        }
        PduType::LspL1 => {
            iface.state.packet_counters.l1.lsp_in += 1;
        }
        PduType::LspL2 => {
            iface.state.packet_counters.l2.lsp_in += 1;
        }
        PduType::CsnpL1 => {
            iface.state.packet_counters.l1.csnp_in += 1;
        }
        PduType::CsnpL2 => {
            iface.state.packet_counters.l2.csnp_in += 1;
        }
        PduType::PsnpL1 => {
            iface.state.packet_counters.l1.psnp_in += 1;
        }
        PduType::PsnpL2 => {
            iface.state.packet_counters.l2.psnp_in += 1;
        }
    }
    iface.state.discontinuity_time = Utc::now();

    // Log received PDU.
    Debug::PduRx(&iface.name, &src, &pdu).log();

    match pdu {
        Pdu::Hello(hello) => {
            process_pdu_hello(instance, arenas, iface_idx, src, hello)
        }
        Pdu::Lsp(lsp) => process_pdu_lsp(instance, arenas, iface_idx, src, lsp),
        Pdu::Snp(snp) => process_pdu_snp(instance, arenas, iface_idx, src, snp),
    }
    .map_err(|error| {
        let iface = &arenas.interfaces[iface_idx];
        Error::PduInputError(iface.name.clone(), src, error)
    })
}

fn process_pdu_hello(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    iface_idx: InterfaceIndex,
    src: MacAddr,
    hello: Hello,
) -> Result<(), PduInputError> {
    if let Err(error) = match hello.variant {
        // LAN Hello.
        HelloVariant::Lan { priority, lan_id } => process_pdu_hello_lan(
            instance, arenas, iface_idx, src, hello, priority, lan_id,
        ),
        // Point-to-Point Hello.
        HelloVariant::P2P { .. } => {
            process_pdu_hello_p2p(instance, arenas, iface_idx, src, hello)
        }
    } {
        // Error handling.
        let iface = &mut arenas.interfaces[iface_idx];
        if let PduInputError::AdjacencyReject(error) = &error {
            match error {
                AdjacencyRejectError::MaxAreaAddrsMismatch(..) => {
                    iface.state.event_counters.max_area_addr_mismatch += 1;
                }
                AdjacencyRejectError::AreaMismatch => {
                    iface.state.event_counters.area_mismatch += 1;
                }
                _ => {
                    iface.state.event_counters.adjacency_rejects += 1;
                }
            }
            iface.state.discontinuity_time = Utc::now();
        }
        return Err(error);
    }

    Ok(())
}

fn process_pdu_hello_lan(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    iface_idx: InterfaceIndex,
    src: MacAddr,
    hello: Hello,
    priority: u8,
    lan_id: LanId,
) -> Result<(), PduInputError> {
    let iface = &mut arenas.interfaces[iface_idx];

    // Validate PDU type and determine level usage.
    let level = match (iface.config.interface_type, hello.hdr.pdu_type) {
        (InterfaceType::Broadcast, PduType::HelloLanL1) => LevelNumber::L1,
        (InterfaceType::Broadcast, PduType::HelloLanL2) => LevelNumber::L2,
        _ => return Err(AdjacencyRejectError::InvalidHelloType.into()),
    };
    if !iface.config.level_type.resolved.intersects(level) {
        return Err(AdjacencyRejectError::InvalidHelloType.into());
    }

    // Validate the "Circuit Type" field.
    if !iface
        .config
        .level_type
        .resolved
        .intersects(hello.circuit_type)
    {
        return Err(AdjacencyRejectError::CircuitTypeMismatch.into());
    }

    if hello.hdr.pdu_type == PduType::HelloLanL1 {
        // Validate the "Maximum Area Addresses" field.
        if hello.hdr.max_area_addrs != 0 && hello.hdr.max_area_addrs != 3 {
            return Err(AdjacencyRejectError::MaxAreaAddrsMismatch(
                hello.hdr.max_area_addrs,
            )
            .into());
        }

        // Level 1 hellos require at least one shared area address.
        if !hello
            .tlvs
            .area_addrs()
            .any(|addr| instance.config.area_addrs.contains(addr))
        {
            return Err(AdjacencyRejectError::AreaMismatch.into());
        }
    }

    // Check for duplicate System-ID.
    if hello.source == instance.config.system_id.unwrap() {
        return Err(AdjacencyRejectError::DuplicateSystemId.into());
    }

    // Check if the Protocols Supported TLV is present.
    if hello.tlvs.protocols_supported.is_none() {
        return Err(AdjacencyRejectError::MissingProtocolsSupported.into());
    }

    // Look up or create an adjacency using the source MAC address.
    let adjacencies = iface.state.lan_adjacencies.get_mut(level);
    let level_usage = level.into();
    let (_, adj) =
        match adjacencies.get_mut_by_snpa(&mut arenas.adjacencies, src) {
            Some((adj_idx, adj)) => {
                if hello.source != adj.system_id {
                    adjacencies.update_system_id(adj_idx, adj, hello.source);
                }
                adj.level_capability = hello.circuit_type;
                adj.level_usage = level_usage;
                (adj_idx, adj)
            }
            None => adjacencies.insert(
                &mut arenas.adjacencies,
                src,
                hello.source,
                hello.circuit_type,
                level_usage,
            ),
        };

    // Signal the decision process if the adjacency addresses have changed.
    // These addresses are used for determining route next-hops.
    if adj.state == AdjacencyState::Up
        && (!adj.ipv4_addrs.iter().eq(hello.tlvs.ipv4_addrs())
            || !adj.ipv6_addrs.iter().eq(hello.tlvs.ipv6_addrs()))
    {
        spf::schedule(instance, level);
    }

    // Update adjacency with received PDU values.
    adj.priority = Some(priority);
    adj.lan_id = Some(lan_id);
    adj.protocols_supported = hello.tlvs.protocols_supported().collect();
    adj.area_addrs = hello.tlvs.area_addrs().cloned().collect();
    adj.neighbors = hello.tlvs.neighbors().cloned().collect();
    adj.ipv4_addrs = hello.tlvs.ipv4_addrs().cloned().collect();
    adj.ipv6_addrs = hello.tlvs.ipv6_addrs().cloned().collect();

    // Check if the designated system has changed its advertised LAN ID.
    if let Some(dis) = iface.state.dis.get_mut(level)
        && adj.system_id == dis.system_id
        && lan_id != dis.lan_id
    {
        dis.lan_id = lan_id;

        // Restart Hello Tx task.
        iface.hello_interval_start(instance, level);

        // Schedule LSP reorigination.
        instance.schedule_lsp_origination(level);
    }

    // Restart hold timer.
    adj.holdtimer_reset(iface, instance, hello.holdtime);

    // Check for two-way communication.
    let iface_snpa = iface.system.mac_addr.unwrap();
    if adj.neighbors.contains(&iface_snpa) {
        adj.state_change(
            iface,
            instance,
            AdjacencyEvent::HelloTwoWayRcvd,
            AdjacencyState::Up,
        );
    } else {
        adj.state_change(
            iface,
            instance,
            AdjacencyEvent::HelloOneWayRcvd,
            AdjacencyState::Initializing,
        );
    }

    Ok(())
}

fn process_pdu_hello_p2p(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    iface_idx: InterfaceIndex,
    src: MacAddr,
    hello: Hello,
) -> Result<(), PduInputError> {
    let iface = &mut arenas.interfaces[iface_idx];
    let mut restart_hello_tx = false;

    // Validate PDU type.
    if iface.config.interface_type != InterfaceType::PointToPoint {
        return Err(AdjacencyRejectError::InvalidHelloType.into());
    }

    // If the Three-Way Adjacency TLV is present, validate the neighbor
    // fields.
    if let Some(three_way_adj) = &hello.tlvs.three_way_adj
        && let Some((nbr_system_id, nbr_circuit_id)) = three_way_adj.neighbor
        && (nbr_system_id != instance.config.system_id.unwrap()
            || nbr_circuit_id != iface.system.ifindex.unwrap())
    {
        return Err(AdjacencyRejectError::NeighborMismatch.into());
    }

    // Check for duplicate System-ID.
    if hello.source == instance.config.system_id.unwrap() {
        return Err(AdjacencyRejectError::DuplicateSystemId.into());
    }

    // Check if the Protocols Supported TLV is present.
    if hello.tlvs.protocols_supported.is_none() {
        return Err(AdjacencyRejectError::MissingProtocolsSupported.into());
    }

    // Check for an area match.
    let area_match = hello
        .tlvs
        .area_addrs()
        .any(|addr| instance.config.area_addrs.contains(addr));

    // Run the ISO 10589 §8.2.5.2 acceptance tables.
    let local_levels = iface.config.level_type.resolved;
    let usage = iface.state.p2p_adjacency.as_ref().map(|adj| adj.level_usage);
    let action = adjacency::p2p_handshake(
        local_levels,
        hello.circuit_type,
        usage,
        area_match,
    );

    let mut adj = match action {
        P2pHandshakeAction::Reject => {
            let error = if area_match {
                AdjacencyRejectError::WrongSystem
            } else {
                AdjacencyRejectError::AreaMismatch
            };
            return Err(error.into());
        }
        P2pHandshakeAction::Down => {
            if let Some(mut adj) = iface.state.p2p_adjacency.take() {
                adj.state_change(
                    iface,
                    instance,
                    AdjacencyEvent::Kill,
                    AdjacencyState::Down,
                );
            }
            return Ok(());
        }
        P2pHandshakeAction::Accept => {
            let mut adj = iface.state.p2p_adjacency.take().unwrap();

            // Reject PDU if the System-ID changed (see IS-IS 8.2.5.2.d).
            if adj.system_id != hello.source {
                adj.state_change(
                    iface,
                    instance,
                    AdjacencyEvent::Kill,
                    AdjacencyState::Down,
                );
                return Ok(());
            }
            adj
        }
        P2pHandshakeAction::Up(level_usage) => {
            // Replace any stale adjacency.
            if let Some(mut old_adj) = iface.state.p2p_adjacency.take() {
                old_adj.state_change(
                    iface,
                    instance,
                    AdjacencyEvent::Kill,
                    AdjacencyState::Down,
                );
            }

            Adjacency::new(0, src, hello.source, hello.circuit_type, level_usage)
        }
    };

    // Signal the decision process if the adjacency addresses have changed.
    if adj.state == AdjacencyState::Up
        && (!adj.ipv4_addrs.iter().eq(hello.tlvs.ipv4_addrs())
            || !adj.ipv6_addrs.iter().eq(hello.tlvs.ipv6_addrs()))
    {
        for level in adj.level_usage {
            spf::schedule(instance, level);
        }
    }

    // Update adjacency with received PDU values.
    adj.level_capability = hello.circuit_type;
    adj.protocols_supported = hello.tlvs.protocols_supported().collect();
    adj.area_addrs = hello.tlvs.area_addrs().cloned().collect();
    if let Some(three_way_adj) = &hello.tlvs.three_way_adj {
        adj.ext_circuit_id = three_way_adj.local_circuit_id;
    }
    adj.ipv4_addrs = hello.tlvs.ipv4_addrs().cloned().collect();
    adj.ipv6_addrs = hello.tlvs.ipv6_addrs().cloned().collect();

    // Restart hold timer.
    adj.holdtimer_reset(iface, instance, hello.holdtime);

    // When the Three-Way Adjacency TLV is present, update the state using
    // the RFC 5303 handshake. If the TLV is absent, fall back to two-way
    // adjacency and transition directly to Up.
    match &hello.tlvs.three_way_adj {
        Some(three_way_adj) => {
            let new_state = adjacency::three_way_handshake(
                adj.three_way_state,
                three_way_adj.state,
            );
            if let Some(new_state) = new_state {
                adj.three_way_state = new_state;
                match new_state {
                    ThreeWayAdjState::Down => {
                        iface.state.p2p_adjacency = Some(adj);
                        return Ok(());
                    }
                    ThreeWayAdjState::Initializing => {
                        adj.state_change(
                            iface,
                            instance,
                            AdjacencyEvent::HelloOneWayRcvd,
                            AdjacencyState::Initializing,
                        );
                    }
                    ThreeWayAdjState::Up => {
                        adj.state_change(
                            iface,
                            instance,
                            AdjacencyEvent::HelloTwoWayRcvd,
                            AdjacencyState::Up,
                        );
                    }
                }
                restart_hello_tx = true;
            }
        }
        None => {
            adj.state_change(
                iface,
                instance,
                AdjacencyEvent::HelloOneWayRcvd,
                AdjacencyState::Up,
            );
        }
    }

    iface.state.p2p_adjacency = Some(adj);
    if restart_hello_tx {
        iface.hello_interval_start(instance, LevelType::All);
    }

    Ok(())
}

fn process_pdu_lsp(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    iface_idx: InterfaceIndex,
    src: MacAddr,
    mut lsp: Lsp,
) -> Result<(), PduInputError> {
    let iface = &mut arenas.interfaces[iface_idx];
    let system_id = instance.config.system_id.unwrap();

    // Set the level based on the PDU type, and discard the LSP if the level
    // is incompatible with the interface.
    let level = if lsp.hdr.pdu_type == PduType::LspL1 {
        LevelNumber::L1
    } else {
        LevelNumber::L2
    };
    if !iface.config.level_type.resolved.intersects(level) {
        return Ok(());
    }

    // Validate the "Maximum Area Addresses" field.
    if level == LevelNumber::L1
        && lsp.hdr.max_area_addrs != 0
        && lsp.hdr.max_area_addrs != 3
    {
        iface.state.event_counters.max_area_addr_mismatch += 1;
        iface.state.discontinuity_time = Utc::now();
        return Ok(());
    }

    // Lookup adjacency.
    if (match iface.config.interface_type {
        InterfaceType::Broadcast => iface
            .state
            .lan_adjacencies
            .get(level)
            .get_by_snpa(&arenas.adjacencies, src)
            .map(|(_, adj)| adj),
        InterfaceType::PointToPoint => iface
            .state
            .p2p_adjacency
            .as_ref()
            .filter(|adj| adj.level_usage.intersects(level)),
    })
    .is_none()
    {
        // Couldn't find a matching adjacency. Discard the LSP.
        return Ok(());
    }

    // Validate LSP checksum. A malformed LSP must never reach the LSDB.
    if !lsp.is_checksum_valid() {
        // Log why the LSP is being discarded.
        Debug::LspDiscard(level, &lsp).log();

        // Update event counter.
        instance.state.counters.get_mut(level).corrupted_lsps += 1;
        instance.state.discontinuity_time = Utc::now();

        // Discard LSP.
        return Ok(());
    }

    // Track purges received for our own LSPs.
    if lsp.is_expired() && lsp.lsp_id.system_id == system_id {
        instance.state.counters.get_mut(level).own_lsp_purge += 1;
        instance.state.discontinuity_time = Utc::now();
    }

    // Lookup LSP in the database.
    let lsdb = instance.state.lsdb.get(level);
    let lse = lsdb
        .get_by_lspid(&arenas.lsp_entries, &lsp.lsp_id)
        .map(|(_, lse)| lse);

    // LSP expiration synchronization (ISO 10589 - Section 7.3.16.4.a).
    //
    // A purge for an LSP-ID we never heard of is acknowledged without
    // flooding: a zero-lifetime placeholder is retained for the ZeroAge hold
    // interval so the purge is remembered, and no SRM flag is raised toward
    // the sender.
    if lsp.is_expired() && lse.is_none() && lsp.lsp_id.system_id != system_id {
        let entry = lsp.as_snp_entry();
        let lse = lsdb::install(instance, &mut arenas.lsp_entries, level, lsp);
        lse.flags.insert(LspEntryFlags::RECEIVED);
        iface.ssn_list_add(level, entry);
        return Ok(());
    }

    // Check if this is a self-originated LSP.
    if lsp.lsp_id.system_id == system_id {
        if lse.is_none() {
            // Self-originated LSP not found in the LSDB, so it should be
            // purged from the network.
            lsp.set_rem_lifetime(0);
            for iface in arenas.interfaces.iter_mut() {
                iface.srm_list_add(instance, level, lsp.clone());
            }
            return Ok(());
        }

        // Check if the LSP exists in the LSDB and the received LSP is
        // considered more recent.
        if let Some(lse) = lse
            && lsp_compare(&lse.data, lsp.seqno, lsp.rem_lifetime)
                == Ordering::Less
        {
            // Increase LSP sequence number and regenerate.
            let lsp = Lsp::new(
                level,
                instance.config.lsp_lifetime,
                lse.data.lsp_id,
                lsp.seqno + 1,
                lse.data.flags,
                lse.data.tlvs.clone(),
            );
            lsdb::lsp_originate(instance, arenas, level, lsp);
        }

        return Ok(());
    }

    // Compare the LSP in the database (if it exists) to the incoming LSP.
    match lse.map(|lse| lsp_compare(&lse.data, lsp.seqno, lsp.rem_lifetime)) {
        None | Some(Ordering::Less) => {
            // Store the new LSP, replacing any existing one.
            let lse =
                lsdb::install(instance, &mut arenas.lsp_entries, level, lsp);
            let lsp = &lse.data;
            lse.flags.insert(LspEntryFlags::RECEIVED);

            // Update LSP flooding flags for the incoming interface.
            iface.srm_list_del(level, &lsp.lsp_id);
            iface.ssn_list_add(level, lsp.as_snp_entry());

            // Update LSP flooding flags for the other interfaces.
            let iface_id = iface.id;
            for other_iface in arenas
                .interfaces
                .iter_mut()
                .filter(|other_iface| other_iface.id != iface_id)
            {
                other_iface.srm_list_add(instance, level, lsp.clone());
                other_iface.ssn_list_del(level, &lsp.lsp_id);
            }
        }
        Some(Ordering::Equal) => {
            let lse = lse.unwrap();

            // LSP confusion handling (ISO 10589 - Section 7.3.16.2).
            if lse.data.cksum != lsp.cksum {
                if lse.flags.contains(LspEntryFlags::RECEIVED) {
                    // Treat it as if its Remaining Lifetime had expired.
                    instance.tx.protocol_input.lsp_purge(
                        level,
                        lse.id,
                        LspPurgeReason::Confusion,
                    );
                } else {
                    // Increase LSP sequence number and regenerate.
                    instance.tx.protocol_input.lsp_refresh(level, lse.id);

                    // Update event counter.
                    instance.state.counters.get_mut(level).seqno_skipped += 1;
                    instance.state.discontinuity_time = Utc::now();
                }
                return Ok(());
            }

            // Update LSP flooding flags for the incoming interface.
            iface.srm_list_del(level, &lsp.lsp_id);
            iface.ssn_list_add(level, lsp.as_snp_entry());
        }
        Some(Ordering::Greater) => {
            let lse = lse.unwrap();

            // Update LSP flooding flags for the incoming interface.
            let lsp_id = lsp.lsp_id;
            iface.srm_list_add(instance, level, lse.data.clone());
            iface.ssn_list_del(level, &lsp_id);
        }
    }

    Ok(())
}

fn process_pdu_snp(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    iface_idx: InterfaceIndex,
    src: MacAddr,
    snp: Snp,
) -> Result<(), PduInputError> {
    let iface = &mut arenas.interfaces[iface_idx];

    // Set the level based on the PDU type, and discard the SNP if the level
    // is incompatible with the interface.
    let level = if matches!(snp.hdr.pdu_type, PduType::CsnpL1 | PduType::PsnpL1)
    {
        LevelNumber::L1
    } else {
        LevelNumber::L2
    };
    if !iface.config.level_type.resolved.intersects(level) {
        return Ok(());
    }

    // Validate the "Maximum Area Addresses" field.
    if level == LevelNumber::L1
        && snp.hdr.max_area_addrs != 0
        && snp.hdr.max_area_addrs != 3
    {
        iface.state.event_counters.max_area_addr_mismatch += 1;
        iface.state.discontinuity_time = Utc::now();
        return Ok(());
    }

    // Discard PSNP if we're not the DIS for the broadcast interface.
    if iface.config.interface_type == InterfaceType::Broadcast
        && snp.summary.is_none()
        && !iface.is_dis(level)
    {
        return Ok(());
    }

    // Lookup adjacency.
    if (match iface.config.interface_type {
        InterfaceType::Broadcast => iface
            .state
            .lan_adjacencies
            .get(level)
            .get_by_snpa(&arenas.adjacencies, src)
            .map(|(_, adj)| adj),
        InterfaceType::PointToPoint => iface
            .state
            .p2p_adjacency
            .as_ref()
            .filter(|adj| adj.level_usage.intersects(level)),
    })
    .is_none()
    {
        // Couldn't find a matching adjacency. Discard the SNP.
        return Ok(());
    }

    // Iterate over all LSP entries.
    let lsp_entries = snp
        .tlvs
        .lsp_entries()
        .map(|entry| (entry.lsp_id, *entry))
        .collect::<BTreeMap<_, _>>();
    for entry in lsp_entries.values() {
        // Lookup LSP in the database.
        let lsdb = instance.state.lsdb.get(level);
        let lse = lsdb
            .get_by_lspid(&arenas.lsp_entries, &entry.lsp_id)
            .map(|(_, lse)| lse);

        // Check if the LSP entry in the received SNP is newer than the
        // corresponding stored LSP and update the LSP flooding flags
        // accordingly.
        if let Some(lse) = lse {
            match lsp_compare(&lse.data, entry.seqno, entry.rem_lifetime) {
                // LSP confusion handling (ISO 10589 - Section 7.3.16.2).
                Ordering::Equal if lse.data.cksum != entry.cksum => {
                    if lse.flags.contains(LspEntryFlags::RECEIVED) {
                        // Treat it as if its Remaining Lifetime had expired.
                        instance.tx.protocol_input.lsp_purge(
                            level,
                            lse.id,
                            LspPurgeReason::Confusion,
                        );
                    } else {
                        // Increase LSP sequence number and regenerate.
                        instance.tx.protocol_input.lsp_refresh(level, lse.id);

                        // Update event counter.
                        instance.state.counters.get_mut(level).seqno_skipped +=
                            1;
                        instance.state.discontinuity_time = Utc::now();
                    }
                }
                Ordering::Equal => {
                    iface.srm_list_del(level, &entry.lsp_id);
                }
                Ordering::Greater => {
                    iface.ssn_list_del(level, &entry.lsp_id);
                    iface.srm_list_add(instance, level, lse.data.clone());
                }
                Ordering::Less => {
                    iface.ssn_list_add(level, *entry);
                    iface.srm_list_del(level, &entry.lsp_id);
                }
            }
            continue;
        }

        // ISO 10589 - Section 7.3.15.2.b.5:
        // "If no database entry exists for the LSP, and the reported Remaining
        // Lifetime, Checksum and Sequence Number fields of the LSP are all
        // non-zero, create an entry with sequence number 0".
        if entry.rem_lifetime != 0 && entry.cksum != 0 && entry.seqno != 0 {
            let lsp = Lsp::new(
                level,
                entry.rem_lifetime,
                entry.lsp_id,
                0,
                Default::default(),
                Default::default(),
            );
            let lse =
                lsdb::install(instance, &mut arenas.lsp_entries, level, lsp);
            iface.ssn_list_add(level, lse.data.as_snp_entry());
        }
    }

    // Complete Sequence Numbers PDU processing.
    //
    // Flood LSPs we have that the neighbor doesn't.
    if let Some((start, end)) = snp.summary {
        let lsdb = instance.state.lsdb.get(level);
        let missing = lsdb
            .range(&arenas.lsp_entries, start..=end)
            .map(|lse| &lse.data)
            .filter(|lsp| !lsp_entries.contains_key(&lsp.lsp_id))
            // Exclude LSPs with zero Remaining Lifetime.
            .filter(|lsp| lsp.rem_lifetime != 0)
            // Exclude LSPs with zero sequence number.
            .filter(|lsp| lsp.seqno != 0)
            .cloned()
            .collect::<Vec<_>>();
        for lsp in missing {
            iface.srm_list_add(instance, level, lsp);
        }
    }

    Ok(())
}

// ===== Adjacency hold timer expiry =====

pub(crate) fn process_lan_adj_holdtimer_expiry(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    iface_key: InterfaceKey,
    adj_key: AdjacencyKey,
    level: LevelNumber,
) -> Result<(), Error> {
    // Lookup interface.
    let iface = arenas.interfaces.get_mut_by_key(&iface_key)?;

    // Lookup adjacency.
    let (adj_idx, adj) = iface
        .state
        .lan_adjacencies
        .get_mut(level)
        .get_mut_by_key(&mut arenas.adjacencies, &adj_key)?;

    // Reevaluate designation if the timed-out adjacency was the DIS.
    if let Some(dis) = iface.state.dis.get(level)
        && dis.system_id == adj.system_id
    {
        instance.tx.protocol_input.dis_election(iface.id, level);
    }

    // Delete adjacency.
    adj.state_change(
        iface,
        instance,
        AdjacencyEvent::HoldtimeExpired,
        AdjacencyState::Down,
    );
    iface
        .state
        .lan_adjacencies
        .get_mut(level)
        .delete(&mut arenas.adjacencies, adj_idx);

    Ok(())
}

pub(crate) fn process_p2p_adj_holdtimer_expiry(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    iface_key: InterfaceKey,
) -> Result<(), Error> {
    // Lookup interface.
    let iface = arenas.interfaces.get_mut_by_key(&iface_key)?;

    // Delete adjacency.
    if let Some(mut adj) = iface.state.p2p_adjacency.take() {
        adj.state_change(
            iface,
            instance,
            AdjacencyEvent::HoldtimeExpired,
            AdjacencyState::Down,
        );
    }

    Ok(())
}

// ===== Designated system election =====

pub(crate) fn process_dis_election(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    iface_key: InterfaceKey,
    level: LevelNumber,
) -> Result<(), Error> {
    // Lookup interface.
    let iface = arenas.interfaces.get_mut_by_key(&iface_key)?;

    // Run DIS election.
    let dis = iface.dis_election(instance, &arenas.adjacencies, level);

    // Return if no DIS change.
    if iface.state.dis.get(level).map(|dis| dis.system_id)
        == dis.map(|dis| dis.system_id)
    {
        return Ok(());
    }

    // Log DIS change.
    Debug::InterfaceDisChange(&iface.name, level, &dis).log();

    // Update DIS.
    let old_dis = std::mem::replace(iface.state.dis.get_mut(level), dis);

    // Update event counter.
    iface.state.event_counters.lan_dis_changes += 1;
    iface.state.discontinuity_time = Utc::now();

    // Restart Hello Tx task.
    iface.hello_interval_start(instance, level);

    // Process DIS changes.
    match (old_dis, dis) {
        (Some(old), _) if old.myself => {
            // We're no longer the DIS.
            iface.dis_stop();
        }
        (_, Some(new)) if new.myself => {
            // We're the new DIS.
            iface.dis_start(instance);
        }
        _ => {}
    }

    // Schedule LSP reorigination.
    instance.schedule_lsp_origination(level);

    Ok(())
}

// ===== Request to send PSNP =====

pub(crate) fn process_send_psnp(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    iface_key: InterfaceKey,
    level: LevelNumber,
) -> Result<(), Error> {
    // Lookup interface.
    let iface = arenas.interfaces.get_mut_by_key(&iface_key)?;

    // PSNPs are only ever sent on point-to-point circuits; broadcast
    // database sync relies on periodic CSNP comparison.
    if iface.config.interface_type != InterfaceType::PointToPoint {
        return Ok(());
    }

    // Do not send empty PSNP.
    if iface.state.ssn_list.get(level).is_empty() {
        return Ok(());
    }

    // Add as many LSP entries that will fit in a single PDU.
    let mut lsp_entries = vec![];
    for _ in 0..SnpTlvs::max_lsp_entries(
        instance.config.lsp_mtu as usize - Snp::PSNP_HEADER_LEN as usize,
    ) {
        if let Some((_, lsp_entry)) =
            iface.state.ssn_list.get_mut(level).pop_first()
        {
            lsp_entries.push(lsp_entry);
        } else {
            break;
        }
    }

    // Generate PDU.
    let pdu = Pdu::Snp(Snp::new(
        level,
        LanId::from((
            instance.config.system_id.unwrap(),
            iface.state.circuit_id,
        )),
        None,
        SnpTlvs::new(lsp_entries),
    ));

    // Enqueue PDU for transmission.
    iface.enqueue_pdu(pdu, level);

    Ok(())
}

// ===== Request to send CSNP =====

pub(crate) fn process_send_csnp(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    iface_key: InterfaceKey,
    level: LevelNumber,
) -> Result<(), Error> {
    // Lookup interface.
    let iface = arenas.interfaces.get_mut_by_key(&iface_key)?;

    // CSNPs are only generated by the designated system of a broadcast
    // circuit.
    if iface.config.interface_type != InterfaceType::Broadcast
        || !iface.is_dis(level)
    {
        return Ok(());
    }

    // Set CSNP source.
    let source = LanId::from((
        instance.config.system_id.unwrap(),
        iface.state.circuit_id,
    ));

    // Calculate maximum of LSP entries per PDU.
    let max_lsp_entries = SnpTlvs::max_lsp_entries(
        instance.config.lsp_mtu as usize - Snp::CSNP_HEADER_LEN as usize,
    );

    // Closure to generate and send CSNP.
    let mut send_csnp = |level, source, start, end, lsp_entries: Vec<_>| {
        // Generate PDU.
        let pdu = Pdu::Snp(Snp::new(
            level,
            source,
            Some((start, end)),
            SnpTlvs::new(lsp_entries),
        ));

        // Enqueue PDU for transmission.
        iface.enqueue_pdu(pdu, level);
    };

    // Iterate over LSDB and send as many CSNPs as necessary.
    let mut start = LspId::from([0; 8]);
    let mut lsp_entries = vec![];
    let lsdb = instance.state.lsdb.get(level);
    let mut lsdb_iter = lsdb
        .iter(&arenas.lsp_entries)
        .map(|lse| &lse.data)
        .peekable();
    while let Some(lsp) = lsdb_iter.next() {
        // Add current LSP entry.
        lsp_entries.push(lsp.as_snp_entry());

        // Check if this is the last LSP.
        let Some(next_lsp) = lsdb_iter.peek() else {
            // Send the final CSNP.
            let end = LspId::from([0xff; 8]);
            (send_csnp)(level, source, start, end, lsp_entries);
            break;
        };

        // If max LSP entries reached, send current CSNP.
        if lsp_entries.len() == max_lsp_entries {
            // Set end LSP ID to current LSP ID.
            let end = lsp.lsp_id;
            let lsp_entries = std::mem::take(&mut lsp_entries);
            (send_csnp)(level, source, start, end, lsp_entries);

            // Update start for the next CSNP.
            start = next_lsp.lsp_id;
        }
    }

    Ok(())
}

// ===== LSP origination event =====

pub(crate) fn process_lsp_originate(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
) -> Result<(), Error> {
    // Clear LSP origination backoff.
    instance.state.lsp_orig_backoff = None;
    let Some(level_type) = instance.state.lsp_orig_pending.take() else {
        return Ok(());
    };

    // Originate LSPs for levels with pending requests.
    for level in instance
        .config
        .levels()
        .filter(|level| level_type.intersects(level))
    {
        lsdb::lsp_originate_all(instance, arenas, level);
    }

    Ok(())
}

// ===== LSP purge event =====

pub(crate) fn process_lsp_purge(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    level: LevelNumber,
    lse_key: LspEntryKey,
    reason: LspPurgeReason,
) -> Result<(), Error> {
    // Lookup LSP entry in the LSDB.
    let lsdb = instance.state.lsdb.get_mut(level);
    let (_, lse) = lsdb.get_mut_by_key(&mut arenas.lsp_entries, &lse_key)?;
    let mut lsp = lse.data.clone();

    // Log LSP purge.
    Debug::LspPurge(level, &lsp, reason).log();

    // Set remaining lifetime to zero if it's not already.
    lsp.set_rem_lifetime(0);

    // Remove all existing TLVs, retaining only the LSP header.
    lsp.tlvs = Default::default();
    lsp.encode();

    // Reinstall the LSP so the zero-age hold window governs its deletion.
    let lse = lsdb::install(instance, &mut arenas.lsp_entries, level, lsp);
    let lsp = &lse.data;

    // Stop the LSP's refresh timer.
    lse.refresh_timer = None;

    // Send purged LSP to all interfaces (network-wide purge propagation).
    for iface in arenas.interfaces.iter_mut() {
        iface.srm_list_add(instance, level, lsp.clone());
    }

    Ok(())
}

// ===== LSP delete event =====

pub(crate) fn process_lsp_delete(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    level: LevelNumber,
    lse_key: LspEntryKey,
) -> Result<(), Error> {
    // Lookup LSP entry in the LSDB.
    let lsdb = instance.state.lsdb.get_mut(level);
    let (lse_idx, lse) = lsdb.get_by_key(&arenas.lsp_entries, &lse_key)?;
    debug_assert!(lse.flags.contains(LspEntryFlags::PURGED));

    // Log LSP deletion.
    Debug::LspDelete(level, &lse.data).log();

    // Delete the LSP entry from the LSDB.
    lsdb.delete(&mut arenas.lsp_entries, lse_idx);

    Ok(())
}

// ===== LSP refresh event =====

pub(crate) fn process_lsp_refresh(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    level: LevelNumber,
    lse_key: LspEntryKey,
) -> Result<(), Error> {
    // Lookup LSP entry in the LSDB.
    let lsdb = instance.state.lsdb.get(level);
    let lsp = lsdb
        .get_by_key(&arenas.lsp_entries, &lse_key)
        .map(|(_, lse)| &lse.data)?;

    // Log LSP refresh.
    Debug::LspRefresh(level, lsp).log();

    // Originate new instance of the LSP.
    let lsp = Lsp::new(
        level,
        instance.config.lsp_lifetime,
        lsp.lsp_id,
        lsp.seqno + 1,
        lsp.flags,
        lsp.tlvs.clone(),
    );
    lsdb::lsp_originate(instance, arenas, level, lsp);

    Ok(())
}
