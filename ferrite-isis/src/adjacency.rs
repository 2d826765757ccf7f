//
// Copyright (c) The Ferrite Routing Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Instant;

use chrono::Utc;
use ferrite_utils::mac_addr::MacAddr;
use ferrite_utils::task::TimeoutTask;

use crate::collections::AdjacencyId;
use crate::debug::Debug;
use crate::instance::InstanceUpView;
use crate::interface::{Interface, InterfaceType};
use crate::packet::tlv::ThreeWayAdjState;
use crate::packet::{AreaAddr, LanId, LevelType, SystemId};
use crate::tasks;

#[derive(Debug)]
pub struct Adjacency {
    pub id: AdjacencyId,
    pub snpa: MacAddr,
    pub system_id: SystemId,
    pub level_capability: LevelType,
    pub level_usage: LevelType,
    pub state: AdjacencyState,
    pub priority: Option<u8>,
    pub lan_id: Option<LanId>,
    pub three_way_state: ThreeWayAdjState,
    pub ext_circuit_id: Option<u32>,
    pub protocols_supported: Vec<u8>,
    pub area_addrs: BTreeSet<AreaAddr>,
    pub neighbors: BTreeSet<MacAddr>,
    pub ipv4_addrs: BTreeSet<Ipv4Addr>,
    pub ipv6_addrs: BTreeSet<Ipv6Addr>,
    pub last_uptime: Option<Instant>,
    pub holdtimer: Option<TimeoutTask>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AdjacencyState {
    Down,
    Initializing,
    Up,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AdjacencyEvent {
    HelloOneWayRcvd,
    HelloTwoWayRcvd,
    HoldtimeExpired,
    LinkDown,
    Kill,
}

// Outcome of running the point-to-point Hello acceptance tables.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum P2pHandshakeAction {
    // Bring a new adjacency up with the given level usage.
    Up(LevelType),
    // Keep the existing adjacency; refresh its attributes.
    Accept,
    // Tear the existing adjacency down.
    Down,
    // Ignore the PDU.
    Reject,
}

// ===== impl Adjacency =====

impl Adjacency {
    // Creates new adjacency.
    pub(crate) fn new(
        id: AdjacencyId,
        snpa: MacAddr,
        system_id: SystemId,
        level_capability: LevelType,
        level_usage: LevelType,
    ) -> Adjacency {
        let adj = Adjacency {
            id,
            snpa,
            system_id,
            level_capability,
            level_usage,
            state: AdjacencyState::Down,
            priority: None,
            lan_id: None,
            three_way_state: ThreeWayAdjState::Down,
            ext_circuit_id: None,
            protocols_supported: Default::default(),
            area_addrs: Default::default(),
            neighbors: Default::default(),
            ipv4_addrs: Default::default(),
            ipv6_addrs: Default::default(),
            last_uptime: None,
            holdtimer: None,
        };
        Debug::AdjacencyCreate(&adj).log();
        adj
    }

    // Transitions the adjacency state if different from the current one.
    pub(crate) fn state_change(
        &mut self,
        iface: &mut Interface,
        instance: &mut InstanceUpView<'_>,
        event: AdjacencyEvent,
        new_state: AdjacencyState,
    ) {
        if self.state == new_state {
            return;
        }

        // Log the state transition.
        Debug::AdjacencyStateChange(self, new_state, event).log();

        // Update counters.
        if new_state == AdjacencyState::Up {
            iface.state.event_counters.adjacency_number += 1;
            self.last_uptime = Some(Instant::now());
        } else if self.state == AdjacencyState::Up {
            iface.state.event_counters.adjacency_number -= 1;
        }
        iface.state.event_counters.adjacency_changes += 1;
        iface.state.discontinuity_time = Utc::now();

        if iface.config.interface_type == InterfaceType::Broadcast {
            // On broadcast interfaces, we maintain a cache of active
            // adjacencies (Init or Up, but not Down). Any time this set
            // changes, we restart the Hello Tx task so the neighbors TLV
            // is updated.
            let level = self.level_usage;
            let adjacencies = iface.state.lan_adjacencies.get_mut(level);
            if self.state == AdjacencyState::Down {
                adjacencies.active_mut().insert(self.snpa);
                iface.hello_interval_start(instance, level);
            } else if new_state == AdjacencyState::Down {
                adjacencies.active_mut().remove(&self.snpa);
                iface.hello_interval_start(instance, level);
            }

            // Reevaluate which system is responsible for CSNP origination.
            instance
                .tx
                .protocol_input
                .dis_election(iface.id, level.into());
        }

        // If no adjacencies remain in the Up state, clear SRM and SSN lists.
        if iface.state.event_counters.adjacency_number == 0 {
            for level in iface.config.levels() {
                iface.state.srm_list.get_mut(level).clear();
                iface.state.ssn_list.get_mut(level).clear();
            }
        }

        // Effectively transition to the new state.
        self.state = new_state;

        // Schedule LSP reorigination for all levels where the adjacency
        // exists.
        instance.schedule_lsp_origination(self.level_usage);
    }

    // Starts or resets the holdtime timer.
    pub(crate) fn holdtimer_reset(
        &mut self,
        iface: &Interface,
        instance: &InstanceUpView<'_>,
        holdtime: u16,
    ) {
        if let Some(holdtimer) = self.holdtimer.as_mut() {
            holdtimer.reset(None);
        } else {
            let task =
                tasks::adjacency_holdtimer(self, iface, instance, holdtime);
            self.holdtimer = Some(task);
        }
    }
}

impl Drop for Adjacency {
    fn drop(&mut self) {
        Debug::AdjacencyDelete(self).log();
    }
}

// ===== global functions =====

// Computes the next three-way adjacency state based on the current adjacency
// state and the state received in the neighbor's Hello PDU (RFC 5303).
pub(crate) fn three_way_handshake(
    adj_state: ThreeWayAdjState,
    hello_state: ThreeWayAdjState,
) -> Option<ThreeWayAdjState> {
    use ThreeWayAdjState::{Down, Initializing, Up};

    match hello_state {
        Down => Some(Initializing),

        Initializing => match adj_state {
            Down | Initializing => Some(Up),
            Up => None,
        },

        Up => match adj_state {
            Down => Some(Down),
            Initializing => Some(Up),
            Up => None,
        },
    }
}

// Runs the point-to-point Hello acceptance tables from ISO 10589 §8.2.5.2.
//
// The decision is indexed by the local level capability, the circuit type
// advertised by the neighbor, the current adjacency usage (None when no
// adjacency exists yet) and whether the Hello carries a matching area
// address. Tables 5 (L1-only), 6 (L1/L2) and 7 (L2-only) cover matching
// areas; table 8 covers non-matching areas.
pub fn p2p_handshake(
    local_levels: LevelType,
    circuit_type: LevelType,
    usage: Option<LevelType>,
    area_match: bool,
) -> P2pHandshakeAction {
    use LevelType::{All, L1, L2};
    use P2pHandshakeAction::{Accept, Down, Reject, Up};

    if area_match {
        match (local_levels, circuit_type, usage) {
            // Table 5 - IS is level 1 only.
            (L1, L1 | All, None) => Up(L1),
            (L1, L1 | All, Some(L1)) => Accept,
            (L1, L1 | All, Some(_)) => Down,
            (L1, L2, None) => Reject,
            (L1, L2, Some(_)) => Down,

            // Table 6 - IS is level 1 and 2.
            (All, L1, None) => Up(L1),
            (All, L1, Some(L1)) => Accept,
            (All, L1, Some(_)) => Down,
            (All, All, None) => Up(All),
            (All, All, Some(All)) => Accept,
            (All, All, Some(_)) => Down,
            (All, L2, None) => Up(L2),
            (All, L2, Some(L2)) => Accept,
            (All, L2, Some(_)) => Down,

            // Table 7 - IS is level 2 only.
            (L2, L1, None) => Reject,
            (L2, L1, Some(_)) => Down,
            (L2, L2 | All, None) => Up(L2),
            (L2, L2 | All, Some(L2)) => Accept,
            (L2, L2 | All, Some(_)) => Down,
        }
    } else {
        match (local_levels, circuit_type, usage) {
            // Table 8 - IS is level 1 only.
            (L1, _, None) => Reject,
            (L1, _, Some(_)) => Down,

            // Table 8 - IS is level 1 and 2 or level 2 only.
            (All | L2, L1, None) => Reject,
            (All | L2, L1, Some(_)) => Down,
            (All | L2, L2 | All, None) => Up(L2),
            (All | L2, L2 | All, Some(L2)) => Accept,
            (All | L2, L2 | All, Some(_)) => Down,
        }
    }
}
