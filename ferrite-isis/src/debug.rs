//
// Copyright (c) The Ferrite Routing Contributors
//
// SPDX-License-Identifier: MIT
//

use ferrite_utils::mac_addr::MacAddr;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use crate::adjacency::{Adjacency, AdjacencyEvent, AdjacencyState};
use crate::interface::DisCandidate;
use crate::network::MulticastAddr;
use crate::packet::LevelNumber;
use crate::packet::pdu::{Lsp, Pdu};

// IS-IS debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    // Instances
    InstanceCreate,
    InstanceDelete,
    InstanceStart,
    InstanceStop(InstanceInactiveReason),
    // Interfaces
    InterfaceCreate(&'a str),
    InterfaceDelete(&'a str),
    InterfaceStart(&'a str),
    InterfaceStop(&'a str, InterfaceInactiveReason),
    InterfaceDisChange(&'a str, LevelNumber, &'a Option<DisCandidate>),
    // Adjacencies
    AdjacencyCreate(&'a Adjacency),
    AdjacencyDelete(&'a Adjacency),
    AdjacencyStateChange(&'a Adjacency, AdjacencyState, AdjacencyEvent),
    // Network
    PduRx(&'a str, &'a MacAddr, &'a Pdu),
    PduTx(&'a str, MulticastAddr, &'a Pdu),
    // Flooding
    LspDiscard(LevelNumber, &'a Lsp),
    LspTooLarge(&'a str, LevelNumber, &'a Lsp),
    // LSDB maintenance
    LspInstall(LevelNumber, &'a Lsp),
    LspOriginate(LevelNumber, &'a Lsp),
    LspPurge(LevelNumber, &'a Lsp, LspPurgeReason),
    LspDelete(LevelNumber, &'a Lsp),
    LspRefresh(LevelNumber, &'a Lsp),
    // Decision process
    DecisionTrigger(LevelNumber),
}

// Reason why an IS-IS instance is inactive.
#[derive(Debug)]
pub enum InstanceInactiveReason {
    AdminDown,
}

// Reason why IS-IS is inactive on an interface.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InterfaceInactiveReason {
    InstanceDown,
    AdminDown,
    OperationalDown,
    MissingIfindex,
    MissingMtu,
    MissingMacAddr,
    BroadcastUnsupported,
}

// Reason why an LSP is being purged.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum LspPurgeReason {
    Expired,
    Removed,
    Confusion,
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::InstanceCreate
            | Debug::InstanceDelete
            | Debug::InstanceStart => {
                debug!("{}", self);
            }
            Debug::InstanceStop(reason) => {
                debug!(?reason, "{}", self);
            }
            Debug::InterfaceCreate(name)
            | Debug::InterfaceDelete(name)
            | Debug::InterfaceStart(name) => {
                debug_span!("interface", %name).in_scope(|| {
                    debug!("{}", self);
                })
            }
            Debug::InterfaceStop(name, reason) => {
                debug_span!("interface", %name).in_scope(|| {
                    debug!(?reason, "{}", self);
                })
            }
            Debug::InterfaceDisChange(name, level, dis) => {
                debug_span!("interface", %name).in_scope(|| {
                    debug!(%level, ?dis, "{}", self);
                })
            }
            Debug::AdjacencyCreate(adj) | Debug::AdjacencyDelete(adj) => {
                debug!(system_id = ?adj.system_id, snpa = %adj.snpa, "{}", self);
            }
            Debug::AdjacencyStateChange(adj, state, event) => {
                debug!(
                    system_id = ?adj.system_id, snpa = %adj.snpa,
                    ?state, ?event, "{}", self
                );
            }
            Debug::PduRx(ifname, src, pdu) => {
                debug_span!("network").in_scope(|| {
                    debug_span!("input").in_scope(|| {
                        let data = serde_json::to_string(&pdu).unwrap();
                        debug!(%ifname, %src, %data, "{}", self);
                    })
                })
            }
            Debug::PduTx(ifname, dst, pdu) => {
                debug_span!("network").in_scope(|| {
                    debug_span!("output").in_scope(|| {
                        let data = serde_json::to_string(&pdu).unwrap();
                        debug!(%ifname, ?dst, %data, "{}", self);
                    })
                })
            }
            Debug::LspDiscard(level, lsp) => {
                debug!(%level, lsp_id = ?lsp.lsp_id, "{}", self);
            }
            Debug::LspTooLarge(ifname, level, lsp) => {
                debug_span!("interface", name = %ifname).in_scope(|| {
                    debug!(%level, lsp_id = ?lsp.lsp_id, "{}", self);
                })
            }
            Debug::LspInstall(level, lsp)
            | Debug::LspOriginate(level, lsp)
            | Debug::LspDelete(level, lsp)
            | Debug::LspRefresh(level, lsp) => {
                debug!(
                    %level, lsp_id = ?lsp.lsp_id, seqno = %lsp.seqno,
                    len = %lsp.raw.len(), "{}", self
                );
            }
            Debug::LspPurge(level, lsp, reason) => {
                debug!(%level, lsp_id = ?lsp.lsp_id, ?reason, "{}", self);
            }
            Debug::DecisionTrigger(level) => {
                debug!(%level, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    // Display debug message.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::InstanceCreate => {
                write!(f, "instance created")
            }
            Debug::InstanceDelete => {
                write!(f, "instance deleted")
            }
            Debug::InstanceStart => {
                write!(f, "starting instance")
            }
            Debug::InstanceStop(..) => {
                write!(f, "stopping instance")
            }
            Debug::InterfaceCreate(..) => {
                write!(f, "interface created")
            }
            Debug::InterfaceDelete(..) => {
                write!(f, "interface deleted")
            }
            Debug::InterfaceStart(..) => {
                write!(f, "starting interface")
            }
            Debug::InterfaceStop(..) => {
                write!(f, "stopping interface")
            }
            Debug::InterfaceDisChange(..) => {
                write!(f, "designated system changed")
            }
            Debug::AdjacencyCreate(..) => {
                write!(f, "adjacency created")
            }
            Debug::AdjacencyDelete(..) => {
                write!(f, "adjacency deleted")
            }
            Debug::AdjacencyStateChange(..) => {
                write!(f, "adjacency state changed")
            }
            Debug::PduRx(..) => {
                write!(f, "PDU received")
            }
            Debug::PduTx(..) => {
                write!(f, "PDU sent")
            }
            Debug::LspDiscard(..) => {
                write!(f, "LSP discarded")
            }
            Debug::LspTooLarge(..) => {
                write!(f, "LSP too large to be flooded on this interface")
            }
            Debug::LspInstall(..) => {
                write!(f, "LSP installed")
            }
            Debug::LspOriginate(..) => {
                write!(f, "LSP originated")
            }
            Debug::LspPurge(..) => {
                write!(f, "LSP purged")
            }
            Debug::LspDelete(..) => {
                write!(f, "LSP deleted")
            }
            Debug::LspRefresh(..) => {
                write!(f, "LSP refreshed")
            }
            Debug::DecisionTrigger(..) => {
                write!(f, "decision process triggered")
            }
        }
    }
}
