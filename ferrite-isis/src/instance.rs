//
// Copyright (c) The Ferrite Routing Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use ferrite_utils::southbound::SouthboundMsg;
use ferrite_utils::task::TimeoutTask;
use ferrite_utils::{Receiver, Sender, UnboundedReceiver, UnboundedSender};
use tokio::sync::mpsc;

use crate::adjacency::Adjacency;
use crate::collections::{Arena, InterfaceId, Interfaces, Lsdb, LspEntryId};
use crate::config::{self, ConfigSnapshot, InstanceCfg};
use crate::debug::{Debug, InstanceInactiveReason, LspPurgeReason};
use crate::error::Error;
use crate::interface::CircuitIdAllocator;
use crate::lsdb::LspEntry;
use crate::packet::pdu::Lsp;
use crate::packet::{LevelNumber, LevelType, Levels, LspId, SystemId};
use crate::spf::DecisionMsg;
use crate::tasks::messages::input::{
    AdjHoldTimerMsg, DisElectionMsg, LspDeleteMsg, LspOriginateMsg,
    LspPurgeMsg, LspRefreshMsg, NetRxPduMsg, SendCsnpMsg, SendPsnpMsg,
};
use crate::tasks::messages::ProtocolInputMsg;
#[cfg(feature = "testing")]
use crate::tasks::messages::ProtocolOutputMsg;
use crate::{events, lsdb, southbound, tasks};

// Protocol coordinator.
//
// One `Instance` owns the system-id and area configuration, the two-level
// LSDB, the circuit table and the reachability state derived from them. It is
// an explicit context object passed down to every component; no global state
// exists anywhere in the crate.
#[derive(Debug)]
pub struct Instance {
    // Instance name.
    pub name: String,
    // Instance configuration data.
    pub config: InstanceCfg,
    // Instance state data.
    pub state: Option<InstanceState>,
    // Instance arenas.
    pub arenas: InstanceArenas,
    // Instance Tx channels.
    pub tx: InstanceChannelsTx,
}

#[derive(Debug)]
pub struct InstanceState {
    // Circuit ID allocator.
    pub circuit_id_allocator: CircuitIdAllocator,
    // Hostname database.
    pub hostnames: BTreeMap<SystemId, String>,
    // Link State Database.
    pub lsdb: Levels<Lsdb>,
    // LSP origination data.
    pub lsp_orig_last: Option<Instant>,
    pub lsp_orig_backoff: Option<TimeoutTask>,
    pub lsp_orig_pending: Option<LevelType>,
    // Event counters.
    pub counters: Levels<InstanceCounters>,
    pub discontinuity_time: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct InstanceCounters {
    pub corrupted_lsps: u32,
    pub own_lsp_purge: u32,
    pub seqno_skipped: u32,
    pub decision_triggers: u32,
}

#[derive(Debug, Default)]
pub struct InstanceArenas {
    pub interfaces: Interfaces,
    pub adjacencies: Arena<Adjacency>,
    pub lsp_entries: Arena<LspEntry>,
}

// Output channels of the instance.
#[derive(Clone, Debug)]
pub struct InstanceChannelsTx {
    // Protocol input channels (timer and network tasks feed back here).
    pub protocol_input: ProtocolInputChannelsTx,
    // Change notifications toward the decision process.
    pub decision: UnboundedSender<DecisionMsg>,
    // Transmitted PDUs, relayed to the test framework.
    #[cfg(feature = "testing")]
    pub protocol_output: Sender<ProtocolOutputMsg>,
}

#[derive(Clone, Debug)]
pub struct ProtocolInputChannelsTx {
    // PDU Rx event.
    pub net_pdu_rx: Sender<NetRxPduMsg>,
    // Adjacency hold timer event.
    pub adj_holdtimer: Sender<AdjHoldTimerMsg>,
    // Request to run DIS election.
    pub dis_election: UnboundedSender<DisElectionMsg>,
    // Request to send PSNP(s).
    pub send_psnp: UnboundedSender<SendPsnpMsg>,
    // Request to send CSNP(s).
    pub send_csnp: UnboundedSender<SendCsnpMsg>,
    // LSP originate event.
    pub lsp_originate: UnboundedSender<LspOriginateMsg>,
    // LSP purge event.
    pub lsp_purge: UnboundedSender<LspPurgeMsg>,
    // LSP delete event.
    pub lsp_delete: UnboundedSender<LspDeleteMsg>,
    // LSP refresh event.
    pub lsp_refresh: UnboundedSender<LspRefreshMsg>,
}

#[derive(Debug)]
pub struct ProtocolInputChannelsRx {
    // PDU Rx event.
    pub net_pdu_rx: Receiver<NetRxPduMsg>,
    // Adjacency hold timer event.
    pub adj_holdtimer: Receiver<AdjHoldTimerMsg>,
    // Request to run DIS election.
    pub dis_election: UnboundedReceiver<DisElectionMsg>,
    // Request to send PSNP(s).
    pub send_psnp: UnboundedReceiver<SendPsnpMsg>,
    // Request to send CSNP(s).
    pub send_csnp: UnboundedReceiver<SendCsnpMsg>,
    // LSP originate event.
    pub lsp_originate: UnboundedReceiver<LspOriginateMsg>,
    // LSP purge event.
    pub lsp_purge: UnboundedReceiver<LspPurgeMsg>,
    // LSP delete event.
    pub lsp_delete: UnboundedReceiver<LspDeleteMsg>,
    // LSP refresh event.
    pub lsp_refresh: UnboundedReceiver<LspRefreshMsg>,
}

// Operational view of the instance, available once it is active.
pub struct InstanceUpView<'a> {
    pub name: &'a str,
    pub config: &'a InstanceCfg,
    pub state: &'a mut InstanceState,
    pub tx: &'a InstanceChannelsTx,
}

// ===== impl Instance =====

impl Instance {
    // Creates a new protocol instance.
    pub fn new(name: String, tx: InstanceChannelsTx) -> Instance {
        Debug::InstanceCreate.log();

        Instance {
            name,
            config: Default::default(),
            state: None,
            arenas: Default::default(),
            tx,
        }
    }

    // Checks if the instance needs to be started or stopped in response to a
    // configuration or kernel snapshot change.
    pub fn update(&mut self) {
        match self.is_ready() {
            Ok(()) if !self.is_active() => {
                self.start();
            }
            Err(reason) if self.is_active() => {
                self.stop(reason);
            }
            _ => (),
        }
    }

    // Starts the IS-IS instance.
    fn start(&mut self) {
        Debug::InstanceStart.log();

        // Create instance initial state.
        self.state = Some(InstanceState::new());
        let (mut instance, arenas) = self.as_up().unwrap();

        // Start interfaces.
        for iface in arenas.interfaces.iter_mut() {
            if let Err(error) =
                iface.update(&mut instance, &mut arenas.adjacencies)
            {
                error.log();
            }
        }

        // Schedule initial LSP origination.
        instance.schedule_lsp_origination(LevelType::All);
    }

    // Stops the IS-IS instance.
    fn stop(&mut self, reason: InstanceInactiveReason) {
        let Some((mut instance, arenas)) = self.as_up() else {
            return;
        };

        Debug::InstanceStop(reason).log();

        // Stop interfaces.
        let reason = crate::debug::InterfaceInactiveReason::InstanceDown;
        for iface in arenas
            .interfaces
            .iter_mut()
            .filter(|iface| iface.state.active)
        {
            iface.stop(&mut instance, &mut arenas.adjacencies, reason);
        }

        // Clear instance state.
        self.state = None;
    }

    // Returns whether the IS-IS instance is operational.
    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    // Returns whether the instance is ready for IS-IS operation.
    fn is_ready(&self) -> Result<(), InstanceInactiveReason> {
        if !self.config.enabled || self.config.system_id.is_none() {
            return Err(InstanceInactiveReason::AdminDown);
        }

        Ok(())
    }

    // Returns a view struct for the instance if it's operational.
    pub fn as_up(
        &mut self,
    ) -> Option<(InstanceUpView<'_>, &mut InstanceArenas)> {
        if let Some(state) = &mut self.state {
            let instance = InstanceUpView {
                name: &self.name,
                config: &self.config,
                state,
                tx: &self.tx,
            };
            Some((instance, &mut self.arenas))
        } else {
            None
        }
    }

    // Creates the set of channels used to feed protocol events back into the
    // instance's event loop.
    pub fn protocol_input_channels()
    -> (ProtocolInputChannelsTx, ProtocolInputChannelsRx) {
        let (net_pdu_rxp, net_pdu_rxc) = mpsc::channel(4);
        let (adj_holdtimerp, adj_holdtimerc) = mpsc::channel(4);
        let (dis_electionp, dis_electionc) = mpsc::unbounded_channel();
        let (send_psnpp, send_psnpc) = mpsc::unbounded_channel();
        let (send_csnpp, send_csnpc) = mpsc::unbounded_channel();
        let (lsp_originatep, lsp_originatec) = mpsc::unbounded_channel();
        let (lsp_purgep, lsp_purgec) = mpsc::unbounded_channel();
        let (lsp_deletep, lsp_deletec) = mpsc::unbounded_channel();
        let (lsp_refreshp, lsp_refreshc) = mpsc::unbounded_channel();

        let tx = ProtocolInputChannelsTx {
            net_pdu_rx: net_pdu_rxp,
            adj_holdtimer: adj_holdtimerp,
            dis_election: dis_electionp,
            send_psnp: send_psnpp,
            send_csnp: send_csnpp,
            lsp_originate: lsp_originatep,
            lsp_purge: lsp_purgep,
            lsp_delete: lsp_deletep,
            lsp_refresh: lsp_refreshp,
        };
        let rx = ProtocolInputChannelsRx {
            net_pdu_rx: net_pdu_rxc,
            adj_holdtimer: adj_holdtimerc,
            dis_election: dis_electionc,
            send_psnp: send_psnpc,
            send_csnp: send_csnpc,
            lsp_originate: lsp_originatec,
            lsp_purge: lsp_purgec,
            lsp_delete: lsp_deletec,
            lsp_refresh: lsp_refreshc,
        };

        (tx, rx)
    }

    // Applies a full configuration snapshot.
    pub fn apply_config(&mut self, snapshot: ConfigSnapshot) {
        config::apply(self, snapshot);
    }

    // Processes a kernel interface/address snapshot message.
    pub fn process_southbound_msg(&mut self, msg: SouthboundMsg) {
        if let Err(error) = southbound::process_msg(self, msg) {
            error.log();
        }
    }

    // Processes a protocol event message.
    pub fn process_protocol_msg(&mut self, msg: ProtocolInputMsg) {
        // Ignore event if the instance isn't active.
        let Some((mut instance, arenas)) = self.as_up() else {
            return;
        };

        if let Err(error) = process_protocol_msg(&mut instance, arenas, msg) {
            error.log();
        }
    }

    // Runs the instance event loop until all input channels are closed.
    pub async fn run(
        mut self,
        mut protocol_input_rx: ProtocolInputChannelsRx,
        mut southbound_rx: UnboundedReceiver<SouthboundMsg>,
        mut config_rx: UnboundedReceiver<ConfigSnapshot>,
    ) {
        loop {
            tokio::select! {
                msg = config_rx.recv() => {
                    let Some(snapshot) = msg else { break };
                    self.apply_config(snapshot);
                }
                msg = southbound_rx.recv() => {
                    let Some(msg) = msg else { break };
                    self.process_southbound_msg(msg);
                }
                msg = protocol_input_rx.recv() => {
                    let Some(msg) = msg else { break };
                    self.process_protocol_msg(msg);
                }
            }
        }

        // Ensure the instance is disabled before exiting.
        self.stop(InstanceInactiveReason::AdminDown);
        Debug::InstanceDelete.log();
    }

    // Looks up an LSP in the LSDB.
    pub fn lookup_lsp(
        &self,
        level: LevelNumber,
        lsp_id: LspId,
    ) -> Option<&Lsp> {
        let state = self.state.as_ref()?;
        state
            .lsdb
            .get(level)
            .get_by_lspid(&self.arenas.lsp_entries, &lsp_id)
            .map(|(_, lse)| &lse.data)
    }

    // Returns a snapshot of the LSDB for the given level.
    pub fn lsdb_snapshot(&self, level: LevelNumber) -> Vec<Lsp> {
        let Some(state) = &self.state else {
            return vec![];
        };
        state
            .lsdb
            .get(level)
            .iter(&self.arenas.lsp_entries)
            .map(|lse| lse.data.clone())
            .collect()
    }

    // Installs the given LSP into the LSDB and floods it.
    //
    // Returns false if the instance isn't active.
    pub fn insert_lsp(&mut self, level: LevelNumber, lsp: Lsp) -> bool {
        let Some((mut instance, arenas)) = self.as_up() else {
            return false;
        };

        let lse =
            lsdb::install(&mut instance, &mut arenas.lsp_entries, level, lsp);
        let lsp = lse.data.clone();
        for iface in arenas.interfaces.iter_mut() {
            iface.srm_list_add(&instance, level, lsp.clone());
        }

        true
    }

    // Returns an iterator over the adjacencies of the given interface.
    pub fn adjacencies<'a>(
        &'a self,
        ifname: &str,
    ) -> Option<impl Iterator<Item = &'a Adjacency>> {
        let iface = self.arenas.interfaces.get_by_name(ifname)?;
        Some(iface.adjacencies(&self.arenas.adjacencies))
    }
}

// ===== impl InstanceState =====

impl InstanceState {
    fn new() -> InstanceState {
        InstanceState {
            circuit_id_allocator: Default::default(),
            hostnames: Default::default(),
            lsdb: Default::default(),
            lsp_orig_last: None,
            lsp_orig_backoff: None,
            lsp_orig_pending: None,
            counters: Default::default(),
            discontinuity_time: Utc::now(),
        }
    }
}

// ===== impl ProtocolInputChannelsTx =====

impl ProtocolInputChannelsTx {
    pub(crate) fn dis_election(
        &self,
        iface_id: InterfaceId,
        level: LevelNumber,
    ) {
        let msg = DisElectionMsg {
            iface_key: iface_id.into(),
            level,
        };
        let _ = self.dis_election.send(msg);
    }

    pub(crate) fn lsp_purge(
        &self,
        level: LevelNumber,
        lse_id: LspEntryId,
        reason: LspPurgeReason,
    ) {
        let msg = LspPurgeMsg {
            level,
            lse_key: lse_id.into(),
            reason,
        };
        let _ = self.lsp_purge.send(msg);
    }

    pub(crate) fn lsp_refresh(&self, level: LevelNumber, lse_id: LspEntryId) {
        let msg = LspRefreshMsg {
            level,
            lse_key: lse_id.into(),
        };
        let _ = self.lsp_refresh.send(msg);
    }
}

// ===== impl ProtocolInputChannelsRx =====

impl ProtocolInputChannelsRx {
    // Receives the next protocol event message.
    pub async fn recv(&mut self) -> Option<ProtocolInputMsg> {
        tokio::select! {
            biased;
            msg = self.net_pdu_rx.recv() => {
                msg.map(ProtocolInputMsg::NetRxPdu)
            }
            msg = self.adj_holdtimer.recv() => {
                msg.map(ProtocolInputMsg::AdjHoldTimer)
            }
            msg = self.dis_election.recv() => {
                msg.map(ProtocolInputMsg::DisElection)
            }
            msg = self.send_psnp.recv() => {
                msg.map(ProtocolInputMsg::SendPsnp)
            }
            msg = self.send_csnp.recv() => {
                msg.map(ProtocolInputMsg::SendCsnp)
            }
            msg = self.lsp_originate.recv() => {
                msg.map(ProtocolInputMsg::LspOriginate)
            }
            msg = self.lsp_purge.recv() => {
                msg.map(ProtocolInputMsg::LspPurge)
            }
            msg = self.lsp_delete.recv() => {
                msg.map(ProtocolInputMsg::LspDelete)
            }
            msg = self.lsp_refresh.recv() => {
                msg.map(ProtocolInputMsg::LspRefresh)
            }
        }
    }
}

// ===== impl InstanceUpView =====

impl InstanceUpView<'_> {
    pub(crate) fn schedule_lsp_origination(
        &mut self,
        level_type: impl Into<LevelType>,
    ) {
        let level_type = level_type.into();

        // Update pending LSP origination with the union of the current and
        // new level.
        self.state.lsp_orig_pending = match self.state.lsp_orig_pending {
            Some(pending_level) => Some(level_type.union(pending_level)),
            None => Some(level_type),
        };

        #[cfg(not(feature = "testing"))]
        {
            // If LSP origination is currently in backoff, do nothing.
            if self.state.lsp_orig_backoff.is_some() {
                return;
            }

            // If the minimum interval since the last LSP origination hasn't
            // passed, initiate a backoff timer and return.
            if let Some(last) = self.state.lsp_orig_last
                && last.elapsed().as_secs() < lsdb::LSP_MIN_GEN_INTERVAL
            {
                let task = tasks::lsp_originate_timer(
                    &self.tx.protocol_input.lsp_originate,
                );
                self.state.lsp_orig_backoff = Some(task);
                return;
            }
        }

        // Trigger LSP origination.
        let _ = self
            .tx
            .protocol_input
            .lsp_originate
            .send(LspOriginateMsg {});
    }
}

// ===== helper functions =====

fn process_protocol_msg(
    instance: &mut InstanceUpView<'_>,
    arenas: &mut InstanceArenas,
    msg: ProtocolInputMsg,
) -> Result<(), Error> {
    match msg {
        // Received network PDU.
        ProtocolInputMsg::NetRxPdu(msg) => {
            events::process_pdu(
                instance,
                arenas,
                msg.iface_key,
                msg.src,
                msg.pdu,
            )?;
        }
        // Adjacency hold timer event.
        ProtocolInputMsg::AdjHoldTimer(msg) => match msg {
            AdjHoldTimerMsg::Broadcast {
                iface_key,
                adj_key,
                level,
            } => {
                events::process_lan_adj_holdtimer_expiry(
                    instance, arenas, iface_key, adj_key, level,
                )?;
            }
            AdjHoldTimerMsg::PointToPoint { iface_key } => {
                events::process_p2p_adj_holdtimer_expiry(
                    instance, arenas, iface_key,
                )?;
            }
        },
        // Request to run DIS election.
        ProtocolInputMsg::DisElection(msg) => {
            events::process_dis_election(
                instance,
                arenas,
                msg.iface_key,
                msg.level,
            )?;
        }
        // Request to send PSNP(s).
        ProtocolInputMsg::SendPsnp(msg) => {
            events::process_send_psnp(
                instance,
                arenas,
                msg.iface_key,
                msg.level,
            )?;
        }
        // Request to send CSNP(s).
        ProtocolInputMsg::SendCsnp(msg) => {
            events::process_send_csnp(
                instance,
                arenas,
                msg.iface_key,
                msg.level,
            )?;
        }
        // LSP origination event.
        ProtocolInputMsg::LspOriginate(_msg) => {
            events::process_lsp_originate(instance, arenas)?;
        }
        // LSP purge event.
        ProtocolInputMsg::LspPurge(msg) => {
            events::process_lsp_purge(
                instance,
                arenas,
                msg.level,
                msg.lse_key,
                msg.reason,
            )?;
        }
        // LSP delete event.
        ProtocolInputMsg::LspDelete(msg) => {
            events::process_lsp_delete(
                instance,
                arenas,
                msg.level,
                msg.lse_key,
            )?;
        }
        // LSP refresh event.
        ProtocolInputMsg::LspRefresh(msg) => {
            events::process_lsp_refresh(
                instance,
                arenas,
                msg.level,
                msg.lse_key,
            )?;
        }
    }

    Ok(())
}
