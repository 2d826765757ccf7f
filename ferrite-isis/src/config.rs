//
// Copyright (c) The Ferrite Routing Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};
use std::net::{Ipv4Addr, Ipv6Addr};

use ferrite_utils::ip::AddressFamily;
use serde::{Deserialize, Serialize};

use crate::debug::InterfaceInactiveReason;
use crate::instance::Instance;
use crate::interface::InterfaceType;
use crate::packet::{AreaAddr, LevelNumber, LevelType, SystemId};

// Default values from the IETF YANG model for IS-IS.
const DFLT_LSP_MTU: u16 = 1492;
const DFLT_LSP_LIFETIME: u16 = 1200;
const DFLT_LSP_REFRESH: u16 = 900;
const DFLT_LSP_PACING_INTERVAL: u32 = 33;
const DFLT_LSP_RXMT_INTERVAL: u16 = 5;
const DFLT_CSNP_INTERVAL: u16 = 10;
const DFLT_HELLO_INTERVAL: u16 = 10;
const DFLT_HELLO_MULTIPLIER: u16 = 3;
const DFLT_PRIORITY: u8 = 64;
const DFLT_METRIC: u32 = 10;

// Instance-wide configuration snapshot.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
#[serde(default)]
pub struct InstanceCfg {
    pub enabled: bool,
    pub level_type: LevelType,
    pub system_id: Option<SystemId>,
    pub area_addrs: BTreeSet<AreaAddr>,
    pub lsp_mtu: u16,
    pub lsp_lifetime: u16,
    pub lsp_refresh: u16,
    pub metric_type: MetricType,
    pub hostname: Option<String>,
    pub ipv4_router_id: Option<Ipv4Addr>,
    pub ipv6_router_id: Option<Ipv6Addr>,
    pub afs: BTreeSet<AddressFamily>,
    pub overload_status: bool,
}

// Per-interface configuration snapshot.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
#[serde(default)]
pub struct InterfaceCfg {
    pub enabled: bool,
    pub level_type: InheritableConfig<LevelType>,
    pub lsp_pacing_interval: u32,
    pub lsp_rxmt_interval: u16,
    pub passive: bool,
    pub csnp_interval: u16,
    pub hello_padding: bool,
    pub interface_type: InterfaceType,
    pub hello_interval: LevelsCfgWithDefault<u16>,
    pub hello_multiplier: LevelsCfgWithDefault<u16>,
    pub priority: LevelsCfgWithDefault<u8>,
    pub metric: LevelsCfgWithDefault<u32>,
    pub afs: BTreeSet<AddressFamily>,
}

// Full configuration snapshot, applied through a single reconciliation pass.
#[derive(Clone, Debug, Default)]
#[derive(Deserialize, Serialize)]
#[serde(default)]
pub struct ConfigSnapshot {
    pub instance: InstanceCfg,
    pub interfaces: BTreeMap<String, InterfaceCfg>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum MetricType {
    Standard,
    Wide,
    Both,
}

// Configuration value that can be explicitly set or inherited from the
// instance-level configuration.
#[derive(Clone, Copy, Debug)]
#[derive(Deserialize, Serialize)]
pub struct InheritableConfig<T> {
    pub explicit: Option<T>,
    pub resolved: T,
}

// Configuration value with an "all levels" default and optional per-level
// overrides.
#[derive(Clone, Copy, Debug)]
#[derive(Deserialize, Serialize)]
pub struct LevelsCfgWithDefault<T> {
    pub all: T,
    pub l1: Option<T>,
    pub l2: Option<T>,
}

// ===== impl InstanceCfg =====

impl InstanceCfg {
    // Checks if the specified address family is enabled.
    pub(crate) fn is_af_enabled(&self, af: AddressFamily) -> bool {
        self.afs.contains(&af)
    }

    // Returns an iterator over the configured levels.
    pub(crate) fn levels(&self) -> impl Iterator<Item = LevelNumber> + use<> {
        self.level_type.into_iter()
    }
}

impl Default for InstanceCfg {
    fn default() -> InstanceCfg {
        InstanceCfg {
            enabled: true,
            level_type: LevelType::All,
            system_id: None,
            area_addrs: Default::default(),
            lsp_mtu: DFLT_LSP_MTU,
            lsp_lifetime: DFLT_LSP_LIFETIME,
            lsp_refresh: DFLT_LSP_REFRESH,
            metric_type: MetricType::Wide,
            hostname: None,
            ipv4_router_id: None,
            ipv6_router_id: None,
            afs: [AddressFamily::Ipv4, AddressFamily::Ipv6].into(),
            overload_status: false,
        }
    }
}

// ===== impl InterfaceCfg =====

impl InterfaceCfg {
    // Returns an iterator over the levels resolved for this interface.
    pub(crate) fn levels(&self) -> impl Iterator<Item = LevelNumber> + use<> {
        self.level_type.resolved.into_iter()
    }

    // Checks if the specified address family is enabled.
    //
    // An empty interface-level set inherits the instance configuration.
    pub(crate) fn is_af_enabled(
        &self,
        af: AddressFamily,
        instance_cfg: &InstanceCfg,
    ) -> bool {
        if !instance_cfg.is_af_enabled(af) {
            return false;
        }

        self.afs.is_empty() || self.afs.contains(&af)
    }

    // Calculates the hello hold time for a given level by multiplying the
    // hello interval and multiplier.
    pub(crate) fn hello_holdtime(&self, level: impl Into<LevelType>) -> u16 {
        let level = level.into();
        self.hello_interval.get(level) * self.hello_multiplier.get(level)
    }

    // Resolves the level type.
    fn resolved_level_type(&self, instance_cfg: &InstanceCfg) -> LevelType {
        match instance_cfg.level_type {
            LevelType::L1 | LevelType::L2 => instance_cfg.level_type,
            LevelType::All => self.level_type.explicit.unwrap_or(LevelType::All),
        }
    }
}

impl Default for InterfaceCfg {
    fn default() -> InterfaceCfg {
        InterfaceCfg {
            enabled: true,
            level_type: InheritableConfig {
                explicit: None,
                resolved: LevelType::All,
            },
            lsp_pacing_interval: DFLT_LSP_PACING_INTERVAL,
            lsp_rxmt_interval: DFLT_LSP_RXMT_INTERVAL,
            passive: false,
            csnp_interval: DFLT_CSNP_INTERVAL,
            hello_padding: true,
            interface_type: InterfaceType::Broadcast,
            hello_interval: LevelsCfgWithDefault::new(DFLT_HELLO_INTERVAL),
            hello_multiplier: LevelsCfgWithDefault::new(DFLT_HELLO_MULTIPLIER),
            priority: LevelsCfgWithDefault::new(DFLT_PRIORITY),
            metric: LevelsCfgWithDefault::new(DFLT_METRIC),
            afs: Default::default(),
        }
    }
}

// ===== impl MetricType =====

impl MetricType {
    pub(crate) fn is_standard_enabled(&self) -> bool {
        matches!(self, MetricType::Standard | MetricType::Both)
    }

    pub(crate) fn is_wide_enabled(&self) -> bool {
        matches!(self, MetricType::Wide | MetricType::Both)
    }
}

// ===== impl LevelsCfgWithDefault =====

impl<T: Copy> LevelsCfgWithDefault<T> {
    const fn new(all: T) -> Self {
        LevelsCfgWithDefault {
            all,
            l1: None,
            l2: None,
        }
    }

    pub(crate) fn get(&self, level: impl Into<LevelType>) -> T {
        let level = level.into();
        match level {
            LevelType::L1 => self.l1.unwrap_or(self.all),
            LevelType::L2 => self.l2.unwrap_or(self.all),
            LevelType::All => self.all,
        }
    }
}

// ===== global functions =====

// Applies a full configuration snapshot to the instance.
//
// The snapshot is diffed against the running interface table: interfaces
// missing from the snapshot are stopped and removed, new ones are created,
// and every remaining circuit has its readiness re-evaluated.
pub fn apply(instance: &mut Instance, snapshot: ConfigSnapshot) {
    instance.config = snapshot.instance;

    // Remove interfaces that are no longer configured.
    let removed = instance
        .arenas
        .interfaces
        .iter()
        .filter(|iface| !snapshot.interfaces.contains_key(&iface.name))
        .map(|iface| iface.index)
        .collect::<Vec<_>>();
    for iface_idx in removed {
        if let Some((mut instance_up, arenas)) = instance.as_up() {
            let iface = &mut arenas.interfaces[iface_idx];
            iface.stop(
                &mut instance_up,
                &mut arenas.adjacencies,
                InterfaceInactiveReason::AdminDown,
            );
        }
        instance.arenas.interfaces.delete(iface_idx);
    }

    // Create or update the configured interfaces.
    for (ifname, mut iface_cfg) in snapshot.interfaces {
        iface_cfg.level_type.resolved =
            iface_cfg.resolved_level_type(&instance.config);

        if instance.arenas.interfaces.get_by_name(&ifname).is_none() {
            instance.arenas.interfaces.insert(&ifname);
        }
        if let Some(iface) = instance.arenas.interfaces.get_mut_by_name(&ifname)
        {
            iface.config = iface_cfg;
        }
    }

    // Re-evaluate the instance and every circuit.
    instance.update();
    if let Some((mut instance_up, arenas)) = instance.as_up() {
        for iface in arenas.interfaces.iter_mut() {
            if let Err(error) =
                iface.update(&mut instance_up, &mut arenas.adjacencies)
            {
                error.log();
            }
        }

        // Refresh periodic tasks that depend on configurable intervals.
        for iface in arenas
            .interfaces
            .iter_mut()
            .filter(|iface| iface.state.active)
            .filter(|iface| !iface.is_passive())
        {
            iface.hello_interval_start(&instance_up, LevelType::All);
        }

        instance_up.schedule_lsp_origination(LevelType::All);
    }
}
