//
// Copyright (c) The Ferrite Routing Contributors
//
// SPDX-License-Identifier: MIT
//

use serde::{Deserialize, Serialize};

use crate::debug::Debug;
use crate::instance::InstanceUpView;
use crate::packet::LevelNumber;

// Change notification emitted toward the decision process.
//
// The shortest-path computation and route installation live outside of this
// crate; whenever reachability, adjacency or LSDB state changes, a
// notification carrying the affected level is published on the instance's
// decision channel so the external process can schedule an SPF run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct DecisionMsg {
    pub level: LevelNumber,
}

// ===== global functions =====

// Signals the decision process that the given level's topology has changed.
pub(crate) fn schedule(instance: &mut InstanceUpView<'_>, level: LevelNumber) {
    Debug::DecisionTrigger(level).log();

    instance.state.counters.get_mut(level).decision_triggers += 1;
    let _ = instance.tx.decision.send(DecisionMsg { level });
}
