//
// Copyright (c) The Ferrite Routing Contributors
//
// SPDX-License-Identifier: MIT
//

use ferrite_isis::adjacency::{P2pHandshakeAction, p2p_handshake};
use ferrite_isis::packet::LevelType;

use LevelType::{All, L1, L2};
use P2pHandshakeAction::{Accept, Down, Reject, Up};

// ISO 10589 tables 5, 6 and 7: matching areas, no existing adjacency.
#[test]
fn p2p_handshake_matching_areas_no_adjacency() {
    // Table 5 - IS is level 1 only.
    assert_eq!(p2p_handshake(L1, L1, None, true), Up(L1));
    assert_eq!(p2p_handshake(L1, All, None, true), Up(L1));
    assert_eq!(p2p_handshake(L1, L2, None, true), Reject);

    // Table 6 - IS is level 1 and 2.
    assert_eq!(p2p_handshake(All, L1, None, true), Up(L1));
    assert_eq!(p2p_handshake(All, All, None, true), Up(All));
    assert_eq!(p2p_handshake(All, L2, None, true), Up(L2));

    // Table 7 - IS is level 2 only.
    assert_eq!(p2p_handshake(L2, L1, None, true), Reject);
    assert_eq!(p2p_handshake(L2, All, None, true), Up(L2));
    assert_eq!(p2p_handshake(L2, L2, None, true), Up(L2));
}

// ISO 10589 table 8: non-matching areas, no existing adjacency.
#[test]
fn p2p_handshake_non_matching_areas_no_adjacency() {
    // A level 1 only IS never accepts a hello from another area.
    assert_eq!(p2p_handshake(L1, L1, None, false), Reject);
    assert_eq!(p2p_handshake(L1, All, None, false), Reject);
    assert_eq!(p2p_handshake(L1, L2, None, false), Reject);

    // Level 2 capable systems form an L2 adjacency across areas.
    assert_eq!(p2p_handshake(All, L1, None, false), Reject);
    assert_eq!(p2p_handshake(All, All, None, false), Up(L2));
    assert_eq!(p2p_handshake(All, L2, None, false), Up(L2));
    assert_eq!(p2p_handshake(L2, L1, None, false), Reject);
    assert_eq!(p2p_handshake(L2, All, None, false), Up(L2));
    assert_eq!(p2p_handshake(L2, L2, None, false), Up(L2));
}

// A hello consistent with the existing adjacency refreshes it; an
// inconsistent one tears it down.
#[test]
fn p2p_handshake_existing_adjacency() {
    // Matching areas.
    assert_eq!(p2p_handshake(L1, L1, Some(L1), true), Accept);
    assert_eq!(p2p_handshake(L1, L2, Some(L1), true), Down);
    assert_eq!(p2p_handshake(All, L1, Some(L1), true), Accept);
    assert_eq!(p2p_handshake(All, L1, Some(All), true), Down);
    assert_eq!(p2p_handshake(All, All, Some(All), true), Accept);
    assert_eq!(p2p_handshake(All, All, Some(L1), true), Down);
    assert_eq!(p2p_handshake(All, All, Some(L2), true), Down);
    assert_eq!(p2p_handshake(All, L2, Some(L2), true), Accept);
    assert_eq!(p2p_handshake(All, L2, Some(All), true), Down);
    assert_eq!(p2p_handshake(L2, L2, Some(L2), true), Accept);
    assert_eq!(p2p_handshake(L2, L1, Some(L2), true), Down);

    // Non-matching areas: only an existing L2 adjacency survives.
    assert_eq!(p2p_handshake(All, L2, Some(L2), false), Accept);
    assert_eq!(p2p_handshake(All, All, Some(L2), false), Accept);
    assert_eq!(p2p_handshake(All, L2, Some(All), false), Down);
    assert_eq!(p2p_handshake(All, L1, Some(L2), false), Down);
    assert_eq!(p2p_handshake(L1, L1, Some(L1), false), Down);
    assert_eq!(p2p_handshake(L2, L2, Some(L2), false), Accept);
}
