//
// Copyright (c) The Ferrite Routing Contributors
//
// SPDX-License-Identifier: MIT
//

use bitflags::bitflags;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::mac_addr::MacAddr;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct InterfaceFlags: u8 {
        const LOOPBACK = 0x01;
        const OPERATIVE = 0x02;
        const BROADCAST = 0x04;
    }
}

// Kernel interface/address snapshot messages.
//
// These are produced by an external netlink listener and consumed by the
// protocol instances; the protocol core never performs netlink calls itself.
#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub enum SouthboundMsg {
    InterfaceUpd(InterfaceUpdateMsg),
    InterfaceDel(String),
    AddressAdd(AddressMsg),
    AddressDel(AddressMsg),
    HostnameUpd(Option<String>),
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct InterfaceUpdateMsg {
    pub ifname: String,
    pub ifindex: u32,
    pub mtu: u32,
    pub flags: InterfaceFlags,
    pub mac_address: MacAddr,
}

#[derive(Clone, Debug)]
#[derive(Deserialize, Serialize)]
pub struct AddressMsg {
    pub ifname: String,
    pub addr: IpNetwork,
}
