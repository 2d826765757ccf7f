//
// Copyright (c) The Ferrite Routing Contributors
//
// SPDX-License-Identifier: MIT
//

#![cfg_attr(
    feature = "testing",
    allow(dead_code, unused_variables, unused_imports)
)]

pub mod adjacency;
pub mod collections;
pub mod config;
pub mod debug;
pub mod error;
pub mod events;
pub mod instance;
pub mod interface;
pub mod lsdb;
pub mod network;
pub mod packet;
pub mod southbound;
pub mod spf;
pub mod tasks;
