//
// Copyright (c) The Ferrite Routing Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(unsafe_code)]

use std::os::raw::{c_int, c_void};
use std::os::unix::io::AsRawFd;

use nix::sys::socket::{LinkAddr, SockaddrLike};

// Normal build: re-export standard socket types.
#[cfg(not(feature = "testing"))]
pub use {socket2::Socket, tokio::io::unix::AsyncFd};

// Test build: export mock sockets.
#[cfg(feature = "testing")]
pub use crate::socket::mock::{AsyncFd, Socket};

// Useful type definition.
type Result<T> = std::io::Result<T>;

// Extension methods for AF_PACKET sockets.
pub trait SocketExt: AsRawFd {
    // Attaches a classic BPF program to the socket.
    fn attach_packet_filter(&self, filter: &[libc::sock_filter]) -> Result<()> {
        let prog = libc::sock_fprog {
            len: filter.len() as u16,
            filter: filter.as_ptr() as *mut libc::sock_filter,
        };

        setsockopt(
            self,
            libc::SOL_SOCKET,
            libc::SO_ATTACH_FILTER,
            &prog as *const _ as *const c_void,
            std::mem::size_of::<libc::sock_fprog>() as libc::socklen_t,
        )
    }

    // Executes an operation of the PACKET_ADD_MEMBERSHIP type.
    fn join_packet_multicast(&self, addr: [u8; 6], ifindex: u32) -> Result<()> {
        let mreq = packet_mreq(addr, ifindex);

        setsockopt(
            self,
            libc::SOL_PACKET,
            libc::PACKET_ADD_MEMBERSHIP,
            &mreq as *const _ as *const c_void,
            std::mem::size_of::<libc::packet_mreq>() as libc::socklen_t,
        )
    }

    // Executes an operation of the PACKET_DROP_MEMBERSHIP type.
    fn leave_packet_multicast(
        &self,
        addr: [u8; 6],
        ifindex: u32,
    ) -> Result<()> {
        let mreq = packet_mreq(addr, ifindex);

        setsockopt(
            self,
            libc::SOL_PACKET,
            libc::PACKET_DROP_MEMBERSHIP,
            &mreq as *const _ as *const c_void,
            std::mem::size_of::<libc::packet_mreq>() as libc::socklen_t,
        )
    }
}

#[cfg(not(feature = "testing"))]
impl SocketExt for Socket {}

// Extension methods for AF_PACKET link-layer addresses.
pub trait LinkAddrExt {
    // Builds a link-layer socket address from its components.
    fn new(protocol: u16, ifindex: u32, addr: Option<[u8; 6]>) -> LinkAddr;
}

impl LinkAddrExt for LinkAddr {
    fn new(protocol: u16, ifindex: u32, addr: Option<[u8; 6]>) -> LinkAddr {
        let mut sll = libc::sockaddr_ll {
            sll_family: libc::AF_PACKET as libc::sa_family_t,
            sll_protocol: protocol.to_be(),
            sll_ifindex: ifindex as libc::c_int,
            sll_hatype: 0,
            sll_pkttype: 0,
            sll_halen: 0,
            sll_addr: [0; 8],
        };
        if let Some(addr) = addr {
            sll.sll_halen = 6;
            sll.sll_addr[..6].copy_from_slice(&addr);
        }
        unsafe {
            LinkAddr::from_raw(
                &sll as *const _ as *const libc::sockaddr,
                Some(std::mem::size_of::<libc::sockaddr_ll>()
                    as libc::socklen_t),
            )
            .unwrap()
        }
    }
}

// ===== Mock sockets for unit testing =====

pub mod mock {
    #[derive(Debug, Default)]
    pub struct AsyncFd<T>(T);

    #[derive(Debug, Default)]
    pub struct Socket {}

    impl<T> AsyncFd<T> {
        pub fn new(inner: T) -> std::io::Result<Self> {
            Ok(Self(inner))
        }

        pub fn get_ref(&self) -> &T {
            &self.0
        }
    }
}

// ===== helper functions =====

fn packet_mreq(addr: [u8; 6], ifindex: u32) -> libc::packet_mreq {
    let mut mr_address = [0; 8];
    mr_address[..6].copy_from_slice(&addr);
    libc::packet_mreq {
        mr_ifindex: ifindex as c_int,
        mr_type: libc::PACKET_MR_MULTICAST as libc::c_ushort,
        mr_alen: 6,
        mr_address,
    }
}

fn setsockopt<F: AsRawFd + ?Sized>(
    sock: &F,
    opt: c_int,
    val: c_int,
    optval: *const c_void,
    optlen: libc::socklen_t,
) -> Result<()> {
    let ret;

    unsafe {
        ret = libc::setsockopt(sock.as_raw_fd(), opt, val, optval, optlen);
    };
    if ret == -1 {
        return Err(std::io::Error::last_os_error());
    }

    Ok(())
}
