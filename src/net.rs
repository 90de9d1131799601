//! Collaborator traits for the pieces of the proxy that live outside this
//! crate: interface discovery, the kernel multicast-routing syscall
//! surface, the multicast socket layer, and the IGMP packet sender.
//!
//! Bundled into [`Env`], the "view" the reference instance code passes
//! around instead of threading four separate parameters through every
//! call.

use std::net::Ipv4Addr;

use bitflags::bitflags;
use derive_new::new;

use crate::error::IoError;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct IfaceFlags: u8 {
        const LOOPBACK = 0x01;
        const OPERATIVE = 0x02;
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IfaceDirection {
    Upstream,
    Downstream,
    Disabled,
}

#[derive(Clone, Copy, Debug)]
pub struct Iface {
    pub index: u32,
    pub address: Ipv4Addr,
    pub flags: IfaceFlags,
    pub direction: IfaceDirection,
    pub threshold: u8,
}

impl Iface {
    pub fn is_up(&self) -> bool {
        self.flags.contains(IfaceFlags::OPERATIVE)
    }

    pub fn is_loopback(&self) -> bool {
        self.flags.contains(IfaceFlags::LOOPBACK)
    }
}

/// Interface discovery, out of scope for this crate: implemented by
/// whatever enumerates the host's network interfaces.
pub trait InterfaceRegistry {
    fn by_index(&self, index: u32) -> Option<Iface>;
    /// Resolves a source address to the interface whose subnet contains
    /// it, used to determine which downstream interface a report or leave
    /// arrived on.
    fn by_address(&self, address: Ipv4Addr) -> Option<Iface>;
    fn iter(&self) -> Vec<Iface>;
}

/// A forwarding-entry descriptor for a single multicast group.
#[derive(Clone, Debug, new)]
pub struct MrouteDesc {
    pub group: Ipv4Addr,
    pub origin: Ipv4Addr,
    pub in_vif: u32,
    /// Per-output-interface TTL threshold; index `i` is zero when the
    /// interface is not currently a forwarding target for this group.
    pub out_vif_ttl: Vec<(u32, u8)>,
}

/// The kernel multicast-routing syscall surface, out of scope for this
/// crate.
pub trait KernelRouting {
    fn add_mroute(&mut self, desc: &MrouteDesc) -> Result<(), IoError>;
    fn del_mroute(&mut self, group: Ipv4Addr, origin: Ipv4Addr) -> Result<(), IoError>;
}

/// Multicast group membership on a raw socket, out of scope for this
/// crate.
pub trait SocketLayer {
    fn join_group(&mut self, ifindex: u32, group: Ipv4Addr) -> Result<(), IoError>;
    fn leave_group(&mut self, ifindex: u32, group: Ipv4Addr) -> Result<(), IoError>;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IgmpKind {
    MembershipQuery,
    GroupSpecificQuery,
}

/// IGMP packet encode + send, out of scope for this crate.
pub trait PacketSender {
    fn send_igmp(
        &mut self,
        src: Ipv4Addr,
        dst: Ipv4Addr,
        kind: IgmpKind,
        max_resp_time_deciseconds: u8,
        group: Ipv4Addr,
    ) -> Result<(), IoError>;
}

/// Borrowed bundle of the collaborator surfaces, threaded through the
/// table/querier/handler functions that need them, mirroring the
/// reference instance code's own bundled-context view struct.
pub struct Env<'a> {
    pub ifaces: &'a dyn InterfaceRegistry,
    pub kernel: &'a mut dyn KernelRouting,
    pub sockets: &'a mut dyn SocketLayer,
    pub packets: &'a mut dyn PacketSender,
}
