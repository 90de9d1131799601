//! In-memory collaborator mocks used by integration tests. Gated behind
//! the `testing` feature, mirroring the reference crate's own
//! self-referencing `testing`-feature dev-dependency.

use std::net::Ipv4Addr;

use crate::error::IoError;
use crate::net::{Iface, IfaceDirection, IfaceFlags, IgmpKind, InterfaceRegistry, KernelRouting, MrouteDesc, PacketSender, SocketLayer};

#[derive(Clone, Debug)]
pub struct MockRegistry {
    pub ifaces: Vec<Iface>,
}

impl MockRegistry {
    pub fn new() -> Self {
        MockRegistry { ifaces: Vec::new() }
    }

    pub fn with_iface(
        mut self,
        index: u32,
        address: &str,
        direction: IfaceDirection,
        threshold: u8,
    ) -> Self {
        self.ifaces.push(Iface {
            index,
            address: address.parse().unwrap(),
            flags: IfaceFlags::OPERATIVE,
            direction,
            threshold,
        });
        self
    }
}

impl Default for MockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InterfaceRegistry for MockRegistry {
    fn by_index(&self, index: u32) -> Option<Iface> {
        self.ifaces.iter().find(|i| i.index == index).copied()
    }

    /// Resolves `address` to the interface whose /24 contains it, matching
    /// the subnet-membership lookup the real registry performs. Returns
    /// the interface itself when `address` is its own local address (the
    /// request handler treats that case as self-origin separately).
    fn by_address(&self, address: Ipv4Addr) -> Option<Iface> {
        self.ifaces
            .iter()
            .find(|i| i.address.octets()[..3] == address.octets()[..3])
            .copied()
    }

    fn iter(&self) -> Vec<Iface> {
        self.ifaces.clone()
    }
}

#[derive(Default)]
pub struct MockKernel {
    pub installed: Vec<MrouteDesc>,
    pub deleted: Vec<(Ipv4Addr, Ipv4Addr)>,
}

impl KernelRouting for MockKernel {
    fn add_mroute(&mut self, desc: &MrouteDesc) -> Result<(), IoError> {
        self.installed.push(desc.clone());
        Ok(())
    }

    fn del_mroute(&mut self, group: Ipv4Addr, origin: Ipv4Addr) -> Result<(), IoError> {
        self.deleted.push((group, origin));
        Ok(())
    }
}

#[derive(Default)]
pub struct MockSockets {
    pub joined: Vec<(u32, Ipv4Addr)>,
    pub left: Vec<(u32, Ipv4Addr)>,
}

impl SocketLayer for MockSockets {
    fn join_group(&mut self, ifindex: u32, group: Ipv4Addr) -> Result<(), IoError> {
        self.joined.push((ifindex, group));
        Ok(())
    }

    fn leave_group(&mut self, ifindex: u32, group: Ipv4Addr) -> Result<(), IoError> {
        self.left.push((ifindex, group));
        Ok(())
    }
}

#[derive(Default)]
pub struct MockPackets {
    pub sent: Vec<(Ipv4Addr, Ipv4Addr, IgmpKind, u8, Ipv4Addr)>,
}

impl PacketSender for MockPackets {
    fn send_igmp(
        &mut self,
        src: Ipv4Addr,
        dst: Ipv4Addr,
        kind: IgmpKind,
        max_resp_time_deciseconds: u8,
        group: Ipv4Addr,
    ) -> Result<(), IoError> {
        self.sent.push((src, dst, kind, max_resp_time_deciseconds, group));
        Ok(())
    }
}
