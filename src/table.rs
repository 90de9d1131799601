//! Route Table (component D): the ordered collection of active multicast
//! groups, their subscriber lists, aging bitmaps, and upstream state.
//!
//! Grounded on the aging/route-lifecycle algorithm of a reference
//! mrouted-style proxy: bitmap-based virtual-interface membership, a
//! confirm-then-commit aging cycle, and unconditional last-member probing
//! after every accepted leave.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use derive_new::new;
use serde::Serialize;

use crate::config::Config;
use crate::debug::Debug;
use crate::error::Error;
use crate::net::{Env, IfaceDirection};
use crate::subscriber::SubscriberList;

/// Bitmap over downstream virtual-interface indices. A plain `u32` mirrors
/// the reference implementation's `BIT_SET`/`BIT_TST` macros closely enough
/// that at most 32 downstream interfaces are addressable, which matches the
/// conventional `MAXVIFS` limit of a kernel multicast-routing table.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct VifBitmap(u32);

impl VifBitmap {
    pub fn is_set(&self, ifindex: u32) -> bool {
        ifindex < 32 && self.0 & (1 << ifindex) != 0
    }

    pub fn set(&mut self, ifindex: u32) {
        if ifindex < 32 {
            self.0 |= 1 << ifindex;
        }
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn union(&mut self, other: VifBitmap) {
        self.0 |= other.0;
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum UpstreamState {
    NotJoined,
    Joined,
    CheckLastMember,
}

#[derive(Clone, Copy, Debug, new)]
pub struct ProbeState {
    pub ifx: u32,
    pub vif_addr: Ipv4Addr,
    #[new(value = "false")]
    pub started: bool,
}

#[derive(Clone, Debug)]
pub struct RouteEntry {
    pub group: Ipv4Addr,
    pub origin: Option<Ipv4Addr>,
    pub vif_bits: VifBitmap,
    pub age_vif_bits: VifBitmap,
    pub upstream_state: UpstreamState,
    pub age_value: u8,
    pub age_activity: u8,
    pub subscribers: SubscriberList,
    pub probe: Option<ProbeState>,
    pub created: DateTime<Utc>,
}

impl RouteEntry {
    fn new(group: Ipv4Addr, robustness: u8) -> Self {
        RouteEntry {
            group,
            origin: None,
            vif_bits: VifBitmap::default(),
            age_vif_bits: VifBitmap::default(),
            upstream_state: UpstreamState::NotJoined,
            age_value: robustness,
            age_activity: 0,
            subscribers: SubscriberList::new(),
            probe: None,
            created: Utc::now(),
        }
    }

    fn wants_kernel_entry(&self) -> bool {
        self.origin.is_some() && !self.vif_bits.is_empty()
    }
}

enum AgeOutcome {
    Continue,
    ReinstallKernel,
    Remove,
}

/// Runs one aging-sweep step against `entry` in isolation (no I/O); the
/// caller translates the outcome into kernel/upstream side effects.
fn age_step(entry: &mut RouteEntry, robustness: u8) -> AgeOutcome {
    entry.age_value = entry.age_value.saturating_sub(1);
    for (ifindex, src) in entry.subscribers.age() {
        Debug::SubscriberAged(&entry.group, ifindex, &src).log();
    }

    if !entry.age_vif_bits.is_empty() && entry.age_activity == 0 {
        if entry.vif_bits == entry.age_vif_bits {
            entry.age_value = robustness;
        } else {
            entry.age_activity += 1;
            entry.vif_bits = entry.age_vif_bits;
        }
    } else if entry.age_activity > 0 && entry.vif_bits != entry.age_vif_bits {
        entry.vif_bits.union(entry.age_vif_bits);
        entry.age_activity += 1;
    }

    let outcome = if entry.age_value == 0 {
        if entry.age_activity > 0 {
            entry.age_value = robustness;
            entry.age_activity = 0;
            AgeOutcome::ReinstallKernel
        } else {
            AgeOutcome::Remove
        }
    } else {
        AgeOutcome::Continue
    };

    entry.age_vif_bits.clear();
    outcome
}

pub struct RouteTable {
    routes: BTreeMap<Ipv4Addr, RouteEntry>,
    config: Config,
    upstream_ifindex: u32,
}

impl RouteTable {
    pub fn new(config: Config, upstream_ifindex: u32) -> Self {
        RouteTable {
            routes: BTreeMap::new(),
            config,
            upstream_ifindex,
        }
    }

    pub fn find(&self, group: Ipv4Addr) -> Option<&RouteEntry> {
        self.routes.get(&group)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.routes.values()
    }

    fn get_or_create(&mut self, group: Ipv4Addr) -> &mut RouteEntry {
        let robustness = self.config.robustness_value;
        if !self.routes.contains_key(&group) {
            Debug::RouteCreated(&group).log();
        }
        self.routes
            .entry(group)
            .or_insert_with(|| RouteEntry::new(group, robustness))
    }

    pub fn insert_or_refresh(
        &mut self,
        group: Ipv4Addr,
        ifindex: u32,
        src: Ipv4Addr,
        env: &mut Env<'_>,
    ) -> Result<(), Error> {
        validate_group(group)?;
        validate_downstream(env, ifindex)?;

        let robustness = self.config.robustness_value;
        let entry = self.get_or_create(group);
        let gained_bit = !entry.vif_bits.is_set(ifindex);
        entry.vif_bits.set(ifindex);
        entry.age_vif_bits.set(ifindex);
        entry.subscribers.add(ifindex, src, robustness);
        Debug::SubscriberAdded(&group, ifindex, &src).log();

        let was_check_last_member =
            entry.upstream_state == UpstreamState::CheckLastMember;
        if was_check_last_member {
            entry.upstream_state = UpstreamState::Joined;
            entry.age_value = robustness;
            entry.age_activity = 0;
            entry.probe = None;
        }
        let needs_install = gained_bit && entry.wants_kernel_entry();
        let needs_join = entry.upstream_state != UpstreamState::Joined;
        if needs_join {
            entry.upstream_state = UpstreamState::Joined;
        }

        if needs_install {
            self.reinstall_kernel(group, env);
        }
        if needs_join {
            if let Err(error) = env.sockets.join_group(self.upstream_ifindex, group) {
                error.log();
            }
        }
        Ok(())
    }

    pub fn leave(
        &mut self,
        group: Ipv4Addr,
        ifindex: u32,
        src: Ipv4Addr,
        env: &mut Env<'_>,
    ) {
        let Some(entry) = self.routes.get_mut(&group) else {
            return;
        };
        entry.subscribers.remove(ifindex, src);

        if entry.subscribers.is_empty() && self.config.fast_upstream_leave {
            self.remove_route(group, env);
        }
    }

    pub fn activate(&mut self, group: Ipv4Addr, origin: Ipv4Addr, env: &mut Env<'_>) {
        let entry = self.get_or_create(group);
        if let Some(existing) = entry.origin {
            if existing != origin {
                tracing::warn!(%group, old = %existing, new = %origin, "multicast source changed");
            }
        }
        entry.origin = Some(origin);
        if entry.wants_kernel_entry() {
            self.reinstall_kernel(group, env);
        }
    }

    pub fn set_last_member_mode(
        &mut self,
        group: Ipv4Addr,
        ifx: u32,
        vif_addr: Ipv4Addr,
    ) {
        let Some(entry) = self.routes.get_mut(&group) else {
            return;
        };
        let from = entry.upstream_state;
        entry.upstream_state = UpstreamState::CheckLastMember;
        entry.age_value = self.config.last_member_query_count;
        entry.age_activity = 0;
        // Stale membership observed before the leave must not be read as a
        // fresh response during the probe countdown.
        entry.age_vif_bits.clear();
        entry.probe = Some(ProbeState::new(ifx, vif_addr));
        Debug::UpstreamStateChange(&group, from, UpstreamState::CheckLastMember).log();
    }

    pub fn last_member_probe_tick(
        &mut self,
        group: Ipv4Addr,
        env: &mut Env<'_>,
    ) -> Option<(u32, Ipv4Addr)> {
        let target = {
            let entry = self.routes.get_mut(&group)?;
            let probe = entry.probe.as_mut()?;
            if !probe.started {
                probe.started = true;
                return Some((probe.ifx, probe.vif_addr));
            }
            (probe.ifx, probe.vif_addr)
        };

        let entry = self.routes.get_mut(&group)?;
        let robustness = self.config.robustness_value;
        match age_step(entry, robustness) {
            AgeOutcome::Remove => {
                self.remove_route(group, env);
                None
            }
            AgeOutcome::ReinstallKernel => {
                if let Some(entry) = self.routes.get_mut(&group) {
                    entry.probe = None;
                }
                self.reinstall_kernel(group, env);
                None
            }
            AgeOutcome::Continue => Some(target),
        }
    }

    pub fn age_all(&mut self, env: &mut Env<'_>) {
        let robustness = self.config.robustness_value;
        let groups: Vec<Ipv4Addr> = self
            .routes
            .iter()
            .filter(|(_, e)| e.upstream_state != UpstreamState::CheckLastMember)
            .map(|(g, _)| *g)
            .collect();

        for group in groups {
            let Some(entry) = self.routes.get_mut(&group) else {
                continue;
            };
            match age_step(entry, robustness) {
                AgeOutcome::Continue => {}
                AgeOutcome::ReinstallKernel => self.reinstall_kernel(group, env),
                AgeOutcome::Remove => self.remove_route(group, env),
            }
        }
    }

    pub fn clear_all(&mut self, env: &mut Env<'_>) {
        let groups: Vec<Ipv4Addr> = self.routes.keys().copied().collect();
        for group in groups {
            self.remove_route(group, env);
        }
    }

    fn remove_route(&mut self, group: Ipv4Addr, env: &mut Env<'_>) {
        let Some(entry) = self.routes.remove(&group) else {
            return;
        };
        Debug::RouteRemoved(&group).log();
        if entry.upstream_state != UpstreamState::NotJoined {
            if let Err(error) = env.sockets.leave_group(self.upstream_ifindex, group) {
                error.log();
            }
        }
        if let Some(origin) = entry.origin {
            crate::kernel::uninstall(group, origin, env);
        }
    }

    fn reinstall_kernel(&mut self, group: Ipv4Addr, env: &mut Env<'_>) {
        let Some(entry) = self.routes.get(&group) else {
            return;
        };
        crate::kernel::install(entry, self.upstream_ifindex, env);
    }
}

fn validate_group(group: Ipv4Addr) -> Result<(), Error> {
    let octets = group.octets();
    if octets[0] < 224 || octets[0] > 239 {
        return Err(Error::InvalidGroup(group));
    }
    if octets[0] == 224 && octets[1] == 0 && octets[2] == 0 {
        return Err(Error::InvalidGroup(group));
    }
    Ok(())
}

fn validate_downstream(env: &Env<'_>, ifindex: u32) -> Result<(), Error> {
    let iface = env
        .ifaces
        .by_index(ifindex)
        .ok_or(Error::InterfaceIndexOutOfRange(ifindex))?;
    if iface.direction != IfaceDirection::Downstream {
        return Err(Error::WrongInterfaceDirection(ifindex));
    }
    Ok(())
}
