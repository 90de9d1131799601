//! Kernel Installer wrapper (component G): translates a route entry into
//! an add/delete forwarding-entry request against the [`KernelRouting`]
//! collaborator.

use std::net::Ipv4Addr;

use itertools::Itertools;

use crate::error::Error;
use crate::net::{Env, IfaceDirection, MrouteDesc};
use crate::table::RouteEntry;

/// Builds the wire-level descriptor for `entry` and installs it. No-op if
/// the entry has no origin or no active downstream interfaces (the caller
/// is expected to check [`RouteEntry::wants_kernel_entry`]-equivalent
/// conditions first, but this is tolerant of being called regardless).
pub fn install(entry: &RouteEntry, upstream_ifindex: u32, env: &mut Env<'_>) {
    let Some(origin) = entry.origin else { return };
    if entry.vif_bits.is_empty() {
        return;
    }

    // Sorted by vif index so the kernel sees a stable descriptor regardless
    // of the registry's own iteration order.
    let out_vif_ttl = env
        .ifaces
        .iter()
        .filter(|iface| iface.direction == IfaceDirection::Downstream)
        .sorted_by_key(|iface| iface.index)
        .map(|iface| {
            let ttl = if entry.vif_bits.is_set(iface.index) {
                iface.threshold
            } else {
                0
            };
            (iface.index, ttl)
        })
        .collect();

    let desc = MrouteDesc::new(entry.group, origin, upstream_ifindex, out_vif_ttl);
    if let Err(error) = env.kernel.add_mroute(&desc) {
        Error::KernelInstallFailure(entry.group, error).log();
    }
}

/// Deletes the forwarding entry for `group`/`origin`. Tolerant of the
/// kernel already having no such entry.
pub fn uninstall(group: Ipv4Addr, origin: Ipv4Addr, env: &mut Env<'_>) {
    if let Err(error) = env.kernel.del_mroute(group, origin) {
        error.log();
    }
}
