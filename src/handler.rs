//! Request Handler (component F): validates and routes decoded IGMP
//! events into the route table and querier.

use std::net::Ipv4Addr;
use std::time::Instant;

use crate::error::Error;
use crate::net::{Env, IfaceDirection};
use crate::querier::Querier;
use crate::table::RouteTable;
use crate::timer::TimerQueue;

fn resolve_downstream(env: &Env<'_>, src: Ipv4Addr) -> Result<u32, Error> {
    if env.ifaces.iter().any(|iface| iface.address == src) {
        return Err(Error::SelfOrigin(src));
    }
    // The reference proxy resolves the sending interface from the subnet
    // the source address belongs to; here that resolution is delegated to
    // the interface registry collaborator via `by_address`, which is
    // expected to match on subnet membership rather than exact address.
    let iface = env
        .ifaces
        .by_address(src)
        .ok_or(Error::UnresolvedSource(src))?;
    if iface.direction != IfaceDirection::Downstream {
        return Err(Error::WrongInterfaceDirection(iface.index));
    }
    Ok(iface.index)
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

pub fn on_report(
    src: Ipv4Addr,
    group: Ipv4Addr,
    table: &mut RouteTable,
    env: &mut Env<'_>,
) {
    if let Err(error) = validate_group(group) {
        error.log();
        return;
    }
    let ifindex = match resolve_downstream(env, src) {
        Ok(ifindex) => ifindex,
        Err(error) => {
            error.log();
            return;
        }
    };
    if let Err(error) = table.insert_or_refresh(group, ifindex, src, env) {
        error.log();
    }
}

#[allow(clippy::too_many_arguments)]
pub fn on_leave(
    src: Ipv4Addr,
    group: Ipv4Addr,
    now: Instant,
    table: &mut RouteTable,
    querier: &mut Querier,
    timers: &mut TimerQueue,
    env: &mut Env<'_>,
) {
    if let Err(error) = validate_group(group) {
        error.log();
        return;
    }
    let ifindex = match resolve_downstream(env, src) {
        Ok(ifindex) => ifindex,
        Err(error) => {
            error.log();
            return;
        }
    };
    let Some(iface) = env.ifaces.by_index(ifindex) else {
        return;
    };
    table.leave(group, ifindex, src, env);
    // Last-member detection starts unconditionally after every accepted
    // leave, even if other subscribers remain for the group; a refresh
    // from a remaining subscriber naturally cancels it (see
    // `RouteTable::insert_or_refresh`).
    querier.start_last_member_probe(
        group,
        ifindex,
        iface.address,
        now,
        timers,
        table,
        env,
    );
}

pub fn on_kernel_cache_miss(
    group: Ipv4Addr,
    origin: Ipv4Addr,
    table: &mut RouteTable,
    env: &mut Env<'_>,
) {
    table.activate(group, origin, env);
}
