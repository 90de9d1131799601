//! Wiring for the group-state engine as a whole: the [`Proxy`] value bundles
//! the route table, querier, and timer queue, and exposes the public entry
//! points named in the external-interfaces surface.

use std::net::Ipv4Addr;
use std::time::Instant;

use crate::config::Config;
use crate::handler;
use crate::net::Env;
use crate::querier::Querier;
use crate::table::RouteTable;
use crate::timer::{TimerKind, TimerQueue};

/// Counters kept purely for operational visibility; not read by any
/// protocol logic.
#[derive(Clone, Copy, Debug, Default)]
pub struct Statistics {
    pub reports_received: u64,
    pub leaves_received: u64,
    pub cache_misses: u64,
}

pub struct Proxy {
    config: Config,
    upstream_ifindex: u32,
    table: RouteTable,
    querier: Querier,
    timers: TimerQueue,
    stats: Statistics,
}

impl Proxy {
    pub fn new(config: Config, upstream_ifindex: u32) -> Self {
        Proxy {
            table: RouteTable::new(config, upstream_ifindex),
            querier: Querier::new(config),
            timers: TimerQueue::new(),
            config,
            upstream_ifindex,
            stats: Statistics::default(),
        }
    }

    pub fn statistics(&self) -> Statistics {
        self.stats
    }

    /// Joins the all-routers group on every downstream interface and
    /// schedules the first general query.
    pub fn start(&mut self, now: Instant, env: &mut Env<'_>) {
        for iface in env.ifaces.iter() {
            if iface.direction == crate::net::IfaceDirection::Downstream {
                if let Err(error) = env.sockets.join_group(iface.index, ALL_ROUTERS) {
                    error.log();
                }
            }
        }
        if !env
            .ifaces
            .iter()
            .any(|iface| iface.direction == crate::net::IfaceDirection::Upstream)
        {
            crate::error::Error::UpstreamInterfaceMissing.log();
        }
        self.querier.start(now, &mut self.timers);
    }

    pub fn stop(&mut self, env: &mut Env<'_>) {
        self.timers.clear();
        self.table.clear_all(env);
    }

    pub fn on_report(&mut self, src: Ipv4Addr, group: Ipv4Addr, env: &mut Env<'_>) {
        self.stats.reports_received += 1;
        handler::on_report(src, group, &mut self.table, env);
    }

    pub fn on_leave(&mut self, src: Ipv4Addr, group: Ipv4Addr, now: Instant, env: &mut Env<'_>) {
        self.stats.leaves_received += 1;
        handler::on_leave(
            src,
            group,
            now,
            &mut self.table,
            &mut self.querier,
            &mut self.timers,
            env,
        );
    }

    pub fn on_kernel_cache_miss(
        &mut self,
        group: Ipv4Addr,
        origin: Ipv4Addr,
        env: &mut Env<'_>,
    ) {
        self.stats.cache_misses += 1;
        handler::on_kernel_cache_miss(group, origin, &mut self.table, env);
    }

    /// Drains every timer due at or before `now`, dispatching each to the
    /// component that owns its intent. Returns the number of timers
    /// drained.
    pub fn tick(&mut self, now: Instant, env: &mut Env<'_>) -> usize {
        let due = self.timers.tick(now);
        let count = due.len();
        for (_id, kind) in due {
            match kind {
                TimerKind::GeneralQuery => {
                    self.querier.fire_general_query(now, &mut self.timers, env);
                }
                TimerKind::AgingSweep => {
                    self.querier.fire_aging_sweep(&mut self.table, env);
                }
                TimerKind::LastMemberProbe { group } => {
                    self.querier.step_last_member_probe(
                        group,
                        now,
                        &mut self.timers,
                        &mut self.table,
                        env,
                    );
                }
            }
        }
        count
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn upstream_ifindex(&self) -> u32 {
        self.upstream_ifindex
    }
}

const ALL_ROUTERS: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 2);
