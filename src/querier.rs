//! Querier (component E): periodic general queries and group-specific
//! last-member probing, both driven by the timer queue.

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::net::{Env, IfaceDirection, IgmpKind};
use crate::table::RouteTable;
use crate::timer::{TimerKind, TimerQueue};

pub struct Querier {
    config: Config,
    startup_queries_remaining: u8,
}

const ALL_SYSTEMS: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 1);

impl Querier {
    pub fn new(config: Config) -> Self {
        let startup_queries_remaining = config.startup_query_count;
        Querier {
            config,
            startup_queries_remaining,
        }
    }

    /// Schedules the first general query; called once at proxy startup.
    pub fn start(&mut self, now: Instant, timers: &mut TimerQueue) {
        timers.schedule(now, Duration::ZERO, TimerKind::GeneralQuery);
    }

    /// Runs one general-query cycle: transmits a query on every up,
    /// non-loopback downstream interface, schedules the post-query aging
    /// sweep, and reschedules the next general query.
    pub fn fire_general_query(
        &mut self,
        now: Instant,
        timers: &mut TimerQueue,
        env: &mut Env<'_>,
    ) {
        let max_resp_time = (self.config.query_response_interval_secs * 10) as u8;
        for iface in env.ifaces.iter() {
            if iface.direction != IfaceDirection::Downstream || !iface.is_up()
                || iface.is_loopback()
            {
                continue;
            }
            if let Err(error) = env.packets.send_igmp(
                iface.address,
                ALL_SYSTEMS,
                IgmpKind::MembershipQuery,
                max_resp_time,
                Ipv4Addr::UNSPECIFIED,
            ) {
                error.log();
            }
        }

        timers.schedule(
            now,
            Duration::from_secs(self.config.query_response_interval_secs as u64),
            TimerKind::AgingSweep,
        );

        let interval = if self.startup_queries_remaining > 0 {
            self.startup_queries_remaining -= 1;
            self.config.startup_query_interval_secs
        } else {
            self.config.query_interval_secs
        };
        timers.schedule(
            now,
            Duration::from_secs(interval as u64),
            TimerKind::GeneralQuery,
        );
    }

    pub fn fire_aging_sweep(&mut self, table: &mut RouteTable, env: &mut Env<'_>) {
        table.age_all(env);
    }

    /// Arms last-member probing for `group` and runs the first probe step
    /// (which only flags the probe as started and sends the first query).
    pub fn start_last_member_probe(
        &mut self,
        group: Ipv4Addr,
        ifx: u32,
        vif_addr: Ipv4Addr,
        now: Instant,
        timers: &mut TimerQueue,
        table: &mut RouteTable,
        env: &mut Env<'_>,
    ) {
        table.set_last_member_mode(group, ifx, vif_addr);
        self.step_last_member_probe(group, now, timers, table, env);
    }

    /// Advances one step of the last-member probe for `group`. If the
    /// table reports the probe is over (route removed or its countdown
    /// completed this tick), does not reschedule.
    pub fn step_last_member_probe(
        &mut self,
        group: Ipv4Addr,
        now: Instant,
        timers: &mut TimerQueue,
        table: &mut RouteTable,
        env: &mut Env<'_>,
    ) {
        let Some((_ifx, vif_addr)) = table.last_member_probe_tick(group, env) else {
            return;
        };
        let max_resp_time = (self.config.last_member_query_interval_secs * 10) as u8;
        if let Err(error) = env.packets.send_igmp(
            vif_addr,
            group,
            IgmpKind::GroupSpecificQuery,
            max_resp_time,
            group,
        ) {
            error.log();
        }
        timers.schedule(
            now,
            Duration::from_secs(self.config.last_member_query_interval_secs as u64),
            TimerKind::LastMemberProbe { group },
        );
    }
}
