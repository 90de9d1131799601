use std::time::{Duration, Instant};

use const_addrs::ip4;
use mcproxy::config::Config;
use mcproxy::net::{Env, IfaceDirection};
use mcproxy::testing::{MockKernel, MockPackets, MockRegistry, MockSockets};
use mcproxy::Proxy;

fn fixture() -> MockRegistry {
    MockRegistry::new()
        .with_iface(1, "192.168.1.1", IfaceDirection::Upstream, 1)
        .with_iface(2, "10.0.0.1", IfaceDirection::Downstream, 1)
        .with_iface(3, "10.0.1.1", IfaceDirection::Downstream, 1)
}

struct Harness {
    registry: MockRegistry,
    kernel: MockKernel,
    sockets: MockSockets,
    packets: MockPackets,
    proxy: Proxy,
    now: Instant,
}

impl Harness {
    fn new(config: Config) -> Self {
        let mut h = Harness {
            registry: fixture(),
            kernel: MockKernel::default(),
            sockets: MockSockets::default(),
            packets: MockPackets::default(),
            proxy: Proxy::new(config, 1),
            now: Instant::now(),
        };
        let mut env = h.env();
        h.proxy.start(h.now, &mut env);
        h
    }

    fn env(&mut self) -> Env<'_> {
        Env {
            ifaces: &self.registry,
            kernel: &mut self.kernel,
            sockets: &mut self.sockets,
            packets: &mut self.packets,
        }
    }

    fn advance(&mut self, secs: u64) {
        self.now += Duration::from_secs(secs);
        let mut env = self.env();
        self.proxy.tick(self.now, &mut env);
    }
}

fn test_config() -> Config {
    Config {
        robustness_value: 2,
        query_interval_secs: 125,
        query_response_interval_secs: 10,
        startup_query_interval_secs: 31,
        startup_query_count: 2,
        last_member_query_interval_secs: 1,
        last_member_query_count: 2,
        fast_upstream_leave: false,
    }
}

#[test]
fn single_listener_join_then_leave_expires_after_probes() {
    let mut h = Harness::new(test_config());
    let group = ip4!("239.1.1.1");
    let src = ip4!("10.0.0.5");

    {
        let mut env = h.env();
        h.proxy.on_report(src, group, &mut env);
    }
    assert!(h.proxy.table().find(group).is_some());
    assert_eq!(h.sockets.joined.last(), Some(&(1, group)));

    {
        let mut env = h.env();
        h.proxy.on_leave(src, group, h.now, &mut env);
    }
    assert!(h.proxy.table().find(group).is_some());

    h.advance(1);
    h.advance(1);

    assert!(h.proxy.table().find(group).is_none());
    assert!(h.sockets.left.contains(&(1, group)));
}

#[test]
fn duplicate_report_refreshes_without_double_join() {
    let mut h = Harness::new(test_config());
    let group = ip4!("239.1.1.1");
    let src = ip4!("10.0.0.5");

    {
        let mut env = h.env();
        h.proxy.on_report(src, group, &mut env);
        h.proxy.on_report(src, group, &mut env);
    }

    let route = h.proxy.table().find(group).unwrap();
    assert_eq!(route.subscribers.len(), 1);
    assert_eq!(h.sockets.joined.iter().filter(|(_, g)| *g == group).count(), 1);
}

#[test]
fn cache_miss_then_report_installs_kernel_entry() {
    let mut h = Harness::new(test_config());
    let group = ip4!("239.2.2.2");
    let origin = ip4!("192.168.1.5");

    {
        let mut env = h.env();
        h.proxy.on_kernel_cache_miss(group, origin, &mut env);
    }
    assert!(h.kernel.installed.is_empty());

    {
        let mut env = h.env();
        h.proxy.on_report(ip4!("10.0.1.9"), group, &mut env);
    }
    assert_eq!(h.kernel.installed.len(), 1);
    let desc = &h.kernel.installed[0];
    assert_eq!(desc.origin, origin);
    assert!(desc.out_vif_ttl.contains(&(3, 1)));
    assert!(desc.out_vif_ttl.contains(&(2, 0)));
}

#[test]
fn last_member_probe_refreshed_by_new_report() {
    let mut h = Harness::new(test_config());
    let group = ip4!("239.1.1.1");
    let src_a = ip4!("10.0.0.5");
    let src_b = ip4!("10.0.0.6");

    {
        let mut env = h.env();
        h.proxy.on_report(src_a, group, &mut env);
        h.proxy.on_report(src_b, group, &mut env);
        h.proxy.on_leave(src_a, group, h.now, &mut env);
    }

    {
        let mut env = h.env();
        h.proxy.on_report(src_b, group, &mut env);
    }

    h.advance(1);
    h.advance(1);

    assert!(h.proxy.table().find(group).is_some());
    assert!(!h.sockets.left.contains(&(1, group)));
}

#[test]
fn invalid_group_is_rejected() {
    let mut h = Harness::new(test_config());
    let group = ip4!("10.0.0.1");
    let src = ip4!("10.0.0.5");

    {
        let mut env = h.env();
        h.proxy.on_report(src, group, &mut env);
    }
    assert!(h.proxy.table().find(group).is_none());
}

#[test]
fn self_origin_report_is_rejected() {
    let mut h = Harness::new(test_config());
    let group = ip4!("239.1.1.1");
    let local_downstream_addr = ip4!("10.0.0.1");

    {
        let mut env = h.env();
        h.proxy.on_report(local_downstream_addr, group, &mut env);
    }
    assert!(h.proxy.table().find(group).is_none());
}
