use std::net::Ipv4Addr;

use tracing::{debug, debug_span};

use crate::table::UpstreamState;

#[derive(Debug)]
pub enum Debug<'a> {
    RouteCreated(&'a Ipv4Addr),
    RouteRemoved(&'a Ipv4Addr),
    SubscriberAdded(&'a Ipv4Addr, u32, &'a Ipv4Addr),
    SubscriberAged(&'a Ipv4Addr, u32, &'a Ipv4Addr),
    UpstreamStateChange(&'a Ipv4Addr, UpstreamState, UpstreamState),
    TimerScheduled(&'a crate::timer::TimerKind),
    TimerFired(&'a crate::timer::TimerKind),
}

// ===== impl Debug =====

impl Debug<'_> {
    pub(crate) fn log(&self) {
        match self {
            Debug::RouteCreated(group) => {
                debug_span!("table").in_scope(|| {
                    debug!(%group, "{}", self);
                })
            }
            Debug::RouteRemoved(group) => {
                debug_span!("table").in_scope(|| {
                    debug!(%group, "{}", self);
                })
            }
            Debug::SubscriberAdded(group, ifindex, src) => {
                debug_span!("table").in_scope(|| {
                    debug!(%group, %ifindex, %src, "{}", self);
                })
            }
            Debug::SubscriberAged(group, ifindex, src) => {
                debug_span!("table").in_scope(|| {
                    debug!(%group, %ifindex, %src, "{}", self);
                })
            }
            Debug::UpstreamStateChange(group, from, to) => {
                debug_span!("table").in_scope(|| {
                    let data = serde_json::to_string(&(from, to)).unwrap();
                    debug!(%group, %data, "{}", self);
                })
            }
            Debug::TimerScheduled(kind) => {
                debug_span!("timer").in_scope(|| {
                    debug!(?kind, "{}", self);
                })
            }
            Debug::TimerFired(kind) => {
                debug_span!("timer").in_scope(|| {
                    debug!(?kind, "{}", self);
                })
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::RouteCreated(..) => write!(f, "route created"),
            Debug::RouteRemoved(..) => write!(f, "route removed"),
            Debug::SubscriberAdded(..) => write!(f, "subscriber added"),
            Debug::SubscriberAged(..) => write!(f, "subscriber aged out"),
            Debug::UpstreamStateChange(..) => write!(f, "upstream state changed"),
            Debug::TimerScheduled(..) => write!(f, "timer scheduled"),
            Debug::TimerFired(..) => write!(f, "timer fired"),
        }
    }
}
