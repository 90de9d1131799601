//! Per-route subscriber list, ordered by `(interface index, host address)`.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

pub type SubscriberKey = (u32, Ipv4Addr);

#[derive(Clone, Copy, Debug)]
pub struct Subscriber {
    pub age: u8,
}

#[derive(Clone, Debug, Default)]
pub struct SubscriberList {
    entries: BTreeMap<SubscriberKey, Subscriber>,
}

impl SubscriberList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new subscriber or refreshes an existing one's age.
    pub fn add(&mut self, ifindex: u32, src: Ipv4Addr, robustness: u8) {
        self.entries
            .insert((ifindex, src), Subscriber { age: robustness });
    }

    pub fn remove(&mut self, ifindex: u32, src: Ipv4Addr) -> bool {
        self.entries.remove(&(ifindex, src)).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SubscriberKey, &Subscriber)> {
        self.entries.iter()
    }

    pub fn interfaces(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().map(|(ifindex, _)| *ifindex)
    }

    /// Decrements every subscriber's age by one, removing entries that reach
    /// zero. Returns the keys that were removed.
    pub fn age(&mut self) -> Vec<SubscriberKey> {
        let mut aged_out = Vec::new();
        self.entries.retain(|key, sub| {
            sub.age = sub.age.saturating_sub(1);
            if sub.age == 0 {
                aged_out.push(*key);
                false
            } else {
                true
            }
        });
        aged_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    #[test]
    fn add_then_remove_roundtrips() {
        let mut list = SubscriberList::new();
        list.add(2, addr("10.0.0.5"), 2);
        assert_eq!(list.len(), 1);
        assert!(list.remove(2, addr("10.0.0.5")));
        assert!(list.is_empty());
    }

    #[test]
    fn duplicate_add_refreshes_age_without_duplicating() {
        let mut list = SubscriberList::new();
        list.add(2, addr("10.0.0.5"), 2);
        list.age();
        assert_eq!(list.len(), 1);
        list.add(2, addr("10.0.0.5"), 2);
        assert_eq!(list.len(), 1);
        let (_, sub) = list.iter().next().unwrap();
        assert_eq!(sub.age, 2);
    }

    #[test]
    fn age_removes_zeroed_entries() {
        let mut list = SubscriberList::new();
        list.add(2, addr("10.0.0.5"), 1);
        let aged_out = list.age();
        assert_eq!(aged_out, vec![(2, addr("10.0.0.5"))]);
        assert!(list.is_empty());
    }

    #[test]
    fn ordering_is_by_interface_then_address() {
        let mut list = SubscriberList::new();
        list.add(3, addr("10.0.0.1"), 2);
        list.add(1, addr("10.0.0.9"), 2);
        list.add(1, addr("10.0.0.2"), 2);
        let keys: Vec<_> = list.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec![
                (1, addr("10.0.0.2")),
                (1, addr("10.0.0.9")),
                (3, addr("10.0.0.1")),
            ]
        );
    }
}
