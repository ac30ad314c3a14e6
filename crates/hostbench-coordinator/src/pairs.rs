//! Sender/receiver selection
//!
//! Position `i` of the host order is paired with position `i` of the reversed
//! order. For a two-host set that is exactly `(h0 -> h1)` and `(h1 -> h0)`;
//! a host is never paired with itself.

use hostbench_common::{AddressingMode, Direction};
use hostbench_remote::Host;
use tracing::debug;

/// Environment predicate deciding whether a mode may be used for a pair
pub type Feasibility = Box<dyn Fn(&Host, &Host, AddressingMode) -> bool + Send + Sync>;

/// One sender/receiver assignment and the address the sender connects to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPair {
    /// Index of the sending host in the host set
    pub sender: usize,
    /// Index of the receiving host in the host set
    pub receiver: usize,
    pub direction: Direction,
    pub mode: AddressingMode,
    /// Receiver address for `mode`
    pub address: String,
}

/// Yields the pairs and addresses to exercise
pub struct HostPairSelector {
    modes: Vec<AddressingMode>,
    directions: Vec<Direction>,
    feasible: Feasibility,
}

impl std::fmt::Debug for HostPairSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostPairSelector")
            .field("modes", &self.modes)
            .field("directions", &self.directions)
            .finish_non_exhaustive()
    }
}

impl HostPairSelector {
    /// Selector for the given modes, in both directions, with every mode feasible
    pub fn new(modes: Vec<AddressingMode>) -> Self {
        Self {
            modes,
            directions: Direction::BOTH.to_vec(),
            feasible: Box::new(|_, _, _| true),
        }
    }

    /// Restrict the directions produced
    pub fn with_directions(mut self, directions: Vec<Direction>) -> Self {
        self.directions = directions;
        self
    }

    /// Install the environment's feasibility predicate
    pub fn with_feasibility(
        mut self,
        feasible: impl Fn(&Host, &Host, AddressingMode) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.feasible = Box::new(feasible);
        self
    }

    /// Pairs in direction order, then mode order.
    ///
    /// Infeasible modes and receivers without an address for a mode are
    /// skipped, not errors.
    pub fn pairs(&self, hosts: &[&Host]) -> Vec<HostPair> {
        let reversed = (0..hosts.len()).rev();
        let mut pairs = Vec::new();

        for (sender, receiver) in (0..hosts.len()).zip(reversed) {
            if sender == receiver {
                continue;
            }
            let direction = if sender < receiver {
                Direction::Forward
            } else {
                Direction::Reverse
            };
            if !self.directions.contains(&direction) {
                continue;
            }

            let (from, to) = (hosts[sender], hosts[receiver]);
            for &mode in &self.modes {
                if !(self.feasible)(from, to, mode) {
                    debug!(sender = %from.name, receiver = %to.name, %mode, "Addressing mode not feasible, skipping");
                    continue;
                }
                let Some(address) = to.target_address(mode) else {
                    debug!(receiver = %to.name, %mode, "Receiver has no address for mode, skipping");
                    continue;
                };
                pairs.push(HostPair {
                    sender,
                    receiver,
                    direction,
                    mode,
                    address: address.to_string(),
                });
            }
        }

        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostbench_test_utils::test_host;
    use proptest::prelude::*;

    fn two_hosts() -> (Host, Host) {
        let a = test_host("vm-1", "10.0.0.1");
        let mut b = test_host("vm-2", "10.0.0.2");
        b.external_ip = Some("34.1.1.2".into());
        (a, b)
    }

    #[test]
    fn test_two_hosts_give_exactly_two_directions() {
        let (a, b) = two_hosts();
        let pairs = HostPairSelector::new(vec![AddressingMode::Internal]).pairs(&[&a, &b]);

        assert_eq!(pairs.len(), 2);
        assert_eq!((pairs[0].sender, pairs[0].receiver), (0, 1));
        assert_eq!(pairs[0].address, "10.0.0.2");
        assert_eq!(pairs[0].direction, Direction::Forward);
        assert_eq!((pairs[1].sender, pairs[1].receiver), (1, 0));
        assert_eq!(pairs[1].address, "10.0.0.1");
        assert_eq!(pairs[1].direction, Direction::Reverse);
    }

    #[test]
    fn test_missing_external_address_is_skipped() {
        let (a, b) = two_hosts();
        let pairs = HostPairSelector::new(vec![AddressingMode::External, AddressingMode::Internal])
            .pairs(&[&a, &b]);

        // vm-1 has no external address, so only the forward direction gets one
        let modes: Vec<_> = pairs.iter().map(|p| (p.sender, p.mode)).collect();
        assert_eq!(
            modes,
            vec![
                (0, AddressingMode::External),
                (0, AddressingMode::Internal),
                (1, AddressingMode::Internal),
            ]
        );
        assert_eq!(pairs[0].address, "34.1.1.2");
    }

    #[test]
    fn test_feasibility_predicate_filters_modes() {
        let (a, b) = two_hosts();
        let pairs = HostPairSelector::new(vec![AddressingMode::External, AddressingMode::Internal])
            .with_feasibility(|_, _, mode| mode == AddressingMode::Internal)
            .pairs(&[&a, &b]);
        assert!(pairs.iter().all(|p| p.mode == AddressingMode::Internal));
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn test_guest_nic_address_is_targeted() {
        let a = test_host("vm-1", "10.0.0.1");
        let mut b = test_host("vm-2", "10.0.0.2");
        b.guest = Some(hostbench_remote::GuestNic {
            mac_address: "0a:00:00:00:00:02".into(),
            private_ip: "10.0.1.2".into(),
            public_ip: None,
        });
        let pairs = HostPairSelector::new(vec![AddressingMode::Internal]).pairs(&[&a, &b]);
        assert_eq!(pairs[0].address, "10.0.1.2");
    }

    #[test]
    fn test_single_direction_and_single_host() {
        let (a, b) = two_hosts();
        let forward = HostPairSelector::new(vec![AddressingMode::Internal])
            .with_directions(vec![Direction::Forward])
            .pairs(&[&a, &b]);
        assert_eq!(forward.len(), 1);
        assert_eq!(forward[0].sender, 0);

        assert!(HostPairSelector::new(vec![AddressingMode::Internal]).pairs(&[&a]).is_empty());
    }

    proptest! {
        #[test]
        fn prop_never_self_pair(n in 1usize..8) {
            let hosts: Vec<Host> = (0..n)
                .map(|i| test_host(&format!("vm-{i}"), &format!("10.0.0.{}", i + 1)))
                .collect();
            let refs: Vec<&Host> = hosts.iter().collect();
            let pairs = HostPairSelector::new(vec![AddressingMode::Internal]).pairs(&refs);

            prop_assert!(pairs.iter().all(|p| p.sender != p.receiver));
            prop_assert!(pairs.iter().all(|p| p.sender + p.receiver == n - 1));
            prop_assert_eq!(pairs.len(), n - n % 2);
        }
    }
}
