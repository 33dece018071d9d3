// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pickup policy for open radio deliveries.
//!
//! The next delivery handed to an operator alternates between two orders,
//! selected by the parity of the number of deliveries currently in
//! progress for the operation:
//!
//! - even: highest intel importance first, older attempts break ties;
//! - odd: oldest attempt first, higher importance breaks ties.
//!
//! Remaining ties go to the lower attempt id so that the choice is
//! deterministic. The alternation keeps important intel moving without
//! starving old, unimportant intel.

use std::cmp::{Ordering, Reverse};

use uuid::Uuid;

use crate::store::deliveries::ActiveRadioDelivery;

/// Ranking applied to the open deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickupOrder {
    Importance,
    Age,
}

impl PickupOrder {
    pub fn for_in_progress(in_progress: usize) -> Self {
        if in_progress % 2 == 0 {
            Self::Importance
        } else {
            Self::Age
        }
    }

    fn compare(self, a: &ActiveRadioDelivery, b: &ActiveRadioDelivery) -> Ordering {
        let by_importance = Reverse(a.intel_importance).cmp(&Reverse(b.intel_importance));
        let by_age = a.attempt_created_at.cmp(&b.attempt_created_at);
        let primary = match self {
            Self::Importance => by_importance.then(by_age),
            Self::Age => by_age.then(by_importance),
        };
        primary.then(a.attempt.cmp(&b.attempt))
    }
}

/// Choose the delivery to pick up next among the active deliveries of one
/// operation. `None` when every active delivery is already in progress.
pub fn next_to_pick_up(active: &[ActiveRadioDelivery]) -> Option<Uuid> {
    let in_progress = active.iter().filter(|d| d.picked_up_at.is_some()).count();
    let order = PickupOrder::for_in_progress(in_progress);
    active
        .iter()
        .filter(|d| d.picked_up_at.is_none())
        .min_by(|a, b| order.compare(a, b))
        .map(|d| d.attempt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
    }

    fn open(importance: i32, created: i64) -> ActiveRadioDelivery {
        ActiveRadioDelivery {
            attempt: Uuid::new_v4(),
            picked_up_at: None,
            intel_operation: Uuid::nil(),
            intel_importance: importance,
            attempt_created_at: t(created),
        }
    }

    fn in_progress(created: i64) -> ActiveRadioDelivery {
        ActiveRadioDelivery {
            picked_up_at: Some(t(created) + Duration::seconds(1)),
            ..open(0, created)
        }
    }

    #[test]
    fn parity_selects_order() {
        assert_eq!(PickupOrder::for_in_progress(0), PickupOrder::Importance);
        assert_eq!(PickupOrder::for_in_progress(1), PickupOrder::Age);
        assert_eq!(PickupOrder::for_in_progress(2), PickupOrder::Importance);
    }

    #[test]
    fn interleaves_age_and_importance() {
        let low = open(10, 1);
        let mid = open(50, 2);
        let high = open(90, 3);
        let mut active = vec![in_progress(0), low.clone(), mid.clone(), high.clone()];

        // One in progress: oldest first.
        assert_eq!(next_to_pick_up(&active), Some(low.attempt));
        active[1].picked_up_at = Some(t(10));

        // Two in progress: most important first.
        assert_eq!(next_to_pick_up(&active), Some(high.attempt));
    }

    #[test]
    fn nothing_open_yields_none() {
        assert_eq!(next_to_pick_up(&[]), None);
        assert_eq!(next_to_pick_up(&[in_progress(0), in_progress(1)]), None);
    }

    fn arb_delivery() -> impl Strategy<Value = ActiveRadioDelivery> {
        (0i32..5, 0i64..5, any::<bool>(), any::<u128>()).prop_map(|(importance, created, picked, id)| {
            ActiveRadioDelivery {
                attempt: Uuid::from_u128(id),
                picked_up_at: picked.then(|| t(created + 100)),
                intel_operation: Uuid::nil(),
                intel_importance: importance,
                attempt_created_at: t(created),
            }
        })
    }

    proptest! {
        #[test]
        fn open_delivery_is_always_chosen(active in prop::collection::vec(arb_delivery(), 0..12)) {
            let chosen = next_to_pick_up(&active);
            let any_open = active.iter().any(|d| d.picked_up_at.is_none());
            prop_assert_eq!(chosen.is_some(), any_open);
            if let Some(id) = chosen {
                let picked = active.iter().find(|d| d.attempt == id).unwrap();
                prop_assert!(picked.picked_up_at.is_none());
            }
        }

        #[test]
        fn chosen_delivery_is_first_in_selected_order(active in prop::collection::vec(arb_delivery(), 1..12)) {
            let Some(id) = next_to_pick_up(&active) else {
                return Ok(());
            };
            let chosen = active.iter().find(|d| d.attempt == id).unwrap();
            let in_progress = active.iter().filter(|d| d.picked_up_at.is_some()).count();
            for other in active.iter().filter(|d| d.picked_up_at.is_none()) {
                if in_progress % 2 == 0 {
                    prop_assert!(chosen.intel_importance >= other.intel_importance);
                } else {
                    prop_assert!(chosen.attempt_created_at <= other.attempt_created_at);
                }
            }
        }
    }
}
