//! Pure slot allocation across the four queues.

/// Per-queue slot targets for one poll cycle. The four cells always sum to
/// the requested total (the normal queues absorb rounding remainders).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotAllocation {
    pub order_retry: u64,
    pub order_normal: u64,
    pub other_retry: u64,
    pub other_normal: u64,
}

impl SlotAllocation {
    pub fn total(&self) -> u64 {
        self.order_retry + self.order_normal + self.other_retry + self.other_normal
    }
}

/// Split `total` slots between the ORDER and OTHER classes by weight, then
/// within each class between retry and normal by `retry_ratio`, rounding
/// half-up at every step.
///
/// `total <= 0` and degenerate weights (non-positive or non-finite sum) are
/// defined no-ops: the result is all zeros, not an error.
pub fn allocate(total: i64, order_weight: f64, other_weight: f64, retry_ratio: f64) -> SlotAllocation {
    if total <= 0 {
        return SlotAllocation::default();
    }
    let weight_sum = order_weight + other_weight;
    if !(weight_sum.is_finite() && weight_sum > 0.0) {
        return SlotAllocation::default();
    }
    let total = total as u64;
    let ratio = retry_ratio.clamp(0.0, 1.0);

    let order_total = round_half_up(total as f64 * order_weight / weight_sum).min(total);
    let other_total = total - order_total;

    let order_retry = round_half_up(order_total as f64 * ratio).min(order_total);
    let other_retry = round_half_up(other_total as f64 * ratio).min(other_total);

    SlotAllocation {
        order_retry,
        order_normal: order_total - order_retry,
        other_retry,
        other_normal: other_total - other_retry,
    }
}

/// Round half-up for non-negative values (f64::round rounds half away from
/// zero, which is half-up here).
pub(super) fn round_half_up(v: f64) -> u64 {
    v.max(0.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_split_10_7_3_07() {
        // orderTotal=7, orderRetry=round(4.9)=5, orderNormal=2
        // otherTotal=3, otherRetry=round(2.1)=2, otherNormal=1
        let alloc = allocate(10, 7.0, 3.0, 0.7);
        assert_eq!(
            alloc,
            SlotAllocation {
                order_retry: 5,
                order_normal: 2,
                other_retry: 2,
                other_normal: 1,
            }
        );
    }

    #[test]
    fn zero_total_is_all_zero() {
        assert_eq!(allocate(0, 7.0, 3.0, 0.7), SlotAllocation::default());
        assert_eq!(allocate(-5, 7.0, 3.0, 0.7), SlotAllocation::default());
    }

    #[test]
    fn degenerate_weights_are_all_zero() {
        assert_eq!(allocate(10, 0.0, 0.0, 0.7), SlotAllocation::default());
        assert_eq!(allocate(10, f64::NAN, 3.0, 0.7), SlotAllocation::default());
        assert_eq!(allocate(10, -7.0, 3.0, 0.7), SlotAllocation::default());
    }

    #[test]
    fn retry_ratio_extremes() {
        let all_retry = allocate(10, 7.0, 3.0, 1.0);
        assert_eq!(all_retry.order_normal, 0);
        assert_eq!(all_retry.other_normal, 0);
        assert_eq!(all_retry.total(), 10);

        let no_retry = allocate(10, 7.0, 3.0, 0.0);
        assert_eq!(no_retry.order_retry, 0);
        assert_eq!(no_retry.other_retry, 0);
        assert_eq!(no_retry.total(), 10);
    }

    #[test]
    fn single_slot_goes_to_order() {
        let alloc = allocate(1, 7.0, 3.0, 0.7);
        assert_eq!(alloc.total(), 1);
        assert_eq!(alloc.order_retry + alloc.order_normal, 1);
    }

    #[test]
    fn rounding_is_half_up() {
        // 10 * 0.5/1.0 = 5.0 exactly; 5 * 0.5 = 2.5 rounds to 3
        let alloc = allocate(10, 1.0, 1.0, 0.5);
        assert_eq!(alloc.order_retry, 3);
        assert_eq!(alloc.order_normal, 2);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// The four cells always sum to exactly the requested total.
            #[test]
            fn allocation_conserves_total(
                total in 0i64..=100_000,
                order_weight in 0.01f64..1_000.0,
                other_weight in 0.01f64..1_000.0,
                retry_ratio in 0.0f64..=1.0,
            ) {
                let alloc = allocate(total, order_weight, other_weight, retry_ratio);
                prop_assert_eq!(alloc.total(), total.max(0) as u64);
            }

            /// Heavier ORDER weight never gives ORDER fewer slots than OTHER
            /// when the weights differ by at least 2x.
            #[test]
            fn weight_dominance(total in 2i64..=10_000, ratio in 0.0f64..=1.0) {
                let alloc = allocate(total, 2.0, 1.0, ratio);
                let order = alloc.order_retry + alloc.order_normal;
                let other = alloc.other_retry + alloc.other_normal;
                prop_assert!(order >= other);
            }
        }
    }
}
