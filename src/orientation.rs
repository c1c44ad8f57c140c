//! Orientation search for stacking identical items in a rectangular cell.
//!
//! Only yaw and one lay-down axis are modelled, giving four fixed axis
//! permutations. Each permutation is evaluated as a regular grid of
//! `floor(cell / item)` per axis.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::ItemDescriptor;
use crate::types::{Dims3, EPSILON_GENERAL};

/// Practical upper bound for [`max_placeable`] searches.
pub const DEFAULT_MAX_PLACEABLE_CEILING: u32 = 10_000;

/// Fixed item rotations. Declaration order is the tie-break order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// (L, W, H)
    Standard,
    /// (W, L, H)
    Rotated90,
    /// (L, H, W)
    LayOnSide,
    /// (W, H, L)
    RotateAndLay,
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [
        Orientation::Standard,
        Orientation::Rotated90,
        Orientation::LayOnSide,
        Orientation::RotateAndLay,
    ];

    /// Source axis for each target axis of the rotated footprint.
    #[inline]
    pub const fn permutation(self) -> [usize; 3] {
        match self {
            Orientation::Standard => [0, 1, 2],
            Orientation::Rotated90 => [1, 0, 2],
            Orientation::LayOnSide => [0, 2, 1],
            Orientation::RotateAndLay => [1, 2, 0],
        }
    }

    /// Applies the rotation to an item footprint.
    pub fn apply(self, item: Dims3) -> Dims3 {
        let axes = item.axes();
        let [a, b, c] = self.permutation();
        Dims3::new(axes[a], axes[b], axes[c])
    }
}

/// Number of whole items per axis, tolerant to floating-point noise.
#[inline]
fn per_axis(cell_len: f64, item_len: f64) -> u64 {
    if item_len <= 0.0 {
        return 0;
    }
    ((cell_len + EPSILON_GENERAL) / item_len).floor().max(0.0) as u64
}

/// How many items fit as a regular grid when rotated by `orientation`.
///
/// Saturates at `u64::MAX` for grids too large to count.
pub fn fit_count(item: Dims3, cell: Dims3, orientation: Orientation) -> u64 {
    let rotated = orientation.apply(item).axes();
    cell.axes()
        .iter()
        .zip(rotated.iter())
        .map(|(c, i)| per_axis(*c, *i))
        .fold(1u64, u64::saturating_mul)
}

/// Best rotation of `item` that holds at least `quantity` units in a cell of `cell` size.
///
/// Among feasible rotations the one with the highest fit count wins, ties go to
/// the earliest declared variant. `None` when the footprint is unknown or no
/// rotation is large enough.
pub fn best_orientation(
    item: &ItemDescriptor,
    cell: Dims3,
    quantity: u32,
) -> Option<Orientation> {
    let footprint = item.footprint?;
    best_orientation_for(footprint, cell, quantity)
}

/// Footprint-level variant of [`best_orientation`].
pub fn best_orientation_for(footprint: Dims3, cell: Dims3, quantity: u32) -> Option<Orientation> {
    let mut best: Option<(Orientation, u64)> = None;
    for orientation in Orientation::ALL {
        let count = fit_count(footprint, cell, orientation);
        if count < u64::from(quantity) {
            continue;
        }
        // strict comparison keeps the earlier variant on ties
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((orientation, count));
        }
    }
    best.map(|(orientation, _)| orientation)
}

/// Largest `q` in `0..=ceiling` for which `feasible(q)` holds.
///
/// `feasible` must be monotonically non-increasing in `q`; `q = 0` is
/// always considered feasible.
pub fn max_feasible(ceiling: u32, mut feasible: impl FnMut(u32) -> bool) -> u32 {
    let (mut lo, mut hi) = (0u32, ceiling);
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        if feasible(mid) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

/// Maximum quantity of `item` an empty cell of `cell` size can hold.
pub fn max_placeable(item: &ItemDescriptor, cell: Dims3, ceiling: u32) -> u32 {
    max_feasible(ceiling, |q| best_orientation(item, cell, q).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StorageClass;
    use test_case::test_case;

    fn item(dims: (f64, f64, f64)) -> ItemDescriptor {
        ItemDescriptor::new(1, Some(dims.into()), StorageClass::Ambient).unwrap()
    }

    #[test_case(Orientation::Standard, (40.0, 30.0, 20.0))]
    #[test_case(Orientation::Rotated90, (30.0, 40.0, 20.0))]
    #[test_case(Orientation::LayOnSide, (40.0, 20.0, 30.0))]
    #[test_case(Orientation::RotateAndLay, (30.0, 20.0, 40.0))]
    fn rotation_permutes_axes(orientation: Orientation, expected: (f64, f64, f64)) {
        let rotated = orientation.apply(Dims3::new(40.0, 30.0, 20.0));
        assert_eq!(rotated.as_tuple(), expected);
    }

    #[test_case(Orientation::Standard, 12)]
    #[test_case(Orientation::Rotated90, 12)]
    #[test_case(Orientation::LayOnSide, 10)]
    #[test_case(Orientation::RotateAndLay, 15)]
    fn fit_count_is_product_of_axis_floors(orientation: Orientation, expected: u64) {
        let count = fit_count(
            Dims3::new(40.0, 30.0, 20.0),
            Dims3::new(100.0, 100.0, 50.0),
            orientation,
        );
        assert_eq!(count, expected);
    }

    #[test]
    fn best_orientation_maximises_headroom() {
        let product = item((40.0, 30.0, 20.0));
        let cell = Dims3::new(100.0, 100.0, 50.0);
        assert_eq!(
            best_orientation(&product, cell, 10),
            Some(Orientation::RotateAndLay)
        );
    }

    #[test]
    fn best_orientation_prefers_declaration_order_on_ties() {
        // cube: every rotation yields the same count
        let product = item((10.0, 10.0, 10.0));
        let cell = Dims3::new(30.0, 30.0, 30.0);
        assert_eq!(
            best_orientation(&product, cell, 27),
            Some(Orientation::Standard)
        );
    }

    #[test]
    fn best_orientation_picks_standard_when_it_alone_fits() {
        let product = item((40.0, 30.0, 20.0));
        let cell = Dims3::new(80.0, 60.0, 20.0);
        assert_eq!(best_orientation(&product, cell, 4), Some(Orientation::Standard));
    }

    #[test]
    fn best_orientation_never_undershoots_quantity() {
        let product = item((40.0, 30.0, 20.0));
        let cell = Dims3::new(100.0, 100.0, 50.0);
        for quantity in 1..=20 {
            if let Some(orientation) = best_orientation(&product, cell, quantity) {
                assert!(fit_count(product.footprint.unwrap(), cell, orientation) >= quantity as u64);
            } else {
                assert!(quantity > 15);
            }
        }
    }

    #[test]
    fn unknown_footprint_cannot_be_evaluated() {
        let product = ItemDescriptor::new(7, None, StorageClass::Ambient).unwrap();
        assert_eq!(best_orientation(&product, Dims3::new(10.0, 10.0, 10.0), 1), None);
        assert_eq!(max_placeable(&product, Dims3::new(10.0, 10.0, 10.0), 100), 0);
    }

    #[test]
    fn oversized_item_does_not_fit() {
        let product = item((120.0, 30.0, 20.0));
        assert_eq!(best_orientation(&product, Dims3::new(100.0, 100.0, 100.0), 1), None);
    }

    #[test]
    fn max_placeable_matches_best_fit_count() {
        let product = item((40.0, 30.0, 20.0));
        assert_eq!(
            max_placeable(&product, Dims3::new(100.0, 100.0, 50.0), DEFAULT_MAX_PLACEABLE_CEILING),
            15
        );
    }

    #[test]
    fn max_placeable_is_capped_by_ceiling() {
        let product = item((1.0, 1.0, 1.0));
        assert_eq!(max_placeable(&product, Dims3::new(100.0, 100.0, 100.0), 500), 500);
    }

    #[test]
    fn max_feasible_handles_bounds() {
        assert_eq!(max_feasible(0, |_| true), 0);
        assert_eq!(max_feasible(100, |_| false), 0);
        assert_eq!(max_feasible(100, |q| q <= 37), 37);
        assert_eq!(max_feasible(u32::MAX, |q| q <= 1), 1);
    }

    #[test]
    fn fit_count_saturates_on_huge_grids() {
        let cell = Dims3::new(1e7, 1e7, 1e7);
        let unit = Dims3::new(1.0, 1.0, 1.0);
        assert_eq!(fit_count(unit, cell, Orientation::Standard), u64::MAX);
        assert_eq!(
            best_orientation_for(unit, cell, u32::MAX),
            Some(Orientation::Standard)
        );
    }

    #[test]
    fn fit_count_tolerates_float_noise() {
        let item = Dims3::new(100.0 / 3.0, 10.0, 10.0);
        assert_eq!(fit_count(item, Dims3::new(100.0, 10.0, 10.0), Orientation::Standard), 3);
    }
}
