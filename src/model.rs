//! Data models of the storage topology.
//!
//! - `ItemDescriptor`: footprint and storage class of an item type
//! - `OccupancyRecord`: quantity and orientation of one item in one cell
//! - `Cell`: fixed-size slot owning its occupancy behind a lock
//! - `Rack` / `Warehouse`: structural groupings referenced by id
//!
//! Cells never point back at their rack or warehouse; they carry the ids and
//! the owning [`crate::topology::Topology`] resolves them.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;

use crate::error::{AllocResult, AllocatorError};
use crate::orientation::{Orientation, best_orientation_for, fit_count, max_feasible};
use crate::types::{Dims3, EPSILON_GENERAL, percent_of, validation};

pub type ItemId = u64;
pub type CellId = u64;
pub type RackId = u64;
pub type WarehouseId = u64;

/// Validation error for model data.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    InvalidDimension(String),
    InvalidName(String),
    InvalidLayout(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidDimension(msg) => write!(f, "Invalid dimension: {}", msg),
            ValidationError::InvalidName(msg) => write!(f, "Invalid name: {}", msg),
            ValidationError::InvalidLayout(msg) => write!(f, "Invalid layout: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for AllocatorError {
    fn from(err: ValidationError) -> Self {
        AllocatorError::InvalidRequest(err.to_string())
    }
}

pub(crate) fn validate_footprint(dims: Dims3, subject: &str) -> Result<(), ValidationError> {
    validation::validate_dimensions_3d(dims.as_tuple(), subject)
        .map_err(ValidationError::InvalidDimension)
}

pub(crate) fn validate_name(name: &str, subject: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::InvalidName(format!(
            "{} name must not be empty",
            subject
        )));
    }
    Ok(())
}

/// Compatibility tag restricting which warehouses may hold an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StorageClass {
    Ambient,
    Refrigerated,
    Frozen,
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageClass::Ambient => "ambient",
            StorageClass::Refrigerated => "refrigerated",
            StorageClass::Frozen => "frozen",
        };
        f.write_str(name)
    }
}

/// A storable item type as supplied by the inventory.
///
/// `footprint` is `None` when the dimensions are unknown; such items can be
/// registered but never physically placed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "footprint": {"length": 40.0, "width": 30.0, "height": 20.0},
    "storage_class": "ambient"
}))]
pub struct ItemDescriptor {
    pub id: ItemId,
    #[serde(default)]
    pub footprint: Option<Dims3>,
    pub storage_class: StorageClass,
}

impl ItemDescriptor {
    /// Creates a descriptor, validating a known footprint.
    ///
    /// # Examples
    /// ```
    /// use stockplace::model::{ItemDescriptor, StorageClass};
    /// use stockplace::types::Dims3;
    ///
    /// let ok = ItemDescriptor::new(1, Some(Dims3::new(40.0, 30.0, 20.0)), StorageClass::Ambient);
    /// assert!(ok.is_ok());
    ///
    /// let invalid = ItemDescriptor::new(1, Some(Dims3::new(-1.0, 30.0, 20.0)), StorageClass::Ambient);
    /// assert!(invalid.is_err());
    /// ```
    pub fn new(
        id: ItemId,
        footprint: Option<Dims3>,
        storage_class: StorageClass,
    ) -> Result<Self, ValidationError> {
        if let Some(dims) = footprint {
            validate_footprint(dims, "Item")?;
        }
        Ok(Self {
            id,
            footprint,
            storage_class,
        })
    }

    /// Whether the item can be evaluated for physical fit.
    pub fn is_trackable(&self) -> bool {
        self.footprint.is_some()
    }

    /// Volume of one unit in litres, 0 when the footprint is unknown.
    pub fn unit_volume(&self) -> f64 {
        self.footprint.map(|d| d.volume_litres()).unwrap_or(0.0)
    }
}

/// Quantity of a single item type stored in a cell.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, ToSchema)]
pub struct OccupancyRecord {
    pub quantity: u32,
    pub orientation: Orientation,
    /// Footprint at the time the stock was first shelved.
    pub footprint: Dims3,
}

impl OccupancyRecord {
    pub fn unit_volume(&self) -> f64 {
        self.footprint.volume_litres()
    }

    pub fn total_volume(&self) -> f64 {
        self.unit_volume() * f64::from(self.quantity)
    }
}

/// Mutable state of a cell. Only reachable through [`Cell::lock`].
#[derive(Clone, Debug)]
pub struct CellOccupancy {
    dims: Dims3,
    records: BTreeMap<ItemId, OccupancyRecord>,
    version: u64,
}

impl CellOccupancy {
    fn new(dims: Dims3) -> Self {
        Self {
            dims,
            records: BTreeMap::new(),
            version: 0,
        }
    }

    /// Monotonic counter bumped by every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, item_id: ItemId) -> Option<&OccupancyRecord> {
        self.records.get(&item_id)
    }

    /// Records in ascending item id order.
    pub fn records(&self) -> impl Iterator<Item = (ItemId, &OccupancyRecord)> {
        self.records.iter().map(|(id, rec)| (*id, rec))
    }

    pub fn capacity_volume(&self) -> f64 {
        self.dims.volume_litres()
    }

    pub fn used_volume(&self) -> f64 {
        self.records.values().map(OccupancyRecord::total_volume).sum()
    }

    pub fn free_volume(&self) -> f64 {
        (self.capacity_volume() - self.used_volume()).max(0.0)
    }

    pub fn occupancy_percent(&self) -> f64 {
        percent_of(self.used_volume(), self.capacity_volume())
    }

    /// Checks whether `quantity` more units of `item` fit and returns the orientation to use.
    ///
    /// Stock already on the shelf keeps its orientation, so a repeat placement
    /// has to fit the combined quantity in that orientation. On top of the grid
    /// fit the combined volume of all records must stay within the cell.
    pub fn admit(
        &self,
        item: &ItemDescriptor,
        quantity: u32,
        requested: Option<Orientation>,
    ) -> AllocResult<Orientation> {
        if quantity == 0 {
            return Err(AllocatorError::InvalidRequest(
                "quantity must be greater than 0".to_string(),
            ));
        }
        let footprint = item.footprint.ok_or_else(|| {
            AllocatorError::Infeasible(format!("item {} has no known footprint", item.id))
        })?;

        let (orientation, unit_volume) = match self.records.get(&item.id) {
            Some(existing) => {
                if let Some(requested) = requested {
                    if requested != existing.orientation {
                        return Err(AllocatorError::Infeasible(format!(
                            "item {} is already stored as {:?}, {:?} requested",
                            item.id, existing.orientation, requested
                        )));
                    }
                }
                let total = u64::from(existing.quantity) + u64::from(quantity);
                if total > u64::from(u32::MAX) {
                    return Err(AllocatorError::Infeasible(format!(
                        "cell cannot track more than {} units of item {}",
                        u32::MAX,
                        item.id
                    )));
                }
                let capacity = fit_count(existing.footprint, self.dims, existing.orientation);
                if capacity < total {
                    return Err(AllocatorError::Infeasible(format!(
                        "cell holds at most {} units of item {} as {:?}, {} requested in total",
                        capacity, item.id, existing.orientation, total
                    )));
                }
                (existing.orientation, existing.unit_volume())
            }
            None => {
                let orientation = match requested {
                    Some(orientation) => {
                        let capacity = fit_count(footprint, self.dims, orientation);
                        if capacity < u64::from(quantity) {
                            return Err(AllocatorError::Infeasible(format!(
                                "only {} units of item {} fit as {:?}",
                                capacity, item.id, orientation
                            )));
                        }
                        orientation
                    }
                    None => best_orientation_for(footprint, self.dims, quantity).ok_or_else(
                        || {
                            AllocatorError::Infeasible(format!(
                                "no orientation fits {} units of item {}",
                                quantity, item.id
                            ))
                        },
                    )?,
                };
                (orientation, footprint.volume_litres())
            }
        };

        let added = unit_volume * f64::from(quantity);
        let capacity = self.capacity_volume();
        if self.used_volume() + added > capacity + EPSILON_GENERAL * capacity.max(1.0) {
            return Err(AllocatorError::Infeasible(format!(
                "{:.3} l required, {:.3} l free",
                added,
                self.free_volume()
            )));
        }
        Ok(orientation)
    }

    /// Largest quantity of `item` that [`CellOccupancy::admit`] would accept right now.
    pub fn max_placeable(&self, item: &ItemDescriptor, ceiling: u32) -> u32 {
        max_feasible(ceiling, |q| q == 0 || self.admit(item, q, None).is_ok())
    }

    /// Stores `quantity` units after a successful [`CellOccupancy::admit`].
    pub(crate) fn insert(&mut self, item: &ItemDescriptor, quantity: u32, orientation: Orientation) {
        let footprint = item.footprint.unwrap_or(Dims3::new(0.0, 0.0, 0.0));
        self.records
            .entry(item.id)
            .and_modify(|rec| rec.quantity += quantity)
            .or_insert(OccupancyRecord {
                quantity,
                orientation,
                footprint,
            });
        self.version += 1;
    }

    /// Takes `quantity` units out, dropping the record when it reaches zero.
    ///
    /// Returns the record as it was before the withdrawal.
    pub(crate) fn withdraw(
        &mut self,
        item_id: ItemId,
        cell_id: CellId,
        quantity: u32,
    ) -> AllocResult<OccupancyRecord> {
        if quantity == 0 {
            return Err(AllocatorError::InvalidRequest(
                "quantity must be greater than 0".to_string(),
            ));
        }
        let available = self.records.get(&item_id).map(|r| r.quantity).unwrap_or(0);
        if available < quantity {
            return Err(AllocatorError::InsufficientOccupancy {
                item_id,
                cell_id,
                requested: quantity,
                available,
            });
        }

        let before = self.records[&item_id];
        if available == quantity {
            self.records.remove(&item_id);
        } else if let Some(rec) = self.records.get_mut(&item_id) {
            rec.quantity -= quantity;
        }
        self.version += 1;
        Ok(before)
    }
}

/// Smallest storage unit with fixed dimensions.
#[derive(Debug)]
pub struct Cell {
    pub id: CellId,
    pub rack_id: RackId,
    pub warehouse_id: WarehouseId,
    pub label: String,
    pub dims: Dims3,
    occupancy: Mutex<CellOccupancy>,
}

impl Cell {
    pub(crate) fn new(
        id: CellId,
        rack_id: RackId,
        warehouse_id: WarehouseId,
        label: String,
        dims: Dims3,
    ) -> Self {
        Self {
            id,
            rack_id,
            warehouse_id,
            label,
            dims,
            occupancy: Mutex::new(CellOccupancy::new(dims)),
        }
    }

    /// Locks the occupancy, giving up after `timeout`.
    pub fn lock(&self, timeout: Duration) -> AllocResult<MutexGuard<'_, CellOccupancy>> {
        self.occupancy.try_lock_for(timeout).ok_or_else(|| {
            AllocatorError::ConcurrentModification(format!(
                "cell {} is busy, lock not acquired within {} ms",
                self.id,
                timeout.as_millis()
            ))
        })
    }

    /// Copy of the current occupancy.
    pub fn snapshot(&self, timeout: Duration) -> AllocResult<CellOccupancy> {
        Ok(self.lock(timeout)?.clone())
    }

    pub fn capacity_volume(&self) -> f64 {
        self.dims.volume_litres()
    }
}

/// Named grouping of cells inside one warehouse.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct Rack {
    pub id: RackId,
    pub warehouse_id: WarehouseId,
    pub name: String,
    pub cell_ids: Vec<CellId>,
}

/// Top-level grouping of racks tagged with a storage class.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
    pub storage_class: StorageClass,
    pub rack_ids: Vec<RackId>,
}

impl Warehouse {
    pub fn can_store(&self, item: &ItemDescriptor) -> bool {
        self.storage_class == item.storage_class
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(50);

    fn item(id: ItemId, dims: (f64, f64, f64)) -> ItemDescriptor {
        ItemDescriptor::new(id, Some(dims.into()), StorageClass::Ambient).unwrap()
    }

    fn cell(dims: (f64, f64, f64)) -> Cell {
        Cell::new(1, 1, 1, "R1-C1".to_string(), dims.into())
    }

    #[test]
    fn item_without_footprint_is_untrackable() {
        let product = ItemDescriptor::new(3, None, StorageClass::Frozen).unwrap();
        assert!(!product.is_trackable());
        assert_eq!(product.unit_volume(), 0.0);
    }

    #[test]
    fn item_with_zero_axis_is_rejected() {
        let err = ItemDescriptor::new(3, Some(Dims3::new(10.0, 0.0, 5.0)), StorageClass::Ambient)
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidDimension(_)));
    }

    #[test]
    fn huge_cell_admits_small_item() {
        let cell = cell((1e7, 1e7, 1e7));
        let unit = item(1, (1.0, 1.0, 1.0));
        let mut occ = cell.lock(TIMEOUT).unwrap();

        let orientation = occ.admit(&unit, 1, None).unwrap();
        occ.insert(&unit, 1, orientation);
        assert_eq!(occ.record(1).unwrap().quantity, 1);
    }

    #[test]
    fn record_quantity_cannot_exceed_u32() {
        let cell = cell((3000.0, 3000.0, 3000.0));
        let unit = item(1, (1.0, 1.0, 1.0));
        let mut occ = cell.lock(TIMEOUT).unwrap();

        let orientation = occ.admit(&unit, u32::MAX, None).unwrap();
        occ.insert(&unit, u32::MAX, orientation);

        let err = occ.admit(&unit, 1, None).unwrap_err();
        assert_eq!(err.code(), "infeasible");
        assert_eq!(occ.record(1).unwrap().quantity, u32::MAX);
    }

    #[test]
    fn repeat_placement_increments_single_record() {
        let cell = cell((100.0, 100.0, 50.0));
        let product = item(1, (40.0, 30.0, 20.0));
        let mut occ = cell.lock(TIMEOUT).unwrap();

        let first = occ.admit(&product, 4, None).unwrap();
        occ.insert(&product, 4, first);
        let second = occ.admit(&product, 3, None).unwrap();
        occ.insert(&product, 3, second);

        assert_eq!(first, second);
        assert_eq!(occ.records().count(), 1);
        assert_eq!(occ.record(1).unwrap().quantity, 7);
        assert_eq!(occ.version(), 2);
    }

    #[test]
    fn existing_orientation_is_pinned() {
        let cell = cell((100.0, 100.0, 50.0));
        let product = item(1, (40.0, 30.0, 20.0));
        let mut occ = cell.lock(TIMEOUT).unwrap();

        let standard = occ.admit(&product, 12, Some(Orientation::Standard)).unwrap();
        occ.insert(&product, 12, standard);

        // RotateAndLay would fit 15, but the shelf is already laid out Standard
        assert!(matches!(
            occ.admit(&product, 1, None),
            Err(AllocatorError::Infeasible(_))
        ));
        assert!(matches!(
            occ.admit(&product, 1, Some(Orientation::RotateAndLay)),
            Err(AllocatorError::Infeasible(_))
        ));
    }

    #[test]
    fn volume_guard_accounts_for_other_items() {
        let cell = cell((100.0, 100.0, 10.0)); // 100 l
        let big = item(1, (100.0, 100.0, 6.0)); // 60 l
        let slab = item(2, (100.0, 100.0, 5.0)); // 50 l
        let mut occ = cell.lock(TIMEOUT).unwrap();

        let o = occ.admit(&big, 1, None).unwrap();
        occ.insert(&big, 1, o);
        assert!(matches!(
            occ.admit(&slab, 1, None),
            Err(AllocatorError::Infeasible(_))
        ));
        assert!((occ.occupancy_percent() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn withdraw_to_zero_drops_record() {
        let cell = cell((100.0, 100.0, 50.0));
        let product = item(1, (40.0, 30.0, 20.0));
        let mut occ = cell.lock(TIMEOUT).unwrap();
        occ.insert(&product, 5, Orientation::Standard);

        let before = occ.withdraw(1, cell.id, 2).unwrap();
        assert_eq!(before.quantity, 5);
        assert_eq!(occ.record(1).unwrap().quantity, 3);

        occ.withdraw(1, cell.id, 3).unwrap();
        assert!(occ.record(1).is_none());
        assert!(occ.is_empty());
    }

    #[test]
    fn withdraw_more_than_stored_fails() {
        let cell = cell((100.0, 100.0, 50.0));
        let product = item(1, (40.0, 30.0, 20.0));
        let mut occ = cell.lock(TIMEOUT).unwrap();
        occ.insert(&product, 2, Orientation::Standard);

        let err = occ.withdraw(1, cell.id, 3).unwrap_err();
        assert_eq!(
            err,
            AllocatorError::InsufficientOccupancy {
                item_id: 1,
                cell_id: 1,
                requested: 3,
                available: 2
            }
        );
        assert_eq!(occ.record(1).unwrap().quantity, 2);
        assert!(occ.withdraw(9, cell.id, 1).is_err());
    }

    #[test]
    fn max_placeable_shrinks_as_cell_fills() {
        let cell = cell((100.0, 100.0, 50.0));
        let product = item(1, (40.0, 30.0, 20.0));
        let other = item(2, (50.0, 50.0, 50.0));
        let mut occ = cell.lock(TIMEOUT).unwrap();

        let empty = occ.max_placeable(&product, 10_000);
        occ.insert(&other, 1, Orientation::Standard);
        let partially = occ.max_placeable(&product, 10_000);
        occ.insert(&other, 1, Orientation::Standard);
        let mostly = occ.max_placeable(&product, 10_000);

        assert_eq!(empty, 15);
        assert!(partially <= empty);
        assert!(mostly <= partially);
    }

    #[test]
    fn lock_times_out_while_held() {
        let cell = cell((10.0, 10.0, 10.0));
        let _guard = cell.lock(TIMEOUT).unwrap();
        let err = cell.lock(Duration::from_millis(5)).unwrap_err();
        assert_eq!(err.code(), "concurrent_modification");
    }

    #[test]
    fn warehouse_compatibility_follows_storage_class() {
        let warehouse = Warehouse {
            id: 1,
            name: "Cold".into(),
            storage_class: StorageClass::Refrigerated,
            rack_ids: Vec::new(),
        };
        let milk = ItemDescriptor::new(1, None, StorageClass::Refrigerated).unwrap();
        let nails = ItemDescriptor::new(2, None, StorageClass::Ambient).unwrap();
        assert!(warehouse.can_store(&milk));
        assert!(!warehouse.can_store(&nails));
    }
}
