//! Ownership and traversal of warehouses, racks and cells.
//!
//! All entities live in id-keyed maps owned by [`Topology`]. Parents list
//! their children by id, children store their parent ids; there are no
//! references between entities.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use log::info;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::Deserialize;
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;

use crate::error::{AllocResult, AllocatorError, EntityKind};
use crate::model::{
    Cell, CellId, ItemDescriptor, Rack, RackId, StorageClass, ValidationError, Warehouse,
    WarehouseId, validate_footprint, validate_name,
};
use crate::types::Dims3;

/// Upper bound for cells created by a single administrative call.
pub const MAX_CELLS_PER_REQUEST: u64 = 100_000;

/// Bulk layout for a new warehouse: `racks` × `cells_per_rack` identical cells.
#[derive(Clone, Debug, Deserialize, ToSchema)]
#[schema(example = json!({
    "name": "Hall A",
    "storage_class": "ambient",
    "racks": 4,
    "cells_per_rack": 10,
    "cell_dims": {"length": 100.0, "width": 100.0, "height": 50.0}
}))]
pub struct WarehouseLayout {
    pub name: String,
    pub storage_class: StorageClass,
    pub racks: u32,
    pub cells_per_rack: u32,
    pub cell_dims: Dims3,
}

impl WarehouseLayout {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name, "Warehouse")?;
        validate_footprint(self.cell_dims, "Cell")?;
        validate_cell_count(self.racks, self.cells_per_rack)
    }
}

fn validate_cell_count(racks: u32, cells_per_rack: u32) -> Result<(), ValidationError> {
    if racks == 0 || cells_per_rack == 0 {
        return Err(ValidationError::InvalidLayout(
            "at least one rack with one cell is required".to_string(),
        ));
    }
    let total = u64::from(racks) * u64::from(cells_per_rack);
    if total > MAX_CELLS_PER_REQUEST {
        return Err(ValidationError::InvalidLayout(format!(
            "{} cells requested, at most {} per request",
            total, MAX_CELLS_PER_REQUEST
        )));
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct Topology {
    warehouses: BTreeMap<WarehouseId, Warehouse>,
    racks: BTreeMap<RackId, Rack>,
    cells: BTreeMap<CellId, Cell>,
    next_warehouse_id: WarehouseId,
    next_rack_id: RackId,
    next_cell_id: CellId,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a warehouse with all of its racks and cells in one step.
    pub fn create_warehouse(&mut self, layout: &WarehouseLayout) -> AllocResult<WarehouseId> {
        layout.validate()?;

        self.next_warehouse_id += 1;
        let warehouse_id = self.next_warehouse_id;
        self.warehouses.insert(
            warehouse_id,
            Warehouse {
                id: warehouse_id,
                name: layout.name.trim().to_string(),
                storage_class: layout.storage_class,
                rack_ids: Vec::with_capacity(layout.racks as usize),
            },
        );
        for _ in 0..layout.racks {
            self.push_rack(warehouse_id, None, layout.cells_per_rack, layout.cell_dims);
        }

        info!(
            "🏭 Created warehouse {} '{}' ({}, {} racks × {} cells)",
            warehouse_id, layout.name, layout.storage_class, layout.racks, layout.cells_per_rack
        );
        Ok(warehouse_id)
    }

    /// Appends a rack of `cells` identical cells to an existing warehouse.
    pub fn add_rack(
        &mut self,
        warehouse_id: WarehouseId,
        name: Option<String>,
        cells: u32,
        cell_dims: Dims3,
    ) -> AllocResult<RackId> {
        self.warehouse(warehouse_id)?;
        if let Some(name) = &name {
            validate_name(name, "Rack")?;
        }
        validate_footprint(cell_dims, "Cell")?;
        validate_cell_count(1, cells)?;

        let rack_id = self.push_rack(warehouse_id, name, cells, cell_dims);
        info!(
            "🗄️ Added rack {} with {} cells to warehouse {}",
            rack_id, cells, warehouse_id
        );
        Ok(rack_id)
    }

    fn push_rack(
        &mut self,
        warehouse_id: WarehouseId,
        name: Option<String>,
        cells: u32,
        cell_dims: Dims3,
    ) -> RackId {
        self.next_rack_id += 1;
        let rack_id = self.next_rack_id;

        let Some(warehouse) = self.warehouses.get_mut(&warehouse_id) else {
            return rack_id;
        };
        let name = match name {
            Some(name) => name.trim().to_string(),
            None => {
                let taken: Vec<&str> = warehouse
                    .rack_ids
                    .iter()
                    .filter_map(|id| self.racks.get(id))
                    .map(|rack| rack.name.as_str())
                    .collect();
                (warehouse.rack_ids.len() + 1..)
                    .map(|n| format!("R{}", n))
                    .find(|candidate| !taken.contains(&candidate.as_str()))
                    .unwrap_or_default()
            }
        };
        warehouse.rack_ids.push(rack_id);

        let mut cell_ids = Vec::with_capacity(cells as usize);
        for position in 1..=cells {
            self.next_cell_id += 1;
            let cell_id = self.next_cell_id;
            let label = format!("{}-C{}", name, position);
            self.cells.insert(
                cell_id,
                Cell::new(cell_id, rack_id, warehouse_id, label, cell_dims),
            );
            cell_ids.push(cell_id);
        }

        self.racks.insert(
            rack_id,
            Rack {
                id: rack_id,
                warehouse_id,
                name,
                cell_ids,
            },
        );
        rack_id
    }

    /// Removes an empty warehouse together with its racks and cells.
    pub fn delete_warehouse(
        &mut self,
        warehouse_id: WarehouseId,
        timeout: Duration,
    ) -> AllocResult<Warehouse> {
        let warehouse = self.warehouse(warehouse_id)?;
        if !self.all_empty(self.cells_of_warehouse(warehouse), timeout)? {
            return Err(AllocatorError::NotEmpty {
                kind: EntityKind::Warehouse,
                id: warehouse_id,
            });
        }

        let Some(warehouse) = self.warehouses.remove(&warehouse_id) else {
            return Err(AllocatorError::not_found(EntityKind::Warehouse, warehouse_id));
        };
        for rack_id in &warehouse.rack_ids {
            if let Some(rack) = self.racks.remove(rack_id) {
                for cell_id in rack.cell_ids {
                    self.cells.remove(&cell_id);
                }
            }
        }
        info!("🗑️ Deleted warehouse {} '{}'", warehouse.id, warehouse.name);
        Ok(warehouse)
    }

    /// Removes an empty rack and its cells.
    pub fn delete_rack(&mut self, rack_id: RackId, timeout: Duration) -> AllocResult<Rack> {
        let rack = self.rack(rack_id)?;
        if !self.all_empty(self.cells_of_rack(rack), timeout)? {
            return Err(AllocatorError::NotEmpty {
                kind: EntityKind::Rack,
                id: rack_id,
            });
        }

        let Some(rack) = self.racks.remove(&rack_id) else {
            return Err(AllocatorError::not_found(EntityKind::Rack, rack_id));
        };
        for cell_id in &rack.cell_ids {
            self.cells.remove(cell_id);
        }
        if let Some(warehouse) = self.warehouses.get_mut(&rack.warehouse_id) {
            warehouse.rack_ids.retain(|id| *id != rack_id);
        }
        info!("🗑️ Deleted rack {} '{}'", rack.id, rack.name);
        Ok(rack)
    }

    fn all_empty<'a>(
        &self,
        mut cells: impl Iterator<Item = &'a Cell>,
        timeout: Duration,
    ) -> AllocResult<bool> {
        cells.try_fold(true, |empty, cell| {
            Ok(empty && cell.lock(timeout)?.is_empty())
        })
    }

    pub fn warehouse(&self, id: WarehouseId) -> AllocResult<&Warehouse> {
        self.warehouses
            .get(&id)
            .ok_or_else(|| AllocatorError::not_found(EntityKind::Warehouse, id))
    }

    pub fn rack(&self, id: RackId) -> AllocResult<&Rack> {
        self.racks
            .get(&id)
            .ok_or_else(|| AllocatorError::not_found(EntityKind::Rack, id))
    }

    pub fn cell(&self, id: CellId) -> AllocResult<&Cell> {
        self.cells
            .get(&id)
            .ok_or_else(|| AllocatorError::not_found(EntityKind::Cell, id))
    }

    /// Warehouses in ascending id order.
    pub fn warehouses(&self) -> impl Iterator<Item = &Warehouse> {
        self.warehouses.values()
    }

    pub fn racks_of<'a>(&'a self, warehouse: &'a Warehouse) -> impl Iterator<Item = &'a Rack> {
        warehouse
            .rack_ids
            .iter()
            .filter_map(|id| self.racks.get(id))
    }

    pub fn cells_of_rack<'a>(&'a self, rack: &'a Rack) -> impl Iterator<Item = &'a Cell> {
        rack.cell_ids.iter().filter_map(|id| self.cells.get(id))
    }

    /// Cells of a warehouse in rack → cell order.
    pub fn cells_of_warehouse<'a>(
        &'a self,
        warehouse: &'a Warehouse,
    ) -> impl Iterator<Item = &'a Cell> {
        self.racks_of(warehouse)
            .flat_map(move |rack| self.cells_of_rack(rack))
    }

    /// Every cell in warehouse → rack → cell order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.warehouses()
            .flat_map(move |warehouse| self.cells_of_warehouse(warehouse))
    }

    /// Cells of all warehouses whose storage class matches the item.
    pub fn compatible_cells<'a>(
        &'a self,
        item: &'a ItemDescriptor,
    ) -> impl Iterator<Item = &'a Cell> {
        self.warehouses()
            .filter(move |warehouse| warehouse.can_store(item))
            .flat_map(move |warehouse| self.cells_of_warehouse(warehouse))
    }

    /// Fails with `IncompatibleStorageClass` if the cell's warehouse cannot hold the item.
    pub fn ensure_compatible(&self, cell: &Cell, item: &ItemDescriptor) -> AllocResult<()> {
        let warehouse = self.warehouse(cell.warehouse_id)?;
        if warehouse.can_store(item) {
            return Ok(());
        }
        Err(AllocatorError::IncompatibleStorageClass {
            item_id: item.id,
            warehouse_id: warehouse.id,
            required: item.storage_class.to_string(),
            actual: warehouse.storage_class.to_string(),
        })
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

/// Topology shared between engines and the administrative surface.
///
/// Placement and analytics hold the read side for the duration of a call,
/// administration takes the write side.
#[derive(Clone, Debug, Default)]
pub struct SharedTopology {
    inner: Arc<RwLock<Topology>>,
}

impl SharedTopology {
    pub fn new(topology: Topology) -> Self {
        Self {
            inner: Arc::new(RwLock::new(topology)),
        }
    }

    pub fn read(&self, timeout: Duration) -> AllocResult<RwLockReadGuard<'_, Topology>> {
        self.inner.try_read_for(timeout).ok_or_else(|| {
            AllocatorError::ConcurrentModification(format!(
                "topology is being modified, read access not acquired within {} ms",
                timeout.as_millis()
            ))
        })
    }

    pub fn write(&self, timeout: Duration) -> AllocResult<RwLockWriteGuard<'_, Topology>> {
        self.inner.try_write_for(timeout).ok_or_else(|| {
            AllocatorError::ConcurrentModification(format!(
                "topology is in use, write access not acquired within {} ms",
                timeout.as_millis()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orientation::Orientation;

    const TIMEOUT: Duration = Duration::from_millis(50);

    fn layout(name: &str, class: StorageClass, racks: u32, cells: u32) -> WarehouseLayout {
        WarehouseLayout {
            name: name.to_string(),
            storage_class: class,
            racks,
            cells_per_rack: cells,
            cell_dims: Dims3::new(100.0, 100.0, 50.0),
        }
    }

    #[test]
    fn bulk_creation_builds_racks_and_cells() {
        let mut topology = Topology::new();
        let id = topology
            .create_warehouse(&layout("Hall A", StorageClass::Ambient, 3, 4))
            .unwrap();

        let warehouse = topology.warehouse(id).unwrap();
        assert_eq!(warehouse.rack_ids.len(), 3);
        assert_eq!(topology.cells_of_warehouse(warehouse).count(), 12);

        let labels: Vec<_> = topology
            .cells_of_warehouse(warehouse)
            .take(2)
            .map(|c| c.label.clone())
            .collect();
        assert_eq!(labels, vec!["R1-C1", "R1-C2"]);
        for cell in topology.cells_of_warehouse(warehouse) {
            assert_eq!(cell.warehouse_id, id);
            assert!(warehouse.rack_ids.contains(&cell.rack_id));
        }
    }

    #[test]
    fn invalid_layout_creates_nothing() {
        let mut topology = Topology::new();
        let mut bad = layout("Hall A", StorageClass::Ambient, 2, 2);
        bad.cell_dims = Dims3::new(100.0, -1.0, 50.0);
        assert!(matches!(
            topology.create_warehouse(&bad),
            Err(AllocatorError::InvalidRequest(_))
        ));
        assert!(topology.create_warehouse(&layout(" ", StorageClass::Ambient, 1, 1)).is_err());
        assert!(topology.create_warehouse(&layout("Hall", StorageClass::Ambient, 0, 1)).is_err());
        assert_eq!(topology.warehouses().count(), 0);
        assert_eq!(topology.cell_count(), 0);
    }

    #[test]
    fn compatible_cells_follow_storage_class() {
        let mut topology = Topology::new();
        topology
            .create_warehouse(&layout("Dry", StorageClass::Ambient, 1, 2))
            .unwrap();
        let cold = topology
            .create_warehouse(&layout("Cold", StorageClass::Refrigerated, 1, 3))
            .unwrap();

        let milk = ItemDescriptor::new(1, None, StorageClass::Refrigerated).unwrap();
        let cells: Vec<_> = topology.compatible_cells(&milk).collect();
        assert_eq!(cells.len(), 3);
        assert!(cells.iter().all(|c| c.warehouse_id == cold));
    }

    #[test]
    fn ensure_compatible_reports_classes() {
        let mut topology = Topology::new();
        let dry = topology
            .create_warehouse(&layout("Dry", StorageClass::Ambient, 1, 1))
            .unwrap();
        let rack_id = topology.warehouse(dry).unwrap().rack_ids[0];
        let cell = topology.cells_of_rack(topology.rack(rack_id).unwrap()).next().unwrap();
        let milk = ItemDescriptor::new(1, None, StorageClass::Refrigerated).unwrap();

        let err = topology.ensure_compatible(cell, &milk).unwrap_err();
        assert_eq!(err.code(), "incompatible_storage_class");
    }

    #[test]
    fn non_empty_structures_are_not_deleted() {
        let mut topology = Topology::new();
        let id = topology
            .create_warehouse(&layout("Hall A", StorageClass::Ambient, 2, 2))
            .unwrap();
        let product = ItemDescriptor::new(
            1,
            Some(Dims3::new(10.0, 10.0, 10.0)),
            StorageClass::Ambient,
        )
        .unwrap();

        let first_rack = topology.warehouse(id).unwrap().rack_ids[0];
        let cell_id = topology.rack(first_rack).unwrap().cell_ids[0];
        topology
            .cell(cell_id)
            .unwrap()
            .lock(TIMEOUT)
            .unwrap()
            .insert(&product, 1, Orientation::Standard);

        assert_eq!(
            topology.delete_warehouse(id, TIMEOUT).unwrap_err().code(),
            "not_empty"
        );
        assert_eq!(
            topology.delete_rack(first_rack, TIMEOUT).unwrap_err().code(),
            "not_empty"
        );
        assert_eq!(topology.cell_count(), 4);

        let second_rack = topology.warehouse(id).unwrap().rack_ids[1];
        topology.delete_rack(second_rack, TIMEOUT).unwrap();
        assert_eq!(topology.warehouse(id).unwrap().rack_ids, vec![first_rack]);
        assert_eq!(topology.cell_count(), 2);
    }

    #[test]
    fn empty_warehouse_is_deleted_with_children() {
        let mut topology = Topology::new();
        let id = topology
            .create_warehouse(&layout("Hall A", StorageClass::Ambient, 2, 2))
            .unwrap();
        topology.delete_warehouse(id, TIMEOUT).unwrap();
        assert_eq!(topology.cell_count(), 0);
        assert!(topology.warehouse(id).is_err());
        assert_eq!(
            topology.delete_warehouse(id, TIMEOUT).unwrap_err().code(),
            "not_found"
        );
    }

    #[test]
    fn add_rack_extends_warehouse_and_names_racks() {
        let mut topology = Topology::new();
        let id = topology
            .create_warehouse(&layout("Hall A", StorageClass::Ambient, 1, 1))
            .unwrap();
        let auto = topology
            .add_rack(id, None, 2, Dims3::new(50.0, 50.0, 50.0))
            .unwrap();
        let named = topology
            .add_rack(id, Some("Overflow".into()), 1, Dims3::new(50.0, 50.0, 50.0))
            .unwrap();

        assert_eq!(topology.rack(auto).unwrap().name, "R2");
        assert_eq!(topology.rack(named).unwrap().name, "Overflow");
        assert_eq!(topology.cells().count(), 4);
        assert!(topology.add_rack(999, None, 1, Dims3::new(1.0, 1.0, 1.0)).is_err());
    }

    #[test]
    fn default_rack_names_skip_names_in_use() {
        let mut topology = Topology::new();
        let id = topology
            .create_warehouse(&layout("Hall A", StorageClass::Ambient, 2, 2))
            .unwrap();
        let first = topology.warehouse(id).unwrap().rack_ids[0];
        topology.delete_rack(first, TIMEOUT).unwrap();

        let added = topology
            .add_rack(id, None, 2, Dims3::new(50.0, 50.0, 50.0))
            .unwrap();

        let rack = topology.rack(added).unwrap();
        assert_eq!(rack.name, "R3");
        let labels: Vec<&str> = rack
            .cell_ids
            .iter()
            .map(|c| topology.cell(*c).unwrap().label.as_str())
            .collect();
        assert_eq!(labels, ["R3-C1", "R3-C2"]);
        let names: Vec<&str> = topology
            .warehouse(id)
            .unwrap()
            .rack_ids
            .iter()
            .map(|r| topology.rack(*r).unwrap().name.as_str())
            .collect();
        assert_eq!(names, ["R2", "R3"]);
    }

    #[test]
    fn ids_are_never_reused() {
        let mut topology = Topology::new();
        let first = topology
            .create_warehouse(&layout("A", StorageClass::Ambient, 1, 1))
            .unwrap();
        topology.delete_warehouse(first, TIMEOUT).unwrap();
        let second = topology
            .create_warehouse(&layout("B", StorageClass::Ambient, 1, 1))
            .unwrap();
        assert_ne!(first, second);
    }
}
