//! Read-only queries over the topology and cell occupancy.
//!
//! Nothing here mutates state. Each cell is locked only while its occupancy
//! is copied out, so aggregates are consistent per cell but not across cells.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use crate::engine::{
    AllocatorConfig, CellCandidate, lookup_item, rank_candidates, require_quantity,
};
use crate::error::AllocResult;
use crate::inventory::Inventory;
use crate::model::{
    Cell, CellId, CellOccupancy, ItemId, RackId, StorageClass, Warehouse, WarehouseId,
};
use crate::orientation::Orientation;
use crate::topology::{SharedTopology, Topology};
use crate::types::{Dims3, percent_of};

/// Upper bounds (exclusive, in percent) of the qualitative occupancy bands.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OccupancyBands {
    pub mostly_empty_below: f64,
    pub optimal_below: f64,
    pub well_filled_below: f64,
}

impl Default for OccupancyBands {
    fn default() -> Self {
        Self {
            mostly_empty_below: 20.0,
            optimal_below: 60.0,
            well_filled_below: 85.0,
        }
    }
}

impl OccupancyBands {
    pub fn is_ordered(&self) -> bool {
        self.mostly_empty_below <= self.optimal_below
            && self.optimal_below <= self.well_filled_below
    }

    pub fn classify(&self, occupancy_percent: f64) -> Recommendation {
        if occupancy_percent < self.mostly_empty_below {
            Recommendation::MostlyEmpty
        } else if occupancy_percent < self.optimal_below {
            Recommendation::Optimal
        } else if occupancy_percent < self.well_filled_below {
            Recommendation::WellFilled
        } else {
            Recommendation::NearFull
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    MostlyEmpty,
    Optimal,
    WellFilled,
    NearFull,
}

impl Recommendation {
    pub fn message(&self) -> &'static str {
        match self {
            Recommendation::MostlyEmpty => "mostly empty",
            Recommendation::Optimal => "optimal",
            Recommendation::WellFilled => "well filled",
            Recommendation::NearFull => "near full, add carefully",
        }
    }
}

/// One cell holding a given item.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct CellLocation {
    pub cell_id: CellId,
    pub cell_label: String,
    pub rack_id: RackId,
    pub warehouse_id: WarehouseId,
    pub quantity: u32,
    pub orientation: Orientation,
    pub total_volume: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct WarehouseStats {
    pub warehouse_id: WarehouseId,
    pub name: String,
    pub storage_class: StorageClass,
    pub rack_count: usize,
    pub cell_count: usize,
    pub total_capacity: f64,
    pub used_volume: f64,
    pub occupancy_percent: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ItemVolume {
    pub item_id: ItemId,
    pub quantity: u64,
    pub volume: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct DetailedStats {
    #[serde(flatten)]
    pub summary: WarehouseStats,
    pub distinct_items: usize,
    pub empty_cells: usize,
    /// Items with the largest occupied volume, largest first
    pub top_items: Vec<ItemVolume>,
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct CellUtilization {
    pub cell_id: CellId,
    pub cell_label: String,
    pub rack_id: RackId,
    pub occupancy_percent: f64,
    pub used_volume: f64,
    pub capacity_volume: f64,
    pub recommendation: Recommendation,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct CellRecordInfo {
    pub item_id: ItemId,
    pub quantity: u32,
    pub orientation: Orientation,
    pub total_volume: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct CellInfo {
    pub cell_id: CellId,
    pub label: String,
    pub rack_id: RackId,
    pub warehouse_id: WarehouseId,
    pub dims: Dims3,
    pub capacity_volume: f64,
    pub used_volume: f64,
    pub occupancy_percent: f64,
    pub records: Vec<CellRecordInfo>,
}

/// Occupancy copies of all cells of a warehouse, in rack → cell order.
fn warehouse_snapshot<'a>(
    topology: &'a Topology,
    warehouse: &'a Warehouse,
    config: &AllocatorConfig,
) -> AllocResult<Vec<(&'a Cell, CellOccupancy)>> {
    topology
        .cells_of_warehouse(warehouse)
        .map(|cell| -> AllocResult<(&Cell, CellOccupancy)> {
            Ok((cell, cell.snapshot(config.lock_timeout)?))
        })
        .collect()
}

fn summarize(
    topology: &Topology,
    warehouse: &Warehouse,
    cells: &[(&Cell, CellOccupancy)],
) -> WarehouseStats {
    let total_capacity: f64 = cells.iter().map(|(c, _)| c.capacity_volume()).sum();
    let used_volume: f64 = cells.iter().map(|(_, occ)| occ.used_volume()).sum();
    WarehouseStats {
        warehouse_id: warehouse.id,
        name: warehouse.name.clone(),
        storage_class: warehouse.storage_class,
        rack_count: topology.racks_of(warehouse).count(),
        cell_count: cells.len(),
        total_capacity,
        used_volume,
        occupancy_percent: percent_of(used_volume, total_capacity),
    }
}

pub struct AnalyticsEngine {
    topology: SharedTopology,
    inventory: Arc<dyn Inventory>,
    config: AllocatorConfig,
}

impl AnalyticsEngine {
    pub fn new(
        topology: SharedTopology,
        inventory: Arc<dyn Inventory>,
        config: AllocatorConfig,
    ) -> Self {
        Self {
            topology,
            inventory,
            config,
        }
    }

    /// Every cell currently holding the item.
    pub fn locations_of(&self, item_id: ItemId) -> AllocResult<Vec<CellLocation>> {
        let item = lookup_item(self.inventory.as_ref(), item_id)?;
        let topology = self.topology.read(self.config.lock_timeout)?;

        let mut locations = Vec::new();
        for cell in topology.cells() {
            let occupancy = cell.lock(self.config.lock_timeout)?;
            if let Some(record) = occupancy.record(item.id) {
                locations.push(CellLocation {
                    cell_id: cell.id,
                    cell_label: cell.label.clone(),
                    rack_id: cell.rack_id,
                    warehouse_id: cell.warehouse_id,
                    quantity: record.quantity,
                    orientation: record.orientation,
                    total_volume: record.total_volume(),
                });
            }
        }
        Ok(locations)
    }

    pub fn warehouse_statistics(&self, warehouse_id: WarehouseId) -> AllocResult<WarehouseStats> {
        let topology = self.topology.read(self.config.lock_timeout)?;
        let warehouse = topology.warehouse(warehouse_id)?;
        let cells = warehouse_snapshot(&topology, warehouse, &self.config)?;
        Ok(summarize(&topology, warehouse, &cells))
    }

    /// Statistics of every warehouse, ascending by id.
    pub fn overview(&self) -> AllocResult<Vec<WarehouseStats>> {
        let topology = self.topology.read(self.config.lock_timeout)?;
        topology
            .warehouses()
            .map(|warehouse| -> AllocResult<WarehouseStats> {
                let cells = warehouse_snapshot(&topology, warehouse, &self.config)?;
                Ok(summarize(&topology, warehouse, &cells))
            })
            .collect()
    }

    pub fn detailed_statistics(&self, warehouse_id: WarehouseId) -> AllocResult<DetailedStats> {
        let topology = self.topology.read(self.config.lock_timeout)?;
        let warehouse = topology.warehouse(warehouse_id)?;
        let cells = warehouse_snapshot(&topology, warehouse, &self.config)?;
        let summary = summarize(&topology, warehouse, &cells);

        let mut per_item: BTreeMap<ItemId, ItemVolume> = BTreeMap::new();
        for (_, occupancy) in &cells {
            for (item_id, record) in occupancy.records() {
                let entry = per_item.entry(item_id).or_insert(ItemVolume {
                    item_id,
                    quantity: 0,
                    volume: 0.0,
                });
                entry.quantity += u64::from(record.quantity);
                entry.volume += record.total_volume();
            }
        }

        let distinct_items = per_item.len();
        let mut top_items: Vec<ItemVolume> = per_item.into_values().collect();
        top_items.sort_by(|a, b| {
            b.volume
                .total_cmp(&a.volume)
                .then(a.item_id.cmp(&b.item_id))
        });
        top_items.truncate(self.config.top_items);

        Ok(DetailedStats {
            summary,
            distinct_items,
            empty_cells: cells.iter().filter(|(_, occ)| occ.is_empty()).count(),
            top_items,
        })
    }

    /// Cells at or below `max_occupancy_percent`, least occupied first.
    pub fn underutilized_cells(
        &self,
        warehouse_id: WarehouseId,
        max_occupancy_percent: f64,
    ) -> AllocResult<Vec<CellUtilization>> {
        let topology = self.topology.read(self.config.lock_timeout)?;
        let warehouse = topology.warehouse(warehouse_id)?;
        let cells = warehouse_snapshot(&topology, warehouse, &self.config)?;

        let bands = self.config.occupancy_bands;
        let mut result: Vec<CellUtilization> = cells
            .iter()
            .filter(|(_, occ)| occ.occupancy_percent() <= max_occupancy_percent)
            .map(|(cell, occ)| {
                let occupancy_percent = occ.occupancy_percent();
                let recommendation = bands.classify(occupancy_percent);
                CellUtilization {
                    cell_id: cell.id,
                    cell_label: cell.label.clone(),
                    rack_id: cell.rack_id,
                    occupancy_percent,
                    used_volume: occ.used_volume(),
                    capacity_volume: occ.capacity_volume(),
                    recommendation,
                    message: recommendation.message().to_string(),
                }
            })
            .collect();
        result.sort_by(|a, b| {
            a.occupancy_percent
                .total_cmp(&b.occupancy_percent)
                .then(a.cell_id.cmp(&b.cell_id))
        });
        Ok(result)
    }

    /// Cells that could take `quantity` units now, least occupied first.
    pub fn available_cells(&self, item_id: ItemId, quantity: u32) -> AllocResult<Vec<CellCandidate>> {
        require_quantity(quantity)?;
        let item = lookup_item(self.inventory.as_ref(), item_id)?;
        let topology = self.topology.read(self.config.lock_timeout)?;
        rank_candidates(&topology, &item, quantity, self.config.lock_timeout)
    }

    pub fn cell_info(&self, cell_id: CellId) -> AllocResult<CellInfo> {
        let topology = self.topology.read(self.config.lock_timeout)?;
        let cell = topology.cell(cell_id)?;
        let occupancy = cell.snapshot(self.config.lock_timeout)?;
        Ok(CellInfo {
            cell_id: cell.id,
            label: cell.label.clone(),
            rack_id: cell.rack_id,
            warehouse_id: cell.warehouse_id,
            dims: cell.dims,
            capacity_volume: occupancy.capacity_volume(),
            used_volume: occupancy.used_volume(),
            occupancy_percent: occupancy.occupancy_percent(),
            records: occupancy
                .records()
                .map(|(item_id, record)| CellRecordInfo {
                    item_id,
                    quantity: record.quantity,
                    orientation: record.orientation,
                    total_volume: record.total_volume(),
                })
                .collect(),
        })
    }

    /// Largest quantity of the item the cell accepts in its current state.
    pub fn max_placeable(&self, item_id: ItemId, cell_id: CellId) -> AllocResult<u32> {
        let item = lookup_item(self.inventory.as_ref(), item_id)?;
        let topology = self.topology.read(self.config.lock_timeout)?;
        let cell = topology.cell(cell_id)?;
        topology.ensure_compatible(cell, &item)?;
        let occupancy = cell.lock(self.config.lock_timeout)?;
        Ok(occupancy.max_placeable(&item, self.config.max_placeable_ceiling))
    }
}
