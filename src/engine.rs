//! Placement engine: decides which cell and orientation receives stock and
//! performs placement, removal and moves against cell occupancy.
//!
//! Every mutation happens while the affected cell lock is held, so two
//! callers can never both commit against the same stale occupancy. Moves hold
//! both cell locks, acquired in ascending id order.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use parking_lot::MutexGuard;
use serde::Serialize;
use utoipa::ToSchema;

use crate::analytics::OccupancyBands;
use crate::error::{AllocResult, AllocatorError, EntityKind};
use crate::inventory::Inventory;
use crate::model::{
    Cell, CellId, CellOccupancy, ItemDescriptor, ItemId, OccupancyRecord, RackId, WarehouseId,
};
use crate::orientation::{DEFAULT_MAX_PLACEABLE_CEILING, Orientation};
use crate::topology::{SharedTopology, Topology};

/// Tunables for placement and analytics.
#[derive(Copy, Clone, Debug)]
pub struct AllocatorConfig {
    /// Upper bound of the max-placeable binary search
    pub max_placeable_ceiling: u32,
    /// Longest wait for a topology or cell lock
    pub lock_timeout: Duration,
    /// Rescans of `place_optimal` when the chosen cell changed under it
    pub commit_retries: u32,
    /// Number of items listed in detailed warehouse statistics
    pub top_items: usize,
    pub occupancy_bands: OccupancyBands,
}

impl AllocatorConfig {
    pub const DEFAULT_MAX_PLACEABLE_CEILING: u32 = DEFAULT_MAX_PLACEABLE_CEILING;
    pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(250);
    pub const DEFAULT_COMMIT_RETRIES: u32 = 3;
    pub const DEFAULT_TOP_ITEMS: usize = 5;

    /// Creates a builder for custom configuration.
    pub fn builder() -> AllocatorConfigBuilder {
        AllocatorConfigBuilder::default()
    }
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_placeable_ceiling: Self::DEFAULT_MAX_PLACEABLE_CEILING,
            lock_timeout: Self::DEFAULT_LOCK_TIMEOUT,
            commit_retries: Self::DEFAULT_COMMIT_RETRIES,
            top_items: Self::DEFAULT_TOP_ITEMS,
            occupancy_bands: OccupancyBands::default(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AllocatorConfigBuilder {
    config: AllocatorConfig,
}

impl AllocatorConfigBuilder {
    pub fn max_placeable_ceiling(mut self, ceiling: u32) -> Self {
        self.config.max_placeable_ceiling = ceiling;
        self
    }

    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout = timeout;
        self
    }

    pub fn commit_retries(mut self, retries: u32) -> Self {
        self.config.commit_retries = retries.max(1);
        self
    }

    pub fn top_items(mut self, n: usize) -> Self {
        self.config.top_items = n;
        self
    }

    pub fn occupancy_bands(mut self, bands: OccupancyBands) -> Self {
        self.config.occupancy_bands = bands;
        self
    }

    pub fn build(self) -> AllocatorConfig {
        self.config
    }
}

/// Committed placement.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct Placement {
    pub item_id: ItemId,
    pub cell_id: CellId,
    pub cell_label: String,
    pub rack_id: RackId,
    pub warehouse_id: WarehouseId,
    pub orientation: Orientation,
    pub quantity: u32,
    /// Occupancy of the cell after the placement
    pub cell_occupancy_percent: f64,
}

/// Committed removal.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct Removal {
    pub item_id: ItemId,
    pub cell_id: CellId,
    pub quantity: u32,
    /// Units of the item left in the cell
    pub remaining: u32,
    pub cell_occupancy_percent: f64,
}

/// Committed move.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct Move {
    pub item_id: ItemId,
    pub quantity: u32,
    pub from: Removal,
    pub to: Placement,
}

/// A cell that can take the requested quantity right now.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct CellCandidate {
    pub cell_id: CellId,
    pub cell_label: String,
    pub rack_id: RackId,
    pub warehouse_id: WarehouseId,
    pub orientation: Orientation,
    pub occupancy_percent: f64,
    pub free_volume: f64,
    #[serde(skip)]
    pub(crate) version: u64,
}

/// Feasible cells for `quantity` units of `item`, least occupied first.
///
/// Each cell is locked only while its occupancy is read, so the result is a
/// snapshot; `version` lets a caller detect that a cell changed afterwards.
/// Ties are broken by ascending cell id.
pub fn rank_candidates(
    topology: &Topology,
    item: &ItemDescriptor,
    quantity: u32,
    timeout: Duration,
) -> AllocResult<Vec<CellCandidate>> {
    let mut candidates = Vec::new();
    for cell in topology.compatible_cells(item) {
        let occupancy = cell.lock(timeout)?;
        let Ok(orientation) = occupancy.admit(item, quantity, None) else {
            continue;
        };
        candidates.push(CellCandidate {
            cell_id: cell.id,
            cell_label: cell.label.clone(),
            rack_id: cell.rack_id,
            warehouse_id: cell.warehouse_id,
            orientation,
            occupancy_percent: occupancy.occupancy_percent(),
            free_volume: occupancy.free_volume(),
            version: occupancy.version(),
        });
    }
    candidates.sort_by(|a, b| {
        a.occupancy_percent
            .total_cmp(&b.occupancy_percent)
            .then(a.cell_id.cmp(&b.cell_id))
    });
    Ok(candidates)
}

pub(crate) fn require_quantity(quantity: u32) -> AllocResult<()> {
    if quantity == 0 {
        return Err(AllocatorError::InvalidRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn lookup_item(inventory: &dyn Inventory, item_id: ItemId) -> AllocResult<ItemDescriptor> {
    inventory
        .descriptor(item_id)
        .ok_or_else(|| AllocatorError::not_found(EntityKind::Item, item_id))
}

fn placement(
    cell: &Cell,
    occupancy: &CellOccupancy,
    item_id: ItemId,
    quantity: u32,
    orientation: Orientation,
) -> Placement {
    Placement {
        item_id,
        cell_id: cell.id,
        cell_label: cell.label.clone(),
        rack_id: cell.rack_id,
        warehouse_id: cell.warehouse_id,
        orientation,
        quantity,
        cell_occupancy_percent: occupancy.occupancy_percent(),
    }
}

fn removal(cell: &Cell, occupancy: &CellOccupancy, item_id: ItemId, quantity: u32) -> Removal {
    Removal {
        item_id,
        cell_id: cell.id,
        quantity,
        remaining: occupancy.record(item_id).map(|r| r.quantity).unwrap_or(0),
        cell_occupancy_percent: occupancy.occupancy_percent(),
    }
}

/// Locks two distinct cells in ascending id order, returned in argument order.
fn lock_pair<'a>(
    first: &'a Cell,
    second: &'a Cell,
    timeout: Duration,
) -> AllocResult<(MutexGuard<'a, CellOccupancy>, MutexGuard<'a, CellOccupancy>)> {
    if first.id < second.id {
        let a = first.lock(timeout)?;
        let b = second.lock(timeout)?;
        Ok((a, b))
    } else {
        let b = second.lock(timeout)?;
        let a = first.lock(timeout)?;
        Ok((a, b))
    }
}

/// Puts withdrawn stock back exactly as it was shelved.
fn compensate(
    occupancy: &mut CellOccupancy,
    item: &ItemDescriptor,
    before: &OccupancyRecord,
    quantity: u32,
) -> AllocResult<()> {
    let shelved = ItemDescriptor {
        id: item.id,
        footprint: Some(before.footprint),
        storage_class: item.storage_class,
    };
    let orientation = occupancy.admit(&shelved, quantity, Some(before.orientation))?;
    occupancy.insert(&shelved, quantity, orientation);
    Ok(())
}

pub struct PlacementEngine {
    topology: SharedTopology,
    inventory: Arc<dyn Inventory>,
    config: AllocatorConfig,
}

impl PlacementEngine {
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

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Places `quantity` units in the least occupied compatible cell that can take them.
    ///
    /// The choice is made on a snapshot of all candidates; the winner is then
    /// re-locked and committed only if it has not changed since. A changed
    /// winner triggers a rescan, bounded by `commit_retries`.
    pub fn place_optimal(&self, item_id: ItemId, quantity: u32) -> AllocResult<Placement> {
        require_quantity(quantity)?;
        let item = lookup_item(self.inventory.as_ref(), item_id)?;
        if !item.is_trackable() {
            return Err(AllocatorError::Infeasible(format!(
                "item {} has no known footprint",
                item.id
            )));
        }

        let timeout = self.config.lock_timeout;
        let topology = self.topology.read(timeout)?;
        if topology.compatible_cells(&item).next().is_none() {
            debug!("No {} cell exists for item {}", item.storage_class, item.id);
            return Err(AllocatorError::Infeasible(format!(
                "no {} storage available for item {}",
                item.storage_class, item.id
            )));
        }

        self.commit_best(&topology, &item, quantity, |topology| {
            rank_candidates(topology, &item, quantity, timeout)
        })
    }

    /// Commits to the top-ranked candidate if it is unchanged since ranking,
    /// rescanning up to `commit_retries` times.
    fn commit_best(
        &self,
        topology: &Topology,
        item: &ItemDescriptor,
        quantity: u32,
        mut rank: impl FnMut(&Topology) -> AllocResult<Vec<CellCandidate>>,
    ) -> AllocResult<Placement> {
        let timeout = self.config.lock_timeout;
        for attempt in 1..=self.config.commit_retries {
            let candidates = rank(topology)?;
            let Some(winner) = candidates.first() else {
                debug!(
                    "No compatible cell can hold {} units of item {}",
                    quantity, item.id
                );
                return Err(AllocatorError::Infeasible(format!(
                    "no compatible cell can hold {} units of item {}",
                    quantity, item.id
                )));
            };

            let cell = topology.cell(winner.cell_id)?;
            let mut occupancy = cell.lock(timeout)?;
            if occupancy.version() != winner.version {
                debug!(
                    "Cell {} changed after ranking (attempt {}/{}), rescanning",
                    cell.id, attempt, self.config.commit_retries
                );
                continue;
            }
            let orientation = occupancy.admit(item, quantity, None)?;
            occupancy.insert(item, quantity, orientation);
            let result = placement(cell, &occupancy, item.id, quantity, orientation);
            drop(occupancy);

            self.inventory.adjust_unplaced(item.id, -i64::from(quantity));
            info!(
                "📦 Placed {} × item {} in cell {} ({:?}, {:.1}% occupied)",
                quantity, item.id, result.cell_label, orientation, result.cell_occupancy_percent
            );
            return Ok(result);
        }

        Err(AllocatorError::ConcurrentModification(format!(
            "candidate cells for item {} kept changing, gave up after {} attempts",
            item.id, self.config.commit_retries
        )))
    }

    /// Places `quantity` units in a specific cell.
    ///
    /// Without an explicit orientation the best one for this cell is derived.
    pub fn place_in_cell(
        &self,
        item_id: ItemId,
        cell_id: CellId,
        quantity: u32,
        orientation: Option<Orientation>,
    ) -> AllocResult<Placement> {
        require_quantity(quantity)?;
        let item = lookup_item(self.inventory.as_ref(), item_id)?;
        let timeout = self.config.lock_timeout;
        let topology = self.topology.read(timeout)?;
        let cell = topology.cell(cell_id)?;
        topology.ensure_compatible(cell, &item)?;

        let mut occupancy = cell.lock(timeout)?;
        let orientation = occupancy.admit(&item, quantity, orientation).inspect_err(|err| {
            debug!("Placement of item {} in cell {} rejected: {}", item.id, cell.id, err);
        })?;
        occupancy.insert(&item, quantity, orientation);
        let result = placement(cell, &occupancy, item.id, quantity, orientation);
        drop(occupancy);

        self.inventory.adjust_unplaced(item.id, -i64::from(quantity));
        info!(
            "📦 Placed {} × item {} in cell {} ({:?}, {:.1}% occupied)",
            quantity, item.id, result.cell_label, orientation, result.cell_occupancy_percent
        );
        Ok(result)
    }

    /// Takes `quantity` units out of a cell and returns them to the unplaced pool.
    pub fn remove_from_cell(
        &self,
        item_id: ItemId,
        cell_id: CellId,
        quantity: u32,
    ) -> AllocResult<Removal> {
        require_quantity(quantity)?;
        let item = lookup_item(self.inventory.as_ref(), item_id)?;
        let timeout = self.config.lock_timeout;
        let topology = self.topology.read(timeout)?;
        let cell = topology.cell(cell_id)?;

        let mut occupancy = cell.lock(timeout)?;
        occupancy.withdraw(item.id, cell.id, quantity)?;
        let result = removal(cell, &occupancy, item.id, quantity);
        drop(occupancy);

        self.inventory.adjust_unplaced(item.id, i64::from(quantity));
        info!(
            "📤 Removed {} × item {} from cell {} ({} left)",
            quantity, item.id, cell.label, result.remaining
        );
        Ok(result)
    }

    /// Moves stock between two cells.
    ///
    /// Runs as removal followed by placement. If the placement fails the
    /// removed units are put back into the source before the error is
    /// returned; if that fails too the result is `CompensationFailure`.
    pub fn move_item(
        &self,
        item_id: ItemId,
        from_cell_id: CellId,
        to_cell_id: CellId,
        quantity: u32,
    ) -> AllocResult<Move> {
        require_quantity(quantity)?;
        if from_cell_id == to_cell_id {
            return Err(AllocatorError::InvalidRequest(
                "source and destination cell are the same".to_string(),
            ));
        }
        let item = lookup_item(self.inventory.as_ref(), item_id)?;
        let timeout = self.config.lock_timeout;
        let topology = self.topology.read(timeout)?;
        let from = topology.cell(from_cell_id)?;
        let to = topology.cell(to_cell_id)?;

        let (mut source, mut target) = lock_pair(from, to, timeout)?;
        let before = source.withdraw(item.id, from.id, quantity)?;

        let placed = topology
            .ensure_compatible(to, &item)
            .and_then(|_| target.admit(&item, quantity, None));
        let orientation = match placed {
            Ok(orientation) => orientation,
            Err(err) => {
                if let Err(rollback) = compensate(&mut source, &item, &before, quantity) {
                    error!(
                        "🚨 Rollback of move failed: {} × item {} withdrawn from cell {} could not be restored ({}); original failure: {}",
                        quantity, item.id, from.id, rollback, err
                    );
                    drop((source, target));
                    self.inventory.adjust_unplaced(item.id, i64::from(quantity));
                    return Err(AllocatorError::CompensationFailure {
                        cell_id: from.id,
                        details: format!("{}; rollback: {}", err, rollback),
                    });
                }
                debug!(
                    "Move of item {} from cell {} to {} rolled back: {}",
                    item.id, from.id, to.id, err
                );
                return Err(err);
            }
        };
        target.insert(&item, quantity, orientation);

        let result = Move {
            item_id: item.id,
            quantity,
            from: removal(from, &source, item.id, quantity),
            to: placement(to, &target, item.id, quantity, orientation),
        };
        info!(
            "🔀 Moved {} × item {} from cell {} to cell {}",
            quantity, item.id, from.label, to.label
        );
        Ok(result)
    }
}
