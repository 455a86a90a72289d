//! The sparse voxel grid: at most one block per 2D cell.
//!
//! Placement is idempotent against identical blocks: placing a block of the
//! same `kind` into a cell that already holds one is reported as
//! [`Placement::AlreadyPresent`] rather than an error. A cell holding a
//! block of a *different* kind rejects the placement with
//! [`WorldError::CellOccupied`].

use std::collections::BTreeMap;

use perpetua_types::{Block, Position};

use crate::error::WorldError;

/// Outcome of an idempotent block placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The cell was empty; the block is now in place.
    Placed,
    /// An identical block was already in the cell; nothing changed.
    AlreadyPresent,
}

/// The sparse voxel grid keyed by [`Position`].
///
/// Backed by a `BTreeMap` so iteration (and therefore every snapshot and
/// perception derived from it) is deterministic.
#[derive(Debug, Clone, Default)]
pub struct VoxelGrid {
    cells: BTreeMap<Position, Block>,
}

impl VoxelGrid {
    /// Create an empty grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// The block at a cell, if any.
    pub fn get(&self, position: Position) -> Option<&Block> {
        self.cells.get(&position)
    }

    /// Whether a cell holds a block.
    pub fn is_occupied(&self, position: Position) -> bool {
        self.cells.contains_key(&position)
    }

    /// Number of occupied cells.
    pub fn occupied_count(&self) -> usize {
        self.cells.len()
    }

    /// Place a block into a cell.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::CellOccupied`] if the cell holds a block of a
    /// different kind.
    pub fn place(&mut self, position: Position, block: Block) -> Result<Placement, WorldError> {
        match self.cells.get(&position) {
            Some(existing) if existing.same_kind(&block) => Ok(Placement::AlreadyPresent),
            Some(existing) => Err(WorldError::CellOccupied {
                position,
                existing_kind: existing.kind.clone(),
            }),
            None => {
                self.cells.insert(position, block);
                Ok(Placement::Placed)
            }
        }
    }

    /// Remove and return the block at a cell.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::CellVacant`] if the cell is empty.
    pub fn remove(&mut self, position: Position) -> Result<Block, WorldError> {
        self.cells
            .remove(&position)
            .ok_or(WorldError::CellVacant(position))
    }

    /// Occupied cells within a Euclidean radius of a center, in grid order.
    pub fn cells_within(&self, center: Position, radius: f64) -> Vec<(Position, &Block)> {
        self.cells
            .iter()
            .filter(|(position, _)| center.distance(**position) <= radius)
            .map(|(position, block)| (*position, block))
            .collect()
    }

    /// Iterate all occupied cells in grid order.
    pub fn iter(&self) -> impl Iterator<Item = (Position, &Block)> {
        self.cells.iter().map(|(position, block)| (*position, block))
    }
}
