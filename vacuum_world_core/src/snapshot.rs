//! Saving and loading a world as JSON.
//!
//! A snapshot is a flat list of per-cell records. Identities are not stored:
//! loading hands out fresh ids, so a round trip preserves colours,
//! orientations and occupancy but not ids.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    Colour, DirtColour, EntityId, IdGenerator,
    ambient::{Ambient, GridError},
    geometry::{Coord, Orientation},
    location::{ActorAppearance, DirtAppearance},
};

/// Represents errors raised while reading a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot contains no cells")]
    Empty,
    #[error("snapshot has {0} cells, which is not a square grid")]
    NotSquare(usize),
    #[error("cell ({x}, {y}) lies outside a {size}x{size} grid")]
    OutOfBounds { x: i32, y: i32, size: usize },
    #[error("cell ({x}, {y}) appears more than once")]
    DuplicateCell { x: i32, y: i32 },
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// The actor part of a cell record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRecord {
    pub colour: Colour,
    pub orientation: Orientation,
    /// Name of the mind driving this actor, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mind: Option<String>,
}

/// The dirt part of a cell record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirtRecord {
    pub colour: DirtColour,
}

/// One cell of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub x: i32,
    pub y: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<ActorRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dirt: Option<DirtRecord>,
}

/// An actor rebuilt from a snapshot, in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedActor {
    pub id: EntityId,
    pub coord: Coord,
    pub colour: Colour,
    pub mind: Option<String>,
}

/// A whole world in persisted form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    pub locations: Vec<LocationRecord>,
}

impl Snapshot {
    /// Records every cell of `ambient`. `mind_of` names the mind of each actor.
    pub fn capture<F>(ambient: &Ambient, mut mind_of: F) -> Self
    where
        F: FnMut(EntityId) -> Option<String>,
    {
        let locations = ambient
            .locations()
            .map(|location| {
                let coord = location.coord();
                LocationRecord {
                    x: coord.x,
                    y: coord.y,
                    actor: location.actor().map(|actor| ActorRecord {
                        colour: actor.colour(),
                        orientation: actor.orientation(),
                        mind: mind_of(actor.id()),
                    }),
                    dirt: location.dirt().map(|dirt| DirtRecord {
                        colour: dirt.colour(),
                    }),
                }
            })
            .collect();
        Snapshot { locations }
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Side length of the grid this snapshot describes.
    pub fn size(&self) -> Result<usize, SnapshotError> {
        let cells = self.locations.len();
        if cells == 0 {
            return Err(SnapshotError::Empty);
        }
        let side = (cells as f64).sqrt().round() as usize;
        if side * side == cells {
            Ok(side)
        } else {
            Err(SnapshotError::NotSquare(cells))
        }
    }

    /// Rebuilds the world, drawing fresh ids from `ids`.
    pub fn restore(&self, ids: &mut IdGenerator) -> Result<(Ambient, Vec<LoadedActor>), SnapshotError> {
        let size = self.size()?;
        let mut ambient = Ambient::new(size);
        let mut seen = BTreeSet::new();
        let mut records: Vec<&LocationRecord> = self.locations.iter().collect();
        records.sort_by_key(|record| (record.y, record.x));

        let mut actors = Vec::new();
        for record in records {
            let coord = Coord::new(record.x, record.y);
            // Check bounds
            if !ambient.contains(coord) {
                return Err(SnapshotError::OutOfBounds {
                    x: record.x,
                    y: record.y,
                    size,
                });
            }
            if !seen.insert(coord) {
                return Err(SnapshotError::DuplicateCell {
                    x: record.x,
                    y: record.y,
                });
            }
            // Actors first, so ids follow row-major order
            if let Some(actor) = &record.actor {
                let id = ids.next_id();
                ambient.place_actor(coord, ActorAppearance::new(id, actor.colour, actor.orientation))?;
                actors.push(LoadedActor {
                    id,
                    coord,
                    colour: actor.colour,
                    mind: actor.mind.clone(),
                });
            }
            if let Some(dirt) = record.dirt {
                ambient.place_dirt(coord, DirtAppearance::new(ids.next_id(), dirt.colour))?;
            }
        }
        Ok((ambient, actors))
    }
}
