//! Trade route planning
//!
//! Two planners: a greedy walk over the bare grid used when a caravan is
//! dispatched, and an occupancy-aware A* search used once when a caravan
//! finds its way blocked by a hostile army. Both return the cells to
//! traverse, excluding the starting cell.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ahash::{AHashMap, AHashSet};

use super::map::hex_distance;
use crate::core::config::rules;
use crate::core::types::{CellId, PlayerId};
use crate::world::{Ownership, WorldModel};

/// Greedy nearest-to-goal walk, ignoring occupants
///
/// Each step takes the unvisited neighbour closest to `to`. Stops at the
/// goal, when no unvisited neighbour is left, or at the iteration cap, so
/// the result may fall short of `to` or be empty.
pub fn plan_route(world: &WorldModel, from: CellId, to: CellId) -> Vec<CellId> {
    let mut path = Vec::new();
    if from == to || !world.contains(from) || !world.contains(to) {
        return path;
    }

    let cap = rules().route_iteration_cap;
    let mut visited: AHashSet<CellId> = AHashSet::new();
    let mut current = from;

    while current != to && path.len() < cap {
        let next = world
            .neighbors(current)
            .into_iter()
            .filter(|n| !visited.contains(n))
            .min_by_key(|n| hex_distance(*n, to));
        let Some(next) = next else {
            tracing::debug!(%from, %to, len = path.len(), "greedy route stalled");
            break;
        };
        visited.insert(next);
        path.push(next);
        current = next;
    }
    path
}

/// Whether a caravan of `owner` may pass through `cell`
fn passable(world: &WorldModel, cell: CellId, owner: PlayerId) -> bool {
    match world.cell(cell).map(|c| &c.ownership) {
        Some(Ownership::Empty) => true,
        Some(Ownership::Army { player, .. }) => *player == owner,
        Some(Ownership::Merchant(info)) => info.owner == owner,
        _ => false,
    }
}

struct Node {
    cell: CellId,
    f_cost: u32,
    g_cost: u32,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.cell == other.cell
    }
}
impl Eq for Node {}

impl Ord for Node {
    // Min-heap on f, preferring deeper nodes on ties
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f_cost
            .cmp(&self.f_cost)
            .then_with(|| self.g_cost.cmp(&other.g_cost))
    }
}
impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Shortest path for `owner`'s caravan that avoids foreign occupants
///
/// Empty cells and the owner's own armies and caravans are passable; the
/// goal itself is always enterable. Returns `None` when the goal cannot be
/// reached.
pub fn plan_detour(
    world: &WorldModel,
    from: CellId,
    to: CellId,
    owner: PlayerId,
) -> Option<Vec<CellId>> {
    if !world.contains(from) || !world.contains(to) {
        return None;
    }
    if from == to {
        return Some(Vec::new());
    }

    let mut open_set = BinaryHeap::new();
    let mut came_from: AHashMap<CellId, CellId> = AHashMap::new();
    let mut g_score: AHashMap<CellId, u32> = AHashMap::new();
    let mut closed_set: AHashSet<CellId> = AHashSet::new();

    g_score.insert(from, 0);
    open_set.push(Node {
        cell: from,
        f_cost: hex_distance(from, to),
        g_cost: 0,
    });

    while let Some(current) = open_set.pop() {
        if current.cell == to {
            let mut path = vec![to];
            let mut cursor = to;
            while let Some(&prev) = came_from.get(&cursor) {
                if prev == from {
                    break;
                }
                path.push(prev);
                cursor = prev;
            }
            path.reverse();
            return Some(path);
        }

        if !closed_set.insert(current.cell) {
            continue;
        }

        for neighbor in world.neighbors(current.cell) {
            if closed_set.contains(&neighbor) {
                continue;
            }
            if neighbor != to && !passable(world, neighbor, owner) {
                continue;
            }
            let tentative = current.g_cost + 1;
            if g_score.get(&neighbor).map_or(true, |&g| tentative < g) {
                came_from.insert(neighbor, current.cell);
                g_score.insert(neighbor, tentative);
                open_set.push(Node {
                    cell: neighbor,
                    f_cost: tentative + hex_distance(neighbor, to),
                    g_cost: tentative,
                });
            }
        }
    }

    None
}
