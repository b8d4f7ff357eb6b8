mod astarfocal;
mod travel;

pub(crate) use astarfocal::find_suboptimal_path;
pub(crate) use travel::travel_time;

use crate::common::{Path, SearchNode};
use crate::map::Map;

/// Walk the parent chain back to the start, projecting every state to its
/// 2-D cell. One entry per timestep, rotations included as repeated cells.
fn construct_path(map: &Map, nodes: &[SearchNode], last: usize) -> Path {
    let mut current = if nodes[last].is_goal {
        nodes[last].parent
    } else {
        Some(last)
    };

    let mut path = Vec::new();
    while let Some(id) = current {
        path.push(map.coordinate(map.project(nodes[id].loc3)));
        current = nodes[id].parent;
    }
    path.reverse();
    path
}
