mod highlevel;
mod lowlevel;

pub(crate) use highlevel::{Constraint, HighLevelOpenNode};
pub(crate) use lowlevel::SearchNode;

use serde::{Deserialize, Serialize};
use std::cmp::{max, min};
use std::collections::HashSet;
use tracing::{debug, error};

use crate::map::Map;

/// Sentinel for "unreachable" / "unbounded". Small enough that sums of two
/// of them never overflow a usize.
pub const MAX_TIMESTEP: usize = usize::MAX / 4;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Agent {
    pub id: usize,
    pub start: (usize, usize),
    pub goal: (usize, usize),
}

impl Agent {
    pub fn verify(&self, map: &Map) -> bool {
        map.is_passable(self.start.0, self.start.1) && map.is_passable(self.goal.0, self.goal.1)
    }
}

/// One 2-D cell per timestep. Rotations show up as repeated cells.
pub(crate) type Path = Vec<(usize, usize)>;

/// Outcome of one low-level planning call.
pub(crate) enum PlanResult {
    Found { path: Path, f_min: usize },
    /// Open emptied without goal acceptance: infeasible under the
    /// current constraints within the length bound.
    Exhausted { f_min: usize },
    /// The start cell is vertex-constrained at t = 0; no search ran.
    StartBlocked,
}

impl PlanResult {
    pub(crate) fn found(self) -> Option<(Path, usize)> {
        match self {
            PlanResult::Found { path, f_min } => Some((path, f_min)),
            _ => None,
        }
    }

    pub(crate) fn lower_bound(&self) -> usize {
        match self {
            PlanResult::Found { f_min, .. } | PlanResult::Exhausted { f_min } => *f_min,
            PlanResult::StartBlocked => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Solution {
    pub paths: Vec<Path>,
}

impl Solution {
    pub fn verify(&self, map: &Map, agents: &[Agent]) -> bool {
        if self.paths.is_empty() {
            return true;
        }

        if self.paths.len() != agents.len() {
            error!("incomplete solution");
            return false;
        }

        for (path, agent) in self.paths.iter().zip(agents.iter()) {
            if path.first().is_none_or(|&s| s != agent.start)
                || path.last().is_none_or(|&g| g != agent.goal)
            {
                error!(
                    "start and goal failed: path start {:?} path end {:?}, but agent start {:?} agent end {:?}",
                    path.first(),
                    path.last(),
                    agent.start,
                    agent.goal
                );
                return false;
            }

            for window in path.windows(2) {
                if let [first, second] = window {
                    if !Self::are_neighbors(*first, *second) {
                        error!("move step failed");
                        return false;
                    }
                }
            }
        }

        let max_path_length = self.paths.iter().map(|p| p.len()).max().unwrap_or(0);

        for time_step in 0..max_path_length {
            let mut seen_positions = HashSet::new();
            let mut seen_edges = HashSet::new();

            for path in &self.paths {
                let pos = path.get(time_step).unwrap_or_else(|| path.last().unwrap());
                if !map.is_passable(pos.0, pos.1) {
                    error!("impossible move");
                    return false;
                }

                if !seen_positions.insert(pos) {
                    error!("vertex conflict at {pos:?}");
                    return false;
                }

                if time_step >= 1 && time_step < path.len() {
                    let prev_pos = path.get(time_step - 1).unwrap();
                    if prev_pos != pos {
                        let edge = (prev_pos, pos);
                        let reverse_edge = (pos, prev_pos);

                        if !seen_edges.insert(edge) || seen_edges.contains(&reverse_edge) {
                            error!("edge conflict between {edge:?} and {reverse_edge:?}");
                            return false;
                        }
                    }
                }
            }
        }

        true
    }

    // Waits cover the rotation timesteps, so a legal step is either a stay
    // or a single axis-aligned move.
    fn are_neighbors(pos1: (usize, usize), pos2: (usize, usize)) -> bool {
        (pos1.0 == pos2.0 && (max(pos1.1, pos2.1) - min(pos1.1, pos2.1)) == 1)
            || (pos1.1 == pos2.1 && (max(pos1.0, pos2.0) - min(pos1.0, pos2.0)) == 1)
            || (pos1.0 == pos2.0 && pos1.1 == pos2.1)
    }

    pub fn log_solution(&self, solver: &str) {
        let mut formatted_solution = String::new();
        for (index, path) in self.paths.iter().enumerate() {
            formatted_solution.push_str(&format!(" agent{}:\n", index));
            for (t, &(x, y)) in path.iter().enumerate() {
                formatted_solution
                    .push_str(&format!("   - x: {}\n     y: {}\n     t: {}\n", x, y, t));
            }
        }
        debug!("{} solution:\n{}", solver, formatted_solution);
    }
}
