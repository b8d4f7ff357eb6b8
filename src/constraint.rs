use std::cmp::max;
use std::collections::HashSet;

use crate::common::{Constraint, Path, MAX_TIMESTEP};

/// Per-call view of everything that restricts one agent's motion: the
/// vertex/edge constraints handed down by the conflict resolver, the path
/// length window, and the committed paths of the other agents (the
/// conflict avoidance table).
#[derive(Debug, Clone)]
pub(crate) struct ConstraintTable {
    constraints: Vec<Constraint>,
    cat: Vec<Path>,
    pub(crate) length_min: usize,
    pub(crate) length_max: usize,
    max_constraint_timestep: usize,
}

impl ConstraintTable {
    pub(crate) fn new(length_min: usize, length_max: usize) -> Self {
        ConstraintTable {
            constraints: Vec::new(),
            cat: Vec::new(),
            length_min,
            length_max,
            max_constraint_timestep: 0,
        }
    }

    pub(crate) fn insert_constraints(&mut self, constraints: &HashSet<Constraint>) {
        for constraint in constraints {
            let time_step = match constraint {
                Constraint::Vertex { time_step, .. } => *time_step,
                Constraint::Edge { to_time_step, .. } => *to_time_step,
            };
            self.max_constraint_timestep = max(self.max_constraint_timestep, time_step);
            self.constraints.push(constraint.clone());
        }
    }

    /// Commit the other agents' paths for conflict counting. The planning
    /// agent's own slot is skipped.
    pub(crate) fn insert_cat(&mut self, agent: usize, paths: &[Path]) {
        for (other, path) in paths.iter().enumerate() {
            if other == agent || path.is_empty() {
                continue;
            }
            self.cat.push(path.clone());
        }
    }

    /// One past the latest timestep at which anything here still moves or
    /// binds; beyond it the world is static.
    pub(crate) fn max_timestep(&self) -> usize {
        let cat_horizon = self
            .cat
            .iter()
            .map(|path| path.len().saturating_sub(1))
            .max()
            .unwrap_or(0);
        max(self.max_constraint_timestep, cat_horizon)
    }

    pub(crate) fn constrained(&self, position: (usize, usize), time_step: usize) -> bool {
        self.constraints
            .iter()
            .any(|constraint| match constraint {
                Constraint::Vertex { .. } => constraint.is_violated(position, position, time_step),
                Constraint::Edge { .. } => false,
            })
    }

    pub(crate) fn constrained_edge(
        &self,
        from_position: (usize, usize),
        to_position: (usize, usize),
        to_time_step: usize,
    ) -> bool {
        self.constraints
            .iter()
            .any(|constraint| match constraint {
                Constraint::Edge { .. } => {
                    constraint.is_violated(from_position, to_position, to_time_step)
                }
                Constraint::Vertex { .. } => false,
            })
    }

    /// Earliest timestep from which the agent may sit on its goal forever.
    /// A permanent constraint on the goal means never.
    pub(crate) fn holding_time(&self, goal: (usize, usize), length_min: usize) -> usize {
        let mut holding_time = length_min;
        for constraint in &self.constraints {
            if let Constraint::Vertex {
                position,
                time_step,
                is_permanent,
            } = constraint
            {
                if *position != goal {
                    continue;
                }
                if *is_permanent {
                    return MAX_TIMESTEP;
                }
                holding_time = max(holding_time, time_step + 1);
            }
        }
        holding_time
    }

    /// Count of committed path segments colliding with the step
    /// `from -> to` arriving at `time_step`. Agents that already finished
    /// park on their last cell.
    pub(crate) fn num_conflicts_for_step(
        &self,
        from_position: (usize, usize),
        to_position: (usize, usize),
        time_step: usize,
    ) -> usize {
        debug_assert_ne!(time_step, 0);

        let mut conflict_count = 0;
        for path in &self.cat {
            let other_position = path.get(time_step).unwrap_or_else(|| path.last().unwrap());

            if *other_position == to_position {
                conflict_count += 1;
            }

            if time_step >= path.len() {
                continue;
            }
            let other_prev_position = path.get(time_step - 1).unwrap();
            if *other_position == from_position && *other_prev_position == to_position {
                conflict_count += 1;
            }
        }

        conflict_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(constraints: Vec<Constraint>) -> ConstraintTable {
        let mut table = ConstraintTable::new(0, MAX_TIMESTEP);
        table.insert_constraints(&constraints.into_iter().collect());
        table
    }

    #[test]
    fn test_vertex_and_edge_lookup() {
        let table = table_with(vec![
            Constraint::Vertex {
                position: (1, 1),
                time_step: 3,
                is_permanent: false,
            },
            Constraint::Edge {
                from_position: (0, 0),
                to_position: (1, 0),
                to_time_step: 2,
            },
        ]);

        assert!(table.constrained((1, 1), 3));
        assert!(!table.constrained((1, 1), 2));
        assert!(!table.constrained((0, 0), 2));

        assert!(table.constrained_edge((0, 0), (1, 0), 2));
        assert!(!table.constrained_edge((1, 0), (0, 0), 2));
        assert!(!table.constrained_edge((0, 0), (1, 0), 1));

        assert_eq!(table.max_timestep(), 3);
    }

    #[test]
    fn test_holding_time_pushed_past_goal_constraints() {
        let table = table_with(vec![
            Constraint::Vertex {
                position: (2, 0),
                time_step: 4,
                is_permanent: false,
            },
            Constraint::Vertex {
                position: (0, 1),
                time_step: 9,
                is_permanent: false,
            },
        ]);

        assert_eq!(table.holding_time((2, 0), 0), 5);
        assert_eq!(table.holding_time((2, 0), 7), 7);
        assert_eq!(table.holding_time((3, 3), 2), 2);
    }

    #[test]
    fn test_holding_time_permanent_goal_block() {
        let table = table_with(vec![Constraint::Vertex {
            position: (2, 0),
            time_step: 4,
            is_permanent: true,
        }]);
        assert_eq!(table.holding_time((2, 0), 0), MAX_TIMESTEP);
    }

    #[test]
    fn test_cat_counts_vertex_and_edge_hits() {
        let mut table = ConstraintTable::new(0, MAX_TIMESTEP);
        let paths = vec![
            vec![(0, 0), (1, 0), (2, 0)],
            vec![(4, 4), (3, 4)],
        ];
        table.insert_cat(0, &paths);

        // Moving onto the other agent's cell at t = 1.
        assert_eq!(table.num_conflicts_for_step((3, 4), (3, 4), 1), 1);
        // Swapping with the other agent across the same edge.
        assert_eq!(table.num_conflicts_for_step((3, 4), (4, 4), 1), 1);
        // A finished agent parks at its last cell.
        assert_eq!(table.num_conflicts_for_step((2, 4), (3, 4), 5), 1);
        assert_eq!(table.num_conflicts_for_step((0, 0), (0, 1), 1), 0);

        assert_eq!(table.max_timestep(), 1);
    }

    #[test]
    fn test_cat_skips_own_agent() {
        let mut table = ConstraintTable::new(0, MAX_TIMESTEP);
        let paths = vec![vec![(0, 0), (0, 1)]];
        table.insert_cat(0, &paths);
        assert_eq!(table.num_conflicts_for_step((0, 0), (0, 1), 1), 0);
    }
}
