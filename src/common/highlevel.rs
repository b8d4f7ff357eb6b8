use super::{Agent, Path};
use crate::algorithm::{find_suboptimal_path, travel_time};
use crate::common::MAX_TIMESTEP;
use crate::config::Config;
use crate::constraint::ConstraintTable;
use crate::map::{Map, ROTATION_PHASES};
use crate::stat::Stats;

use std::cmp::max;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum ConflictType {
    Vertex {
        position: (usize, usize),
        time_step: usize,
    },
    Edge {
        from_position: (usize, usize),
        to_position: (usize, usize),
        to_time_step: usize,
    },
    Target {
        position: (usize, usize),
        time_step: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct Conflict {
    pub(crate) agent_1: usize,
    pub(crate) agent_2: usize,
    pub(crate) conflict_type: ConflictType,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Ord, PartialOrd)]
pub(crate) enum Constraint {
    Vertex {
        position: (usize, usize),
        time_step: usize,
        is_permanent: bool,
    },
    Edge {
        from_position: (usize, usize),
        to_position: (usize, usize),
        to_time_step: usize,
    },
}

impl Constraint {
    pub(crate) fn is_violated(
        &self,
        from_pos: (usize, usize),
        to_pos: (usize, usize),
        to_tmstep: usize,
    ) -> bool {
        match self {
            Constraint::Vertex {
                position,
                time_step,
                is_permanent,
            } => {
                if to_pos != *position {
                    return false;
                }
                if *is_permanent {
                    to_tmstep >= *time_step
                } else {
                    to_tmstep == *time_step
                }
            }
            Constraint::Edge {
                from_position,
                to_position,
                to_time_step,
            } => from_pos == *from_position && to_pos == *to_position && to_tmstep == *to_time_step,
        }
    }
}

pub(crate) fn convert_conflict_to_constraint(
    conflict: &Conflict,
    resolve_first: bool,
    target_reasoning: bool,
    agent_to_update: usize,
    new_constraints: &mut [HashSet<Constraint>],
    new_path_length_constraints: &mut [usize],
) {
    match conflict.conflict_type {
        ConflictType::Vertex {
            position,
            time_step,
        } => {
            new_constraints[agent_to_update].insert(Constraint::Vertex {
                position,
                time_step,
                is_permanent: false,
            });
        }
        ConflictType::Edge {
            from_position,
            to_position,
            to_time_step,
        } => {
            new_constraints[agent_to_update].insert(if resolve_first {
                Constraint::Edge {
                    from_position,
                    to_position,
                    to_time_step,
                }
            } else {
                Constraint::Edge {
                    from_position: to_position,
                    to_position: from_position,
                    to_time_step,
                }
            });
        }
        ConflictType::Target {
            position,
            time_step,
        } => {
            if target_reasoning && !resolve_first {
                new_constraints
                    .iter_mut()
                    .enumerate()
                    .filter(|&(agent, _)| agent != conflict.agent_1)
                    .for_each(|(_, constraints)| {
                        constraints.insert(Constraint::Vertex {
                            position,
                            time_step,
                            is_permanent: true,
                        });
                    });
            } else {
                new_constraints[agent_to_update].insert(Constraint::Vertex {
                    position,
                    time_step,
                    is_permanent: false,
                });

                if resolve_first {
                    new_path_length_constraints[agent_to_update] =
                        max(new_path_length_constraints[agent_to_update], time_step);
                }
            }
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub(crate) struct HighLevelOpenNode {
    pub(crate) node_id: u64,
    pub(crate) agents: Vec<Agent>,
    pub(crate) constraints: Vec<HashSet<Constraint>>,
    pub(crate) path_length_constraints: Vec<usize>,
    pub(crate) conflicts: Vec<Conflict>,
    pub(crate) paths: Vec<Path>,
    pub(crate) cost: usize,
    pub(crate) low_level_f_min_agents: Vec<usize>,
}

impl HighLevelOpenNode {
    pub(crate) fn new(
        agents: &[Agent],
        map: &Map,
        config: &Config,
        stats: &mut Stats,
    ) -> Option<Self> {
        // Cheap feasibility probe before committing to the focal search.
        let reach_bound = map.base_size() * ROTATION_PHASES + ROTATION_PHASES;
        for agent in agents {
            let empty = ConstraintTable::new(0, MAX_TIMESTEP);
            let start = map.locate(agent.start.0, agent.start.1);
            let goal = map.locate(agent.goal.0, agent.goal.1);
            if travel_time(map, start, goal, &empty, reach_bound, stats) >= MAX_TIMESTEP {
                debug!("agent {} cannot reach its goal at all", agent.id);
                return None;
            }
        }

        let mut paths = Vec::new();
        let mut low_level_f_min_agents = Vec::new();
        let mut total_cost = 0;

        for agent in agents {
            let (path, f_min) = find_suboptimal_path(
                map,
                agent,
                config.sub_optimal,
                &HashSet::new(),
                0,
                &paths,
                0,
                config.initial_phase,
                stats,
            )
            .found()?;

            // Notice: path include start node.
            total_cost += path.len() - 1;
            paths.insert(agent.id, path);
            low_level_f_min_agents.push(f_min);
        }

        let mut start = HighLevelOpenNode {
            node_id: 0,
            agents: agents.to_vec(),
            constraints: vec![HashSet::new(); agents.len()],
            path_length_constraints: vec![0; agents.len()],
            conflicts: Vec::new(),
            paths,
            cost: total_cost,
            low_level_f_min_agents,
        };
        start.detect_conflicts();
        Some(start)
    }

    pub(crate) fn f_min_sum(&self) -> usize {
        self.low_level_f_min_agents.iter().sum()
    }

    pub(crate) fn detect_conflicts(&mut self) {
        let mut conflicts = Vec::new();

        // Compare paths of each pair of agents to find conflicts.
        for i in 0..self.agents.len() {
            for j in (i + 1)..self.agents.len() {
                let path1 = &self.paths[i];
                let path2 = &self.paths[j];
                let max_length = path1.len().max(path2.len());

                // Step 0 holds distinct start cells, and edge conflicts need
                // a previous step, so scanning starts at 1.
                for step in 1..max_length {
                    let pos1 = if step < path1.len() {
                        path1[step]
                    } else {
                        *path1.last().unwrap()
                    };
                    let pos2 = if step < path2.len() {
                        path2[step]
                    } else {
                        *path2.last().unwrap()
                    };

                    if pos1 == pos2 {
                        if step >= path1.len() - 1 && pos1 == self.agents[i].goal {
                            conflicts.push(Conflict {
                                agent_1: i,
                                agent_2: j,
                                conflict_type: ConflictType::Target {
                                    position: pos1,
                                    time_step: step,
                                },
                            });
                        } else if step >= path2.len() - 1 && pos2 == self.agents[j].goal {
                            conflicts.push(Conflict {
                                agent_1: j,
                                agent_2: i,
                                conflict_type: ConflictType::Target {
                                    position: pos2,
                                    time_step: step,
                                },
                            });
                        } else {
                            conflicts.push(Conflict {
                                agent_1: i,
                                agent_2: j,
                                conflict_type: ConflictType::Vertex {
                                    position: pos1,
                                    time_step: step,
                                },
                            });
                        }
                    }

                    if step >= path1.len() || step >= path2.len() {
                        continue;
                    }

                    let prev_pos1 = path1[step - 1];
                    let prev_pos2 = path2[step - 1];

                    if prev_pos1 == pos2 && prev_pos2 == pos1 {
                        conflicts.push(Conflict {
                            agent_1: i,
                            agent_2: j,
                            conflict_type: ConflictType::Edge {
                                from_position: prev_pos1,
                                to_position: pos1,
                                to_time_step: step,
                            },
                        });
                    }
                }
            }
        }

        debug!("Detect conflicts: {:?}", conflicts);
        self.conflicts = conflicts;
    }

    pub(crate) fn update_constraint(
        &self,
        conflict: &Conflict,
        resolve_first: bool,
        map: &Map,
        config: &Config,
        new_node_id: u64,
        stats: &mut Stats,
    ) -> Option<HighLevelOpenNode> {
        let mut new_constraints = self.constraints.clone();
        let mut new_paths = self.paths.clone();
        let mut new_low_level_f_min_agents = self.low_level_f_min_agents.clone();
        let mut new_path_length_constraints = self.path_length_constraints.clone();

        let agent_to_update = if resolve_first {
            conflict.agent_1
        } else {
            conflict.agent_2
        };

        convert_conflict_to_constraint(
            conflict,
            resolve_first,
            config.op_target_reasoning,
            agent_to_update,
            &mut new_constraints,
            &mut new_path_length_constraints,
        );

        let (new_path, new_f_min) = find_suboptimal_path(
            map,
            &self.agents[agent_to_update],
            config.sub_optimal,
            &new_constraints[agent_to_update],
            new_path_length_constraints[agent_to_update],
            &self.paths,
            self.low_level_f_min_agents[agent_to_update],
            config.initial_phase,
            stats,
        )
        .found()?;

        debug!(
            "Update agent {agent_to_update:?} with path {new_path:?} for conflict {conflict:?}, new f min {new_f_min:?}"
        );

        // Notice: path include start point, calculation here counterbalance each other.
        let new_cost = self.cost - new_paths[agent_to_update].len() + new_path.len();
        new_paths[agent_to_update] = new_path;
        new_low_level_f_min_agents[agent_to_update] = new_f_min;

        let mut new_node = HighLevelOpenNode {
            node_id: new_node_id,
            agents: self.agents.clone(),
            constraints: new_constraints,
            path_length_constraints: new_path_length_constraints,
            conflicts: Vec::new(),
            paths: new_paths,
            cost: new_cost,
            low_level_f_min_agents: new_low_level_f_min_agents,
        };
        new_node.detect_conflicts();

        Some(new_node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("trace")
            .try_init();
    }

    #[test]
    fn test_constraints_violation() {
        init_tracing();
        let non_permanent_vertex_constraint = Constraint::Vertex {
            position: (0, 0),
            time_step: 1,
            is_permanent: false,
        };

        assert!(!non_permanent_vertex_constraint.is_violated((0, 0), (0, 1), 1));
        assert!(non_permanent_vertex_constraint.is_violated((0, 1), (0, 0), 1));
        assert!(!non_permanent_vertex_constraint.is_violated((0, 1), (0, 0), 2));

        let permanent_vertex_constraint = Constraint::Vertex {
            position: (0, 0),
            time_step: 5,
            is_permanent: true,
        };

        assert!(!permanent_vertex_constraint.is_violated((0, 0), (0, 1), 5));
        assert!(permanent_vertex_constraint.is_violated((0, 1), (0, 0), 5));
        assert!(permanent_vertex_constraint.is_violated((0, 1), (0, 0), 6));
        assert!(!permanent_vertex_constraint.is_violated((0, 0), (0, 1), 4));

        let edge_constraint = Constraint::Edge {
            from_position: (0, 0),
            to_position: (0, 1),
            to_time_step: 2,
        };

        assert!(!edge_constraint.is_violated((0, 0), (0, 1), 1));
        assert!(!edge_constraint.is_violated((1, 1), (0, 1), 2));
        assert!(edge_constraint.is_violated((0, 0), (0, 1), 2));
    }

    fn node_with_paths(agents: Vec<Agent>, paths: Vec<Path>) -> HighLevelOpenNode {
        HighLevelOpenNode {
            node_id: 0,
            agents,
            constraints: Vec::new(),
            path_length_constraints: Vec::new(),
            conflicts: Vec::new(),
            paths,
            cost: 0,
            low_level_f_min_agents: Vec::new(),
        }
    }

    #[test]
    fn test_detect_vertex_conflict() {
        init_tracing();
        let agents = vec![
            Agent {
                id: 0,
                start: (2, 2),
                goal: (0, 1),
            },
            Agent {
                id: 1,
                start: (0, 0),
                goal: (0, 3),
            },
        ];
        let paths = vec![
            vec![(2, 2), (1, 2), (0, 2), (0, 1)],
            vec![(0, 0), (0, 1), (0, 2), (0, 3)],
        ];

        let mut node = node_with_paths(agents, paths);
        node.detect_conflicts();

        assert_eq!(
            node.conflicts,
            vec![Conflict {
                agent_1: 0,
                agent_2: 1,
                conflict_type: ConflictType::Vertex {
                    position: (0, 2),
                    time_step: 2
                },
            }]
        );
    }

    #[test]
    fn test_detect_edge_conflict() {
        init_tracing();
        let agents = vec![
            Agent {
                id: 0,
                start: (0, 1),
                goal: (2, 2),
            },
            Agent {
                id: 1,
                start: (2, 2),
                goal: (0, 1),
            },
        ];
        let paths = vec![
            vec![(0, 1), (0, 2), (1, 2), (2, 2)],
            vec![(2, 2), (1, 2), (0, 2), (0, 1)],
        ];

        let mut node = node_with_paths(agents, paths);
        node.detect_conflicts();

        assert_eq!(
            node.conflicts,
            vec![Conflict {
                agent_1: 0,
                agent_2: 1,
                conflict_type: ConflictType::Edge {
                    from_position: (0, 2),
                    to_position: (1, 2),
                    to_time_step: 2
                },
            }]
        );
    }

    #[test]
    fn test_detect_target_conflict() {
        init_tracing();
        let agents = vec![
            Agent {
                id: 0,
                start: (0, 0),
                goal: (0, 4),
            },
            Agent {
                id: 1,
                start: (2, 2),
                goal: (0, 2),
            },
        ];
        let paths = vec![
            vec![(0, 0), (0, 1), (0, 2), (0, 3), (0, 4)],
            vec![(2, 2), (1, 2), (0, 2)],
        ];

        let mut node = node_with_paths(agents, paths);
        node.detect_conflicts();

        assert_eq!(
            node.conflicts,
            vec![Conflict {
                agent_1: 1,
                agent_2: 0,
                conflict_type: ConflictType::Target {
                    position: (0, 2),
                    time_step: 2
                },
            }]
        );
    }

    #[test]
    fn test_convert_vertex_conflict_to_constraint() {
        init_tracing();
        let conflict = Conflict {
            agent_1: 0,
            agent_2: 1,
            conflict_type: ConflictType::Vertex {
                position: (0, 0),
                time_step: 1,
            },
        };
        let mut constraints = vec![HashSet::new(), HashSet::new()];
        let mut path_length_constraints: Vec<usize> = vec![0, 0];

        convert_conflict_to_constraint(
            &conflict,
            true,
            false,
            0,
            &mut constraints,
            &mut path_length_constraints,
        );

        assert_eq!(constraints[0].len(), 1);
        assert!(constraints[0].contains(&Constraint::Vertex {
            position: (0, 0),
            time_step: 1,
            is_permanent: false,
        }));
        assert!(constraints[1].is_empty());
        assert_eq!(path_length_constraints, vec![0, 0]);
    }

    #[test]
    fn test_convert_edge_conflict_to_constraint() {
        init_tracing();
        let conflict = Conflict {
            agent_1: 0,
            agent_2: 1,
            conflict_type: ConflictType::Edge {
                from_position: (0, 0),
                to_position: (0, 1),
                to_time_step: 2,
            },
        };
        let mut constraints = vec![HashSet::new(), HashSet::new()];
        let mut path_length_constraints: Vec<usize> = vec![0, 0];

        convert_conflict_to_constraint(
            &conflict,
            false,
            false,
            1,
            &mut constraints,
            &mut path_length_constraints,
        );

        // The second agent gets the reversed edge.
        assert!(constraints[1].contains(&Constraint::Edge {
            from_position: (0, 1),
            to_position: (0, 0),
            to_time_step: 2,
        }));
        assert!(constraints[0].is_empty());
    }

    #[test]
    fn test_convert_target_conflict_to_constraint() {
        init_tracing();
        let conflict = Conflict {
            agent_1: 0,
            agent_2: 1,
            conflict_type: ConflictType::Target {
                position: (0, 0),
                time_step: 5,
            },
        };
        let mut constraints = vec![HashSet::new(), HashSet::new()];
        let mut path_length_constraints: Vec<usize> = vec![0, 0];

        convert_conflict_to_constraint(
            &conflict,
            true,
            true,
            0,
            &mut constraints,
            &mut path_length_constraints,
        );

        assert!(constraints[0].contains(&Constraint::Vertex {
            position: (0, 0),
            time_step: 5,
            is_permanent: false,
        }));
        assert_eq!(path_length_constraints, vec![5, 0]);

        convert_conflict_to_constraint(
            &conflict,
            false,
            true,
            1,
            &mut constraints,
            &mut path_length_constraints,
        );

        // Target reasoning keeps every other agent off the goal forever.
        assert!(constraints[1].contains(&Constraint::Vertex {
            position: (0, 0),
            time_step: 5,
            is_permanent: true,
        }));
    }
}
