use super::construct_path;
use crate::common::{Agent, Constraint, Path, PlanResult, SearchNode};
use crate::constraint::ConstraintTable;
use crate::map::{Map, ROTATION_PHASES};
use crate::stat::Stats;

use std::cmp::{max, min};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, instrument, trace};

/// Bounded-suboptimal space-time search over the rotation lattice.
///
/// Finds a path whose cost is within `subopt_factor` of optimal while
/// minimizing collisions with the committed `paths` of the other agents.
/// Constraints, the heuristic, and the returned path all live in 2-D; only
/// expansion sees the rotation layer.
#[allow(clippy::too_many_arguments)]
#[instrument(skip_all, name = "focal_space_time_astar", fields(agent = agent.id, subopt_factor = subopt_factor, lower_bound = lower_bound, start = format!("{:?}", agent.start), goal = format!("{:?}", agent.goal)), level = "debug")]
pub(crate) fn find_suboptimal_path(
    map: &Map,
    agent: &Agent,
    subopt_factor: f64,
    constraints: &HashSet<Constraint>,
    path_length_constraint: usize,
    paths: &[Path],
    lower_bound: usize,
    start_phase: usize,
    stats: &mut Stats,
) -> PlanResult {
    debug!("constraints: {constraints:?}, length constraint: {path_length_constraint:?}");

    let mut table = ConstraintTable::new(path_length_constraint, crate::common::MAX_TIMESTEP);
    table.insert_constraints(constraints);

    if table.constrained(agent.start, 0) {
        debug!("start cell constrained at t = 0");
        return PlanResult::StartBlocked;
    }

    table.insert_cat(agent.id, paths);

    let holding_time = table.holding_time(agent.goal, table.length_min);
    let static_timestep = table.max_timestep() + 1;
    let lower_bound = max(lower_bound, holding_time);

    // The caller usually leaves length_max at the sentinel; bound the
    // horizon ourselves so the arena cannot grow without limit.
    let slack = map.base_size() * ROTATION_PHASES;
    let length_max = min(
        table.length_max,
        max(static_timestep, min(holding_time, crate::common::MAX_TIMESTEP - slack)) + slack,
    );

    let start_loc2 = map.locate(agent.start.0, agent.start.1);
    let goal_loc2 = map.locate(agent.goal.0, agent.goal.1);

    let mut nodes: Vec<SearchNode> = Vec::new();
    let mut arena_index: HashMap<(usize, usize), usize> = HashMap::new();
    let mut open_list = BTreeSet::new();
    let mut focal_list = BTreeSet::new();

    let root = SearchNode {
        loc3: map.encode_3d(agent.start.0, agent.start.1, start_phase),
        g: 0,
        h: max(lower_bound, map.heuristic[agent.id][start_loc2]),
        timestep: 0,
        parent: None,
        num_of_conflicts: 0,
        wait_at_goal: false,
        is_goal: false,
        in_openlist: true,
    };
    let mut min_f_val = root.f();

    arena_index.insert((root.loc3, root.timestep), 0);
    open_list.insert(root.open_key(0));
    focal_list.insert(root.focal_key(0));
    nodes.push(root);

    while let Some(open_head) = open_list.first().copied() {
        // Refresh the focal list when the open head moved past the cached
        // lower bound; the returned f_lb is this value on exit.
        if open_head.f > min_f_val {
            let new_min_f_val = open_head.f;
            for key in open_list.iter() {
                if key.f as f64 > subopt_factor * min_f_val as f64
                    && key.f as f64 <= subopt_factor * new_min_f_val as f64
                {
                    focal_list.insert(nodes[key.id].focal_key(key.id));
                }
            }
            min_f_val = new_min_f_val;
        }

        let popped = *focal_list
            .first()
            .expect("focal list empty while open is not");
        focal_list.remove(&popped);
        let current_id = popped.id;

        assert!(open_list.remove(&nodes[current_id].open_key(current_id)));
        nodes[current_id].in_openlist = false;
        stats.low_level_expand_focal_nodes += 1;

        let current = nodes[current_id].clone();
        trace!("expand node: {current:?}");

        if map.project(current.loc3) == goal_loc2
            && !current.wait_at_goal
            && current.timestep >= holding_time
        {
            debug!("find solution with f min {min_f_val:?}");
            return PlanResult::Found {
                path: construct_path(map, &nodes, current_id),
                f_min: min_f_val,
            };
        }

        if current.timestep >= length_max {
            continue;
        }

        let mut next_locations = map.neighbors_3d(current.loc3);
        next_locations.push(current.loc3);

        for next_loc3 in next_locations {
            let mut next_timestep = current.timestep + 1;
            if static_timestep < next_timestep {
                // Time is frozen past the last constraint; an exact
                // self-loop would duplicate the frozen state.
                if next_loc3 == current.loc3 {
                    continue;
                }
                next_timestep -= 1;
            }

            let current_pos = map.coordinate(map.project(current.loc3));
            let next_pos = map.coordinate(map.project(next_loc3));

            if table.constrained(next_pos, next_timestep)
                || table.constrained_edge(current_pos, next_pos, next_timestep)
            {
                continue;
            }

            let next_g = current.g + 1;
            let next_h = max(
                lower_bound.saturating_sub(next_g),
                map.heuristic[agent.id][map.project(next_loc3)],
            );
            if next_g + next_h > length_max {
                continue;
            }

            let next_conflicts = current.num_of_conflicts
                + table.num_conflicts_for_step(current_pos, next_pos, next_timestep);

            let candidate = SearchNode {
                loc3: next_loc3,
                g: next_g,
                h: next_h,
                timestep: next_timestep,
                parent: Some(current_id),
                num_of_conflicts: next_conflicts,
                wait_at_goal: next_pos == agent.goal && current_pos == agent.goal,
                is_goal: false,
                in_openlist: true,
            };

            match arena_index.get(&(next_loc3, next_timestep)).copied() {
                None => {
                    let id = nodes.len();
                    arena_index.insert((next_loc3, next_timestep), id);
                    open_list.insert(candidate.open_key(id));
                    if candidate.f() as f64 <= subopt_factor * min_f_val as f64 {
                        focal_list.insert(candidate.focal_key(id));
                    }
                    nodes.push(candidate);
                }
                Some(existing_id) => {
                    let existing = &nodes[existing_id];
                    let dominates = candidate.f() < existing.f()
                        || (candidate.f() == existing.f()
                            && candidate.num_of_conflicts < existing.num_of_conflicts);
                    if !dominates {
                        continue;
                    }

                    let focal_admissible =
                        candidate.f() as f64 <= subopt_factor * min_f_val as f64;

                    if !existing.in_openlist {
                        // Already expanded once; bring it back with the
                        // better payload.
                        nodes[existing_id].copy_payload(&candidate);
                        nodes[existing_id].in_openlist = true;
                        open_list.insert(nodes[existing_id].open_key(existing_id));
                        if focal_admissible {
                            focal_list.insert(nodes[existing_id].focal_key(existing_id));
                        }
                    } else {
                        let was_in_focal =
                            existing.f() as f64 <= subopt_factor * min_f_val as f64;
                        let old_open_key = existing.open_key(existing_id);
                        let old_focal_key = existing.focal_key(existing_id);

                        nodes[existing_id].copy_payload(&candidate);

                        assert!(open_list.remove(&old_open_key));
                        open_list.insert(nodes[existing_id].open_key(existing_id));
                        if focal_admissible {
                            if was_in_focal {
                                assert!(focal_list.remove(&old_focal_key));
                            }
                            focal_list.insert(nodes[existing_id].focal_key(existing_id));
                        }
                    }
                }
            }
        }
    }

    debug!("cannot find solution, f min {min_f_val:?}");
    PlanResult::Exhausted { f_min: min_f_val }
}
