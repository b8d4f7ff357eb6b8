use crate::common::{SearchNode, MAX_TIMESTEP};
use crate::constraint::ConstraintTable;
use crate::map::Map;
use crate::stat::Stats;

use std::collections::{BTreeSet, HashMap};
use tracing::{instrument, trace};

/// Plain 2-D space-time A* used by the outer solver to ask "how soon can
/// this cell be reached under these constraints?". No focal list, no
/// conflict counting; Manhattan distance guides the search. Returns
/// MAX_TIMESTEP when `end` is not reachable in under `upper_bound` steps.
#[instrument(skip_all, name = "travel_time", fields(start = start, end = end, upper_bound = upper_bound), level = "debug")]
pub(crate) fn travel_time(
    map: &Map,
    start: usize,
    end: usize,
    constraint_table: &ConstraintTable,
    upper_bound: usize,
    stats: &mut Stats,
) -> usize {
    let static_timestep = constraint_table.max_timestep() + 1;

    let mut nodes: Vec<SearchNode> = Vec::new();
    let mut arena_index: HashMap<(usize, usize), usize> = HashMap::new();
    let mut open_list = BTreeSet::new();

    let root = SearchNode {
        loc3: start,
        g: 0,
        h: map.manhattan(start, end),
        timestep: 0,
        parent: None,
        num_of_conflicts: 0,
        wait_at_goal: false,
        is_goal: false,
        in_openlist: true,
    };
    arena_index.insert((start, 0), 0);
    open_list.insert(root.open_key(0));
    nodes.push(root);

    while let Some(key) = open_list.pop_first() {
        let current = nodes[key.id].clone();
        stats.low_level_expand_open_nodes += 1;
        trace!("expand node: {current:?}");

        if current.loc3 == end {
            return current.g;
        }

        let mut next_locations: Vec<usize> = map.neighbors_2d(current.loc3).to_vec();
        next_locations.push(current.loc3);

        for next_location in next_locations {
            let mut next_timestep = current.timestep + 1;
            let next_g = current.g + 1;
            if static_timestep < next_timestep {
                if next_location == current.loc3 {
                    continue;
                }
                next_timestep -= 1;
            }

            let current_pos = map.coordinate(current.loc3);
            let next_pos = map.coordinate(next_location);
            if constraint_table.constrained(next_pos, next_timestep)
                || constraint_table.constrained_edge(current_pos, next_pos, next_timestep)
            {
                continue;
            }

            let next_h = map.manhattan(next_location, end);
            if next_g + next_h >= upper_bound {
                continue;
            }

            match arena_index.get(&(next_location, next_timestep)).copied() {
                None => {
                    let id = nodes.len();
                    let next = SearchNode {
                        loc3: next_location,
                        g: next_g,
                        h: next_h,
                        timestep: next_timestep,
                        parent: None,
                        num_of_conflicts: 0,
                        wait_at_goal: false,
                        is_goal: false,
                        in_openlist: true,
                    };
                    arena_index.insert((next_location, next_timestep), id);
                    open_list.insert(next.open_key(id));
                    nodes.push(next);
                }
                Some(existing_id) => {
                    // Only the arrival time can improve; h is fixed per cell.
                    if nodes[existing_id].g > next_g {
                        let old_key = nodes[existing_id].open_key(existing_id);
                        nodes[existing_id].g = next_g;
                        nodes[existing_id].timestep = next_timestep;
                        if open_list.remove(&old_key) {
                            open_list.insert(nodes[existing_id].open_key(existing_id));
                        }
                    }
                }
            }
        }
    }

    MAX_TIMESTEP
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Agent, Constraint};
    use crate::map::tests::{test_map, test_map_with_body};
    use std::collections::HashSet;

    #[test]
    fn test_travel_time_unconstrained() {
        let map = test_map(&[]);
        let table = ConstraintTable::new(0, MAX_TIMESTEP);
        let mut stats = Stats::default();

        let start = map.locate(0, 0);
        let end = map.locate(2, 3);
        assert_eq!(
            travel_time(&map, start, end, &table, MAX_TIMESTEP, &mut stats),
            5
        );
        assert_eq!(
            travel_time(&map, start, start, &table, MAX_TIMESTEP, &mut stats),
            0
        );
    }

    #[test]
    fn test_travel_time_waits_out_constraint() {
        let map = test_map(&[]);
        let mut table = ConstraintTable::new(0, MAX_TIMESTEP);
        table.insert_constraints(
            &[Constraint::Vertex {
                position: (1, 0),
                time_step: 1,
                is_permanent: false,
            }]
            .into_iter()
            .collect::<HashSet<_>>(),
        );
        let mut stats = Stats::default();

        let start = map.locate(0, 0);
        let end = map.locate(2, 0);
        assert_eq!(
            travel_time(&map, start, end, &table, MAX_TIMESTEP, &mut stats),
            3
        );
    }

    #[test]
    fn test_travel_time_upper_bound_cuts_off() {
        let map = test_map(&[]);
        let table = ConstraintTable::new(0, MAX_TIMESTEP);
        let mut stats = Stats::default();

        let start = map.locate(0, 0);
        let end = map.locate(4, 4);
        assert_eq!(travel_time(&map, start, end, &table, 8, &mut stats), MAX_TIMESTEP);
        assert_eq!(travel_time(&map, start, end, &table, 9, &mut stats), 8);
    }

    #[test]
    fn test_travel_time_unreachable() {
        let agent = Agent {
            id: 0,
            start: (0, 0),
            goal: (0, 2),
        };
        let map = test_map_with_body(1, 3, ".@.", &[agent]);
        let table = ConstraintTable::new(0, MAX_TIMESTEP);
        let mut stats = Stats::default();

        assert_eq!(
            travel_time(&map, map.locate(0, 0), map.locate(0, 2), &table, 100, &mut stats),
            MAX_TIMESTEP
        );
    }
}
