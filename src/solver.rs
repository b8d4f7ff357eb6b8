use std::collections::{BTreeSet, HashMap};
use std::time::Instant;
use tracing::debug;

use crate::common::{Agent, HighLevelOpenNode, Solution};
use crate::config::Config;
use crate::map::Map;
use crate::stat::Stats;

/// Focal search over the constraint tree. Open is ordered by the sum of
/// the agents' low-level lower bounds; the focal list holds nodes whose
/// cost stays within the suboptimality factor of that sum, ordered by
/// conflict count.
pub struct EcbsSolver {
    agents: Vec<Agent>,
    map: Map,
    stats: Stats,
}

impl EcbsSolver {
    pub fn new(agents: Vec<Agent>, map: &Map) -> Self {
        EcbsSolver {
            agents,
            map: map.clone(),
            stats: Stats::default(),
        }
    }

    pub fn solve(&mut self, config: &Config) -> Option<Solution> {
        let total_solve_start_time = Instant::now();
        let subopt_factor = config.sub_optimal;

        let root = HighLevelOpenNode::new(&self.agents, &self.map, config, &mut self.stats)?;

        // Node storage plus two key sets; ids keep equal keys reproducible.
        let mut nodes: HashMap<u64, HighLevelOpenNode> = HashMap::new();
        let mut open: BTreeSet<(usize, usize, u64)> = BTreeSet::new();
        let mut focal: BTreeSet<(usize, usize, u64)> = BTreeSet::new();

        let mut lower_bound = root.f_min_sum();
        let mut next_node_id: u64 = 0;

        open.insert((root.f_min_sum(), root.cost, root.node_id));
        focal.insert((root.conflicts.len(), root.cost, root.node_id));
        nodes.insert(root.node_id, root);

        while let Some(&(head_f_min_sum, _, _)) = open.first() {
            // Lift newly admissible nodes into focal when the bound moves.
            if lower_bound < head_f_min_sum {
                for &(_, cost, id) in open.iter() {
                    if cost as f64 > subopt_factor * lower_bound as f64
                        && cost as f64 <= subopt_factor * head_f_min_sum as f64
                    {
                        focal.insert((nodes[&id].conflicts.len(), cost, id));
                    }
                }
                lower_bound = head_f_min_sum;
            }

            let popped = *focal.first().expect("focal empty while open is not");
            focal.remove(&popped);
            let current = nodes.remove(&popped.2).unwrap();
            assert!(open.remove(&(current.f_min_sum(), current.cost, current.node_id)));

            if current.conflicts.is_empty() {
                debug!("Find solution");
                let total_solve_time = total_solve_start_time.elapsed();
                self.stats.time_us = total_solve_time.as_micros() as usize;
                self.stats.costs = current.cost;
                self.stats.print("ECBS");
                return Some(Solution {
                    paths: current.paths,
                });
            }

            let conflict = current.conflicts.first().unwrap().clone();
            for resolve_first in [true, false] {
                next_node_id += 1;
                if let Some(child) = current.update_constraint(
                    &conflict,
                    resolve_first,
                    &self.map,
                    config,
                    next_node_id,
                    &mut self.stats,
                ) {
                    self.stats.high_level_expand_nodes += 1;
                    open.insert((child.f_min_sum(), child.cost, child.node_id));
                    if child.cost as f64 <= subopt_factor * lower_bound as f64 {
                        focal.insert((child.conflicts.len(), child.cost, child.node_id));
                    }
                    nodes.insert(child.node_id, child);
                }
            }
        }

        None
    }
}
