use anyhow::{bail, Result};
use rand::prelude::*;
use serde::Deserialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use tracing::info;

use crate::common::Agent;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Route {
    pub start_x: usize,
    pub start_y: usize,
    pub goal_x: usize,
    pub goal_y: usize,
}

#[derive(Debug, Deserialize)]
pub struct Scenario {
    pub map: String,
    pub map_width: usize,
    pub map_height: usize,
    pub routes: Vec<Route>,
}

impl Scenario {
    pub fn load_from_scen(path: &str) -> io::Result<Scenario> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: BufRead>(reader: R) -> io::Result<Scenario> {
        let mut lines = reader.lines();

        // First line is "version x.x" which we can skip.
        let _version = lines.next().unwrap()?;

        let mut scenario = Scenario {
            map: String::new(),
            map_width: 0,
            map_height: 0,
            routes: Vec::new(),
        };

        for line in lines {
            let line = line?;
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.is_empty() {
                continue;
            }

            let route = Route {
                start_x: parts[5].parse().unwrap(),
                start_y: parts[4].parse().unwrap(),
                goal_x: parts[7].parse().unwrap(),
                goal_y: parts[6].parse().unwrap(),
            };

            if scenario.map.is_empty() {
                // Map details come from the first route entry.
                scenario.map = parts[1].to_string();
                scenario.map_width = parts[2].parse().unwrap();
                scenario.map_height = parts[3].parse().unwrap();
            }

            scenario.routes.push(route);
        }

        Ok(scenario)
    }

    pub fn generate_agents_randomly<R: Rng + ?Sized>(
        &self,
        num_agents: usize,
        rng: &mut R,
    ) -> Result<Vec<Agent>> {
        let mut available_routes = self.routes.clone();
        available_routes.sort();

        if available_routes.len() < num_agents {
            bail!("not enough unique routes available to match the number of agents");
        }

        available_routes.shuffle(rng);

        let agents: Vec<Agent> = available_routes
            .into_iter()
            .take(num_agents)
            .enumerate()
            .map(|(agent_id, route)| Agent {
                id: agent_id,
                start: (route.start_x, route.start_y),
                goal: (route.goal_x, route.goal_y),
            })
            .collect();

        info!("Generate scen: {agents:?}");
        Ok(agents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Cursor;

    const SCEN: &str = "version 1\n\
        0\tarena.map\t8\t8\t1\t2\t5\t2\t4.0\n\
        0\tarena.map\t8\t8\t3\t0\t3\t6\t6.0\n\
        1\tarena.map\t8\t8\t0\t0\t7\t7\t14.0\n";

    #[test]
    fn test_read_scenario() {
        let scen = Scenario::from_reader(Cursor::new(SCEN)).unwrap();

        assert_eq!(scen.map, "arena.map");
        assert_eq!(scen.map_width, 8);
        assert_eq!(scen.map_height, 8);
        assert_eq!(scen.routes.len(), 3);
        // Row/column order flips relative to the file.
        assert_eq!(
            scen.routes[0],
            Route {
                start_x: 2,
                start_y: 1,
                goal_x: 2,
                goal_y: 5,
            }
        );
    }

    #[test]
    fn test_generate_agents_seeded() {
        let scen = Scenario::from_reader(Cursor::new(SCEN)).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let agents = scen.generate_agents_randomly(2, &mut rng).unwrap();
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].id, 0);
        assert_eq!(agents[1].id, 1);

        // The same seed reproduces the same draw.
        let mut rng = StdRng::seed_from_u64(7);
        let again = scen.generate_agents_randomly(2, &mut rng).unwrap();
        assert_eq!(agents, again);

        assert!(scen.generate_agents_randomly(4, &mut rng).is_err());
    }
}
