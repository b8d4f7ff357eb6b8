use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;

use crate::common::Agent;
use crate::map::Map;

#[derive(Debug, Serialize, Deserialize)]
pub struct AgentYaml {
    pub name: String,
    #[serde(rename = "potentialGoals")]
    pub potential_goals: Vec<[usize; 2]>,
    pub start: [usize; 2],
}

impl AgentYaml {
    pub fn to_agent(&self, id: usize) -> Agent {
        let goal = (self.potential_goals[0][0], self.potential_goals[0][1]);

        Agent {
            id,
            start: (self.start[0], self.start[1]),
            goal,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Yaml {
    pub agent: Vec<AgentYaml>,
    pub map: String,
}

impl Yaml {
    pub fn from_yaml(path: &str) -> anyhow::Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_yaml::from_reader(reader)?)
    }

    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_agents(&self, map: &Map) -> anyhow::Result<Vec<Agent>> {
        let mut agents = Vec::new();
        for (index, agent_yaml) in self.agent.iter().enumerate() {
            let agent = agent_yaml.to_agent(index);
            if agent.verify(map) {
                agents.push(agent);
            } else {
                anyhow::bail!("verification failed for agent at index {}", index);
            }
        }
        Ok(agents)
    }
}
