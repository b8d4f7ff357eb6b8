use anyhow::ensure;
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::map::ROTATION_PHASES;

#[derive(Parser, Debug)]
#[command(
    name = "Pivot CBS",
    about = "Bounded-suboptimal MAPF for grid agents that pay to turn.",
    version = "0.1"
)]
pub struct Cli {
    #[arg(long, short, help = "Path to the YAML config file")]
    pub config: Option<String>,

    #[arg(long, help = "Override the suboptimality factor")]
    pub sub_optimal: Option<f64>,

    #[arg(long, help = "Override the number of agents")]
    pub num_agents: Option<usize>,

    #[arg(long, help = "Override the random seed")]
    pub seed: Option<u64>,
}

#[derive(Serialize, Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub map_path: String,
    pub agents_yaml_path: Option<String>,
    pub scen_path: Option<String>,
    pub num_agents: usize,
    pub seed: u64,
    pub sub_optimal: f64,
    /// Rotation phase every agent starts in: 0 is row-aligned,
    /// ROTATION_PHASES - 1 is column-aligned.
    pub initial_phase: usize,
    pub op_target_reasoning: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            map_path: "map_file/test/test.map".to_string(),
            agents_yaml_path: Some("map_file/test/test.yaml".to_string()),
            scen_path: None,
            num_agents: 4,
            seed: 0,
            sub_optimal: 1.2,
            initial_phase: 0,
            op_target_reasoning: true,
        }
    }
}

impl Config {
    pub fn from_yaml_str(config_str: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(config_str)?;
        config.validate()
    }

    pub fn override_from_command_line(mut self, cli: &Cli) -> anyhow::Result<Self> {
        if let Some(sub_optimal) = cli.sub_optimal {
            self.sub_optimal = sub_optimal;
        }
        if let Some(num_agents) = cli.num_agents {
            self.num_agents = num_agents;
        }
        if let Some(seed) = cli.seed {
            self.seed = seed;
        }
        self.validate()
    }

    pub fn validate(self) -> anyhow::Result<Self> {
        ensure!(
            self.sub_optimal >= 1.0,
            "suboptimality factor must be at least 1.0, got {}",
            self.sub_optimal
        );
        ensure!(
            self.initial_phase < ROTATION_PHASES,
            "initial phase must lie in [0, {})",
            ROTATION_PHASES
        );
        ensure!(
            self.agents_yaml_path.is_some() || self.scen_path.is_some(),
            "either an agents YAML or a scenario file must be configured"
        );
        Ok(self)
    }
}
