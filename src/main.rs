mod algorithm;
mod common;
mod config;
mod constraint;
mod map;
mod scenario;
mod solver;
mod stat;
mod yaml;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::{Cli, Config};
use map::Map;
use scenario::Scenario;
use solver::EcbsSolver;
use yaml::Yaml;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {path}"))?;
            Config::from_yaml_str(&text)?
        }
        None => Config::default().validate()?,
    };
    let config = config.override_from_command_line(&cli)?;

    let agents = if let Some(scen_path) = &config.scen_path {
        let scenario = Scenario::load_from_scen(scen_path)
            .with_context(|| format!("failed to load scenario {scen_path}"))?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        scenario.generate_agents_randomly(config.num_agents, &mut rng)?
    } else if let Some(yaml_path) = &config.agents_yaml_path {
        let map = Map::from_file(&config.map_path, &[])
            .with_context(|| format!("failed to load map {}", config.map_path))?;
        Yaml::from_yaml(yaml_path)?.to_agents(&map)?
    } else {
        bail!("no agent source configured");
    };

    let map = Map::from_file(&config.map_path, &agents)
        .with_context(|| format!("failed to load map {}", config.map_path))?;
    for agent in &agents {
        if !agent.verify(&map) {
            bail!("agent {} start or goal is not traversable", agent.id);
        }
    }

    info!("solving for {} agents on {}", agents.len(), config.map_path);
    let mut solver = EcbsSolver::new(agents.clone(), &map);
    match solver.solve(&config) {
        Some(solution) => {
            if solution.verify(&map, &agents) {
                solution.log_solution("ECBS");
                info!("solution verified");
            } else {
                error!("solution failed verification");
            }
        }
        None => info!("no solution under the current configuration"),
    }

    Ok(())
}
