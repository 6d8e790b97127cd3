// simulation_main.rs
use log::{error, info};
use traffic_admission::config::{SimulationConfig, USAGE};
use traffic_admission::monitoring::CrossingLog;
use traffic_admission::simulation_engine::simulation::Simulation;

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match SimulationConfig::default().with_args(std::env::args().skip(1)) {
        Ok(Some(config)) => config,
        Ok(None) => {
            println!("{}", USAGE);
            return;
        }
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    println!("Starting traffic simulation...");
    println!("City: {:?}", config.city);
    println!("Duration: {} seconds", config.duration_secs);
    println!("Output: {}", config.output.display());

    let simulation = match Simulation::build(&config) {
        Ok(simulation) => simulation,
        Err(e) => {
            error!("Setup failed: {}", e);
            std::process::exit(1);
        }
    };

    let log = CrossingLog::new(config.output.clone());
    match simulation.run(config.duration(), Some(log)).await {
        Ok(summary) => {
            for (id, stats) in &summary.intersections {
                info!(
                    "{}: {} granted, {} departed, {} still waiting",
                    id, stats.granted, stats.departed, stats.waiting
                );
            }
            println!("Simulation complete! {} crossings recorded.", summary.crossings);
        }
        Err(e) => {
            error!("Simulation failed: {}", e);
            std::process::exit(1);
        }
    }
}
