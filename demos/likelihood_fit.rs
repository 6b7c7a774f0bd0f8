//! Likelihood fitting example: load events, shard them across a pool, and
//! drive repeated evaluation rounds the way a minimizer would.
//!
//! The "physics" here is a toy unbinned Gaussian negative log-likelihood;
//! real analyses plug their own intensity function into the kernel.

use clap::Parser;
use parwave::cache::load_events;
use parwave::config::{Cli, Settings};
use parwave::prelude::*;
use parwave::table::write_events;
use std::path::Path;

/// Kernel owning one shard of the mass spectrum.
struct GaussianNll {
    masses: Vec<f64>,
    log_norm: f64,
}

impl Kernel for GaussianNll {
    type Input = Parameters;

    fn setup(&mut self) -> Result<()> {
        // One-time precomputation, standing in for normalization integrals.
        self.log_norm = (2.0 * std::f64::consts::PI).ln() / 2.0;
        Ok(())
    }

    fn process(&mut self, parameters: &Parameters) -> Result<f64> {
        let (mu, sigma) = (parameters[0], parameters[1]);
        if sigma <= 0.0 {
            return Err(Error::Kernel("sigma must be positive".to_string()));
        }

        let nll = self
            .masses
            .iter()
            .map(|m| {
                let pull = (m - mu) / sigma;
                0.5 * pull * pull + sigma.ln() + self.log_norm
            })
            .sum();
        Ok(nll)
    }
}

fn synthetic_events(path: &Path) -> Result<()> {
    // A crude peak around 1.2 GeV, deterministic so reruns hit the cache.
    let mut table = EventTable::new(vec!["mass".to_string()])?;
    for i in 0..5000 {
        let u = (i as f64 + 0.5) / 5000.0;
        let spread = (u - 0.5) * (1.0 - (2.0 * u - 1.0).abs()).sqrt();
        table.push_row(&[1.2 + spread])?;
    }
    write_events(path, &table)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    parwave::logging::init(cli.verbose);

    if cli.template {
        println!("{}", Settings::template());
        return Ok(());
    }

    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    if !settings.data_file.exists() {
        println!("writing synthetic events to {}", settings.data_file.display());
        synthetic_events(&settings.data_file)?;
    }

    let events = load_events(&settings.data_file, &settings.cache_directory)?;
    println!(
        "loaded {} events with fields {:?}",
        events.len(),
        events.fields()
    );

    let shards = events.split(settings.workers);
    let config = PoolConfig::new()
        .with_workers(settings.workers)
        .with_progress(settings.progress);

    let pool = DuplexPool::start(config, |i| GaussianNll {
        masses: shards[i].column("mass").unwrap_or_default().to_vec(),
        log_norm: 0.0,
    })?;

    // A minimizer stand-in: scan mu at fixed sigma and keep the best point.
    let sigma = 0.1;
    let mut best = (f64::INFINITY, 0.0);
    for step in 0..81 {
        let mu = 1.0 + step as f64 * 0.005;
        let nll = pool.evaluate(vec![mu, sigma])?;
        if nll < best.0 {
            best = (nll, mu);
        }
    }

    pool.stop()?;
    println!("\nbest fit: mu = {:.4} (nll = {:.3})", best.1, best.0);
    Ok(())
}
