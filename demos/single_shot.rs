//! Single-shot pool example: each worker computes one per-shard summary and
//! terminates on its own; the reduction is chosen by the caller.

use parwave::pool::{run_once_reduced, PoolConfig};
use parwave::prelude::*;

/// One-pass summary of a shard of event weights.
struct ShardSummary {
    weights: Vec<f64>,
    total: f64,
}

impl SingleKernel for ShardSummary {
    type Output = (usize, f64);

    fn setup(&mut self) -> Result<()> {
        self.total = self.weights.iter().sum();
        Ok(())
    }

    fn process(&mut self) -> Result<(usize, f64)> {
        Ok((self.weights.len(), self.total))
    }
}

fn main() -> Result<()> {
    parwave::logging::init(2);

    let weights: Vec<f64> = (0..10_000).map(|i| 1.0 + (i % 7) as f64 * 0.1).collect();

    let mut table = EventTable::new(vec!["weight".to_string()])?;
    for w in &weights {
        table.push_row(&[*w])?;
    }

    let workers = 4;
    let shards = table.split(workers);
    let config = PoolConfig::new().with_workers(workers);

    // Sum-reduce across shard summaries.
    let (events, total) = run_once_reduced(
        &config,
        |i| ShardSummary {
            weights: shards[i].column("weight").unwrap_or_default().to_vec(),
            total: 0.0,
        },
        |outputs| {
            outputs
                .iter()
                .fold((0usize, 0.0), |acc, (n, t)| (acc.0 + n, acc.1 + t))
        },
    )?;

    println!("{} events, total weight {:.1}", events, total);
    Ok(())
}
