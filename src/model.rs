//! Simulation data types.

use anyhow::{Context, Result};
use rmp_serde::decode;
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};

/// Infection status of a single agent.
///
/// Agents have no identity beyond their position in the population vector.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Susceptible,
    Infected,
    Recovered,
}

impl Status {
    pub fn is_infected(&self) -> bool {
        matches!(self, Status::Infected)
    }
}

/// Aggregate compartment counts of a population at a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub n_sus: usize,
    pub n_inf: usize,
    pub n_rec: usize,
}

impl Counts {
    pub fn tally(pop: &[Status]) -> Self {
        let mut counts = Self {
            n_sus: 0,
            n_inf: 0,
            n_rec: 0,
        };
        for status in pop {
            match status {
                Status::Susceptible => counts.n_sus += 1,
                Status::Infected => counts.n_inf += 1,
                Status::Recovered => counts.n_rec += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.n_sus + self.n_inf + self.n_rec
    }
}

/// Record of the simulation at a single tick.
///
/// One row of the results table; the continuous time of a record is
/// `step * delta_t`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Record {
    pub step: usize,

    pub n_sus: usize,
    pub n_inf: usize,
    pub n_rec: usize,
}

impl Record {
    pub fn new(step: usize, counts: Counts) -> Self {
        Self {
            step,
            n_sus: counts.n_sus,
            n_inf: counts.n_inf,
            n_rec: counts.n_rec,
        }
    }
}

/// Convert a continuous rate into a per-step transition probability.
pub fn rate_to_proportion(rate: f64, delta_t: f64) -> f64 {
    1.0 - (-rate * delta_t).exp()
}

/// Load a complete trajectory of MessagePack-encoded records from a file.
///
/// Every trajectory holds one record per tick, including t = 0, so callers
/// pass `n_steps + 1` as `n_records`.
pub fn load_trajectory<P: AsRef<Path>>(file: P, n_records: usize) -> Result<Vec<Record>> {
    let file = file.as_ref();
    let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    let mut reader = BufReader::new(file);

    let mut records = Vec::with_capacity(n_records);
    for _ in 0..n_records {
        let record = decode::from_read(&mut reader).context("failed to read record")?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_counts_every_compartment() {
        let pop = [
            Status::Susceptible,
            Status::Infected,
            Status::Recovered,
            Status::Infected,
            Status::Susceptible,
        ];
        let counts = Counts::tally(&pop);
        assert_eq!(counts.n_sus, 2);
        assert_eq!(counts.n_inf, 2);
        assert_eq!(counts.n_rec, 1);
        assert_eq!(counts.total(), pop.len());
    }

    #[test]
    fn rate_to_proportion_matches_closed_form() {
        let prop = rate_to_proportion(0.25, 0.1);
        assert!((prop - 0.024690087971667385).abs() < 1e-15);

        assert_eq!(rate_to_proportion(0.0, 0.1), 0.0);
    }
}
