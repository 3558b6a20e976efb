use crate::config::Config;
use crate::model::{Counts, Record, Status, rate_to_proportion};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::{Bernoulli, Poisson, Uniform};
use rmp_serde::encode;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Simulation engine.
///
/// Holds the configuration, population, and random number generator,
/// and provides methods to initialize and run one realization.
pub struct Engine {
    cfg: Config,
    step: usize,
    pop: Vec<Status>,
    rng: ChaCha12Rng,
}

impl Engine {
    /// Create a new `Engine` with the given configuration and initial population.
    ///
    /// The first `n_infected` agents start out infected, the rest susceptible.
    /// The generator is seeded from the configuration, or from OS entropy when
    /// no seed is given.
    pub fn generate_initial_condition(cfg: Config) -> Result<Self> {
        let rng = match cfg.init.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng()?,
        };

        let mut pop = vec![Status::Susceptible; cfg.init.n_agents];
        pop[..cfg.init.n_infected].fill(Status::Infected);

        Ok(Self {
            cfg,
            step: 0,
            pop,
            rng,
        })
    }

    /// Tally the compartment counts of the current population.
    pub fn counts(&self) -> Counts {
        Counts::tally(&self.pop)
    }

    /// Perform the simulation and stream the trajectory to a binary file.
    ///
    /// Writes one [`Record`] per tick, including the initial state.
    pub fn run_simulation<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        let mut next = vec![Status::Susceptible; self.cfg.init.n_agents];

        let record = Record::new(self.step, self.counts());
        encode::write(&mut writer, &record).context("failed to serialize record")?;

        let n_steps = self.cfg.output.n_steps;
        let log_stride = n_steps.div_ceil(10);

        for i_step in 1..=n_steps {
            self.perform_step(&mut next).context("failed to perform step")?;

            let record = Record::new(self.step, self.counts());
            encode::write(&mut writer, &record).context("failed to serialize record")?;

            if i_step % log_stride == 0 || i_step == n_steps {
                let progress = 100.0 * i_step as f64 / n_steps as f64;
                log::info!("completed {progress:06.2}%");
            }
        }

        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }

    /// Advance the population by one tick.
    ///
    /// Every agent reads from the current generation and writes to `next`;
    /// the buffers are swapped at the end of the step.
    fn perform_step(&mut self, next: &mut Vec<Status>) -> Result<()> {
        let n_agt = self.pop.len();

        let mean_contacts = self.cfg.model.contact_rate * self.cfg.model.delta_t;
        let contact_dist = if mean_contacts > 0.0 {
            Some(Poisson::new(mean_contacts)?)
        } else {
            None
        };
        let other_dist = Uniform::new(0, n_agt - 1)?;
        let trans_dist = Bernoulli::new(self.cfg.model.beta)?;
        let rec_dist = Bernoulli::new(rate_to_proportion(
            self.cfg.model.recovery_rate,
            self.cfg.model.delta_t,
        ))?;

        next.clear();
        for (i_agt, &status) in self.pop.iter().enumerate() {
            let status_next = match status {
                // Recovered is absorbing.
                Status::Recovered => Status::Recovered,

                Status::Infected => {
                    if rec_dist.sample(&mut self.rng) {
                        Status::Recovered
                    } else {
                        Status::Infected
                    }
                }

                Status::Susceptible => {
                    let n_contacts = match &contact_dist {
                        Some(dist) => dist.sample(&mut self.rng) as u64,
                        None => 0,
                    };

                    let mut status_new = Status::Susceptible;
                    for _ in 0..n_contacts {
                        // Sample a random other agent, excluding the agent itself.
                        let mut i_other = other_dist.sample(&mut self.rng);
                        if i_other >= i_agt {
                            i_other += 1;
                        }

                        if self.pop[i_other].is_infected() && trans_dist.sample(&mut self.rng) {
                            // The first successful transmission ends the contact loop.
                            status_new = Status::Infected;
                            break;
                        }
                    }
                    status_new
                }
            };
            next.push(status_next);
        }

        std::mem::swap(&mut self.pop, next);
        self.step += 1;

        Ok(())
    }
}
