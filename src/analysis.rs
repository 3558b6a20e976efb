use crate::config::Config;
use crate::model::{Record, load_trajectory};
use crate::stats::Accumulator;
use anyhow::{Context, Result, bail};
use std::{fs::File, io::BufWriter, path::Path};

/// Observable aggregated over independent runs.
///
/// Each run hands its complete trajectory to [`Obs::update`].
pub trait Obs {
    fn update(&mut self, records: &[Record]) -> Result<()>;
    fn report(&self) -> serde_json::Value;
}

/// Height and time of the epidemic peak.
pub struct PeakInfected {
    delta_t: f64,
    size_acc: Accumulator,
    time_acc: Accumulator,
}

impl PeakInfected {
    pub fn new(cfg: &Config) -> Self {
        Self {
            delta_t: cfg.model.delta_t,
            size_acc: Accumulator::new(),
            time_acc: Accumulator::new(),
        }
    }
}

impl Obs for PeakInfected {
    fn update(&mut self, records: &[Record]) -> Result<()> {
        // The peak time is the first tick at which the maximum is attained.
        let mut peak: Option<&Record> = None;
        for record in records {
            if peak.is_none_or(|p| record.n_inf > p.n_inf) {
                peak = Some(record);
            }
        }
        let Some(peak) = peak else {
            bail!("trajectory is empty");
        };

        self.size_acc.add(peak.n_inf as f64);
        self.time_acc.add(peak.step as f64 * self.delta_t);
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({
            "peak_infected": self.size_acc.report(),
            "peak_time": self.time_acc.report(),
        })
    }
}

/// Recovered count at the last tick.
pub struct FinalSize {
    acc: Accumulator,
}

impl FinalSize {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for FinalSize {
    fn update(&mut self, records: &[Record]) -> Result<()> {
        let Some(last) = records.last() else {
            bail!("trajectory is empty");
        };
        self.acc.add(last.n_rec as f64);
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "final_size": self.acc.report() })
    }
}

/// Fraction of runs with no infected agents left at the last tick.
pub struct Extinction {
    acc: Accumulator,
}

impl Extinction {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for Extinction {
    fn update(&mut self, records: &[Record]) -> Result<()> {
        let Some(last) = records.last() else {
            bail!("trajectory is empty");
        };
        self.acc.add(if last.n_inf == 0 { 1.0 } else { 0.0 });
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "extinction_fraction": self.acc.report() })
    }
}

pub struct Analyzer {
    cfg: Config,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new(cfg: Config) -> Self {
        let mut obs_ptr_vec: Vec<Box<dyn Obs>> = Vec::new();
        obs_ptr_vec.push(Box::new(PeakInfected::new(&cfg)));
        obs_ptr_vec.push(Box::new(FinalSize::new()));
        obs_ptr_vec.push(Box::new(Extinction::new()));
        Self { cfg, obs_ptr_vec }
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let records = load_trajectory(file, self.cfg.output.n_steps + 1)
            .context("failed to load trajectory")?;

        for obs in &mut self.obs_ptr_vec {
            obs.update(&records).context("failed to update observable")?;
        }
        Ok(())
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);

        let reports: Vec<_> = self.obs_ptr_vec.iter().map(|obs| obs.report()).collect();
        serde_json::to_writer_pretty(writer, &reports)?;
        Ok(())
    }
}
