use crate::analysis::Analyzer;
use crate::config::Config;
use crate::engine::Engine;
use crate::model::load_trajectory;
use anyhow::{Context, Result, bail};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Simulation directory workflow.
///
/// A simulation directory holds `config.toml` and one `run-NNNN` directory
/// per independent realization.
pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Simulate a new realization in the next run directory.
    pub fn create_run(&self) -> Result<()> {
        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;

        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let mut engine = Engine::generate_initial_condition(self.cfg.clone())
            .context("failed to generate initial condition")?;

        engine
            .run_simulation(self.trajectory_file(run_idx))
            .context("failed to run simulation")?;

        Ok(())
    }

    /// Export every run's trajectory as a CSV table of
    /// `time,susceptible,infected,recovered` rows.
    pub fn tabulate_runs(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let records =
                load_trajectory(self.trajectory_file(run_idx), self.cfg.output.n_steps + 1)
                    .context("failed to load trajectory")?;

            let table_file = self.table_file(run_idx);
            let mut writer = csv::Writer::from_path(&table_file)
                .with_context(|| format!("failed to create {table_file:?}"))?;

            writer.write_record(["time", "susceptible", "infected", "recovered"])?;
            for record in &records {
                let time = record.step as f64 * self.cfg.model.delta_t;
                writer.write_record([
                    time.to_string(),
                    record.n_sus.to_string(),
                    record.n_inf.to_string(),
                    record.n_rec.to_string(),
                ])?;
            }
            writer.flush().context("failed to flush table writer")?;

            log::info!("wrote {table_file:?}");
        }

        Ok(())
    }

    /// Aggregate the observables of all runs into a results file.
    pub fn analyze_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        if n_runs == 0 {
            bail!("there are no runs to analyze");
        }

        let mut analyzer = Analyzer::new(self.cfg.clone());
        for run_idx in 0..n_runs {
            analyzer
                .add_file(self.trajectory_file(run_idx))
                .context("failed to add file")?;
        }

        analyzer
            .save_results(self.results_file())
            .context("failed to save results")?;

        Ok(())
    }

    /// Remove all run directories and the results file.
    pub fn clean_sim(&self) -> Result<()> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        for entry in glob(pattern).context("failed to glob run dirs")? {
            let path = entry.context("failed to read glob entry")?;
            if path.is_dir() {
                fs::remove_dir_all(&path)
                    .with_context(|| format!("failed to remove {path:?}"))?;
                log::info!("removed {path:?}");
            }
        }

        let results_file = self.results_file();
        if results_file.exists() {
            fs::remove_file(&results_file)
                .with_context(|| format!("failed to remove {results_file:?}"))?;
            log::info!("removed {results_file:?}");
        }

        Ok(())
    }

    fn count_run_dirs(&self) -> Result<usize> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .count();
        Ok(count)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn trajectory_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("trajectory.msgpack")
    }

    fn table_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("trajectory.csv")
    }

    fn results_file(&self) -> PathBuf {
        self.sim_dir.join("results.json")
    }
}
