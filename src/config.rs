use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    pub init: InitConfig,
    pub output: OutputConfig,
}

/// Epidemic model parameters, fixed for a run.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Transmission probability per contact with an infected agent.
    pub beta: f64,
    /// Contact rate per unit time.
    pub contact_rate: f64,
    /// Recovery rate per unit time.
    pub recovery_rate: f64,
    /// Size of one discrete time step.
    pub delta_t: f64,
}

/// Initial condition parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    /// Population size.
    pub n_agents: usize,
    /// Initial number of infected agents.
    pub n_infected: usize,
    /// RNG seed; drawn from OS entropy when absent.
    pub seed: Option<u64>,
}

/// Output parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Number of steps per run.
    pub n_steps: usize,
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        check_num(self.model.beta, 0.0..=1.0).context("invalid transmission probability")?;
        check_num(self.model.contact_rate, 0.0..f64::INFINITY).context("invalid contact rate")?;
        check_num(self.model.recovery_rate, 0.0..f64::INFINITY).context("invalid recovery rate")?;
        check_num(self.model.delta_t, f64::MIN_POSITIVE..f64::INFINITY)
            .context("invalid step size")?;

        check_num(self.init.n_agents, 2..100_000_000).context("invalid number of agents")?;
        check_num(self.init.n_infected, 0..=self.init.n_agents)
            .context("invalid initial number of infected agents")?;

        check_num(self.output.n_steps, 1..100_000_000).context("invalid number of steps")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            model: ModelConfig {
                beta: 0.05,
                contact_rate: 10.0,
                recovery_rate: 0.25,
                delta_t: 0.1,
            },
            init: InitConfig {
                n_agents: 1000,
                n_infected: 10,
                seed: Some(1234),
            },
            output: OutputConfig { n_steps: 400 },
        }
    }

    #[test]
    fn accepts_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn rejects_negative_rates() {
        let mut cfg = valid_config();
        cfg.model.contact_rate = -10.0;
        assert!(cfg.validate().is_err());

        let mut cfg = valid_config();
        cfg.model.recovery_rate = -0.25;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_beta_outside_unit_interval() {
        let mut cfg = valid_config();
        cfg.model.beta = 1.5;
        assert!(cfg.validate().is_err());

        cfg.model.beta = -0.05;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_step_size() {
        let mut cfg = valid_config();
        cfg.model.delta_t = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_degenerate_population() {
        let mut cfg = valid_config();
        cfg.init.n_agents = 0;
        cfg.init.n_infected = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_more_infected_than_agents() {
        let mut cfg = valid_config();
        cfg.init.n_infected = cfg.init.n_agents + 1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_sectioned_toml() {
        let toml_str = r#"
[model]
beta = 0.05
contact_rate = 10.0
recovery_rate = 0.25
delta_t = 0.1

[init]
n_agents = 1000
n_infected = 10
seed = 1234

[output]
n_steps = 400
"#;
        let cfg: Config = toml::from_str(toml_str).expect("failed to parse config");
        assert_eq!(cfg, valid_config());
    }
}
