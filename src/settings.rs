use crate::error::EvolveResult;
use crate::keys::Key;
use crate::params::{FitnessParameters, MutationParameters, Statistic};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// User preferences for an evolution session. Fields left out of a settings
/// file take their defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub key: Key,
    pub desired_fitness_parameters: FitnessParameters,
    pub desired_mutation_parameters: MutationParameters,
}

impl Settings {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("parsing settings")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Replaces one sweet spot, keeping the others.
    pub fn set_sweet_spot(&mut self, statistic: Statistic, sweet_spot: f64) -> EvolveResult<()> {
        self.desired_fitness_parameters = self.desired_fitness_parameters.with(statistic, sweet_spot)?;
        Ok(())
    }
}
