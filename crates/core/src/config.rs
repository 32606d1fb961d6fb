use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub project_id: Option<String>,
    pub services: Vec<String>,
    pub period_days: Option<u32>,
    pub budget_ratio: Option<f64>,
    pub strict: Option<bool>,
    /// Dollar ceilings per service tag; any service exceeding its ceiling
    /// fails the budget gate.
    pub service_budgets: HashMap<String, f64>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let config: Config =
            toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
        Ok(config)
    }

    pub fn discover() -> Option<Self> {
        let path = Path::new("cloudwaste.toml");
        if path.exists() {
            Config::load(path).ok()
        } else {
            None
        }
    }
}
