//! Capability query and scenario profiles.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// What a tree's leaf values mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputSemantics {
    /// Class (or per-label) probabilities.
    ClassProbability,
    /// Real-valued regression targets.
    Regression,
    /// Cumulative hazard evaluated at each unique event time.
    CumulativeHazard { n_unique_times: usize },
}

/// Answer to the capability query exposed by every ensemble adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Values stored per leaf.
    pub leaf_arity: usize,
    pub semantics: OutputSemantics,
}

/// Explanation scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnsembleProfile {
    Binary,
    MultiLabel,
    Regression,
    MultiTarget,
    Survival,
}

impl EnsembleProfile {
    /// Resolve the scenario from a capability query.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::UnrecognizedEnsemble`] if the adapter declares no semantics
    /// - [`ConfigError::MultiEventSurvival`] if a survival leaf does not match
    ///   its unique event times
    pub fn detect(capabilities: Option<Capabilities>) -> Result<Self, ConfigError> {
        let caps = capabilities.ok_or(ConfigError::UnrecognizedEnsemble)?;
        let profile = match caps.semantics {
            OutputSemantics::ClassProbability if caps.leaf_arity == 1 => Self::Binary,
            OutputSemantics::ClassProbability => Self::MultiLabel,
            OutputSemantics::Regression if caps.leaf_arity == 1 => Self::Regression,
            OutputSemantics::Regression => Self::MultiTarget,
            OutputSemantics::CumulativeHazard { n_unique_times } => {
                if caps.leaf_arity != n_unique_times {
                    return Err(ConfigError::MultiEventSurvival {
                        n_outputs: caps.leaf_arity,
                        n_unique_times,
                    });
                }
                Self::Survival
            }
        };
        Ok(profile)
    }

    /// Capabilities an ensemble with `leaf_arity` values per leaf has when it
    /// serves this scenario. Survival leaves hold one hazard per event time.
    pub fn capabilities(self, leaf_arity: usize) -> Capabilities {
        let semantics = match self {
            Self::Binary | Self::MultiLabel => OutputSemantics::ClassProbability,
            Self::Regression | Self::MultiTarget => OutputSemantics::Regression,
            Self::Survival => OutputSemantics::CumulativeHazard { n_unique_times: leaf_arity },
        };
        Capabilities { leaf_arity, semantics }
    }

    /// Resolve an explicitly requested scenario against the declared
    /// capabilities, filling them in from the request when undeclared.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ProfileMismatch`] if the ensemble (or the leaf arity)
    /// resolves to a different scenario; detection errors otherwise.
    pub fn resolve(
        self,
        declared: Option<Capabilities>,
        leaf_arity: usize,
    ) -> Result<Capabilities, ConfigError> {
        let caps = declared.unwrap_or_else(|| self.capabilities(leaf_arity));
        let detected = Self::detect(Some(caps))?;
        if detected != self {
            return Err(ConfigError::ProfileMismatch { requested: self, detected });
        }
        Ok(caps)
    }

    pub fn is_survival(self) -> bool {
        matches!(self, Self::Survival)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::MultiLabel => "multi-label",
            Self::Regression => "regression",
            Self::MultiTarget => "multi-target",
            Self::Survival => "survival",
        }
    }
}

impl std::fmt::Display for EnsembleProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
