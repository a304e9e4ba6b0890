use crate::error::Result;
use crate::seasonality::DEFAULT_SEASONAL_WEIGHTS;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest number of writes the record store accepts in one batch.
pub const DEFAULT_IMPORT_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScopeRuleConfig {
    #[schemars(description = "Permission group label as shown to admins, e.g. 'Altınküre Lise'")]
    pub name: String,

    #[schemars(
        description = "Substrings matched against the user's branchId after lowercasing, removing Turkish diacritics and stripping non-alphanumerics"
    )]
    pub keywords: Vec<String>,

    #[schemars(description = "Branch names visible to members of this group")]
    pub branches: Vec<String>,

    #[schemars(description = "Class / grade labels selectable in this group's context")]
    pub grades: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalyticsConfig {
    #[serde(default = "default_seasonal_weights")]
    #[schemars(
        description = "Relative monthly expense weights, August first. Exactly 12 non-negative values; they do not need to sum to anything in particular."
    )]
    pub seasonal_weights: Vec<f64>,

    #[serde(default = "default_import_batch_size")]
    #[schemars(description = "Records written per store batch during bulk import")]
    pub import_batch_size: usize,

    #[serde(default = "default_admin_emails")]
    #[schemars(description = "E-mail addresses treated as admins regardless of their stored role")]
    pub admin_emails: Vec<String>,

    #[serde(default = "default_scope_rules")]
    #[schemars(description = "Permission groups, checked in order; the first matching rule wins")]
    pub scope_rules: Vec<ScopeRuleConfig>,

    #[serde(default)]
    #[schemars(description = "Optional path to the bundled prior-year enrollment dataset (JSON)")]
    pub historical_dataset: Option<PathBuf>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            seasonal_weights: default_seasonal_weights(),
            import_batch_size: default_import_batch_size(),
            admin_emails: default_admin_emails(),
            scope_rules: default_scope_rules(),
            historical_dataset: None,
        }
    }
}

impl AnalyticsConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AnalyticsConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

fn default_seasonal_weights() -> Vec<f64> {
    DEFAULT_SEASONAL_WEIGHTS.to_vec()
}

fn default_import_batch_size() -> usize {
    DEFAULT_IMPORT_BATCH_SIZE
}

fn default_admin_emails() -> Vec<String> {
    vec!["ugur@asaf.com".to_string()]
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_scope_rules() -> Vec<ScopeRuleConfig> {
    vec![
        ScopeRuleConfig {
            name: "Mefkure YKS".to_string(),
            keywords: strings(&["mefkureyks", "yks", "plus", "vip"]),
            branches: strings(&["Mefkure PLUS", "Mefkure VIP"]),
            grades: strings(&["9", "10", "11", "12", "Mezun", "MOOD"]),
        },
        ScopeRuleConfig {
            name: "Mefkure LGS".to_string(),
            keywords: strings(&["lgs"]),
            branches: strings(&["Mefkure LGS"]),
            grades: strings(&["5", "6", "7", "8"]),
        },
        ScopeRuleConfig {
            name: "Altınküre İlköğretim".to_string(),
            keywords: strings(&["ilkogretim", "ilkokul", "ortaokul", "anaokul"]),
            branches: strings(&[
                "Altınküre Anaokulu",
                "Altınküre İlkokul",
                "Altınküre Ortaokul",
                "Altınküre İlköğretim",
            ]),
            grades: strings(&["Ana Sınıfı", "1", "2", "3", "4", "5", "6", "7", "8"]),
        },
        ScopeRuleConfig {
            name: "Altınküre Teknokent".to_string(),
            keywords: strings(&["teknokent"]),
            branches: strings(&["Altınküre Teknokent"]),
            grades: strings(&["9", "10", "11", "12"]),
        },
        ScopeRuleConfig {
            name: "Altınküre Lise".to_string(),
            keywords: strings(&["lise", "fen", "anadolu", "akademi"]),
            branches: strings(&[
                "Altınküre Fen Lisesi",
                "Altınküre Anadolu Lisesi",
                "Altınküre Akademi",
                "Altınküre Lise",
            ]),
            grades: strings(&["9", "10", "11", "12", "Mezun", "Akademi"]),
        },
    ]
}
