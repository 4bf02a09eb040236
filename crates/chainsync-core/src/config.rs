//! Sync layer configuration.

use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::logging::LogConfig;
use crate::query::{model_key, Query};

/// Namespace and schema of the deployment plus ambient settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Namespace every model name is scoped under (e.g. `"budokan_1_0_7"`).
    pub namespace: String,
    /// Model names known to the schema (empty = accept any model).
    #[serde(default)]
    pub models: Vec<String>,
    /// Capacity of the entity store's change feed.
    #[serde(default = "default_change_capacity")]
    pub change_capacity: usize,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_change_capacity() -> usize {
    1_024
}

impl SyncConfig {
    /// Config for `namespace` with an open schema and default settings.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            models: vec![],
            change_capacity: default_change_capacity(),
            log: LogConfig::default(),
        }
    }

    /// Restrict queries to the given model names.
    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }

    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, SyncError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.namespace.trim().is_empty() {
            return Err(SyncError::Config("namespace must not be empty".into()));
        }
        if let Some(bad) = self.models.iter().find(|m| m.is_empty() || m.contains('-')) {
            return Err(SyncError::Config(format!("invalid model name '{bad}'")));
        }
        Ok(())
    }

    /// `"<namespace>-<model>"`.
    pub fn model_key(&self, model: &str) -> String {
        model_key(&self.namespace, model)
    }

    /// Check that `query` targets this namespace and only known models.
    pub fn validate_query(&self, query: &Query) -> Result<(), SyncError> {
        if query.namespace() != self.namespace {
            return Err(SyncError::Config(format!(
                "query namespace '{}' does not match configured '{}'",
                query.namespace(),
                self.namespace
            )));
        }
        if self.models.is_empty() {
            return Ok(());
        }
        match query
            .model_names()
            .find(|m| !self.models.iter().any(|known| known == m))
        {
            Some(unknown) => Err(SyncError::UnknownModel {
                namespace: self.namespace.clone(),
                model: unknown.to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryBuilder;

    #[test]
    fn parses_with_defaults() {
        let config = SyncConfig::from_json_str(r#"{ "namespace": "budokan" }"#).unwrap();
        assert_eq!(config.namespace, "budokan");
        assert!(config.models.is_empty());
        assert_eq!(config.change_capacity, 1_024);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.model_key("Tournament"), "budokan-Tournament");
    }

    #[test]
    fn rejects_empty_namespace() {
        assert!(matches!(
            SyncConfig::from_json_str(r#"{ "namespace": " " }"#),
            Err(SyncError::Config(_))
        ));
        assert!(SyncConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn schema_validation() {
        let config = SyncConfig::new("budokan").with_models(["Tournament", "Prize"]);
        let ok = QueryBuilder::new("budokan").model("Tournament").build();
        let unknown = QueryBuilder::new("budokan").model("Token").build();
        let foreign = QueryBuilder::new("other").model("Tournament").build();

        assert!(config.validate_query(&ok).is_ok());
        assert!(matches!(
            config.validate_query(&unknown),
            Err(SyncError::UnknownModel { model, .. }) if model == "Token"
        ));
        assert!(config.validate_query(&foreign).is_err());
    }

    #[test]
    fn open_schema_accepts_any_model() {
        let config = SyncConfig::new("budokan");
        let q = QueryBuilder::new("budokan").model("Anything").build();
        assert!(config.validate_query(&q).is_ok());
    }
}
