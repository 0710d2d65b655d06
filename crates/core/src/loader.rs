// Copyright 2025 ScopeDB <contact@scopedb.io>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::Path;
use std::str::FromStr;

use error_stack::Result;
use error_stack::ResultExt;
use serde::Deserialize;
use serde::de::IntoDeserializer;
use toml_edit::DocumentMut;

use crate::Config;
use crate::ConfigError;
use crate::known_option_entries;

pub struct LoadConfigResult {
    pub config: Config,
    pub warnings: Vec<String>,
}

/// Loads a [`Config`] from a TOML file, then overlays any
/// `QUORUMKV_CONFIG_*` environment variables found in the process
/// environment on top of it before deserializing.
pub fn load_config(config_file: &Path) -> Result<LoadConfigResult, ConfigError> {
    let content = std::fs::read_to_string(config_file).change_context_lazy(|| {
        ConfigError(format!(
            "failed to read config file: {}",
            config_file.display()
        ))
    })?;
    let mut config = DocumentMut::from_str(&content)
        .change_context_lazy(|| ConfigError("failed to parse config content".to_string()))?;

    let env = std::env::vars()
        .filter(|(k, _)| k.starts_with("QUORUMKV_CONFIG_"))
        .collect::<std::collections::HashMap<_, _>>();

    let known_option_entries = known_option_entries();
    let mut warnings = vec![];
    for (k, v) in env {
        let Some(ent) = known_option_entries.iter().find(|e| k == e.env_name) else {
            return Err(ConfigError(format!(
                "failed to parse unknown environment variable {k} with value {v}"
            ))
            .into());
        };

        let (path, item) = match ent.ent_type {
            "string" => (ent.ent_path, toml_edit::value(v)),
            "integer" => {
                let value = v.parse::<i64>().change_context_lazy(|| {
                    ConfigError(format!("failed to parse integer value {v} of key {k}"))
                })?;
                (ent.ent_path, toml_edit::value(value))
            }
            "boolean" => {
                let value = v.parse::<bool>().change_context_lazy(|| {
                    ConfigError(format!("failed to parse boolean value {v} of key {k}"))
                })?;
                (ent.ent_path, toml_edit::value(value))
            }
            ty => {
                return Err(ConfigError(format!(
                    "failed to parse environment variable {k} with value {v} and resolved type {ty}"
                ))
                .into());
            }
        };
        warnings.extend(set_toml_path(&mut config, &k, path, item));
    }

    let config = Config::deserialize(config.into_deserializer())
        .change_context_lazy(|| ConfigError("failed to deserialize config".to_string()))?;
    Ok(LoadConfigResult { config, warnings })
}

fn set_toml_path(
    doc: &mut DocumentMut,
    key: &str,
    path: &'static str,
    value: toml_edit::Item,
) -> Vec<String> {
    let mut current = doc.as_item_mut();
    let mut warnings = vec![];

    let parts = path.split('.').collect::<Vec<_>>();
    let len = parts.len();
    assert!(len > 0, "path must not be empty");

    for part in parts.iter().take(len - 1) {
        if current.get(part).is_none() {
            warnings.push(format!(
                "[key={key}] config path '{path}' has missing parent '{part}'; created",
            ));
        }
        current = &mut current[part];
    }

    current[parts[len - 1]] = value;
    warnings
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use sealed_test::prelude::sealed_test;

    use super::*;

    fn write_minimal_config(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[node]\nid = 7\nport = 4242\n").unwrap();
        path
    }

    #[test]
    fn test_load_minimal_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_minimal_config(&dir);
        let result = load_config(&path).unwrap();
        assert_eq!(result.config.node.id, 7);
        assert_eq!(result.config.node.port, 4242);
        assert_eq!(result.config.cluster.tfail, 5);
        assert!(result.warnings.is_empty());
    }

    #[sealed_test(env = [("QUORUMKV_CONFIG_CLUSTER_TFAIL", "9")])]
    fn test_env_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_minimal_config(&dir);
        let result = load_config(&path).unwrap();
        assert_eq!(result.config.cluster.tfail, 9);
    }

    #[sealed_test(env = [("QUORUMKV_CONFIG_NOT_A_REAL_KEY", "x")])]
    fn test_unknown_env_var_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_minimal_config(&dir);
        let result = load_config(&path);
        assert!(result.is_err());
    }
}
