// Copyright 2025 eraflo
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

//! Loading of the engine configuration file.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use vigil_control::EngineConfig;

/// Reads and validates a JSON configuration, or returns the defaults when no
/// path is given.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        log::info!("No configuration file given, using defaults.");
        return Ok(EngineConfig::default());
    };

    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration '{}'", path.display()))?;
    let config: EngineConfig = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse configuration '{}'", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration '{}'", path.display()))?;

    log::info!("Loaded configuration from '{}'.", path.display());
    Ok(config)
}
