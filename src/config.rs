// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::path::Path;

use config::{Config, Environment, File, Source};

mod error;
mod job;

pub use error::ConfigError;
pub use job::{Job, ScoreInfo, SyncSettings};

/// Prefix for environment overrides, e.g. `BARSYNC_SYNC__ADAPTIVE=false`.
pub const ENV_PREFIX: &str = "BARSYNC";

/// Loads a job file. The format follows the file extension and `BARSYNC_` environment
/// variables override individual keys.
pub fn load_job(path: &Path) -> Result<Job, ConfigError> {
    build_job(File::from(path), environment())
}

/// Environment source for job overrides. Nested keys are separated by `__`.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn build_job<S>(source: S, environment: Environment) -> Result<Job, ConfigError>
where
    S: Source + Send + Sync + 'static,
{
    Ok(Config::builder()
        .add_source(source)
        .add_source(environment)
        .build()?
        .try_deserialize::<Job>()?)
}
