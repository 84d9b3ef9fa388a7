//! Layered configuration loading.
//!
//! Sources, applied in order (later sources override earlier ones):
//!  1. `/etc/edu-bot/service.yaml`: system-wide defaults
//!  2. `./config/service.yaml`: deployment-local override
//!  3. the file named by `EDU_BOT_CONFIG_FILE`: operator-specified, must exist
//!  4. environment variables prefixed `EDU_BOT__` with `__` separators,
//!     e.g. `EDU_BOT__GITHUB__APP_ID=1234` sets `github.app_id`
//!
//! Every field has a serde default, so missing files are fine. A malformed
//! file or a value of the wrong type is a hard error.

use anyhow::Context;
use edu_bot_api::ServiceConfig;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_FILE_ENV: &str = "EDU_BOT_CONFIG_FILE";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "EDU_BOT";

/// Load and validate configuration from files and the environment.
pub fn load_config() -> anyhow::Result<ServiceConfig> {
    let explicit_path = std::env::var(CONFIG_FILE_ENV)
        .ok()
        .filter(|path| !path.is_empty());
    load_config_from(
        &["/etc/edu-bot/service", "config/service"],
        explicit_path.as_deref(),
    )
}

/// Load configuration from optional `defaults`, a required `explicit_path`
/// and the environment.
pub fn load_config_from(
    defaults: &[&str],
    explicit_path: Option<&str>,
) -> anyhow::Result<ServiceConfig> {
    let mut builder = config::Config::builder();

    for path in defaults {
        builder = builder.add_source(
            config::File::with_name(path)
                .required(false)
                .format(config::FileFormat::Yaml),
        );
    }

    if let Some(path) = explicit_path {
        builder = builder.add_source(
            config::File::with_name(path)
                .required(true)
                .format(config::FileFormat::Yaml),
        );
    }

    let service_config: ServiceConfig = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to read configuration sources")?
        .try_deserialize()
        .context("Could not deserialize service configuration")?;

    service_config
        .validate()
        .context("Service configuration is invalid")?;

    Ok(service_config)
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
