//! Driver configuration resolved from the host's flat option set.
//!
//! The host hands the driver a bag of named values (flags with environment
//! variable fallbacks). [`DriverConfig::from_options`] validates the connection
//! parameters and applies sizing defaults once, so nothing downstream refers
//! to the default constants directly.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::Endpoint;

/// Default OS image, prefixed with `docker:` when sent to Rancher.
pub const DEFAULT_OS_IMAGE: &str = "rancher/vm-ubuntu";
/// Default login user baked into the default image.
pub const DEFAULT_OS_USER: &str = "ubuntu";
/// Default memory size in MiB.
pub const DEFAULT_MEMORY_MB: u32 = 1024;
/// Default number of virtual CPUs.
pub const DEFAULT_VCPU: u32 = 2;
/// Default upper bound on the create wait, in seconds.
pub const DEFAULT_CREATE_TIMEOUT_SECS: u64 = 600;

/// Flag names understood by [`DriverConfig::from_options`].
pub mod flags {
    /// Rancher API URL.
    pub const URL: &str = "rancher-url";
    /// API access key.
    pub const ACCESS_KEY: &str = "rancher-access-key";
    /// API secret key.
    pub const SECRET_KEY: &str = "rancher-secret-key";
    /// Environment name used to pick a project.
    pub const PROJECT_NAME: &str = "rancher-project-name";
    /// Environment id used to pick a project.
    pub const PROJECT_ID: &str = "rancher-project-id";
    /// OS image reference.
    pub const OS_IMAGE: &str = "rancher-os-image";
    /// SSH login user of the image.
    pub const OS_USER: &str = "rancher-os-user";
    /// Memory in MiB.
    pub const MEMORY_MB: &str = "rancher-memory-mb";
    /// Virtual CPU count.
    pub const VCPU: &str = "rancher-vcpu";
    /// Create wait bound in seconds.
    pub const CREATE_TIMEOUT: &str = "rancher-create-timeout";
}

/// One entry of the create flag table.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FlagSpec {
    /// Long flag name without the leading dashes.
    pub name: &'static str,
    /// Environment variable consulted when the flag is absent.
    pub env_var: &'static str,
    /// Help text shown to operators.
    pub usage: &'static str,
    /// Default applied during resolution, if any.
    pub default: Option<&'static str>,
}

/// Flags the driver adds to the host's `create` command.
pub const CREATE_FLAGS: &[FlagSpec] = &[
    FlagSpec {
        name: flags::URL,
        env_var: "RANCHER_URL",
        usage: "Rancher API URL",
        default: None,
    },
    FlagSpec {
        name: flags::ACCESS_KEY,
        env_var: "RANCHER_ACCESS_KEY",
        usage: "Rancher Access Key",
        default: None,
    },
    FlagSpec {
        name: flags::SECRET_KEY,
        env_var: "RANCHER_SECRET_KEY",
        usage: "Rancher Secret Key",
        default: None,
    },
    FlagSpec {
        name: flags::PROJECT_NAME,
        env_var: "RANCHER_ENVIRONMENT_NAME",
        usage: "Rancher Environment Name (name or id is required if the API key can see more than one environment)",
        default: None,
    },
    FlagSpec {
        name: flags::PROJECT_ID,
        env_var: "RANCHER_ENVIRONMENT_ID",
        usage: "Rancher Environment ID (name or id is required if the API key can see more than one environment)",
        default: None,
    },
    FlagSpec {
        name: flags::OS_IMAGE,
        env_var: "RANCHER_OS_IMAGE",
        usage: "Rancher OS Image",
        default: Some(DEFAULT_OS_IMAGE),
    },
    FlagSpec {
        name: flags::OS_USER,
        env_var: "RANCHER_OS_USER",
        usage: "Rancher OS User",
        default: Some(DEFAULT_OS_USER),
    },
    FlagSpec {
        name: flags::MEMORY_MB,
        env_var: "RANCHER_MEMORY_MB",
        usage: "Memory in MiB",
        default: Some("1024"),
    },
    FlagSpec {
        name: flags::VCPU,
        env_var: "RANCHER_VCPU",
        usage: "Number of virtual CPUs",
        default: Some("2"),
    },
    FlagSpec {
        name: flags::CREATE_TIMEOUT,
        env_var: "RANCHER_CREATE_TIMEOUT",
        usage: "Seconds to wait for the VM to come up",
        default: Some("600"),
    },
];

/// A single value in the host's option bag.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OptionValue {
    /// String-valued flag.
    String(String),
    /// Integer-valued flag.
    Int(i64),
}

/// Flat set of named option values handed over by the host.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DriverOptions {
    values: BTreeMap<String, OptionValue>,
}

impl DriverOptions {
    /// Creates an empty option set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a string value, returning the updated set.
    #[must_use]
    pub fn with_string(mut self, name: &str, value: impl Into<String>) -> Self {
        self.values
            .insert(name.to_owned(), OptionValue::String(value.into()));
        self
    }

    /// Adds an integer value, returning the updated set.
    #[must_use]
    pub fn with_int(mut self, name: &str, value: i64) -> Self {
        self.values.insert(name.to_owned(), OptionValue::Int(value));
        self
    }

    /// Returns the string value of `name`, or an empty string when absent.
    #[must_use]
    pub fn string(&self, name: &str) -> &str {
        match self.values.get(name) {
            Some(OptionValue::String(value)) => value.as_str(),
            _ => "",
        }
    }

    /// Returns the integer value of `name`, or zero when absent.
    #[must_use]
    pub fn int(&self, name: &str) -> i64 {
        match self.values.get(name) {
            Some(OptionValue::Int(value)) => *value,
            _ => 0,
        }
    }

    fn optional_string(&self, name: &str) -> Option<String> {
        let value = self.string(name).trim();
        (!value.is_empty()).then(|| value.to_owned())
    }
}

/// Connection and sizing parameters of one machine.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct DriverConfig {
    /// Rancher API URL; rewritten to the project-scoped URL by the
    /// pre-create check.
    pub url: String,
    /// API access key.
    pub access_key: String,
    /// API secret key.
    pub secret_key: String,
    /// OS image reference without the `docker:` scheme.
    pub os_image: String,
    /// SSH login user of the image.
    pub os_user: String,
    /// Memory in MiB.
    pub memory_mb: u32,
    /// Virtual CPU count.
    pub vcpu: u32,
    /// Environment name used to select a project.
    #[serde(default)]
    pub project_name: Option<String>,
    /// Environment id used to select a project.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Bound on the create wait in seconds; zero disables it.
    #[serde(default = "default_create_timeout_secs")]
    pub create_timeout_secs: u64,
}

const fn default_create_timeout_secs() -> u64 {
    DEFAULT_CREATE_TIMEOUT_SECS
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            os_image: DEFAULT_OS_IMAGE.to_owned(),
            os_user: DEFAULT_OS_USER.to_owned(),
            memory_mb: DEFAULT_MEMORY_MB,
            vcpu: DEFAULT_VCPU,
            project_name: None,
            project_id: None,
            create_timeout_secs: DEFAULT_CREATE_TIMEOUT_SECS,
        }
    }
}

/// Metadata for a required field, used to build actionable error messages.
struct FieldMetadata {
    description: &'static str,
    flag: &'static str,
    env_var: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, flag: &'static str, env_var: &'static str) -> Self {
        Self {
            description,
            flag,
            env_var,
        }
    }
}

const URL_FIELD: FieldMetadata = FieldMetadata::new("Rancher API URL", flags::URL, "RANCHER_URL");
const ACCESS_KEY_FIELD: FieldMetadata =
    FieldMetadata::new("Rancher access key", flags::ACCESS_KEY, "RANCHER_ACCESS_KEY");
const SECRET_KEY_FIELD: FieldMetadata =
    FieldMetadata::new("Rancher secret key", flags::SECRET_KEY, "RANCHER_SECRET_KEY");

impl DriverConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: metadata.flag,
                message: format!(
                    "Rancher driver requires the --{} option ({}); set it on the command line or via {}",
                    metadata.flag, metadata.description, metadata.env_var
                ),
            });
        }
        Ok(())
    }

    /// Populates a configuration from the host's option set.
    ///
    /// String values are trimmed. Image and user fall back to their defaults
    /// when blank; memory, vCPU and timeout fall back when absent or not
    /// positive.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSize`] when memory or vCPU exceeds
    /// `u32::MAX`, and [`ConfigError::MissingField`] when the URL, access
    /// key or secret key is missing, checked in that order.
    pub fn from_options(options: &DriverOptions) -> Result<Self, ConfigError> {
        let config = Self {
            url: options.string(flags::URL).trim().to_owned(),
            access_key: options.string(flags::ACCESS_KEY).trim().to_owned(),
            secret_key: options.string(flags::SECRET_KEY).trim().to_owned(),
            os_image: options
                .optional_string(flags::OS_IMAGE)
                .unwrap_or_else(|| DEFAULT_OS_IMAGE.to_owned()),
            os_user: options
                .optional_string(flags::OS_USER)
                .unwrap_or_else(|| DEFAULT_OS_USER.to_owned()),
            memory_mb: size_or(options, flags::MEMORY_MB, DEFAULT_MEMORY_MB)?,
            vcpu: size_or(options, flags::VCPU, DEFAULT_VCPU)?,
            project_name: options.optional_string(flags::PROJECT_NAME),
            project_id: options.optional_string(flags::PROJECT_ID),
            create_timeout_secs: timeout_or_default(options.int(flags::CREATE_TIMEOUT)),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that the connection parameters are present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] naming the first missing flag.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(&self.url, &URL_FIELD)?;
        Self::require_field(&self.access_key, &ACCESS_KEY_FIELD)?;
        Self::require_field(&self.secret_key, &SECRET_KEY_FIELD)?;
        if self.memory_mb == 0 {
            return Err(ConfigError::InvalidSize {
                field: flags::MEMORY_MB,
            });
        }
        if self.vcpu == 0 {
            return Err(ConfigError::InvalidSize { field: flags::VCPU });
        }
        Ok(())
    }

    /// Returns the endpoint used to reach the Rancher API.
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(&self.url, &self.access_key, &self.secret_key)
    }

    /// Returns the create wait bound, or `None` when waiting is unbounded.
    #[must_use]
    pub const fn create_timeout(&self) -> Option<Duration> {
        if self.create_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.create_timeout_secs))
        }
    }

    /// Returns the image reference sent to Rancher.
    #[must_use]
    pub fn image_uuid(&self) -> String {
        format!("docker:{}", self.os_image)
    }
}

fn size_or(
    options: &DriverOptions,
    field: &'static str,
    default: u32,
) -> Result<u32, ConfigError> {
    match options.int(field) {
        value if value <= 0 => Ok(default),
        value => u32::try_from(value).map_err(|_| ConfigError::InvalidSize { field }),
    }
}

fn timeout_or_default(value: i64) -> u64 {
    match u64::try_from(value) {
        Ok(0) | Err(_) => DEFAULT_CREATE_TIMEOUT_SECS,
        Ok(seconds) => seconds,
    }
}

/// Errors raised while resolving driver configuration.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// A required connection parameter is empty or missing.
    #[error("{message}")]
    MissingField {
        /// Flag that was missing.
        field: &'static str,
        /// Actionable description naming the flag and environment variable.
        message: String,
    },
    /// A sizing parameter is zero or does not fit in 32 bits.
    #[error("--{field} must be a positive integer no larger than 4294967295")]
    InvalidSize {
        /// Flag carrying the invalid value.
        field: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_options_read_as_empty_and_zero() {
        let options = DriverOptions::new().with_int(flags::URL, 7);
        assert_eq!(options.string(flags::URL), "");
        assert_eq!(options.int(flags::VCPU), 0);
    }

    #[test]
    fn size_or_defaults_non_positive_values() {
        let options = DriverOptions::new()
            .with_int(flags::MEMORY_MB, -4)
            .with_int(flags::VCPU, 3);
        assert_eq!(size_or(&options, flags::MEMORY_MB, 9), Ok(9));
        assert_eq!(size_or(&options, flags::VCPU, 9), Ok(3));
        assert_eq!(size_or(&DriverOptions::new(), flags::VCPU, 9), Ok(9));
    }

    #[test]
    fn size_or_rejects_values_beyond_u32() {
        let options = DriverOptions::new()
            .with_int(flags::MEMORY_MB, i64::from(u32::MAX) + 1)
            .with_int(flags::VCPU, i64::from(u32::MAX));
        assert_eq!(
            size_or(&options, flags::MEMORY_MB, 9),
            Err(ConfigError::InvalidSize {
                field: flags::MEMORY_MB
            })
        );
        assert_eq!(size_or(&options, flags::VCPU, 9), Ok(u32::MAX));
    }

    #[test]
    fn zero_timeout_flag_keeps_default_bound() {
        assert_eq!(timeout_or_default(0), DEFAULT_CREATE_TIMEOUT_SECS);
        assert_eq!(timeout_or_default(-1), DEFAULT_CREATE_TIMEOUT_SECS);
        assert_eq!(timeout_or_default(30), 30);
    }

    #[test]
    fn flag_table_defaults_match_constants() {
        let default_of = |name: &str| {
            CREATE_FLAGS
                .iter()
                .find(|flag| flag.name == name)
                .and_then(|flag| flag.default)
        };
        assert_eq!(default_of(flags::OS_IMAGE), Some(DEFAULT_OS_IMAGE));
        assert_eq!(default_of(flags::OS_USER), Some(DEFAULT_OS_USER));
        assert_eq!(
            default_of(flags::MEMORY_MB),
            Some(DEFAULT_MEMORY_MB.to_string().as_str())
        );
        assert_eq!(
            default_of(flags::VCPU),
            Some(DEFAULT_VCPU.to_string().as_str())
        );
    }
}
