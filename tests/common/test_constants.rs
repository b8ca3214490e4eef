//! Shared constants for integration tests.
//!
//! Integration tests are compiled as separate crates (one per top-level file in
//! `tests/`). Placing shared constants under `tests/common/` avoids creating an
//! additional integration test binary while still allowing reuse via:
//!
//! ```rust
//! #[path = "common/test_constants.rs"]
//! mod test_constants;
//! ```

/// Global Rancher API URL used before an environment is selected.
pub const RANCHER_URL: &str = "https://rancher.example/v1";

/// Project-scoped API URL of the test environment.
pub const SCOPED_URL: &str = "https://rancher.example/v1/projects/1a5";

/// Access key used by the tests.
pub const ACCESS_KEY: &str = "AK";

/// Secret key used by the tests.
pub const SECRET_KEY: &str = "SK";

/// Image the driver provisions when none is configured.
pub const DEFAULT_OS_IMAGE: &str = "rancher/vm-ubuntu";
