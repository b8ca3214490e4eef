//! Unit tests for the Rancher driver lifecycle.

mod project;

use std::sync::Arc;

use camino::Utf8PathBuf;
use rstest::fixture;
use tempfile::TempDir;

use super::Driver;
use crate::config::{DriverOptions, flags};
use crate::test_support::{ManualClock, ScriptedConnector, ScriptedRancher, StaticKeyGenerator};

const BASE_URL: &str = "https://rancher.example/v1";
const SCOPED_URL: &str = "https://rancher.example/v1/projects/1a5";
const MACHINE_NAME: &str = "node-1";

type TestDriver = Driver<ScriptedConnector, StaticKeyGenerator>;

struct Harness {
    _tmp: TempDir,
    root: Utf8PathBuf,
    rancher: ScriptedRancher,
    connector: ScriptedConnector,
    keygen: StaticKeyGenerator,
    clock: Arc<ManualClock>,
}

impl Harness {
    fn with_rancher(rancher: ScriptedRancher) -> Self {
        let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
            .unwrap_or_else(|path| panic!("temp path should be utf8: {}", path.display()));
        Self {
            _tmp: tmp,
            root,
            connector: ScriptedConnector::new(rancher.clone()),
            rancher,
            keygen: StaticKeyGenerator::default(),
            clock: Arc::new(ManualClock::new()),
        }
    }

    fn driver(&self, options: &DriverOptions) -> TestDriver {
        let mut driver = Driver::new(
            MACHINE_NAME,
            self.root.clone(),
            self.connector.clone(),
            self.keygen.clone(),
        )
        .with_clock(self.clock.clone());
        driver
            .set_config_from_flags(options)
            .unwrap_or_else(|err| panic!("options should be valid: {err}"));
        driver
    }

    fn created_driver(&self, machine_id: &str) -> TestDriver {
        let mut driver = self.driver(&base_options());
        driver.machine_id = machine_id.to_owned();
        driver
    }
}

fn base_options() -> DriverOptions {
    DriverOptions::new()
        .with_string(flags::URL, BASE_URL)
        .with_string(flags::ACCESS_KEY, "AK")
        .with_string(flags::SECRET_KEY, "SK")
}

#[fixture]
fn harness() -> Harness {
    Harness::with_rancher(ScriptedRancher::new())
}
