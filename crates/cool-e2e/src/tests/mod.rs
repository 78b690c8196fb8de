mod fake;
mod idle_tests;
mod nextcloud_tests;

use crate::config::{Integration, TestEnv};
use crate::session::Session;
use fake::FakeBrowser;
use std::sync::Arc;

use crate::init_tracing;

pub fn test_env(integration: Integration) -> TestEnv {
    TestEnv {
        integration,
        server_port: 9980,
        wsd_version_hash: "0123abcd".to_string(),
        data_folder: "/data/".to_string(),
        workdir: "/work/".to_string(),
        fixtures_folder: String::new(),
        lo_core_version: String::new(),
        interference_test: false,
        default_command_timeout_ms: 4000,
    }
}

pub fn session_with(integration: Integration) -> (Arc<FakeBrowser>, Session) {
    init_tracing();
    let fake = FakeBrowser::new();
    let session = Session::new(fake.clone(), test_env(integration));
    (fake, session)
}
