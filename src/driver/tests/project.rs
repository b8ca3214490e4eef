//! Tests for environment selection during the pre-create check.

use rstest::rstest;

use super::{BASE_URL, Harness, SCOPED_URL, base_options};
use crate::api::ProjectFilter;
use crate::config::flags;
use crate::driver::DriverError;
use crate::rancher::{ApiError, Project};
use crate::test_support::{ApiCall, Operation, ScriptedRancher, project};

fn prod(id: &str) -> Project {
    project(id, "prod", &format!("{BASE_URL}/projects/{id}"))
}

#[tokio::test]
async fn explicit_id_rescopes_url_and_reconnects() {
    let harness = Harness::with_rancher(ScriptedRancher::new().with_project(prod("1a5")));
    let mut driver = harness.driver(&base_options().with_string(flags::PROJECT_ID, "1a5"));

    driver
        .pre_create_check()
        .await
        .unwrap_or_else(|err| panic!("pre-create check: {err}"));

    assert_eq!(driver.config().url, SCOPED_URL);
    assert_eq!(harness.connector.connected_urls(), vec![BASE_URL, SCOPED_URL]);
    assert_eq!(
        harness.rancher.calls(),
        vec![ApiCall::GetProject(String::from("1a5"))]
    );
}

#[tokio::test]
async fn unknown_id_is_a_configuration_error() {
    let harness = Harness::with_rancher(ScriptedRancher::new());
    let mut driver = harness.driver(&base_options().with_string(flags::PROJECT_ID, "1a404"));

    let err = driver
        .pre_create_check()
        .await
        .expect_err("unknown project should fail");

    assert_eq!(
        err,
        DriverError::ProjectNotFound {
            id: String::from("1a404")
        }
    );
    assert_eq!(driver.config().url, BASE_URL);
}

#[tokio::test]
async fn id_lookup_failure_other_than_not_found_passes_through() {
    let harness = Harness::with_rancher(ScriptedRancher::new());
    let denied = ApiError::Api {
        operation: "get project",
        status: 401,
        code: Some(String::from("Unauthorized")),
        message: String::from("Unauthorized"),
    };
    harness
        .rancher
        .fail_next(Operation::GetProject, denied.clone());
    let mut driver = harness.driver(&base_options().with_string(flags::PROJECT_ID, "1a5"));

    let err = driver
        .pre_create_check()
        .await
        .expect_err("auth failure should surface");

    assert_eq!(err, DriverError::Api(denied));
}

#[rstest]
#[case::none(vec![], DriverError::NoEnvironmentNamed { name: String::from("prod") })]
#[case::several(
    vec![prod("1a5"), prod("1a6")],
    DriverError::AmbiguousEnvironmentName { name: String::from("prod") }
)]
#[tokio::test]
async fn name_lookup_needs_exactly_one_match(
    #[case] projects: Vec<Project>,
    #[case] expected: DriverError,
) {
    let rancher = projects
        .into_iter()
        .fold(ScriptedRancher::new(), ScriptedRancher::with_project);
    let harness = Harness::with_rancher(rancher);
    let mut driver = harness.driver(&base_options().with_string(flags::PROJECT_NAME, "prod"));

    let err = driver
        .pre_create_check()
        .await
        .expect_err("selection should fail");

    assert_eq!(err, expected);
    assert_eq!(driver.config().url, BASE_URL);
}

#[tokio::test]
async fn name_lookup_filters_by_name_and_state() {
    let rancher = ScriptedRancher::new()
        .with_project(project("1a1", "staging", "https://rancher.example/v1/projects/1a1"))
        .with_project(prod("1a5"));
    let harness = Harness::with_rancher(rancher);
    let mut driver = harness.driver(&base_options().with_string(flags::PROJECT_NAME, "prod"));

    driver
        .pre_create_check()
        .await
        .unwrap_or_else(|err| panic!("pre-create check: {err}"));

    assert_eq!(driver.config().url, SCOPED_URL);
    assert_eq!(
        harness.rancher.calls(),
        vec![ApiCall::ListProjects(ProjectFilter::named("prod", 2))]
    );
}

#[tokio::test]
async fn explicit_id_wins_over_name() {
    let harness = Harness::with_rancher(ScriptedRancher::new().with_project(prod("1a5")));
    let options = base_options()
        .with_string(flags::PROJECT_ID, "1a5")
        .with_string(flags::PROJECT_NAME, "ignored");
    let mut driver = harness.driver(&options);

    driver
        .pre_create_check()
        .await
        .unwrap_or_else(|err| panic!("pre-create check: {err}"));

    assert!(
        harness
            .rancher
            .calls()
            .iter()
            .all(|call| !matches!(call, ApiCall::ListProjects(_)))
    );
}

#[rstest]
#[case::none(vec![], DriverError::NoEnvironments)]
#[case::several(vec![prod("1a5"), prod("1a6")], DriverError::AmbiguousCredentials)]
#[tokio::test]
async fn unfiltered_lookup_needs_exactly_one_visible_project(
    #[case] projects: Vec<Project>,
    #[case] expected: DriverError,
) {
    let rancher = projects
        .into_iter()
        .fold(ScriptedRancher::new(), ScriptedRancher::with_project);
    let harness = Harness::with_rancher(rancher);
    let mut driver = harness.driver(&base_options());

    let err = driver
        .pre_create_check()
        .await
        .expect_err("selection should fail");

    assert_eq!(err, expected);
    assert_eq!(
        harness.rancher.calls(),
        vec![ApiCall::ListProjects(ProjectFilter::all(2))]
    );
}

#[tokio::test]
async fn single_visible_project_is_selected() {
    let harness = Harness::with_rancher(ScriptedRancher::new().with_project(prod("1a5")));
    let mut driver = harness.driver(&base_options());

    driver
        .pre_create_check()
        .await
        .unwrap_or_else(|err| panic!("pre-create check: {err}"));

    assert_eq!(driver.config().url, SCOPED_URL);
}

#[tokio::test]
async fn project_without_self_link_is_rejected() {
    let bare = Project {
        id: String::from("1a5"),
        name: String::from("prod"),
        ..Project::default()
    };
    let harness = Harness::with_rancher(ScriptedRancher::new().with_project(bare));
    let mut driver = harness.driver(&base_options());

    let err = driver
        .pre_create_check()
        .await
        .expect_err("missing link should fail");

    assert_eq!(
        err,
        DriverError::MissingProjectLink {
            id: String::from("1a5")
        }
    );
}

#[tokio::test]
async fn connection_failure_is_reported_before_selection() {
    let harness = Harness::with_rancher(ScriptedRancher::new().with_project(prod("1a5")));
    let refused = ApiError::Transport {
        operation: "connect",
        message: String::from("connection refused"),
    };
    harness.connector.fail_next(refused.clone());
    let mut driver = harness.driver(&base_options());

    let err = driver
        .pre_create_check()
        .await
        .expect_err("connect failure should surface");

    assert_eq!(err, DriverError::Api(refused));
    assert!(harness.rancher.calls().is_empty());
}
