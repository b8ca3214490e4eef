//! HTTP-level tests for the Rancher client against a canned local server.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use rancher_driver::api::{Endpoint, InstanceStop, ProjectFilter, RancherApi, VmAction};
use rancher_driver::{ApiError, RancherClient, VirtualMachine};

/// Serves one canned response per connection and returns the raw requests.
fn serve(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<String>>) {
    serve_raw(
        responses
            .into_iter()
            .map(|(status, body)| {
                format!(
                    "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                )
            })
            .collect(),
    )
}

/// Writes each response verbatim, one per connection, then closes it.
fn serve_raw(responses: Vec<String>) -> (String, JoinHandle<Vec<String>>) {
    let listener =
        TcpListener::bind("127.0.0.1:0").unwrap_or_else(|err| panic!("bind listener: {err}"));
    let addr = listener
        .local_addr()
        .unwrap_or_else(|err| panic!("listener address: {err}"));
    let handle = thread::spawn(move || {
        responses
            .into_iter()
            .map(|response| {
                let (stream, _) = listener
                    .accept()
                    .unwrap_or_else(|err| panic!("accept: {err}"));
                let mut reader = BufReader::new(stream);
                let request = read_request(&mut reader);
                let mut out = reader.into_inner();
                out.write_all(response.as_bytes())
                    .unwrap_or_else(|err| panic!("write response: {err}"));
                request
            })
            .collect()
    });
    (format!("http://{addr}/v1"), handle)
}

fn read_request(reader: &mut impl BufRead) -> String {
    let mut head = String::new();
    let mut content_length = 0_usize;
    loop {
        let mut line = String::new();
        reader
            .read_line(&mut line)
            .unwrap_or_else(|err| panic!("read request: {err}"));
        if let Some((name, value)) = line.split_once(':')
            && name.eq_ignore_ascii_case("content-length")
        {
            content_length = value.trim().parse().unwrap_or(0);
        }
        if line == "\r\n" || line.is_empty() {
            break;
        }
        head.push_str(&line);
    }
    let mut body = vec![0_u8; content_length];
    reader
        .read_exact(&mut body)
        .unwrap_or_else(|err| panic!("read body: {err}"));
    format!("{}\r\n{}", head.to_ascii_lowercase(), String::from_utf8_lossy(&body))
}

fn requests(handle: JoinHandle<Vec<String>>) -> Vec<String> {
    handle
        .join()
        .unwrap_or_else(|_| panic!("server thread panicked"))
}

async fn connect(url: &str) -> Result<RancherClient, ApiError> {
    RancherClient::connect(Endpoint::new(url, "AK", "SK")).await
}

#[tokio::test]
async fn connect_authenticates_with_key_pair() {
    let (url, server) = serve(vec![(200, "{}")]);

    connect(&url)
        .await
        .unwrap_or_else(|err| panic!("connect: {err}"));

    let seen = requests(server);
    assert!(seen[0].starts_with("get /v1 "), "unexpected: {}", seen[0]);
    assert!(seen[0].contains("authorization: basic qus6u0s="));
}

#[tokio::test]
async fn rejected_credentials_surface_rancher_message() {
    let (url, server) = serve(vec![(
        401,
        r#"{"type":"error","status":401,"code":"Unauthorized","message":"Unauthorized"}"#,
    )]);

    let err = connect(&url).await.expect_err("401 should fail");
    requests(server);

    assert_eq!(
        err,
        ApiError::Api {
            operation: "connect",
            status: 401,
            code: Some(String::from("Unauthorized")),
            message: String::from("Unauthorized"),
        }
    );
}

#[tokio::test]
async fn empty_error_body_reports_status_reason() {
    let (url, server) = serve(vec![(503, "")]);

    let err = connect(&url).await.expect_err("503 should fail");
    requests(server);

    assert_eq!(
        err,
        ApiError::Api {
            operation: "connect",
            status: 503,
            code: None,
            message: String::from("Service Unavailable"),
        }
    );
}

#[tokio::test]
async fn truncated_error_body_is_a_transport_failure() {
    let (url, server) = serve_raw(vec![String::from(
        "HTTP/1.1 502 Bad Gateway\r\nContent-Length: 64\r\nConnection: close\r\n\r\n{\"message\"",
    )]);

    let err = connect(&url).await.expect_err("truncated body should fail");
    requests(server);

    assert!(
        matches!(err, ApiError::Transport { operation: "connect", .. }),
        "unexpected: {err:?}"
    );
}

#[tokio::test]
async fn missing_project_is_not_found() {
    let (url, server) = serve(vec![(200, "{}"), (404, r#"{"type":"error","status":404}"#)]);
    let client = connect(&url)
        .await
        .unwrap_or_else(|err| panic!("connect: {err}"));

    let err = client
        .get_project("1a404")
        .await
        .expect_err("404 should fail");

    let seen = requests(server);
    assert!(matches!(err, ApiError::NotFound { operation: "get project", .. }));
    assert!(seen[1].starts_with("get /v1/projects/1a404 "));
}

#[tokio::test]
async fn project_listing_sends_filters() {
    let (url, server) = serve(vec![
        (200, "{}"),
        (
            200,
            r#"{"type":"collection","data":[{"id":"1a5","name":"prod","state":"active","links":{"self":"http://rancher/v1/projects/1a5"}}]}"#,
        ),
    ]);
    let client = connect(&url)
        .await
        .unwrap_or_else(|err| panic!("connect: {err}"));

    let projects = client
        .list_projects(&ProjectFilter::named("prod", 2))
        .await
        .unwrap_or_else(|err| panic!("list projects: {err}"));

    let seen = requests(server);
    assert!(
        seen[1].starts_with("get /v1/projects?name=prod&state_ne=removed&limit=2 "),
        "unexpected: {}",
        seen[1]
    );
    assert_eq!(projects.len(), 1);
    assert_eq!(
        projects[0].self_link(),
        Some("http://rancher/v1/projects/1a5")
    );
}

#[tokio::test]
async fn stop_posts_empty_payload_to_action_url() {
    let (url, server) = serve(vec![(200, "{}"), (200, r#"{"id":"1i9","state":"stopping"}"#)]);
    let client = connect(&url)
        .await
        .unwrap_or_else(|err| panic!("connect: {err}"));
    let target = VirtualMachine {
        id: String::from("1i9"),
        ..VirtualMachine::default()
    };

    client
        .virtual_machine_action(&target, &VmAction::Stop(InstanceStop::default()))
        .await
        .unwrap_or_else(|err| panic!("stop: {err}"));

    let seen = requests(server);
    assert!(seen[1].starts_with("post /v1/virtualmachines/1i9?action=stop "));
    assert!(seen[1].ends_with("\r\n{}"), "unexpected: {}", seen[1]);
}
