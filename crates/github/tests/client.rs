//! Integration tests for `GithubClient` against a wiremock server.

use dispatch::{
    Config, ConfigInputs, DispatchRequest, GitRef, JobId, RepositoryId, RunId, RunName,
    ServiceError, WorkflowId, WorkflowService, DISPATCH_EVENT,
};
use github::GithubClient;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn repo() -> RepositoryId {
    RepositoryId::parse("octo/hello").unwrap()
}

fn client(server: &MockServer) -> GithubClient {
    let config = Config::from_inputs(ConfigInputs {
        token: Some("ghs_secret".into()),
        workflow: Some("ci.yml".into()),
        git_ref: Some("main".into()),
        repo: Some("octo/hello".into()),
        ..Default::default()
    })
    .unwrap();
    GithubClient::new(&server.uri(), &config.token).unwrap()
}

fn run_json(id: u64, status: &str, conclusion: Option<&str>) -> serde_json::Value {
    json!({
        "id": id,
        "name": "CI",
        "status": status,
        "conclusion": conclusion,
        "created_at": "2024-05-01T10:00:03Z",
        "url": format!("https://api.github.com/repos/octo/hello/actions/runs/{id}"),
        "html_url": format!("https://github.com/octo/hello/actions/runs/{id}"),
        "head_branch": "main"
    })
}

#[tokio::test]
async fn sends_github_headers_and_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/actions/runs/7"))
        .and(header("authorization", "Bearer ghs_secret"))
        .and(header("accept", "application/vnd.github+json"))
        .and(header("x-github-api-version", "2022-11-28"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_json(7, "in_progress", None)))
        .expect(1)
        .mount(&server)
        .await;

    let run = client(&server).get_run(&repo(), RunId::new(7)).await.unwrap();

    assert_eq!(run.id, RunId::new(7));
    assert_eq!(run.status.as_deref(), Some("in_progress"));
    assert_eq!(run.conclusion, None);
    assert_eq!(run.html_url, "https://github.com/octo/hello/actions/runs/7");
}

#[tokio::test]
async fn workflows_are_read_across_pages() {
    let server = MockServer::start().await;
    let first: Vec<_> = (1..=100)
        .map(|i| json!({ "id": i, "name": format!("wf {i}"), "path": format!(".github/workflows/w{i}.yml"), "state": "active" }))
        .collect();
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/actions/workflows"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 101,
            "workflows": first
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/actions/workflows"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 101,
            "workflows": [{ "id": 5000, "name": "Deploy", "path": ".github/workflows/deploy.yml" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let workflows = client(&server).list_workflows(&repo()).await.unwrap();

    assert_eq!(workflows.len(), 101);
    assert_eq!(workflows[100].id, 5000);
    assert_eq!(workflows[100].name, "Deploy");
}

#[tokio::test]
async fn dispatch_without_run_details_returns_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/hello/actions/workflows/ci.yml/dispatches"))
        .and(body_json(json!({ "ref": "main", "inputs": { "name": "world" } })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut inputs = serde_json::Map::new();
    inputs.insert("name".into(), json!("world"));
    let request = DispatchRequest {
        workflow: WorkflowId::File("ci.yml".into()),
        git_ref: GitRef::new("main").unwrap(),
        inputs,
        return_run_details: false,
    };

    let links = client(&server)
        .create_dispatch(&repo(), &request)
        .await
        .unwrap();
    assert_eq!(links, None);
}

#[tokio::test]
async fn dispatch_with_run_details_returns_links() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/hello/actions/workflows/42/dispatches"))
        .and(body_json(json!({ "ref": "v1.0", "inputs": {}, "return_run_details": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "workflow_run_id": 991,
            "run_url": "https://api.github.com/repos/octo/hello/actions/runs/991",
            "html_url": "https://github.com/octo/hello/actions/runs/991"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = DispatchRequest {
        workflow: WorkflowId::Numeric(42),
        git_ref: GitRef::new("v1.0").unwrap(),
        inputs: serde_json::Map::new(),
        return_run_details: true,
    };

    let links = client(&server)
        .create_dispatch(&repo(), &request)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(links.run_id, RunId::new(991));
    assert_eq!(links.html_url, "https://github.com/octo/hello/actions/runs/991");
}

#[tokio::test]
async fn disabled_workflow_rejection_is_recognisable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/hello/actions/workflows/42/dispatches"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "Cannot trigger a 'workflow_dispatch' on a disabled workflow",
            "documentation_url": "https://docs.github.com/rest"
        })))
        .mount(&server)
        .await;

    let request = DispatchRequest {
        workflow: WorkflowId::Numeric(42),
        git_ref: GitRef::new("main").unwrap(),
        inputs: serde_json::Map::new(),
        return_run_details: false,
    };

    let err = client(&server)
        .create_dispatch(&repo(), &request)
        .await
        .unwrap_err();
    assert!(err.is_disabled_workflow());
    assert!(matches!(err, ServiceError::Http { status: 422, .. }));
}

#[tokio::test]
async fn missing_run_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/actions/runs/404"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .mount(&server)
        .await;

    let err = client(&server)
        .get_run(&repo(), RunId::new(404))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));
}

#[tokio::test]
async fn rate_limiting_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/actions/runs/5"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "30")
                .set_body_string("slow down"),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .get_run(&repo(), RunId::new(5))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ServiceError::Http {
            status: 429,
            message: "slow down".into(),
            retry_after: Some(std::time::Duration::from_secs(30)),
        }
    );
}

#[tokio::test]
async fn runs_are_filtered_by_dispatch_event() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/actions/workflows/42/runs"))
        .and(query_param("event", "workflow_dispatch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 2,
            "workflow_runs": [
                run_json(12, "queued", None),
                run_json(11, "completed", Some("success"))
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let runs = client(&server)
        .list_runs(&repo(), &WorkflowId::Numeric(42), DISPATCH_EVENT)
        .await
        .unwrap();

    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].id, RunId::new(12));
    assert_eq!(runs[1].conclusion.as_deref(), Some("success"));
}

#[tokio::test]
async fn jobs_and_logs_are_fetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/actions/runs/12/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 2,
            "jobs": [
                { "id": 1, "name": "build", "status": "completed" },
                { "id": 2, "name": "test", "status": "completed" }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/actions/jobs/2/logs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("line one\nline two\n"))
        .mount(&server)
        .await;

    let client = client(&server);
    let jobs = client.list_jobs(&repo(), RunId::new(12)).await.unwrap();
    let names: Vec<_> = jobs.iter().map(|j| j.name.as_str()).collect();
    assert_eq!(names, ["build", "test"]);

    let log = client.download_job_log(&repo(), JobId::new(2)).await.unwrap();
    assert_eq!(log, "line one\nline two\n");
}

#[tokio::test]
async fn check_runs_are_looked_up_by_name_on_the_ref() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/commits/main/check-runs"))
        .and(query_param("check_name", "release-7f3a"))
        .and(query_param("filter", "latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 1,
            "check_runs": [{
                "id": 3001,
                "name": "release-7f3a",
                "html_url": "https://github.com/octo/hello/actions/runs/555/job/3001",
                "started_at": "2024-05-01T10:00:05Z",
                "status": "in_progress"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let checks = client(&server)
        .list_check_runs(
            &repo(),
            &GitRef::new("main").unwrap(),
            &RunName::new("release-7f3a").unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0].workflow_run_id(), Some(RunId::new(555)));
}

#[tokio::test]
async fn fully_qualified_ref_stays_one_path_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/commits/refs%2Fheads%2Fmain/check-runs"))
        .and(query_param("check_name", "release-7f3a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 0,
            "check_runs": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let checks = client(&server)
        .list_check_runs(
            &repo(),
            &GitRef::new("refs/heads/main").unwrap(),
            &RunName::new("release-7f3a").unwrap(),
        )
        .await
        .unwrap();

    assert!(checks.is_empty());
}
