use roster_vault::cli::commands::doctor::{check_token, Health};
use roster_vault::config::Credentials;
use roster_vault::git::github::{GitHubClient, GitHubRepo, TokenAccess};
use serde_json::json;
use std::time::Duration;

fn repo() -> GitHubRepo {
    GitHubRepo::from_remote_url("https://github.com/acme/roster-data.git").unwrap()
}

fn credentials() -> Credentials {
    Credentials::new(Some("ghp_testtoken".to_string()), None)
}

/// The token is sent as a bearer header and push permission is reported
#[tokio::test]
async fn test_token_with_push_access() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/repos/acme/roster-data")
        .match_header("authorization", "Bearer ghp_testtoken")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": 1,
                "full_name": "acme/roster-data",
                "permissions": {"admin": false, "push": true, "pull": true}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = GitHubClient::new(&server.url(), &credentials(), Duration::from_secs(5)).unwrap();
    let access = client.repository_access(&repo()).await.unwrap();

    assert_eq!(
        access,
        TokenAccess::Push {
            full_name: "acme/roster-data".to_string()
        }
    );
    mock.assert_async().await;
}

/// A read-only token is a warning, not a failure
#[tokio::test]
async fn test_read_only_token_is_warning() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/repos/acme/roster-data")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"full_name": "acme/roster-data", "permissions": {"push": false}}).to_string(),
        )
        .create_async()
        .await;

    let health = check_token(&server.url(), &credentials(), &repo(), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(health, Health::Warning);
}

/// Rejected credentials and invisible repositories are problems
#[tokio::test]
async fn test_bad_token_and_missing_repo() {
    let mut server = mockito::Server::new_async().await;
    let unauthorized = server
        .mock("GET", "/repos/acme/roster-data")
        .with_status(401)
        .with_body(json!({"message": "Bad credentials"}).to_string())
        .create_async()
        .await;

    let health = check_token(&server.url(), &credentials(), &repo(), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(health, Health::Problem);
    unauthorized.assert_async().await;

    let _not_found = server
        .mock("GET", "/repos/acme/archived")
        .with_status(404)
        .with_body(json!({"message": "Not Found"}).to_string())
        .create_async()
        .await;

    let client = GitHubClient::new(&server.url(), &credentials(), Duration::from_secs(5)).unwrap();
    let archived = GitHubRepo {
        owner: "acme".to_string(),
        name: "archived".to_string(),
    };
    assert_eq!(
        client.repository_access(&archived).await.unwrap(),
        TokenAccess::NotFound
    );
}

/// Unexpected statuses surface as errors
#[tokio::test]
async fn test_server_error_is_reported() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/repos/acme/roster-data")
        .with_status(502)
        .create_async()
        .await;

    let client = GitHubClient::new(&server.url(), &credentials(), Duration::from_secs(5)).unwrap();
    assert!(client.repository_access(&repo()).await.is_err());
}
