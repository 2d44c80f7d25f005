mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn health_is_public() -> Result<()> {
    let server = common::TestServer::spawn().await?;

    let res = server.get("/health").send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json")));

    let body: Value = res.json().await?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
    Ok(())
}

#[tokio::test]
async fn missing_token_is_rejected() -> Result<()> {
    let server = common::TestServer::spawn().await?;

    let res = server.get("/users/me").send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Missing or invalid authorization header");
    Ok(())
}

#[tokio::test]
async fn bad_token_is_rejected() -> Result<()> {
    let server = common::TestServer::spawn().await?;

    let res = server.get("/users/me").bearer_auth("not-a-token").send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Invalid or expired token");
    Ok(())
}

#[tokio::test]
async fn query_token_is_accepted() -> Result<()> {
    let server = common::TestServer::spawn().await?;
    let token = server.token(&common::student())?;

    let res = server.get(&format!("/users/me?jwt={}", token)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["user"]["memberId"], "m1");
    Ok(())
}

#[tokio::test]
async fn api_prefix_is_stripped() -> Result<()> {
    let server = common::TestServer::spawn().await?;
    let token = server.token(&common::student())?;

    let res = server.get("/api/users/me").bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["user"]["rolekey"], "students");
    Ok(())
}

#[tokio::test]
async fn unknown_route_is_not_found() -> Result<()> {
    let server = common::TestServer::spawn().await?;

    let res = server.get("/nope").send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Route not found");
    Ok(())
}
