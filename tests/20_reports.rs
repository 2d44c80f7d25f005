mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use essay_api::database::{Lang, Table};

#[tokio::test]
async fn students_roster_is_teacher_only() -> Result<()> {
    let server = common::TestServer::spawn().await?;
    server
        .seed(
            Table::MemberLookup,
            vec![
                json!({"memberId": "t1", "email": "teacher@s.edu", "school": "S", "class": "1A,1B", "rolekey": "teachers"}),
                json!({"memberId": "m1", "email": "m1@s.edu", "school": "S", "class": "1A", "classno": 3, "rolekey": "students"}),
            ],
        )
        .await;

    let student = server.token(&common::student())?;
    let res = server.get("/users/students").bearer_auth(&student).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let teacher = server.token(&common::teacher())?;
    let res = server.get("/users/students").bearer_auth(&teacher).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"][0]["memberId"], "m1");
    assert_eq!(body["data"][0]["classno"], 3);
    Ok(())
}

#[tokio::test]
async fn submission_list_pages_over_http() -> Result<()> {
    let server = common::TestServer::spawn().await?;
    let rows = (1..=3)
        .map(|id| json!({"id": id, "ownerId": "m1", "YN": true, "Class": "1A", "UploadTime": format!("2024-02-0{}T09:00:00", id)}))
        .collect();
    server.seed(Table::Submissions(Lang::En), rows).await;
    let token = server.token(&common::student())?;

    let res = server
        .get("/api/submission/list?pageSize=2")
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"][0]["id"], 3);
    assert_eq!(body["pagination"]["totalCount"], 3);
    assert_eq!(body["pagination"]["hasNext"], true);

    let res = server
        .get("/submission/list?pageSize=500")
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn oral_list_requires_a_filter() -> Result<()> {
    let server = common::TestServer::spawn().await?;
    let token = server.token(&common::student())?;

    let res = server.get("/oral/list").bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["success"], false);
    Ok(())
}

#[tokio::test]
async fn oral_update_then_list() -> Result<()> {
    let server = common::TestServer::spawn().await?;
    let token = server.token(&common::teacher())?;

    let res = server
        .post("/oral/update")
        .bearer_auth(&token)
        .json(&json!({
            "oralUsage": {"ID": "u1", "memberId": "m1", "OralQuestionId": "q1", "createDate": "2024-03-01T08:00:00"}
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["results"]["oralUsage"]["message"], "Created");

    let res = server
        .get("/oral/list?memberId=m1")
        .bearer_auth(&token)
        .send()
        .await?;
    let body: Value = res.json().await?;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["OralQuestionId"], "q1");
    Ok(())
}

#[tokio::test]
async fn student_essays_over_http() -> Result<()> {
    let server = common::TestServer::spawn().await?;
    server
        .seed(
            Table::HomeworkImages,
            vec![json!({"id": 7, "studentId": "m1", "homeworkId": "h1", "createdAt": "2024-04-01 10:00:00", "image_array": "https://img/p1.png"})],
        )
        .await;
    server
        .seed(
            Table::EssayDetails(Lang::En),
            vec![json!({"id": 1, "homeworkimages_id": 7, "title": "Spring", "score2": 65})],
        )
        .await;
    let token = server.token(&common::student())?;

    let res = server
        .get("/api/student/essays?studentId=m1")
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["imageUrl"], "https://img/p1.png");
    assert_eq!(body["data"][0]["en"]["title"], "Spring");
    assert!(body["data"][0]["cn"]["title"].is_null());

    let res = server.get("/student-homeworks").bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
