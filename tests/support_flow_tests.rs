// tests/support_flow_tests.rs

mod common;

use lms_backend::handlers::query::claim_query;
use serde_json::{Value, json};

use common::{spawn_app, unique};

#[tokio::test]
async fn group_notification_reaches_department_learners() {
    let Some(app) = spawn_app().await else { return };
    let department = unique("dept");

    let (_, trainer_token) = app.active_user(&unique("tr"), "trainer", &department).await;
    let (_, trainee_token) = app.active_user(&unique("te"), "trainee", &department).await;
    let (_, employee_token) = app.active_user(&unique("em"), "employee", &department).await;
    // Different department, must not receive it
    let (_, outsider_token) = app.active_user(&unique("te"), "trainee", &unique("dept")).await;

    let response = app
        .client
        .post(app.url("/api/trainer/notifications"))
        .bearer_auth(&trainer_token)
        .json(&json!({
            "subject": "Reminder",
            "message": "<b>Finish</b> the weekly quiz",
            "notification_type": "assessment",
            "mode": "group",
            "audience": "both"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let outcome: Value = response.json().await.unwrap();
    assert_eq!(outcome["total_recipients"], 2);
    let notification_id = outcome["notification_id"].as_i64().unwrap();

    for token in [&trainee_token, &employee_token] {
        let response = app
            .client
            .get(app.url("/api/learner/notifications?unread=true"))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        let inbox: Vec<Value> = response.json().await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0]["subject"], "Reminder");
        assert_eq!(inbox[0]["is_read"], false);
    }

    let response = app
        .client
        .get(app.url("/api/learner/notifications"))
        .bearer_auth(&outsider_token)
        .send()
        .await
        .unwrap();
    let inbox: Vec<Value> = response.json().await.unwrap();
    assert!(inbox.is_empty());

    // Read receipts
    let response = app
        .client
        .post(app.url("/api/learner/notifications/read"))
        .bearer_auth(&trainee_token)
        .json(&json!({ "notification_id": notification_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = app
        .client
        .get(app.url("/api/learner/notifications?unread=true"))
        .bearer_auth(&trainee_token)
        .send()
        .await
        .unwrap();
    let inbox: Vec<Value> = response.json().await.unwrap();
    assert!(inbox.is_empty());

    let response = app
        .client
        .post(app.url("/api/learner/notifications/read"))
        .bearer_auth(&outsider_token)
        .json(&json!({ "notification_id": notification_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    // Sender history
    let response = app
        .client
        .get(app.url("/api/trainer/notifications"))
        .bearer_auth(&trainer_token)
        .send()
        .await
        .unwrap();
    let page: Value = response.json().await.unwrap();
    assert_eq!(page["count"], 1);
    assert_eq!(page["results"][0]["recipients_count"], 2);
}

#[tokio::test]
async fn notification_without_recipients_is_rejected() {
    let Some(app) = spawn_app().await else { return };
    let (_, trainer_token) = app.active_user(&unique("tr"), "trainer", &unique("dept")).await;

    let response = app
        .client
        .post(app.url("/api/trainer/notifications"))
        .bearer_auth(&trainer_token)
        .json(&json!({
            "subject": "Hello",
            "message": "Anyone there?",
            "mode": "individual",
            "usernames": [unique("ghost")]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn query_thread_is_claimed_by_first_trainer() {
    let Some(app) = spawn_app().await else { return };
    let department = unique("dept");

    let (_, trainee_token) = app.active_user(&unique("te"), "trainee", &department).await;
    let (_, other_trainee_token) = app.active_user(&unique("te"), "trainee", &department).await;
    let (trainer_id, trainer_token) = app.active_user(&unique("tr"), "trainer", &department).await;
    let (_, second_trainer_token) = app.active_user(&unique("tr"), "trainer", &department).await;

    let response = app
        .client
        .post(app.url("/api/learner/queries"))
        .bearer_auth(&trainee_token)
        .json(&json!({ "question": "How are borrow scopes computed?", "category": "training" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let query: Value = response.json().await.unwrap();
    let query_id = query["id"].as_i64().unwrap();
    assert_eq!(query["department"], department.as_str());
    assert_eq!(query["raised_by_role"], "trainee");

    let respond = |token: String, path: String, text: &'static str| {
        app.client
            .post(app.url(&path))
            .bearer_auth(token)
            .json(&json!({ "response": text }))
            .send()
    };
    let trainer_path = format!("/api/trainer/queries/{}/responses", query_id);
    let learner_path = format!("/api/learner/queries/{}/responses", query_id);

    let response = respond(trainer_token.clone(), trainer_path.clone(), "Non-lexical lifetimes.").await.unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let response = respond(second_trainer_token, trainer_path, "Me too").await.unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = respond(other_trainee_token, learner_path.clone(), "Not mine").await.unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = respond(trainee_token.clone(), learner_path, "Thanks!").await.unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let response = app
        .client
        .patch(app.url(&format!("/api/trainer/queries/{}/resolve", query_id)))
        .bearer_auth(&trainer_token)
        .json(&json!({ "is_resolved": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = app
        .client
        .get(app.url("/api/learner/queries"))
        .bearer_auth(&trainee_token)
        .send()
        .await
        .unwrap();
    let threads: Vec<Value> = response.json().await.unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0]["is_resolved"], true);
    assert_eq!(threads[0]["assigned_trainer"], trainer_id);
    assert_eq!(threads[0]["responses"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn lessons_complete_within_department() {
    let Some(app) = spawn_app().await else { return };
    let department = unique("dept");

    let (_, trainer_token) = app.active_user(&unique("tr"), "trainer", &department).await;
    let (_, trainee_token) = app.active_user(&unique("te"), "trainee", &department).await;
    let (_, outsider_token) = app.active_user(&unique("te"), "trainee", &unique("dept")).await;

    let subject_name = unique("Systems Programming");
    let response = app
        .client
        .post(app.url("/api/trainer/subjects"))
        .bearer_auth(&trainer_token)
        .json(&json!({
            "subject_id": unique("S"),
            "name": subject_name,
            "department": department,
            "display_on_frontend": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let subject: Value = response.json().await.unwrap();

    let response = app
        .client
        .post(app.url("/api/trainer/lessons"))
        .bearer_auth(&trainer_token)
        .json(&json!({
            "lesson_id": unique("L"),
            "subject_id": subject["id"],
            "name": unique("Intro to Ownership"),
            "position": 1,
            "display_on_frontend": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let lesson: Value = response.json().await.unwrap();
    let lesson_slug = lesson["slug"].as_str().unwrap().to_string();
    assert_eq!(lesson["department"], department.as_str());

    let complete = format!("/api/learner/lessons/{}/complete", lesson_slug);

    let response = app.client.post(app.url(&complete)).bearer_auth(&outsider_token).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // Completing twice is harmless
    for _ in 0..2 {
        let response = app.client.post(app.url(&complete)).bearer_auth(&trainee_token).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }

    let response = app
        .client
        .get(app.url(&format!("/api/curriculum/subjects/{}/lessons", subject["slug"].as_str().unwrap())))
        .bearer_auth(&trainee_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["lessons"][0]["completed"], true);

    let response = app
        .client
        .get(app.url("/api/learner/dashboard"))
        .bearer_auth(&trainee_token)
        .send()
        .await
        .unwrap();
    let dashboard: Value = response.json().await.unwrap();
    assert_eq!(dashboard["lesson_progress"][0]["completed_count"], 1);
}

#[tokio::test]
async fn late_claim_does_not_take_over_a_query() {
    let Some(app) = spawn_app().await else { return };
    let department = unique("dept");

    let (_, trainee_token) = app.active_user(&unique("te"), "trainee", &department).await;
    let (first_id, _) = app.active_user(&unique("tr"), "trainer", &department).await;
    let (second_id, _) = app.active_user(&unique("tr"), "trainer", &department).await;

    let response = app
        .client
        .post(app.url("/api/learner/queries"))
        .bearer_auth(&trainee_token)
        .json(&json!({ "question": "Who takes this one?" }))
        .send()
        .await
        .unwrap();
    let query: Value = response.json().await.unwrap();
    let query_id = query["id"].as_i64().unwrap();

    assert!(claim_query(&app.pool, query_id, first_id).await.unwrap());
    // Second trainer read the query while it was still unassigned
    assert!(!claim_query(&app.pool, query_id, second_id).await.unwrap());
    // Claiming again is harmless for the holder
    assert!(claim_query(&app.pool, query_id, first_id).await.unwrap());

    let (holder,): (Option<i64>,) = sqlx::query_as("SELECT assigned_trainer FROM queries WHERE id = $1")
        .bind(query_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(holder, Some(first_id));

    assert!(!claim_query(&app.pool, i64::MAX, first_id).await.unwrap());
}
