// tests/exam_tests.rs

use std::sync::Arc;

use simulations::{
    config::Config,
    routes,
    state::AppState,
    store::MemoryRepository,
    utils::jwt::{ADMIN_ROLE, sign_jwt},
};

const TEST_SECRET: &str = "exam_test_secret";

struct TestApp {
    address: String,
    repo: Arc<MemoryRepository>,
    token: String,
    admin_token: String,
}

async fn spawn_app() -> TestApp {
    let repo = Arc::new(MemoryRepository::new());

    let config = Config {
        database_url: "memory".to_string(),
        jwt_secret: TEST_SECRET.to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        port: 0,
        admin_username: None,
        admin_password: None,
    };

    let state = AppState {
        repo: repo.clone(),
        config,
    };
    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        repo,
        token: sign_jwt(2, "instructor", TEST_SECRET, 600).unwrap(),
        admin_token: sign_jwt(1, ADMIN_ROLE, TEST_SECRET, 600).unwrap(),
    }
}

async fn record_exam(app: &TestApp, candidate_id: i64, wrong: &[i64]) -> i64 {
    let response = reqwest::Client::new()
        .post(format!("{}/api/exams", app.address))
        .bearer_auth(&app.token)
        .json(&serde_json::json!({
            "candidate_id": candidate_id,
            "exam_date": "2025-03-14",
            "wrong_question_ids": wrong,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    response.json::<serde_json::Value>().await.unwrap()["id"]
        .as_i64()
        .unwrap()
}

#[tokio::test]
async fn coverage_picks_simulation_containing_all_mistakes() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    app.repo.seed_questions(1..=100);

    // lacks question 9
    let partial = app.repo.seed_simulation(Some("B"), &[1, 5, 12, 20]);
    let covering = app.repo.seed_simulation(Some("A"), &[1, 5, 9, 12]);
    let later = app.repo.seed_simulation(Some("C"), &[5, 9]);
    assert!(partial < covering && covering < later);

    let candidate = app.repo.seed_candidate("Marko", "Marković", "0101990710012");
    let covered_exam = record_exam(&app, candidate, &[5, 9, 9]).await;
    record_exam(&app, candidate, &[]).await;
    record_exam(&app, candidate, &[77]).await;

    let body: serde_json::Value = client
        .get(format!("{}/api/exams/coverage", app.address))
        .bearer_auth(&app.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let matches = body["matches"].as_array().unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["exam_id"], covered_exam);
    assert_eq!(matches[0]["wrong_count"], 2);
    assert_eq!(matches[0]["simulation"]["id"], covering);
    assert_eq!(matches[0]["candidate"]["last_name"], "Marković");
}

#[tokio::test]
async fn single_exam_coverage() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    app.repo.seed_questions(1..=100);
    let simulation = app.repo.seed_simulation(None, &[1, 2, 3]);
    let candidate = app.repo.seed_candidate("Jelena", "Jovanović", "123");

    let covered = record_exam(&app, candidate, &[2, 3]).await;
    let uncovered = record_exam(&app, candidate, &[3, 4]).await;
    let clean = record_exam(&app, candidate, &[]).await;

    let get = |id: i64| {
        let client = client.clone();
        let url = format!("{}/api/exams/{}/coverage", app.address, id);
        let token = app.token.clone();
        async move {
            client
                .get(url)
                .bearer_auth(token)
                .send()
                .await
                .unwrap()
                .json::<serde_json::Value>()
                .await
                .unwrap()
        }
    };

    assert_eq!(get(covered).await["simulation"]["id"], simulation);
    assert!(get(uncovered).await["simulation"].is_null());

    let body = get(clean).await;
    assert!(body["simulation"].is_null());
    assert_eq!(body["wrong_count"], 0);

    let missing = client
        .get(format!("{}/api/exams/999999/coverage", app.address))
        .bearer_auth(&app.token)
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn exam_for_unknown_candidate_is_404() {
    let app = spawn_app().await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/exams", app.address))
        .bearer_auth(&app.token)
        .json(&serde_json::json!({
            "candidate_id": 4242,
            "exam_date": "2025-03-14",
            "wrong_question_ids": [1],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn exam_with_unknown_wrong_question_is_400() {
    let app = spawn_app().await;
    app.repo.seed_questions(1..=10);
    let candidate = app.repo.seed_candidate("Petar", "Petrović", "2");

    let response = reqwest::Client::new()
        .post(format!("{}/api/exams", app.address))
        .bearer_auth(&app.token)
        .json(&serde_json::json!({
            "candidate_id": candidate,
            "exam_date": "2025-03-14",
            "wrong_question_ids": [2, 4040],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("4040"));

    let exams: serde_json::Value = reqwest::Client::new()
        .get(format!("{}/api/exams/coverage", app.address))
        .bearer_auth(&app.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(exams["matches"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn wrong_question_report_applies_band() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    app.repo.seed_questions(1..=10);
    app.repo.classify_question(1, 500, 600);
    app.repo.classify_question(2, 500, 601);
    app.repo.classify_question(3, 501, 602);

    let candidate = app.repo.seed_candidate("Ana", "Anić", "1");
    record_exam(&app, candidate, &[1, 2, 3]).await;
    record_exam(&app, candidate, &[1, 2]).await;
    record_exam(&app, candidate, &[1]).await;

    let report: serde_json::Value = client
        .get(format!("{}/api/exams/wrong-questions?freq=2", app.address))
        .bearer_auth(&app.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let questions = report["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0]["question_id"], 2);
    assert_eq!(report["band"], "exactly_two");
    assert_eq!(report["area_counts"]["500"], 5);

    let report: serde_json::Value = client
        .get(format!("{}/api/exams/wrong-questions?area_id=500", app.address))
        .bearer_auth(&app.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<i64> = report["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["question_id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn import_needs_admin_role() {
    let app = spawn_app().await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/admin/import/questions", app.address))
        .bearer_auth(&app.token)
        .json(&serde_json::json!({ "items": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn import_empty_payload_is_400() {
    let app = spawn_app().await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/admin/import/questions", app.address))
        .bearer_auth(&app.admin_token)
        .json(&serde_json::json!({ "items": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Empty payload");
}

#[tokio::test]
async fn import_stores_good_items_and_reports_bad_ones() {
    let app = spawn_app().await;

    let payload = serde_json::json!({
        "items": [
            {
                "area": " Saobraćajni znakovi ",
                "subarea": "Znakovi opasnosti",
                "points": 2,
                "text": "Šta označava ovaj znak?",
                "image_url": "https://cdn.example.com/znak-1.png",
                "answers": [
                    { "text": "Opasna krivina", "is_correct": true },
                    { "text": "Opasna  krivina\r", "is_correct": false },
                    { "text": "Raskrsnica", "is_correct": false },
                    { "text": "Objašnjenje: znak upozorava na krivinu", "is_correct": false }
                ]
            },
            {
                "area": "Saobraćajni znakovi",
                "subarea": "Znakovi opasnosti",
                "text": "Koji znakovi su trouglastog oblika?",
                "answers": [
                    { "text": "Znakovi opasnosti", "is_correct": true },
                    { "text": "Znakovi izričitih naredbi", "is_correct": true },
                    { "text": "Znakovi obaveštenja", "is_correct": false }
                ]
            },
            {
                "area": "Saobraćajni znakovi",
                "subarea": "Znakovi opasnosti",
                "text": "Pitanje bez tačnog odgovora",
                "answers": [
                    { "text": "A", "is_correct": false },
                    { "text": "B", "is_correct": false }
                ]
            },
            {
                "area": "",
                "subarea": "X",
                "text": "Bez oblasti",
                "answers": []
            }
        ]
    });

    let response = reqwest::Client::new()
        .post(format!("{}/api/admin/import/questions", app.address))
        .bearer_auth(&app.admin_token)
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["ok"], 2);
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0]["index"], 2);
    assert_eq!(errors[0]["text"], "Pitanje bez tačnog odgovora");
    assert_eq!(errors[1]["index"], 3);

    assert_eq!(app.repo.question_count(), 2);
    assert_eq!(app.repo.area_names(), vec!["Saobraćajni znakovi".to_string()]);
    assert_eq!(app.repo.subarea_count(), 1);

    // duplicates merged (correct wins), explanation line dropped
    let (sign, multi_correct) = app.repo.question_by_text("Šta označava ovaj znak?").unwrap();
    assert!(!multi_correct);
    assert_eq!(
        app.repo.answers_of(sign),
        vec![
            ("Opasna krivina".to_string(), true),
            ("Raskrsnica".to_string(), false),
        ]
    );

    let (shapes, multi_correct) = app.repo.question_by_text("Koji znakovi su trouglastog oblika?").unwrap();
    assert!(multi_correct);
    assert_eq!(app.repo.answers_of(shapes).len(), 3);
}

#[tokio::test]
async fn import_keeps_text_as_typed() {
    let app = spawn_app().await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/admin/import/questions", app.address))
        .bearer_auth(&app.admin_token)
        .json(&serde_json::json!({
            "items": [{
                "area": "Brzina",
                "subarea": "Ograničenja",
                "text": "Brzina > 50 km/h & kiša: šta važi?",
                "answers": [
                    { "text": "a < b", "is_correct": true },
                    { "text": "<b>a</b> > b", "is_correct": false }
                ]
            }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let (id, _) = app.repo.question_by_text("Brzina > 50 km/h & kiša: šta važi?").unwrap();
    assert_eq!(
        app.repo.answers_of(id),
        vec![("a < b".to_string(), true), ("a > b".to_string(), false)]
    );
}

#[tokio::test]
async fn malformed_items_fail_one_by_one() {
    let app = spawn_app().await;
    let answers = serde_json::json!([
        { "text": "Da", "is_correct": true },
        { "text": "Ne", "is_correct": false }
    ]);

    let response = reqwest::Client::new()
        .post(format!("{}/api/admin/import/questions", app.address))
        .bearer_auth(&app.admin_token)
        .json(&serde_json::json!({
            "items": [
                { "area": "A", "subarea": "B", "text": null, "answers": answers },
                { "area": "A", "subarea": "B", "text": "Pola poena", "points": 1.5, "answers": answers },
                { "area": "A", "subarea": "B", "text": "Tekstualni poeni", "points": "3", "answers": answers },
                { "area": "A", "subarea": "B", "text": "Loši odgovori", "answers": "Da" }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["ok"], 1);
    let failed: Vec<i64> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["index"].as_i64().unwrap())
        .collect();
    assert_eq!(failed, vec![0, 1, 3]);
    assert!(app.repo.question_by_text("Tekstualni poeni").is_some());
}

#[tokio::test]
async fn import_with_only_failures_is_400() {
    let app = spawn_app().await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/admin/import/questions", app.address))
        .bearer_auth(&app.admin_token)
        .json(&serde_json::json!({
            "items": [{
                "area": "A",
                "subarea": "B",
                "text": "Q",
                "image_url": "ftp://example.com/x.png",
                "answers": [
                    { "text": "Da", "is_correct": true },
                    { "text": "Ne", "is_correct": false }
                ]
            }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["ok"], 0);
    assert_eq!(app.repo.question_count(), 0);
}
