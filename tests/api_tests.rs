// tests/api_tests.rs

use std::sync::Arc;

use simulations::{
    config::Config,
    routes,
    state::AppState,
    store::{MemoryRepository, Repository},
    utils::{
        jwt::{ADMIN_ROLE, sign_jwt},
        password::hash_password,
    },
};

const TEST_SECRET: &str = "test_secret_for_integration_tests";

struct TestApp {
    address: String,
    repo: Arc<MemoryRepository>,
    token: String,
}

/// Spawns the app on a random port, backed by an in-memory store.
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

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let token = sign_jwt(1, "instructor", TEST_SECRET, 600).unwrap();

    TestApp { address, repo, token }
}

fn full_set() -> Vec<i64> {
    (1..=41).collect()
}

#[tokio::test]
async fn unknown_path_is_404() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn login_returns_token_that_opens_protected_routes() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let username = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let hash = hash_password("password123").unwrap();
    app.repo.create_user(&username, &hash, ADMIN_ROLE).await.unwrap();

    let login: serde_json::Value = client
        .post(format!("{}/api/auth/login", app.address))
        .json(&serde_json::json!({ "username": username, "password": "password123" }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .expect("Failed to parse login json");

    let token = login["token"].as_str().expect("Token not found");
    assert_eq!(login["role"], "admin");

    let response = client
        .get(format!("{}/api/simulations", app.address))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn login_with_wrong_password_is_401() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let hash = hash_password("password123").unwrap();
    app.repo.create_user("instruktor", &hash, "instructor").await.unwrap();

    let response = client
        .post(format!("{}/api/auth/login", app.address))
        .json(&serde_json::json!({ "username": "instruktor", "password": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/simulations/duplicates", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let response = client
        .get(format!("{}/api/simulations/duplicates", app.address))
        .bearer_auth("garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn create_simulation_then_reject_same_set() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    app.repo.seed_questions(1..=100);

    let created = client
        .post(format!("{}/api/simulations", app.address))
        .bearer_auth(&app.token)
        .json(&serde_json::json!({ "title": "  Serija A-1 ", "question_ids": full_set() }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status().as_u16(), 201);
    let id = created.json::<serde_json::Value>().await.unwrap()["id"].as_i64().unwrap();

    // same questions, different order
    let reversed: Vec<i64> = full_set().into_iter().rev().collect();
    let duplicate = client
        .post(format!("{}/api/simulations", app.address))
        .bearer_auth(&app.token)
        .json(&serde_json::json!({ "question_ids": reversed }))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status().as_u16(), 409);
    let body: serde_json::Value = duplicate.json().await.unwrap();
    assert_eq!(body["duplicate_of"], id);

    // one question swapped for another
    let mut changed: Vec<i64> = (1..=40).collect();
    changed.push(99);
    let other = client
        .post(format!("{}/api/simulations", app.address))
        .bearer_auth(&app.token)
        .json(&serde_json::json!({ "question_ids": changed }))
        .send()
        .await
        .unwrap();
    assert_eq!(other.status().as_u16(), 201);

    let detail: serde_json::Value = client
        .get(format!("{}/api/simulations/{}", app.address, id))
        .bearer_auth(&app.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["title"], "Serija A-1");
    assert_eq!(detail["total_points"], 41);
    assert_eq!(detail["questions"].as_array().unwrap().len(), 41);
    assert_eq!(detail["questions"][0]["question_id"], 1);
    assert_eq!(detail["questions"][40]["order_index"], 40);
}

#[tokio::test]
async fn create_simulation_validates_shape() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    app.repo.seed_questions(1..=100);

    let forty: Vec<i64> = (1..=40).collect();
    let response = client
        .post(format!("{}/api/simulations", app.address))
        .bearer_auth(&app.token)
        .json(&serde_json::json!({ "question_ids": forty }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let mut repeated: Vec<i64> = (1..=40).collect();
    repeated.push(3);
    let response = client
        .post(format!("{}/api/simulations", app.address))
        .bearer_auth(&app.token)
        .json(&serde_json::json!({ "question_ids": repeated }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let mut unknown: Vec<i64> = (1..=40).collect();
    unknown.push(5000);
    let response = client
        .post(format!("{}/api/simulations", app.address))
        .bearer_auth(&app.token)
        .json(&serde_json::json!({ "question_ids": unknown }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("5000"));

    let simulations: Vec<serde_json::Value> = client
        .get(format!("{}/api/simulations", app.address))
        .bearer_auth(&app.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(simulations.is_empty());
}

#[tokio::test]
async fn check_endpoint_reports_existing_duplicate() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    app.repo.seed_questions(1..=100);
    let existing = app.repo.seed_simulation(Some("A"), &full_set());
    app.repo.seed_simulation(Some("superset"), &(1..=45).collect::<Vec<_>>());

    let body: serde_json::Value = client
        .post(format!("{}/api/simulations/check", app.address))
        .bearer_auth(&app.token)
        .json(&serde_json::json!({ "question_ids": full_set() }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["duplicate_of"], existing);

    let fresh: Vec<i64> = (50..=90).collect();
    let body: serde_json::Value = client
        .post(format!("{}/api/simulations/check", app.address))
        .bearer_auth(&app.token)
        .json(&serde_json::json!({ "question_ids": fresh }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(body["duplicate_of"].is_null());
}

#[tokio::test]
async fn duplicate_groups_and_skipped() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    app.repo.seed_questions(1..=100);

    let mut reversed: Vec<i64> = full_set().into_iter().rev().collect();
    reversed.push(1);
    let first = app.repo.seed_simulation(None, &full_set());
    let second = app.repo.seed_simulation(None, &reversed);
    let incomplete = app.repo.seed_simulation(None, &(1..=40).collect::<Vec<_>>());
    app.repo.seed_simulation(None, &(50..=90).collect::<Vec<_>>());
    let empty = app.repo.seed_simulation(None, &[]);

    let body: serde_json::Value = client
        .get(format!("{}/api/simulations/duplicates", app.address))
        .bearer_auth(&app.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["total"], 5);
    assert_eq!(body["groups"], serde_json::json!([[first, second]]));
    assert_eq!(body["skipped"], serde_json::json!([incomplete, empty]));
}

#[tokio::test]
async fn question_usage_is_sorted_by_count() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    app.repo.seed_questions(1..=10);
    let area = app.repo.upsert_area("Saobraćajni znakovi").await.unwrap();
    let subarea = app.repo.upsert_subarea(area, "Znakovi opasnosti").await.unwrap();
    for question_id in [3, 4, 7] {
        app.repo.classify_question(question_id, area, subarea);
    }

    app.repo.seed_simulation(None, &[1, 2, 3]);
    app.repo.seed_simulation(None, &[3, 4]);
    app.repo.seed_simulation(None, &[3, 4, 5]);

    let report: serde_json::Value = client
        .get(format!("{}/api/simulations/questions", app.address))
        .bearer_auth(&app.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let usage = report["questions"].as_array().unwrap();
    assert_eq!(usage[0]["question_id"], 3);
    assert_eq!(usage[0]["simulations_count"], 3);
    assert_eq!(usage[0]["area_id"], area);
    assert_eq!(usage[1]["question_id"], 4);
    assert_eq!(usage.len(), 5);

    // question 7 is filed but not used
    assert_eq!(report["areas"][0]["total"], 3);
    assert_eq!(report["areas"][0]["used"], 2);
    assert_eq!(report["subareas"][0]["id"], subarea);
    assert_eq!(report["subareas"][0]["used"], 2);

    let filtered: serde_json::Value = client
        .get(format!("{}/api/simulations/questions?area_id={}", app.address, area))
        .bearer_auth(&app.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<i64> = filtered["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["question_id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![3, 4]);
}

#[tokio::test]
async fn concurrent_creates_of_one_set_store_it_once() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    app.repo.seed_questions(1..=100);

    let create = |question_ids: Vec<i64>| {
        client
            .post(format!("{}/api/simulations", app.address))
            .bearer_auth(&app.token)
            .json(&serde_json::json!({ "question_ids": question_ids }))
            .send()
    };

    let (first, second) = tokio::join!(
        create(full_set()),
        create(full_set().into_iter().rev().collect())
    );
    let mut statuses = vec![
        first.unwrap().status().as_u16(),
        second.unwrap().status().as_u16(),
    ];
    statuses.sort_unstable();

    assert_eq!(statuses, vec![201, 409]);
    assert_eq!(app.repo.list_simulations().await.unwrap().len(), 1);
}

#[tokio::test]
async fn store_failure_is_a_500() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    app.repo.set_unavailable(true);

    let response = client
        .get(format!("{}/api/simulations/duplicates", app.address))
        .bearer_auth(&app.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Internal Server Error");
}

#[tokio::test]
async fn missing_simulation_is_404() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/simulations/424242", app.address))
        .bearer_auth(&app.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}
