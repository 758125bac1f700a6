#[cfg(test)]
mod integration_tests {
    use crate::test_utils::test_utils::{
        create_project, register_user, server_for, setup_test_app_state,
        setup_test_app_state_with, setup_test_server, test_config, with_session,
        StubPlatformClient,
    };
    use axum::http::{header, HeaderName, HeaderValue, StatusCode};
    use axum_test::TestServer;
    use chrono::Utc;
    use model::entities::{integration, keyword, user};
    use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
    use serde_json::{json, Value};
    use std::{fs, io::Cursor, time::Duration};
    use url::Url;
    use uuid::Uuid;

    async fn create_keyword(server: &TestServer, token: &str, body: Value) -> Value {
        let response = with_session(server.post("/api/keywords"), token).json(&body).await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["data"].clone()
    }

    async fn attach_integration(server: &TestServer, token: &str, body: Value) -> Value {
        let response = with_session(server.post("/api/integrations"), token)
            .json(&body)
            .await;
        assert!(
            response.status_code() == StatusCode::CREATED || response.status_code() == StatusCode::OK,
            "unexpected status {}: {}",
            response.status_code(),
            response.text()
        );
        response.json::<Value>()["data"].clone()
    }

    fn integration_key_header(key: &str) -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static("x-integration-key"),
            HeaderValue::from_str(key).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = setup_test_server().await;

        let response = server.get("/health").await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "connected");
    }

    #[tokio::test]
    async fn test_health_check_reports_unreachable_database() {
        let state = setup_test_app_state().await;
        state.db.clone().close().await.unwrap();
        let server = server_for(state);

        let response = server.get("/health").await;

        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = response.json();
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["database"], "disconnected");
    }

    // Auth

    #[tokio::test]
    async fn test_register_login_and_logout() {
        let server = setup_test_server().await;

        let response = server
            .post("/api/auth/register")
            .json(&json!({ "email": "Ada@Example.com", "password": "correct horse battery", "name": "Ada" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let set_cookie = response.header(header::SET_COOKIE);
        assert!(set_cookie.to_str().unwrap().starts_with("seoflow_session="));
        let body: Value = response.json();
        assert_eq!(body["data"]["user"]["email"], "ada@example.com");

        let response = server
            .post("/api/auth/login")
            .json(&json!({ "email": "ada@example.com", "password": "correct horse battery" }))
            .await;
        response.assert_status(StatusCode::OK);
        let token = response.json::<Value>()["data"]["token"].as_str().unwrap().to_string();

        let session = with_session(server.get("/api/auth/session"), &token).await;
        session.assert_status(StatusCode::OK);
        assert_eq!(session.json::<Value>()["data"]["name"], "Ada");

        let accounts = with_session(server.get("/api/auth/accounts"), &token).await;
        accounts.assert_status(StatusCode::OK);
        let accounts: Value = accounts.json();
        assert_eq!(accounts["data"][0]["provider"], "credentials");
        assert_eq!(accounts["data"][0]["provider_account_id"], "ada@example.com");

        let logout = with_session(server.post("/api/auth/logout"), &token).await;
        logout.assert_status(StatusCode::OK);
        assert!(logout.header(header::SET_COOKIE).to_str().unwrap().contains("Max-Age=0"));

        let after = with_session(server.get("/api/auth/session"), &token).await;
        after.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_session_cookie_is_accepted() {
        let server = setup_test_server().await;
        let token = register_user(&server, "cookie@example.com").await;

        let response = server
            .get("/api/auth/session")
            .add_header(
                header::COOKIE,
                HeaderValue::from_str(&format!("seoflow_session={}", token)).unwrap(),
            )
            .await;

        response.assert_status(StatusCode::OK);
    }

    #[tokio::test]
    async fn test_duplicate_registration_and_bad_login() {
        let server = setup_test_server().await;
        register_user(&server, "dup@example.com").await;

        let response = server
            .post("/api/auth/register")
            .json(&json!({ "email": "dup@example.com", "password": "another password" }))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        assert_eq!(response.json::<Value>()["code"], "CONFLICT");

        let response = server
            .post("/api/auth/login")
            .json(&json!({ "email": "dup@example.com", "password": "wrong password" }))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_registration_conflicts_on_existing_row() {
        let state = setup_test_app_state().await;
        user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set("taken@example.com".to_string()),
            name: Set(None),
            password_hash: Set("$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(&state.db)
        .await
        .unwrap();
        let db = state.db.clone();
        let server = server_for(state);

        let response = server
            .post("/api/auth/register")
            .json(&json!({ "email": "Taken@example.com", "password": "correct horse battery" }))
            .await;

        response.assert_status(StatusCode::CONFLICT);
        assert_eq!(response.json::<Value>()["code"], "CONFLICT");
        assert_eq!(user::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_logout_ignores_foreign_tokens() {
        let state = setup_test_app_state().await;
        let revoked = state.revoked_sessions.clone();
        let server = server_for(state);

        let response = with_session(server.post("/api/auth/logout"), "bogus-token").await;

        response.assert_status(StatusCode::OK);
        assert!(!revoked.contains_key("bogus-token"));

        let token = register_user(&server, "leaver@example.com").await;
        with_session(server.post("/api/auth/logout"), &token)
            .await
            .assert_status(StatusCode::OK);
        assert!(revoked.contains_key(&token));
    }

    #[tokio::test]
    async fn test_registration_is_validated() {
        let server = setup_test_server().await;

        let response = server
            .post("/api/auth/register")
            .json(&json!({ "email": "not-an-email", "password": "short" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["success"], false);
        assert!(body["details"]["email"].is_array());
        assert!(body["details"]["password"].is_array());
    }

    #[tokio::test]
    async fn test_unauthenticated_requests_are_rejected_without_writes() {
        let state = setup_test_app_state().await;
        let db = state.db.clone();
        let server = server_for(state);

        let response = server.get("/api/projects").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["code"], "UNAUTHORIZED");

        let response = server
            .post("/api/keywords")
            .json(&json!({ "project_id": Uuid::new_v4(), "keyword": "best running shoes" }))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        let response = server
            .post("/api/keywords")
            .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer forged.token.value"))
            .json(&json!({ "project_id": Uuid::new_v4(), "keyword": "best running shoes" }))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        assert_eq!(keyword::Entity::find().count(&db).await.unwrap(), 0);
    }

    // Projects

    #[tokio::test]
    async fn test_project_crud() {
        let server = setup_test_server().await;
        let token = register_user(&server, "owner@example.com").await;

        let response = with_session(server.post("/api/projects"), &token)
            .json(&json!({
                "name": "Running blog",
                "website_url": "https://run.example.com",
                "brand_voice": { "tone": "friendly" }
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let project: Value = response.json::<Value>()["data"].clone();
        assert_eq!(project["language"], "en");
        assert_eq!(project["onboarding_completed"], false);
        let project_id = project["id"].as_str().unwrap().to_string();

        let response = with_session(server.patch(&format!("/api/projects/{}", project_id)), &token)
            .json(&json!({ "name": "Trail blog", "brand_voice": null, "onboarding_completed": true }))
            .await;
        response.assert_status(StatusCode::OK);
        let updated: Value = response.json::<Value>()["data"].clone();
        assert_eq!(updated["name"], "Trail blog");
        assert!(updated["brand_voice"].is_null());
        assert_eq!(updated["onboarding_completed"], true);

        let list = with_session(server.get("/api/projects"), &token).await;
        list.assert_status(StatusCode::OK);
        assert_eq!(list.json::<Value>()["data"].as_array().unwrap().len(), 1);

        let response = with_session(server.delete(&format!("/api/projects/{}", project_id)), &token).await;
        response.assert_status(StatusCode::OK);

        let response = with_session(server.get(&format!("/api/projects/{}", project_id)), &token).await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_project_rejects_invalid_url() {
        let server = setup_test_server().await;
        let token = register_user(&server, "owner@example.com").await;

        let response = with_session(server.post("/api/projects"), &token)
            .json(&json!({ "name": "Broken", "website_url": "not a url" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.json::<Value>()["details"]["website_url"].is_array());
    }

    #[tokio::test]
    async fn test_foreign_resources_are_not_found() {
        let server = setup_test_server().await;
        let alice = register_user(&server, "alice@example.com").await;
        let mallory = register_user(&server, "mallory@example.com").await;

        let project_id = create_project(&server, &alice, "Alice's site").await;
        let keyword = create_keyword(
            &server,
            &alice,
            json!({ "project_id": project_id, "keyword": "alice keyword" }),
        )
        .await;
        let keyword_id = keyword["id"].as_str().unwrap();

        let response = with_session(server.get(&format!("/api/projects/{}", project_id)), &mallory).await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json::<Value>()["code"], "NOT_FOUND");

        let response = with_session(server.get(&format!("/api/keywords/{}", keyword_id)), &mallory).await;
        response.assert_status(StatusCode::NOT_FOUND);

        let response = with_session(server.delete(&format!("/api/keywords/{}", keyword_id)), &mallory).await;
        response.assert_status(StatusCode::NOT_FOUND);

        let response = with_session(server.get("/api/keywords"), &mallory)
            .add_query_param("project_id", &project_id)
            .await;
        response.assert_status(StatusCode::NOT_FOUND);

        let response = with_session(server.post("/api/keywords"), &mallory)
            .json(&json!({ "project_id": project_id, "keyword": "sneaky" }))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);

        // Alice still sees her keyword
        let response = with_session(server.get(&format!("/api/keywords/{}", keyword_id)), &alice).await;
        response.assert_status(StatusCode::OK);
    }

    #[tokio::test]
    async fn test_project_stats() {
        let server = setup_test_server().await;
        let token = register_user(&server, "stats@example.com").await;
        let project_id = create_project(&server, &token, "Stats").await;

        create_keyword(&server, &token, json!({ "project_id": project_id, "keyword": "a", "starred": true })).await;
        create_keyword(
            &server,
            &token,
            json!({ "project_id": project_id, "keyword": "b", "planned_date": "2024-07-01" }),
        )
        .await;
        with_session(server.post("/api/articles"), &token)
            .json(&json!({ "project_id": project_id, "title": "Draft", "content": "one two" }))
            .await
            .assert_status(StatusCode::CREATED);
        with_session(server.post("/api/backlinks"), &token)
            .json(&json!({
                "project_id": project_id,
                "source_url": "https://news.example.org/post",
                "target_url": "https://run.example.com/"
            }))
            .await
            .assert_status(StatusCode::CREATED);
        attach_integration(&server, &token, json!({ "project_id": project_id, "platform": "webflow" })).await;

        let response = with_session(server.get(&format!("/api/projects/{}/stats", project_id)), &token).await;
        response.assert_status(StatusCode::OK);
        let stats: Value = response.json::<Value>()["data"].clone();
        assert_eq!(stats["keywords"]["total"], 2);
        assert_eq!(stats["keywords"]["unplanned"], 1);
        assert_eq!(stats["keywords"]["planned"], 1);
        assert_eq!(stats["keywords"]["starred"], 1);
        assert_eq!(stats["articles"]["draft"], 1);
        assert_eq!(stats["backlinks"]["pending"], 1);
        assert_eq!(stats["integrations"], 1);
    }

    // Keywords

    #[tokio::test]
    async fn test_create_keyword_defaults() {
        let server = setup_test_server().await;
        let token = register_user(&server, "kw@example.com").await;
        let project_id = create_project(&server, &token, "Shoes").await;

        let response = with_session(server.post("/api/keywords"), &token)
            .json(&json!({ "project_id": project_id, "keyword": "best running shoes" }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert!(body["success"].as_bool().unwrap());
        assert_eq!(body["data"]["keyword"], "best running shoes");
        assert_eq!(body["data"]["status"], "unplanned");
        assert_eq!(body["data"]["starred"], false);
        assert!(body["data"]["planned_date"].is_null());
    }

    #[tokio::test]
    async fn test_keyword_difficulty_is_bounded() {
        let server = setup_test_server().await;
        let token = register_user(&server, "kw@example.com").await;
        let project_id = create_project(&server, &token, "Shoes").await;

        let response = with_session(server.post("/api/keywords"), &token)
            .json(&json!({ "project_id": project_id, "keyword": "hard", "difficulty": 150 }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.json::<Value>()["details"]["difficulty"].is_array());
    }

    #[tokio::test]
    async fn test_keyword_filters_combine() {
        let server = setup_test_server().await;
        let token = register_user(&server, "filters@example.com").await;
        let project_id = create_project(&server, &token, "Filters").await;

        let matching = [
            ("foo trail shoes", "2024-08-01"),
            ("Foo road shoes", "2024-07-01"),
        ];
        for (text, date) in matching {
            create_keyword(
                &server,
                &token,
                json!({ "project_id": project_id, "keyword": text, "planned_date": date, "starred": true }),
            )
            .await;
        }
        // Each of these misses exactly one filter
        create_keyword(
            &server,
            &token,
            json!({ "project_id": project_id, "keyword": "foo unstarred", "planned_date": "2024-06-01" }),
        )
        .await;
        create_keyword(
            &server,
            &token,
            json!({ "project_id": project_id, "keyword": "foo unplanned", "starred": true }),
        )
        .await;
        create_keyword(
            &server,
            &token,
            json!({ "project_id": project_id, "keyword": "bar planned", "planned_date": "2024-06-01", "starred": true }),
        )
        .await;

        let response = with_session(server.get("/api/keywords"), &token)
            .add_query_param("project_id", &project_id)
            .add_query_param("status", "planned")
            .add_query_param("starred", "true")
            .add_query_param("search", "foo")
            .await;

        response.assert_status(StatusCode::OK);
        let keywords: Vec<String> = response.json::<Value>()["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|k| k["keyword"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(keywords, vec!["Foo road shoes", "foo trail shoes"]);
    }

    #[tokio::test]
    async fn test_keyword_search_treats_wildcards_literally() {
        let server = setup_test_server().await;
        let token = register_user(&server, "literal@example.com").await;
        let project_id = create_project(&server, &token, "Literal").await;

        for text in ["100% cotton", "1000 cotton", "a_b", "axb"] {
            create_keyword(&server, &token, json!({ "project_id": project_id, "keyword": text })).await;
        }

        for (search, expected) in [("100%", "100% cotton"), ("a_b", "a_b")] {
            let response = with_session(server.get("/api/keywords"), &token)
                .add_query_param("project_id", &project_id)
                .add_query_param("search", search)
                .await;

            response.assert_status(StatusCode::OK);
            let keywords: Vec<String> = response.json::<Value>()["data"]
                .as_array()
                .unwrap()
                .iter()
                .map(|k| k["keyword"].as_str().unwrap().to_string())
                .collect();
            assert_eq!(keywords, vec![expected], "search {:?}", search);
        }
    }

    #[tokio::test]
    async fn test_keyword_ordering() {
        let server = setup_test_server().await;
        let token = register_user(&server, "order@example.com").await;
        let project_id = create_project(&server, &token, "Order").await;

        for body in [
            json!({ "project_id": project_id, "keyword": "old undated" }),
            json!({ "project_id": project_id, "keyword": "late", "planned_date": "2024-09-01" }),
            json!({ "project_id": project_id, "keyword": "starred undated", "starred": true }),
            json!({ "project_id": project_id, "keyword": "early", "planned_date": "2024-05-01" }),
            json!({ "project_id": project_id, "keyword": "new undated" }),
        ] {
            create_keyword(&server, &token, body).await;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let response = with_session(server.get("/api/keywords"), &token)
            .add_query_param("project_id", &project_id)
            .await;

        response.assert_status(StatusCode::OK);
        let keywords: Vec<String> = response.json::<Value>()["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|k| k["keyword"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            keywords,
            vec!["starred undated", "early", "late", "new undated", "old undated"]
        );
    }

    #[tokio::test]
    async fn test_planned_date_moves_keyword_status() {
        let server = setup_test_server().await;
        let token = register_user(&server, "plan@example.com").await;
        let project_id = create_project(&server, &token, "Plan").await;
        let keyword = create_keyword(&server, &token, json!({ "project_id": project_id, "keyword": "plan me" })).await;
        let path = format!("/api/keywords/{}", keyword["id"].as_str().unwrap());

        let response = with_session(server.patch(&path), &token)
            .json(&json!({ "planned_date": "2024-10-01" }))
            .await;
        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["data"]["status"], "planned");
        assert_eq!(body["data"]["planned_date"], "2024-10-01");

        // Fields not sent stay untouched
        let response = with_session(server.patch(&path), &token)
            .json(&json!({ "starred": true }))
            .await;
        let body: Value = response.json();
        assert_eq!(body["data"]["planned_date"], "2024-10-01");
        assert_eq!(body["data"]["starred"], true);

        let response = with_session(server.patch(&path), &token)
            .json(&json!({ "planned_date": null }))
            .await;
        let body: Value = response.json();
        assert_eq!(body["data"]["status"], "unplanned");
        assert!(body["data"]["planned_date"].is_null());

        // An explicit status wins over the date rule
        let response = with_session(server.patch(&path), &token)
            .json(&json!({ "planned_date": "2024-11-01", "status": "used" }))
            .await;
        assert_eq!(response.json::<Value>()["data"]["status"], "used");
    }

    #[tokio::test]
    async fn test_bulk_keywords_skip_duplicates() {
        let server = setup_test_server().await;
        let token = register_user(&server, "bulk@example.com").await;
        let project_id = create_project(&server, &token, "Bulk").await;
        create_keyword(&server, &token, json!({ "project_id": project_id, "keyword": "Existing" })).await;

        let response = with_session(server.post("/api/keywords/bulk"), &token)
            .json(&json!({
                "project_id": project_id,
                "keywords": [
                    { "keyword": "existing" },
                    { "keyword": "fresh one", "search_volume": 1200, "difficulty": 35 },
                    { "keyword": "Fresh One" },
                    { "keyword": "fresh two" }
                ]
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let created = response.json::<Value>()["data"].as_array().unwrap().clone();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0]["keyword"], "fresh one");
        assert_eq!(created[0]["search_volume"], 1200);

        let response = with_session(server.post("/api/keywords/bulk"), &token)
            .json(&json!({ "project_id": project_id, "keywords": [] }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    // Articles

    #[tokio::test]
    async fn test_article_lifecycle() {
        let server = setup_test_server().await;
        let token = register_user(&server, "writer@example.com").await;
        let project_id = create_project(&server, &token, "Writing").await;
        let keyword = create_keyword(&server, &token, json!({ "project_id": project_id, "keyword": "trail tips" })).await;
        let keyword_id = keyword["id"].as_str().unwrap().to_string();

        let response = with_session(server.post("/api/articles"), &token)
            .json(&json!({
                "project_id": project_id,
                "keyword_id": keyword_id,
                "title": "Trail tips",
                "content": "<p>Run <em>slow</em> uphill</p>"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let article: Value = response.json::<Value>()["data"].clone();
        assert_eq!(article["word_count"], 3);
        assert_eq!(article["status"], "draft");
        let article_path = format!("/api/articles/{}", article["id"].as_str().unwrap());

        let response = with_session(server.get(&format!("/api/keywords/{}", keyword_id)), &token).await;
        assert_eq!(response.json::<Value>()["data"]["status"], "used");

        let response = with_session(server.patch(&article_path), &token)
            .json(&json!({ "status": "scheduled" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = with_session(server.patch(&article_path), &token)
            .json(&json!({ "content": "one two three four five", "status": "published" }))
            .await;
        response.assert_status(StatusCode::OK);
        let published: Value = response.json::<Value>()["data"].clone();
        assert_eq!(published["word_count"], 5);
        assert_eq!(published["status"], "published");
        assert!(published["published_at"].is_string());

        let response = with_session(server.get("/api/articles"), &token)
            .add_query_param("project_id", &project_id)
            .add_query_param("status", "draft")
            .await;
        assert!(response.json::<Value>()["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_article_keyword_must_share_project() {
        let server = setup_test_server().await;
        let token = register_user(&server, "writer@example.com").await;
        let first = create_project(&server, &token, "First").await;
        let second = create_project(&server, &token, "Second").await;
        let keyword = create_keyword(&server, &token, json!({ "project_id": first, "keyword": "first only" })).await;

        let response = with_session(server.post("/api/articles"), &token)
            .json(&json!({
                "project_id": second,
                "keyword_id": keyword["id"],
                "title": "Mismatch"
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_scheduled_article_needs_date() {
        let server = setup_test_server().await;
        let token = register_user(&server, "writer@example.com").await;
        let project_id = create_project(&server, &token, "Schedule").await;

        let response = with_session(server.post("/api/articles"), &token)
            .json(&json!({ "project_id": project_id, "title": "Later", "status": "scheduled" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = with_session(server.post("/api/articles"), &token)
            .json(&json!({
                "project_id": project_id,
                "title": "Later",
                "status": "scheduled",
                "scheduled_at": "2030-01-01T09:00:00Z"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        assert!(response.json::<Value>()["data"]["published_at"].is_null());
    }

    #[tokio::test]
    async fn test_deleting_keyword_keeps_article() {
        let server = setup_test_server().await;
        let token = register_user(&server, "writer@example.com").await;
        let project_id = create_project(&server, &token, "Keep").await;
        let keyword = create_keyword(&server, &token, json!({ "project_id": project_id, "keyword": "gone soon" })).await;

        let response = with_session(server.post("/api/articles"), &token)
            .json(&json!({ "project_id": project_id, "keyword_id": keyword["id"], "title": "Survivor" }))
            .await;
        let article_path = format!("/api/articles/{}", response.json::<Value>()["data"]["id"].as_str().unwrap());

        with_session(server.delete(&format!("/api/keywords/{}", keyword["id"].as_str().unwrap())), &token)
            .await
            .assert_status(StatusCode::OK);

        let response = with_session(server.get(&article_path), &token).await;
        response.assert_status(StatusCode::OK);
        assert!(response.json::<Value>()["data"]["keyword_id"].is_null());
    }

    // Backlinks

    #[tokio::test]
    async fn test_backlink_crud() {
        let server = setup_test_server().await;
        let token = register_user(&server, "links@example.com").await;
        let project_id = create_project(&server, &token, "Links").await;

        let response = with_session(server.post("/api/backlinks"), &token)
            .json(&json!({
                "project_id": project_id,
                "source_url": "not a url",
                "target_url": "https://run.example.com/"
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = with_session(server.post("/api/backlinks"), &token)
            .json(&json!({
                "project_id": project_id,
                "source_url": "https://news.example.org/roundup",
                "target_url": "https://run.example.com/",
                "anchor_text": "great running blog"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let backlink: Value = response.json::<Value>()["data"].clone();
        assert_eq!(backlink["status"], "pending");
        let path = format!("/api/backlinks/{}", backlink["id"].as_str().unwrap());

        let response = with_session(server.patch(&path), &token)
            .json(&json!({ "status": "published", "anchor_text": null }))
            .await;
        response.assert_status(StatusCode::OK);
        let updated: Value = response.json::<Value>()["data"].clone();
        assert_eq!(updated["status"], "published");
        assert!(updated["anchor_text"].is_null());

        let response = with_session(server.get("/api/backlinks"), &token)
            .add_query_param("project_id", &project_id)
            .add_query_param("status", "published")
            .await;
        assert_eq!(response.json::<Value>()["data"].as_array().unwrap().len(), 1);

        with_session(server.delete(&path), &token).await.assert_status(StatusCode::OK);
        with_session(server.get(&path), &token).await.assert_status(StatusCode::NOT_FOUND);
    }

    // Integrations

    #[tokio::test]
    async fn test_attach_integration_upserts() {
        let state = setup_test_app_state().await;
        let db = state.db.clone();
        let server = server_for(state);
        let token = register_user(&server, "int@example.com").await;
        let project_id = create_project(&server, &token, "Shop").await;

        let response = with_session(server.post("/api/integrations"), &token)
            .json(&json!({
                "project_id": project_id,
                "platform": "shopify",
                "credentials": { "shop_domain": "runs.myshopify.com", "access_token": "shpat_secret_1234" }
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let first: Value = response.json::<Value>()["data"].clone();
        assert!(first["integration_key"].as_str().unwrap().starts_with("sfk_"));
        assert_eq!(first["credentials"]["access_token"], "****1234");
        assert_eq!(first["is_active"], true);

        let response = with_session(server.post("/api/integrations"), &token)
            .json(&json!({
                "project_id": project_id,
                "platform": "shopify",
                "credentials": { "api_version": "2024-04" }
            }))
            .await;
        response.assert_status(StatusCode::OK);
        let second: Value = response.json::<Value>()["data"].clone();
        assert_eq!(second["id"], first["id"]);
        assert_eq!(second["integration_key"], first["integration_key"]);
        assert_eq!(second["credentials"]["shop_domain"], "runs.myshopify.com");
        assert_eq!(second["credentials"]["api_version"], "2024-04");
        assert_eq!(second["credentials"]["access_token"], "****1234");

        assert_eq!(integration::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_credentials_must_fit_platform() {
        let server = setup_test_server().await;
        let token = register_user(&server, "int@example.com").await;
        let project_id = create_project(&server, &token, "Shop").await;

        let response = with_session(server.post("/api/integrations"), &token)
            .json(&json!({
                "project_id": project_id,
                "platform": "webflow",
                "credentials": { "shop_domain": "runs.myshopify.com" }
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = with_session(server.post("/api/integrations"), &token)
            .json(&json!({
                "project_id": project_id,
                "platform": "wordpress",
                "credentials": { "platform": "shopify" }
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_credentials_need_platform_fields() {
        let server = setup_test_server().await;
        let token = register_user(&server, "fields@example.com").await;
        let project_id = create_project(&server, &token, "Fields").await;

        let response = with_session(server.post("/api/integrations"), &token)
            .json(&json!({
                "project_id": project_id,
                "platform": "shopify",
                "credentials": { "access_token": "shpat_secret_1234" }
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = with_session(server.post("/api/integrations"), &token)
            .json(&json!({
                "project_id": project_id,
                "platform": "wordpress",
                "credentials": { "site_url": "https://blog.example.com", "refresh_token": "forged" }
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let integration = attach_integration(
            &server,
            &token,
            json!({ "project_id": project_id, "platform": "wordpress", "credentials": { "site_url": "https://blog.example.com" } }),
        )
        .await;
        let path = format!("/api/integrations/{}", integration["id"].as_str().unwrap());

        let response = with_session(server.patch(&path), &token)
            .json(&json!({ "credentials": { "refresh_token": "forged" } }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = with_session(server.get(&path), &token).await;
        assert!(response.json::<Value>()["data"]["credentials"]["refresh_token"].is_null());
    }

    #[tokio::test]
    async fn test_validate_key_reports_activity_and_survives_regeneration() {
        let server = setup_test_server().await;
        let token = register_user(&server, "keys@example.com").await;
        let project_id = create_project(&server, &token, "Keys").await;
        let integration = attach_integration(
            &server,
            &token,
            json!({ "project_id": project_id, "platform": "wordpress", "credentials": { "site_url": "https://run.example.com" } }),
        )
        .await;
        let integration_id = integration["id"].as_str().unwrap().to_string();
        let old_key = integration["integration_key"].as_str().unwrap().to_string();

        let (name, value) = integration_key_header(&old_key);
        let response = server.get("/api/integrations/validate-key").add_header(name, value).await;
        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["valid"], true);
        assert_eq!(body["is_active"], true);
        assert_eq!(body["platform"], "wordpress");
        assert_eq!(body["project"]["id"], project_id);

        with_session(server.patch(&format!("/api/integrations/{}", integration_id)), &token)
            .json(&json!({ "is_active": false }))
            .await
            .assert_status(StatusCode::OK);

        let response = server
            .post("/api/integrations/validate-key")
            .add_query_param("key", &old_key)
            .await;
        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["valid"], true);
        assert_eq!(body["is_active"], false);

        let response = with_session(
            server.post(&format!("/api/integrations/{}/regenerate-key", integration_id)),
            &token,
        )
        .await;
        response.assert_status(StatusCode::OK);
        let new_key = response.json::<Value>()["data"]["integration_key"]
            .as_str()
            .unwrap()
            .to_string();
        assert_ne!(new_key, old_key);

        let response = server
            .get("/api/integrations/validate-key")
            .add_header(
                header::AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", old_key)).unwrap(),
            )
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["valid"], false);

        let (name, value) = integration_key_header(&new_key);
        server
            .get("/api/integrations/validate-key")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::OK);
    }

    #[tokio::test]
    async fn test_validate_key_requires_key() {
        let server = setup_test_server().await;

        let response = server.get("/api/integrations/validate-key").await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: Value = response.json();
        assert_eq!(body["valid"], false);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_connection_test_records_sync() {
        let server = setup_test_server().await;
        let token = register_user(&server, "sync@example.com").await;
        let project_id = create_project(&server, &token, "Sync").await;
        let integration = attach_integration(
            &server,
            &token,
            json!({ "project_id": project_id, "platform": "webflow", "credentials": { "api_token": "wf_token_abcd" } }),
        )
        .await;
        assert!(integration["last_sync_at"].is_null());
        let id = integration["id"].as_str().unwrap();

        let response = with_session(server.post(&format!("/api/integrations/{}/test", id)), &token).await;
        response.assert_status(StatusCode::OK);
        assert_eq!(response.json::<Value>()["success"], true);

        let response = with_session(server.get(&format!("/api/integrations/{}", id)), &token).await;
        assert!(response.json::<Value>()["data"]["last_sync_at"].is_string());

        let response = with_session(server.post(&format!("/api/integrations/{}/test", Uuid::new_v4())), &token).await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_connection_failure_is_reported_in_body() {
        let state = setup_test_app_state_with(test_config(), StubPlatformClient { succeed: false }).await;
        let server = server_for(state);
        let token = register_user(&server, "fail@example.com").await;
        let project_id = create_project(&server, &token, "Fail").await;
        let integration = attach_integration(
            &server,
            &token,
            json!({ "project_id": project_id, "platform": "shopify", "credentials": { "shop_domain": "x.myshopify.com" } }),
        )
        .await;
        let id = integration["id"].as_str().unwrap();

        let response = with_session(server.post(&format!("/api/integrations/{}/test", id)), &token).await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("401"));

        let response = with_session(server.get(&format!("/api/integrations/{}", id)), &token).await;
        assert!(response.json::<Value>()["data"]["last_sync_at"].is_null());
    }

    #[tokio::test]
    async fn test_list_integrations_is_scoped_to_owner() {
        let server = setup_test_server().await;
        let alice = register_user(&server, "alice@example.com").await;
        let bob = register_user(&server, "bob@example.com").await;
        let alice_project = create_project(&server, &alice, "Alice").await;
        let bob_project = create_project(&server, &bob, "Bob").await;
        attach_integration(&server, &alice, json!({ "project_id": alice_project, "platform": "webflow" })).await;
        attach_integration(&server, &bob, json!({ "project_id": bob_project, "platform": "webflow" })).await;

        let response = with_session(server.get("/api/integrations"), &alice).await;
        let listed = response.json::<Value>()["data"].as_array().unwrap().clone();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["project_id"], alice_project);

        let response = with_session(server.get("/api/integrations"), &alice)
            .add_query_param("project_id", &bob_project)
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    // WordPress authorization

    async fn authorize_code(server: &TestServer, token: &str, project_id: &str) -> String {
        let response = with_session(server.get("/api/wordpress/authorize"), token)
            .add_query_param("project_id", project_id)
            .add_query_param("redirect_uri", "https://run.example.com/wp-admin/admin.php?page=seoflow")
            .add_query_param("state", "xyz")
            .await;
        response.assert_status(StatusCode::FOUND);

        let location = Url::parse(response.header(header::LOCATION).to_str().unwrap()).unwrap();
        assert_eq!(location.host_str(), Some("run.example.com"));
        let pairs: Vec<(String, String)> = location.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("page".to_string(), "seoflow".to_string())));
        assert!(pairs.contains(&("state".to_string(), "xyz".to_string())));
        pairs
            .into_iter()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v)
            .unwrap()
    }

    #[tokio::test]
    async fn test_wordpress_code_and_refresh_exchange() {
        let server = setup_test_server().await;
        let token = register_user(&server, "wp@example.com").await;
        let project_id = create_project(&server, &token, "WP").await;

        let code = authorize_code(&server, &token, &project_id).await;

        let response = server
            .post("/api/wordpress/token")
            .json(&json!({ "grant_type": "authorization_code", "code": code }))
            .await;
        response.assert_status(StatusCode::OK);
        let first: Value = response.json();
        assert_eq!(first["token_type"], "Bearer");
        assert_eq!(first["project_id"], project_id);
        assert!(first["access_token"].as_str().unwrap().starts_with("wpat_"));
        assert!(first["integration_key"].as_str().unwrap().starts_with("sfk_"));
        let first_refresh = first["refresh_token"].as_str().unwrap().to_string();

        let response = server
            .post("/api/wordpress/token")
            .json(&json!({ "grant_type": "refresh_token", "refresh_token": first_refresh }))
            .await;
        response.assert_status(StatusCode::OK);
        let second: Value = response.json();
        assert_ne!(second["refresh_token"], first["refresh_token"]);
        assert_ne!(second["access_token"], first["access_token"]);
        assert_eq!(second["integration_key"], first["integration_key"]);

        let response = server
            .post("/api/wordpress/token")
            .json(&json!({ "grant_type": "refresh_token", "refresh_token": first_refresh }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "invalid_grant");

        // Exactly one WordPress integration was created for the project
        let response = with_session(server.get("/api/integrations"), &token)
            .add_query_param("project_id", &project_id)
            .await;
        let listed = response.json::<Value>()["data"].as_array().unwrap().clone();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["platform"], "wordpress");
        assert!(listed[0]["credentials"]["refresh_token"].as_str().unwrap().starts_with("****"));
    }

    #[tokio::test]
    async fn test_wordpress_token_errors() {
        let server = setup_test_server().await;

        let response = server
            .post("/api/wordpress/token")
            .json(&json!({ "grant_type": "password" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "unsupported_grant_type");

        let response = server
            .post("/api/wordpress/token")
            .json(&json!({ "grant_type": "authorization_code", "code": "garbage" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "invalid_grant");

        let response = server
            .post("/api/wordpress/token")
            .json(&json!({ "grant_type": "refresh_token", "refresh_token": "wprt_unknown" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "invalid_grant");
    }

    #[tokio::test]
    async fn test_authorize_requires_session_and_ownership() {
        let server = setup_test_server().await;
        let owner = register_user(&server, "owner@example.com").await;
        let other = register_user(&server, "other@example.com").await;
        let project_id = create_project(&server, &owner, "Mine").await;

        let response = server
            .get("/api/wordpress/authorize")
            .add_query_param("project_id", &project_id)
            .add_query_param("redirect_uri", "https://run.example.com/callback")
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        let response = with_session(server.get("/api/wordpress/authorize"), &other)
            .add_query_param("project_id", &project_id)
            .add_query_param("redirect_uri", "https://run.example.com/callback")
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_plugin_download() {
        let plugin_dir = tempfile::tempdir().unwrap();
        fs::write(plugin_dir.path().join("seoflow.php"), "<?php /* SeoFlow */").unwrap();

        let mut config = test_config();
        config.plugin_dir = plugin_dir.path().to_path_buf();
        let server = server_for(setup_test_app_state_with(config, StubPlatformClient { succeed: true }).await);

        let response = server.get("/api/wordpress/plugin").await;

        response.assert_status(StatusCode::OK);
        assert_eq!(response.header(header::CONTENT_TYPE), "application/zip");
        assert!(response
            .header(header::CONTENT_DISPOSITION)
            .to_str()
            .unwrap()
            .contains("seoflow-wordpress.zip"));
        let archive = zip::ZipArchive::new(Cursor::new(response.as_bytes().to_vec())).unwrap();
        assert_eq!(archive.len(), 1);
    }

    #[tokio::test]
    async fn test_plugin_download_without_files() {
        let plugin_dir = tempfile::tempdir().unwrap();
        let mut config = test_config();
        config.plugin_dir = plugin_dir.path().join("missing");
        let server = server_for(setup_test_app_state_with(config, StubPlatformClient { succeed: true }).await);

        let response = server.get("/api/wordpress/plugin").await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    // Webhooks

    #[tokio::test]
    async fn test_wordpress_webhook() {
        let server = setup_test_server().await;
        let token = register_user(&server, "hook@example.com").await;
        let project_id = create_project(&server, &token, "Hooks").await;
        let integration = attach_integration(
            &server,
            &token,
            json!({ "project_id": project_id, "platform": "wordpress" }),
        )
        .await;
        let integration_id = integration["id"].as_str().unwrap().to_string();
        let event = json!({
            "event": "post_published",
            "post": { "id": 42, "title": "Hello", "url": "https://run.example.com/hello", "status": "publish" }
        });

        let response = server.post("/api/webhooks/wordpress").json(&event).await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        let response = server
            .post("/api/webhooks/wordpress")
            .add_query_param("integration_id", Uuid::new_v4().to_string())
            .json(&event)
            .await;
        response.assert_status(StatusCode::NOT_FOUND);

        let response = server
            .post("/api/webhooks/wordpress")
            .add_query_param("integration_id", &integration_id)
            .json(&json!({ "event": "post_exploded", "post": { "id": 1 } }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        for _ in 0..2 {
            let response = server
                .post("/api/webhooks/wordpress")
                .add_query_param("integration_id", &integration_id)
                .json(&event)
                .await;
            response.assert_status(StatusCode::OK);
            let ack: Value = response.json();
            assert_eq!(ack["received"], true);
            assert_eq!(ack["event"], "post_published");
        }

        let response = with_session(server.get(&format!("/api/integrations/{}", integration_id)), &token).await;
        assert!(response.json::<Value>()["data"]["last_sync_at"].is_string());

        let response = with_session(server.get("/api/articles"), &token)
            .add_query_param("project_id", &project_id)
            .await;
        assert!(response.json::<Value>()["data"].as_array().unwrap().is_empty());
    }
}
