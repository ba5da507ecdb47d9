#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Discovery, catalog pagination and search integration tests.
//!
//! These need PostgreSQL at `DATABASE_URL`.

mod common;

use std::collections::HashSet;

use axum::http::StatusCode;
use serde_json::{Value as JsonValue, json};
use tavola_test_utils::{TestListing, rating_payload, test_listing, unique_name};

use common::{TestApp, run_test, shared_app};

async fn create_restaurant(app: &TestApp, listing: TestListing) -> i64 {
    let (status, body) = app
        .post("/api/restaurants", listing.restaurant_payload())
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_i64().unwrap()
}

async fn create_suggestion(app: &TestApp, listing: TestListing, status: &str) -> i64 {
    let (code, body) = app
        .post("/api/suggestions", listing.suggestion_payload())
        .await;
    assert_eq!(code, StatusCode::CREATED, "{body}");
    let id = body["id"].as_i64().unwrap();
    if status != "pending" {
        let (code, _) = app
            .put(
                &format!("/api/suggestions/{id}/status"),
                json!({ "status": status }),
            )
            .await;
        assert_eq!(code, StatusCode::OK);
    }
    id
}

fn ids(results: &JsonValue) -> Vec<i64> {
    results
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect()
}

#[test]
fn catalog_pages_are_exhaustive_and_disjoint() {
    run_test(async {
        let app = shared_app().await;
        let category = app.category(&unique_name("pages")).await;

        let mut expected = Vec::new();
        for i in 0..5 {
            let id = create_restaurant(
                app,
                test_listing(&unique_name(&format!("Paged {i}"))).in_category(category),
            )
            .await;
            expected.push(id);
        }
        expected.sort_unstable();

        let mut seen = Vec::new();
        let mut page_sizes = Vec::new();
        let mut cursor = String::new();
        loop {
            let (status, page) = app
                .get(&format!(
                    "/api/restaurants?category={category}&limit=2&cursor={cursor}"
                ))
                .await;
            assert_eq!(status, StatusCode::OK, "{page}");
            let page_ids: Vec<i64> = page["items"]
                .as_array()
                .unwrap()
                .iter()
                .map(|r| r["id"].as_i64().unwrap())
                .collect();
            page_sizes.push(page_ids.len());
            seen.extend(page_ids);

            if page["has_more"] == json!(false) {
                assert!(page["next_cursor"].is_null());
                break;
            }
            cursor = page["next_cursor"].as_str().unwrap().to_string();
        }

        assert_eq!(seen, expected);
        assert_eq!(page_sizes, vec![2, 2, 1]);
    });
}

#[test]
fn search_without_match_is_empty() {
    run_test(async {
        let app = shared_app().await;
        let needle = unique_name("zz-no-match");

        let (status, body) = app.get(&format!("/api/search?q={needle}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let (status, body) = app
            .get(&format!("/api/discover?q={needle}&include_suggestions=true"))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    });
}

#[test]
fn search_matches_names_of_both_sources() {
    run_test(async {
        let app = shared_app().await;
        let tag = unique_name("gnocchi");

        let restaurant = create_restaurant(app, test_listing(&format!("Casa {tag}"))).await;
        let approved = create_suggestion(app, test_listing(&format!("Da {tag}")), "approved").await;
        let pending = create_suggestion(app, test_listing(&format!("Chez {tag}")), "pending").await;
        // Description matches do not count for global search
        create_restaurant(
            app,
            test_listing(&unique_name("Elsewhere")).with_description(&tag),
        )
        .await;

        let (status, body) = app
            .get(&format!("/api/search?q={}", tag.to_uppercase()))
            .await;
        assert_eq!(status, StatusCode::OK);
        let found: HashSet<i64> = ids(&body).into_iter().collect();
        assert_eq!(found, HashSet::from([restaurant, approved]));
        assert!(!found.contains(&pending));
    });
}

#[test]
fn discovery_merges_included_suggestions() {
    run_test(async {
        let app = shared_app().await;
        let tag = unique_name("ramen");

        let restaurant = create_restaurant(app, test_listing(&format!("{tag} House"))).await;
        let (status, _) = app
            .post(
                &format!("/api/restaurants/{restaurant}/ratings"),
                rating_payload(4, 3, 5),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let tested = create_suggestion(app, test_listing(&format!("{tag} Stand")), "tested").await;
        let rejected =
            create_suggestion(app, test_listing(&format!("{tag} Cart")), "rejected").await;

        let (_, without) = app.get(&format!("/api/discover?q={tag}")).await;
        assert_eq!(ids(&without), vec![restaurant]);

        let (status, with) = app
            .get(&format!("/api/discover?q={tag}&include_suggestions=true"))
            .await;
        assert_eq!(status, StatusCode::OK);
        let results = with.as_array().unwrap();
        let found: HashSet<i64> = ids(&with).into_iter().collect();
        assert_eq!(found, HashSet::from([restaurant, tested]));
        assert!(!found.contains(&rejected));

        for result in results {
            if result["id"] == json!(restaurant) {
                assert_eq!(result["is_suggestion"], json!(false));
                assert_eq!(result["rating"]["count"], json!(1));
                assert_eq!(result["rating"]["overall"], json!(4.0));
            } else {
                assert_eq!(result["is_suggestion"], json!(true));
                assert_eq!(result["status"], json!("tested"));
                assert!(result["rating"].is_null());
            }
        }
    });
}

#[test]
fn radius_filters_and_orders_by_distance() {
    run_test(async {
        let app = shared_app().await;
        let category = app.category(&unique_name("geo")).await;

        // Center: Milan Duomo
        let (lat, lng) = (45.4642, 9.1900);
        let near = create_restaurant(
            app,
            test_listing(&unique_name("Near"))
                .at(45.4700, 9.1900)
                .in_category(category),
        )
        .await;
        let nearest = create_restaurant(
            app,
            test_listing(&unique_name("Nearest"))
                .at(45.4650, 9.1900)
                .in_category(category),
        )
        .await;
        let far = create_restaurant(
            app,
            test_listing(&unique_name("Far"))
                .at(41.9028, 12.4964)
                .in_category(category),
        )
        .await;
        let nowhere = create_restaurant(
            app,
            test_listing(&unique_name("Nowhere")).in_category(category),
        )
        .await;

        let (status, body) = app
            .get(&format!(
                "/api/discover?category={category}&lat={lat}&lng={lng}&radius=10"
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&body), vec![nearest, near]);
        let distances: Vec<f64> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["distance"].as_f64().unwrap())
            .collect();
        assert!(distances[0] < distances[1]);
        assert!(distances[1] < 1.0);

        // Center without radius: everything, distances where known
        let (_, body) = app
            .get(&format!("/api/discover?category={category}&lat={lat}&lng={lng}"))
            .await;
        let found: HashSet<i64> = ids(&body).into_iter().collect();
        assert_eq!(found, HashSet::from([near, nearest, far, nowhere]));
        for result in body.as_array().unwrap() {
            if result["id"] == json!(nowhere) {
                assert!(result["distance"].is_null());
            } else {
                assert!(result["distance"].is_number());
            }
        }
    });
}

#[test]
fn food_type_filter_requires_any_listed_type() {
    run_test(async {
        let app = shared_app().await;
        let category = app.category(&unique_name("ft")).await;
        let sushi = app.food_type(&unique_name("sushi")).await;
        let tacos = app.food_type(&unique_name("tacos")).await;
        let bbq = app.food_type(&unique_name("bbq")).await;

        let a = create_restaurant(
            app,
            test_listing(&unique_name("A"))
                .in_category(category)
                .with_food_types(&[sushi]),
        )
        .await;
        let b = create_restaurant(
            app,
            test_listing(&unique_name("B"))
                .in_category(category)
                .with_food_types(&[tacos, bbq]),
        )
        .await;
        create_restaurant(
            app,
            test_listing(&unique_name("C"))
                .in_category(category)
                .with_food_types(&[bbq]),
        )
        .await;

        let (status, body) = app
            .get(&format!(
                "/api/discover?category={category}&food_types={sushi},{tacos},bogus"
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        let found: HashSet<i64> = ids(&body).into_iter().collect();
        assert_eq!(found, HashSet::from([a, b]));

        let b_types = body
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["id"] == json!(b))
            .unwrap()["food_types"]
            .as_array()
            .unwrap()
            .len();
        assert_eq!(b_types, 2);
    });
}

#[test]
fn restaurant_crud_and_ratings() {
    run_test(async {
        let app = shared_app().await;
        let name = unique_name("Taverna");
        let id = create_restaurant(app, test_listing(&name).with_address("2 Odos")).await;

        let (status, body) = app
            .post(
                "/api/restaurants",
                test_listing(&name)
                    .with_address("2 Odos")
                    .restaurant_payload(),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["rule"], json!("name_address"));

        let (status, body) = app
            .put(
                &format!("/api/restaurants/{id}"),
                json!({ "phone": "+30 210 000" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phone"], json!("+30 210 000"));
        assert_eq!(body["name"], json!(name));

        let (status, body) = app
            .post(&format!("/api/restaurants/{id}/ratings"), rating_payload(2, 4, 3))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["average"]["overall"], json!(3.0));

        let (status, _) = app
            .post("/api/restaurants/999999999999/ratings", rating_payload(2, 4, 3))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        assert_eq!(
            app.delete(&format!("/api/restaurants/{id}")).await,
            StatusCode::NO_CONTENT
        );
        let (status, _) = app.get(&format!("/api/restaurants/{id}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    });
}
