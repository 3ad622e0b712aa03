//! Integration tests for the HTTP client against a mock server.
//!
//! Each test starts its own `wiremock` server on 127.0.0.1, which the base URL
//! policy accepts over plain http.

use feedsync::api::{ApiError, FailureKind, HttpApi, ListQuery, RemoteApi};
use feedsync::model::{Filter, RankingPeriod, UserList};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api(server: &MockServer) -> HttpApi {
    HttpApi::new(&format!("{}/api/v1", server.uri())).unwrap()
}

fn entry_json(id: &str, liked: bool, likes: u32) -> Value {
    json!({
        "id": id,
        "challenge_id": "ch1",
        "content": format!("answer {id}"),
        "score": 80,
        "like_count": likes,
        "comment_count": 2,
        "view_count": 10,
        "is_liked": liked,
        "user": {"id": "u1", "name": "Aki", "avatar": null},
        "challenge": {"id": "ch1", "title": "Describe your morning"},
        "created_at": "2024-05-01T10:00:00Z"
    })
}

fn envelope(data: Value, has_more: Option<bool>) -> Value {
    let pagination = has_more.map(|more| {
        json!({"page": 1, "page_size": 20, "total": 40, "total_pages": 2, "has_more": more})
    });
    json!({"success": true, "data": data, "error": null, "pagination": pagination})
}

fn query(filter: Filter, page: u32) -> ListQuery {
    ListQuery {
        filter,
        page,
        page_size: 20,
    }
}

// ============================================================================
// Lists
// ============================================================================

#[tokio::test]
async fn test_feed_page_decodes_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/feed"))
        .and(query_param("page", "1"))
        .and(query_param("page_size", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
            json!([entry_json("a1", false, 3), entry_json("a2", true, 7)]),
            Some(true),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let page = api(&server).list(&query(Filter::All, 1)).await.unwrap();
    assert_eq!(page.items.len(), 2);
    assert!(page.has_more);
    assert_eq!(page.items[1].id, "a2");
    assert!(page.items[1].is_liked);
    assert_eq!(page.items[1].like_count, 7);
    assert_eq!(page.items[0].score, Some(80));
    assert_eq!(
        page.items[0].challenge.as_ref().map(|c| c.title.as_str()),
        Some("Describe your morning")
    );
}

#[tokio::test]
async fn test_following_and_category_filters_hit_feed_with_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/feed"))
        .and(query_param("filter", "following"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(json!([entry_json("f1", false, 0)]), Some(false))),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/feed"))
        .and(query_param("category_id", "grammar"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(json!([entry_json("c1", false, 0)]), Some(false))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let api = api(&server);
    let following = api.list(&query(Filter::Following, 1)).await.unwrap();
    assert_eq!(following.items[0].id, "f1");
    let category = api
        .list(&query(Filter::Category("grammar".into()), 1))
        .await
        .unwrap();
    assert_eq!(category.items[0].id, "c1");
}

#[tokio::test]
async fn test_trending_and_user_answers_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/trending"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(envelope(json!([]), Some(false))),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/u9/answers"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(envelope(json!([]), Some(false))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let api = api(&server);
    assert!(api.list(&query(Filter::Trending, 1)).await.unwrap().items.is_empty());
    let page = api.list(&query(Filter::User("u9".into()), 2)).await.unwrap();
    assert!(!page.has_more);
}

#[tokio::test]
async fn test_ranking_filters_hit_ranking_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/rankings/weekly"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
            json!([entry_json("r1", true, 90), entry_json("r2", false, 40)]),
            Some(false),
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/rankings/all-time"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(envelope(json!([]), Some(false))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let api = api(&server);
    let weekly = api
        .list(&query(Filter::Ranking(RankingPeriod::Weekly), 1))
        .await
        .unwrap();
    assert_eq!(weekly.items[0].id, "r1");
    assert_eq!(weekly.items[0].like_count, 90);
    let all_time = api
        .list(&query(Filter::Ranking(RankingPeriod::AllTime), 1))
        .await
        .unwrap();
    assert!(all_time.items.is_empty());
}

#[tokio::test]
async fn test_followers_and_following_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/u1/followers"))
        .and(query_param("page", "2"))
        .and(query_param("page_size", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
            json!([{"id": "u7", "name": "Ren", "avatar": null}]),
            Some(true),
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/u1/following"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
            json!([{"id": "u8", "name": "Yui", "is_following": true, "follower_count": 12}]),
            Some(false),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let api = api(&server);
    let followers = api
        .users(&UserList::Followers("u1".into()), 2, 20)
        .await
        .unwrap();
    assert!(followers.has_more);
    assert_eq!(followers.items[0].name, "Ren");
    assert!(!followers.items[0].is_following);
    assert_eq!(followers.items[0].follower_count, None);

    let following = api
        .users(&UserList::Following("u1".into()), 1, 20)
        .await
        .unwrap();
    assert!(!following.has_more);
    assert!(following.items[0].is_following);
    assert_eq!(following.items[0].follower_count, Some(12));
}

#[tokio::test]
async fn test_missing_pagination_infers_has_more_from_page_size() {
    let server = MockServer::start().await;
    let full: Vec<Value> = (0..20).map(|i| entry_json(&format!("e{i}"), false, 0)).collect();
    Mock::given(method("GET"))
        .and(path("/api/v1/feed"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!(full), None)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/feed"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(json!([entry_json("last", false, 0)]), None)),
        )
        .mount(&server)
        .await;

    let api = api(&server);
    assert!(api.list(&query(Filter::All, 1)).await.unwrap().has_more);
    assert!(!api.list(&query(Filter::All, 2)).await.unwrap().has_more);
}

#[tokio::test]
async fn test_user_id_header_sent_when_configured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/feed"))
        .and(header("X-User-ID", "device-123"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(envelope(json!([]), Some(false))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let api = api(&server).with_user_id(SecretString::from("device-123".to_string()));
    api.list(&query(Filter::All, 1)).await.unwrap();
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn test_server_error_message_surfaces() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "success": false, "data": null, "error": "Database unavailable", "pagination": null
        })))
        .mount(&server)
        .await;

    let err = api(&server).list(&query(Filter::All, 1)).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Server);
    assert_eq!(err.user_message(), "Database unavailable");
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn test_status_without_body_is_server_class() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = api(&server).list(&query(Filter::All, 1)).await.unwrap_err();
    assert_eq!(err, ApiError::HttpStatus(503));
    assert_eq!(err.kind(), FailureKind::Server);
}

#[tokio::test]
async fn test_success_false_in_200_is_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false, "data": null, "error": {"message": "Invalid filter"}
        })))
        .mount(&server)
        .await;

    let err = api(&server).list(&query(Filter::All, 1)).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Server);
    assert_eq!(err.user_message(), "Invalid filter");
}

#[tokio::test]
async fn test_malformed_body_is_decoding_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let err = api(&server).list(&query(Filter::All, 1)).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Decoding);
    assert_eq!(err.user_message(), "could not read response");
}

#[tokio::test]
async fn test_wrong_shape_is_decoding_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
            json!([{"id": "a1", "like_count": "many"}]),
            Some(false),
        )))
        .mount(&server)
        .await;

    let err = api(&server).list(&query(Filter::All, 1)).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Decoding);
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let api = HttpApi::new(&format!("{uri}/api/v1")).unwrap();
    let err = api.list(&query(Filter::All, 1)).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Network);
}

// ============================================================================
// Actions
// ============================================================================

#[tokio::test]
async fn test_like_and_unlike_methods() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/answers/a1/like"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "success": true, "data": {"liked": true}, "error": null
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/answers/a1/like"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let api = api(&server);
    api.like("a1").await.unwrap();
    api.unlike("a1").await.unwrap();
}

#[tokio::test]
async fn test_already_applied_actions_are_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/answers/a1/like"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "success": false, "data": null, "error": "Already liked"
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/users/u2/follow"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false, "data": null, "error": "Not following"
        })))
        .mount(&server)
        .await;

    let api = api(&server);
    assert_eq!(api.like("a1").await, Ok(()));
    assert_eq!(api.unfollow("u2").await, Ok(()));
}

#[tokio::test]
async fn test_unlike_on_deleted_answer_fails() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/answers/gone/like"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false, "data": null, "error": "Answer not found"
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/answers/a1/like"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false, "data": null, "error": "Like not found"
        })))
        .mount(&server)
        .await;

    let api = api(&server);
    let err = api.unlike("gone").await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Server);
    assert_eq!(err.user_message(), "Answer not found");
    assert_eq!(api.unlike("a1").await, Ok(()));
}

#[tokio::test]
async fn test_other_action_errors_fail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/users/u2/follow"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false, "data": null, "error": "Cannot follow yourself"
        })))
        .mount(&server)
        .await;

    let err = api(&server).follow("u2").await.unwrap_err();
    assert_eq!(err.user_message(), "Cannot follow yourself");
}

// ============================================================================
// Profiles, comments, categories
// ============================================================================

#[tokio::test]
async fn test_profile_decodes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/u2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
            json!({
                "id": "u2", "name": "Mei", "avatar": null, "bio": "Learning English",
                "total_likes": 12, "answer_count": 4, "follower_count": 30,
                "following_count": 5, "is_following": true
            }),
            None,
        )))
        .mount(&server)
        .await;

    let profile = api(&server).profile("u2").await.unwrap();
    assert_eq!(profile.name, "Mei");
    assert_eq!(profile.follower_count, 30);
    assert!(profile.is_following);
    assert_eq!(profile.bio.as_deref(), Some("Learning English"));
}

#[tokio::test]
async fn test_post_comment_sends_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/answers/a1/comments"))
        .and(body_json(json!({"content": "Great answer"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(envelope(
            json!({
                "id": "c9", "answer_id": "a1", "content": "Great answer",
                "user": {"id": "me", "name": "Me"},
                "created_at": "2024-05-02T08:30:00Z"
            }),
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let comment = api(&server).post_comment("a1", "Great answer").await.unwrap();
    assert_eq!(comment.id, "c9");
    assert_eq!(comment.answer_id, "a1");
}

#[tokio::test]
async fn test_categories_sorted_by_sort_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
            json!([
                {"id": "b", "name": "Business", "sort_order": 2},
                {"id": "d", "name": "Daily life", "sort_order": 1}
            ]),
            None,
        )))
        .mount(&server)
        .await;

    let categories = api(&server).categories().await.unwrap();
    let ids: Vec<&str> = categories.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["d", "b"]);
    assert_eq!(categories[0].filter(), Filter::Category("d".into()));
}
