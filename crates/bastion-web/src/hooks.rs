use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Json,
};
use bastion_core::fit::poster::WebhookEvent;
use serde_json::{json, Value};
use tracing::debug;

use crate::WebState;

/// Strava webhook delivery. Acknowledged at once; posting runs in the
/// background so Strava never waits on the post delay.
pub(crate) async fn post_activity(
    State(state): State<WebState>,
    Json(event): Json<WebhookEvent>,
) -> &'static str {
    debug!(
        object_id = %event.object_id,
        aspect = %event.aspect_type,
        "webhook request"
    );
    let poster = state.poster.clone();
    tokio::spawn(async move {
        poster.handle_event(event).await;
    });
    "Thanks!"
}

/// Subscription handshake: echo `hub.challenge` back.
pub(crate) async fn verify_hook(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    Json(json!({ "hub.challenge": params.get("hub.challenge") }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode;
    use bastion_core::{
        chat::types::MessagePayload, domain::UserId, fit::store::UserRepository,
        testing::sample_activity,
    };
    use serde_json::json;

    use crate::test_support::{body_json, body_string, get, json_request, Harness, CHANNEL};

    #[tokio::test]
    async fn hub_challenge_is_echoed() {
        let h = Harness::new();
        for uri in [
            "/activity?hub.mode=subscribe&hub.challenge=abc123&hub.verify_token=x",
            "/hub-challenge?hub.challenge=abc123",
        ] {
            let resp = h.send(get(uri)).await;
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(body_json(resp).await, json!({ "hub.challenge": "abc123" }));
        }
    }

    #[tokio::test]
    async fn activity_webhook_acks_then_posts() {
        let h = Harness::new();
        h.chat.add_member(5, "five", Some("Fiver"), None);
        h.link(5, "77").await;
        h.strava.add_activity(sample_activity("123", 30));

        let resp = h
            .send(json_request(
                "POST",
                "/activity",
                json!({"owner_id": 77, "object_id": 123, "aspect_type": "create", "object_type": "activity"}),
            ))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "Thanks!");

        tokio::time::timeout(Duration::from_secs(2), async {
            while h.chat.sent().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("activity was not posted");

        let sent = h.chat.sent();
        assert_eq!(sent[0].0.0, CHANNEL);
        assert!(matches!(sent[0].1, MessagePayload::Embed(_)));
        assert!(h.store.get_user(UserId(5)).await.unwrap().total_exp > 0.0);
    }

    #[tokio::test]
    async fn update_events_are_acknowledged_but_ignored() {
        let h = Harness::new();
        let resp = h
            .send(json_request(
                "POST",
                "/activity",
                json!({"owner_id": "77", "object_id": "1", "aspect_type": "update"}),
            ))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.strava.activity_fetches(), 0);
    }
}
