use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use homehelper_shared::error::HomeHelperError;

use crate::stomp::Frame;
use crate::subscriptions::SubscriptionTracker;

/// Parse a `MESSAGE` body as JSON.
pub fn decode_payload(body: &str) -> Result<Value, HomeHelperError> {
    Ok(serde_json::from_str(body)?)
}

pub fn encode_payload<T: Serialize + ?Sized>(payload: &T) -> Result<String, HomeHelperError> {
    Ok(serde_json::to_string(payload)?)
}

/// Route a `MESSAGE` frame to the handler of its subscription.
///
/// Frames for unknown subscriptions and bodies that are not valid JSON are
/// logged and dropped; the subscription stays active.
pub fn dispatch_message(subscriptions: &SubscriptionTracker, frame: &Frame) {
    let Some(id) = frame.get("subscription") else {
        warn!(destination = ?frame.get("destination"), "MESSAGE frame without subscription header");
        return;
    };
    let Some(subscription) = subscriptions.get(id) else {
        debug!(id = %id, "MESSAGE for unknown subscription");
        return;
    };

    let payload = match decode_payload(&frame.body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(
                destination = %subscription.destination,
                error = %e,
                "Failed to decode message body"
            );
            return;
        }
    };

    if let Err(e) = subscription.handler.handle(&payload) {
        warn!(
            destination = %subscription.destination,
            error = %e,
            "Message handler failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::listeners::Listener;
    use crate::stomp::Command;

    fn recording(tracker: &mut SubscriptionTracker, id: &str) -> Arc<Mutex<Vec<Value>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: Arc<dyn Listener<Value>> = Arc::new(move |v: &Value| -> anyhow::Result<()> {
            sink.lock().unwrap().push(v.clone());
            Ok(())
        });
        tracker.on_subscribed(id.to_string(), "/topic/x".to_string(), handler);
        seen
    }

    fn message(subscription: &str, body: &str) -> Frame {
        Frame::new(Command::Message)
            .header("subscription", subscription)
            .header("destination", "/topic/x")
            .with_body(body)
    }

    #[test]
    fn test_dispatch_routes_by_subscription() {
        let mut tracker = SubscriptionTracker::new();
        let a = recording(&mut tracker, "sub-0");
        let b = recording(&mut tracker, "sub-1");

        dispatch_message(&tracker, &message("sub-1", r#"{"n":1}"#));

        assert!(a.lock().unwrap().is_empty());
        assert_eq!(*b.lock().unwrap(), vec![serde_json::json!({"n": 1})]);
    }

    #[test]
    fn test_malformed_body_is_dropped_and_later_frames_still_delivered() {
        let mut tracker = SubscriptionTracker::new();
        let seen = recording(&mut tracker, "sub-0");

        dispatch_message(&tracker, &message("sub-0", "{not json"));
        dispatch_message(&tracker, &message("sub-0", "[1,2]"));

        assert_eq!(*seen.lock().unwrap(), vec![serde_json::json!([1, 2])]);
    }

    #[test]
    fn test_unknown_subscription_ignored() {
        let tracker = SubscriptionTracker::new();
        dispatch_message(&tracker, &message("sub-9", "{}"));
        dispatch_message(&tracker, &Frame::new(Command::Message).with_body("{}"));
    }
}
