use super::*;
use tokio::time::sleep;

fn text_of(center: &MessageCenter) -> Option<String> {
    center.current().map(|message| message.text)
}

#[tokio::test(start_paused = true)]
async fn success_message_expires_after_three_seconds() {
    let center = MessageCenter::default();
    center.set_success("applied");

    sleep(Duration::from_millis(2999)).await;
    let message = center.current().expect("still present");
    assert_eq!(message.kind, StatusKind::Success);
    assert_eq!(message.text, "applied");

    sleep(Duration::from_millis(2)).await;
    assert!(center.current().is_none());
}

#[tokio::test(start_paused = true)]
async fn error_message_expires_after_five_seconds() {
    let center = MessageCenter::default();
    center.set_error("failed");

    sleep(Duration::from_millis(4999)).await;
    assert_eq!(text_of(&center).as_deref(), Some("failed"));

    sleep(Duration::from_millis(2)).await;
    assert!(center.current().is_none());
}

#[tokio::test(start_paused = true)]
async fn stale_timer_does_not_clear_superseding_message() {
    let center = MessageCenter::default();
    center.set_success("first");

    sleep(Duration::from_millis(2000)).await;
    center.set_error("second");

    // The first message's timer would have fired at t=3000.
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(text_of(&center).as_deref(), Some("second"));

    // The second message lives for its own five seconds from t=2000.
    sleep(Duration::from_millis(3499)).await;
    assert_eq!(text_of(&center).as_deref(), Some("second"));
    sleep(Duration::from_millis(2)).await;
    assert!(center.current().is_none());
}

#[tokio::test(start_paused = true)]
async fn clear_then_set_keeps_new_message_for_full_ttl() {
    let center = MessageCenter::default();
    center.set_error("old");
    sleep(Duration::from_millis(4000)).await;
    center.clear();
    assert!(center.current().is_none());

    center.set_success("new");
    sleep(Duration::from_millis(2500)).await;
    assert_eq!(text_of(&center).as_deref(), Some("new"));
}

#[tokio::test(start_paused = true)]
async fn custom_ttl_is_honoured() {
    let center = MessageCenter::new(MessageTtl {
        success: Duration::from_millis(100),
        error: Duration::from_millis(200),
    });
    center.set_success("short");
    sleep(Duration::from_millis(101)).await;
    assert!(center.current().is_none());
}

#[test]
fn message_without_runtime_persists_until_superseded() {
    let center = MessageCenter::default();
    center.set_error("no runtime");
    assert_eq!(text_of(&center).as_deref(), Some("no runtime"));
    center.clear();
    assert!(center.current().is_none());
}
