mod common;

use common::Harness;
use filegate_bot::bot::callbacks::CallbackAction;
use filegate_bot::router::Router;
use filegate_bot::transport::ButtonAction;
use std::sync::Arc;
use std::time::Duration;

const CHAT: i64 = 7;
const USER: i64 = 7;

fn router(h: &Harness) -> Router {
    Router::new(Arc::clone(&h.pipeline))
}

fn callback_data(action: &ButtonAction) -> Option<String> {
    match action {
        ButtonAction::Callback(data) => Some(data.clone()),
        ButtonAction::Url(_) => None,
    }
}

#[tokio::test]
async fn start_gates_then_recheck_reveals_menu() {
    let h = Harness::new("@chan1", Duration::from_secs(30)).await;
    let router = router(&h);

    router
        .on_start(CHAT, USER, "Ann", "")
        .await
        .expect("start handled");
    let welcome = h.transport.keyboards();
    assert_eq!(welcome.len(), 1);
    assert_eq!(
        callback_data(&welcome[0][1][0].action).as_deref(),
        Some("check")
    );

    let reply = router
        .on_callback(CHAT, USER, "Ann", "check")
        .await
        .expect("callback handled");
    assert!(reply.alert);
    assert_eq!(h.transport.keyboards().len(), 1);

    h.transport.join("@chan1");
    let reply = router
        .on_callback(CHAT, USER, "Ann", "check")
        .await
        .expect("callback handled");
    assert!(!reply.alert);

    let keyboards = h.transport.keyboards();
    assert_eq!(keyboards.len(), 2);
    let menu = &keyboards[1];
    // One row per catalog entry plus refresh/help
    assert_eq!(menu.len(), 6);
    let last_row: Vec<_> = menu[5].iter().filter_map(|b| callback_data(&b.action)).collect();
    assert_eq!(last_row, vec!["refresh".to_string(), "help".to_string()]);
}

#[tokio::test]
async fn menu_button_delivers_by_index() {
    let h = Harness::new("", Duration::from_secs(30)).await;
    let router = router(&h);

    router
        .on_start(CHAT, USER, "Ann", "")
        .await
        .expect("start handled");
    let menu = &h.transport.keyboards()[0];
    let idx = h.pipeline.catalog().index_of("f2").expect("f2 listed");
    let data = callback_data(&menu[idx][0].action).expect("file button");
    assert_eq!(CallbackAction::parse(&data), Some(CallbackAction::Download(idx)));

    router
        .on_callback(CHAT, USER, "Ann", &data)
        .await
        .expect("callback handled");
    assert_eq!(h.transport.files().len(), 1);
}

#[tokio::test]
async fn deep_link_batch_resumes_through_recheck_button() {
    let h = Harness::new("@chan1", Duration::from_secs(30)).await;
    let router = router(&h);

    router
        .on_start(CHAT, USER, "Ann", "batch_f2_f3")
        .await
        .expect("start handled");
    let prompt = &h.transport.keyboards()[0];
    let data = callback_data(&prompt[1][0].action).expect("re-check button");
    assert!(data.starts_with("check:"));

    h.transport.join("@chan1");
    let reply = router
        .on_callback(CHAT, USER, "Ann", &data)
        .await
        .expect("callback handled");
    assert!(!reply.alert);
    assert_eq!(h.transport.files().len(), 2);

    let reply = router
        .on_callback(CHAT, USER, "Ann", &data)
        .await
        .expect("callback handled");
    assert!(reply.alert, "second press reports the request as gone");
    assert_eq!(h.transport.files().len(), 2);
}

#[tokio::test]
async fn deep_link_single_file() {
    let h = Harness::new("", Duration::from_secs(30)).await;
    let router = router(&h);

    router
        .on_start(CHAT, USER, "Ann", "f3")
        .await
        .expect("start handled");
    assert_eq!(h.transport.files().len(), 1);
}

#[tokio::test]
async fn help_screens() {
    let h = Harness::new("", Duration::from_secs(30)).await;
    let router = router(&h);

    router.on_help(CHAT).await.expect("help handled");
    router
        .on_callback(CHAT, USER, "Ann", "help")
        .await
        .expect("callback handled");

    let texts = h.transport.texts_in(CHAT);
    assert_eq!(texts.len(), 2);
    assert!(texts[1].contains("30 seconds"));
    let back = &h.transport.keyboards()[0];
    assert_eq!(callback_data(&back[0][0].action).as_deref(), Some("menu"));
}
