//! 端到端流程：真实 HTTP 网关（wiremock）+ 记录型宿主 + 事件循环

use std::sync::Arc;
use std::time::Duration;

use sales_miniapp::api::{MiniAppBackend, RequestGateway};
use sales_miniapp::config::AppConfig;
use sales_miniapp::core::{Action, App, AppEvent, CriteriaChoice, Format, Goal, Grade, Subject, View};
use sales_miniapp::host::{HostBridge, HostSdk, RecordingHost, RecordingOpener};
use sales_miniapp::storage::MemoryStore;
use sales_miniapp::view::{Frame, Node};
use serde_json::json;
use tokio::sync::watch;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INIT_DATA: &str = "query_id=AAE&user=%7B%22id%22%3A42%7D&hash=abc";

async fn mount_backend(server: &MockServer, manager_chat_url: Option<&str>) {
    Mock::given(method("GET"))
        .and(path("/api/miniapp/meta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "brand_name": "Физтех-Центр",
            "advisor_name": "Ассистент",
            "manager_label": "менеджер",
            "manager_chat_url": manager_chat_url,
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/whoami"))
        .and(header("X-Telegram-Init-Data", INIT_DATA))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "user": {"id": 42, "first_name": "Анна", "username": "anna_p"}
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/catalog/search"))
        .and(query_param("grade", "11"))
        .and(query_param("goal", "ege"))
        .and(query_param("subject", "math"))
        .and(query_param("format", "online"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"id": "a", "title": "ЕГЭ-интенсив", "url": "https://kmipt.ru/a"},
                {"id": "b", "title": "Годовой курс", "url": "https://kmipt.ru/b"}
            ],
            "match_quality": "strong"
        })))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/assistant/ask"))
        .and(header("X-Telegram-Init-Data", INIT_DATA))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Request-ID", "req-77")
                .set_body_json(json!({
                    "answer_text": "Старт в сентябре.",
                    "sources": ["catalog"]
                })),
        )
        .mount(server)
        .await;
}

async fn wait_frame(frames: &mut watch::Receiver<Frame>, what: &str, pred: impl FnMut(&Frame) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), frames.wait_for(pred))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
        .expect("event loop alive");
}

struct Running {
    events: tokio::sync::mpsc::UnboundedSender<AppEvent>,
    frames: watch::Receiver<Frame>,
    handle: tokio::task::JoinHandle<()>,
}

fn start(server: &MockServer, host: Arc<RecordingHost>) -> Running {
    let mut cfg = AppConfig::default();
    cfg.api.base_url = server.uri();
    let backend: Arc<dyn MiniAppBackend> = Arc::new(RequestGateway::new(&cfg.api.base_url).unwrap());
    let bridge = HostBridge::new(
        Some(host as Arc<dyn HostSdk>),
        Arc::new(RecordingOpener::failing()),
    );
    let (app, inbox) = App::new(&cfg, bridge, backend, Arc::new(MemoryStore::default()));
    let events = app.events();
    let frames = app.subscribe();
    let handle = tokio::spawn(app.run(inbox));
    Running { events, frames, handle }
}

fn send(events: &tokio::sync::mpsc::UnboundedSender<AppEvent>, action: Action) {
    events.send(AppEvent::Action(action)).unwrap();
}

fn pick_all(events: &tokio::sync::mpsc::UnboundedSender<AppEvent>) {
    send(events, Action::Navigate(View::Picker));
    send(events, Action::Select(CriteriaChoice::Grade(Grade::new(11).unwrap())));
    send(events, Action::Select(CriteriaChoice::Goal(Goal::Ege)));
    send(events, Action::Select(CriteriaChoice::Subject(Subject::Math)));
    send(events, Action::Select(CriteriaChoice::Format(Format::Online)));
}

fn message_count(frame: &Frame) -> usize {
    frame.nodes.iter().filter(|n| matches!(n, Node::Message(_))).count()
}

fn has_status(frame: &Frame, text: &str) -> bool {
    frame
        .nodes
        .iter()
        .any(|n| matches!(n, Node::Status { text: t, is_error: false } if t == text))
}

#[tokio::test]
async fn test_picker_search_chat_and_structured_handoff() {
    let server = MockServer::start().await;
    mount_backend(&server, None).await;
    let host = Arc::new(RecordingHost::full().with_init_data(INIT_DATA));
    let Running {
        events,
        mut frames,
        handle,
    } = start(&server, host.clone());

    wait_frame(&mut frames, "verified greeting", |f| {
        f.nodes.contains(&Node::Heading("Здравствуйте, Анна!".to_string()))
    })
    .await;

    pick_all(&events);
    send(&events, Action::Search);
    wait_frame(&mut frames, "results view", |f| f.view == View::Results).await;
    {
        let frame = frames.borrow();
        assert!(frame.nodes.iter().any(|n| matches!(
            n,
            Node::Card { title, highlighted: true, .. } if title == "ЕГЭ-интенсив"
        )));
        assert_eq!(frame.primary.as_ref().map(|p| p.label.as_str()), Some("Связаться с менеджером"));
    }
    assert!(host.calls().contains(&"set_text:Связаться с менеджером".to_string()));

    send(&events, Action::Navigate(View::Chat));
    send(&events, Action::InputChanged("  Когда   старт? ".to_string()));
    send(&events, Action::SubmitQuestion);
    wait_frame(&mut frames, "assistant reply", |f| {
        message_count(f) == 2 && !f.nodes.iter().any(|n| matches!(n, Node::Progress { .. }))
    })
    .await;
    {
        let frame = frames.borrow();
        let reply = frame
            .nodes
            .iter()
            .filter_map(|n| match n {
                Node::Message(m) => Some(m),
                _ => None,
            })
            .last()
            .unwrap();
        assert_eq!(reply.text, "Старт в сентябре.");
        assert_eq!(reply.meta.as_deref(), Some("ID запроса: req-77"));
    }

    send(&events, Action::ContactManager);
    wait_frame(&mut frames, "handoff confirmation", |f| {
        has_status(f, "Заявка отправлена менеджеру.")
    })
    .await;

    let sent = host.sent();
    assert_eq!(sent.len(), 1);
    let payload: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
    assert_eq!(payload["flow"], "catalog");
    assert_eq!(payload["question"], "Когда   старт?");
    assert_eq!(payload["top"][0]["id"], "a");
    assert_eq!(payload["criteria"]["subject"], "math");
    assert!(host.calls().contains(&"close".to_string()));

    events.send(AppEvent::Quit).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_direct_manager_link_carries_summary() {
    let server = MockServer::start().await;
    mount_backend(&server, Some("https://t.me/kmipt_manager")).await;
    let host = Arc::new(RecordingHost::full().with_init_data(INIT_DATA));
    let Running {
        events,
        mut frames,
        handle,
    } = start(&server, host.clone());

    wait_frame(&mut frames, "meta and identity", |f| {
        f.title.starts_with("Физтех-Центр") && f.nodes.contains(&Node::Heading("Здравствуйте, Анна!".to_string()))
    })
    .await;

    pick_all(&events);
    send(&events, Action::Search);
    wait_frame(&mut frames, "results view", |f| f.view == View::Results).await;

    send(&events, Action::ContactManager);
    wait_frame(&mut frames, "direct link status", |f| {
        has_status(f, "Открываем чат с менеджером.")
    })
    .await;

    let opened = host
        .calls()
        .into_iter()
        .find_map(|c| c.strip_prefix("open_host_link:").map(String::from))
        .expect("manager link opened in host");
    let url = url::Url::parse(&opened).unwrap();
    let text = url
        .query_pairs()
        .find(|(k, _)| k == "text")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    assert!(text.contains("Анна, @anna_p, id 42"));
    assert!(text.contains("11 кл."));
    assert!(text.contains("ЕГЭ-интенсив; Годовой курс"));
    assert!(text.contains("Вопросов в чате пока не было."));
    assert!(host.sent().is_empty());

    events.send(AppEvent::Quit).unwrap();
    handle.await.unwrap();
}
