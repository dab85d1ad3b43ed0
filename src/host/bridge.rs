//! HostBridge：对可选宿主 SDK 的唯一访问入口
//!
//! 宿主缺失或调用失败时静默降级，应用在宿主外仍然可用。

use std::sync::Arc;

use tokio::sync::mpsc;
use url::Url;

use super::{HapticKind, HostSdk, MainButton, WindowOpener};
use crate::api::UserProfile;
use crate::core::{AppEvent, HandoffError, HostError};
use crate::view::PrimaryAction;

/// 启动时从宿主拿到的会话信息；宿主外为空
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HostSession {
    pub init_data: Option<String>,
    pub user: Option<UserProfile>,
    pub in_host: bool,
}

/// 链接分类：宿主内深链 / 普通外链
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkKind {
    HostDeepLink,
    External,
}

const HOST_LINK_DOMAINS: [&str; 3] = ["t.me", "telegram.me", "telegram.dog"];

pub fn classify_link(url: &str) -> LinkKind {
    let Ok(parsed) = Url::parse(url) else {
        return LinkKind::External;
    };
    if parsed.scheme() == "tg" {
        return LinkKind::HostDeepLink;
    }
    match parsed.host_str() {
        Some(host) if HOST_LINK_DOMAINS.contains(&host.trim_start_matches("www.")) => LinkKind::HostDeepLink,
        _ => LinkKind::External,
    }
}

pub struct HostBridge {
    sdk: Option<Arc<dyn HostSdk>>,
    fallback: Arc<dyn WindowOpener>,
}

impl HostBridge {
    pub fn new(sdk: Option<Arc<dyn HostSdk>>, fallback: Arc<dyn WindowOpener>) -> Self {
        Self { sdk, fallback }
    }

    /// 宿主外运行（浏览器 / 终端预览）
    pub fn detached(fallback: Arc<dyn WindowOpener>) -> Self {
        Self::new(None, fallback)
    }

    pub fn in_host(&self) -> bool {
        self.sdk.is_some()
    }

    pub fn has_main_button(&self) -> bool {
        self.sdk.as_deref().is_some_and(|sdk| sdk.main_button().is_some())
    }

    /// 通知宿主就绪并请求展开；任何一步失败都返回空会话
    pub fn init_session(&self) -> HostSession {
        let Some(sdk) = self.sdk.as_deref() else {
            tracing::info!("No host SDK, running in preview mode");
            return HostSession::default();
        };
        if let Err(e) = sdk.ready().and_then(|_| sdk.expand()) {
            tracing::debug!("Host session bootstrap failed: {}", e);
            return HostSession::default();
        }
        HostSession {
            init_data: sdk.init_data().filter(|s| !s.trim().is_empty()),
            user: sdk.user(),
            in_host: true,
        }
    }

    /// 让宿主主按钮与当前页面的主操作一致；先解绑旧回调再绑定新回调
    pub fn sync_primary_action(&self, primary: Option<&PrimaryAction>, events: &mpsc::UnboundedSender<AppEvent>) {
        let Some(button) = self.sdk.as_deref().and_then(|sdk| sdk.main_button()) else {
            return;
        };
        if let Err(e) = apply_primary(button, primary, events) {
            tracing::debug!("Main button sync failed: {}", e);
        }
    }

    pub fn trigger_haptic(&self, kind: HapticKind) {
        if let Some(sdk) = self.sdk.as_deref() {
            if let Err(e) = sdk.haptic(kind) {
                tracing::debug!("Haptic {:?} ignored: {}", kind, e);
            }
        }
    }

    /// 按最具体的方式依次尝试打开；返回是否有一次成功
    pub fn open_external_link(&self, url: &str) -> bool {
        let kind = classify_link(url);
        if let Some(sdk) = self.sdk.as_deref() {
            if kind == LinkKind::HostDeepLink {
                match sdk.open_host_link(url) {
                    Ok(()) => return true,
                    Err(e) => tracing::debug!("open_host_link failed: {}", e),
                }
            }
            match sdk.open_link(url) {
                Ok(()) => return true,
                Err(e) => tracing::debug!("open_link failed: {}", e),
            }
        }
        match self.fallback.open(url) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Could not open {}: {}", url, e);
                false
            }
        }
    }

    /// 把结构化数据交回宿主；宿主外立即失败
    pub fn send_structured_payload(&self, payload: &str, close_after: bool) -> Result<(), HandoffError> {
        let sdk = self.sdk.as_deref().ok_or(HandoffError::SubmissionUnavailable)?;
        sdk.send_data(payload)?;
        tracing::info!(bytes = payload.len(), "Structured payload sent to host");
        if close_after {
            if let Err(e) = sdk.close() {
                tracing::debug!("Close after send failed: {}", e);
            }
        }
        Ok(())
    }
}

/// 解绑失败时旧回调可能还挂着，只能把按钮藏起来；后续任一步失败同样隐藏，
/// 避免按钮带着上一个页面的文字或回调留在屏幕上
fn apply_primary(
    button: &dyn MainButton,
    primary: Option<&PrimaryAction>,
    events: &mpsc::UnboundedSender<AppEvent>,
) -> Result<(), HostError> {
    if let Err(e) = button.off_click() {
        hide_after_failure(button);
        return Err(e);
    }
    let Some(primary) = primary else {
        return button.hide();
    };
    let attached = attach_primary(button, primary, events);
    if attached.is_err() {
        hide_after_failure(button);
    }
    attached
}

fn attach_primary(
    button: &dyn MainButton,
    primary: &PrimaryAction,
    events: &mpsc::UnboundedSender<AppEvent>,
) -> Result<(), HostError> {
    button.set_text(&primary.label)?;
    if primary.enabled {
        button.enable()?;
    } else {
        button.disable()?;
    }
    let action = primary.action.clone();
    let tx = events.clone();
    button.on_click(Box::new(move || {
        let _ = tx.send(AppEvent::Action(action.clone()));
    }))?;
    button.show()
}

fn hide_after_failure(button: &dyn MainButton) {
    if let Err(e) = button.hide() {
        tracing::debug!("Main button hide failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Action, View};
    use crate::host::{RecordingHost, RecordingOpener};

    fn bridge(host: &Arc<RecordingHost>, opener: &Arc<RecordingOpener>) -> HostBridge {
        HostBridge::new(Some(host.clone() as Arc<dyn HostSdk>), opener.clone())
    }

    #[test]
    fn test_classify_link() {
        assert_eq!(classify_link("https://t.me/kmipt_manager"), LinkKind::HostDeepLink);
        assert_eq!(classify_link("tg://resolve?domain=kmipt"), LinkKind::HostDeepLink);
        assert_eq!(classify_link("https://kmipt.ru/courses"), LinkKind::External);
        assert_eq!(classify_link("not a url"), LinkKind::External);
    }

    #[test]
    fn test_absent_host_gives_empty_session() {
        let opener = Arc::new(RecordingOpener::succeeding());
        let bridge = HostBridge::detached(opener);
        assert_eq!(bridge.init_session(), HostSession::default());
        assert!(!bridge.has_main_button());
        bridge.trigger_haptic(HapticKind::Success);
    }

    #[test]
    fn test_failed_ready_degrades_silently() {
        let host = Arc::new(RecordingHost::full().with_init_data("auth").failing_ready());
        let opener = Arc::new(RecordingOpener::succeeding());
        let session = bridge(&host, &opener).init_session();
        assert_eq!(session, HostSession::default());
    }

    #[test]
    fn test_session_carries_init_data() {
        let host = Arc::new(RecordingHost::full().with_init_data("auth"));
        let opener = Arc::new(RecordingOpener::succeeding());
        let session = bridge(&host, &opener).init_session();
        assert!(session.in_host);
        assert_eq!(session.init_data.as_deref(), Some("auth"));
        assert_eq!(host.calls()[..2], ["ready".to_string(), "expand".to_string()]);
    }

    #[test]
    fn test_sync_detaches_before_attaching() {
        let host = Arc::new(RecordingHost::full());
        let opener = Arc::new(RecordingOpener::succeeding());
        let bridge = bridge(&host, &opener);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let primary = PrimaryAction {
            label: "Показать варианты".into(),
            enabled: false,
            action: Action::Search,
        };
        bridge.sync_primary_action(Some(&primary), &tx);
        bridge.sync_primary_action(Some(&primary), &tx);

        let calls = host.calls();
        let offs: Vec<usize> = calls.iter().enumerate().filter(|(_, c)| *c == "off_click").map(|(i, _)| i).collect();
        let ons: Vec<usize> = calls.iter().enumerate().filter(|(_, c)| *c == "on_click").map(|(i, _)| i).collect();
        assert_eq!(offs.len(), 2);
        assert_eq!(ons.len(), 2);
        assert!(offs[0] < ons[0] && ons[0] < offs[1] && offs[1] < ons[1]);
        assert!(calls.contains(&"disable".to_string()));
        assert_eq!(host.handler_count(), 1);

        assert!(host.click());
        match rx.try_recv().unwrap() {
            AppEvent::Action(Action::Search) => {}
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_sync_hides_without_primary() {
        let host = Arc::new(RecordingHost::full());
        let opener = Arc::new(RecordingOpener::succeeding());
        let (tx, _rx) = mpsc::unbounded_channel();
        let bridge = bridge(&host, &opener);
        bridge.sync_primary_action(
            Some(&PrimaryAction {
                label: "Подобрать".into(),
                enabled: true,
                action: Action::Navigate(View::Picker),
            }),
            &tx,
        );
        bridge.sync_primary_action(None, &tx);
        assert_eq!(host.calls().last().map(String::as_str), Some("hide"));
        assert_eq!(host.handler_count(), 0);
    }

    fn primary(label: &str, action: Action) -> PrimaryAction {
        PrimaryAction {
            label: label.into(),
            enabled: true,
            action,
        }
    }

    #[test]
    fn test_sync_hides_button_when_handler_cannot_be_detached() {
        let host = Arc::new(RecordingHost::full());
        let opener = Arc::new(RecordingOpener::succeeding());
        let bridge = bridge(&host, &opener);
        let (tx, mut rx) = mpsc::unbounded_channel();

        bridge.sync_primary_action(Some(&primary("Показать варианты", Action::Search)), &tx);
        assert!(host.click());
        assert!(matches!(rx.try_recv(), Ok(AppEvent::Action(Action::Search))));

        host.refuse_button_call("off_click");
        bridge.sync_primary_action(Some(&primary("Связаться с менеджером", Action::ContactManager)), &tx);

        let calls = host.calls();
        assert_eq!(calls.last().map(String::as_str), Some("hide"));
        assert!(!calls.contains(&"set_text:Связаться с менеджером".to_string()));
        assert!(!host.click());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_sync_hides_button_when_later_step_fails() {
        let host = Arc::new(RecordingHost::full());
        let opener = Arc::new(RecordingOpener::succeeding());
        let bridge = bridge(&host, &opener);
        let (tx, _rx) = mpsc::unbounded_channel();

        bridge.sync_primary_action(Some(&primary("Подобрать программу", Action::Navigate(View::Picker))), &tx);
        host.refuse_button_call("set_text");
        bridge.sync_primary_action(Some(&primary("Показать варианты", Action::Search)), &tx);

        assert_eq!(host.calls().last().map(String::as_str), Some("hide"));
        assert_eq!(host.handler_count(), 0);
        assert!(!host.click());
    }

    #[test]
    fn test_deep_link_prefers_host_opener() {
        let host = Arc::new(RecordingHost::full());
        let opener = Arc::new(RecordingOpener::succeeding());
        assert!(bridge(&host, &opener).open_external_link("https://t.me/manager"));
        assert!(host.calls().contains(&"open_host_link:https://t.me/manager".to_string()));
        assert!(opener.opened().is_empty());
    }

    #[test]
    fn test_link_falls_back_to_window() {
        let host = Arc::new(RecordingHost::minimal());
        let opener = Arc::new(RecordingOpener::succeeding());
        assert!(bridge(&host, &opener).open_external_link("https://t.me/manager"));
        assert_eq!(opener.opened(), vec!["https://t.me/manager".to_string()]);

        let failing = Arc::new(RecordingOpener::failing());
        assert!(!bridge(&host, &failing).open_external_link("https://kmipt.ru"));
    }

    #[test]
    fn test_send_payload_requires_host() {
        let opener = Arc::new(RecordingOpener::succeeding());
        let detached = HostBridge::detached(opener.clone());
        assert!(matches!(
            detached.send_structured_payload("{}", true),
            Err(HandoffError::SubmissionUnavailable)
        ));

        let minimal = Arc::new(RecordingHost::minimal());
        assert!(matches!(
            bridge(&minimal, &opener).send_structured_payload("{}", true),
            Err(HandoffError::SubmissionUnavailable)
        ));

        let host = Arc::new(RecordingHost::full());
        bridge(&host, &opener).send_structured_payload("{\"flow\":\"catalog\"}", true).unwrap();
        assert_eq!(host.sent(), vec!["{\"flow\":\"catalog\"}".to_string()]);
        assert!(host.calls().contains(&"close".to_string()));
    }
}
