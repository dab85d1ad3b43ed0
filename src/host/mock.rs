//! 记录型宿主（用于测试）
//!
//! 按构造方式声明具备哪些能力，并按顺序记录每一次 SDK 调用。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{ClickHandler, HapticKind, HostSdk, MainButton, WindowOpener};
use crate::api::UserProfile;
use crate::core::HostError;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct Capabilities {
    main_button: bool,
    haptics: bool,
    host_links: bool,
    links: bool,
    send_data: bool,
    fail_ready: bool,
}

pub struct RecordingHost {
    caps: Capabilities,
    init_data: Option<String>,
    user: Option<UserProfile>,
    calls: Arc<Mutex<Vec<String>>>,
    sent: Mutex<Vec<String>>,
    button: RecordingButton,
}

struct RecordingButton {
    calls: Arc<Mutex<Vec<String>>>,
    handler: Mutex<Option<ClickHandler>>,
    visible: AtomicBool,
    /// 宿主不支持的按钮方法名
    refused: Mutex<Vec<&'static str>>,
}

impl RecordingHost {
    fn with_caps(caps: Capabilities) -> Self {
        let calls = Arc::new(Mutex::new(Vec::new()));
        Self {
            caps,
            init_data: None,
            user: None,
            button: RecordingButton {
                calls: calls.clone(),
                handler: Mutex::new(None),
                visible: AtomicBool::new(false),
                refused: Mutex::new(Vec::new()),
            },
            calls,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// 全部能力可用
    pub fn full() -> Self {
        Self::with_caps(Capabilities {
            main_button: true,
            haptics: true,
            host_links: true,
            links: true,
            send_data: true,
            fail_ready: false,
        })
    }

    /// 只支持 ready / expand
    pub fn minimal() -> Self {
        Self::with_caps(Capabilities::default())
    }

    pub fn with_init_data(mut self, init_data: &str) -> Self {
        self.init_data = Some(init_data.to_string());
        self
    }

    pub fn with_user(mut self, user: UserProfile) -> Self {
        self.user = Some(user);
        self
    }

    pub fn without_links(mut self) -> Self {
        self.caps.host_links = false;
        self.caps.links = false;
        self
    }

    pub fn without_send_data(mut self) -> Self {
        self.caps.send_data = false;
        self
    }

    pub fn failing_ready(mut self) -> Self {
        self.caps.fail_ready = true;
        self
    }

    /// 之后对该主按钮方法的调用一律返回 Unsupported
    pub fn refuse_button_call(&self, method: &'static str) {
        lock(&self.button.refused).push(method);
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn sent(&self) -> Vec<String> {
        lock(&self.sent).clone()
    }

    /// 当前绑定的主按钮回调数量（0 或 1）
    pub fn handler_count(&self) -> usize {
        usize::from(lock(&self.button.handler).is_some())
    }

    /// 模拟用户点击主按钮；按钮隐藏或没有回调时返回 false
    pub fn click(&self) -> bool {
        if !self.button.visible.load(Ordering::SeqCst) {
            return false;
        }
        let guard = lock(&self.button.handler);
        match guard.as_ref() {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }

    fn record(&self, call: impl Into<String>) {
        lock(&self.calls).push(call.into());
    }
}

impl RecordingButton {
    fn check(&self, method: &'static str) -> Result<(), HostError> {
        if lock(&self.refused).contains(&method) {
            return Err(HostError::Unsupported(method));
        }
        Ok(())
    }

    fn record(&self, call: impl Into<String>) -> Result<(), HostError> {
        lock(&self.calls).push(call.into());
        Ok(())
    }
}

impl MainButton for RecordingButton {
    fn set_text(&self, text: &str) -> Result<(), HostError> {
        self.check("set_text")?;
        self.record(format!("set_text:{text}"))
    }

    fn enable(&self) -> Result<(), HostError> {
        self.check("enable")?;
        self.record("enable")
    }

    fn disable(&self) -> Result<(), HostError> {
        self.check("disable")?;
        self.record("disable")
    }

    fn show(&self) -> Result<(), HostError> {
        self.check("show")?;
        self.visible.store(true, Ordering::SeqCst);
        self.record("show")
    }

    fn hide(&self) -> Result<(), HostError> {
        self.check("hide")?;
        self.visible.store(false, Ordering::SeqCst);
        self.record("hide")
    }

    fn on_click(&self, handler: ClickHandler) -> Result<(), HostError> {
        self.check("on_click")?;
        // 宿主只保留一个订阅：未解绑就再次绑定会导致旧回调残留
        let mut slot = lock(&self.handler);
        if slot.is_some() {
            return Err(HostError::Failed("stale click handler still attached".into()));
        }
        *slot = Some(handler);
        drop(slot);
        self.record("on_click")
    }

    fn off_click(&self) -> Result<(), HostError> {
        self.check("off_click")?;
        lock(&self.handler).take();
        self.record("off_click")
    }
}

impl HostSdk for RecordingHost {
    fn ready(&self) -> Result<(), HostError> {
        self.record("ready");
        if self.caps.fail_ready {
            return Err(HostError::Failed("ready rejected".into()));
        }
        Ok(())
    }

    fn expand(&self) -> Result<(), HostError> {
        self.record("expand");
        Ok(())
    }

    fn init_data(&self) -> Option<String> {
        self.init_data.clone()
    }

    fn user(&self) -> Option<UserProfile> {
        self.user.clone()
    }

    fn haptic(&self, kind: HapticKind) -> Result<(), HostError> {
        if !self.caps.haptics {
            return Err(HostError::Unsupported("haptic"));
        }
        self.record(format!("haptic:{kind:?}"));
        Ok(())
    }

    fn main_button(&self) -> Option<&dyn MainButton> {
        self.caps.main_button.then_some(&self.button as &dyn MainButton)
    }

    fn open_host_link(&self, url: &str) -> Result<(), HostError> {
        if !self.caps.host_links {
            return Err(HostError::Unsupported("open_host_link"));
        }
        self.record(format!("open_host_link:{url}"));
        Ok(())
    }

    fn open_link(&self, url: &str) -> Result<(), HostError> {
        if !self.caps.links {
            return Err(HostError::Unsupported("open_link"));
        }
        self.record(format!("open_link:{url}"));
        Ok(())
    }

    fn send_data(&self, data: &str) -> Result<(), HostError> {
        if !self.caps.send_data {
            return Err(HostError::Unsupported("send_data"));
        }
        lock(&self.sent).push(data.to_string());
        self.record("send_data");
        Ok(())
    }

    fn close(&self) -> Result<(), HostError> {
        self.record("close");
        Ok(())
    }
}

/// 记录型兜底打开器
pub struct RecordingOpener {
    succeed: bool,
    opened: Mutex<Vec<String>>,
}

impl RecordingOpener {
    pub fn succeeding() -> Self {
        Self {
            succeed: true,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            succeed: false,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn opened(&self) -> Vec<String> {
        lock(&self.opened).clone()
    }
}

impl WindowOpener for RecordingOpener {
    fn open(&self, url: &str) -> Result<(), HostError> {
        if !self.succeed {
            return Err(HostError::Failed("popup blocked".into()));
        }
        lock(&self.opened).push(url.to_string());
        Ok(())
    }
}
