//! 终端预览用的模拟宿主
//!
//! 主按钮显示在底栏，F2 触发；触感与数据回传只写日志。外链交给 HostBridge 的兜底打开器。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{ClickHandler, HapticKind, HostSdk, MainButton};
use crate::core::HostError;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 主按钮当前外观（供底栏绘制）
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ButtonFace {
    pub text: String,
    pub enabled: bool,
    pub visible: bool,
}

#[derive(Default)]
struct TerminalButton {
    face: Mutex<ButtonFace>,
    handler: Mutex<Option<ClickHandler>>,
}

impl MainButton for TerminalButton {
    fn set_text(&self, text: &str) -> Result<(), HostError> {
        lock(&self.face).text = text.to_string();
        Ok(())
    }

    fn enable(&self) -> Result<(), HostError> {
        lock(&self.face).enabled = true;
        Ok(())
    }

    fn disable(&self) -> Result<(), HostError> {
        lock(&self.face).enabled = false;
        Ok(())
    }

    fn show(&self) -> Result<(), HostError> {
        lock(&self.face).visible = true;
        Ok(())
    }

    fn hide(&self) -> Result<(), HostError> {
        lock(&self.face).visible = false;
        Ok(())
    }

    fn on_click(&self, handler: ClickHandler) -> Result<(), HostError> {
        *lock(&self.handler) = Some(handler);
        Ok(())
    }

    fn off_click(&self) -> Result<(), HostError> {
        lock(&self.handler).take();
        Ok(())
    }
}

pub struct TerminalHost {
    init_data: Option<String>,
    button: TerminalButton,
    closed: AtomicBool,
}

impl TerminalHost {
    pub fn new(init_data: Option<String>) -> Self {
        Self {
            init_data,
            button: TerminalButton::default(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn button_face(&self) -> ButtonFace {
        lock(&self.button.face).clone()
    }

    /// F2：按钮可见且可用时触发当前回调
    pub fn press_main_button(&self) -> bool {
        let face = self.button_face();
        if !face.visible || !face.enabled {
            return false;
        }
        match lock(&self.button.handler).as_ref() {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }

    /// 应用请求关闭（如转接后）
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl HostSdk for TerminalHost {
    fn ready(&self) -> Result<(), HostError> {
        Ok(())
    }

    fn expand(&self) -> Result<(), HostError> {
        Ok(())
    }

    fn init_data(&self) -> Option<String> {
        self.init_data.clone()
    }

    fn haptic(&self, kind: HapticKind) -> Result<(), HostError> {
        tracing::debug!("haptic {:?}", kind);
        Ok(())
    }

    fn main_button(&self) -> Option<&dyn MainButton> {
        Some(&self.button)
    }

    fn send_data(&self, data: &str) -> Result<(), HostError> {
        tracing::info!(payload = data, "send_data");
        Ok(())
    }

    fn close(&self) -> Result<(), HostError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_press_respects_disabled_state() {
        let host = TerminalHost::new(None);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let button = host.main_button().unwrap();
        button
            .on_click(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        button.show().unwrap();
        assert!(!host.press_main_button());
        button.enable().unwrap();
        assert!(host.press_main_button());
        button.off_click().unwrap();
        assert!(!host.press_main_button());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsupported_links_and_close() {
        let host = TerminalHost::new(Some("dev".into()));
        assert!(matches!(host.open_link("https://x"), Err(HostError::Unsupported(_))));
        assert!(!host.is_closed());
        host.close().unwrap();
        assert!(host.is_closed());
        assert_eq!(host.init_data().as_deref(), Some("dev"));
    }
}
