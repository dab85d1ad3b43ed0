//! 宿主平台集成
//!
//! 宿主 SDK 可能完全不存在（浏览器/终端预览），也可能只具备部分能力。
//! HostSdk 的每个方法默认返回 Unsupported，具体宿主只实现自己有的能力；
//! 所有调用都经过 HostBridge 做降级处理。

pub mod bridge;
pub mod mock;
pub mod terminal;

use std::process::{Command, Stdio};

use crate::api::UserProfile;
use crate::core::HostError;

pub use bridge::{classify_link, HostBridge, HostSession, LinkKind};
pub use mock::{RecordingHost, RecordingOpener};
pub use terminal::TerminalHost;

/// 主按钮点击回调；宿主只保留一个全局订阅
pub type ClickHandler = Box<dyn Fn() + Send + Sync>;

/// 触感反馈类型
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HapticKind {
    Selection,
    Light,
    Success,
    Warning,
    Error,
}

/// 宿主渲染的常驻主按钮
pub trait MainButton: Send + Sync {
    fn set_text(&self, text: &str) -> Result<(), HostError>;
    fn enable(&self) -> Result<(), HostError>;
    fn disable(&self) -> Result<(), HostError>;
    fn show(&self) -> Result<(), HostError>;
    fn hide(&self) -> Result<(), HostError>;
    fn on_click(&self, handler: ClickHandler) -> Result<(), HostError>;
    fn off_click(&self) -> Result<(), HostError>;
}

/// 宿主能力对象
pub trait HostSdk: Send + Sync {
    fn ready(&self) -> Result<(), HostError> {
        Err(HostError::Unsupported("ready"))
    }

    fn expand(&self) -> Result<(), HostError> {
        Err(HostError::Unsupported("expand"))
    }

    /// 宿主签名的 initData 原文
    fn init_data(&self) -> Option<String> {
        None
    }

    fn user(&self) -> Option<UserProfile> {
        None
    }

    fn haptic(&self, _kind: HapticKind) -> Result<(), HostError> {
        Err(HostError::Unsupported("haptic"))
    }

    fn main_button(&self) -> Option<&dyn MainButton> {
        None
    }

    /// 宿主内深链（如 t.me）
    fn open_host_link(&self, _url: &str) -> Result<(), HostError> {
        Err(HostError::Unsupported("open_host_link"))
    }

    /// 普通外链，由宿主打开
    fn open_link(&self, _url: &str) -> Result<(), HostError> {
        Err(HostError::Unsupported("open_link"))
    }

    /// 结构化数据回传给宿主（仅在宿主内可用）
    fn send_data(&self, _data: &str) -> Result<(), HostError> {
        Err(HostError::Unsupported("send_data"))
    }

    fn close(&self) -> Result<(), HostError> {
        Err(HostError::Unsupported("close"))
    }
}

/// 宿主之外的兜底打开方式（新窗口 / 系统浏览器）
pub trait WindowOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<(), HostError>;
}

/// 调用系统默认程序打开链接
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl WindowOpener for SystemOpener {
    fn open(&self, url: &str) -> Result<(), HostError> {
        #[cfg(target_os = "macos")]
        let mut command = {
            let mut cmd = Command::new("open");
            cmd.arg(url);
            cmd
        };

        #[cfg(target_os = "windows")]
        let mut command = {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", url]);
            cmd
        };

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        let mut command = {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(url);
            cmd
        };

        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
            .map_err(|e| HostError::Failed(e.to_string()))
    }
}
