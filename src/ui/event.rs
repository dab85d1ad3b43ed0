//! 键盘事件
//!
//! 轮询 crossterm 键盘事件并翻译成终端壳的指令；翻译本身是纯函数，便于测试。

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// 终端壳指令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Quit,
    Back,
    FocusNext,
    FocusPrev,
    /// Enter：聊天页有输入时发送，否则触发焦点所在的控件
    Activate,
    /// F2：模拟宿主主按钮
    PressMainButton,
    Char(char),
    Backspace,
}

pub fn map_key(key: KeyEvent) -> Option<ShellCommand> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    let cmd = match key.code {
        KeyCode::Char('q') | KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            ShellCommand::Quit
        }
        KeyCode::Esc => ShellCommand::Back,
        KeyCode::Tab | KeyCode::Down | KeyCode::Right => ShellCommand::FocusNext,
        KeyCode::BackTab | KeyCode::Up | KeyCode::Left => ShellCommand::FocusPrev,
        KeyCode::Enter => ShellCommand::Activate,
        KeyCode::F(2) => ShellCommand::PressMainButton,
        KeyCode::Backspace => ShellCommand::Backspace,
        KeyCode::Char(c) => ShellCommand::Char(c),
        _ => return None,
    };
    Some(cmd)
}

/// 带超时地读一个按键
pub fn poll(timeout: std::time::Duration) -> anyhow::Result<Option<ShellCommand>> {
    if event::poll(timeout)? {
        if let Event::Key(key) = event::read()? {
            return Ok(map_key(key));
        }
    }
    Ok(None)
}
