//! 终端预览主循环
//!
//! 进入全屏/原始模式，读取最新 Frame 与键盘指令，把指令翻译成 Action 投递给事件循环；
//! 模拟宿主关闭（转接后）或 Ctrl+Q 时退出并恢复终端。

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::{mpsc, watch};

use super::event::{poll, ShellCommand};
use super::render::draw;
use crate::core::{Action, AppEvent, View};
use crate::host::TerminalHost;
use crate::view::{Frame, Node};

/// 焦点与输入的翻译逻辑（与终端 IO 分开，便于测试）
#[derive(Debug, Default)]
pub struct Shell {
    focus: usize,
}

impl Shell {
    pub fn focus(&self) -> usize {
        self.focus
    }

    /// 翻译一条指令；返回要投递的事件
    pub fn translate(&mut self, cmd: ShellCommand, frame: &Frame) -> Option<AppEvent> {
        let actions = frame.actions();
        self.focus = self.focus.min(actions.len().saturating_sub(1));
        match cmd {
            ShellCommand::Quit => Some(AppEvent::Quit),
            ShellCommand::Back => {
                self.focus = 0;
                Some(AppEvent::Action(Action::Back))
            }
            ShellCommand::FocusNext => {
                if !actions.is_empty() {
                    self.focus = (self.focus + 1) % actions.len();
                }
                None
            }
            ShellCommand::FocusPrev => {
                if !actions.is_empty() {
                    self.focus = (self.focus + actions.len() - 1) % actions.len();
                }
                None
            }
            ShellCommand::Activate => {
                if frame.view == View::Chat && !chat_input(frame).trim().is_empty() {
                    return Some(AppEvent::Action(Action::SubmitQuestion));
                }
                let (_, action, enabled) = actions.get(self.focus)?;
                if !enabled {
                    return None;
                }
                if matches!(action, Action::Navigate(_)) {
                    self.focus = 0;
                }
                Some(AppEvent::Action(action.clone()))
            }
            // 逐键投递，由事件循环在最新输入上编辑；画面可能还没刷新
            ShellCommand::Char(c) if frame.view == View::Chat => Some(AppEvent::Action(Action::InputChar(c))),
            ShellCommand::Backspace if frame.view == View::Chat => Some(AppEvent::Action(Action::InputBackspace)),
            ShellCommand::PressMainButton | ShellCommand::Char(_) | ShellCommand::Backspace => None,
        }
    }
}

fn chat_input(frame: &Frame) -> &str {
    frame
        .nodes
        .iter()
        .find_map(|n| match n {
            Node::Input { value, .. } => Some(value.as_str()),
            _ => None,
        })
        .unwrap_or("")
}

/// 运行终端预览：host 为 None 时表示完全没有宿主
pub async fn run_app(
    mut frames: watch::Receiver<Frame>,
    events: mpsc::UnboundedSender<AppEvent>,
    host: Option<Arc<TerminalHost>>,
) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &mut frames, &events, host.as_deref()).await;
    let _ = events.send(AppEvent::Quit);
    restore_terminal(&mut terminal)?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    frames: &mut watch::Receiver<Frame>,
    events: &mpsc::UnboundedSender<AppEvent>,
    host: Option<&TerminalHost>,
) -> anyhow::Result<()> {
    let mut shell = Shell::default();
    loop {
        let frame = frames.borrow_and_update().clone();
        let face = host.map(TerminalHost::button_face);
        terminal.draw(|f| draw(f, &frame, shell.focus(), face.as_ref()))?;

        if host.is_some_and(TerminalHost::is_closed) {
            tracing::info!("Host closed the mini app");
            return Ok(());
        }

        if let Some(cmd) = poll(Duration::from_millis(100))? {
            if cmd == ShellCommand::PressMainButton {
                if let Some(host) = host {
                    host.press_main_button();
                }
                continue;
            }
            if let Some(event) = shell.translate(cmd, &frame) {
                let quit = matches!(event, AppEvent::Quit);
                if events.send(event).is_err() || quit {
                    return Ok(());
                }
            }
        }

        tokio::task::yield_now().await;
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AppState;
    use crate::host::HostSession;
    use crate::view::render;

    fn frame(view: View, input: &str) -> Frame {
        let mut state = AppState::new("kmipt", HostSession::default(), true);
        state.view = view;
        state.chat_input = input.to_string();
        render(&state)
    }

    #[test]
    fn test_typing_in_chat() {
        let mut shell = Shell::default();
        let stale = frame(View::Chat, "Прив");
        let typed: Vec<_> = "ет"
            .chars()
            .filter_map(|c| match shell.translate(ShellCommand::Char(c), &stale) {
                Some(AppEvent::Action(Action::InputChar(c))) => Some(c),
                _ => None,
            })
            .collect();
        assert_eq!(typed, vec!['е', 'т']);
        assert!(matches!(
            shell.translate(ShellCommand::Backspace, &stale),
            Some(AppEvent::Action(Action::InputBackspace))
        ));
        assert!(matches!(
            shell.translate(ShellCommand::Activate, &frame(View::Chat, "Привет")),
            Some(AppEvent::Action(Action::SubmitQuestion))
        ));
        assert!(shell.translate(ShellCommand::Char('x'), &frame(View::Home, "")).is_none());
    }

    #[test]
    fn test_focus_wraps_and_activates() {
        let mut shell = Shell::default();
        let home = frame(View::Home, "");
        let count = home.actions().len();
        assert!(count >= 2);
        shell.translate(ShellCommand::FocusPrev, &home);
        assert_eq!(shell.focus(), count - 1);
        shell.translate(ShellCommand::FocusNext, &home);
        assert_eq!(shell.focus(), 0);
        assert!(matches!(
            shell.translate(ShellCommand::Activate, &home),
            Some(AppEvent::Action(Action::Navigate(View::Chat)))
        ));
    }
}
