//! 界面渲染
//!
//! 把 Frame 画成三段：标题栏（品牌 · 页面），主体（节点按顺序展开，焦点控件反色），
//! 底栏（模拟宿主的主按钮与快捷键提示）。

use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame as TermFrame,
};

use crate::core::ChatRole;
use crate::host::terminal::ButtonFace;
use crate::view::{Frame, Node};

/// 将内容按宽度换行（按字符数，避免在 UTF-8 中间截断）
fn wrap_text(s: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![s.to_string()];
    }
    let mut lines = Vec::new();
    for para in s.split('\n') {
        let mut line = String::new();
        for ch in para.chars() {
            if line.chars().count() >= width {
                lines.push(std::mem::take(&mut line));
            }
            line.push(ch);
        }
        lines.push(line);
    }
    lines
}

struct Painter<'a> {
    lines: Vec<Line<'a>>,
    focus: usize,
    next_control: usize,
    width: usize,
}

impl<'a> Painter<'a> {
    fn text(&mut self, text: &str, style: Style) {
        for line in wrap_text(text, self.width) {
            self.lines.push(Line::from(Span::styled(line, style)));
        }
    }

    /// 可交互控件：与 Frame::actions 的顺序一致
    fn control(&mut self, label: String, enabled: bool, selected: bool) -> Span<'a> {
        let focused = self.next_control == self.focus;
        self.next_control += 1;
        let mut style = Style::default();
        if !enabled {
            style = style.fg(Color::DarkGray);
        } else if selected {
            style = style.fg(Color::Green).add_modifier(Modifier::BOLD);
        }
        if focused {
            style = style.add_modifier(Modifier::REVERSED);
        }
        let marker = if selected { "●" } else { " " };
        Span::styled(format!("[{marker}{label}]"), style)
    }

    fn node(&mut self, node: &Node) {
        match node {
            Node::Heading(text) => self.text(text, Style::default().add_modifier(Modifier::BOLD)),
            Node::Text(text) => self.text(text, Style::default()),
            Node::Hint { text, .. } => {
                self.text(&format!("💡 {text}"), Style::default().fg(Color::Yellow));
                let close = self.control("Скрыть".to_string(), true, false);
                self.lines.push(Line::from(close));
            }
            Node::Choices { label, options } => {
                self.text(label, Style::default().fg(Color::Cyan));
                let mut spans = Vec::new();
                for option in options {
                    spans.push(self.control(option.label.clone(), true, option.selected));
                    spans.push(Span::raw(" "));
                }
                self.lines.push(Line::from(spans));
            }
            Node::Card {
                title,
                lines,
                highlighted,
                action,
            } => {
                let style = if *highlighted {
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().add_modifier(Modifier::BOLD)
                };
                match action {
                    Some(_) => {
                        let open = self.control(title.clone(), true, false);
                        self.lines.push(Line::from(vec![Span::styled("▸ ", style), open]));
                    }
                    None => self.text(&format!("▸ {title}"), style),
                }
                for line in lines {
                    self.text(&format!("  {line}"), Style::default().fg(Color::Gray));
                }
            }
            Node::Message(message) => {
                let (prefix, color) = match message.role {
                    ChatRole::User => ("Вы: ", Color::Cyan),
                    ChatRole::Assistant => ("Ассистент: ", Color::Green),
                };
                self.lines.push(Line::from(Span::raw("")));
                self.text(&format!("{prefix}{}", message.text), Style::default().fg(color));
                if !message.sources.is_empty() {
                    self.text(
                        &format!("Источники: {}", message.sources.join(", ")),
                        Style::default().fg(Color::DarkGray),
                    );
                }
                if let Some(meta) = &message.meta {
                    self.text(meta, Style::default().fg(Color::DarkGray));
                }
            }
            Node::Progress { caption, elapsed_secs } => self.text(
                &format!("⏳ {caption} ({elapsed_secs} с)"),
                Style::default().fg(Color::Yellow),
            ),
            Node::Input {
                value,
                placeholder,
                enabled,
            } => {
                let (text, style) = if value.is_empty() {
                    (placeholder.as_str(), Style::default().fg(Color::DarkGray))
                } else if *enabled {
                    (value.as_str(), Style::default())
                } else {
                    (value.as_str(), Style::default().fg(Color::DarkGray))
                };
                self.lines.push(Line::from(Span::raw("")));
                self.text(&format!("> {text}"), style);
            }
            Node::Button { label, enabled, .. } => {
                let button = self.control(label.clone(), *enabled, false);
                self.lines.push(Line::from(button));
            }
            Node::Status { text, is_error } => {
                let color = if *is_error { Color::Red } else { Color::Green };
                self.text(text, Style::default().fg(color));
            }
        }
    }
}

/// 绘制一帧
pub fn draw(f: &mut TermFrame, frame: &Frame, focus: usize, main_button: Option<&ButtonFace>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(3)])
        .split(f.area());

    let block = Block::default()
        .title(format!(" {} ", frame.title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    let inner = block.inner(chunks[0]);

    let mut painter = Painter {
        lines: Vec::new(),
        focus,
        next_control: 0,
        width: inner.width.max(20) as usize,
    };
    for node in &frame.nodes {
        painter.node(node);
    }
    let total = painter.lines.len();
    let height = inner.height as usize;
    // 聊天页内容多时贴底显示
    let scroll = total.saturating_sub(height).min(u16::MAX as usize) as u16;
    let body = Paragraph::new(Text::from(painter.lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    f.render_widget(body, chunks[0]);

    let button = match main_button {
        Some(face) if face.visible => {
            let style = if face.enabled {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                Style::default().fg(Color::Gray).bg(Color::DarkGray)
            };
            Span::styled(format!(" F2 {} ", face.text), style)
        }
        _ => Span::raw(""),
    };
    let hint = " Tab/←→ выбор │ Enter действие │ Esc назад │ Ctrl+Q выход ";
    let footer = Paragraph::new(Line::from(button)).block(
        Block::default()
            .title_bottom(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue)),
    );
    f.render_widget(footer, chunks[1]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_text_counts_chars() {
        let lines = wrap_text("абвгд\nе", 2);
        assert_eq!(lines, vec!["аб", "вг", "д", "е"]);
        assert_eq!(wrap_text("", 10), vec![String::new()]);
    }
}
