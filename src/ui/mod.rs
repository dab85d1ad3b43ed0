//! 终端预览：Ratatui + crossterm，主循环（app）、事件（event）、渲染（render）

pub mod app;
pub mod event;
pub mod render;

pub use app::{run_app, Shell};
pub use event::ShellCommand;
pub use render::draw;
