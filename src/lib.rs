//! 销售助手 Mini App 客户端运行时
//!
//! 模块划分：
//! - **api**: 后端接口（元信息 / 身份 / 课程搜索 / 助手问答）与错误体解析
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 选课条件、应用状态、对话引擎、主控循环
//! - **handoff**: 转接人工的结构化数据与上下文摘要
//! - **host**: 可选宿主 SDK 的桥接与降级
//! - **observability**: 日志
//! - **storage**: 本地偏好（引导提示是否已关闭）
//! - **ui**: Ratatui 终端预览
//! - **view**: 由状态生成的视图树

pub mod api;
pub mod config;
pub mod core;
pub mod handoff;
pub mod host;
pub mod observability;
pub mod storage;
pub mod ui;
pub mod view;
