//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MINIAPP__*` 覆盖（双下划线表示嵌套，如 `MINIAPP__API__BASE_URL=https://...`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub api: ApiSection,
    pub host: HostSection,
    pub conversation: ConversationSection,
    pub handoff: HandoffSection,
}

/// [app] 段：应用名、品牌代码、数据目录（日志与本地偏好）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    /// 搜索与问答请求里的 brand 字段
    pub brand: String,
    pub data_dir: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "miniapp".to_string(),
            brand: "kmipt".to_string(),
            data_dir: PathBuf::from("data"),
        }
    }
}

/// [api] 段：后端地址（不设超时，挂起的请求由传输层自己报错）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub base_url: String,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
        }
    }
}

/// [host] 段：终端预览是否模拟宿主；开发用的 initData
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HostSection {
    pub emulate: bool,
    pub init_data: Option<String>,
}

/// [conversation] 段：进度计时器
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConversationSection {
    pub tick_interval_ms: u64,
    /// 每隔多少秒切换一条进度提示
    pub caption_step_secs: u32,
}

impl Default for ConversationSection {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            caption_step_secs: 3,
        }
    }
}

/// [handoff] 段：转接人工的体积上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HandoffSection {
    /// 结构化数据序列化后达到该字节数即拒绝
    pub max_payload_bytes: usize,
    /// 直连摘要的最大字符数
    pub summary_max_chars: usize,
    pub close_after_send: bool,
}

impl Default for HandoffSection {
    fn default() -> Self {
        Self {
            max_payload_bytes: 4096,
            summary_max_chars: 900,
            close_after_send: true,
        }
    }
}

/// 从 config 目录加载配置，环境变量 MINIAPP__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 MINIAPP__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MINIAPP")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
