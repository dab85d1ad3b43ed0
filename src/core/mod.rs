//! 核心层：选课条件、应用状态、错误类型、对话引擎与主控循环

pub mod controller;
pub mod conversation;
pub mod criteria;
pub mod error;
pub mod state;

pub use controller::{Action, App, AppEvent};
pub use conversation::{AskOutcome, ConversationEngine, PROGRESS_CAPTIONS};
pub use criteria::{Criteria, CriteriaChoice, Format, Goal, Grade, Subject};
pub use error::{GatewayError, HandoffError, HostError};
pub use state::{AppState, ChatMessage, ChatRole, IdentityState, ProgressState, View, ONBOARDING_DISMISSED};
