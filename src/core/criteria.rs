//! 选课条件：年级 / 目标 / 科目 / 形式
//!
//! 四个字段互相独立、单选；全部非空才算完整，完整后才允许发起目录搜索。
//! 每个枚举同时给出线上编码（serde snake_case）与固定的俄文标签。

use serde::{Deserialize, Serialize};

/// 年级（1..=11），越界值构造失败
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Grade(u8);

impl Grade {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 11;

    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn label(self) -> String {
        format!("{} кл.", self.0)
    }

    /// 全部可选年级（选择器按钮顺序）
    pub fn all() -> impl Iterator<Item = Grade> {
        (Self::MIN..=Self::MAX).map(Grade)
    }
}

impl TryFrom<u8> for Grade {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Grade::new(value).ok_or_else(|| format!("grade out of range: {value}"))
    }
}

impl From<Grade> for u8 {
    fn from(grade: Grade) -> Self {
        grade.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    Ege,
    Oge,
    Olympiad,
    Camp,
    Base,
}

impl Goal {
    pub const ALL: [Goal; 5] = [Goal::Ege, Goal::Oge, Goal::Olympiad, Goal::Camp, Goal::Base];

    pub fn code(self) -> &'static str {
        match self {
            Goal::Ege => "ege",
            Goal::Oge => "oge",
            Goal::Olympiad => "olympiad",
            Goal::Camp => "camp",
            Goal::Base => "base",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Goal::Ege => "ЕГЭ",
            Goal::Oge => "ОГЭ",
            Goal::Olympiad => "Олимпиада",
            Goal::Camp => "Лагерь",
            Goal::Base => "Успеваемость",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Math,
    Physics,
    Informatics,
    /// 「不限」
    Any,
}

impl Subject {
    pub const ALL: [Subject; 4] = [
        Subject::Math,
        Subject::Physics,
        Subject::Informatics,
        Subject::Any,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Subject::Math => "math",
            Subject::Physics => "physics",
            Subject::Informatics => "informatics",
            Subject::Any => "any",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Subject::Math => "Математика",
            Subject::Physics => "Физика",
            Subject::Informatics => "Информатика",
            Subject::Any => "Не важно",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    Online,
    Offline,
    Hybrid,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Online, Format::Offline, Format::Hybrid];

    pub fn code(self) -> &'static str {
        match self {
            Format::Online => "online",
            Format::Offline => "offline",
            Format::Hybrid => "hybrid",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Format::Online => "Онлайн",
            Format::Offline => "Очно",
            Format::Hybrid => "Смешанный",
        }
    }
}

/// 单个字段的选择（选择器事件统一入口）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CriteriaChoice {
    Grade(Grade),
    Goal(Goal),
    Subject(Subject),
    Format(Format),
}

/// 选课条件；brand 来自配置，不由用户选择
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criteria {
    pub brand: String,
    pub grade: Option<Grade>,
    pub goal: Option<Goal>,
    pub subject: Option<Subject>,
    pub format: Option<Format>,
}

impl Criteria {
    pub fn new(brand: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
            grade: None,
            goal: None,
            subject: None,
            format: None,
        }
    }

    /// 只改动对应字段，兄弟字段保持不变
    pub fn apply(&mut self, choice: CriteriaChoice) {
        match choice {
            CriteriaChoice::Grade(g) => self.grade = Some(g),
            CriteriaChoice::Goal(g) => self.goal = Some(g),
            CriteriaChoice::Subject(s) => self.subject = Some(s),
            CriteriaChoice::Format(f) => self.format = Some(f),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.grade.is_some() && self.goal.is_some() && self.subject.is_some() && self.format.is_some()
    }

    /// 清空四个字段，保留 brand
    pub fn clear(&mut self) {
        self.grade = None;
        self.goal = None;
        self.subject = None;
        self.format = None;
    }

    /// 完整时给出搜索查询参数（顺序固定）；不完整返回 None
    pub fn query_pairs(&self) -> Option<Vec<(&'static str, String)>> {
        let (grade, goal, subject, format) = (self.grade?, self.goal?, self.subject?, self.format?);
        Some(vec![
            ("brand", self.brand.clone()),
            ("grade", grade.value().to_string()),
            ("goal", goal.code().to_string()),
            ("subject", subject.code().to_string()),
            ("format", format.code().to_string()),
        ])
    }

    /// 人类可读摘要，未选字段写「не указано」
    pub fn summary(&self) -> String {
        const UNSET: &str = "не указано";
        format!(
            "Класс: {}; Цель: {}; Предмет: {}; Формат: {}",
            self.grade.map(Grade::label).unwrap_or_else(|| UNSET.to_string()),
            self.goal.map(Goal::label).unwrap_or(UNSET),
            self.subject.map(Subject::label).unwrap_or(UNSET),
            self.format.map(Format::label).unwrap_or(UNSET),
        )
    }
}
