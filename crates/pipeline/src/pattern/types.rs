//! 패턴 데이터 타입
//!
//! YAML 패턴 문서에서 역직렬화되는 항목과, 컴파일이 끝난 [`Pattern`]을 정의합니다.

use std::fmt;

use logsift_core::types::LogLevel;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::LogPipelineError;

/// 정규식 컴파일 크기 제한 (ReDoS/메모리 폭주 방지)
const REGEX_SIZE_LIMIT: usize = 1 << 20; // 1MB

/// 정규식 최대 길이
pub const MAX_REGEX_LENGTH: usize = 4096;

/// 정규식 옵션 플래그
///
/// YAML에서는 `[IGNORECASE, MULTILINE, DOTALL, VERBOSE]` 형태의 이름 목록으로 표현됩니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PatternFlags {
    /// 대소문자 무시
    pub ignore_case: bool,
    /// `^`/`$`가 각 줄에 매칭
    pub multi_line: bool,
    /// `.`이 개행에도 매칭
    pub dot_matches_new_line: bool,
    /// 패턴 내 공백/주석 무시
    pub ignore_whitespace: bool,
}

impl PatternFlags {
    /// 대소문자 무시 플래그만 설정된 값
    pub const IGNORE_CASE: Self = Self {
        ignore_case: true,
        multi_line: false,
        dot_matches_new_line: false,
        ignore_whitespace: false,
    };

    /// 플래그 이름 목록을 해석합니다.
    ///
    /// 알 수 없는 이름은 무시되지 않고 에러 목록으로 돌려줍니다.
    /// 호출 측이 엄격 모드 여부에 따라 처리합니다.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> (Self, Vec<String>) {
        let mut flags = Self::default();
        let mut unknown = Vec::new();
        for name in names {
            match name.as_ref().trim().to_ascii_uppercase().as_str() {
                "IGNORECASE" | "I" => flags.ignore_case = true,
                "MULTILINE" | "M" => flags.multi_line = true,
                "DOTALL" | "S" => flags.dot_matches_new_line = true,
                "VERBOSE" | "X" => flags.ignore_whitespace = true,
                _ => unknown.push(name.as_ref().to_owned()),
            }
        }
        (flags, unknown)
    }

    /// 설정된 플래그의 이름 목록
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.ignore_case {
            names.push("IGNORECASE");
        }
        if self.multi_line {
            names.push("MULTILINE");
        }
        if self.dot_matches_new_line {
            names.push("DOTALL");
        }
        if self.ignore_whitespace {
            names.push("VERBOSE");
        }
        names
    }
}

impl Serialize for PatternFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.names().serialize(serializer)
    }
}

/// 패턴 출처
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternOrigin {
    /// 패턴 문서의 `patterns` 섹션 또는 내장 기본값
    Standard,
    /// 패턴 문서의 `custom_patterns` 섹션 또는 런타임 추가
    Custom,
}

/// 컴파일된 분류 패턴
///
/// 등록 후에는 변경되지 않습니다. 잘못된 정규식은 생성 단계에서 거부됩니다.
#[derive(Debug, Clone, Serialize)]
pub struct Pattern {
    /// 안정적인 식별자 (`"<level>:<regex>"`)
    pub id: String,
    /// 매칭 시 부여할 레벨
    pub level: LogLevel,
    /// 원본 정규식 문자열
    pub regex: String,
    /// 우선순위 (낮을수록 먼저 적용)
    pub priority: i32,
    /// 정규식 옵션
    pub flags: PatternFlags,
    /// 출처
    pub origin: PatternOrigin,
    /// 등록 순번 (동일 우선순위 내 tie-break)
    pub seq: u64,
    #[serde(skip)]
    compiled: Regex,
}

impl Pattern {
    /// 정규식을 컴파일하여 패턴을 생성합니다.
    pub fn compile(
        level: LogLevel,
        regex: &str,
        priority: i32,
        flags: PatternFlags,
        origin: PatternOrigin,
        seq: u64,
    ) -> Result<Self, LogPipelineError> {
        let compiled = compile_regex(level, regex, flags)?;
        Ok(Self {
            id: format!("{level}:{regex}"),
            level,
            regex: regex.to_owned(),
            priority,
            flags,
            origin,
            seq,
            compiled,
        })
    }

    /// 텍스트의 어느 위치에서든 매칭되는지 확인합니다.
    pub fn is_match(&self, text: &str) -> bool {
        self.compiled.is_match(text)
    }

    /// 원본 정규식과 플래그로 다시 컴파일해 봅니다 (검증용).
    pub fn recompile(&self) -> Result<(), LogPipelineError> {
        compile_regex(self.level, &self.regex, self.flags).map(|_| ())
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (priority {})", self.id, self.priority)
    }
}

fn compile_regex(level: LogLevel, regex: &str, flags: PatternFlags) -> Result<Regex, LogPipelineError> {
    let invalid = |reason: String| LogPipelineError::Pattern {
        level: level.to_string(),
        regex: regex.to_owned(),
        reason,
    };

    if regex.is_empty() {
        return Err(invalid("regex must not be empty".to_owned()));
    }
    if regex.len() > MAX_REGEX_LENGTH {
        return Err(invalid(format!(
            "regex too long: {} bytes (max: {MAX_REGEX_LENGTH})",
            regex.len()
        )));
    }

    RegexBuilder::new(regex)
        .case_insensitive(flags.ignore_case)
        .multi_line(flags.multi_line)
        .dot_matches_new_line(flags.dot_matches_new_line)
        .ignore_whitespace(flags.ignore_whitespace)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| invalid(e.to_string()))
}

/// 패턴 문서의 단일 항목
///
/// 정규식 문자열만 쓰면 우선순위 1, 플래그 없음으로 해석됩니다.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PatternItem {
    /// 정규식 문자열
    Bare(String),
    /// 상세 항목
    Detailed {
        /// 정규식
        #[serde(default)]
        regex: String,
        /// 우선순위
        #[serde(default = "default_priority")]
        priority: i32,
        /// 플래그 이름 목록
        #[serde(default)]
        flags: Vec<String>,
    },
}

fn default_priority() -> i32 {
    1
}

impl PatternItem {
    /// (정규식, 우선순위, 플래그 이름) 으로 분해합니다.
    pub fn into_parts(self) -> (String, i32, Vec<String>) {
        match self {
            Self::Bare(regex) => (regex, default_priority(), Vec::new()),
            Self::Detailed {
                regex,
                priority,
                flags,
            } => (regex, priority, flags),
        }
    }
}

/// 패턴 YAML 문서의 최상위 구조
///
/// 레벨 순서를 보존하기 위해 섹션은 `serde_yaml::Mapping`으로 받습니다.
///
/// ```yaml
/// patterns:
///   error:
///     - regex: "ERROR|Exception"
///       priority: 1
///       flags: [IGNORECASE]
///     - "\\[FATAL\\]"
/// custom_patterns:
///   critical:
///     - regex: "OOM-KILLED"
///       priority: 0
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatternDocument {
    /// 표준 패턴 (레벨 -> 항목 목록)
    #[serde(default)]
    pub patterns: Option<serde_yaml::Mapping>,
    /// 사용자 정의 패턴 (레벨 -> 항목 목록)
    #[serde(default)]
    pub custom_patterns: Option<serde_yaml::Mapping>,
}
