//! 패턴 로더 -- 파일, 인라인 문서, 내장 기본값에서 [`PatternSet`]을 만듭니다.
//!
//! 관대한(lenient) 로드는 실패하지 않습니다. 소스를 읽을 수 없거나 문서가 깨져 있으면
//! 내장 기본값으로 대체하고, 개별 항목 오류는 진단 메시지로 남긴 뒤 건너뜁니다.
//! 엄격한(strict) 로드는 같은 상황에서 에러를 반환합니다.

use std::fmt;
use std::path::{Path, PathBuf};

use logsift_core::types::LogLevel;
use serde_yaml::{Mapping, Value};

use super::set::PatternSet;
use super::types::{PatternDocument, PatternFlags, PatternItem, PatternOrigin};
use crate::error::LogPipelineError;

/// 패턴 파일 최대 크기
const MAX_PATTERN_FILE_SIZE: u64 = 1024 * 1024; // 1MB

/// 패턴 문서당 최대 항목 수
const MAX_PATTERN_COUNT: usize = 10_000;

/// 패턴 소스
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSource {
    /// YAML 파일 경로
    File(PathBuf),
    /// YAML 문서 문자열
    Inline(String),
    /// 내장 기본 패턴
    Defaults,
}

impl PatternSource {
    /// 파일 소스를 생성합니다.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }

    /// 인라인 문서 소스를 생성합니다.
    pub fn inline(document: impl Into<String>) -> Self {
        Self::Inline(document.into())
    }
}

impl fmt::Display for PatternSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Inline(_) => f.write_str("inline"),
            Self::Defaults => f.write_str("defaults"),
        }
    }
}

/// 패턴 로더
pub struct PatternLoader;

impl PatternLoader {
    /// 내장 기본 패턴 집합
    ///
    /// error/warning/info/debug 네 레벨에 대해 키워드 패턴과 대괄호 태그 패턴을 제공합니다.
    pub fn defaults() -> PatternSet {
        let defaults: [(LogLevel, &str, i32, PatternFlags); 8] = [
            (
                LogLevel::Error,
                r"ERROR|Exception|Traceback|Fatal|Critical",
                1,
                PatternFlags::IGNORE_CASE,
            ),
            (
                LogLevel::Error,
                r"\[ERROR\]|\[FATAL\]|\[CRITICAL\]",
                1,
                PatternFlags::default(),
            ),
            (LogLevel::Warning, r"WARNING|WARN", 2, PatternFlags::IGNORE_CASE),
            (
                LogLevel::Warning,
                r"\[WARNING\]|\[WARN\]",
                2,
                PatternFlags::default(),
            ),
            (
                LogLevel::Info,
                r"INFO|Starting|Stopping|Listening|Server",
                3,
                PatternFlags::IGNORE_CASE,
            ),
            (LogLevel::Info, r"\[INFO\]", 3, PatternFlags::default()),
            (LogLevel::Debug, r"DEBUG", 4, PatternFlags::IGNORE_CASE),
            (LogLevel::Debug, r"\[DEBUG\]", 4, PatternFlags::default()),
        ];

        let mut set = PatternSet::empty();
        for (level, regex, priority, flags) in defaults {
            if let Err(e) = set.insert(level, regex, priority, flags, PatternOrigin::Standard) {
                set.push_diagnostic(e.to_string());
            }
        }
        set.finish()
    }

    /// 소스에서 패턴을 로드합니다. 실패하지 않습니다.
    ///
    /// - 파일이 없으면 기본값 사용 (진단 없음)
    /// - 읽기 실패/문서 손상 시 기본값 사용 (진단 기록)
    /// - 잘못된 개별 항목은 건너뛰고 진단 기록
    pub async fn load(source: &PatternSource) -> PatternSet {
        let text = match Self::read_source(source).await {
            Ok(Some(text)) => text,
            Ok(None) => return Self::defaults(),
            Err(SourceError::NotFound) => {
                tracing::warn!(source = %source, "pattern file not found, using defaults");
                return Self::defaults();
            }
            Err(SourceError::Failed(reason)) => {
                tracing::error!(source = %source, reason = %reason, "failed to read patterns, using defaults");
                let mut set = Self::defaults();
                set.push_diagnostic(format!("failed to read {source}: {reason}"));
                return set;
            }
        };

        match Self::parse_document(&text, false) {
            Ok(set) => {
                tracing::info!(
                    source = %source,
                    patterns = set.len(),
                    skipped = set.diagnostics().len(),
                    "loaded log patterns"
                );
                set
            }
            Err(e) => {
                tracing::error!(source = %source, error = %e, "failed to parse patterns, using defaults");
                let mut set = Self::defaults();
                set.push_diagnostic(format!("failed to parse {source}: {e}"));
                set
            }
        }
    }

    /// 소스에서 패턴을 엄격하게 로드합니다.
    ///
    /// # Errors
    /// - 파일이 없거나 읽을 수 없는 경우
    /// - 문서가 YAML로 해석되지 않는 경우
    /// - 잘못된 항목(정규식, 레벨, 플래그)이 하나라도 있는 경우
    pub async fn try_load(source: &PatternSource) -> Result<PatternSet, LogPipelineError> {
        let text = match Self::read_source(source).await {
            Ok(Some(text)) => text,
            Ok(None) => return Ok(Self::defaults()),
            Err(SourceError::NotFound) => {
                return Err(LogPipelineError::PatternLoad {
                    source_name: source.to_string(),
                    reason: "file not found".to_owned(),
                });
            }
            Err(SourceError::Failed(reason)) => {
                return Err(LogPipelineError::PatternLoad {
                    source_name: source.to_string(),
                    reason,
                });
            }
        };

        Self::parse_document(&text, true).map_err(|e| match e {
            LogPipelineError::PatternLoad { reason, .. } => LogPipelineError::PatternLoad {
                source_name: source.to_string(),
                reason,
            },
            other => other,
        })
    }

    /// YAML 문서 문자열을 파싱합니다.
    ///
    /// `strict`가 false이면 잘못된 항목을 진단으로 남기고 건너뜁니다.
    /// 문서 자체가 손상된 경우에는 두 모드 모두 에러를 반환합니다.
    pub fn parse_document(text: &str, strict: bool) -> Result<PatternSet, LogPipelineError> {
        let corrupt = |reason: String| LogPipelineError::PatternLoad {
            source_name: "document".to_owned(),
            reason,
        };

        if is_blank_document(text) {
            return Ok(PatternSet::empty().finish());
        }

        let document: PatternDocument =
            serde_yaml::from_str(text).map_err(|e| corrupt(format!("YAML parse error: {e}")))?;

        let mut set = PatternSet::empty();
        let mut parser = SectionParser {
            set: &mut set,
            strict,
            loaded: 0,
        };
        if let Some(section) = document.patterns.as_ref() {
            parser.parse_section("patterns", section, PatternOrigin::Standard)?;
        }
        if let Some(section) = document.custom_patterns.as_ref() {
            parser.parse_section("custom_patterns", section, PatternOrigin::Custom)?;
        }

        Ok(set.finish())
    }

    async fn read_source(source: &PatternSource) -> Result<Option<String>, SourceError> {
        let path = match source {
            PatternSource::Defaults => return Ok(None),
            PatternSource::Inline(text) => return Ok(Some(text.clone())),
            PatternSource::File(path) => path,
        };

        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SourceError::NotFound
            } else {
                SourceError::Failed(format!("failed to read file metadata: {e}"))
            }
        })?;

        if metadata.len() > MAX_PATTERN_FILE_SIZE {
            return Err(SourceError::Failed(format!(
                "file too large: {} bytes (max: {MAX_PATTERN_FILE_SIZE})",
                metadata.len()
            )));
        }

        tokio::fs::read_to_string(path)
            .await
            .map(Some)
            .map_err(|e| SourceError::Failed(format!("failed to read file: {e}")))
    }
}

enum SourceError {
    NotFound,
    Failed(String),
}

fn is_blank_document(text: &str) -> bool {
    text.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#') || line == "---"
    })
}

/// 섹션(`patterns`/`custom_patterns`) 단위 파서
struct SectionParser<'a> {
    set: &'a mut PatternSet,
    strict: bool,
    loaded: usize,
}

impl SectionParser<'_> {
    fn parse_section(
        &mut self,
        section: &str,
        mapping: &Mapping,
        origin: PatternOrigin,
    ) -> Result<(), LogPipelineError> {
        for (key, items) in mapping {
            let Some(level_name) = key.as_str() else {
                self.reject(
                    "?",
                    "",
                    format!("{section}: level key must be a string, got {key:?}"),
                )?;
                continue;
            };

            let Some(level) = LogLevel::from_str_loose(level_name) else {
                self.reject(
                    level_name,
                    "",
                    format!("{section}: unknown level '{level_name}'"),
                )?;
                continue;
            };
            self.set.note_level(level);

            let items = match items {
                Value::Null => continue,
                Value::Sequence(items) => items,
                other => {
                    self.reject(
                        level_name,
                        "",
                        format!("{section}.{level_name}: expected a list, got {other:?}"),
                    )?;
                    continue;
                }
            };

            for item in items {
                self.parse_item(section, level, item, origin)?;
            }
        }
        Ok(())
    }

    fn parse_item(
        &mut self,
        section: &str,
        level: LogLevel,
        item: &Value,
        origin: PatternOrigin,
    ) -> Result<(), LogPipelineError> {
        if self.loaded >= MAX_PATTERN_COUNT {
            return Err(LogPipelineError::PatternLoad {
                source_name: "document".to_owned(),
                reason: format!("too many patterns: max {MAX_PATTERN_COUNT}"),
            });
        }

        let item: PatternItem = match serde_yaml::from_value(item.clone()) {
            Ok(item) => item,
            Err(e) => {
                return self.reject(
                    level.as_str(),
                    "",
                    format!("{section}.{level}: invalid pattern item: {e}"),
                );
            }
        };

        let (regex, priority, flag_names) = item.into_parts();
        if regex.is_empty() {
            return self.reject(
                level.as_str(),
                "",
                format!("{section}.{level}: empty regex"),
            );
        }

        let (flags, unknown) = PatternFlags::from_names(&flag_names);
        if !unknown.is_empty() {
            self.reject(
                level.as_str(),
                &regex,
                format!(
                    "{section}.{level}: unknown flags {unknown:?} for '{regex}', ignored"
                ),
            )?;
        }

        match self.set.insert(level, &regex, priority, flags, origin) {
            Ok(_) => {
                self.loaded += 1;
                Ok(())
            }
            Err(e) => self.reject(level.as_str(), &regex, format!("{section}.{level}: {e}")),
        }
    }

    /// 엄격 모드에서는 에러, 관대 모드에서는 진단으로 기록합니다.
    fn reject(&mut self, level: &str, regex: &str, message: String) -> Result<(), LogPipelineError> {
        if self.strict {
            return Err(LogPipelineError::Pattern {
                level: level.to_owned(),
                regex: regex.to_owned(),
                reason: message,
            });
        }
        tracing::warn!(diagnostic = %message, "skipping invalid pattern item");
        self.set.push_diagnostic(message);
        Ok(())
    }
}
