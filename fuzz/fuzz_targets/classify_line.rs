#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use logsift_core::types::LogLevel;
use logsift_pipeline::{Classifier, PatternFlags, PatternRegistry};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 사용자 정의 패턴 (최대 8개로 제한)
    patterns: Vec<FuzzPattern>,
    /// 분류 대상 라인
    line: String,
}

#[derive(Arbitrary, Debug)]
struct FuzzPattern {
    level: u8,
    regex: String,
    priority: i8,
    ignore_case: bool,
}

fuzz_target!(|input: FuzzInput| {
    let registry = Arc::new(PatternRegistry::with_defaults());
    for pattern in input.patterns.iter().take(8) {
        let level = LogLevel::ALL[usize::from(pattern.level) % LogLevel::ALL.len()];
        let flags = if pattern.ignore_case {
            PatternFlags::IGNORE_CASE
        } else {
            PatternFlags::default()
        };
        // 잘못된 정규식은 에러로 거부되어야 하며 패닉하면 안 된다
        let _ = registry.add_custom(level, &pattern.regex, i32::from(pattern.priority), flags);
    }

    let classifier = Classifier::new(registry);
    let result = classifier.detect(&input.line);

    // 매칭이 없으면 info, 있으면 첫 매칭 패턴의 레벨
    if result.matched_patterns.is_empty() {
        assert_eq!(result.level, LogLevel::Info);
    } else {
        let prefix = format!("{}:", result.level.as_str());
        assert!(result.matched_patterns[0].starts_with(&prefix));
    }
});
