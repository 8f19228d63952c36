#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use logsift_pipeline::{Classifier, PatternRegistry};

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };

    let classifier = Classifier::new(Arc::new(PatternRegistry::with_defaults()));
    let items = match value {
        serde_json::Value::Array(items) => items,
        other => vec![other],
    };

    // 실패 항목은 placeholder로 대체되므로 항목 수만큼 엔트리가 나와야 한다
    let entries = classifier.classify_batch(&items);
    assert_eq!(entries.len(), items.len());
});
