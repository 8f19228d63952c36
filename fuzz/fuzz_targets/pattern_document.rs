#![no_main]

use libfuzzer_sys::fuzz_target;
use logsift_pipeline::pattern::PatternLoader;

fuzz_target!(|data: &[u8]| {
    // YAML 파서는 &str을 받으므로 UTF-8 변환 필요
    if let Ok(text) = std::str::from_utf8(data) {
        // 둘 다 성공했다면 strict 결과는 진단이 없고 패턴 수가 같아야 한다
        let lenient = PatternLoader::parse_document(text, false);
        let strict = PatternLoader::parse_document(text, true);
        if let (Ok(lenient), Ok(strict)) = (lenient, strict) {
            assert_eq!(lenient.len(), strict.len());
            assert!(strict.diagnostics().is_empty());
        }
    }
});
