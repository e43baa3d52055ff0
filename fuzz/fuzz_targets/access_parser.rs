#![no_main]

use libfuzzer_sys::fuzz_target;
use poolwatch_core::pipeline::LogParser;
use poolwatch_core::types::Pool;
use poolwatch_log_pipeline::parser::AccessLogParser;

fuzz_target!(|data: &[u8]| {
    let parser = AccessLogParser::new(vec!["blue".to_owned(), "green".to_owned()]);
    if let Ok(event) = parser.parse(data) {
        // 설정에 없는 풀 이름은 Unknown으로만 나온다
        if let Pool::Named(name) = &event.pool {
            assert!(name == "blue" || name == "green");
        }
        assert_eq!(event.is_error(), (500..=599).contains(&event.status));
    }
});
