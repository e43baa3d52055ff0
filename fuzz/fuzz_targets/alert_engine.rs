#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;

use poolwatch_core::types::{Pool, RequestEvent};
use poolwatch_log_pipeline::AlertEngine;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 윈도우 크기 (1..=64로 제한)
    window: u8,
    /// 임계값 (0..=100으로 제한)
    threshold: u8,
    /// 쿨다운 (초)
    cooldown: u16,
    /// 요청 시퀀스
    requests: Vec<FuzzRequest>,
}

#[derive(Arbitrary, Debug)]
struct FuzzRequest {
    pool: FuzzPool,
    status: u16,
    /// 직전 요청으로부터 경과 시간 (초)
    gap: u8,
}

#[derive(Arbitrary, Debug)]
enum FuzzPool {
    Blue,
    Green,
    Red,
    Unknown,
}

fn event(req: &FuzzRequest) -> RequestEvent {
    let pool = match req.pool {
        FuzzPool::Blue => Pool::Named("blue".to_owned()),
        FuzzPool::Green => Pool::Named("green".to_owned()),
        FuzzPool::Red => Pool::Named("red".to_owned()),
        FuzzPool::Unknown => Pool::Unknown,
    };
    RequestEvent {
        pool,
        release: "v1".to_owned(),
        status: req.status,
        upstream_status: req.status.to_string(),
        upstream_status_codes: vec![req.status],
        upstream: "127.0.0.1:3000".to_owned(),
        request_time: 0.0,
        upstream_response_time: None,
        method: "GET".to_owned(),
        uri: "/".to_owned(),
        time: String::new(),
        timestamp: None,
    }
}

fuzz_target!(|input: FuzzInput| {
    let window = usize::from(input.window % 64) + 1;
    let threshold = f64::from(input.threshold % 101);
    let Ok(mut engine) = AlertEngine::new(
        window,
        window,
        threshold,
        Duration::from_secs(u64::from(input.cooldown)),
    ) else {
        return;
    };

    let mut now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    for req in input.requests.iter().take(4096) {
        now += chrono::Duration::seconds(i64::from(req.gap));
        let alerts = engine.process(event(req), now);
        assert!(alerts.len() <= 2);

        let w = engine.window();
        assert!(w.error_count() <= w.len());
        assert!(w.len() <= w.capacity());
        let rate = w.error_rate();
        assert!((0.0..=100.0).contains(&rate));
        if w.is_empty() {
            assert_eq!(rate, 0.0);
        }
    }
});
