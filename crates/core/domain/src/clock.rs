use chrono::{Local, NaiveTime, Timelike};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// 时间来源。规则引擎与报警引擎只通过该接口取时间。
pub trait Clock: Send + Sync {
    /// 当前时间（epoch 毫秒）。
    fn now_ms(&self) -> i64;

    /// 当前本地时刻（时段判断用）。
    fn local_time(&self) -> NaiveTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        now_epoch_ms()
    }

    fn local_time(&self) -> NaiveTime {
        Local::now().time()
    }
}

pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// 手动推进的时钟（测试用）。
///
/// 本地时刻由 `base_time` 加上已推进的毫秒数得出，与时区无关。
#[derive(Debug)]
pub struct ManualClock {
    now_ms: AtomicI64,
    base_secs_of_day: u32,
    origin_ms: i64,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self::with_local_time(now_ms, NaiveTime::MIN)
    }

    pub fn with_local_time(now_ms: i64, local: NaiveTime) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
            base_secs_of_day: local.num_seconds_from_midnight(),
            origin_ms: now_ms,
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance_ms(secs.saturating_mul(1000));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn local_time(&self) -> NaiveTime {
        let elapsed_secs = (self.now_ms() - self.origin_ms).div_euclid(1000);
        let secs = (i64::from(self.base_secs_of_day) + elapsed_secs).rem_euclid(86_400) as u32;
        NaiveTime::from_num_seconds_from_midnight_opt(secs, 0).unwrap_or(NaiveTime::MIN)
    }
}
