//! 点位值缓存
//!
//! 每个点位一条，后写覆盖。变化判定按点位死区：无旧值，或 `|new - old| > deadband`。

use domain::{Quality, RuntimeValue, Tag, TagReader};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use tracing::warn;

/// 缓存快照（传给外部钩子与渲染）。
pub type TagSnapshot = BTreeMap<String, RuntimeValue>;

/// 一次写入的结果。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheUpdate {
    pub changed: bool,
    pub previous: Option<RuntimeValue>,
}

#[derive(Clone, Default)]
pub struct TagCache {
    inner: Arc<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    deadbands: HashMap<String, f64>,
    values: RwLock<HashMap<String, RuntimeValue>>,
}

impl TagCache {
    pub fn new(tags: &[Tag]) -> Self {
        let deadbands = tags
            .iter()
            .filter(|tag| tag.deadband > 0.0)
            .map(|tag| (tag.name.clone(), tag.deadband))
            .collect();
        Self {
            inner: Arc::new(CacheInner {
                deadbands,
                values: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn deadband(&self, tag: &str) -> f64 {
        self.inner.deadbands.get(tag).copied().unwrap_or(0.0)
    }

    /// 写入一个好质量样本。未变化时只恢复质量，不更新值与时间戳。
    pub fn apply(&self, tag: &str, value: f64, ts_ms: i64) -> CacheUpdate {
        let deadband = self.deadband(tag);
        let Ok(mut values) = self.inner.values.write() else {
            warn!(target: "scada.pipeline", tag, "cache_lock_failed");
            return CacheUpdate {
                changed: false,
                previous: None,
            };
        };
        let previous = values.get(tag).copied();
        let changed = match previous {
            None => true,
            Some(old) if deadband > 0.0 => (value - old.value).abs() > deadband,
            Some(old) => value != old.value,
        };
        if changed {
            values.insert(
                tag.to_string(),
                RuntimeValue {
                    value,
                    ts_ms,
                    quality: Quality::Good,
                },
            );
        } else if let Some(entry) = values.get_mut(tag) {
            entry.quality = Quality::Good;
        }
        CacheUpdate { changed, previous }
    }

    /// 标记为坏质量，保留原值。返回质量是否发生变化。
    pub fn mark_bad(&self, tag: &str) -> bool {
        let Ok(mut values) = self.inner.values.write() else {
            return false;
        };
        match values.get_mut(tag) {
            Some(entry) if entry.quality != Quality::Bad => {
                entry.quality = Quality::Bad;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, tag: &str) -> Option<RuntimeValue> {
        self.inner
            .values
            .read()
            .ok()
            .and_then(|values| values.get(tag).copied())
    }

    pub fn snapshot(&self) -> TagSnapshot {
        self.inner
            .values
            .read()
            .map(|values| values.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.values.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TagReader for TagCache {
    fn value_of(&self, tag: &str) -> Option<f64> {
        self.get(tag).map(|v| v.value)
    }
}
