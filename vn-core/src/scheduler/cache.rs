//! # Media Cache 模块
//!
//! 按 id 索引的图片/音频缓存。
//!
//! 缓存有自己的锁，由工作线程在执行指令时访问；
//! 访问时绝不持有任何队列锁。

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
struct CacheInner<T> {
    /// 缓存条目（id -> 数据）
    entries: HashMap<u32, Arc<T>>,
    /// 统计：命中次数
    hits: u64,
    /// 统计：未命中次数
    misses: u64,
}

/// 媒体缓存
#[derive(Debug)]
pub struct MediaCache<T> {
    inner: Mutex<CacheInner<T>>,
}

impl<T> Default for MediaCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MediaCache<T> {
    /// 创建空缓存
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// 获取缓存条目
    pub fn get(&self, id: u32) -> Option<Arc<T>> {
        let mut inner = self.inner.lock();
        match inner.entries.get(&id).cloned() {
            Some(entry) => {
                inner.hits += 1;
                Some(entry)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// 检查是否存在（不计入统计）
    pub fn contains(&self, id: u32) -> bool {
        self.inner.lock().entries.contains_key(&id)
    }

    /// 插入条目，覆盖同 id 的旧条目
    pub fn insert(&self, id: u32, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.inner.lock().entries.insert(id, Arc::clone(&value));
        value
    }

    /// 移除条目
    pub fn remove(&self, id: u32) -> Option<Arc<T>> {
        self.inner.lock().entries.remove(&id)
    }

    /// 清空缓存
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// 条目数量
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// 缓存是否为空
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// 获取统计信息
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let lookups = inner.hits + inner.misses;
        CacheStats {
            entries: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
            hit_rate: if lookups > 0 {
                inner.hits as f64 / lookups as f64
            } else {
                0.0
            },
        }
    }
}

/// 缓存统计信息
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    /// 缓存条目数量
    pub entries: usize,
    /// 命中次数
    pub hits: u64,
    /// 未命中次数
    pub misses: u64,
    /// 命中率
    pub hit_rate: f64,
}

impl CacheStats {
    /// 格式化为可读字符串
    pub fn format(&self) -> String {
        format!(
            "Cache: {} entries, hits: {}, misses: {}, hit rate: {:.1}%",
            self.entries,
            self.hits,
            self.misses,
            self.hit_rate * 100.0,
        )
    }
}
