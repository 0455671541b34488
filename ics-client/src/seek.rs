//! 求战列表

use std::collections::BTreeMap;

use protocol::{SeekIndex, SeekInfo};

use crate::events::SeekEvent;
use crate::game::Clock;
use crate::rules::{Variant, VariantTable};

/// 一条受支持的求战
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seek {
    pub info: SeekInfo,
    pub variant: Variant,
    pub clock: Clock,
}

impl Seek {
    pub fn index(&self) -> SeekIndex {
        self.info.index
    }
}

/// 当前已知的求战
#[derive(Debug, Default)]
pub struct SeekTable {
    seeks: BTreeMap<SeekIndex, Seek>,
}

impl SeekTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: SeekIndex) -> Option<&Seek> {
        self.seeks.get(&index)
    }

    pub fn len(&self) -> usize {
        self.seeks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeks.is_empty()
    }

    /// 添加求战；同编号的旧求战先被移除，不支持的规则被忽略
    pub fn add(&mut self, info: SeekInfo, variants: &VariantTable) -> Vec<SeekEvent> {
        let Some(variant) = variants.lookup(&info.category) else {
            tracing::debug!("忽略不支持的求战类别: {}", info.category);
            return Vec::new();
        };

        let clock = Clock {
            initial_ms: u64::from(info.time_minutes) * 60 * 1000,
            increment_ms: u64::from(info.increment_secs) * 1000,
        };
        let seek = Seek {
            info,
            variant,
            clock,
        };

        let mut events = Vec::with_capacity(2);
        if let Some(old) = self.seeks.insert(seek.index(), seek.clone()) {
            events.push(SeekEvent::Removed(old));
        }
        events.push(SeekEvent::Added(seek));
        events
    }

    /// 移除求战，未知编号直接跳过
    pub fn remove(&mut self, indices: &[SeekIndex]) -> Vec<SeekEvent> {
        indices
            .iter()
            .filter_map(|index| self.seeks.remove(index))
            .map(SeekEvent::Removed)
            .collect()
    }

    pub fn clear(&mut self) -> Vec<SeekEvent> {
        std::mem::take(&mut self.seeks)
            .into_values()
            .map(SeekEvent::Removed)
            .collect()
    }
}
