use bevy::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use super::schema::{ItemClassPath, ItemEntry, ItemList};

/// 软类路径的解析服务
pub trait ItemResolver {
    fn resolve(&self, class: &ItemClassPath) -> Option<Arc<ItemEntry>>;
}

/// 什么都解析不出来，测试里当作"类丢失"
impl ItemResolver for () {
    fn resolve(&self, _class: &ItemClassPath) -> Option<Arc<ItemEntry>> {
        None
    }
}

/// 物品表加载完成后建立的索引（挂在 Resource）
#[derive(Resource, Default, Debug)]
pub struct ItemRegistry {
    by_class: HashMap<ItemClassPath, Arc<ItemEntry>>,
    order:    Vec<ItemClassPath>,
}

impl ItemRegistry {
    pub fn from_list(list: &ItemList) -> Self {
        let mut registry = Self::default();
        for entry in &list.items {
            registry.insert(entry.clone());
        }
        registry
    }

    /// 同一路径重复出现时后者覆盖前者
    pub fn insert(&mut self, mut entry: ItemEntry) {
        if entry.max_stack_size == 0 {
            warn!("物品 {} 的 max_stack_size 为 0，按 1 处理", entry.id);
            entry.max_stack_size = 1;
        }
        let class = entry.class.clone();
        if self.by_class.insert(class.clone(), Arc::new(entry)).is_none() {
            self.order.push(class);
        }
    }

    /// 按 id 或名称查找（忽略大小写）
    pub fn find(&self, token: &str) -> Option<&Arc<ItemEntry>> {
        self.iter()
            .find(|e| e.id.eq_ignore_ascii_case(token) || e.name.eq_ignore_ascii_case(token))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ItemEntry>> {
        self.order.iter().filter_map(|class| self.by_class.get(class))
    }

    pub fn len(&self) -> usize {
        self.by_class.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_class.is_empty()
    }
}

impl ItemResolver for ItemRegistry {
    fn resolve(&self, class: &ItemClassPath) -> Option<Arc<ItemEntry>> {
        self.by_class.get(class).cloned()
    }
}
