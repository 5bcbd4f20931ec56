use bevy::prelude::*;
use std::collections::HashMap;
use thiserror::Error;

use super::array::ItemInstanceArray;
use super::instance::{ContainerId, ItemInstance, ItemInstanceId};
use crate::data::registry::ItemResolver;
use crate::data::schema::ItemClassPath;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContainerError {
    #[error("格子 {slot} 超出范围（共 {len} 格）")]
    SlotOutOfRange { slot: usize, len: usize },
    #[error("数量 {requested} 无效，当前只有 {available}")]
    InvalidAmount { requested: u32, available: u32 },
    #[error("容器 {0} 已满")]
    Full(ContainerId),
    #[error("找不到容器 {0}")]
    UnknownContainer(ContainerId),
    #[error("源容器和目标容器相同: {0}")]
    SameContainer(ContainerId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Inventory,
    World,
    Chest,
}

/// 持有物品实例的容器（背包、世界、箱子）
#[derive(Component, Debug)]
pub struct ItemContainer {
    pub id:       ContainerId,
    pub kind:     ContainerKind,
    /// `None` 表示不限格数
    pub capacity: Option<usize>,
    pub items:    ItemInstanceArray,
}

impl ItemContainer {
    pub fn new(id: ContainerId, kind: ContainerKind, capacity: Option<usize>) -> Self {
        Self {
            items: ItemInstanceArray::new(id.clone()),
            id,
            kind,
            capacity,
        }
    }

    pub fn has_free_slot(&self) -> bool {
        self.capacity.is_none_or(|cap| self.items.len() < cap)
    }

    /// 放入 `count` 个某类物品，返回放不下的数量。
    /// 先补满已有同类堆叠，再按上限开新堆叠。
    pub fn insert_stack(&mut self, class: &ItemClassPath, count: u32, resolver: &impl ItemResolver) -> u32 {
        let Some(entry) = resolver.resolve(class) else {
            return count;
        };
        let mut remaining = self.top_up(class, entry.max_stack_size, count, resolver);

        while remaining > 0 && self.has_free_slot() {
            let amount = remaining.min(entry.max_stack_size);
            self.items.add(ItemInstance::new(class.clone(), amount, resolver));
            remaining -= amount;
        }
        remaining
    }

    /// 接收一个现成的实例（比如从别的容器拆出来的），
    /// 先合并进同类堆叠，剩下的保留原 Id 占一格。放不下的部分原样还回去。
    pub fn accept(&mut self, mut item: ItemInstance, resolver: &impl ItemResolver) -> Option<ItemInstance> {
        let max = item.max_stack_size(resolver);
        if max == 0 {
            return Some(item);
        }
        let class = item.item_class().clone();
        let remaining = self.top_up(&class, max, item.stack_size(), resolver);
        item.remove_from_stack(item.stack_size() - remaining);

        if item.stack_size() == 0 {
            return None;
        }
        if self.has_free_slot() {
            self.items.add(item);
            None
        } else {
            Some(item)
        }
    }

    fn top_up(&mut self, class: &ItemClassPath, max: u32, count: u32, resolver: &impl ItemResolver) -> u32 {
        let open: Vec<ItemInstanceId> = self
            .items
            .find_by_class(class)
            .filter(|i| i.stack_size() < max)
            .map(|i| i.id)
            .collect();

        let mut remaining = count;
        for id in open {
            if remaining == 0 {
                break;
            }
            let added = self
                .items
                .modify(&id, |i| i.add_to_stack(remaining, resolver))
                .unwrap_or(0);
            remaining -= added;
        }
        remaining
    }

    /// 从某格拆出 `count` 个带走；整格拿走时原实例连同 Id 一起搬出
    pub fn take_from_slot(&mut self, slot: usize, count: u32) -> Result<ItemInstance, ContainerError> {
        let available = self.slot(slot)?.stack_size();
        if count == 0 || count > available {
            return Err(ContainerError::InvalidAmount { requested: count, available });
        }
        if count == available {
            return self
                .items
                .remove_at(slot)
                .ok_or(ContainerError::SlotOutOfRange { slot, len: self.items.len() });
        }
        self.items
            .modify_at(slot, |i| i.split_stack(count))
            .flatten()
            .ok_or(ContainerError::InvalidAmount { requested: count, available })
    }

    /// 在同一容器内拆堆叠，返回新堆叠的 Id
    pub fn split_slot(&mut self, slot: usize, count: u32) -> Result<ItemInstanceId, ContainerError> {
        let available = self.slot(slot)?.stack_size();
        if count >= available {
            // 全部拆走等于原地不动
            return Err(ContainerError::InvalidAmount { requested: count, available });
        }
        if !self.has_free_slot() {
            return Err(ContainerError::Full(self.id.clone()));
        }
        let split = self.take_from_slot(slot, count)?;
        let id = split.id;
        self.items.add(split);
        Ok(id)
    }

    /// 返回实际移除的数量
    pub fn remove_from_slot(&mut self, slot: usize, count: u32) -> Result<u32, ContainerError> {
        let available = self.slot(slot)?.stack_size();
        if count == 0 {
            return Err(ContainerError::InvalidAmount { requested: 0, available });
        }
        Ok(self
            .items
            .modify_at(slot, |i| i.remove_from_stack(count))
            .unwrap_or(0))
    }

    fn slot(&self, slot: usize) -> Result<&ItemInstance, ContainerError> {
        self.items.get_by_index(slot).ok_or(ContainerError::SlotOutOfRange {
            slot,
            len: self.items.len(),
        })
    }
}

/// ContainerId → Entity 的索引，实例只记外键，经这里找到容器
#[derive(Resource, Default, Debug)]
pub struct ContainerRegistry {
    entities: HashMap<ContainerId, Entity>,
}

impl ContainerRegistry {
    pub fn get(&self, id: &ContainerId) -> Result<Entity, ContainerError> {
        self.entities
            .get(id)
            .copied()
            .ok_or_else(|| ContainerError::UnknownContainer(id.clone()))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// 新容器登记，被移除的容器注销
pub fn track_containers(
    mut registry: ResMut<ContainerRegistry>,
    added: Query<(Entity, &ItemContainer), Added<ItemContainer>>,
    mut removed: RemovedComponents<ItemContainer>,
) {
    for entity in removed.read() {
        registry.entities.retain(|_, e| *e != entity);
    }
    for (entity, container) in &added {
        if let Some(previous) = registry.entities.insert(container.id.clone(), entity) {
            if previous != entity {
                warn!("容器 {} 被重复注册", container.id);
            }
        }
        debug!("注册容器 {} ({:?})", container.id, container.kind);
    }
}
