use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::ops::Index;
use std::sync::atomic::{AtomicU64, Ordering};

use super::instance::{ContainerId, ItemInstance, ItemInstanceId};
use crate::data::schema::ItemClassPath;

/// 数组内分配的复制句柄，不随位置变化
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplicationId(pub u32);

/// 每个数组实例一个世代号。同一个容器 Id 被销毁后重建，世代号不同，
/// 观察者的旧基线因此作废
static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

/// 实例 + 复制簿记
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicatedItem {
    pub replication_id:  ReplicationId,
    pub replication_key: u32,
    pub item:            ItemInstance,
}

/// 带变更追踪的物品数组。
///
/// 所有修改都走 `add` / `remove` / `modify`，这些方法内部顺带标脏，
/// 调用方不需要（也不能）自己去标。每个观察者用一份
/// [`ReplicationBaseline`] 记下上次看到的版本，据此算出最小的增量。
#[derive(Debug, Clone)]
pub struct ItemInstanceArray {
    entries:               Vec<ReplicatedItem>,
    owner:                 Option<ContainerId>,
    next_replication_id:   u32,
    array_replication_key: u32,
    epoch:                 u64,
}

impl Default for ItemInstanceArray {
    fn default() -> Self {
        Self {
            entries:               Vec::new(),
            owner:                 None,
            next_replication_id:   0,
            array_replication_key: 0,
            epoch:                 NEXT_EPOCH.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl ItemInstanceArray {
    pub fn new(owner: ContainerId) -> Self {
        let mut array = Self::default();
        array.register_with_owner(owner);
        array
    }

    /// 绑定所属容器；已有条目的 container_id 一并改写
    pub fn register_with_owner(&mut self, owner: ContainerId) {
        for index in 0..self.entries.len() {
            if self.entries[index].item.container_id != owner {
                self.entries[index].item.container_id = owner.clone();
                self.mark_item_dirty(index);
            }
        }
        self.owner = Some(owner);
    }

    pub fn owner(&self) -> Option<&ContainerId> {
        self.owner.as_ref()
    }

    pub fn array_replication_key(&self) -> u32 {
        self.array_replication_key
    }

    pub fn add(&mut self, mut item: ItemInstance) -> ReplicationId {
        if let Some(owner) = &self.owner {
            item.container_id = owner.clone();
        }
        let replication_id = ReplicationId(self.next_replication_id);
        self.next_replication_id = self.next_replication_id.wrapping_add(1);
        self.entries.push(ReplicatedItem {
            replication_id,
            replication_key: 0,
            item,
        });
        self.mark_item_dirty(self.entries.len() - 1);
        replication_id
    }

    pub fn remove(&mut self, id: &ItemInstanceId) -> Option<ItemInstance> {
        let index = self.position(id)?;
        self.remove_at(index)
    }

    pub fn remove_at(&mut self, index: usize) -> Option<ItemInstance> {
        if index >= self.entries.len() {
            return None;
        }
        let entry = self.entries.remove(index);
        self.mark_array_dirty();
        Some(entry.item)
    }

    /// 修改一个条目并标脏。改完堆叠数为 0 的条目直接销毁。
    pub fn modify<R>(&mut self, id: &ItemInstanceId, f: impl FnOnce(&mut ItemInstance) -> R) -> Option<R> {
        let index = self.position(id)?;
        self.modify_at(index, f)
    }

    pub fn modify_at<R>(&mut self, index: usize, f: impl FnOnce(&mut ItemInstance) -> R) -> Option<R> {
        let entry = self.entries.get_mut(index)?;
        let result = f(&mut entry.item);
        if let Some(owner) = &self.owner {
            entry.item.container_id = owner.clone();
        }
        if entry.item.stack_size() == 0 {
            self.remove_at(index);
        } else {
            self.mark_item_dirty(index);
        }
        Some(result)
    }

    pub fn get(&self, id: &ItemInstanceId) -> Option<&ItemInstance> {
        self.iter().find(|item| item.id == *id)
    }

    pub fn get_by_index(&self, index: usize) -> Option<&ItemInstance> {
        self.entries.get(index).map(|e| &e.item)
    }

    pub fn position(&self, id: &ItemInstanceId) -> Option<usize> {
        self.entries.iter().position(|e| e.item.id == *id)
    }

    pub fn find_by_class<'a>(&'a self, class: &'a ItemClassPath) -> impl Iterator<Item = &'a ItemInstance> {
        self.iter().filter(move |item| item.item_class() == class)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemInstance> {
        self.entries.iter().map(|e| &e.item)
    }

    pub fn entries(&self) -> &[ReplicatedItem] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn mark_item_dirty(&mut self, index: usize) {
        let entry = &mut self.entries[index];
        entry.replication_key = entry.replication_key.wrapping_add(1);
        self.mark_array_dirty();
    }

    fn mark_array_dirty(&mut self) {
        self.array_replication_key = self.array_replication_key.wrapping_add(1);
    }

    /// 对照观察者的基线算增量，并把基线推进到当前版本。
    /// 自上次以来没有任何变化时返回 `None`。
    ///
    /// 基线属于另一个数组实例（容器被销毁后以同一 Id 重建）时整体作废，
    /// 发出带 `reset` 的全量增量。
    pub fn compute_delta(&self, baseline: &mut ReplicationBaseline) -> Option<ItemArrayDelta> {
        let reset = baseline.epoch != Some(self.epoch);
        if reset {
            *baseline = ReplicationBaseline {
                epoch: Some(self.epoch),
                ..Default::default()
            };
        } else if baseline.array_replication_key == Some(self.array_replication_key) {
            return None;
        }

        let changed: Vec<ReplicatedItem> = self
            .entries
            .iter()
            .filter(|e| baseline.item_keys.get(&e.replication_id) != Some(&e.replication_key))
            .cloned()
            .collect();

        let live: HashSet<ReplicationId> = self.entries.iter().map(|e| e.replication_id).collect();
        let mut removed: Vec<ReplicationId> = baseline
            .item_keys
            .keys()
            .filter(|id| !live.contains(id))
            .copied()
            .collect();
        removed.sort();

        baseline.item_keys = self
            .entries
            .iter()
            .map(|e| (e.replication_id, e.replication_key))
            .collect();
        baseline.array_replication_key = Some(self.array_replication_key);

        Some(ItemArrayDelta {
            array_replication_key: self.array_replication_key,
            reset,
            changed,
            removed,
        })
    }

    /// 观察者一侧：先删后增改，过程中回调各个钩子
    pub fn apply_delta(&mut self, delta: ItemArrayDelta, hooks: &mut impl ItemArrayHooks) {
        if delta.reset {
            self.clear_replicated(hooks);
        }

        for id in &delta.removed {
            if let Some(index) = self.entries.iter().position(|e| e.replication_id == *id) {
                let array = &*self;
                hooks.pre_replicated_remove(&array.entries[index].item, array);
                self.entries.remove(index);
            }
        }

        for incoming in delta.changed {
            match self
                .entries
                .iter()
                .position(|e| e.replication_id == incoming.replication_id)
            {
                Some(index) => {
                    self.entries[index] = incoming;
                    let array = &*self;
                    hooks.post_replicated_change(&array.entries[index].item, array);
                }
                None => {
                    self.next_replication_id = self
                        .next_replication_id
                        .max(incoming.replication_id.0.wrapping_add(1));
                    self.entries.push(incoming);
                    let array = &*self;
                    hooks.post_replicated_add(&array.entries[array.entries.len() - 1].item, array);
                }
            }
        }

        self.array_replication_key = delta.array_replication_key;
    }

    /// 观察者一侧：逐条回调 `pre_replicated_remove` 后清空
    pub fn clear_replicated(&mut self, hooks: &mut impl ItemArrayHooks) {
        while !self.entries.is_empty() {
            let array = &*self;
            hooks.pre_replicated_remove(&array.entries[0].item, array);
            self.entries.remove(0);
        }
    }
}

impl Index<usize> for ItemInstanceArray {
    type Output = ItemInstance;

    fn index(&self, index: usize) -> &ItemInstance {
        &self.entries[index].item
    }
}

/// 某个观察者上次确认过的版本
#[derive(Debug, Clone, Default)]
pub struct ReplicationBaseline {
    epoch:                 Option<u64>,
    array_replication_key: Option<u32>,
    item_keys:             HashMap<ReplicationId, u32>,
}

/// 一次增量：新增或变化的条目，以及被移除的句柄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemArrayDelta {
    pub array_replication_key: u32,
    /// 观察者先清空镜像再应用
    #[serde(default)]
    pub reset:                 bool,
    pub changed:               Vec<ReplicatedItem>,
    pub removed:               Vec<ReplicationId>,
}

/// 观察者一侧收到增量时的扩展点，默认什么也不做
pub trait ItemArrayHooks {
    fn pre_replicated_remove(&mut self, _item: &ItemInstance, _array: &ItemInstanceArray) {}
    fn post_replicated_add(&mut self, _item: &ItemInstance, _array: &ItemInstanceArray) {}
    fn post_replicated_change(&mut self, _item: &ItemInstance, _array: &ItemInstanceArray) {}
}

impl ItemArrayHooks for () {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::registry::tests::{POTION, SWORD, sample_registry};

    fn item(class: &str, stack: u32) -> ItemInstance {
        ItemInstance::new(ItemClassPath::new(class), stack, &sample_registry())
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl ItemArrayHooks for Recorder {
        fn pre_replicated_remove(&mut self, item: &ItemInstance, array: &ItemInstanceArray) {
            // 回调时条目还在数组里
            assert!(array.get(&item.id).is_some());
            self.calls.push(format!("remove {}", item.stack_size()));
        }

        fn post_replicated_add(&mut self, item: &ItemInstance, array: &ItemInstanceArray) {
            assert!(array.get(&item.id).is_some());
            self.calls.push(format!("add {}", item.stack_size()));
        }

        fn post_replicated_change(&mut self, item: &ItemInstance, _array: &ItemInstanceArray) {
            self.calls.push(format!("change {}", item.stack_size()));
        }
    }

    #[test]
    fn add_stamps_owner_and_marks_dirty() {
        let mut array = ItemInstanceArray::new(ContainerId::new("backpack"));
        let before = array.array_replication_key();
        array.add(item(POTION, 3));
        assert_eq!(array[0].container_id, ContainerId::new("backpack"));
        assert_ne!(array.array_replication_key(), before);
        assert_eq!(array.entries()[0].replication_key, 1);
    }

    #[test]
    fn register_with_owner_rewrites_existing_entries() {
        let mut array = ItemInstanceArray::default();
        array.add(item(POTION, 3));
        assert_eq!(array[0].container_id, ContainerId::default());

        array.register_with_owner(ContainerId::new("chest"));
        assert_eq!(array.owner(), Some(&ContainerId::new("chest")));
        assert_eq!(array[0].container_id, ContainerId::new("chest"));
        assert_eq!(array.entries()[0].replication_key, 2);
    }

    #[test]
    fn modify_marks_entry_dirty() {
        let registry = sample_registry();
        let mut array = ItemInstanceArray::new(ContainerId::new("backpack"));
        array.add(item(POTION, 3));
        let id = array[0].id;

        let added = array.modify(&id, |i| i.add_to_stack(4, &registry));
        assert_eq!(added, Some(4));
        assert_eq!(array[0].stack_size(), 7);
        assert_eq!(array.entries()[0].replication_key, 2);
    }

    #[test]
    fn modify_to_zero_destroys_entry() {
        let mut array = ItemInstanceArray::new(ContainerId::new("backpack"));
        array.add(item(POTION, 3));
        let id = array[0].id;

        assert_eq!(array.modify(&id, |i| i.remove_from_stack(10)), Some(3));
        assert!(array.is_empty());
        assert_eq!(array.modify(&id, |i| i.remove_from_stack(1)), None);
    }

    #[test]
    fn modify_cannot_move_entry_out_of_owner() {
        let mut array = ItemInstanceArray::new(ContainerId::new("backpack"));
        array.add(item(POTION, 3));
        array.modify_at(0, |i| i.container_id = ContainerId::new("elsewhere"));
        assert_eq!(array[0].container_id, ContainerId::new("backpack"));
    }

    #[test]
    fn first_delta_carries_everything() {
        let mut array = ItemInstanceArray::new(ContainerId::new("backpack"));
        array.add(item(POTION, 3));
        array.add(item(SWORD, 1));

        let mut baseline = ReplicationBaseline::default();
        let delta = array.compute_delta(&mut baseline).expect("initial sync");
        assert_eq!(delta.changed.len(), 2);
        assert!(delta.removed.is_empty());
        assert!(array.compute_delta(&mut baseline).is_none());
    }

    #[test]
    fn empty_array_still_sends_initial_delta() {
        let array = ItemInstanceArray::new(ContainerId::new("chest"));
        let mut baseline = ReplicationBaseline::default();
        let delta = array.compute_delta(&mut baseline).expect("initial sync");
        assert!(delta.changed.is_empty() && delta.removed.is_empty());
        assert!(array.compute_delta(&mut baseline).is_none());
    }

    #[test]
    fn delta_only_carries_changed_and_removed() {
        let registry = sample_registry();
        let mut array = ItemInstanceArray::new(ContainerId::new("backpack"));
        let potion = array.add(item(POTION, 3));
        let sword = array.add(item(SWORD, 1));
        array.add(item(POTION, 5));

        let mut baseline = ReplicationBaseline::default();
        array.compute_delta(&mut baseline);

        let potion_id = array[0].id;
        let sword_id = array[1].id;
        array.modify(&potion_id, |i| i.add_to_stack(1, &registry));
        array.remove(&sword_id);

        let delta = array.compute_delta(&mut baseline).expect("changes pending");
        assert_eq!(delta.changed.len(), 1);
        assert_eq!(delta.changed[0].replication_id, potion);
        assert_eq!(delta.changed[0].item.stack_size(), 4);
        assert_eq!(delta.removed, vec![sword]);
    }

    #[test]
    fn baselines_are_independent_per_observer() {
        let mut array = ItemInstanceArray::new(ContainerId::new("backpack"));
        array.add(item(POTION, 3));

        let mut early = ReplicationBaseline::default();
        array.compute_delta(&mut early);
        array.add(item(SWORD, 1));

        let mut late = ReplicationBaseline::default();
        assert_eq!(array.compute_delta(&mut early).map(|d| d.changed.len()), Some(1));
        assert_eq!(array.compute_delta(&mut late).map(|d| d.changed.len()), Some(2));
    }

    #[test]
    fn apply_delta_mirrors_authority_and_fires_hooks() {
        let registry = sample_registry();
        let mut authority = ItemInstanceArray::new(ContainerId::new("backpack"));
        authority.add(item(POTION, 3));
        authority.add(item(SWORD, 1));

        let mut baseline = ReplicationBaseline::default();
        let mut mirror = ItemInstanceArray::new(ContainerId::new("backpack"));
        let mut hooks = Recorder::default();

        let delta = authority.compute_delta(&mut baseline).expect("initial sync");
        mirror.apply_delta(delta, &mut hooks);
        assert_eq!(hooks.calls, vec!["add 3", "add 1"]);

        let potion_id = authority[0].id;
        let sword_id = authority[1].id;
        authority.modify(&potion_id, |i| i.add_to_stack(2, &registry));
        authority.remove(&sword_id);
        authority.add(item(POTION, 9));

        hooks.calls.clear();
        let delta = authority.compute_delta(&mut baseline).expect("changes pending");
        mirror.apply_delta(delta, &mut hooks);
        assert_eq!(hooks.calls, vec!["remove 1", "change 5", "add 9"]);

        let mirrored: Vec<_> = mirror.iter().map(|i| (i.id, i.stack_size())).collect();
        let expected: Vec<_> = authority.iter().map(|i| (i.id, i.stack_size())).collect();
        assert_eq!(mirrored, expected);
        assert_eq!(mirror.array_replication_key(), authority.array_replication_key());
    }

    #[test]
    fn rebuilt_array_resets_a_stale_baseline() {
        let mut first = ItemInstanceArray::new(ContainerId::new("chest"));
        first.add(item(POTION, 3));
        let mut baseline = ReplicationBaseline::default();
        let mut mirror = ItemInstanceArray::new(ContainerId::new("chest"));
        mirror.apply_delta(first.compute_delta(&mut baseline).expect("initial sync"), &mut ());

        // 新数组走到了和旧数组相同的 key，旧基线也不能据此跳过
        let mut second = ItemInstanceArray::new(ContainerId::new("chest"));
        second.add(item(SWORD, 1));
        assert_eq!(second.array_replication_key(), first.array_replication_key());

        let delta = second.compute_delta(&mut baseline).expect("stale baseline");
        assert!(delta.reset);
        assert_eq!(delta.changed.len(), 1);

        let mut hooks = Recorder::default();
        mirror.apply_delta(delta, &mut hooks);
        assert_eq!(hooks.calls, vec!["remove 3", "add 1"]);
        let classes: Vec<_> = mirror.iter().map(|i| i.item_class().clone()).collect();
        assert_eq!(classes, vec![ItemClassPath::new(SWORD)]);
        assert!(second.compute_delta(&mut baseline).is_none());
    }

    #[test]
    fn apply_delta_ignores_unknown_removals() {
        let mut mirror = ItemInstanceArray::default();
        mirror.apply_delta(
            ItemArrayDelta {
                array_replication_key: 7,
                reset: false,
                changed: Vec::new(),
                removed: vec![ReplicationId(42)],
            },
            &mut (),
        );
        assert!(mirror.is_empty());
        assert_eq!(mirror.array_replication_key(), 7);
    }
}
