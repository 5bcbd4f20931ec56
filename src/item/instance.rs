use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::data::registry::ItemResolver;
use crate::data::schema::{ItemClassPath, ItemEntry};

/// 物品实例的唯一 Id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemInstanceId(pub Uuid);

impl ItemInstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemInstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 只显示前 8 位，CLI 里够用
        let simple = self.0.simple().to_string();
        f.write_str(&simple[..8])
    }
}

/// 所属容器的 Id（背包、世界、箱子……），只是外键，不持有容器
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(pub String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 线性格子序号换算出的二维坐标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridIndex {
    pub row:    u32,
    pub column: u32,
}

impl fmt::Display for GridIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

/// 容器里的一个物品实例。
///
/// 比完整的物品对象轻得多，可以大量存在。实例不拥有容器，
/// 生命周期由容器（见 [`super::array::ItemInstanceArray`]）决定。
///
/// `stack_size` 始终在 `[0, max_stack_size]` 之内；
/// 堆叠数为 0 或类解析不出来的实例视为"空物品"。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemInstance {
    pub id:           ItemInstanceId,
    item_class:       ItemClassPath,
    pub container_id: ContainerId,
    stack_size:       u32,
    /// 解析结果缓存，不参与同步也不参与比较
    #[serde(skip)]
    cached_item:      Option<Arc<ItemEntry>>,
}

impl ItemInstance {
    /// 新实例，堆叠数按物品上限截断（类解析不出来时原样保留）
    pub fn new(item_class: ItemClassPath, stack_size: u32, resolver: &impl ItemResolver) -> Self {
        let mut instance = Self {
            item_class,
            stack_size,
            ..Default::default()
        };
        if let Some(item) = instance.get_item(resolver) {
            instance.stack_size = stack_size.min(item.max_stack_size);
        }
        instance
    }

    pub fn item_class(&self) -> &ItemClassPath {
        &self.item_class
    }

    pub fn stack_size(&self) -> u32 {
        self.stack_size
    }

    /// 换类时清掉缓存；类没变则什么也不做
    pub fn set_item_class(&mut self, item_class: ItemClassPath) {
        if self.item_class != item_class {
            self.item_class = item_class;
            self.reset_cached_item();
        }
    }

    pub fn reset_cached_item(&mut self) {
        self.cached_item = None;
    }

    pub fn cached_item(&self) -> Option<&Arc<ItemEntry>> {
        self.cached_item.as_ref()
    }

    /// 解析并缓存物品定义，多次调用结果相同
    pub fn get_item(&mut self, resolver: &impl ItemResolver) -> Option<Arc<ItemEntry>> {
        if self.cached_item.is_none() && !self.item_class.is_empty() {
            self.cached_item = resolver.resolve(&self.item_class);
        }
        self.cached_item.clone()
    }

    pub fn is_null_item(&mut self, resolver: &impl ItemResolver) -> bool {
        self.stack_size == 0 || self.get_item(resolver).is_none()
    }

    /// 类解析不出来时为 0
    pub fn max_stack_size(&mut self, resolver: &impl ItemResolver) -> u32 {
        self.get_item(resolver).map_or(0, |item| item.max_stack_size)
    }

    /// 返回实际加进去的数量。超出上限的部分不会自动变成新堆叠，
    /// 需要调用方拿剩余数量自己去开新实例。
    pub fn add_to_stack(&mut self, amount: u32, resolver: &impl ItemResolver) -> u32 {
        let room = self.max_stack_size(resolver).saturating_sub(self.stack_size);
        let added = amount.min(room);
        self.stack_size += added;
        added
    }

    /// 返回实际移除的数量，最多减到 0
    pub fn remove_from_stack(&mut self, amount: u32) -> u32 {
        let removed = amount.min(self.stack_size);
        self.stack_size -= removed;
        removed
    }

    /// 从本堆叠拆出 `amount` 个作为新实例（新 Id，同类同容器）。
    /// 数量为 0 或超过现有数量时返回 `None`，本实例不变。
    pub fn split_stack(&mut self, amount: u32) -> Option<ItemInstance> {
        if amount == 0 || amount > self.stack_size {
            return None;
        }
        self.stack_size -= amount;
        Some(self.with_stack(amount))
    }

    /// 复制一份，换新 Id 和堆叠数（按上限截断）
    pub fn clone_with_stack(&mut self, stack_size: u32, resolver: &impl ItemResolver) -> ItemInstance {
        let stack_size = match self.get_item(resolver) {
            Some(item) => stack_size.min(item.max_stack_size),
            None => stack_size,
        };
        self.with_stack(stack_size)
    }

    fn with_stack(&self, stack_size: u32) -> ItemInstance {
        ItemInstance {
            id: ItemInstanceId::new(),
            item_class: self.item_class.clone(),
            container_id: self.container_id.clone(),
            stack_size,
            cached_item: self.cached_item.clone(),
        }
    }

    /// 线性格子序号 → (行, 列)；列数为 0 时没有意义，返回 `None`
    pub fn index_2d(column_count: u32, slot: u32) -> Option<GridIndex> {
        if column_count == 0 {
            return None;
        }
        Some(GridIndex {
            row: slot / column_count,
            column: slot % column_count,
        })
    }
}

// 按身份比较：Id、类、容器
impl PartialEq for ItemInstance {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.item_class == other.item_class
            && self.container_id == other.container_id
    }
}

impl Eq for ItemInstance {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::registry::tests::{POTION, SWORD, sample_registry};

    fn potion(stack: u32) -> ItemInstance {
        ItemInstance::new(ItemClassPath::new(POTION), stack, &sample_registry())
    }

    #[test]
    fn add_to_stack_clamps_at_max() {
        let registry = sample_registry();
        for start in 0..=10 {
            for amount in 0..=15 {
                let mut item = potion(start);
                let added = item.add_to_stack(amount, &registry);
                assert_eq!(item.stack_size(), (start + amount).min(10));
                assert_eq!(added, item.stack_size() - start);
            }
        }
    }

    #[test]
    fn remove_from_stack_floors_at_zero() {
        for start in 0..=10 {
            for amount in 0..=15 {
                let mut item = potion(start);
                let removed = item.remove_from_stack(amount);
                assert_eq!(item.stack_size(), start.saturating_sub(amount));
                assert_eq!(removed, start - item.stack_size());
            }
        }
    }

    #[test]
    fn new_clamps_to_max_stack() {
        assert_eq!(potion(42).stack_size(), 10);
        let sword = ItemInstance::new(ItemClassPath::new(SWORD), 3, &sample_registry());
        assert_eq!(sword.stack_size(), 1);
    }

    #[test]
    fn split_stack_conserves_count() {
        let mut item = potion(7);
        let split = item.split_stack(3).expect("3 <= 7");
        assert_eq!(item.stack_size() + split.stack_size(), 7);
        assert_eq!(split.stack_size(), 3);
        assert_ne!(item.id, split.id);
        assert_eq!(item.item_class(), split.item_class());
        assert_eq!(item.container_id, split.container_id);
    }

    #[test]
    fn split_stack_beyond_size_leaves_original_alone() {
        let mut item = potion(4);
        assert!(item.split_stack(5).is_none());
        assert!(item.split_stack(0).is_none());
        assert_eq!(item.stack_size(), 4);
    }

    #[test]
    fn split_whole_stack_empties_source() {
        let registry = sample_registry();
        let mut item = potion(4);
        let split = item.split_stack(4).expect("whole stack");
        assert_eq!(split.stack_size(), 4);
        assert!(item.is_null_item(&registry));
    }

    #[test]
    fn clone_with_stack_gets_new_identity() {
        let registry = sample_registry();
        let mut item = potion(2);
        let copy = item.clone_with_stack(20, &registry);
        assert_ne!(copy.id, item.id);
        assert_eq!(copy.item_class(), item.item_class());
        assert_eq!(copy.stack_size(), 10);
        assert_eq!(item.stack_size(), 2);
    }

    #[test]
    fn null_item_when_empty_or_unresolved() {
        let registry = sample_registry();
        assert!(potion(0).is_null_item(&registry));
        assert!(!potion(1).is_null_item(&registry));

        let mut missing = ItemInstance::new(ItemClassPath::new("/Game/Items/Gone.Gone_C"), 5, &registry);
        assert!(missing.is_null_item(&registry));
        assert_eq!(missing.add_to_stack(3, &registry), 0);

        let mut unresolvable = potion(5);
        unresolvable.reset_cached_item();
        assert!(unresolvable.is_null_item(&()));
    }

    #[test]
    fn get_item_caches_until_class_changes() {
        let registry = sample_registry();
        let mut item = potion(1);
        let first = item.get_item(&registry).expect("potion resolves");
        // 缓存命中后即使解析器换成空的也还能拿到
        let again = item.get_item(&()).expect("cached");
        assert!(Arc::ptr_eq(&first, &again));

        item.set_item_class(ItemClassPath::new(SWORD));
        assert!(item.cached_item().is_none());
        assert_eq!(item.get_item(&registry).map(|e| e.id.clone()), Some("sword".into()));
    }

    #[test]
    fn equality_ignores_stack_and_cache() {
        let mut a = potion(3);
        let mut b = a.clone();
        b.remove_from_stack(2);
        b.reset_cached_item();
        assert_eq!(a, b);

        b.container_id = ContainerId::new("chest");
        assert_ne!(a, b);

        let c = a.clone_with_stack(3, &sample_registry());
        assert_ne!(a, c);
    }

    #[test]
    fn cache_is_not_serialized() {
        let item = potion(3);
        assert!(item.cached_item().is_some());
        let json = serde_json::to_string(&item).expect("serialize");
        assert!(!json.contains("cached_item"));
        let back: ItemInstance = serde_json::from_str(&json).expect("deserialize");
        assert!(back.cached_item().is_none());
        assert_eq!(back, item);
        assert_eq!(back.stack_size(), 3);
    }

    #[test]
    fn index_2d_maps_slot_to_row_and_column() {
        assert_eq!(ItemInstance::index_2d(5, 7), Some(GridIndex { row: 1, column: 2 }));
        assert_eq!(ItemInstance::index_2d(5, 0), Some(GridIndex { row: 0, column: 0 }));
        assert_eq!(ItemInstance::index_2d(5, 4), Some(GridIndex { row: 0, column: 4 }));
        assert_eq!(ItemInstance::index_2d(0, 7), None);
    }
}
