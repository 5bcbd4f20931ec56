use bevy::prelude::*;
use crate::item::instance::ContainerId;

#[derive(Event)]
pub struct GiveItemEvent {
    pub id:    String,
    pub count: u32,
}

/// 从背包某格丢弃若干个（直接销毁）
#[derive(Event)]
pub struct RemoveItemEvent {
    pub slot:  usize,
    pub count: u32,
}

/// 背包内拆堆叠
#[derive(Event)]
pub struct SplitStackEvent {
    pub slot:  usize,
    pub count: u32,
}

/// 在两个容器之间搬运
#[derive(Event)]
pub struct MoveItemEvent {
    pub from:  ContainerId,
    pub slot:  usize,
    pub count: u32,
    pub to:    ContainerId,
}

#[derive(Event)]
pub struct ListInventoryEvent(pub ContainerId);   // 让 CLI 请求打印某个容器
