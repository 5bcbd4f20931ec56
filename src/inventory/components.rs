use bevy::prelude::*;
use crate::item::instance::ContainerId;

pub const BACKPACK: &str = "backpack";
pub const WORLD: &str = "world";
pub const CHEST: &str = "chest";

/// 玩家背包（挂在容器实体上）
#[derive(Component, Default)]
pub struct Backpack;

/// 地面上的物品都放这里，不限格数
#[derive(Component, Default)]
pub struct WorldContainer;

pub fn backpack_id() -> ContainerId {
    ContainerId::new(BACKPACK)
}

pub fn world_id() -> ContainerId {
    ContainerId::new(WORLD)
}
