pub mod array;
pub mod container;
pub mod instance;

use bevy::prelude::*;
use container::{ContainerRegistry, track_containers};

/// 物品实例与容器：注册 ContainerId → Entity 索引
pub struct ItemPlugin;
impl Plugin for ItemPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ContainerRegistry>()
            .add_systems(PreUpdate, track_containers);
    }
}
