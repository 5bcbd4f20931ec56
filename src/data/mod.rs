pub mod schema;
pub mod loader;
pub mod registry;

use bevy::prelude::*;
use schema::ItemList;
use registry::ItemRegistry;
use crate::core::{resources::GameConfig, states::AppState};

// --------------------------- 资源 ---------------------------
#[derive(Resource, Default)]
pub struct ItemAssets {
    handle: Option<Handle<ItemList>>,
}

// --------------------------- 插件 ---------------------------
pub struct DataPlugin;
impl Plugin for DataPlugin {
    fn build(&self, app: &mut App) {
        app
            // 注册资产类型 & Loader
            .init_asset::<ItemList>()
            .register_asset_loader(loader::RonItemLoader)
            // 注册资源
            .init_resource::<ItemAssets>()
            .init_resource::<ItemRegistry>()
            // Loading 流程
            .add_systems(OnEnter(AppState::Loading), start_loading)
            .add_systems(
                Update,
                check_loaded.run_if(in_state(AppState::Loading)),
            );
    }
}

// --------------------------- 系统 ---------------------------
fn start_loading(
    mut item_assets: ResMut<ItemAssets>,
    asset_server: Res<AssetServer>,
    config: Res<GameConfig>,
) {
    let handle: Handle<ItemList> = asset_server.load(config.items_path.clone());
    item_assets.handle = Some(handle);
}

/// 物品表就绪后建立注册表，切到 InGame
fn check_loaded(
    mut next: ResMut<NextState<AppState>>,
    mut registry: ResMut<ItemRegistry>,
    item_assets: Res<ItemAssets>,
    lists: Res<Assets<ItemList>>,
) {
    if let Some(h) = &item_assets.handle {
        if let Some(list) = lists.get(h) {
            *registry = ItemRegistry::from_list(list);
            info!("✔ Items loaded: {}", registry.len());
            next.set(AppState::InGame);
        }
    }
}
