pub mod components;
pub mod events;
mod systems;

use bevy::prelude::*;
use crate::core::states::AppState;
use events::*;
use systems::*;

pub struct InventoryPlugin;
impl Plugin for InventoryPlugin {
    fn build(&self, app: &mut App) {
        app
            .add_event::<GiveItemEvent>()
            .add_event::<RemoveItemEvent>()
            .add_event::<SplitStackEvent>()
            .add_event::<MoveItemEvent>()
            .add_event::<ListInventoryEvent>()
            .add_systems(OnEnter(AppState::InGame), spawn_containers)
            .add_systems(
                Update,
                (
                    give_item,
                    remove_item,
                    split_stack,
                    move_item,
                    print_inventory,
                )
                    .chain()
                    .run_if(in_state(AppState::InGame)),
            );
    }
}
