//! 权威侧 → 观察者的增量同步。
//!
//! 观察者都是本进程内的回环对象：权威侧每帧对比基线算出增量，
//! 编码成字节发给观察者，观察者解码后应用到自己的镜像上。

pub mod codec;
pub mod events;
pub mod peers;
mod systems;

use bevy::prelude::*;
use crate::core::{resources::GameConfig, states::AppState};
use events::*;
use peers::ReplicationPeers;
use systems::*;

pub struct ReplicationPlugin;
impl Plugin for ReplicationPlugin {
    fn build(&self, app: &mut App) {
        let peers = app
            .world()
            .get_resource::<GameConfig>()
            .map_or(1, |config| config.replication_peers);

        app
            .insert_resource(ReplicationPeers::with_count(peers))
            .add_event::<ItemArrayPayloadEvent>()
            .add_event::<ItemReplicatedEvent>()
            .add_event::<ShowMirrorEvent>()
            // 放在 PostUpdate，保证本帧所有背包操作都已完成
            .add_systems(
                PostUpdate,
                (replicate_containers, receive_payloads, log_replicated, show_mirror)
                    .chain()
                    .run_if(in_state(AppState::InGame)),
            );
    }
}
