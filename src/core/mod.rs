use bevy::prelude::*;

pub mod states;
pub mod events;
pub mod resources;

use resources::GameConfig;

/// 核心插件：注册全局资源 / 事件 / 状态
pub struct CorePlugin;

impl Plugin for CorePlugin {
    fn build(&self, app: &mut App) {
        use states::AppState;

        // 配置读不到就用默认值，不影响启动
        let config = GameConfig::load_or_default(resources::CONFIG_PATH);

        app
            .init_state::<AppState>()
            .add_event::<events::LogEvent>()
            .insert_resource(config);
    }
}
