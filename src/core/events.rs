use bevy::prelude::*;

/// 给玩家看的一行输出，由 main 里的 forward_log_event 打印
#[derive(Event)]
pub struct LogEvent(pub String);
