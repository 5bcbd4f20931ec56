use bevy::asset::Asset;
use bevy::reflect::TypePath;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 软类路径：只记路径，用到时再去注册表里解析
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemClassPath(pub String);

impl ItemClassPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ItemClassPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 静态物品表中的一条
#[derive(Debug, Clone, Deserialize)]
pub struct ItemEntry {
    pub id:    String,
    pub name:  String,
    pub class: ItemClassPath,
    #[serde(default = "default_max_stack_size")] pub max_stack_size: u32,
    #[serde(default)] pub description: String,
}

fn default_max_stack_size() -> u32 {
    1
}

#[derive(Asset, TypePath, Deserialize, Debug)]
pub struct ItemList {
    pub items: Vec<ItemEntry>,
}
