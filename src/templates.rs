pub const DEFAULT_CONFIG_JSON: &str = include_str!("../defaults/config.json");
