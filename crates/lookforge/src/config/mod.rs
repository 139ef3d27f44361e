pub mod loader;
pub mod schema;

pub use loader::{
    default_config_path, load_config, load_config_from_str, load_config_or_default,
    resolve_api_key,
};
pub use schema::{
    ApiConfig, Config, DetailPageConfig, GenerationConfig, PosesConfig, SessionsConfig,
};
