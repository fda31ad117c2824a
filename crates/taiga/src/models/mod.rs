//! Taiga tool-layer models.

mod connection;
mod project;
mod scope_config;
mod user_story;

pub use connection::TaigaConnection;
pub use project::TaigaProject;
pub use scope_config::{
    StatusMapping, TaigaScopeConfig, TypeMapping, USER_STORY_STANDARD_TYPE, USER_STORY_TYPE,
};
pub use user_story::TaigaUserStory;

pub(crate) use project::ApiProject;
pub(crate) use user_story::ApiUserStory;
