mod projects;
mod user;

pub use projects::cmd_list_projects;
pub use user::{cmd_user_add, cmd_user_delete};
