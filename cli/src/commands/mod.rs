mod foods;
mod helpers;
mod log;
mod summary;

pub(crate) use foods::{cmd_resolve, cmd_suggest};
pub(crate) use log::{cmd_delete, cmd_log, cmd_update};
pub(crate) use summary::{cmd_show, cmd_weekly};
