mod favorites;
mod foods;
mod helpers;
mod log;
mod profile;
mod template;

pub(crate) use favorites::{cmd_fav_add, cmd_fav_list, cmd_fav_remove};
pub(crate) use foods::{cmd_custom_add, cmd_custom_delete, cmd_custom_list, cmd_foods};
pub(crate) use helpers::Service;
pub(crate) use log::{cmd_delete_log, cmd_history, cmd_log, cmd_today};
pub(crate) use profile::{cmd_init, cmd_profile_set, cmd_profile_show};
pub(crate) use template::{
    cmd_template_add, cmd_template_create, cmd_template_delete, cmd_template_list,
    cmd_template_log, cmd_template_remove, cmd_template_show,
};
