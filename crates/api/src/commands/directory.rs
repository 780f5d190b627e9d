//! User directory commands

use servicedesk_domain::{Result, ServiceDeskError, UserId};
use servicedesk_infra::DirectoryUser;

use crate::context::AppContext;
use crate::utils::command_helpers::execute_command;

pub async fn save_user(ctx: &AppContext, user: DirectoryUser) -> Result<()> {
    execute_command("directory::save_user", || async {
        if user.display_name.trim().is_empty() {
            return Err(ServiceDeskError::InvalidInput("display name is required".into()));
        }
        ctx.identity.save_user(&user).await
    })
    .await
}

pub async fn get_user(ctx: &AppContext, user_id: UserId) -> Result<DirectoryUser> {
    execute_command("directory::get_user", || async {
        ctx.identity
            .user(user_id)
            .await?
            .ok_or_else(|| ServiceDeskError::NotFound(format!("user {user_id}")))
    })
    .await
}
