use crate::api::client::{ApiClient, decode_item};
use crate::api::models::{ListQuery, NewUser, Page, User};
use crate::error::Result;
use crate::validation::{require, require_email};

pub const USERS_PATH: &str = "/admin/users";

impl ApiClient {
    pub async fn users(&self, query: &ListQuery) -> Result<Page<User>> {
        self.list(USERS_PATH, "users", query).await
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<User> {
        require("Name", &user.name)?;
        require_email(&user.email)?;
        let json = self.post_json(USERS_PATH, user).await?;
        decode_item(&json, "user")
    }
}
