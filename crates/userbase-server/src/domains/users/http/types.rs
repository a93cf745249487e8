use serde::{Deserialize, Serialize};
use userbase_core::User;

/// Raw query values; validated by `ListUsersCommand::parse`.
#[derive(Deserialize)]
pub(crate) struct ListUsersQuery {
    #[serde(default)]
    pub(crate) offset: Option<String>,
    #[serde(default)]
    pub(crate) limit: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct UserResponse {
    pub(crate) id: i64,
    pub(crate) created_on: String,
    pub(crate) name: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            created_on: user.created_on.to_rfc3339(),
            name: user.name,
        }
    }
}
