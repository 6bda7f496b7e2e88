/// The acting identity of a request
///
/// Every authorization decision receives the principal explicitly.

use crate::project::types::User;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "user", rename_all = "lowercase")]
pub enum Principal {
    Anonymous,
    User(User),
}

impl Principal {
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Anonymous => None,
            Self::User(user) => Some(user),
        }
    }

    pub fn login(&self) -> &str {
        self.user().map(|u| u.login.as_str()).unwrap_or("anonymous")
    }

    /// Active administrator
    pub fn is_admin(&self) -> bool {
        self.user().is_some_and(|u| u.admin && u.is_active())
    }
}

impl From<User> for Principal {
    fn from(user: User) -> Self {
        Self::User(user)
    }
}
