//! User management records

use crvs_models::HumanName;
use serde::{Deserialize, Serialize};

/// Body of a user-management `getUser` call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum UserQuery {
    #[serde(rename = "userId")]
    UserId(String),
    #[serde(rename = "practitionerId")]
    PractitionerId(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserModel {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub practitioner_id: Option<String>,
    /// System clients have no role
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub name: Vec<HumanName>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserRole {
    #[serde(default)]
    pub labels: Vec<RoleLabel>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleLabel {
    pub lang: String,
    pub label: String,
}

impl UserModel {
    pub fn role_label(&self, lang: &str) -> Option<&str> {
        self.role
            .as_ref()?
            .labels
            .iter()
            .find(|l| l.lang == lang)
            .map(|l| l.label.as_str())
    }

    pub fn name_in(&self, use_: &str) -> Option<&HumanName> {
        self.name.iter().find(|n| n.use_.as_deref() == Some(use_))
    }

    /// First name that is not in `primary`, used as the secondary-locale name
    pub fn name_locale(&self, primary: &str) -> Option<&HumanName> {
        self.name
            .iter()
            .find(|n| n.use_.as_deref() != Some(primary))
    }
}
