use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Role;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Member
}

/// The fixed roster of apartments and people a board is shared between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Household {
    pub apartments: Vec<String>,
    pub members: Vec<Member>,
}

impl Default for Household {
    fn default() -> Self {
        let member = |name: &str, role: Role| Member {
            name: name.to_string(),
            email: format!("{name}@household.local"),
            role,
        };
        Self {
            apartments: vec![
                "Garden Flat".into(),
                "First Floor".into(),
                "Second Floor".into(),
                "Attic".into(),
            ],
            members: vec![
                member("admin", Role::Admin),
                member("ana", Role::Member),
                member("luca", Role::Member),
                member("mia", Role::Member),
            ],
        }
    }
}

impl Household {
    /// Read the roster from `path`, falling back to the built-in roster when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read household file at {}", path.display()))?;
        Self::from_toml(&raw)
            .with_context(|| format!("Failed to parse household file at {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Case-insensitive apartment lookup returning the roster spelling.
    pub fn resolve_apartment(&self, tag: &str) -> Option<&str> {
        let needle = tag.trim();
        self.apartments
            .iter()
            .find(|a| a.eq_ignore_ascii_case(needle))
            .map(String::as_str)
    }

    pub fn session_for_email(&self, uid: &str, email: &str) -> Result<Session, SessionError> {
        let email = email.trim();
        let member = self
            .members
            .iter()
            .find(|m| m.email.eq_ignore_ascii_case(email))
            .ok_or_else(|| SessionError::UnknownEmail(email.to_string()))?;
        Ok(Session {
            uid: uid.to_string(),
            name: member.name.clone(),
            role: member.role,
        })
    }

    /// Session for `email`, or for the first admin on the roster when none is given.
    pub fn session_or_first_admin(
        &self,
        uid: &str,
        email: Option<&str>,
    ) -> Result<Session, SessionError> {
        match email {
            Some(email) => self.session_for_email(uid, email),
            None => {
                let admin = self
                    .members
                    .iter()
                    .find(|m| m.role.is_admin())
                    .ok_or(SessionError::NoAdmin)?;
                self.session_for_email(uid, &admin.email)
            }
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("{0} is not on the household roster")]
    UnknownEmail(String),
    #[error("The household roster has no admin")]
    NoAdmin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub uid: String,
    pub name: String,
    pub role: Role,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Whether this session may act on a record owned by `owner`.
    pub fn can_manage(&self, owner: &str) -> bool {
        self.is_admin() || self.name == owner
    }
}
