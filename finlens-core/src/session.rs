//! Session token and profile display fields

use anyhow::Result;

use crate::store::DurableBackend;

pub const TOKEN_KEY: &str = "access_token";
pub const USERNAME_KEY: &str = "username";
pub const EMAIL_KEY: &str = "email";
pub const FIRST_NAME_KEY: &str = "firstName";
pub const LAST_NAME_KEY: &str = "lastName";

const PROFILE_KEYS: [&str; 4] = [USERNAME_KEY, EMAIL_KEY, FIRST_NAME_KEY, LAST_NAME_KEY];

/// Profile fields as stored; any of them may be missing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserProfile {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserProfile {
    /// "First Last", then first name, then username, then "User"
    pub fn display_name(&self) -> String {
        match (non_blank(&self.first_name), non_blank(&self.last_name)) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.to_string(),
            _ => non_blank(&self.username).unwrap_or("User").to_string(),
        }
    }

    /// Email, or the username when it looks like one
    pub fn display_email(&self) -> String {
        if let Some(email) = non_blank(&self.email) {
            return email.to_string();
        }
        match non_blank(&self.username) {
            Some(u) if u.contains('@') => u.to_string(),
            _ => String::new(),
        }
    }

    /// Up to two upper-case initials from the display name
    pub fn initials(&self) -> String {
        self.display_name()
            .split_whitespace()
            .filter_map(|w| w.chars().next())
            .take(2)
            .flat_map(char::to_uppercase)
            .collect()
    }
}

fn non_blank(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub struct SessionStore<B: DurableBackend> {
    backend: B,
}

impl<B: DurableBackend> SessionStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Bearer token, if one was stored and is non-empty
    pub fn token(&self) -> Result<Option<String>> {
        Ok(self
            .backend
            .get(TOKEN_KEY)?
            .filter(|t| !t.trim().is_empty()))
    }

    pub fn set_token(&self, token: &str) -> Result<()> {
        self.backend.set(TOKEN_KEY, token)
    }

    pub fn profile(&self) -> Result<UserProfile> {
        Ok(UserProfile {
            username: self.backend.get(USERNAME_KEY)?,
            email: self.backend.get(EMAIL_KEY)?,
            first_name: self.backend.get(FIRST_NAME_KEY)?,
            last_name: self.backend.get(LAST_NAME_KEY)?,
        })
    }

    /// Write the fields that are `Some`; others are left as they are
    pub fn update_profile(&self, profile: &UserProfile) -> Result<()> {
        let fields = [
            (USERNAME_KEY, &profile.username),
            (EMAIL_KEY, &profile.email),
            (FIRST_NAME_KEY, &profile.first_name),
            (LAST_NAME_KEY, &profile.last_name),
        ];
        for (key, value) in fields {
            if let Some(v) = value {
                self.backend.set(key, v)?;
            }
        }
        Ok(())
    }

    /// Forget the token and profile
    pub fn clear(&self) -> Result<()> {
        self.backend.remove(TOKEN_KEY)?;
        for key in PROFILE_KEYS {
            self.backend.remove(key)?;
        }
        Ok(())
    }
}
