use crate::error::Result;
use crate::schema::{Role, UserProfile};
use crate::store::{get_typed, list_typed, put_typed, DocumentStore, USERS_COLLECTION};
use log::info;

const DEFAULT_DISPLAY_NAME: &str = "Kullanıcı";

/// User profiles kept in the `users` collection, keyed by identity-provider uid.
pub struct UserDirectory<'s, S: DocumentStore + ?Sized> {
    store: &'s mut S,
}

impl<'s, S: DocumentStore + ?Sized> UserDirectory<'s, S> {
    pub fn new(store: &'s mut S) -> Self {
        Self { store }
    }

    /// Returns the stored profile, creating an unauthorized one on first sign-in.
    pub fn resolve_sign_in(&mut self, uid: &str, email: &str) -> Result<UserProfile> {
        if let Some(profile) = get_typed::<S, UserProfile>(self.store, USERS_COLLECTION, uid)? {
            return Ok(profile);
        }

        let profile = UserProfile {
            uid: uid.to_string(),
            email: email.to_string(),
            display_name: default_display_name(email),
            role: Role::Unauthorized,
            branch_id: String::new(),
        };
        put_typed(self.store, USERS_COLLECTION, uid, &profile)?;
        info!("Created profile for {} awaiting authorization", email);
        Ok(profile)
    }

    pub fn get(&self, uid: &str) -> Result<Option<UserProfile>> {
        get_typed(&*self.store, USERS_COLLECTION, uid)
    }

    /// Profiles ordered by e-mail.
    pub fn list(&self) -> Result<Vec<UserProfile>> {
        let mut users: Vec<UserProfile> = list_typed(&*self.store, USERS_COLLECTION)?
            .into_iter()
            .map(|(_, profile)| profile)
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    /// Sets role and branch label. Returns `None` if no such user exists.
    pub fn update_permission(
        &mut self,
        uid: &str,
        role: Role,
        branch_id: &str,
    ) -> Result<Option<UserProfile>> {
        let Some(mut profile) = self.get(uid)? else {
            return Ok(None);
        };
        profile.role = role;
        profile.branch_id = branch_id.trim().to_string();
        put_typed(self.store, USERS_COLLECTION, uid, &profile)?;
        info!("Updated {} to {:?} ({})", profile.email, role, profile.branch_id);
        Ok(Some(profile))
    }

    /// Registers a manager profile ahead of their first sign-in.
    pub fn create_manager(
        &mut self,
        uid: &str,
        email: &str,
        display_name: &str,
        branch_id: &str,
    ) -> Result<UserProfile> {
        let display_name = if display_name.trim().is_empty() {
            default_display_name(email)
        } else {
            display_name.trim().to_string()
        };
        let profile = UserProfile {
            uid: uid.to_string(),
            email: email.trim().to_string(),
            display_name,
            role: Role::Manager,
            branch_id: branch_id.trim().to_string(),
        };
        put_typed(self.store, USERS_COLLECTION, uid, &profile)?;
        info!("Created manager {} for {}", profile.email, profile.branch_id);
        Ok(profile)
    }
}

fn default_display_name(email: &str) -> String {
    match email.split('@').next().map(str::trim) {
        Some(local) if !local.is_empty() => local.to_string(),
        _ => DEFAULT_DISPLAY_NAME.to_string(),
    }
}
