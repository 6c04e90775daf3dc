use crate::models::{IanProfile, PublicProfile, SessionUser};

/// Derive the directory entry for `owner`. `notes` has no counterpart in
/// [`PublicProfile`], so it cannot leak through this path.
pub fn project(owner: &SessionUser, profile: &IanProfile, last_updated: Option<String>) -> PublicProfile {
    PublicProfile {
        user_id: owner.user_id.clone(),
        display_name: owner.display_name.clone(),
        email: owner.email.clone(),
        avatar: profile.avatar.clone(),
        first_name: profile.first_name.clone(),
        last_name: profile.last_name.clone(),
        discipline: profile.discipline.clone(),
        department: profile.department.clone(),
        academic_email: profile.academic_email.clone(),
        objectives: profile.objectives.clone(),
        last_updated,
    }
}
