//! Teams, join requests and who leads whom.
//!
//! Every mutation here touches both sides of the relation: the team's id lists
//! and the matching back-reference lists on the user documents.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info};
use rand::Rng;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::fanout::{Fanout, Notice};
use crate::models::{insert_unique, new_id, remove_id, PublicUser, Team, TeamJoinRequest, User};
use crate::store::Store;

pub const TEAM_CODE_LEN: usize = 5;
const TEAM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const TEAM_CODE_ATTEMPTS: usize = 16;

#[derive(Debug, Default, Clone)]
pub struct NewTeam {
    pub team_name: String,
    pub team_logo: Option<String>,
    pub team_slogan: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct TeamChanges {
    pub team_name: Option<String>,
    pub team_code: Option<String>,
    pub team_logo: Option<String>,
    pub team_slogan: Option<String>,
}

/// A pending join request with the requester resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequestDetails {
    #[serde(flatten)]
    pub request: TeamJoinRequest,
    pub requester: Option<PublicUser>,
}

fn generate_team_code() -> String {
    let mut rng = rand::thread_rng();
    (0..TEAM_CODE_LEN)
        .map(|_| TEAM_CODE_ALPHABET[rng.gen_range(0..TEAM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Codes are compared uppercase; users type them by hand.
pub fn normalize_team_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn is_valid_team_code(code: &str) -> bool {
    code.len() == TEAM_CODE_LEN
        && code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

fn display_name(user: &User) -> &str {
    if user.full_name.trim().is_empty() {
        &user.user_name
    } else {
        &user.full_name
    }
}

#[derive(Clone)]
pub struct Membership {
    store: Arc<dyn Store>,
    fanout: Fanout,
}

impl Membership {
    pub fn new(store: Arc<dyn Store>, fanout: Fanout) -> Self {
        Self { store, fanout }
    }

    async fn load_user(&self, id: &str) -> AppResult<User> {
        self.store.find_user(id).await?.ok_or(AppError::NotFound("User"))
    }

    async fn load_team(&self, id: &str) -> AppResult<Team> {
        self.store.find_team(id).await?.ok_or(AppError::NotFound("Team"))
    }

    async fn save_user(&self, user: &User) -> AppResult<()> {
        if !self.store.replace_user(user).await? {
            return Err(AppError::NotFound("User"));
        }
        Ok(())
    }

    async fn save_team(&self, team: &Team) -> AppResult<()> {
        if !self.store.replace_team(team).await? {
            return Err(AppError::NotFound("Team"));
        }
        Ok(())
    }

    /// Applies `edit` to a user if it still exists. Missing users are skipped:
    /// back-references to deleted accounts are not an error.
    async fn edit_user(&self, id: &str, edit: impl FnOnce(&mut User) -> bool) -> AppResult<()> {
        if let Some(mut user) = self.store.find_user(id).await? {
            if edit(&mut user) {
                self.store.replace_user(&user).await?;
            }
        } else {
            debug!("User {} no longer exists, back-reference skipped", id);
        }
        Ok(())
    }

    async fn unique_team_code(&self) -> AppResult<String> {
        for _ in 0..TEAM_CODE_ATTEMPTS {
            let code = generate_team_code();
            if self.store.find_team_by_code(&code).await?.is_none() {
                return Ok(code);
            }
        }
        Err(AppError::Unexpected(
            "could not generate a unique team code".to_string(),
        ))
    }

    fn require_supervisor(team: &Team, actor: &str) -> AppResult<()> {
        if team.supervised_by != actor {
            return Err(AppError::Forbidden(
                "Only the team supervisor can do this".to_string(),
            ));
        }
        Ok(())
    }

    fn require_moderator(team: &Team, actor: &str) -> AppResult<()> {
        if !team.is_moderated_by(actor) {
            return Err(AppError::Forbidden(
                "Only the team supervisor or a manager can do this".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn create_team(&self, creator_id: &str, input: NewTeam) -> AppResult<Team> {
        let team_name = input.team_name.trim().to_string();
        if team_name.is_empty() {
            return Err(AppError::invalid("Team name is required"));
        }
        let name_key = Team::name_key(&team_name);
        if self.store.find_team_by_name_key(&name_key).await?.is_some() {
            return Err(AppError::conflict("Team name is already taken"));
        }
        let mut creator = self.load_user(creator_id).await?;

        let team = Team {
            id: new_id(),
            team_name,
            team_name_key: name_key,
            team_code: self.unique_team_code().await?,
            team_logo: input.team_logo.unwrap_or_default(),
            team_slogan: input.team_slogan.unwrap_or_default(),
            supervised_by: creator.id.clone(),
            managed_by: Vec::new(),
            members: Vec::new(),
            created_at: Utc::now(),
        };
        self.store.insert_team(&team).await?;

        insert_unique(&mut creator.supervisor_of_teams, &team.id);
        self.save_user(&creator).await?;

        info!(
            "Team {} ({}) created by {}",
            team.team_name, team.team_code, creator.id
        );
        Ok(team)
    }

    pub async fn request_join(&self, user_id: &str, team_code: &str) -> AppResult<TeamJoinRequest> {
        let team_code = normalize_team_code(team_code);
        if team_code.is_empty() {
            return Err(AppError::invalid("Team code is required"));
        }
        let team = self
            .store
            .find_team_by_code(&team_code)
            .await?
            .ok_or(AppError::NotFound("Team"))?;
        let user = self.load_user(user_id).await?;

        if team.is_member(&user.id) {
            return Err(AppError::conflict("You are already a member of this team"));
        }
        if self
            .store
            .find_pending_join_request(&user.id, &team.team_code)
            .await?
            .is_some()
        {
            return Err(AppError::conflict(
                "You already have a pending request for this team",
            ));
        }

        let request = TeamJoinRequest {
            id: new_id(),
            user: user.id.clone(),
            team_code: team.team_code.clone(),
            is_approved: false,
            approved_by: None,
            created_at: Utc::now(),
        };
        self.store.insert_join_request(&request).await?;
        info!("User {} requested to join team {}", user.id, team.id);

        let name = display_name(&user);
        self.fanout
            .notify_quietly(
                Notice::new(
                    "New Team Join Request",
                    format!("Join request from {}", name),
                    format!("User {} has requested to join your team.", name),
                )
                .from_user(&user.id)
                .to(vec![team.supervised_by.clone()]),
            )
            .await;

        Ok(request)
    }

    async fn load_request_and_team(
        &self,
        request_id: &str,
    ) -> AppResult<(TeamJoinRequest, Team)> {
        let request = self
            .store
            .find_join_request(request_id)
            .await?
            .ok_or(AppError::NotFound("Join request"))?;
        let team = self
            .store
            .find_team_by_code(&request.team_code)
            .await?
            .ok_or(AppError::NotFound("Team"))?;
        Ok((request, team))
    }

    pub async fn approve_join(&self, actor: &str, request_id: &str) -> AppResult<Team> {
        let (request, mut team) = self.load_request_and_team(request_id).await?;
        Self::require_moderator(&team, actor)?;

        insert_unique(&mut team.members, &request.user);
        self.save_team(&team).await?;
        let team_id = team.id.clone();
        self.edit_user(&request.user, |u| {
            insert_unique(&mut u.member_of_teams, &team_id)
        })
        .await?;
        self.store.delete_join_request(&request.id).await?;
        info!(
            "Join request {} approved by {}, user {} added to team {}",
            request.id, actor, request.user, team.id
        );

        self.fanout
            .notify_quietly(
                Notice::new(
                    "Team Join Request Approved",
                    "",
                    format!("You have been added to the team {}.", team.team_name),
                )
                .from_user(actor)
                .to(vec![request.user.clone()]),
            )
            .await;

        Ok(team)
    }

    pub async fn reject_join(&self, actor: &str, request_id: &str) -> AppResult<()> {
        let (request, team) = self.load_request_and_team(request_id).await?;
        Self::require_moderator(&team, actor)?;

        self.store.delete_join_request(&request.id).await?;
        info!("Join request {} rejected by {}", request.id, actor);

        self.fanout
            .notify_quietly(
                Notice::new(
                    "Team Join Request Rejected",
                    "",
                    "Your request to join the team was rejected.",
                )
                .from_user(actor)
                .to(vec![request.user.clone()]),
            )
            .await;
        Ok(())
    }

    pub async fn list_join_requests(
        &self,
        actor: &str,
        team_id: &str,
    ) -> AppResult<Vec<JoinRequestDetails>> {
        let team = self.load_team(team_id).await?;
        Self::require_moderator(&team, actor)?;

        let requests = self.store.list_join_requests(&team.team_code).await?;
        let user_ids: Vec<String> = requests.iter().map(|r| r.user.clone()).collect();
        let users = self.store.find_users(&user_ids).await?;

        Ok(requests
            .into_iter()
            .map(|request| {
                let requester = users
                    .iter()
                    .find(|u| u.id == request.user)
                    .cloned()
                    .map(PublicUser::from);
                JoinRequestDetails { request, requester }
            })
            .collect())
    }

    pub async fn add_manager(&self, actor: &str, team_id: &str, user_id: &str) -> AppResult<Team> {
        let mut team = self.load_team(team_id).await?;
        Self::require_supervisor(&team, actor)?;
        let mut user = self.load_user(user_id).await?;

        if insert_unique(&mut team.managed_by, &user.id) {
            self.save_team(&team).await?;
        }
        if insert_unique(&mut user.manager_of_teams, &team.id) {
            self.save_user(&user).await?;
        }
        info!("User {} is now a manager of team {}", user.id, team.id);
        Ok(team)
    }

    pub async fn update_team(&self, actor: &str, team_id: &str, changes: TeamChanges) -> AppResult<Team> {
        let mut team = self.load_team(team_id).await?;
        Self::require_supervisor(&team, actor)?;

        if let Some(name) = changes.team_name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(AppError::invalid("Team name cannot be empty"));
            }
            let key = Team::name_key(&name);
            if let Some(other) = self.store.find_team_by_name_key(&key).await? {
                if other.id != team.id {
                    return Err(AppError::conflict("Team name is already taken"));
                }
            }
            team.team_name = name;
            team.team_name_key = key;
        }

        let mut old_code = None;
        if let Some(code) = changes.team_code {
            let code = normalize_team_code(&code);
            if !is_valid_team_code(&code) {
                return Err(AppError::invalid(format!(
                    "Team code must be {} uppercase letters or digits",
                    TEAM_CODE_LEN
                )));
            }
            if code != team.team_code {
                if self.store.find_team_by_code(&code).await?.is_some() {
                    return Err(AppError::conflict("Team code is already taken"));
                }
                old_code = Some(std::mem::replace(&mut team.team_code, code));
            }
        }
        if let Some(logo) = changes.team_logo {
            team.team_logo = logo;
        }
        if let Some(slogan) = changes.team_slogan {
            team.team_slogan = slogan;
        }

        self.save_team(&team).await?;

        // Pending requests are keyed by code; carry them over.
        if let Some(old_code) = old_code {
            for mut request in self.store.list_join_requests(&old_code).await? {
                self.store.delete_join_request(&request.id).await?;
                request.team_code = team.team_code.clone();
                self.store.insert_join_request(&request).await?;
            }
        }

        info!("Team {} updated by {}", team.id, actor);
        Ok(team)
    }

    /// Drops `user_id` from members and managers of `team`, and the team from
    /// the user's back-references. The supervisor cannot be removed this way.
    async fn detach_member(&self, team: &mut Team, user_id: &str) -> AppResult<bool> {
        if team.supervised_by == user_id {
            return Err(AppError::invalid(
                "The supervisor cannot leave the team, transfer ownership first",
            ));
        }
        let was_member = remove_id(&mut team.members, user_id);
        let was_manager = remove_id(&mut team.managed_by, user_id);
        let team_id = team.id.clone();
        self.edit_user(user_id, |u| {
            let a = remove_id(&mut u.member_of_teams, &team_id);
            let b = remove_id(&mut u.manager_of_teams, &team_id);
            a || b
        })
        .await?;
        Ok(was_member || was_manager)
    }

    pub async fn remove_member(&self, actor: &str, team_id: &str, user_id: &str) -> AppResult<Team> {
        let mut team = self.load_team(team_id).await?;
        Self::require_moderator(&team, actor)?;
        if !self.detach_member(&mut team, user_id).await? {
            return Err(AppError::NotFound("Team member"));
        }
        self.save_team(&team).await?;
        info!("User {} removed from team {} by {}", user_id, team.id, actor);
        Ok(team)
    }

    pub async fn bulk_remove_members(
        &self,
        actor: &str,
        team_id: &str,
        user_ids: &[String],
    ) -> AppResult<Team> {
        if user_ids.is_empty() {
            return Err(AppError::invalid("userIds must not be empty"));
        }
        let mut team = self.load_team(team_id).await?;
        Self::require_moderator(&team, actor)?;
        if user_ids.iter().any(|id| *id == team.supervised_by) {
            return Err(AppError::invalid(
                "The supervisor cannot be removed, transfer ownership first",
            ));
        }

        let mut removed = 0usize;
        for user_id in user_ids {
            if self.detach_member(&mut team, user_id).await? {
                removed += 1;
            }
        }
        self.save_team(&team).await?;
        info!(
            "{} of {} user(s) removed from team {} by {}",
            removed,
            user_ids.len(),
            team.id,
            actor
        );
        Ok(team)
    }

    pub async fn leave_team(&self, user_id: &str, team_id: &str) -> AppResult<Team> {
        let mut team = self.load_team(team_id).await?;
        if !self.detach_member(&mut team, user_id).await? {
            return Err(AppError::invalid("You are not a member of this team"));
        }
        self.save_team(&team).await?;
        info!("User {} left team {}", user_id, team.id);
        Ok(team)
    }

    pub async fn transfer_ownership(
        &self,
        actor: &str,
        team_id: &str,
        new_supervisor_id: &str,
    ) -> AppResult<Team> {
        let mut team = self.load_team(team_id).await?;
        Self::require_supervisor(&team, actor)?;
        if new_supervisor_id == team.supervised_by {
            return Ok(team);
        }
        let mut successor = self.load_user(new_supervisor_id).await?;

        let previous = std::mem::replace(&mut team.supervised_by, successor.id.clone());
        remove_id(&mut team.managed_by, &successor.id);
        self.save_team(&team).await?;

        insert_unique(&mut successor.supervisor_of_teams, &team.id);
        remove_id(&mut successor.manager_of_teams, &team.id);
        self.save_user(&successor).await?;

        let team_id = team.id.clone();
        self.edit_user(&previous, |u| remove_id(&mut u.supervisor_of_teams, &team_id))
            .await?;

        info!(
            "Team {} ownership transferred from {} to {}",
            team.id, previous, successor.id
        );
        Ok(team)
    }

    pub async fn delete_team(&self, actor: &str, team_id: &str) -> AppResult<()> {
        let team = self.load_team(team_id).await?;
        Self::require_supervisor(&team, actor)?;

        let mut affected = vec![team.supervised_by.clone()];
        for id in team.managed_by.iter().chain(team.members.iter()) {
            insert_unique(&mut affected, id);
        }
        for user_id in &affected {
            self.edit_user(user_id, |u| {
                let a = remove_id(&mut u.member_of_teams, &team.id);
                let b = remove_id(&mut u.manager_of_teams, &team.id);
                let c = remove_id(&mut u.supervisor_of_teams, &team.id);
                a || b || c
            })
            .await?;
        }
        for request in self.store.list_join_requests(&team.team_code).await? {
            self.store.delete_join_request(&request.id).await?;
        }
        self.store.delete_team(&team.id).await?;

        info!(
            "Team {} deleted by {}, {} user(s) detached",
            team.id,
            actor,
            affected.len()
        );
        Ok(())
    }

    /// Participants followed by the supervisor and managers of every team a
    /// participant belongs to. First-seen order, no duplicates.
    pub async fn escalation_recipients(&self, participants: &[String]) -> AppResult<Vec<String>> {
        let mut recipients = Vec::new();
        for id in participants {
            insert_unique(&mut recipients, id);
        }

        let users = self.store.find_users(participants).await?;
        let mut team_ids = Vec::new();
        for id in participants {
            if let Some(user) = users.iter().find(|u| &u.id == id) {
                for team in &user.member_of_teams {
                    insert_unique(&mut team_ids, team);
                }
            }
        }
        if team_ids.is_empty() {
            return Ok(recipients);
        }

        let teams = self.store.find_teams(&team_ids).await?;
        for team_id in &team_ids {
            if let Some(team) = teams.iter().find(|t| &t.id == team_id) {
                for leader in team.leadership() {
                    insert_unique(&mut recipients, leader);
                }
            }
        }
        Ok(recipients)
    }

    /// Users whose tasks `viewer` can see. Employees see their own; managers
    /// and supervisors also see every member of the teams they oversee.
    pub async fn visible_user_ids(&self, viewer: &User) -> AppResult<Vec<String>> {
        let mut ids = vec![viewer.id.clone()];
        let overseen = viewer.overseen_teams();
        if !viewer.position.oversees_teams() || overseen.is_empty() {
            return Ok(ids);
        }
        for member in self.store.find_team_members(&overseen).await? {
            insert_unique(&mut ids, &member.id);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fanout, seed_team, seed_user, MemoryStore, RecordingPush};

    fn service(store: &Arc<MemoryStore>) -> Membership {
        Membership::new(store.clone(), fanout(store, Arc::new(RecordingPush::default())))
    }

    #[test]
    fn generated_codes_are_valid() {
        for _ in 0..64 {
            assert!(is_valid_team_code(&generate_team_code()));
        }
        assert!(!is_valid_team_code("abcd1"));
        assert!(!is_valid_team_code("ABCD"));
    }

    #[actix_web::test]
    async fn create_team_makes_creator_supervisor() {
        let store = Arc::new(MemoryStore::default());
        let boss = seed_user(&store, "boss").await;
        let svc = service(&store);

        let team = svc
            .create_team(&boss.id, NewTeam { team_name: "  Core ".into(), ..NewTeam::default() })
            .await
            .unwrap();

        assert_eq!(team.team_name, "Core");
        assert_eq!(team.supervised_by, boss.id);
        assert!(is_valid_team_code(&team.team_code));
        let boss = store.find_user(&boss.id).await.unwrap().unwrap();
        assert_eq!(boss.supervisor_of_teams, vec![team.id.clone()]);

        let err = svc
            .create_team(&boss.id, NewTeam { team_name: "core".into(), ..NewTeam::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[actix_web::test]
    async fn join_flow_request_duplicate_then_approve() {
        let store = Arc::new(MemoryStore::default());
        let boss = seed_user(&store, "boss").await;
        let user = seed_user(&store, "u").await;
        let team = seed_team(&store, "Core", "ABCD1", &boss.id, &[]).await;
        let svc = service(&store);

        let request = svc.request_join(&user.id, "ABCD1").await.unwrap();
        assert_eq!(store.join_request_count(), 1);

        let err = svc.request_join(&user.id, "abcd1").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.join_request_count(), 1);

        // The supervisor is told about the request.
        let inbox = store.list_notifications_for(&boss.id).await.unwrap();
        assert_eq!(inbox[0].title, "New Team Join Request");

        let approved = svc.approve_join(&boss.id, &request.id).await.unwrap();
        assert!(approved.is_member(&user.id));
        assert_eq!(store.join_request_count(), 0);
        let user = store.find_user(&user.id).await.unwrap().unwrap();
        assert_eq!(user.member_of_teams, vec![team.id.clone()]);

        let err = svc.request_join(&user.id, "ABCD1").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[actix_web::test]
    async fn unknown_team_code_is_not_found() {
        let store = Arc::new(MemoryStore::default());
        let user = seed_user(&store, "u").await;
        let err = service(&store).request_join(&user.id, "ZZZZZ").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("Team")));
    }

    #[actix_web::test]
    async fn only_leadership_resolves_requests() {
        let store = Arc::new(MemoryStore::default());
        let boss = seed_user(&store, "boss").await;
        let user = seed_user(&store, "u").await;
        let outsider = seed_user(&store, "outsider").await;
        seed_team(&store, "Core", "ABCD1", &boss.id, &[]).await;
        let svc = service(&store);

        let request = svc.request_join(&user.id, "ABCD1").await.unwrap();
        let err = svc.approve_join(&outsider.id, &request.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        svc.reject_join(&boss.id, &request.id).await.unwrap();
        assert_eq!(store.join_request_count(), 0);
        let inbox = store.list_notifications_for(&user.id).await.unwrap();
        assert_eq!(inbox[0].title, "Team Join Request Rejected");
    }

    #[actix_web::test]
    async fn escalation_covers_supervisors_and_managers() {
        let store = Arc::new(MemoryStore::default());
        let boss = seed_user(&store, "boss").await;
        let manager = seed_user(&store, "manager").await;
        let p1 = seed_user(&store, "p1").await;
        let p2 = seed_user(&store, "p2").await;
        let team = seed_team(&store, "Core", "ABCD1", &boss.id, &[&p1.id, &p2.id]).await;
        let svc = service(&store);
        svc.add_manager(&boss.id, &team.id, &manager.id).await.unwrap();

        let recipients = svc
            .escalation_recipients(&[p1.id.clone(), p2.id.clone()])
            .await
            .unwrap();
        assert_eq!(recipients, vec![p1.id, p2.id, boss.id, manager.id]);
    }

    #[actix_web::test]
    async fn remove_and_leave_keep_both_sides_consistent() {
        let store = Arc::new(MemoryStore::default());
        let boss = seed_user(&store, "boss").await;
        let a = seed_user(&store, "a").await;
        let b = seed_user(&store, "b").await;
        let team = seed_team(&store, "Core", "ABCD1", &boss.id, &[&a.id, &b.id]).await;
        let svc = service(&store);

        let team_after = svc.remove_member(&boss.id, &team.id, &a.id).await.unwrap();
        assert!(!team_after.is_member(&a.id));
        let a = store.find_user(&a.id).await.unwrap().unwrap();
        assert!(a.member_of_teams.is_empty());

        svc.leave_team(&b.id, &team.id).await.unwrap();
        let b = store.find_user(&b.id).await.unwrap().unwrap();
        assert!(b.member_of_teams.is_empty());

        let err = svc.leave_team(&boss.id, &team.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[actix_web::test]
    async fn transfer_and_delete_update_back_references() {
        let store = Arc::new(MemoryStore::default());
        let boss = seed_user(&store, "boss").await;
        let heir = seed_user(&store, "heir").await;
        let team = seed_team(&store, "Core", "ABCD1", &boss.id, &[&heir.id]).await;
        let svc = service(&store);

        let err = svc.delete_team(&heir.id, &team.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        svc.transfer_ownership(&boss.id, &team.id, &heir.id).await.unwrap();
        let old = store.find_user(&boss.id).await.unwrap().unwrap();
        assert!(old.supervisor_of_teams.is_empty());

        svc.delete_team(&heir.id, &team.id).await.unwrap();
        assert!(store.find_team(&team.id).await.unwrap().is_none());
        let heir = store.find_user(&heir.id).await.unwrap().unwrap();
        assert!(heir.member_of_teams.is_empty());
        assert!(heir.supervisor_of_teams.is_empty());
    }

    #[actix_web::test]
    async fn code_change_carries_pending_requests() {
        let store = Arc::new(MemoryStore::default());
        let boss = seed_user(&store, "boss").await;
        let user = seed_user(&store, "u").await;
        let team = seed_team(&store, "Core", "ABCD1", &boss.id, &[]).await;
        let svc = service(&store);
        svc.request_join(&user.id, "ABCD1").await.unwrap();

        let changes = TeamChanges { team_code: Some("wxyz9".into()), ..TeamChanges::default() };
        let updated = svc.update_team(&boss.id, &team.id, changes).await.unwrap();

        assert_eq!(updated.team_code, "WXYZ9");
        let pending = svc.list_join_requests(&boss.id, &team.id).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].requester.as_ref().unwrap().id, user.id);
    }
}
