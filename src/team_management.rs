// team_management.rs

use actix_web::{web, HttpResponse};
use log::debug;
use serde::Deserialize;
use serde_json::json;

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::membership::{NewTeam, TeamChanges};
use crate::middleware::AuthenticatedUser;
use crate::models::insert_unique;

// ─── REQUEST PAYLOADS ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateTeamRequest {
    pub team_name: String,
    pub team_logo: Option<String>,
    pub team_slogan: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JoinTeamRequest {
    pub team_code: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ApproveJoinRequest {
    pub join_request_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddManagerRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateTeamRequest {
    pub team_name: Option<String>,
    pub team_code: Option<String>,
    pub team_logo: Option<String>,
    pub team_slogan: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RemoveMemberRequest {
    pub team_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BulkRemoveRequest {
    pub user_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransferOwnershipRequest {
    pub new_supervisor_id: String,
}

// ─── ENDPOINTS ────────────────────────────────────────────────────────────────

// GET /api/team/user/{userId}
// Teams the caller belongs to in any role. Callers only see their own.
pub async fn get_user_teams(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    user_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    if user.id() != user_id.as_str() {
        return Err(AppError::Forbidden("Cannot access other user's teams".to_string()));
    }
    let account = data
        .store
        .find_user(&user_id)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    let mut team_ids = account.overseen_teams();
    for id in &account.member_of_teams {
        insert_unique(&mut team_ids, id);
    }
    let teams = data.store.find_teams(&team_ids).await?;
    debug!("User {} belongs to {} team(s)", user_id, teams.len());
    Ok(HttpResponse::Ok().json(json!({ "teams": teams })))
}

// POST /api/team
pub async fn create_team(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    body: web::Json<CreateTeamRequest>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    let team = data
        .membership
        .create_team(
            user.id(),
            NewTeam {
                team_name: body.team_name,
                team_logo: body.team_logo,
                team_slogan: body.team_slogan,
            },
        )
        .await?;
    Ok(HttpResponse::Created().json(json!({ "message": "Team created successfully", "team": team })))
}

// POST /api/team/join
pub async fn join_team(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    body: web::Json<JoinTeamRequest>,
) -> AppResult<HttpResponse> {
    if let Some(claimed) = &body.user_id {
        if claimed != user.id() {
            return Err(AppError::Forbidden(
                "Cannot act on behalf of another user".to_string(),
            ));
        }
    }
    let request = data.membership.request_join(user.id(), &body.team_code).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Join request sent successfully",
        "joinRequest": request,
    })))
}

// PUT /api/team/approve-join
pub async fn approve_join(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    body: web::Json<ApproveJoinRequest>,
) -> AppResult<HttpResponse> {
    let team = data
        .membership
        .approve_join(user.id(), &body.join_request_id)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Join request approved", "team": team })))
}

// DELETE /api/team/reject-join/{id}
pub async fn reject_join(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    request_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    data.membership.reject_join(user.id(), &request_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Join request rejected" })))
}

// GET /api/team/{teamId}/join-requests
pub async fn list_join_requests(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    team_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let requests = data.membership.list_join_requests(user.id(), &team_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "joinRequests": requests })))
}

// PUT /api/team/{teamId}/managers
pub async fn add_manager(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    team_id: web::Path<String>,
    body: web::Json<AddManagerRequest>,
) -> AppResult<HttpResponse> {
    let team = data
        .membership
        .add_manager(user.id(), &team_id, &body.user_id)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Manager added", "team": team })))
}

// PUT /api/team/{teamId}
pub async fn update_team(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    team_id: web::Path<String>,
    body: web::Json<UpdateTeamRequest>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    let team = data
        .membership
        .update_team(
            user.id(),
            &team_id,
            TeamChanges {
                team_name: body.team_name,
                team_code: body.team_code,
                team_logo: body.team_logo,
                team_slogan: body.team_slogan,
            },
        )
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Team updated successfully", "team": team })))
}

// PUT /api/team/remove-member/{userId}
pub async fn remove_member(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    member_id: web::Path<String>,
    body: web::Json<RemoveMemberRequest>,
) -> AppResult<HttpResponse> {
    let team = data
        .membership
        .remove_member(user.id(), &body.team_id, &member_id)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Member removed", "team": team })))
}

// PUT /api/team/bulk-remove-members/{teamId}
pub async fn bulk_remove_members(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    team_id: web::Path<String>,
    body: web::Json<BulkRemoveRequest>,
) -> AppResult<HttpResponse> {
    let team = data
        .membership
        .bulk_remove_members(user.id(), &team_id, &body.user_ids)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Members removed", "team": team })))
}

// PUT /api/team/leave/{teamId}
pub async fn leave_team(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    team_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    data.membership.leave_team(user.id(), &team_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "You have left the team" })))
}

// PUT /api/team/transfer-ownership/{teamId}
pub async fn transfer_ownership(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    team_id: web::Path<String>,
    body: web::Json<TransferOwnershipRequest>,
) -> AppResult<HttpResponse> {
    let team = data
        .membership
        .transfer_ownership(user.id(), &team_id, &body.new_supervisor_id)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Ownership transferred", "team": team })))
}

// DELETE /api/team/{teamId}
pub async fn delete_team(
    user: AuthenticatedUser,
    data: web::Data<AppState>,
    team_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    data.membership.delete_team(user.id(), &team_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Team deleted successfully" })))
}

#[cfg(test)]
mod tests {
    use actix_web::{test, App};
    use serde_json::{json, Value};

    use crate::store::Store;
    use crate::testing::{bearer, seed_team, seed_user, test_app_state};

    #[actix_web::test]
    async fn join_flow_over_http() {
        let (state, store, _push, _mail) = test_app_state();
        let boss = seed_user(&store, "boss").await;
        let joiner = seed_user(&store, "joiner").await;
        let team = seed_team(&store, "Platform", "ABCD1", &boss.id, &[]).await;
        let app = test::init_service(App::new().configure(crate::configure(state))).await;

        let mut statuses = Vec::new();
        for _ in 0..2 {
            let req = test::TestRequest::post()
                .uri("/api/team/join")
                .insert_header(("Authorization", bearer(&joiner.id)))
                .set_json(json!({ "teamCode": "ABCD1", "userId": joiner.id }))
                .to_request();
            statuses.push(test::call_service(&app, req).await.status().as_u16());
        }
        assert_eq!(statuses, vec![200, 400]);
        assert_eq!(store.join_request_count(), 1);

        let req = test::TestRequest::get()
            .uri(&format!("/api/team/{}/join-requests", team.id))
            .insert_header(("Authorization", bearer(&boss.id)))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let request_id = body["joinRequests"][0]["_id"].as_str().unwrap().to_string();
        assert_eq!(body["joinRequests"][0]["requester"]["userName"], "joiner");

        // A plain member cannot approve.
        let req = test::TestRequest::put()
            .uri("/api/team/approve-join")
            .insert_header(("Authorization", bearer(&joiner.id)))
            .set_json(json!({ "joinRequestId": request_id }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 403);

        let req = test::TestRequest::put()
            .uri("/api/team/approve-join")
            .insert_header(("Authorization", bearer(&boss.id)))
            .set_json(json!({ "joinRequestId": request_id }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);

        let team = store.find_team(&team.id).await.unwrap().unwrap();
        assert!(team.is_member(&joiner.id));
        assert_eq!(store.join_request_count(), 0);
    }

    #[actix_web::test]
    async fn create_then_list_own_teams() {
        let (state, store, _push, _mail) = test_app_state();
        let boss = seed_user(&store, "boss").await;
        let app = test::init_service(App::new().configure(crate::configure(state))).await;

        let req = test::TestRequest::post()
            .uri("/api/team")
            .insert_header(("Authorization", bearer(&boss.id)))
            .set_json(json!({ "teamName": "Design", "teamSlogan": "Pixels" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 201);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["team"]["supervisedBy"], boss.id);
        assert_eq!(body["team"]["teamCode"].as_str().unwrap().len(), 5);

        let req = test::TestRequest::post()
            .uri("/api/team")
            .insert_header(("Authorization", bearer(&boss.id)))
            .set_json(json!({ "teamName": "design" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);

        let req = test::TestRequest::get()
            .uri(&format!("/api/team/user/{}", boss.id))
            .insert_header(("Authorization", bearer(&boss.id)))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["teams"].as_array().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn only_the_supervisor_deletes() {
        let (state, store, _push, _mail) = test_app_state();
        let boss = seed_user(&store, "boss").await;
        let member = seed_user(&store, "member").await;
        let team = seed_team(&store, "Ops", "OPS01", &boss.id, &[&member.id]).await;
        let app = test::init_service(App::new().configure(crate::configure(state))).await;

        let req = test::TestRequest::delete()
            .uri(&format!("/api/team/{}", team.id))
            .insert_header(("Authorization", bearer(&member.id)))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 403);

        let req = test::TestRequest::put()
            .uri(&format!("/api/team/leave/{}", team.id))
            .insert_header(("Authorization", bearer(&member.id)))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/team/{}", team.id))
            .insert_header(("Authorization", bearer(&boss.id)))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);
        assert!(store.find_team(&team.id).await.unwrap().is_none());
    }
}
