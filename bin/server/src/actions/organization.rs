//! Organization and project actions.

use axum::{
    Json,
    extract::{Path, State},
};
use befree_core::OrganizationId;
use serde_json::json;
use std::sync::Arc;

use super::caller_client;
use crate::auth::{AppState, AuthenticatedUser, RequireAuth};
use crate::db::{
    NewOrganization, NewProject, Organization, OrganizationRepository, Project, ProjectRepository,
};
use crate::error::{ActionError, ApiResponse, with_error_handling};
use crate::types::{CreateOrganization, CreateProject};

/// Lists the organizations the caller belongs to.
pub async fn list_organizations(
    State(state): State<Arc<AppState>>,
    RequireAuth(auth): RequireAuth,
) -> ApiResponse<Vec<Organization>> {
    with_error_handling("getMyOrganizations", json!({}), my_organizations(&state, &auth)).await
}

/// Creates an organization owned by the caller.
pub async fn create_organization(
    State(state): State<Arc<AppState>>,
    RequireAuth(auth): RequireAuth,
    Json(body): Json<CreateOrganization>,
) -> ApiResponse<Organization> {
    let context = json!({ "name": &body.name });
    with_error_handling("createOrganization", context, new_organization(&state, &auth, &body))
        .await
}

/// Creates a project within an organization the caller belongs to.
pub async fn create_project(
    State(state): State<Arc<AppState>>,
    RequireAuth(auth): RequireAuth,
    Path(organization_id): Path<String>,
    Json(body): Json<CreateProject>,
) -> ApiResponse<Project> {
    let context = json!({ "organizationId": &organization_id, "name": &body.name });
    with_error_handling(
        "createProject",
        context,
        new_project(&state, &auth, &organization_id, &body),
    )
    .await
}

async fn my_organizations(
    state: &AppState,
    auth: &AuthenticatedUser,
) -> Result<Vec<Organization>, ActionError> {
    let repo = OrganizationRepository::new(caller_client(state, auth)?);
    Ok(repo.list_for_member().await?)
}

async fn new_organization(
    state: &AppState,
    auth: &AuthenticatedUser,
    body: &CreateOrganization,
) -> Result<Organization, ActionError> {
    let client = caller_client(state, auth)?;
    body.validate().map_err(ActionError::validation)?;

    let organization = NewOrganization {
        name: body.name.clone(),
        slug: body.slug.to_lowercase(),
        owner_id: auth.user.id().clone(),
    };
    let repo = OrganizationRepository::new(client);
    Ok(repo.create_owned(&organization).await?)
}

async fn new_project(
    state: &AppState,
    auth: &AuthenticatedUser,
    organization_id: &str,
    body: &CreateProject,
) -> Result<Project, ActionError> {
    let client = caller_client(state, auth)?;
    let organization_id: OrganizationId = organization_id
        .parse()
        .map_err(|_| ActionError::validation("Invalid organization ID."))?;

    let project = NewProject {
        organization_id,
        name: body.name.clone(),
        created_by: auth.user.id().clone(),
    };
    let repo = ProjectRepository::new(client);
    Ok(repo.create(&project).await?)
}
