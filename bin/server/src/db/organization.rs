//! Repositories for organizations, memberships, and projects.

use befree_core::{OrganizationId, ProjectId, UserId};
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::{DbError, RestClient, execute, fetch};

const ORGANIZATIONS: &str = "organizations";
const MEMBERS: &str = "organization_members";
const PROJECTS: &str = "projects";

/// Role of a user within an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Admin,
    Member,
}

/// The caller's membership as embedded in an organization listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRole {
    pub role: MemberRole,
}

/// An organization row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub owner_id: Option<UserId>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Present when listed through the membership join.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub organization_members: Vec<MembershipRole>,
}

/// Insert body for an organization.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrganization {
    pub name: String,
    pub slug: String,
    pub owner_id: UserId,
}

#[derive(Debug, Serialize)]
struct NewMembership<'a> {
    organization_id: &'a OrganizationId,
    user_id: &'a UserId,
    role: MemberRole,
}

/// A project row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub organization_id: OrganizationId,
    pub name: String,
    #[serde(default)]
    pub created_by: Option<UserId>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Insert body for a project.
#[derive(Debug, Clone, Serialize)]
pub struct NewProject {
    pub organization_id: OrganizationId,
    pub name: String,
    pub created_by: UserId,
}

/// Repository for organization operations.
pub struct OrganizationRepository {
    client: RestClient,
}

impl OrganizationRepository {
    /// Creates a new organization repository.
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    /// Lists organizations the caller is a member of, with the caller's role.
    pub async fn list_for_member(&self) -> Result<Vec<Organization>, DbError> {
        let request = self
            .client
            .list(ORGANIZATIONS)
            .query(&[("select", "*,organization_members!inner(role)")]);
        fetch(request).await
    }

    /// Inserts an organization row.
    pub async fn create(&self, organization: &NewOrganization) -> Result<Organization, DbError> {
        let request = self
            .client
            .single(Method::POST, ORGANIZATIONS)
            .json(organization);
        fetch(request).await
    }

    /// Adds `user_id` to the organization with `role`.
    pub async fn add_member(
        &self,
        organization_id: &OrganizationId,
        user_id: &UserId,
        role: MemberRole,
    ) -> Result<(), DbError> {
        let request = self.client.write(Method::POST, MEMBERS).json(&NewMembership {
            organization_id,
            user_id,
            role,
        });
        execute(request).await
    }

    /// Deletes an organization row.
    pub async fn delete(&self, id: &OrganizationId) -> Result<(), DbError> {
        let request = self
            .client
            .write(Method::DELETE, ORGANIZATIONS)
            .query(&[("id", format!("eq.{id}"))]);
        execute(request).await
    }

    /// Creates an organization and makes `owner` its owner.
    ///
    /// The two inserts are not atomic. If the membership insert fails, the
    /// organization row is deleted again and the membership error returned.
    #[tracing::instrument(skip(self, organization), fields(slug = %organization.slug))]
    pub async fn create_owned(
        &self,
        organization: &NewOrganization,
    ) -> Result<Organization, DbError> {
        let created = self.create(organization).await?;

        if let Err(member_error) = self
            .add_member(&created.id, &organization.owner_id, MemberRole::Owner)
            .await
        {
            if let Err(cleanup_error) = self.delete(&created.id).await {
                tracing::warn!(
                    organization_id = %created.id,
                    error = %cleanup_error,
                    "failed to remove organization after membership insert failed"
                );
            }
            return Err(member_error);
        }

        Ok(created)
    }
}

/// Repository for project operations.
pub struct ProjectRepository {
    client: RestClient,
}

impl ProjectRepository {
    /// Creates a new project repository.
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    /// Inserts a project row. The backend rejects callers who are not
    /// members of the organization.
    pub async fn create(&self, project: &NewProject) -> Result<Project, DbError> {
        let request = self.client.single(Method::POST, PROJECTS).json(project);
        fetch(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use befree_platform_access::BackendConfig;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const USER: &str = "5d3c2b1a-0f9e-4d8c-b7a6-958473625140";
    const ORG: &str = "0b7f6c1e-2a3d-4e5f-8a9b-0c1d2e3f4a5b";

    fn client(server: &MockServer) -> RestClient {
        let backend = BackendConfig::new(&server.uri(), "anon").expect("backend");
        RestClient::new(reqwest::Client::new(), backend, "user-token".to_string())
    }

    fn new_org() -> NewOrganization {
        NewOrganization {
            name: "Acme".to_string(),
            slug: "acme".to_string(),
            owner_id: USER.parse().expect("id"),
        }
    }

    fn org_row() -> serde_json::Value {
        json!({ "id": ORG, "name": "Acme", "slug": "acme", "owner_id": USER })
    }

    #[tokio::test]
    async fn list_embeds_membership_role() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/organizations"))
            .and(query_param("select", "*,organization_members!inner(role)"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": ORG,
                "name": "Acme",
                "slug": "acme",
                "organization_members": [{ "role": "owner" }]
            }])))
            .mount(&server)
            .await;

        let orgs = OrganizationRepository::new(client(&server))
            .list_for_member()
            .await
            .expect("list");
        assert_eq!(orgs.len(), 1);
        assert_eq!(orgs[0].organization_members[0].role, MemberRole::Owner);
    }

    #[tokio::test]
    async fn create_owned_inserts_organization_then_owner_membership() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/organizations"))
            .and(body_json(json!({ "name": "Acme", "slug": "acme", "owner_id": USER })))
            .respond_with(ResponseTemplate::new(201).set_body_json(org_row()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/organization_members"))
            .and(body_json(json!({
                "organization_id": ORG,
                "user_id": USER,
                "role": "owner"
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let org = OrganizationRepository::new(client(&server))
            .create_owned(&new_org())
            .await
            .expect("created");
        assert_eq!(org.id.as_str(), ORG);
    }

    #[tokio::test]
    async fn failed_membership_deletes_organization() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/organizations"))
            .respond_with(ResponseTemplate::new(201).set_body_json(org_row()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/organization_members"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "code": "42501",
                "message": "new row violates row-level security policy"
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/organizations"))
            .and(query_param("id", format!("eq.{ORG}")))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let err = OrganizationRepository::new(client(&server))
            .create_owned(&new_org())
            .await
            .expect_err("membership failed");
        match err {
            DbError::Backend(e) => assert_eq!(e.code.as_deref(), Some("42501")),
            other => panic!("expected backend error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_project_returns_row() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/projects"))
            .and(body_json(json!({
                "organization_id": ORG,
                "name": "Launch",
                "created_by": USER
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "9a8b7c6d-5e4f-4a3b-9c2d-1e0f9a8b7c6d",
                "organization_id": ORG,
                "name": "Launch",
                "created_by": USER
            })))
            .mount(&server)
            .await;

        let project = ProjectRepository::new(client(&server))
            .create(&NewProject {
                organization_id: ORG.parse().expect("id"),
                name: "Launch".to_string(),
                created_by: USER.parse().expect("id"),
            })
            .await
            .expect("created");
        assert_eq!(project.name, "Launch");
    }
}
