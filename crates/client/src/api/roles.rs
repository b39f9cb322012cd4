use std::sync::Arc;

use antco_core::{PageRequest, Paginated, RoleId};

use crate::error::ClientResult;
use crate::http::{ApiRequest, HttpClient, Service};
use crate::types::{
    AssignPermissions, CreateRole, CreatedRole, MessageResponse, RoleFilters, RoleRecord,
    UpdateRole,
};

pub const ROLES_PATH: &str = "/admin/roles";

#[derive(Debug, Clone)]
pub struct RolesApi {
    http: Arc<HttpClient>,
}

impl RolesApi {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    pub async fn list(
        &self,
        page: PageRequest,
        filters: &RoleFilters,
    ) -> ClientResult<Paginated<RoleRecord>> {
        let request = ApiRequest::get(Service::Admin, ROLES_PATH)
            .with_query(page.query_pairs())
            .with_query(filters.query_pairs());
        self.http.send(request).await
    }

    pub async fn get(&self, id: &RoleId) -> ClientResult<RoleRecord> {
        self.http
            .send(ApiRequest::get(Service::Admin, role_path(id)))
            .await
    }

    /// Returns the id of the created role.
    pub async fn create(&self, data: &CreateRole) -> ClientResult<RoleId> {
        let request = ApiRequest::post(Service::Admin, ROLES_PATH).with_body(data)?;
        let created: CreatedRole = self.http.send(request).await?;
        Ok(created.value)
    }

    pub async fn update(&self, id: &RoleId, data: &UpdateRole) -> ClientResult<RoleRecord> {
        let request = ApiRequest::put(Service::Admin, role_path(id)).with_body(data)?;
        self.http.send(request).await
    }

    pub async fn delete(&self, id: &RoleId) -> ClientResult<()> {
        self.http
            .send_unit(ApiRequest::delete(Service::Admin, role_path(id)))
            .await
    }

    pub async fn assign_permissions(
        &self,
        id: &RoleId,
        permission_names: Vec<String>,
    ) -> ClientResult<MessageResponse> {
        let request = ApiRequest::post(Service::Admin, format!("{}/permissions", role_path(id)))
            .with_body(&AssignPermissions { permission_names })?;
        self.http.send(request).await
    }
}

fn role_path(id: &RoleId) -> String {
    format!("{ROLES_PATH}/{id}")
}
