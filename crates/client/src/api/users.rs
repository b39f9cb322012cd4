use std::sync::Arc;

use antco_core::{PageRequest, Paginated, RoleId, UserId};

use crate::error::ClientResult;
use crate::http::{ApiRequest, HttpClient, Service};
use crate::types::{AdminUser, AssignRoles, CreateUser, UpdateUser, UserFilters};

pub const USERS_PATH: &str = "/admin/users";

#[derive(Debug, Clone)]
pub struct UsersApi {
    http: Arc<HttpClient>,
}

impl UsersApi {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    pub async fn list(
        &self,
        page: PageRequest,
        filters: &UserFilters,
    ) -> ClientResult<Paginated<AdminUser>> {
        let request = ApiRequest::get(Service::Admin, USERS_PATH)
            .with_query(page.query_pairs())
            .with_query(filters.query_pairs());
        self.http.send(request).await
    }

    pub async fn get(&self, id: &UserId) -> ClientResult<AdminUser> {
        self.http
            .send(ApiRequest::get(Service::Admin, user_path(id)))
            .await
    }

    pub async fn create(&self, data: &CreateUser) -> ClientResult<AdminUser> {
        let request = ApiRequest::post(Service::Admin, USERS_PATH).with_body(data)?;
        self.http.send(request).await
    }

    pub async fn update(&self, id: &UserId, data: &UpdateUser) -> ClientResult<AdminUser> {
        let request = ApiRequest::put(Service::Admin, user_path(id)).with_body(data)?;
        self.http.send(request).await
    }

    pub async fn delete(&self, id: &UserId) -> ClientResult<()> {
        self.http
            .send_unit(ApiRequest::delete(Service::Admin, user_path(id)))
            .await
    }

    /// Replace the user's role assignments.
    pub async fn assign_roles(&self, id: &UserId, role_ids: Vec<RoleId>) -> ClientResult<AdminUser> {
        let request = ApiRequest::put(Service::Admin, format!("{}/roles", user_path(id)))
            .with_body(&AssignRoles { role_ids })?;
        self.http.send(request).await
    }
}

fn user_path(id: &UserId) -> String {
    format!("{USERS_PATH}/{id}")
}
