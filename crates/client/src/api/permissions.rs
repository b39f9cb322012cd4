use std::sync::Arc;

use crate::error::ClientResult;
use crate::http::{ApiRequest, HttpClient, Service};
use crate::types::{PermissionCategory, PermissionFilters, PermissionRecord};

pub const PERMISSIONS_PATH: &str = "/admin/permissions";
pub const PERMISSION_CATEGORIES_PATH: &str = "/admin/permissions/categories";

/// Permissions are a fixed catalogue: listed, never created from the portal.
#[derive(Debug, Clone)]
pub struct PermissionsApi {
    http: Arc<HttpClient>,
}

impl PermissionsApi {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    pub async fn list(&self, filters: &PermissionFilters) -> ClientResult<Vec<PermissionRecord>> {
        let request =
            ApiRequest::get(Service::Admin, PERMISSIONS_PATH).with_query(filters.query_pairs());
        self.http.send(request).await
    }

    pub async fn categories(&self) -> ClientResult<Vec<PermissionCategory>> {
        self.http
            .send(ApiRequest::get(Service::Admin, PERMISSION_CATEGORIES_PATH))
            .await
    }
}
