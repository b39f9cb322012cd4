use std::sync::Arc;

use antco_auth::UserProfile;

use crate::error::ClientResult;
use crate::http::{ApiRequest, HttpClient, Service};
use crate::types::{
    ChangePasswordRequest, LoginRequest, LoginResponse, RegisterRequest, SendSmsCodeRequest,
    SmsCodeSent, VerifySmsCodeRequest,
};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const ME_PATH: &str = "/auth/me";
pub const CHANGE_PASSWORD_PATH: &str = "/auth/change-password";
pub const SEND_SMS_CODE_PATH: &str = "/auth/send-sms-code";
pub const VERIFY_SMS_CODE_PATH: &str = "/auth/verify-sms-code";

/// Auth API bindings.
///
/// Credential exchanges (login, register, SMS) opt out of refresh-on-401: a
/// 401 there means "wrong credentials", not "session expired".
#[derive(Debug, Clone)]
pub struct AuthApi {
    http: Arc<HttpClient>,
}

impl AuthApi {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    pub async fn login(&self, credentials: &LoginRequest) -> ClientResult<LoginResponse> {
        let request = ApiRequest::post(Service::Auth, LOGIN_PATH)
            .with_body(credentials)?
            .without_refresh();
        self.http.send(request).await
    }

    pub async fn register(&self, data: &RegisterRequest) -> ClientResult<LoginResponse> {
        let request = ApiRequest::post(Service::Auth, REGISTER_PATH)
            .with_body(data)?
            .without_refresh();
        self.http.send(request).await
    }

    pub async fn logout(&self) -> ClientResult<()> {
        self.http
            .send_unit(ApiRequest::post(Service::Auth, LOGOUT_PATH))
            .await
    }

    /// Validate the current access token and fetch the caller's profile.
    pub async fn me(&self) -> ClientResult<UserProfile> {
        self.http.send(ApiRequest::get(Service::Auth, ME_PATH)).await
    }

    pub async fn change_password(&self, data: &ChangePasswordRequest) -> ClientResult<()> {
        let request = ApiRequest::post(Service::Auth, CHANGE_PASSWORD_PATH).with_body(data)?;
        self.http.send_unit(request).await
    }

    pub async fn send_sms_code(&self, data: &SendSmsCodeRequest) -> ClientResult<SmsCodeSent> {
        let request = ApiRequest::post(Service::Auth, SEND_SMS_CODE_PATH)
            .with_body(data)?
            .without_refresh();
        self.http.send(request).await
    }

    pub async fn verify_sms_code(&self, data: &VerifySmsCodeRequest) -> ClientResult<LoginResponse> {
        let request = ApiRequest::post(Service::Auth, VERIFY_SMS_CODE_PATH)
            .with_body(data)?
            .without_refresh();
        self.http.send(request).await
    }
}
