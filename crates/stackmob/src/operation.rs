//! Logical operations and their HTTP mapping.

use reqwest::Method;
use std::fmt;

/// A logical operation the dispatcher knows how to turn into a request.
///
/// Anything not listed maps to [`Operation::Custom`], which is sent as a
/// `GET` to `<schema>/<name>` unless the call overrides the verb.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Query,
    Post,
    Get,
    Put,
    AddRelationship,
    AppendAndSave,
    DeleteAndSave,
    Login,
    AccessToken,
    RefreshToken,
    Logout,
    ForgotPassword,
    LoginWithTempAndSetNewPassword,
    ResetPassword,
    FacebookAccessToken,
    FacebookAccessTokenWithCreate,
    CreateUserWithFacebook,
    LinkUserWithFacebook,
    UnlinkUserFromFacebook,
    GigyaAccessToken,
    LinkUserWithGigya,
    UnlinkUserFromGigya,
    Custom(String),
}

impl Operation {
    /// The method name as it appears on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Query => "query",
            Operation::Post => "post",
            Operation::Get => "get",
            Operation::Put => "put",
            Operation::AddRelationship => "addRelationship",
            Operation::AppendAndSave => "appendAndSave",
            Operation::DeleteAndSave => "deleteAndSave",
            Operation::Login => "login",
            Operation::AccessToken => "accessToken",
            Operation::RefreshToken => "refreshToken",
            Operation::Logout => "logout",
            Operation::ForgotPassword => "forgotPassword",
            Operation::LoginWithTempAndSetNewPassword => "loginWithTempAndSetNewPassword",
            Operation::ResetPassword => "resetPassword",
            Operation::FacebookAccessToken => "facebookAccessToken",
            Operation::FacebookAccessTokenWithCreate => "facebookAccessTokenWithCreate",
            Operation::CreateUserWithFacebook => "createUserWithFacebook",
            Operation::LinkUserWithFacebook => "linkUserWithFacebook",
            Operation::UnlinkUserFromFacebook => "unlinkUserFromFacebook",
            Operation::GigyaAccessToken => "gigyaAccessToken",
            Operation::LinkUserWithGigya => "linkUserWithGigya",
            Operation::UnlinkUserFromGigya => "unlinkUserFromGigya",
            Operation::Custom(name) => name,
        }
    }

    /// Parse a wire name back into an operation.
    pub fn from_name(name: &str) -> Self {
        match name {
            "create" => Operation::Create,
            "read" => Operation::Read,
            "update" => Operation::Update,
            "delete" => Operation::Delete,
            "query" => Operation::Query,
            "post" => Operation::Post,
            "get" => Operation::Get,
            "put" => Operation::Put,
            "addRelationship" => Operation::AddRelationship,
            "appendAndSave" => Operation::AppendAndSave,
            "deleteAndSave" => Operation::DeleteAndSave,
            "login" => Operation::Login,
            "accessToken" => Operation::AccessToken,
            "refreshToken" => Operation::RefreshToken,
            "logout" => Operation::Logout,
            "forgotPassword" => Operation::ForgotPassword,
            "loginWithTempAndSetNewPassword" => Operation::LoginWithTempAndSetNewPassword,
            "resetPassword" => Operation::ResetPassword,
            "facebookAccessToken" => Operation::FacebookAccessToken,
            "facebookAccessTokenWithCreate" => Operation::FacebookAccessTokenWithCreate,
            "createUserWithFacebook" => Operation::CreateUserWithFacebook,
            "linkUserWithFacebook" => Operation::LinkUserWithFacebook,
            "unlinkUserFromFacebook" => Operation::UnlinkUserFromFacebook,
            "gigyaAccessToken" => Operation::GigyaAccessToken,
            "linkUserWithGigya" => Operation::LinkUserWithGigya,
            "unlinkUserFromGigya" => Operation::UnlinkUserFromGigya,
            other => Operation::Custom(other.to_string()),
        }
    }

    /// HTTP verb used when the call does not override it.
    pub fn verb(&self) -> Method {
        match self {
            Operation::Create
            | Operation::Post
            | Operation::AddRelationship
            | Operation::AccessToken
            | Operation::RefreshToken
            | Operation::ForgotPassword
            | Operation::ResetPassword
            | Operation::FacebookAccessToken
            | Operation::FacebookAccessTokenWithCreate
            | Operation::CreateUserWithFacebook
            | Operation::GigyaAccessToken
            | Operation::LinkUserWithGigya => Method::POST,
            Operation::Update | Operation::Put | Operation::AppendAndSave => Method::PUT,
            Operation::Delete
            | Operation::DeleteAndSave
            | Operation::UnlinkUserFromFacebook
            | Operation::UnlinkUserFromGigya => Method::DELETE,
            _ => Method::GET,
        }
    }

    /// Operations that exchange credentials for tokens. They are sent
    /// form-encoded and never carry an Authorization header.
    pub fn is_access_token(&self) -> bool {
        matches!(
            self,
            Operation::AccessToken
                | Operation::RefreshToken
                | Operation::FacebookAccessToken
                | Operation::FacebookAccessTokenWithCreate
                | Operation::GigyaAccessToken
        )
    }

    /// Operations sent over HTTPS in mixed security mode.
    pub fn is_secure(&self) -> bool {
        self.is_access_token()
            || matches!(
                self,
                Operation::LoginWithTempAndSetNewPassword
                    | Operation::CreateUserWithFacebook
                    | Operation::LinkUserWithFacebook
                    | Operation::UnlinkUserFromFacebook
                    | Operation::LinkUserWithGigya
                    | Operation::UnlinkUserFromGigya
            )
    }

    /// Operations whose name becomes an extra URL path segment.
    pub fn is_extra_verb(&self) -> bool {
        !matches!(
            self,
            Operation::Create
                | Operation::Read
                | Operation::Update
                | Operation::Delete
                | Operation::Query
                | Operation::DeleteAndSave
                | Operation::AppendAndSave
                | Operation::AddRelationship
        )
    }

    /// Operations that address a relationship field of an object.
    pub fn is_relationship(&self) -> bool {
        matches!(
            self,
            Operation::AddRelationship | Operation::AppendAndSave | Operation::DeleteAndSave
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
