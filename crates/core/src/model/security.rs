use indexmap::IndexMap;
use std::str::FromStr;

use super::component::{AnyHandle, Extensions, Handle};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecurityScheme {
    pub scheme_type: Option<SecuritySchemeType>,
    pub description: Option<String>,
    /// Header, query or cookie parameter name for `apiKey`
    pub name: Option<String>,
    /// `in` for `apiKey`
    pub location: Option<String>,
    pub scheme: Option<String>,
    pub bearer_format: Option<String>,
    pub flows: Option<OAuthFlows>,
    pub open_id_connect_url: Option<String>,
    pub extensions: Extensions,
}

impl SecurityScheme {
    pub(crate) fn collect_children(&self, _out: &mut Vec<AnyHandle>) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecuritySchemeType {
    ApiKey,
    Http,
    OAuth2,
    OpenIdConnect,
    MutualTls,
}

impl SecuritySchemeType {
    pub fn as_str(self) -> &'static str {
        match self {
            SecuritySchemeType::ApiKey => "apiKey",
            SecuritySchemeType::Http => "http",
            SecuritySchemeType::OAuth2 => "oauth2",
            SecuritySchemeType::OpenIdConnect => "openIdConnect",
            SecuritySchemeType::MutualTls => "mutualTLS",
        }
    }
}

impl FromStr for SecuritySchemeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apiKey" => Ok(SecuritySchemeType::ApiKey),
            "http" => Ok(SecuritySchemeType::Http),
            "oauth2" => Ok(SecuritySchemeType::OAuth2),
            "openIdConnect" => Ok(SecuritySchemeType::OpenIdConnect),
            "mutualTLS" => Ok(SecuritySchemeType::MutualTls),
            other => Err(format!("unknown security scheme type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OAuthFlows {
    pub implicit: Option<OAuthFlow>,
    pub password: Option<OAuthFlow>,
    pub client_credentials: Option<OAuthFlow>,
    pub authorization_code: Option<OAuthFlow>,
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OAuthFlow {
    pub authorization_url: Option<String>,
    pub token_url: Option<String>,
    pub refresh_url: Option<String>,
    pub scopes: IndexMap<String, String>,
    pub extensions: Extensions,
}

/// One alternative of a `security` list. Each scheme name is a reference to
/// `#/components/securitySchemes/<name>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecurityRequirement {
    pub schemes: Vec<(Handle<SecurityScheme>, Vec<String>)>,
}

impl SecurityRequirement {
    pub(crate) fn collect_children(&self, out: &mut Vec<AnyHandle>) {
        out.extend(self.schemes.iter().map(|(h, _)| AnyHandle::SecurityScheme(*h)));
    }
}
