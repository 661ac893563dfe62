//! Authentication collaborator contract. The engine only consumes the
//! outcome: a resolved agent or a rejection. The provider's internal flow
//! (sessions, redirects, consent screens) stays on the provider's side.

use serde::Serialize;

use crate::agent::AgentIdentity;

/// A provider the user can authenticate against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderLink {
    pub name: String,
    pub url: String,
}

/// Outcome of a login/logout/callback exchange with the provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuthResponse {
    /// No session yet; the user must visit one of the provider URLs.
    AuthenticationRequired { providers: Vec<ProviderLink> },
    /// Authenticated but not yet registered as an agent.
    RegistrationRequired {
        email: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Authenticated and registered.
    Okay { agent: AgentIdentity },
    /// Terminal state of a logout.
    LoggedOut,
    /// Provider-side failure the user cannot fix.
    Error { message: String },
}

impl AuthResponse {
    pub fn authentication_required(provider: &dyn AuthProvider) -> Self {
        AuthResponse::AuthenticationRequired {
            providers: vec![ProviderLink {
                name: provider.name().to_lowercase(),
                url: provider.authentication_url(),
            }],
        }
    }

    pub fn registration_required(email: impl Into<String>, message: Option<String>) -> Self {
        AuthResponse::RegistrationRequired {
            email: email.into(),
            message,
        }
    }

    pub fn okay(agent: AgentIdentity) -> Self {
        AuthResponse::Okay { agent }
    }

    pub fn error(message: impl Into<String>) -> Self {
        AuthResponse::Error {
            message: message.into(),
        }
    }
}

/// External authentication provider. Implementations live outside this
/// workspace; the engine only needs the exchange results.
pub trait AuthProvider {
    /// Process a login request. Must end in one of the `AuthResponse`
    /// states other than `LoggedOut`.
    fn login(&mut self) -> AuthResponse;

    /// Destroy the provider session. `LoggedOut` on success.
    fn logout(&mut self) -> AuthResponse;

    /// Process the provider's redirect callback, then continue as `login`.
    fn callback(&mut self) -> AuthResponse;

    /// Body of the email sent when registration is still pending, if the
    /// provider wants one sent.
    fn registration_email(&self, email: &str) -> Option<String>;

    fn authentication_url(&self) -> String;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Faction;

    struct FakeProvider;

    impl AuthProvider for FakeProvider {
        fn login(&mut self) -> AuthResponse {
            AuthResponse::authentication_required(self)
        }
        fn logout(&mut self) -> AuthResponse {
            AuthResponse::LoggedOut
        }
        fn callback(&mut self) -> AuthResponse {
            self.login()
        }
        fn registration_email(&self, _email: &str) -> Option<String> {
            None
        }
        fn authentication_url(&self) -> String {
            "https://auth.example/login".to_string()
        }
        fn name(&self) -> &str {
            "Example"
        }
    }

    #[test]
    fn authentication_required_lowercases_provider_name() {
        let mut provider = FakeProvider;
        match provider.login() {
            AuthResponse::AuthenticationRequired { providers } => {
                assert_eq!(providers.len(), 1);
                assert_eq!(providers[0].name, "example");
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn okay_serializes_with_status_tag() {
        let agent = AgentIdentity::new("Scout", Faction::Enlightened, "secret").unwrap();
        let json = serde_json::to_value(AuthResponse::okay(agent)).unwrap();
        assert_eq!(json["status"], "okay");
        assert_eq!(json["agent"]["name"], "Scout");
    }
}
