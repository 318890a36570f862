use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use starberry_authz::oauth_core::crypto::hash_secret;
use starberry_authz::{
    AuthenticationError, CancelSignal, Client, Form, HmacStrategy, InMemoryClientStore, InMemoryTokenStorage,
    InMemoryUserAuthenticator, OAuthConfig, OAuthError, OAuthProvider, Session, UserAuthenticator,
};

/// Authenticator that counts how often it was asked to check credentials.
struct CountingAuthenticator {
    inner: InMemoryUserAuthenticator,
    calls: AtomicUsize,
}

#[async_trait]
impl UserAuthenticator for CountingAuthenticator {
    async fn authenticate(&self, username: &str, password: &str) -> Result<(), AuthenticationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.authenticate(username, password).await
    }
}

fn provider(authenticator: Arc<CountingAuthenticator>) -> OAuthProvider {
    let client = Client::new("cli")
        .with_secret_hash(hash_secret("cli-secret"))
        .with_grant_types(["password"])
        .with_scopes(["read"]);
    let authenticator: Arc<dyn UserAuthenticator> = authenticator;
    OAuthProvider::compose(
        &OAuthConfig::new(),
        Arc::new(InMemoryClientStore::new(vec![client])),
        Arc::new(HmacStrategy::new(b"a-32-byte-secret-for-hmac-tokens".to_vec()).unwrap()),
        Arc::new(InMemoryTokenStorage::new()),
        Some(authenticator),
    )
}

async fn password_request(provider: &OAuthProvider, scope: &str) -> Result<(), OAuthError> {
    let form = Form::from_pairs([
        ("grant_type", "password"),
        ("username", "peter"),
        ("password", "hunter2"),
        ("scope", scope),
    ]);
    provider
        .new_access_request(&CancelSignal::new(), "cli", Some("cli-secret"), form, Session::empty())
        .await
        .map(|_| ())
}

#[tokio::test]
async fn test_scope_is_checked_before_credentials() {
    let authenticator = Arc::new(CountingAuthenticator {
        inner: InMemoryUserAuthenticator::new().with_user("peter", "hunter2"),
        calls: AtomicUsize::new(0),
    });
    let provider = provider(authenticator.clone());

    let err = password_request(&provider, "read admin").await.unwrap_err();
    assert_eq!(err.error_code(), "invalid_scope");
    assert_eq!(authenticator.calls.load(Ordering::SeqCst), 0);

    password_request(&provider, "read").await.unwrap();
    assert_eq!(authenticator.calls.load(Ordering::SeqCst), 1);
}
