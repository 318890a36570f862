use starberry_authz::oauth_core::crypto::hash_secret;
use starberry_authz::{
    AccessTokenStorage, AuthenticationError, AuthorizeCodeStorage, CancelSignal, Client, ClientStore, Form,
    InMemoryClientStore, InMemoryTokenStorage, InMemoryUserAuthenticator, OAuthProvider, RefreshTokenStorage,
    Request, Session, StorageError, UserAuthenticator,
};
use std::sync::Arc;

#[tokio::test]
async fn test_in_memory_client_store() {
    let client = Client::new("client1")
        .with_secret_hash(hash_secret("secret"))
        .with_redirect_uri("https://app.local/callback");
    let store = InMemoryClientStore::new(vec![client.clone()]);
    // Existing client
    let fetched = store.get_client("client1").await.unwrap();
    assert_eq!(fetched, client);
    // Missing client
    let err = store.get_client("missing").await.unwrap_err();
    assert_eq!(err, StorageError::NotFound);
}

#[tokio::test]
async fn test_client_authentication() {
    let store = InMemoryClientStore::new(vec![
        Client::new("confidential").with_secret_hash(hash_secret("secret")),
        Client::new("public").public(true),
    ]);
    assert!(store.authenticate_client("confidential", Some("secret")).await.is_ok());
    assert_eq!(store.authenticate_client("confidential", Some("wrong")).await, Err(StorageError::NotFound));
    assert_eq!(store.authenticate_client("confidential", None).await, Err(StorageError::NotFound));
    assert!(store.authenticate_client("public", None).await.is_ok());
    assert_eq!(store.authenticate_client("missing", Some("secret")).await, Err(StorageError::NotFound));
}

#[tokio::test]
async fn test_in_memory_token_storage() {
    let storage = InMemoryTokenStorage::new();
    let mut request = Request::new();
    request.client = Client::new("c1");
    request.grant_scope("read");

    // Access token sessions
    storage.create_access_token_session("sig-a", &request).await.unwrap();
    assert_eq!(storage.create_access_token_session("sig-a", &request).await, Err(StorageError::AlreadyExists));
    let fetched = storage.get_access_token_session("sig-a").await.unwrap();
    assert_eq!(fetched.client.id, "c1");
    storage.delete_access_token_session("sig-a").await.unwrap();
    assert_eq!(storage.get_access_token_session("sig-a").await.unwrap_err(), StorageError::NotFound);
    assert_eq!(storage.delete_access_token_session("sig-a").await, Err(StorageError::NotFound));

    // Authorization code sessions
    storage.create_authorize_code_session("sig-c", &request).await.unwrap();
    assert_eq!(storage.authorize_code_count(), 1);
    storage.delete_authorize_code_session("sig-c").await.unwrap();
    assert!(storage.get_authorize_code_session("sig-c").await.is_err());

    // Refresh token sessions are kept apart from access tokens
    storage.create_refresh_token_session("sig-r", &request).await.unwrap();
    assert!(storage.get_access_token_session("sig-r").await.is_err());
    assert_eq!(storage.get_refresh_token_session("sig-r").await.unwrap().granted_scopes.join(" "), "read");
}

#[tokio::test]
async fn test_in_memory_user_authenticator() {
    let users = InMemoryUserAuthenticator::new().with_user("peter", "hunter2");
    assert!(users.authenticate("peter", "hunter2").await.is_ok());
    assert_eq!(users.authenticate("peter", "hunter3").await, Err(AuthenticationError::InvalidCredentials));
    assert_eq!(users.authenticate("paul", "hunter2").await, Err(AuthenticationError::InvalidCredentials));
}

#[tokio::test]
async fn test_new_authorize_request() {
    let store = InMemoryClientStore::new(vec![
        Client::new("c1").with_redirect_uri("https://app.local/callback").with_scopes(["read"]),
    ]);
    let provider = OAuthProvider::new(Arc::new(store));
    let cancel = CancelSignal::new();

    let form =
        Form::from_pairs([("client_id", "c1"), ("response_type", "code token"), ("scope", "read"), ("state", "s1")]);
    let request = provider.new_authorize_request(&cancel, form, Session::empty()).await.unwrap();
    assert_eq!(request.response_types.join(" "), "code token");
    assert_eq!(request.state, "s1");
    assert_eq!(request.redirect_uri.as_ref().map(|u| u.as_str()), Some("https://app.local/callback"));
    assert_eq!(request.request.scopes.join(" "), "read");
    assert!(request.request.granted_scopes.is_empty());

    let form = Form::from_pairs([("client_id", "ghost"), ("response_type", "code")]);
    let err = provider.new_authorize_request(&cancel, form, Session::empty()).await.unwrap_err();
    assert_eq!(err.error_code(), "invalid_client");

    let form = Form::from_pairs([("client_id", "c1")]);
    let err = provider.new_authorize_request(&cancel, form, Session::empty()).await.unwrap_err();
    assert_eq!(err.error_code(), "invalid_request");
}

#[tokio::test]
async fn test_empty_pipeline_handles_nothing() {
    let provider = OAuthProvider::new(Arc::new(InMemoryClientStore::new(vec![Client::new("c1").public(true)])));
    let cancel = CancelSignal::new();

    let form = Form::from_pairs([("client_id", "c1"), ("response_type", "code")]);
    let mut request = provider.new_authorize_request(&cancel, form, Session::empty()).await.unwrap();
    let err = provider.new_authorize_response(&cancel, &mut request).await.unwrap_err();
    assert_eq!(err.error_code(), "unsupported_response_type");

    let form = Form::from_pairs([("grant_type", "client_credentials")]);
    let err = provider.new_access_request(&cancel, "c1", None, form, Session::empty()).await.unwrap_err();
    assert_eq!(err.error_code(), "unsupported_grant_type");

    let err = provider.validate_authorized_request(&cancel, "anything", &[]).await.unwrap_err();
    assert_eq!(err.error_code(), "invalid_grant");
}
