//! In-memory default implementations for the collaborator traits.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::crypto::{hash_secret, verify_secret};
use super::oauth_provider::{
    AccessTokenStorage, AuthenticationError, AuthorizeCodeStorage, ClientStore, RefreshTokenStorage, StorageError,
    UserAuthenticator,
};
use super::request::Request;
use super::types::Client;

#[derive(Clone, Default)]
pub struct InMemoryClientStore {
    clients: Arc<DashMap<String, Client>>,
}

impl InMemoryClientStore {
    /// Creates a new in-memory client store with an initial set of clients.
    pub fn new(initial_clients: Vec<Client>) -> Self {
        let map = DashMap::new();
        for client in initial_clients {
            map.insert(client.id.clone(), client);
        }
        Self { clients: Arc::new(map) }
    }

    /// Registers or replaces a client.
    pub fn insert(&self, client: Client) {
        self.clients.insert(client.id.clone(), client);
    }
}

#[async_trait]
impl ClientStore for InMemoryClientStore {
    async fn get_client(&self, id: &str) -> Result<Client, StorageError> {
        self.clients
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or(StorageError::NotFound)
    }

    async fn authenticate_client(&self, id: &str, secret: Option<&str>) -> Result<Client, StorageError> {
        let client = self.get_client(id).await?;
        if client.public {
            return Ok(client);
        }
        match (client.hashed_secret.as_deref(), secret) {
            (Some(hashed), Some(presented)) if verify_secret(hashed, presented) => Ok(client),
            _ => Err(StorageError::NotFound),
        }
    }
}

/// In-memory storage for access token, authorization code and refresh token sessions.
#[derive(Clone, Default)]
pub struct InMemoryTokenStorage {
    access_tokens: Arc<DashMap<String, Request>>,
    authorize_codes: Arc<DashMap<String, Request>>,
    refresh_tokens: Arc<DashMap<String, Request>>,
}

impl InMemoryTokenStorage {
    /// Creates a new in-memory token storage.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn access_token_count(&self) -> usize {
        self.access_tokens.len()
    }

    pub fn refresh_token_count(&self) -> usize {
        self.refresh_tokens.len()
    }

    pub fn authorize_code_count(&self) -> usize {
        self.authorize_codes.len()
    }
}

fn create(map: &DashMap<String, Request>, signature: &str, request: &Request) -> Result<(), StorageError> {
    match map.entry(signature.to_string()) {
        Entry::Occupied(_) => Err(StorageError::AlreadyExists),
        Entry::Vacant(slot) => {
            slot.insert(request.clone());
            Ok(())
        }
    }
}

fn get(map: &DashMap<String, Request>, signature: &str) -> Result<Request, StorageError> {
    map.get(signature)
        .map(|entry| entry.value().clone())
        .ok_or(StorageError::NotFound)
}

fn delete(map: &DashMap<String, Request>, signature: &str) -> Result<(), StorageError> {
    map.remove(signature).map(|_| ()).ok_or(StorageError::NotFound)
}

#[async_trait]
impl AccessTokenStorage for InMemoryTokenStorage {
    async fn create_access_token_session(&self, signature: &str, request: &Request) -> Result<(), StorageError> {
        create(&self.access_tokens, signature, request)
    }

    async fn get_access_token_session(&self, signature: &str) -> Result<Request, StorageError> {
        get(&self.access_tokens, signature)
    }

    async fn delete_access_token_session(&self, signature: &str) -> Result<(), StorageError> {
        delete(&self.access_tokens, signature)
    }
}

#[async_trait]
impl AuthorizeCodeStorage for InMemoryTokenStorage {
    async fn create_authorize_code_session(&self, signature: &str, request: &Request) -> Result<(), StorageError> {
        create(&self.authorize_codes, signature, request)
    }

    async fn get_authorize_code_session(&self, signature: &str) -> Result<Request, StorageError> {
        get(&self.authorize_codes, signature)
    }

    async fn delete_authorize_code_session(&self, signature: &str) -> Result<(), StorageError> {
        delete(&self.authorize_codes, signature)
    }
}

#[async_trait]
impl RefreshTokenStorage for InMemoryTokenStorage {
    async fn create_refresh_token_session(&self, signature: &str, request: &Request) -> Result<(), StorageError> {
        create(&self.refresh_tokens, signature, request)
    }

    async fn get_refresh_token_session(&self, signature: &str) -> Result<Request, StorageError> {
        get(&self.refresh_tokens, signature)
    }

    async fn delete_refresh_token_session(&self, signature: &str) -> Result<(), StorageError> {
        delete(&self.refresh_tokens, signature)
    }
}

/// Username to hashed password map.
#[derive(Clone, Default)]
pub struct InMemoryUserAuthenticator {
    users: Arc<DashMap<String, String>>,
}

impl InMemoryUserAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user; the password is hashed before it is kept.
    pub fn with_user(self, username: impl Into<String>, password: &str) -> Self {
        self.users.insert(username.into(), hash_secret(password));
        self
    }
}

#[async_trait]
impl UserAuthenticator for InMemoryUserAuthenticator {
    async fn authenticate(&self, username: &str, password: &str) -> Result<(), AuthenticationError> {
        match self.users.get(username) {
            Some(hashed) if verify_secret(hashed.value(), password) => Ok(()),
            _ => Err(AuthenticationError::InvalidCredentials),
        }
    }
}
