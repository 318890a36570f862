use chrono::{Duration, Utc};
use starberry_authz::{Arguments, Client, Form, Request, Session};

#[test]
fn test_grant_scope_is_idempotent() {
    let mut request = Request::new();
    request.grant_scope("read");
    request.grant_scope("read");
    request.grant_scope("write");
    assert_eq!(request.granted_scopes, Arguments::from_iter(["read", "write"]));
}

#[test]
fn test_new_request_is_empty() {
    let request = Request::new();
    assert!(request.scopes.is_empty());
    assert!(request.granted_scopes.is_empty());
    assert!(request.form.is_empty());
    assert!(request.session.is_empty());
    assert_eq!(request.client, Client::default());
}

#[test]
fn test_merge_appends_scopes_and_overwrites_context() {
    let mut target = Request::new();
    target.client = Client::new("target");
    target.set_scopes(Arguments::from_iter(["read"]));
    target.grant_scope("read");
    target.form = Form::from_pairs([("grant_type", "refresh_token"), ("scope", "read")]);

    let mut source = Request::new();
    source.requested_at = Utc::now() - Duration::hours(2);
    source.client = Client::new("source");
    source.set_scopes(Arguments::from_iter(["read", "write"]));
    source.grant_scope("read");
    source.set_session(Session::new(b"opaque".to_vec()));
    source.form = Form::from_pairs([("scope", "read write"), ("state", "abc")]);

    target.merge(&source);

    // Additive, without de-duplication against the target.
    assert_eq!(target.scopes, Arguments::from_iter(["read", "read", "write"]));
    assert_eq!(target.granted_scopes, Arguments::from_iter(["read", "read"]));
    // Overwriting.
    assert_eq!(target.requested_at, source.requested_at);
    assert_eq!(target.client.id, "source");
    assert_eq!(target.session.as_bytes(), b"opaque");
    // Map union with source precedence.
    assert_eq!(target.form.get("scope"), Some("read write"));
    assert_eq!(target.form.get("state"), Some("abc"));
    assert_eq!(target.form.get("grant_type"), Some("refresh_token"));
}

#[test]
fn test_merge_does_not_alias_source_form() {
    let mut target = Request::new();
    let source = {
        let mut s = Request::new();
        s.form = Form::from_pairs([("k", "v")]);
        s
    };
    target.merge(&source);
    target.form.add("k", "w");
    assert_eq!(source.form.get_all("k").len(), 1);
    assert_eq!(target.form.get_all("k").len(), 2);
}

#[test]
fn test_record_serializes_storage_shape() {
    let mut request = Request::new();
    request.client = Client::new("c1");
    request.set_scopes(Arguments::from_iter(["read"]));
    request.grant_scope("read");
    let record = request.to_record("sig-1");

    let value = serde_json::to_value(&record).unwrap();
    for key in ["signature", "requested_at", "client_id", "scopes", "granted_scopes", "form", "session"] {
        assert!(value.get(key).is_some(), "missing {key}");
    }
    assert_eq!(value["client_id"], "c1");
    assert_eq!(value["scopes"][0], "read");
}
