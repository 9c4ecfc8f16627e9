//! UserStore integration tests against the in-memory document backend.

mod common;

use common::{token, Fixture};
use iam0_identity::{
    CancellationToken, Claim, IdentityError, Role, Store, StoreError, User, UserLogin,
    UserRepository,
};

async fn create(fixture: &Fixture, user: User) -> User {
    let mut store = fixture.user_store();
    let mut user = user;
    let result = store.create(&mut user, &token()).await.unwrap();
    assert!(result.succeeded(), "{result:?}");
    user
}

async fn create_role(fixture: &Fixture, name: &str) -> Role {
    let mut store = fixture.role_store();
    let mut role = Role::new(name);
    assert!(store.create(&mut role, &token()).await.unwrap().succeeded());
    role
}

#[tokio::test]
async fn test_find_by_name_and_email() {
    let fixture = Fixture::new();
    let alice = create(&fixture, User::new("alice").with_email("Alice@Example.com")).await;
    let store = fixture.user_store();

    assert_eq!(store.find_by_name("ALICE", &token()).await.unwrap(), alice);
    assert_eq!(store.find_by_email("ALICE@EXAMPLE.COM", &token()).await.unwrap(), alice);

    let id = store.get_user_id(&alice, &token()).unwrap();
    assert_eq!(store.find_by_id(&id, &token()).await.unwrap(), alice);
}

#[tokio::test]
async fn test_user_name_and_email_are_independently_unique() {
    let fixture = Fixture::new();
    create(&fixture, User::new("alice").with_email("a@example.com")).await;
    let mut store = fixture.user_store();

    let mut same_name = User::new("ALICE").with_email("other@example.com");
    let result = store.create(&mut same_name, &token()).await.unwrap();
    assert_eq!(result.errors()[0].code, "UniqueViolation");
    assert!(result.errors()[0].description.contains("user_normalized_user_name"));

    let mut same_email = User::new("bob").with_email("A@example.com");
    let result = store.create(&mut same_email, &token()).await.unwrap();
    assert!(result.errors()[0].description.contains("user_normalized_email"));

    // users without email do not collide with each other
    create(&fixture, User::new("carol")).await;
    create(&fixture, User::new("dave")).await;
    assert_eq!(fixture.backend.document_count("users"), 3);
}

#[tokio::test]
async fn test_normalized_keys_flush_immediately_plain_fields_do_not() {
    let fixture = Fixture::new();
    let mut user = create(&fixture, User::new("alice")).await;
    let mut store = fixture.user_store();
    let cancel = token();

    store.set_user_name(&mut user, Some("alice2"), &cancel).unwrap();
    store.set_email(&mut user, Some("alice@example.com"), &cancel).unwrap();
    store.set_email_confirmed(&mut user, true, &cancel).unwrap();
    store.set_password_hash(&mut user, Some("opaque-hash"), &cancel).unwrap();
    let seen = fixture.user_store().find_by_name("ALICE", &cancel).await.unwrap();
    assert_eq!(seen.user_name.as_deref(), Some("alice"));
    assert!(seen.email.is_none() && !seen.email_confirmed && seen.password_hash.is_none());

    store.set_normalized_email(&mut user, "ALICE@EXAMPLE.COM", &cancel).await.unwrap();
    store.set_normalized_user_name(&mut user, "ALICE2", &cancel).await.unwrap();

    let seen = fixture.user_store().find_by_email("ALICE@EXAMPLE.COM", &cancel).await.unwrap();
    assert_eq!(seen.normalized_user_name.as_deref(), Some("ALICE2"));
    // the flush snapshots the whole entity, so the pending plain edits land too
    assert_eq!(seen.user_name.as_deref(), Some("alice2"));
    assert!(store.has_password(&seen, &cancel).unwrap());
    assert!(store.get_email_confirmed(&seen, &cancel).unwrap());
}

#[tokio::test]
async fn test_claims_add_replace_remove() {
    let fixture = Fixture::new();
    let mut user = create(&fixture, User::new("alice")).await;
    let mut store = fixture.user_store();
    let cancel = token();
    let read = Claim::new("permission", "read");
    let write = Claim::new("permission", "write");
    let admin = Claim::new("permission", "admin");

    store.add_claims(&mut user, &[read.clone(), write.clone(), read.clone()], &cancel).unwrap();
    store.replace_claim(&mut user, &read, &admin, &cancel).unwrap();
    assert_eq!(
        store.get_claims(&user, &cancel).unwrap(),
        vec![admin.clone(), write.clone(), admin.clone()]
    );

    store.remove_claims(&mut user, &[admin.clone()], &cancel).unwrap();
    assert_eq!(store.get_claims(&user, &cancel).unwrap(), vec![write.clone()]);

    assert!(store.update(&user, &cancel).await.unwrap().succeeded());
    let holders = store.get_users_for_claim(&write, &cancel).await.unwrap();
    assert_eq!(holders.len(), 1);
    assert!(store.get_users_for_claim(&admin, &cancel).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_add_claims_is_all_or_nothing() {
    let fixture = Fixture::new();
    let store = fixture.user_store();
    let mut user = User::new("alice");

    let err = store
        .add_claims(&mut user, &[Claim::new("permission", "read"), Claim::new("", "bad")], &token())
        .unwrap_err();
    assert!(matches!(err, IdentityError::InvalidClaim));
    assert!(user.claims.is_empty());
}

#[tokio::test]
async fn test_logins() {
    let fixture = Fixture::new();
    let mut user = create(&fixture, User::new("alice")).await;
    let mut store = fixture.user_store();
    let cancel = token();

    store
        .add_login(&mut user, UserLogin::new("github", "42").with_display_name("GitHub"), &cancel)
        .unwrap();
    let err = store.add_login(&mut user, UserLogin::new("github", "42"), &cancel).unwrap_err();
    assert!(matches!(err, IdentityError::DuplicateLogin { .. }));
    assert!(store.update(&user, &cancel).await.unwrap().succeeded());

    let found = store.find_by_login("github", "42", &cancel).await.unwrap();
    assert_eq!(found.id, user.id);
    let logins = store.get_logins(&found, &cancel).unwrap();
    assert_eq!(logins[0].display_name.as_deref(), Some("GitHub"));

    store.remove_login(&mut user, "github", "42", &cancel).unwrap();
    assert!(store.update(&user, &cancel).await.unwrap().succeeded());
    assert!(store.find_by_login("github", "42", &cancel).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_login_cannot_be_linked_to_two_users() {
    let fixture = Fixture::new();
    let mut alice = User::new("alice");
    alice.logins.push(UserLogin::new("github", "42"));
    create(&fixture, alice).await;

    let mut bob = User::new("bob");
    bob.logins.push(UserLogin::new("github", "42"));
    let result = fixture.user_store().create(&mut bob, &token()).await.unwrap();
    assert!(result.errors()[0].description.contains("user_login"));
}

#[tokio::test]
async fn test_role_membership() {
    let fixture = Fixture::new();
    create_role(&fixture, "Admin").await;
    create_role(&fixture, "Editor").await;
    let mut user = create(&fixture, User::new("alice")).await;
    let mut store = fixture.user_store();
    let cancel = token();

    store.add_to_role(&mut user, "EDITOR", &cancel).await.unwrap();
    store.add_to_role(&mut user, "ADMIN", &cancel).await.unwrap();
    store.add_to_role(&mut user, "EDITOR", &cancel).await.unwrap();
    assert_eq!(user.roles, ["EDITOR", "ADMIN"]);
    assert!(store.is_in_role(&user, "ADMIN", &cancel).unwrap());

    let err = store.add_to_role(&mut user, "MISSING", &cancel).await.unwrap_err();
    assert!(err.is_not_found());

    assert_eq!(store.get_roles(&user, &cancel).await.unwrap(), ["Editor", "Admin"]);
    assert!(store.update(&user, &cancel).await.unwrap().succeeded());
    assert_eq!(store.get_users_in_role("ADMIN", &cancel).await.unwrap().len(), 1);

    store.remove_from_role(&mut user, "ADMIN", &cancel).unwrap();
    assert!(!store.is_in_role(&user, "ADMIN", &cancel).unwrap());
    assert!(store.update(&user, &cancel).await.unwrap().succeeded());
    assert!(store.get_users_in_role("ADMIN", &cancel).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_get_roles_skips_deleted_roles() {
    let fixture = Fixture::new();
    let admin = create_role(&fixture, "Admin").await;
    let mut user = User::new("alice");
    let store = fixture.user_store();
    store.add_to_role(&mut user, "ADMIN", &token()).await.unwrap();

    assert!(fixture.role_store().delete(&admin, &token()).await.unwrap().succeeded());
    assert!(store.get_roles(&user, &token()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unsaved_user_is_a_validation_fault() {
    let fixture = Fixture::new();
    let mut store = fixture.user_store();
    let mut user = User::new("ghost");

    let err = store.set_normalized_email(&mut user, "G@X", &token()).await.unwrap_err();
    assert!(matches!(err, IdentityError::MissingIdentifier { entity: "users" }));
    let err = store.delete(&user, &token()).await.unwrap_err();
    assert!(err.is_validation());
    assert!(store.get_user_id(&user, &token()).unwrap_err().is_validation());
}

#[tokio::test]
async fn test_cancelled_operations_never_touch_the_session() {
    let fixture = Fixture::new();
    let mut saved = create(&fixture, User::new("alice")).await;
    let (mut store, counters) = fixture.recording_user_store();
    let cancelled = CancellationToken::cancelled();
    let claim = Claim::new("permission", "read");

    assert!(matches!(
        store.create(&mut User::new("bob"), &cancelled).await,
        Err(IdentityError::Cancelled)
    ));
    assert!(matches!(store.update(&saved, &cancelled).await, Err(IdentityError::Cancelled)));
    assert!(matches!(store.find_by_email("A@B", &cancelled).await, Err(IdentityError::Cancelled)));
    assert!(matches!(
        store.set_normalized_user_name(&mut saved, "ROOT", &cancelled).await,
        Err(IdentityError::Cancelled)
    ));
    assert!(matches!(
        store.get_users_for_claim(&claim, &cancelled).await,
        Err(IdentityError::Cancelled)
    ));
    assert!(matches!(
        store.find_by_login("github", "42", &cancelled).await,
        Err(IdentityError::Cancelled)
    ));
    assert!(matches!(
        store.add_to_role(&mut saved, "ADMIN", &cancelled).await,
        Err(IdentityError::Cancelled)
    ));
    assert!(matches!(
        store.get_users_in_role("ADMIN", &cancelled).await,
        Err(IdentityError::Cancelled)
    ));
    assert!(matches!(store.get_roles(&saved, &cancelled).await, Err(IdentityError::Cancelled)));

    assert_eq!(counters.calls.get(), 0);
}

#[tokio::test]
async fn test_failed_create_surfaces_store_message_not_error() {
    let fixture = Fixture::new();
    create(&fixture, User::new("alice")).await;
    let mut store = fixture.user_store();

    let outcome = store.create(&mut User::new("Alice"), &token()).await;
    let result = outcome.expect("persistence faults are converted, not returned");
    let expected = StoreError::UniqueViolation {
        index: "user_normalized_user_name",
        value: "ALICE".into(),
    };
    assert_eq!(result.errors()[0].description, expected.to_string());
}

#[tokio::test]
async fn test_users_query_pages_in_creation_order() {
    let fixture = Fixture::new();
    for name in ["a", "b", "c"] {
        create(&fixture, User::new(name)).await;
    }
    let store = fixture.user_store();

    let page = store.users().skip(1).take(1).to_list(&token()).await.unwrap();
    assert_eq!(page[0].user_name.as_deref(), Some("b"));
    assert_eq!(store.users().count(&token()).await.unwrap(), 3);
}

#[tokio::test]
async fn test_cancelled_normalized_email_is_dropped() {
    let fixture = Fixture::new();
    let mut user = create(&fixture, User::new("alice")).await;
    let cancel = token();
    let mut store = fixture.cancelling_user_store(&cancel);

    let err = store.set_normalized_email(&mut user, "A@X", &cancel).await.unwrap_err();
    assert!(matches!(err, IdentityError::Store(StoreError::Cancelled)));

    let mut bob = User::new("bob");
    assert!(store.create(&mut bob, &token()).await.unwrap().succeeded());
    assert!(store.find_by_email("A@X", &token()).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_dropping_store_disposes_session_once() {
    let fixture = Fixture::new();
    create(&fixture, User::new("alice")).await;
    let (mut store, counters) = fixture.recording_user_store();

    let result = store.create(&mut User::new("ALICE"), &token()).await.unwrap();
    assert!(!result.succeeded());
    assert_eq!(counters.disposals.get(), 0);
    drop(store);
    assert_eq!(counters.disposals.get(), 1);
}
