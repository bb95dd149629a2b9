//! Integration tests for share and receive

mod common;

use ::common::vault::VaultError;

#[tokio::test]
async fn test_share_and_receive() {
    let stores = common::setup_stores();
    let alice = common::register(&stores, "alice").await;
    let bob = common::register(&stores, "bob").await;

    alice.store("report.txt", b"quarterly numbers").await.unwrap();
    let token = alice.share("report.txt", "bob").await.unwrap();

    bob.receive("from-alice.txt", "alice", token).await.unwrap();
    assert_eq!(
        bob.load("from-alice.txt").await.unwrap(),
        b"quarterly numbers"
    );
}

#[tokio::test]
async fn test_recipient_sees_owner_updates() {
    let stores = common::setup_stores();
    let alice = common::register(&stores, "alice").await;
    let bob = common::register(&stores, "bob").await;

    alice.store("doc.txt", b"v1").await.unwrap();
    let token = alice.share("doc.txt", "bob").await.unwrap();
    bob.receive("doc.txt", "alice", token).await.unwrap();

    alice.store("doc.txt", b"v2").await.unwrap();
    assert_eq!(bob.load("doc.txt").await.unwrap(), b"v2");
}

#[tokio::test]
async fn test_recipient_can_write() {
    let stores = common::setup_stores();
    let alice = common::register(&stores, "alice").await;
    let bob = common::register(&stores, "bob").await;

    alice.store("shared.txt", b"alice wrote this").await.unwrap();
    let token = alice.share("shared.txt", "bob").await.unwrap();
    bob.receive("shared.txt", "alice", token).await.unwrap();

    bob.append("shared.txt", b"; bob appended").await.unwrap();
    assert_eq!(
        alice.load("shared.txt").await.unwrap(),
        b"alice wrote this; bob appended"
    );

    bob.store("shared.txt", b"bob overwrote").await.unwrap();
    assert_eq!(alice.load("shared.txt").await.unwrap(), b"bob overwrote");
}

#[tokio::test]
async fn test_reshare_chain() {
    let stores = common::setup_stores();
    let alice = common::register(&stores, "alice").await;
    let bob = common::register(&stores, "bob").await;
    let carol = common::register(&stores, "carol").await;

    alice.store("chain.txt", b"link zero").await.unwrap();
    let token = alice.share("chain.txt", "bob").await.unwrap();
    bob.receive("chain.txt", "alice", token).await.unwrap();

    // a recipient can extend the share to a third user
    let token = bob.share("chain.txt", "carol").await.unwrap();
    carol.receive("chain.txt", "bob", token).await.unwrap();

    assert_eq!(carol.load("chain.txt").await.unwrap(), b"link zero");
    carol.append("chain.txt", b" + carol").await.unwrap();
    assert_eq!(alice.load("chain.txt").await.unwrap(), b"link zero + carol");
}

#[tokio::test]
async fn test_share_with_unknown_user() {
    let stores = common::setup_stores();
    let alice = common::register(&stores, "alice").await;

    alice.store("doc.txt", b"data").await.unwrap();
    let err = alice.share("doc.txt", "nobody").await.unwrap_err();
    assert!(matches!(err, VaultError::NotFound(_)));
}

#[tokio::test]
async fn test_share_unknown_filename() {
    let stores = common::setup_stores();
    let alice = common::register(&stores, "alice").await;
    common::register(&stores, "bob").await;

    let err = alice.share("ghost.txt", "bob").await.unwrap_err();
    assert!(matches!(err, VaultError::NotFound(_)));
}

#[tokio::test]
async fn test_receive_under_taken_filename() {
    let stores = common::setup_stores();
    let alice = common::register(&stores, "alice").await;
    let bob = common::register(&stores, "bob").await;

    alice.store("doc.txt", b"alice's").await.unwrap();
    bob.store("mine.txt", b"bob's own").await.unwrap();

    let token = alice.share("doc.txt", "bob").await.unwrap();
    let err = bob.receive("mine.txt", "alice", token).await.unwrap_err();
    assert!(matches!(err, VaultError::InvalidInput(_)));

    // bob's own file is untouched
    assert_eq!(bob.load("mine.txt").await.unwrap(), b"bob's own");
}

#[tokio::test]
async fn test_receive_without_grant() {
    let stores = common::setup_stores();
    let alice = common::register(&stores, "alice").await;
    let eve = common::register(&stores, "eve").await;

    alice.store("secret.txt", b"confidential").await.unwrap();

    // eve somehow learns the location but was never granted access
    let token = alice.location_of("secret.txt").unwrap();
    let err = eve.receive("stolen.txt", "alice", token).await.unwrap_err();
    assert!(matches!(err, VaultError::AccessRevoked(_)));
}

#[tokio::test]
async fn test_recipient_share_survives_relogin() {
    let stores = common::setup_stores();
    let alice = common::register(&stores, "alice").await;
    let bob = common::register(&stores, "bob").await;

    alice.store("doc.txt", b"persistent").await.unwrap();
    let token = alice.share("doc.txt", "bob").await.unwrap();
    bob.receive("doc.txt", "alice", token).await.unwrap();
    drop(bob);

    let bob = common::login(&stores, "bob").await;
    assert_eq!(bob.load("doc.txt").await.unwrap(), b"persistent");
}
