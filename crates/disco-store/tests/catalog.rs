//! Catalog behaviour shared by every backend.

use disco_core::X25519PublicKey;
use disco_identity::{generate_invite_uuid, now_millis, Invite, Permission, Remote, Role, User};
use disco_store::{Catalog, MemoryCatalog, NodeMeta, SqliteCatalog, StoreError};

fn perm(s: &str) -> Permission {
    s.parse().unwrap()
}

fn backends() -> Vec<(&'static str, Box<dyn Catalog>)> {
    vec![
        ("sqlite", Box::new(SqliteCatalog::open_memory().unwrap())),
        ("memory", Box::new(MemoryCatalog::new())),
    ]
}

fn invite_for(user: &str, uuid: &str, token: u8, expires: i64) -> Invite {
    Invite {
        id: 0,
        uuid: uuid.to_string(),
        created_at: now_millis(),
        expires,
        user: User::remote(user, vec![]),
        token: [token; 32],
        public_key: X25519PublicKey::from_bytes([token; 32]),
        private_key_enc: vec![1, 2, 3],
    }
}

async fn seed(catalog: &dyn Catalog) {
    catalog
        .create_role(&Role::new("reader", vec![perm("r:default:store:*")]))
        .await
        .unwrap();
    catalog
        .create_user(&User::remote(
            "bob",
            vec![Role::new("reader", vec![])],
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_meta_written_once() {
    for (name, catalog) in backends() {
        assert!(catalog.meta().await.unwrap().is_none(), "{}", name);
        let meta = NodeMeta {
            version: "0.1.0".to_string(),
            ca_cert_pem: "cert".to_string(),
            ca_key_enc: vec![9, 9],
            server_san: "localhost".to_string(),
        };
        catalog.init_meta(&meta).await.unwrap();
        assert_eq!(catalog.meta().await.unwrap(), Some(meta.clone()), "{}", name);
        assert!(matches!(
            catalog.init_meta(&meta).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }
}

#[tokio::test]
async fn test_role_lifecycle() {
    for (name, catalog) in backends() {
        let created = catalog
            .create_role(&Role::new("ops", vec![perm("rw:dev,prod:store:app/*")]))
            .await
            .unwrap();
        assert!(created.id > 0, "{}", name);
        assert_eq!(created.permissions[0].to_string(), "rw:dev,prod:store:app/*");

        assert!(matches!(
            catalog.create_role(&Role::new("ops", vec![])).await,
            Err(StoreError::AlreadyExists(_))
        ));

        let updated = catalog
            .update_role("ops", &[perm("r:*:*"), perm("d:dev:store:tmp/*")])
            .await
            .unwrap();
        assert_eq!(updated.permissions.len(), 2);
        assert_eq!(catalog.role("ops").await.unwrap().permissions, updated.permissions);

        assert!(catalog.update_role("ghost", &[]).await.unwrap_err().is_not_found());
        catalog.delete_role("ops", false).await.unwrap();
        let err = catalog.role("ops").await.unwrap_err();
        assert_eq!(err.to_string(), "role with name 'ops' doesn't exist", "{}", name);
    }
}

#[tokio::test]
async fn test_role_delete_guard() {
    for (name, catalog) in backends() {
        seed(catalog.as_ref()).await;

        let err = catalog.delete_role("reader", false).await.unwrap_err();
        match err {
            StoreError::ReferentialConflict { message, count } => {
                assert_eq!(count, 1, "{}", name);
                assert_eq!(message, "1 user has this role");
            }
            other => panic!("{}: unexpected {:?}", name, other),
        }

        catalog
            .create_user(&User::remote("carol", vec![Role::new("reader", vec![])]))
            .await
            .unwrap();
        let err = catalog.delete_role("reader", false).await.unwrap_err();
        assert_eq!(err.to_string(), "2 users have this role");

        catalog.delete_role("reader", true).await.unwrap();
        assert!(catalog.user("bob").await.unwrap().roles.is_empty(), "{}", name);
    }
}

#[tokio::test]
async fn test_user_roles_resolve_permissions() {
    for (name, catalog) in backends() {
        seed(catalog.as_ref()).await;

        let bob = catalog.user("bob").await.unwrap();
        assert!(bob.can("read", "default:store:anything"), "{}", name);
        assert!(!bob.can("write", "default:store:anything"));

        // Permission changes on the role are visible through the user.
        catalog
            .update_role("reader", &[perm("rw:default:store:*")])
            .await
            .unwrap();
        assert!(catalog.user("bob").await.unwrap().can("write", "default:store:k"));

        catalog.create_role(&Role::new("admin", vec![perm("*:*:*")])).await.unwrap();
        let bob = catalog
            .update_user_roles("bob", &["admin".to_string(), "reader".to_string()])
            .await
            .unwrap();
        assert_eq!(bob.role_names(), ["admin", "reader"]);

        assert!(catalog
            .update_user_roles("bob", &["ghost".to_string()])
            .await
            .unwrap_err()
            .is_not_found());
        assert!(matches!(
            catalog.create_user(&User::remote("bob", vec![])).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }
}

#[tokio::test]
async fn test_single_local_user() {
    for (name, catalog) in backends() {
        assert!(catalog.local_user().await.unwrap().is_none());
        let pk = X25519PublicKey::from_bytes([5u8; 32]);
        let local = catalog
            .create_user(&User::local(pk, "hash".to_string(), vec![]))
            .await
            .unwrap();
        assert!(local.is_local(), "{}", name);
        assert_eq!(catalog.local_user().await.unwrap(), Some(local));

        let other = User::local(X25519PublicKey::from_bytes([6u8; 32]), "h".to_string(), vec![]);
        assert!(matches!(
            catalog.create_user(&other).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }
}

#[tokio::test]
async fn test_invite_prefix_lookup() {
    for (name, catalog) in backends() {
        seed(catalog.as_ref()).await;
        let far = now_millis() + 3_600_000;
        catalog.create_invite(&invite_for("bob", "abcdefghijk1", 1, far)).await.unwrap();
        catalog.create_invite(&invite_for("bob", "abcdefghijk2", 2, far)).await.unwrap();
        catalog.create_invite(&invite_for("bob", "zzzzzzzzzzzz", 3, far)).await.unwrap();

        let found = catalog.invite("zz").await.unwrap();
        assert_eq!(found.uuid, "zzzzzzzzzzzz", "{}", name);
        assert_eq!(found.user.name, "bob");

        let err = catalog.invite("abc").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "filter UUID 'abc*' returns 2 results; make the filter more specific"
        );
        // Ambiguity is detected before anything is deleted.
        assert!(matches!(
            catalog.delete_invite("abc").await,
            Err(StoreError::Ambiguous(_))
        ));
        assert_eq!(catalog.invites(false).await.unwrap().len(), 3);

        assert!(matches!(
            catalog.invite("a%").await,
            Err(StoreError::InvalidData(_))
        ));
        assert!(catalog.invite("qq").await.unwrap_err().is_not_found());

        catalog.delete_invite("abcdefghijk1").await.unwrap();
        assert_eq!(catalog.invite("abc").await.unwrap().uuid, "abcdefghijk2");
    }
}

#[tokio::test]
async fn test_invite_expiry_and_claim() {
    for (name, catalog) in backends() {
        seed(catalog.as_ref()).await;
        let past = now_millis() - 1_000;
        let uuid = generate_invite_uuid();
        catalog.create_invite(&invite_for("bob", &uuid, 7, past)).await.unwrap();

        assert!(catalog.invites(false).await.unwrap().is_empty(), "{}", name);
        assert_eq!(catalog.invites(true).await.unwrap().len(), 1);
        assert!(catalog.claim_invite(&[7u8; 32]).await.unwrap().is_none());

        let extended = catalog
            .update_invite_expiry(&uuid, now_millis() + 60_000)
            .await
            .unwrap();
        assert!(extended.expires > now_millis());

        let claimed = catalog.claim_invite(&[7u8; 32]).await.unwrap().unwrap();
        assert_eq!(claimed.uuid, uuid);
        assert_eq!(claimed.user.role_names(), ["reader"]);
        assert!(catalog.claim_invite(&[7u8; 32]).await.unwrap().is_none());
        assert!(catalog.invites(true).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_invite_requires_user_and_user_delete_cascades() {
    for (name, catalog) in backends() {
        assert!(catalog
            .create_invite(&invite_for("nobody", &generate_invite_uuid(), 1, i64::MAX))
            .await
            .unwrap_err()
            .is_not_found());

        seed(catalog.as_ref()).await;
        catalog
            .create_invite(&invite_for("bob", &generate_invite_uuid(), 1, i64::MAX))
            .await
            .unwrap();
        catalog.delete_user("bob").await.unwrap();
        assert!(catalog.invites(true).await.unwrap().is_empty(), "{}", name);
        assert!(catalog.delete_user("bob").await.unwrap_err().is_not_found());
    }
}

#[tokio::test]
async fn test_remotes() {
    for (name, catalog) in backends() {
        let remote = Remote {
            id: 0,
            created_at: now_millis(),
            name: "node1".to_string(),
            address: "127.0.0.1:2020".to_string(),
            tls_ca_cert: "ca".to_string(),
            tls_server_san: "localhost".to_string(),
            tls_client_cert_enc: vec![1],
            tls_client_key_enc: vec![2],
        };
        let created = catalog.create_remote(&remote).await.unwrap();
        assert!(created.id > 0, "{}", name);
        assert_eq!(catalog.remote("node1").await.unwrap().address, remote.address);
        assert!(matches!(
            catalog.create_remote(&remote).await,
            Err(StoreError::AlreadyExists(_))
        ));
        assert_eq!(catalog.remotes().await.unwrap().len(), 1);
        catalog.delete_remote("node1").await.unwrap();
        assert!(catalog.remote("node1").await.unwrap_err().is_not_found());
    }
}

#[tokio::test]
async fn test_sqlite_catalog_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disco.db");

    let catalog = SqliteCatalog::open(&path).unwrap();
    seed(&catalog).await;
    catalog.close().await.unwrap();

    let reopened = SqliteCatalog::open(&path).unwrap();
    let bob = reopened.user("bob").await.unwrap();
    assert!(bob.can("read", "default:store:k"));
}
