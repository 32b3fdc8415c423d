//! Integration tests against an in-memory SQLite database

use chrono::{DateTime, Utc};
use persister::prelude::*;
use sqlx::sqlite::SqlitePoolOptions;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Model)]
pub struct Maker {
    pub id: i64,
    pub name: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Model)]
pub struct Gadget {
    pub id: i64,
    pub maker_id: i64,
    pub name: String,
    pub deleted_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[belongs_to]
    pub maker: Option<Maker>,

    #[serde(default)]
    #[has_many]
    pub pieces: Vec<Piece>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Model)]
pub struct Piece {
    pub id: i64,
    pub gadget_id: i64,
    pub label: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

async fn setup_database() -> Database {
    // One connection keeps every statement on the same in-memory database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");

    let database = Database::from_sqlite_pool(pool, false);
    for ddl in [
        "CREATE TABLE makers (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, deleted_at TEXT)",
        "CREATE TABLE gadgets (id INTEGER PRIMARY KEY AUTOINCREMENT, maker_id INTEGER NOT NULL, name TEXT NOT NULL, deleted_at TEXT)",
        "CREATE TABLE pieces (id INTEGER PRIMARY KEY AUTOINCREMENT, gadget_id INTEGER NOT NULL, label TEXT NOT NULL, deleted_at TEXT)",
    ] {
        database
            .execute_sql(ddl)
            .await
            .expect("Failed to prepare tables");
    }

    database
}

async fn maker(database: &Database, name: &str) -> Maker {
    let mut maker = Maker {
        name: name.to_string(),
        ..Default::default()
    };
    database.repository::<Maker>().create(&mut maker).await.unwrap();
    maker
}

async fn gadget(database: &Database, maker_id: i64, name: &str) -> Gadget {
    let mut gadget = Gadget {
        maker_id,
        name: name.to_string(),
        ..Default::default()
    };
    database.repository::<Gadget>().create(&mut gadget).await.unwrap();
    gadget
}

async fn piece(database: &Database, gadget_id: i64, label: &str) -> Piece {
    let mut piece = Piece {
        gadget_id,
        label: label.to_string(),
        ..Default::default()
    };
    database.repository::<Piece>().create(&mut piece).await.unwrap();
    piece
}

#[tokio::test]
async fn test_soft_delete_lifecycle() {
    let database = setup_database().await;
    let gadgets = database.repository::<Gadget>();

    let acme = maker(&database, "acme").await;
    let mut widget = gadget(&database, acme.id, "sprocket").await;
    assert!(widget.id > 0);

    gadgets.delete(&mut widget, vec![]).await.unwrap();
    assert!(widget.deleted_at.is_some());

    let error = gadgets
        .get(vec![Condition::eq("id", widget.id)])
        .await
        .unwrap_err();
    assert!(error.is_no_results());

    let hidden = gadgets
        .bypass_delete()
        .one(vec![Condition::eq("id", widget.id)])
        .await
        .unwrap();
    assert_eq!(hidden.deleted_at, widget.deleted_at);

    gadgets.restore(&mut widget).await.unwrap();
    assert_eq!(widget.deleted_at, None);

    let found = gadgets
        .get(vec![Condition::eq("id", widget.id)])
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "sprocket");
}

#[tokio::test]
async fn test_soft_deleted_relations_are_hidden() {
    let database = setup_database().await;
    let gadgets = database.repository::<Gadget>();

    let acme = maker(&database, "acme").await;
    let mut defunct = maker(&database, "defunct").await;
    let first = gadget(&database, acme.id, "gear").await;
    gadget(&database, defunct.id, "cog").await;

    piece(&database, first.id, "axle").await;
    let mut worn = piece(&database, first.id, "spring").await;

    database
        .repository::<Maker>()
        .delete(&mut defunct, vec![])
        .await
        .unwrap();
    database
        .repository::<Piece>()
        .delete(&mut worn, vec![])
        .await
        .unwrap();

    let joined = gadgets.with("maker", vec![]).get(vec![]).await.unwrap();
    assert_eq!(joined.len(), 1);
    assert_eq!(joined[0].id, first.id);
    assert_eq!(joined[0].maker.as_ref().map(|m| m.name.as_str()), Some("acme"));

    let preloaded = gadgets
        .then("pieces", vec![])
        .one(vec![Condition::eq("id", first.id)])
        .await
        .unwrap();
    assert_eq!(preloaded.pieces.len(), 1);
    assert_eq!(preloaded.pieces[0].label, "axle");

    let gated = gadgets
        .with("pieces", vec![Condition::eq("label", "spring")])
        .get(vec![])
        .await
        .unwrap_err();
    assert!(gated.is_no_results());

    let everything = gadgets
        .bypass_delete()
        .with("maker", vec![])
        .then("pieces", vec![])
        .get(vec![])
        .await
        .unwrap();
    assert_eq!(everything.len(), 2);
    let first_loaded = everything.iter().find(|g| g.id == first.id).unwrap();
    assert_eq!(first_loaded.pieces.len(), 2);
}

#[tokio::test]
async fn test_update_inserts_missing_row() {
    let database = setup_database().await;
    let gadgets = database.repository::<Gadget>();

    let mut restored = Gadget {
        id: 42,
        maker_id: 1,
        name: "imported".to_string(),
        ..Default::default()
    };
    gadgets.update(&mut restored).await.unwrap();

    restored.name = "renamed".to_string();
    gadgets.update(&mut restored).await.unwrap();

    let found = gadgets
        .one(vec![Condition::eq("id", 42)])
        .await
        .unwrap();
    assert_eq!(found.name, "renamed");
}

#[tokio::test]
async fn test_transaction_rollback() {
    let database = setup_database().await;
    let gadgets = database.repository::<Gadget>();

    let tx = database.transaction().await.unwrap();
    let mut ghost = Gadget {
        maker_id: 1,
        name: "ghost".to_string(),
        ..Default::default()
    };
    gadgets
        .part_of(tx.clone().connection())
        .create(&mut ghost)
        .await
        .unwrap();
    tx.rollback().await.unwrap();

    let error = gadgets.get(vec![]).await.unwrap_err();
    assert!(error.is_no_results());
    database.health_check().await.unwrap();
}
