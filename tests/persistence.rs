//! Durability scenarios: close-and-reopen round trips, large multi-level
//! trees, catalog growth, and header validation on open.

use eyre::Result;
use tempfile::tempdir;

use kdb::btree::BTree;
use kdb::storage::Pager;
use kdb::{ColumnDef, Database, DataType, Error, Row, Value};

fn t_columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::new("id", DataType::Integer),
        ColumnDef::nullable("payload", DataType::Text),
    ]
}

#[test]
fn ten_thousand_rows_survive_a_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("big.kdb");

    // ~130-byte rows: enough leaves that the tree needs two internal
    // levels, and far more pages than the 64-page cache holds.
    let payload = "p".repeat(120);
    {
        let mut db = Database::open(&path).unwrap();
        let mut table = db.create_table("t", t_columns(), "sql").unwrap();
        for key in 0..10_000u64 {
            db.insert(&mut table, &[Value::Int(key), Value::Text(payload.clone())])
                .unwrap();
        }
        db.close().unwrap();
    }

    let mut db = Database::open(&path).unwrap();
    let table = db.table("t").unwrap();

    let rows: Vec<Row> = db
        .select_all(&table)
        .unwrap()
        .collect::<Result<Vec<Row>>>()
        .unwrap();
    assert_eq!(rows.len(), 10_000);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.get_int(0).unwrap(), i as u64);
    }

    for key in (0..10_000u64).step_by(997) {
        let row = db.select_by_pkey(&table, key).unwrap().unwrap();
        assert_eq!(row.get_text(1).unwrap(), payload);
    }

    // >= 2 internal levels: root + internal layer + leaves.
    let root = table.root_page();
    let path = db.path().to_path_buf();
    db.close().unwrap();

    let mut pager = Pager::open(path).unwrap();
    let mut tree = BTree::new(&mut pager, root);
    assert!(tree.height().unwrap() >= 3, "height {}", tree.height().unwrap());
}

#[test]
fn reopen_sees_the_same_tables_and_rows() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.kdb");

    {
        let mut db = Database::open(&path).unwrap();
        let mut a = db.create_table("a", t_columns(), "CREATE a").unwrap();
        let mut b = db.create_table("b", t_columns(), "CREATE b").unwrap();
        db.insert(&mut a, &[Value::Int(1), Value::from("alpha")]).unwrap();
        db.insert(&mut b, &[Value::Int(2), Value::Null]).unwrap();
        db.close().unwrap();
    }

    let mut db = Database::open(&path).unwrap();
    assert_eq!(db.table_names().unwrap(), ["a", "b"]);

    let a = db.table("a").unwrap();
    assert_eq!(a.sql(), "CREATE a");
    let row = db.select_by_pkey(&a, 1).unwrap().unwrap();
    assert_eq!(row.get_text(1).unwrap(), "alpha");

    let b = db.table("b").unwrap();
    let row = db.select_by_pkey(&b, 2).unwrap().unwrap();
    assert!(row.is_null(1));
}

#[test]
fn catalog_split_survives_a_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.kdb");
    let table_count = 24;

    {
        let mut db = Database::open(&path).unwrap();
        let sql = format!("CREATE TABLE t (...) -- {}", "pad".repeat(120));
        for i in 0..table_count {
            db.create_table(&format!("table_{i:02}"), t_columns(), &sql)
                .unwrap();
        }
        db.close().unwrap();
    }

    {
        let pager = Pager::open(&path).unwrap();
        assert_ne!(pager.catalog_root(), 0, "catalog root should have split");
    }

    let mut db = Database::open(&path).unwrap();
    assert_eq!(db.table_names().unwrap().len(), table_count);
    for i in 0..table_count {
        let mut table = db.table(&format!("table_{i:02}")).unwrap();
        db.insert(&mut table, &[Value::Int(1), Value::Null]).unwrap();
    }
    db.close().unwrap();
}

#[test]
fn inserts_after_reopen_extend_the_same_tree() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.kdb");

    {
        let mut db = Database::open(&path).unwrap();
        let mut table = db.create_table("t", t_columns(), "sql").unwrap();
        for key in 0..50u64 {
            db.insert(&mut table, &[Value::Int(key * 2), Value::Null]).unwrap();
        }
        db.close().unwrap();
    }

    let mut db = Database::open(&path).unwrap();
    let mut table = db.table("t").unwrap();
    for key in 0..50u64 {
        db.insert(&mut table, &[Value::Int(key * 2 + 1), Value::Null])
            .unwrap();
    }

    let rows: Vec<Row> = db
        .select_all(&table)
        .unwrap()
        .collect::<Result<Vec<Row>>>()
        .unwrap();
    let keys: Vec<u64> = rows.iter().map(|r| r.get_int(0).unwrap()).collect();
    assert_eq!(keys, (0..100u64).collect::<Vec<_>>());

    let err = db
        .insert(&mut table, &[Value::Int(7), Value::Null])
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::DuplicateKey(7))
    ));
}

#[test]
fn garbage_files_are_rejected_on_open() {
    let dir = tempdir().unwrap();

    let garbage = dir.path().join("garbage.kdb");
    std::fs::write(&garbage, vec![0x42u8; 4096]).unwrap();
    let err = Database::open(&garbage).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::BadMagic)));

    let stub = dir.path().join("stub.kdb");
    std::fs::write(&stub, b"kdb").unwrap();
    let err = Database::open(&stub).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::ShortHeader(3))
    ));
}
