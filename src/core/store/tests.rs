//! Unit tests for the store module

use super::*;
use crate::entities::feature::{Feature, FeatureUpdate, NewFeature};
use std::collections::BTreeMap;
use std::fs;
use tempfile::{tempdir, TempDir};

fn drawing_in(dir: &TempDir) -> DocumentPaths {
    let drawing = dir.path().join("bracket.pdf");
    fs::write(&drawing, b"%PDF-1.4").unwrap();
    DocumentPaths::new(drawing)
}

fn open_test_store() -> (TempDir, Database) {
    let tmp = tempdir().unwrap();
    let db = Database::open(drawing_in(&tmp), StoreOptions::default()).unwrap();
    (tmp, db)
}

fn region(page: u32) -> NewFeature {
    NewFeature {
        page: Some(page),
        x: Some(100.0),
        y: Some(200.0),
        w: Some(40.0),
        h: Some(20.0),
        ..Default::default()
    }
}

fn results(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_open_creates_schema() {
    let (tmp, db) = open_test_store();
    assert!(tmp.path().join("bracket.pdf.axis.db").exists());
    assert_eq!(db.schema_version().unwrap(), CURRENT_SCHEMA_VERSION);
    assert_eq!(db.migration(), &MigrationOutcome::NotNeeded);
}

#[test]
fn test_open_is_idempotent() {
    let tmp = tempdir().unwrap();
    let paths = drawing_in(&tmp);
    {
        let mut db = Database::open(paths.clone(), StoreOptions::default()).unwrap();
        db.features().add(region(1)).unwrap();
    }
    let mut db = Database::open(paths, StoreOptions::default()).unwrap();
    assert_eq!(db.features().list().unwrap().len(), 1);
}

#[test]
fn test_open_fails_for_missing_directory() {
    let tmp = tempdir().unwrap();
    let paths = DocumentPaths::new(tmp.path().join("no/such/dir/part.pdf"));
    let err = Database::open(paths, StoreOptions::default()).err().unwrap();
    assert!(matches!(err, StoreError::Init { .. }));
}

#[test]
fn test_sidecar_paths() {
    let paths = DocumentPaths::new("/work/drawings/part.pdf");
    assert_eq!(
        paths.database(),
        PathBuf::from("/work/drawings/part.pdf.axis.db")
    );
    assert_eq!(
        paths.legacy_workorder("WO/12"),
        PathBuf::from("/work/drawings/part.pdf.WO_12.csv")
    );
    assert_eq!(paths.base_name(), "part.pdf");
    assert_eq!(DocumentPaths::new("part.pdf").directory(), Path::new("."));
}

#[test]
fn test_add_allocates_sequential_ids() {
    let (_tmp, mut db) = open_test_store();
    let mut store = db.features();

    let first = store.add(region(1)).unwrap();
    let second = store.add(region(2)).unwrap();

    assert_eq!(first.id, "001");
    assert_eq!(second.id, "002");
    assert_eq!(first.br, 14.0);
    assert_eq!(first.bx, 0.0);
}

#[test]
fn test_id_never_reused_after_deleting_highest() {
    let (_tmp, mut db) = open_test_store();
    let mut store = db.features();

    store.add(region(1)).unwrap();
    let second = store.add(region(1)).unwrap();
    assert!(store.delete(&second.id).unwrap());

    let third = store.add(region(1)).unwrap();
    assert_eq!(third.id, "003");
}

#[test]
fn test_id_allocation_respects_existing_suffixes() {
    let (_tmp, mut db) = open_test_store();
    let mut store = db.features();

    let mut imported = store.add(region(1)).unwrap();
    imported.id = "F-041".to_string();
    store.replace_all(&[imported]).unwrap();

    let next = store.add(region(1)).unwrap();
    assert_eq!(next.id, "042");
}

#[test]
fn test_id_prefix_and_width() {
    let tmp = tempdir().unwrap();
    let options = StoreOptions {
        id_prefix: "B".to_string(),
        id_width: 4,
        username: "inspector".to_string(),
        ..Default::default()
    };
    let mut db = Database::open(drawing_in(&tmp), options).unwrap();
    let feature = db.features().add(region(1)).unwrap();
    assert_eq!(feature.id, "B0001");
    assert_eq!(feature.username, "inspector");
}

#[test]
fn test_id_prefix_ending_in_digit() {
    let tmp = tempdir().unwrap();
    let options = StoreOptions {
        id_prefix: "B2".to_string(),
        ..Default::default()
    };
    assert_eq!(options.id_number("B2001"), Some(1));
    assert_eq!(options.id_number("B2x7"), Some(7));

    let mut db = Database::open(drawing_in(&tmp), options).unwrap();
    let first = db.features().add(region(1)).unwrap();
    let second = db.features().add(region(1)).unwrap();
    assert_eq!(first.id, "B2001");
    assert_eq!(second.id, "B2002");
}

#[test]
fn test_add_rejects_missing_geometry() {
    let (_tmp, mut db) = open_test_store();
    let mut store = db.features();

    let err = store
        .add(NewFeature {
            page: Some(1),
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(ValidationError::MissingFields(_))
    ));
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn test_list_orders_ids_case_insensitively() {
    let (_tmp, mut db) = open_test_store();
    let mut store = db.features();
    let base = store.add(region(1)).unwrap();

    let rows: Vec<_> = ["b2", "A1", "a3"]
        .iter()
        .map(|id| Feature {
            id: id.to_string(),
            ..base.clone()
        })
        .collect();
    store.replace_all(&rows).unwrap();

    let ids: Vec<String> = store.list().unwrap().into_iter().map(|f| f.id).collect();
    assert_eq!(ids, vec!["A1", "a3", "b2"]);
}

#[test]
fn test_update_partial_fields() {
    let (_tmp, mut db) = open_test_store();
    let mut store = db.features();
    let feature = store.add(region(1)).unwrap();

    let update = FeatureUpdate::from_assignments(&["method=CMM", "nominal=12.5"]).unwrap();
    assert!(store.update(feature.id.as_str(), &update).unwrap());

    let stored = store.get(&feature.id).unwrap().unwrap();
    assert_eq!(stored.method, "CMM");
    assert_eq!(stored.nominal, "12.5");
    assert_eq!(stored.x, feature.x);
}

#[test]
fn test_update_unknown_or_empty_is_noop() {
    let (_tmp, mut db) = open_test_store();
    let mut store = db.features();
    let feature = store.add(region(1)).unwrap();

    assert!(!store
        .update("999", &FeatureUpdate::position(1.0, 2.0))
        .unwrap());
    assert!(!store
        .update(feature.id.as_str(), &FeatureUpdate::default())
        .unwrap());
    assert_eq!(store.get(&feature.id).unwrap().unwrap(), feature);
}

#[test]
fn test_delete_cascades_results() {
    let (_tmp, mut db) = open_test_store();
    let a = db.features().add(region(1)).unwrap();
    let b = db.features().add(region(1)).unwrap();
    db.results()
        .write("WO-1", &results(&[(a.id.as_str(), "10.0"), (b.id.as_str(), "PASS")]))
        .unwrap();

    assert!(db.features().delete(&a.id).unwrap());
    assert!(!db.features().delete(&a.id).unwrap());

    let remaining = db.results().read("WO-1").unwrap();
    assert_eq!(remaining, results(&[(b.id.as_str(), "PASS")]));
}

#[test]
fn test_replace_all_upserts_and_removes() {
    let (_tmp, mut db) = open_test_store();
    let a = db.features().add(region(1)).unwrap();
    let b = db.features().add(region(1)).unwrap();
    db.results()
        .write("WO-1", &results(&[(b.id.as_str(), "1")]))
        .unwrap();

    let mut changed = a.clone();
    changed.method = "Gauge".to_string();
    let blank = Feature {
        id: String::new(),
        ..a.clone()
    };
    db.features().replace_all(&[changed, blank]).unwrap();

    let features = db.features().list().unwrap();
    assert_eq!(features.len(), 1);
    assert_eq!(features[0].method, "Gauge");
    assert!(db.results().read("WO-1").unwrap().is_empty());
}

#[test]
fn test_snapshot_and_restore() {
    let (_tmp, mut db) = open_test_store();
    let feature = db.features().add(region(3)).unwrap();
    db.results()
        .write("WO-7", &results(&[(feature.id.as_str(), "9.95")]))
        .unwrap();
    let stamp = db.results().latest_timestamp("WO-7").unwrap();

    let snapshot = db.features().snapshot(&feature.id).unwrap().unwrap();
    assert_eq!(snapshot.results.len(), 1);
    db.features().delete(&feature.id).unwrap();
    assert!(db.features().snapshot(&feature.id).unwrap().is_none());

    db.features().restore(&snapshot).unwrap();
    assert_eq!(db.features().get(&feature.id).unwrap().unwrap(), feature);
    assert_eq!(
        db.results().read("WO-7").unwrap(),
        results(&[(feature.id.as_str(), "9.95")])
    );
    assert_eq!(db.results().latest_timestamp("WO-7").unwrap(), stamp);
}

#[test]
fn test_methods_are_unique_and_sorted() {
    let (_tmp, mut db) = open_test_store();
    for method in ["caliper", "CMM", "Caliper", "", "bore gauge"] {
        db.features()
            .add(NewFeature {
                method: method.to_string(),
                ..region(1)
            })
            .unwrap();
    }
    assert_eq!(
        db.features().methods().unwrap(),
        vec!["bore gauge", "caliper", "CMM"]
    );
}

#[test]
fn test_set_radius_all() {
    let (_tmp, mut db) = open_test_store();
    db.features().add(region(1)).unwrap();
    db.features()
        .add(NewFeature {
            br: Some(20.0),
            ..region(1)
        })
        .unwrap();

    assert_eq!(db.features().set_radius_all(20.0).unwrap(), 1);
    assert!(db
        .features()
        .list()
        .unwrap()
        .iter()
        .all(|f| f.br == 20.0));
}

#[test]
fn test_set_radius_all_keeps_blank_legacy_cells() {
    let tmp = tempdir().unwrap();
    let paths = drawing_in(&tmp);
    fs::write(
        paths.legacy_features(),
        "id,page,x,y,w,h,zoom,method,nominal,lsl,usl,bx,by,br\n\
         001,1,10,20,30,40,,Caliper,,,,,,14\n",
    )
    .unwrap();

    let mut db = Database::open(paths, StoreOptions::default()).unwrap();
    assert_eq!(db.features().set_radius_all(18.0).unwrap(), 1);

    let (zoom, bx, br): (Option<String>, Option<String>, Option<String>) = db
        .conn
        .query_row("SELECT zoom, bx, br FROM features WHERE id = '001'", [], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .unwrap();
    assert_eq!(zoom.unwrap_or_default(), "");
    assert_eq!(bx.unwrap_or_default(), "");
    assert_eq!(br.as_deref(), Some("18"));
}

#[test]
fn test_write_results_is_full_replacement() {
    let (_tmp, mut db) = open_test_store();
    let a = db.features().add(region(1)).unwrap();
    let b = db.features().add(region(1)).unwrap();

    db.results()
        .write("WO-1", &results(&[(a.id.as_str(), "10.1"), (b.id.as_str(), "10.2")]))
        .unwrap();
    db.results()
        .write("WO-1", &results(&[(b.id.as_str(), "FAIL")]))
        .unwrap();

    assert_eq!(
        db.results().read("WO-1").unwrap(),
        results(&[(b.id.as_str(), "FAIL")])
    );
}

#[test]
fn test_write_results_edge_cases() {
    let (_tmp, mut db) = open_test_store();
    let a = db.features().add(region(1)).unwrap();

    // Empty work order name is ignored
    db.results().write("", &results(&[(a.id.as_str(), "1")])).unwrap();
    assert!(db.results().list_workorders().unwrap().is_empty());

    // Empty ids are skipped
    db.results()
        .write("WO-1", &results(&[("", "x"), (a.id.as_str(), "1")]))
        .unwrap();
    assert_eq!(db.results().read("WO-1").unwrap().len(), 1);

    // Unknown feature aborts the whole write
    let err = db
        .results()
        .write("WO-1", &results(&[("404", "2")]))
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownFeature(id) if id == "404"));
    assert_eq!(db.results().read("WO-1").unwrap().len(), 1);

    // Empty mapping clears
    db.results().clear("WO-1").unwrap();
    assert!(db.results().read("WO-1").unwrap().is_empty());
    assert!(db.results().read("missing").unwrap().is_empty());
}

#[test]
fn test_set_single_result_keeps_others() {
    let (_tmp, mut db) = open_test_store();
    let a = db.features().add(region(1)).unwrap();
    let b = db.features().add(region(1)).unwrap();
    db.results().set("WO-2", &a.id, "10").unwrap();
    db.results().set("WO-2", &b.id, "11").unwrap();
    db.results().set("WO-2", &a.id, "PASS").unwrap();

    assert_eq!(
        db.results().read("WO-2").unwrap(),
        results(&[(a.id.as_str(), "PASS"), (b.id.as_str(), "11")])
    );
}

#[test]
fn test_list_workorders_case_insensitive() {
    let (_tmp, mut db) = open_test_store();
    let a = db.features().add(region(1)).unwrap();
    for wo in ["beta", "Alpha", "gamma/2"] {
        db.results().write(wo, &results(&[(a.id.as_str(), "1")])).unwrap();
    }
    assert_eq!(
        db.results().list_workorders().unwrap(),
        vec!["Alpha", "beta", "gamma/2"]
    );
}

#[test]
fn test_latest_timestamp() {
    let (_tmp, mut db) = open_test_store();
    let a = db.features().add(region(1)).unwrap();
    assert_eq!(db.results().latest_timestamp("WO-1").unwrap(), None);

    let before = Utc::now();
    db.results()
        .write("WO-1", &results(&[(a.id.as_str(), "1")]))
        .unwrap();
    let stamp = db.results().latest_timestamp("WO-1").unwrap().unwrap();
    assert!(stamp >= before - chrono::Duration::seconds(1));
    assert!(stamp <= Utc::now());
}

#[test]
fn test_parse_timestamp_formats() {
    assert!(parse_timestamp("2024-03-01T10:15:30.123456Z").is_some());
    assert!(parse_timestamp("2024-03-01T10:15:30.123456").is_some());
    assert!(parse_timestamp("2024-03-01 10:15:30").is_some());
    assert!(parse_timestamp("yesterday").is_none());
    assert!(parse_timestamp("").is_none());
}

#[test]
fn test_schema_evolution_adds_username() {
    let tmp = tempdir().unwrap();
    let paths = drawing_in(&tmp);
    {
        let conn = Connection::open(paths.database()).unwrap();
        conn.execute_batch(
            "CREATE TABLE features (id TEXT PRIMARY KEY, page TEXT, x TEXT, y TEXT, w TEXT,
                 h TEXT, zoom TEXT, method TEXT, nominal TEXT, lsl TEXT, usl TEXT,
                 bx TEXT, by TEXT, br TEXT);
             INSERT INTO features (id, page, x, y, w, h, zoom, method, nominal, lsl, usl, bx, by, br)
             VALUES ('005', '2', '1', '2', '3', '4', '1.5', 'CMM', '10', '9.9', '10.1', '0', '0', '14');",
        )
        .unwrap();
    }

    let mut db = Database::open(paths, StoreOptions::default()).unwrap();
    let features = db.features().list().unwrap();
    assert_eq!(features.len(), 1);
    assert_eq!(features[0].id, "005");
    assert_eq!(features[0].page, 2);
    assert_eq!(features[0].username, "");

    let next = db.features().add(region(1)).unwrap();
    assert_eq!(next.id, "006");
}

#[test]
fn test_newer_schema_is_refused() {
    let tmp = tempdir().unwrap();
    let paths = drawing_in(&tmp);
    {
        let conn = Connection::open(paths.database()).unwrap();
        conn.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION + 1)
            .unwrap();
    }

    let err = Database::open(paths, StoreOptions::default()).err().unwrap();
    assert!(matches!(
        err,
        StoreError::UnsupportedVersion { found: 4, supported: 3, .. }
    ));
}

#[test]
fn test_legacy_csv_migration() {
    let tmp = tempdir().unwrap();
    let paths = drawing_in(&tmp);
    fs::write(
        paths.legacy_features(),
        "id,page,x,y,w,h,zoom,method,nominal,lsl,usl,bx,by,br\n\
         001,1,10,20,30,40,1,Caliper,10,9.9,10.1,0,0,14\n\
         002,2,11,21,31,41,1,CMM,,,,1,1,12\n\
         ,3,0,0,0,0,1,,,,,0,0,14\n",
    )
    .unwrap();
    fs::write(
        paths.legacy_workorder("WO/1"),
        "id,result\n001,10.02\n002,PASS\n999,1\n",
    )
    .unwrap();

    let mut db = Database::open(paths.clone(), StoreOptions::default()).unwrap();
    assert_eq!(
        db.migration(),
        &MigrationOutcome::Imported {
            features: 2,
            results: 2,
            workorders: 1
        }
    );

    let features = db.features().list().unwrap();
    assert_eq!(features.len(), 2);
    assert_eq!(features[0].method, "Caliper");
    assert_eq!(features[1].br, 12.0);
    assert_eq!(features[1].username, "");

    assert_eq!(db.results().list_workorders().unwrap(), vec!["WO/1"]);
    assert_eq!(
        db.results().read("WO/1").unwrap(),
        results(&[("001", "10.02"), ("002", "PASS")])
    );
    assert!(db.results().latest_timestamp("WO/1").unwrap().is_some());
    drop(db);

    // Re-opening does not import again
    let mut db = Database::open(paths, StoreOptions::default()).unwrap();
    assert_eq!(db.migration(), &MigrationOutcome::NotNeeded);
    assert_eq!(db.features().list().unwrap(), features);
    assert_eq!(db.results().list_workorders().unwrap(), vec!["WO/1"]);
    assert_eq!(
        db.results().read("WO/1").unwrap(),
        results(&[("001", "10.02"), ("002", "PASS")])
    );
}

#[test]
fn test_migration_not_repeated_after_deleting_everything() {
    let tmp = tempdir().unwrap();
    let paths = drawing_in(&tmp);
    fs::write(
        paths.legacy_features(),
        "id,page,x,y,w,h\n001,1,1,1,1,1\n002,1,2,2,2,2\n",
    )
    .unwrap();
    fs::write(paths.legacy_workorder("WO-1"), "id,result\n001,PASS\n").unwrap();

    {
        let mut db = Database::open(paths.clone(), StoreOptions::default()).unwrap();
        assert!(matches!(db.migration(), MigrationOutcome::Imported { .. }));
        assert!(db.features().delete("001").unwrap());
        assert!(db.features().delete("002").unwrap());
        assert!(db.results().list_workorders().unwrap().is_empty());
    }

    let mut db = Database::open(paths, StoreOptions::default()).unwrap();
    assert_eq!(db.migration(), &MigrationOutcome::NotNeeded);
    assert!(db.features().list().unwrap().is_empty());
    assert!(db.results().list_workorders().unwrap().is_empty());
    // The high-water mark from the import still holds
    assert_eq!(db.features().add(region(1)).unwrap().id, "003");
}

#[test]
fn test_migration_skipped_when_tables_have_data() {
    let tmp = tempdir().unwrap();
    let paths = drawing_in(&tmp);
    {
        let mut db = Database::open(paths.clone(), StoreOptions::default()).unwrap();
        db.features().add(region(1)).unwrap();
    }
    fs::write(
        paths.legacy_features(),
        "id,page,x,y,w,h\n050,1,1,1,1,1\n",
    )
    .unwrap();

    let mut db = Database::open(paths, StoreOptions::default()).unwrap();
    let ids: Vec<String> = db.features().list().unwrap().into_iter().map(|f| f.id).collect();
    assert_eq!(ids, vec!["001"]);
}

#[test]
fn test_failed_migration_rolls_back() {
    let tmp = tempdir().unwrap();
    let paths = drawing_in(&tmp);
    fs::write(paths.legacy_features(), "id,page,x,y,w,h\n001,1,1,1,1,1\n").unwrap();
    // Invalid UTF-8 in a result file makes the import fail
    fs::write(paths.legacy_workorder("WO-9"), b"id,result\n001,\xff\xfe\n").unwrap();

    let mut db = Database::open(paths, StoreOptions::default()).unwrap();
    assert!(matches!(db.migration(), MigrationOutcome::Failed { .. }));
    assert!(db.features().list().unwrap().is_empty());
    assert!(db.results().list_workorders().unwrap().is_empty());
}
