use crate::support::{exit_on_store_error, load_store_or_exit, print_json, save_store_or_exit};
use rollbook_store::{Record, RecordId, SaveMode, SaveReport, StoreConfig, sort_by_score_desc};
use serde_json::json;

pub fn run_add(config: StoreConfig, id: RecordId, name: String, score: f64, json_output: bool) {
    let store = load_store_or_exit(config);
    let record = Record::new(id, name.trim(), score);

    store
        .add(record.clone())
        .unwrap_or_else(|e| exit_on_store_error(&e));
    let saved = save_store_or_exit(&store);

    if json_output {
        print_json(&json!({
            "action": "record.add",
            "dbPath": saved.path.display().to_string(),
            "saveMode": save_mode_label(&saved),
            "record": record
        }));
    } else {
        println!(
            "rollbook add\n  Added: {record}\n  Path: {}",
            saved.path.display()
        );
    }
}

pub fn run_update(
    config: StoreConfig,
    id: RecordId,
    name: Option<String>,
    score: Option<f64>,
    json_output: bool,
) {
    let store = load_store_or_exit(config);
    let existing = store
        .find_by_id(id)
        .unwrap_or_else(|e| exit_on_store_error(&e));

    // Omitted flags keep the current value; the store always replaces whole.
    let mut record = existing.clone();
    if let Some(name) = name {
        record.name = name.trim().to_string();
    }
    if let Some(score) = score {
        record.score = score;
    }

    store
        .update(record.clone())
        .unwrap_or_else(|e| exit_on_store_error(&e));
    let saved = save_store_or_exit(&store);

    if json_output {
        print_json(&json!({
            "action": "record.update",
            "dbPath": saved.path.display().to_string(),
            "saveMode": save_mode_label(&saved),
            "previous": existing,
            "record": record
        }));
    } else {
        println!(
            "rollbook update\n  Before: {existing}\n  After: {record}\n  Path: {}",
            saved.path.display()
        );
    }
}

pub fn run_delete(config: StoreConfig, id: RecordId, json_output: bool) {
    let store = load_store_or_exit(config);
    store.delete(id).unwrap_or_else(|e| exit_on_store_error(&e));
    let saved = save_store_or_exit(&store);

    if json_output {
        print_json(&json!({
            "action": "record.delete",
            "dbPath": saved.path.display().to_string(),
            "saveMode": save_mode_label(&saved),
            "id": id,
            "remaining": saved.records
        }));
    } else {
        println!(
            "rollbook delete\n  Deleted: ID={id}\n  Path: {}",
            saved.path.display()
        );
    }
}

pub fn run_get(config: StoreConfig, id: RecordId, json_output: bool) {
    let store = load_store_or_exit(config);
    let record = store
        .find_by_id(id)
        .unwrap_or_else(|e| exit_on_store_error(&e));

    if json_output {
        print_json(&json!({
            "action": "record.get",
            "dbPath": store.path().display().to_string(),
            "record": record
        }));
    } else {
        println!("rollbook get\n  Found: {record}");
    }
}

pub fn run_list(config: StoreConfig, by_score: bool, json_output: bool) {
    let store = load_store_or_exit(config);
    let mut records = store.list_all();
    if by_score {
        sort_by_score_desc(&mut records);
    }

    let order = if by_score { "score-desc" } else { "id" };

    if json_output {
        print_json(&json!({
            "action": "record.list",
            "dbPath": store.path().display().to_string(),
            "order": order,
            "count": records.len(),
            "items": records
        }));
    } else {
        println!(
            "rollbook list\n  Path: {}\n  Count: {}",
            store.path().display(),
            records.len()
        );
        for record in records {
            println!("  - {record}");
        }
    }
}

fn save_mode_label(saved: &SaveReport) -> &'static str {
    match saved.mode {
        SaveMode::Renamed => "renamed",
        SaveMode::Copied => "copied",
    }
}
