use rollbook_store::{LoadOutcome, SaveReport, Store, StoreConfig, StoreError};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

pub fn store_config(db: &Path, load_wait_ms: u64) -> StoreConfig {
    StoreConfig::new(db).with_load_wait(Duration::from_millis(load_wait_ms))
}

pub fn open_store_or_exit(config: StoreConfig) -> Store {
    let path = config.path.clone();
    Store::open(config).unwrap_or_else(|e| {
        eprintln!("error: failed to open {}: {e}", path.display());
        std::process::exit(1);
    })
}

/// Open and fully load the store.
///
/// One-shot commands save right after mutating, so they wait past the bounded
/// load wait rather than persist a partial record set.
///
/// A failed load exits instead of continuing with an empty store as the
/// interactive shell does. Continuing here would let the save that follows
/// the mutation overwrite the file with that single change.
pub fn load_store_or_exit(config: StoreConfig) -> Store {
    let store = open_store_or_exit(config);
    let loaded = match store.load() {
        Ok(LoadOutcome::Completed(report)) => Ok(report),
        Ok(LoadOutcome::Pending(handle)) => handle.wait(),
        Err(e) => Err(e),
    };
    if let Err(e) = loaded {
        eprintln!("error: failed to load {}: {e}", store.path().display());
        std::process::exit(1);
    }
    store
}

pub fn save_store_or_exit(store: &Store) -> SaveReport {
    store.save().unwrap_or_else(|e| {
        eprintln!("error: failed to save {}: {e}", store.path().display());
        std::process::exit(1);
    })
}

/// User-facing wording for a failed store operation.
pub fn describe_store_error(err: &StoreError) -> String {
    match err {
        StoreError::Validation(reason) => format!("Validation failed: {reason}"),
        StoreError::NotFound(id) => format!("No record found with ID: {id}"),
        other => format!("Error: {other}"),
    }
}

pub fn exit_on_store_error(err: &StoreError) -> ! {
    eprintln!("error: {}", describe_store_error(err));
    std::process::exit(1);
}

pub fn print_json(payload: &Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(payload).expect("json serialization")
    );
}
