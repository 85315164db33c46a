use std::fs;
use std::path::{Path, PathBuf};

use hexya_core::cast_to_integer;
use hexya_store::StoreError;
use serde::Deserialize;
use tracing::{debug, info};

use crate::data::{FieldMap, RecordData};
use crate::env::{Orm, SUPERUSER_ID};
use crate::error::OrmError;
use crate::fields::magic;

/// One seed file: records of a single model.
///
/// ```json
/// {"model": "Currency", "records": [{"id": 1, "name": "EUR", "symbol": "€"}]}
/// ```
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub model: String,
    #[serde(default)]
    pub records: Vec<FieldMap>,
}

/// Load every `*.json` file of `dir`, in file name order, in a single
/// transaction run as the superuser. Returns the number of records
/// inserted.
///
/// Loading is idempotent: a record with an explicit `id` is inserted
/// only when no record has that id, and records without an id are only
/// created when the model had no records at all.
pub fn load_seed_dir(orm: &Orm, dir: &Path) -> Result<usize, OrmError> {
    if !dir.is_dir() {
        debug!("seed dir {:?} does not exist, skipping", dir);
        return Ok(0);
    }
    let files = seed_files(dir)?;
    let mut parsed = Vec::with_capacity(files.len());
    for path in &files {
        let bytes = fs::read(path).map_err(|e| StoreError::Storage(e.to_string()))?;
        let seed: SeedFile = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Serialization(format!("{}: {}", path.display(), e)))?;
        parsed.push((path, seed));
    }

    let count = orm.execute_in_new_environment(SUPERUSER_ID, |env| -> Result<usize, OrmError> {
        let mut count = 0;
        for (path, seed) in &parsed {
            let pool = env.pool(&seed.model)?;
            let was_empty = pool.search_count(&hexya_domain::Condition::All)? == 0;
            let mut loaded = 0;
            for values in &seed.records {
                let mut values = values.clone();
                let id = values.shift_remove(magic::ID).as_ref().and_then(cast_to_integer);
                let data = RecordData::from_map(&seed.model, values);
                match id {
                    Some(id) if pool.browse_one(id).exists()?.is_empty() => {
                        pool.insert_with_id(id, &data)?;
                        loaded += 1;
                    }
                    Some(_) => {}
                    None if was_empty => {
                        pool.create(&data)?;
                        loaded += 1;
                    }
                    None => {}
                }
            }
            debug!("seed: loaded {} {} records from {:?}", loaded, seed.model, path);
            count += loaded;
        }
        Ok(count)
    })?;
    info!("seed: loaded {} records from {:?}", count, dir);
    Ok(count)
}

fn seed_files(dir: &Path) -> Result<Vec<PathBuf>, OrmError> {
    let entries = fs::read_dir(dir).map_err(|e| StoreError::Storage(e.to_string()))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::Storage(e.to_string()))?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldDef;
    use crate::model::ModelDef;
    use crate::registry::Registry;
    use hexya_store::{MemoryStore, RedbStore};
    use std::sync::Arc;

    fn registry() -> Registry {
        let mut reg = Registry::new();
        reg.add_model(ModelDef::new("Currency").with_field(FieldDef::char("Name").required()));
        reg.add_model(
            ModelDef::new("Company")
                .with_field(FieldDef::char("Name"))
                .with_field(FieldDef::many2one("Currency", "Currency")),
        );
        reg
    }

    fn write_seeds(dir: &Path) {
        fs::write(
            dir.join("01_currency.json"),
            r#"{"model": "Currency",
                "records": [{"id": 1, "name": "EUR"}, {"id": 2, "name": "USD"}]}"#,
        )
        .unwrap();
        fs::write(
            dir.join("02_company.json"),
            r#"{"model": "Company", "records": [{"name": "Your Company", "currency_id": 1}]}"#,
        )
        .unwrap();
        fs::write(dir.join("README.txt"), "not a seed").unwrap();
    }

    #[test]
    fn loads_in_order_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write_seeds(dir.path());
        let orm = Orm::new(registry(), Arc::new(MemoryStore::new()));

        assert_eq!(load_seed_dir(&orm, dir.path()).unwrap(), 3);
        assert_eq!(load_seed_dir(&orm, dir.path()).unwrap(), 0);

        let (currencies, company) = orm
            .execute_in_new_environment(SUPERUSER_ID, |env| -> Result<_, OrmError> {
                let currencies = env.pool("Currency")?.search_count(&hexya_domain::Condition::All)?;
                let company = env.pool("Company")?.search_all()?;
                Ok((currencies, company.get("currency_id")?))
            })
            .unwrap();
        assert_eq!(currencies, 2);
        assert_eq!(company, serde_json::json!(1));
    }

    #[test]
    fn sequences_continue_after_seeded_ids() {
        let dir = tempfile::tempdir().unwrap();
        write_seeds(dir.path());
        let db = tempfile::tempdir().unwrap();
        let store = RedbStore::open(&db.path().join("hexya.redb")).unwrap();
        let orm = Orm::new(registry(), Arc::new(store));
        load_seed_dir(&orm, dir.path()).unwrap();

        let id = orm
            .execute_in_new_environment(SUPERUSER_ID, |env| {
                let mut data = RecordData::new("Currency");
                data.set("name", serde_json::json!("CHF"));
                env.pool("Currency")?.create(&data).map(|rs| rs.id())
            })
            .unwrap();
        assert_eq!(id, 3);
    }

    #[test]
    fn missing_dir_is_skipped() {
        let orm = Orm::new(registry(), Arc::new(MemoryStore::new()));
        assert_eq!(load_seed_dir(&orm, Path::new("/nonexistent/seed")).unwrap(), 0);
    }

    #[test]
    fn bad_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        let orm = Orm::new(registry(), Arc::new(MemoryStore::new()));
        assert!(load_seed_dir(&orm, dir.path()).is_err());
    }
}
