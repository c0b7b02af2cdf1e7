use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use soundraw_browser::config::{ConfigStore, SoundrawConfig};
use soundraw_browser::error::SoundrawError;

fn store_in(temp: &tempfile::TempDir) -> ConfigStore {
    ConfigStore::at(Utf8PathBuf::from_path_buf(temp.path().join("nested").join("config.json")).unwrap())
}

#[test]
fn save_load_and_reset() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp);
    assert!(store.load().unwrap().is_none());

    let config = SoundrawConfig::new("token-123", "https://api.example.com/v1");
    store.save(&config).unwrap();

    let loaded = store.load().unwrap().unwrap();
    assert_eq!(loaded, config);
    let resolved = store.require().unwrap();
    assert_eq!(resolved.token, "token-123");
    assert_eq!(resolved.endpoint("beats"), "https://api.example.com/v1/beats");

    assert!(store.reset().unwrap());
    assert!(!store.reset().unwrap());
    assert_matches!(store.require(), Err(SoundrawError::MissingToken));
}

#[test]
fn save_overwrites_previous_record() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp);
    store
        .save(&SoundrawConfig::new("old", "https://old.example.com"))
        .unwrap();
    store
        .save(&SoundrawConfig::new("new", "https://new.example.com"))
        .unwrap();
    assert_eq!(store.require().unwrap().token, "new");
}

#[test]
fn save_rejects_incomplete_record() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp);
    assert_matches!(
        store.save(&SoundrawConfig::new("", "https://api.example.com")),
        Err(SoundrawError::MissingToken)
    );
    assert!(!store.path().as_std_path().exists());
}

#[test]
fn corrupt_file_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let store = store_in(&temp);
    std::fs::create_dir_all(store.path().parent().unwrap().as_std_path()).unwrap();
    std::fs::write(store.path().as_std_path(), b"{not json").unwrap();

    let err = store.require().unwrap_err();
    assert_matches!(err, SoundrawError::ConfigParse(_));
    assert!(err.is_configuration());
}
