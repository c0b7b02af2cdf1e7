use camino::Utf8PathBuf;

use soundraw_browser::store::Store;

#[test]
fn default_layout_paths() {
    let store = Store::new().unwrap();
    assert!(store.scratch_root().ends_with("soundraw-browser/samples"));
    assert!(store.export_root().ends_with("Soundraw"));
}

#[test]
fn clear_scratch_leaves_exports_alone() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let store = Store::new_with_paths(root.join("scratch"), root.join("export"));

    assert_eq!(store.clear_scratch().unwrap().removed_files, 0);

    Store::write_bytes_atomic(&store.scratch_root().join("a-0123456789.m4a"), b"abc").unwrap();
    Store::write_bytes_atomic(&store.scratch_root().join("b-0123456789.m4a"), b"de").unwrap();
    Store::write_bytes_atomic(&store.export_root().join("a-0123456789.m4a"), b"abc").unwrap();

    let cleared = store.clear_scratch().unwrap();
    assert_eq!(cleared.removed_files, 2);
    assert_eq!(cleared.removed_bytes, 5);
    assert!(store.export_root().join("a-0123456789.m4a").as_std_path().exists());
    assert!(store.scratch_root().as_std_path().exists());
}

#[test]
fn clear_scratch_keeps_downloads_in_progress() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let store = Store::new_with_paths(root.join("scratch"), root.join("export"));
    store.ensure_scratch_root().unwrap();
    let partial = store.scratch_root().join(".soundraw-x1y2z3.part");
    std::fs::write(partial.as_std_path(), b"half").unwrap();
    Store::write_bytes_atomic(&store.scratch_root().join("a-0123456789.m4a"), b"abc").unwrap();

    let cleared = store.clear_scratch().unwrap();

    assert_eq!(cleared.removed_files, 1);
    assert_eq!(cleared.removed_bytes, 3);
    assert!(partial.as_std_path().exists());
}
