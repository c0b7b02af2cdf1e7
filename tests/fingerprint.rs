use camino::Utf8Path;

use soundraw_browser::fingerprint::{CacheKey, HASH_LEN, resolve_path, url_hash};

#[test]
fn resolve_path_is_deterministic() {
    let base = Utf8Path::new("/tmp/soundraw");
    let first = resolve_path("https://cdn.example.com/a.m4a", "Night Drive", None, base);
    let second = resolve_path("https://cdn.example.com/a.m4a", "Night Drive", None, base);
    assert_eq!(first, second);
}

#[test]
fn same_name_different_url_gives_different_paths() {
    let base = Utf8Path::new("/tmp/soundraw");
    let a = resolve_path("https://cdn.example.com/a.m4a", "Night Drive", None, base);
    let b = resolve_path("https://cdn.example.com/b.m4a", "Night Drive", None, base);
    assert_ne!(a, b);
    assert_ne!(
        CacheKey::new("https://cdn.example.com/a.m4a", "Night Drive"),
        CacheKey::new("https://cdn.example.com/b.m4a", "Night Drive")
    );
}

#[test]
fn cool_beat_path_is_sanitized_hashed_and_keeps_extension() {
    let base = Utf8Path::new("/tmp/soundraw");
    let path = resolve_path("https://x/a.m4a", "Cool Beat!", None, base);
    let expected = format!("Cool Beat-{}.m4a", url_hash("https://x/a.m4a"));

    assert_eq!(path.parent(), Some(base));
    assert_eq!(path.file_name(), Some(expected.as_str()));
    assert_eq!(path.extension(), Some("m4a"));
    assert!(!path.as_str().contains('!'));
}

#[test]
fn explicit_extension_wins_over_url_suffix() {
    let base = Utf8Path::new("/tmp/soundraw");
    let path = resolve_path("https://x/a.m4a", "Cool Beat", Some("wav"), base);
    assert_eq!(path.extension(), Some("wav"));
}

#[test]
fn key_display_joins_slug_and_hash() {
    let key = CacheKey::new("https://x/a.m4a", "Cool Beat!");
    assert_eq!(key.slug(), "Cool Beat");
    assert_eq!(key.hash().len(), HASH_LEN);
    assert_eq!(key.to_string(), format!("Cool Beat-{}", key.hash()));
}
