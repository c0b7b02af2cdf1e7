use soundraw_browser::domain::{BeatsResponse, GenreOptions, TagsResponse};

#[test]
fn beats_response_tolerates_sparse_samples() {
    let response: BeatsResponse = serde_json::from_str(
        r#"{
            "samples": [
                {"id": 1, "name": "Night Drive", "sample": "https://x/1.m4a", "bpm": 87.6, "genres": ["lofi"]},
                {"id": "two", "name": "Sunrise", "sample": "https://x/2.mp3"}
            ]
        }"#,
    )
    .unwrap();

    assert_eq!(response.total_count, None);
    assert_eq!(response.samples.len(), 2);
    assert_eq!(response.samples[0].bpm_label().as_deref(), Some("88 BPM"));
    assert_eq!(response.samples[0].genres, vec!["lofi".to_string()]);
    assert_eq!(response.samples[1].id.as_str(), "two");
    assert!(response.samples[1].genres.is_empty());
}

#[test]
fn genre_options_are_sorted_by_key() {
    let tags: TagsResponse =
        serde_json::from_str(r#"{"genres": {"rock": "Rock", "ambient": "Ambient"}}"#).unwrap();
    let options = GenreOptions::from(tags);

    assert_eq!(options.total_count, 2);
    let keys = options
        .genres
        .iter()
        .map(|genre| genre.key.as_str())
        .collect::<Vec<_>>();
    assert_eq!(keys, vec!["ambient", "rock"]);
    assert_eq!(options.get("rock").map(|genre| genre.name.as_str()), Some("Rock"));
    assert!(options.get("jazz").is_none());
}

#[test]
fn empty_tags_yield_no_options() {
    let tags: TagsResponse = serde_json::from_str("{}").unwrap();
    assert_eq!(GenreOptions::from(tags), GenreOptions::default());
}
