use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use soundraw_browser::api::{SoundrawApi, SoundrawHttpClient};
use soundraw_browser::config::{ConfigStore, SoundrawConfig};
use soundraw_browser::domain::SearchQuery;
use soundraw_browser::error::SoundrawError;

/// Serves exactly one HTTP response and hands back the request head it saw.
fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut head = String::new();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                break;
            }
            head.push_str(&line);
        }
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let mut stream = stream;
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();
        head
    });
    (base_url, handle)
}

fn config_store(temp: &tempfile::TempDir, config: Option<SoundrawConfig>) -> ConfigStore {
    let path = Utf8PathBuf::from_path_buf(temp.path().join("config.json")).unwrap();
    let store = ConfigStore::at(path.clone());
    if let Some(config) = config {
        let json = serde_json::to_vec_pretty(&config).unwrap();
        std::fs::write(path.as_std_path(), json).unwrap();
    }
    store
}

#[test]
fn missing_token_fails_before_any_request() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let temp = tempfile::tempdir().unwrap();
    let store = config_store(&temp, Some(SoundrawConfig::new("", base_url)));
    let client = SoundrawHttpClient::new(store).unwrap();

    assert_matches!(client.genres(), Err(SoundrawError::MissingToken));
    assert_matches!(
        client.search(&SearchQuery::new()),
        Err(SoundrawError::MissingToken)
    );
    assert!(listener.accept().is_err(), "no connection should be attempted");
}

#[test]
fn missing_config_file_is_a_configuration_error() {
    let temp = tempfile::tempdir().unwrap();
    let client = SoundrawHttpClient::new(config_store(&temp, None)).unwrap();
    let err = client.genres().unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn missing_base_url_is_a_configuration_error() {
    let temp = tempfile::tempdir().unwrap();
    let store = config_store(&temp, Some(SoundrawConfig::new("tok", "  ")));
    let client = SoundrawHttpClient::new(store).unwrap();
    assert_matches!(client.genres(), Err(SoundrawError::MissingBaseUrl));
}

#[test]
fn tags_become_genre_options() {
    let (base_url, server) = serve_once(
        "200 OK",
        r#"{"genres":{"rock":"Rock","jazz":"Jazz"},"total_count":2}"#,
    );
    let temp = tempfile::tempdir().unwrap();
    let store = config_store(&temp, Some(SoundrawConfig::new("secret", base_url)));
    let client = SoundrawHttpClient::new(store).unwrap();

    let genres = client.genres().unwrap();
    let head = server.join().unwrap();

    assert_eq!(genres.total_count, 2);
    let map = genres.as_map();
    assert_eq!(map.len(), 2);
    assert_eq!(map.get("rock"), Some(&"Rock"));
    assert_eq!(map.get("jazz"), Some(&"Jazz"));
    assert!(head.starts_with("GET /tags "));
    assert!(head.to_ascii_lowercase().contains("authorization: bearer secret"));
}

#[test]
fn search_sends_genres_page_and_limit() {
    let (base_url, server) = serve_once(
        "200 OK",
        r#"{"samples":[{"id":7,"name":"Cool Beat!","sample":"https://x/a.m4a","bpm":92}],"total_count":1}"#,
    );
    let temp = tempfile::tempdir().unwrap();
    let store = config_store(
        &temp,
        Some(SoundrawConfig::new("secret", format!("{base_url}/"))),
    );
    let client = SoundrawHttpClient::new(store).unwrap();

    let query = SearchQuery::new().genre("rock").page(2).limit(10);
    let response = client.search(&query).unwrap();
    let head = server.join().unwrap();

    let request_line = head.lines().next().unwrap().to_string();
    assert!(request_line.starts_with("GET /beats?"));
    assert!(request_line.contains("genres%5B%5D=rock"));
    assert!(request_line.contains("page=2"));
    assert!(request_line.contains("limit=10"));

    assert_eq!(response.samples.len(), 1);
    let sample = &response.samples[0];
    assert_eq!(sample.id.as_str(), "7");
    assert_eq!(sample.name, "Cool Beat!");
    assert_eq!(sample.url, "https://x/a.m4a");
    assert_eq!(sample.bpm, Some(92.0));
}

#[test]
fn non_success_status_is_an_api_error() {
    let (base_url, server) = serve_once("401 Unauthorized", r#"{"message":"invalid token"}"#);
    let temp = tempfile::tempdir().unwrap();
    let store = config_store(&temp, Some(SoundrawConfig::new("stale", base_url)));
    let client = SoundrawHttpClient::new(store).unwrap();

    let err = client.genres().unwrap_err();
    server.join().unwrap();

    assert_matches!(
        err,
        SoundrawError::Api { status: 401, ref message } if message == "invalid token"
    );
}

#[test]
fn connection_failure_is_not_retried() {
    let base_url = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };
    let temp = tempfile::tempdir().unwrap();
    let store = config_store(&temp, Some(SoundrawConfig::new("secret", base_url)));
    let client = SoundrawHttpClient::new(store).unwrap();

    let started = Instant::now();
    let err = client.genres().unwrap_err();

    assert_matches!(err, SoundrawError::Network(_));
    // A single backoff step is 200ms; a refused connection must not wait on any.
    assert!(started.elapsed() < Duration::from_millis(200));
}

#[test]
fn server_error_is_retried_then_surfaced() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let server = thread::spawn(move || {
        let mut served = 0;
        for stream in listener.incoming().take(4) {
            let stream = stream.unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                    break;
                }
            }
            let body = r#"{"message":"busy"}"#;
            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 503 Service Unavailable\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
            served += 1;
        }
        served
    });
    let temp = tempfile::tempdir().unwrap();
    let store = config_store(&temp, Some(SoundrawConfig::new("secret", base_url)));
    let client = SoundrawHttpClient::new(store).unwrap();

    let err = client.genres().unwrap_err();

    assert_eq!(server.join().unwrap(), 4);
    assert_matches!(
        err,
        SoundrawError::Api { status: 503, ref message } if message == "busy"
    );
}
