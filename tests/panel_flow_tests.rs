use beatsaver_playlist_batch::api::beatsaver::BeatSaverClient;
use beatsaver_playlist_batch::panel::PanelHost;
use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn load_then_submit_all_batches_isolates_failures() {
    let mut server = Server::new();
    let songs: Vec<_> = (0..230).map(|i| json!({ "key": format!("{:x}", 0x1000 + i) })).collect();
    let _meta = server
        .mock("GET", "/playlists/id/77")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "songs": songs }).to_string())
        .create();
    // batch 2 holds keys 1064..10c7 and is rejected; batches 1 and 3 succeed
    let rejected = server
        .mock("POST", "/playlists/id/77/batch")
        .match_body(Matcher::Regex("\"1064\"".into()))
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"bad hash"}"#)
        .expect(1)
        .create();
    let accepted = server
        .mock("POST", "/playlists/id/77/batch")
        .match_body(Matcher::AnyOf(vec![
            Matcher::Regex("\"1000\"".into()),
            Matcher::Regex("\"10c8\"".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ok":true}"#)
        .expect(2)
        .create();

    let api = BeatSaverClient::new(&server.url(), Duration::from_secs(5), "tests").unwrap();
    let host = PanelHost::new(Arc::new(api), 100);
    let rt = tokio::runtime::Runtime::new().unwrap();
    let results = rt.block_on(async {
        let panel = host.mount();
        let loaded = panel.load("77").await.unwrap();
        assert_eq!(loaded.batches.len(), 3);
        assert!(loaded.batches.iter().all(|b| b.hashes.is_empty()));
        panel.submit_all(None).await.unwrap()
    });

    rejected.assert();
    accepted.assert();
    let oks: Vec<bool> = results.iter().map(|(_, r)| r.as_ref().unwrap().ok).collect();
    assert_eq!(oks, vec![true, false, true]);

    let panel = host.mount();
    assert!(panel.log_lines().iter().any(|l| l.message.contains("Batch 2 failed (400)")));
    host.unmount();
}
