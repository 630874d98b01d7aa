//! Domain, class, key and cluster facades against an in-process tracker

use mogfs_client::testing::MockTracker;
use mogfs_client::{Client, ClientConfig, ClientError};

async fn setup() -> (MockTracker, Client) {
    let tracker = MockTracker::start().await.unwrap();
    let client = Client::new(ClientConfig::new([tracker.host()])).await.unwrap();
    (tracker, client)
}

#[tokio::test]
async fn domain_lifecycle() {
    let (_tracker, client) = setup().await;
    let domain = client.domain("backups").unwrap();

    assert!(!domain.exists().await.unwrap());
    domain.create().await.unwrap();
    assert!(domain.exists().await.unwrap());

    let err = domain.create().await.unwrap_err();
    assert_eq!(err.tracker_code(), Some("domain_exists"));

    domain.delete().await.unwrap();
    assert!(!domain.exists().await.unwrap());
}

#[tokio::test]
async fn domain_with_files_cannot_be_deleted() {
    let (tracker, client) = setup().await;
    tracker.add_domain("busy");
    tracker.add_file("busy", "k", "http://127.0.0.1:1/k.fid", 1);

    let err = client.domain("busy").unwrap().delete().await.unwrap_err();
    assert_eq!(err.tracker_code(), Some("domain_has_files"));
}

#[test]
fn invalid_names_are_rejected_locally() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let client = runtime
        .block_on(Client::new(ClientConfig::new(["127.0.0.1:1"])))
        .unwrap();

    assert!(matches!(client.domain(""), Err(ClientError::Core(_))));
    assert!(matches!(client.domain("two words"), Err(ClientError::Core(_))));
    let domain = client.domain("media").unwrap();
    assert!(matches!(domain.key(""), Err(ClientError::Core(_))));
    assert!(matches!(domain.key("line\nbreak"), Err(ClientError::Core(_))));
}

#[tokio::test]
async fn classes_show_up_in_get_domains() {
    let (_tracker, client) = setup().await;
    let domain = client.domain("media").unwrap();
    domain.create().await.unwrap();

    domain.create_class("originals", 3).await.unwrap();
    domain.create_class("thumbs", 1).await.unwrap();
    domain.update_class("thumbs", 2).await.unwrap();

    let err = domain.create_class("thumbs", 1).await.unwrap_err();
    assert_eq!(err.tracker_code(), Some("class_exists"));

    let domains = client.get_domains().await.unwrap();
    assert_eq!(domains.len(), 1);
    assert_eq!(domains[0].name, "media");

    let classes: Vec<(&str, Option<u32>)> = domains[0]
        .classes
        .iter()
        .map(|c| (c.name.as_str(), c.mindevcount))
        .collect();
    assert_eq!(classes, vec![("originals", Some(3)), ("thumbs", Some(2))]);

    domain.delete_class("originals").await.unwrap();
    let err = domain.delete_class("originals").await.unwrap_err();
    assert_eq!(err.tracker_code(), Some("class_not_found"));

    let domains = client.get_domains().await.unwrap();
    assert_eq!(domains[0].classes.len(), 1);
}

#[tokio::test]
async fn list_keys_pages_with_the_cursor() {
    let (tracker, client) = setup().await;
    tracker.add_domain("media");
    for name in ["a/1", "a/2", "a/3", "a/4", "a/5", "b/1"] {
        tracker.add_file("media", name, "http://127.0.0.1:1/x.fid", 1);
    }
    let domain = client.domain("media").unwrap();

    let mut seen = Vec::new();
    let mut after: Option<String> = None;
    loop {
        let page = domain
            .list_keys(Some("a/"), after.as_deref(), Some(2))
            .await
            .unwrap();
        if page.keys.is_empty() {
            break;
        }
        seen.extend(page.keys.iter().map(|k| k.to_string()));
        after = page.next_after;
    }

    assert_eq!(seen, vec!["a/1", "a/2", "a/3", "a/4", "a/5"]);

    let all = domain.list_keys(None, None, None).await.unwrap();
    assert_eq!(all.keys.len(), 6);
    assert_eq!(all.next_after.as_deref(), Some("b/1"));
}

#[tokio::test]
async fn rename_moves_the_key() {
    let (tracker, client) = setup().await;
    tracker.add_domain("media");
    let fid = tracker.add_file("media", "old", "http://127.0.0.1:1/old.fid", 9);
    tracker.add_file("media", "taken", "http://127.0.0.1:1/taken.fid", 1);
    let domain = client.domain("media").unwrap();

    let old = domain.key("old").unwrap();
    let err = old.rename("taken").await.unwrap_err();
    assert_eq!(err.tracker_code(), Some("key_exists"));

    let renamed = old.rename("new").await.unwrap();
    assert_eq!(renamed.key().as_str(), "new");
    assert_eq!(renamed.file_info().await.unwrap().fid, fid);

    let err = old.file_info().await.unwrap_err();
    assert_eq!(err.tracker_code(), Some("unknown_key"));
}

#[tokio::test]
async fn delete_removes_the_key() {
    let (tracker, client) = setup().await;
    tracker.add_domain("media");
    tracker.add_file("media", "doomed", "http://127.0.0.1:1/d.fid", 1);
    let key = client.domain("media").unwrap().key("doomed").unwrap();

    key.delete().await.unwrap();

    let err = key.paths().await.unwrap_err();
    assert_eq!(err.tracker_code(), Some("unknown_key"));
    let err = key.delete().await.unwrap_err();
    assert_eq!(err.tracker_code(), Some("unknown_key"));
}

#[tokio::test]
async fn cluster_listings() {
    let (tracker, client) = setup().await;

    let hosts = client.get_hosts().await.unwrap();
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0].id, 1);
    assert_eq!(hosts[0].name, "mock-store");
    assert_eq!(hosts[0].status, "alive");
    assert_eq!(hosts[0].ip, Some("127.0.0.1".parse().unwrap()));
    assert_eq!(hosts[0].http_port, Some(7500));

    let devices = client.get_devices().await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].id, 1);
    assert_eq!(devices[0].host_id, 1);
    assert_eq!(devices[0].observed_state.as_deref(), Some("writeable"));
    assert_eq!(devices[0].mb_free, Some(1000));

    tracker.add_domain("media");
    let first = tracker.add_file("media", "one", "http://127.0.0.1:1/1.fid", 10);
    let second = tracker.add_file("media", "two", "http://127.0.0.1:1/2.fid", 20);

    let fids = client.list_fids(first, second).await.unwrap();
    assert_eq!(fids.len(), 2);
    assert_eq!(fids[0].fid, first);
    assert_eq!(fids[0].key, "one");
    assert_eq!(fids[1].length, Some(20));

    let fids = client.list_fids(second, second).await.unwrap();
    assert_eq!(fids.len(), 1);
    assert_eq!(fids[0].domain, "media");
}
