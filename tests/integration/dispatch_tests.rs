//! Dispatch layer tests

use crate::support::{html_page, mount_html_probe, test_config, FakeBrowser};
use site_harvest::storage::{DocumentStore, SqliteStore};
use site_harvest::{Dispatcher, Provider, SiteOutcome};
use std::sync::Arc;
use wiremock::MockServer;

async fn site_server() -> MockServer {
    let server = MockServer::start().await;
    mount_html_probe(&server).await;
    server
}

fn browser() -> FakeBrowser {
    let browser = FakeBrowser::new();
    browser.add_page("/", html_page("Home", &["/about"]));
    browser.add_page("/about", html_page("About", &[]));
    browser
}

#[tokio::test]
async fn test_dispatch_crawls_every_provider() {
    let servers = [site_server().await, site_server().await, site_server().await];
    let providers: Vec<Provider> = servers
        .iter()
        .enumerate()
        .map(|(i, server)| Provider::new(format!("biz-{}", i), format!("{}/", server.uri())))
        .collect();

    let browser = browser();
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let dispatcher = Dispatcher::new(
        Arc::new(test_config(1, 10)),
        Arc::new(browser.clone()),
        store.clone(),
    );

    let report = dispatcher.run(providers).await;

    assert_eq!(report.sites.len(), 3);
    assert!(report.failed_units.is_empty());
    assert_eq!(report.abandoned, 0);
    assert!(report
        .sites
        .iter()
        .all(|site| site.outcome == SiteOutcome::Drained && site.stats.crawled == 2));
    assert_eq!(browser.renders().len(), 6);

    for i in 0..3 {
        let doc = store
            .get_document(&format!("biz-{}", i))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.pages.len(), 2);
    }

    let (opened, closed) = browser.contexts();
    assert_eq!(opened, closed);
    assert!(dispatcher.shutdown_handle().is_shutdown());
}

#[tokio::test]
async fn test_empty_provider_list() {
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let dispatcher = Dispatcher::new(
        Arc::new(test_config(1, 10)),
        Arc::new(FakeBrowser::new()),
        store,
    );

    let report = dispatcher.run(Vec::new()).await;
    assert!(report.sites.is_empty());
    assert_eq!(report.abandoned, 0);
}

#[tokio::test]
async fn test_shutdown_before_run_abandons_jobs() {
    let server = site_server().await;
    let providers = vec![
        Provider::new("1", format!("{}/", server.uri())),
        Provider::new("2", format!("{}/", server.uri())),
    ];

    let browser = browser();
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let dispatcher = Dispatcher::new(
        Arc::new(test_config(1, 10)),
        Arc::new(browser.clone()),
        store,
    );
    dispatcher.shutdown_handle().shutdown();

    let report = dispatcher.run(providers).await;
    assert!(report.sites.is_empty());
    assert_eq!(report.abandoned, 2);
    assert!(browser.renders().is_empty());
}

#[tokio::test]
async fn test_browser_failure_fails_units() {
    let server = site_server().await;
    let providers = vec![
        Provider::new("1", format!("{}/", server.uri())),
        Provider::new("2", format!("{}/", server.uri())),
    ];

    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let dispatcher = Dispatcher::new(
        Arc::new(test_config(1, 10)),
        Arc::new(FakeBrowser::broken()),
        store,
    );

    let report = dispatcher.run(providers).await;
    assert!(report.sites.is_empty());
    assert_eq!(report.failed_units.len() + report.abandoned, 2);
    assert!(!report.failed_units.is_empty());
    assert!(report.failed_units[0].business_id.is_some());
}
