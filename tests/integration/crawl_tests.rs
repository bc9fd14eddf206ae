//! Site controller tests

use crate::support::{html_page, mount_html_probe, test_config, FakeBrowser};
use site_harvest::config::Config;
use site_harvest::storage::{DocumentStore, SqliteStore, UpsertPipeline};
use site_harvest::{HarvestError, Provider, SiteCrawler, SiteOutcome, SiteReport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn crawl(
    config: Config,
    browser: &FakeBrowser,
    store: Arc<SqliteStore>,
    provider: &Provider,
) -> Result<SiteReport, HarvestError> {
    let config = Arc::new(config);
    let pipeline = UpsertPipeline::new(store, &config.store);
    let crawler = SiteCrawler::new(config, Arc::new(browser.clone()), pipeline);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    crawler.run_site(provider, shutdown_rx).await
}

fn provider(server: &MockServer) -> Provider {
    Provider::new("biz-1", format!("{}/", server.uri()))
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let server = MockServer::start().await;
    mount_html_probe(&server).await;

    let browser = FakeBrowser::new();
    browser.add_page(
        "/",
        html_page(
            "Home",
            &["/a", "/b", "/c", "http://other.com/x", "/brochure.pdf"],
        ),
    );
    for p in ["/a", "/b", "/c"] {
        browser.add_page(p, html_page(p, &["/", "/a", "/b", "/c", "/deeper"]));
    }
    browser.add_page("/deeper", html_page("Deeper", &[]));

    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let report = crawl(test_config(1, 10), &browser, store.clone(), &provider(&server))
        .await
        .unwrap();

    assert_eq!(report.outcome, SiteOutcome::Drained);
    assert_eq!(browser.sorted_renders(), vec!["/", "/a", "/b", "/c"]);
    assert_eq!(report.stats.crawled, 4);
    assert_eq!(report.stats.discovered, 4);
    assert_eq!(report.stats.rendered, 4);
    assert_eq!(report.stats.new_pages, 4);
    assert_eq!(report.stats.deepest, 1);

    let doc = store.get_document("biz-1").await.unwrap().unwrap();
    assert_eq!(doc.pages.len(), 4);
    assert!(doc.pages.iter().all(|p| !p.url.contains("other.com")));
    let home = doc.page(&format!("{}/", server.uri())).unwrap();
    assert_eq!(home.title, "Probe");
    assert!(home.content.contains("Welcome to Home"));
    assert_eq!(home.pdf_urls.len(), 1);
    assert!(home.pdf_urls[0].ends_with("/brochure.pdf"));

    let (opened, closed) = browser.contexts();
    assert_eq!(opened, closed);
}

#[tokio::test]
async fn test_at_most_one_fetch_per_url() {
    let server = MockServer::start().await;
    mount_html_probe(&server).await;

    let variants = [
        "/a",
        "/a/",
        "/a?utm_source=mail",
        "/a#top",
        "/b",
        "/b?gclid=1",
        "/c//",
        "/",
    ];
    let browser = FakeBrowser::new();
    browser.add_page("/", html_page("Home", &variants));
    for p in ["/a", "/a/", "/b", "/c", "/c//"] {
        browser.add_page(p, html_page(p, &variants));
    }

    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let report = crawl(test_config(3, 100), &browser, store, &provider(&server))
        .await
        .unwrap();

    assert_eq!(report.outcome, SiteOutcome::Drained);
    assert_eq!(browser.renders().len(), 4);
    assert_eq!(browser.render_count("/"), 1);
    assert_eq!(
        browser.render_count("/a") + browser.render_count("/a/"),
        1
    );
    assert_eq!(browser.render_count("/b"), 1);
    assert_eq!(report.stats.crawled, 4);
}

#[tokio::test]
async fn test_depth_ceiling() {
    let server = MockServer::start().await;
    mount_html_probe(&server).await;

    let browser = FakeBrowser::new();
    browser.add_page("/", html_page("Home", &["/1"]));
    browser.add_page("/1", html_page("One", &["/2"]));
    browser.add_page("/2", html_page("Two", &["/3"]));
    browser.add_page("/3", html_page("Three", &["/4"]));

    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let report = crawl(test_config(2, 100), &browser, store, &provider(&server))
        .await
        .unwrap();

    assert_eq!(browser.renders(), vec!["/", "/1", "/2"]);
    assert_eq!(report.stats.deepest, 2);
}

#[tokio::test]
async fn test_page_ceiling() {
    let server = MockServer::start().await;
    mount_html_probe(&server).await;

    let links: Vec<String> = (0..10).map(|i| format!("/p{}", i)).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();

    let browser = FakeBrowser::new();
    browser.add_page("/", html_page("Home", &link_refs));
    for link in &links {
        browser.add_page(link, html_page(link, &link_refs));
    }

    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let report = crawl(test_config(3, 4), &browser, store, &provider(&server))
        .await
        .unwrap();

    assert_eq!(report.outcome, SiteOutcome::Drained);
    assert_eq!(browser.renders().len(), 4);
    assert_eq!(report.stats.discovered, 4);
}

#[tokio::test]
async fn test_recrawl_is_idempotent() {
    let server = MockServer::start().await;
    mount_html_probe(&server).await;

    let browser = FakeBrowser::new();
    browser.add_page("/", html_page("Home", &["/a"]));
    browser.add_page("/a", html_page("A", &[]));

    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let first = crawl(test_config(1, 10), &browser, store.clone(), &provider(&server))
        .await
        .unwrap();
    assert_eq!(first.stats.new_pages, 2);
    let before = store.get_document("biz-1").await.unwrap().unwrap();

    let second = crawl(test_config(1, 10), &browser, store.clone(), &provider(&server))
        .await
        .unwrap();
    assert_eq!(second.stats.new_pages, 0);
    assert_eq!(second.stats.unchanged_pages, 2);

    let after = store.get_document("biz-1").await.unwrap().unwrap();
    assert_eq!(after.pages.len(), 2);
    assert_eq!(after.pages, before.pages);
    assert_eq!(after.refresh_pages_time, before.refresh_pages_time);
}

#[tokio::test]
async fn test_changed_page_is_rewritten() {
    let server = MockServer::start().await;
    mount_html_probe(&server).await;

    let browser = FakeBrowser::new();
    browser.add_page("/", html_page("Home", &[]));

    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    crawl(test_config(0, 10), &browser, store.clone(), &provider(&server))
        .await
        .unwrap();

    browser.add_page("/", html_page("Home, now open on Sundays", &[]));
    let report = crawl(test_config(0, 10), &browser, store.clone(), &provider(&server))
        .await
        .unwrap();
    assert_eq!(report.stats.changed_pages, 1);

    let doc = store.get_document("biz-1").await.unwrap().unwrap();
    assert_eq!(doc.pages.len(), 1);
    assert!(doc.pages[0].content.contains("Sundays"));
}

#[tokio::test]
async fn test_failed_fetch_counts_and_keeps_crawling() {
    let server = MockServer::start().await;
    mount_html_probe(&server).await;

    let browser = FakeBrowser::new();
    browser.add_page("/", html_page("Home", &["/missing", "/ok"]));
    browser.add_page("/ok", html_page("Ok", &[]));

    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let report = crawl(test_config(1, 10), &browser, store.clone(), &provider(&server))
        .await
        .unwrap();

    assert_eq!(report.outcome, SiteOutcome::Drained);
    assert_eq!(report.stats.crawled, 3);
    assert_eq!(report.stats.failed, 1);
    assert_eq!(report.stats.rendered, 2);
    assert_eq!(browser.render_count("/missing"), 1);

    let doc = store.get_document("biz-1").await.unwrap().unwrap();
    assert_eq!(doc.pages.len(), 2);
}

#[tokio::test]
async fn test_non_html_url_is_not_rendered() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/menu"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF-1.4", "application/pdf"))
        .mount(&server)
        .await;
    mount_html_probe(&server).await;

    let browser = FakeBrowser::new();
    browser.add_page("/", html_page("Home", &["/menu"]));

    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let report = crawl(test_config(1, 10), &browser, store, &provider(&server))
        .await
        .unwrap();

    assert_eq!(browser.renders(), vec!["/"]);
    assert_eq!(report.stats.crawled, 2);
    assert_eq!(report.stats.skipped, 1);
}

#[tokio::test]
async fn test_error_status_link_is_not_stored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(
            ResponseTemplate::new(404).set_body_raw("<title>Not Found</title>", "text/html"),
        )
        .mount(&server)
        .await;
    mount_html_probe(&server).await;

    let browser = FakeBrowser::new();
    browser.add_page("/", html_page("Home", &["/gone"]));
    browser.add_page("/gone", html_page("Not Found", &[]));

    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let report = crawl(test_config(1, 10), &browser, store.clone(), &provider(&server))
        .await
        .unwrap();

    assert_eq!(browser.renders(), vec!["/"]);
    assert_eq!(report.stats.crawled, 2);
    assert_eq!(report.stats.failed, 1);

    let doc = store.get_document("biz-1").await.unwrap().unwrap();
    assert_eq!(doc.pages.len(), 1);
    assert!(doc.pages.iter().all(|page| !page.url.ends_with("/gone")));
}

#[tokio::test]
async fn test_unreachable_site_still_gets_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let browser = FakeBrowser::new();
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let mut provider = provider(&server);
    provider
        .fields
        .insert("state".to_string(), serde_json::Value::from("TX"));

    let report = crawl(test_config(1, 10), &browser, store.clone(), &provider)
        .await
        .unwrap();

    assert_eq!(report.stats.failed, 1);
    assert!(browser.renders().is_empty());
    let doc = store.get_document("biz-1").await.unwrap().unwrap();
    assert!(doc.pages.is_empty());
    assert_eq!(doc.fields["state"], "TX");
}

#[tokio::test]
async fn test_robots_disallowed_urls_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"))
        .mount(&server)
        .await;
    mount_html_probe(&server).await;

    let browser = FakeBrowser::new();
    browser.add_page("/", html_page("Home", &["/private/staff", "/open"]));
    browser.add_page("/open", html_page("Open", &[]));
    browser.add_page("/private/staff", html_page("Staff", &[]));

    let mut config = test_config(1, 10);
    config.crawler.respect_robots = true;

    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let report = crawl(config, &browser, store, &provider(&server))
        .await
        .unwrap();

    assert_eq!(browser.sorted_renders(), vec!["/", "/open"]);
    assert_eq!(report.stats.skipped, 1);
    assert_eq!(report.stats.crawled, 3);
}

#[tokio::test]
async fn test_site_timeout() {
    let server = MockServer::start().await;
    mount_html_probe(&server).await;

    let links: Vec<String> = (0..30).map(|i| format!("/slow{}", i)).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();

    let browser = FakeBrowser::slow(Duration::from_millis(200));
    browser.add_page("/", html_page("Home", &link_refs));
    for link in &links {
        browser.add_page(link, html_page(link, &[]));
    }

    let mut config = test_config(1, 100);
    config.crawler.workers_per_site = 1;
    config.crawler.batch_size = 1;
    config.crawler.site_timeout_secs = 1;

    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let report = crawl(config, &browser, store.clone(), &provider(&server))
        .await
        .unwrap();

    assert_eq!(report.outcome, SiteOutcome::TimedOut);
    assert!(report.stats.crawled < 31);
    assert!(report.elapsed < Duration::from_secs(5));

    let doc = store.get_document("biz-1").await.unwrap().unwrap();
    assert!(!doc.pages.is_empty());
    let (opened, closed) = browser.contexts();
    assert_eq!(opened, closed);
}

#[tokio::test]
async fn test_shutdown_stops_site() {
    let server = MockServer::start().await;
    mount_html_probe(&server).await;

    let links: Vec<String> = (0..30).map(|i| format!("/slow{}", i)).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();

    let browser = FakeBrowser::slow(Duration::from_millis(100));
    browser.add_page("/", html_page("Home", &link_refs));

    let mut config = test_config(1, 100);
    config.crawler.workers_per_site = 1;
    config.crawler.batch_size = 1;

    let config = Arc::new(config);
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let pipeline = UpsertPipeline::new(store, &config.store);
    let crawler = SiteCrawler::new(config, Arc::new(browser.clone()), pipeline);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(400)).await;
        shutdown_tx.send_replace(true);
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let report = crawler
        .run_site(&provider(&server), shutdown_rx)
        .await
        .unwrap();
    assert_eq!(report.outcome, SiteOutcome::ShutdownRequested);
    assert!(report.stats.crawled < 31);
}

#[tokio::test]
async fn test_browser_launch_failure_is_fatal() {
    let server = MockServer::start().await;
    mount_html_probe(&server).await;

    let browser = FakeBrowser::broken();
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let result = crawl(test_config(1, 10), &browser, store, &provider(&server)).await;

    assert!(matches!(result, Err(HarvestError::Browser(_))));
}
