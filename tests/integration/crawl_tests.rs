//! Integration tests for the crawl orchestrator
//!
//! These tests use wiremock to serve list and detail pages and run the
//! built-in site strategies end-to-end against a temporary data directory.

use chrono::{NaiveDate, Utc};
use faq_harvest::config::{
    BackoffStrategy, Config, CrawlerConfig, OutputConfig, SourceConfig, UserAgentConfig,
};
use faq_harvest::crawler::{CrawlMode, Orchestrator, Pacer};
use faq_harvest::record::{Answer, RecordDraft, Source};
use faq_harvest::sources::{BliStrategy, MolStrategy, OshaStrategy};
use faq_harvest::storage::{IndexManager, RecordStore};
use faq_harvest::CrawlPhase;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration writing into `data_dir`
fn create_test_config(data_dir: &TempDir, source: &str, list_url: &str) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_attempts: 2,
            retry_delay_ms: 10,
            backoff: BackoffStrategy::Fixed,
            min_interval_ms: 1, // Very short for testing
            max_retry_after_secs: 1,
            ..CrawlerConfig::default()
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestHarvester".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            data_dir: data_dir.path().display().to_string(),
            sync_writes: false,
        },
        sources: vec![SourceConfig {
            name: source.to_string(),
            navigation: None,
            list_url: list_url.to_string(),
            base_url: None,
            max_pages: None,
            max_depth: None,
            path_filter: None,
            accept_invalid_certs: false,
        }],
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A MOL list table; rows are (detail path, title, updated date)
fn mol_list(rows: &[(&str, &str, &str)]) -> String {
    let mut html = String::from(
        "<html><body><table><tr><th>項次</th><th>標題</th><th>次分類</th>\
         <th>發布單位</th><th>發布日期</th><th>更新日期</th></tr>",
    );
    for (i, (href, title, updated)) in rows.iter().enumerate() {
        html.push_str(&format!(
            "<tr><td>{}</td><td><a href=\"{}\">{}</a></td><td>工時</td>\
             <td>勞動條件及就業平等司</td><td>2025-01-01</td><td>{}</td></tr>",
            i + 1,
            href,
            title,
            updated
        ));
    }
    html.push_str("</table></body></html>");
    html
}

fn mol_detail(question: &str, answer: &str) -> String {
    format!(
        "<html><body><article><h2>{}</h2><table><tr><th>答案</th>\
         <td><p>{}</p></td></tr></table></article></body></html>",
        question, answer
    )
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

async fn mount_mol_list(server: &MockServer, page: &str, body: String) {
    Mock::given(method("GET"))
        .and(path("/faq/list"))
        .and(query_param("page", page))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn mol_orchestrator(config: &Config, server: &MockServer) -> Orchestrator<MolStrategy> {
    let strategy = MolStrategy::new(
        format!("{}/faq/list?page={{page}}", server.uri()),
        Url::parse(&server.uri()).unwrap(),
    );
    Orchestrator::from_config(config, strategy, false).unwrap()
}

#[tokio::test]
async fn test_incremental_crawl_skips_items_before_watermark() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "mol", &format!("{}/faq/list?page={{page}}", server.uri()));

    // Seed the store with a record updated 2025-09-01
    {
        let mut store = RecordStore::open(dir.path()).unwrap().with_sync_writes(false);
        let index = IndexManager::new(&store);
        let mut draft = RecordDraft::new(Source::Mol, "舊問題", format!("{}/q/0", server.uri()));
        draft.answer = Answer::new("舊答案", "");
        draft.updated_date = Some(date(2025, 9, 1));
        store
            .append(&draft.into_record("mol_faq_20250901_0001", Utc::now()).unwrap())
            .unwrap();
        index.rebuild_index(Source::Mol).unwrap();
        let mut metadata = index.load_metadata(Source::Mol);
        metadata.crawl_watermark = Some(date(2025, 9, 1));
        index.save_metadata(Source::Mol, &metadata).unwrap();
    }

    mount_mol_list(
        &server,
        "1",
        mol_list(&[
            ("/q/1", "八月的問題", "2025-08-15"),
            ("/q/2", "九月的問題", "2025-09-10"),
        ]),
    )
    .await;
    mount_mol_list(&server, "2", mol_list(&[])).await;

    Mock::given(method("GET"))
        .and(path("/q/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(mol_detail("八月的問題", "不應抓取")))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/q/2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(mol_detail("九月的問題", "新答案")))
        .expect(1)
        .mount(&server)
        .await;

    let mut orchestrator = mol_orchestrator(&config, &server);
    let summary = orchestrator.run(CrawlMode::Incremental).await.unwrap();

    assert_eq!(summary.cutoff, Some(date(2025, 9, 1)));
    assert_eq!(summary.stats.discovered, 2);
    assert_eq!(summary.stats.skipped_by_cutoff, 1);
    assert_eq!(summary.stats.fetched, 1);
    assert_eq!(summary.stats.appended, 1);
    assert!(!summary.degraded);
    assert_eq!(orchestrator.phase(), CrawlPhase::Done);

    let metadata = summary.metadata.unwrap();
    assert_eq!(metadata.total_count, 2);
    assert_eq!(metadata.watermark(), Some(date(2025, 9, 10)));
    assert!(metadata.last_crawl_completed_at.is_some());

    let positions = orchestrator
        .index()
        .query_by_date(Source::Mol, date(2025, 9, 10))
        .unwrap();
    assert_eq!(positions.len(), 1);
    let record = orchestrator
        .store()
        .read_at(Source::Mol, positions[0])
        .unwrap()
        .unwrap();
    assert_eq!(record.id(), "mol_faq_20250910_0001");
    assert_eq!(record.answer().text, "新答案");
    assert_eq!(record.category(), "工時");
}

#[tokio::test]
async fn test_full_recrawl_of_unchanged_source_appends_nothing() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "mol", &format!("{}/faq/list?page={{page}}", server.uri()));

    mount_mol_list(
        &server,
        "1",
        mol_list(&[("/q/1", "問題一", "2025-09-01"), ("/q/2", "問題二", "2025-09-01")]),
    )
    .await;
    mount_mol_list(&server, "2", mol_list(&[])).await;
    mount_page(&server, "/q/1", mol_detail("問題一", "答案一")).await;
    mount_page(&server, "/q/2", mol_detail("問題二", "答案二")).await;

    let mut orchestrator = mol_orchestrator(&config, &server);
    let first = orchestrator.run(CrawlMode::Full).await.unwrap();
    assert_eq!(first.stats.appended, 2);

    let second = orchestrator.run(CrawlMode::Full).await.unwrap();
    assert_eq!(second.cutoff, None);
    assert_eq!(second.stats.fetched, 2);
    assert_eq!(second.stats.appended, 0);
    assert_eq!(second.stats.duplicates, 2);
    assert!(!second.degraded);

    let store = orchestrator.store();
    assert_eq!(store.line_count(Source::Mol).unwrap(), 2);
    let ids: Vec<String> = store
        .read_all(Source::Mol)
        .unwrap()
        .iter()
        .map(|r| r.id().to_string())
        .collect();
    assert_eq!(ids, vec!["mol_faq_20250901_0001", "mol_faq_20250901_0002"]);

    // The watermark never moves backwards
    let first_done = first.metadata.unwrap().last_crawl_completed_at;
    let second_done = second.metadata.unwrap().last_crawl_completed_at;
    assert!(second_done >= first_done);
}

#[tokio::test]
async fn test_updated_item_supersedes_stored_version() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "mol", &format!("{}/faq/list?page={{page}}", server.uri()));

    mount_mol_list(&server, "1", mol_list(&[("/q/1", "問題一", "2025-09-01")])).await;
    mount_mol_list(&server, "2", mol_list(&[])).await;
    mount_page(&server, "/q/1", mol_detail("問題一", "舊答案")).await;

    let mut orchestrator = mol_orchestrator(&config, &server);
    orchestrator.run(CrawlMode::Incremental).await.unwrap();

    // The site revises the answer
    server.reset().await;
    mount_mol_list(&server, "1", mol_list(&[("/q/1", "問題一", "2025-10-01")])).await;
    mount_mol_list(&server, "2", mol_list(&[])).await;
    mount_page(&server, "/q/1", mol_detail("問題一", "新答案")).await;

    let summary = orchestrator.run(CrawlMode::Incremental).await.unwrap();
    assert_eq!(summary.cutoff, Some(date(2025, 9, 1)));
    assert_eq!(summary.stats.appended, 1);

    let store = orchestrator.store();
    assert_eq!(store.line_count(Source::Mol).unwrap(), 2);

    let current = store.current_records(Source::Mol).unwrap();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].id(), "mol_faq_20250901_0001");
    assert_eq!(current[0].answer().text, "新答案");

    let position = orchestrator
        .index()
        .query_by_id(Source::Mol, "mol_faq_20250901_0001")
        .unwrap()
        .unwrap();
    assert_eq!(position.line, 2);
}

#[tokio::test]
async fn test_failures_are_counted_and_partial_results_kept() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "mol", &format!("{}/faq/list?page={{page}}", server.uri()));

    mount_mol_list(
        &server,
        "1",
        mol_list(&[
            ("/q/1", "找不到", "2025-09-01"),
            ("/q/2", "版面壞了", "2025-09-02"),
            ("/q/3", "正常", "2025-09-03"),
        ]),
    )
    .await;
    mount_mol_list(&server, "2", mol_list(&[])).await;

    Mock::given(method("GET"))
        .and(path("/q/1"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/q/2", "<html><body><p>維護中</p></body></html>".to_string()).await;
    mount_page(&server, "/q/3", mol_detail("正常", "正常答案")).await;

    let mut orchestrator = mol_orchestrator(&config, &server);
    let summary = orchestrator.run(CrawlMode::Full).await.unwrap();

    assert_eq!(summary.stats.discovered, 3);
    assert_eq!(summary.stats.network_failures, 1);
    assert_eq!(summary.stats.parse_failures, 1);
    assert_eq!(summary.stats.parsed, 1);
    assert_eq!(summary.stats.appended, 1);
    assert!(summary.degraded);
    assert_eq!(orchestrator.store().count(Source::Mol).unwrap(), 1);
}

#[tokio::test]
async fn test_failed_item_is_fetched_again_next_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "mol", &format!("{}/faq/list?page={{page}}", server.uri()));
    let listed = mol_list(&[("/q/1", "暫時失敗", "2025-09-01"), ("/q/2", "正常", "2025-09-10")]);

    mount_mol_list(&server, "1", listed.clone()).await;
    mount_mol_list(&server, "2", mol_list(&[])).await;
    Mock::given(method("GET"))
        .and(path("/q/1"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;
    mount_page(&server, "/q/2", mol_detail("正常", "正常答案")).await;

    let mut orchestrator = mol_orchestrator(&config, &server);
    let first = orchestrator.run(CrawlMode::Incremental).await.unwrap();
    assert_eq!(first.stats.network_failures, 1);
    assert_eq!(first.stats.appended, 1);

    // The newer item is stored, but the watermark stays below the failed one
    let metadata = first.metadata.unwrap();
    assert_eq!(metadata.latest_updated, Some(date(2025, 9, 10)));
    assert_eq!(metadata.watermark(), Some(date(2025, 8, 31)));

    server.reset().await;
    mount_mol_list(&server, "1", listed).await;
    mount_mol_list(&server, "2", mol_list(&[])).await;
    Mock::given(method("GET"))
        .and(path("/q/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(mol_detail("暫時失敗", "恢復了")))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/q/2", mol_detail("正常", "正常答案")).await;

    let second = orchestrator.run(CrawlMode::Incremental).await.unwrap();
    assert_eq!(second.cutoff, Some(date(2025, 8, 31)));
    assert_eq!(second.stats.skipped_by_cutoff, 0);
    assert_eq!(second.stats.appended, 1);
    assert_eq!(second.stats.duplicates, 1);
    assert_eq!(second.metadata.unwrap().watermark(), Some(date(2025, 9, 10)));

    let current = orchestrator.store().current_records(Source::Mol).unwrap();
    assert_eq!(current.len(), 2);
    assert!(current.iter().any(|r| r.answer().text == "恢復了"));
}

#[tokio::test]
async fn test_pagination_stops_when_site_ignores_page_number() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "mol", &format!("{}/faq/list?page={{page}}", server.uri()));

    // Every page number gets the same list
    Mock::given(method("GET"))
        .and(path("/faq/list"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(mol_list(&[("/q/1", "問題一", "2025-09-01")])),
        )
        .expect(2)
        .mount(&server)
        .await;
    mount_page(&server, "/q/1", mol_detail("問題一", "答案一")).await;

    let mut orchestrator = mol_orchestrator(&config, &server);
    let summary = orchestrator.run(CrawlMode::Full).await.unwrap();

    assert_eq!(summary.stats.discovered, 1);
    assert_eq!(summary.stats.appended, 1);
    assert_eq!(summary.stats.in_run_duplicates, 0);
}

#[tokio::test]
async fn test_failed_first_list_page_ends_run_cleanly() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "mol", &format!("{}/faq/list?page={{page}}", server.uri()));

    Mock::given(method("GET"))
        .and(path("/faq/list"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let mut orchestrator = mol_orchestrator(&config, &server);
    let summary = orchestrator.run(CrawlMode::Incremental).await.unwrap();

    assert_eq!(summary.stats.list_failures, 1);
    assert_eq!(summary.stats.network_failures, 1);
    assert_eq!(summary.stats.discovered, 0);
    assert!(!summary.degraded);
    assert_eq!(summary.metadata.unwrap().total_count, 0);
}

#[tokio::test]
async fn test_dry_run_fetches_no_details_and_writes_nothing() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "mol", &format!("{}/faq/list?page={{page}}", server.uri()));

    mount_mol_list(&server, "1", mol_list(&[("/q/1", "問題一", "2025-09-01")])).await;
    mount_mol_list(&server, "2", mol_list(&[])).await;
    Mock::given(method("GET"))
        .and(path("/q/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(mol_detail("問題一", "答案一")))
        .expect(0)
        .mount(&server)
        .await;

    let mut orchestrator = mol_orchestrator(&config, &server).with_dry_run(true);
    let summary = orchestrator.run(CrawlMode::Full).await.unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.stats.discovered, 1);
    assert_eq!(summary.stats.fetched, 0);
    assert!(summary.metadata.is_none());
    assert!(!summary.degraded);
    assert_eq!(orchestrator.store().line_count(Source::Mol).unwrap(), 0);
}

fn bli_tree(base: &str) -> String {
    format!(
        r#"<html><body><div class="content"><ul class="multilevel-list">
             <li><a href="javascript:void(0)">勞工保險</a>
               <ul>
                 <li><a href="javascript:void(0)">加保</a>
                   <ul><li><a href="{base}/faq/1.html">到職當日如何加保?</a></li></ul>
                 </li>
                 <li><a href="{base}/faq/2.html">保費怎麼算?</a></li>
                 <li><a href="{base}/faq/1.html">到職當日如何加保?</a></li>
               </ul>
             </li>
           </ul></div></body></html>"#,
        base = base
    )
}

fn bli_detail(question: &str, answer: &str, updated: &str) -> String {
    format!(
        r#"<html><body><h1>{}</h1><div class="main"><p>{}</p></div>
           <div class="info">更新日期：{}</div></body></html>"#,
        question, answer, updated
    )
}

#[tokio::test]
async fn test_tree_traversal_indexes_both_category_levels() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let list_url = format!("{}/faq/index.html", server.uri());
    let config = create_test_config(&dir, "bli", &list_url);

    mount_page(&server, "/faq/index.html", bli_tree(&server.uri())).await;
    mount_page(&server, "/faq/1.html", bli_detail("到職當日如何加保?", "當日申報。", "2025-09-10")).await;
    mount_page(&server, "/faq/2.html", bli_detail("保費怎麼算?", "依投保薪資。", "2025-09-10")).await;

    let strategy = BliStrategy::new(list_url, Url::parse(&server.uri()).unwrap(), 5);
    let mut orchestrator = Orchestrator::from_config(&config, strategy, false).unwrap();
    let summary = orchestrator.run(CrawlMode::Incremental).await.unwrap();

    assert_eq!(summary.stats.list_pages, 1);
    assert_eq!(summary.stats.discovered, 3);
    assert_eq!(summary.stats.in_run_duplicates, 1);
    assert_eq!(summary.stats.appended, 2);

    let index = orchestrator.index();
    assert_eq!(index.query_by_category(Source::Bli, "勞工保險").unwrap().len(), 2);
    assert_eq!(
        index
            .query_by_category(Source::Bli, "勞工保險 > 加保")
            .unwrap()
            .len(),
        1
    );
    assert_eq!(index.query_by_date(Source::Bli, date(2025, 9, 10)).unwrap().len(), 2);
    assert!(index
        .query_by_category(Source::Bli, "不存在")
        .unwrap()
        .is_empty());

    let last = orchestrator.store().last_record(Source::Bli).unwrap().unwrap();
    assert_eq!(last.id(), "bli_faq_20250910_0002");
    assert_eq!(last.question(), "保費怎麼算?");
}

#[tokio::test]
async fn test_detail_date_decides_when_list_has_none() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let list_url = format!("{}/faq/index.html", server.uri());
    let config = create_test_config(&dir, "bli", &list_url);

    mount_page(&server, "/faq/index.html", bli_tree(&server.uri())).await;
    mount_page(&server, "/faq/1.html", bli_detail("到職當日如何加保?", "當日申報。", "2025-09-10")).await;
    mount_page(&server, "/faq/2.html", bli_detail("保費怎麼算?", "依投保薪資。", "2025-09-10")).await;

    let strategy = BliStrategy::new(list_url.clone(), Url::parse(&server.uri()).unwrap(), 5);
    let mut orchestrator = Orchestrator::from_config(&config, strategy, false).unwrap();
    orchestrator.run(CrawlMode::Incremental).await.unwrap();

    // Nothing changed on the site: both details are fetched, both are at the watermark
    let summary = orchestrator.run(CrawlMode::Incremental).await.unwrap();
    assert_eq!(summary.cutoff, Some(date(2025, 9, 10)));
    assert_eq!(summary.stats.fetched, 2);
    assert_eq!(summary.stats.skipped_by_cutoff, 2);
    assert_eq!(summary.stats.appended, 0);
    assert!(!summary.degraded);
}

#[tokio::test]
async fn test_run_crawl_from_config() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "mol", &format!("{}/faq/list?page={{page}}", server.uri()));

    mount_mol_list(&server, "1", mol_list(&[("/q/1", "問題一", "2025-09-01")])).await;
    mount_mol_list(&server, "2", mol_list(&[])).await;
    mount_page(&server, "/q/1", mol_detail("問題一", "答案一")).await;

    let pacer = Arc::new(Pacer::new(Duration::from_millis(1)));
    let summary =
        faq_harvest::crawler::run_crawl(&config, Source::Mol, CrawlMode::Incremental, false, &pacer)
            .await
            .unwrap();
    assert_eq!(summary.source, Source::Mol);
    assert_eq!(summary.stats.appended, 1);

    let store = RecordStore::open(dir.path()).unwrap();
    assert_eq!(store.count(Source::Mol).unwrap(), 1);
    assert!(store.record_path(Source::Mol).ends_with("mol_faq/raw.jsonl"));

    // A source missing from the configuration is a configuration error
    assert!(
        faq_harvest::crawler::run_crawl(&config, Source::Osha, CrawlMode::Full, false, &pacer)
            .await
            .is_err()
    );
}

fn osha_node(links: &[(&str, &str)], posts: &[(&str, &str, &str)]) -> String {
    let mut html = String::from("<html><body><div class=\"page_content\">");
    for (href, label) in links {
        html.push_str(&format!("<a href=\"{}\">{}</a>", href, label));
    }
    for (href, title, updated) in posts {
        html.push_str(&format!(
            "<div class=\"item\"><div class=\"title\"><a href=\"{}\">{}</a></div>\
             <div class=\"meta\">發布單位：綜合規劃組 發布日期：2024-03-01 更新日期：{}</div></div>",
            href, title, updated
        ));
    }
    html.push_str("</div></body></html>");
    html
}

fn osha_detail(question: &str, answer: &str) -> String {
    format!(
        "<html><body><main><h2>{}</h2><ol><li>{}</li><li>依職業安全衛生法辦理。</li></ol></main></body></html>",
        question, answer
    )
}

#[tokio::test]
async fn test_tree_continues_past_failed_node() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let list_url = format!("{}/osha/100/nodelist", server.uri());
    let config = create_test_config(&dir, "osha_faq", &list_url);

    mount_page(
        &server,
        "/osha/100/nodelist",
        osha_node(
            &[
                ("/osha/100/200/nodelist", "危害預防"),
                ("/osha/100/300/lpsimplelist", "職業病"),
                ("/osha/100/400/nodelist", "法規查詢"),
            ],
            &[],
        ),
    )
    .await;
    // The second category links back to the first one
    Mock::given(method("GET"))
        .and(path("/osha/100/200/nodelist"))
        .respond_with(ResponseTemplate::new(200).set_body_string(osha_node(
            &[],
            &[("/osha/100/200/1/post", "何謂職業災害?", "2025-09-10")],
        )))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/osha/100/300/lpsimplelist",
        osha_node(
            &[("/osha/100/200/nodelist", "危害預防")],
            &[("/osha/100/300/1/post", "職業病如何認定?", "2025-09-12")],
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/osha/100/400/nodelist"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;
    mount_page(&server, "/osha/100/200/1/post", osha_detail("何謂職業災害?", "因執行職務所致。")).await;
    mount_page(&server, "/osha/100/300/1/post", osha_detail("職業病如何認定?", "由認定委員會審查。")).await;

    let strategy = OshaStrategy::new(list_url, Url::parse(&server.uri()).unwrap(), 5);
    let mut orchestrator = Orchestrator::from_config(&config, strategy, false).unwrap();
    let summary = orchestrator.run(CrawlMode::Incremental).await.unwrap();

    assert_eq!(summary.stats.list_failures, 1);
    assert_eq!(summary.stats.network_failures, 1);
    assert_eq!(summary.stats.list_pages, 3);
    assert_eq!(summary.stats.discovered, 2);
    assert_eq!(summary.stats.appended, 2);
    assert!(!summary.degraded);

    // Whatever the failed node lists is unknown, so the watermark does not move
    let metadata = summary.metadata.unwrap();
    assert_eq!(metadata.latest_updated, Some(date(2025, 9, 12)));
    assert_eq!(metadata.watermark(), None);

    let index = orchestrator.index();
    assert_eq!(index.query_by_category(Source::Osha, "危害預防").unwrap().len(), 1);
    assert_eq!(index.query_by_category(Source::Osha, "職業病").unwrap().len(), 1);
    assert!(index
        .query_by_category(Source::Osha, "法規查詢")
        .unwrap()
        .is_empty());
}
