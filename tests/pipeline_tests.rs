//! End-to-end behavior of the enrichment pool and the two-stage pipeline,
//! driven through the scripted in-memory renderer.

use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use yc_directory_crawler::crawling::{EnrichmentCoordinator, EnrichmentWorker, PipelineDriver};
use yc_directory_crawler::domain::Record;
use yc_directory_crawler::infrastructure::persistence::read_discovery_csv;
use yc_directory_crawler::test_utils::{
    Fault, ScriptedFactory, ScriptedPage, fast_config, founder_page, listing_page, numbered_cards,
};

fn detail_url(i: usize) -> String {
    format!("https://www.ycombinator.com/companies/company-{i}")
}

fn founder_name(i: usize) -> String {
    format!("Founder {i}")
}

fn detail_page(i: usize) -> String {
    let profile = format!("https://www.linkedin.com/in/founder-{i}");
    founder_page(&[(founder_name(i).as_str(), profile.as_str())])
}

fn records(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| Record::partial(format!("Company {i}"), "S24", "Does things", detail_url(i)))
        .collect()
}

fn coordinator(factory: &ScriptedFactory, workers: usize) -> EnrichmentCoordinator {
    let worker = EnrichmentWorker::new(&fast_config()).unwrap();
    EnrichmentCoordinator::new(Arc::new(factory.clone()), worker, workers)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn output_order_matches_input_regardless_of_completion_order(
        delays in prop::collection::vec(0u64..25, 1..12),
        workers in 1usize..6,
    ) {
        let pages = delays.iter().enumerate().map(|(i, delay)| {
            (detail_url(i), ScriptedPage::fixed(detail_page(i)).with_open_delay(Duration::from_millis(*delay)))
        });
        let factory = ScriptedFactory::new(pages);
        let input = records(delays.len());

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();
        let (output, summary) = runtime.block_on(coordinator(&factory, workers).enrich_all(input.clone()));

        prop_assert_eq!(output.len(), input.len());
        prop_assert_eq!(summary.found, input.len());
        for (i, (before, after)) in input.iter().zip(&output).enumerate() {
            prop_assert_eq!(&before.name, &after.name);
            prop_assert_eq!(&before.detail_url, &after.detail_url);
            prop_assert_eq!(&after.founder_names, &vec![founder_name(i)]);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_pages_do_not_affect_siblings() {
    let factory = ScriptedFactory::new([
        (detail_url(0), ScriptedPage::fixed(detail_page(0))),
        (detail_url(1), ScriptedPage::fixed(detail_page(1)).with_fault(Fault::OpenFails)),
        (detail_url(2), ScriptedPage::fixed(detail_page(2))),
        (detail_url(3), ScriptedPage::fixed(detail_page(3)).with_fault(Fault::PanicOnRead)),
        // 4: no page registered, the renderer answers 404
        (detail_url(5), ScriptedPage::fixed(detail_page(5))),
    ]);

    let (output, summary) = coordinator(&factory, 3).enrich_all(records(6)).await;

    assert_eq!(output.len(), 6);
    for i in [0, 2, 5] {
        assert_eq!(output[i].founder_names, vec![founder_name(i)]);
    }
    for i in [1, 3, 4] {
        assert!(output[i].founder_names.is_empty());
        assert!(output[i].founder_profile_urls.is_empty());
        assert_eq!(output[i].name, format!("Company {i}"));
    }
    assert_eq!(summary.found, 3);
    assert_eq!(summary.failed, 3);
    // every session released, including the panicking one
    assert_eq!(factory.stats.closed(), factory.stats.created());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn never_more_than_w_sessions_open() {
    let pages = (0..20).map(|i| {
        (detail_url(i), ScriptedPage::fixed(detail_page(i)).with_open_delay(Duration::from_millis(30)))
    });
    let factory = ScriptedFactory::new(pages);

    let (output, _) = coordinator(&factory, 5).enrich_all(records(20)).await;

    assert_eq!(output.len(), 20);
    assert!(factory.stats.max_open() <= 5, "max open was {}", factory.stats.max_open());
    assert!(factory.stats.max_open() >= 2);
    assert_eq!(factory.stats.created(), 20);
    assert_eq!(factory.stats.closed(), 20);
}

#[tokio::test]
async fn empty_input_produces_empty_output() {
    let factory = ScriptedFactory::default();
    let (output, summary) = coordinator(&factory, 5).enrich_all(Vec::new()).await;
    assert!(output.is_empty());
    assert_eq!(summary.total, 0);
}

#[tokio::test]
async fn full_run_writes_both_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fast_config();
    config.output.discovery_csv = dir.path().join("startups.csv");
    config.output.enriched_csv = dir.path().join("startups_with_founders.csv");

    let cards = numbered_cards(6);
    let listing = ScriptedPage::frames([
        (1000, listing_page(cards[..3].to_vec())),
        (2000, listing_page(cards.clone())),
        (2000, listing_page(cards.clone())),
    ]);
    let mut pages = vec![(config.site.listing_url.clone(), listing)];
    // company 4 has a page without founders
    pages.extend((0..6).map(|i| {
        let html = if i == 4 { "<html><body><p>Stealth</p></body></html>".to_string() } else { detail_page(i) };
        (detail_url(i), ScriptedPage::fixed(html))
    }));
    let factory = ScriptedFactory::new(pages);

    let driver = PipelineDriver::new(config.clone(), Arc::new(factory.clone()));
    let enriched = driver.run_all(None, Some(2)).await.unwrap();
    driver.shutdown().await;

    assert_eq!(enriched.len(), 6);
    assert_eq!(enriched[0].founder_names, vec!["Founder 0"]);
    assert!(enriched[4].founder_names.is_empty());

    let discovered = read_discovery_csv(&config.output.discovery_csv).await.unwrap();
    assert_eq!(discovered.len(), 6);
    assert_eq!(discovered[5].detail_url, detail_url(5));

    let final_csv = std::fs::read_to_string(&config.output.enriched_csv).unwrap();
    let lines: Vec<&str> = final_csv.lines().collect();
    assert_eq!(lines.len(), 7);
    assert_eq!(
        lines[0],
        "Company Name,Batch,Short Description,Founder Name(s),Founder LinkedIn URL(s)"
    );
    assert_eq!(
        lines[1],
        "Company 0,S24,Does things,Founder 0,https://www.linkedin.com/in/founder-0"
    );
    assert_eq!(lines[5], "Company 4,S24,Does things,,");
    assert_eq!(factory.stats.closed(), factory.stats.created());
}

#[tokio::test]
async fn enrichment_reads_crlf_discovery_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.csv");
    let output = dir.path().join("out.csv");
    std::fs::write(
        &input,
        format!(
            "Company Name,Batch,Short Description,Detail URL\r\n\"Company 0\",S24,\"Does things, fast\",{}\r\n",
            detail_url(0)
        ),
    )
    .unwrap();

    let factory = ScriptedFactory::new([(detail_url(0), ScriptedPage::fixed(detail_page(0)))]);
    let driver = PipelineDriver::new(fast_config(), Arc::new(factory));

    let (records, summary) = driver.enrich_file(&input, None, &output).await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].short_description, "Does things, fast");
    assert_eq!(summary.found, 1);
    assert!(output.exists());
}

#[tokio::test]
async fn listing_navigation_timeout_still_discovers() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("startups.csv");
    let config = fast_config();

    let cards = numbered_cards(4);
    let listing = ScriptedPage::fixed(listing_page(cards)).with_fault(Fault::OpenTimesOut);
    let factory = ScriptedFactory::new([(config.site.listing_url.clone(), listing)]);
    let driver = PipelineDriver::new(config, Arc::new(factory.clone()));

    let report = driver.run_discovery(None, &output).await.unwrap();

    assert_eq!(report.records.len(), 4);
    assert_eq!(read_discovery_csv(&output).await.unwrap().len(), 4);
    assert_eq!(factory.stats.closed(), 1);
}

#[tokio::test]
async fn panic_while_reading_listing_releases_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("startups.csv");
    let config = fast_config();

    let listing = ScriptedPage::fixed(listing_page(numbered_cards(3))).with_fault(Fault::PanicOnRead);
    let factory = ScriptedFactory::new([(config.site.listing_url.clone(), listing)]);
    let driver = PipelineDriver::new(config, Arc::new(factory.clone()));

    let err = driver.run_discovery(None, &output).await.unwrap_err();

    assert!(err.to_string().contains("panicked"));
    assert_eq!(factory.stats.created(), 1);
    assert_eq!(factory.stats.closed(), 1);
    assert!(!output.exists());
}
