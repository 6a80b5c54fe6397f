use std::sync::Arc;
use std::time::Duration;

use supercat_core::{
    Brand, BrandThresholds, CatalogStore, CategoryMapperSettings, CategoryTables, JobAction,
    MappingMethod, MemoryCatalog, ScrapeJob,
};

use super::*;
use crate::evidence::MemoryEvidenceSink;
use crate::fixture::FixtureProvider;
use crate::test_pages::{vtex_category, vtex_home, vtex_listing, Card, JUMBO};

fn settings() -> JobSettings {
    JobSettings {
        crawl: CrawlOptions {
            max_pages: 5,
            page_timeout: Duration::from_secs(5),
            inter_request_delay: Duration::ZERO,
            wait_timeout: Duration::from_millis(10),
            fetch_product_details: false,
        },
        brand_thresholds: BrandThresholds::default(),
        category: CategoryMapperSettings::default(),
    }
}

fn catalog() -> Arc<MemoryCatalog> {
    let tables = CategoryTables::builtin().unwrap();
    Arc::new(MemoryCatalog::with_reference_data(
        vec![
            Brand::new("La Serenísima"),
            Brand::new("Coca-Cola"),
            Brand::new("Sancor"),
        ],
        tables.seed_categories(),
    ))
}

fn processor(catalog: &Arc<MemoryCatalog>, pages: &Arc<FixtureProvider>) -> JobProcessor {
    JobProcessor::new(
        catalog.clone(),
        pages.clone(),
        Arc::new(CategoryTables::builtin().unwrap()),
        settings(),
    )
}

fn lacteos_job(action: JobAction) -> ScrapeJob {
    ScrapeJob::for_category(
        "jumbo",
        action,
        &format!("{JUMBO}/lacteos"),
        vec!["Lácteos".to_string()],
    )
}

#[tokio::test]
async fn discover_maps_every_category_and_queues_unknown_ones() {
    let pages = Arc::new(FixtureProvider::new().with_page(
        JUMBO,
        &vtex_home(&[
            ("/lacteos", "Lácteos"),
            ("/snacks-saludables", "Snacks Saludables"),
            ("/ofertas", "Ofertas"),
        ]),
    ));
    let catalog = catalog();
    let jobs = processor(&catalog, &pages);

    let result = jobs.process(&ScrapeJob::discover("jumbo")).await.unwrap();

    assert!(result.is_clean(), "{:?}", result.errors);
    assert_eq!(result.categories.len(), 2);
    let dairy = &result.categories[0];
    assert_eq!(dairy.method, MappingMethod::Manual);
    assert_eq!(dairy.master_slug.as_deref(), Some("lacteos-y-productos-frescos"));
    assert_eq!(result.categories[1].method, MappingMethod::Pending);
    assert_eq!(pages.acquired(), 1);
    assert_eq!(pages.released(), 1);

    // Replaying the job must not duplicate anything.
    jobs.process(&ScrapeJob::discover("jumbo")).await.unwrap();
    assert_eq!(catalog.store_categories().len(), 2);
    let pending: Vec<_> = catalog
        .masters()
        .into_iter()
        .filter(|m| m.is_pending)
        .collect();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].slug, "pending-snacks-saludables");
}

#[tokio::test]
async fn crawl_persists_subcategories_and_confirmed_brands() {
    let html = vtex_category(
        &[("/lacteos/leches", "Leches")],
        &["La Serenísima (23)", "Marca Nueva (4)"],
        &["Inicio", "Lácteos"],
        &[
            Card::new("1", "Gaseosa Coca-Cola 2.25 L", "/coca/p", "$ 2.899").brand("Coca-Cola"),
            Card::new("2", "Galletitas surtidas", "/galletitas/p", "$ 900").brand("Desconocida"),
        ],
    );
    let pages = Arc::new(FixtureProvider::new().with_page(&format!("{JUMBO}/lacteos"), &html));
    let catalog = catalog();

    let result = processor(&catalog, &pages)
        .process(&lacteos_job(JobAction::CrawlCategory))
        .await
        .unwrap();

    assert_eq!(result.categories.len(), 1);
    assert_eq!(result.categories[0].level, 2);
    let names: Vec<&str> = result.brands.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, ["La Serenísima", "Marca Nueva", "Coca-Cola"]);
    assert_eq!(result.brands[0].product_count, Some(23));
    assert_eq!(result.brands[2].source, "product");

    let brands = catalog.list_brands().await.unwrap();
    assert_eq!(brands.len(), 4);
    let new_brand = brands.iter().find(|b| b.name == "Marca Nueva").unwrap();
    assert_eq!(new_brand.stores, ["jumbo"]);
    assert!(brands.iter().all(|b| b.name != "Desconocida"));
}

#[tokio::test]
async fn scrape_creates_then_updates_and_reports_invalid_items() {
    let url = format!("{JUMBO}/lacteos");
    let pages = Arc::new(
        FixtureProvider::new()
            .with_page(
                &url,
                &vtex_listing(&[
                    Card::new("10", "Leche Entera La Serenísima 1 L", "/leche-entera/p", "$ 1.234,50")
                        .ean("7790895000997"),
                    Card::new("11", "Yogur Bebible", "/yogur/p", "Consultar"),
                ]),
            )
            .with_page(&format!("{url}?page=2"), &vtex_listing(&[])),
    );
    let catalog = catalog();
    let jobs = processor(&catalog, &pages);
    let job = lacteos_job(JobAction::ScrapeProducts);

    let first = jobs.process(&job).await.unwrap();
    assert_eq!(first.products.len(), 1);
    assert!(first.updated_products.is_empty());
    assert_eq!(first.errors.len(), 1);
    assert!(first.errors[0].contains("Consultar"));
    let summary = &first.products[0];
    assert_eq!(summary.ean, "7790895000997");
    assert_eq!(summary.brand.as_deref(), Some("La Serenísima"));

    let second = jobs.process(&job).await.unwrap();
    assert!(second.products.is_empty());
    assert_eq!(second.updated_products.len(), 1);

    let products = catalog.products();
    assert_eq!(products.len(), 1);
    let product = &products[0];
    assert_eq!(product.variants.len(), 1);
    assert_eq!(product.scraping_metadata.update_count, 1);
    assert!(product.master_category_id.is_some());
    assert_eq!(product.sources.len(), 1);
}

#[tokio::test]
async fn real_barcode_replaces_earlier_placeholder() {
    let url = format!("{JUMBO}/lacteos");
    let catalog = catalog();
    let job = lacteos_job(JobAction::ScrapeProducts);
    let listing = |card: Card<'_>| {
        Arc::new(
            FixtureProvider::new()
                .with_page(&url, &vtex_listing(&[card]))
                .with_page(&format!("{url}?page=2"), &vtex_listing(&[])),
        )
    };

    let without = listing(Card::new("10", "Leche Entera 1 L", "/leche-entera/p", "$ 1.200"));
    let first = processor(&catalog, &without).process(&job).await.unwrap();
    assert!(first.products[0].ean.starts_with("TMP-"));

    let with = listing(
        Card::new("10", "Leche Entera 1 L", "/leche-entera/p", "$ 1.250").ean("7790895000997"),
    );
    let second = processor(&catalog, &with).process(&job).await.unwrap();
    assert_eq!(second.updated_products[0].ean, "7790895000997");

    let products = catalog.products();
    assert_eq!(products.len(), 1);
    let eans: Vec<&str> = products[0].eans().collect();
    assert_eq!(eans, ["7790895000997"]);
}

#[tokio::test]
async fn scrape_without_barcode_reports_the_variant_it_refreshed() {
    let url = format!("{JUMBO}/lacteos");
    let catalog = catalog();
    let job = lacteos_job(JobAction::ScrapeProducts);
    let listing = |card: Card<'_>| {
        Arc::new(
            FixtureProvider::new()
                .with_page(&url, &vtex_listing(&[card]))
                .with_page(&format!("{url}?page=2"), &vtex_listing(&[])),
        )
    };

    let with = listing(
        Card::new("10", "Leche Entera 1 L", "/leche-entera/p", "$ 1.250").ean("7790895000997"),
    );
    processor(&catalog, &with).process(&job).await.unwrap();

    let without = listing(Card::new("10", "Leche Entera 1 L", "/leche-entera/p", "$ 1.300"));
    let second = processor(&catalog, &without).process(&job).await.unwrap();

    assert_eq!(second.updated_products.len(), 1);
    assert_eq!(second.updated_products[0].ean, "7790895000997");
    let products = catalog.products();
    let eans: Vec<&str> = products[0].eans().collect();
    assert_eq!(eans, ["7790895000997"]);
}

#[tokio::test]
async fn blocked_job_propagates_and_still_releases_the_page() {
    let pages = Arc::new(FixtureProvider::new().with_status(&format!("{JUMBO}/lacteos"), 403, ""));
    let sink = Arc::new(MemoryEvidenceSink::new());
    let jobs = processor(&catalog(), &pages)
        .with_evidence(EvidenceLogger::new("scraper").with_sink(sink.clone()));

    let err = jobs
        .process(&lacteos_job(JobAction::CrawlCategory))
        .await
        .unwrap_err();

    assert!(err.is_blocking());
    assert_eq!(pages.released(), 1);
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].event_type, "bot_detected");
}

#[tokio::test]
async fn completed_job_leaves_a_summary_record() {
    let pages = Arc::new(FixtureProvider::new().with_page(JUMBO, &vtex_home(&[("/bebidas", "Bebidas")])));
    let sink = Arc::new(MemoryEvidenceSink::new());
    processor(&catalog(), &pages)
        .with_evidence(EvidenceLogger::new("scraper").with_sink(sink.clone()))
        .process(&ScrapeJob::discover("jumbo"))
        .await
        .unwrap();

    let records = sink.records();
    let summary = records.last().unwrap();
    assert_eq!(summary.event_type, "job_completed");
    assert_eq!(summary.details["categories"], 1);
}

#[tokio::test]
async fn invalid_jobs_fail_before_acquiring_a_page() {
    let pages = Arc::new(FixtureProvider::new());
    let jobs = processor(&catalog(), &pages);

    let unknown = jobs.process(&ScrapeJob::discover("walmart")).await.unwrap_err();
    assert!(matches!(unknown, ScraperError::UnknownRetailer(_)));

    let no_url = ScrapeJob {
        category_url: None,
        ..lacteos_job(JobAction::ScrapeProducts)
    };
    let err = jobs.process(&no_url).await.unwrap_err();
    assert!(matches!(err, ScraperError::InvalidJob(_)));
    assert_eq!(pages.acquired(), 0);
}
