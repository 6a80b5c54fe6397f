use std::time::Duration;

use supercat_core::RetailerKey;

use super::*;
use crate::fixture::FixtureProvider;
use crate::page::PageProvider;
use crate::test_pages::{coto_listing, vtex_category, vtex_detail, vtex_home, vtex_listing, Card, COTO, JUMBO};

fn opts() -> CrawlOptions {
    CrawlOptions {
        max_pages: 5,
        page_timeout: Duration::from_secs(5),
        inter_request_delay: Duration::ZERO,
        wait_timeout: Duration::from_millis(10),
        fetch_product_details: false,
    }
}

fn jumbo() -> RetailerAdapter {
    RetailerAdapter::for_store("jumbo").unwrap()
}

#[test]
fn unknown_store_is_rejected() {
    assert!(matches!(
        RetailerAdapter::for_store("walmart"),
        Err(ScraperError::UnknownRetailer(_))
    ));
}

#[test]
fn page_urls_follow_the_pagination_strategy() {
    let vtex = jumbo();
    let url = "https://www.jumbo.com.ar/lacteos?order=price&page=9";
    assert_eq!(vtex.page_url(url, 0).as_deref(), Some(url));
    assert_eq!(
        vtex.page_url(url, 2).as_deref(),
        Some("https://www.jumbo.com.ar/lacteos?order=price&page=3")
    );

    let coto = RetailerAdapter::for_store("coto").unwrap();
    assert_eq!(
        coto.page_url("https://www.cotodigital3.com.ar/browse/lacteos", 2).as_deref(),
        Some("https://www.cotodigital3.com.ar/browse/lacteos?No=48")
    );
}

#[test]
fn urls_resolve_against_the_base() {
    let adapter = jumbo();
    assert_eq!(
        adapter.resolve_url("/lacteos").as_deref(),
        Some("https://www.jumbo.com.ar/lacteos")
    );
    assert_eq!(
        adapter.resolve_url("https://cdn.example/img.jpg").as_deref(),
        Some("https://cdn.example/img.jpg")
    );
    assert!(adapter.resolve_url("javascript:void(0)").is_none());
    assert!(adapter.resolve_url("  ").is_none());
}

#[test]
fn vtex_ids_prefer_the_data_attribute_then_the_slug() {
    let strategy = VtexStrategy;
    let record = ExtractedRecord::from([("product_id", "101")]);
    assert_eq!(strategy.product_id(&record, None).as_deref(), Some("101"));
    assert_eq!(
        strategy
            .product_id(&ExtractedRecord::default(), Some("https://www.jumbo.com.ar/leche-entera/p"))
            .as_deref(),
        Some("leche-entera")
    );
}

#[test]
fn custom_ids_strip_the_element_prefix() {
    let record = ExtractedRecord::from([("product_id", "li_prod00012345")]);
    assert_eq!(
        CustomStrategy.product_id(&record, None).as_deref(),
        Some("00012345")
    );
}

#[tokio::test]
async fn discovers_top_level_categories() {
    let provider = FixtureProvider::new().with_page(
        JUMBO,
        &vtex_home(&[("/lacteos", "Lácteos"), ("/bebidas", "Bebidas"), ("/ofertas", "Ofertas")]),
    );
    let mut page = provider.acquire(RetailerKey::Jumbo).await.unwrap();

    let categories = jumbo().discover_categories(page.as_mut(), &opts()).await.unwrap();
    let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Lácteos", "Bebidas"]);
    assert_eq!(categories[0].level, 1);
    assert_eq!(categories[0].url.as_deref(), Some("https://www.jumbo.com.ar/lacteos"));
}

#[tokio::test]
async fn crawl_collects_subcategories_and_brand_candidates() {
    let url = format!("{JUMBO}/lacteos");
    let html = vtex_category(
        &[("/lacteos/leches", "Leches"), ("/lacteos/yogures", "Yogures")],
        &["La Serenísima (23)", "Sancor (12)", "Ver todo"],
        &["Inicio", "Lácteos"],
        &[Card::new("1", "Leche Entera La Serenísima 1 L", "/leche/p", "$ 1.200").brand("La Serenisima")],
    );
    let provider = FixtureProvider::new().with_page(&url, &html);
    let mut page = provider.acquire(RetailerKey::Jumbo).await.unwrap();

    let listing = jumbo()
        .crawl_category(page.as_mut(), &url, &["Lácteos".to_string()], &opts())
        .await
        .unwrap();

    assert_eq!(listing.subcategories.len(), 2);
    assert_eq!(listing.subcategories[0].level, 2);
    assert_eq!(listing.subcategories[0].parent_path, ["Lácteos"]);

    let brands: Vec<(&str, BrandSource)> = listing
        .brands
        .iter()
        .map(|b| (b.name.as_str(), b.source))
        .collect();
    assert_eq!(
        brands,
        [("La Serenísima", BrandSource::Sidebar), ("Sancor", BrandSource::Sidebar)]
    );
    assert_eq!(listing.brands[0].product_count, Some(23));
    assert_eq!(listing.breadcrumb, ["Inicio", "Lácteos"]);
}

#[tokio::test]
async fn pagination_stops_on_a_repeated_page() {
    let url = format!("{JUMBO}/lacteos");
    let first = vtex_listing(&[
        Card::new("1", "Leche Entera 1 L", "/leche-entera/p?skuId=9", "$ 1.200").ean("7790895000997"),
        Card::new("2", "Leche Descremada 1 L", "/leche-descremada/p", "$ 1.100"),
    ]);
    let second = vtex_listing(&[Card::new("3", "Yogur Frutilla", "/yogur/p", "$ 800")]);
    let provider = FixtureProvider::new()
        .with_page(&url, &first)
        .with_page(&format!("{url}?page=2"), &second)
        .with_page(&format!("{url}?page=3"), &second);
    let mut page = provider.acquire(RetailerKey::Jumbo).await.unwrap();

    let listing = jumbo()
        .scrape_products(page.as_mut(), &url, &["Lácteos".to_string()], &opts())
        .await
        .unwrap();

    assert_eq!(listing.products.len(), 3);
    assert_eq!(listing.pages_visited, 3);
    assert!(listing.errors.is_empty());
    let first = &listing.products[0];
    assert_eq!(first.store_product_id.as_deref(), Some("1"));
    assert_eq!(first.url.as_deref(), Some("https://www.jumbo.com.ar/leche-entera/p"));
    assert_eq!(first.images, ["https://www.jumbo.com.ar/arquivos/1.jpg"]);
    assert_eq!(first.fields.get("ean"), Some("7790895000997"));
    assert_eq!(first.category_path, ["Lácteos"]);
}

#[tokio::test]
async fn failing_later_page_keeps_earlier_products() {
    let url = format!("{COTO}/browse/lacteos");
    let provider = FixtureProvider::new()
        .with_page(
            &url,
            &coto_listing(&[Card::new("00012345", "Leche Entera Coto 1 L", "/p/leche-coto", "$ 999,00")]),
        )
        .with_status(&format!("{url}?No=24"), 503, "");
    let mut page = provider.acquire(RetailerKey::Coto).await.unwrap();

    let listing = RetailerAdapter::for_store("coto")
        .unwrap()
        .scrape_products(page.as_mut(), &url, &[], &opts())
        .await
        .unwrap();

    assert_eq!(listing.products.len(), 1);
    assert_eq!(listing.products[0].store_product_id.as_deref(), Some("00012345"));
    assert_eq!(listing.errors.len(), 1);
}

#[tokio::test]
async fn failing_first_page_propagates() {
    let provider = FixtureProvider::new();
    let mut page = provider.acquire(RetailerKey::Jumbo).await.unwrap();
    let err = jumbo()
        .scrape_products(page.as_mut(), "https://www.jumbo.com.ar/nada", &[], &opts())
        .await
        .unwrap_err();
    assert!(matches!(err, ScraperError::Navigation { .. }));
}

#[tokio::test]
async fn detail_pages_fill_missing_barcodes() {
    let url = format!("{JUMBO}/lacteos");
    let provider = FixtureProvider::new()
        .with_page(
            &url,
            &vtex_listing(&[Card::new("1", "Leche Entera 1 L", "/leche-entera/p", "$ 1.200")]),
        )
        .with_page(&format!("{url}?page=2"), &vtex_listing(&[]))
        .with_page(&format!("{JUMBO}/leche-entera/p"), &vtex_detail("7790895000997"));
    let mut page = provider.acquire(RetailerKey::Jumbo).await.unwrap();

    let options = CrawlOptions {
        fetch_product_details: true,
        ..opts()
    };
    let listing = jumbo()
        .scrape_products(page.as_mut(), &url, &[], &options)
        .await
        .unwrap();

    assert_eq!(listing.products[0].fields.get("ean"), Some("7790895000997"));
    assert_eq!(listing.products[0].fields.get("sku"), Some("SKU-7790895000997"));
}
