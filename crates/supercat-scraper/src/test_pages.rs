//! Storefront HTML builders shared by the adapter and job tests.

pub(crate) const JUMBO: &str = "https://www.jumbo.com.ar";
pub(crate) const COTO: &str = "https://www.cotodigital3.com.ar";

pub(crate) struct Card<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub brand: Option<&'a str>,
    pub href: &'a str,
    pub price: &'a str,
    pub ean: Option<&'a str>,
}

impl<'a> Card<'a> {
    pub(crate) fn new(id: &'a str, name: &'a str, href: &'a str, price: &'a str) -> Self {
        Self {
            id,
            name,
            brand: None,
            href,
            price,
            ean: None,
        }
    }

    pub(crate) fn brand(mut self, brand: &'a str) -> Self {
        self.brand = Some(brand);
        self
    }

    pub(crate) fn ean(mut self, ean: &'a str) -> Self {
        self.ean = Some(ean);
        self
    }
}

pub(crate) fn vtex_home(links: &[(&str, &str)]) -> String {
    let items: String = links
        .iter()
        .map(|(href, name)| {
            format!(r#"<a class="vtex-menu-2-x-styledLink--menu-item-level-1" href="{href}">{name}</a>"#)
        })
        .collect();
    format!(r#"<html><body><main><nav>{items}</nav></main></body></html>"#)
}

fn vtex_card(card: &Card<'_>) -> String {
    let ean = card
        .ean
        .map(|e| format!(r#" data-ean="{e}""#))
        .unwrap_or_default();
    let brand = card
        .brand
        .map(|b| format!(r#"<span class="vtex-product-summary-2-x-productBrandName">{b}</span>"#))
        .unwrap_or_default();
    format!(
        r#"<section class="vtex-product-summary-2-x-container" data-product-id="{id}"{ean}>
             <a href="{href}"><img src="/arquivos/{id}.jpg"></a>
             <h3>{name}</h3>{brand}
             <span class="vtex-product-price-1-x-sellingPriceValue">{price}</span>
           </section>"#,
        id = card.id,
        href = card.href,
        name = card.name,
        price = card.price,
    )
}

pub(crate) fn vtex_listing(cards: &[Card<'_>]) -> String {
    let body: String = cards.iter().map(vtex_card).collect();
    format!("<html><body><main>{body}</main></body></html>")
}

pub(crate) fn vtex_category(
    subcategories: &[(&str, &str)],
    sidebar_brands: &[&str],
    crumbs: &[&str],
    cards: &[Card<'_>],
) -> String {
    let subs: String = subcategories
        .iter()
        .map(|(href, name)| format!(r#"<a href="{href}">{name}</a>"#))
        .collect();
    let brands: String = sidebar_brands
        .iter()
        .map(|label| {
            format!(r#"<div class="vtex-search-result-3-x-filterItem"><label>{label}</label></div>"#)
        })
        .collect();
    let crumbs: String = crumbs
        .iter()
        .map(|c| format!(r#"<a class="vtex-breadcrumb-1-x-link" href="/">{c}</a>"#))
        .collect();
    let grid: String = cards.iter().map(vtex_card).collect();
    format!(
        r#"<html><body><main>
             <nav>{crumbs}</nav>
             <div class="vtex-search-result-3-x-filter__container--category-2">{subs}</div>
             <div class="vtex-search-result-3-x-filter__container--brand">{brands}</div>
             {grid}
           </main></body></html>"#
    )
}

pub(crate) fn vtex_detail(ean: &str) -> String {
    format!(
        r#"<html><body><main>
             <span class="vtex-product-identifier-0-x-product-identifier__value">{ean}</span>
             <span class="vtex-product-identifier-0-x-skuReference">SKU-{ean}</span>
           </main></body></html>"#
    )
}

pub(crate) fn coto_listing(cards: &[Card<'_>]) -> String {
    let body: String = cards
        .iter()
        .map(|card| {
            format!(
                r#"<li id="li_prod{id}">
                     <a href="{href}"><img src="/imagenes/{id}.jpg"></a>
                     <div class="descrip_full">{name}</div>
                     <span class="atg_store_newPrice">{price}</span>
                   </li>"#,
                id = card.id,
                href = card.href,
                name = card.name,
                price = card.price,
            )
        })
        .collect();
    format!(r#"<html><body><div id="atg_store_content"><ul>{body}</ul></div></body></html>"#)
}
