//! Selector-driven extraction over a parsed HTML document.

use scraper::{ElementRef, Html, Selector};
use supercat_core::{FieldSelector, RecordSelectors};

use crate::error::ScraperError;
use crate::page::ExtractedRecord;

fn parse_selector(selector: &str) -> Result<Selector, ScraperError> {
    Selector::parse(selector).map_err(|e| ScraperError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn read_field(element: ElementRef<'_>, field: &FieldSelector) -> Result<Option<String>, ScraperError> {
    let target = if field.selector.is_empty() {
        Some(element)
    } else {
        element.select(&parse_selector(&field.selector)?).next()
    };
    let Some(target) = target else {
        return Ok(None);
    };
    let value = match &field.attribute {
        Some(attr) => target.value().attr(attr).map(str::trim).map(str::to_string),
        None => Some(collapse_whitespace(&target.text().collect::<String>())),
    };
    Ok(value.filter(|v| !v.is_empty()))
}

/// Extracts one record per container match. Containers whose fields are all
/// missing are skipped.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidSelector`] if a selector does not parse.
pub fn extract_records(html: &str, spec: &RecordSelectors) -> Result<Vec<ExtractedRecord>, ScraperError> {
    let document = Html::parse_document(html);
    let container = parse_selector(&spec.container)?;
    let mut records = Vec::new();
    for element in document.select(&container) {
        let mut record = ExtractedRecord::default();
        for (name, field) in &spec.fields {
            if let Some(value) = read_field(element, field)? {
                record.insert(name, value);
            }
        }
        if !record.is_empty() {
            records.push(record);
        }
    }
    Ok(records)
}

/// Whether any element in `html` matches `selector`. A comma list matches if
/// any alternative does.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidSelector`] if the selector does not parse.
pub fn has_match(html: &str, selector: &str) -> Result<bool, ScraperError> {
    let document = Html::parse_document(html);
    Ok(document.select(&parse_selector(selector)?).next().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRID: &str = r#"
        <html><body>
          <section class="vtex-product-summary-2-x-container" data-product-id="101" data-ean="7790895000997">
            <a href="/gaseosa-coca-cola-2-25-l/p"><img src="https://img/1.jpg"></a>
            <h3>  Gaseosa   Coca-Cola 2.25 L </h3>
            <span class="vtex-product-price-1-x-sellingPriceValue">$ 2.899,50</span>
          </section>
          <section class="vtex-product-summary-2-x-container" data-product-id="102">
            <h3>Agua Villavicencio 2 L</h3>
          </section>
          <section class="vtex-product-summary-2-x-container"></section>
        </body></html>"#;

    fn grid_spec() -> RecordSelectors {
        RecordSelectors::new("section[class*=\"vtex-product-summary-2-x-container\"]")
            .field("name", FieldSelector::text("h3"))
            .field("url", FieldSelector::attr("a", "href"))
            .field("price", FieldSelector::text("span[class*=\"sellingPriceValue\"]"))
            .field("image", FieldSelector::attr("img", "src"))
            .field("product_id", FieldSelector::attr("", "data-product-id"))
            .field("ean", FieldSelector::attr("", "data-ean"))
    }

    #[test]
    fn extracts_fields_from_each_container() {
        let records = extract_records(GRID, &grid_spec()).unwrap();
        assert_eq!(records.len(), 2, "empty container must be skipped");
        let first = &records[0];
        assert_eq!(first.get("name"), Some("Gaseosa Coca-Cola 2.25 L"));
        assert_eq!(first.get("url"), Some("/gaseosa-coca-cola-2-25-l/p"));
        assert_eq!(first.get("price"), Some("$ 2.899,50"));
        assert_eq!(first.get("product_id"), Some("101"));
        assert_eq!(first.get("ean"), Some("7790895000997"));
        assert_eq!(records[1].get("ean"), None);
    }

    #[test]
    fn invalid_selector_is_an_error() {
        let spec = RecordSelectors::new("div[[");
        assert!(matches!(
            extract_records(GRID, &spec),
            Err(ScraperError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn has_match_checks_any_alternative() {
        assert!(has_match(GRID, "nav.menu, h3").unwrap());
        assert!(!has_match(GRID, "nav.menu").unwrap());
    }
}
