use super::*;

#[test]
fn new_brand_derives_slug_from_name() {
    let brand = Brand::new("  La Serenísima ");
    assert_eq!(brand.name, "La Serenísima");
    assert_eq!(brand.slug, "la-serenisima");
    assert!(brand.active);
    assert!(brand.stores.is_empty());
}

#[test]
fn slug_drops_punctuation() {
    assert_eq!(Brand::new("Coca-Cola®").slug, "coca-cola");
    assert_eq!(Brand::new("Paty's").slug, "paty-s");
}

#[test]
fn absorb_accumulates_stores_without_duplicates() {
    let mut brand = Brand::new("Arcor");
    assert!(brand.absorb(&BrandUpsert::new("Arcor", Some("carrefour"))));
    assert!(brand.absorb(&BrandUpsert::new("Arcor", Some("jumbo"))));
    assert!(!brand.absorb(&BrandUpsert::new("Arcor", Some("carrefour"))));
    assert_eq!(brand.stores, vec!["carrefour", "jumbo"]);
}

#[test]
fn absorb_adds_new_aliases_only() {
    let mut brand = Brand::new("Coca-Cola").with_aliases(["Coca Cola"]);
    let mut upsert = BrandUpsert::new("Coca-Cola", None);
    upsert.aliases = vec!["coca cola".to_string(), "Coke".to_string(), "COCA-COLA".to_string()];
    assert!(brand.absorb(&upsert));
    assert_eq!(brand.aliases, vec!["Coca Cola", "Coke"]);
}

#[test]
fn absorb_without_changes_keeps_timestamp() {
    let mut brand = Brand::new("Arcor");
    let before = brand.updated_at;
    assert!(!brand.absorb(&BrandUpsert::new("Arcor", None)));
    assert_eq!(brand.updated_at, before);
}

#[test]
fn into_brand_carries_store() {
    let brand = BrandUpsert::new("Marolio", Some("dia")).into_brand();
    assert_eq!(brand.slug, "marolio");
    assert_eq!(brand.stores, vec!["dia"]);
}

#[test]
fn serde_roundtrip_brand() {
    let brand = Brand::new("Quilmes").with_acronyms(["QLM"]);
    let json = serde_json::to_string(&brand).expect("serialization failed");
    let decoded: Brand = serde_json::from_str(&json).expect("deserialization failed");
    assert_eq!(decoded, brand);
}
