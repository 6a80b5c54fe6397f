use super::*;

// ---------------------------------------------------------------------------
// parse_price
// ---------------------------------------------------------------------------

#[test]
fn argentine_format_with_thousands_and_cents() {
    assert_eq!(parse_price("$ 1.234,56"), Some(Decimal::new(123_456, 2)));
}

#[test]
fn dot_decimal_format() {
    assert_eq!(parse_price("$1234.5"), Some(Decimal::new(12_345, 1)));
}

#[test]
fn dot_with_three_digits_is_thousands() {
    assert_eq!(parse_price("$ 2.899"), Some(Decimal::from(2899)));
    assert_eq!(parse_price("$ 1.299.000"), Some(Decimal::from(1_299_000)));
}

#[test]
fn comma_decimal_only() {
    assert_eq!(parse_price("1,5"), Some(Decimal::new(15, 1)));
}

#[test]
fn us_style_thousands() {
    assert_eq!(parse_price("1,234.50"), Some(Decimal::new(123_450, 2)));
}

#[test]
fn negative_price_keeps_sign() {
    assert_eq!(parse_price("-$ 10,00"), Some(Decimal::new(-1000, 2)));
}

#[test]
fn no_digits_is_none() {
    assert_eq!(parse_price("Consultar"), None);
    assert_eq!(parse_price(""), None);
}

// ---------------------------------------------------------------------------
// parse_package_size
// ---------------------------------------------------------------------------

#[test]
fn package_litres() {
    let size = parse_package_size("Gaseosa Coca-Cola 2.25L").unwrap();
    assert_eq!(size.value, Decimal::new(225, 2));
    assert_eq!(size.unit, "l");
    assert_eq!(parse_package_size("Leche Entera 1 L").unwrap().unit, "l");
}

#[test]
fn package_grams_and_kilos() {
    let grams = parse_package_size("Yerba Mate 500 g").unwrap();
    assert_eq!((grams.value, grams.unit), (Decimal::from(500), "g"));
    let kilos = parse_package_size("Harina 1,5 kg").unwrap();
    assert_eq!((kilos.value, kilos.unit), (Decimal::new(15, 1), "kg"));
}

#[test]
fn package_cc_is_millilitres() {
    let size = parse_package_size("Aceite Natura 900cc").unwrap();
    assert_eq!((size.value, size.unit), (Decimal::from(900), "ml"));
}

#[test]
fn package_unit_count() {
    let size = parse_package_size("Huevos blancos x 6 un").unwrap();
    assert_eq!((size.value, size.unit), (Decimal::from(6), "un"));
}

#[test]
fn package_absent() {
    assert!(parse_package_size("Pan lactal blanco").is_none());
}

// ---------------------------------------------------------------------------
// Facets and flags
// ---------------------------------------------------------------------------

#[test]
fn facet_label_with_count() {
    assert_eq!(
        split_facet_count("La Serenísima (23)"),
        ("La Serenísima".to_string(), Some(23))
    );
    assert_eq!(split_facet_count(" Arcor "), ("Arcor".to_string(), None));
}

#[test]
fn standalone_count() {
    assert_eq!(parse_count("(120)"), Some(120));
    assert_eq!(parse_count("n/a"), None);
}

#[test]
fn availability_flags() {
    assert_eq!(parse_available("true"), Some(true));
    assert_eq!(parse_available(" OutOfStock "), Some(false));
    assert_eq!(parse_available("maybe"), None);
}
