use supercat_core::DataQuality;

const WEIGHT_REAL_EAN: f64 = 0.30;
const WEIGHT_BRAND: f64 = 0.25;
const WEIGHT_CATEGORY: f64 = 0.15;
const WEIGHT_IMAGE: f64 = 0.15;
const WEIGHT_PRICE: f64 = 0.15;

/// Facts about a scraped product that feed its confidence score.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QualityInputs {
    pub has_real_ean: bool,
    /// Confidence of a reliable brand match, `None` when no reliable brand.
    pub brand_confidence: Option<f64>,
    pub category_mapped: bool,
    pub has_image: bool,
    pub has_positive_price: bool,
}

/// Weighted confidence score in `[0, 1]` and its quality bucket.
#[must_use]
pub fn assess_quality(inputs: &QualityInputs) -> (f64, DataQuality) {
    let flag = |present: bool, weight: f64| if present { weight } else { 0.0 };
    let score = flag(inputs.has_real_ean, WEIGHT_REAL_EAN)
        + inputs
            .brand_confidence
            .map_or(0.0, |c| WEIGHT_BRAND * c.clamp(0.0, 1.0))
        + flag(inputs.category_mapped, WEIGHT_CATEGORY)
        + flag(inputs.has_image, WEIGHT_IMAGE)
        + flag(inputs.has_positive_price, WEIGHT_PRICE);
    let score = score.clamp(0.0, 1.0);
    (score, DataQuality::from_score(score))
}
