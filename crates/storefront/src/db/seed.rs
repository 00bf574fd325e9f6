//! Starter catalogue for a fresh store.

use mbuli_core::Tzs;

use crate::models::NewProduct;

const PLACEHOLDER_IMAGE: &str = "https://placehold.co/600x400";

/// The farm's standard product range.
#[must_use]
pub fn catalogue() -> Vec<NewProduct> {
    [
        (
            "Whole Chicken",
            "Fresh, farm-raised whole chicken. Perfect for roasting. Approx. 1.5kg.",
            15_000,
            50,
        ),
        (
            "Chicken Thighs (1kg)",
            "Juicy and tender chicken thighs, bone-in and skin-on. Ideal for grilling or stewing.",
            18_000,
            30,
        ),
        (
            "Chicken Wings (1kg)",
            "Perfectly portioned wings, ready for your favorite sauce. Great for parties.",
            12_000,
            0,
        ),
        (
            "Chicken Breast (1kg)",
            "Lean and versatile boneless, skinless chicken breast. A healthy choice for any meal.",
            20_000,
            25,
        ),
        (
            "Chicken Drumsticks (1kg)",
            "A family favorite, these drumsticks are meaty and flavorful. Perfect for frying or baking.",
            16_000,
            8,
        ),
        (
            "Ground Chicken (500g)",
            "Lean ground chicken, a great alternative for burgers, meatballs, and sauces.",
            9_000,
            40,
        ),
    ]
    .into_iter()
    .map(|(name, description, price, stock_units)| NewProduct {
        name: name.to_string(),
        description: description.to_string(),
        price: Tzs::from_shillings(price),
        image_url: Some(PLACEHOLDER_IMAGE.to_string()),
        stock_units,
    })
    .collect()
}
