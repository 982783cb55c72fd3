// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde_json::{json, Value};

use crawlguard::domain::models::job::{DataType, TargetField};
use crawlguard::domain::services::extraction_service::ExtractionService;

use crate::integration::helpers::{MockElement, MockPage};

fn listing_page() -> MockPage {
    MockPage::new()
        .with_elements(
            ".name",
            vec![
                MockElement::text("  Matcha Latte "),
                MockElement::text("   "),
                MockElement::text("Hojicha"),
            ],
        )
        .with_elements(
            ".price",
            vec![
                MockElement::text("¥1,280"),
                MockElement::text("SOLD OUT"),
                MockElement::text("¥2,450.50"),
            ],
        )
        .with_elements(
            "a.detail",
            vec![
                MockElement::default().with_attr("href", "https://shop.example/items/1"),
                MockElement::default(),
            ],
        )
        .with_elements(
            "img.thumb",
            vec![MockElement::default().with_attr("src", "/img/matcha.jpg")],
        )
        .with_failing_selector(".broken")
}

#[tokio::test]
async fn test_extract_all_data_types() {
    let page = listing_page();
    let fields = ExtractionService::extract(
        &page,
        &[
            TargetField::new("Product Name", ".name", DataType::Text),
            TargetField::new("Price", ".price", DataType::Number),
            TargetField::new("Detail Link", "a.detail", DataType::Url),
            TargetField::new("Thumbnail", "img.thumb", DataType::Image),
        ],
    )
    .await;

    assert_eq!(
        fields["product_name"],
        vec![json!("Matcha Latte"), json!("Hojicha")]
    );
    assert_eq!(fields["price"], vec![json!(1280), json!(2450.5)]);
    assert_eq!(fields["detail_link"], vec![json!("https://shop.example/items/1")]);
    assert_eq!(fields["thumbnail"], vec![json!("/img/matcha.jpg")]);
}

#[tokio::test]
async fn test_failed_field_does_not_stop_others() {
    let page = listing_page();
    let fields = ExtractionService::extract(
        &page,
        &[
            TargetField::new("Broken", ".broken", DataType::Text),
            TargetField::new("Missing", ".nothing-here", DataType::Text),
            TargetField::new("Product Name", ".name", DataType::Text),
        ],
    )
    .await;

    assert_eq!(fields.len(), 3);
    assert_eq!(fields["broken"], Vec::<Value>::new());
    assert_eq!(fields["missing"], Vec::<Value>::new());
    assert_eq!(fields["product_name"].len(), 2);
}

#[tokio::test]
async fn test_no_targets_yields_empty_map() {
    let page = listing_page();
    assert!(ExtractionService::extract(&page, &[]).await.is_empty());
}

#[tokio::test]
async fn test_link_types_fall_back_between_href_and_src() {
    let page = MockPage::new()
        .with_elements(
            "img.banner",
            vec![MockElement::default().with_attr("src", "/x.png")],
        )
        .with_elements(
            "a.more",
            vec![MockElement::default().with_attr("href", "/page")],
        )
        .with_elements(
            "a.both",
            vec![MockElement::default()
                .with_attr("href", "/first")
                .with_attr("src", "/second")],
        );

    let fields = ExtractionService::extract(
        &page,
        &[
            TargetField::new("Banner Url", "img.banner", DataType::Url),
            TargetField::new("More Image", "a.more", DataType::Image),
            TargetField::new("Both", "a.both", DataType::Image),
        ],
    )
    .await;

    assert_eq!(fields["banner_url"], vec![json!("/x.png")]);
    assert_eq!(fields["more_image"], vec![json!("/page")]);
    assert_eq!(fields["both"], vec![json!("/first")]);
}

#[tokio::test]
async fn test_number_uses_leading_numeric_prefix() {
    let page = MockPage::new().with_elements(
        ".range",
        vec![MockElement::text("$10 - $20"), MockElement::text("v1.2.3")],
    );

    let fields = ExtractionService::extract(
        &page,
        &[TargetField::new("Range", ".range", DataType::Number)],
    )
    .await;

    assert_eq!(fields["range"], vec![json!(10), json!(1.2)]);
}
