use std::sync::LazyLock;

use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use crate::model::RawItem;

static SECTION_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("main > section").unwrap());
static CARD_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[class*="grid"] > div"#).unwrap());
static NAME_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3").unwrap());
static PRICE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"span[class*="text-xl"]"#).unwrap());
static IMAGE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());

/// Pull product cards out of rendered storefront HTML. A card needs both a
/// name heading and a price span; anything else is skipped. Image sources
/// are resolved against `page_url`.
pub fn extract_cards(html: &str, page_url: &str) -> Vec<RawItem> {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();
    let mut items = Vec::new();

    for section in document.select(&SECTION_SEL) {
        for card in section.select(&CARD_SEL) {
            let (Some(name), Some(price)) = (
                card.select(&NAME_SEL).next(),
                card.select(&PRICE_SEL).next(),
            ) else {
                continue;
            };

            let image = card
                .select(&IMAGE_SEL)
                .next()
                .and_then(|img| img.value().attr("src"))
                .and_then(|src| resolve(base.as_ref(), src));

            items.push(RawItem {
                name: Some(Value::String(text_of(name))),
                price: Some(Value::String(text_of(price))),
                image: image.map(Value::String),
                ..RawItem::default()
            });
        }
    }

    items
}

fn text_of(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn resolve(base: Option<&Url>, src: &str) -> Option<String> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }
    match base {
        Some(base) => base.join(src).ok().map(String::from),
        None => Some(src.to_string()),
    }
}
