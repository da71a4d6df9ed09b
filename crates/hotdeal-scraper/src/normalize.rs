//! Turns a raw feed item plus its extracted price into a [`Deal`].
//!
//! Every function here is total: missing or malformed feed fields fall back
//! to neutral values instead of failing the item.

use chrono::{DateTime, Utc};
use hotdeal_core::{Category, Deal, FeedItem, PriceInfo, SourceConfig, DELIVERY_FREE};

/// Title used when a feed item has none.
pub const UNTITLED: &str = "제목 없음";
/// Recency label for a missing or unparseable publish date.
pub const UNKNOWN_TIME: &str = "시간 정보 없음";
/// Maximum tags attached to one deal.
pub const MAX_TAGS: usize = 2;
/// Discount rate at or above which a deal is tagged hot.
pub const HOT_DISCOUNT_RATE: i32 = 50;

const DESCRIPTION_MAX_CHARS: usize = 200;

/// Keyword groups in match order. The first group with a hit decides.
const CATEGORY_KEYWORDS: [(Category, &[&str]); 6] = [
    (
        Category::Fashion,
        &["의류", "패션", "신발", "운동화", "티셔츠", "자켓", "패딩"],
    ),
    (
        Category::Food,
        &["음식", "식품", "맛집", "라면", "커피", "과자", "아이스크림", "생수", "고기"],
    ),
    (
        Category::Tech,
        &[
            "컴퓨터", "노트북", "모니터", "키보드", "마우스", "그래픽카드", "ssd", "cpu", "이어폰",
            "스마트폰", "태블릿", "아이패드", "갤럭시",
        ],
    ),
    (
        Category::Living,
        &["생활", "주방", "세제", "휴지", "침구", "가구", "수납"],
    ),
    (
        Category::Health,
        &["건강", "영양제", "비타민", "유산균", "마스크"],
    ),
    (
        Category::Gaming,
        &["게임", "닌텐도", "플스", "ps5", "스팀", "xbox"],
    ),
];

const FREE_SHIPPING_WORDS: [&str; 2] = ["무료", "무배"];
const COUPON_WORDS: [&str; 4] = ["쿠폰", "적립", "할인코드", "프로모션코드"];
const URGENT_WORDS: [&str; 6] = ["마감", "한정", "오늘만", "타임딜", "품절임박", "선착순"];
const NEW_WORDS: [&str; 4] = ["신상", "신제품", "출시", "new"];

pub const TAG_FREE_SHIPPING: &str = "🚚 무배";
pub const TAG_HOT: &str = "🔥 할인";
pub const TAG_COUPON: &str = "🎟️ 쿠폰";
pub const TAG_URGENT: &str = "⏰ 마감임박";
pub const TAG_NEW: &str = "✨ NEW";

/// Deal ids are `"{source_name}-{ordinal}"` with a 1-based ordinal inside the
/// batch. Ids repeat across runs, so storage must upsert by id.
#[must_use]
pub fn deal_id(source_name: &str, ordinal: usize) -> String {
    format!("{source_name}-{ordinal}")
}

#[must_use]
pub fn categorize(title: &str) -> Category {
    let title = title.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| title.contains(w)))
        .map_or(Category::General, |(category, _)| *category)
}

/// Tags in priority order, truncated to [`MAX_TAGS`].
#[must_use]
pub fn build_tags(title: &str, price: &PriceInfo) -> Vec<String> {
    let lower = title.to_lowercase();
    let has_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    let rules = [
        (
            has_any(&FREE_SHIPPING_WORDS) || price.delivery_info == DELIVERY_FREE,
            TAG_FREE_SHIPPING,
        ),
        (price.discount_rate >= HOT_DISCOUNT_RATE, TAG_HOT),
        (has_any(&COUPON_WORDS), TAG_COUPON),
        (has_any(&URGENT_WORDS), TAG_URGENT),
        (has_any(&NEW_WORDS), TAG_NEW),
    ];

    rules
        .into_iter()
        .filter(|(hit, _)| *hit)
        .map(|(_, tag)| tag.to_string())
        .take(MAX_TAGS)
        .collect()
}

/// Parses a feed date. RSS uses RFC 2822, Atom and our own files RFC 3339.
#[must_use]
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Human-readable age of `published` relative to `now`. Future dates read as
/// "just now".
#[must_use]
pub fn recency_label(published: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - published).num_minutes();
    if minutes < 1 {
        "방금 전".to_string()
    } else if minutes < 60 {
        format!("{minutes}분 전")
    } else if minutes < 1_440 {
        format!("{}시간 전", minutes / 60)
    } else {
        format!("{}일 전", minutes / 1_440)
    }
}

/// [`recency_label`] for a raw feed date string.
#[must_use]
pub fn time_ago(pub_date: Option<&str>, now: DateTime<Utc>) -> String {
    pub_date
        .and_then(parse_pub_date)
        .map_or_else(|| UNKNOWN_TIME.to_string(), |dt| recency_label(dt, now))
}

/// Strips markup, decodes the common entities and collapses whitespace,
/// truncating to 200 characters.
pub(crate) fn clean_description(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());
    let mut in_tag = false;
    for ch in raw.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }

    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    let collapsed = decoded.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() > DESCRIPTION_MAX_CHARS {
        let mut cut: String = collapsed.chars().take(DESCRIPTION_MAX_CHARS).collect();
        cut.push_str("...");
        cut
    } else {
        collapsed
    }
}

/// Builds the canonical deal for the `ordinal`-th (1-based) item of a batch.
#[must_use]
pub fn normalize_deal(
    item: &FeedItem,
    price: &PriceInfo,
    source: &SourceConfig,
    ordinal: usize,
    crawled_at: DateTime<Utc>,
) -> Deal {
    let title = item
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(UNTITLED)
        .to_string();

    let url = item
        .link
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(source.url.as_str())
        .to_string();

    let pub_date = item
        .pub_date
        .as_deref()
        .and_then(parse_pub_date)
        .unwrap_or(crawled_at);

    Deal {
        id: deal_id(&source.name, ordinal),
        category: categorize(&title),
        tags: build_tags(&title, price),
        title,
        price: price.price,
        original_price: price.original_price,
        discount_rate: price.discount_rate,
        has_price: price.has_price,
        price_text: price.price_text.clone(),
        mall_name: source.display_name.clone(),
        mall_logo: source.logo.clone(),
        url,
        description: item
            .description
            .as_deref()
            .map(clean_description)
            .unwrap_or_default(),
        pub_date,
        source: source.source_label(),
        delivery_info: price.delivery_info.clone(),
        crawled_at,
    }
}

/// Priced deals first, then newest first.
pub fn sort_for_display(deals: &mut [Deal]) {
    deals.sort_by(|a, b| {
        b.has_price
            .cmp(&a.has_price)
            .then_with(|| b.pub_date.cmp(&a.pub_date))
    });
}
