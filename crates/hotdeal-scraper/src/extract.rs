//! Price extraction from free-text deal titles.
//!
//! Community deal boards put the price in the title, usually in a trailing
//! bracket such as `(22,500원/무료)` or `(12,500원/25,000원)`, but the
//! punctuation is inconsistent. Extraction runs an ordered list of rules,
//! most specific first, and the first rule that yields a valid price wins.
//! Later rules are looser and would over-match text an earlier rule already
//! understands, so the order in [`PriceTier::ALL`] must not change.
//!
//! Extraction is total: a title without a recognisable price produces
//! [`PriceInfo::none`], never an error.

use std::sync::LazyLock;

use hotdeal_core::{format_won, PriceInfo, DELIVERY_FREE, DELIVERY_PAID, DELIVERY_UNKNOWN};
use regex::{Captures, Regex};

/// Smallest amount the free-text rule accepts as a price.
pub const FREE_TEXT_MIN: i64 = 100;
/// Largest amount the free-text rule accepts as a price.
pub const FREE_TEXT_MAX: i64 = 10_000_000;

const FREE_MARKERS: [&str; 2] = ["무료", "무배"];
const PAID_MARKERS: [&str; 2] = ["유료", "착불"];

/// One extraction rule, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceTier {
    /// `(12,500원/25,000원)` or `(22,500원/무료)`.
    Paired,
    /// `(카드 9,800원/무료)`: a non-numeric prefix glued to the amount.
    Prefixed,
    /// `(9,900원)` with no separator.
    BareBracket,
    /// `카드 9,900원`, `특가 5,000원` anywhere in the title.
    Keyword,
    /// First `<amount>원` anywhere, within [`FREE_TEXT_MIN`]..=[`FREE_TEXT_MAX`].
    FreeText,
}

impl PriceTier {
    pub const ALL: [PriceTier; 5] = [
        PriceTier::Paired,
        PriceTier::Prefixed,
        PriceTier::BareBracket,
        PriceTier::Keyword,
        PriceTier::FreeText,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            PriceTier::Paired => "paired",
            PriceTier::Prefixed => "prefixed",
            PriceTier::BareBracket => "bare_bracket",
            PriceTier::Keyword => "keyword",
            PriceTier::FreeText => "free_text",
        }
    }

    /// Runs this rule alone. Only the leftmost match of the rule's pattern is
    /// considered; if its amount is malformed the rule yields `None`.
    #[must_use]
    pub fn apply(self, title: &str) -> Option<PriceInfo> {
        let rule = RULES.iter().find(|rule| rule.tier == self)?;
        let caps = rule.pattern.captures(title)?;
        (rule.handler)(&caps, title)
    }
}

type Handler = fn(&Captures<'_>, &str) -> Option<PriceInfo>;

struct PriceRule {
    tier: PriceTier,
    pattern: Regex,
    handler: Handler,
}

static RULES: LazyLock<[PriceRule; 5]> = LazyLock::new(|| {
    [
        PriceRule {
            tier: PriceTier::Paired,
            pattern: Regex::new(r"\(\s*([0-9][0-9,.]*)\s*원\s*[/|]\s*([^)]*)\)")
                .expect("valid paired price regex"),
            handler: bracket_with_remainder,
        },
        PriceRule {
            tier: PriceTier::Prefixed,
            pattern: Regex::new(r"\([^0-9()/|]+([0-9][0-9,.]*)\s*원\s*[/|]\s*([^)]*)\)")
                .expect("valid prefixed price regex"),
            handler: bracket_with_remainder,
        },
        PriceRule {
            tier: PriceTier::BareBracket,
            pattern: Regex::new(r"\([^0-9()/|]*([0-9][0-9,.]*)\s*원\s*\)")
                .expect("valid bare bracket price regex"),
            handler: single_amount,
        },
        PriceRule {
            tier: PriceTier::Keyword,
            pattern: Regex::new(r"(?:카드|쿠폰가|할인가|특가)\s*([0-9][0-9,.]*)\s*원")
                .expect("valid keyword price regex"),
            handler: single_amount,
        },
        PriceRule {
            tier: PriceTier::FreeText,
            pattern: Regex::new(r"([0-9][0-9,.]*)\s*원").expect("valid free text price regex"),
            handler: bounded_amount,
        },
    ]
});

static REMAINDER_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9][0-9,.]*)\s*원").expect("valid remainder amount regex")
});

/// Extracts structured price information from a deal title.
///
/// `source_name` only feeds the trace log; it never changes the result.
#[must_use]
pub fn extract_price_info(title: &str, source_name: &str) -> PriceInfo {
    for tier in PriceTier::ALL {
        if let Some(info) = tier.apply(title) {
            tracing::trace!(
                source = source_name,
                tier = tier.name(),
                price = info.price,
                discount_rate = info.discount_rate,
                "price extracted"
            );
            return info;
        }
    }

    tracing::trace!(source = source_name, "no price found in title");
    PriceInfo::none()
}

fn bracket_with_remainder(caps: &Captures<'_>, title: &str) -> Option<PriceInfo> {
    let price = parse_amount(caps.get(1)?.as_str())?;
    let original = caps
        .get(2)
        .and_then(|m| REMAINDER_AMOUNT.captures(m.as_str().trim()))
        .and_then(|c| c.get(1))
        .and_then(|m| parse_amount(m.as_str()))
        .filter(|&original| original > price);

    Some(match original {
        Some(original) => priced(price, original, discount_rate(price, original), title),
        None => priced(price, price, 0, title),
    })
}

fn single_amount(caps: &Captures<'_>, title: &str) -> Option<PriceInfo> {
    let price = parse_amount(caps.get(1)?.as_str())?;
    Some(priced(price, price, 0, title))
}

fn bounded_amount(caps: &Captures<'_>, title: &str) -> Option<PriceInfo> {
    let price = parse_amount(caps.get(1)?.as_str())?;
    if !(FREE_TEXT_MIN..=FREE_TEXT_MAX).contains(&price) {
        return None;
    }
    Some(priced(price, price, 0, title))
}

fn priced(price: i64, original: i64, discount_rate: i32, title: &str) -> PriceInfo {
    PriceInfo {
        price: Some(price),
        original_price: Some(original),
        discount_rate,
        has_price: true,
        price_text: format_won(price),
        delivery_info: delivery_info(title).to_string(),
    }
}

/// Strips thousands separators. Anything other than ASCII digits left over
/// (a decimal point, a stray letter) or an `i64` overflow rejects the amount.
fn parse_amount(raw: &str) -> Option<i64> {
    let digits: String = raw.chars().filter(|&c| c != ',').collect();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// `round((original - price) / original * 100)`, half rounding up.
/// Callers guarantee `original > price >= 0`.
fn discount_rate(price: i64, original: i64) -> i32 {
    let diff = i128::from(original - price);
    let original = i128::from(original);
    let rate = (200 * diff + original) / (2 * original);
    i32::try_from(rate).unwrap_or(100)
}

fn delivery_info(title: &str) -> &'static str {
    if FREE_MARKERS.iter().any(|m| title.contains(m)) {
        DELIVERY_FREE
    } else if PAID_MARKERS.iter().any(|m| title.contains(m)) {
        DELIVERY_PAID
    } else {
        DELIVERY_UNKNOWN
    }
}

#[cfg(test)]
mod tests {
    use hotdeal_core::NO_PRICE_TEXT;

    use super::*;

    fn extract(title: &str) -> PriceInfo {
        extract_price_info(title, "test")
    }

    #[test]
    fn single_amount_with_free_shipping() {
        let info = extract("하겐다즈 아이스크림 (22,500원/무료)");
        assert!(info.has_price);
        assert_eq!(info.price, Some(22_500));
        assert_eq!(info.original_price, Some(22_500));
        assert_eq!(info.discount_rate, 0);
        assert_eq!(info.price_text, "22,500원");
        assert_eq!(info.delivery_info, DELIVERY_FREE);
    }

    #[test]
    fn paired_amounts_compute_discount() {
        let info = extract("상품명 (12,500원/25,000원)");
        assert_eq!(info.price, Some(12_500));
        assert_eq!(info.original_price, Some(25_000));
        assert_eq!(info.discount_rate, 50);
        assert!(info.has_price);
        assert_eq!(info.delivery_info, DELIVERY_UNKNOWN);
    }

    #[test]
    fn discount_rounds_half_up() {
        // 1 - 2/3 = 33.33..%, 1 - 1/8 = 12.5%
        assert_eq!(extract("A (2,000원/3,000원)").discount_rate, 33);
        assert_eq!(extract("B (7,000원/8,000원)").discount_rate, 13);
        assert_eq!(extract("C (1원/3원)").discount_rate, 67);
    }

    #[test]
    fn smaller_second_amount_is_not_an_original_price() {
        let info = extract("상품 (25,000원/3,000원)");
        assert_eq!(info.price, Some(25_000));
        assert_eq!(info.original_price, Some(25_000));
        assert_eq!(info.discount_rate, 0);
    }

    #[test]
    fn pipe_separator_is_accepted() {
        let info = extract("키보드 (39,000원 | 무배)");
        assert_eq!(info.price, Some(39_000));
        assert_eq!(info.delivery_info, DELIVERY_FREE);
    }

    #[test]
    fn no_price_yields_sentinel() {
        let info = extract("가격 미정 상품");
        assert!(!info.has_price);
        assert!(info.price.is_none());
        assert!(info.original_price.is_none());
        assert_eq!(info.price_text, NO_PRICE_TEXT);
        assert_eq!(info, PriceInfo::none());
    }

    #[test]
    fn empty_title_yields_sentinel() {
        assert_eq!(extract(""), PriceInfo::none());
    }

    #[test]
    fn prefixed_amount_is_stripped() {
        let info = extract("[G마켓] 생수 2L (유클11,900원/유클무료)");
        assert_eq!(PriceTier::Paired.apply("[G마켓] 생수 2L (유클11,900원/유클무료)"), None);
        assert_eq!(info.price, Some(11_900));
        assert_eq!(info.delivery_info, DELIVERY_FREE);
    }

    #[test]
    fn prefixed_amount_with_space() {
        let info = extract("모니터 (카드 189,000원/무료)");
        assert_eq!(info.price, Some(189_000));
    }

    #[test]
    fn bare_bracket_amount() {
        let info = extract("[쿠팡] 라면 40봉 (19,800원)");
        assert_eq!(info.price, Some(19_800));
        assert_eq!(info.discount_rate, 0);
        assert_eq!(info.delivery_info, DELIVERY_UNKNOWN);
    }

    #[test]
    fn keyword_amount_outside_brackets() {
        let info = extract("삼성 SSD 1TB 카드 9,900원 착불");
        assert_eq!(info.price, Some(9_900));
        assert_eq!(info.delivery_info, DELIVERY_PAID);
        assert_eq!(PriceTier::Keyword.apply("특가 5,000원 행사").and_then(|i| i.price), Some(5_000));
    }

    #[test]
    fn malformed_amount_falls_through_every_tier() {
        let info = extract("우유 (1.500원/무료)");
        assert!(!info.has_price);
    }

    #[test]
    fn malformed_bracket_falls_through_to_keyword() {
        let info = extract("(1.500원/무료) 카드 9,900원");
        assert_eq!(info.price, Some(9_900));
    }

    #[test]
    fn paired_tier_beats_earlier_bare_bracket() {
        let info = extract("묶음 (5,000원) (10,000원/무료)");
        assert_eq!(info.price, Some(10_000));
    }

    #[test]
    fn free_text_respects_bounds() {
        assert_eq!(extract("커피 4,500원 할인").price, Some(4_500));
        assert!(!extract("포인트 50원 적립").has_price);
        assert!(!extract("상금 99,999,999원").has_price);
        assert_eq!(extract("최소 100원").price, Some(100));
        assert_eq!(extract("최대 10,000,000원").price, Some(10_000_000));
    }

    #[test]
    fn free_text_only_considers_first_amount() {
        assert!(!extract("적립 10원 그리고 5,000원").has_price);
    }

    #[test]
    fn overflowing_amount_is_rejected() {
        assert!(!extract("(99999999999999999999원)").has_price);
    }

    #[test]
    fn extraction_is_idempotent() {
        let title = "에어팟 프로 (249,000원/359,000원) 무료배송";
        assert_eq!(extract(title), extract(title));
    }

    #[test]
    fn source_name_does_not_change_result() {
        let title = "노트북 (990,000원/무료)";
        assert_eq!(
            extract_price_info(title, "ppomppu"),
            extract_price_info(title, "ruliweb")
        );
    }

    #[test]
    fn tier_order_is_stable() {
        let names: Vec<_> = PriceTier::ALL.iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec!["paired", "prefixed", "bare_bracket", "keyword", "free_text"]
        );
    }

    #[test]
    fn has_price_matches_price_presence() {
        for title in [
            "하겐다즈 (22,500원/무료)",
            "가격 미정",
            "(1.5원)",
            "특가 3,000원",
            "",
        ] {
            let info = extract(title);
            assert_eq!(info.has_price, info.price.is_some(), "{title}");
            assert!((0..=100).contains(&info.discount_rate), "{title}");
        }
    }
}
