//! In-memory search, filtering and ordering over deal listings.

use std::cmp::Ordering;

use serde::Deserialize;

use crate::deals::{Category, Deal};

/// Listing filters. Every `None` means "no constraint".
#[derive(Debug, Clone, Default)]
pub struct DealFilter {
    pub category: Option<Category>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_discount: Option<i32>,
    pub malls: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Latest,
    PriceLow,
    PriceHigh,
    Discount,
}

impl std::str::FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(SortBy::Latest),
            "price_low" => Ok(SortBy::PriceLow),
            "price_high" => Ok(SortBy::PriceHigh),
            "discount" => Ok(SortBy::Discount),
            other => Err(format!(
                "unknown sort '{other}'; expected latest, price_low, price_high or discount"
            )),
        }
    }
}

/// Case-insensitive match against title, mall name and Korean category aliases.
///
/// A blank query returns every deal.
#[must_use]
pub fn search_deals(deals: &[Deal], query: &str) -> Vec<Deal> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return deals.to_vec();
    }

    deals
        .iter()
        .filter(|deal| {
            deal.title.to_lowercase().contains(&query)
                || deal.mall_name.to_lowercase().contains(&query)
                || deal
                    .category
                    .aliases()
                    .iter()
                    .any(|alias| query.contains(alias))
        })
        .cloned()
        .collect()
}

/// Applies every constraint in `filter`. Deals without a price never pass a
/// price-range constraint.
#[must_use]
pub fn filter_deals(deals: &[Deal], filter: &DealFilter) -> Vec<Deal> {
    deals
        .iter()
        .filter(|d| filter.category.is_none_or(|c| d.category == c))
        .filter(|d| {
            filter
                .min_price
                .is_none_or(|min| d.price.is_some_and(|p| p >= min))
        })
        .filter(|d| {
            filter
                .max_price
                .is_none_or(|max| d.price.is_some_and(|p| p <= max))
        })
        .filter(|d| filter.min_discount.is_none_or(|min| d.discount_rate >= min))
        .filter(|d| filter.malls.is_empty() || filter.malls.iter().any(|m| *m == d.mall_name))
        .cloned()
        .collect()
}

/// Sorts in place. Price orderings push deals without a price to the end.
pub fn sort_deals(deals: &mut [Deal], sort_by: SortBy) {
    match sort_by {
        SortBy::Latest => deals.sort_by(|a, b| b.pub_date.cmp(&a.pub_date)),
        SortBy::PriceLow => deals.sort_by(|a, b| cmp_price(a.price, b.price, false)),
        SortBy::PriceHigh => deals.sort_by(|a, b| cmp_price(a.price, b.price, true)),
        SortBy::Discount => deals.sort_by(|a, b| b.discount_rate.cmp(&a.discount_rate)),
    }
}

fn cmp_price(a: Option<i64>, b: Option<i64>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if descending => b.cmp(&a),
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
