use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Item listing. `seller_id` is set once at creation and never rewritten.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub seller_id: Uuid,
    pub images: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub seller_id: Uuid,
    pub images: Vec<String>,
}

/// Editable item fields. There is deliberately no `seller_id` here.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub images: Option<Vec<String>>,
}

impl Item {
    pub fn apply(&mut self, patch: ItemPatch, now: OffsetDateTime) {
        if let Some(v) = patch.title {
            self.title = v;
        }
        if let Some(v) = patch.description {
            self.description = v;
        }
        if let Some(v) = patch.price {
            self.price = v;
        }
        if let Some(v) = patch.category {
            self.category = v;
        }
        if let Some(v) = patch.images {
            self.images = v;
        }
        self.updated_at = now;
    }
}

/// Listing filters. Every present field must match; absent fields match anything.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFilter {
    pub category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
    /// Case-insensitive substring of the seller's username.
    pub author: Option<String>,
}

impl ItemFilter {
    /// Drops blank text filters so `?category=` behaves like no filter at all.
    pub fn normalized(mut self) -> Self {
        fn keep(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        self.category = keep(self.category);
        self.title = keep(self.title);
        self.author = keep(self.author);
        self
    }

    pub fn matches(&self, item: &Item, seller_username: &str) -> bool {
        if let Some(category) = &self.category {
            if &item.category != category {
                return false;
            }
        }
        if let Some(min) = self.min_price {
            if item.price < min {
                return false;
            }
        }
        if let Some(max) = self.max_price {
            if item.price > max {
                return false;
            }
        }
        if let Some(title) = &self.title {
            if !contains_ci(&item.title, title) {
                return false;
            }
        }
        if let Some(author) = &self.author {
            if !contains_ci(seller_username, author) {
                return false;
            }
        }
        true
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, category: &str, price: f64) -> Item {
        let now = OffsetDateTime::now_utc();
        Item {
            id: Uuid::new_v4(),
            title: title.into(),
            description: "desc".into(),
            price,
            category: category.into(),
            seller_id: Uuid::new_v4(),
            images: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let f = ItemFilter::default();
        assert!(f.matches(&item("Dune", "books", 10.0), "alice"));
    }

    #[test]
    fn filters_combine_with_and() {
        let f = ItemFilter {
            category: Some("books".into()),
            max_price: Some(60.0),
            ..Default::default()
        };
        assert!(f.matches(&item("Dune", "books", 50.0), "alice"));
        assert!(!f.matches(&item("Dune", "books", 70.0), "alice"));
        assert!(!f.matches(&item("Dune", "games", 50.0), "alice"));
    }

    #[test]
    fn price_bounds_are_inclusive() {
        let f = ItemFilter {
            min_price: Some(10.0),
            max_price: Some(20.0),
            ..Default::default()
        };
        assert!(f.matches(&item("a", "x", 10.0), "u"));
        assert!(f.matches(&item("a", "x", 20.0), "u"));
        assert!(!f.matches(&item("a", "x", 9.99), "u"));
    }

    #[test]
    fn title_and_author_are_case_insensitive_substrings() {
        let f = ItemFilter {
            title: Some("UNE".into()),
            author: Some("lic".into()),
            ..Default::default()
        };
        assert!(f.matches(&item("Dune", "books", 1.0), "Alice"));
        assert!(!f.matches(&item("Dune", "books", 1.0), "bob"));
    }

    #[test]
    fn category_is_exact() {
        let f = ItemFilter {
            category: Some("book".into()),
            ..Default::default()
        };
        assert!(!f.matches(&item("Dune", "books", 1.0), "a"));
    }

    #[test]
    fn blank_text_filters_are_dropped() {
        let f = ItemFilter {
            category: Some("  ".into()),
            title: Some(String::new()),
            ..Default::default()
        }
        .normalized();
        assert!(f.category.is_none());
        assert!(f.title.is_none());
    }

    #[test]
    fn patch_never_touches_seller() {
        let mut it = item("old", "books", 5.0);
        let seller = it.seller_id;
        let later = it.updated_at + time::Duration::seconds(5);
        it.apply(
            ItemPatch {
                title: Some("new".into()),
                ..Default::default()
            },
            later,
        );
        assert_eq!(it.title, "new");
        assert_eq!(it.seller_id, seller);
        assert_eq!(it.updated_at, later);
    }
}
