//! In-Memory Catalog
//!
//! Static demo catalog of laptops and smartphones sold in Vietnam, with a
//! handful of reviews. Ranking is keyword overlap, ties broken by rating.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::{ProductCatalog, ProductFilter};
use crate::error::Result;
use crate::model::{Category, Product, Review};

/// Catalog backed by vectors held in memory
pub struct MemoryCatalog {
    products: Vec<Product>,
    reviews: HashMap<String, Vec<Review>>,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalog {
    /// Catalog with the built-in demo data
    pub fn new() -> Self {
        Self::with_data(seed_products(), seed_reviews())
    }

    pub fn with_data(products: Vec<Product>, reviews: Vec<Review>) -> Self {
        let mut by_product: HashMap<String, Vec<Review>> = HashMap::new();
        for review in reviews {
            by_product.entry(review.product_id.clone()).or_default().push(review);
        }
        Self {
            products,
            reviews: by_product,
        }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    fn relevance(product: &Product, query_terms: &[String]) -> usize {
        let haystack = terms(&format!(
            "{} {} {} {} {}",
            product.name,
            product.brand,
            product.category,
            product.description,
            product.features.join(" ")
        ));
        query_terms.iter().filter(|t| haystack.contains(t)).count()
    }
}

/// Lower-cased alphanumeric words
fn terms(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl ProductCatalog for MemoryCatalog {
    async fn search(
        &self,
        query: &str,
        filter: &ProductFilter,
        top_k: usize,
    ) -> Result<Vec<Product>> {
        let query_terms = terms(query);
        let mut ranked: Vec<(usize, &Product)> = self
            .products
            .iter()
            .filter(|p| filter.matches(p))
            .map(|p| (Self::relevance(p, &query_terms), p))
            .collect();

        ranked.sort_by(|(sa, a), (sb, b)| {
            sb.cmp(sa).then_with(|| b.rating.total_cmp(&a.rating))
        });

        tracing::debug!(
            query,
            matched = ranked.len(),
            top_k,
            "Catalog search"
        );

        Ok(ranked.into_iter().take(top_k).map(|(_, p)| p.clone()).collect())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Product>> {
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return Ok(None);
        }

        if let Some(p) = self.products.iter().find(|p| p.name.to_lowercase() == wanted) {
            return Ok(Some(p.clone()));
        }

        if let Some(p) = self.products.iter().find(|p| {
            let own = p.name.to_lowercase();
            own.contains(&wanted) || wanted.contains(&own)
        }) {
            return Ok(Some(p.clone()));
        }

        // at least half of the words must match
        let wanted_terms = terms(&wanted);
        let best = self
            .products
            .iter()
            .map(|p| {
                let own = terms(&p.name);
                (wanted_terms.iter().filter(|t| own.contains(t)).count(), p)
            })
            .filter(|(hits, _)| *hits > 0 && hits * 2 >= wanted_terms.len())
            .max_by(|(ha, a), (hb, b)| ha.cmp(hb).then_with(|| a.rating.total_cmp(&b.rating)));

        Ok(best.map(|(_, p)| p.clone()))
    }

    async fn reviews(&self, product_id: &str) -> Result<Vec<Review>> {
        Ok(self.reviews.get(product_id).cloned().unwrap_or_default())
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[allow(clippy::too_many_arguments)]
fn product(
    id: &str,
    name: &str,
    brand: &str,
    category: Category,
    price: Decimal,
    rating: f32,
    description: &str,
    features: &[&str],
    specs: &[(&str, &str)],
) -> Product {
    Product {
        id: id.into(),
        name: name.into(),
        brand: brand.into(),
        category,
        price,
        rating,
        description: description.into(),
        features: features.iter().map(|f| (*f).to_string()).collect(),
        specs: specs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

fn seed_products() -> Vec<Product> {
    use Category::{Laptop, Smartphone};
    vec![
        product(
            "lap-dell-inspiron-15",
            "Dell Inspiron 15 3520",
            "Dell",
            Laptop,
            dec!(15990000),
            4.3,
            "Laptop văn phòng màn hình 15.6 inch, bền bỉ, phù hợp học tập và làm việc",
            &["ssd", "wifi 6", "bàn phím số", "pin lâu"],
            &[("cpu", "Intel Core i5-1235U"), ("ram", "8GB"), ("storage", "512GB SSD")],
        ),
        product(
            "lap-dell-vostro-3430",
            "Dell Vostro 3430",
            "Dell",
            Laptop,
            dec!(13490000),
            4.1,
            "Laptop doanh nghiệp nhỏ gọn 14 inch, giá tốt cho văn phòng",
            &["ssd", "bảo mật vân tay", "nhẹ"],
            &[("cpu", "Intel Core i3-1305U"), ("ram", "8GB"), ("storage", "256GB SSD")],
        ),
        product(
            "lap-dell-xps-13-plus",
            "Dell XPS 13 Plus",
            "Dell",
            Laptop,
            dec!(32990000),
            4.6,
            "Ultrabook cao cấp, màn hình OLED cảm ứng, thiết kế mỏng nhẹ",
            &["ssd", "oled", "touchscreen", "màn hình đẹp", "nhẹ"],
            &[("cpu", "Intel Core i7-1360P"), ("ram", "16GB"), ("storage", "512GB SSD")],
        ),
        product(
            "lap-macbook-air-m2",
            "MacBook Air M2",
            "Apple",
            Laptop,
            dec!(24990000),
            4.8,
            "Laptop siêu mỏng nhẹ với chip Apple M2, pin cả ngày, màn hình Retina",
            &["ssd", "pin lâu", "màn hình đẹp", "nhẹ"],
            &[("cpu", "Apple M2"), ("ram", "8GB"), ("storage", "256GB SSD")],
        ),
        product(
            "lap-asus-rog-strix-g15",
            "ASUS ROG Strix G15",
            "ASUS",
            Laptop,
            dec!(28990000),
            4.5,
            "Laptop gaming hiệu năng cao, card đồ họa RTX 4060, màn hình 165Hz",
            &["ssd", "gaming", "card đồ họa rời", "tản nhiệt tốt", "hiệu năng cao"],
            &[("cpu", "AMD Ryzen 7 7735HS"), ("gpu", "RTX 4060"), ("ram", "16GB")],
        ),
        product(
            "lap-lenovo-thinkpad-e14",
            "Lenovo ThinkPad E14",
            "Lenovo",
            Laptop,
            dec!(18490000),
            4.4,
            "Laptop doanh nhân bàn phím tốt, bền bỉ, phù hợp làm việc và lập trình",
            &["ssd", "bàn phím tốt", "bền bỉ"],
            &[("cpu", "Intel Core i5-1335U"), ("ram", "16GB"), ("storage", "512GB SSD")],
        ),
        product(
            "lap-hp-pavilion-15",
            "HP Pavilion 15",
            "HP",
            Laptop,
            dec!(16990000),
            4.2,
            "Laptop đa năng cho sinh viên, học tập và giải trí",
            &["ssd", "loa hay", "pin lâu"],
            &[("cpu", "Intel Core i5-1335U"), ("ram", "8GB"), ("storage", "512GB SSD")],
        ),
        product(
            "phone-iphone-15",
            "iPhone 15",
            "Apple",
            Smartphone,
            dec!(22990000),
            4.7,
            "Điện thoại Apple với camera 48MP, Dynamic Island, cổng USB-C",
            &["camera đẹp", "chụp ảnh", "hiệu năng cao", "pin lâu"],
            &[("chip", "A16 Bionic"), ("storage", "128GB"), ("screen", "6.1 inch")],
        ),
        product(
            "phone-galaxy-s24",
            "Samsung Galaxy S24",
            "Samsung",
            Smartphone,
            dec!(20990000),
            4.6,
            "Điện thoại Android cao cấp với Galaxy AI, camera zoom 3x",
            &["camera đẹp", "chụp ảnh", "màn hình đẹp", "sạc nhanh"],
            &[("chip", "Exynos 2400"), ("storage", "256GB"), ("screen", "6.2 inch")],
        ),
        product(
            "phone-redmi-note-13",
            "Xiaomi Redmi Note 13",
            "Xiaomi",
            Smartphone,
            dec!(5490000),
            4.2,
            "Điện thoại giá rẻ màn hình AMOLED 120Hz, pin 5000mAh",
            &["pin lâu", "sạc nhanh", "màn hình đẹp"],
            &[("chip", "Snapdragon 685"), ("storage", "128GB"), ("screen", "6.67 inch")],
        ),
        product(
            "phone-oppo-reno11",
            "OPPO Reno11 F",
            "OPPO",
            Smartphone,
            dec!(8990000),
            4.3,
            "Điện thoại tầm trung thiết kế đẹp, camera chân dung",
            &["camera đẹp", "chụp ảnh", "sạc nhanh"],
            &[("chip", "Dimensity 7050"), ("storage", "256GB"), ("screen", "6.7 inch")],
        ),
    ]
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

#[allow(clippy::too_many_arguments)]
fn review(
    product_id: &str,
    author: &str,
    rating: u8,
    content: &str,
    pros: &[&str],
    cons: &[&str],
    date: NaiveDate,
    helpful: u32,
) -> Review {
    Review {
        product_id: product_id.into(),
        author: author.into(),
        rating,
        content: content.into(),
        pros: pros.iter().map(|s| (*s).to_string()).collect(),
        cons: cons.iter().map(|s| (*s).to_string()).collect(),
        date,
        helpful,
    }
}

fn seed_reviews() -> Vec<Review> {
    vec![
        review(
            "lap-dell-inspiron-15",
            "Minh Anh",
            4,
            "Máy chạy ổn định, dùng văn phòng rất tốt",
            &["bền", "bàn phím êm"],
            &["hơi nặng"],
            day(2024, 3, 12),
            14,
        ),
        review(
            "lap-dell-inspiron-15",
            "Quốc Bảo",
            5,
            "Giá hợp lý, pin đủ dùng cả buổi học",
            &["giá tốt", "pin ổn"],
            &[],
            day(2024, 5, 2),
            9,
        ),
        review(
            "lap-dell-inspiron-15",
            "Thu Hà",
            3,
            "Màn hình hơi tối khi dùng ngoài trời",
            &["cấu hình ổn"],
            &["màn hình tối"],
            day(2023, 11, 20),
            5,
        ),
        review(
            "lap-dell-vostro-3430",
            "Hoàng Long",
            4,
            "Nhỏ gọn, mang đi làm tiện",
            &["nhẹ", "giá rẻ"],
            &["ổ cứng nhỏ"],
            day(2024, 1, 8),
            7,
        ),
        review(
            "lap-dell-xps-13-plus",
            "Ngọc Trâm",
            5,
            "Thiết kế đẹp nhất từng dùng, màn OLED tuyệt vời",
            &["màn hình đẹp", "mỏng nhẹ"],
            &["giá cao", "ít cổng kết nối"],
            day(2024, 4, 18),
            21,
        ),
        review(
            "lap-dell-xps-13-plus",
            "Đức Huy",
            4,
            "Hiệu năng tốt nhưng hơi nóng khi tải nặng",
            &["hiệu năng tốt"],
            &["nóng"],
            day(2024, 2, 27),
            11,
        ),
        review(
            "lap-macbook-air-m2",
            "Lan Phương",
            5,
            "Pin cực trâu, máy mát và êm",
            &["pin lâu", "không quạt"],
            &["ít cổng"],
            day(2024, 6, 1),
            30,
        ),
        review(
            "lap-asus-rog-strix-g15",
            "Tuấn Kiệt",
            5,
            "Chơi game mượt, tản nhiệt tốt",
            &["fps cao", "tản nhiệt tốt"],
            &["nặng", "pin yếu"],
            day(2024, 3, 30),
            18,
        ),
        review(
            "phone-iphone-15",
            "Bảo Ngọc",
            5,
            "Camera chụp chân dung rất đẹp",
            &["camera đẹp", "mượt"],
            &["sạc chậm"],
            day(2024, 2, 14),
            25,
        ),
        review(
            "phone-galaxy-s24",
            "Văn Nam",
            4,
            "Galaxy AI khá hữu ích, máy nhỏ gọn",
            &["nhỏ gọn", "AI hay"],
            &["pin trung bình"],
            day(2024, 4, 5),
            12,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_search_applies_filter_and_top_k() {
        let catalog = MemoryCatalog::new();
        let filter = ProductFilter {
            category: Some(Category::Laptop),
            brand: Some("Dell".into()),
            price_max: Some(dec!(20000000)),
            ..Default::default()
        };
        let found = catalog.search("laptop dell", &filter, 5).await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| p.brand == "Dell" && p.price <= dec!(20000000)));

        let one = catalog.search("laptop", &ProductFilter::default(), 1).await.unwrap();
        assert_eq!(one.len(), 1);
    }

    #[tokio::test]
    async fn test_search_ranks_by_overlap_then_rating() {
        let catalog = MemoryCatalog::new();
        let found = catalog
            .search("laptop gaming", &ProductFilter::default(), 3)
            .await
            .unwrap();
        assert_eq!(found[0].name, "ASUS ROG Strix G15");
    }

    #[tokio::test]
    async fn test_find_by_name() {
        let catalog = MemoryCatalog::new();
        let exact = catalog.find_by_name("dell xps 13 plus").await.unwrap();
        assert_eq!(exact.unwrap().id, "lap-dell-xps-13-plus");

        let partial = catalog.find_by_name("iPhone").await.unwrap();
        assert_eq!(partial.unwrap().id, "phone-iphone-15");

        assert!(catalog.find_by_name("Nokia 3310").await.unwrap().is_none());
        assert!(catalog.find_by_name("  ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reviews_by_product() {
        let catalog = MemoryCatalog::new();
        assert_eq!(catalog.reviews("lap-dell-inspiron-15").await.unwrap().len(), 3);
        assert!(catalog.reviews("phone-oppo-reno11").await.unwrap().is_empty());
    }
}
