//! Shared fixtures for unit tests

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use once_cell::sync::Lazy;
use uuid::Uuid;

use crate::record::{Entity, Record, SoftDelete, Value};
use crate::schema::{ScalarKind, Schema};

pub(crate) fn category_schema() -> &'static Schema {
    static SCHEMA: Lazy<Schema> = Lazy::new(|| {
        Schema::builder("Category", "categories")
            .id("id")
            .text("name")
            .build()
    });
    &SCHEMA
}

pub(crate) fn tag_schema() -> &'static Schema {
    static SCHEMA: Lazy<Schema> = Lazy::new(|| {
        Schema::builder("Tag", "tags")
            .id("id")
            .text("name")
            .integer("weight")
            .build()
    });
    &SCHEMA
}

pub(crate) fn product_schema() -> &'static Schema {
    static SCHEMA: Lazy<Schema> = Lazy::new(|| {
        Schema::builder("Product", "products")
            .id("id")
            .text("name")
            .text("description")
            .float("price")
            .integer("stock")
            .uuid("sku")
            .date_time("created_at")
            .duration("lead_time")
            .reference("category", "category_id", category_schema)
            .collection("tags", "product_id", tag_schema)
            .scalar_collection("labels", "labels", ScalarKind::Text)
            .soft_delete("is_deleted", "deleted_at")
            .search_by(["name", "description", "category.name"])
            .build()
    });
    &SCHEMA
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Category {
    pub id: i64,
    pub name: String,
}

impl Record for Category {
    fn field(&self, name: &str) -> Value<'_> {
        match name {
            "id" => Value::from(self.id),
            "name" => Value::from(&self.name),
            _ => Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Tag {
    pub id: i64,
    pub name: String,
    pub weight: i64,
}

impl Tag {
    pub fn new(name: &str, weight: i64) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            weight,
        }
    }
}

impl Record for Tag {
    fn field(&self, name: &str) -> Value<'_> {
        match name {
            "id" => Value::from(self.id),
            "name" => Value::from(&self.name),
            "weight" => Value::from(self.weight),
            _ => Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub stock: i64,
    pub sku: Uuid,
    pub created_at: NaiveDateTime,
    pub lead_time: Option<TimeDelta>,
    pub category: Option<Category>,
    pub tags: Vec<Tag>,
    pub labels: Vec<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<NaiveDateTime>,
}

impl Product {
    pub fn new(name: &str, price: f64) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            description: None,
            price,
            stock: 0,
            sku: Uuid::nil(),
            created_at: at(2024, 1, 1, 0, 0),
            lead_time: None,
            category: None,
            tags: Vec::new(),
            labels: Vec::new(),
            is_deleted: false,
            deleted_at: None,
        }
    }
}

impl Record for Product {
    fn field(&self, name: &str) -> Value<'_> {
        match name {
            "id" => Value::from(self.id),
            "name" => Value::from(&self.name),
            "description" => Value::from(self.description.as_ref()),
            "price" => Value::from(self.price),
            "stock" => Value::from(self.stock),
            "sku" => Value::from(self.sku),
            "created_at" => Value::from(self.created_at),
            "lead_time" => Value::from(self.lead_time),
            "category" => Value::optional_record(self.category.as_ref()),
            "tags" => Value::records(self.tags.as_slice()),
            "labels" => Value::list(self.labels.as_slice()),
            "is_deleted" => Value::from(self.is_deleted),
            "deleted_at" => Value::from(self.deleted_at),
            _ => Value::Null,
        }
    }
}

impl Entity for Product {
    fn schema() -> &'static Schema {
        product_schema()
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl SoftDelete for Product {
    fn mark_deleted(&mut self, at: NaiveDateTime) {
        self.is_deleted = true;
        self.deleted_at = Some(at);
    }
}

/// Projection used by paginated listing tests
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ProductSummary {
    pub id: i64,
    pub name: String,
}

impl From<Product> for ProductSummary {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
        }
    }
}

pub(crate) fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .unwrap()
}

/// Five products; the last one is already soft deleted
///
/// | # | name              | category    | tags              | labels         |
/// |---|-------------------|-------------|-------------------|----------------|
/// | 0 | Mechanical Keyboard | Peripherals | sale(2), new(1) | usb, wired     |
/// | 1 | Wireless Mouse    | Peripherals | clearance(3)      | usb, wireless  |
/// | 2 | Studio Headphones | Audio       |                   |                |
/// | 3 | Desk Speaker      |             | sale(1)           | wireless       |
/// | 4 | Retired Webcam    | Peripherals |                   |                |
pub(crate) fn sample_products() -> Vec<Product> {
    let peripherals = Category {
        id: 1,
        name: "Peripherals".to_string(),
    };
    let audio = Category {
        id: 2,
        name: "Audio".to_string(),
    };

    vec![
        Product {
            description: Some("Clicky switches".to_string()),
            stock: 12,
            sku: Uuid::from_u128(1),
            created_at: at(2024, 1, 15, 10, 30),
            lead_time: Some(TimeDelta::days(2)),
            category: Some(peripherals.clone()),
            tags: vec![Tag::new("sale", 2), Tag::new("new", 1)],
            labels: vec!["usb".to_string(), "wired".to_string()],
            ..Product::new("Mechanical Keyboard", 89.99)
        },
        Product {
            stock: 40,
            sku: Uuid::from_u128(2),
            created_at: at(2024, 3, 1, 0, 0),
            category: Some(peripherals.clone()),
            tags: vec![Tag::new("clearance", 3)],
            labels: vec!["usb".to_string(), "wireless".to_string()],
            ..Product::new("Wireless Mouse", 25.5)
        },
        Product {
            description: Some("Closed back".to_string()),
            sku: Uuid::from_u128(3),
            created_at: at(2024, 10, 1, 18, 45),
            lead_time: Some(TimeDelta::hours(36)),
            category: Some(audio),
            ..Product::new("Studio Headphones", 149.0)
        },
        Product {
            description: Some("Bluetooth".to_string()),
            stock: 7,
            sku: Uuid::from_u128(4),
            created_at: at(2023, 12, 31, 23, 59),
            tags: vec![Tag::new("sale", 1)],
            labels: vec!["wireless".to_string()],
            ..Product::new("Desk Speaker", 59.0)
        },
        Product {
            description: Some("Discontinued".to_string()),
            stock: 3,
            sku: Uuid::from_u128(5),
            category: Some(peripherals),
            is_deleted: true,
            deleted_at: Some(at(2024, 6, 1, 12, 0)),
            ..Product::new("Retired Webcam", 39.0)
        },
    ]
}
