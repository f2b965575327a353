// models.rs
// Domain models for the MongoDB collections (users, sessions, products,
// incomes, expenses).

use mongodb::bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// Roles derived from the job position entered at sign-up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Manager,
    Admin,
}

impl UserRole {
    /// Maps a free-form job position to a role. Anything that is not an
    /// administrator position gets the manager role.
    pub fn from_position(position: &str) -> Self {
        let p = position.trim().to_lowercase();
        if p == "admin" || p == "administrator" || p == "администратор" {
            UserRole::Admin
        } else {
            UserRole::Manager
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Manager => "manager",
            UserRole::Admin => "admin",
        }
    }

    pub fn permission_level(&self) -> i32 {
        match self {
            UserRole::Manager => 1,
            UserRole::Admin => 2,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::Manager
    }
}

/// Denormalized per-user sales counters, updated in the same transaction
/// as the sale document they summarize.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SalesStats {
    #[serde(default)]
    pub total_sales: i64,
    #[serde(default)]
    pub open_sales: i64,
    #[serde(default)]
    pub closed_sales: i64,
}

/// User document stored in MongoDB. Doubles as the employee profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub middle_name: String,
    pub job_position: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub stats: SalesStats,
    pub created_at: DateTime,
}

impl User {
    /// Display name used for attribution fields, "last first".
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.last_name, self.first_name);
        let name = name.trim().to_string();
        if name.is_empty() {
            "unknown".to_string()
        } else {
            name
        }
    }
}

/// Session document linking an opaque token to a user and expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub token: String,
    pub user_email: String,
    pub expires_at: DateTime,
}

/// Catalog product. Stock is only mutated by catalog edits and by sale
/// lifecycle transitions in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub purchase_price: f64,
    pub stock: i64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// Lifecycle status of a sale. Transitions govern stock and statistics
/// side effects in the ledger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    Open,
    Closed,
    Canceled,
}

impl SaleStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(SaleStatus::Open),
            "closed" => Some(SaleStatus::Closed),
            "canceled" => Some(SaleStatus::Canceled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Open => "open",
            SaleStatus::Closed => "closed",
            SaleStatus::Canceled => "canceled",
        }
    }

    /// The per-user counter field tracking this status. Canceled sales
    /// have no dedicated counter.
    pub fn counter_field(&self) -> Option<&'static str> {
        match self {
            SaleStatus::Open => Some("stats.open_sales"),
            SaleStatus::Closed => Some("stats.closed_sales"),
            SaleStatus::Canceled => None,
        }
    }

    /// Whether stock is held (debited) while a sale is in this status.
    pub fn holds_stock(&self) -> bool {
        !matches!(self, SaleStatus::Canceled)
    }
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Open
    }
}

/// One product line of a sale; name and price are snapshots taken at
/// creation time. Legacy records carry no product reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SaleLine {
    #[serde(default)]
    pub product_id: Option<ObjectId>,
    pub name: String,
    pub price: f64,
    pub quantity: i64,
}

/// Canonical sale (income) document.
///
/// Historical income documents exist in a flat single-product shape
/// (`productName`, string `price`); those are adapted into this canonical
/// schema at the store boundary, see [`SaleDocument`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "SaleDocument")]
pub struct Sale {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub products: Vec<SaleLine>,
    pub client_name: String,
    pub client_phone: String,
    pub client_email: String,
    pub status: SaleStatus,
    pub created_date: DateTime,
    pub created_by: Option<ObjectId>,
    pub created_by_name: String,
    pub last_edited_by: Option<ObjectId>,
    pub last_edited_by_name: String,
    pub last_edited_date: DateTime,
}

/// Store-boundary adapter: accepts either the canonical shape or the
/// legacy flat shape of an income document.
#[derive(Deserialize)]
#[serde(untagged)]
enum SaleDocument {
    Canonical(CanonicalSale),
    Legacy(LegacySale),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalSale {
    #[serde(rename = "_id", default)]
    id: Option<ObjectId>,
    products: Vec<SaleLine>,
    #[serde(default)]
    client_name: String,
    #[serde(default)]
    client_phone: String,
    #[serde(default)]
    client_email: String,
    #[serde(default)]
    status: SaleStatus,
    created_date: DateTime,
    #[serde(default)]
    created_by: Option<ObjectId>,
    #[serde(default)]
    created_by_name: String,
    #[serde(default)]
    last_edited_by: Option<ObjectId>,
    #[serde(default)]
    last_edited_by_name: String,
    #[serde(default = "DateTime::now")]
    last_edited_date: DateTime,
}

#[derive(Deserialize)]
struct LegacySale {
    #[serde(rename = "productName")]
    product_name: String,
    #[serde(default)]
    price: LegacyPrice,
    #[serde(rename = "clientName", default)]
    client_name: String,
    #[serde(rename = "clientPhone", default)]
    client_phone: String,
    #[serde(rename = "clientEmail", default)]
    client_email: String,
    #[serde(rename = "createdDate", default)]
    created_date: Option<DateTime>,
}

/// Legacy documents stored the price as a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum LegacyPrice {
    Number(f64),
    Text(String),
}

impl LegacyPrice {
    fn value(&self) -> f64 {
        match self {
            LegacyPrice::Number(n) => *n,
            LegacyPrice::Text(s) => s.trim().parse().unwrap_or(0.0),
        }
    }
}

impl Default for LegacyPrice {
    fn default() -> Self {
        LegacyPrice::Number(0.0)
    }
}

impl From<SaleDocument> for Sale {
    fn from(doc: SaleDocument) -> Self {
        match doc {
            SaleDocument::Canonical(c) => Sale {
                id: c.id,
                products: c.products,
                client_name: c.client_name,
                client_phone: c.client_phone,
                client_email: c.client_email,
                status: c.status,
                created_date: c.created_date,
                created_by: c.created_by,
                created_by_name: c.created_by_name,
                last_edited_by: c.last_edited_by,
                last_edited_by_name: c.last_edited_by_name,
                last_edited_date: c.last_edited_date,
            },
            SaleDocument::Legacy(l) => {
                let created = l.created_date.unwrap_or_else(DateTime::now);
                Sale {
                    id: None,
                    products: vec![SaleLine {
                        product_id: None,
                        name: l.product_name,
                        price: l.price.value(),
                        quantity: 1,
                    }],
                    client_name: l.client_name,
                    client_phone: l.client_phone,
                    client_email: l.client_email,
                    // Legacy records predate stock tracking; closed is the
                    // only status whose removal has no stock side effect.
                    status: SaleStatus::Closed,
                    created_date: created,
                    created_by: None,
                    created_by_name: String::new(),
                    last_edited_by: None,
                    last_edited_by_name: String::new(),
                    last_edited_date: created,
                }
            }
        }
    }
}

impl Sale {
    pub fn total(&self) -> f64 {
        self.products
            .iter()
            .map(|l| l.price * l.quantity as f64)
            .sum()
    }
}

/// Expense categories mirrored from the original catalog.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseType {
    Product,
    Marketing,
    Salary,
    Other,
}

impl ExpenseType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "product" => Some(ExpenseType::Product),
            "marketing" => Some(ExpenseType::Marketing),
            "salary" => Some(ExpenseType::Salary),
            "other" => Some(ExpenseType::Other),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseType::Product => "product",
            ExpenseType::Marketing => "marketing",
            ExpenseType::Salary => "salary",
            ExpenseType::Other => "other",
        }
    }
}

/// Expense document. Purchase expenses reference the product whose stock
/// increase generated them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub amount: f64,
    #[serde(rename = "type")]
    pub expense_type: ExpenseType,
    pub description: String,
    #[serde(default)]
    pub product_id: Option<ObjectId>,
    pub date: DateTime,
    pub created_by: ObjectId,
    pub created_by_name: String,
    pub last_edited_by: ObjectId,
    pub last_edited_by_name: String,
    pub last_edited_date: DateTime,
}
