//! Back-office collections and the columns each list screen shows

use serde_json::Value;

use crate::config::Config;
use crate::controller::ListViewConfig;
use crate::models::{display_value, lookup_path, ColumnSpec, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Products,
    Sales,
    Purchases,
    Invoices,
    Receipts,
    Loans,
    Employees,
}

impl Resource {
    pub const ALL: [Resource; 7] = [
        Resource::Products,
        Resource::Sales,
        Resource::Purchases,
        Resource::Invoices,
        Resource::Receipts,
        Resource::Loans,
        Resource::Employees,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Resource::Products => "products",
            Resource::Sales => "sales",
            Resource::Purchases => "purchases",
            Resource::Invoices => "invoices",
            Resource::Receipts => "receipts",
            Resource::Loans => "loans",
            Resource::Employees => "employees",
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Resource::Products => "Inventory",
            Resource::Sales => "Sales",
            Resource::Purchases => "Purchases",
            Resource::Invoices => "Invoices",
            Resource::Receipts => "Receipts",
            Resource::Loans => "Loans",
            Resource::Employees => "Employees",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "products" | "product" | "inventory" | "stock" => Some(Resource::Products),
            "sales" | "sale" => Some(Resource::Sales),
            "purchases" | "purchase" => Some(Resource::Purchases),
            "invoices" | "invoice" => Some(Resource::Invoices),
            "receipts" | "receipt" => Some(Resource::Receipts),
            "loans" | "loan" => Some(Resource::Loans),
            "employees" | "employee" | "staff" | "hr" => Some(Resource::Employees),
            _ => None,
        }
    }

    /// Endpoint path relative to the API base URL
    pub fn path(&self) -> String {
        format!("/{}", self.as_str())
    }

    pub fn search_fields(&self) -> &'static [&'static str] {
        match self {
            Resource::Products => &["name", "sku", "category"],
            Resource::Sales => &["reference", "customerName"],
            Resource::Purchases => &["reference", "supplierName"],
            Resource::Invoices => &["invoiceNumber", "customerName"],
            Resource::Receipts => &["receiptNumber", "customerName"],
            Resource::Loans => &["borrowerName", "status"],
            Resource::Employees => &["firstName", "lastName", "email", "position"],
        }
    }

    pub fn relations(&self) -> &'static [&'static str] {
        match self {
            Resource::Products => &["supplier"],
            Resource::Sales => &["customer", "branch"],
            Resource::Purchases => &["supplier", "branch"],
            Resource::Invoices => &["customer"],
            Resource::Receipts => &["invoice"],
            Resource::Loans => &["borrower"],
            Resource::Employees => &["branch"],
        }
    }

    pub fn columns(&self) -> Vec<ColumnSpec> {
        match self {
            Resource::Products => vec![
                ColumnSpec::field("Name", "name").sortable_by("name"),
                ColumnSpec::field("SKU", "sku").sortable_by("sku"),
                ColumnSpec::field("Category", "category"),
                ColumnSpec::field("In stock", "quantity").sortable_by("quantity"),
                money_column("Price", "price"),
                ColumnSpec::field("Supplier", "supplier.name"),
                date_column("Added", "createdAt"),
            ],
            Resource::Sales => vec![
                ColumnSpec::field("Reference", "reference").sortable_by("reference"),
                ColumnSpec::field("Customer", "customer.name"),
                ColumnSpec::field("Branch", "branch.name"),
                money_column("Total", "totalAmount"),
                ColumnSpec::field("Payment", "paymentMethod"),
                date_column("Date", "createdAt"),
            ],
            Resource::Purchases => vec![
                ColumnSpec::field("Reference", "reference").sortable_by("reference"),
                ColumnSpec::field("Supplier", "supplier.name"),
                ColumnSpec::field("Branch", "branch.name"),
                money_column("Total", "totalAmount"),
                ColumnSpec::field("Status", "status").sortable_by("status"),
                date_column("Date", "createdAt"),
            ],
            Resource::Invoices => vec![
                ColumnSpec::field("Invoice", "invoiceNumber").sortable_by("invoiceNumber"),
                ColumnSpec::field("Customer", "customer.name"),
                money_column("Amount", "amount"),
                money_column("Paid", "amountPaid"),
                date_column("Due", "dueDate"),
                ColumnSpec::field("Status", "status").sortable_by("status"),
                date_column("Issued", "createdAt"),
            ],
            Resource::Receipts => vec![
                ColumnSpec::field("Receipt", "receiptNumber").sortable_by("receiptNumber"),
                ColumnSpec::field("Invoice", "invoice.invoiceNumber"),
                money_column("Amount", "amount"),
                ColumnSpec::field("Method", "paymentMethod"),
                date_column("Date", "createdAt"),
            ],
            Resource::Loans => vec![
                ColumnSpec::field("Borrower", "borrower.name"),
                money_column("Principal", "amount"),
                money_column("Balance", "balance"),
                ColumnSpec::field("Rate %", "interestRate"),
                ColumnSpec::field("Status", "status").sortable_by("status"),
                date_column("Issued", "createdAt"),
            ],
            Resource::Employees => vec![
                ColumnSpec::new("Name", |row: &Row| {
                    let first = display_value(&lookup_path(row, "firstName"));
                    let last = display_value(&lookup_path(row, "lastName"));
                    Value::String(format!("{} {}", first, last).trim().to_string())
                })
                .sortable_by("lastName"),
                ColumnSpec::field("Position", "position").sortable_by("position"),
                ColumnSpec::field("Branch", "branch.name"),
                ColumnSpec::field("Email", "email"),
                ColumnSpec::field("Phone", "phone"),
                date_column("Hired", "createdAt"),
            ],
        }
    }

    /// List view wiring for this collection
    pub fn list_config(&self, config: &Config) -> ListViewConfig {
        ListViewConfig::new(self.title(), &config.resource_url(&self.path()), self.columns())
            .with_relations(self.relations())
            .with_search_fields(self.search_fields())
            .with_page_size(config.list.page_size)
            .with_search_debounce(config.search_debounce())
    }
}

/// Sortable amount column rendered with two decimals
fn money_column(name: &str, path: &str) -> ColumnSpec {
    let field = path.to_string();
    ColumnSpec::field(name, path)
        .sortable_by(path)
        .with_cell(move |row: &Row| match lookup_path(row, &field) {
            Value::Number(n) => n
                .as_f64()
                .map(|amount| format!("{:.2}", amount))
                .unwrap_or_else(|| n.to_string()),
            other => display_value(&other),
        })
}

/// Sortable timestamp column showing only the calendar date
fn date_column(name: &str, path: &str) -> ColumnSpec {
    let field = path.to_string();
    ColumnSpec::field(name, path)
        .sortable_by(path)
        .with_cell(move |row: &Row| {
            let value = display_value(&lookup_path(row, &field));
            value.get(..10).map(str::to_string).unwrap_or(value)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(Resource::parse("Inventory"), Some(Resource::Products));
        assert_eq!(Resource::parse("hr"), Some(Resource::Employees));
        assert_eq!(Resource::parse("payroll"), None);
        for resource in Resource::ALL {
            assert_eq!(Resource::parse(resource.as_str()), Some(resource));
        }
    }

    #[test]
    fn test_every_resource_has_sortable_created_at() {
        for resource in Resource::ALL {
            let columns = resource.columns();
            assert!(!columns.is_empty());
            assert!(columns
                .iter()
                .any(|c| c.sort_field.as_deref() == Some("createdAt")));
        }
    }

    #[test]
    fn test_money_and_date_cells() {
        let columns = Resource::Invoices.columns();
        let invoice = row(json!({
            "invoiceNumber": "INV-0042",
            "customer": {"name": "Acme Corp"},
            "amount": 1250,
            "amountPaid": 99.5,
            "createdAt": "2024-03-05T10:11:12.000Z",
        }));

        let rendered: Vec<String> = columns.iter().map(|c| c.render(&invoice)).collect();
        assert_eq!(rendered[0], "INV-0042");
        assert_eq!(rendered[1], "Acme Corp");
        assert_eq!(rendered[2], "1250.00");
        assert_eq!(rendered[3], "99.50");
        assert_eq!(rendered[4], "");
        assert_eq!(rendered[6], "2024-03-05");
    }

    #[test]
    fn test_employee_name_column() {
        let columns = Resource::Employees.columns();
        let employee = row(json!({"firstName": "Grace", "lastName": "Hopper"}));
        assert_eq!(columns[0].render(&employee), "Grace Hopper");
    }

    #[test]
    fn test_list_config_uses_api_url() {
        let config = Config::default();
        let list = Resource::Loans.list_config(&config);
        assert_eq!(list.resource_url, "http://localhost:5000/api/loans");
        assert_eq!(list.title, "Loans");
        assert_eq!(list.relations_to_expand, vec!["borrower"]);
        assert_eq!(list.default_page_size, 10);
    }
}
