//! Metadata for the purchase-order/invoice view the agent queries.
//!
//! The column catalogue drives three things: the metadata section of the
//! system prompt, the set of text columns whose comparisons are normalized,
//! and the candidate lookups of the approximate-match fallback.

use serde::Serialize;
use std::fmt::Write as _;

/// Business grouping of a column, used to structure the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnGroup {
    Vessel,
    Invoice,
    PurchaseOrder,
    RequisitionApproval,
    GoodsReceipt,
    ItemQuantity,
    Port,
    Financial,
    Vendor,
}

impl ColumnGroup {
    pub const ALL: [ColumnGroup; 9] = [
        ColumnGroup::Vessel,
        ColumnGroup::Invoice,
        ColumnGroup::PurchaseOrder,
        ColumnGroup::RequisitionApproval,
        ColumnGroup::GoodsReceipt,
        ColumnGroup::ItemQuantity,
        ColumnGroup::Port,
        ColumnGroup::Financial,
        ColumnGroup::Vendor,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Self::Vessel => "Vessel Details",
            Self::Invoice => "Invoice Details",
            Self::PurchaseOrder => "Purchase Order Details",
            Self::RequisitionApproval => "Requisition and Approval Details",
            Self::GoodsReceipt => "Goods Receipt Note (GRN) Details",
            Self::ItemQuantity => "Item and Quantity Details",
            Self::Port => "Port Details",
            Self::Financial => "Financial Details",
            Self::Vendor => "Vendor Details",
        }
    }
}

/// Value category of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Free text; comparisons against it are normalized.
    Text,
    Number,
    Date,
    /// 0/1 indicator
    Flag,
    Identifier,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ViewColumn {
    pub name: &'static str,
    pub group: ColumnGroup,
    pub kind: ColumnKind,
    pub description: &'static str,
}

const fn col(
    name: &'static str,
    group: ColumnGroup,
    kind: ColumnKind,
    description: &'static str,
) -> ViewColumn {
    ViewColumn {
        name,
        group,
        kind,
        description,
    }
}

use ColumnGroup as G;
use ColumnKind as K;

pub static VIEW_COLUMNS: &[ViewColumn] = &[
    col("vessel_id", G::Vessel, K::Identifier, "Unique identifier for the vessel."),
    col("vessel_object_id", G::Vessel, K::Identifier, "Internal object identifier for the vessel in the system."),
    col("Vessel_Name", G::Vessel, K::Text, "Name of the vessel associated with the purchase order or invoice."),
    col("Invoice_Id", G::Invoice, K::Identifier, "Unique identifier for the invoice."),
    col("Inv_Title", G::Invoice, K::Text, "Title or description of the invoice."),
    col("Inv_Code", G::Invoice, K::Text, "Unique code assigned to the invoice."),
    col("VENDOR_INVOICE_DATE", G::Invoice, K::Date, "Date the vendor issued the invoice."),
    col("INVOICE_CURRENCY_ID", G::Invoice, K::Identifier, "Unique identifier for the currency used in the invoice."),
    col("Invoice_Currency_Name", G::Invoice, K::Text, "Name of the currency used in the invoice (e.g., US Dollar, Euro)."),
    col("Invoice_Currency_Code", G::Invoice, K::Text, "ISO currency code (e.g., USD, EUR) for the invoice."),
    col("EXG_RATE_VESSEL_CURRENCY", G::Invoice, K::Number, "Exchange rate to convert the invoice currency into the vessel's operating currency."),
    col("EXG_RATE_GROUP_CURRENCY", G::Invoice, K::Number, "Exchange rate to convert the invoice currency into the group's base currency."),
    col("REGISTRATION_DATE", G::Invoice, K::Date, "Date the invoice was registered in the system."),
    col("inv_approval_flag", G::Invoice, K::Flag, "Indicates if the invoice has been approved (1 for approved, 0 for pending)."),
    col("CASH_PO_INVOICE", G::Invoice, K::Flag, "Indicates if the invoice is linked to a cash-based purchase order."),
    col("VENDOR_INVOICE_NO", G::Invoice, K::Text, "Unique number assigned to the invoice by the vendor."),
    col("PARTIAL_INVOICE", G::Invoice, K::Flag, "Indicates if the invoice is a partial payment or installment (1 for partial)."),
    col("PAID_ADV", G::Invoice, K::Number, "Amount of advance payment made against the invoice."),
    col("INVOICE_TYPE", G::Invoice, K::Text, "Type of invoice (e.g., Regular, Credit, Debit)."),
    col("VAT_AMOUNT", G::Invoice, K::Number, "Value-added tax applied to the invoice."),
    col("INVOICE_AMOUNT", G::Invoice, K::Number, "Total amount of the invoice."),
    col("CASH_DISCOUNT", G::Invoice, K::Number, "Discount applied for early payment in cash."),
    col("PAY_DUE_DATE", G::Invoice, K::Date, "Due date for payment of the invoice."),
    col("INVOICE_YEAR", G::Invoice, K::Number, "Year the invoice was issued."),
    col("PAYMENT_DATE", G::Invoice, K::Date, "Date the invoice was paid."),
    col("Inv_Dt_Id", G::Invoice, K::Identifier, "Unique identifier for the invoice date."),
    col("Inv_Effective_Date", G::Invoice, K::Date, "Date when the invoice became effective (e.g., for accounting purposes)."),
    col("Inv_Closed_Date", G::Invoice, K::Date, "Date the invoice was marked as closed."),
    col("total_invoice_currency", G::Invoice, K::Number, "Total invoice amount in the original invoice currency."),
    col("po_hd_Id", G::PurchaseOrder, K::Identifier, "Unique identifier for the purchase order header."),
    col("po_code", G::PurchaseOrder, K::Text, "Code for the purchase order."),
    col("created_date", G::PurchaseOrder, K::Date, "Date the purchase order was created."),
    col("po_dt_id", G::PurchaseOrder, K::Identifier, "Unique identifier for the purchase order details."),
    col("po_id", G::PurchaseOrder, K::Identifier, "Unique identifier for the purchase order."),
    col("po_quantity", G::PurchaseOrder, K::Number, "Quantity of items in the purchase order."),
    col("po_unit_price", G::PurchaseOrder, K::Number, "Unit price of items in the purchase order."),
    col("po_account_id", G::PurchaseOrder, K::Identifier, "Account identifier for the purchase order."),
    col("effective_date", G::PurchaseOrder, K::Date, "Effective date of the purchase order."),
    col("closed_date", G::PurchaseOrder, K::Date, "Date the purchase order was marked as closed."),
    col("lead_days", G::PurchaseOrder, K::Number, "Lead time in days for the purchase order."),
    col("requisition_dt_id", G::RequisitionApproval, K::Identifier, "Unique identifier for the requisition details."),
    col("enquiry_dt_id", G::RequisitionApproval, K::Identifier, "Unique identifier for the enquiry details."),
    col("quote_dt_id", G::RequisitionApproval, K::Identifier, "Unique identifier for the quote details."),
    col("approved_quote_dt_id", G::RequisitionApproval, K::Identifier, "Unique identifier for the approved quote details."),
    col("approval_list_id", G::RequisitionApproval, K::Identifier, "Unique identifier for the approval list."),
    col("sp_goods_receipt_id", G::GoodsReceipt, K::Identifier, "Unique identifier for the goods receipt note."),
    col("sp_goods_receipt_hd_code", G::GoodsReceipt, K::Text, "Header code for the goods receipt note."),
    col("grn_receipt_date", G::GoodsReceipt, K::Date, "Date the goods receipt was created."),
    col("grn_receipt_status", G::GoodsReceipt, K::Text, "Status of the goods receipt (e.g., Pending, Approved)."),
    col("vendor_delivery_reference", G::GoodsReceipt, K::Text, "Vendor's reference for the delivery associated with the invoice."),
    col("grn_remarks", G::GoodsReceipt, K::Text, "Remarks or notes about the goods receipt."),
    col("send_to_office", G::GoodsReceipt, K::Flag, "Indicates whether the goods receipt is sent to the office."),
    col("goods_rcvd_approved_date", G::GoodsReceipt, K::Date, "Date the received goods were approved."),
    col("sp_goods_receipt_dt_id", G::GoodsReceipt, K::Identifier, "Unique identifier for the goods receipt date."),
    col("item_id", G::ItemQuantity, K::Identifier, "Unique identifier for the item being purchased or invoiced."),
    col("uom_id", G::ItemQuantity, K::Identifier, "Unit of measure for the item (e.g., KG, LTR, PCS)."),
    col("received_qty", G::ItemQuantity, K::Number, "Quantity of goods received from the vendor."),
    col("accepted_qty", G::ItemQuantity, K::Number, "Quantity of goods accepted after inspection."),
    col("converted_stock_qty", G::ItemQuantity, K::Number, "Quantity of goods added to inventory after conversion or repackaging."),
    col("normal_qty", G::ItemQuantity, K::Number, "Standard quantity for the item in inventory."),
    col("reconditioned_qty", G::ItemQuantity, K::Number, "Quantity of goods reconditioned for use."),
    col("port_id", G::Port, K::Identifier, "Unique identifier for the port."),
    col("port_name", G::Port, K::Text, "Name of the port."),
    col("port_code", G::Port, K::Text, "Code representing the port (e.g., for internal or system use)."),
    col("port_unloccode", G::Port, K::Text, "UN/LOCODE for the port, used for international trade and transport."),
    col("ai_port_unloc_id", G::Port, K::Identifier, "Identifier combining the UN/LOCODE with system-specific details."),
    col("QUANTITY", G::Financial, K::Number, "Quantity of the item involved in the transaction."),
    col("UNIT_PRICE", G::Financial, K::Number, "Unit price of the item involved in the transaction."),
    col("ACCOUNT_ID", G::Financial, K::Identifier, "Identifier for the account linked to the transaction."),
    col("ENTITY_ID", G::Financial, K::Identifier, "Unique identifier for the entity associated with the transaction."),
    col("TOTAL_VESSEL_CURRENCY", G::Financial, K::Number, "Total amount in the vessel's operating currency."),
    col("TOTAL_PO_CURRENCY", G::Financial, K::Number, "Total amount in the purchase order's currency."),
    col("TOTAL_GROUP_CURRENCY", G::Financial, K::Number, "Total amount in the group's base currency."),
    col("Inv_Account_Code", G::Financial, K::Text, "Code representing the account linked to the invoice."),
    col("Inv_Account_Name", G::Financial, K::Text, "Name of the account linked to the invoice."),
    col("Vendor", G::Vendor, K::Text, "Name of the vendor associated with the invoice."),
    col("Vendor_ID", G::Vendor, K::Identifier, "Unique identifier for the vendor."),
    col("Account_Number", G::Vendor, K::Text, "Account number associated with the vendor."),
    col("BANK_CODE", G::Vendor, K::Text, "Code of the bank where the vendor holds an account."),
    col("SWIFT_CODE", G::Vendor, K::Text, "SWIFT code for the vendor's bank."),
    col("IBAN", G::Vendor, K::Text, "IBAN (International Bank Account Number) for the vendor."),
];

/// The single view the agent is allowed to read.
#[derive(Debug, Clone)]
pub struct ViewDefinition {
    schema: Option<String>,
    name: String,
    columns: &'static [ViewColumn],
}

impl ViewDefinition {
    pub fn new(schema: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.map(String::from),
            name: name.into(),
            columns: VIEW_COLUMNS,
        }
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &'static [ViewColumn] {
        self.columns
    }

    /// `schema.name`, or just `name` without a schema.
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }

    /// Case-insensitive column lookup.
    pub fn column(&self, name: &str) -> Option<&'static ViewColumn> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn is_text_column(&self, name: &str) -> bool {
        self.column(name)
            .is_some_and(|c| c.kind == ColumnKind::Text)
    }

    /// Whether a possibly qualified relation name (`[catalog.][schema.]name`) refers to this view.
    ///
    /// An unqualified reference is accepted because the connection's search path
    /// or default database decides where it resolves.
    pub fn matches_relation(&self, parts: &[&str]) -> bool {
        let Some((last, qualifiers)) = parts.split_last() else {
            return false;
        };
        if !last.eq_ignore_ascii_case(&self.name) {
            return false;
        }
        match (qualifiers.last(), &self.schema) {
            (None, _) => true,
            (Some(q), Some(schema)) => q.eq_ignore_ascii_case(schema),
            (Some(_), None) => false,
        }
    }

    /// Markdown rendering of the column catalogue, grouped by business area.
    pub fn metadata_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "This view joins purchase orders, invoices, goods receipts, ports and vendors for each vessel."
        );
        for group in ColumnGroup::ALL {
            let mut columns = self.columns.iter().filter(|c| c.group == group).peekable();
            if columns.peek().is_none() {
                continue;
            }
            let _ = writeln!(out, "\n#### {}:", group.title());
            for column in columns {
                let _ = writeln!(out, "- **{}**: {}", column.name, column.description);
            }
        }
        out
    }
}
