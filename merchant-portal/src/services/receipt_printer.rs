//! Plain-text rendering for thermal receipt printers.

use crate::models::Receipt;

pub const DEFAULT_WIDTH: usize = 32;

/// `101000` → `Rp 101.000`
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    if amount < 0 {
        format!("-Rp {}", grouped)
    } else {
        format!("Rp {}", grouped)
    }
}

fn center(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    format!("{}{}", " ".repeat((width - len) / 2), text)
}

/// Left text and right text on one line, the left side truncated if needed.
fn columns(left: &str, right: &str, width: usize) -> String {
    let right_len = right.chars().count();
    let room = width.saturating_sub(right_len + 1);
    let left: String = left.chars().take(room).collect();
    let pad = width.saturating_sub(left.chars().count() + right_len).max(1);
    format!("{}{}{}", left, " ".repeat(pad), right)
}

pub fn render_text(receipt: &Receipt, width: usize) -> String {
    let order = &receipt.order;
    let rule = "-".repeat(width);
    let mut lines = Vec::new();

    lines.push(center(&receipt.business.name, width));
    if let Some(address) = &receipt.business.address {
        lines.push(center(address, width));
    }
    if let Some(phone) = &receipt.business.phone {
        lines.push(center(phone, width));
    }
    lines.push(rule.clone());

    lines.push(columns("No", &order.order_number, width));
    if let Some(created_at) = order.created_at {
        lines.push(columns(
            "Date",
            &created_at.format("%d/%m/%Y %H:%M").to_string(),
            width,
        ));
    }
    if let Some(cashier) = &receipt.cashier {
        lines.push(columns("Cashier", cashier, width));
    }
    if let Some(table) = &order.table_number {
        lines.push(columns("Table", table, width));
    }
    if let Some(customer) = &order.customer_name {
        lines.push(columns("Customer", customer, width));
    }
    lines.push(rule.clone());

    for item in &order.items {
        lines.push(item.name.clone());
        lines.push(columns(
            &format!("  {} x {}", item.quantity, format_rupiah(item.price)),
            &format_rupiah(item.subtotal),
            width,
        ));
        if let Some(notes) = &item.notes {
            lines.push(format!("  ({})", notes));
        }
    }
    lines.push(rule.clone());

    lines.push(columns("Subtotal", &format_rupiah(order.subtotal), width));
    if order.discount != 0 {
        lines.push(columns(
            "Discount",
            &format!("-{}", format_rupiah(order.discount)),
            width,
        ));
    }
    if order.tax != 0 {
        lines.push(columns("Tax", &format_rupiah(order.tax), width));
    }
    lines.push(columns("TOTAL", &format_rupiah(order.total), width));

    if let Some(method) = &receipt.payment_method {
        lines.push(columns("Payment", &method.to_uppercase(), width));
    }
    if let Some(paid) = receipt.paid_amount {
        lines.push(columns("Paid", &format_rupiah(paid), width));
    }
    if let Some(change) = receipt.change_due() {
        lines.push(columns("Change", &format_rupiah(change), width));
    }

    lines.push(rule);
    lines.push(center(
        receipt.footer.as_deref().unwrap_or("Thank you"),
        width,
    ));

    let mut text = lines.join("\n");
    text.push('\n');
    text
}
