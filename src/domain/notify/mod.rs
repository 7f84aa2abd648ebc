//! Notification domain - the delivery contract and alert formatting

use async_trait::async_trait;

use crate::domain::price::{PriceDiff, PriceField};
use crate::shared::errors::NotifyError;

/// Delivers a formatted message to a destination
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, destination: &str, message: &str) -> Result<(), NotifyError>;
}

/// Render a diff as an HTML alert: a title naming the resource, then one line
/// per tracked field with its current value and a `+`/`-` marker if it moved.
pub fn format_alert(diff: &PriceDiff) -> String {
    let mut message = format!("<b>{}</b> Update\n", escape_html(&diff.resource_id.to_uppercase()));

    for field in PriceField::ALL {
        let Some(change) = diff.change(field) else {
            continue;
        };
        let mut line = format!("\n{}: <b>{}</b>", field.label(), escape_html(&change.current.to_string()));
        if let Some(marker) = change.direction.marker() {
            line.push(' ');
            line.push_str(marker);
        }
        message.push_str(&line);
    }

    message
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
