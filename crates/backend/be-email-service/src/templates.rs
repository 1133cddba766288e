use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::mailer::EmailMessage;

const BRAND: &str = "CVN'EAT";
const SUPPORT_ADDRESS: &str = "contact@cvneat.fr";

/// Customer-facing emails. Serializable so they can travel through the
/// outbox as task payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum EmailTemplate {
    OrderCancelled {
        order_id: String,
        customer_name: Option<String>,
        reason: Option<String>,
        refund_amount: Option<Decimal>,
    },
    ComplaintReceived {
        complaint_id: String,
        order_id: String,
        customer_name: Option<String>,
        complaint_type: String,
    },
    ComplaintResolved {
        complaint_id: String,
        customer_name: Option<String>,
        resolution: String,
        refund_amount: Option<Decimal>,
    },
    DeliveryCompleted {
        order_id: String,
        customer_name: Option<String>,
        restaurant_name: String,
        total_amount: Decimal,
    },
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Orders are shown to customers by the first 8 characters of their id.
fn short_id(id: &str) -> String {
    id.chars().take(8).collect::<String>().to_uppercase()
}

fn euros(amount: Decimal) -> String {
    format!("{}&nbsp;€", amount.round_dp(2)).replace('.', ",")
}

fn greeting(name: Option<&str>) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("Bonjour {},", escape_html(name)),
        None => "Bonjour,".to_string(),
    }
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title} - {brand}</title></head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
<div style="background: #1f2937; color: white; padding: 20px; text-align: center; border-radius: 8px 8px 0 0;">
<h1>{title}</h1>
</div>
<div style="background: #f9fafb; padding: 30px; border-radius: 0 0 8px 8px;">
{body}
<p>Pour toute question : {support}</p>
<p>Cordialement,<br>L'équipe {brand}</p>
</div>
</body>
</html>"#,
        title = escape_html(title),
        brand = escape_html(BRAND),
        support = SUPPORT_ADDRESS,
        body = body,
    )
}

impl EmailTemplate {
    pub fn subject(&self) -> String {
        match self {
            EmailTemplate::OrderCancelled {
                order_id,
                refund_amount: Some(_),
                ..
            } => format!(
                "Commande #{} annulée et remboursée - {BRAND}",
                short_id(order_id)
            ),
            EmailTemplate::OrderCancelled { order_id, .. } => {
                format!("Commande #{} annulée - {BRAND}", short_id(order_id))
            }
            EmailTemplate::ComplaintReceived { .. } => format!("Réclamation reçue - {BRAND}"),
            EmailTemplate::ComplaintResolved { .. } => format!("Réclamation résolue - {BRAND}"),
            EmailTemplate::DeliveryCompleted { order_id, .. } => {
                format!("Votre commande #{} a été livrée !", short_id(order_id))
            }
        }
    }

    pub fn html(&self) -> String {
        match self {
            EmailTemplate::OrderCancelled {
                order_id,
                customer_name,
                reason,
                refund_amount,
            } => {
                let mut body = format!(
                    "<p>{}</p><p>Votre commande <strong>#{}</strong> a été annulée.</p>",
                    greeting(customer_name.as_deref()),
                    short_id(order_id)
                );
                if let Some(reason) = reason.as_deref().filter(|r| !r.trim().is_empty()) {
                    body.push_str(&format!("<p>Motif : {}</p>", escape_html(reason)));
                }
                match refund_amount {
                    Some(amount) => body.push_str(&format!(
                        "<p>Un remboursement de <strong>{}</strong> a été émis. \
                         Il apparaîtra sur votre relevé sous 5 à 10 jours ouvrés.</p>",
                        euros(*amount)
                    )),
                    None => body.push_str("<p>Aucun montant ne vous a été débité.</p>"),
                }
                layout("Commande annulée", &body)
            }
            EmailTemplate::ComplaintReceived {
                complaint_id,
                order_id,
                customer_name,
                complaint_type,
            } => {
                let body = format!(
                    "<p>{}</p><p>Nous avons bien reçu votre réclamation \
                     <strong>#{}</strong> concernant la commande <strong>#{}</strong> \
                     ({}).</p><p>Notre équipe l'examine et reviendra vers vous sous 48 heures.</p>",
                    greeting(customer_name.as_deref()),
                    short_id(complaint_id),
                    short_id(order_id),
                    escape_html(complaint_type)
                );
                layout("Réclamation reçue", &body)
            }
            EmailTemplate::ComplaintResolved {
                complaint_id,
                customer_name,
                resolution,
                refund_amount,
            } => {
                let mut body = format!(
                    "<p>{}</p><p>Votre réclamation <strong>#{}</strong> a été traitée.</p>\
                     <p>{}</p>",
                    greeting(customer_name.as_deref()),
                    short_id(complaint_id),
                    escape_html(resolution)
                );
                if let Some(amount) = refund_amount {
                    body.push_str(&format!(
                        "<p>Montant remboursé : <strong>{}</strong></p>",
                        euros(*amount)
                    ));
                }
                layout("Réclamation résolue", &body)
            }
            EmailTemplate::DeliveryCompleted {
                order_id,
                customer_name,
                restaurant_name,
                total_amount,
            } => {
                let body = format!(
                    "<p>{}</p><p>Votre commande a été livrée avec succès !</p>\
                     <p><strong>Numéro de commande :</strong> #{}<br>\
                     <strong>Restaurant :</strong> {}<br>\
                     <strong>Montant total :</strong> {}</p><p>Bon appétit !</p>",
                    greeting(customer_name.as_deref()),
                    short_id(order_id),
                    escape_html(restaurant_name),
                    euros(*total_amount)
                );
                layout("Commande livrée", &body)
            }
        }
    }

    pub fn to_message(&self, to: impl Into<String>, to_name: Option<String>) -> EmailMessage {
        EmailMessage {
            to: to.into(),
            to_name,
            subject: self.subject(),
            html: self.html(),
        }
    }
}
