//! Outbound mail and geocoding

use structr_log::{error, info, warn};

use super::{Builtin, FunctionOutput, has_length, has_min_length};
use crate::context::ActionContext;
use crate::core::{EntityRef, Value};
use crate::error::ExpressionResult;
use crate::eval::Evaluator;
use crate::services::MailMessage;

type Output = ExpressionResult<FunctionOutput>;

pub(super) const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "send_plaintext_mail",
        apply: send_plaintext_mail,
        usage: "Usage: ${send_plaintext_mail(fromAddress, fromName, toAddress, toName, subject, content)}.",
        usage_script: None,
        description: "Sends a plaintext e-mail",
    },
    Builtin {
        name: "send_html_mail",
        apply: send_html_mail,
        usage: "Usage: ${send_html_mail(fromAddress, fromName, toAddress, toName, subject, content)}.",
        usage_script: None,
        description: "Sends an HTML e-mail",
    },
    Builtin {
        name: "geocode",
        apply: geocode,
        usage: "Usage: ${geocode(street, city, country)}. Example: ${set(this, geocode(this.street, this.city, this.country))}",
        usage_script: None,
        description: "Returns the geolocation (latitude, longitude) for the given street address using the configured geocoding provider",
    },
];

fn message(args: &[Value], html: bool) -> MailMessage {
    let text = |index: usize| args[index].to_string();
    MailMessage {
        from: text(0),
        from_name: text(1),
        to: text(2),
        to_name: text(3),
        subject: text(4),
        body: text(5),
        html,
        alt_text: html.then(|| args.get(6).map(Value::to_string).unwrap_or_default()),
    }
}

/// Message id on success, the empty string when no mail service is
/// configured or delivery failed
fn send(eval: &Evaluator, message: &MailMessage) -> Output {
    let Some(mail) = eval.services().mail() else {
        warn!(to = %message.to, "No mail service configured, mail not sent");
        return Ok(FunctionOutput::empty());
    };
    match mail.send(message) {
        Ok(id) => {
            info!(to = %message.to, subject = %message.subject, id = %id, "Mail sent");
            Ok(Value::Text(id).into())
        }
        Err(err) => {
            error!(to = %message.to, error = %err, "Unable to send mail");
            Ok(FunctionOutput::empty())
        }
    }
}

fn send_plaintext_mail(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_length(args, 6) {
        return Ok(FunctionOutput::empty());
    }
    send(eval, &message(args, false))
}

fn send_html_mail(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 6) {
        return Ok(FunctionOutput::empty());
    }
    send(eval, &message(args, true))
}

/// Coordinates as a JSON object text, ready to be passed to `set`
fn geocode(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_length(args, 3) {
        return Ok(FunctionOutput::empty());
    }
    let Some(geocoder) = eval.services().geocoder() else {
        warn!("No geocoding provider configured");
        return Ok(FunctionOutput::empty());
    };
    let (street, city, country) = (args[0].to_string(), args[1].to_string(), args[2].to_string());

    match geocoder.geocode(&street, &city, &country)? {
        Some(coordinates) => {
            let json = serde_json::json!({
                "latitude": coordinates.latitude,
                "longitude": coordinates.longitude,
            });
            Ok(Value::Text(serde_json::to_string(&json)?).into())
        }
        None => Ok(FunctionOutput::empty()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::context::ActionContext;
    use crate::core::{EntityRef, Value};
    use crate::engine::ExpressionEngine;
    use crate::functions::test_support::FIXTURE;
    use crate::services::{
        EntityStore, GeoCoordinates, MemoryMail, MemorySecurity, MemoryStore, Services, StaticGeocoder,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn test_send_mail() {
        let mail = MemoryMail::arc();
        let engine = ExpressionEngine::builder()
            .services(Services::builder().mail(mail.clone()).build())
            .build();
        let mut ctx = ActionContext::new();

        let id = engine
            .evaluate(
                "send_plaintext_mail('a@example.com', 'A', 'b@example.com', 'B', 'Hi', 'Hello')",
                &mut ctx,
                None,
            )
            .unwrap();
        assert!(id.to_string().ends_with("@structr>"));

        engine
            .evaluate(
                "send_html_mail('a@example.com', 'A', 'b@example.com', 'B', 'Hi', '<p>Hello</p>', 'Hello')",
                &mut ctx,
                None,
            )
            .unwrap();

        let sent = mail.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].body, "Hello");
        assert!(!sent[0].html);
        assert_eq!(sent[1].body, "<p>Hello</p>");
        assert_eq!(sent[1].alt_text.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_mail_needs_all_arguments() {
        let mail = MemoryMail::arc();
        let engine = ExpressionEngine::builder()
            .services(Services::builder().mail(mail.clone()).build())
            .build();
        let value = engine
            .evaluate("send_plaintext_mail('a@example.com', 'A', 'b@example.com')", &mut ActionContext::new(), None)
            .unwrap();
        assert_eq!(value, Value::text(""));
        assert!(mail.sent().is_empty());
    }

    #[test]
    fn test_geocode_feeds_set() {
        let store = Arc::new(MemoryStore::from_json(FIXTURE).unwrap());
        let geocoder = StaticGeocoder::new().with(
            "Hauptstr. 1",
            "Berlin",
            "Germany",
            GeoCoordinates {
                latitude: 52.5,
                longitude: 13.25,
            },
        );
        let services = Services::builder()
            .store(store.clone())
            .security(MemorySecurity::arc())
            .geocoder(Arc::new(geocoder))
            .build();
        let engine = ExpressionEngine::builder().services(services).build();
        let alice = EntityRef::node("u1", "User");
        let mut ctx = ActionContext::new();

        let json = engine
            .evaluate("geocode('Hauptstr. 1', 'Berlin', 'Germany')", &mut ctx, None)
            .unwrap();
        assert_eq!(json, Value::text(r#"{"latitude":52.5,"longitude":13.25}"#));

        engine
            .evaluate("set(this, geocode('hauptstr. 1', 'berlin', 'germany'))", &mut ctx, Some(&alice))
            .unwrap();
        assert!(store.property(&alice, "latitude").is_some());

        let unknown = engine
            .evaluate("geocode('Nowhere', 'Berlin', 'Germany')", &mut ctx, None)
            .unwrap();
        assert_eq!(unknown, Value::text(""));
    }
}
