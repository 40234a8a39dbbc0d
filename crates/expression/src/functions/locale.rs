//! Localization lookups and mail templates

use structr_log::debug;

use super::{Builtin, FunctionOutput, has_length, has_length_between};
use crate::context::ActionContext;
use crate::core::{EntityRef, Value};
use crate::error::{ExpressionError, ExpressionResult};
use crate::eval::Evaluator;

type Output = ExpressionResult<FunctionOutput>;

pub(super) const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "localize",
        apply: localize,
        usage: "Usage: ${localize(key[, domain])}. Example ${localize('HELLO_WORLD', 'myDomain')}",
        usage_script: Some(
            "Usage: ${{Structr.localize(key[, domain])}}. Example ${{Structr.localize('HELLO_WORLD', 'myDomain')}}",
        ),
        description: "Returns the localization of the given key for the current locale, or the key itself",
    },
    Builtin {
        name: "template",
        apply: template,
        usage: "Usage: ${template(name, locale, source)}. Example: ${template(\"TEXT_TEMPLATE_1\", \"en_EN\", this)}",
        usage_script: Some(
            "Usage: ${{Structr.template(name, locale, source)}}. Example: ${{Structr.template(\"TEXT_TEMPLATE_1\", \"en_EN\", Structr.get('this'))}}",
        ),
        description: "Returns a MailTemplate object with the given name, replaces the placeholders with values from the given entity",
    },
];

/// Localized text for the context locale
///
/// A domain-specific lookup falls back to the entries without a domain. Unknown
/// keys come back unchanged; more than one match is an error.
fn localize(args: &[Value], eval: &Evaluator, ctx: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_length_between(args, 1, 2) {
        return Ok(match args.len() {
            // nulls are ignored silently
            1 | 2 => FunctionOutput::empty(),
            _ => FunctionOutput::Usage,
        });
    }
    let key = args[0].to_string();
    let domain = args.get(1).map(Value::to_string);
    let Some(localizer) = eval.services().localizer() else {
        debug!(key = %key, "No localizer configured, returning key");
        return Ok(Value::Text(key).into());
    };

    let locale = ctx.locale();
    let mut found = localizer.localize(locale, &key, domain.as_deref());
    if found.is_empty() && domain.is_some() {
        found = localizer.localize(locale, &key, None);
    }

    match found.len() {
        0 => Ok(Value::Text(key).into()),
        1 => Ok(Value::Text(found.remove(0)).into()),
        _ => {
            let message = match &domain {
                Some(domain) => format!("Ambiguous localization for key '{key}' and domain '{domain}' found. Please fix."),
                None => format!("Ambiguous localization for key '{key}' found. Please fix."),
            };
            Err(ExpressionError::framework(422, message))
        }
    }
}

/// Mail template for name and locale, rendered against the given entity
fn template(args: &[Value], eval: &Evaluator, ctx: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if args.len() != 3 {
        return Ok(FunctionOutput::Usage);
    }
    if !has_length(args, 3) {
        return Ok(FunctionOutput::empty());
    }
    let Value::Entity(source) = &args[2] else {
        return Ok(FunctionOutput::empty());
    };
    let Some(localizer) = eval.services().localizer() else {
        return Ok(FunctionOutput::empty());
    };

    let (name, locale) = (args[0].to_string(), args[1].to_string());
    match localizer.mail_template(&name, &locale) {
        Some(text) => Ok(Value::Text(eval.render(&text, ctx, Some(source))?).into()),
        None => {
            debug!(name = %name, locale = %locale, "No mail template found");
            Ok(FunctionOutput::empty())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::context::ActionContext;
    use crate::core::{EntityRef, Value};
    use crate::engine::ExpressionEngine;
    use crate::functions::test_support::FIXTURE;
    use crate::services::{MemoryLocalizer, MemorySecurity, MemoryStore, Services};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn engine() -> ExpressionEngine {
        let localizer = MemoryLocalizer::new()
            .with_localization("de_DE", "HELLO", None, "Hallo")
            .with_localization("de_DE", "HELLO", Some("shop"), "Willkommen")
            .with_localization("de_DE", "BYE", None, "Tschüss")
            .with_localization("de_DE", "BYE", None, "Ciao")
            .with_template("WELCOME", "de_DE", "Hallo ${this.name}, ${localize('HELLO', 'shop')}!");
        let services = Services::builder()
            .store(Arc::new(MemoryStore::from_json(FIXTURE).unwrap()))
            .security(MemorySecurity::arc())
            .localizer(Arc::new(localizer))
            .build();
        ExpressionEngine::builder().services(services).build()
    }

    fn german() -> ActionContext {
        ActionContext::builder().locale("de_DE").build()
    }

    #[rstest]
    #[case("localize('HELLO')", "Hallo")]
    #[case("localize('HELLO', 'shop')", "Willkommen")]
    #[case("localize('HELLO', 'other')", "Hallo")]
    #[case("localize('MISSING')", "MISSING")]
    #[case("localize(this)", "")]
    fn test_localize(#[case] expression: &str, #[case] expected: &str) {
        let value = engine().evaluate(expression, &mut german(), None).unwrap();
        assert_eq!(value, Value::text(expected));
    }

    #[test]
    fn test_ambiguous_localization_fails() {
        let err = engine().evaluate("localize('BYE')", &mut german(), None).unwrap_err();
        assert_eq!(err.status(), 422);
        assert!(err.to_string().contains("Ambiguous localization for key 'BYE' found"));
    }

    #[test]
    fn test_localize_usage() {
        let value = engine()
            .evaluate("localize('a', 'b', 'c')", &mut german(), None)
            .unwrap();
        assert!(value.to_string().starts_with("Usage: ${localize("));
    }

    #[test]
    fn test_template_renders_against_entity() {
        let alice = EntityRef::node("u1", "User");
        let value = engine()
            .evaluate("template('WELCOME', 'de_DE', this)", &mut german(), Some(&alice))
            .unwrap();
        assert_eq!(value, Value::text("Hallo Alice, Willkommen!"));

        let value = engine()
            .evaluate("template('MISSING', 'de_DE', this)", &mut german(), Some(&alice))
            .unwrap();
        assert_eq!(value, Value::text(""));

        let value = engine().evaluate("template('WELCOME')", &mut german(), None).unwrap();
        assert!(value.to_string().starts_with("Usage: ${template("));
    }
}
