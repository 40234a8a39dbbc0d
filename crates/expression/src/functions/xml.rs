//! XML parsing and XPath queries

use std::sync::Arc;

use structr_log::warn;

use super::{Builtin, FunctionOutput, has_length, has_min_length};
use crate::context::ActionContext;
use crate::core::{EntityRef, Value, XmlDocument};
use crate::error::ExpressionResult;
use crate::eval::Evaluator;

type Output = ExpressionResult<FunctionOutput>;

pub(super) const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "xml",
        apply: xml,
        usage: "Usage: ${xml(xmlSource)}. Example: ${xpath(xml(this.xmlSource), \"/test/testValue\")}",
        usage_script: None,
        description: "Parses the given string to an XML DOM",
    },
    Builtin {
        name: "xpath",
        apply: xpath,
        usage: "Usage: ${xpath(xmlDocument, expression)}. Example: ${xpath(xml(this.xmlSource), \"/test/testValue\")}",
        usage_script: None,
        description: "Returns the value of the given XPath expression from the given XML DOM",
    },
];

fn xml(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let source = match args {
        [Value::Text(source)] if has_length(args, 1) => source,
        _ => return Ok(FunctionOutput::empty()),
    };
    match XmlDocument::parse(source) {
        Ok(document) => Ok(Value::Xml(Arc::new(document)).into()),
        Err(err) => {
            warn!(error = %err, "Unable to parse XML");
            Ok(FunctionOutput::empty())
        }
    }
}

fn xpath(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 2) {
        return Ok(FunctionOutput::empty());
    }
    let Value::Xml(document) = &args[0] else {
        return Ok(FunctionOutput::empty());
    };
    let expression = args[1].to_string();
    match document.xpath(&expression) {
        Ok(result) => Ok(Value::Text(result).into()),
        Err(err) => {
            warn!(expression, error = %err, "Unable to evaluate XPath expression");
            Ok(FunctionOutput::empty())
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::Value;
    use crate::functions::test_support::eval;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const DOC: &str = "<test><testValue lang=\"en\">Hello <b>XML</b></testValue><item>1</item><item>2</item></test>";

    #[rstest]
    #[case("/test/testValue", "Hello XML")]
    #[case("/test/item[2]", "2")]
    #[case("//b", "XML")]
    #[case("/test/testValue/@lang", "en")]
    #[case("/test/missing", "")]
    fn test_xpath(#[case] expression: &str, #[case] expected: &str) {
        let value = eval(&format!("xpath(xml('{DOC}'), '{expression}')"));
        assert_eq!(value, Value::text(expected));
    }

    #[test]
    fn test_xml_document_value() {
        assert_eq!(eval(&format!("xml('{DOC}')")).to_string(), "[#document: test]");
        assert_eq!(eval("xml('<broken')"), Value::text(""));
        assert_eq!(eval("xpath('not a document', '/a')"), Value::text(""));
    }
}
