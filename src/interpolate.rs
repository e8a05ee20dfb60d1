use crate::value::Value;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum InterpolateError {
    #[error("Unterminated `{{{{` on line {line}")]
    Unterminated { line: usize },

    #[error("Unknown expression `{expression}` on line {line}")]
    UnknownExpression { expression: String, line: usize },
}

/// Substitute `{{ ... }}` markers in a text (e.g. a startup script)
///
/// Supported expressions:
/// - `ref('Name')`
/// - `get_att('Name', 'Attribute')`
/// - `aws_region`, `aws_stack_id`, `aws_stack_name`, `aws_account_id`
///
/// Markers are replaced by the matching intrinsic and the whole text becomes
/// `{"Fn::Join": ["", [...]]}`. Names are not checked here, the assembler
/// resolves them with the rest of the template.
pub fn interpolate(text: &str) -> Result<Value, InterpolateError> {
    let mut parts: Vec<Value> = vec![];
    let mut literal = String::new();
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        literal.push_str(&rest[..start]);

        let line = line_of(text, text.len() - rest.len() + start);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or(InterpolateError::Unterminated { line })?;

        let expression = after[..end].trim();
        let value = expression_value(expression).ok_or_else(|| {
            InterpolateError::UnknownExpression {
                expression: expression.to_string(),
                line,
            }
        })?;

        if !literal.is_empty() {
            parts.push(Value::String(std::mem::take(&mut literal)));
        }
        parts.push(value);

        rest = &after[end + 2..];
    }
    literal.push_str(rest);

    if parts.is_empty() {
        return Ok(Value::String(literal));
    }

    if !literal.is_empty() {
        parts.push(Value::String(literal));
    }

    Ok(Value::join("", parts))
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

fn expression_value(expression: &str) -> Option<Value> {
    match expression {
        "aws_region" => return Some(Value::region()),
        "aws_stack_id" => return Some(Value::stack_id()),
        "aws_stack_name" => return Some(Value::stack_name()),
        "aws_account_id" => return Some(Value::reference("AWS::AccountId")),
        _ => (),
    }

    let (function, arguments) = expression.split_once('(')?;
    let arguments = arguments.strip_suffix(')')?;
    let arguments = arguments
        .split(',')
        .map(|argument| unquote(argument.trim()))
        .collect::<Option<Vec<&str>>>()?;

    match (function.trim(), arguments.as_slice()) {
        ("ref", [name]) => Some(Value::reference(*name)),
        ("get_att", [resource, attribute]) => Some(Value::get_att(*resource, *attribute)),
        _ => None,
    }
}

fn unquote(argument: &str) -> Option<&str> {
    ['\'', '"'].iter().find_map(|quote| {
        argument
            .strip_prefix(*quote)
            .and_then(|a| a.strip_suffix(*quote))
            .filter(|a| !a.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::{interpolate, InterpolateError};
    use crate::value::Value;

    #[test]
    fn plain_text_stays_a_string() {
        assert_eq!(
            interpolate("#!/bin/bash\necho hello\n").unwrap(),
            Value::from("#!/bin/bash\necho hello\n")
        );
    }

    #[test]
    fn substitutes_references() {
        let script = "#!/bin/bash\naws s3 cp s3://{{ ref('OpenShiftInstallS3BucketName') }}/install.tgz .\nexport REGION={{aws_region}}\n";

        assert_eq!(
            interpolate(script).unwrap(),
            Value::join(
                "",
                [
                    Value::from("#!/bin/bash\naws s3 cp s3://"),
                    Value::reference("OpenShiftInstallS3BucketName"),
                    Value::from("/install.tgz .\nexport REGION="),
                    Value::region(),
                    Value::from("\n"),
                ]
            )
        );
    }

    #[test]
    fn attribute_getter() {
        assert_eq!(
            interpolate(r#"{{get_att("OpenShiftMaster", "PrivateIp")}}"#).unwrap(),
            Value::join("", [Value::get_att("OpenShiftMaster", "PrivateIp")])
        );
    }

    #[test]
    fn unterminated_marker() {
        assert_eq!(
            interpolate("line one\nhost={{ ref('Master')\n").unwrap_err(),
            InterpolateError::Unterminated { line: 2 }
        );
    }

    #[test]
    fn unknown_expression() {
        assert_eq!(
            interpolate("{{ lookup('x') }}").unwrap_err(),
            InterpolateError::UnknownExpression {
                expression: "lookup('x')".to_string(),
                line: 1,
            }
        );
        assert!(interpolate("{{ ref(Master) }}").is_err());
        assert!(interpolate("{{ ref('A', 'B') }}").is_err());
    }
}
