//! `edgewire set <component> <property> <value>`.

use serde_json::Value;

use edgewire_core::{Edge, PropertyUpdate};

use crate::cli::{GlobalOpts, SetArgs};
use crate::error::CliError;

/// JSON if it parses (`true`, `42`, `"x"`, `[1,2]`), otherwise the raw string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}

pub async fn handle(edge: &Edge, args: SetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config = edge.valid_config().await?;
    let component = config
        .component(&args.component)
        .ok_or_else(|| CliError::NotFound {
            resource_type: "Component".into(),
            identifier: args.component.clone(),
            list_command: "components".into(),
        })?;

    if let Some(factory) = config.factory(&component.factory_id) {
        if !factory.properties.is_empty()
            && factory.property(&args.property).is_none()
            && component.property(&args.property).is_none()
        {
            return Err(CliError::Validation {
                field: args.property,
                reason: format!("factory {} has no such property", factory.id),
            });
        }
    }

    let value = parse_value(&args.value);
    tracing::debug!(component = %args.component, property = %args.property, %value, "updating component");
    edge.update_component_config(
        &args.component,
        vec![PropertyUpdate::new(args.property.clone(), value.clone())],
    )
    .await?;

    if !global.quiet {
        eprintln!("✓ Set {}.{} = {value}", args.component, args.property);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_parse_as_json_first() {
        assert_eq!(parse_value("false"), json!(false));
        assert_eq!(parse_value("5000"), json!(5000));
        assert_eq!(parse_value("[1,2]"), json!([1, 2]));
        assert_eq!(parse_value("\"GRID\""), json!("GRID"));
    }

    #[test]
    fn bare_words_stay_strings() {
        assert_eq!(parse_value("GRID"), json!("GRID"));
        assert_eq!(parse_value("meter0"), json!("meter0"));
    }
}
