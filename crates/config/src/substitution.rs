use anyhow::Result;
use regex::{Captures, Regex};
use std::env;
use tracing::{debug, warn};

const ENV_VAR_PATTERN: &str = r"\$\{(\w+)\}|\$(\w+)";

/// Substitute environment variables in the format ${VAR_NAME} or $VAR_NAME
pub fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(ENV_VAR_PATTERN)?;
    let mut missing_vars = Vec::new();

    // Replace by match span so `$A` never touches `$AB`
    let result = re.replace_all(content, |caps: &Captures| {
        let placeholder = caps[0].to_string();
        let Some(var) = caps.get(1).or_else(|| caps.get(2)) else {
            return placeholder;
        };
        let var_name = var.as_str();

        match env::var(var_name) {
            Ok(value) => {
                debug!("Substituting environment variable: {} = \"{}\"", var_name, value);
                value
            }
            Err(_) => {
                warn!("Environment variable '{}' not set", var_name);
                // Placeholder stays; the validator reports it
                missing_vars.push(var_name.to_string());
                placeholder
            }
        }
    });
    let result = result.into_owned();

    if !missing_vars.is_empty() {
        debug!(
            "Environment variables not set (may use defaults or fail validation): {:?}",
            missing_vars
        );
    }

    Ok(result)
}

/// Check if a string contains unresolved environment variable placeholders
pub fn has_unresolved_env_vars(content: &str) -> bool {
    Regex::new(ENV_VAR_PATTERN)
        .map(|re| re.is_match(content))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_set_variable() {
        env::set_var("RANGEDESK_TEST_SERVICE", "desk-a");
        let out = substitute_env_vars("name: ${RANGEDESK_TEST_SERVICE}").unwrap();
        assert_eq!(out, "name: desk-a");
    }

    #[test]
    fn test_keeps_placeholder_for_missing_variable() {
        let out = substitute_env_vars("name: ${RANGEDESK_SURELY_UNSET_VAR}").unwrap();
        assert_eq!(out, "name: ${RANGEDESK_SURELY_UNSET_VAR}");
        assert!(has_unresolved_env_vars(&out));
    }

    #[test]
    fn test_bare_variable_does_not_touch_longer_name() {
        env::set_var("RANGEDESK_TEST_A", "short");
        env::set_var("RANGEDESK_TEST_AB", "long");
        let out = substitute_env_vars("a: $RANGEDESK_TEST_A\nb: $RANGEDESK_TEST_AB").unwrap();
        assert_eq!(out, "a: short\nb: long");
    }

    #[test]
    fn test_bare_prefix_of_unset_variable_is_kept() {
        env::set_var("RANGEDESK_TEST_P", "x");
        let out = substitute_env_vars("v: $RANGEDESK_TEST_P $RANGEDESK_TEST_PQ_UNSET").unwrap();
        assert_eq!(out, "v: x $RANGEDESK_TEST_PQ_UNSET");
    }

    #[test]
    fn test_plain_text_has_no_placeholders() {
        assert!(!has_unresolved_env_vars("name: rangedesk"));
    }
}
