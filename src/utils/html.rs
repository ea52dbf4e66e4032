// src/utils/html.rs

/// Sanitizes user-supplied free text (query questions, responses, notification bodies).
///
/// Safe markup such as `<b>` or `<p>` survives; `<script>` (with its content),
/// `<iframe>` and event-handler attributes are stripped. Surrounding whitespace
/// is trimmed.
pub fn clean_text(input: &str) -> String {
    ammonia::clean(input.trim()).trim().to_string()
}

/// Like `clean_text`, but rejects input that is empty once sanitized.
pub fn clean_required(input: &str, field: &str) -> Result<String, crate::error::AppError> {
    let cleaned = clean_text(input);
    if cleaned.is_empty() {
        return Err(crate::error::AppError::BadRequest(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_keeps_formatting() {
        let out = clean_text("  <b>Hi</b><script>alert(1)</script> ");
        assert_eq!(out, "<b>Hi</b>");
    }

    #[test]
    fn script_only_input_is_rejected() {
        assert!(clean_required("<script>x</script>", "question").is_err());
        assert_eq!(clean_required(" ok ", "question").unwrap(), "ok");
    }
}
