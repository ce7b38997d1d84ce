//! Syntactic checks for schedule expressions.
//!
//! Expressions stay opaque strings; only their shape is validated:
//! `cron(min hour day-of-month month day-of-week year)` or `rate(n unit)`.

use crate::error::{Result, VandelayError};
use regex::Regex;
use std::sync::OnceLock;

/// Weekly, Monday 12:00.
pub const DEFAULT_SCHEDULE: &str = "cron(0 12 ? * MON *)";

static CRON_FIELD_RE: OnceLock<Regex> = OnceLock::new();
static RATE_RE: OnceLock<Regex> = OnceLock::new();

fn cron_field_re() -> &'static Regex {
    CRON_FIELD_RE.get_or_init(|| Regex::new(r"^[0-9A-Za-z*?,/#\-]+$").unwrap())
}

fn rate_re() -> &'static Regex {
    RATE_RE.get_or_init(|| {
        Regex::new(r"^rate\(([0-9]+) (minute|minutes|hour|hours|day|days)\)$").unwrap()
    })
}

fn invalid(expression: &str, reason: impl Into<String>) -> VandelayError {
    VandelayError::InvalidSchedule {
        expression: expression.to_string(),
        reason: reason.into(),
    }
}

pub fn validate(expression: &str) -> Result<()> {
    let expr = expression.trim();
    if expr.starts_with("rate(") {
        return validate_rate(expr);
    }
    if let Some(body) = expr.strip_prefix("cron(").and_then(|s| s.strip_suffix(')')) {
        return validate_cron(expr, body);
    }
    Err(invalid(expression, "expected cron(...) or rate(...)"))
}

fn validate_rate(expr: &str) -> Result<()> {
    let caps = rate_re()
        .captures(expr)
        .ok_or_else(|| invalid(expr, "expected rate(<n> <minute|hour|day>[s])"))?;
    let n: u64 = caps[1]
        .parse()
        .map_err(|_| invalid(expr, "rate value out of range"))?;
    if n == 0 {
        return Err(invalid(expr, "rate value must be at least 1"));
    }
    Ok(())
}

fn validate_cron(expr: &str, body: &str) -> Result<()> {
    let fields: Vec<&str> = body.split_whitespace().collect();
    if fields.len() != 6 {
        return Err(invalid(
            expr,
            format!("cron needs 6 fields, found {}", fields.len()),
        ));
    }
    if let Some(bad) = fields.iter().find(|f| !cron_field_re().is_match(f)) {
        return Err(invalid(expr, format!("unexpected characters in field '{bad}'")));
    }
    // day-of-month and day-of-week cannot both be constrained
    let dom_any = fields[2] == "?";
    let dow_any = fields[4] == "?";
    if dom_any == dow_any {
        return Err(invalid(
            expr,
            "exactly one of day-of-month and day-of-week must be '?'",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_is_valid() {
        validate(DEFAULT_SCHEDULE).unwrap();
    }

    #[test]
    fn valid_expressions() {
        for expr in [
            "cron(0 12 ? * MON *)",
            "cron(15 10 ? * 6L 2027-2030)",
            "cron(0/15 * 1 * ? *)",
            "cron(0 8 1,15 * ? *)",
            "rate(1 day)",
            "rate(5 minutes)",
        ] {
            validate(expr).unwrap_or_else(|e| panic!("expected valid: {expr}: {e}"));
        }
    }

    #[test]
    fn invalid_expressions() {
        for expr in [
            "",
            "weekly",
            "cron(0 12 * * MON)",
            "cron(0 12 * * MON *)",
            "cron(0 12 ? * ? *)",
            "cron(0 12 ? * MON! *)",
            "rate(0 days)",
            "rate(5 weeks)",
            "rate(five minutes)",
        ] {
            assert!(validate(expr).is_err(), "expected invalid: {expr}");
        }
    }

    #[test]
    fn error_names_expression() {
        let err = validate("cron(1 2 3)").unwrap_err();
        assert!(err.to_string().contains("cron(1 2 3)"));
        assert!(err.to_string().contains("6 fields"));
    }
}
