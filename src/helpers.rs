//! Small shared helpers: temperature rounding, email address checks and
//! subscriber token generation.

/// Round a Fahrenheit reading to the nearest whole degree for display.
///
/// Returns 0 for non-finite inputs (NaN, ±Inf).
pub(crate) fn round_temp_f(v: f64) -> i64 {
    if !v.is_finite() {
        tracing::warn!("round_temp_f received non-finite value {}, defaulting to 0", v);
        return 0;
    }
    v.round() as i64
}

/// Check an email address against `^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$`.
///
/// The domain part is split at its first dot: the label before it allows
/// letters, digits and `-`; the rest also allows dots.
pub(crate) fn is_valid_email_address(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '+' | '-'));
    if !local_ok {
        return false;
    }

    let Some((label, rest)) = domain.split_once('.') else {
        return false;
    };

    let label_ok = !label.is_empty()
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-');
    let rest_ok = !rest.is_empty()
        && rest
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');

    label_ok && rest_ok
}

/// New opaque subscriber token: 32 lowercase hex characters.
pub(crate) fn new_subscriber_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
