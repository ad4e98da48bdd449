//! Validation module for wizard input
//!
//! The wizard passes credentials through to Telegram verbatim. The only local
//! checks are the ones needed to build a login request at all:
//!
//! - API id must be an integer
//! - Free-text input is trimmed and must not be empty

/// Parse the API id typed by the user
///
/// # Returns
/// * `Ok(i32)` - The parsed id
/// * `Err(&str)` - Error type: "api-id-not-number"
///
/// # Examples
/// ```
/// use sessiongen_bot::validation::parse_api_id;
///
/// assert_eq!(parse_api_id(" 12345 "), Ok(12345));
/// assert_eq!(parse_api_id("abc"), Err("api-id-not-number"));
/// ```
pub fn parse_api_id(input: &str) -> Result<i32, &'static str> {
    input.trim().parse::<i32>().map_err(|_| "api-id-not-number")
}

/// Trim wizard text input
///
/// Returns `None` for input that is empty after trimming.
pub fn normalize_input(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
