// Helper functions for safe logging

/// Masks email addresses for safe logging
/// Prevents sensitive data exposure while preserving debugging utility
///
/// # Example
/// ```ignore
/// let masked = safe_email_log("fid-1@farcaster.ephemnotes.app");
/// // Returns: "f***@farcaster.ephemnotes.app"
/// ```
pub fn safe_email_log(email: &str) -> String {
    if email.len() > 3 {
        let parts: Vec<&str> = email.split('@').collect();
        match (parts.len(), parts[0].chars().next()) {
            (2, Some(first)) => format!("{}***@{}", first, parts[1]),
            _ => "***@***.***".to_string(),
        }
    } else {
        "***@***.***".to_string()
    }
}

/// Masks tokens and signatures for safe logging
/// Shows only first and last 4 characters
pub fn safe_token_log(token: &str) -> String {
    if token.len() > 8 && token.is_ascii() {
        format!("{}...{}", &token[..4], &token[token.len() - 4..])
    } else {
        "***".to_string()
    }
}

/// Masks an Ethereum address down to its prefix and last four hex digits
pub fn safe_address_log(address: &str) -> String {
    if address.len() == 42 && address.is_ascii() {
        format!("{}...{}", &address[..6], &address[38..])
    } else {
        "0x***".to_string()
    }
}
