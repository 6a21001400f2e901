//! Built-in HTML error pages.

/// The 403 Forbidden page.
#[must_use]
pub fn forbidden_page() -> String {
    page(
        "403 Forbidden",
        "You don't have permission to access this resource.",
    )
}

/// The 503 Service Unavailable page.
#[must_use]
pub fn service_unavailable_page() -> String {
    page(
        "503 Service Unavailable",
        "The service is temporarily unable to handle the request.",
    )
}

/// The 429 Too Many Requests page.
#[must_use]
pub fn too_many_requests_page(seconds: u64) -> String {
    page(
        "429 Too Many Requests",
        &format!("Request capacity reached. Try again in {seconds} seconds."),
    )
}

fn page(title: &str, message: &str) -> String {
    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head><title>{title}</title></head>\n\
         <body>\n\
         <h1>{title}</h1>\n\
         <p>{message}</p>\n\
         </body>\n\
         </html>\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_carry_status_titles() {
        assert!(forbidden_page().contains("403 Forbidden"));
        assert!(service_unavailable_page().contains("503 Service Unavailable"));
        let page = too_many_requests_page(10);
        assert!(page.contains("429 Too Many Requests"));
        assert!(page.contains("10 seconds"));
    }
}
