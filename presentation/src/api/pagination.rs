//! Pagination headers for task listings.
//!
//! Emits `X-Total-Count`, `X-Page`, `X-Per-Page`, `X-Total-Pages` and an
//! RFC 5988 `Link` header with `first`, `prev`, `next` and `last` relations.

use super::response::ApiResponse;
use taskforge_application::{Page, TaskQuery};

fn page_url(base_path: &str, query: &TaskQuery, page: u32) -> String {
    let mut url = format!("{}?page={}&per_page={}", base_path, page, query.per_page);
    if let Some(status) = query.status {
        url.push_str(&format!("&status={}", status));
    }
    if let Some(task_type) = query.task_type {
        url.push_str(&format!("&type={}", task_type));
    }
    url
}

/// `Link` header value for a page of results.
pub fn link_header<T>(base_path: &str, query: &TaskQuery, page: &Page<T>) -> String {
    let last = page.total_pages().max(1);
    let mut links = vec![(1, "first")];
    if page.has_prev() {
        links.push((page.page.saturating_sub(1).min(last), "prev"));
    }
    if page.has_next() {
        links.push((page.page + 1, "next"));
    }
    links.push((last, "last"));

    links
        .into_iter()
        .map(|(n, rel)| format!("<{}>; rel=\"{}\"", page_url(base_path, query, n), rel))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn with_pagination<T>(
    response: ApiResponse,
    base_path: &str,
    query: &TaskQuery,
    page: &Page<T>,
) -> ApiResponse {
    response
        .with_header("X-Total-Count", page.total.to_string())
        .with_header("X-Page", page.page.to_string())
        .with_header("X-Per-Page", page.per_page.to_string())
        .with_header("X-Total-Pages", page.total_pages().to_string())
        .with_header("Link", link_header(base_path, query, page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskforge_domain::TaskStatus;

    fn page(total: u64, page: u32, per_page: u32) -> Page<()> {
        Page {
            items: Vec::new(),
            total,
            page,
            per_page,
        }
    }

    #[test]
    fn test_middle_page_links_all_relations() {
        let query = TaskQuery::default().with_page(2, 10);
        let link = link_header("/tasks", &query, &page(45, 2, 10));
        assert_eq!(
            link,
            "</tasks?page=1&per_page=10>; rel=\"first\", \
             </tasks?page=1&per_page=10>; rel=\"prev\", \
             </tasks?page=3&per_page=10>; rel=\"next\", \
             </tasks?page=5&per_page=10>; rel=\"last\""
        );
    }

    #[test]
    fn test_filters_are_kept_in_links() {
        let query = TaskQuery::default()
            .with_status(TaskStatus::Failed)
            .with_page(1, 20);
        let link = link_header("/tasks", &query, &page(3, 1, 20));
        assert!(link.contains("status=Failed"));
        assert!(!link.contains("rel=\"next\""));
        assert!(!link.contains("rel=\"prev\""));
    }

    #[test]
    fn test_headers() {
        let query = TaskQuery::default();
        let response = with_pagination(ApiResponse::new(200), "/tasks", &query, &page(0, 1, 20));
        assert_eq!(response.header("X-Total-Count"), Some("0"));
        assert_eq!(response.header("X-Total-Pages"), Some("0"));
        assert!(response.header("Link").unwrap().contains("rel=\"last\""));
    }
}
