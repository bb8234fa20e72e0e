use super::parser::{parse_sitemap, SitemapDocument, SitemapKind};
use super::SitemapError;
use futures::StreamExt;
use std::time::Duration;

const SITEMAP_TIMEOUT: Duration = Duration::from_secs(30);
/// Protocol limit for an uncompressed sitemap.
const MAX_SITEMAP_SIZE: usize = 50 * 1024 * 1024;

/// Fetches every sitemap in order and concatenates their page URLs.
///
/// A sitemap that fails contributes nothing; the others are still read.
/// Duplicates across sitemaps are kept, matching the order they were found.
pub async fn collect_urls(client: &reqwest::Client, sitemaps: &[String]) -> Vec<String> {
    let mut urls = Vec::new();
    for sitemap_url in sitemaps {
        let found = fetch_urls(client, sitemap_url).await;
        tracing::info!(sitemap = %sitemap_url, urls = found.len(), "Read sitemap");
        urls.extend(found);
    }
    urls
}

/// Fetches one sitemap and returns its page URLs in document order.
///
/// Never fails: HTTP, size and parse failures are logged and yield an empty
/// list. A sitemap index is followed one level down; nested indexes below
/// that are skipped. Every non-empty `<loc>` is returned as written; entries
/// that do not look like http(s) URLs are only logged.
pub async fn fetch_urls(client: &reqwest::Client, sitemap_url: &str) -> Vec<String> {
    let doc = match fetch_document(client, sitemap_url).await {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(sitemap = %sitemap_url, error = %e, "Error fetching or parsing sitemap");
            return Vec::new();
        }
    };

    let locs = match doc.kind {
        SitemapKind::UrlSet => doc.locs,
        SitemapKind::Index => {
            let mut locs = Vec::new();
            for child in &doc.locs {
                match fetch_document(client, child).await {
                    Ok(SitemapDocument {
                        kind: SitemapKind::UrlSet,
                        locs: child_locs,
                    }) => locs.extend(child_locs),
                    Ok(_) => {
                        tracing::warn!(sitemap = %child, "Skipping nested sitemap index");
                    }
                    Err(e) => {
                        tracing::warn!(sitemap = %child, error = %e, "Error fetching or parsing sitemap");
                    }
                }
            }
            locs
        }
    };

    log_suspicious_locs(sitemap_url, &locs);
    locs
}

fn log_suspicious_locs(sitemap_url: &str, locs: &[String]) {
    for loc in locs {
        let looks_like_page = loc.starts_with("https://") || loc.starts_with("http://");
        if !looks_like_page {
            tracing::debug!(sitemap = %sitemap_url, url = %loc, "Sitemap entry is not an http(s) URL");
        }
    }
}

async fn fetch_document(
    client: &reqwest::Client,
    sitemap_url: &str,
) -> Result<SitemapDocument, SitemapError> {
    let response = tokio::time::timeout(SITEMAP_TIMEOUT, client.get(sitemap_url).send())
        .await
        .map_err(|_| SitemapError::Timeout)?
        .map_err(SitemapError::Network)?;

    if !response.status().is_success() {
        return Err(SitemapError::HttpStatus(response.status().as_u16()));
    }

    let bytes = read_limited_bytes(response, MAX_SITEMAP_SIZE).await?;
    parse_sitemap(&bytes)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, SitemapError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(SitemapError::TooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(SitemapError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(SitemapError::TooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn urlset(locs: &[&str]) -> String {
        let entries: String = locs
            .iter()
            .map(|l| format!("<url><loc>{l}</loc></url>"))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{entries}</urlset>"#
        )
    }

    async fn serve(server: &MockServer, route: &str, status: u16, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_string(body)
                    .insert_header("Content-Type", "application/xml"),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_fetch_urlset() {
        let server = MockServer::start().await;
        serve(
            &server,
            "/post-sitemap.xml",
            200,
            urlset(&["https://example.com/a", "https://example.com/b"]),
        )
        .await;

        let client = reqwest::Client::new();
        let urls = fetch_urls(&client, &format!("{}/post-sitemap.xml", server.uri())).await;
        assert_eq!(urls, vec!["https://example.com/a", "https://example.com/b"]);
    }

    #[tokio::test]
    async fn test_http_error_yields_empty() {
        let server = MockServer::start().await;
        serve(&server, "/missing.xml", 404, String::new()).await;

        let client = reqwest::Client::new();
        let urls = fetch_urls(&client, &format!("{}/missing.xml", server.uri())).await;
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_sitemap_yields_empty() {
        let server = MockServer::start().await;
        serve(&server, "/broken.xml", 200, "<urlset><url>".to_string()).await;

        let client = reqwest::Client::new();
        let urls = fetch_urls(&client, &format!("{}/broken.xml", server.uri())).await;
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_host_yields_empty() {
        let client = reqwest::Client::new();
        let urls = fetch_urls(&client, "http://127.0.0.1:1/sitemap.xml").await;
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn test_every_loc_kept_in_order() {
        let server = MockServer::start().await;
        serve(
            &server,
            "/sitemap.xml",
            200,
            urlset(&[
                "https://example.com/ok",
                "http://localhost/admin",
                "not a url",
                "https://example.com/also-ok",
            ]),
        )
        .await;

        let client = reqwest::Client::new();
        let urls = fetch_urls(&client, &format!("{}/sitemap.xml", server.uri())).await;
        assert_eq!(
            urls,
            vec![
                "https://example.com/ok",
                "http://localhost/admin",
                "not a url",
                "https://example.com/also-ok"
            ]
        );
    }

    #[tokio::test]
    async fn test_sitemap_index_followed() {
        let server = MockServer::start().await;
        let index = format!(
            r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
<sitemap><loc>{0}/posts.xml</loc></sitemap>
<sitemap><loc>{0}/gone.xml</loc></sitemap>
<sitemap><loc>{0}/pages.xml</loc></sitemap>
</sitemapindex>"#,
            server.uri()
        );
        serve(&server, "/sitemap_index.xml", 200, index).await;
        serve(&server, "/posts.xml", 200, urlset(&["https://example.com/p1"])).await;
        serve(&server, "/gone.xml", 500, String::new()).await;
        serve(&server, "/pages.xml", 200, urlset(&["https://example.com/about"])).await;

        let client = reqwest::Client::new();
        let urls = fetch_urls(&client, &format!("{}/sitemap_index.xml", server.uri())).await;
        assert_eq!(urls, vec!["https://example.com/p1", "https://example.com/about"]);
    }

    #[tokio::test]
    async fn test_collect_urls_concatenates_and_survives_failures() {
        let server = MockServer::start().await;
        serve(&server, "/one.xml", 200, urlset(&["https://example.com/1"])).await;
        serve(&server, "/bad.xml", 503, String::new()).await;
        serve(
            &server,
            "/two.xml",
            200,
            urlset(&["https://example.com/2", "https://example.com/3"]),
        )
        .await;

        let sitemaps = vec![
            format!("{}/one.xml", server.uri()),
            format!("{}/bad.xml", server.uri()),
            format!("{}/two.xml", server.uri()),
        ];
        let client = reqwest::Client::new();
        let urls = collect_urls(&client, &sitemaps).await;
        assert_eq!(
            urls,
            vec![
                "https://example.com/1",
                "https://example.com/2",
                "https://example.com/3"
            ]
        );
    }
}
