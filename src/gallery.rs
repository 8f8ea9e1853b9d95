//! Static HTML thumbnail gallery of converted pages.
//!
//! Thumbnails are inlined as `data:` URIs, once per page. Each caption links
//! to the page's PNG by file name, so the download works when the gallery
//! sits next to the saved images.

use crate::output::PageImageResult;
use crate::preview::PreviewRegistry;
use crate::theme::Theme;
use std::fmt::Write as _;

/// Name of the gallery file written next to the page images.
pub const GALLERY_FILENAME: &str = "gallery.html";

/// Render a gallery of `pages`. Pages whose preview has been revoked are
/// left out.
pub fn render_gallery(
    title: &str,
    pages: &[PageImageResult],
    previews: &PreviewRegistry,
    theme: Theme,
) -> String {
    let title = escape_html(title);
    let mut html = String::with_capacity(1024 + pages.len() * 256);

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "<title>{title}</title>");
    html.push_str(
        "<style>\n\
         body{font-family:sans-serif;margin:2rem;background:#fff;color:#222}\n\
         body.dark{background:#1e1e1e;color:#eee}\n\
         .grid{display:grid;grid-template-columns:repeat(auto-fill,minmax(200px,1fr));gap:1rem}\n\
         figure{margin:0;padding:.5rem;border:1px solid #8884;border-radius:6px}\n\
         img{width:100%;height:auto;display:block}\n\
         figcaption{display:flex;justify-content:space-between;font-size:.85rem;margin-top:.4rem}\n\
         </style>\n</head>\n",
    );
    let _ = writeln!(html, "<body class=\"{theme}\">");
    let _ = writeln!(html, "<h1>{title}</h1>\n<div class=\"grid\">");

    for page in pages {
        let Some(src) = previews.data_uri(&page.preview) else {
            continue;
        };
        let filename = escape_html(&page.filename);
        let _ = writeln!(
            html,
            "<figure><img src=\"{src}\" alt=\"Page {n}\">\
             <figcaption><a href=\"{filename}\" download>Page {n}</a><span>{w}×{h}</span></figcaption></figure>",
            n = page.page_number,
            w = page.width,
            h = page.height,
        );
    }

    html.push_str("</div>\n</body>\n</html>\n");
    html
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::page_filename;
    use std::sync::Arc;

    fn page(reg: &PreviewRegistry, n: usize) -> PageImageResult {
        let bytes = Arc::new(b"\x89PNG".to_vec());
        PageImageResult {
            page_number: n,
            preview: reg.create(Arc::clone(&bytes)),
            bytes,
            filename: page_filename(n),
            byte_size: 4,
            width: 10,
            height: 20,
        }
    }

    #[test]
    fn inlines_live_previews_only() {
        let reg = PreviewRegistry::new();
        let pages = vec![page(&reg, 1), page(&reg, 2)];
        reg.revoke(&pages[1].preview);

        let html = render_gallery("<report>.pdf", &pages, &reg, Theme::Dark);
        assert!(html.contains("&lt;report&gt;.pdf"));
        assert!(html.contains("body class=\"dark\""));
        assert!(html.contains("<a href=\"page-01.png\" download>Page 1</a>"));
        assert!(!html.contains("page-02.png"));
    }

    #[test]
    fn each_thumbnail_is_inlined_once() {
        let reg = PreviewRegistry::new();
        let pages = vec![page(&reg, 1), page(&reg, 2), page(&reg, 3)];

        let html = render_gallery("three.pdf", &pages, &reg, Theme::Light);
        assert_eq!(html.matches("data:image/png;base64,iVBORw==").count(), 3);
        assert_eq!(html.matches(" download>").count(), 3);
    }
}
