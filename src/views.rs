//! HTML pages served by the front-end.
//!
//! Pages are assembled as strings; every piece of user or storage data goes
//! through [`html_escape`] first.

use crate::models::object::ObjectSummary;

const STYLE: &str = "body{font-family:sans-serif;margin:2rem}\
table{border-collapse:collapse}\
td,th{padding:.3rem .8rem;border-bottom:1px solid #ddd;text-align:left}\
td.size{text-align:right}";

/// The listing page: an upload form followed by one table row per object,
/// each with its own delete button.
pub fn index_page(container: &str, items: &[ObjectSummary]) -> String {
    let mut html = page_head(&format!("Files in {}", container));

    html.push_str(&format!("<h1>Files in {}</h1>", html_escape(container)));
    html.push_str(
        r#"<form action="/upload" method="post" enctype="multipart/form-data">"#,
    );
    html.push_str(r#"<input type="file" name="file1" required> "#);
    html.push_str(r#"<button type="submit">Upload</button></form>"#);

    if items.is_empty() {
        html.push_str("<p>No files yet.</p>");
    } else {
        html.push_str("<table><thead><tr><th>Name</th><th>Size</th><th></th></tr></thead><tbody>");
        for item in items {
            let name = html_escape(&item.name);
            html.push_str("<tr>");
            html.push_str(&format!("<td>{}</td>", name));
            html.push_str(&format!(
                r#"<td class="size" title="{} bytes">{}</td>"#,
                item.size,
                human_size(item.size)
            ));
            html.push_str(&format!(
                concat!(
                    r#"<td><form action="/delete" method="post">"#,
                    r#"<input type="hidden" name="name" value="{}">"#,
                    r#"<button type="submit">Delete</button></form></td>"#
                ),
                name
            ));
            html.push_str("</tr>");
        }
        html.push_str("</tbody></table>");
    }

    html.push_str(&format!("<p>{} file(s)</p>", items.len()));
    html.push_str("</body></html>");
    html
}

/// The page shown when a request fails.
pub fn error_page(status: u16, message: &str) -> String {
    let mut html = page_head("Error");
    html.push_str(&format!("<h1>Error {}</h1>", status));
    html.push_str(&format!("<pre>{}</pre>", html_escape(message)));
    html.push_str(r#"<p><a href="/">Back to the file list</a></p>"#);
    html.push_str("</body></html>");
    html
}

fn page_head(title: &str) -> String {
    format!(
        concat!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\">",
            "<title>{}</title><style>{}</style></head><body>"
        ),
        html_escape(title),
        STYLE
    )
}

pub fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// `1536` -> `1.5 KiB`. Plain byte counts below 1 KiB.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
