//! Server-side HTML for the gallery page.

use std::fmt::Write;

use crate::gallery::GalleryEntry;

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>AI Image Gallery</title>
    <style>
        * {
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }

        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, Cantarell, sans-serif;
            background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
            min-height: 100vh;
            padding: 40px 20px;
        }

        .container {
            background: white;
            border-radius: 20px;
            box-shadow: 0 20px 60px rgba(0,0,0,0.3);
            max-width: 1100px;
            margin: 0 auto;
            padding: 40px;
        }

        h1 {
            color: #333;
            margin-bottom: 10px;
            font-size: 2em;
        }

        .subtitle {
            color: #666;
            margin-bottom: 30px;
            font-size: 0.9em;
        }

        .upload-form {
            border: 3px dashed #667eea;
            border-radius: 15px;
            padding: 30px 20px;
            text-align: center;
            background: #f8f9ff;
            margin-bottom: 40px;
        }

        .upload-form button {
            background: #667eea;
            color: white;
            border: none;
            padding: 10px 24px;
            border-radius: 20px;
            font-weight: 600;
            cursor: pointer;
            margin-left: 10px;
        }

        .grid {
            display: grid;
            grid-template-columns: repeat(auto-fill, minmax(300px, 1fr));
            gap: 24px;
        }

        .card {
            background: #f8f9ff;
            border-radius: 10px;
            overflow: hidden;
            box-shadow: 0 4px 15px rgba(0,0,0,0.1);
        }

        .card img {
            width: 100%;
            display: block;
        }

        .card-body {
            padding: 16px 20px 20px;
        }

        .card-title {
            color: #333;
            font-size: 1.1em;
            font-weight: 600;
            margin-bottom: 8px;
        }

        .card-text {
            color: #555;
            line-height: 1.6;
        }

        .card-name {
            color: #999;
            font-size: 0.8em;
            margin-top: 12px;
        }

        .empty {
            color: #999;
            text-align: center;
            padding: 40px;
        }
    </style>
</head>
<body>
    <div class="container">
        <h1>🎨 AI Image Gallery</h1>
        <p class="subtitle">Upload an image and Gemini writes its title and description.</p>

        <form class="upload-form" method="post" action="/upload" enctype="multipart/form-data">
            <input type="file" name="form_file" accept="image/jpeg,image/png" required>
            <button type="submit">Upload</button>
        </form>
"#;

const PAGE_TAIL: &str = r#"    </div>
</body>
</html>
"#;

pub fn gallery_page(entries: &[GalleryEntry]) -> String {
    let mut html = String::with_capacity(PAGE_HEAD.len() + entries.len() * 400);
    html.push_str(PAGE_HEAD);

    if entries.is_empty() {
        html.push_str("        <p class=\"empty\">No images yet.</p>\n");
    } else {
        html.push_str("        <div class=\"grid\">\n");
        for entry in entries {
            // Writing into a String cannot fail.
            let _ = write!(
                html,
                r#"            <div class="card">
                <img src="/files/{src}" alt="{alt}" loading="lazy">
                <div class="card-body">
                    <div class="card-title">{title}</div>
                    <div class="card-text">{description}</div>
                    <div class="card-name">{name}</div>
                </div>
            </div>
"#,
                src = escape_html(&encode_path_segment(&entry.name)),
                alt = escape_html(&entry.title),
                title = escape_html(&entry.title),
                description = escape_html(&entry.description),
                name = escape_html(&entry.name),
            );
        }
        html.push_str("        </div>\n");
    }

    html.push_str(PAGE_TAIL);
    html
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Percent-encode everything outside RFC 3986 unreserved characters.
fn encode_path_segment(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            other => {
                let _ = write!(out, "%{other:02X}");
            }
        }
    }
    out
}
