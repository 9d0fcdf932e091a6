use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::feed::BlogPost;
use crate::render::MONTH_NAMES;
use crate::tags::{self, TagIndex};

const POPULAR_TAG_LIMIT: usize = 30;

const REFLECTION_CSS: &str = r#"/* Book theme for the yearly reflection pages */

:root {
  --color-bg: #f9f7f4;
  --color-paper: #ffffff;
  --color-text: #2c2c2c;
  --color-text-light: #666666;
  --color-accent: #8b7355;
  --color-border: #e0dcd5;
  --font-serif: 'Georgia', serif;
  --font-sans: 'Arial', sans-serif;
}

* { box-sizing: border-box; }

body {
  font-family: var(--font-serif);
  color: var(--color-text);
  background-color: var(--color-bg);
  line-height: 1.7;
  margin: 0;
  padding: 0;
}

.container {
  max-width: 900px;
  margin: 0 auto;
  padding: 2rem;
}

.reflection-header {
  background: var(--color-paper);
  border-bottom: 3px solid var(--color-accent);
  padding: 2rem 0;
  box-shadow: 0 2px 4px rgba(0,0,0,0.1);
  position: sticky;
  top: 0;
  z-index: 100;
}

.book-title {
  font-size: 2rem;
  margin: 0 0 0.5rem 0;
  color: var(--color-accent);
  text-align: center;
}

.year-label {
  font-size: 1.5rem;
  text-align: center;
  color: var(--color-text-light);
  margin: 0;
}

.sidebar {
  background: var(--color-paper);
  padding: 1.5rem;
  margin-bottom: 2rem;
  border-radius: 8px;
  box-shadow: 0 2px 4px rgba(0,0,0,0.05);
}

.sidebar h3 {
  margin-top: 0;
  color: var(--color-accent);
  font-size: 1.2rem;
}

.tag {
  display: inline-block;
  background: var(--color-bg);
  border: 2px solid var(--color-border);
  padding: 0.4rem 0.8rem;
  margin: 0.25rem;
  border-radius: 4px;
  cursor: pointer;
  font-family: var(--font-sans);
  font-size: 0.9rem;
  transition: all 0.2s;
}

.tag:hover, .tag.active {
  border-color: var(--color-accent);
  background: var(--color-accent);
  color: white;
}

.month-section { margin-bottom: 3rem; }

.month-header {
  font-size: 2rem;
  color: var(--color-accent);
  border-bottom: 2px solid var(--color-border);
  padding-bottom: 0.5rem;
  margin: 2rem 0 1.5rem 0;
}

.post-card {
  background: var(--color-paper);
  padding: 2rem;
  margin-bottom: 2rem;
  border-left: 4px solid var(--color-accent);
  box-shadow: 0 2px 4px rgba(0,0,0,0.05);
  transition: transform 0.2s;
}

.post-card:hover { transform: translateX(4px); }

.post-date {
  font-family: var(--font-sans);
  font-size: 0.875rem;
  text-transform: uppercase;
  letter-spacing: 1px;
  color: var(--color-accent);
  font-weight: 600;
  margin-bottom: 1rem;
  display: block;
}

.post-content {
  margin: 1rem 0;
  font-size: 1.05rem;
  line-height: 1.8;
}

.post-content p { margin: 0 0 1rem 0; }

.post-image {
  max-width: 100%;
  height: auto;
  border-radius: 4px;
  margin: 1rem 0;
}

.post-tags { margin-top: 1rem; }

.tag-pill {
  display: inline-block;
  background: var(--color-bg);
  color: var(--color-text);
  padding: 0.25rem 0.75rem;
  margin: 0.25rem 0.25rem 0.25rem 0;
  border-radius: 20px;
  font-size: 0.8rem;
  font-family: var(--font-sans);
  border: 1px solid var(--color-border);
}

@media (max-width: 768px) {
  .container { padding: 1rem; }
  .book-title { font-size: 1.5rem; }
  .month-header { font-size: 1.5rem; }
  .post-card { padding: 1.5rem; }
}
"#;

const REFLECTION_JS: &str = r#"// Tag filtering for the yearly reflection page

class ReflectionApp {
  constructor() {
    this.activeFilters = new Set();
    this.data = null;
  }

  async init() {
    const response = await fetch('data/posts.json');
    this.data = await response.json();
    this.setupTagFilters();
  }

  setupTagFilters() {
    document.querySelectorAll('.tag').forEach(btn => {
      btn.addEventListener('click', (e) => {
        const tag = e.target.dataset.tag;
        e.target.classList.toggle('active');
        if (this.activeFilters.has(tag)) {
          this.activeFilters.delete(tag);
        } else {
          this.activeFilters.add(tag);
        }
        this.applyFilters();
      });
    });
  }

  applyFilters() {
    if (this.activeFilters.size === 0) {
      this.showAllPosts();
      return;
    }

    const matching = this.data.posts.filter(post =>
      Array.from(this.activeFilters).every(tag =>
        post.labels.map(l => l.toLowerCase()).includes(tag)
      )
    );
    const matchingIds = new Set(matching.map(p => p.id));

    document.querySelectorAll('.post-card').forEach(card => {
      card.style.display = matchingIds.has(card.dataset.postId) ? 'block' : 'none';
    });
    this.updateMonthSections();
  }

  showAllPosts() {
    document.querySelectorAll('.post-card').forEach(card => {
      card.style.display = 'block';
    });
    document.querySelectorAll('.month-section').forEach(section => {
      section.style.display = 'block';
    });
  }

  updateMonthSections() {
    document.querySelectorAll('.month-section').forEach(section => {
      const visible = Array.from(section.querySelectorAll('.post-card'))
        .filter(card => card.style.display !== 'none');
      section.style.display = visible.length > 0 ? 'block' : 'none';
    });
  }
}

document.addEventListener('DOMContentLoaded', () => {
  new ReflectionApp().init();
});
"#;

/// Write the reflection page and its static assets for one year.
pub fn generate_reflection_page(
    output_dir: &Path,
    year: i32,
    posts: &[BlogPost],
    tag_index: &TagIndex,
) -> Result<()> {
    let year_dir = output_dir.join(year.to_string());
    fs::create_dir_all(&year_dir)
        .with_context(|| format!("Failed to create {}", year_dir.display()))?;

    write_static_assets(&year_dir)?;

    let html = build_reflection_html(year, posts, tag_index);
    let html_file = year_dir.join("reflection.html");
    fs::write(&html_file, html)
        .with_context(|| format!("Failed to write {}", html_file.display()))?;
    info!("Generated reflection.html: {}", html_file.display());

    Ok(())
}

/// Write the master index page listing every generated year, newest first.
pub fn generate_index_page(output_dir: &Path, years: &[i32]) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let mut sorted: Vec<i32> = years.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let year_links: String = sorted
        .iter()
        .map(|y| format!("        <li><a href=\"{y}/reflection.html\">{y}</a></li>\n"))
        .collect();

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Yearly Reflections</title>
    <style>
        body {{
            font-family: Georgia, serif;
            max-width: 600px;
            margin: 4rem auto;
            padding: 2rem;
            background: #f9f7f4;
        }}
        h1 {{ color: #8b7355; text-align: center; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ margin: 1rem 0; }}
        a {{
            color: #8b7355;
            text-decoration: none;
            font-size: 1.5rem;
            display: block;
            padding: 1rem;
            background: white;
            border-radius: 8px;
            text-align: center;
            transition: transform 0.2s;
        }}
        a:hover {{
            transform: translateY(-2px);
            box-shadow: 0 4px 8px rgba(0,0,0,0.1);
        }}
    </style>
</head>
<body>
    <h1>Yearly Reflections</h1>
    <p style="text-align: center; color: #666;">Select a year to explore</p>
    <ul>
{year_links}    </ul>
</body>
</html>"#
    );

    let index_file = output_dir.join("index.html");
    fs::write(&index_file, html)
        .with_context(|| format!("Failed to write {}", index_file.display()))?;
    info!("Generated index.html: {}", index_file.display());

    Ok(())
}

fn write_static_assets(year_dir: &Path) -> Result<()> {
    let css_dir = year_dir.join("assets").join("css");
    let js_dir = year_dir.join("assets").join("js");
    fs::create_dir_all(&css_dir)
        .with_context(|| format!("Failed to create {}", css_dir.display()))?;
    fs::create_dir_all(&js_dir).with_context(|| format!("Failed to create {}", js_dir.display()))?;

    fs::write(css_dir.join("reflection.css"), REFLECTION_CSS).context("Failed to write CSS")?;
    fs::write(js_dir.join("reflection.js"), REFLECTION_JS).context("Failed to write JS")?;
    Ok(())
}

fn build_reflection_html(year: i32, posts: &[BlogPost], tag_index: &TagIndex) -> String {
    let tag_buttons = build_tag_buttons(tag_index);
    let month_sections = build_month_sections(posts);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{year} - Yearly Reflections</title>
    <link rel="stylesheet" href="assets/css/reflection.css">
</head>
<body>
    <header class="reflection-header">
        <div class="container">
            <h1 class="book-title">Yearly Reflections</h1>
            <p class="year-label">{year}</p>
        </div>
    </header>

    <main class="reflection-content">
        <div class="container">
            <aside class="sidebar">
                <h3>Filter by Tag</h3>
                <div class="tags">
{tag_buttons}                </div>
            </aside>

            <div class="timeline">
{month_sections}            </div>
        </div>
    </main>

    <script src="assets/js/reflection.js"></script>
</body>
</html>"#
    )
}

fn build_tag_buttons(tag_index: &TagIndex) -> String {
    tags::popular_tags(tag_index, POPULAR_TAG_LIMIT)
        .iter()
        .map(|(tag, count)| {
            format!(
                "                    <button class=\"tag\" data-tag=\"{tag}\">{tag} <span>({count})</span></button>\n"
            )
        })
        .collect()
}

fn build_month_sections(posts: &[BlogPost]) -> String {
    let mut months: BTreeMap<u32, Vec<&BlogPost>> = BTreeMap::new();
    for post in posts {
        if let Some(date) = post.date {
            months
                .entry(chrono::Datelike::month0(&date))
                .or_default()
                .push(post);
        }
    }

    months
        .iter()
        .map(|(month_idx, month_posts)| {
            let cards: String = month_posts.iter().map(|p| build_post_card(p)).collect();
            format!(
                r#"            <section class="month-section" id="month-{month_idx}">
                <h2 class="month-header">{name}</h2>
                <div class="posts-grid">
{cards}                </div>
            </section>
"#,
                name = MONTH_NAMES[*month_idx as usize],
            )
        })
        .collect()
}

fn build_post_card(post: &BlogPost) -> String {
    let date_str = match post.date {
        Some(date) => date.format("%A %d %B, %Y").to_string(),
        None => post.title.clone(),
    };
    let tags_html: String = post
        .labels
        .iter()
        .map(|tag| format!("<span class=\"tag-pill\">{tag}</span> "))
        .collect::<String>()
        .trim_end()
        .to_string();

    format!(
        r#"                    <article class="post-card" data-post-id="{id}">
                        <time class="post-date">{date_str}</time>
                        <div class="post-content">
                            {content}
                        </div>
                        <div class="post-tags">
                            {tags_html}
                        </div>
                    </article>
"#,
        id = post.post_id,
        content = post.content_html,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn post(id: &str, date: (i32, u32, u32), labels: &[&str]) -> BlogPost {
        BlogPost {
            title: format!("Post {}", id),
            published: String::new(),
            content_html: "<p>body</p>".to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            post_id: id.to_string(),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2),
            image_urls: Vec::new(),
            has_images: false,
            preview: String::new(),
        }
    }

    #[test]
    fn reflection_page_contains_months_and_posts() {
        let dir = tempfile::tempdir().unwrap();
        let posts = [
            post("post-2023-01-02", (2023, 1, 2), &["travel"]),
            post("post-2023-08-15", (2023, 8, 15), &["family"]),
        ];
        let index = crate::tags::build_index(&posts);
        generate_reflection_page(dir.path(), 2023, &posts, &index).unwrap();

        let html = fs::read_to_string(dir.path().join("2023/reflection.html")).unwrap();
        assert!(html.contains("January"));
        assert!(html.contains("August"));
        assert!(html.contains("data-post-id=\"post-2023-01-02\""));
        assert!(html.contains("Monday 02 January, 2023"));
        assert!(html.contains("data-tag=\"travel\""));

        assert!(dir.path().join("2023/assets/css/reflection.css").exists());
        assert!(dir.path().join("2023/assets/js/reflection.js").exists());
    }

    #[test]
    fn month_sections_follow_calendar_order() {
        let posts = [
            post("b", (2023, 8, 15), &[]),
            post("a", (2023, 1, 2), &[]),
        ];
        let html = build_month_sections(&posts);
        let jan = html.find("January").unwrap();
        let aug = html.find("August").unwrap();
        assert!(jan < aug);
    }

    #[test]
    fn index_page_lists_years_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        generate_index_page(dir.path(), &[2021, 2023, 2022]).unwrap();

        let html = fs::read_to_string(dir.path().join("index.html")).unwrap();
        let p2023 = html.find("2023/reflection.html").unwrap();
        let p2022 = html.find("2022/reflection.html").unwrap();
        let p2021 = html.find("2021/reflection.html").unwrap();
        assert!(p2023 < p2022 && p2022 < p2021);
    }

    #[test]
    fn undated_post_card_falls_back_to_title() {
        let mut p = post("x", (2023, 1, 2), &[]);
        p.date = None;
        let card = build_post_card(&p);
        assert!(card.contains("Post x"));
    }
}
