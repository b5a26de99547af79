//! The fixed portfolio gallery.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;

/// One image in the portfolio.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GalleryEntry {
    /// Public path, e.g. `/portfolio/1.jpg`
    pub src: &'static str,
    /// Alt text
    pub alt: &'static str,
    /// Short description of the shot
    pub hint: &'static str,
}

const fn entry(src: &'static str, alt: &'static str, hint: &'static str) -> GalleryEntry {
    GalleryEntry { src, alt, hint }
}

/// Every portfolio image, in display order.
pub static PORTFOLIO: [GalleryEntry; 10] = [
    entry("/portfolio/1.jpg", "Portfolio image 1", "editorial fashion"),
    entry("/portfolio/2.jpg", "Portfolio image 2", "haute couture"),
    entry("/portfolio/3.jpg", "Portfolio image 3", "runway walk"),
    entry("/portfolio/4.jpg", "Portfolio image 4", "commercial smile"),
    entry("/portfolio/5.jpg", "Portfolio image 5", "street style"),
    entry("/portfolio/6.jpg", "Portfolio image 6", "beauty shot"),
    entry("/portfolio/7.jpg", "Portfolio image 7", "lifestyle product"),
    entry("/portfolio/8.jpg", "Portfolio image 8", "designer show"),
    entry("/portfolio/9.jpg", "Portfolio image 9", "portrait"),
    entry("/portfolio/10.jpg", "Portfolio image 10", "magazine cover"),
];

/// The `src` of every portfolio image.
pub fn portfolio_srcs() -> Vec<String> {
    PORTFOLIO.iter().map(|entry| entry.src.to_string()).collect()
}

/// Maps a public path to a file under `public_dir`.
///
/// Returns `None` for paths that would escape the directory or don't name a file.
pub fn resolve(public_dir: &Path, src: &str) -> Option<PathBuf> {
    let relative = Path::new(src.trim_start_matches('/'));
    let mut resolved = public_dir.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if resolved == public_dir || relative.file_name().is_none() {
        return None;
    }
    Some(resolved)
}
