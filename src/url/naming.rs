use crate::{UrlError, UrlResult};
use url::Url;

/// Returns the last path segment of a URL
///
/// The segment is returned as it appears in the URL (still percent-encoded), so it
/// never contains a path separator.
pub fn file_name(url: &Url) -> UrlResult<&str> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| UrlError::MissingFileName(url.to_string()))
}

/// Returns the sandbox name of the archive built for a chapter
///
/// # Examples
///
/// ```
/// use url::Url;
/// use cbz_stream::url::chapter_archive_name;
///
/// let chapter = Url::parse("https://example.com/chapters/17").unwrap();
/// assert_eq!(chapter_archive_name(&chapter).unwrap(), "17.cbz");
/// ```
pub fn chapter_archive_name(chapter: &Url) -> UrlResult<String> {
    Ok(format!("{}.cbz", file_name(chapter)?))
}

/// A parsed image file name of the form `<chapter>-<image>.<extension>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageName {
    pub chapter: u32,
    pub image: u32,
    pub extension: String,
}

impl ImageName {
    /// Parses an image file name
    ///
    /// # Examples
    ///
    /// ```
    /// use cbz_stream::url::ImageName;
    ///
    /// let name = ImageName::parse("3-12.jpg").unwrap();
    /// assert_eq!((name.chapter, name.image), (3, 12));
    /// assert_eq!(name.extension, "jpg");
    ///
    /// assert!(ImageName::parse("cover.jpg").is_err());
    /// ```
    pub fn parse(name: &str) -> UrlResult<Self> {
        let invalid = || UrlError::ImageName(name.to_string());

        let (chapter, rest) = name.split_once('-').ok_or_else(invalid)?;
        let (image, extension) = rest.split_once('.').ok_or_else(invalid)?;

        if extension.is_empty() || extension.chars().any(char::is_whitespace) {
            return Err(invalid());
        }

        Ok(Self {
            chapter: parse_index(chapter).ok_or_else(invalid)?,
            image: parse_index(image).ok_or_else(invalid)?,
            extension: extension.to_string(),
        })
    }

    /// Parses the file name component of an image URL
    pub fn from_url(url: &Url) -> UrlResult<Self> {
        Self::parse(file_name(url)?)
    }
}

fn parse_index(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
